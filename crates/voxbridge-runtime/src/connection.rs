//! Connect lifecycle and identity escalation
//!
//! A server may reject the identity with the security level it requires.
//! The manager then raises the identity offset in place (blocking, possibly
//! for a long time), records the new offset in the config, disconnects and
//! reconnects once the disconnect is confirmed. A second rejection before a
//! successful connection is fatal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use tracing::{debug, error, info};

use voxbridge_core::{BridgeError, BridgeResult};
use voxbridge_crypto::{Identity, IdentityService};
use voxbridge_transport::{ConnectionParams, DisconnectReason, VersionSign, VoiceClient};

use crate::BridgeConfig;

/// Messages shown to other users when the bridge leaves
pub const QUIT_MESSAGES: &[&str] = &[
    "Bye",
    "Have a nice day",
    "Good night",
    "Taking a break",
    "Nothing to do here",
    "It's getting quiet",
    "I'll be back",
    "Keep rockin' it",
    "connection lost",
    "disconnected",
];

pub fn random_quit_message() -> String {
    QUIT_MESSAGES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Bye")
        .to_string()
}

/// Owns the identity and drives connect, escalation and reconnect
pub struct ConnectionManager {
    client: Arc<dyn VoiceClient>,
    identities: Arc<dyn IdentityService>,
    config: Arc<Mutex<BridgeConfig>>,
    identity: Mutex<Option<Identity>>,
    /// Set by an escalation, consumed by the next disconnect
    reconnect_once: AtomicBool,
    /// Set by an escalation, cleared by a successful connection
    escalated: AtomicBool,
}

impl ConnectionManager {
    pub fn new(
        client: Arc<dyn VoiceClient>,
        identities: Arc<dyn IdentityService>,
        config: Arc<Mutex<BridgeConfig>>,
    ) -> Self {
        ConnectionManager {
            client,
            identities,
            config,
            identity: Mutex::new(None),
            reconnect_once: AtomicBool::new(false),
            escalated: AtomicBool::new(false),
        }
    }

    /// Load or create the identity, hash the password if asked to, connect
    pub fn connect(&self) -> BridgeResult<()> {
        let identity = self.bootstrap_identity()?;
        *self.identity.lock() = Some(identity);
        self.hash_password_if_needed();
        self.connect_client()
    }

    fn bootstrap_identity(&self) -> BridgeResult<Identity> {
        let (key, offset) = {
            let config = self.config.lock();
            (config.identity.clone(), config.identity_offset)
        };

        if !key.trim().is_empty() {
            return self.identities.load_identity(&key, offset);
        }

        let identity = self.identities.generate_identity()?;
        let mut config = self.config.lock();
        config.identity = identity.key_string();
        config.identity_offset = identity.valid_key_offset();
        Ok(identity)
    }

    fn hash_password_if_needed(&self) {
        let mut config = self.config.lock();
        if !config.server_password.is_empty()
            && config.server_password_auto_hash
            && !config.server_password_is_hashed
        {
            config.server_password = self.identities.hash_password(&config.server_password);
            config.server_password_is_hashed = true;
            debug!("server password hashed");
        }
    }

    fn connect_client(&self) -> BridgeResult<()> {
        let identity = self
            .identity
            .lock()
            .clone()
            .ok_or_else(|| BridgeError::InvalidIdentity("no identity loaded".to_string()))?;

        let params = {
            let config = self.config.lock();
            ConnectionParams {
                username: config.default_nickname.clone(),
                password: config.server_password.clone(),
                hostname: config.host.clone(),
                port: config.port,
                identity,
                is_password_hashed: config.server_password_is_hashed,
                version_sign: VersionSign::from_config(&config.client_version)?,
                quit_message: random_quit_message(),
            }
        };

        info!(
            host = %params.hostname,
            port = params.port,
            version = %params.version_sign,
            "connecting"
        );
        self.client.connect(params)
    }

    /// React to an identity rejection carrying the required level in `extra`
    pub fn handle_identity_rejection(&self, extra: &str) -> BridgeResult<()> {
        let required: u8 = extra.trim().parse().map_err(|_| {
            BridgeError::InvalidSecurityLevel(format!("unparsable level '{}'", extra))
        })?;

        if self.escalated.load(Ordering::SeqCst) {
            error!(required, "identity rejected again after escalation");
            return Err(BridgeError::IdentityRejected { required });
        }

        info!(required, "Calculating up to required security level");

        let offset = {
            let mut guard = self.identity.lock();
            let identity = guard
                .as_mut()
                .ok_or_else(|| BridgeError::InvalidIdentity("no identity loaded".to_string()))?;
            self.identities.improve_security(identity, required)?
        };
        self.config.lock().identity_offset = offset;

        self.escalated.store(true, Ordering::SeqCst);
        self.reconnect_once.store(true, Ordering::SeqCst);
        if let Err(e) = self.client.disconnect() {
            self.reconnect_once.store(false, Ordering::SeqCst);
            self.escalated.store(false, Ordering::SeqCst);
            return Err(e);
        }
        Ok(())
    }

    /// Reconnect if an escalation is waiting for this disconnect
    pub fn on_disconnected(&self, reason: &DisconnectReason) -> BridgeResult<()> {
        if self.reconnect_once.swap(false, Ordering::SeqCst) {
            info!("reconnecting with improved identity");
            return self.connect_client();
        }
        debug!(?reason, "disconnected");
        Ok(())
    }

    /// A connection was accepted; re-arm escalation
    pub fn on_connected(&self) {
        self.escalated.store(false, Ordering::SeqCst);
    }

    pub fn disconnect(&self) -> BridgeResult<()> {
        self.reconnect_once.store(false, Ordering::SeqCst);
        self.client.disconnect()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity.lock().clone()
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_once.load(Ordering::SeqCst)
    }
}
