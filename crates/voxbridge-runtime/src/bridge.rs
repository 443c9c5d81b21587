//! Audio bridge
//!
//! Wires the session, subscription registry, tick worker and connection
//! manager together behind the `PlayerConnection` and `TargetManager`
//! capabilities.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use voxbridge_core::{BridgeError, BridgeResult, ChannelId, ClientId};
use voxbridge_crypto::IdentityService;
use voxbridge_transport::{ClientEvent, ErrorCode, EventReceiver, VoiceClient};
use voxbridge_voice::AudioEncoder;

use crate::{
    is_valid_bitrate, BridgeConfig, ConfigChange, ConnectionManager, PlayerConnection,
    RuntimeConfig, SessionState, SubprocessSource, SubscriptionRegistry, TargetManager,
    TickHandle, TickOutcome, TickWorker,
};

/// Callback fired when a stream plays out to its end
pub type SongEndHandler = Arc<dyn Fn() + Send + Sync>;

struct BridgeInner {
    session: Mutex<SessionState>,
    registry: SubscriptionRegistry,
    client: Arc<dyn VoiceClient>,
    ticker: TickHandle,
    connection: ConnectionManager,
    config: Arc<Mutex<BridgeConfig>>,
    song_end: Mutex<Vec<SongEndHandler>>,
}

impl BridgeInner {
    fn tick(&self) {
        let outcome = {
            let mut session = self.session.lock();
            let outcome = session.send_tick(&self.registry, self.client.as_ref());
            // Under the session lock so a stream started right after the end
            // is never switched off here
            if let TickOutcome::Ended { .. } = outcome {
                self.ticker.set_active(false);
            }
            outcome
        };

        if let TickOutcome::Ended { .. } = outcome {
            info!("song ended");
            let handlers = self.song_end.lock().clone();
            for handler in handlers {
                handler();
            }
        }
    }

    fn start_stream(&self, url: &str, seek: Option<Duration>) -> BridgeResult<()> {
        let program = self.config.lock().ffmpeg_path.clone();

        let mut session = self.session.lock();
        self.ticker.set_active(false);
        session.end();

        let source = SubprocessSource::spawn(&program, url, seek)?;
        session.begin(Box::new(source), url, seek.unwrap_or_default());
        self.ticker.set_active(true);
        info!(url, "stream started");
        Ok(())
    }

    fn handle_event(&self, event: ClientEvent) -> BridgeResult<()> {
        match event {
            ClientEvent::Error(err) => match err.code {
                ErrorCode::WhisperNoTargets => {
                    self.session.lock().trigger_stall();
                    Ok(())
                }
                ErrorCode::ClientCouldNotValidateIdentity => {
                    self.connection.handle_identity_rejection(&err.extra_message)
                }
                _ => {
                    debug!(error = %err, "unhandled server error");
                    Ok(())
                }
            },
            ClientEvent::Disconnected { reason } => self.connection.on_disconnected(&reason),
            ClientEvent::Connected => {
                self.connection.on_connected();
                Ok(())
            }
        }
    }
}

/// Streams transcoded audio to a voice server
pub struct AudioBridge {
    // Declared first so the tick thread is joined before the state goes away
    worker: TickWorker,
    inner: Arc<BridgeInner>,
}

impl AudioBridge {
    pub fn new(
        config: BridgeConfig,
        runtime: RuntimeConfig,
        client: Arc<dyn VoiceClient>,
        identities: Arc<dyn IdentityService>,
        encoder: Box<dyn AudioEncoder>,
    ) -> BridgeResult<Self> {
        config.validate()?;

        let mut session = SessionState::new(encoder, &runtime);
        session.set_bitrate(config.audio_bitrate as u32 * 1000)?;

        let config = Arc::new(Mutex::new(config));
        let ticker = TickHandle::new();
        let inner = Arc::new(BridgeInner {
            session: Mutex::new(session),
            registry: SubscriptionRegistry::new(),
            connection: ConnectionManager::new(
                Arc::clone(&client),
                identities,
                Arc::clone(&config),
            ),
            client,
            ticker: ticker.clone(),
            config,
            song_end: Mutex::new(Vec::new()),
        });

        let weak: Weak<BridgeInner> = Arc::downgrade(&inner);
        let worker = TickWorker::attach(&ticker, "voxbridge-send", runtime.send_interval, move || {
            if let Some(inner) = weak.upgrade() {
                inner.tick();
            }
        })?;

        Ok(AudioBridge { worker, inner })
    }

    pub fn connect(&self) -> BridgeResult<()> {
        self.inner.connection.connect()
    }

    pub fn disconnect(&self) -> BridgeResult<()> {
        self.inner.connection.disconnect()
    }

    /// React to one protocol client event
    ///
    /// Only a repeated identity rejection or a failed reconnect is returned
    /// as an error; everything else is handled in place.
    pub fn handle_event(&self, event: ClientEvent) -> BridgeResult<()> {
        self.inner.handle_event(event)
    }

    /// Pump client events on a dedicated thread until the sender closes
    ///
    /// The thread ends early with the error if a repeated identity
    /// rejection makes connecting impossible.
    pub fn spawn_event_pump(
        &self,
        mut events: EventReceiver,
    ) -> BridgeResult<JoinHandle<BridgeResult<()>>> {
        let weak = Arc::downgrade(&self.inner);
        let handle = thread::Builder::new()
            .name("voxbridge-events".to_string())
            .spawn(move || {
                while let Some(event) = events.blocking_recv() {
                    let Some(inner) = weak.upgrade() else {
                        break;
                    };
                    match inner.handle_event(event) {
                        Ok(()) => {}
                        Err(e @ BridgeError::IdentityRejected { .. }) => {
                            error!(error = %e, "giving up on connection");
                            return Err(e);
                        }
                        Err(e) => warn!(error = %e, "client event handling failed"),
                    }
                }
                Ok(())
            })?;
        Ok(handle)
    }

    /// Apply a changed persisted setting
    pub fn apply_config_change(&self, change: ConfigChange) {
        match change {
            ConfigChange::AudioBitrate(kbps) => {
                if !is_valid_bitrate(kbps) {
                    debug!(kbps, "ignoring out of range bitrate");
                    return;
                }
                if let Err(e) = self.inner.session.lock().set_bitrate(kbps as u32 * 1000) {
                    warn!(kbps, error = %e, "encoder rejected bitrate");
                    return;
                }
                self.inner.config.lock().audio_bitrate = kbps;
            }
            ConfigChange::DefaultNickname(name) => {
                self.inner.config.lock().default_nickname = name;
            }
            ConfigChange::ClientVersion(version) => {
                self.inner.config.lock().client_version = version;
            }
        }
    }

    /// Register a callback for the end of each stream
    pub fn on_song_end(&self, handler: impl Fn() + Send + Sync + 'static) {
        self.inner.song_end.lock().push(Arc::new(handler));
    }

    /// Current configuration including identity and password updates
    pub fn config(&self) -> BridgeConfig {
        self.inner.config.lock().clone()
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.inner.registry
    }

    /// Encoder bitrate in bits per second
    pub fn bitrate(&self) -> u32 {
        self.inner.session.lock().bitrate()
    }

    pub fn is_stalled(&self) -> bool {
        self.inner.session.lock().stall().is_stalled()
    }

    pub fn send_interval(&self) -> Duration {
        self.worker.interval()
    }

    /// Channel targets as `(channel, manual)` pairs
    pub fn channel_subscriptions(&self) -> Vec<(ChannelId, bool)> {
        self.inner.registry.channel_subscriptions()
    }

    pub fn client_subscriptions(&self) -> Vec<ClientId> {
        self.inner.registry.client_subscriptions()
    }
}

/// Music encoder at `kbps`
#[cfg(feature = "opus")]
pub fn opus_encoder(kbps: u32) -> BridgeResult<Box<dyn AudioEncoder>> {
    let codec = voxbridge_voice::OpusCodec::new(kbps * 1000)?;
    Ok(Box::new(voxbridge_voice::FrameEncoder::new(
        codec,
        voxbridge_time::PcmFormat::STEREO_48K,
    )))
}

impl PlayerConnection for AudioBridge {
    fn start(&self, url: &str) -> BridgeResult<()> {
        self.inner.start_stream(url, None)
    }

    fn stop(&self) -> BridgeResult<()> {
        let mut session = self.inner.session.lock();
        self.inner.ticker.set_active(false);
        if session.end() {
            info!("stream stopped");
        }
        Ok(())
    }

    fn seek(&self, position: Duration) -> BridgeResult<()> {
        let url = self
            .inner
            .session
            .lock()
            .url()
            .map(str::to_string)
            .ok_or(BridgeError::NoActiveStream)?;
        self.inner.start_stream(&url, Some(position))
    }

    fn position(&self) -> Duration {
        self.inner.session.lock().position()
    }

    fn song_length(&self) -> Duration {
        self.inner.session.lock().duration()
    }

    fn volume(&self) -> i32 {
        self.inner.session.lock().volume_percent()
    }

    fn set_volume(&self, percent: i32) {
        self.inner.session.lock().set_volume_percent(percent);
    }

    fn paused(&self) -> bool {
        let session = self.inner.session.lock();
        session.is_active() && !self.inner.ticker.is_active()
    }

    fn set_paused(&self, paused: bool) {
        let mut session = self.inner.session.lock();
        if !session.is_active() {
            return;
        }
        session.set_clock_running(!paused);
        self.inner.ticker.set_active(!paused);
    }

    fn playing(&self) -> bool {
        self.inner.session.lock().is_active()
    }
}

impl TargetManager for AudioBridge {
    fn on_resource_started(&self, invoker_channel: Option<ChannelId>) {
        if let Some(channel) = invoker_channel {
            self.inner.registry.restore(channel);
        }
    }

    fn subscribe_channel(&self, channel: ChannelId, manual: bool) {
        self.inner.registry.subscribe_channel(channel, manual);
    }

    fn unsubscribe_channel(&self, channel: ChannelId, manual: bool) {
        self.inner.registry.unsubscribe_channel(channel, manual);
    }

    fn subscribe_client(&self, client: ClientId) {
        self.inner.registry.subscribe_client(client);
    }

    fn unsubscribe_client(&self, client: ClientId) {
        self.inner.registry.unsubscribe_client(client);
    }

    fn clear_subscriptions(&self) {
        self.inner.registry.clear();
    }
}
