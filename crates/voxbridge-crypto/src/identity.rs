//! Identity management using Ed25519 with a hashcash-style key offset
//!
//! The server measures an identity by its security level: the number of
//! leading zero bits of `SHA-1(public_key_string || offset)`. Raising the
//! level means searching for a larger offset, which is deliberately costly.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use voxbridge_core::{BridgeError, BridgeResult};

/// Level freshly generated identities are brought up to
pub const DEFAULT_SECURITY_LEVEL: u8 = 8;

/// Upper bound for requested levels (width of the SHA-1 digest)
pub const MAX_SECURITY_LEVEL: u8 = 160;

/// Client identity keypair plus its proof-of-work offset
#[derive(Clone)]
pub struct Identity {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    public_key_string: String,
    /// Offset satisfying the highest level computed so far
    valid_key_offset: u64,
    /// Next offset the search resumes from
    last_checked_offset: u64,
}

impl Identity {
    /// Generate a new random identity at offset zero
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng), 0)
    }

    /// Create identity from existing signing key bytes
    pub fn from_bytes(bytes: &[u8; 32], offset: u64) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(bytes), offset)
    }

    /// Load an identity from its persisted key string and offset
    pub fn from_key_string(key: &str, offset: u64) -> BridgeResult<Self> {
        let raw = BASE64
            .decode(key.trim())
            .map_err(|e| BridgeError::InvalidIdentity(e.to_string()))?;
        let bytes: [u8; 32] = raw.as_slice().try_into().map_err(|_| {
            BridgeError::InvalidIdentity(format!("expected 32 key bytes, got {}", raw.len()))
        })?;
        Ok(Self::from_bytes(&bytes, offset))
    }

    fn from_signing_key(signing_key: SigningKey, offset: u64) -> Self {
        let verifying_key = signing_key.verifying_key();
        let public_key_string = BASE64.encode(verifying_key.as_bytes());
        Identity {
            signing_key,
            verifying_key,
            public_key_string,
            valid_key_offset: offset,
            last_checked_offset: offset,
        }
    }

    /// Secret key string, suitable for persisting in configuration
    pub fn key_string(&self) -> String {
        BASE64.encode(self.signing_key.to_bytes())
    }

    pub fn public_key_string(&self) -> &str {
        &self.public_key_string
    }

    pub fn valid_key_offset(&self) -> u64 {
        self.valid_key_offset
    }

    /// Short fingerprint of the public key (first 8 bytes of SHA-256)
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(self.verifying_key.as_bytes());
        let hash = hasher.finalize();
        let mut id_bytes = [0u8; 8];
        id_bytes.copy_from_slice(&hash[0..8]);
        u64::from_le_bytes(id_bytes)
    }

    /// Security level reached at the current valid offset
    pub fn security_level(&self) -> u8 {
        security_level_at(&self.public_key_string, self.valid_key_offset)
    }

    /// Search offsets until the identity reaches `target` and return the new offset
    ///
    /// Blocks for as long as the search takes. An identity already at or above
    /// the target is left untouched.
    pub fn improve_security(&mut self, target: u8) -> BridgeResult<u64> {
        if target > MAX_SECURITY_LEVEL {
            return Err(BridgeError::InvalidSecurityLevel(format!(
                "{} exceeds the maximum of {}",
                target, MAX_SECURITY_LEVEL
            )));
        }
        if self.security_level() >= target {
            return Ok(self.valid_key_offset);
        }

        let mut offset = self.last_checked_offset.max(self.valid_key_offset);
        loop {
            if security_level_at(&self.public_key_string, offset) >= target {
                break;
            }
            offset = offset.checked_add(1).ok_or_else(|| {
                BridgeError::InvalidSecurityLevel("key offset space exhausted".to_string())
            })?;
        }

        debug!(
            from = self.valid_key_offset,
            to = offset,
            target,
            "identity offset raised"
        );
        self.valid_key_offset = offset;
        self.last_checked_offset = offset;
        Ok(offset)
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("fingerprint", &format_args!("{:016x}", self.fingerprint()))
            .field("valid_key_offset", &self.valid_key_offset)
            .finish_non_exhaustive()
    }
}

/// Security level of `public_key` at `offset`
pub fn security_level_at(public_key: &str, offset: u64) -> u8 {
    let mut hasher = Sha1::new();
    hasher.update(public_key.as_bytes());
    hasher.update(offset.to_string().as_bytes());
    leading_zero_bits(&hasher.finalize())
}

/// Zero bits counted from the low bit of each byte, first byte first
fn leading_zero_bits(hash: &[u8]) -> u8 {
    let mut count = 0u32;
    for &byte in hash {
        if byte == 0 {
            count += 8;
        } else {
            count += byte.trailing_zeros();
            break;
        }
    }
    count.min(u8::MAX as u32) as u8
}

/// Identity operations the bridge needs from its crypto collaborator
pub trait IdentityService: Send + Sync {
    /// Create a fresh identity at a usable security level
    fn generate_identity(&self) -> BridgeResult<Identity>;

    /// Rebuild an identity from persisted key material
    fn load_identity(&self, key: &str, offset: u64) -> BridgeResult<Identity>;

    /// Raise the identity to at least `target_level`, returning the new offset
    fn improve_security(&self, identity: &mut Identity, target_level: u8) -> BridgeResult<u64>;

    /// Hash a plain server password the way the server expects it
    fn hash_password(&self, plain: &str) -> String;
}

/// Default identity provider backed by Ed25519 keys and SHA-1 hashcash
#[derive(Clone, Debug)]
pub struct HashcashIdentityService {
    /// Level new identities are generated at
    pub initial_level: u8,
}

impl HashcashIdentityService {
    pub fn new(initial_level: u8) -> Self {
        HashcashIdentityService { initial_level }
    }
}

impl Default for HashcashIdentityService {
    fn default() -> Self {
        Self::new(DEFAULT_SECURITY_LEVEL)
    }
}

impl IdentityService for HashcashIdentityService {
    fn generate_identity(&self) -> BridgeResult<Identity> {
        let mut identity = Identity::generate();
        identity.improve_security(self.initial_level)?;
        info!(
            fingerprint = identity.fingerprint(),
            level = identity.security_level(),
            "generated new identity"
        );
        Ok(identity)
    }

    fn load_identity(&self, key: &str, offset: u64) -> BridgeResult<Identity> {
        Identity::from_key_string(key, offset)
    }

    fn improve_security(&self, identity: &mut Identity, target_level: u8) -> BridgeResult<u64> {
        identity.improve_security(target_level)
    }

    fn hash_password(&self, plain: &str) -> String {
        crate::hash_password(plain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_identity() -> Identity {
        Identity::from_bytes(&[7u8; 32], 0)
    }

    #[test]
    fn test_identity_generation() {
        let id1 = Identity::generate();
        let id2 = Identity::generate();

        assert_ne!(id1.fingerprint(), id2.fingerprint());
        assert_eq!(id1.valid_key_offset(), 0);
    }

    #[test]
    fn test_key_string_roundtrip() {
        let identity = fixed_identity();
        let restored = Identity::from_key_string(&identity.key_string(), 42).unwrap();

        assert_eq!(identity.fingerprint(), restored.fingerprint());
        assert_eq!(restored.valid_key_offset(), 42);
    }

    #[test]
    fn test_invalid_key_string() {
        assert!(matches!(
            Identity::from_key_string("not base64!", 0),
            Err(BridgeError::InvalidIdentity(_))
        ));
        assert!(matches!(
            Identity::from_key_string("AAAA", 0),
            Err(BridgeError::InvalidIdentity(_))
        ));
    }

    #[test]
    fn test_improve_security_reaches_target() {
        let mut identity = fixed_identity();
        let offset = identity.improve_security(6).unwrap();

        assert_eq!(identity.valid_key_offset(), offset);
        assert!(identity.security_level() >= 6);
        assert!(security_level_at(identity.public_key_string(), offset) >= 6);
    }

    #[test]
    fn test_improve_security_is_monotonic() {
        let mut identity = fixed_identity();
        let high = identity.improve_security(7).unwrap();
        // A lower target never moves the offset back
        let again = identity.improve_security(3).unwrap();
        assert_eq!(high, again);
    }

    #[test]
    fn test_improve_security_rejects_impossible_level() {
        let mut identity = fixed_identity();
        assert!(matches!(
            identity.improve_security(MAX_SECURITY_LEVEL + 1),
            Err(BridgeError::InvalidSecurityLevel(_))
        ));
    }

    #[test]
    fn test_leading_zero_bits() {
        assert_eq!(leading_zero_bits(&[0, 0, 0b0000_0100]), 18);
        assert_eq!(leading_zero_bits(&[1, 0]), 0);
        assert_eq!(leading_zero_bits(&[0u8; 20]), 160);
    }

    #[test]
    fn test_service_generates_at_initial_level() {
        let service = HashcashIdentityService::new(4);
        let identity = service.generate_identity().unwrap();
        assert!(identity.security_level() >= 4);
    }
}
