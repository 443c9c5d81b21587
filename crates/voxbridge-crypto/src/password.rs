//! Server password hashing

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha1::{Digest, Sha1};

/// Hash a plain server password: base64 of its SHA-1 digest
pub fn hash_password(plain: &str) -> String {
    if plain.is_empty() {
        return String::new();
    }
    let mut hasher = Sha1::new();
    hasher.update(plain.as_bytes());
    BASE64.encode(hasher.finalize())
}
