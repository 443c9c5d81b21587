//! VoxBridge Crypto - Client identity management
//!
//! Provides the identity primitives the voice server expects:
//! - Identity keypairs (Ed25519) with a persisted key string
//! - Proof-of-work security levels over a key offset
//! - Server password hashing

pub mod identity;
pub mod password;

pub use identity::*;
pub use password::*;
