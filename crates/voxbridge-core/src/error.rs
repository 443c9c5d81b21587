//! Error types for VoxBridge

use thiserror::Error;

/// Core bridge errors
#[derive(Error, Debug)]
pub enum BridgeError {
    // Stream errors
    #[error("Unable to create stream ({0})")]
    Spawn(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("No active stream")]
    NoActiveStream,

    #[error("Encoder error: {0}")]
    Encoder(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid client version sign: {0}")]
    InvalidVersionSign(String),

    // Identity errors
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Invalid security level: {0}")]
    InvalidSecurityLevel(String),

    #[error("Identity rejected again after raising it to security level {required}")]
    IdentityRejected { required: u8 },

    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Io(err.to_string())
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
