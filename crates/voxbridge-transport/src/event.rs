//! Asynchronous events raised by the protocol client

use std::fmt;

use tokio::sync::mpsc;

/// Server error codes the bridge reacts to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Ok,
    /// Whisper send without any reachable target
    WhisperNoTargets,
    /// Identity security level below the server minimum
    ClientCouldNotValidateIdentity,
    Other(u32),
}

impl ErrorCode {
    pub const OK: u32 = 0x0000;
    pub const CLIENT_COULD_NOT_VALIDATE_IDENTITY: u32 = 0x020d;
    pub const WHISPER_NO_TARGETS: u32 = 0x070c;

    pub fn from_u32(code: u32) -> Self {
        match code {
            Self::OK => ErrorCode::Ok,
            Self::CLIENT_COULD_NOT_VALIDATE_IDENTITY => ErrorCode::ClientCouldNotValidateIdentity,
            Self::WHISPER_NO_TARGETS => ErrorCode::WhisperNoTargets,
            other => ErrorCode::Other(other),
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            ErrorCode::Ok => Self::OK,
            ErrorCode::ClientCouldNotValidateIdentity => Self::CLIENT_COULD_NOT_VALIDATE_IDENTITY,
            ErrorCode::WhisperNoTargets => Self::WHISPER_NO_TARGETS,
            ErrorCode::Other(code) => code,
        }
    }
}

/// Error reported by the server for a command or send
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandError {
    pub code: ErrorCode,
    pub message: String,
    /// Extra payload; carries the required security level on identity rejection
    pub extra_message: String,
}

impl CommandError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        CommandError {
            code,
            message: message.into(),
            extra_message: String::new(),
        }
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra_message = extra.into();
        self
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error {:#06x}: {}", self.code.to_u32(), self.message)?;
        if !self.extra_message.is_empty() {
            write!(f, " ({})", self.extra_message)?;
        }
        Ok(())
    }
}

/// Why the connection ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// We asked to leave
    LeftServer,
    Timeout,
    Kicked,
    Banned,
    ServerShutdown,
    Other(String),
}

/// Event raised by the protocol client, possibly on another thread
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    Connected,
    Error(CommandError),
    Disconnected { reason: DisconnectReason },
}

/// Event sender handed to the protocol client
pub type EventSender = mpsc::UnboundedSender<ClientEvent>;

/// Event receiver pumped by the bridge
pub type EventReceiver = mpsc::UnboundedReceiver<ClientEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
