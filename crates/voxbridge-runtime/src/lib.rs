//! VoxBridge Runtime - Audio bridge orchestration
//!
//! Ties the pieces together into a running bridge:
//! 1. Transcoder subprocess decodes any source to s16le PCM
//! 2. Send loop paces PCM against the audio clock
//! 3. Frame encoder compresses it into voice packets
//! 4. Packets are broadcast, or whispered to the subscribed targets
//!
//! Alongside the send loop, client events drive stall suppression and the
//! one-shot identity escalation with reconnect.

pub mod bridge;
pub mod capability;
pub mod config;
pub mod connection;
pub mod logging;
pub mod session;
pub mod source;
pub mod stall;
pub mod subscription;
pub mod tick;

pub use bridge::*;
pub use capability::*;
pub use config::*;
pub use connection::*;
pub use logging::*;
pub use session::*;
pub use source::*;
pub use stall::*;
pub use subscription::*;
pub use tick::*;
