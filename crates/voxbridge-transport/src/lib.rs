//! VoxBridge Transport - Voice protocol client seam
//!
//! The wire protocol itself lives outside this workspace. This crate fixes
//! the surface the bridge needs from it:
//! - `VoiceClient`: connect, disconnect, broadcast and whisper audio
//! - Connection parameters and client version signs
//! - Asynchronous client events (errors, disconnects)
//! - A recording client for tests and dry runs

pub mod client;
pub mod event;
pub mod mock;
pub mod params;

pub use client::*;
pub use event::*;
pub use mock::RecordingClient;
pub use params::*;
