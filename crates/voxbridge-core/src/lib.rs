//! VoxBridge Core - Fundamental types and primitives
//!
//! This crate defines the core types shared by every VoxBridge crate:
//! - Identifiers (ChannelId, ClientId)
//! - Signed media time (MediaTime)
//! - Voice codecs
//! - The bridge error type

pub mod id;
pub mod time;
pub mod codec;
pub mod error;

pub use id::*;
pub use time::*;
pub use codec::*;
pub use error::*;
