//! VoxBridge Voice - PCM to voice packet encoding
//!
//! Raw PCM from the transcoder arrives in arbitrary chunk sizes. The frame
//! encoder buffers it, cuts it into codec frames and queues one compressed
//! packet per frame for the send loop to drain.
//!
//! - `AudioEncoder`: what the send loop talks to
//! - `FrameEncoder`: buffering adapter over any `PacketCodec`
//! - `OpusCodec` (feature `opus`): libopus music codec
//! - Volume scaling for s16le PCM

pub mod encoder;
pub mod passthrough;
pub mod volume;
#[cfg(feature = "opus")]
pub mod opus_codec;

pub use encoder::*;
pub use passthrough::*;
pub use volume::*;
#[cfg(feature = "opus")]
pub use opus_codec::*;
