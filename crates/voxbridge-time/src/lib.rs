//! VoxBridge Time - Audio pacing clock
//!
//! The send loop never trusts wall time alone: the amount of audio on hand
//! is derived from the bytes handed to the clock, and wall time only tells
//! how much of it has been played out since the clock started.

pub mod clock;

pub use clock::*;
