//! Uncompressed codec for loopback setups and tests

use voxbridge_core::{BridgeError, BridgeResult, Codec};

/// 20ms at 48kHz
pub const DEFAULT_FRAME_SAMPLES: usize = 960;

/// Emits each frame as raw s16le bytes under the given codec tag
#[derive(Clone, Debug)]
pub struct PassthroughCodec {
    codec: Codec,
    frame_samples: usize,
    bitrate: u32,
}

impl PassthroughCodec {
    pub fn new(codec: Codec) -> Self {
        Self::with_frame_samples(codec, DEFAULT_FRAME_SAMPLES)
    }

    pub fn with_frame_samples(codec: Codec, frame_samples: usize) -> Self {
        PassthroughCodec {
            codec,
            frame_samples,
            bitrate: 48_000,
        }
    }
}

impl crate::PacketCodec for PassthroughCodec {
    fn codec(&self) -> Codec {
        self.codec
    }

    fn frame_samples(&self) -> usize {
        self.frame_samples
    }

    fn bitrate(&self) -> u32 {
        self.bitrate
    }

    fn set_bitrate(&mut self, bits_per_second: u32) -> BridgeResult<()> {
        if bits_per_second == 0 {
            return Err(BridgeError::Encoder("bitrate must be positive".to_string()));
        }
        self.bitrate = bits_per_second;
        Ok(())
    }

    fn encode_frame(&mut self, samples: &[i16]) -> BridgeResult<Vec<u8>> {
        Ok(samples.iter().flat_map(|s| s.to_le_bytes()).collect())
    }
}
