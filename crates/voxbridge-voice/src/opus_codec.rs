//! libopus music codec

use opus::{Application, Bitrate, Channels, Encoder};

use voxbridge_core::{BridgeError, BridgeResult, Codec};

use crate::{PacketCodec, DEFAULT_FRAME_SAMPLES};

/// Largest packet libopus produces for a single frame
const MAX_PACKET_BYTES: usize = 1275 * 3;

/// Stereo 48kHz Opus encoder tuned for music
pub struct OpusCodec {
    encoder: Encoder,
    bitrate: u32,
}

impl OpusCodec {
    pub fn new(bits_per_second: u32) -> BridgeResult<Self> {
        let encoder = Encoder::new(48_000, Channels::Stereo, Application::Audio)
            .map_err(|e| BridgeError::Encoder(e.to_string()))?;
        let mut codec = OpusCodec {
            encoder,
            bitrate: 0,
        };
        codec.set_bitrate(bits_per_second)?;
        Ok(codec)
    }
}

impl PacketCodec for OpusCodec {
    fn codec(&self) -> Codec {
        Codec::OpusMusic
    }

    fn frame_samples(&self) -> usize {
        DEFAULT_FRAME_SAMPLES
    }

    fn bitrate(&self) -> u32 {
        self.bitrate
    }

    fn set_bitrate(&mut self, bits_per_second: u32) -> BridgeResult<()> {
        let bits = i32::try_from(bits_per_second)
            .map_err(|_| BridgeError::Encoder(format!("bitrate {} out of range", bits_per_second)))?;
        self.encoder
            .set_bitrate(Bitrate::Bits(bits))
            .map_err(|e| BridgeError::Encoder(e.to_string()))?;
        self.bitrate = bits_per_second;
        Ok(())
    }

    fn encode_frame(&mut self, samples: &[i16]) -> BridgeResult<Vec<u8>> {
        self.encoder
            .encode_vec(samples, MAX_PACKET_BYTES)
            .map_err(|e| BridgeError::Encoder(e.to_string()))
    }
}
