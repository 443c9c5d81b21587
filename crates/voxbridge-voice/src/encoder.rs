//! Frame encoder adapter

use std::collections::VecDeque;

use bytes::Bytes;
use tracing::{trace, warn};

use voxbridge_core::{BridgeResult, Codec};
use voxbridge_time::PcmFormat;

/// Stateful PCM encoder as seen by the send loop
///
/// Accepts PCM in arbitrary chunk sizes and yields zero or more compressed
/// packets per push.
pub trait AudioEncoder: Send {
    /// Codec tag for outgoing packets
    fn codec(&self) -> Codec;

    /// PCM layout the encoder expects
    fn format(&self) -> PcmFormat;

    /// Bytes of PCM that make exactly one packet
    fn optimal_packet_size(&self) -> usize;

    /// Target bitrate in bits per second
    fn bitrate(&self) -> u32;

    fn set_bitrate(&mut self, bits_per_second: u32) -> BridgeResult<()>;

    /// Buffer raw s16le PCM, encoding every complete frame
    fn push_pcm(&mut self, pcm: &[u8]) -> BridgeResult<()>;

    /// Next ready packet, if any
    fn next_packet(&mut self) -> Option<Bytes>;

    fn has_packet(&self) -> bool;

    /// Drop buffered PCM and queued packets
    fn reset(&mut self);
}

/// Single-frame codec the frame encoder drives
pub trait PacketCodec: Send {
    fn codec(&self) -> Codec;

    /// Samples per channel in one frame
    fn frame_samples(&self) -> usize;

    fn bitrate(&self) -> u32;

    fn set_bitrate(&mut self, bits_per_second: u32) -> BridgeResult<()>;

    /// Encode exactly one frame of interleaved samples
    fn encode_frame(&mut self, samples: &[i16]) -> BridgeResult<Vec<u8>>;
}

/// Buffers PCM and cuts it into codec frames
pub struct FrameEncoder<C: PacketCodec> {
    codec: C,
    format: PcmFormat,
    /// PCM not yet making up a whole frame
    pending: Vec<u8>,
    /// Scratch buffer for sample conversion
    samples: Vec<i16>,
    packets: VecDeque<Bytes>,
}

impl<C: PacketCodec> FrameEncoder<C> {
    pub fn new(codec: C, format: PcmFormat) -> Self {
        let tag = codec.codec();
        if tag.sample_rate() != format.sample_rate || tag.channels() != format.channels {
            warn!(
                codec = ?tag,
                sample_rate = format.sample_rate,
                channels = format.channels,
                "pcm format does not match codec"
            );
        }
        let frame_bytes = codec.frame_samples() * format.frame_bytes() as usize;
        FrameEncoder {
            codec,
            format,
            pending: Vec::with_capacity(frame_bytes * 2),
            samples: Vec::with_capacity(frame_bytes / 2),
            packets: VecDeque::new(),
        }
    }

    pub fn inner(&self) -> &C {
        &self.codec
    }

    /// PCM bytes buffered but not yet encoded
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    fn frame_bytes(&self) -> usize {
        self.codec.frame_samples() * self.format.frame_bytes() as usize
    }
}

impl<C: PacketCodec> AudioEncoder for FrameEncoder<C> {
    fn codec(&self) -> Codec {
        self.codec.codec()
    }

    fn format(&self) -> PcmFormat {
        self.format
    }

    fn optimal_packet_size(&self) -> usize {
        self.frame_bytes()
    }

    fn bitrate(&self) -> u32 {
        self.codec.bitrate()
    }

    fn set_bitrate(&mut self, bits_per_second: u32) -> BridgeResult<()> {
        self.codec.set_bitrate(bits_per_second)
    }

    fn push_pcm(&mut self, pcm: &[u8]) -> BridgeResult<()> {
        self.pending.extend_from_slice(pcm);

        let frame_bytes = self.frame_bytes();
        if frame_bytes == 0 {
            return Ok(());
        }

        let mut consumed = 0;
        while self.pending.len() - consumed >= frame_bytes {
            let frame = &self.pending[consumed..consumed + frame_bytes];
            self.samples.clear();
            self.samples.extend(
                frame
                    .chunks_exact(2)
                    .map(|b| i16::from_le_bytes([b[0], b[1]])),
            );
            let packet = match self.codec.encode_frame(&self.samples) {
                Ok(packet) => packet,
                Err(e) => {
                    // Earlier frames are already queued; the failed one is dropped
                    self.pending.drain(..consumed + frame_bytes);
                    return Err(e);
                }
            };
            trace!(bytes = packet.len(), "encoded frame");
            self.packets.push_back(Bytes::from(packet));
            consumed += frame_bytes;
        }
        self.pending.drain(..consumed);
        Ok(())
    }

    fn next_packet(&mut self) -> Option<Bytes> {
        self.packets.pop_front()
    }

    fn has_packet(&self) -> bool {
        !self.packets.is_empty()
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.packets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PassthroughCodec;

    fn encoder() -> FrameEncoder<PassthroughCodec> {
        FrameEncoder::new(PassthroughCodec::new(Codec::OpusMusic), PcmFormat::STEREO_48K)
    }

    #[test]
    fn test_optimal_packet_size_is_one_frame() {
        // 960 samples * 2 channels * 2 bytes = 20ms at 48kHz
        assert_eq!(encoder().optimal_packet_size(), 3840);
    }

    #[test]
    fn test_partial_frame_is_buffered() {
        let mut enc = encoder();
        enc.push_pcm(&[0u8; 1000]).unwrap();

        assert!(!enc.has_packet());
        assert!(enc.next_packet().is_none());
        assert_eq!(enc.pending_bytes(), 1000);
    }

    #[test]
    fn test_push_yields_whole_frames() {
        let mut enc = encoder();
        enc.push_pcm(&vec![1u8; 3840 * 2 + 100]).unwrap();

        assert!(enc.next_packet().is_some());
        assert!(enc.next_packet().is_some());
        assert!(enc.next_packet().is_none());
        assert_eq!(enc.pending_bytes(), 100);
    }

    #[test]
    fn test_frames_span_pushes() {
        let mut enc = encoder();
        enc.push_pcm(&vec![0u8; 2000]).unwrap();
        enc.push_pcm(&vec![0u8; 2000]).unwrap();

        assert!(enc.has_packet());
        assert_eq!(enc.pending_bytes(), 160);
    }

    #[test]
    fn test_reset_drops_everything() {
        let mut enc = encoder();
        enc.push_pcm(&vec![0u8; 5000]).unwrap();
        enc.reset();

        assert!(!enc.has_packet());
        assert_eq!(enc.pending_bytes(), 0);
    }

    /// Emits the first sample of each frame, failing on one chosen frame
    struct FlakyCodec {
        frames: usize,
        fail_on: usize,
    }

    impl PacketCodec for FlakyCodec {
        fn codec(&self) -> Codec {
            Codec::OpusMusic
        }

        fn frame_samples(&self) -> usize {
            2
        }

        fn bitrate(&self) -> u32 {
            48_000
        }

        fn set_bitrate(&mut self, _bits_per_second: u32) -> BridgeResult<()> {
            Ok(())
        }

        fn encode_frame(&mut self, samples: &[i16]) -> BridgeResult<Vec<u8>> {
            self.frames += 1;
            if self.frames == self.fail_on {
                return Err(voxbridge_core::BridgeError::Encoder("bad frame".to_string()));
            }
            Ok(vec![samples[0] as u8])
        }
    }

    fn frames(values: &[u8]) -> Vec<u8> {
        // 2 samples per channel, stereo: 8 bytes per frame
        values
            .iter()
            .flat_map(|v| (*v as i16).to_le_bytes().repeat(4))
            .collect()
    }

    #[test]
    fn test_failed_frame_is_dropped_once() {
        let mut enc = FrameEncoder::new(
            FlakyCodec {
                frames: 0,
                fail_on: 2,
            },
            PcmFormat::STEREO_48K,
        );

        assert!(enc.push_pcm(&frames(&[1, 9, 2])).is_err());
        assert_eq!(enc.pending_bytes(), 8);

        enc.push_pcm(&[]).unwrap();
        let mut packets = Vec::new();
        while let Some(packet) = enc.next_packet() {
            packets.push(packet[0]);
        }
        assert_eq!(packets, vec![1, 2]);
        assert_eq!(enc.pending_bytes(), 0);
    }

    #[test]
    fn test_bitrate_passes_through() {
        let mut enc = encoder();
        enc.set_bitrate(64_000).unwrap();
        assert_eq!(enc.bitrate(), 64_000);
    }
}
