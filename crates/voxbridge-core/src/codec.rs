//! Voice codecs understood by the protocol

/// Codec tag carried with every audio packet
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Codec {
    SpeexNarrowband = 0,
    SpeexWideband = 1,
    SpeexUltraWideband = 2,
    CeltMono = 3,
    OpusVoice = 4,
    OpusMusic = 5,
}

impl Codec {
    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Sample rate the codec runs at
    pub fn sample_rate(self) -> u32 {
        match self {
            Codec::SpeexNarrowband => 8_000,
            Codec::SpeexWideband => 16_000,
            Codec::SpeexUltraWideband => 32_000,
            Codec::CeltMono | Codec::OpusVoice | Codec::OpusMusic => 48_000,
        }
    }

    /// Channel count the codec encodes
    pub fn channels(self) -> u16 {
        match self {
            Codec::OpusMusic => 2,
            _ => 1,
        }
    }
}
