//! Volume scaling for interleaved s16le PCM

/// Scale every sample in `pcm` by `volume` (0.0 - 1.0), in place
///
/// Trailing odd bytes are left untouched. Unity volume is a no-op.
pub fn adjust_volume(pcm: &mut [u8], volume: f32) {
    if (volume - 1.0).abs() < f32::EPSILON {
        return;
    }
    let volume = volume.max(0.0);

    for sample in pcm.chunks_exact_mut(2) {
        let value = i16::from_le_bytes([sample[0], sample[1]]) as f32 * volume;
        let scaled = value.clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        sample.copy_from_slice(&scaled.to_le_bytes());
    }
}

/// Convert a 0-100 percentage to the scaling factor
pub fn volume_from_percent(percent: i32) -> f32 {
    percent as f32 / 100.0
}

/// Convert the scaling factor back to a rounded percentage
pub fn volume_to_percent(volume: f32) -> i32 {
    (volume * 100.0).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_half_volume() {
        let mut buf = pcm(&[1000, -1000, 0, 32767]);
        adjust_volume(&mut buf, 0.5);
        assert_eq!(buf, pcm(&[500, -500, 0, 16383]));
    }

    #[test]
    fn test_unity_volume_untouched() {
        let mut buf = pcm(&[123, -456]);
        let before = buf.clone();
        adjust_volume(&mut buf, 1.0);
        assert_eq!(buf, before);
    }

    #[test]
    fn test_mute() {
        let mut buf = pcm(&[i16::MAX, i16::MIN]);
        adjust_volume(&mut buf, 0.0);
        assert_eq!(buf, pcm(&[0, 0]));
    }

    #[test]
    fn test_odd_trailing_byte_ignored() {
        let mut buf = vec![0xE8, 0x03, 0x7F];
        adjust_volume(&mut buf, 0.5);
        assert_eq!(buf, vec![0xF4, 0x01, 0x7F]);
    }

    #[test]
    fn test_percent_conversion() {
        assert_eq!(volume_from_percent(75), 0.75);
        assert_eq!(volume_to_percent(0.75), 75);
    }

    proptest! {
        #[test]
        fn test_percent_roundtrip(percent in 0i32..=100) {
            prop_assert_eq!(volume_to_percent(volume_from_percent(percent)), percent);
        }

        #[test]
        fn test_scaling_never_amplifies(sample in any::<i16>(), volume in 0.0f32..1.0) {
            let mut buf = sample.to_le_bytes().to_vec();
            adjust_volume(&mut buf, volume);
            let scaled = i16::from_le_bytes([buf[0], buf[1]]);
            prop_assert!((scaled as i32).abs() <= (sample as i32).abs());
        }
    }
}
