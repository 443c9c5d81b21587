//! Precision audio clock used to pace the send loop

use std::time::{Duration, Instant};

use voxbridge_core::MediaTime;

/// Raw PCM layout fed to the clock
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
}

impl PcmFormat {
    /// Interleaved s16le stereo at 48 kHz, the transcoder output format
    pub const STEREO_48K: PcmFormat = PcmFormat {
        sample_rate: 48_000,
        bits_per_sample: 16,
        channels: 2,
    };

    pub fn new(sample_rate: u32, bits_per_sample: u16, channels: u16) -> Self {
        PcmFormat {
            sample_rate,
            bits_per_sample,
            channels,
        }
    }

    /// Bytes in one sample frame (all channels)
    #[inline]
    pub fn frame_bytes(&self) -> u64 {
        (self.bits_per_sample as u64 / 8) * self.channels as u64
    }

    #[inline]
    pub fn bytes_per_second(&self) -> u64 {
        self.frame_bytes() * self.sample_rate as u64
    }

    /// Playback time represented by `bytes` of PCM
    pub fn duration_of(&self, bytes: u64) -> Duration {
        let bps = self.bytes_per_second();
        if bps == 0 {
            return Duration::ZERO;
        }
        let micros = (bytes as u128 * 1_000_000) / bps as u128;
        Duration::from_micros(micros as u64)
    }

    /// Bytes needed to hold `duration` of audio, rounded down to whole frames
    pub fn bytes_for(&self, duration: Duration) -> usize {
        let frames = duration.as_micros() * self.sample_rate as u128 / 1_000_000;
        (frames * self.frame_bytes() as u128) as usize
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::STEREO_48K
    }
}

/// Tracks buffered audio against consumed playback time
///
/// INVARIANT: buffered audio only grows through `push_bytes`; wall time only
/// ever drains it. A negative buffer length means the consumer has caught up
/// with everything that was pushed.
#[derive(Debug)]
pub struct AudioClock {
    format: PcmFormat,
    /// Total bytes pushed since the last reset
    pushed_bytes: u64,
    /// Start of the current running span
    running_since: Option<Instant>,
    /// Playback time accumulated by earlier running spans
    elapsed_before: Duration,
}

impl AudioClock {
    pub fn new(format: PcmFormat) -> Self {
        AudioClock {
            format,
            pushed_bytes: 0,
            running_since: None,
            elapsed_before: Duration::ZERO,
        }
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    /// Start (or resume) consuming playback time
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub fn start_at(&mut self, now: Instant) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    /// Freeze playback time; pushed bytes are kept
    pub fn stop(&mut self) {
        self.stop_at(Instant::now());
    }

    pub fn stop_at(&mut self, now: Instant) {
        if let Some(since) = self.running_since.take() {
            self.elapsed_before += now.saturating_duration_since(since);
        }
    }

    /// Forget all pushed audio and consumed time
    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    pub fn reset_at(&mut self, now: Instant) {
        self.pushed_bytes = 0;
        self.elapsed_before = Duration::ZERO;
        if self.running_since.is_some() {
            self.running_since = Some(now);
        }
    }

    /// Account for `bytes` of PCM handed to the encoder
    pub fn push_bytes(&mut self, bytes: usize) {
        self.pushed_bytes += bytes as u64;
    }

    pub fn pushed_bytes(&self) -> u64 {
        self.pushed_bytes
    }

    /// Audio time represented by everything pushed so far
    pub fn audio_time(&self) -> Duration {
        self.format.duration_of(self.pushed_bytes)
    }

    /// Playback time consumed so far
    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Instant::now())
    }

    pub fn elapsed_at(&self, now: Instant) -> Duration {
        let running = self
            .running_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or(Duration::ZERO);
        self.elapsed_before + running
    }

    /// Audio buffered ahead of playback; negative once playback overtook it
    pub fn buffer_length(&self) -> MediaTime {
        self.buffer_length_at(Instant::now())
    }

    pub fn buffer_length_at(&self, now: Instant) -> MediaTime {
        MediaTime::from_duration(self.audio_time()) - MediaTime::from_duration(self.elapsed_at(now))
    }
}

impl Default for AudioClock {
    fn default() -> Self {
        Self::new(PcmFormat::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_byte_math() {
        let f = PcmFormat::STEREO_48K;
        assert_eq!(f.frame_bytes(), 4);
        assert_eq!(f.bytes_per_second(), 192_000);
        assert_eq!(f.duration_of(3840), Duration::from_millis(20));
        assert_eq!(f.bytes_for(Duration::from_millis(20)), 3840);
    }

    #[test]
    fn test_buffer_driven_by_bytes() {
        let t0 = Instant::now();
        let mut clock = AudioClock::default();
        clock.start_at(t0);

        clock.push_bytes(3840);
        assert_eq!(clock.buffer_length_at(t0), MediaTime::from_millis(20));

        // 5ms of playback drains 5ms of buffer
        let t1 = t0 + Duration::from_millis(5);
        assert_eq!(clock.buffer_length_at(t1), MediaTime::from_millis(15));
    }

    #[test]
    fn test_buffer_goes_negative_when_starved() {
        let t0 = Instant::now();
        let mut clock = AudioClock::default();
        clock.start_at(t0);
        clock.push_bytes(1920);

        let later = t0 + Duration::from_millis(30);
        assert!(clock.buffer_length_at(later).is_negative());
    }

    #[test]
    fn test_stop_freezes_playback_time() {
        let t0 = Instant::now();
        let mut clock = AudioClock::default();
        clock.start_at(t0);
        clock.push_bytes(19_200);

        clock.stop_at(t0 + Duration::from_millis(40));
        let frozen = clock.buffer_length_at(t0 + Duration::from_secs(10));
        assert_eq!(frozen, MediaTime::from_millis(60));

        clock.start_at(t0 + Duration::from_secs(10));
        let resumed = clock.buffer_length_at(t0 + Duration::from_millis(10_010));
        assert_eq!(resumed, MediaTime::from_millis(50));
    }

    #[test]
    fn test_reset_clears_state() {
        let t0 = Instant::now();
        let mut clock = AudioClock::default();
        clock.start_at(t0);
        clock.push_bytes(192_000);

        let t1 = t0 + Duration::from_millis(500);
        clock.reset_at(t1);
        assert_eq!(clock.pushed_bytes(), 0);
        assert_eq!(clock.buffer_length_at(t1), MediaTime::ZERO);
        assert!(clock.is_running());
    }
}
