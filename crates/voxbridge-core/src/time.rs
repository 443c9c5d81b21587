//! Time primitives for audio pacing
//!
//! Audio buffering is tracked as a signed offset: the clock may run ahead of
//! the bytes fed to it, in which case the buffer length goes negative.

use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::time::Duration;

/// Signed media time in microseconds
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MediaTime(pub i64);

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime(0);
    pub const MAX: MediaTime = MediaTime(i64::MAX);
    pub const MIN: MediaTime = MediaTime(i64::MIN);

    #[inline]
    pub fn from_micros(micros: i64) -> Self {
        MediaTime(micros)
    }

    #[inline]
    pub fn from_millis(millis: i64) -> Self {
        MediaTime(millis * 1000)
    }

    #[inline]
    pub fn from_secs_f64(secs: f64) -> Self {
        MediaTime((secs * 1_000_000.0) as i64)
    }

    #[inline]
    pub fn from_duration(duration: Duration) -> Self {
        MediaTime(duration.as_micros().min(i64::MAX as u128) as i64)
    }

    #[inline]
    pub fn as_micros(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn as_millis(self) -> i64 {
        self.0 / 1000
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Convert to an unsigned duration, clamping negative values to zero
    #[inline]
    pub fn to_duration(self) -> Duration {
        Duration::from_micros(self.0.max(0) as u64)
    }

    #[inline]
    pub fn saturating_add(self, duration: Duration) -> Self {
        MediaTime(self.0.saturating_add(Self::from_duration(duration).0))
    }

    #[inline]
    pub fn saturating_sub(self, duration: Duration) -> Self {
        MediaTime(self.0.saturating_sub(Self::from_duration(duration).0))
    }
}

impl Add<Duration> for MediaTime {
    type Output = MediaTime;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl Sub<Duration> for MediaTime {
    type Output = MediaTime;

    #[inline]
    fn sub(self, rhs: Duration) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl Sub for MediaTime {
    type Output = MediaTime;

    #[inline]
    fn sub(self, rhs: MediaTime) -> Self::Output {
        MediaTime(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for MediaTime {
    type Output = MediaTime;

    #[inline]
    fn neg(self) -> Self::Output {
        MediaTime(self.0.saturating_neg())
    }
}

impl fmt::Debug for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MediaTime({}us)", self.0)
    }
}

/// Formats as `hh:mm:ss`, the form the transcoder accepts for `-ss`
pub struct Timestamp(pub Duration);

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0.as_secs();
        write!(
            f,
            "{:02}:{:02}:{:02}",
            total / 3600,
            (total / 60) % 60,
            total % 60
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_time_signed_arithmetic() {
        let t = MediaTime::from_millis(10) - Duration::from_millis(25);
        assert!(t.is_negative());
        assert_eq!(t.as_millis(), -15);
        assert_eq!(t.to_duration(), Duration::ZERO);
    }

    #[test]
    fn test_media_time_ordering() {
        assert!(MediaTime::from_millis(-1) < MediaTime::ZERO);
        assert!(MediaTime::from_millis(20) > MediaTime::from_micros(19_999));
    }

    #[test]
    fn test_timestamp_format() {
        let ts = Timestamp(Duration::from_secs(3 * 3600 + 25 * 60 + 7));
        assert_eq!(ts.to_string(), "03:25:07");
        assert_eq!(Timestamp(Duration::from_millis(999)).to_string(), "00:00:00");
    }
}
