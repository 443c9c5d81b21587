//! Stall governor
//!
//! "No whisper targets" errors are expected while the target set is empty
//! or racing an update. Once one arrives, the governor marks the stream as
//! stalled and counts suppressed reads; after enough quiet windows without
//! a new trigger it lifts the stall so a fresh send can prove recovery.

/// Two-phase hysteresis: suppress on trigger, clear after N quiet windows
#[derive(Clone, Debug)]
pub struct StallGovernor {
    /// Reads per quiet window
    interval: u32,
    /// Quiet windows needed before the stall lifts
    max_windows: u32,
    stalled: bool,
    reads: u32,
    quiet_windows: u32,
}

impl StallGovernor {
    pub fn new(interval: u32, max_windows: u32) -> Self {
        StallGovernor {
            interval: interval.max(1),
            max_windows: max_windows.max(1),
            stalled: false,
            reads: 0,
            quiet_windows: 0,
        }
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// A no-targets error arrived; restart the quiet-window count
    pub fn trigger(&mut self) {
        self.stalled = true;
        self.reads = 0;
        self.quiet_windows = 0;
    }

    /// Account for one read while stalled
    ///
    /// Returns `true` exactly when this read lifted the stall.
    pub fn on_read(&mut self) -> bool {
        if !self.stalled {
            return false;
        }

        self.reads += 1;
        if self.reads % self.interval == 0 {
            self.quiet_windows += 1;
        }
        if self.quiet_windows >= self.max_windows {
            self.reset();
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.stalled = false;
        self.reads = 0;
        self.quiet_windows = 0;
    }
}

impl Default for StallGovernor {
    fn default() -> Self {
        Self::new(50, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_governor_never_clears() {
        let mut gov = StallGovernor::default();
        for _ in 0..1000 {
            assert!(!gov.on_read());
        }
        assert!(!gov.is_stalled());
    }

    #[test]
    fn test_clears_after_exact_window_count() {
        let mut gov = StallGovernor::new(50, 2);
        gov.trigger();

        for _ in 0..99 {
            assert!(!gov.on_read());
        }
        assert!(gov.is_stalled());

        assert!(gov.on_read());
        assert!(!gov.is_stalled());
    }

    #[test]
    fn test_one_short_stays_stalled() {
        let mut gov = StallGovernor::new(10, 3);
        gov.trigger();
        for _ in 0..29 {
            gov.on_read();
        }
        assert!(gov.is_stalled());
    }

    #[test]
    fn test_retrigger_restarts_count() {
        let mut gov = StallGovernor::new(50, 2);
        gov.trigger();
        for _ in 0..90 {
            gov.on_read();
        }
        gov.trigger();
        for _ in 0..99 {
            assert!(!gov.on_read());
        }
        assert!(gov.on_read());
    }
}
