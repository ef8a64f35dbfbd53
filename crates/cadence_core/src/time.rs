//! Frame clock
//!
//! Time is whatever the pacer reports: a millisecond timestamp per frame.

use std::time::Duration;

/// Frame rate used when settings do not say otherwise.
pub const DEFAULT_FRAME_RATE_HZ: u32 = 60;

/// Period of one frame at `hz` frames per second. A zero rate is treated as 1 Hz.
pub fn frame_interval(hz: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / u64::from(hz.max(1)))
}

/// Frame counter and timestamps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameClock {
    cycle: u64,
    elapsed_ms: f64,
    delta_ms: f64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames started so far. Zero until the first frame.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Timestamp of the current frame in milliseconds.
    pub fn elapsed(&self) -> f64 {
        self.elapsed_ms
    }

    /// Milliseconds since the previous frame; zero on the first frame.
    pub fn delta(&self) -> f64 {
        self.delta_ms
    }

    pub fn advance(&mut self, now_ms: f64) {
        self.delta_ms = if self.cycle == 0 {
            0.0
        } else {
            (now_ms - self.elapsed_ms).max(0.0)
        };
        self.elapsed_ms = now_ms;
        self.cycle += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_has_no_delta() {
        let mut clock = FrameClock::new();
        clock.advance(100.0);
        assert_eq!(clock.cycle(), 1);
        assert_eq!(clock.delta(), 0.0);

        clock.advance(116.0);
        assert_eq!(clock.cycle(), 2);
        assert_eq!(clock.elapsed(), 116.0);
        assert_eq!(clock.delta(), 16.0);
    }

    #[test]
    fn interval_matches_rate() {
        assert_eq!(frame_interval(50), Duration::from_millis(20));
        assert_eq!(frame_interval(0), Duration::from_secs(1));
    }
}
