//! Monotonic timer for animation and periodic reporting.

use std::time::{Duration, Instant};

/// Measures time since creation and in laps.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
    lap_start: Instant,
}

impl Timer {
    /// Starts a timer now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            lap_start: now,
        }
    }

    /// Time since creation or the last [`reset`](Self::reset).
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// [`elapsed`](Self::elapsed) in seconds.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Ends the current lap and returns its length.
    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let lap = now - self.lap_start;
        self.lap_start = now;
        lap
    }

    /// Ends the current lap only if it has lasted at least `period`.
    pub fn lap_every(&mut self, period: Duration) -> Option<Duration> {
        (self.lap_start.elapsed() >= period).then(|| self.lap())
    }

    /// Restarts both the total and the lap.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lap_restarts() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(2));
        let first = timer.lap();
        assert!(first >= Duration::from_millis(2));
        assert!(timer.elapsed() >= first);
    }

    #[test]
    fn test_lap_every_waits_for_period() {
        let mut timer = Timer::new();
        assert_eq!(timer.lap_every(Duration::from_secs(3600)), None);

        std::thread::sleep(Duration::from_millis(5));
        let lap = timer.lap_every(Duration::from_millis(5));
        assert!(lap.is_some_and(|d| d >= Duration::from_millis(5)));
        assert_eq!(timer.lap_every(Duration::from_millis(500)), None);
    }

    #[test]
    fn test_reset_restarts_elapsed() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(50));
        let before = timer.elapsed();
        timer.reset();
        assert!(timer.elapsed() < before);
    }
}
