//! Frame content for the demo window.

use presenter_core::Timer;
use presenter_engine::FrameRecorder;

/// Period of one brightness cycle, in seconds.
const PULSE_PERIOD_SECS: f32 = 4.0;

/// Clears every frame to the configured colour, slowly pulsing its
/// brightness so dropped or stalled frames are visible.
pub struct PulsingClear {
    base: [f32; 4],
    timer: Timer,
}

impl PulsingClear {
    pub fn new(base: [f32; 4]) -> Self {
        Self {
            base,
            timer: Timer::new(),
        }
    }
}

impl FrameRecorder for PulsingClear {
    fn clear_color(&mut self) -> [f32; 4] {
        pulse(self.base, self.timer.elapsed_secs())
    }
}

/// Scales the colour channels between 50% and 100% of `base`. Alpha is kept.
fn pulse(base: [f32; 4], secs: f32) -> [f32; 4] {
    let phase = secs / PULSE_PERIOD_SECS * std::f32::consts::TAU;
    let scale = 0.75 + 0.25 * phase.cos();
    [base[0] * scale, base[1] * scale, base[2] * scale, base[3]]
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: [f32; 4] = [0.4, 0.2, 0.8, 1.0];

    #[test]
    fn test_pulse_starts_at_full_brightness() {
        let color = pulse(BASE, 0.0);
        for (c, b) in color.iter().zip(BASE) {
            assert!((c - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_pulse_halves_at_half_period() {
        let color = pulse(BASE, PULSE_PERIOD_SECS / 2.0);
        assert!((color[0] - 0.2).abs() < 1e-5);
        assert!((color[2] - 0.4).abs() < 1e-5);
        assert_eq!(color[3], 1.0);
    }

    #[test]
    fn test_pulse_stays_in_range() {
        for i in 0..100 {
            let color = pulse([1.0; 4], i as f32 * 0.37);
            assert!(color.iter().all(|c| (0.0..=1.0).contains(c)));
        }
    }
}
