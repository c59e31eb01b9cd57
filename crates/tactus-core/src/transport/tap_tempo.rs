//! Tap tempo averaging.

use std::time::{Duration, Instant};

const HISTORY: usize = 8;
/// A tap this far from the running average restarts the average.
const RESET_THRESHOLD_BPM: f64 = 20.0;
/// Taps further apart than this are treated as a new series.
const MAX_TAP_INTERVAL: Duration = Duration::from_millis(1000);

/// Running average of the last eight tapped tempos.
#[derive(Debug, Clone, Default)]
pub struct TapTempo {
    history: [f64; HISTORY],
    primed: bool,
    last_tap: Option<Instant>,
}

impl TapTempo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tap at `now`. Returns the averaged tempo once two taps
    /// less than a second apart have been seen.
    pub fn tap(&mut self, now: Instant) -> Option<f64> {
        let previous = self.last_tap.replace(now)?;
        let interval = now.checked_duration_since(previous)?;
        if interval >= MAX_TAP_INTERVAL {
            return None;
        }
        self.interval(interval.as_secs_f64() * 1000.0)
    }

    /// Feed one beat interval in milliseconds.
    pub fn interval(&mut self, interval_ms: f64) -> Option<f64> {
        if !(interval_ms.is_finite() && interval_ms > 0.0) {
            return None;
        }
        let bpm = 60_000.0 / interval_ms;

        if !self.primed || (self.history[0] - bpm).abs() > RESET_THRESHOLD_BPM {
            self.history = [bpm; HISTORY];
            self.primed = true;
        }

        let average = (bpm + self.history.iter().sum::<f64>()) / (HISTORY + 1) as f64;
        self.history.rotate_right(1);
        self.history[0] = average;
        Some(average)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
