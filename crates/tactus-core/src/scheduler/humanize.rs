//! Timing offsets: swing, humanize and lead/lag.
//!
//! Swing and lead/lag are deterministic. Humanize and probability gating
//! draw from a seeded [`StdRng`] so that a fixed seed reproduces a render
//! exactly.

use crate::transport::clock::lead_lag_factor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Standard deviation of timing jitter, in units of `max_humanize_frames`.
const TIME_SIGMA: f32 = 0.3;
const VELOCITY_SIGMA: f32 = 0.2;
const PITCH_SIGMA: f32 = 0.4;

/// Swing delay for a pattern-local tick.
///
/// Applies to the off-beat sixteenth of every eighth note
/// (`tick % (res/4) == 0 && tick % (res/2) != 0`) and delays it by up to
/// a thirty-second note.
pub fn swing_offset(local_tick: u64, resolution: u32, tick_size: f64, swing_factor: f32) -> f64 {
    let sixteenth = (resolution / 4) as u64;
    let eighth = (resolution / 2) as u64;
    if sixteenth == 0 || eighth == 0 || swing_factor <= 0.0 {
        return 0.0;
    }
    if local_tick % sixteenth == 0 && local_tick % eighth != 0 {
        (resolution / 8) as f64 * tick_size * swing_factor.min(1.0) as f64
    } else {
        0.0
    }
}

/// Lead/lag offset, `lead_lag` clamped to ±1.
pub fn lead_lag_offset(lead_lag: f32, tick_size: f64) -> f64 {
    let lead_lag = if lead_lag.is_finite() { lead_lag.clamp(-1.0, 1.0) } else { 0.0 };
    lead_lag as f64 * lead_lag_factor(tick_size)
}

/// Seeded random source for humanization.
pub struct Humanizer {
    rng: StdRng,
    seed: u64,
}

impl Humanizer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform in `[0, 1)`.
    #[inline]
    pub fn uniform(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }

    /// Probability gate: `true` when the note should sound this pass.
    #[inline]
    pub fn passes(&mut self, probability: f32) -> bool {
        self.uniform() < probability
    }

    /// Normal sample with mean 0 and standard deviation `sigma`
    /// (Marsaglia polar method).
    pub fn gaussian(&mut self, sigma: f32) -> f32 {
        loop {
            let x1 = 2.0 * self.uniform() - 1.0;
            let x2 = 2.0 * self.uniform() - 1.0;
            let w = x1 * x1 + x2 * x2;
            if w > 0.0 && w < 1.0 {
                let scale = ((-2.0 * w.ln()) / w).sqrt();
                return x1 * scale * sigma;
            }
        }
    }

    /// Timing jitter in frames, capped at `±max_frames`.
    pub fn time_offset(&mut self, humanize_time: f32, max_frames: u32) -> f64 {
        if humanize_time <= 0.0 || max_frames == 0 {
            return 0.0;
        }
        let max = max_frames as f64;
        let offset = self.gaussian(TIME_SIGMA) as f64 * humanize_time as f64 * max;
        offset.clamp(-max, max)
    }

    /// Velocity after jitter, kept in `[0, 1]`.
    pub fn velocity(&mut self, velocity: f32, humanize_velocity: f32) -> f32 {
        if humanize_velocity <= 0.0 {
            return velocity;
        }
        (velocity + self.gaussian(VELOCITY_SIGMA) * humanize_velocity).clamp(0.0, 1.0)
    }

    /// Pitch after the instrument's random deviation.
    pub fn pitch(&mut self, pitch: f32, random_pitch_factor: f32) -> f32 {
        if random_pitch_factor <= 0.0 {
            return pitch;
        }
        pitch + self.gaussian(PITCH_SIGMA) * random_pitch_factor
    }
}
