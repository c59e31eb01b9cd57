use crate::{AtomicFlag, AtomicFloat};

const ACCENT_VELOCITY: f32 = 1.0;
const BEAT_VELOCITY: f32 = 0.8;
const ACCENT_PITCH: f32 = 3.0;

/// One metronome click on a beat boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Click {
    pub accent: bool,
    pub velocity: f32,
    pub pitch: f32,
}

/// Metronome settings, shared lock-free between control threads and the scheduler.
#[derive(Debug)]
pub struct Metronome {
    enabled: AtomicFlag,
    volume: AtomicFloat,
}

impl Metronome {
    pub fn new() -> Self {
        Self {
            enabled: AtomicFlag::new(false),
            volume: AtomicFloat::new(0.5),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    /// Returns the new state.
    pub fn toggle(&self) -> bool {
        self.enabled.toggle()
    }

    pub fn volume(&self) -> f32 {
        self.volume.get()
    }

    pub fn set_volume(&self, volume: f32) {
        let volume = if volume.is_finite() { volume } else { 0.0 };
        self.volume.set(volume.clamp(0.0, 1.0));
    }

    /// Click for a pattern-local tick, if it falls on a beat.
    ///
    /// Beats are `resolution` ticks apart counted from the pattern start; the
    /// first beat of the pattern is accented.
    pub fn click_at(&self, pattern_tick: u64, resolution: u32) -> Option<Click> {
        if pattern_tick % resolution.max(1) as u64 != 0 {
            return None;
        }
        let accent = pattern_tick == 0;
        let velocity = if accent { ACCENT_VELOCITY } else { BEAT_VELOCITY };
        Some(Click {
            accent,
            velocity: velocity * self.volume(),
            pitch: if accent { ACCENT_PITCH } else { 0.0 },
        })
    }
}

impl Default for Metronome {
    fn default() -> Self {
        Self::new()
    }
}
