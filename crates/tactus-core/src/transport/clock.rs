//! Tick/frame conversions.
//!
//! A tick is the smallest musical time unit (`1 / resolution` of a quarter
//! note). The tick size is the number of audio frames per tick at the current
//! tempo. Everything here is a pure function.

pub const MIN_BPM: f64 = 1.0;
pub const MAX_BPM: f64 = 999.0;

/// Ticks per quarter note used by new songs.
pub const DEFAULT_RESOLUTION: u32 = 48;
pub const MAX_RESOLUTION: u32 = 480;

/// Lead/lag of ±1.0 moves a note by this many ticks.
pub const LEAD_LAG_TICKS: f64 = 5.0;

pub const DEFAULT_MAX_HUMANIZE_FRAMES: u32 = 2000;

const FALLBACK_SAMPLE_RATE: f64 = 48_000.0;

/// Frames per tick: `sample_rate * 60 / bpm / resolution`.
///
/// A non-finite or sub-minimum tempo is clamped to [`MIN_BPM`], a zero
/// resolution is treated as one tick per quarter note, so the result is
/// always finite and positive.
#[inline]
pub fn tick_size(sample_rate: f64, bpm: f64, resolution: u32) -> f64 {
    let sample_rate = if sample_rate.is_finite() && sample_rate > 0.0 {
        sample_rate
    } else {
        FALLBACK_SAMPLE_RATE
    };
    let bpm = if bpm.is_finite() { bpm.max(MIN_BPM) } else { MIN_BPM };
    let resolution = resolution.max(1) as f64;
    sample_rate * 60.0 / bpm / resolution
}

/// Rounds up so cumulative rounding never makes the transport fall behind.
#[inline]
pub fn ticks_to_frames(ticks: f64, tick_size: f64) -> i64 {
    (ticks * tick_size).ceil() as i64
}

/// Rounds down. Negative frame counts map to tick 0.
#[inline]
pub fn frames_to_ticks(frames: i64, tick_size: f64) -> u64 {
    if frames <= 0 || tick_size <= 0.0 {
        return 0;
    }
    (frames as f64 / tick_size).floor() as u64
}

#[inline]
pub fn lead_lag_factor(tick_size: f64) -> f64 {
    tick_size * LEAD_LAG_TICKS
}

/// Frames the scheduler scans ahead of the playback position so that notes
/// with negative timing offsets are queued before their nominal frame.
#[inline]
pub fn lookahead_frames(tick_size: f64, max_humanize_frames: u32) -> i64 {
    lead_lag_factor(tick_size) as i64 + max_humanize_frames as i64 + 1
}

/// Whole ticks covered by the lookahead window.
#[inline]
pub fn lookahead_ticks(tick_size: f64, max_humanize_frames: u32) -> u64 {
    frames_to_ticks(lookahead_frames(tick_size, max_humanize_frames), tick_size)
}

/// Length of one bar of 4/4 at `resolution`. Used for empty columns.
#[inline]
pub fn default_pattern_length(resolution: u32) -> u64 {
    4 * resolution.max(1) as u64
}

#[inline]
pub fn is_valid_bpm(bpm: f64) -> bool {
    (MIN_BPM..=MAX_BPM).contains(&bpm)
}
