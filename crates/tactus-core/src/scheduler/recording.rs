//! Placement of live-recorded notes and destructive-record erase windows.

use serde::{Deserialize, Serialize};

/// Fraction of the pattern length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Span {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    SixtyFourth,
}

impl Span {
    pub fn ticks(self, pattern_length: u64) -> u64 {
        let divisor = match self {
            Span::Whole => 1,
            Span::Half => 2,
            Span::Quarter => 4,
            Span::Eighth => 8,
            Span::Sixteenth => 16,
            Span::ThirtySecond => 32,
            Span::SixtyFourth => 64,
        };
        pattern_length / divisor
    }
}

/// What to erase ahead of (and including) a recorded note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreDelete {
    /// The whole pattern, every instrument.
    WholePattern,
    /// `span` ticks from the recorded column, every instrument.
    AllInstruments(Span),
    /// `span` ticks from the recorded column for the recorded instrument,
    /// extended backwards by the [`PostDelete`] setting.
    Instrument(Span),
    /// Every note of the recorded instrument.
    InstrumentEverywhere,
}

impl PreDelete {
    /// Map a preference index (1-based, 0 = off) to a policy.
    pub fn from_index(index: u8) -> Option<Self> {
        use Span::*;
        let policy = match index {
            1 => PreDelete::WholePattern,
            2 => PreDelete::AllInstruments(Whole),
            3 => PreDelete::AllInstruments(Half),
            4 => PreDelete::AllInstruments(Quarter),
            5 => PreDelete::AllInstruments(Eighth),
            6 => PreDelete::AllInstruments(Sixteenth),
            7 => PreDelete::AllInstruments(ThirtySecond),
            8 => PreDelete::AllInstruments(SixtyFourth),
            9 => PreDelete::Instrument(SixtyFourth),
            10 => PreDelete::Instrument(ThirtySecond),
            11 => PreDelete::Instrument(Sixteenth),
            12 => PreDelete::Instrument(Eighth),
            13 => PreDelete::Instrument(Quarter),
            14 => PreDelete::Instrument(Half),
            15 => PreDelete::Instrument(Whole),
            16 => PreDelete::InstrumentEverywhere,
            _ => return None,
        };
        Some(policy)
    }
}

/// How far behind the recorded column to erase for [`PreDelete::Instrument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PostDelete {
    #[default]
    AtColumn,
    Back(Span),
}

impl PostDelete {
    pub fn from_index(index: u8) -> Self {
        use Span::*;
        match index {
            1 => PostDelete::Back(SixtyFourth),
            2 => PostDelete::Back(ThirtySecond),
            3 => PostDelete::Back(Sixteenth),
            4 => PostDelete::Back(Eighth),
            5 => PostDelete::Back(Quarter),
            6 => PostDelete::Back(Half),
            7 => PostDelete::Back(Whole),
            _ => PostDelete::AtColumn,
        }
    }
}

/// Pattern-local tick range `[start, end)` to erase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionWindow {
    pub start: u64,
    pub end: u64,
    /// `false`: only notes of the recorded instrument.
    pub all_instruments: bool,
}

impl DeletionWindow {
    pub fn contains(&self, position: u64) -> bool {
        position >= self.start && position < self.end
    }
}

/// Erase window for a note recorded at `column` in a pattern of `pattern_length` ticks.
pub fn deletion_window(
    pre: PreDelete,
    post: PostDelete,
    column: u64,
    pattern_length: u64,
) -> DeletionWindow {
    match pre {
        PreDelete::WholePattern => DeletionWindow {
            start: 0,
            end: column + pattern_length + 1,
            all_instruments: true,
        },
        PreDelete::AllInstruments(span) => DeletionWindow {
            start: column,
            end: column + span.ticks(pattern_length) + 1,
            all_instruments: true,
        },
        PreDelete::Instrument(span) => {
            let back = match post {
                PostDelete::AtColumn => 0,
                PostDelete::Back(back) => back.ticks(pattern_length),
            };
            DeletionWindow {
                start: column.saturating_sub(back),
                end: column + span.ticks(pattern_length) + 1,
                all_instruments: false,
            }
        }
        PreDelete::InstrumentEverywhere => DeletionWindow {
            start: 0,
            end: pattern_length.max(column + 1),
            all_instruments: false,
        },
    }
}

/// Live-recording preferences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordSettings {
    /// Write played notes into the pattern.
    pub record: bool,
    pub quantize: bool,
    /// Editor grid: 4 = quarters, 8 = eighths, 16 = sixteenths, ...
    pub grid_resolution: u32,
    pub triplets: bool,
    /// `None` disables destructive recording.
    pub pre_delete: Option<PreDelete>,
    pub post_delete: PostDelete,
    /// Sound recorded notes that are not in the future.
    pub hear_new_notes: bool,
}

impl Default for RecordSettings {
    fn default() -> Self {
        Self {
            record: true,
            quantize: false,
            grid_resolution: 16,
            triplets: false,
            pre_delete: None,
            post_delete: PostDelete::AtColumn,
            hear_new_notes: true,
        }
    }
}

impl RecordSettings {
    /// Grid step in ticks at `resolution` ticks per quarter note.
    pub fn grid_ticks(&self, resolution: u32) -> u64 {
        let base = if self.triplets { 3 } else { 4 };
        let divisor = self.grid_resolution.max(1) as u64 * base;
        (16 * resolution as u64 / divisor).max(1)
    }

    /// Snap `column` to the grid. A note snapped onto the pattern end wraps to 0.
    pub fn quantize_column(&self, column: u64, resolution: u32, pattern_length: u64) -> u64 {
        if !self.quantize {
            return column;
        }
        let step = self.grid_ticks(resolution);
        let snapped = ((column as f64 / step as f64).round() as u64) * step;
        if snapped >= pattern_length {
            0
        } else {
            snapped
        }
    }
}
