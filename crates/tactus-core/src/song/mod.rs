//! Song data consumed by the scheduler.
//!
//! The scheduler only reads a [`Song`]. Editing happens outside the audio
//! path: the engine swaps the whole song (or applies an edit closure) under
//! the engine lock.

pub mod timeline;

pub use timeline::{ColumnLocation, PatternTimeline};

use crate::transport::clock::{self, DEFAULT_RESOLUTION, MAX_RESOLUTION};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentId(pub u32);

impl InstrumentId {
    /// Reserved for metronome clicks.
    pub const METRONOME: InstrumentId = InstrumentId(u32::MAX);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SongMode {
    /// Loop the selected/queued patterns.
    #[default]
    Pattern,
    /// Play the pattern-group timeline from left to right.
    Song,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: InstrumentId,
    pub name: String,
    /// Scale of the random pitch deviation applied to each note.
    pub random_pitch_factor: f32,
}

impl Instrument {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id: InstrumentId(id),
            name: name.into(),
            random_pitch_factor: 0.0,
        }
    }
}

/// A note stored in a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternNote {
    pub instrument: InstrumentId,
    /// Pattern-local tick.
    pub position: u64,
    pub velocity: f32,
    /// -1.0 (left) to 1.0 (right).
    pub pan: f32,
    pub pitch: f32,
    /// Length in ticks, -1 plays until the sample decays.
    pub length: i32,
    /// -1.0 (early) to 1.0 (late), scaled by five ticks.
    pub lead_lag: f32,
    pub probability: f32,
    pub note_off: bool,
}

impl PatternNote {
    pub fn new(instrument: u32, position: u64) -> Self {
        Self {
            instrument: InstrumentId(instrument),
            position,
            ..Default::default()
        }
    }

    pub fn velocity(mut self, velocity: f32) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn lead_lag(mut self, lead_lag: f32) -> Self {
        self.lead_lag = lead_lag;
        self
    }

    pub fn probability(mut self, probability: f32) -> Self {
        self.probability = probability;
        self
    }

    pub fn note_off(mut self) -> Self {
        self.note_off = true;
        self
    }
}

impl Default for PatternNote {
    fn default() -> Self {
        Self {
            instrument: InstrumentId(0),
            position: 0,
            velocity: 0.8,
            pan: 0.0,
            pitch: 0.0,
            length: -1,
            lead_lag: 0.0,
            probability: 1.0,
            note_off: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub name: String,
    /// Length in ticks.
    pub length: u64,
    /// Sorted by position; equal positions keep insertion order.
    notes: Vec<PatternNote>,
    /// Patterns that always sound together with this one.
    #[serde(default)]
    pub virtual_patterns: Vec<usize>,
}

impl Pattern {
    pub fn new(name: impl Into<String>, length: u64) -> Self {
        Self {
            name: name.into(),
            length,
            notes: Vec::new(),
            virtual_patterns: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: PatternNote) -> Self {
        self.add_note(note);
        self
    }

    /// Insert after any notes already at the same position.
    pub fn add_note(&mut self, note: PatternNote) {
        let index = self.notes.partition_point(|n| n.position <= note.position);
        self.notes.insert(index, note);
    }

    /// Remove notes in `[start, end)`, optionally for one instrument only.
    /// Returns how many were removed.
    pub fn remove_notes(
        &mut self,
        start: u64,
        end: u64,
        instrument: Option<InstrumentId>,
    ) -> usize {
        let before = self.notes.len();
        self.notes.retain(|n| {
            let in_window = n.position >= start && n.position < end;
            let matches = instrument.map_or(true, |id| n.instrument == id);
            !(in_window && matches)
        });
        before - self.notes.len()
    }

    pub fn notes(&self) -> &[PatternNote] {
        &self.notes
    }

    /// Notes stored at exactly `position`, in insertion order.
    pub fn notes_at(&self, position: u64) -> &[PatternNote] {
        let start = self.notes.partition_point(|n| n.position < position);
        let end = self.notes.partition_point(|n| n.position <= position);
        &self.notes[start..end]
    }

    pub fn has_note_at(&self, position: u64, instrument: InstrumentId) -> bool {
        self.notes_at(position)
            .iter()
            .any(|n| n.instrument == instrument)
    }
}

/// Tempo change taking effect at the start of a column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoMarker {
    pub column: usize,
    pub bpm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Song {
    pub name: String,
    pub bpm: f64,
    /// Ticks per quarter note.
    pub resolution: u32,
    /// 0.0 to 1.0.
    pub swing_factor: f32,
    /// 0.0 to 1.0, scales timing jitter.
    pub humanize_time: f32,
    /// 0.0 to 1.0, scales velocity jitter.
    pub humanize_velocity: f32,
    pub loop_enabled: bool,
    pub mode: SongMode,
    pub patterns: Vec<Pattern>,
    /// Timeline columns, each a list of pattern indices played together.
    pub pattern_groups: Vec<Vec<usize>>,
    pub instruments: Vec<Instrument>,
    pub tempo_markers: Vec<TempoMarker>,
    /// Apply `tempo_markers` during song-mode playback.
    pub use_timeline_bpm: bool,
}

impl Default for Song {
    fn default() -> Self {
        Self {
            name: String::from("Untitled"),
            bpm: 120.0,
            resolution: DEFAULT_RESOLUTION,
            swing_factor: 0.0,
            humanize_time: 0.0,
            humanize_velocity: 0.0,
            loop_enabled: false,
            mode: SongMode::Pattern,
            patterns: Vec::new(),
            pattern_groups: Vec::new(),
            instruments: Vec::new(),
            tempo_markers: Vec::new(),
            use_timeline_bpm: false,
        }
    }
}

impl Song {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Append a pattern and return its index.
    pub fn add_pattern(&mut self, pattern: Pattern) -> usize {
        self.patterns.push(pattern);
        self.patterns.len() - 1
    }

    /// Append a timeline column and return its index.
    pub fn add_column(&mut self, patterns: impl IntoIterator<Item = usize>) -> usize {
        self.pattern_groups.push(patterns.into_iter().collect());
        self.pattern_groups.len() - 1
    }

    pub fn instrument(&self, id: InstrumentId) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.id == id)
    }

    /// Tempo of the last marker at or before `column`, or the song tempo.
    pub fn bpm_at_column(&self, column: usize) -> f64 {
        self.tempo_markers
            .iter()
            .filter(|m| m.column <= column)
            .max_by_key(|m| m.column)
            .map_or(self.bpm, |m| m.bpm)
    }

    /// Length of a column: its first pattern's length, or one bar if empty.
    pub fn column_length(&self, column: usize) -> Option<u64> {
        let group = self.pattern_groups.get(column)?;
        Some(
            group
                .first()
                .and_then(|&p| self.patterns.get(p))
                .map_or(clock::default_pattern_length(self.resolution), |p| {
                    p.length
                }),
        )
    }

    /// Append `index` and every pattern it virtually includes to `out`, skipping
    /// duplicates.
    pub fn collect_with_virtuals<A>(&self, index: usize, out: &mut smallvec::SmallVec<A>)
    where
        A: smallvec::Array<Item = usize>,
    {
        if out.contains(&index) {
            return;
        }
        out.push(index);
        if let Some(pattern) = self.patterns.get(index) {
            for &virt in &pattern.virtual_patterns {
                self.collect_with_virtuals(virt, out);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !clock::is_valid_bpm(self.bpm) {
            return Err(Error::InvalidTempo(self.bpm));
        }
        if self.resolution == 0 || self.resolution > MAX_RESOLUTION {
            return Err(Error::InvalidResolution(self.resolution));
        }
        let len = self.patterns.len();
        for (i, pattern) in self.patterns.iter().enumerate() {
            if pattern.length == 0 {
                return Err(Error::InvalidSong(format!(
                    "pattern {i} ('{}') has zero length",
                    pattern.name
                )));
            }
            if pattern.notes.windows(2).any(|w| w[0].position > w[1].position) {
                return Err(Error::InvalidSong(format!(
                    "pattern {i} ('{}') notes are not sorted by position",
                    pattern.name
                )));
            }
            if let Some(&index) = pattern.virtual_patterns.iter().find(|&&v| v >= len) {
                return Err(Error::PatternOutOfRange { index, len });
            }
        }
        for group in &self.pattern_groups {
            if let Some(&index) = group.iter().find(|&&p| p >= len) {
                return Err(Error::PatternOutOfRange { index, len });
            }
        }
        if let Some(marker) = self.tempo_markers.iter().find(|m| !clock::is_valid_bpm(m.bpm)) {
            return Err(Error::InvalidTempo(marker.bpm));
        }
        for value in [self.swing_factor, self.humanize_time, self.humanize_velocity] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidSong(format!(
                    "swing/humanize amount {value} out of range 0-1"
                )));
            }
        }
        Ok(())
    }
}
