//! Which patterns are sounding and which are queued.

use crate::song::Song;
use smallvec::SmallVec;

pub type PatternSet = SmallVec<[usize; 8]>;

/// Playing and queued patterns, plus the selection focus.
///
/// In song mode the playing set is rebuilt from the timeline at every column
/// change. In pattern mode it only changes at a pattern boundary, by applying
/// the queued `next` patterns, or follows the selected pattern when
/// `plays_selected` is set.
#[derive(Debug, Clone)]
pub struct PatternSelection {
    playing: PatternSet,
    next: PatternSet,
    /// `true`: queued patterns toggle in/out of the playing set.
    /// `false`: queued patterns replace the playing set.
    append_mode: bool,
    selected: Option<usize>,
    plays_selected: bool,
    /// Current timeline column, `None` until the scheduler locates one.
    song_pos: Option<usize>,
    /// Absolute tick at which the current pattern pass started.
    pattern_start_tick: Option<u64>,
}

impl Default for PatternSelection {
    fn default() -> Self {
        Self {
            playing: PatternSet::new(),
            next: PatternSet::new(),
            append_mode: true,
            selected: None,
            plays_selected: false,
            song_pos: None,
            pattern_start_tick: None,
        }
    }
}

impl PatternSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn playing(&self) -> &[usize] {
        &self.playing
    }

    pub fn next(&self) -> &[usize] {
        &self.next
    }

    pub fn append_mode(&self) -> bool {
        self.append_mode
    }

    pub fn set_append_mode(&mut self, append: bool) {
        self.append_mode = append;
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn set_selected(&mut self, index: Option<usize>) {
        self.selected = index;
    }

    pub fn plays_selected(&self) -> bool {
        self.plays_selected
    }

    /// Returns the new value.
    pub fn toggle_plays_selected(&mut self) -> bool {
        self.plays_selected = !self.plays_selected;
        self.plays_selected
    }

    pub fn song_pos(&self) -> Option<usize> {
        self.song_pos
    }

    pub(crate) fn set_song_pos(&mut self, column: Option<usize>) {
        self.song_pos = column;
    }

    pub fn pattern_start_tick(&self) -> Option<u64> {
        self.pattern_start_tick
    }

    pub(crate) fn set_pattern_start_tick(&mut self, tick: Option<u64>) {
        self.pattern_start_tick = tick;
    }

    /// Toggle `index` in the queued set.
    pub fn set_next_pattern(&mut self, index: usize) {
        toggle(&mut self.next, index);
    }

    /// Queue a change so that only `index` plays after the next boundary.
    pub fn set_only_next_pattern(&mut self, index: usize) {
        self.next.clear();
        if self.append_mode {
            // Toggle out everything else, toggle `index` in unless it already plays.
            self.next
                .extend(self.playing.iter().copied().filter(|&p| p != index));
            if !self.playing.contains(&index) {
                self.next.push(index);
            }
        } else {
            self.next.push(index);
        }
    }

    pub fn clear_next(&mut self) {
        self.next.clear();
    }

    /// Forget the playing set and position, e.g. after a song swap.
    pub(crate) fn reset(&mut self) {
        self.playing.clear();
        self.next.clear();
        self.song_pos = None;
        self.pattern_start_tick = None;
    }

    /// Replace the playing set with `patterns` and their virtual patterns.
    pub(crate) fn replace_playing(&mut self, song: &Song, patterns: &[usize]) {
        self.playing.clear();
        for &p in patterns {
            song.collect_with_virtuals(p, &mut self.playing);
        }
    }

    /// Apply queued patterns to the playing set. Returns `true` if any were queued.
    pub(crate) fn apply_next(&mut self, song: &Song) -> bool {
        if self.next.is_empty() {
            return false;
        }
        let next = std::mem::take(&mut self.next);
        if self.append_mode {
            let mut merged: PatternSet = self.playing.clone();
            for &p in &next {
                toggle(&mut merged, p);
            }
            self.replace_playing(song, &merged);
        } else {
            self.replace_playing(song, &next);
        }
        true
    }
}

fn toggle(set: &mut PatternSet, index: usize) {
    if let Some(pos) = set.iter().position(|&p| p == index) {
        set.remove(pos);
    } else {
        set.push(index);
    }
}
