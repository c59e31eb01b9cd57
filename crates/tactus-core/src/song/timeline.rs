//! Pattern-group timeline: maps song ticks to columns and back.

use super::Song;

/// Where a tick falls on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLocation {
    pub column: usize,
    /// Absolute tick at which this pass through the column started,
    /// including whole loops already played.
    pub start_tick: u64,
    /// Tick relative to `start_tick`.
    pub local_tick: u64,
}

/// Prefix sums of column lengths, rebuilt whenever the song changes.
///
/// A column's length is the length of its *first* pattern, not the longest.
/// Longer patterns in the same column are cut off at the column boundary.
/// Empty columns last one bar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternTimeline {
    /// `starts[i]` is the first tick of column `i`; the last entry is the song length.
    starts: Vec<u64>,
}

impl PatternTimeline {
    pub fn new(song: &Song) -> Self {
        Self::from_lengths((0..song.pattern_groups.len()).filter_map(|c| song.column_length(c)))
    }

    pub fn from_lengths(lengths: impl IntoIterator<Item = u64>) -> Self {
        let mut starts = vec![0];
        let mut total = 0u64;
        for length in lengths {
            total += length;
            starts.push(total);
        }
        Self { starts }
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        self.starts.len().saturating_sub(1)
    }

    #[inline]
    pub fn song_length(&self) -> u64 {
        self.starts.last().copied().unwrap_or(0)
    }

    pub fn column_length(&self, column: usize) -> Option<u64> {
        Some(self.starts.get(column + 1)? - self.starts[column])
    }

    /// Find the column playing at `tick`.
    ///
    /// Past the end of the song the tick wraps when `loop_enabled`; otherwise
    /// the song is over and `None` is returned.
    pub fn locate(&self, tick: u64, loop_enabled: bool) -> Option<ColumnLocation> {
        let total = self.song_length();
        if total == 0 {
            return None;
        }
        let (wrapped, loop_base) = if tick < total {
            (tick, 0)
        } else if loop_enabled {
            let wrapped = tick % total;
            (wrapped, tick - wrapped)
        } else {
            return None;
        };

        // First column whose end lies beyond the tick.
        let column = self.starts[1..].partition_point(|&end| end <= wrapped);
        let column_start = self.starts[column];
        Some(ColumnLocation {
            column,
            start_tick: loop_base + column_start,
            local_tick: wrapped - column_start,
        })
    }

    /// First tick of `column`. Out-of-range columns wrap when looping.
    pub fn column_start_tick(&self, column: usize, loop_enabled: bool) -> Option<u64> {
        let count = self.column_count();
        if count == 0 {
            return None;
        }
        let column = if column < count {
            column
        } else if loop_enabled {
            column % count
        } else {
            return None;
        };
        Some(self.starts[column])
    }
}
