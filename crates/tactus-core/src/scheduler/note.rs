//! Scheduled notes and the frame-ordered note queue.

use crate::song::InstrumentId;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Where a scheduled note came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteSource {
    /// A pattern on the timeline, by pattern index.
    Pattern(usize),
    /// Keyboard/MIDI input.
    Live,
    Metronome,
}

/// A note ready for the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledNote {
    pub instrument: InstrumentId,
    pub source: NoteSource,
    /// Nominal position before timing offsets.
    pub onset_tick: u64,
    /// Frame at which the note starts sounding, after offsets.
    pub effective_frame: i64,
    pub velocity: f32,
    pub pan: f32,
    pub pitch: f32,
    /// Ticks, -1 until natural decay.
    pub length: i32,
    pub lead_lag: f32,
    /// Offset from the nominal frame of `onset_tick`: swing, humanize and
    /// lead/lag together.
    pub timing_offset_frames: f32,
    pub probability: f32,
    pub note_off: bool,
}

struct Entry {
    note: ScheduledNote,
    seq: u64,
}

impl Entry {
    #[inline]
    fn key(&self) -> (i64, u64) {
        (self.note.effective_frame, self.seq)
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed: BinaryHeap is a max-heap, we pop the earliest note first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

/// Min-heap of notes keyed by `(effective_frame, insertion order)`.
///
/// Notes are owned by value; popping hands ownership to the caller.
#[derive(Default)]
pub struct NoteQueue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl NoteQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
            next_seq: 0,
        }
    }

    pub fn push(&mut self, note: ScheduledNote) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { note, seq });
    }

    /// Pop the earliest note if it starts before `frame`.
    pub fn pop_before(&mut self, frame: i64) -> Option<ScheduledNote> {
        if self.heap.peek()?.note.effective_frame < frame {
            self.heap.pop().map(|e| e.note)
        } else {
            None
        }
    }

    pub fn peek(&self) -> Option<&ScheduledNote> {
        self.heap.peek().map(|e| &e.note)
    }

    /// Recompute frames in place and restore heap order. Insertion order
    /// still breaks ties.
    pub fn retime(&mut self, mut frame_of: impl FnMut(&ScheduledNote) -> i64) {
        let mut entries = std::mem::take(&mut self.heap).into_vec();
        for entry in &mut entries {
            entry.note.effective_frame = frame_of(&entry.note);
        }
        self.heap = BinaryHeap::from(entries);
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&ScheduledNote) -> bool) {
        self.heap.retain(|e| keep(&e.note));
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(frame: i64, instrument: u32) -> ScheduledNote {
        ScheduledNote {
            instrument: InstrumentId(instrument),
            source: NoteSource::Pattern(0),
            onset_tick: 0,
            effective_frame: frame,
            velocity: 1.0,
            pan: 0.0,
            pitch: 0.0,
            length: -1,
            lead_lag: 0.0,
            timing_offset_frames: 0.0,
            probability: 1.0,
            note_off: false,
        }
    }

    #[test]
    fn test_pops_in_frame_order() {
        let mut queue = NoteQueue::default();
        queue.push(note(300, 0));
        queue.push(note(100, 1));
        queue.push(note(200, 2));

        let order: Vec<_> = std::iter::from_fn(|| queue.pop_before(i64::MAX))
            .map(|n| n.effective_frame)
            .collect();
        assert_eq!(order, vec![100, 200, 300]);
    }

    #[test]
    fn test_equal_frames_pop_in_insertion_order() {
        let mut queue = NoteQueue::default();
        for instrument in 0..5 {
            queue.push(note(64, instrument));
        }
        let order: Vec<_> = std::iter::from_fn(|| queue.pop_before(65))
            .map(|n| n.instrument.0)
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_pop_before_is_exclusive() {
        let mut queue = NoteQueue::default();
        queue.push(note(512, 0));
        assert!(queue.pop_before(512).is_none());
        assert!(queue.pop_before(513).is_some());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_retime_reorders() {
        let mut queue = NoteQueue::default();
        for (frame, instrument) in [(100, 0), (200, 1), (300, 2)] {
            queue.push(note(frame, instrument));
        }
        queue.retime(|n| 1000 - n.effective_frame);
        let order: Vec<_> = std::iter::from_fn(|| queue.pop_before(i64::MAX))
            .map(|n| (n.instrument.0, n.effective_frame))
            .collect();
        assert_eq!(order, vec![(2, 700), (1, 800), (0, 900)]);
    }

    #[test]
    fn test_retain_drops_sources() {
        let mut queue = NoteQueue::default();
        queue.push(note(10, 0));
        let mut live = note(20, 1);
        live.source = NoteSource::Live;
        queue.push(live);

        queue.retain(|n| n.source == NoteSource::Live);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek().map(|n| n.source), Some(NoteSource::Live));
    }
}
