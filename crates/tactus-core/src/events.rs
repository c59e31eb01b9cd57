//! Engine notifications for GUI and automation layers.
//!
//! Delivery is best-effort: events are pushed with `try_send` into a bounded
//! channel after the engine lock is released, and dropped when the channel
//! is full.

use crate::compat::{AtomicU64, Ordering};
use crate::song::InstrumentId;
use crate::transport::EngineState;
use crossbeam_channel::{bounded, Receiver, Sender};
use smallvec::SmallVec;

/// A note the recorder wants written into a pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedNote {
    pub pattern: usize,
    pub column: u64,
    pub instrument: InstrumentId,
    pub velocity: f32,
    pub pan: f32,
    pub pitch: f32,
    pub length: i32,
    pub note_off: bool,
    /// The pattern already holds a note of this instrument at `column`.
    pub replaces_existing: bool,
}

/// Notes destructive recording wants removed from a pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErasedNotes {
    pub pattern: usize,
    pub start: u64,
    pub end: u64,
    /// `None` erases every instrument.
    pub instrument: Option<InstrumentId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    StateChanged(EngineState),
    PlaybackStateChanged { rolling: bool },
    /// `column` is the timeline column in song mode, `None` in pattern mode.
    PatternChanged { column: Option<usize> },
    /// The transport jumped (relocate, external sync).
    TickPositionChanged { tick: u64 },
    EndOfSong,
    TempoChanged { bpm: f64 },
    Metronome { accent: bool },
    NoteRecorded(RecordedNote),
    NotesErased(ErasedNotes),
}

/// Receiving end of the engine event queue.
pub type EventReceiver = Receiver<EngineEvent>;

/// Events gathered while the engine lock is held.
pub(crate) type PendingEvents = SmallVec<[EngineEvent; 16]>;

pub(crate) struct EventQueue {
    tx: Sender<EngineEvent>,
    rx: Receiver<EngineEvent>,
    dropped: AtomicU64,
}

impl EventQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            tx,
            rx,
            dropped: AtomicU64::new(0),
        }
    }

    pub(crate) fn publish(&self, events: PendingEvents) {
        for event in events {
            if self.tx.try_send(event).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub(crate) fn receiver(&self) -> Receiver<EngineEvent> {
        self.rx.clone()
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
