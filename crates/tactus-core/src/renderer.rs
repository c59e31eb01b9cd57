//! Renderer intake.
//!
//! The engine does not synthesise audio. Scheduled notes are handed to a
//! [`NoteRenderer`] together with their frame offset into the current buffer,
//! and the renderer writes the buffer afterwards.

use crate::compat::{Arc, Mutex};
use crate::scheduler::ScheduledNote;

pub trait NoteRenderer: Send {
    /// Accept a note starting `frame_offset` frames into the current buffer.
    /// Called with the engine lock held; must not block.
    fn submit(&mut self, note: ScheduledNote, frame_offset: usize);

    /// Render the current buffer. Both slices are zeroed beforehand.
    fn render(&mut self, _left: &mut [f32], _right: &mut [f32]) {}

    /// Silence every sounding voice.
    fn stop_all(&mut self) {}
}

/// Renderer that discards everything.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl NoteRenderer for NullRenderer {
    fn submit(&mut self, _note: ScheduledNote, _frame_offset: usize) {}
}

/// A note as seen by the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoggedNote {
    pub note: ScheduledNote,
    /// Frame counted from the first rendered buffer.
    pub frame: u64,
    pub frame_offset: usize,
}

/// Renderer that records every submitted note and writes a one-sample
/// impulse of the note's velocity at its offset. Used by tests and offline
/// inspection.
#[derive(Debug, Clone, Default)]
pub struct NoteLog {
    notes: Arc<Mutex<Vec<LoggedNote>>>,
    pending: Vec<(usize, f32)>,
    rendered_frames: u64,
    stop_calls: Arc<Mutex<usize>>,
}

impl NoteLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the recorded notes.
    pub fn notes(&self) -> Arc<Mutex<Vec<LoggedNote>>> {
        Arc::clone(&self.notes)
    }

    pub fn stop_calls(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.stop_calls)
    }
}

impl NoteRenderer for NoteLog {
    fn submit(&mut self, note: ScheduledNote, frame_offset: usize) {
        self.notes.lock().push(LoggedNote {
            note,
            frame: self.rendered_frames + frame_offset as u64,
            frame_offset,
        });
        if !note.note_off {
            self.pending.push((frame_offset, note.velocity));
        }
    }

    fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (offset, velocity) in self.pending.drain(..) {
            if let (Some(l), Some(r)) = (left.get_mut(offset), right.get_mut(offset)) {
                *l += velocity;
                *r += velocity;
            }
        }
        self.rendered_frames += left.len() as u64;
    }

    fn stop_all(&mut self) {
        self.pending.clear();
        *self.stop_calls.lock() += 1;
    }
}
