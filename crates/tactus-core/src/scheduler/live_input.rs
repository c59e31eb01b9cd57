//! Keyboard/MIDI note input.
//!
//! Producers push through a bounded lock-free channel and never touch the
//! engine lock. The scheduler moves entries into its own FIFO and releases
//! them once the scan reaches their target tick.

use crate::compat::VecDeque;
use crate::song::InstrumentId;
use crate::{Error, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// A note played live.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveNote {
    pub instrument: InstrumentId,
    pub velocity: f32,
    pub pan: f32,
    pub pitch: f32,
    pub length: i32,
    pub note_off: bool,
}

impl LiveNote {
    pub fn new(instrument: u32, velocity: f32) -> Self {
        Self {
            instrument: InstrumentId(instrument),
            velocity,
            pan: 0.0,
            pitch: 0.0,
            length: -1,
            note_off: false,
        }
    }

    pub fn off(instrument: u32) -> Self {
        Self {
            note_off: true,
            ..Self::new(instrument, 0.0)
        }
    }
}

/// A queued live note and the tick it targets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveEntry {
    pub note: LiveNote,
    pub tick: u64,
    /// Transport epoch the tick was measured in. Entries from an older epoch
    /// (before a start, stop or relocate) are due immediately.
    pub epoch: u64,
}

/// Cloneable producer handle. Safe to use from any thread.
#[derive(Clone)]
pub struct LiveInputSender {
    tx: Sender<LiveEntry>,
}

impl LiveInputSender {
    pub fn push(&self, entry: LiveEntry) -> Result<()> {
        self.tx.try_send(entry).map_err(|e| match e {
            TrySendError::Full(_) | TrySendError::Disconnected(_) => Error::LiveQueueFull,
        })
    }
}

/// Consumer side, owned by the scheduler.
pub struct LiveInputQueue {
    rx: Receiver<LiveEntry>,
    pending: VecDeque<LiveEntry>,
}

impl LiveInputQueue {
    pub fn new(capacity: usize) -> (LiveInputSender, Self) {
        let (tx, rx) = bounded(capacity);
        let queue = Self {
            rx,
            pending: VecDeque::with_capacity(capacity),
        };
        (LiveInputSender { tx }, queue)
    }

    /// Pop the next entry due at or before `tick`, in arrival order.
    ///
    /// An entry with a later tick blocks the ones behind it.
    pub fn pop_due(&mut self, tick: u64, epoch: u64) -> Option<LiveEntry> {
        self.pending.extend(self.rx.try_iter());
        let front = self.pending.front()?;
        if front.epoch != epoch || front.tick <= tick {
            self.pending.pop_front()
        } else {
            None
        }
    }

    /// Drop everything pending, including entries still in the channel.
    pub fn clear(&mut self) {
        self.pending.clear();
        for _ in self.rx.try_iter() {}
    }

    pub fn pending(&self) -> usize {
        self.pending.len() + self.rx.len()
    }
}
