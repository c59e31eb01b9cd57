//! Following an external transport clock.
//!
//! An [`ExternalClock`] is polled once per callback. Depending on the
//! [`SyncSource`] the engine follows its rolling state and position, and (for a
//! timebase master) its tempo. While a timebase master is authoritative, local
//! tempo changes are rejected.

use super::clock;
use crate::compat::{AtomicI64, AtomicU8, Ordering};
use crate::AtomicDouble;

/// A reading from an external transport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExternalPosition {
    pub frame: i64,
    pub bpm: f64,
    pub rolling: bool,
}

/// External transport master (e.g. a JACK-style server or network sync peer).
pub trait ExternalClock: Send {
    /// Called from the audio thread with the engine lock held. Must not block.
    fn query(&mut self) -> ExternalPosition;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SyncSource {
    /// Transport runs on its own clock.
    #[default]
    Internal = 0,
    /// Follow external rolling state and position, keep local tempo.
    Transport = 1,
    /// Follow position and tempo; local tempo changes are rejected.
    Timebase = 2,
}

impl SyncSource {
    fn from_u8(val: u8) -> Self {
        match val {
            1 => SyncSource::Transport,
            2 => SyncSource::Timebase,
            _ => SyncSource::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SyncStatus {
    #[default]
    Unlocked = 0,
    /// Last reading was valid and applied.
    Locked = 1,
    /// Last reading was malformed; previous transport state retained.
    Drifting = 2,
}

impl SyncStatus {
    fn from_u8(val: u8) -> Self {
        match val {
            1 => SyncStatus::Locked,
            2 => SyncStatus::Drifting,
            _ => SyncStatus::Unlocked,
        }
    }
}

/// Kinds of malformed clock data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClockAnomaly {
    NegativeFrame = 1 << 0,
    NonFiniteBpm = 1 << 1,
    BpmOutOfRange = 1 << 2,
}

/// Sync state readable without the engine lock.
#[derive(Debug)]
pub struct SyncState {
    source: AtomicU8,
    status: AtomicU8,
    external_frame: AtomicI64,
    external_bpm: AtomicDouble,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncState {
    pub fn new() -> Self {
        Self {
            source: AtomicU8::new(SyncSource::Internal as u8),
            status: AtomicU8::new(SyncStatus::Unlocked as u8),
            external_frame: AtomicI64::new(0),
            external_bpm: AtomicDouble::new(0.0),
        }
    }

    pub fn source(&self) -> SyncSource {
        SyncSource::from_u8(self.source.load(Ordering::Acquire))
    }

    pub(crate) fn set_source(&self, source: SyncSource) {
        self.source.store(source as u8, Ordering::Release);
        self.set_status(SyncStatus::Unlocked);
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: SyncStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// True when an external timebase master owns the tempo.
    pub fn tempo_locked(&self) -> bool {
        self.source() == SyncSource::Timebase
    }

    /// Last raw frame reported by the external clock.
    pub fn external_frame(&self) -> i64 {
        self.external_frame.load(Ordering::Acquire)
    }

    /// Last raw tempo reported by the external clock.
    pub fn external_bpm(&self) -> f64 {
        self.external_bpm.get()
    }
}

/// Sanitised reading. Fields that failed validation are `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ClockReading {
    pub frame: Option<u64>,
    pub bpm: Option<f64>,
    pub rolling: bool,
}

/// Owns the clock and remembers which anomalies were already logged.
pub(crate) struct ClockFollower {
    clock: Box<dyn ExternalClock>,
    logged: u8,
}

impl ClockFollower {
    pub(crate) fn new(clock: Box<dyn ExternalClock>) -> Self {
        Self { clock, logged: 0 }
    }

    pub(crate) fn poll(&mut self, sync: &SyncState) -> ClockReading {
        let raw = self.clock.query();
        sync.external_frame.store(raw.frame, Ordering::Release);
        sync.external_bpm.set(raw.bpm);

        let mut anomalies = 0u8;
        let frame = if raw.frame < 0 {
            anomalies |= ClockAnomaly::NegativeFrame as u8;
            None
        } else {
            Some(raw.frame as u64)
        };
        let bpm = if !raw.bpm.is_finite() {
            anomalies |= ClockAnomaly::NonFiniteBpm as u8;
            None
        } else if !clock::is_valid_bpm(raw.bpm) {
            anomalies |= ClockAnomaly::BpmOutOfRange as u8;
            None
        } else {
            Some(raw.bpm)
        };

        if anomalies == 0 {
            self.logged = 0;
            sync.set_status(SyncStatus::Locked);
        } else {
            let fresh = anomalies & !self.logged;
            if fresh != 0 {
                tracing::warn!(
                    frame = raw.frame,
                    bpm = raw.bpm,
                    "Ignoring malformed external clock data ({})",
                    describe(fresh)
                );
                self.logged |= fresh;
            }
            sync.set_status(SyncStatus::Drifting);
        }

        ClockReading {
            frame,
            bpm,
            rolling: raw.rolling,
        }
    }
}

fn describe(mask: u8) -> &'static str {
    const NEG: u8 = ClockAnomaly::NegativeFrame as u8;
    const NAN: u8 = ClockAnomaly::NonFiniteBpm as u8;
    const RANGE: u8 = ClockAnomaly::BpmOutOfRange as u8;
    match mask {
        NEG => "negative frame",
        NAN => "non-finite tempo",
        RANGE => "tempo out of range",
        m if m & NEG != 0 && m & NAN != 0 => "negative frame, non-finite tempo",
        _ => "negative frame, tempo out of range",
    }
}
