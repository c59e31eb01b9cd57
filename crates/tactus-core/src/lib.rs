//! Real-time pattern sequencing kernel: clock, transport, timeline and note
//! scheduling behind one engine lock.
//!
//! # Primary API
//!
//! - [`AudioEngine`]: Engine state, control operations and the audio callback
//! - [`TransportHandle`]: Fluent playback control (play/stop/seek/loop)
//! - [`Song`] / [`Pattern`]: The material being sequenced
//! - [`NoteRenderer`]: Where scheduled notes go
//! - [`EngineEvent`]: Notifications for GUI and automation layers
//!
//! # Example
//!
//! ```ignore
//! use tactus_core::*;
//!
//! let engine = AudioEngine::new(EngineConfig::default())?;
//! engine.init()?;
//! engine.prepare(48_000.0, 512)?;
//!
//! let mut song = Song::new("demo");
//! let kick = song.add_pattern(Pattern::new("kick", 192).with_note(PatternNote::new(0, 0)));
//! engine.set_song(song)?;
//! engine.set_next_pattern(kick)?;
//! engine.start()?;
//!
//! // From the audio driver:
//! engine.process(&mut interleaved_stereo);
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod compat;
pub use compat::Arc;

pub mod config;
pub use config::EngineConfig;

pub(crate) mod lockfree;
pub use lockfree::{AtomicDouble, AtomicFlag, AtomicFloat};

pub mod lock;
pub use lock::{EngineGuard, EngineLock, LockObserver};

pub mod transport;
pub use transport::{
    ClockAnomaly, EngineState, ExternalClock, ExternalPosition, MetronomeHandle, SyncSource,
    SyncState, SyncStatus, TransportHandle, TransportStatus,
};

pub mod song;
pub use song::{
    ColumnLocation, Instrument, InstrumentId, Pattern, PatternNote, PatternTimeline, Song,
    SongMode, TempoMarker,
};

pub mod scheduler;
pub use scheduler::{
    LiveInputSender, LiveNote, NoteSource, PostDelete, PreDelete, QueueStatus, RecordSettings,
    ScheduledNote, Span,
};

pub mod events;
pub use events::{EngineEvent, ErasedNotes, EventReceiver, RecordedNote};

pub mod renderer;
pub use renderer::{LoggedNote, NoteLog, NoteRenderer, NullRenderer};

pub(crate) mod output;
pub use output::{OutputBus, StereoBuffer};

mod engine;
pub use engine::{AudioEngine, EngineCore, PlaybackPosition};

mod callback;
pub use callback::CallbackStatus;

mod export;
pub use export::{ExportOptions, RenderedAudio};
