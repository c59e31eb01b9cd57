//! # Tactus - Real-time Pattern Sequencer
//!
//! Drum-machine style sequencing engine: songs made of patterns on a column
//! timeline, scheduled sample-accurately into an audio callback.
//!
//! ## Architecture
//!
//! Tactus is an umbrella crate over:
//! - **tactus-core** - Clock, transport, pattern timeline, note scheduler,
//!   engine lock and the audio callback adapter
//!
//! The engine does not synthesise audio; scheduled notes are handed to a
//! [`NoteRenderer`] you provide.
//!
//! ## Quick Start
//!
//! ```ignore
//! use tactus::prelude::*;
//!
//! let engine = TactusEngine::builder()
//!     .sample_rate(48_000.0)
//!     .renderer(my_sampler)
//!     .build()?;
//!
//! let mut song = Song::new("demo");
//! let beat = song.add_pattern(Pattern::new("beat", 192).with_note(PatternNote::new(0, 0)));
//! engine.load_song(song)?;
//! engine.core().set_next_pattern(beat)?;
//!
//! engine.transport().tempo(120.0).play();
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Kernel plus WAV export
//! - `wav` - WAV export of offline renders

/// Re-export of tactus-core for direct access
pub use tactus_core as core;

// Core types
pub use tactus_core::{
    // Engine
    AudioEngine,
    CallbackStatus,
    EngineConfig,
    EngineEvent,
    EngineState,
    PlaybackPosition,

    // Song model
    Instrument,
    InstrumentId,
    Pattern,
    PatternNote,
    Song,
    SongMode,
    TempoMarker,

    // Transport and sync
    ExternalClock,
    ExternalPosition,
    MetronomeHandle,
    SyncSource,
    SyncStatus,
    TransportHandle,

    // Notes in and out
    LiveNote,
    NoteLog,
    NoteRenderer,
    NullRenderer,
    RecordSettings,
    ScheduledNote,

    // Export
    ExportOptions,
    RenderedAudio,
};

mod error;
pub use error::{Error, Result};

mod builder;
mod engine;

pub use builder::TactusEngineBuilder;
pub use engine::TactusEngine;

/// Convenience prelude for common imports
pub mod prelude {
    // Main engine
    pub use crate::{TactusEngine, TactusEngineBuilder};

    // Song model
    pub use crate::core::{Pattern, PatternNote, Song, SongMode};

    // Transport
    pub use crate::core::{CallbackStatus, EngineEvent, TransportHandle};

    // Notes
    pub use crate::core::{LiveNote, NoteRenderer, ScheduledNote};
}
