//! Integration test modules for Tactus
//!
//! - engine: Builder, lifecycle, engine lock, events
//! - transport: Play/stop/seek/loop/tempo, end of song, external clock
//! - scheduler: Note timing, live input, recording, offline parity
//! - export: Offline rendering to files

pub mod engine;
pub mod export;
pub mod scheduler;
pub mod transport;
