//! Integration tests for the Tactus sequencer engine
//!
//! Every test drives the audio callback by hand: no audio device, no
//! sleeping, deterministic buffer sizes and seeds.
//!
//! Test categories:
//! - Engine: builder, lifecycle, locking, events
//! - Transport: play/stop/seek/loop/tempo, end of song, external sync
//! - Scheduler: note timing, live input, recording, realtime/offline parity
//! - Export: offline render to WAV and raw samples
//!
//! Run with:
//! ```bash
//! cargo test -p tactus --test integration_tests
//! ```

mod helpers;
mod integration;
