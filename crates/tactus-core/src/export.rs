//! Offline rendering.
//!
//! Drives the same callback cycle as realtime playback, back to back and
//! without a deadline. For the same song, seed and block-size sequence the
//! scheduled notes are identical to a realtime run.

use crate::callback::CallbackStatus;
use crate::config;
use crate::engine::AudioEngine;
use crate::transport::EngineState;
use crate::{Error, Result};

/// Offline render options.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Buffer sizes to use, cycled in order.
    pub block_sizes: Vec<usize>,
    /// Stop after this many frames even if the song has not ended.
    pub max_frames: u64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            block_sizes: vec![512],
            // Ten minutes at 48 kHz.
            max_frames: 48_000 * 600,
        }
    }
}

impl ExportOptions {
    pub fn validate(&self) -> Result<()> {
        if self.block_sizes.is_empty() {
            return Err(Error::InvalidConfig("no block sizes".into()));
        }
        for &size in &self.block_sizes {
            config::validate_buffer_size(size)?;
        }
        Ok(())
    }
}

/// Interleaved stereo output of an offline render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedAudio {
    pub samples: Vec<f32>,
    pub frames: u64,
    /// The song reached its end (as opposed to hitting `max_frames`).
    pub ended: bool,
}

impl AudioEngine {
    /// Render from the current position until the song ends or
    /// `max_frames` is reached. Starts playback if stopped.
    pub fn render_offline(&self, options: &ExportOptions) -> Result<RenderedAudio> {
        options.validate()?;
        match self.state() {
            EngineState::Ready => self.start()?,
            EngineState::Playing => {}
            state => {
                return Err(Error::InvalidState {
                    operation: "render offline",
                    state,
                })
            }
        }

        tracing::info!(max_frames = options.max_frames, "Offline render started");
        let mut rendered = RenderedAudio::default();
        let max_block = options.block_sizes.iter().copied().max().unwrap_or(0);
        let mut block = vec![0.0f32; max_block * 2];

        for &size in options.block_sizes.iter().cycle() {
            if rendered.frames >= options.max_frames {
                break;
            }
            let remaining = (options.max_frames - rendered.frames).min(size as u64) as usize;
            let out = &mut block[..remaining * 2];
            let status = self.process_blocking(out);
            match status {
                CallbackStatus::Idle | CallbackStatus::LockTimeout => break,
                CallbackStatus::Processed | CallbackStatus::EndOfSong => {
                    rendered.samples.extend_from_slice(out);
                    rendered.frames += remaining as u64;
                }
            }
            if status == CallbackStatus::EndOfSong {
                rendered.ended = true;
                break;
            }
        }

        tracing::info!(
            frames = rendered.frames,
            ended = rendered.ended,
            "Offline render finished"
        );
        Ok(rendered)
    }
}
