//! Engine configuration.

use crate::transport::clock::DEFAULT_MAX_HUMANIZE_FRAMES;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

pub const MIN_SAMPLE_RATE: f64 = 8_000.0;
pub const MAX_SAMPLE_RATE: f64 = 384_000.0;
pub const MIN_BUFFER_SIZE: usize = 16;
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Configuration for an [`AudioEngine`](crate::AudioEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: f64,
    /// Nominal frames per callback. Callbacks may be shorter or longer.
    pub buffer_size: usize,
    /// Upper bound on humanize jitter; also sizes the lookahead window.
    pub max_humanize_frames: u32,
    /// Share of one buffer's duration the audio thread may wait for the engine lock.
    pub lock_budget_fraction: f64,
    pub live_queue_capacity: usize,
    pub event_queue_capacity: usize,
    /// Fixed seed for humanize and probability draws. `None` seeds from entropy.
    pub humanize_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            buffer_size: 512,
            max_humanize_frames: DEFAULT_MAX_HUMANIZE_FRAMES,
            lock_budget_fraction: 0.5,
            live_queue_capacity: 256,
            event_queue_capacity: 1024,
            humanize_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        validate_sample_rate(self.sample_rate)?;
        validate_buffer_size(self.buffer_size)?;
        if !(self.lock_budget_fraction > 0.0 && self.lock_budget_fraction <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "lock_budget_fraction {} out of range (0-1]",
                self.lock_budget_fraction
            )));
        }
        if self.live_queue_capacity == 0 {
            return Err(Error::InvalidConfig(
                "live_queue_capacity must be non-zero".into(),
            ));
        }
        if self.event_queue_capacity == 0 {
            return Err(Error::InvalidConfig(
                "event_queue_capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_sample_rate(sample_rate: f64) -> Result<()> {
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
        return Err(Error::InvalidSampleRate(sample_rate));
    }
    Ok(())
}

pub(crate) fn validate_buffer_size(buffer_size: usize) -> Result<()> {
    if !(MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE).contains(&buffer_size) {
        return Err(Error::InvalidBufferSize(buffer_size));
    }
    Ok(())
}
