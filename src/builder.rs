//! Builder for configuring and constructing a `TactusEngine`.

use crate::{Result, TactusEngine};
use tactus_core::{
    Arc, AudioEngine, EngineConfig, ExternalClock, LockObserver, NoteRenderer, NullRenderer,
    SyncSource,
};

/// The built engine is initialized and prepared at the configured sample
/// rate and buffer size, ready for a song.
///
/// # Example
///
/// ```ignore
/// use tactus::prelude::*;
///
/// let engine = TactusEngine::builder()
///     .sample_rate(44_100.0)
///     .buffer_size(256)
///     .seed(7)
///     .build()?;
///
/// engine.load_song(song)?;
/// engine.transport().play();
/// ```
pub struct TactusEngineBuilder {
    config: EngineConfig,
    renderer: Option<Box<dyn NoteRenderer>>,
    observer: Option<Arc<dyn LockObserver>>,
    clock: Option<(Box<dyn ExternalClock>, SyncSource)>,
}

impl Default for TactusEngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            renderer: None,
            observer: None,
            clock: None,
        }
    }
}

impl TactusEngineBuilder {
    /// Replace the whole configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: 48000
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// Default: 512
    pub fn buffer_size(mut self, frames: usize) -> Self {
        self.config.buffer_size = frames;
        self
    }

    /// Fix the humanize and probability seed for reproducible renders.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.humanize_seed = Some(seed);
        self
    }

    pub fn max_humanize_frames(mut self, frames: u32) -> Self {
        self.config.max_humanize_frames = frames;
        self
    }

    /// Default: [`NullRenderer`]
    pub fn renderer(mut self, renderer: impl NoteRenderer + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    /// Follow an external transport from the first callback on.
    pub fn external_clock(mut self, clock: impl ExternalClock + 'static, source: SyncSource) -> Self {
        self.clock = Some((Box::new(clock), source));
        self
    }

    /// Report every engine lock acquisition and release.
    pub fn lock_observer(mut self, observer: Arc<dyn LockObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> Result<TactusEngine> {
        self.config.validate()?;
        let renderer = self
            .renderer
            .unwrap_or_else(|| Box::new(NullRenderer));
        let sample_rate = self.config.sample_rate;
        let buffer_size = self.config.buffer_size;

        let core = AudioEngine::with_renderer(self.config, renderer, self.observer)?;
        core.init()?;
        core.prepare(sample_rate, buffer_size)?;
        if let Some((clock, source)) = self.clock {
            core.set_external_clock(Some(clock), source)?;
        }

        tracing::info!(sample_rate, buffer_size, "Engine built");
        Ok(TactusEngine::from_core(Arc::new(core)))
    }
}
