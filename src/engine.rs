//! TactusEngine that wraps the sequencing kernel for applications

use crate::Result;
use tactus_core::{
    Arc, AudioEngine, CallbackStatus, EventReceiver, ExportOptions, PlaybackPosition,
    RenderedAudio, Song, TransportHandle,
};

#[cfg(feature = "wav")]
use std::path::Path;

/// Main sequencer engine.
///
/// Owns the kernel [`AudioEngine`] behind an `Arc` so the audio driver, GUI
/// and input threads can share it. Everything the kernel offers is reachable
/// through [`core`](Self::core); the methods here cover the common paths.
///
/// # Example
///
/// ```ignore
/// use tactus::prelude::*;
///
/// let engine = TactusEngine::builder().seed(1).build()?;
/// engine.load_song(song)?;
///
/// engine.transport().tempo(140.0).enable_loop().play();
///
/// // Audio driver thread:
/// let status = engine.process(&mut interleaved);
/// ```
#[derive(Clone)]
pub struct TactusEngine {
    core: Arc<AudioEngine>,
}

impl TactusEngine {
    /// Create a new engine builder
    pub fn builder() -> crate::TactusEngineBuilder {
        crate::TactusEngineBuilder::default()
    }

    pub(crate) fn from_core(core: Arc<AudioEngine>) -> Self {
        Self { core }
    }

    /// The kernel engine, for control operations without a wrapper here.
    pub fn core(&self) -> &Arc<AudioEngine> {
        &self.core
    }

    pub fn sample_rate(&self) -> f64 {
        self.core.sample_rate()
    }

    /// Get the transport handle for fluent API
    ///
    /// # Example
    /// ```ignore
    /// engine.transport()
    ///     .tempo(128.0)
    ///     .column(4)
    ///     .play();
    /// ```
    pub fn transport(&self) -> TransportHandle {
        TransportHandle::new(Arc::clone(&self.core))
    }

    /// Replace the song. Playback stops first if it was rolling.
    pub fn load_song(&self, song: Song) -> Result<()> {
        self.core.set_song(song)?;
        Ok(())
    }

    /// Realtime audio callback with interleaved stereo output.
    pub fn process(&self, output: &mut [f32]) -> CallbackStatus {
        self.core.process(output)
    }

    pub fn position(&self) -> PlaybackPosition {
        self.core.position()
    }

    pub fn events(&self) -> EventReceiver {
        self.core.events()
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Render offline from the current position.
    pub fn render(&self, options: &ExportOptions) -> Result<RenderedAudio> {
        Ok(self.core.render_offline(options)?)
    }

    /// Render offline and write the result as a 32-bit float stereo WAV file.
    #[cfg(feature = "wav")]
    pub fn export_wav(&self, path: impl AsRef<Path>, options: &ExportOptions) -> Result<RenderedAudio> {
        let rendered = self.render(options)?;
        let path = path.as_ref();
        let mut writer = hound::WavWriter::create(path, wav_spec(self.sample_rate()))?;
        for &sample in &rendered.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        tracing::info!(path = %path.display(), frames = rendered.frames, "Exported WAV");
        Ok(rendered)
    }

    /// Write rendered audio as raw little-endian `f32` interleaved stereo.
    pub fn write_raw<W: std::io::Write>(rendered: &RenderedAudio, mut writer: W) -> Result<()> {
        for sample in &rendered.samples {
            writer.write_all(&sample.to_le_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(feature = "wav")]
fn wav_spec(sample_rate: f64) -> hound::WavSpec {
    hound::WavSpec {
        channels: 2,
        sample_rate: sample_rate.round() as u32,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    }
}

impl std::fmt::Debug for TactusEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TactusEngine")
            .field("position", &self.core.position())
            .finish()
    }
}
