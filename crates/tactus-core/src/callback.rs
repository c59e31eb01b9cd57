//! Audio callback driver adapter.
//!
//! Called once per hardware buffer with interleaved stereo output. The
//! realtime entry point waits for the engine lock for at most a fraction of
//! the buffer's duration and renders silence when it cannot get it. The
//! blocking entry point runs the identical cycle for offline rendering.
//!
//! A buffer longer than the prepared buffer size is processed in chunks of
//! at most that size, so the audio thread never grows its scratch buffers.

use crate::engine::{AudioEngine, EngineCore};
use crate::events::EngineEvent;
use crate::scheduler::QueueStatus;
use std::time::Duration;

/// What a callback did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStatus {
    /// Buffer rendered.
    Processed,
    /// Engine not ready; buffer silenced.
    Idle,
    /// Engine lock busy; buffer silenced, nothing advanced.
    LockTimeout,
    /// Buffer rendered, then playback stopped at the end of the song.
    EndOfSong,
}

impl AudioEngine {
    /// Realtime callback. `output` is interleaved stereo.
    pub fn process(&self, output: &mut [f32]) -> CallbackStatus {
        let frames = output.len() / 2;
        let Some(mut core) = self.core_lock().try_lock_for(self.lock_budget(frames)) else {
            output.fill(0.0);
            return CallbackStatus::LockTimeout;
        };
        let status = run_cycles(&mut core, output);
        self.unlock(core);
        status
    }

    /// Same cycle as [`process`](Self::process) but waits for the lock.
    /// Used for offline rendering.
    pub fn process_blocking(&self, output: &mut [f32]) -> CallbackStatus {
        let mut core = self.core_lock().lock();
        let status = run_cycles(&mut core, output);
        self.unlock(core);
        status
    }

    /// Longest the audio thread may wait for the engine lock.
    pub fn lock_budget(&self, frames: usize) -> Duration {
        let seconds =
            frames as f64 / self.published_sample_rate() * self.config().lock_budget_fraction;
        if seconds.is_finite() && seconds > 0.0 {
            Duration::from_secs_f64(seconds)
        } else {
            Duration::ZERO
        }
    }
}

fn run_cycles(core: &mut EngineCore, output: &mut [f32]) -> CallbackStatus {
    let chunk = core.max_frames.max(1) * 2;
    if output.len() <= chunk {
        return run_cycle(core, output, true);
    }
    let mut status = CallbackStatus::Processed;
    for (i, part) in output.chunks_mut(chunk).enumerate() {
        match run_cycle(core, part, i == 0) {
            CallbackStatus::Processed => {}
            other => status = other,
        }
    }
    status
}

fn run_cycle(core: &mut EngineCore, output: &mut [f32], poll_clock: bool) -> CallbackStatus {
    if !core.state().is_active() {
        output.fill(0.0);
        return CallbackStatus::Idle;
    }
    let frames = core.scratch.clear(output.len() / 2);

    if poll_clock {
        if let Some(follower) = core.follower.as_mut() {
            let reading = follower.poll(&core.sync);
            let source = core.sync.source();
            core.apply_clock(reading, source);
        }
    }

    core.apply_tick_size();
    let status = core.schedule(frames);

    let start = core.buffer_start();
    let end = start + frames as i64;
    while let Some(note) = core.scheduler.pop_due(end) {
        let offset = (note.effective_frame - start).max(0) as usize;
        core.renderer.submit(note, offset);
    }
    core.renderer
        .render(&mut core.scratch.left, &mut core.scratch.right);

    core.scratch.interleave_into(output);
    output[frames * 2..].fill(0.0);
    core.output.publish(&mut core.scratch);

    let bpm = core.transport.bpm();
    core.transport.advance(frames as u64);
    core.realtime_frame += frames as u64;
    if core.transport.bpm() != bpm {
        let bpm = core.transport.bpm();
        tracing::debug!(bpm, tick = core.transport.tick(), "Timeline tempo reached");
        core.pending.push(EngineEvent::TempoChanged { bpm });
    }

    if status == QueueStatus::EndOfSong {
        core.end_of_song();
        return CallbackStatus::EndOfSong;
    }
    CallbackStatus::Processed
}
