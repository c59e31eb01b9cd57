//! The engine context object.
//!
//! [`AudioEngine`] owns everything: the lock-protected [`EngineCore`], the
//! lock-free live input producer, the event queue, the output bus and a
//! snapshot of the playback position that readers can poll without the lock.
//! There is no global state; share the engine through an `Arc`.
//!
//! Control operations lock the core, mutate it, publish the snapshot and
//! release the lock before delivering any events.

use crate::compat::{Arc, AtomicBool, AtomicI64, AtomicU64, AtomicU8, Ordering};
use crate::config::{self, EngineConfig};
use crate::events::{EngineEvent, ErasedNotes, EventQueue, PendingEvents, RecordedNote};
use crate::lock::{EngineGuard, EngineLock, LockObserver};
use crate::output::{OutputBus, StereoBuffer};
use crate::renderer::{NoteRenderer, NullRenderer};
use crate::scheduler::{
    deletion_window, LiveEntry, LiveInputSender, LiveNote, NoteScheduler, PatternSelection,
    PatternSet, QueueStatus, RecordSettings, ScanContext,
};
use crate::song::{PatternTimeline, Song, SongMode};
use crate::transport::clock::{frames_to_ticks, ticks_to_frames};
use crate::transport::{
    ClockFollower, ClockReading, EngineLifecycle, EngineState, ExternalClock, LifecycleEvent,
    Metronome, SyncSource, SyncState, TapTempo, TransitionResult, TransportState,
};
use crate::{AtomicDouble, Error, Result};
use crossbeam_channel::Receiver;
use std::time::Instant;

/// Playback position as last published by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackPosition {
    pub state: EngineState,
    pub rolling: bool,
    pub frame: u64,
    pub tick: u64,
    pub bpm: f64,
    pub tick_size: f64,
    /// Timeline column in song mode.
    pub column: Option<usize>,
    /// Frames processed since `prepare`, rolling or not.
    pub realtime_frame: u64,
}

/// Lock-free copy of the core's position, refreshed on every unlock.
#[derive(Debug)]
struct Published {
    state: AtomicU8,
    rolling: AtomicBool,
    frame: AtomicU64,
    tick: AtomicU64,
    realtime_frame: AtomicU64,
    /// Tick at which the next callback starts, in the current epoch.
    live_tick: AtomicU64,
    epoch: AtomicU64,
    bpm: AtomicDouble,
    tick_size: AtomicDouble,
    sample_rate: AtomicDouble,
    column: AtomicI64,
}

impl Published {
    fn new(core: &EngineCore) -> Self {
        let published = Self {
            state: AtomicU8::new(0),
            rolling: AtomicBool::new(false),
            frame: AtomicU64::new(0),
            tick: AtomicU64::new(0),
            realtime_frame: AtomicU64::new(0),
            live_tick: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            bpm: AtomicDouble::new(0.0),
            tick_size: AtomicDouble::new(0.0),
            sample_rate: AtomicDouble::new(0.0),
            column: AtomicI64::new(-1),
        };
        published.store(core);
        published
    }

    fn store(&self, core: &EngineCore) {
        let transport = &core.transport;
        let live_tick = if transport.is_rolling() {
            transport.tick()
        } else {
            frames_to_ticks(core.realtime_frame as i64, transport.tick_size())
        };
        self.state.store(core.state() as u8, Ordering::Release);
        self.rolling.store(transport.is_rolling(), Ordering::Release);
        self.frame.store(transport.frame(), Ordering::Release);
        self.tick.store(transport.tick(), Ordering::Release);
        self.realtime_frame.store(core.realtime_frame, Ordering::Release);
        self.live_tick.store(live_tick, Ordering::Release);
        self.epoch.store(core.epoch, Ordering::Release);
        self.bpm.set(transport.bpm());
        self.tick_size.set(transport.tick_size());
        self.sample_rate.set(transport.sample_rate());
        self.column.store(
            core.current_column().map_or(-1, |c| c as i64),
            Ordering::Release,
        );
    }

    fn snapshot(&self) -> PlaybackPosition {
        let column = self.column.load(Ordering::Acquire);
        PlaybackPosition {
            state: EngineState::from_u8(self.state.load(Ordering::Acquire)),
            rolling: self.rolling.load(Ordering::Acquire),
            frame: self.frame.load(Ordering::Acquire),
            tick: self.tick.load(Ordering::Acquire),
            bpm: self.bpm.get(),
            tick_size: self.tick_size.get(),
            column: usize::try_from(column).ok(),
            realtime_frame: self.realtime_frame.load(Ordering::Acquire),
        }
    }
}

/// Everything guarded by the engine lock.
///
/// Reachable through [`AudioEngine::lock`] for inspection; all mutation goes
/// through the engine's control methods.
pub struct EngineCore {
    lifecycle: EngineLifecycle,
    pub(crate) transport: TransportState,
    selection: PatternSelection,
    song: Option<Arc<Song>>,
    timeline: PatternTimeline,
    pub(crate) scheduler: NoteScheduler,
    pub(crate) renderer: Box<dyn NoteRenderer>,
    pub(crate) follower: Option<ClockFollower>,
    /// Frames processed since `prepare`, rolling or not.
    pub(crate) realtime_frame: u64,
    /// Bumped on start, stop and relocate. Live notes tagged with an older
    /// epoch are played immediately.
    epoch: u64,
    tap: TapTempo,
    pub(crate) pending: PendingEvents,
    pub(crate) scratch: StereoBuffer,
    /// Largest buffer one cycle renders; both output buffers hold this much.
    pub(crate) max_frames: usize,
    metronome: Arc<Metronome>,
    pub(crate) sync: Arc<SyncState>,
    pub(crate) output: Arc<OutputBus>,
}

impl EngineCore {
    pub fn state(&self) -> EngineState {
        self.lifecycle.state()
    }

    pub fn transport(&self) -> &TransportState {
        &self.transport
    }

    pub fn selection(&self) -> &PatternSelection {
        &self.selection
    }

    pub fn song(&self) -> Option<&Arc<Song>> {
        self.song.as_ref()
    }

    pub fn timeline(&self) -> &PatternTimeline {
        &self.timeline
    }

    pub fn scheduler(&self) -> &NoteScheduler {
        &self.scheduler
    }

    pub fn realtime_frame(&self) -> u64 {
        self.realtime_frame
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Timeline column under the transport in song mode.
    pub fn current_column(&self) -> Option<usize> {
        let song = self.song.as_deref()?;
        if song.mode != SongMode::Song {
            return None;
        }
        self.timeline
            .locate(self.transport.tick(), song.loop_enabled)
            .map(|loc| loc.column)
    }

    /// Frame the next buffer starts at: the transport frame while rolling,
    /// the realtime frame otherwise.
    pub(crate) fn buffer_start(&self) -> i64 {
        if self.transport.is_rolling() {
            self.transport.frame() as i64
        } else {
            self.realtime_frame as i64
        }
    }

    fn transition(&mut self, event: LifecycleEvent, operation: &'static str) -> Result<()> {
        match self.lifecycle.transition(event) {
            TransitionResult::Changed { from, to } => {
                tracing::info!("Engine state {:?} -> {:?}", from, to);
                self.pending.push(EngineEvent::StateChanged(to));
                Ok(())
            }
            TransitionResult::None => Ok(()),
            TransitionResult::Rejected(state) => Err(Error::InvalidState { operation, state }),
        }
    }

    fn require_active(&self, operation: &'static str) -> Result<()> {
        let state = self.state();
        if state.is_active() {
            Ok(())
        } else {
            Err(Error::InvalidState { operation, state })
        }
    }

    fn require_song(&self) -> Result<&Arc<Song>> {
        self.song.as_ref().ok_or(Error::NoSong)
    }

    fn require_pattern(&self, index: usize) -> Result<()> {
        let len = self.require_song()?.patterns.len();
        if index < len {
            Ok(())
        } else {
            Err(Error::PatternOutOfRange { index, len })
        }
    }

    /// Forget where the scan was and which column/pattern pass is current.
    fn restart_scan(&mut self) {
        self.transport.clear_scheduled_tempo();
        self.scheduler.drop_scheduled();
        self.scheduler.reset_scan();
        self.selection.set_song_pos(None);
        self.selection.set_pattern_start_tick(None);
    }

    pub(crate) fn start_at(&mut self, frame: u64) -> Result<()> {
        self.transition(LifecycleEvent::Start, "start")?;
        if self.transport.is_rolling() {
            return Ok(());
        }
        self.transport.start(frame);
        self.restart_scan();
        self.epoch += 1;
        self.output.reset_peaks();
        self.pending
            .push(EngineEvent::PlaybackStateChanged { rolling: true });
        Ok(())
    }

    pub(crate) fn stop(&mut self) -> Result<()> {
        self.transition(LifecycleEvent::Stop, "stop")?;
        if self.transport.is_rolling() {
            self.transport.stop();
            self.pending
                .push(EngineEvent::PlaybackStateChanged { rolling: false });
        }
        self.selection.set_pattern_start_tick(None);
        self.scheduler.clear();
        self.epoch += 1;
        self.output.reset_peaks();
        Ok(())
    }

    pub(crate) fn relocate(&mut self, frame: u64) -> Result<()> {
        self.require_active("relocate")?;
        self.transport.relocate(frame);
        self.restart_scan();
        self.epoch += 1;
        let tick = self.transport.tick();
        tracing::debug!(frame, tick, "Relocated");
        self.pending.push(EngineEvent::TickPositionChanged { tick });
        Ok(())
    }

    fn relocate_to_tick(&mut self, tick: u64) -> Result<()> {
        let frame = ticks_to_frames(tick as f64, self.transport.tick_size()).max(0) as u64;
        self.relocate(frame)
    }

    pub(crate) fn set_bpm(&mut self, bpm: f64) -> Result<()> {
        if self.sync.tempo_locked() {
            tracing::error!(bpm, "Tempo change rejected: external timebase master is active");
            return Err(Error::TempoLocked);
        }
        if let Err(e) = self.transport.set_bpm(bpm) {
            tracing::warn!("Rejected tempo {}: {}", bpm, e);
            return Err(e);
        }
        // No callbacks run outside Ready/Playing, so apply right away.
        if !self.state().is_active() {
            self.apply_tick_size();
        }
        Ok(())
    }

    /// Pick up tempo/resolution/sample-rate changes. Returns `true` on change.
    pub(crate) fn apply_tick_size(&mut self) -> bool {
        if self.transport.recompute_tick_size() {
            self.scheduler.retime(&self.transport);
            let bpm = self.transport.bpm();
            tracing::debug!(bpm, tick_size = self.transport.tick_size(), "Tick size changed");
            self.pending.push(EngineEvent::TempoChanged { bpm });
            true
        } else {
            false
        }
    }

    /// Follow an external clock reading according to the sync source.
    pub(crate) fn apply_clock(&mut self, reading: ClockReading, source: SyncSource) {
        if source == SyncSource::Internal {
            return;
        }
        if reading.rolling != self.transport.is_rolling() {
            let result = if reading.rolling {
                let frame = reading.frame.unwrap_or(self.transport.frame());
                self.start_at(frame)
            } else {
                self.stop()
            };
            if let Err(e) = result {
                tracing::warn!("Could not follow external transport: {}", e);
            }
        } else if self.transport.is_rolling() {
            if let Some(frame) = reading.frame.filter(|&f| f != self.transport.frame()) {
                if let Err(e) = self.relocate(frame) {
                    tracing::warn!("Could not follow external position: {}", e);
                }
            }
        }
        if source == SyncSource::Timebase {
            self.transport.clear_scheduled_tempo();
            if let Some(bpm) = reading.bpm.filter(|&b| b != self.transport.bpm()) {
                // Validated by the follower.
                let _ = self.transport.set_bpm(bpm);
            }
        }
    }

    pub(crate) fn schedule(&mut self, frames: usize) -> QueueStatus {
        let ctx = ScanContext {
            transport: &mut self.transport,
            selection: &mut self.selection,
            song: self.song.as_deref(),
            timeline: &self.timeline,
            metronome: &self.metronome,
            tempo_locked: self.sync.tempo_locked(),
            realtime_frame: self.realtime_frame,
            epoch: self.epoch,
            events: &mut self.pending,
        };
        self.scheduler.update_note_queue(ctx, frames as u32)
    }

    /// Stop at the end of a non-looping song and rewind.
    pub(crate) fn end_of_song(&mut self) {
        tracing::info!(tick = self.transport.tick(), "End of song reached");
        self.pending.push(EngineEvent::EndOfSong);
        if let Err(e) = self.stop() {
            tracing::warn!("Stop at end of song failed: {}", e);
        }
        if let Err(e) = self.relocate(0) {
            tracing::warn!("Rewind at end of song failed: {}", e);
        }
    }

    fn attach_song(&mut self, song: Song) -> Result<()> {
        song.validate()?;
        if self.state() == EngineState::Playing {
            self.stop()?;
        }
        self.transition(LifecycleEvent::AttachSong, "set song")?;
        self.transport.set_resolution(song.resolution)?;
        if !self.sync.tempo_locked() {
            self.transport.set_bpm(song.bpm)?;
        }
        self.apply_tick_size();
        self.timeline = PatternTimeline::new(&song);
        self.tap.reset();
        self.selection.reset();
        self.selection
            .set_selected(if song.patterns.is_empty() { None } else { Some(0) });
        self.scheduler.clear();
        self.transport.relocate(0);
        self.epoch += 1;
        tracing::info!(
            name = %song.name,
            patterns = song.patterns.len(),
            columns = song.pattern_groups.len(),
            "Song attached"
        );
        self.song = Some(Arc::new(song));
        Ok(())
    }

    fn detach_song(&mut self) -> Result<()> {
        if self.state() == EngineState::Playing {
            self.stop()?;
        }
        self.transition(LifecycleEvent::DetachSong, "remove song")?;
        if self.song.take().is_some() {
            tracing::info!("Song detached");
        }
        self.timeline = PatternTimeline::default();
        self.selection.reset();
        self.selection.set_selected(None);
        self.scheduler.clear();
        Ok(())
    }

    /// Apply `edit` to a copy of the song and swap it in if it validates.
    fn edit_song(&mut self, edit: impl FnOnce(&mut Song)) -> Result<()> {
        let current = Arc::clone(self.require_song()?);
        let mut song = Song::clone(&current);
        edit(&mut song);
        song.validate()?;

        let patterns_before = current.patterns.len();
        if song.resolution != self.transport.resolution() {
            self.transport.set_resolution(song.resolution)?;
        }
        if song.bpm != current.bpm && !self.sync.tempo_locked() {
            self.transport.set_bpm(song.bpm)?;
        }
        if song.patterns.len() < patterns_before {
            self.selection.reset();
            self.selection.set_selected(None);
        }
        if song.mode != current.mode {
            self.restart_scan();
        }
        self.timeline = PatternTimeline::new(&song);
        self.scheduler.clear_song_end();
        self.song = Some(Arc::new(song));
        if !self.state().is_active() {
            self.apply_tick_size();
        }
        Ok(())
    }

    /// Column/pattern a live note lands in while recording.
    fn record_target(&self, song: &Song) -> Option<(usize, u64, u64)> {
        let tick = self.transport.tick();
        match song.mode {
            SongMode::Song => {
                let loc = self.timeline.locate(tick, song.loop_enabled)?;
                let pattern = *song.pattern_groups.get(loc.column)?.first()?;
                let length = song.patterns.get(pattern)?.length;
                Some((pattern, loc.local_tick.min(length.saturating_sub(1)), length))
            }
            SongMode::Pattern => {
                let pattern = self.selection.selected()?;
                let length = song.patterns.get(pattern)?.length.max(1);
                let start = self.selection.pattern_start_tick().unwrap_or(0);
                Some((pattern, tick.saturating_sub(start) % length, length))
            }
        }
    }

    fn live_entry(&self, note: LiveNote) -> LiveEntry {
        let tick = if self.transport.is_rolling() {
            self.transport.tick()
        } else {
            frames_to_ticks(self.realtime_frame as i64, self.transport.tick_size())
        };
        LiveEntry {
            note,
            tick,
            epoch: self.epoch,
        }
    }
}

/// The sequencing engine.
///
/// # Example
/// ```ignore
/// let engine = Arc::new(AudioEngine::new(EngineConfig::default())?);
/// engine.init()?;
/// engine.prepare(48_000.0, 512)?;
/// engine.set_song(song)?;
/// engine.start()?;
/// // audio thread:
/// engine.process(&mut interleaved);
/// ```
pub struct AudioEngine {
    core: EngineLock<EngineCore>,
    live: LiveInputSender,
    events: EventQueue,
    output: Arc<OutputBus>,
    published: Published,
    metronome: Arc<Metronome>,
    sync: Arc<SyncState>,
    config: EngineConfig,
}

impl AudioEngine {
    /// Engine with a [`NullRenderer`].
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_renderer(config, Box::new(NullRenderer), None)
    }

    pub fn with_renderer(
        config: EngineConfig,
        renderer: Box<dyn NoteRenderer>,
        observer: Option<Arc<dyn LockObserver>>,
    ) -> Result<Self> {
        config.validate()?;

        let (live, scheduler) = NoteScheduler::new(
            config.max_humanize_frames,
            config.humanize_seed,
            config.live_queue_capacity,
        );
        let metronome = Arc::new(Metronome::new());
        let sync = Arc::new(SyncState::new());
        let output = Arc::new(OutputBus::new(config.buffer_size));
        let core = EngineCore {
            lifecycle: EngineLifecycle::new(),
            transport: TransportState::new(
                config.sample_rate,
                Song::default().bpm,
                Song::default().resolution,
            ),
            selection: PatternSelection::new(),
            song: None,
            timeline: PatternTimeline::default(),
            scheduler,
            renderer,
            follower: None,
            realtime_frame: 0,
            epoch: 0,
            tap: TapTempo::new(),
            pending: PendingEvents::new(),
            scratch: StereoBuffer::with_capacity(config.buffer_size),
            max_frames: config.buffer_size,
            metronome: Arc::clone(&metronome),
            sync: Arc::clone(&sync),
            output: Arc::clone(&output),
        };
        let published = Published::new(&core);
        let core = match observer {
            Some(observer) => EngineLock::with_observer(core, observer),
            None => EngineLock::new(core),
        };

        Ok(Self {
            core,
            live,
            events: EventQueue::new(config.event_queue_capacity),
            output,
            published,
            metronome,
            sync,
            config,
        })
    }

    /// Run `f` under the lock, publish the position, then deliver events.
    #[track_caller]
    fn with_core<R>(&self, f: impl FnOnce(&mut EngineCore) -> Result<R>) -> Result<R> {
        let mut core = self.core.lock();
        let result = f(&mut core);
        self.unlock(core);
        result
    }

    pub(crate) fn unlock(&self, mut core: EngineGuard<'_, EngineCore>) {
        self.published.store(&core);
        let events = std::mem::take(&mut core.pending);
        drop(core);
        self.events.publish(events);
    }

    pub(crate) fn core_lock(&self) -> &EngineLock<EngineCore> {
        &self.core
    }

    pub(crate) fn published_sample_rate(&self) -> f64 {
        self.published.sample_rate.get()
    }

    /// Sample rate of the last `prepare`.
    pub fn sample_rate(&self) -> f64 {
        self.published_sample_rate()
    }

    // --- Lifecycle ---

    pub fn init(&self) -> Result<()> {
        self.with_core(|core| core.transition(LifecycleEvent::Init, "init"))
    }

    /// Attach to an audio device running at `sample_rate` with buffers of
    /// up to `buffer_size` frames.
    pub fn prepare(&self, sample_rate: f64, buffer_size: usize) -> Result<()> {
        config::validate_sample_rate(sample_rate)?;
        config::validate_buffer_size(buffer_size)?;
        self.with_core(|core| {
            core.transition(LifecycleEvent::Prepare, "prepare")?;
            core.transport.set_sample_rate(sample_rate)?;
            core.apply_tick_size();
            core.scratch = StereoBuffer::with_capacity(buffer_size);
            core.output.reserve(buffer_size);
            core.max_frames = buffer_size;
            core.realtime_frame = 0;
            tracing::info!(sample_rate, buffer_size, "Engine prepared");
            Ok(())
        })
    }

    pub fn unprepare(&self) -> Result<()> {
        self.with_core(|core| {
            if core.state() == EngineState::Ready || core.state() == EngineState::Playing {
                core.detach_song()?;
            }
            core.transition(LifecycleEvent::Unprepare, "unprepare")
        })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.with_core(|core| {
            if core.state() == EngineState::Playing {
                core.stop()?;
            }
            core.renderer.stop_all();
            core.song = None;
            core.timeline = PatternTimeline::default();
            core.selection.reset();
            core.scheduler.clear();
            core.follower = None;
            self.sync.set_source(SyncSource::Internal);
            core.transition(LifecycleEvent::Shutdown, "shutdown")
        })
    }

    // --- Song ---

    /// Attach a song, stopping playback first if needed.
    pub fn set_song(&self, song: Song) -> Result<()> {
        self.with_core(|core| core.attach_song(song))
    }

    pub fn remove_song(&self) -> Result<()> {
        self.with_core(|core| core.detach_song())
    }

    /// Edit the loaded song. The edit is applied to a copy and discarded if
    /// the result does not validate.
    pub fn edit_song(&self, edit: impl FnOnce(&mut Song)) -> Result<()> {
        self.with_core(|core| core.edit_song(edit))
    }

    pub fn song(&self) -> Option<Arc<Song>> {
        self.core.lock().song.clone()
    }

    pub fn set_song_mode(&self, mode: SongMode) -> Result<()> {
        self.edit_song(|song| song.mode = mode)
    }

    pub fn set_loop_enabled(&self, enabled: bool) -> Result<()> {
        self.edit_song(|song| song.loop_enabled = enabled)
    }

    // --- Transport ---

    /// Start playback from the current position.
    pub fn start(&self) -> Result<()> {
        self.with_core(|core| {
            let frame = core.transport.frame();
            core.start_at(frame)
        })
    }

    pub fn start_at(&self, frame: u64) -> Result<()> {
        self.with_core(|core| core.start_at(frame))
    }

    /// Stop playback and drop every pending note, live input included.
    pub fn stop(&self) -> Result<()> {
        self.with_core(|core| core.stop())
    }

    /// Stop and silence all voices.
    pub fn panic(&self) -> Result<()> {
        self.with_core(|core| {
            if core.state() == EngineState::Playing {
                core.stop()?;
            }
            core.scheduler.clear();
            core.renderer.stop_all();
            Ok(())
        })
    }

    /// Jump to `frame`. Notes already scheduled from the timeline are dropped.
    pub fn relocate(&self, frame: u64) -> Result<()> {
        self.with_core(|core| core.relocate(frame))
    }

    pub fn relocate_to_tick(&self, tick: u64) -> Result<()> {
        self.with_core(|core| core.relocate_to_tick(tick))
    }

    /// Jump to the start of a timeline column.
    pub fn set_column(&self, column: usize) -> Result<()> {
        self.with_core(|core| {
            core.require_song()?;
            let len = core.timeline.column_count();
            let tick = core
                .timeline
                .column_start_tick(column, false)
                .ok_or(Error::ColumnOutOfRange { index: column, len })?;
            core.relocate_to_tick(tick)
        })
    }

    /// Length in ticks of a timeline column.
    pub fn pattern_length(&self, column: usize) -> Option<u64> {
        self.core.lock().timeline.column_length(column)
    }

    // --- Tempo ---

    /// Rejected with [`Error::TempoLocked`] while an external timebase
    /// master owns the tempo.
    pub fn set_bpm(&self, bpm: f64) -> Result<()> {
        self.with_core(|core| core.set_bpm(bpm))
    }

    /// Register a tap. Returns the new tempo once two taps are close enough.
    pub fn tap_tempo(&self, now: Instant) -> Result<Option<f64>> {
        self.with_core(|core| match core.tap.tap(now) {
            Some(bpm) => core.set_bpm(bpm).map(|()| Some(bpm)),
            None => Ok(None),
        })
    }

    /// Register a tap `interval_ms` after the previous one.
    pub fn tap_tempo_interval(&self, interval_ms: f64) -> Result<Option<f64>> {
        self.with_core(|core| match core.tap.interval(interval_ms) {
            Some(bpm) => core.set_bpm(bpm).map(|()| Some(bpm)),
            None => Ok(None),
        })
    }

    /// Follow (or stop following) an external transport.
    pub fn set_external_clock(
        &self,
        clock: Option<Box<dyn ExternalClock>>,
        source: SyncSource,
    ) -> Result<()> {
        self.with_core(|core| {
            core.follower = clock.map(ClockFollower::new);
            let source = if core.follower.is_some() {
                source
            } else {
                SyncSource::Internal
            };
            core.sync.set_source(source);
            tracing::info!(?source, "Sync source changed");
            Ok(())
        })
    }

    // --- Pattern selection ---

    /// Toggle `index` in the patterns queued for the next boundary.
    pub fn set_next_pattern(&self, index: usize) -> Result<()> {
        self.with_core(|core| {
            core.require_pattern(index)?;
            core.selection.set_next_pattern(index);
            Ok(())
        })
    }

    /// Queue a change so only `index` plays after the next boundary.
    pub fn set_only_next_pattern(&self, index: usize) -> Result<()> {
        self.with_core(|core| {
            core.require_pattern(index)?;
            core.selection.set_only_next_pattern(index);
            Ok(())
        })
    }

    /// Drop pattern changes queued for the next boundary.
    pub fn clear_next_patterns(&self) -> Result<()> {
        self.with_core(|core| {
            core.require_song()?;
            core.selection.clear_next();
            Ok(())
        })
    }

    pub fn set_selected_pattern(&self, index: Option<usize>) -> Result<()> {
        self.with_core(|core| {
            if let Some(index) = index {
                core.require_pattern(index)?;
            }
            core.selection.set_selected(index);
            Ok(())
        })
    }

    /// Returns the new value.
    pub fn toggle_plays_selected(&self) -> Result<bool> {
        self.with_core(|core| Ok(core.selection.toggle_plays_selected()))
    }

    pub fn set_append_mode(&self, append: bool) -> Result<()> {
        self.with_core(|core| {
            core.selection.set_append_mode(append);
            Ok(())
        })
    }

    /// Forget the current pattern pass. The next scanned tick starts a new
    /// one, aligned down to a multiple of the pattern length.
    pub fn reset_pattern_start_tick(&self) -> Result<()> {
        self.with_core(|core| {
            core.selection.set_pattern_start_tick(None);
            Ok(())
        })
    }

    /// Playing patterns, or `None` if the lock is busy.
    pub fn try_playing_patterns(&self) -> Option<PatternSet> {
        let core = self.core.try_lock()?;
        Some(PatternSet::from_slice(core.selection.playing()))
    }

    // --- Live input ---

    /// Play a note as soon as possible. Lock-free; callable from any thread.
    pub fn note_on(&self, note: LiveNote) -> Result<()> {
        self.live.push(LiveEntry {
            note,
            tick: self.published.live_tick.load(Ordering::Acquire),
            epoch: self.published.epoch.load(Ordering::Acquire),
        })
    }

    /// Producer handle for input threads.
    pub fn live_input(&self) -> LiveInputSender {
        self.live.clone()
    }

    /// Place a live note into the playing pattern.
    ///
    /// Returns the note to write when recording while rolling; the engine
    /// does not edit the song itself but emits [`EngineEvent::NoteRecorded`]
    /// (and [`EngineEvent::NotesErased`] for destructive recording). Otherwise
    /// the note is just played.
    pub fn record_note(
        &self,
        note: LiveNote,
        settings: &RecordSettings,
    ) -> Result<Option<RecordedNote>> {
        self.with_core(|core| {
            let song = Arc::clone(core.require_song()?);
            let target = if settings.record && core.transport.is_rolling() {
                core.record_target(&song)
            } else {
                None
            };
            let Some((pattern, local, length)) = target else {
                self.live.push(core.live_entry(note))?;
                return Ok(None);
            };

            let column = settings.quantize_column(local, song.resolution, length);
            if let Some(pre) = settings.pre_delete {
                let window = deletion_window(pre, settings.post_delete, column, length);
                core.pending.push(EngineEvent::NotesErased(ErasedNotes {
                    pattern,
                    start: window.start,
                    end: window.end,
                    instrument: (!window.all_instruments).then_some(note.instrument),
                }));
            }
            let replaces_existing = song
                .patterns
                .get(pattern)
                .is_some_and(|p| p.has_note_at(column, note.instrument));
            let recorded = RecordedNote {
                pattern,
                column,
                instrument: note.instrument,
                velocity: note.velocity,
                pan: note.pan,
                pitch: note.pitch,
                length: note.length,
                note_off: note.note_off,
                replaces_existing,
            };
            core.pending.push(EngineEvent::NoteRecorded(recorded));

            // A note quantized into the future sounds when the pattern plays it.
            if settings.hear_new_notes && column <= local {
                self.live.push(core.live_entry(note))?;
            }
            Ok(Some(recorded))
        })
    }

    // --- Accessors ---

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metronome(&self) -> &Arc<Metronome> {
        &self.metronome
    }

    pub fn sync_state(&self) -> &Arc<SyncState> {
        &self.sync
    }

    pub fn output(&self) -> &OutputBus {
        &self.output
    }

    /// New receiver for engine events. Receivers share one queue.
    pub fn events(&self) -> Receiver<EngineEvent> {
        self.events.receiver()
    }

    /// Events dropped because the queue was full.
    pub fn dropped_events(&self) -> u64 {
        self.events.dropped()
    }

    /// Last published position. Never blocks.
    pub fn position(&self) -> PlaybackPosition {
        self.published.snapshot()
    }

    pub fn state(&self) -> EngineState {
        self.position().state
    }

    /// Blocking access to the core. Not for the audio thread.
    #[track_caller]
    pub fn lock(&self) -> EngineGuard<'_, EngineCore> {
        self.core.lock()
    }

    #[track_caller]
    pub fn try_lock(&self) -> Option<EngineGuard<'_, EngineCore>> {
        self.core.try_lock()
    }

    /// Callbacks skipped because the lock was busy.
    pub fn lock_timeouts(&self) -> u64 {
        self.core.timeouts()
    }

    /// Replace the renderer, e.g. after a device change.
    pub fn set_renderer(&self, renderer: Box<dyn NoteRenderer>) -> Result<()> {
        self.with_core(|core| {
            core.renderer.stop_all();
            core.renderer = renderer;
            Ok(())
        })
    }
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("position", &self.position())
            .field("lock", &self.core)
            .finish()
    }
}
