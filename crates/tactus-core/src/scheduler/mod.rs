//! Note scheduling.
//!
//! Once per callback [`NoteScheduler::update_note_queue`] walks every tick
//! between the end of the previous scan and the end of the lookahead window,
//! resolves the patterns playing at each tick, and queues their notes with
//! swing, humanize and lead/lag offsets applied. The callback then pops the
//! notes whose effective frame falls inside its buffer.
//!
//! While the transport rolls the scan is contiguous: each tick is visited
//! exactly once, whatever the buffer sizes and across tempo changes. A start
//! or relocate restarts the scan at the playback position without looking
//! backwards.

pub mod humanize;
pub mod live_input;
pub mod note;
pub mod recording;
pub mod selection;

pub use humanize::{lead_lag_offset, swing_offset, Humanizer};
pub use live_input::{LiveEntry, LiveInputQueue, LiveInputSender, LiveNote};
pub use note::{NoteQueue, NoteSource, ScheduledNote};
pub use recording::{
    deletion_window, DeletionWindow, PostDelete, PreDelete, RecordSettings, Span,
};
pub use selection::{PatternSelection, PatternSet};

use crate::events::{EngineEvent, PendingEvents};
use crate::song::{InstrumentId, PatternTimeline, Song, SongMode};
use crate::transport::clock::{self, frames_to_ticks, ticks_to_frames};
use crate::transport::{Metronome, TransportState};

/// Outcome of one scheduling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    Normal,
    /// At least one pattern boundary or column change was crossed.
    PatternChanged,
    /// Song mode without loop: playback has reached the end of the timeline.
    EndOfSong,
}

/// Everything the scheduler reads or updates besides its own queues.
/// Borrowed from the engine core for the duration of one pass.
pub(crate) struct ScanContext<'a> {
    pub transport: &'a mut TransportState,
    pub selection: &'a mut PatternSelection,
    pub song: Option<&'a Song>,
    pub timeline: &'a PatternTimeline,
    pub metronome: &'a Metronome,
    /// An external timebase master owns the tempo.
    pub tempo_locked: bool,
    /// Frames processed since the engine was prepared, rolling or not.
    pub realtime_frame: u64,
    pub epoch: u64,
    pub events: &'a mut PendingEvents,
}

pub struct NoteScheduler {
    queue: NoteQueue,
    humanizer: Humanizer,
    live: LiveInputQueue,
    /// First tick not yet scanned, `None` after start/stop/relocate.
    next_scan_tick: Option<u64>,
    /// First tick past the end of a non-looping song, once the scan found it.
    song_end_tick: Option<u64>,
    max_humanize_frames: u32,
}

impl NoteScheduler {
    /// Returns the scheduler and the producer side of its live input queue.
    pub fn new(
        max_humanize_frames: u32,
        seed: Option<u64>,
        live_capacity: usize,
    ) -> (LiveInputSender, Self) {
        let (sender, live) = LiveInputQueue::new(live_capacity.max(1));
        let humanizer = match seed {
            Some(seed) => Humanizer::new(seed),
            None => Humanizer::from_entropy(),
        };
        let scheduler = Self {
            queue: NoteQueue::with_capacity(256),
            humanizer,
            live,
            next_scan_tick: None,
            song_end_tick: None,
            max_humanize_frames,
        };
        (sender, scheduler)
    }

    pub fn queue(&self) -> &NoteQueue {
        &self.queue
    }

    pub fn seed(&self) -> u64 {
        self.humanizer.seed()
    }

    pub fn max_humanize_frames(&self) -> u32 {
        self.max_humanize_frames
    }

    pub fn lookahead_frames(&self, tick_size: f64) -> i64 {
        clock::lookahead_frames(tick_size, self.max_humanize_frames)
    }

    /// Live notes not yet released to the queue.
    pub fn live_pending(&self) -> usize {
        self.live.pending()
    }

    pub fn song_end_tick(&self) -> Option<u64> {
        self.song_end_tick
    }

    /// Next queued note starting before `frame`.
    pub fn pop_due(&mut self, frame: i64) -> Option<ScheduledNote> {
        self.queue.pop_before(frame)
    }

    /// Forget scan continuity and the end-of-song marker.
    pub(crate) fn reset_scan(&mut self) {
        self.next_scan_tick = None;
        self.song_end_tick = None;
    }

    pub(crate) fn clear_song_end(&mut self) {
        self.song_end_tick = None;
    }

    /// Drop scheduled timeline notes and clicks; live notes stay queued.
    pub(crate) fn drop_scheduled(&mut self) {
        self.queue.retain(|n| n.source == NoteSource::Live);
    }

    /// Move queued timeline notes and clicks onto the transport's current
    /// tick/frame map, keeping their offsets. Live notes keep their frames.
    pub(crate) fn retime(&mut self, transport: &TransportState) {
        let position = transport.frame() as i64;
        self.queue.retime(|note| match note.source {
            NoteSource::Live => note.effective_frame,
            NoteSource::Pattern(_) | NoteSource::Metronome => {
                let nominal = transport.frame_of_tick(note.onset_tick);
                (nominal + note.timing_offset_frames as i64).max(position)
            }
        });
    }

    /// Drop everything, including live input not yet released.
    pub(crate) fn clear(&mut self) {
        self.queue.clear();
        self.live.clear();
        self.reset_scan();
    }

    /// Queue the notes for a buffer of `n_frames` starting at the current
    /// playback position.
    pub(crate) fn update_note_queue(&mut self, ctx: ScanContext<'_>, n_frames: u32) -> QueueStatus {
        let ScanContext {
            transport,
            selection,
            song,
            timeline,
            metronome,
            tempo_locked,
            realtime_frame,
            epoch,
            events,
        } = ctx;
        let tick_size = transport.tick_size();

        let song = match song {
            Some(song) if transport.is_rolling() => song,
            _ => {
                // Stopped: only live input sounds, timed on the realtime clock.
                self.next_scan_tick = None;
                let position = realtime_frame as i64;
                let bound = frames_to_ticks(position + n_frames as i64, tick_size);
                self.drain_live(bound, epoch, position, |tick| {
                    ticks_to_frames(tick as f64, tick_size)
                });
                return QueueStatus::Normal;
            }
        };

        let position = transport.frame();
        let lookahead = self.lookahead_frames(tick_size).max(0) as u64;
        let start = self.next_scan_tick.unwrap_or_else(|| {
            // Fresh scan: first tick not already behind the playback position.
            let tick = transport.tick_at(position);
            if transport.frame_of_tick(tick) < position as i64 {
                tick + 1
            } else {
                tick
            }
        });
        let horizon = position + n_frames as u64 + lookahead;
        let mut end = (transport.tick_at(horizon) + 1).max(start);

        {
            let transport = &*transport;
            self.drain_live(end.saturating_sub(1).max(start), epoch, position as i64, |tick| {
                transport.frame_of_tick(tick)
            });
        }

        let resolution = song.resolution;
        let mut status = QueueStatus::Normal;
        let mut scanned_to = None;

        let mut tick = start;
        while tick < end {
            let local = match song.mode {
                SongMode::Song => {
                    if self.song_end_tick.is_some_and(|end_tick| tick >= end_tick) {
                        scanned_to = Some(tick);
                        break;
                    }
                    let Some(loc) = timeline.locate(tick, song.loop_enabled) else {
                        self.song_end_tick = Some(tick);
                        scanned_to = Some(tick);
                        tracing::debug!(tick, "Scan reached the end of the song");
                        break;
                    };
                    if selection.song_pos() != Some(loc.column) || loc.local_tick == 0 {
                        let column = song
                            .pattern_groups
                            .get(loc.column)
                            .map_or(&[][..], Vec::as_slice);
                        selection.replace_playing(song, column);
                        selection.apply_next(song);
                        selection.set_song_pos(Some(loc.column));
                        selection.set_pattern_start_tick(Some(loc.start_tick));
                        events.push(EngineEvent::PatternChanged {
                            column: Some(loc.column),
                        });
                        status = QueueStatus::PatternChanged;
                        tracing::debug!(column = loc.column, tick, "Column changed");

                        if song.use_timeline_bpm && !tempo_locked {
                            let bpm = song.bpm_at_column(loc.column);
                            let column_start = loc.start_tick;
                            if bpm != transport.bpm_at(column_start) {
                                match transport.schedule_tempo(column_start, bpm) {
                                    Ok(true) => {
                                        self.retime(transport);
                                        events.push(EngineEvent::TempoChanged { bpm });
                                        tracing::debug!(bpm, tick, "Timeline tempo applied");
                                    }
                                    Ok(false) => {
                                        tracing::debug!(bpm, tick = column_start, "Timeline tempo scheduled");
                                    }
                                    Err(e) => {
                                        tracing::warn!(column = loc.column, "Ignoring tempo marker: {}", e);
                                    }
                                }
                                // The window now spans ticks at the new tempo.
                                end = end.max(transport.tick_at(horizon) + 1);
                            }
                        }
                    }
                    loc.local_tick
                }
                SongMode::Pattern => {
                    let mut pattern_start = selection.pattern_start_tick();
                    let size = pattern_size(song, selection);
                    if pattern_start.map_or(true, |s| tick >= s + size) {
                        if selection.plays_selected() {
                            if let Some(selected) = selection.selected() {
                                selection.replace_playing(song, &[selected]);
                            }
                        } else {
                            selection.apply_next(song);
                        }
                        let new_start = match pattern_start {
                            // Playback started mid-pattern: align to the pattern grid.
                            None => tick - tick % pattern_size(song, selection),
                            Some(_) => tick,
                        };
                        selection.set_pattern_start_tick(Some(new_start));
                        pattern_start = Some(new_start);
                        events.push(EngineEvent::PatternChanged { column: None });
                        status = QueueStatus::PatternChanged;
                    }
                    tick - pattern_start.unwrap_or(tick)
                }
            };

            let nominal = transport.frame_of_tick(tick);
            let tick_size = transport.tick_size_at(tick);

            for &index in selection.playing() {
                let Some(pattern) = song.patterns.get(index) else {
                    continue;
                };
                if local >= pattern.length {
                    continue;
                }
                for note in pattern.notes_at(local) {
                    if !self.humanizer.passes(note.probability) {
                        continue;
                    }
                    let mut offset = swing_offset(local, resolution, tick_size, song.swing_factor);
                    if song.humanize_time != 0.0 {
                        offset += self
                            .humanizer
                            .time_offset(song.humanize_time, self.max_humanize_frames);
                    }
                    offset += lead_lag_offset(note.lead_lag, tick_size);
                    if tick == 0 && offset < 0.0 {
                        offset = 0.0;
                    }

                    let (velocity, pitch) = if note.note_off {
                        (note.velocity, note.pitch)
                    } else {
                        let pitch_factor = song
                            .instrument(note.instrument)
                            .map_or(0.0, |i| i.random_pitch_factor);
                        (
                            self.humanizer.velocity(note.velocity, song.humanize_velocity),
                            self.humanizer.pitch(note.pitch, pitch_factor),
                        )
                    };

                    self.queue.push(ScheduledNote {
                        instrument: note.instrument,
                        source: NoteSource::Pattern(index),
                        onset_tick: tick,
                        effective_frame: nominal + offset as i64,
                        velocity,
                        pan: note.pan,
                        pitch,
                        length: note.length,
                        lead_lag: note.lead_lag,
                        timing_offset_frames: offset as f32,
                        probability: note.probability,
                        note_off: note.note_off,
                    });
                }
            }

            if let Some(click) = metronome.click_at(local, resolution) {
                events.push(EngineEvent::Metronome {
                    accent: click.accent,
                });
                if metronome.is_enabled() {
                    self.queue.push(ScheduledNote {
                        instrument: InstrumentId::METRONOME,
                        source: NoteSource::Metronome,
                        onset_tick: tick,
                        effective_frame: nominal,
                        velocity: click.velocity,
                        pan: 0.0,
                        pitch: click.pitch,
                        length: -1,
                        lead_lag: 0.0,
                        timing_offset_frames: 0.0,
                        probability: 1.0,
                        note_off: false,
                    });
                }
            }
            tick += 1;
        }

        // Ticks past the song end stay unscanned in case looping is enabled later.
        self.next_scan_tick = Some(scanned_to.unwrap_or(end));

        match self.song_end_tick {
            Some(end_tick) if transport.tick_at(position + n_frames as u64) >= end_tick => {
                QueueStatus::EndOfSong
            }
            _ => status,
        }
    }

    fn drain_live(
        &mut self,
        bound: u64,
        epoch: u64,
        position: i64,
        frame_of_tick: impl Fn(u64) -> i64,
    ) {
        while let Some(entry) = self.live.pop_due(bound, epoch) {
            let effective_frame = if entry.epoch == epoch {
                frame_of_tick(entry.tick).max(position)
            } else {
                position
            };
            let note = entry.note;
            self.queue.push(ScheduledNote {
                instrument: note.instrument,
                source: NoteSource::Live,
                onset_tick: entry.tick,
                effective_frame,
                velocity: note.velocity,
                pan: note.pan,
                pitch: note.pitch,
                length: note.length,
                lead_lag: 0.0,
                timing_offset_frames: 0.0,
                probability: 1.0,
                note_off: note.note_off,
            });
        }
    }
}

/// Length of the pattern pass in pattern mode: the first playing pattern,
/// or one bar when nothing plays.
fn pattern_size(song: &Song, selection: &PatternSelection) -> u64 {
    selection
        .playing()
        .first()
        .and_then(|&p| song.patterns.get(p))
        .map_or(clock::default_pattern_length(song.resolution), |p| {
            p.length.max(1)
        })
}
