//! Authoritative playback position.

use super::clock::{self, frames_to_ticks, ticks_to_frames, DEFAULT_RESOLUTION};
use crate::{Error, Result};
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportStatus {
    #[default]
    Stopped,
    Rolling,
}

/// Tempo switch taking effect when playback reaches `tick`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoChange {
    pub tick: u64,
    pub bpm: f64,
}

/// Linear piece of the tick/frame map.
#[derive(Debug, Clone, Copy)]
struct Segment {
    frame: i64,
    tick: u64,
    tick_size: f64,
}

impl Segment {
    fn frame_of_tick(&self, tick: u64) -> i64 {
        self.frame + ticks_to_frames(tick as f64 - self.tick as f64, self.tick_size)
    }
}

/// Frame/tick position and tempo of the transport.
///
/// `frame` is authoritative. `tick` is always derived from it through a tempo
/// anchor `(anchor_frame, anchor_tick)`: the position at which the current tick
/// size took effect. A tempo change re-anchors at the current frame, so the
/// real-time position never jumps and the tick count stays continuous.
///
/// Tempo changes scheduled at a future tick extend the map piecewise: ticks
/// past the change are timed at its tempo before playback gets there, and
/// [`advance`](Self::advance) moves the anchor onto the change once the
/// frame reaches it.
///
/// All mutation happens under the engine lock.
#[derive(Debug, Clone)]
pub struct TransportState {
    frame: u64,
    tick: u64,
    tick_size: f64,
    bpm: f64,
    resolution: u32,
    sample_rate: f64,
    status: TransportStatus,
    anchor_frame: u64,
    anchor_tick: u64,
    /// Sorted by tick, all at or after the anchor.
    scheduled: SmallVec<[TempoChange; 4]>,
}

impl TransportState {
    pub fn new(sample_rate: f64, bpm: f64, resolution: u32) -> Self {
        Self {
            frame: 0,
            tick: 0,
            tick_size: clock::tick_size(sample_rate, bpm, resolution),
            bpm,
            resolution,
            sample_rate,
            status: TransportStatus::Stopped,
            anchor_frame: 0,
            anchor_tick: 0,
            scheduled: SmallVec::new(),
        }
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    #[inline]
    pub fn tick_size(&self) -> f64 {
        self.tick_size
    }

    #[inline]
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    #[inline]
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn status(&self) -> TransportStatus {
        self.status
    }

    #[inline]
    pub fn is_rolling(&self) -> bool {
        self.status == TransportStatus::Rolling
    }

    pub fn scheduled_tempo_changes(&self) -> &[TempoChange] {
        &self.scheduled
    }

    fn anchor(&self) -> Segment {
        Segment {
            frame: self.anchor_frame as i64,
            tick: self.anchor_tick,
            tick_size: self.tick_size,
        }
    }

    /// The piece following `segment` at `change`.
    fn next_segment(&self, segment: &Segment, change: &TempoChange) -> Segment {
        Segment {
            frame: segment.frame_of_tick(change.tick),
            tick: change.tick,
            tick_size: clock::tick_size(self.sample_rate, change.bpm, self.resolution),
        }
    }

    fn segment_for_tick(&self, tick: u64) -> Segment {
        let mut segment = self.anchor();
        for change in self.scheduled.iter().take_while(|c| c.tick <= tick) {
            segment = self.next_segment(&segment, change);
        }
        segment
    }

    fn segment_for_frame(&self, frame: u64) -> Segment {
        let mut segment = self.anchor();
        for change in &self.scheduled {
            let next = self.next_segment(&segment, change);
            if next.frame > frame as i64 {
                break;
            }
            segment = next;
        }
        segment
    }

    /// Tick at an absolute frame.
    pub fn tick_at(&self, frame: u64) -> u64 {
        let segment = self.segment_for_frame(frame);
        let delta = frame as i64 - segment.frame;
        if delta >= 0 {
            segment.tick + frames_to_ticks(delta, segment.tick_size)
        } else {
            let back = (-delta as f64 / segment.tick_size).ceil() as u64;
            segment.tick.saturating_sub(back)
        }
    }

    /// Nominal frame of a tick.
    pub fn frame_of_tick(&self, tick: u64) -> i64 {
        self.segment_for_tick(tick).frame_of_tick(tick)
    }

    /// Frames per tick in effect at `tick`.
    pub fn tick_size_at(&self, tick: u64) -> f64 {
        self.segment_for_tick(tick).tick_size
    }

    /// Tempo in effect at `tick`, scheduled changes included.
    pub fn bpm_at(&self, tick: u64) -> f64 {
        self.scheduled
            .iter()
            .rev()
            .find(|c| c.tick <= tick)
            .map_or(self.bpm, |c| c.bpm)
    }

    pub fn start(&mut self, at_frame: u64) {
        self.status = TransportStatus::Rolling;
        self.reset_anchor(at_frame);
    }

    pub fn stop(&mut self) {
        self.status = TransportStatus::Stopped;
        self.scheduled.clear();
    }

    pub fn relocate(&mut self, frame: u64) {
        self.reset_anchor(frame);
    }

    /// Advance by one buffer while rolling, taking over scheduled tempo
    /// changes the new frame has reached.
    pub fn advance(&mut self, frames: u64) {
        if !self.is_rolling() {
            return;
        }
        self.frame += frames;
        while let Some(change) = self.scheduled.first().copied() {
            let next = self.next_segment(&self.anchor(), &change);
            if next.frame > self.frame as i64 {
                break;
            }
            self.scheduled.remove(0);
            self.anchor_frame = next.frame.max(0) as u64;
            self.anchor_tick = next.tick;
            self.tick_size = next.tick_size;
            self.bpm = change.bpm;
        }
        self.tick = self.tick_at(self.frame);
    }

    /// Switch to `bpm` as of `tick`.
    ///
    /// A tick the playback has already reached takes the tempo right away
    /// and returns `true`; a later tick is kept until [`advance`](Self::advance)
    /// gets there.
    pub fn schedule_tempo(&mut self, tick: u64, bpm: f64) -> Result<bool> {
        if !clock::is_valid_bpm(bpm) {
            return Err(Error::InvalidTempo(bpm));
        }
        if tick <= self.tick {
            self.bpm = bpm;
            self.recompute_tick_size();
            return Ok(true);
        }
        let at = self.scheduled.partition_point(|c| c.tick < tick);
        // Changes past `tick` are scheduled again by the scan that reaches them.
        self.scheduled.truncate(at);
        self.scheduled.push(TempoChange { tick, bpm });
        Ok(false)
    }

    pub fn clear_scheduled_tempo(&mut self) {
        self.scheduled.clear();
    }

    /// Store a new tempo. The tick size follows on the next
    /// [`recompute_tick_size`](Self::recompute_tick_size).
    pub fn set_bpm(&mut self, bpm: f64) -> Result<()> {
        if !clock::is_valid_bpm(bpm) {
            return Err(Error::InvalidTempo(bpm));
        }
        self.bpm = bpm;
        Ok(())
    }

    pub fn set_resolution(&mut self, resolution: u32) -> Result<()> {
        if resolution == 0 || resolution > clock::MAX_RESOLUTION {
            return Err(Error::InvalidResolution(resolution));
        }
        self.resolution = resolution;
        Ok(())
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) -> Result<()> {
        crate::config::validate_sample_rate(sample_rate)?;
        self.sample_rate = sample_rate;
        Ok(())
    }

    /// Re-derive the tick size from sample rate, tempo and resolution.
    ///
    /// Keeps `frame` fixed and re-anchors there, so only `tick` is
    /// resynchronised. Returns `true` when the tick size changed.
    pub fn recompute_tick_size(&mut self) -> bool {
        let new_size = clock::tick_size(self.sample_rate, self.bpm, self.resolution);
        if (new_size - self.tick_size).abs() <= f64::EPSILON * self.tick_size {
            return false;
        }
        self.anchor_tick = self.tick_at(self.frame);
        self.anchor_frame = self.frame;
        self.tick_size = new_size;
        self.tick = self.anchor_tick;
        true
    }

    /// Back to the origin anchor: ticks fall on the plain `tick * tick_size` grid.
    fn reset_anchor(&mut self, frame: u64) {
        self.frame = frame;
        self.anchor_frame = 0;
        self.anchor_tick = 0;
        self.scheduled.clear();
        self.tick = frames_to_ticks(frame as i64, self.tick_size);
    }
}

impl Default for TransportState {
    fn default() -> Self {
        Self::new(48_000.0, 120.0, DEFAULT_RESOLUTION)
    }
}
