//! Stereo output buffers shared with meters and level displays.
//!
//! The callback renders into its own scratch buffer and then swaps it with
//! the published one under a short write lock. Readers take the read lock
//! and may overlap with each other, never with the swap.

use crate::compat::{RwLock, RwLockReadGuard};
use crate::AtomicFloat;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StereoBuffer {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl StereoBuffer {
    pub fn with_capacity(frames: usize) -> Self {
        Self {
            left: Vec::with_capacity(frames),
            right: Vec::with_capacity(frames),
        }
    }

    /// Resize to `frames` and zero. Never grows past the reserved
    /// capacity; returns the frame count actually cleared.
    pub fn clear(&mut self, frames: usize) -> usize {
        let frames = frames.min(self.capacity_frames());
        self.left.clear();
        self.left.resize(frames, 0.0);
        self.right.clear();
        self.right.resize(frames, 0.0);
        frames
    }

    pub fn frames(&self) -> usize {
        self.left.len()
    }

    /// Frames that fit without reallocating.
    pub fn capacity_frames(&self) -> usize {
        self.left.capacity().min(self.right.capacity())
    }

    pub fn reserve(&mut self, frames: usize) {
        self.left.reserve_exact(frames.saturating_sub(self.left.len()));
        self.right.reserve_exact(frames.saturating_sub(self.right.len()));
    }

    /// Write as interleaved stereo into `out`.
    pub fn interleave_into(&self, out: &mut [f32]) {
        for ((frame, l), r) in out
            .chunks_exact_mut(2)
            .zip(self.left.iter())
            .zip(self.right.iter())
        {
            frame[0] = *l;
            frame[1] = *r;
        }
    }

    fn peaks(&self) -> (f32, f32) {
        let peak = |s: &[f32]| s.iter().fold(0.0f32, |m, x| m.max(x.abs()));
        (peak(&self.left), peak(&self.right))
    }
}

#[derive(Debug, Default)]
pub struct OutputBus {
    published: RwLock<StereoBuffer>,
    peak_left: AtomicFloat,
    peak_right: AtomicFloat,
}

impl OutputBus {
    pub fn new(frames: usize) -> Self {
        Self {
            published: RwLock::new(StereoBuffer::with_capacity(frames)),
            peak_left: AtomicFloat::new(0.0),
            peak_right: AtomicFloat::new(0.0),
        }
    }

    /// Last published buffer.
    pub fn read(&self) -> RwLockReadGuard<'_, StereoBuffer> {
        self.published.read()
    }

    /// Make room for buffers of `frames` in the published slot.
    pub(crate) fn reserve(&self, frames: usize) {
        self.published.write().reserve(frames);
    }

    /// Peak levels since the last reset.
    pub fn peaks(&self) -> (f32, f32) {
        (self.peak_left.get(), self.peak_right.get())
    }

    pub fn reset_peaks(&self) {
        self.peak_left.set(0.0);
        self.peak_right.set(0.0);
    }

    /// Update peaks from `buffer` and swap it into the published slot.
    ///
    /// Skipped when a reader holds the lock; the meters miss one buffer.
    pub(crate) fn publish(&self, buffer: &mut StereoBuffer) -> bool {
        let (l, r) = buffer.peaks();
        self.peak_left.fetch_max(l);
        self.peak_right.fetch_max(r);
        match self.published.try_write() {
            Some(mut published) => {
                std::mem::swap(&mut *published, buffer);
                true
            }
            None => false,
        }
    }
}
