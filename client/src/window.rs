//! Frame-rate measurement over recent frame arrivals

use std::collections::VecDeque;
use std::time::Instant;

/// Fixed-capacity FIFO of recent frame delivery times
#[derive(Debug, Clone)]
pub struct TimestampWindow {
    stamps: VecDeque<Instant>,
    capacity: usize,
}

impl TimestampWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            stamps: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Record a delivery, evicting the oldest entry once over capacity
    pub fn push(&mut self, at: Instant) {
        self.stamps.push_back(at);
        while self.stamps.len() > self.capacity {
            self.stamps.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn clear(&mut self) {
        self.stamps.clear();
    }

    pub fn oldest(&self) -> Option<Instant> {
        self.stamps.front().copied()
    }

    pub fn newest(&self) -> Option<Instant> {
        self.stamps.back().copied()
    }

    /// Frames per second across the window span.
    ///
    /// Needs at least two entries. A zero-length span (all entries on the
    /// same instant) gives no estimate rather than an infinite one.
    pub fn fps(&self) -> Option<f64> {
        let (oldest, newest) = (self.oldest()?, self.newest()?);
        let intervals = self.stamps.len().checked_sub(1).filter(|n| *n > 0)?;
        let span = newest.duration_since(oldest).as_secs_f64();
        if span <= 0.0 {
            return None;
        }
        Some(intervals as f64 / span)
    }
}

/// Rolling sum of fps samples between two rate adaptations
#[derive(Debug, Clone, Default)]
pub struct FpsAccumulator {
    sum: f64,
    count: u32,
}

impl FpsAccumulator {
    pub fn add(&mut self, fps: f64) {
        self.sum += fps;
        self.count += 1;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }

    pub fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }
}
