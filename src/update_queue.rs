use std::collections::HashMap;
use std::mem::take;
use std::time::Duration;

use structures::{Coord, Pixel};

/// Remote updates waiting to be written onto the grid, coalesced by
/// coordinate so only the last event per cell survives a flush.
#[derive(Debug)]
pub struct UpdateQueue {
    pending: HashMap<Coord, Pixel>,
    capacity: usize,
    flush_interval: Duration,
    since_flush: Duration,
}

impl UpdateQueue {
    pub fn new(flush_interval: Duration, capacity: usize) -> Self {
        Self {
            pending: HashMap::new(),
            capacity: capacity.max(1),
            flush_interval,
            since_flush: Duration::ZERO,
        }
    }

    pub fn push(&mut self, pixel: Pixel) {
        self.pending.insert(pixel.coord(), pixel);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.capacity
    }

    /// Lets `dt` pass and reports whether a flush is due.
    pub fn advance(&mut self, dt: Duration) -> bool {
        self.since_flush += dt;
        !self.pending.is_empty() && (self.is_full() || self.since_flush >= self.flush_interval)
    }

    pub fn drain(&mut self) -> Vec<Pixel> {
        self.since_flush = Duration::ZERO;
        take(&mut self.pending).into_values().collect()
    }
}
