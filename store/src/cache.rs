use std::collections::HashMap;
use std::time::{Duration, Instant};

use structures::{Coord, Pixel};

struct CacheEntry {
    pixel: Pixel,
    fetched_at: Instant,
}

/// Time-boxed cache of single-pixel lookups. Never the source of truth: an
/// entry older than the TTL is treated as absent.
pub struct PixelCache {
    entries: HashMap<Coord, CacheEntry>,
    ttl: Duration,
}

impl PixelCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, coord: Coord, now: Instant) -> Option<&Pixel> {
        let entry = self.entries.get(&coord)?;

        if now.saturating_duration_since(entry.fetched_at) >= self.ttl {
            return None;
        }

        Some(&entry.pixel)
    }

    pub fn insert(&mut self, pixel: Pixel, now: Instant) {
        self.entries.insert(
            pixel.coord(),
            CacheEntry {
                pixel,
                fetched_at: now,
            },
        );
    }

    pub fn invalidate(&mut self, coord: Coord) -> bool {
        self.entries.remove(&coord).is_some()
    }

    /// Drops expired entries, returning how many were removed.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.fetched_at) < ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
