use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;

use parking_lot::Mutex;
use structures::{Coord, Pixel};

use crate::broadcast::FeedBroadcaster;
use crate::{PixelStore, StoreError};

/// Keeps the pixel table in process memory. Used for ephemeral sessions and
/// tests; several sessions can share one instance behind an `Arc`.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<Coord, Pixel>>,
    feed: FeedBroadcaster,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    /// Number of feed channels not yet pruned.
    pub fn open_channels(&self) -> usize {
        self.feed.channel_count()
    }
}

impl PixelStore for MemoryStore {
    fn fetch_all(&self, limit: Option<usize>) -> Result<Vec<Pixel>, StoreError> {
        let rows = self.rows.lock();

        Ok(rows
            .values()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    fn fetch_one(&self, coord: Coord) -> Result<Option<Pixel>, StoreError> {
        Ok(self.rows.lock().get(&coord).cloned())
    }

    fn upsert(&self, pixel: &Pixel) -> Result<(), StoreError> {
        // Publishing under the row lock keeps feed order equal to write order
        let mut rows = self.rows.lock();
        rows.insert(pixel.coord(), pixel.clone());
        self.feed.publish(pixel);
        Ok(())
    }

    fn open_feed(&self) -> Result<Receiver<Pixel>, StoreError> {
        Ok(self.feed.open())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use chrono::Utc;
    use rand::Rng;
    use structures::HexColor;

    use super::*;

    #[test]
    fn upsert_keeps_one_row_per_coordinate() {
        let store = MemoryStore::new();
        let mut rng = rand::thread_rng();
        let mut last = BTreeMap::new();

        for _ in 0..500 {
            let coord = Coord::new(rng.gen_range(0..8), rng.gen_range(0..8));
            let color = HexColor::from_rgb(rng.gen(), rng.gen(), rng.gen());
            let pixel = Pixel::new(coord, color, Some("rng"), Utc::now());

            store.upsert(&pixel).unwrap();
            last.insert(coord, pixel);
        }

        assert_eq!(store.len(), last.len());
        for (coord, pixel) in last {
            assert_eq!(store.fetch_one(coord).unwrap(), Some(pixel));
        }
    }

    #[test]
    fn fetch_all_honors_limit() {
        let store = MemoryStore::new();
        for x in 0..10 {
            let pixel = Pixel::new(Coord::new(x, 0), HexColor::from_rgb(0, 0, 0), None, Utc::now());
            store.upsert(&pixel).unwrap();
        }

        assert_eq!(store.fetch_all(None).unwrap().len(), 10);
        assert_eq!(store.fetch_all(Some(4)).unwrap().len(), 4);
    }

    #[test]
    fn last_feed_event_matches_stored_row_under_contention() {
        let store = Arc::new(MemoryStore::new());
        let feed = store.open_feed().unwrap();
        let coord = Coord::new(0, 0);

        let writers: Vec<_> = (0..4u8)
            .map(|writer| {
                let store = store.clone();
                thread::spawn(move || {
                    for round in 0..100u8 {
                        let color = HexColor::from_rgb(writer, round, 0);
                        let pixel = Pixel::new(coord, color, None, Utc::now());
                        store.upsert(&pixel).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let events: Vec<Pixel> = feed.try_iter().collect();
        assert_eq!(events.len(), 400);
        assert_eq!(events.last().cloned(), store.fetch_one(coord).unwrap());
    }

    #[test]
    fn feed_channels_are_pruned_after_receiver_drops() {
        let store = MemoryStore::new();
        let kept = store.open_feed().unwrap();
        let dropped = store.open_feed().unwrap();
        drop(dropped);
        assert_eq!(store.open_channels(), 2);

        let pixel = Pixel::new(Coord::new(1, 1), HexColor::from_rgb(1, 1, 1), None, Utc::now());
        store.upsert(&pixel).unwrap();

        assert_eq!(store.open_channels(), 1);
        assert_eq!(kept.try_recv().unwrap(), pixel);
    }
}
