#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use place::CanvasState;
use store::{MemoryStore, PixelStore, PixelStoreAdapter, StoreError};
use structures::{CanvasConfig, Coord, PersistenceMode, Pixel};

/// Memory store that counts calls and can be switched off.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub upserts: AtomicUsize,
    pub lookups: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    /// Milliseconds every single-row lookup takes.
    pub lookup_delay_ms: AtomicU64,
}

impl FlakyStore {
    pub fn set_offline(&self, offline: bool) {
        self.fail_reads.store(offline, Ordering::SeqCst);
        self.fail_writes.store(offline, Ordering::SeqCst);
    }

    fn offline() -> StoreError {
        StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "store offline",
        ))
    }
}

impl PixelStore for FlakyStore {
    fn fetch_all(&self, limit: Option<usize>) -> Result<Vec<Pixel>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::offline());
        }
        self.inner.fetch_all(limit)
    }

    fn fetch_one(&self, coord: Coord) -> Result<Option<Pixel>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let delay = self.lookup_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::offline());
        }
        self.inner.fetch_one(coord)
    }

    fn upsert(&self, pixel: &Pixel) -> Result<(), StoreError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::offline());
        }
        self.inner.upsert(pixel)
    }

    fn open_feed(&self) -> Result<Receiver<Pixel>, StoreError> {
        self.inner.open_feed()
    }
}

pub fn config(grid_size: u16, persistence: PersistenceMode) -> CanvasConfig {
    CanvasConfig {
        grid_size,
        persistence,
        ..CanvasConfig::default()
    }
}

pub fn session(store: Arc<dyn PixelStore>, config: CanvasConfig) -> CanvasState {
    let _ = env_logger::builder().is_test(true).try_init();

    let adapter = PixelStoreAdapter::new(store, &config);
    let mut canvas = CanvasState::new(adapter, config);
    canvas.initialize();
    canvas
}
