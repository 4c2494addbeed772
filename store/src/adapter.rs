use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use log::{debug, warn};
use parking_lot::Mutex;
use structures::{CanvasConfig, Coord, HexColor, Pixel};

use crate::{PixelCache, PixelStore, StoreError};

/// Front door to the pixel table for one session.
///
/// Every store failure is logged here and turned into `None` or `false`;
/// callers never see a `StoreError` except through [`try_fetch_one`].
///
/// [`try_fetch_one`]: PixelStoreAdapter::try_fetch_one
#[derive(Clone)]
pub struct PixelStoreAdapter {
    store: Arc<dyn PixelStore>,
    cache: Arc<Mutex<PixelCache>>,
    grid_size: u16,
    fetch_limit: Option<usize>,
}

impl PixelStoreAdapter {
    pub fn new(store: Arc<dyn PixelStore>, config: &CanvasConfig) -> Self {
        Self {
            store,
            cache: Arc::new(Mutex::new(PixelCache::new(config.cache_ttl()))),
            grid_size: config.grid_size,
            fetch_limit: config.fetch_limit,
        }
    }

    pub fn store(&self) -> &Arc<dyn PixelStore> {
        &self.store
    }

    pub fn grid_size(&self) -> u16 {
        self.grid_size
    }

    /// Every stored pixel inside the grid, up to the configured row cap.
    pub fn fetch_all(&self) -> Option<Vec<Pixel>> {
        let mut pixels = match self.store.fetch_all(self.fetch_limit) {
            Ok(pixels) => pixels,
            Err(err) => {
                warn!("could not load pixels: {}", err);
                return None;
            }
        };

        let fetched = pixels.len();
        pixels.retain(|pixel| pixel.x < self.grid_size && pixel.y < self.grid_size);
        if pixels.len() != fetched {
            warn!(
                "ignored {} stored pixels outside the {}x{} grid",
                fetched - pixels.len(),
                self.grid_size,
                self.grid_size
            );
        }

        let now = Instant::now();
        let mut cache = self.cache.lock();
        cache.purge_expired(now);
        for pixel in &pixels {
            cache.insert(pixel.clone(), now);
        }

        Some(pixels)
    }

    /// Cached lookup of one cell; `None` when never placed, out of range or
    /// when the store could not be reached.
    pub fn fetch_one(&self, x: i32, y: i32) -> Option<Pixel> {
        let coord = Coord::checked(x, y, self.grid_size)?;

        match self.try_fetch_one(coord) {
            Ok(pixel) => pixel,
            Err(err) => {
                warn!("could not load pixel ({}, {}): {}", x, y, err);
                None
            }
        }
    }

    /// Like [`fetch_one`](Self::fetch_one) but keeps "never placed" and
    /// "store failed" apart.
    pub fn try_fetch_one(&self, coord: Coord) -> Result<Option<Pixel>, StoreError> {
        if let Some(pixel) = self.cache.lock().get(coord, Instant::now()) {
            return Ok(Some(pixel.clone()));
        }

        debug!("cache miss at ({}, {})", coord.x, coord.y);
        let pixel = self.store.fetch_one(coord)?;

        if let Some(pixel) = &pixel {
            self.cache.lock().insert(pixel.clone(), Instant::now());
        }

        Ok(pixel)
    }

    /// Upserts one pixel. The cache sees the new row before the store call
    /// returns; a failed upsert drops that entry again and returns `false`.
    pub fn place(&self, x: i32, y: i32, color: HexColor, author: Option<&str>) -> bool {
        let Some(coord) = Coord::checked(x, y, self.grid_size) else {
            debug!("rejected placement outside the grid at ({}, {})", x, y);
            return false;
        };

        let pixel = Pixel::new(coord, color, author, Utc::now());
        self.cache.lock().insert(pixel.clone(), Instant::now());

        match self.store.upsert(&pixel) {
            Ok(()) => true,
            Err(err) => {
                warn!("could not place pixel at ({}, {}): {}", x, y, err);
                self.cache.lock().invalidate(coord);
                false
            }
        }
    }

    /// Records a row seen on the change feed so lookups serve the new author.
    pub fn observe(&self, pixel: &Pixel) {
        if pixel.x < self.grid_size && pixel.y < self.grid_size {
            self.cache.lock().insert(pixel.clone(), Instant::now());
        }
    }

    pub fn cached_pixels(&self) -> usize {
        self.cache.lock().len()
    }
}
