use std::sync::mpsc::Receiver;

use structures::{Coord, Pixel};

use crate::StoreError;

/// The storage port. Implementations hold the authoritative pixel table and
/// push every successful write to the channels returned by `open_feed`.
pub trait PixelStore: Send + Sync {
    /// Returns stored pixels, at most `limit` of them when a cap is given.
    fn fetch_all(&self, limit: Option<usize>) -> Result<Vec<Pixel>, StoreError>;

    fn fetch_one(&self, coord: Coord) -> Result<Option<Pixel>, StoreError>;

    /// Inserts or overwrites the row keyed by the pixel's coordinate.
    fn upsert(&self, pixel: &Pixel) -> Result<(), StoreError>;

    /// Opens a channel receiving every row written after this call.
    /// Dropping the receiver closes the channel.
    fn open_feed(&self) -> Result<Receiver<Pixel>, StoreError>;
}
