use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use log::debug;
use parking_lot::Mutex;
use structures::{Coord, Pixel};
use tempfile::NamedTempFile;

use crate::broadcast::FeedBroadcaster;
use crate::{PixelStore, StoreError};

/// Local fallback backend: the whole pixel table lives in one JSON array on
/// disk and is read and rewritten in full on every operation. The change feed
/// only reaches sessions in the same process.
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
    feed: FeedBroadcaster,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = FileStore {
            path: path.into(),
            write_lock: Mutex::new(()),
            feed: FeedBroadcaster::default(),
        };

        // Fail early on an unreadable or corrupt file
        let rows = store.read_all()?;
        debug!("opened {} with {} pixels", store.path.display(), rows.len());

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<Pixel>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_str(&content)?)
    }

    // Written through a temp file in the same directory so readers never see
    // a half-written array.
    fn write_all(&self, rows: &[Pixel]) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(serde_json::to_string(rows)?.as_bytes())?;
        temp.persist(&self.path).map_err(|err| err.error)?;

        Ok(())
    }
}

impl PixelStore for FileStore {
    fn fetch_all(&self, limit: Option<usize>) -> Result<Vec<Pixel>, StoreError> {
        let mut rows = self.read_all()?;
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    fn fetch_one(&self, coord: Coord) -> Result<Option<Pixel>, StoreError> {
        Ok(self
            .read_all()?
            .into_iter()
            .find(|pixel| pixel.coord() == coord))
    }

    fn upsert(&self, pixel: &Pixel) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();

        let mut rows = self.read_all()?;
        rows.retain(|row| row.coord() != pixel.coord());
        rows.push(pixel.clone());
        self.write_all(&rows)?;

        // Still under the write lock so feed order follows file order
        self.feed.publish(pixel);
        Ok(())
    }

    fn open_feed(&self) -> Result<Receiver<Pixel>, StoreError> {
        Ok(self.feed.open())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use structures::HexColor;

    use super::*;

    #[test]
    fn missing_file_is_an_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("pixels.json")).unwrap();

        assert!(store.fetch_all(None).unwrap().is_empty());
        assert_eq!(store.fetch_one(Coord::new(0, 0)).unwrap(), None);
    }

    #[test]
    fn upsert_replaces_the_row_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixels.json");
        let store = FileStore::open(&path).unwrap();
        let coord = Coord::new(3, 3);

        store
            .upsert(&Pixel::new(coord, HexColor::from_rgb(0xFF, 0, 0), Some("a"), Utc::now()))
            .unwrap();
        store
            .upsert(&Pixel::new(coord, HexColor::from_rgb(0, 0, 0xFF), Some("b"), Utc::now()))
            .unwrap();

        let reopened = FileStore::open(&path).unwrap();
        let rows = reopened.fetch_all(None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].color, HexColor::from_rgb(0, 0, 0xFF));
        assert_eq!(rows[0].author(), "b");
    }

    #[test]
    fn corrupt_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixels.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(FileStore::open(&path), Err(StoreError::Json(_))));
    }

    #[test]
    fn writes_reach_the_feed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("pixels.json")).unwrap();
        let feed = store.open_feed().unwrap();

        let pixel = Pixel::new(Coord::new(1, 2), HexColor::from_rgb(1, 2, 3), None, Utc::now());
        store.upsert(&pixel).unwrap();

        assert_eq!(feed.try_recv().unwrap(), pixel);
    }
}
