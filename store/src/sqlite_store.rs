use std::path::Path;
use std::sync::mpsc::Receiver;

use chrono::{DateTime, Utc};
use log::warn;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use structures::{Coord, HexColor, Pixel};

use crate::broadcast::FeedBroadcaster;
use crate::{PixelStore, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS pixels (
    x INTEGER NOT NULL,
    y INTEGER NOT NULL,
    color TEXT NOT NULL,
    placed_by TEXT,
    placed_at TEXT NOT NULL,
    UNIQUE (x, y)
);";

const UPSERT: &str = "
INSERT INTO pixels (x, y, color, placed_by, placed_at)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT (x, y) DO UPDATE SET
    color = excluded.color,
    placed_by = excluded.placed_by,
    placed_at = excluded.placed_at";

const SELECT_ALL: &str =
    "SELECT x, y, color, placed_by, placed_at FROM pixels ORDER BY placed_at LIMIT ?1";

const SELECT_ONE: &str =
    "SELECT x, y, color, placed_by, placed_at FROM pixels WHERE x = ?1 AND y = ?2";

type RawRow = (i64, i64, String, Option<String>, String);

/// Relational backend: the `pixels` table with a uniqueness constraint on
/// `(x, y)`, written with `ON CONFLICT` upserts.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    feed: FeedBroadcaster,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;

        Ok(SqliteStore {
            conn: Mutex::new(conn),
            feed: FeedBroadcaster::default(),
        })
    }

    pub fn row_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM pixels", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn decode_row((x, y, color, placed_by, placed_at): RawRow) -> Result<Pixel, StoreError> {
    let malformed = |reason: String| StoreError::MalformedRow { x, y, reason };

    let coord = match (u16::try_from(x), u16::try_from(y)) {
        (Ok(x), Ok(y)) => Coord::new(x, y),
        _ => return Err(malformed("coordinate out of range".to_string())),
    };
    let color = HexColor::parse(&color).map_err(|err| malformed(err.to_string()))?;
    let placed_at = DateTime::parse_from_rfc3339(&placed_at)
        .map_err(|err| malformed(err.to_string()))?
        .with_timezone(&Utc);

    Ok(Pixel {
        x: coord.x,
        y: coord.y,
        color,
        placed_by,
        placed_at,
    })
}

impl PixelStore for SqliteStore {
    fn fetch_all(&self, limit: Option<usize>) -> Result<Vec<Pixel>, StoreError> {
        // SQLite reads a negative LIMIT as "no limit"
        let limit = limit.map(|limit| limit as i64).unwrap_or(-1);

        let conn = self.conn.lock();
        let mut statement = conn.prepare(SELECT_ALL)?;
        let rows = statement.query_map(params![limit], read_row)?;

        let mut pixels = Vec::new();
        for raw in rows {
            match decode_row(raw?) {
                Ok(pixel) => pixels.push(pixel),
                Err(err) => warn!("skipped stored row: {}", err),
            }
        }

        Ok(pixels)
    }

    fn fetch_one(&self, coord: Coord) -> Result<Option<Pixel>, StoreError> {
        let raw = self
            .conn
            .lock()
            .query_row(SELECT_ONE, params![coord.x, coord.y], read_row)
            .optional()?;

        raw.map(decode_row).transpose()
    }

    fn upsert(&self, pixel: &Pixel) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            UPSERT,
            params![
                pixel.x,
                pixel.y,
                pixel.color.to_string(),
                pixel.placed_by,
                pixel.placed_at.to_rfc3339(),
            ],
        )?;

        self.feed.publish(pixel);
        Ok(())
    }

    fn open_feed(&self) -> Result<Receiver<Pixel>, StoreError> {
        Ok(self.feed.open())
    }
}
