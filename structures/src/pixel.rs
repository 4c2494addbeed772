use chrono::{DateTime, Utc};

use crate::constants::ANONYMOUS_AUTHOR;
use crate::HexColor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: u16,
    pub y: u16,
}

impl Coord {
    pub fn new(x: u16, y: u16) -> Self {
        Coord { x, y }
    }

    /// Returns the coordinate only when `0 <= x < size` and `0 <= y < size`.
    pub fn checked(x: i32, y: i32, size: u16) -> Option<Coord> {
        let x = u16::try_from(x).ok()?;
        let y = u16::try_from(y).ok()?;

        if x >= size || y >= size {
            return None;
        }

        Some(Coord { x, y })
    }

    pub fn index(&self, size: u16) -> usize {
        self.y as usize * size as usize + self.x as usize
    }
}

/// One row of the pixel table. There is at most one per coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pixel {
    pub x: u16,
    pub y: u16,
    pub color: HexColor,
    #[serde(default)]
    pub placed_by: Option<String>,
    pub placed_at: DateTime<Utc>,
}

impl Pixel {
    pub fn new(
        coord: Coord,
        color: HexColor,
        author: Option<&str>,
        placed_at: DateTime<Utc>,
    ) -> Self {
        let author = match author.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => ANONYMOUS_AUTHOR.to_string(),
        };

        Pixel {
            x: coord.x,
            y: coord.y,
            color,
            placed_by: Some(author),
            placed_at,
        }
    }

    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }

    pub fn author(&self) -> &str {
        self.placed_by.as_deref().unwrap_or(ANONYMOUS_AUTHOR)
    }
}
