use thiserror::Error;

use crate::{Coord, HexColor, Pixel};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("could not encode grid snapshot: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("could not decode grid snapshot: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("grid snapshot holds {found} cells, expected {expected}")]
    CellCountMismatch { expected: usize, found: usize },
}

/// Dense, row-major projection of the pixel table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    size: u16,
    cells: Vec<HexColor>,
}

impl Grid {
    pub fn new(size: u16, fill: HexColor) -> Self {
        Grid {
            size,
            cells: vec![fill; size as usize * size as usize],
        }
    }

    pub fn size(&self) -> u16 {
        self.size
    }

    pub fn get(&self, coord: Coord) -> Option<HexColor> {
        if coord.x >= self.size || coord.y >= self.size {
            return None;
        }

        Some(self.cells[coord.index(self.size)])
    }

    /// Writes one cell and returns its previous color, or `None` when the
    /// coordinate is outside the grid.
    pub fn set(&mut self, coord: Coord, color: HexColor) -> Option<HexColor> {
        if coord.x >= self.size || coord.y >= self.size {
            return None;
        }

        let cell = &mut self.cells[coord.index(self.size)];
        Some(std::mem::replace(cell, color))
    }

    /// Paints every pixel that falls inside the grid, returning how many did.
    pub fn paint<'a, I>(&mut self, pixels: I) -> usize
    where
        I: IntoIterator<Item = &'a Pixel>,
    {
        pixels
            .into_iter()
            .filter(|pixel| self.set(pixel.coord(), pixel.color).is_some())
            .count()
    }

    pub fn clear(&mut self, color: HexColor) {
        self.cells.fill(color);
    }

    pub fn rows(&self) -> impl Iterator<Item = &[HexColor]> {
        self.cells.chunks(self.size.max(1) as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Coord, HexColor)> + '_ {
        let size = self.size as usize;
        self.cells.iter().enumerate().map(move |(i, color)| {
            (Coord::new((i % size) as u16, (i / size) as u16), *color)
        })
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(rmp_serde::to_vec(self)?)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Grid, SnapshotError> {
        let grid: Grid = rmp_serde::from_slice(bytes)?;

        let expected = grid.size as usize * grid.size as usize;
        if grid.cells.len() != expected {
            return Err(SnapshotError::CellCountMismatch {
                expected,
                found: grid.cells.len(),
            });
        }

        Ok(grid)
    }
}
