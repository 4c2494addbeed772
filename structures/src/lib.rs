#[macro_use]
extern crate serde_derive;

mod color;
mod config;
pub mod constants;
mod grid;
pub mod leaderboard;
mod pixel;

pub use crate::color::{ColorError, HexColor};
pub use crate::config::{
    CanvasConfig, ConfigError, PersistenceMode, Settings, StoreConfig, SETTINGS_FILE,
};
pub use crate::grid::{Grid, SnapshotError};
pub use crate::pixel::{Coord, Pixel};
