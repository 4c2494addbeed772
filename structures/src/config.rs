use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::constants::{
    CACHE_TTL, COOLDOWN_SECONDS, DEFAULT_COLOR, DEFAULT_SELECTED_COLOR, FLUSH_INTERVAL, GRID_SIZE,
    MAX_PENDING_UPDATES, PALETTE,
};
use crate::HexColor;

pub const SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_STORE_FILE: &str = "pixel-canvas-data.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse settings: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Whether a placement waits for the store before `place_pixel` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceMode {
    Awaited,
    #[default]
    Background,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub grid_size: u16,
    pub default_color: HexColor,
    pub selected_color: HexColor,
    pub palette: Vec<HexColor>,
    pub cooldown_seconds: u32,
    pub cache_ttl_ms: u64,
    /// Row cap for full snapshots; rows beyond it are left out.
    pub fetch_limit: Option<usize>,
    pub flush_interval_ms: u64,
    pub max_pending_updates: usize,
    pub persistence: PersistenceMode,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        CanvasConfig {
            grid_size: GRID_SIZE,
            default_color: DEFAULT_COLOR,
            selected_color: DEFAULT_SELECTED_COLOR,
            palette: PALETTE.iter().map(|(color, _)| *color).collect(),
            cooldown_seconds: COOLDOWN_SECONDS,
            cache_ttl_ms: CACHE_TTL.as_millis() as u64,
            fetch_limit: None,
            flush_interval_ms: FLUSH_INTERVAL.as_millis() as u64,
            max_pending_updates: MAX_PENDING_UPDATES,
            persistence: PersistenceMode::default(),
        }
    }
}

impl CanvasConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_size == 0 {
            return Err(ConfigError::Invalid("grid_size must be at least 1".into()));
        }
        if self.palette.is_empty() {
            return Err(ConfigError::Invalid("palette must not be empty".into()));
        }
        if self.max_pending_updates == 0 {
            return Err(ConfigError::Invalid(
                "max_pending_updates must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Which storage backend holds the pixel table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    Memory,
    File { path: PathBuf },
    Sqlite { path: PathBuf },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            path: PathBuf::from(DEFAULT_STORE_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub canvas: CanvasConfig,
    pub store: StoreConfig,
}

impl Settings {
    /// Loads settings from `path`. A missing or empty file yields the defaults.
    pub fn load(path: &Path) -> Result<Settings, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err.into()),
        };

        let settings = if content.trim().is_empty() {
            Settings::default()
        } else {
            serde_json::from_str(&content)?
        };

        settings.canvas.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
