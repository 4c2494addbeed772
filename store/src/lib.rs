mod adapter;
mod broadcast;
mod cache;
mod errors;
mod feed;
mod file_store;
mod memory_store;
mod pixel_store;
mod sqlite_store;

use std::sync::Arc;

use structures::StoreConfig;

pub use crate::adapter::PixelStoreAdapter;
pub use crate::cache::PixelCache;
pub use crate::errors::StoreError;
pub use crate::feed::{ChangeFeed, SubscriptionHandle};
pub use crate::file_store::FileStore;
pub use crate::memory_store::MemoryStore;
pub use crate::pixel_store::PixelStore;
pub use crate::sqlite_store::SqliteStore;

/// Opens the backend named by `config`.
pub fn open(config: &StoreConfig) -> Result<Arc<dyn PixelStore>, StoreError> {
    let store: Arc<dyn PixelStore> = match config {
        StoreConfig::Memory => Arc::new(MemoryStore::new()),
        StoreConfig::File { path } => Arc::new(FileStore::open(path)?),
        StoreConfig::Sqlite { path } => Arc::new(SqliteStore::open(path)?),
    };

    Ok(store)
}
