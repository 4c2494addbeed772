use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not access pixel file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse pixel file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stored row at ({x}, {y}) is malformed: {reason}")]
    MalformedRow { x: i64, y: i64, reason: String },
}
