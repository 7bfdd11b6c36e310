use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store corruption recovered by recreating the cache at {path}")]
    Recovered { path: String },

    #[error("store corruption could not be recovered: {0}")]
    Unrecoverable(String),
}
