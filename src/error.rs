
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Remote fetch error: {0}")]
    Remote(String),
    #[error("Not signed in")]
    Unauthenticated,
    #[error("Authorization rejected: {0}")]
    Authorization(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

// Helper conversions
impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self { Self::Storage(e.to_string()) }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self { Self::Remote(e.to_string()) }
}
