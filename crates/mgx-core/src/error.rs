//! Error types for mgx-core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Global index {0} is not owned by this map")]
    NotOwned(usize),

    #[error("Invalid map: {0}")]
    InvalidMap(String),

    #[error("Invalid sparse storage: {0}")]
    InvalidStorage(String),
}
