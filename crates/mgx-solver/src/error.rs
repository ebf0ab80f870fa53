//! Error types for mgx-solver
//!
//! Everything here is fatal to the operation that raised it: construction
//! and setup failures abort the smoother, precondition violations abort the
//! call. Nothing is retried beyond the one documented backend fallback walk,
//! which happens before any of these errors is produced.

use mgx_core::CoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SmootherError>;

#[derive(Error, Debug)]
pub enum SmootherError {
    /// No usable engine exists in the registry at all.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A concrete engine name failed the availability check.
    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    /// A documented precondition of setup/apply was violated.
    #[error("Precondition violation: {0}")]
    Precondition(String),

    /// Degenerate numeric input (e.g. a zero-norm nullspace vector).
    #[error("Numeric degeneracy: {0}")]
    Degenerate(String),

    /// The engine itself failed (creation, factorization, or solve).
    #[error("Backend failure: {0}")]
    Backend(String),

    #[error("Container error: {0}")]
    Core(#[from] CoreError),
}
