//! Distributed-container facade for the mgx multigrid components.
//!
//! This crate provides the small set of container types the smoother layer
//! consumes: a communicator handle, row/column maps, import plans,
//! multi-vectors, and a row-sparse operator built on nalgebra-sparse CSR
//! storage.
//!
//! The build is single-address-space: maps and the communicator model
//! partition bookkeeping (rank, size, owned global indices) in full, but an
//! [`Import`] resolves by local gather rather than message passing. Entry
//! points that would be collective in a multi-process run are documented as
//! such so callers keep the same call-ordering discipline.

pub mod comm;
pub mod error;
pub mod import;
pub mod map;
pub mod multivector;
pub mod operator;

pub use comm::Comm;
pub use error::{CoreError, Result};
pub use import::Import;
pub use map::Map;
pub use multivector::MultiVector;
pub use operator::{CsrOperator, Operator};
