//! Direct-solve smoother layer for multigrid preconditioning.
//!
//! At the coarsest levels of a multigrid hierarchy the residual equation is
//! cheap enough to solve exactly. This crate provides that layer: a smoother
//! that factorizes the level operator through a pluggable direct-solver
//! backend and applies the factorization on every smoothing call.
//!
//! The pieces, bottom up:
//!
//! - [`backend`] — an ordered registry of direct-solver engines and the
//!   name-resolution logic that picks an available one, falling back along
//!   the registration order when the requested engine is absent.
//! - [`smoother::nullspace`] — the rank-one correction that removes a
//!   near-zero eigenvalue from a singular coarse operator before
//!   factorization, redistributing the near-nullspace vector to a
//!   single-rank-friendly layout when the operator is distributed.
//! - [`smoother`] — the [`DirectSmoother`](smoother::DirectSmoother) itself:
//!   declare-inputs / setup / apply, working-buffer layout adaptation, and
//!   introspection (description, verbosity-gated print, complexity).

pub mod backend;
pub mod error;
pub mod level;
pub mod logging;
pub mod params;
pub mod smoother;
pub mod verbosity;

pub use backend::{BackendDescriptor, BackendRegistry, DirectSolver};
pub use error::{Result, SmootherError};
pub use level::Level;
pub use logging::{FacadeLog, SmootherLog};
pub use params::{SmootherParams, valid_parameter_list};
pub use smoother::DirectSmoother;
pub use verbosity::Verbosity;
