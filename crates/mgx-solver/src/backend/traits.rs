//! Engine trait for direct sparse solvers.

use mgx_core::CsrOperator;
use nalgebra::DVector;

use crate::error::Result;

/// A direct-solver engine: factorize once, triangular-solve many times.
///
/// Engines are created through the
/// [`BackendRegistry`](crate::backend::BackendRegistry) and owned exclusively
/// by one smoother. Options arrive as an opaque sub-configuration the engine
/// may read or ignore; unknown keys are not an error.
pub trait DirectSolver: Send {
    /// Accept the forwarded engine sub-configuration. Called before
    /// [`factor`](DirectSolver::factor).
    fn set_options(&mut self, options: &serde_json::Value) -> Result<()>;

    /// Factorize the operator. Replaces any previous factorization.
    fn factor(&mut self, a: &CsrOperator) -> Result<()>;

    /// Solve `A x = b` for one right-hand side using the stored factors.
    fn solve(&self, x: &mut DVector<f64>, b: &DVector<f64>) -> Result<()>;

    /// Nonzero count of the stored factors; zero before factorization.
    fn factor_nnz(&self) -> usize;

    fn description(&self) -> String;
}
