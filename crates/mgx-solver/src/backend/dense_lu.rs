//! Dense LU engine backed by nalgebra.
//!
//! Registered as `Klu`. Coarse-level operators are small by construction, so
//! a dense factorization is a reasonable fallback when the sparse engine is
//! not compiled in.

use mgx_core::{CsrOperator, Operator};
use nalgebra::{DMatrix, DVector, Dyn};
use nalgebra::linalg::LU;

use crate::backend::traits::DirectSolver;
use crate::error::{Result, SmootherError};

/// Dense LU with partial pivoting over the densified operator.
pub struct DenseLuSolver {
    factors: Option<LU<f64, Dyn, Dyn>>,
    n: usize,
    nnz_lu: usize,
}

impl DenseLuSolver {
    pub fn new() -> Self {
        Self {
            factors: None,
            n: 0,
            nnz_lu: 0,
        }
    }
}

impl Default for DenseLuSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectSolver for DenseLuSolver {
    fn set_options(&mut self, _options: &serde_json::Value) -> Result<()> {
        // Accepted unvalidated; this engine has no tunables.
        Ok(())
    }

    fn factor(&mut self, a: &CsrOperator) -> Result<()> {
        let n = a.local_rows();
        if a.matrix().ncols() != n {
            return Err(SmootherError::Backend(format!(
                "dense LU needs a square local matrix, got {}x{}",
                n,
                a.matrix().ncols()
            )));
        }

        // Densify from CSR
        let mut dense = DMatrix::zeros(n, n);
        let (offsets, indices, values) = a.csr_arrays();
        for i in 0..n {
            for idx in offsets[i]..offsets[i + 1] {
                dense[(i, indices[idx])] = values[idx];
            }
        }

        let lu = dense.lu();
        if !lu.is_invertible() {
            return Err(SmootherError::Backend(
                "Singular matrix in LU factorization".into(),
            ));
        }

        let l = lu.l();
        let u = lu.u();
        let count = |m: &DMatrix<f64>| m.iter().filter(|v| **v != 0.0).count();
        self.nnz_lu = count(&l) + count(&u);
        self.n = n;
        self.factors = Some(lu);
        Ok(())
    }

    fn solve(&self, x: &mut DVector<f64>, b: &DVector<f64>) -> Result<()> {
        let lu = self
            .factors
            .as_ref()
            .ok_or_else(|| SmootherError::Backend("solve called before factor".into()))?;
        if b.len() != self.n || x.len() != self.n {
            return Err(SmootherError::Backend(format!(
                "vector length {}/{} does not match factored size {}",
                x.len(),
                b.len(),
                self.n
            )));
        }
        let solution = lu.solve(b).ok_or_else(|| {
            SmootherError::Backend("Singular matrix in LU triangular solve".into())
        })?;
        x.copy_from(&solution);
        Ok(())
    }

    fn factor_nnz(&self) -> usize {
        self.nnz_lu
    }

    fn description(&self) -> String {
        if self.factors.is_some() {
            format!("Klu{{dense LU, n = {}, nnz(LU) = {}}}", self.n, self.nnz_lu)
        } else {
            "Klu{dense LU, not factored}".to_string()
        }
    }
}
