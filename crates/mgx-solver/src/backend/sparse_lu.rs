//! Sparse LU engine.
//!
//! Registered as `Superlu`. Left-looking column factorization with partial
//! pivoting: each column of the permuted operator is loaded into a dense
//! working column, updated by the previously finished columns, then split
//! into its U part (at and above the pivot) and its L part (below, scaled by
//! the pivot). L is unit lower triangular with the diagonal implicit; U
//! stores its diagonal as the last entry of each column.
//!
//! Coarse operators are small and the nullspace-corrected ones are dense in
//! structure, so no fill-reducing ordering is attempted; row pivoting alone
//! keeps the factorization stable.

use mgx_core::{CsrOperator, Operator};
use nalgebra::DVector;

use crate::backend::traits::DirectSolver;
use crate::error::{Result, SmootherError};

/// Pivot magnitude below which a column is treated as singular.
const PIVOT_TOL: f64 = 1e-14;

struct LuFactors {
    n: usize,
    /// Per column of L: (original row, value), diagonal implicit.
    l_cols: Vec<Vec<(usize, f64)>>,
    /// Per column of U: (pivot position, value), diagonal last.
    u_cols: Vec<Vec<(usize, f64)>>,
    /// perm[position] = original row pivoted into that position.
    perm: Vec<usize>,
    nnz: usize,
}

/// Left-looking sparse LU with partial pivoting.
pub struct SparseLuSolver {
    factors: Option<LuFactors>,
}

impl SparseLuSolver {
    pub fn new() -> Self {
        Self { factors: None }
    }
}

impl Default for SparseLuSolver {
    fn default() -> Self {
        Self::new()
    }
}

/// CSR to CSC transposition of the raw arrays.
fn csr_to_csc(
    n: usize,
    offsets: &[usize],
    indices: &[usize],
    values: &[f64],
) -> (Vec<usize>, Vec<usize>, Vec<f64>) {
    let nnz = values.len();
    let mut col_ptr = vec![0usize; n + 1];
    for &j in indices {
        col_ptr[j + 1] += 1;
    }
    for j in 0..n {
        col_ptr[j + 1] += col_ptr[j];
    }
    let mut row_idx = vec![0usize; nnz];
    let mut vals = vec![0.0; nnz];
    let mut next = col_ptr.clone();
    for i in 0..n {
        for idx in offsets[i]..offsets[i + 1] {
            let j = indices[idx];
            row_idx[next[j]] = i;
            vals[next[j]] = values[idx];
            next[j] += 1;
        }
    }
    (col_ptr, row_idx, vals)
}

impl DirectSolver for SparseLuSolver {
    fn set_options(&mut self, _options: &serde_json::Value) -> Result<()> {
        // Accepted unvalidated; this engine has no tunables.
        Ok(())
    }

    fn factor(&mut self, a: &CsrOperator) -> Result<()> {
        let n = a.local_rows();
        if a.matrix().ncols() != n {
            return Err(SmootherError::Backend(format!(
                "sparse LU needs a square local matrix, got {}x{}",
                n,
                a.matrix().ncols()
            )));
        }

        let (offsets, indices, values) = a.csr_arrays();
        let (col_ptr, row_idx, vals) = csr_to_csc(n, offsets, indices, values);

        let mut l_cols: Vec<Vec<(usize, f64)>> = Vec::with_capacity(n);
        let mut u_cols: Vec<Vec<(usize, f64)>> = Vec::with_capacity(n);
        // pinv[original row] = pivot position, or n while unassigned
        let mut pinv = vec![n; n];
        let mut perm = vec![0usize; n];
        let mut work = vec![0.0f64; n];
        let mut nnz = n; // implicit unit diagonal of L

        for k in 0..n {
            // Load column k into the dense working column, indexed by
            // original row.
            for idx in col_ptr[k]..col_ptr[k + 1] {
                work[row_idx[idx]] = vals[idx];
            }

            // Update by every finished column whose pivot row carries a
            // nonzero in the working column.
            let mut u_col = Vec::new();
            for j in 0..k {
                let ujk = work[perm[j]];
                if ujk != 0.0 {
                    u_col.push((j, ujk));
                    for &(row, ljk) in &l_cols[j] {
                        work[row] -= ljk * ujk;
                    }
                }
            }

            // Partial pivoting over the rows not yet assigned a position.
            let mut pivot_row = n;
            let mut pivot_mag = 0.0;
            for row in 0..n {
                if pinv[row] == n && work[row].abs() > pivot_mag {
                    pivot_mag = work[row].abs();
                    pivot_row = row;
                }
            }
            if pivot_row == n || pivot_mag <= PIVOT_TOL {
                return Err(SmootherError::Backend(format!(
                    "zero pivot in column {}: matrix is singular to working precision",
                    k
                )));
            }
            let pivot = work[pivot_row];
            perm[k] = pivot_row;
            pinv[pivot_row] = k;
            u_col.push((k, pivot));

            let mut l_col = Vec::new();
            for row in 0..n {
                if pinv[row] == n && work[row] != 0.0 {
                    l_col.push((row, work[row] / pivot));
                }
            }

            nnz += u_col.len() + l_col.len();
            u_cols.push(u_col);
            l_cols.push(l_col);
            work.iter_mut().for_each(|v| *v = 0.0);
        }

        self.factors = Some(LuFactors {
            n,
            l_cols,
            u_cols,
            perm,
            nnz,
        });
        Ok(())
    }

    fn solve(&self, x: &mut DVector<f64>, b: &DVector<f64>) -> Result<()> {
        let f = self
            .factors
            .as_ref()
            .ok_or_else(|| SmootherError::Backend("solve called before factor".into()))?;
        let n = f.n;
        if b.len() != n || x.len() != n {
            return Err(SmootherError::Backend(format!(
                "vector length {}/{} does not match factored size {}",
                x.len(),
                b.len(),
                n
            )));
        }

        // Forward: L y = P b, with the residual tracked in original row
        // indexing.
        let mut residual: Vec<f64> = b.iter().copied().collect();
        let mut y = vec![0.0f64; n];
        for k in 0..n {
            let yk = residual[f.perm[k]];
            y[k] = yk;
            for &(row, ljk) in &f.l_cols[k] {
                residual[row] -= ljk * yk;
            }
        }

        // Backward: U x = y, column-oriented.
        for k in (0..n).rev() {
            let (diag_pos, diag) = *f.u_cols[k]
                .last()
                .ok_or_else(|| SmootherError::Backend("empty U column in factors".into()))?;
            debug_assert_eq!(diag_pos, k);
            let xk = y[k] / diag;
            x[k] = xk;
            for &(j, ujk) in &f.u_cols[k][..f.u_cols[k].len() - 1] {
                y[j] -= ujk * xk;
            }
        }

        Ok(())
    }

    fn factor_nnz(&self) -> usize {
        self.factors.as_ref().map(|f| f.nnz).unwrap_or(0)
    }

    fn description(&self) -> String {
        match &self.factors {
            Some(f) => format!(
                "Superlu{{sparse LU, n = {}, nnz(LU) = {}}}",
                f.n, f.nnz
            ),
            None => "Superlu{sparse LU, not factored}".to_string(),
        }
    }
}
