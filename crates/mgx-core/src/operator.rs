//! Sparse operators over distributed maps.
//!
//! The smoother layer sees operators through the [`Operator`] trait. Code
//! that needs raw CSR arrays (e.g. algebraic corrections) probes for the
//! row-sparse capability with [`Operator::as_row_sparse`] instead of
//! downcasting; an operator that does not offer it simply reports `None`.

use std::sync::Arc;

use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::error::{CoreError, Result};
use crate::import::Import;
use crate::map::Map;

/// A distributed linear operator.
pub trait Operator: Send + Sync {
    fn row_map(&self) -> &Arc<Map>;
    fn col_map(&self) -> &Arc<Map>;
    fn domain_map(&self) -> &Arc<Map>;
    fn range_map(&self) -> &Arc<Map>;

    fn global_rows(&self) -> usize {
        self.row_map().global_size()
    }

    fn local_rows(&self) -> usize {
        self.row_map().local_size()
    }

    /// Row-oriented sparse access capability. Default: not offered.
    fn as_row_sparse(&self) -> Option<&CsrOperator> {
        None
    }

    fn description(&self) -> String;
}

/// Row-partitioned sparse matrix in CSR storage.
///
/// Column indices are local to the column map; the row map orders the local
/// rows. Domain/range maps describe the vector spaces the operator acts
/// between, and an optional importer records how off-process column data
/// would be fetched.
#[derive(Debug, Clone)]
pub struct CsrOperator {
    matrix: CsrMatrix<f64>,
    row_map: Arc<Map>,
    col_map: Arc<Map>,
    domain_map: Arc<Map>,
    range_map: Arc<Map>,
    importer: Option<Arc<Import>>,
}

impl CsrOperator {
    /// Build from raw CSR arrays. Column indices must be sorted within each
    /// row and local to `col_map`.
    pub fn from_csr_arrays(
        row_map: Arc<Map>,
        col_map: Arc<Map>,
        domain_map: Arc<Map>,
        range_map: Arc<Map>,
        row_offsets: Vec<usize>,
        col_indices: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self> {
        let nrows = row_map.local_size();
        let ncols = col_map.local_size();
        let matrix = CsrMatrix::try_from_csr_data(nrows, ncols, row_offsets, col_indices, values)
            .map_err(|e| CoreError::InvalidStorage(format!("{:?}", e)))?;
        Ok(Self {
            matrix,
            row_map,
            col_map,
            domain_map,
            range_map,
            importer: None,
        })
    }

    /// Square operator on a single map, from COO triplets. Convenience for
    /// assembling small systems; duplicate entries are summed.
    pub fn from_triplets(
        map: Arc<Map>,
        triplets: &[(usize, usize, f64)],
    ) -> Result<Self> {
        let n = map.local_size();
        let mut coo = CooMatrix::new(n, n);
        for &(i, j, v) in triplets {
            if i >= n || j >= n {
                return Err(CoreError::InvalidStorage(format!(
                    "triplet ({}, {}) outside {}x{}",
                    i, j, n, n
                )));
            }
            coo.push(i, j, v);
        }
        Ok(Self {
            matrix: CsrMatrix::from(&coo),
            row_map: map.clone(),
            col_map: map.clone(),
            domain_map: map.clone(),
            range_map: map,
            importer: None,
        })
    }

    /// Attach the importer this operator's graph carries.
    pub fn with_importer(mut self, importer: Option<Arc<Import>>) -> Self {
        self.importer = importer;
        self
    }

    pub fn matrix(&self) -> &CsrMatrix<f64> {
        &self.matrix
    }

    /// Raw CSR arrays: row offsets, local column indices, values.
    pub fn csr_arrays(&self) -> (&[usize], &[usize], &[f64]) {
        (
            self.matrix.row_offsets(),
            self.matrix.col_indices(),
            self.matrix.values(),
        )
    }

    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    pub fn importer(&self) -> Option<&Arc<Import>> {
        self.importer.as_ref()
    }

    /// Entry at local (row, col), zero if not stored. Intended for small
    /// operators in diagnostics and tests.
    pub fn local_entry(&self, row: usize, col: usize) -> f64 {
        let (offsets, indices, values) = self.csr_arrays();
        for idx in offsets[row]..offsets[row + 1] {
            if indices[idx] == col {
                return values[idx];
            }
        }
        0.0
    }
}

impl Operator for CsrOperator {
    fn row_map(&self) -> &Arc<Map> {
        &self.row_map
    }

    fn col_map(&self) -> &Arc<Map> {
        &self.col_map
    }

    fn domain_map(&self) -> &Arc<Map> {
        &self.domain_map
    }

    fn range_map(&self) -> &Arc<Map> {
        &self.range_map
    }

    fn as_row_sparse(&self) -> Option<&CsrOperator> {
        Some(self)
    }

    fn description(&self) -> String {
        format!(
            "CsrOperator{{global rows = {}, local rows = {}, nnz = {}}}",
            self.global_rows(),
            self.local_rows(),
            self.nnz()
        )
    }
}
