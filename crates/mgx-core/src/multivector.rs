//! Multi-vectors over a distributed map.

use std::sync::Arc;

use nalgebra::DVector;

use crate::error::{CoreError, Result};
use crate::import::Import;
use crate::map::Map;

/// One or more column vectors laid out over a map's local indices.
#[derive(Debug, Clone)]
pub struct MultiVector {
    map: Arc<Map>,
    columns: Vec<DVector<f64>>,
}

impl MultiVector {
    /// Zero-initialized multi-vector with `num_vectors` columns.
    pub fn new(map: Arc<Map>, num_vectors: usize) -> Self {
        let n = map.local_size();
        Self {
            map,
            columns: (0..num_vectors).map(|_| DVector::zeros(n)).collect(),
        }
    }

    /// Single-column multi-vector from existing data.
    pub fn from_column(map: Arc<Map>, column: DVector<f64>) -> Result<Self> {
        if column.len() != map.local_size() {
            return Err(CoreError::DimensionMismatch(format!(
                "column length {} does not match map local size {}",
                column.len(),
                map.local_size()
            )));
        }
        Ok(Self {
            map,
            columns: vec![column],
        })
    }

    pub fn map(&self) -> &Arc<Map> {
        &self.map
    }

    pub fn num_vectors(&self) -> usize {
        self.columns.len()
    }

    pub fn local_length(&self) -> usize {
        self.map.local_size()
    }

    pub fn data(&self, col: usize) -> &DVector<f64> {
        &self.columns[col]
    }

    pub fn data_mut(&mut self, col: usize) -> &mut DVector<f64> {
        &mut self.columns[col]
    }

    /// Euclidean norm of one column over the locally owned entries.
    pub fn norm2(&self, col: usize) -> f64 {
        self.columns[col].norm()
    }

    /// Insert-import from `source` following the plan.
    ///
    /// Collective in a multi-process run; here the gather resolves locally
    /// and entries the source map does not own locally are left as-is.
    pub fn import(&mut self, source: &MultiVector, plan: &Import) -> Result<()> {
        if source.num_vectors() != self.num_vectors() {
            return Err(CoreError::DimensionMismatch(format!(
                "import source has {} columns, target has {}",
                source.num_vectors(),
                self.num_vectors()
            )));
        }
        if !Arc::ptr_eq(source.map(), plan.source_map()) && source.map() != plan.source_map() {
            return Err(CoreError::InvalidMap(
                "import source map does not match the plan".into(),
            ));
        }
        for col in 0..self.num_vectors() {
            for &(s, t) in plan.pairs() {
                self.columns[col][t] = source.columns[col][s];
            }
        }
        Ok(())
    }
}
