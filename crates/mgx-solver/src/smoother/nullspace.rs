//! Rank-one nullspace correction for singular coarse operators.
//!
//! Aggressive coarsening with a nontrivial near-nullspace routinely leaves
//! the coarsest operator singular, and a direct factorization of a singular
//! matrix fails. The correction adds the scaled outer product of the
//! near-nullspace vector, `A' = A + (n nᵀ) / ‖n‖²`, which shifts the zero
//! eigenvalue away from the origin while leaving the rest of the spectrum
//! untouched. The shift itself is not compensated afterwards; the smoother
//! hands back the solution of the shifted system as-is.

use std::sync::Arc;

use rayon::prelude::*;

use mgx_core::{CoreError, CsrOperator, Import, Map, MultiVector, Operator};

use crate::error::{Result, SmootherError};
use crate::logging::SmootherLog;

/// Build the rank-one-corrected operator `A + (n nᵀ) / ‖n‖²`.
///
/// On more than one rank the nullspace vector is first imported onto a
/// synthetic contiguous layout spanning all global rows, so every local row
/// can form its full dense row of the outer product; that import is
/// collective and expensive, hence the logged advice to rebalance the level
/// to a single rank. The normalization always uses the un-redistributed
/// row-map copy of the vector.
///
/// Only a single nullspace column and operators with row-sparse access are
/// supported; anything else fails before any allocation happens.
pub fn fix_nullspace(
    a: &dyn Operator,
    nullspace: &MultiVector,
    log: &dyn SmootherLog,
) -> Result<CsrOperator> {
    if nullspace.num_vectors() > 1 {
        return Err(SmootherError::Precondition(
            "nullspace fix for a nullspace of dimension > 1 has not been implemented yet"
                .into(),
        ));
    }
    let acrs = a.as_row_sparse().ok_or_else(|| {
        SmootherError::Precondition(
            "nullspace fix for an operator without row-sparse access has not been \
             implemented yet"
                .into(),
        )
    })?;

    let row_map = acrs.row_map().clone();
    if nullspace.map().as_ref() != row_map.as_ref() {
        return Err(SmootherError::Precondition(
            "nullspace vector is not aligned with the operator's row map".into(),
        ));
    }

    let m = row_map.global_size();
    let n = row_map.local_size();

    // Redistribute onto an all-rows layout when the operator is partitioned.
    let (nullspace_imp, col_map, importer) = if row_map.comm().size() > 1 {
        log.warning(
            "DirectSmoother: applying nullspace fix on a distributed operator; \
             try rebalancing the level to a single rank",
        );
        let col_map = Arc::new(Map::contiguous(row_map.comm(), m));
        let plan = Arc::new(Import::new(row_map.clone(), col_map.clone()));
        let mut imported = MultiVector::new(col_map.clone(), 1);
        imported.import(nullspace, &plan)?;
        (imported, col_map, Some(plan))
    } else {
        (nullspace.clone(), row_map.clone(), None)
    };

    let norm = nullspace.norm2(0);
    if norm == 0.0 {
        return Err(SmootherError::Degenerate(
            "nullspace vector has zero norm; the rank-one correction cannot be \
             normalized"
                .into(),
        ));
    }
    let normalization = 1.0 / (norm * norm);

    let ns = nullspace.data(0).as_slice();
    let ns_imp = nullspace_imp.data(0).as_slice();

    // Dense-in-structure block: every local row carries all m columns.
    let row_offsets: Vec<usize> = (0..=n).map(|i| i * m).collect();
    let mut col_indices = vec![0usize; n * m];
    let mut values = vec![0.0f64; n * m];

    col_indices.par_chunks_mut(m).for_each(|row| {
        for (j, c) in row.iter_mut().enumerate() {
            *c = j;
        }
    });

    // Outer product n * n^T, scaled.
    values
        .par_chunks_mut(m)
        .enumerate()
        .for_each(|(i, row)| {
            let scaled = normalization * ns[i];
            for (j, v) in row.iter_mut().enumerate() {
                *v = scaled * ns_imp[j];
            }
        });

    // Add the original entries, translating local column indices from the
    // operator's column map into the all-columns map.
    let (offsets, indices, a_values) = acrs.csr_arrays();
    let a_col_map = acrs.col_map();
    for i in 0..n {
        for idx in offsets[i]..offsets[i + 1] {
            let global = a_col_map.global_index(indices[idx]);
            let j = col_map
                .local_index(global)
                .ok_or(CoreError::NotOwned(global))?;
            values[i * m + j] += a_values[idx];
        }
    }

    let corrected = CsrOperator::from_csr_arrays(
        row_map,
        col_map,
        acrs.domain_map().clone(),
        acrs.range_map().clone(),
        row_offsets,
        col_indices,
        values,
    )?;

    // The corrected graph keeps the redistribution importer when one was
    // built, otherwise whatever the original operator carried.
    Ok(corrected.with_importer(importer.or_else(|| acrs.importer().cloned())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::test_support::RecordingLog;
    use mgx_core::Comm;
    use nalgebra::DVector;

    /// Path-graph Laplacian, singular with nullspace (1, 1, 1).
    fn laplacian_triplets() -> Vec<(usize, usize, f64)> {
        vec![
            (0, 0, 1.0),
            (0, 1, -1.0),
            (1, 0, -1.0),
            (1, 1, 2.0),
            (1, 2, -1.0),
            (2, 1, -1.0),
            (2, 2, 1.0),
        ]
    }

    fn ones(map: &Arc<Map>) -> MultiVector {
        MultiVector::from_column(map.clone(), DVector::from_element(map.local_size(), 1.0))
            .unwrap()
    }

    #[test]
    fn correction_adds_scaled_outer_product() {
        let map = Arc::new(Map::contiguous(Comm::serial(), 3));
        let a = CsrOperator::from_triplets(map.clone(), &laplacian_triplets()).unwrap();
        let nullspace = ones(&map);
        let log = RecordingLog::default();

        let fixed = fix_nullspace(&a, &nullspace, &log).unwrap();

        // ‖n‖² = 3, so every entry gains exactly 1/3.
        for i in 0..3 {
            for j in 0..3 {
                let expected = a.local_entry(i, j) + 1.0 / 3.0;
                assert_eq!(fixed.local_entry(i, j), expected, "entry ({}, {})", i, j);
            }
        }
        assert_eq!(log.warning_count(), 0);
    }

    #[test]
    fn multi_column_nullspace_is_not_implemented() {
        let map = Arc::new(Map::contiguous(Comm::serial(), 3));
        let a = CsrOperator::from_triplets(map.clone(), &laplacian_triplets()).unwrap();
        let two_cols = MultiVector::new(map, 2);
        let log = RecordingLog::default();

        assert!(matches!(
            fix_nullspace(&a, &two_cols, &log),
            Err(SmootherError::Precondition(_))
        ));
    }

    #[test]
    fn zero_norm_nullspace_is_degenerate() {
        let map = Arc::new(Map::contiguous(Comm::serial(), 3));
        let a = CsrOperator::from_triplets(map.clone(), &laplacian_triplets()).unwrap();
        let zero = MultiVector::new(map, 1);
        let log = RecordingLog::default();

        assert!(matches!(
            fix_nullspace(&a, &zero, &log),
            Err(SmootherError::Degenerate(_))
        ));
    }

    #[test]
    fn misaligned_nullspace_map_is_rejected() {
        let map = Arc::new(Map::contiguous(Comm::serial(), 3));
        let other = Arc::new(Map::from_global_indices(Comm::serial(), 3, vec![0, 2, 4]).unwrap());
        let a = CsrOperator::from_triplets(map, &laplacian_triplets()).unwrap();
        let nullspace = ones(&other);
        let log = RecordingLog::default();

        assert!(matches!(
            fix_nullspace(&a, &nullspace, &log),
            Err(SmootherError::Precondition(_))
        ));
    }

    #[test]
    fn distributed_fix_warns_and_matches_the_serial_result() {
        // Simulated two-rank communicator; data stays resident, so the
        // import resolves locally and the entries must equal the serial run.
        let comm = Comm::simulated(0, 2);
        let map = Arc::new(Map::contiguous(comm, 3));
        let a = CsrOperator::from_triplets(map.clone(), &laplacian_triplets()).unwrap();
        let nullspace = ones(&map);
        let log = RecordingLog::default();

        let fixed = fix_nullspace(&a, &nullspace, &log).unwrap();

        for i in 0..3 {
            for j in 0..3 {
                let expected = a.local_entry(i, j) + 1.0 / 3.0;
                assert_eq!(fixed.local_entry(i, j), expected, "entry ({}, {})", i, j);
            }
        }
        assert!(log.warning_containing("rebalancing"));
        assert!(fixed.importer().is_some());
    }

    #[test]
    fn correction_works_on_a_gapped_row_numbering() {
        // Same Laplacian, but the serial map numbers its rows 0, 2, 4.
        let map = Arc::new(Map::from_global_indices(Comm::serial(), 3, vec![0, 2, 4]).unwrap());
        let a = CsrOperator::from_triplets(map.clone(), &laplacian_triplets()).unwrap();
        let nullspace = ones(&map);
        let log = RecordingLog::default();

        let fixed = fix_nullspace(&a, &nullspace, &log).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                let expected = a.local_entry(i, j) + 1.0 / 3.0;
                assert_eq!(fixed.local_entry(i, j), expected, "entry ({}, {})", i, j);
            }
        }
        assert!(!fixed.row_map().is_contiguous());
    }
}
