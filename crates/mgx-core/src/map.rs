//! Distributed partitioning maps.
//!
//! A `Map` records which global indices this process owns and in what local
//! order. Local indices are positions in the owned list; global indices are
//! the values stored there.

use crate::comm::Comm;
use crate::error::{CoreError, Result};

/// Ownership description of a distributed index space.
///
/// `global_size` is the total number of owned elements across all processes
/// (not a bound on index values; global indices may be sparse and exceed
/// it, as in a gapped numbering).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Map {
    comm: Comm,
    global_size: usize,
    global_indices: Vec<usize>,
}

impl Map {
    /// Map owning the contiguous range `0..global_size` on this process.
    ///
    /// On a serial communicator this is the usual "one rank owns everything"
    /// layout. On a simulated multi-rank communicator it is the synthetic
    /// all-rows layout used as a redistribution target.
    pub fn contiguous(comm: Comm, global_size: usize) -> Self {
        Self {
            comm,
            global_size,
            global_indices: (0..global_size).collect(),
        }
    }

    /// Map owning an explicit list of global indices. `global_size` is the
    /// element count across all processes, supplied by the caller since
    /// this build has no transport to sum local sizes over.
    pub fn from_global_indices(
        comm: Comm,
        global_size: usize,
        global_indices: Vec<usize>,
    ) -> Result<Self> {
        if global_indices.len() > global_size {
            return Err(CoreError::InvalidMap(format!(
                "{} owned indices exceed the global element count {}",
                global_indices.len(),
                global_size
            )));
        }
        Ok(Self {
            comm,
            global_size,
            global_indices,
        })
    }

    pub fn comm(&self) -> Comm {
        self.comm
    }

    /// Number of indices owned by this process.
    pub fn local_size(&self) -> usize {
        self.global_indices.len()
    }

    /// Number of indices across all processes.
    pub fn global_size(&self) -> usize {
        self.global_size
    }

    /// Global index stored at a local position.
    pub fn global_index(&self, local: usize) -> usize {
        self.global_indices[local]
    }

    /// Local position of a global index, if owned here.
    pub fn local_index(&self, global: usize) -> Option<usize> {
        self.global_indices.iter().position(|&g| g == global)
    }

    pub fn global_indices(&self) -> &[usize] {
        &self.global_indices
    }

    pub fn min_global_index(&self) -> Option<usize> {
        self.global_indices.iter().copied().min()
    }

    pub fn max_global_index(&self) -> Option<usize> {
        self.global_indices.iter().copied().max()
    }

    /// Whether the owned indices form an ascending run with no gaps.
    ///
    /// Direct-solver engines index vectors by local position, so a
    /// non-contiguous map needs either a transformed copy or an explicit
    /// hint forwarded to the engine.
    pub fn is_contiguous(&self) -> bool {
        self.global_indices
            .windows(2)
            .all(|w| w[1] == w[0] + 1)
            && match (self.min_global_index(), self.max_global_index()) {
                (Some(min), Some(max)) => max - min + 1 == self.local_size(),
                _ => true,
            }
    }

    /// Same local sizing, global indices renumbered to `0..local_size`.
    pub fn contiguized(&self) -> Self {
        Self {
            comm: self.comm,
            global_size: self.local_size(),
            global_indices: (0..self.local_size()).collect(),
        }
    }
}
