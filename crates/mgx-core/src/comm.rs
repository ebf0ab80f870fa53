//! Communicator handle.
//!
//! A `Comm` carries the rank/size bookkeeping of a distributed run. This
//! build performs no message passing; a simulated communicator lets the
//! partition-sensitive code paths (redistribution, single-rank warnings) run
//! inside one address space.

/// Handle describing this process's place in a distributed computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comm {
    rank: usize,
    size: usize,
}

impl Comm {
    /// Single-process communicator (rank 0 of 1).
    pub fn serial() -> Self {
        Self { rank: 0, size: 1 }
    }

    /// Communicator reporting the given rank/size without real transport.
    ///
    /// Data referenced through maps built on this communicator must be
    /// locally resident; imports resolve by local gather.
    pub fn simulated(rank: usize, size: usize) -> Self {
        assert!(size > 0 && rank < size, "rank must be below size");
        Self { rank, size }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl Default for Comm {
    fn default() -> Self {
        Self::serial()
    }
}
