//! Redistribution plans between maps.

use std::sync::Arc;

use crate::map::Map;

/// Plan for moving vector data from a source layout to a target layout.
///
/// In a multi-process run building and executing an import is collective;
/// every participating process must construct and apply the same plan in the
/// same order. In this single-address-space build the plan is a pairing of
/// local positions: each target entry whose global index is owned by the
/// source map is filled by local gather, everything else is left untouched.
#[derive(Debug, Clone)]
pub struct Import {
    source: Arc<Map>,
    target: Arc<Map>,
    /// (source local, target local) pairs, in target order.
    pairs: Vec<(usize, usize)>,
}

impl Import {
    pub fn new(source: Arc<Map>, target: Arc<Map>) -> Self {
        let mut pairs = Vec::new();
        for t in 0..target.local_size() {
            let g = target.global_index(t);
            if let Some(s) = source.local_index(g) {
                pairs.push((s, t));
            }
        }
        Self {
            source,
            target,
            pairs,
        }
    }

    pub fn source_map(&self) -> &Arc<Map> {
        &self.source
    }

    pub fn target_map(&self) -> &Arc<Map> {
        &self.target
    }

    pub(crate) fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }
}
