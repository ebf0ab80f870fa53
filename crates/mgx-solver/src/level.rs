//! Per-level data store.
//!
//! A `Level` holds the named data a smoother consumes at one grid level.
//! Smoothers first declare which inputs they need (`request`), the enclosing
//! framework populates them, and `setup` fetches them back out.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use mgx_core::{MultiVector, Operator};

use crate::error::{Result, SmootherError};

enum LevelValue {
    Operator(Arc<dyn Operator>),
    MultiVector(Arc<MultiVector>),
}

/// Keyed data store for one multigrid level.
#[derive(Default)]
pub struct Level {
    data: HashMap<String, LevelValue>,
    requests: HashSet<String>,
}

impl Level {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a smoother needs `name` before its setup runs.
    pub fn request(&mut self, name: &str) {
        self.requests.insert(name.to_string());
    }

    pub fn is_requested(&self, name: &str) -> bool {
        self.requests.contains(name)
    }

    pub fn set_operator(&mut self, name: &str, op: Arc<dyn Operator>) {
        self.data.insert(name.to_string(), LevelValue::Operator(op));
    }

    pub fn set_multivector(&mut self, name: &str, mv: Arc<MultiVector>) {
        self.data
            .insert(name.to_string(), LevelValue::MultiVector(mv));
    }

    pub fn operator(&self, name: &str) -> Result<Arc<dyn Operator>> {
        match self.data.get(name) {
            Some(LevelValue::Operator(op)) => Ok(op.clone()),
            _ => Err(SmootherError::Precondition(format!(
                "level input '{}' is not available as an operator",
                name
            ))),
        }
    }

    pub fn multivector(&self, name: &str) -> Result<Arc<MultiVector>> {
        match self.data.get(name) {
            Some(LevelValue::MultiVector(mv)) => Ok(mv.clone()),
            _ => Err(SmootherError::Precondition(format!(
                "level input '{}' is not available as a multivector",
                name
            ))),
        }
    }
}
