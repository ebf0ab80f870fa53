//! Direct-solver engine registry and name resolution.
//!
//! Engines register under canonical capitalized names in preference order.
//! Resolving a request walks that order: an empty or unavailable request
//! falls back to the first available entry, a substitution of a non-empty
//! request is logged as a warning, and a request that cannot be satisfied at
//! all fails construction of the smoother.

pub mod traits;

#[cfg(feature = "klu")]
pub mod dense_lu;
#[cfg(feature = "superlu")]
pub mod sparse_lu;

pub use traits::DirectSolver;

use crate::error::{Result, SmootherError};
use crate::logging::SmootherLog;

/// One registered engine: canonical name, availability probe, constructor.
pub struct BackendDescriptor {
    pub name: &'static str,
    pub available: fn() -> bool,
    pub factory: fn() -> Result<Box<dyn DirectSolver>>,
}

/// Ordered collection of engine descriptors. Registration order is the
/// fallback preference order.
pub struct BackendRegistry {
    entries: Vec<BackendDescriptor>,
}

impl BackendRegistry {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn register(&mut self, descriptor: BackendDescriptor) {
        self.entries.push(descriptor);
    }

    /// Whether `name` is registered and currently available.
    pub fn query(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|d| d.name == name && (d.available)())
    }

    /// First available entry in registration order.
    pub fn first_available(&self) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|d| (d.available)())
            .map(|d| d.name)
    }

    /// Registered names in preference order, available or not.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|d| d.name).collect()
    }

    /// Instantiate the named engine.
    pub fn create(&self, name: &str) -> Result<Box<dyn DirectSolver>> {
        let descriptor = self
            .entries
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| {
                SmootherError::BackendUnavailable(format!(
                    "engine '{}' is not registered",
                    name
                ))
            })?;
        if !(descriptor.available)() {
            return Err(SmootherError::BackendUnavailable(format!(
                "engine '{}' is registered but not available",
                name
            )));
        }
        (descriptor.factory)()
    }
}

impl Default for BackendRegistry {
    /// The shipped preference order: Superlu, Klu, Superludist, Basker.
    ///
    /// Superlu and Klu map to in-crate engines behind cargo features;
    /// Superludist and Basker keep their canonical names reserved but no
    /// engine ships for them in this build.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(BackendDescriptor {
            name: "Superlu",
            available: || cfg!(feature = "superlu"),
            factory: superlu_factory,
        });
        registry.register(BackendDescriptor {
            name: "Klu",
            available: || cfg!(feature = "klu"),
            factory: klu_factory,
        });
        registry.register(BackendDescriptor {
            name: "Superludist",
            available: || false,
            factory: missing_engine_factory,
        });
        registry.register(BackendDescriptor {
            name: "Basker",
            available: || false,
            factory: missing_engine_factory,
        });
        registry
    }
}

#[cfg(feature = "superlu")]
fn superlu_factory() -> Result<Box<dyn DirectSolver>> {
    Ok(Box::new(sparse_lu::SparseLuSolver::new()))
}

#[cfg(not(feature = "superlu"))]
fn superlu_factory() -> Result<Box<dyn DirectSolver>> {
    missing_engine_factory()
}

#[cfg(feature = "klu")]
fn klu_factory() -> Result<Box<dyn DirectSolver>> {
    Ok(Box::new(dense_lu::DenseLuSolver::new()))
}

#[cfg(not(feature = "klu"))]
fn klu_factory() -> Result<Box<dyn DirectSolver>> {
    missing_engine_factory()
}

fn missing_engine_factory() -> Result<Box<dyn DirectSolver>> {
    Err(SmootherError::Backend(
        "no engine is compiled into this build for the requested name".into(),
    ))
}

/// Normalize a requested engine name to canonical capitalized form.
///
/// Lowercase everything, uppercase the first letter, and map the
/// `superlu_dist` spelling (any case) to `Superludist`.
pub(crate) fn canonicalize(name: &str) -> String {
    let lower = name.to_lowercase();
    if lower == "superlu_dist" {
        return "Superludist".to_string();
    }
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Resolve a requested engine name against the registry.
///
/// An empty or unavailable request falls back to the first available entry
/// (warning if a non-empty request was substituted, informational notice
/// otherwise). No available entry at all is a configuration error. The
/// resolved name is re-validated before being returned.
pub(crate) fn resolve_backend(
    requested: &str,
    registry: &BackendRegistry,
    log: &dyn SmootherLog,
) -> Result<String> {
    let mut name = canonicalize(requested);

    if name.is_empty() || !registry.query(&name) {
        let old = name.clone();
        name = registry
            .first_available()
            .ok_or_else(|| {
                SmootherError::Config(format!(
                    "none of the registered engines ({}) is available; compile one in \
                     or register a valid engine explicitly",
                    registry.names().join(", ")
                ))
            })?
            .to_string();

        if !old.is_empty() {
            log.warning(&format!(
                "DirectSmoother: \"{}\" is not available. Using \"{}\" instead",
                old, name
            ));
        } else {
            log.runtime(&format!("DirectSmoother: using \"{}\"", name));
        }
    }

    if !registry.query(&name) {
        return Err(SmootherError::BackendUnavailable(format!(
            "the registry reported that engine '{}' is not available; it was not \
             compiled into this build, or the name is misspelled",
            name
        )));
    }

    Ok(name)
}
