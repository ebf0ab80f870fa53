//! Smoother configuration.

use serde::Deserialize;

/// Configuration accepted by [`DirectSmoother`](crate::DirectSmoother).
///
/// `backend_options` is an opaque sub-configuration forwarded verbatim to
/// the resolved engine; nothing in it is validated here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SmootherParams {
    /// Requested engine name. May be empty, in which case the first
    /// available registry entry is used.
    pub backend: String,

    /// Remove a zero eigenvalue of the level operator by a rank-one
    /// correction built from its near-nullspace vector.
    #[serde(rename = "fix nullspace")]
    pub fix_nullspace: bool,

    /// Engine sub-configuration, forwarded without local validation.
    pub backend_options: serde_json::Value,
}

/// Documentation of one recognized configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterDoc {
    pub key: &'static str,
    pub default: &'static str,
    pub doc: &'static str,
}

/// The recognized configuration surface, with defaults and doc strings.
pub fn valid_parameter_list() -> &'static [ParameterDoc] {
    &[
        ParameterDoc {
            key: "A",
            default: "<level input>",
            doc: "Source of the coarse operator",
        },
        ParameterDoc {
            key: "Nullspace",
            default: "<level input>",
            doc: "Source of the near-nullspace vectors (only read when 'fix nullspace' is set)",
        },
        ParameterDoc {
            key: "fix nullspace",
            default: "false",
            doc: "Remove zero eigenvalue by adding a rank one correction",
        },
        ParameterDoc {
            key: "backend",
            default: "\"\"",
            doc: "Requested direct-solver engine; empty picks the first available",
        },
        ParameterDoc {
            key: "backend_options",
            default: "{}",
            doc: "Options passed through to the engine unvalidated",
        },
    ]
}
