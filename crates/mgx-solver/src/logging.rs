//! Injected logging collaborator.
//!
//! The smoother reports non-fatal events (backend substitution, repeated
//! setup, distributed nullspace-fix cost) through a collaborator handed in
//! at construction rather than through ambient global streams. Message
//! classes matter: callers and tests distinguish warnings from informational
//! runtime notices.

/// Logging channels consumed by the smoother layer.
pub trait SmootherLog: Send + Sync {
    /// Non-fatal condition the user should see (substituted backend,
    /// repeated setup, expensive distributed path).
    fn warning(&self, msg: &str);

    /// Informational progress notice.
    fn runtime(&self, msg: &str);

    /// Parameter/diagnostic dump, lower priority than runtime notices.
    fn parameters(&self, msg: &str) {
        self.runtime(msg);
    }
}

/// Default collaborator forwarding to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct FacadeLog;

impl SmootherLog for FacadeLog {
    fn warning(&self, msg: &str) {
        log::warn!("{}", msg);
    }

    fn runtime(&self, msg: &str) {
        log::info!("{}", msg);
    }

    fn parameters(&self, msg: &str) {
        log::debug!("{}", msg);
    }
}
