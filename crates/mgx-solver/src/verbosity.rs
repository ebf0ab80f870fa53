//! Verbosity levels for diagnostic printing.

use std::ops::BitOr;

/// Bitmask selecting which sections a diagnostic print emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verbosity(u32);

impl Verbosity {
    pub const NONE: Verbosity = Verbosity(0);
    /// Backend name.
    pub const PARAMETERS0: Verbosity = Verbosity(1 << 0);
    /// Full parameter dump.
    pub const PARAMETERS1: Verbosity = Verbosity(1 << 1);
    /// Description of the external engine.
    pub const EXTERNAL: Verbosity = Verbosity(1 << 2);
    /// Internal state dump.
    pub const DEBUG: Verbosity = Verbosity(1 << 3);
    pub const ALL: Verbosity = Verbosity(u32::MAX);

    pub fn contains(self, other: Verbosity) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Verbosity {
    type Output = Verbosity;

    fn bitor(self, rhs: Verbosity) -> Verbosity {
        Verbosity(self.0 | rhs.0)
    }
}
