//! Direct-solve smoother and its nullspace correction.

pub mod direct;
pub mod nullspace;

pub use direct::DirectSmoother;
pub use nullspace::fix_nullspace;
