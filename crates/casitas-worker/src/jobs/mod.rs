//! Built-in job implementations.

pub mod session_sweep;

pub use session_sweep::SessionSweepJob;
