//! Small helpers shared across the crate.

pub mod clock;
pub mod telemetry;

pub use clock::*;
pub use telemetry::*;
