//! Bootstrap of a shim from configuration.

pub mod shim_builder;

pub use shim_builder::{Shim, ShimBuilder};
