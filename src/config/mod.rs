//! Configuration for the shim runtime.

pub mod shim;

pub use shim::{ShimConfig, ENV_PREFIX};
