//! Orchestration: the worklist driver and the invariant checker.

pub mod optimizer;
pub mod verify;

pub use optimizer::{Optimizer, OptimizerConfig, OptimizerStats};
