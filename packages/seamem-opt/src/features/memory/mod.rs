//! Memory-access nodes: the Load/Store/ClearRange family, their
//! factories, and their rewrite hooks.

pub mod domain;
pub mod infrastructure;

pub use domain::Rewrite;
pub use infrastructure::{clear, load, store};
