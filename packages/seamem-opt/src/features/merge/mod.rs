//! Memory-state merge: the sparse alias-index → memory mapping with a
//! wide fallback base.

pub mod infrastructure;

pub use infrastructure::{
    base_memory, identity, make, memory_at, set_memory_at, simplify, verify_sparse,
};
