//! Object-initialization coalescer: store capture into the barrier,
//! subword-constant tiling, and zero-fill on completion.

pub mod infrastructure;

pub use infrastructure::{
    can_capture_store, capture_store, coalesce_subword_stores, complete_stores,
    find_captured_store, is_complete, set_complete, CoalesceStats,
};
