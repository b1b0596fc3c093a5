//! Redundancy and forwarding engine: the bounded backward walk that
//! proves independence or finds the exact defining store for an access.

pub mod infrastructure;

pub use infrastructure::engine::{can_see_stored_value, find_previous_store, SeenValue};
pub use infrastructure::independence::{all_controls_dominate, detect_ptr_independence};
