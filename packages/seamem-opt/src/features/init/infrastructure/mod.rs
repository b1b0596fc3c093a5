pub mod barrier;
pub mod coalesce;

pub use barrier::{
    can_capture_store, capture_store, captured_store_insertion_point, detect_init_independence,
    find_captured_store, get_store_offset, is_complete, make_raw_address, remove_extra_zeroes,
    set_complete,
};
pub use coalesce::{coalesce_subword_stores, complete_stores, find_next_fullword_store, CoalesceStats};
