//! Crate-wide constants: alias indices, walk budgets, tracking limits.

/// Sentinel alias index; never carries a memory slice.
pub const ALIAS_IDX_TOP: usize = 0;

/// Conservative "aliases everything" index; the wide/base slice.
pub const ALIAS_IDX_BOT: usize = 1;

/// Untyped machine memory (object headers, GC metadata, off-heap).
pub const ALIAS_IDX_RAW: usize = 2;

/// First index handed out for a classified address type.
pub const ALIAS_IDX_FIRST: usize = 3;

/// Largest store width the walkers have to reason about, in bytes.
pub const MAX_STORE_BYTES: i64 = 8;

/// Default step budget for the backward memory-chain walk.
/// A termination guard against accidental cycles, not a contract value.
pub const DEFAULT_CYCLE_LIMIT: u32 = 50;

/// Default node budget when proving a captured value free of
/// self-reference through the object being initialized.
pub const DEFAULT_CAPTURE_COMPLEXITY_LIMIT: usize = 20;

/// Default byte limit past which initialization stores are no longer
/// tracked individually by the barrier.
pub const DEFAULT_TRACKED_INIT_LIMIT: i64 = 400;

/// Default run length (bytes) below which zero-filling uses word stores
/// instead of a bulk clear node.
pub const DEFAULT_CLEAR_SHORT_SIZE: i64 = 64;

/// Step budget for the bounded dominator walk.
pub const DOMINATOR_WALK_BUDGET: usize = 64;

/// Internal pass budget for memory-merge simplification. A guard
/// against slice cycles, not a quality knob; real graphs settle in one
/// or two passes.
pub const MERGE_SIMPLIFY_BUDGET: usize = 8;
