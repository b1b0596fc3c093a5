//! Memory-state merge operations.
//!
//! A MergeMem node maps alias indices to memory-producing nodes. The
//! representation is sparse: input slot `i` carries the slice for alias
//! index `i`, an absent slot means "fall through to the base", and the
//! base lives at `ALIAS_IDX_BOT`. The sparse invariant: no stored slot
//! may equal the base; such slots must collapse to absent, or the base
//! would have two meanings.

use crate::shared::constants::{
    ALIAS_IDX_BOT, ALIAS_IDX_RAW, ALIAS_IDX_TOP, MERGE_SIMPLIFY_BUDGET,
};
use crate::shared::models::{AliasIndex, Graph, NodeId, NodeKind};

/// Build a merge over `base`. If `base` is itself a merge, adopt its
/// base and slices instead of stacking.
pub fn make(g: &mut Graph, base: NodeId) -> NodeId {
    let inputs = if matches!(g.kind(base), NodeKind::MergeMem) {
        g.inputs(base).to_vec()
    } else {
        let mut v = vec![None; ALIAS_IDX_RAW + 1];
        v[ALIAS_IDX_BOT] = Some(base);
        v
    };
    g.add(NodeKind::MergeMem, inputs)
}

/// The distinguished wide slice covering all unlisted indices.
#[inline]
pub fn base_memory(g: &Graph, mm: NodeId) -> Option<NodeId> {
    g.input(mm, ALIAS_IDX_BOT)
}

/// Memory state for an alias index: the stored slot, or the base when
/// the slot is absent. Returns `None` only for dead merges.
pub fn memory_at(g: &Graph, mm: NodeId, idx: AliasIndex) -> Option<NodeId> {
    debug_assert_ne!(idx, ALIAS_IDX_TOP, "no memory at the sentinel index");
    if idx == ALIAS_IDX_BOT {
        return base_memory(g, mm);
    }
    g.input(mm, idx).or_else(|| base_memory(g, mm))
}

/// Store a slice, maintaining the sparse invariant: a slice equal to the
/// base is recorded as absent. Grows the slot array on demand, but never
/// grows it just to record an absent slot.
pub fn set_memory_at(g: &mut Graph, mm: NodeId, idx: AliasIndex, n: Option<NodeId>) {
    debug_assert!(idx >= ALIAS_IDX_RAW, "base and sentinel are not slices");
    let collapsed = if n == base_memory(g, mm) { None } else { n };
    if collapsed.is_none() && idx >= g.num_inputs(mm) {
        return;
    }
    g.set_input(mm, idx, collapsed);
}

/// Idempotent structural simplification. Returns true when anything
/// changed.
///
/// Runs `simplify_step` to an internal fixed point, so one call settles
/// even a base that stacks several merges deep. The step budget guards
/// against slice cycles left behind by collapsed irreducible control
/// flow that direct self-reference detection cannot see.
pub fn simplify(g: &mut Graph, mm: NodeId) -> bool {
    let mut progress = false;
    for _ in 0..MERGE_SIMPLIFY_BUDGET {
        if !simplify_step(g, mm) {
            break;
        }
        progress = true;
    }
    progress
}

/// One simplification pass: flatten a merge-typed base one level,
/// re-slice slots that are themselves merges, clear accidental
/// self-references, and re-collapse any slot that now equals the
/// (possibly new) base.
fn simplify_step(g: &mut Graph, mm: NodeId) -> bool {
    let mut progress = false;

    let old_base = match base_memory(g, mm) {
        Some(b) => b,
        // Dead memory path; nothing to interpret slices against.
        None => return clear_slices(g, mm),
    };

    let old_mbase = if matches!(g.kind(old_base), NodeKind::MergeMem) {
        Some(old_base)
    } else {
        None
    };

    // Flatten a stacked merge in the base.
    let new_base: Option<NodeId> = match old_mbase {
        Some(mb) => base_memory(g, mb),
        None => Some(old_base),
    };

    // The nested base may contribute slices beyond our current width.
    if let Some(mb) = old_mbase {
        grow_to_match(g, mm, mb);
    }

    // Each slot is interpreted relative to the old base but rewritten
    // relative to the new one.
    for i in ALIAS_IDX_RAW..g.num_inputs(mm) {
        let old_in = g.input(mm, i);
        let old_mem = old_in.unwrap_or(old_base);

        let new_mem: Option<NodeId> = if old_mem == mm {
            // Self-loop: collapsed loops can leave a merge looking at
            // itself, which means this slice carries no effect anymore.
            match new_base {
                Some(nb) if nb != mm => Some(nb),
                _ => None,
            }
        } else if matches!(g.kind(old_mem), NodeKind::MergeMem) {
            memory_at(g, old_mem, i)
        } else {
            Some(old_mem)
        };

        let new_in = if new_mem == new_base { None } else { new_mem };
        if new_in != old_in {
            g.set_input(mm, i, new_in);
            progress = true;
        }
    }

    if new_base != Some(old_base) {
        g.set_input(mm, ALIAS_IDX_BOT, new_base);
        progress = true;
    }

    // A base self-cycle means the whole memory path is dead.
    if base_memory(g, mm) == Some(mm) {
        g.set_input(mm, ALIAS_IDX_BOT, None);
        progress = true;
    }

    if base_memory(g, mm).is_none() && clear_slices(g, mm) {
        progress = true;
    }

    debug_assert!(verify_sparse(g, mm), "slot duplicating the base survived simplify");
    progress
}

/// Identity rule: a merge recording no interesting disambiguation is
/// replaceable by its base everywhere.
pub fn identity(g: &Graph, mm: NodeId) -> Option<NodeId> {
    let base = base_memory(g, mm)?;
    for i in ALIAS_IDX_RAW..g.num_inputs(mm) {
        if let Some(n) = g.input(mm, i) {
            if n != base {
                return None;
            }
        }
    }
    Some(base)
}

/// Sparse invariant check: no slot equals the base.
pub fn verify_sparse(g: &Graph, mm: NodeId) -> bool {
    let base = match base_memory(g, mm) {
        Some(b) => b,
        None => return true,
    };
    for i in ALIAS_IDX_RAW..g.num_inputs(mm) {
        if g.input(mm, i) == Some(base) {
            return false;
        }
    }
    true
}

fn clear_slices(g: &mut Graph, mm: NodeId) -> bool {
    let mut progress = false;
    for i in ALIAS_IDX_RAW..g.num_inputs(mm) {
        if g.input(mm, i).is_some() {
            g.set_input(mm, i, None);
            progress = true;
        }
    }
    progress
}

fn grow_to_match(g: &mut Graph, mm: NodeId, other: NodeId) {
    let mut widest = 0;
    for i in (g.num_inputs(mm)..g.num_inputs(other)).rev() {
        if g.input(other, i).is_some() {
            widest = i + 1;
            break;
        }
    }
    while g.num_inputs(mm) < widest {
        g.add_input(mm, None);
    }
}
