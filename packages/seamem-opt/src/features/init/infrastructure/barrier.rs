//! Initialization-barrier bookkeeping: captured-store lookup, capture
//! eligibility, and the capture rewrite itself.
//!
//! A barrier's captured stores live in its input list from `RAW_STORES`
//! on, ordered by strictly non-decreasing byte offset. Slots may
//! temporarily hold the allocation's zero-memory projection as a
//! placeholder; `remove_extra_zeroes` compacts those away.

use crate::features::alias::{indices_may_alias, AliasClassifier};
use crate::features::forwarding::all_controls_dominate;
use crate::features::memory::domain::{
    allocation_and_offset, base_and_offset, init_allocation, is_memory_access, memory_size,
    store_access, zero_memory,
};
use crate::features::merge;
use crate::shared::constants::{DEFAULT_TRACKED_INIT_LIMIT, MAX_STORE_BYTES};
use crate::shared::models::{
    slot, AddressType, ConValue, Graph, NodeId, NodeKind, ProjKind, RAW_ADDRESS, RAW_STORES,
};
use crate::shared::ports::BarrierPolicy;
use rustc_hash::FxHashSet;

/// Has the barrier been finalized? Completion is one-way.
#[inline]
pub fn is_complete(g: &Graph, init: NodeId) -> bool {
    matches!(g.kind(init), NodeKind::Initialize(info) if info.complete)
}

/// Mark the barrier complete. No further stores may be captured.
pub fn set_complete(g: &mut Graph, init: NodeId) {
    if let NodeKind::Initialize(info) = g.kind_mut(init) {
        info.complete = true;
    }
}

/// Constant byte offset a captured store writes to, or -1 when the slot
/// does not hold a resolvable store.
pub fn get_store_offset(g: &Graph, st: NodeId) -> i64 {
    if store_access(g, st).is_none() {
        return -1;
    }
    let adr = match g.input(st, slot::ADDRESS) {
        Some(a) => a,
        None => return -1,
    };
    let (base, off) = base_and_offset(g, adr);
    if base.is_none() {
        return -1;
    }
    match off.constant() {
        Some(o) if o >= 0 => o,
        _ => -1,
    }
}

/// Find the captured slot covering `[start, start+size)`.
///
/// Returns the slot index when a store with that exact extent exists,
/// the negated index where one would be inserted when none does, and 0
/// when the range overlaps an initialization boundary, tracking has been
/// exceeded, or dead garbage is encountered.
pub fn captured_store_insertion_point(
    g: &Graph,
    init: NodeId,
    start: i64,
    size_in_bytes: i64,
    header_size: i64,
    tracked_limit: i64,
) -> i32 {
    const FAIL: i32 = 0;

    if is_complete(g, init) {
        return FAIL;
    }

    // No negatives, no header fields.
    if start < header_size {
        return FAIL;
    }
    // Past the tracked window stores are no longer recorded individually.
    if start >= tracked_limit {
        return FAIL;
    }

    let zmem = zero_memory(g, init);
    let limit = g.num_inputs(init);
    let mut i = RAW_STORES;
    loop {
        if i >= limit {
            return -(i as i32); // not found; this is where it goes
        }
        let st = g.input(init, i);
        let st_off = st.map(|s| get_store_offset(g, s)).unwrap_or(-1);
        if st_off < 0 {
            if st != zmem {
                return FAIL; // dead garbage in the list
            }
        } else if st_off > start {
            // Stores are ordered, so we are done.
            if st_off < start + size_in_bytes {
                return FAIL; // the next store overlaps
            }
            return -(i as i32);
        } else if st_off < start {
            let st_size = st
                .and_then(|s| memory_size(g, s))
                .unwrap_or(MAX_STORE_BYTES);
            if size_in_bytes != 0 && start < st_off + MAX_STORE_BYTES && start < st_off + st_size
            {
                return FAIL; // the previous store overlaps
            }
        } else {
            let st_size = st.and_then(|s| memory_size(g, s)).unwrap_or(-1);
            if size_in_bytes != 0 && st_size != size_in_bytes {
                return FAIL; // mismatched store size
            }
            return i as i32;
        }
        i += 1;
    }
}

/// Look up the captured store initializing `[start, start+size)`.
/// Absent but unobstructed ranges resolve to the allocation's pristine
/// zero memory.
pub fn find_captured_store(
    g: &Graph,
    init: NodeId,
    start: i64,
    size_in_bytes: i64,
) -> Option<NodeId> {
    let alloc = init_allocation(g, init)?;
    let header = crate::features::memory::domain::minimum_header_size(g, alloc);
    let i = captured_store_insertion_point(
        g,
        init,
        start,
        size_in_bytes,
        header,
        DEFAULT_TRACKED_INIT_LIMIT,
    );
    if i == 0 {
        None // something is dead or overlapping
    } else if i < 0 {
        zero_memory(g, init) // just primordial zero bits here
    } else {
        g.input(init, i as usize)
    }
}

/// Prove a stored value free of self-reference through the object being
/// initialized, so capturing cannot create `{ p = new Foo(); p.next = p }`
/// style cycles. True for constants, parameters, and small combinations
/// thereof; bounded by `complexity_limit`.
pub fn detect_init_independence(
    g: &Graph,
    init: NodeId,
    value: NodeId,
    complexity_limit: usize,
) -> bool {
    let alloc = init_allocation(g, init);

    let mut worklist: Vec<NodeId> = vec![value];
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    seen.insert(value);

    let mut j = 0;
    while j < worklist.len() {
        if j >= complexity_limit {
            return false; // processed too many nodes
        }
        let mut n = worklist[j];
        j += 1;

        if matches!(g.kind(n), NodeKind::Proj(_)) {
            n = match g.input(n, 0) {
                Some(p) => p,
                None => continue,
            };
        }
        if n == init {
            return false; // found a cycle
        }
        if g.kind(n).is_constant() {
            continue;
        }
        if matches!(g.kind(n), NodeKind::Param(_) | NodeKind::Root) {
            continue;
        }
        if g.kind(n).is_cfg() {
            if let Some(a) = alloc {
                if all_controls_dominate(g, n, a) {
                    continue; // predates the allocation entirely
                }
            }
            return false;
        }

        if let Some(mut ctl) = g.input(n, 0) {
            if matches!(g.kind(ctl), NodeKind::Proj(_)) {
                ctl = match g.input(ctl, 0) {
                    Some(p) => p,
                    None => return false,
                };
            }
            if ctl == init {
                return false;
            }
            // A store is never pinned before the availability of its
            // inputs; anything with control must predate the barrier.
            if !all_controls_dominate(g, n, init) {
                return false;
            }
        }

        for i in 1..g.num_inputs(n) {
            if let Some(m) = g.input(n, i) {
                if m != n && seen.insert(m) {
                    worklist.push(m);
                }
            }
        }
    }
    true
}

/// All the checks a store must pass before it can be moved into an
/// initialization. Returns the constant offset on success, 0 on failure.
pub fn can_capture_store(
    g: &Graph,
    classifier: &mut AliasClassifier,
    barriers: &dyn BarrierPolicy,
    init: NodeId,
    st: NodeId,
    complexity_limit: usize,
) -> i64 {
    const FAIL: i64 = 0;

    if is_complete(g, init) {
        return FAIL;
    }

    // Must be unconditionally control dependent directly on the barrier.
    let ctl = match g.input(st, slot::CONTROL) {
        Some(c) => c,
        None => return FAIL,
    };
    if g.is_proj_of(ctl, ProjKind::Control, |k| matches!(k, NodeKind::Initialize(_)))
        != Some(init)
    {
        return FAIL;
    }

    // Must write the barrier's own memory output: no stores in between
    // that have not already been captured.
    let mem = match g.input(st, slot::MEMORY) {
        Some(m) => m,
        None => return FAIL,
    };
    if g.is_proj_of(mem, ProjKind::Memory, |k| matches!(k, NodeKind::Initialize(_)))
        != Some(init)
    {
        return FAIL;
    }

    let st_acc = match store_access(g, st) {
        Some(a) => a.clone(),
        None => return FAIL,
    };
    if st_acc.kind.is_reference() && !barriers.can_initialize(st, g) {
        return FAIL;
    }

    let adr = match g.input(st, slot::ADDRESS) {
        Some(a) => a,
        None => return FAIL,
    };
    let (alloc, off) = allocation_and_offset(g, adr);
    let alloc = match alloc {
        Some(a) => a,
        None => return FAIL, // inscrutable address
    };
    if Some(alloc) != init_allocation(g, init) {
        return FAIL; // wrong allocation; the store needs to float up
    }
    let offset = match off.constant() {
        Some(o) => o,
        None => return FAIL,
    };
    let size_in_bytes = st_acc.kind.memory_size();
    if size_in_bytes != 0 && offset % size_in_bytes != 0 {
        return FAIL; // mismatched access
    }

    let val = match g.input(st, slot::VALUE) {
        Some(v) => v,
        None => return FAIL,
    };
    if !detect_init_independence(g, init, val, complexity_limit) {
        return FAIL; // stored value is not simple enough
    }

    // Capture is only legal when nothing between the barrier and the
    // store observes the memory the store overwrites.
    let alias_idx = classifier.classify(&st_acc.addr_type);
    let mut mems: Vec<NodeId> = vec![mem];
    let mut visited: FxHashSet<NodeId> = FxHashSet::default();
    visited.insert(mem);
    let mut next = 0;
    while next < mems.len() {
        let m = mems[next];
        next += 1;
        for &n in g.uses(m) {
            if n == st || g.use_count(n) == 0 {
                // The store itself, or a dead observer.
                continue;
            }
            let n_in0 = g.input(n, 0);
            if n_in0.is_some() && n_in0 != Some(ctl) {
                // Anchored on other control: cannot sit between the
                // barrier and the store.
                continue;
            }
            if matches!(g.kind(n), NodeKind::MergeMem) {
                if merge::memory_at(g, n, alias_idx) == Some(m) && visited.insert(n) {
                    mems.push(n);
                }
            } else if is_memory_access(g, n) {
                let other_adr = match g.input(n, slot::ADDRESS) {
                    Some(a) => a,
                    None => return FAIL,
                };
                if other_adr == adr {
                    return FAIL;
                }
                let other_alias = match g.kind(n) {
                    NodeKind::Load(acc) => {
                        let at = acc.addr_type.clone();
                        classifier.classify(&at)
                    }
                    NodeKind::Store(acc) => {
                        let at = acc.addr_type.clone();
                        classifier.classify(&at)
                    }
                    _ => alias_idx,
                };
                if indices_may_alias(other_alias, alias_idx) {
                    // A read of the same slice right after the barrier:
                    // refuse when it reads the object being initialized.
                    let (obase, _) = base_and_offset(g, other_adr);
                    if let Some(ob) = obase {
                        if crate::features::memory::domain::allocation_of(g, ob) == Some(alloc)
                        {
                            return FAIL;
                        }
                    } else {
                        return FAIL;
                    }
                }
            } else {
                return FAIL; // unknown observer
            }
        }
    }

    offset
}

/// Raw address within the new object at `offset`.
pub fn make_raw_address(g: &mut Graph, init: NodeId, offset: i64) -> Option<NodeId> {
    let rawoop = g.input(init, RAW_ADDRESS)?;
    if offset == 0 {
        return Some(rawoop);
    }
    let off = g.make_con(ConValue::Long(offset));
    Some(g.add(NodeKind::AddPtr, vec![None, Some(rawoop), Some(off)]))
}

/// Clone `st` as a raw write parented on the barrier and wire it into
/// the captured list at `start`. The caller retires the original store.
pub fn capture_store(
    g: &mut Graph,
    barriers: &dyn BarrierPolicy,
    init: NodeId,
    st: NodeId,
    start: i64,
    header_size: i64,
    tracked_limit: i64,
) -> Option<NodeId> {
    if start < 0 {
        return None;
    }
    let size_in_bytes = memory_size(g, st)?;
    let i = captured_store_insertion_point(g, init, start, size_in_bytes, header_size, tracked_limit);
    if i == 0 {
        return None;
    }

    let zmem = zero_memory(g, init);
    let prev_mem;
    let mut idx;
    if i > 0 {
        // A pre-existing store sits under this one; chain onto it.
        idx = i as usize;
        prev_mem = g.input(init, idx);
        g.set_input(init, idx, None);
    } else {
        idx = (-i) as usize;
        prev_mem = zmem; // a slice of the newly allocated object
        if idx > RAW_STORES && g.input(init, idx - 1) == zmem {
            idx -= 1; // reuse a folded-away placeholder edge
            g.set_input(init, idx, None);
        } else {
            g.insert_input(init, idx, None);
        }
    }

    let new_st = g.clone_node(st);
    let init_ctl = g.input(init, slot::CONTROL);
    let raw_adr = make_raw_address(g, init, start)?;
    g.set_input(new_st, slot::CONTROL, init_ctl);
    g.set_input(new_st, slot::MEMORY, prev_mem);
    g.set_input(new_st, slot::ADDRESS, Some(raw_adr));
    if let NodeKind::Store(acc) = g.kind_mut(new_st) {
        acc.addr_type = AddressType::Raw;
        acc.flags.barrier_data = barriers.captured_barrier_data();
    }

    // The clone may fold away on the spot: a zero stored into memory
    // that is still the pristine zero state is a no-op.
    let val_is_zero = g
        .input(new_st, slot::VALUE)
        .and_then(|v| g.con_value(v))
        .map(|c| c.is_zero())
        .unwrap_or(false);
    let wired = if val_is_zero && prev_mem == zmem {
        zmem
    } else {
        Some(new_st)
    };

    g.set_input(init, idx, wired);
    wired
}

/// Compact away placeholder zero-memory slots in the captured list.
pub fn remove_extra_zeroes(g: &mut Graph, init: NodeId) {
    let zmem = zero_memory(g, init);
    let mut i = g.num_inputs(init);
    while i > RAW_STORES {
        i -= 1;
        let inp = g.input(init, i);
        if inp == zmem || inp.is_none() {
            g.remove_input(init, i);
        }
    }
}
