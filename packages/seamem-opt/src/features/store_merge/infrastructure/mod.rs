//! Adjacent-store merging.
//!
//! Consecutive byte/char/int stores writing strictly adjacent ascending
//! offsets of one base, whose values are bit-compatible slices of one
//! wider source (all-constant, or consecutive right-shifts of a common
//! base in either byte order), collapse into a single wider store. The
//! chain found is truncated down to a power of two; byte-swapped order
//! is used only when the target has a reverse-bytes primitive.

use crate::features::memory::domain::{base_and_offset, store_access};
use crate::shared::models::{
    slot, ConValue, Graph, MemOrd, NodeId, NodeKind, ProjKind, StoreKind,
};
use crate::shared::ports::TargetCaps;

/// Observed ordering of the input values across an adjacent pair.
///
/// Once the order is pinned by the first pair it may not change along
/// the chain; any disagreement ends the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueOrder {
    Unknown,
    /// All inputs are int constants.
    Const,
    /// Slices follow platform byte order.
    Platform,
    /// Slices are reversed; needs a byte-swap instruction.
    Reverse,
    NotAdjacent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CfgStatus {
    SuccessNoRangeCheck,
    SuccessWithRangeCheck,
    Failure,
}

#[derive(Debug, Clone, Copy)]
struct Status {
    found: Option<NodeId>,
    range_check: bool,
}

impl Status {
    fn failure() -> Self {
        Status { found: None, range_check: false }
    }

    fn make(found: NodeId, cfg: CfgStatus) -> Self {
        match cfg {
            CfgStatus::Failure => Status::failure(),
            CfgStatus::SuccessNoRangeCheck => Status { found: Some(found), range_check: false },
            CfgStatus::SuccessWithRangeCheck => Status { found: Some(found), range_check: true },
        }
    }
}

struct Ctx {
    store: NodeId,
    kind: StoreKind,
    size: i64,
    order: ValueOrder,
}

/// Try to merge the chain ending at `store`. Returns the merged store,
/// or `None` when nothing is provable.
pub fn run(g: &mut Graph, caps: &dyn TargetCaps, store: NodeId) -> Option<NodeId> {
    let acc = store_access(g, store)?.clone();
    if !matches!(acc.kind, StoreKind::B | StoreKind::C | StoreKind::I) {
        return None;
    }
    if acc.ord != MemOrd::Unordered {
        return None;
    }

    let mut ctx = Ctx {
        store,
        kind: acc.kind,
        size: acc.kind.memory_size(),
        order: ValueOrder::Unknown,
    };

    // `store` must be the last store of its chain; otherwise a store
    // further down is the one to start from.
    let status_use = find_adjacent_use_store(g, caps, &ctx, store);
    if status_use.found.is_some() {
        return None;
    }

    // Need at least one mergeable def below us.
    let status_def = find_adjacent_def_store(g, caps, &ctx, store);
    let def_store = status_def.found?;

    // Pin the value order from the first pair.
    let order = find_adjacent_input_value_order(
        g,
        g.input(def_store, slot::VALUE)?,
        g.input(store, slot::VALUE)?,
        ctx.size,
    );
    debug_assert!(!matches!(order, ValueOrder::Unknown | ValueOrder::NotAdjacent));
    ctx.order = order;

    let merge_list = collect_merge_list(g, caps, &ctx);
    if merge_list.len() < 2 {
        return None;
    }

    let merged_value = make_merged_input_value(g, caps, &ctx, &merge_list)?;
    Some(make_merged_store(g, &ctx, &acc, &merge_list, merged_value))
}

fn is_compatible_store(g: &Graph, ctx: &Ctx, other: NodeId) -> bool {
    match store_access(g, other) {
        Some(acc) => acc.kind == ctx.kind && acc.ord == MemOrd::Unordered,
        None => false,
    }
}

/// Nothing may sit between the pair except, at most, one range check
/// leading away to an uncommon path.
fn cfg_status_for_pair(g: &Graph, use_store: NodeId, def_store: NodeId) -> CfgStatus {
    debug_assert_eq!(g.input(use_store, slot::MEMORY), Some(def_store));

    let ctrl_use = match g.input(use_store, slot::CONTROL) {
        Some(c) => c,
        None => return CfgStatus::Failure,
    };
    let ctrl_def = match g.input(def_store, slot::CONTROL) {
        Some(c) => c,
        None => return CfgStatus::Failure,
    };

    if ctrl_use == ctrl_def {
        // Same control: the def store may have no other observer.
        if g.use_count(def_store) > 1 {
            return CfgStatus::Failure;
        }
        return CfgStatus::SuccessNoRangeCheck;
    }

    // Different control: allowed only across a single range check whose
    // other memory observer is one single-use merge (the slow path).
    if g.use_count(def_store) != 2 {
        return CfgStatus::Failure;
    }
    let other = g
        .uses(def_store)
        .iter()
        .copied()
        .find(|&u| u != use_store);
    let other = match other {
        Some(o) => o,
        None => return CfgStatus::Failure,
    };
    if !matches!(g.kind(other), NodeKind::MergeMem) || g.use_count(other) != 1 {
        return CfgStatus::Failure;
    }
    let rc = match g.proj_source(ctrl_use) {
        Some((p, ProjKind::IfTrue)) | Some((p, ProjKind::IfFalse)) => p,
        _ => return CfgStatus::Failure,
    };
    if !matches!(g.kind(rc), NodeKind::RangeCheck) || g.input(rc, 0) != Some(ctrl_def) {
        return CfgStatus::Failure;
    }
    CfgStatus::SuccessWithRangeCheck
}

/// Are def and use stores adjacent in both address and value?
fn is_adjacent_pair(
    g: &Graph,
    caps: &dyn TargetCaps,
    ctx: &Ctx,
    use_store: NodeId,
    def_store: NodeId,
) -> bool {
    let use_val = match g.input(use_store, slot::VALUE) {
        Some(v) => v,
        None => return false,
    };
    let def_val = match g.input(def_store, slot::VALUE) {
        Some(v) => v,
        None => return false,
    };
    if !is_adjacent_input_pair(g, caps, ctx, def_val, use_val) {
        return false;
    }

    // def writes [off, off+size) and use writes [off+size, off+2*size)
    // of the same base.
    let use_adr = match g.input(use_store, slot::ADDRESS) {
        Some(a) => a,
        None => return false,
    };
    let def_adr = match g.input(def_store, slot::ADDRESS) {
        Some(a) => a,
        None => return false,
    };
    let (ub, uo) = base_and_offset(g, use_adr);
    let (db, do_) = base_and_offset(g, def_adr);
    match (ub, db, uo.constant(), do_.constant()) {
        (Some(ub), Some(db), Some(uo), Some(doff)) => ub == db && uo == doff + ctx.size,
        _ => false,
    }
}

/// Detect `n = base >> shift` with a constant shift, looking through a
/// long-to-int narrowing. Any other int/long value counts as `n >> 0`.
fn is_con_rshift(g: &Graph, n: NodeId) -> Option<(NodeId, i64)> {
    let mut n = n;
    if matches!(g.kind(n), NodeKind::ConvLongToInt) {
        n = g.input(n, 1)?;
    }
    match g.kind(n) {
        NodeKind::RShiftInt | NodeKind::RShiftLong | NodeKind::UShiftInt | NodeKind::UShiftLong => {
            let base = g.input(n, 1)?;
            let shift = match g.input(n, 2).and_then(|s| g.con_value(s)) {
                Some(ConValue::Int(s)) if s >= 0 => s as i64,
                _ => return None,
            };
            Some((base, shift))
        }
        _ => Some((n, 0)),
    }
}

fn find_adjacent_input_value_order(
    g: &Graph,
    n1: NodeId,
    n2: NodeId,
    memory_size: i64,
) -> ValueOrder {
    // Pattern: [n1 = ConI, n2 = ConI]
    if matches!(g.con_value(n1), Some(ConValue::Int(_)))
        && matches!(g.con_value(n2), Some(ConValue::Int(_)))
    {
        return ValueOrder::Const;
    }

    let (base2, shift2) = match is_con_rshift(g, n2) {
        Some(r) => r,
        None => return ValueOrder::NotAdjacent,
    };
    let (base1, shift1) = match is_con_rshift(g, n1) {
        Some(r) => r,
        None => return ValueOrder::NotAdjacent,
    };

    let bits_per_store = memory_size * 8;
    if base1 != base2
        || (shift1 - shift2).abs() != bits_per_store
        || shift1 % bits_per_store != 0
    {
        return ValueOrder::NotAdjacent;
    }

    if cfg!(target_endian = "little") {
        if shift1 < shift2 {
            ValueOrder::Platform
        } else {
            ValueOrder::Reverse
        }
    } else if shift1 > shift2 {
        ValueOrder::Platform
    } else {
        ValueOrder::Reverse
    }
}

fn is_adjacent_input_pair(
    g: &Graph,
    caps: &dyn TargetCaps,
    ctx: &Ctx,
    n1: NodeId,
    n2: NodeId,
) -> bool {
    let order = find_adjacent_input_value_order(g, n1, n2, ctx.size);
    match order {
        ValueOrder::NotAdjacent | ValueOrder::Unknown => false,
        ValueOrder::Reverse => {
            // Byte-swapped merging needs a reverse-bytes primitive and
            // is only implemented for byte chains.
            if ctx.size != 1 || !caps.supports_reverse_bytes() {
                return false;
            }
            ctx.order == ValueOrder::Unknown || ctx.order == order
        }
        ValueOrder::Const | ValueOrder::Platform => {
            ctx.order == ValueOrder::Unknown || ctx.order == order
        }
    }
}

fn find_use_store_unidirectional(g: &Graph, ctx: &Ctx, def_store: NodeId) -> Status {
    for &u in g.uses(def_store) {
        if is_compatible_store(g, ctx, u) && g.input(u, slot::MEMORY) == Some(def_store) {
            return Status::make(u, cfg_status_for_pair(g, u, def_store));
        }
    }
    Status::failure()
}

fn find_def_store_unidirectional(g: &Graph, ctx: &Ctx, use_store: NodeId) -> Status {
    let def = match g.input(use_store, slot::MEMORY) {
        Some(d) => d,
        None => return Status::failure(),
    };
    if !is_compatible_store(g, ctx, def) {
        return Status::failure();
    }
    Status::make(def, cfg_status_for_pair(g, use_store, def))
}

fn find_adjacent_use_store(
    g: &Graph,
    caps: &dyn TargetCaps,
    ctx: &Ctx,
    def_store: NodeId,
) -> Status {
    let status = find_use_store_unidirectional(g, ctx, def_store);
    match status.found {
        Some(u) if !is_adjacent_pair(g, caps, ctx, u, def_store) => Status::failure(),
        _ => status,
    }
}

fn find_adjacent_def_store(
    g: &Graph,
    caps: &dyn TargetCaps,
    ctx: &Ctx,
    use_store: NodeId,
) -> Status {
    let status = find_def_store_unidirectional(g, ctx, use_store);
    match status.found {
        Some(d) if !is_adjacent_pair(g, caps, ctx, use_store, d) => Status::failure(),
        _ => status,
    }
}

/// Walk def-ward collecting the adjacent chain, then truncate it to the
/// largest power of two (the merged store can be at most 8 bytes).
fn collect_merge_list(g: &Graph, caps: &dyn TargetCaps, ctx: &Ctx) -> Vec<NodeId> {
    let max_size = (8 / ctx.size) as usize;
    let mut list = vec![ctx.store];
    let mut current = ctx.store;
    while list.len() < max_size {
        let status = find_adjacent_def_store(g, caps, ctx, current);
        match status.found {
            Some(d) => {
                list.push(d);
                current = d;
                // At most one range check per merged group.
                if status.range_check {
                    break;
                }
            }
            None => break,
        }
    }

    let mut pow2 = 1;
    while pow2 * 2 <= list.len() {
        pow2 *= 2;
    }
    list.truncate(pow2);
    list
}

/// Is this node known to produce a 64-bit value?
fn is_long_valued(g: &Graph, id: NodeId) -> bool {
    matches!(
        g.kind(id),
        NodeKind::ConLong(_)
            | NodeKind::RShiftLong
            | NodeKind::UShiftLong
            | NodeKind::AndLong
            | NodeKind::ReverseBytes(8)
    )
}

/// Merge the input values of the smaller stores into one wider value.
/// `merge_list[0]` is the use-most (highest-offset) store.
fn make_merged_input_value(
    g: &mut Graph,
    _caps: &dyn TargetCaps,
    ctx: &Ctx,
    merge_list: &[NodeId],
) -> Option<NodeId> {
    let new_memory_size = ctx.size * merge_list.len() as i64;
    let first = *merge_list.last()?;

    let store_val = g.input(ctx.store, slot::VALUE)?;
    let mut merged: NodeId;

    if matches!(g.con_value(store_val), Some(ConValue::Int(_))) {
        debug_assert_eq!(ctx.order, ValueOrder::Const);
        // Pattern: [ConI, ConI, ...] → one recombined constant.
        let bits_per_store = ctx.size * 8;
        let mask: i64 = (1i64 << bits_per_store) - 1;
        let mut con: i64 = 0;
        if cfg!(target_endian = "little") {
            // Highest address ends up in the most significant bits.
            for &st in merge_list.iter() {
                let ci = match g.input(st, slot::VALUE).and_then(|v| g.con_value(v)) {
                    Some(ConValue::Int(c)) => c as i64,
                    _ => return None,
                };
                con = (con << bits_per_store) | (mask & ci);
            }
        } else {
            for (i, &st) in merge_list.iter().enumerate() {
                let ci = match g.input(st, slot::VALUE).and_then(|v| g.con_value(v)) {
                    Some(ConValue::Int(c)) => c as i64,
                    _ => return None,
                };
                con |= (mask & ci) << (i as i64 * bits_per_store);
            }
        }
        merged = if new_memory_size <= 4 {
            g.make_con(ConValue::Int(con as i32))
        } else {
            g.make_con(ConValue::Long(con))
        };
    } else {
        debug_assert!(matches!(ctx.order, ValueOrder::Platform | ValueOrder::Reverse));
        // Pattern: [base >> 24, base >> 16, base >> 8, base] → base.
        let mut hi = store_val;
        let mut lo = g.input(first, slot::VALUE)?;
        if cfg!(target_endian = "big") {
            std::mem::swap(&mut hi, &mut lo);
        }
        if ctx.order == ValueOrder::Reverse {
            std::mem::swap(&mut hi, &mut lo);
        }
        let (hi_base, _hi_shift) = is_con_rshift(g, hi)?;
        let mut m = lo;
        if m != hi_base && matches!(g.kind(m), NodeKind::ConvLongToInt) {
            m = g.input(m, 1)?; // look through the narrowing
        }
        if m != hi_base {
            return None; // the low slice is not the shift base
        }
        merged = m;

        if is_long_valued(g, merged) && new_memory_size <= 4 {
            merged = g.add(NodeKind::ConvLongToInt, vec![None, Some(merged)]);
        }
    }

    if ctx.order == ValueOrder::Reverse {
        debug_assert_eq!(ctx.size, 1, "only byte chains reverse");
        merged = g.add(
            NodeKind::ReverseBytes(new_memory_size as u8),
            vec![None, Some(merged)],
        );
    }
    Some(merged)
}

/// Build the wider store: the first (def-most) store's memory and
/// address, the last store's control, marked mismatched so nothing
/// reorders it within the slice.
fn make_merged_store(
    g: &mut Graph,
    ctx: &Ctx,
    acc: &crate::shared::models::StoreAccess,
    merge_list: &[NodeId],
    merged_input_value: NodeId,
) -> NodeId {
    let first = merge_list[merge_list.len() - 1];
    let last_ctrl = g.input(ctx.store, slot::CONTROL);
    let first_mem = g.input(first, slot::MEMORY);
    let first_adr = g.input(first, slot::ADDRESS);

    let new_memory_size = ctx.size * merge_list.len() as i64;
    let new_kind = match new_memory_size {
        2 => StoreKind::C,
        4 => StoreKind::I,
        _ => StoreKind::L,
    };

    let mut flags = acc.flags;
    flags.mismatched = true;

    let adr = first_adr.unwrap_or_else(|| g.make_con(ConValue::Null));
    crate::features::memory::infrastructure::store::make_raw(
        g,
        last_ctrl,
        first_mem,
        adr,
        acc.addr_type.clone(),
        new_kind,
        merged_input_value,
        MemOrd::Unordered,
        flags,
    )
}
