//! The backward memory-chain walk.
//!
//! Given a memory access, walk the chain of stores, initialization
//! barriers, calls, and merges reachable through the memory predecessor
//! edge, classifying every step as independent (skip), exact match
//! (stop and report), or inscrutable (abort). Any node kind the walk
//! does not recognize halts it; the walk never guesses.

use super::independence::{all_controls_dominate, detect_ptr_independence};
use crate::features::alias::AliasClassifier;
use crate::features::init::infrastructure::find_captured_store;
use crate::features::memory::domain::{
    allocation_of, base_and_offset, init_allocation, load_access, minimum_header_size,
    store_access,
};
use crate::features::merge;
use crate::shared::constants::MAX_STORE_BYTES;
use crate::shared::models::{
    slot, AddressType, Graph, NodeId, NodeKind, Offset, ProjKind, StoreKind,
};
use crate::shared::ports::BarrierPolicy;

/// What a defining memory state resolves to for a reading access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeenValue {
    /// The exact value node a matching store wrote.
    Node(NodeId),
    /// The pristine all-zero state of a fresh allocation.
    Zero,
}

/// Slice, width, and store variant of a memory access, for the walkers.
fn access_shape(g: &Graph, access: NodeId) -> Option<(AddressType, i64, StoreKind)> {
    if let Some(acc) = load_access(g, access) {
        return Some((acc.addr_type.clone(), acc.kind.memory_size(), acc.kind.store_kind()));
    }
    if let Some(acc) = store_access(g, access) {
        return Some((acc.addr_type.clone(), acc.kind.memory_size(), acc.kind));
    }
    None
}

/// Walk backward from `access`'s memory input looking for the exact
/// store that defines its address, skipping stores and initializations
/// proven independent. Returns the defining node (a Store, or the
/// memory projection of the owning Allocate/Initialize), or `None` when
/// nothing could be proven within the step budget.
pub fn find_previous_store(
    g: &Graph,
    classifier: &mut AliasClassifier,
    barriers: &dyn BarrierPolicy,
    access: NodeId,
    cycle_limit: u32,
) -> Option<NodeId> {
    let (addr_type, size_in_bytes, _) = access_shape(g, access)?;
    let adr = g.input(access, slot::ADDRESS)?;
    let (base_opt, off) = base_and_offset(g, adr);
    // Cannot unalias anything without a precise offset.
    let offset = off.constant()?;
    let base = base_opt?;
    let alloc = allocation_of(g, base);
    let adr_maybe_raw = addr_type.is_raw();

    let mut mem = g.input(access, slot::MEMORY)?;

    let mut cnt = cycle_limit;
    loop {
        // Caught in a cycle or a complicated dance?
        if cnt == 0 {
            break;
        }
        cnt -= 1;

        match g.kind(mem) {
            NodeKind::Store(st_acc) => {
                let st_adr = match g.input(mem, slot::ADDRESS) {
                    Some(a) => a,
                    None => break,
                };
                let (st_base_opt, st_off) = base_and_offset(g, st_adr);
                let st_base = match st_base_opt {
                    Some(b) => b,
                    None => break, // inscrutable pointer
                };

                // For raw accesses disjoint constant offsets mean nothing
                // unless the bases are equal.
                if (adr_maybe_raw || st_acc.addr_type.is_raw()) && st_base != base {
                    break;
                }

                let st_size = st_acc.kind.memory_size();
                if let Offset::Con(so) = st_off {
                    if so != offset
                        && (so >= offset + size_in_bytes
                            || so <= offset - MAX_STORE_BYTES
                            || so <= offset - st_size)
                    {
                        // The offsets are provably independent. Stores of
                        // different sizes coexist in the same raw chain, so
                        // simple inequality is not enough.
                        match g.input(mem, slot::MEMORY) {
                            Some(m) => {
                                mem = m;
                                continue;
                            }
                            None => break,
                        }
                    }
                }

                if st_base != base
                    && detect_ptr_independence(
                        g,
                        base,
                        alloc,
                        st_base,
                        allocation_of(g, st_base),
                    )
                {
                    // The bases are provably independent.
                    match g.input(mem, slot::MEMORY) {
                        Some(m) => {
                            mem = m;
                            continue;
                        }
                        None => break,
                    }
                }

                if st_base == base && st_off == Offset::Con(offset) {
                    return Some(mem); // exact match; caller resolves the value
                }

                // Bases or offsets neither match nor separate: give up.
                break;
            }

            NodeKind::Proj(ProjKind::Memory) => {
                let producer = match g.input(mem, 0) {
                    Some(p) => p,
                    None => break,
                };
                match g.kind(producer) {
                    NodeKind::Initialize(_) => {
                        let st_alloc = match init_allocation(g, producer) {
                            Some(a) => a,
                            None => break, // something degenerated
                        };
                        if alloc == Some(st_alloc) {
                            // The barrier of the very object we read.
                            return Some(mem);
                        }
                        let independent = alloc.is_some()
                            || all_controls_dominate(g, access, st_alloc);
                        if independent {
                            // Either manifestly distinct allocations, or our
                            // control predates that allocation entirely.
                            match g.input(st_alloc, slot::MEMORY) {
                                Some(m) => {
                                    mem = m;
                                    continue;
                                }
                                None => break,
                            }
                        }
                        break;
                    }
                    NodeKind::Allocate(_) => {
                        if alloc == Some(producer) {
                            // Pristine zero state of our own object.
                            return Some(mem);
                        }
                        let independent = alloc.is_some()
                            || all_controls_dominate(g, access, producer);
                        if independent {
                            match g.input(producer, slot::MEMORY) {
                                Some(m) => {
                                    mem = m;
                                    continue;
                                }
                                None => break,
                            }
                        }
                        break;
                    }
                    NodeKind::Call => {
                        // A call that cannot touch this slice is invisible.
                        if addr_type.is_oop_slice()
                            && !barriers.may_modify(&addr_type, producer, g)
                        {
                            match g.input(producer, slot::MEMORY) {
                                Some(m) => {
                                    mem = m;
                                    continue;
                                }
                                None => break,
                            }
                        }
                        break;
                    }
                    _ => break,
                }
            }

            NodeKind::ClearRange => {
                // Bypass a bulk clear only when it manifestly zeroes a
                // different allocation.
                let dest = match g.input(mem, slot::ADDRESS) {
                    Some(d) => d,
                    None => break,
                };
                let (clear_base, _) = base_and_offset(g, dest);
                let clear_alloc = clear_base.and_then(|b| allocation_of(g, b));
                match (alloc, clear_alloc) {
                    (Some(a), Some(ca)) if a != ca => {
                        match g.input(mem, slot::MEMORY) {
                            Some(m) => {
                                mem = m;
                                continue;
                            }
                            None => break,
                        }
                    }
                    _ => return Some(mem), // cannot see through the clear
                }
            }

            NodeKind::MergeMem => {
                let idx = classifier.classify(&addr_type);
                match merge::memory_at(g, mem, idx) {
                    Some(m) if m != mem => {
                        mem = m;
                        continue;
                    }
                    _ => break,
                }
            }

            // Inscrutable memory state (phi, unknown kind): bail out.
            _ => break,
        }
    }

    None
}

/// Resolve the node returned by `find_previous_store` (or a direct
/// memory input) to the value the reading access would observe.
pub fn can_see_stored_value(g: &Graph, access: NodeId, st: NodeId) -> Option<SeenValue> {
    let (_, size_in_bytes, want_store_kind) = access_shape(g, access)?;
    let ld_adr = g.input(access, slot::ADDRESS)?;
    let (ld_base_opt, ld_off) = base_and_offset(g, ld_adr);
    let ld_alloc = ld_base_opt.and_then(|b| allocation_of(g, b));

    let mut st = st;
    // Two trips: Load → Initialize → captured Store.
    for _trip in 0..=1 {
        match g.kind(st) {
            NodeKind::Store(st_acc) => {
                let st_adr = match g.input(st, slot::ADDRESS) {
                    Some(a) => a,
                    None => return None,
                };
                if st_adr != ld_adr {
                    // Unify base pointers modulo casts before giving up.
                    let (st_base_opt, st_off) = base_and_offset(g, st_adr);
                    let ld_base = ld_base_opt?;
                    let st_base = st_base_opt?;
                    if st_base != ld_base {
                        return None;
                    }
                    let lo = ld_off.constant()?;
                    let so = st_off.constant()?;
                    if lo != so {
                        return None;
                    }
                }
                // Same address; now the widths must agree exactly.
                if st_acc.kind != want_store_kind {
                    return None;
                }
                return g.input(st, slot::VALUE).map(SeenValue::Node);
            }

            NodeKind::Proj(ProjKind::Memory) => {
                let producer = g.input(st, 0)?;
                match g.kind(producer) {
                    NodeKind::Allocate(_) => {
                        // A load from a freshly created object returns zero
                        // for anything past the header.
                        if Some(producer) == ld_alloc {
                            let lo = ld_off.constant()?;
                            if lo >= minimum_header_size(g, producer) {
                                return Some(SeenValue::Zero);
                            }
                        }
                        return None;
                    }
                    NodeKind::Initialize(_) => {
                        let alloc = init_allocation(g, producer)?;
                        if Some(alloc) != ld_alloc {
                            return None;
                        }
                        let lo = ld_off.constant()?;
                        match find_captured_store(g, producer, lo, size_in_bytes) {
                            Some(next) => {
                                st = next;
                                continue; // one more trip around
                            }
                            None => return None,
                        }
                    }
                    _ => return None,
                }
            }

            _ => return None,
        }
    }
    None
}
