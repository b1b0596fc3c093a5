//! Store nodes: factory and rewrite hooks.

use crate::features::alias::AliasClassifier;
use crate::features::forwarding::{can_see_stored_value, find_previous_store, SeenValue};
use crate::features::init::infrastructure::{can_capture_store, capture_store, is_complete};
use crate::features::memory::domain::{
    init_allocation, load_access, minimum_header_size, same_address, store_access, Rewrite,
};
use crate::features::merge;
use crate::features::store_merge;
use crate::shared::models::{
    slot, AccessFlags, AddressType, BasicType, ConValue, Graph, MemOrd, NodeId, NodeKind,
    ProjKind, StoreAccess, StoreKind,
};
use crate::shared::ports::{BarrierPolicy, TargetCaps};

/// Build a store, selecting the concrete variant by basic type.
///
/// Boolean stores are masked to one bit; reference stores are encoded
/// when the runtime uses compressed references.
#[allow(clippy::too_many_arguments)]
pub fn make(
    g: &mut Graph,
    ctl: Option<NodeId>,
    mem: Option<NodeId>,
    adr: NodeId,
    addr_type: AddressType,
    value: NodeId,
    bt: BasicType,
    ord: MemOrd,
    flags: AccessFlags,
    compressed_refs: bool,
) -> NodeId {
    let mut kind = StoreKind::for_basic_type(bt);
    let mut value = value;
    if bt == BasicType::Bool {
        // Booleans hold only their lowest bit.
        let one = g.make_con(ConValue::Int(1));
        value = g.add(NodeKind::AndInt, vec![None, Some(value), Some(one)]);
    }
    if bt == BasicType::Ptr && compressed_refs {
        kind = StoreKind::N;
        value = g.add(NodeKind::EncodePtr, vec![None, Some(value)]);
    }
    make_raw(g, ctl, mem, adr, addr_type, kind, value, ord, flags)
}

/// Build a store from an already-selected variant.
#[allow(clippy::too_many_arguments)]
pub fn make_raw(
    g: &mut Graph,
    ctl: Option<NodeId>,
    mem: Option<NodeId>,
    adr: NodeId,
    addr_type: AddressType,
    kind: StoreKind,
    value: NodeId,
    ord: MemOrd,
    flags: AccessFlags,
) -> NodeId {
    let acc = StoreAccess { kind, addr_type, ord, flags };
    g.add(NodeKind::Store(acc), vec![ctl, mem, Some(adr), Some(value)])
}

/// Build an atomic read-modify-write access (value exchange).
///
/// Atomic accesses both read and publish their slot, so they are always
/// treated as ordered and opt out of forwarding, elimination, capture,
/// and merging; every walker stops at one.
#[allow(clippy::too_many_arguments)]
pub fn make_atomic(
    g: &mut Graph,
    ctl: Option<NodeId>,
    mem: Option<NodeId>,
    adr: NodeId,
    addr_type: AddressType,
    value: NodeId,
    bt: BasicType,
    flags: AccessFlags,
    compressed_refs: bool,
) -> NodeId {
    let mut kind = StoreKind::for_basic_type(bt);
    let mut value = value;
    if bt == BasicType::Ptr && compressed_refs {
        kind = StoreKind::N;
        value = g.add(NodeKind::EncodePtr, vec![None, Some(value)]);
    }
    let acc = StoreAccess { kind, addr_type, ord: MemOrd::Volatile, flags };
    g.add(NodeKind::LoadStore(acc), vec![ctl, mem, Some(adr), Some(value)])
}

/// Identity: stores that provably change nothing reduce to their own
/// memory input.
pub fn identity(
    g: &Graph,
    classifier: &mut AliasClassifier,
    barriers: &dyn BarrierPolicy,
    store: NodeId,
    reduce_field_zeroing: bool,
    cycle_limit: u32,
) -> Option<NodeId> {
    let acc = store_access(g, store)?;
    // Ordered stores publish; they never reduce to a no-op here.
    if acc.ord.is_ordered() {
        return None;
    }
    let kind = acc.kind;
    let mem = g.input(store, slot::MEMORY)?;
    let adr = g.input(store, slot::ADDRESS)?;
    let val = g.input(store, slot::VALUE)?;

    // Load then store of the same slot is useless.
    if let Some(ld) = load_access(g, val) {
        if ld.kind.store_kind() == kind {
            let ld_adr = g.input(val, slot::ADDRESS);
            let ld_mem = g.input(val, slot::MEMORY);
            if let (Some(la), Some(lm)) = (ld_adr, ld_mem) {
                if same_address(g, la, adr) && g.eqv_uncast(lm, mem) {
                    return Some(mem);
                }
            }
        }
    }

    // Two stores in a row of the same value.
    if let Some(prev) = store_access(g, mem) {
        if prev.kind == kind {
            let p_adr = g.input(mem, slot::ADDRESS);
            let p_val = g.input(mem, slot::VALUE);
            if let (Some(pa), Some(pv)) = (p_adr, p_val) {
                if same_address(g, pa, adr) && g.eqv_uncast(pv, val) {
                    return Some(mem);
                }
            }
        }
    }

    // Store of zero into memory that is provably still all-zero.
    if reduce_field_zeroing {
        let val_zero = g.con_value(val).map(|c| c.is_zero()).unwrap_or(false);
        if val_zero {
            // A newly allocated object is all-zeroes everywhere.
            if g
                .is_proj_of(mem, ProjKind::Memory, |k| matches!(k, NodeKind::Allocate(_)))
                .is_some()
            {
                return Some(mem);
            }
            // Or the slot may be zero from an earlier definition.
            if let Some(prev_mem) = find_previous_store(g, classifier, barriers, store, cycle_limit)
            {
                match can_see_stored_value(g, store, prev_mem) {
                    Some(SeenValue::Zero) => return Some(mem),
                    Some(SeenValue::Node(pv)) => {
                        let prev_zero =
                            g.con_value(pv).map(|c| c.is_zero()).unwrap_or(false);
                        if pv == val || prev_zero {
                            return Some(mem);
                        }
                    }
                    None => {}
                }
            }
        }
    }

    None
}

/// Structural rewrite: merge bypass, overwritten-store elimination,
/// initialization capture, mask folding, adjacent-store merging.
#[allow(clippy::too_many_arguments)]
pub fn ideal(
    g: &mut Graph,
    classifier: &mut AliasClassifier,
    barriers: &dyn BarrierPolicy,
    caps: &dyn TargetCaps,
    store: NodeId,
    reduce_field_zeroing: bool,
    merge_stores: bool,
    complexity_limit: usize,
    tracked_limit: i64,
) -> Rewrite {
    let acc = match store_access(g, store) {
        Some(a) => a.clone(),
        None => return Rewrite::None,
    };
    let mem = match g.input(store, slot::MEMORY) {
        Some(m) => m,
        None => return Rewrite::None,
    };
    let adr = match g.input(store, slot::ADDRESS) {
        Some(a) => a,
        None => return Rewrite::None,
    };

    // Write through a memory merge: only our slice matters.
    if matches!(g.kind(mem), NodeKind::MergeMem) {
        let idx = classifier.classify(&acc.addr_type);
        if let Some(m) = merge::memory_at(g, mem, idx) {
            if m != mem {
                g.set_input(store, slot::MEMORY, Some(m));
                return Rewrite::Progress;
            }
        }
    }

    // Back-to-back stores to the same address fold up, provided the
    // overwritten store has no other observer and neither side orders.
    if acc.ord == MemOrd::Unordered {
        let mut st = mem;
        while let Some(st_acc) = store_access(g, st) {
            if st_acc.ord.is_ordered() || g.use_count(st) != 1 || st == store {
                break;
            }
            let st_size = st_acc.kind.memory_size();
            let st_adr = match g.input(st, slot::ADDRESS) {
                Some(a) => a,
                None => break,
            };
            if same_address(g, st_adr, adr) && st_size <= acc.kind.memory_size() {
                let user = g.uses(st)[0];
                let st_mem = g.input(st, slot::MEMORY);
                g.set_input(user, slot::MEMORY, st_mem);
                return Rewrite::Progress;
            }
            st = match g.input(st, slot::MEMORY) {
                Some(m) => m,
                None => break,
            };
        }
    }

    // Capture an unaliased, unconditional, simple store into the
    // initialization barrier it directly follows.
    if reduce_field_zeroing && acc.ord == MemOrd::Unordered {
        if let Some(init) =
            g.is_proj_of(mem, ProjKind::Memory, |k| matches!(k, NodeKind::Initialize(_)))
        {
            if !is_complete(g, init) {
                let offset =
                    can_capture_store(g, classifier, barriers, init, store, complexity_limit);
                if offset > 0 {
                    let header = init_allocation(g, init)
                        .map(|a| minimum_header_size(g, a))
                        .unwrap_or(0);
                    if capture_store(g, barriers, init, store, offset, header, tracked_limit)
                        .is_some()
                    {
                        // The barrier holds a raw copy now; this store
                        // folds away.
                        return Rewrite::ReplacedBy(mem);
                    }
                }
            }
        }
    }

    // A mask that only clears bits the narrow store drops anyway is
    // useless: StoreB (AndI v 0xFF) => StoreB v.
    let drop_mask: Option<u32> = match acc.kind {
        StoreKind::B => Some(0xFF),
        StoreKind::C => Some(0xFFFF),
        _ => None,
    };
    if let Some(mask) = drop_mask {
        if let Some(val) = g.input(store, slot::VALUE) {
            if matches!(g.kind(val), NodeKind::AndInt) {
                let a = g.input(val, 1);
                let b = g.input(val, 2);
                if let (Some(x), Some(m)) = (a, b) {
                    if let Some(ConValue::Int(mc)) = g.con_value(m) {
                        if (mc as u32) & mask == mask {
                            g.set_input(store, slot::VALUE, Some(x));
                            return Rewrite::Progress;
                        }
                    }
                }
            }
        }
    }

    // Adjacent narrow stores of one wider value merge into one store.
    if merge_stores && caps.supports_unaligned_access() {
        if let Some(merged) = store_merge::run(g, caps, store) {
            return Rewrite::ReplacedBy(merged);
        }
    }

    Rewrite::None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::ConValue;

    fn setup() -> (Graph, NodeId, NodeId, NodeId) {
        let mut g = Graph::new();
        let root = g.add(NodeKind::Root, vec![]);
        let mem = g.add(NodeKind::Param(0), vec![Some(root)]);
        let adr = g.add(NodeKind::ConPtr(0x1000), vec![]);
        (g, root, mem, adr)
    }

    #[test]
    fn test_bool_store_masks_to_one_bit() {
        let (mut g, root, mem, adr) = setup();
        let v = g.add(NodeKind::Param(1), vec![Some(root)]);
        let st = make(
            &mut g,
            Some(root),
            Some(mem),
            adr,
            AddressType::Field { class: 1, offset: 16 },
            v,
            BasicType::Bool,
            MemOrd::Unordered,
            AccessFlags::default(),
            false,
        );

        let masked = g.input(st, slot::VALUE).unwrap();
        assert!(matches!(g.kind(masked), NodeKind::AndInt));
        assert_eq!(g.input(masked, 1), Some(v));
        let one = g.input(masked, 2).unwrap();
        assert_eq!(g.con_value(one), Some(ConValue::Int(1)));
        assert_eq!(store_access(&g, st).unwrap().kind, StoreKind::B);
    }

    #[test]
    fn test_reference_store_encodes_when_compressed() {
        let (mut g, root, mem, adr) = setup();
        let v = g.add(NodeKind::Param(1), vec![Some(root)]);
        let st = make(
            &mut g,
            Some(root),
            Some(mem),
            adr,
            AddressType::Field { class: 1, offset: 16 },
            v,
            BasicType::Ptr,
            MemOrd::Unordered,
            AccessFlags::default(),
            true,
        );

        assert_eq!(store_access(&g, st).unwrap().kind, StoreKind::N);
        let enc = g.input(st, slot::VALUE).unwrap();
        assert!(matches!(g.kind(enc), NodeKind::EncodePtr));
        assert_eq!(g.input(enc, 1), Some(v));
    }

    #[test]
    fn test_atomic_access_is_ordered() {
        let (mut g, root, mem, adr) = setup();
        let v = g.add(NodeKind::Param(1), vec![Some(root)]);
        let xchg = make_atomic(
            &mut g,
            Some(root),
            Some(mem),
            adr,
            AddressType::Field { class: 1, offset: 16 },
            v,
            BasicType::Int,
            AccessFlags::default(),
            false,
        );

        match g.kind(xchg) {
            NodeKind::LoadStore(acc) => {
                assert_eq!(acc.kind, StoreKind::I);
                assert!(acc.ord.is_ordered());
            }
            other => panic!("expected an atomic access, got {:?}", other),
        }
        // Not a plain store; the rewrite hooks must not touch it.
        assert!(store_access(&g, xchg).is_none());
    }

    #[test]
    fn test_reference_store_plain_without_compression() {
        let (mut g, root, mem, adr) = setup();
        let v = g.add(NodeKind::Param(1), vec![Some(root)]);
        let st = make(
            &mut g,
            Some(root),
            Some(mem),
            adr,
            AddressType::Field { class: 1, offset: 16 },
            v,
            BasicType::Ptr,
            MemOrd::Unordered,
            AccessFlags::default(),
            false,
        );

        assert_eq!(store_access(&g, st).unwrap().kind, StoreKind::P);
        assert_eq!(g.input(st, slot::VALUE), Some(v));
    }
}
