//! Load nodes: factory and rewrite hooks.

use crate::features::alias::AliasClassifier;
use crate::features::forwarding::{can_see_stored_value, find_previous_store, SeenValue};
use crate::features::memory::domain::{allocation_of, base_and_offset, load_access, Rewrite};
use crate::features::merge;
use crate::shared::models::{
    slot, AccessFlags, AddressType, ConValue, ControlDep, Graph, LoadAccess, LoadKind, MemOrd,
    NodeId, NodeKind,
};
use crate::shared::ports::{BarrierPolicy, TypeOracle};

/// Build a load. Construction selects the concrete variant through
/// `kind`; callers never dispatch on subtypes at use sites.
#[allow(clippy::too_many_arguments)]
pub fn make(
    g: &mut Graph,
    ctl: Option<NodeId>,
    mem: Option<NodeId>,
    adr: NodeId,
    addr_type: AddressType,
    kind: LoadKind,
    ord: MemOrd,
    flags: AccessFlags,
    control_dep: ControlDep,
) -> NodeId {
    // Raw accesses that are not known-immutable must stay control
    // dependent; nothing orders them otherwise.
    debug_assert!(
        !(addr_type == AddressType::Raw && ctl.is_none()),
        "raw load without control"
    );
    let acc = LoadAccess { kind, addr_type, ord, control_dep, flags };
    g.add(NodeKind::Load(acc), vec![ctl, mem, Some(adr)])
}

/// Constant folding. Monotonic: only refines toward a constant, never
/// contradicts the declared type.
pub fn value(g: &Graph, oracle: &dyn TypeOracle, load: NodeId) -> Option<ConValue> {
    let acc = load_access(g, load)?.clone();
    let mem = g.input(load, slot::MEMORY)?;

    // Forward a provably-defining store's constant, truncated and
    // re-signed to this load's width; or the zero of a fresh object.
    // Ordered loads observe the memory chain, never a forwarded value.
    if acc.ord == MemOrd::Unordered {
        if let Some(seen) = can_see_stored_value(g, load, mem) {
            match seen {
                SeenValue::Zero => return Some(acc.kind.zero_value()),
                SeenValue::Node(v) => {
                    if let Some(c) = g.con_value(v) {
                        return Some(acc.kind.truncate(c));
                    }
                }
            }
        }
    }

    // Stable slices and class metadata fold through the oracle when the
    // base object is itself a compile-time constant.
    let adr = g.input(load, slot::ADDRESS)?;
    let (base_opt, off) = base_and_offset(g, adr);
    let base = base_opt?;
    let offset = off.constant()?;
    if let NodeKind::ConPtr(handle) = g.kind(base) {
        let foldable = match &acc.addr_type {
            AddressType::KlassMeta { .. } | AddressType::Header { .. } => true,
            // A stable instance field folds only when the layout it was
            // resolved against cannot be refined by a subclass.
            AddressType::Field { class, .. } => {
                oracle.is_exact_class(*class) && oracle.field_is_stable(&acc.addr_type)
            }
            at @ AddressType::ArrayElement { .. } => oracle.field_is_stable(at),
            _ => false,
        };
        if foldable {
            return oracle.constant_value_at(*handle, offset, acc.kind.basic_type());
        }
    }
    None
}

/// Identity: a load whose memory input is provably the defining store
/// of its exact address and width is the stored value.
///
/// A pinned load (it may trap) cannot be folded onto a non-constant
/// value; sub-int loads additionally need the value to already fit
/// their range, since anything wider requires masking.
pub fn identity(g: &Graph, load: NodeId) -> Option<NodeId> {
    let acc = load_access(g, load)?;
    if acc.ord.is_ordered() {
        return None;
    }
    let mem = g.input(load, slot::MEMORY)?;
    match can_see_stored_value(g, load, mem)? {
        SeenValue::Node(value) => {
            if acc.kind.memory_size() < 4 && !value_fits(g, value, acc.kind) {
                return None;
            }
            if !acc.control_dep.is_pinned() || g.con_value(value).is_some() {
                Some(value)
            } else {
                None
            }
        }
        // The zero of fresh memory is materialized by constant folding,
        // not by identity.
        SeenValue::Zero => None,
    }
}

/// Structural rewrite: bypass merges on our slice, re-point the memory
/// edge at the exact defining store, drop a useless control edge.
pub fn ideal(
    g: &mut Graph,
    classifier: &mut AliasClassifier,
    barriers: &dyn BarrierPolicy,
    load: NodeId,
    cycle_limit: u32,
) -> Rewrite {
    let acc = match load_access(g, load) {
        Some(a) => a.clone(),
        None => return Rewrite::None,
    };
    let mem = match g.input(load, slot::MEMORY) {
        Some(m) => m,
        None => return Rewrite::None,
    };

    // Read through a memory merge: only our slice matters.
    if matches!(g.kind(mem), NodeKind::MergeMem) {
        let idx = classifier.classify(&acc.addr_type);
        if let Some(m) = merge::memory_at(g, mem, idx) {
            if m != mem {
                g.set_input(load, slot::MEMORY, Some(m));
                return Rewrite::Progress;
            }
        }
    }

    // Hoist over provably independent effects: re-point the memory edge
    // at the exact defining state when the walk finds one. Ordered loads
    // stay where they are.
    if acc.ord == MemOrd::Unordered {
        if let Some(prev) = find_previous_store(g, classifier, barriers, load, cycle_limit) {
            if prev != mem {
                g.set_input(load, slot::MEMORY, Some(prev));
                return Rewrite::Progress;
            }
        }
    }

    // A useless control edge is progress to remove: precise-typed loads
    // from a manifestly fresh (non-null) object cannot trap.
    if g.input(load, slot::CONTROL).is_some()
        && !acc.control_dep.is_pinned()
        && !acc.flags.unsafe_access
        && acc.ord == MemOrd::Unordered
        && acc.addr_type.is_oop_slice()
    {
        let adr = match g.input(load, slot::ADDRESS) {
            Some(a) => a,
            None => return Rewrite::None,
        };
        let (base, _) = base_and_offset(g, adr);
        if let Some(b) = base {
            if allocation_of(g, b).is_some() {
                g.set_input(load, slot::CONTROL, None);
                return Rewrite::Progress;
            }
        }
    }

    Rewrite::None
}

/// Would forwarding `value` into a load of `kind` preserve the observed
/// bits without a masking operation?
fn value_fits(g: &Graph, value: NodeId, kind: LoadKind) -> bool {
    if let Some(c) = g.con_value(value) {
        return kind.fits(&c);
    }
    if let Some(acc) = load_access(g, value) {
        return load_range_subsumes(kind, acc.kind);
    }
    false
}

/// Is every value of `inner`'s range representable in `outer`'s range?
fn load_range_subsumes(outer: LoadKind, inner: LoadKind) -> bool {
    fn range(k: LoadKind) -> Option<(i64, i64)> {
        match k {
            LoadKind::B => Some((-128, 127)),
            LoadKind::UB => Some((0, 255)),
            LoadKind::S => Some((-32768, 32767)),
            LoadKind::US => Some((0, 65535)),
            LoadKind::I => Some((i32::MIN as i64, i32::MAX as i64)),
            _ => None,
        }
    }
    match (range(outer), range(inner)) {
        (Some((ol, oh)), Some((il, ih))) => ol <= il && ih <= oh,
        _ => outer == inner,
    }
}
