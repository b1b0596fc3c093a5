//! Structural helpers over the access family: payload accessors,
//! address decomposition, and allocation-site queries.

use crate::shared::models::{
    slot, AllocateInfo, Graph, LoadAccess, NodeId, NodeKind, Offset, ProjKind, StoreAccess,
    RAW_ADDRESS,
};

/// Outcome of a structural (Ideal-style) rewrite attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rewrite {
    /// Nothing provable; the conservative default.
    None,
    /// The node was edited in place.
    Progress,
    /// The node is subsumed by another node.
    ReplacedBy(NodeId),
}

/// Load payload of a node, if it is a Load.
#[inline]
pub fn load_access(g: &Graph, id: NodeId) -> Option<&LoadAccess> {
    match g.kind(id) {
        NodeKind::Load(acc) => Some(acc),
        _ => None,
    }
}

/// Store payload of a node, if it is a Store.
#[inline]
pub fn store_access(g: &Graph, id: NodeId) -> Option<&StoreAccess> {
    match g.kind(id) {
        NodeKind::Store(acc) => Some(acc),
        _ => None,
    }
}

#[inline]
pub fn is_store(g: &Graph, id: NodeId) -> bool {
    matches!(g.kind(id), NodeKind::Store(_))
}

#[inline]
pub fn is_load(g: &Graph, id: NodeId) -> bool {
    matches!(g.kind(id), NodeKind::Load(_))
}

/// Any node that reads or writes memory through an address edge.
#[inline]
pub fn is_memory_access(g: &Graph, id: NodeId) -> bool {
    matches!(
        g.kind(id),
        NodeKind::Load(_) | NodeKind::Store(_) | NodeKind::LoadStore(_) | NodeKind::ClearRange
    )
}

/// Bytes touched by an access, when fixed by its kind.
pub fn memory_size(g: &Graph, id: NodeId) -> Option<i64> {
    match g.kind(id) {
        NodeKind::Load(acc) => Some(acc.kind.memory_size()),
        NodeKind::Store(acc) => Some(acc.kind.memory_size()),
        NodeKind::LoadStore(acc) => Some(acc.kind.memory_size()),
        _ => None,
    }
}

/// Decompose an address into (base, constant byte offset).
///
/// Walks nested `AddPtr` chains, accumulating constant offsets and
/// skipping pointer casts. A non-constant offset anywhere degrades the
/// offset to `Bot` while still reporting the base.
pub fn base_and_offset(g: &Graph, adr: NodeId) -> (Option<NodeId>, Offset) {
    let mut cur = g.uncast(adr);
    let mut off: i64 = 0;
    let mut precise = true;
    loop {
        match g.kind(cur) {
            NodeKind::AddPtr => {
                let base = match g.input(cur, 1) {
                    Some(b) => b,
                    None => return (None, Offset::Bot),
                };
                match g.input(cur, 2).and_then(|o| g.con_value(o)) {
                    Some(c) => match c {
                        crate::shared::models::ConValue::Int(v) => off += v as i64,
                        crate::shared::models::ConValue::Long(v) => off += v,
                        _ => precise = false,
                    },
                    None => precise = false,
                }
                cur = g.uncast(base);
            }
            _ => break,
        }
    }
    let offset = if precise { Offset::Con(off) } else { Offset::Bot };
    (Some(cur), offset)
}

/// Structural address equality: identical nodes modulo casts, or equal
/// bases with equal constant offsets. Address expressions are not
/// hash-consed, so two separately built `base + 16` nodes still name
/// the same location.
pub fn same_address(g: &Graph, a: NodeId, b: NodeId) -> bool {
    if g.eqv_uncast(a, b) {
        return true;
    }
    let (ab, ao) = base_and_offset(g, a);
    let (bb, bo) = base_and_offset(g, b);
    match (ab, bb, ao.constant(), bo.constant()) {
        (Some(x), Some(y), Some(i), Some(j)) => x == y && i == j,
        _ => false,
    }
}

/// The allocation a pointer manifestly comes from, if any.
///
/// Fresh objects are addressed through the allocation's raw-address
/// projection, possibly behind casts.
pub fn allocation_of(g: &Graph, ptr: NodeId) -> Option<NodeId> {
    let p = g.uncast(ptr);
    g.is_proj_of(p, ProjKind::RawAddress, |k| matches!(k, NodeKind::Allocate(_)))
}

/// Allocation and constant offset of an access address, in one step.
pub fn allocation_and_offset(g: &Graph, adr: NodeId) -> (Option<NodeId>, Offset) {
    let (base, off) = base_and_offset(g, adr);
    (base.and_then(|b| allocation_of(g, b)), off)
}

/// Metadata payload of an Allocate node.
#[inline]
pub fn allocate_info(g: &Graph, alloc: NodeId) -> Option<AllocateInfo> {
    match g.kind(alloc) {
        NodeKind::Allocate(info) => Some(*info),
        _ => None,
    }
}

/// Header size below which no field lives.
#[inline]
pub fn minimum_header_size(g: &Graph, alloc: NodeId) -> i64 {
    allocate_info(g, alloc).map(|i| i.header_size).unwrap_or(0)
}

/// The initialization barrier attached to an allocation, if present.
/// The barrier holds the allocation's raw-address projection.
pub fn initialization_of(g: &Graph, alloc: NodeId) -> Option<NodeId> {
    let rawoop = g.find_proj(alloc, ProjKind::RawAddress)?;
    g.uses(rawoop)
        .iter()
        .copied()
        .find(|&u| {
            matches!(g.kind(u), NodeKind::Initialize(_))
                && g.input(u, RAW_ADDRESS) == Some(rawoop)
        })
}

/// The allocation an initialization barrier belongs to.
pub fn init_allocation(g: &Graph, init: NodeId) -> Option<NodeId> {
    let rawoop = g.input(init, RAW_ADDRESS)?;
    allocation_of(g, rawoop)
}

/// The all-zero memory state of a barrier's allocation: the memory
/// projection of the Allocate node itself.
#[inline]
pub fn zero_memory(g: &Graph, init: NodeId) -> Option<NodeId> {
    g.input(init, slot::MEMORY)
}
