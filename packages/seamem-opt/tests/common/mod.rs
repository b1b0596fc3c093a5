//! Shared graph-building helpers for the integration tests.
#![allow(dead_code)]

use seamem_opt::features::memory::store;
use seamem_opt::{
    slot, AccessFlags, AddressType, AllocateInfo, ConValue, ControlDep, Graph, LoadKind, MemOrd,
    NodeId, NodeKind, ProjKind, StoreKind,
};

pub struct Rig {
    pub g: Graph,
    pub root: NodeId,
    /// Initial ambient memory state.
    pub mem0: NodeId,
    /// An opaque heap pointer (method parameter).
    pub obj: NodeId,
}

pub fn rig() -> Rig {
    let mut g = Graph::new();
    let root = g.add(NodeKind::Root, vec![]);
    let mem0 = g.add(NodeKind::Param(0), vec![Some(root)]);
    let obj = g.add(NodeKind::Param(1), vec![Some(root)]);
    Rig { g, root, mem0, obj }
}

/// `base + offset` as an address expression.
pub fn addr(g: &mut Graph, base: NodeId, offset: i64) -> NodeId {
    if offset == 0 {
        return base;
    }
    let off = g.make_con(ConValue::Long(offset));
    g.add(NodeKind::AddPtr, vec![None, Some(base), Some(off)])
}

pub fn int_field(offset: i64) -> AddressType {
    AddressType::Field { class: 1, offset }
}

#[allow(clippy::too_many_arguments)]
pub fn store_at(
    g: &mut Graph,
    ctl: Option<NodeId>,
    mem: NodeId,
    base: NodeId,
    offset: i64,
    kind: StoreKind,
    value: NodeId,
    at: AddressType,
) -> NodeId {
    let a = addr(g, base, offset);
    store::make_raw(
        g,
        ctl,
        Some(mem),
        a,
        at,
        kind,
        value,
        MemOrd::Unordered,
        AccessFlags::default(),
    )
}

pub fn load_at(
    g: &mut Graph,
    ctl: Option<NodeId>,
    mem: NodeId,
    base: NodeId,
    offset: i64,
    kind: LoadKind,
    at: AddressType,
) -> NodeId {
    let a = addr(g, base, offset);
    seamem_opt::features::memory::load::make(
        g,
        ctl,
        Some(mem),
        a,
        at,
        kind,
        MemOrd::Unordered,
        AccessFlags::default(),
        ControlDep::DependsOnlyOnTest,
    )
}

pub struct Allocation {
    pub alloc: NodeId,
    pub ctl: NodeId,
    pub mem: NodeId,
    pub rawoop: NodeId,
}

/// An allocation with its three projections.
pub fn allocate(g: &mut Graph, ctl: NodeId, mem: NodeId, header: i64, size: i64) -> Allocation {
    let info = AllocateInfo {
        header_size: header,
        size_in_bytes: Some(size),
        klass: Some(1),
    };
    let alloc = g.add(NodeKind::Allocate(info), vec![Some(ctl), Some(mem)]);
    let actl = g.add(NodeKind::Proj(ProjKind::Control), vec![Some(alloc)]);
    let amem = g.add(NodeKind::Proj(ProjKind::Memory), vec![Some(alloc)]);
    let rawoop = g.add(NodeKind::Proj(ProjKind::RawAddress), vec![Some(alloc)]);
    Allocation { alloc, ctl: actl, mem: amem, rawoop }
}

pub struct Barrier {
    pub init: NodeId,
    /// Control following the barrier.
    pub ctl: NodeId,
    /// Memory state produced by the barrier.
    pub mem: NodeId,
}

/// An initialization barrier wired onto an allocation.
pub fn initialize(g: &mut Graph, a: &Allocation) -> Barrier {
    let init = g.add(
        NodeKind::Initialize(Default::default()),
        vec![Some(a.ctl), Some(a.mem), Some(a.rawoop)],
    );
    let ictl = g.add(NodeKind::Proj(ProjKind::Control), vec![Some(init)]);
    let imem = g.add(NodeKind::Proj(ProjKind::Memory), vec![Some(init)]);
    Barrier { init, ctl: ictl, mem: imem }
}

/// Walk a memory chain from `mem` down to `stop`, returning the stores
/// seen (nearest first).
pub fn chain(g: &Graph, mut mem: NodeId, stop: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    while mem != stop {
        out.push(mem);
        match g.input(mem, slot::MEMORY) {
            Some(m) => mem = m,
            None => break,
        }
    }
    out
}
