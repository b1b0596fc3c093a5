//! Node arena.
//!
//! The graph owns every node; identity is a stable `NodeId` index.
//! Shared substructure is the norm (this is a DAG with occasional
//! accidental cycles, not a tree), so liveness is decided by an explicit
//! mark pass from caller-supplied roots rather than by ownership.
//! Def-use lists are maintained eagerly because several rewrites key off
//! use counts.

use super::node::{Node, NodeKind, ProjKind, NodeId};
use super::types::ConValue;
use rustc_hash::FxHashSet;

#[derive(Debug, Default, Clone)]
pub struct Graph {
    nodes: Vec<Node>,
    uses: Vec<Vec<NodeId>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes ever allocated (dead nodes keep their slot).
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a node and record uses of its inputs.
    pub fn add(&mut self, kind: NodeKind, inputs: Vec<Option<NodeId>>) -> NodeId {
        let id = self.nodes.len() as NodeId;
        for inp in inputs.iter().flatten() {
            self.uses[*inp as usize].push(id);
        }
        self.nodes.push(Node::new(kind, inputs));
        self.uses.push(Vec::new());
        id
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id as usize].kind
    }

    #[inline]
    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id as usize].kind
    }

    #[inline]
    pub fn inputs(&self, id: NodeId) -> &[Option<NodeId>] {
        &self.nodes[id as usize].inputs
    }

    #[inline]
    pub fn num_inputs(&self, id: NodeId) -> usize {
        self.nodes[id as usize].inputs.len()
    }

    /// Input at `slot`, or `None` when absent or out of range.
    #[inline]
    pub fn input(&self, id: NodeId, slot: usize) -> Option<NodeId> {
        self.nodes[id as usize].inputs.get(slot).copied().flatten()
    }

    /// Rewire one input slot, growing the list with absent slots on
    /// demand and keeping def-use lists consistent.
    pub fn set_input(&mut self, id: NodeId, slot: usize, new: Option<NodeId>) {
        let node = &mut self.nodes[id as usize];
        if node.inputs.len() <= slot {
            node.inputs.resize(slot + 1, None);
        }
        let old = node.inputs[slot];
        if old == new {
            return;
        }
        node.inputs[slot] = new;
        if let Some(o) = old {
            remove_one_use(&mut self.uses[o as usize], id);
        }
        if let Some(n) = new {
            self.uses[n as usize].push(id);
        }
    }

    /// Append an input slot.
    pub fn add_input(&mut self, id: NodeId, new: Option<NodeId>) {
        self.nodes[id as usize].inputs.push(new);
        if let Some(n) = new {
            self.uses[n as usize].push(id);
        }
    }

    /// Insert an input slot at `pos`, shifting later slots up.
    pub fn insert_input(&mut self, id: NodeId, pos: usize, new: Option<NodeId>) {
        self.nodes[id as usize].inputs.insert(pos, new);
        if let Some(n) = new {
            self.uses[n as usize].push(id);
        }
    }

    /// Remove the input slot at `pos`, shifting later slots down.
    pub fn remove_input(&mut self, id: NodeId, pos: usize) {
        let old = self.nodes[id as usize].inputs.remove(pos);
        if let Some(o) = old {
            remove_one_use(&mut self.uses[o as usize], id);
        }
    }

    #[inline]
    pub fn uses(&self, id: NodeId) -> &[NodeId] {
        &self.uses[id as usize]
    }

    #[inline]
    pub fn use_count(&self, id: NodeId) -> usize {
        self.uses[id as usize].len()
    }

    /// Rewire every use of `old` to `with` (graph-rewrite subsumption).
    pub fn replace(&mut self, old: NodeId, with: NodeId) {
        if old == with {
            return;
        }
        let users = std::mem::take(&mut self.uses[old as usize]);
        for user in users {
            let inputs = &mut self.nodes[user as usize].inputs;
            for inp in inputs.iter_mut() {
                if *inp == Some(old) {
                    *inp = Some(with);
                    self.uses[with as usize].push(user);
                }
            }
        }
    }

    /// Explicit clone, used only when splitting a node through a rewrite.
    pub fn clone_node(&mut self, id: NodeId) -> NodeId {
        let node = self.nodes[id as usize].clone();
        self.add(node.kind, node.inputs)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Structural queries
    // ═══════════════════════════════════════════════════════════════════

    /// Skip identity-preserving pointer casts.
    pub fn uncast(&self, id: NodeId) -> NodeId {
        let mut cur = id;
        while matches!(self.kind(cur), NodeKind::CastPtr) {
            match self.input(cur, 1) {
                Some(inp) => cur = inp,
                None => break,
            }
        }
        cur
    }

    /// Pointer equality modulo casts.
    #[inline]
    pub fn eqv_uncast(&self, a: NodeId, b: NodeId) -> bool {
        self.uncast(a) == self.uncast(b)
    }

    /// Constant value of a node, if it is a constant.
    pub fn con_value(&self, id: NodeId) -> Option<ConValue> {
        match self.kind(id) {
            NodeKind::ConInt(v) => Some(ConValue::Int(*v)),
            NodeKind::ConLong(v) => Some(ConValue::Long(*v)),
            NodeKind::ConFloat(bits) => Some(ConValue::Float(*bits)),
            NodeKind::ConDouble(bits) => Some(ConValue::Double(*bits)),
            NodeKind::ConNull => Some(ConValue::Null),
            NodeKind::ConPtr(v) => Some(ConValue::Ptr(*v)),
            _ => None,
        }
    }

    /// Materialize a constant node.
    pub fn make_con(&mut self, value: ConValue) -> NodeId {
        let kind = match value {
            ConValue::Int(v) => NodeKind::ConInt(v),
            ConValue::Long(v) => NodeKind::ConLong(v),
            ConValue::Float(bits) => NodeKind::ConFloat(bits),
            ConValue::Double(bits) => NodeKind::ConDouble(bits),
            ConValue::Null => NodeKind::ConNull,
            ConValue::Ptr(v) => NodeKind::ConPtr(v),
        };
        self.add(kind, vec![])
    }

    /// The projection of `producer` with the given kind, if present.
    pub fn find_proj(&self, producer: NodeId, kind: ProjKind) -> Option<NodeId> {
        self.uses(producer)
            .iter()
            .copied()
            .find(|&u| {
                matches!(self.kind(u), NodeKind::Proj(k) if *k == kind)
                    && self.input(u, 0) == Some(producer)
            })
    }

    /// Producer of a projection node.
    pub fn proj_source(&self, id: NodeId) -> Option<(NodeId, ProjKind)> {
        match self.kind(id) {
            NodeKind::Proj(k) => self.input(id, 0).map(|p| (p, *k)),
            _ => None,
        }
    }

    /// Is `id` the given projection kind of some producer?
    pub fn is_proj_of<F>(&self, id: NodeId, kind: ProjKind, pred: F) -> Option<NodeId>
    where
        F: Fn(&NodeKind) -> bool,
    {
        match self.proj_source(id) {
            Some((p, k)) if k == kind && pred(self.kind(p)) => Some(p),
            _ => None,
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Liveness
    // ═══════════════════════════════════════════════════════════════════

    /// Mark pass: every node reachable from `roots` through input edges.
    pub fn live_set(&self, roots: &[NodeId]) -> FxHashSet<NodeId> {
        let mut live = FxHashSet::default();
        let mut stack: Vec<NodeId> = roots.to_vec();
        while let Some(id) = stack.pop() {
            if !live.insert(id) {
                continue;
            }
            for inp in self.inputs(id).iter().flatten() {
                if !live.contains(inp) {
                    stack.push(*inp);
                }
            }
        }
        live
    }
}

#[inline]
fn remove_one_use(uses: &mut Vec<NodeId>, user: NodeId) {
    if let Some(pos) = uses.iter().position(|&u| u == user) {
        uses.swap_remove(pos);
    }
}
