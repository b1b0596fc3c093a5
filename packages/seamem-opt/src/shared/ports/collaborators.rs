//! Trait definitions for the external collaborators, plus neutral
//! implementations used by tests and standalone runs.

use crate::shared::models::{
    AddressType, BasicType, ClassId, ConValue, Graph, NodeId,
};

/// Read-only class/field metadata queries used for constant folding.
pub trait TypeOracle {
    /// Is the class layout exactly known (no subclasses possible here)?
    fn is_exact_class(&self, class: ClassId) -> bool;

    /// Constant stored at `offset` within the object or metadata block
    /// rooted at the symbolic pointer `base`, if statically known.
    fn constant_value_at(&self, base: u64, offset: i64, bt: BasicType) -> Option<ConValue>;

    /// Is the field/array slice immutable after construction, so that a
    /// backing constant may be folded?
    fn field_is_stable(&self, at: &AddressType) -> bool;
}

/// GC barrier collaborator. The optimizer never interprets barrier
/// metadata itself; it only asks and strips.
pub trait BarrierPolicy {
    /// May this call/barrier node modify memory in the given slice?
    /// Must answer `true` when unsure.
    fn may_modify(&self, at: &AddressType, call: NodeId, graph: &Graph) -> bool;

    /// May this reference store be re-parented into an initialization
    /// barrier (i.e. needs no pre-publication barrier)?
    fn can_initialize(&self, store: NodeId, graph: &Graph) -> bool;

    /// Barrier metadata to install on a store captured into an
    /// initialization barrier (normally: none).
    fn captured_barrier_data(&self) -> u8 {
        0
    }
}

/// Target capability queries that gate platform-conditional rewrites.
pub trait TargetCaps {
    /// Does the target have reverse-bytes instructions, enabling
    /// byte-swapped adjacent-store merging?
    fn supports_reverse_bytes(&self) -> bool;

    /// Can merged stores span natural alignment boundaries?
    fn supports_unaligned_access(&self) -> bool;

    /// Is this 64-bit constant cheap to materialize, making a long
    /// store of it already optimal?
    fn is_simple_long_constant(&self, con: i64) -> bool;
}

// ═══════════════════════════════════════════════════════════════════════
// Neutral implementations
// ═══════════════════════════════════════════════════════════════════════

/// Oracle that knows nothing; all folding questions answer "unknown".
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTypeInfo;

impl TypeOracle for NoTypeInfo {
    fn is_exact_class(&self, _class: ClassId) -> bool {
        false
    }

    fn constant_value_at(&self, _base: u64, _offset: i64, _bt: BasicType) -> Option<ConValue> {
        None
    }

    fn field_is_stable(&self, _at: &AddressType) -> bool {
        false
    }
}

/// Barrier policy for a collector without read/write barriers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBarriers;

impl BarrierPolicy for NoBarriers {
    fn may_modify(&self, _at: &AddressType, _call: NodeId, _graph: &Graph) -> bool {
        true
    }

    fn can_initialize(&self, _store: NodeId, _graph: &Graph) -> bool {
        true
    }
}

/// Conservative target: byte-swap merging off, unaligned access on,
/// every long constant considered simple.
#[derive(Debug, Clone, Copy)]
pub struct PortableTarget {
    pub reverse_bytes: bool,
}

impl Default for PortableTarget {
    fn default() -> Self {
        Self { reverse_bytes: true }
    }
}

impl TargetCaps for PortableTarget {
    fn supports_reverse_bytes(&self) -> bool {
        self.reverse_bytes
    }

    fn supports_unaligned_access(&self) -> bool {
        true
    }

    fn is_simple_long_constant(&self, con: i64) -> bool {
        // Constants fitting in 32 bits are cheap everywhere.
        con == (con as i32) as i64
    }
}
