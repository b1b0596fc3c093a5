//! Graph vertices.
//!
//! A node is a kind tag plus an ordered input-edge list. Input edges use
//! `Option<NodeId>` where `None` is the universal "top"/absent sentinel;
//! sparse structures (the memory-state merge, captured-store lists) lean
//! on this instead of a dedicated sentinel node.

use super::access::{LoadAccess, StoreAccess};
use super::types::ClassId;
use serde::{Deserialize, Serialize};

/// Stable arena index identifying a node.
pub type NodeId = u32;

/// Fixed input slots of memory-access nodes.
pub mod slot {
    pub const CONTROL: usize = 0;
    pub const MEMORY: usize = 1;
    pub const ADDRESS: usize = 2;
    pub const VALUE: usize = 3;
}

/// First captured-store input slot of an Initialize node.
pub const RAW_STORES: usize = 3;

/// Raw-address input slot of an Initialize node.
pub const RAW_ADDRESS: usize = 2;

/// Which projection of a multi-output node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjKind {
    Control,
    Memory,
    RawAddress,
    IfTrue,
    IfFalse,
    Result,
}

/// Allocation-site metadata supplied by the allocation collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllocateInfo {
    /// Bytes reserved for header words; captures never land below this.
    pub header_size: i64,
    /// Object size when statically known.
    pub size_in_bytes: Option<i64>,
    /// Exact class when known.
    pub klass: Option<ClassId>,
}

/// Mutable state of an initialization barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct InitializeInfo {
    /// One-way flag; once set, no further stores may be captured.
    pub complete: bool,
}

/// Node kind tag with per-kind payload.
///
/// Walkers treat any kind they do not explicitly recognize as
/// inscrutable and stop; adding kinds is always conservative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    // ── control ────────────────────────────────────────────────────────
    Root,
    /// Control merge; inputs are predecessors.
    Region,
    /// Bounds check guarding an access; control input at 0.
    RangeCheck,
    Proj(ProjKind),

    // ── values ─────────────────────────────────────────────────────────
    Param(u32),
    Phi,
    ConInt(i32),
    ConLong(i64),
    ConFloat(u32),
    ConDouble(u64),
    ConNull,
    /// Symbolic pointer constant (klass pointers, off-heap addresses).
    ConPtr(u64),

    // ── address and bit arithmetic ─────────────────────────────────────
    /// inputs: [_, base, offset]
    AddPtr,
    /// Identity-preserving pointer cast; inputs: [_, input]
    CastPtr,
    /// inputs: [_, input]
    ConvLongToInt,
    /// inputs: [_, a, b]
    AndInt,
    AndLong,
    /// Signed/unsigned right shifts; inputs: [_, value, count]
    RShiftInt,
    RShiftLong,
    UShiftInt,
    UShiftLong,
    /// Byte-swap of a 2/4/8-byte value; inputs: [_, input]
    ReverseBytes(u8),
    /// Pointer compression; inputs: [_, input]
    EncodePtr,
    DecodePtr,

    // ── allocation and memory state ────────────────────────────────────
    /// inputs: [control, memory]; projections carry the outputs.
    Allocate(AllocateInfo),
    /// inputs: [control, memory, rawaddress, captured stores...]
    Initialize(InitializeInfo),
    /// Bulk zero of a word range; inputs: [control, memory, address, count-words]
    ClearRange,
    /// Opaque call/barrier; inputs: [control, memory, args...]
    Call,
    /// Sparse alias-indexed memory state; input i is the slice for alias
    /// index i, the base lives at `ALIAS_IDX_BOT`.
    MergeMem,

    // ── the access family ──────────────────────────────────────────────
    /// inputs: [control, memory, address]
    Load(LoadAccess),
    /// inputs: [control, memory, address, value]
    Store(StoreAccess),
    /// Atomic read-modify-write of one slot (exchange). Both reads and
    /// publishes; the walkers never look through one.
    /// inputs: [control, memory, address, value]
    LoadStore(StoreAccess),
}

impl NodeKind {
    #[inline]
    pub fn is_cfg(&self) -> bool {
        matches!(
            self,
            NodeKind::Root
                | NodeKind::Region
                | NodeKind::RangeCheck
                | NodeKind::Allocate(_)
                | NodeKind::Initialize(_)
                | NodeKind::Call
                | NodeKind::Proj(ProjKind::Control | ProjKind::IfTrue | ProjKind::IfFalse)
        )
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        matches!(
            self,
            NodeKind::ConInt(_)
                | NodeKind::ConLong(_)
                | NodeKind::ConFloat(_)
                | NodeKind::ConDouble(_)
                | NodeKind::ConNull
                | NodeKind::ConPtr(_)
        )
    }
}

/// A graph vertex: kind plus ordered inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub inputs: Vec<Option<NodeId>>,
}

impl Node {
    #[inline]
    pub fn new(kind: NodeKind, inputs: Vec<Option<NodeId>>) -> Self {
        Self { kind, inputs }
    }
}
