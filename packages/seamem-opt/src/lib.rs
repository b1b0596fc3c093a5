/*
 * seamem-opt - memory-operation optimizer for a sea-of-nodes JIT IR
 *
 * Feature-first layout:
 * - shared/      : node arena, value/address/access models, ports
 * - features/    : alias → memory → merge → forwarding → init → store_merge
 * - application/ : worklist driver, invariant checker
 *
 * The core is a pure, total graph transformation: every rewrite either
 * simplifies or reports "no change". Single-threaded by design; one
 * compilation unit is optimized by exactly one worker.
 */

#![allow(clippy::too_many_arguments)] // rewrite entry points thread several collaborators
#![allow(clippy::collapsible_if)] // branch structure mirrors the proofs
#![allow(clippy::module_inception)]

/// Shared models and utilities
pub mod shared;

/// Feature modules (leaves first)
pub mod features;

/// Orchestration
pub mod application;

/// Error types
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for the public API
// ═══════════════════════════════════════════════════════════════════════════

pub use application::{Optimizer, OptimizerConfig, OptimizerStats};
pub use errors::{OptError, Result};
pub use features::alias::AliasClassifier;
pub use features::forwarding::{can_see_stored_value, find_previous_store, SeenValue};
pub use shared::models::{
    slot, AccessFlags, AddressType, AliasIndex, AllocateInfo, BasicType, ClassId, ConValue,
    ControlDep, Graph, InitializeInfo, LoadAccess, LoadKind, MemOrd, Node, NodeId, NodeKind,
    Offset, ProjKind, StoreAccess, StoreKind, RAW_ADDRESS, RAW_STORES,
};
pub use shared::ports::{BarrierPolicy, NoBarriers, NoTypeInfo, PortableTarget, TargetCaps, TypeOracle};
