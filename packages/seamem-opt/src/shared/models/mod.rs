//! Shared models: the node arena and the value/address/access types
//! every feature builds on.

pub mod access;
pub mod address;
pub mod graph;
pub mod node;
pub mod types;

pub use access::{AccessFlags, ControlDep, LoadAccess, LoadKind, StoreAccess, StoreKind};
pub use address::{AddressType, AliasIndex};
pub use graph::Graph;
pub use node::{slot, AllocateInfo, InitializeInfo, Node, NodeId, NodeKind, ProjKind, RAW_ADDRESS, RAW_STORES};
pub use types::{BasicType, ClassId, ConValue, MemOrd, Offset};
