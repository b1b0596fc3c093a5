//! Collaborator contracts.
//!
//! The optimizer consults the rest of the compiler only through these
//! narrow read-only/query traits; everything behind them is out of scope.

mod collaborators;

pub use collaborators::{
    BarrierPolicy, NoBarriers, NoTypeInfo, PortableTarget, TargetCaps, TypeOracle,
};
