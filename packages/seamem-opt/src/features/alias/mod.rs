//! Alias classification: maps abstract address types to disjoint alias
//! indices used to partition the memory state.

pub mod domain;
pub mod infrastructure;

pub use domain::indices_may_alias;
pub use infrastructure::AliasClassifier;
