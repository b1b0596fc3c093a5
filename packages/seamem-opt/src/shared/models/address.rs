//! Abstract address types.
//!
//! An `AddressType` names the memory slice an access is declared against.
//! The alias classifier interns these into disjoint alias indices; two
//! accesses can only interfere when their indices agree (or one of them
//! is `Bottom`, which aliases everything).

use super::types::{BasicType, ClassId};
use serde::{Deserialize, Serialize};

/// Integer partition key for a classified address type.
pub type AliasIndex = usize;

/// Abstract type of an access address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressType {
    /// Unknown, widened, or merged address. Conservatively aliases
    /// every other slice.
    Bottom,

    /// Untyped machine memory: raw initialization writes, off-heap.
    Raw,

    /// An object header word at a fixed offset (mark word, klass word).
    Header { offset: i64 },

    /// A declared instance field of a class.
    Field { class: ClassId, offset: i64 },

    /// An element of an array with the given element type.
    ArrayElement { elem: BasicType },

    /// A word inside class metadata (layout descriptor, access flags,
    /// super-class pointer).
    KlassMeta { offset: i64 },
}

impl AddressType {
    #[inline]
    pub fn is_raw(&self) -> bool {
        matches!(self, AddressType::Raw | AddressType::Header { .. })
    }

    /// Precise types identify a single disjoint slice; Bottom does not.
    #[inline]
    pub fn is_precise(&self) -> bool {
        !matches!(self, AddressType::Bottom)
    }

    /// Slices that barrier/call independence reasoning may be applied to.
    #[inline]
    pub fn is_oop_slice(&self) -> bool {
        matches!(
            self,
            AddressType::Field { .. } | AddressType::ArrayElement { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_predicates() {
        assert!(AddressType::Raw.is_raw());
        assert!(AddressType::Header { offset: 0 }.is_raw());
        assert!(!AddressType::Bottom.is_precise());
        assert!(AddressType::Field { class: 1, offset: 12 }.is_oop_slice());
        assert!(!AddressType::KlassMeta { offset: 8 }.is_oop_slice());
    }
}
