//! Alias classifier: address type → alias index interning.

use super::domain::{ALIAS_IDX_BOT, ALIAS_IDX_FIRST, ALIAS_IDX_RAW};
use crate::shared::models::{AddressType, AliasIndex};
use rustc_hash::FxHashMap;

/// Interns address types into monotonically growing alias indices.
///
/// Classification is a pure function of address-type identity; two
/// addresses with provably identical abstract types always land in the
/// same index. Anything that cannot be classified precisely falls into
/// `Bottom`; silently aliasing is always memory-safe, the reverse is
/// not.
#[derive(Debug)]
pub struct AliasClassifier {
    index_of: FxHashMap<AddressType, AliasIndex>,
    /// Index → address type, for diagnostics and verification.
    types: Vec<AddressType>,
}

impl Default for AliasClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl AliasClassifier {
    pub fn new() -> Self {
        // Slots for Top, Bottom, Raw so dynamic indices start at
        // ALIAS_IDX_FIRST.
        Self {
            index_of: FxHashMap::default(),
            types: vec![AddressType::Bottom, AddressType::Bottom, AddressType::Raw],
        }
    }

    /// Classify an address type. Grows the mapping on first sight of a
    /// precise type; never reassigns an existing index.
    pub fn classify(&mut self, at: &AddressType) -> AliasIndex {
        match at {
            AddressType::Bottom => ALIAS_IDX_BOT,
            // Header words live in raw memory together with all other
            // untyped machine accesses.
            AddressType::Raw | AddressType::Header { .. } => ALIAS_IDX_RAW,
            _ => {
                if let Some(&idx) = self.index_of.get(at) {
                    return idx;
                }
                let idx = self.types.len();
                debug_assert!(idx >= ALIAS_IDX_FIRST);
                self.types.push(at.clone());
                self.index_of.insert(at.clone(), idx);
                idx
            }
        }
    }

    /// Address type registered for an index.
    pub fn address_type(&self, idx: AliasIndex) -> Option<&AddressType> {
        self.types.get(idx)
    }

    /// Total number of indices handed out (including the fixed three).
    #[inline]
    pub fn index_count(&self) -> usize {
        self.types.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::BasicType;

    #[test]
    fn test_special_indices() {
        let mut c = AliasClassifier::new();
        assert_eq!(c.classify(&AddressType::Bottom), ALIAS_IDX_BOT);
        assert_eq!(c.classify(&AddressType::Raw), ALIAS_IDX_RAW);
        assert_eq!(c.classify(&AddressType::Header { offset: 0 }), ALIAS_IDX_RAW);
    }

    #[test]
    fn test_interning_is_stable() {
        let mut c = AliasClassifier::new();
        let f1 = AddressType::Field { class: 1, offset: 12 };
        let f2 = AddressType::Field { class: 1, offset: 16 };

        let i1 = c.classify(&f1);
        let i2 = c.classify(&f2);
        assert_ne!(i1, i2);
        assert!(i1 >= ALIAS_IDX_FIRST);

        // Same type object ⇒ same index, forever.
        assert_eq!(c.classify(&f1), i1);
        assert_eq!(c.classify(&f2), i2);
        assert_eq!(c.address_type(i1), Some(&f1));
        assert_eq!(c.address_type(i2), Some(&f2));
    }

    #[test]
    fn test_array_elements_partition_by_type() {
        let mut c = AliasClassifier::new();
        let bytes = AddressType::ArrayElement { elem: BasicType::Byte };
        let ints = AddressType::ArrayElement { elem: BasicType::Int };
        assert_ne!(c.classify(&bytes), c.classify(&ints));
        assert_eq!(c.classify(&bytes), c.classify(&bytes));
    }

    #[test]
    fn test_monotonic_growth() {
        let mut c = AliasClassifier::new();
        let before = c.index_count();
        c.classify(&AddressType::KlassMeta { offset: 8 });
        assert_eq!(c.index_count(), before + 1);
        c.classify(&AddressType::KlassMeta { offset: 8 });
        assert_eq!(c.index_count(), before + 1);
    }
}
