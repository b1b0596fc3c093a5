//! Alias partition domain.
//!
//! Alias indices partition memory into provably disjoint slices. The
//! partition is a function of address-type identity: equal address types
//! always map to the same index, and indices are never reassigned within
//! one compilation unit. `Bottom` and `Raw` always exist.

pub use crate::shared::constants::{
    ALIAS_IDX_BOT, ALIAS_IDX_FIRST, ALIAS_IDX_RAW, ALIAS_IDX_TOP,
};
pub use crate::shared::models::{AddressType, AliasIndex};

/// Can slices with these indices refer to overlapping memory?
///
/// `Bottom` aliases everything; distinct classified indices are disjoint
/// by construction.
#[inline]
pub fn indices_may_alias(a: AliasIndex, b: AliasIndex) -> bool {
    a == ALIAS_IDX_BOT || b == ALIAS_IDX_BOT || a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bottom_aliases_everything() {
        assert!(indices_may_alias(ALIAS_IDX_BOT, ALIAS_IDX_RAW));
        assert!(indices_may_alias(7, ALIAS_IDX_BOT));
        assert!(indices_may_alias(5, 5));
        assert!(!indices_may_alias(5, 6));
        assert!(!indices_may_alias(ALIAS_IDX_RAW, 5));
    }
}
