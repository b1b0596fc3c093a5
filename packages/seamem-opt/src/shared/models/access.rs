//! Access descriptors shared by the Load/Store node family.

use super::address::AddressType;
use super::types::{BasicType, ConValue, MemOrd};
use serde::{Deserialize, Serialize};

/// Concrete load variant, selecting width and signedness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadKind {
    /// Signed byte
    B,
    /// Unsigned byte
    UB,
    /// Signed 16-bit
    S,
    /// Unsigned 16-bit (char)
    US,
    /// 32-bit int
    I,
    /// 64-bit long
    L,
    /// 32-bit float
    F,
    /// 64-bit double
    D,
    /// Heap reference
    P,
    /// Compressed heap reference
    N,
}

impl LoadKind {
    #[inline]
    pub fn basic_type(&self) -> BasicType {
        match self {
            LoadKind::B => BasicType::Byte,
            LoadKind::UB => BasicType::Byte,
            LoadKind::S => BasicType::Short,
            LoadKind::US => BasicType::Char,
            LoadKind::I => BasicType::Int,
            LoadKind::L => BasicType::Long,
            LoadKind::F => BasicType::Float,
            LoadKind::D => BasicType::Double,
            LoadKind::P => BasicType::Ptr,
            LoadKind::N => BasicType::NarrowPtr,
        }
    }

    #[inline]
    pub fn memory_size(&self) -> i64 {
        self.basic_type().bytes()
    }

    /// The store variant that writes the slice this load reads.
    #[inline]
    pub fn store_kind(&self) -> StoreKind {
        match self {
            LoadKind::B | LoadKind::UB => StoreKind::B,
            LoadKind::S | LoadKind::US => StoreKind::C,
            LoadKind::I => StoreKind::I,
            LoadKind::L => StoreKind::L,
            LoadKind::F => StoreKind::F,
            LoadKind::D => StoreKind::D,
            LoadKind::P => StoreKind::P,
            LoadKind::N => StoreKind::N,
        }
    }

    /// The zero value returned when loading from freshly zeroed memory.
    #[inline]
    pub fn zero_value(&self) -> ConValue {
        ConValue::zero_of(self.basic_type())
    }

    /// Narrow a forwarded constant to this load's width and signedness.
    ///
    /// A matching-width store keeps its unmasked input value, so a byte
    /// load behind `StoreB(0x1234)` must observe `0x34` re-signed.
    pub fn truncate(&self, value: ConValue) -> ConValue {
        let bits = value.bits();
        match self {
            LoadKind::B => ConValue::Int((bits as u8 as i8) as i32),
            LoadKind::UB => ConValue::Int((bits & 0xFF) as i32),
            LoadKind::S => ConValue::Int((bits as u16 as i16) as i32),
            LoadKind::US => ConValue::Int((bits & 0xFFFF) as i32),
            LoadKind::I => ConValue::Int(bits as i32),
            LoadKind::L => ConValue::Long(bits),
            LoadKind::F => ConValue::Float(bits as u32),
            LoadKind::D => ConValue::Double(bits as u64),
            LoadKind::P | LoadKind::N => value,
        }
    }

    /// Does a constant already fit this load's value range?
    pub fn fits(&self, value: &ConValue) -> bool {
        match (self, value) {
            (LoadKind::B, ConValue::Int(v)) => (-128..=127).contains(v),
            (LoadKind::UB, ConValue::Int(v)) => (0..=255).contains(v),
            (LoadKind::S, ConValue::Int(v)) => (-32768..=32767).contains(v),
            (LoadKind::US, ConValue::Int(v)) => (0..=65535).contains(v),
            (LoadKind::I, ConValue::Int(_)) => true,
            (LoadKind::L, ConValue::Long(_)) => true,
            (LoadKind::F, ConValue::Float(_)) => true,
            (LoadKind::D, ConValue::Double(_)) => true,
            (LoadKind::P, ConValue::Null | ConValue::Ptr(_)) => true,
            (LoadKind::N, ConValue::Null | ConValue::Ptr(_)) => true,
            _ => false,
        }
    }
}

/// Concrete store variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreKind {
    /// 8-bit
    B,
    /// 16-bit
    C,
    /// 32-bit int
    I,
    /// 64-bit long
    L,
    /// 32-bit float
    F,
    /// 64-bit double
    D,
    /// Heap reference
    P,
    /// Compressed heap reference
    N,
}

impl StoreKind {
    #[inline]
    pub fn basic_type(&self) -> BasicType {
        match self {
            StoreKind::B => BasicType::Byte,
            StoreKind::C => BasicType::Char,
            StoreKind::I => BasicType::Int,
            StoreKind::L => BasicType::Long,
            StoreKind::F => BasicType::Float,
            StoreKind::D => BasicType::Double,
            StoreKind::P => BasicType::Ptr,
            StoreKind::N => BasicType::NarrowPtr,
        }
    }

    #[inline]
    pub fn memory_size(&self) -> i64 {
        self.basic_type().bytes()
    }

    #[inline]
    pub fn is_reference(&self) -> bool {
        matches!(self, StoreKind::P | StoreKind::N)
    }

    /// Select the store variant for a basic type.
    #[inline]
    pub fn for_basic_type(bt: BasicType) -> StoreKind {
        match bt {
            BasicType::Bool | BasicType::Byte => StoreKind::B,
            BasicType::Short | BasicType::Char => StoreKind::C,
            BasicType::Int => StoreKind::I,
            BasicType::Long => StoreKind::L,
            BasicType::Float => StoreKind::F,
            BasicType::Double => StoreKind::D,
            BasicType::Ptr => StoreKind::P,
            BasicType::NarrowPtr => StoreKind::N,
        }
    }
}

/// How a load relates to its control edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ControlDep {
    /// Depends only on the dominating test; the edge may be dropped when
    /// proven unnecessary.
    #[default]
    DependsOnlyOnTest,
    /// Pinned to its control point (may trap). Identity folding must not
    /// move it; only constant folding may replace it.
    Pinned,
    /// Relationship unknown; treated like pinned.
    Unknown,
}

impl ControlDep {
    #[inline]
    pub fn is_pinned(&self) -> bool {
        !matches!(self, ControlDep::DependsOnlyOnTest)
    }
}

/// Shared access flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AccessFlags {
    pub unaligned: bool,
    /// The address's static type disagrees with the declared slice.
    pub mismatched: bool,
    /// Off-heap access; must stay control dependent.
    pub unsafe_access: bool,
    /// 64-bit access on a machine needing special handling.
    pub requires_atomic: bool,
    /// Tag consumed by the GC barrier collaborator.
    pub barrier_data: u8,
}

/// Payload of a Load node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoadAccess {
    pub kind: LoadKind,
    pub addr_type: AddressType,
    pub ord: MemOrd,
    pub control_dep: ControlDep,
    pub flags: AccessFlags,
}

/// Payload of a Store node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreAccess {
    pub kind: StoreKind,
    pub addr_type: AddressType,
    pub ord: MemOrd,
    pub flags: AccessFlags,
}
