//! The closed vocabulary of structural tags.
//!
//! Wire-coded tags occupy the negative ordinal space; positive ordinals
//! belong to user kinds and zero is null. `MapSeparator` and the user-kind
//! markers never appear as negative wire ordinals.

use bitflags::bitflags;
use num_enum::TryFromPrimitive;

bitflags! {
    /// Structural classifiers a tag can carry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TagClass: u8 {
        const LEAF = 1;
        const CONTAINER = 1 << 1;
        /// Carries a per-instance user ordinal on the wire.
        const USER = 1 << 2;
    }
}

/// A structural tag. The discriminant of a wire-coded tag is its built-in
/// wire ordinal.
#[repr(i8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
pub enum Tag {
    Null = 0,
    Bool = -1,
    I8 = -2,
    I16 = -3,
    I32 = -4,
    I64 = -5,
    F32 = -6,
    F64 = -7,
    Char = -8,
    Str = -9,
    Uuid = -10,
    Array = -11,
    List = -12,
    Optional = -13,
    Map = -14,
    /// Partitions a map shape into key and value sub-shapes. No wire byte.
    MapSeparator = 1,
    Record = 2,
    Enum = 3,
    Interface = 4,
}

impl Tag {
    /// Classifiers for this tag.
    #[must_use]
    pub fn class(self) -> TagClass {
        use Tag::*;

        match self {
            Bool | I8 | I16 | I32 | I64 | F32 | F64 | Char | Str | Uuid => TagClass::LEAF,
            Array | List | Optional | Map => TagClass::CONTAINER,
            Record | Enum => TagClass::LEAF.union(TagClass::USER),
            Interface => TagClass::USER,
            Null | MapSeparator => TagClass::empty(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_leaf(self) -> bool {
        self.class().contains(TagClass::LEAF)
    }

    #[inline]
    #[must_use]
    pub fn is_container(self) -> bool {
        self.class().contains(TagClass::CONTAINER)
    }

    /// The negative built-in ordinal this tag writes on the wire.
    ///
    /// Only meaningful for scalar and container tags; user kinds write their
    /// positive assigned ordinal instead.
    #[inline]
    #[must_use]
    pub fn wire_ordinal(self) -> i64 {
        debug_assert!((self as i8) < 0, "{self:?} has no built-in wire ordinal");
        i64::from(self as i8)
    }

    /// Recover a built-in tag from a negative wire ordinal.
    #[must_use]
    pub fn from_wire(ordinal: i64) -> Option<Self> {
        if ordinal >= 0 {
            return None;
        }
        i8::try_from(ordinal).ok().and_then(|o| Tag::try_from(o).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifiers() {
        assert!(Tag::I32.is_leaf());
        assert!(!Tag::I32.is_container());
        assert!(Tag::List.is_container());
        assert!(!Tag::List.is_leaf());
        assert!(Tag::Record.is_leaf());
        assert!(Tag::Record.class().contains(TagClass::USER));
        assert!(!Tag::MapSeparator.is_leaf());
        assert!(!Tag::MapSeparator.is_container());
    }

    #[test]
    fn wire_round_trip() {
        for tag in [
            Tag::Bool,
            Tag::I8,
            Tag::I16,
            Tag::I32,
            Tag::I64,
            Tag::F32,
            Tag::F64,
            Tag::Char,
            Tag::Str,
            Tag::Uuid,
            Tag::Array,
            Tag::List,
            Tag::Optional,
            Tag::Map,
        ] {
            assert_eq!(Some(tag), Tag::from_wire(tag.wire_ordinal()));
        }
    }

    #[test]
    fn positive_ordinals_are_not_tags() {
        assert_eq!(None, Tag::from_wire(0));
        assert_eq!(None, Tag::from_wire(1));
        assert_eq!(None, Tag::from_wire(42));
        assert_eq!(None, Tag::from_wire(-100));
    }
}
