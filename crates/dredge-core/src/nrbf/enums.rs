//! Single-byte wire enumerations.
//!
//! Every enumeration decodes through [`WireEnum::from_byte`] into a [`Tag`],
//! which keeps unknown byte values instead of folding them into a default
//! member. Record decoders treat [`Tag::Unrecognized`] as a structural error;
//! the scanner's discriminator peek simply compares against the tag it wants.

use std::fmt;

/// A single-byte enumeration as found on the wire
pub trait WireEnum: Sized + Copy + fmt::Debug {
    /// Human-readable enumeration name, used in error messages
    const NAME: &'static str;

    /// Maps a raw byte to a known member
    fn from_byte(byte: u8) -> Option<Self>;

    /// Returns the raw byte for this member
    fn to_byte(self) -> u8;
}

/// Result of decoding a single-byte enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag<E> {
    /// The byte maps to a known member
    Known(E),
    /// The byte has no matching member
    Unrecognized(u8),
}

impl<E: WireEnum> Tag<E> {
    /// Decodes a raw byte
    pub fn from_byte(byte: u8) -> Self {
        match E::from_byte(byte) {
            Some(value) => Tag::Known(value),
            None => Tag::Unrecognized(byte),
        }
    }

    /// Returns the known member, if any
    pub fn known(self) -> Option<E> {
        match self {
            Tag::Known(value) => Some(value),
            Tag::Unrecognized(_) => None,
        }
    }
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $label:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $value, )+
        }

        impl WireEnum for $name {
            const NAME: &'static str = $label;

            fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $( $value => Some(Self::$variant), )+
                    _ => None,
                }
            }

            fn to_byte(self) -> u8 {
                self as u8
            }
        }
    };
}

wire_enum! {
    /// Identifies the kind of a record; every record except embedded ones
    /// starts with this byte.
    pub enum RecordType: "record type" {
        /// Stream header, first record of a well-formed stream
        SerializedStreamHeader = 0,
        /// Class instance reusing previously sent metadata
        ClassWithId = 1,
        /// System class without member type metadata
        SystemClassWithMembers = 2,
        /// Class without member type metadata
        ClassWithMembers = 3,
        /// System class with member type metadata
        SystemClassWithMembersAndTypes = 4,
        /// Class with member type metadata and a library reference
        ClassWithMembersAndTypes = 5,
        /// String instance
        BinaryObjectString = 6,
        /// General array
        BinaryArray = 7,
        /// Primitive value with a type tag
        MemberPrimitiveTyped = 8,
        /// Reference to another object by id
        MemberReference = 9,
        /// Null object
        ObjectNull = 10,
        /// End of stream marker
        MessageEnd = 11,
        /// Library name declaration
        BinaryLibrary = 12,
        /// Run of up to 256 null objects
        ObjectNullMultiple256 = 13,
        /// Run of null objects
        ObjectNullMultiple = 14,
        /// Single-dimension primitive array
        ArraySinglePrimitive = 15,
        /// Single-dimension object array
        ArraySingleObject = 16,
        /// Single-dimension string array
        ArraySingleString = 17,
        /// Remote method call
        MethodCall = 21,
        /// Remote method return
        MethodReturn = 22,
    }
}

wire_enum! {
    /// The remoting type of a class member or array item.
    pub enum BinaryType: "binary type" {
        /// Primitive value, refined by a [`PrimitiveType`]
        Primitive = 0,
        /// String
        String = 1,
        /// Object
        Object = 2,
        /// Class from the system library, refined by its name
        SystemClass = 3,
        /// Class from a named library, refined by name and library id
        Class = 4,
        /// Array of objects
        ObjectArray = 5,
        /// Array of strings
        StringArray = 6,
        /// Array of primitives, refined by a [`PrimitiveType`]
        PrimitiveArray = 7,
    }
}

wire_enum! {
    /// Primitive value types. Zero never occurs on the wire.
    #[allow(missing_docs)]
    pub enum PrimitiveType: "primitive type" {
        Boolean = 1,
        Byte = 2,
        Char = 3,
        /// Reserved slot, never emitted by real producers
        Unused = 4,
        Decimal = 5,
        Double = 6,
        Int16 = 7,
        Int32 = 8,
        Int64 = 9,
        SByte = 10,
        Single = 11,
        TimeSpan = 12,
        DateTime = 13,
        UInt16 = 14,
        UInt32 = 15,
        UInt64 = 16,
        Null = 17,
        String = 18,
    }
}

wire_enum! {
    /// Shape of a [`BinaryArray`](super::BinaryArray).
    #[allow(missing_docs)]
    pub enum BinaryArrayType: "binary array type" {
        Single = 0,
        Jagged = 1,
        Rectangular = 2,
        SingleOffset = 3,
        JaggedOffset = 4,
        RectangularOffset = 5,
    }
}

impl BinaryArrayType {
    /// Returns true for the kinds that carry per-dimension lower bounds
    pub fn has_lower_bounds(self) -> bool {
        matches!(
            self,
            Self::SingleOffset | Self::JaggedOffset | Self::RectangularOffset
        )
    }
}

impl PrimitiveType {
    /// Canonical type name used in rendered declarations
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Boolean => "bool",
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Decimal => "decimal",
            Self::Double => "double",
            Self::Null => "null",
            Self::String => "string",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::SByte => "SByte",
            Self::Single => "Single",
            Self::TimeSpan => "TimeSpan",
            Self::DateTime => "DateTime",
            Self::UInt16 => "UInt16",
            Self::UInt32 => "UInt32",
            Self::UInt64 => "UInt64",
            Self::Unused => "UNUSED",
        }
    }
}

impl fmt::Display for BinaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl<E: fmt::Display> fmt::Display for Tag<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Known(value) => value.fmt(f),
            Tag::Unrecognized(byte) => write!(f, "unrecognized (0x{:02x})", byte),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_unrecognized() {
        assert_eq!(
            Tag::<RecordType>::from_byte(5),
            Tag::Known(RecordType::ClassWithMembersAndTypes)
        );
        assert_eq!(Tag::<RecordType>::from_byte(0xFF), Tag::Unrecognized(0xFF));
        assert_eq!(Tag::<RecordType>::from_byte(20), Tag::Unrecognized(20));
        assert_eq!(Tag::<PrimitiveType>::from_byte(0), Tag::Unrecognized(0));
        assert_eq!(Tag::<BinaryType>::from_byte(8), Tag::Unrecognized(8));
    }

    #[test]
    fn test_byte_round_trip() {
        for byte in 0..=u8::MAX {
            if let Some(value) = BinaryType::from_byte(byte) {
                assert_eq!(value.to_byte(), byte);
            }
        }
    }

    #[test]
    fn test_lower_bounds() {
        assert!(BinaryArrayType::SingleOffset.has_lower_bounds());
        assert!(BinaryArrayType::RectangularOffset.has_lower_bounds());
        assert!(!BinaryArrayType::Jagged.has_lower_bounds());
    }

    #[test]
    fn test_primitive_type_names() {
        assert_eq!(PrimitiveType::Int32.type_name(), "Int32");
        assert_eq!(PrimitiveType::Boolean.type_name(), "bool");
        assert_eq!(PrimitiveType::String.type_name(), "string");
    }

    #[test]
    fn test_tag_display() {
        assert_eq!(Tag::Known(BinaryType::Class).to_string(), "Class");
        assert_eq!(Tag::<BinaryType>::Unrecognized(9).to_string(), "unrecognized (0x09)");
    }
}
