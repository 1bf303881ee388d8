//! Decoding of the binary object-serialization stream format.
//!
//! Only type metadata is decoded; instance data (field values) is not. The
//! stream is a sequence of records, each introduced by a one-byte
//! [`RecordType`] discriminator:
//!
//! ```text
//! [SerializationHeader][BinaryLibrary][ClassWithMembersAndTypes]...[MessageEnd]
//! ```
//!
//! A `ClassWithMembersAndTypes` record is laid out as:
//!
//! ```text
//! 0x05 | object id (i32) | name (7-bit length + UTF-8) | member count (i32)
//!      | member names... | binary types (1 byte each) | additional infos...
//!      | library id (i32)
//! ```
//!
//! All decoders run on a [`Reader`] and return [`Error::InvalidStructure`]
//! or [`Error::UnexpectedEof`] on bad input, never a partial record.
//!
//! [`Error::InvalidStructure`]: crate::Error::InvalidStructure
//! [`Error::UnexpectedEof`]: crate::Error::UnexpectedEof

mod class_info;
mod enums;
mod reader;
mod records;

pub use class_info::{
    AdditionalTypeInfo, ClassInfo, MemberTypeInfo, MAX_CLASS_NAME_LEN, MAX_MEMBER_COUNT,
};
pub use enums::{BinaryArrayType, BinaryType, PrimitiveType, RecordType, Tag, WireEnum};
pub use reader::Reader;
pub use records::{
    BinaryArray, BinaryLibrary, BinaryObjectString, ClassWithId, ClassWithMembers,
    ClassWithMembersAndTypes, Decode, MemberReference, Record, SerializationHeader,
    SystemClassWithMembers, SystemClassWithMembersAndTypes,
};
