//! One decoder per supported record kind.
//!
//! Each decoder is called at a position where the caller expects that exact
//! record, reads the discriminator first and fails on a mismatch. A failed
//! decode returns no partial record; the cursor position afterwards is
//! unspecified, so callers seek before trying again.

use super::class_info::{AdditionalTypeInfo, ClassInfo, MemberTypeInfo};
use super::enums::{BinaryArrayType, BinaryType, RecordType, Tag};
use super::reader::Reader;
use crate::error::{Error, Result};

/// A record kind that can be decoded from a [`Reader`]
pub trait Decode: Sized {
    /// Discriminator expected at the start of the record
    const RECORD_TYPE: RecordType;

    /// Decodes the record at the reader's position, discriminator included
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        expect_record_type(reader, Self::RECORD_TYPE)?;
        Self::decode_body(reader)
    }

    /// Decodes the fields that follow the discriminator
    fn decode_body(reader: &mut Reader<'_>) -> Result<Self>;
}

/// Reads the discriminator and checks it against `expected`
fn expect_record_type(reader: &mut Reader<'_>, expected: RecordType) -> Result<()> {
    let offset = reader.position();
    let found = reader.read_enum::<RecordType>()?;
    if found != Tag::Known(expected) {
        return Err(Error::invalid_structure(
            offset,
            format!("expected {} but found {}", expected, found),
        ));
    }
    Ok(())
}

/// First record of a well-formed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializationHeader {
    /// Id of the root object
    pub root_id: i32,
    /// Id of the header array, if any
    pub header_id: i32,
    /// Format major version
    pub major_version: i32,
    /// Format minor version
    pub minor_version: i32,
}

impl SerializationHeader {
    /// Major version emitted by every known producer
    pub const MAJOR_VERSION: i32 = 1;
    /// Minor version emitted by every known producer
    pub const MINOR_VERSION: i32 = 0;

    /// Fails unless the header carries the only version real producers write
    pub fn check_version(&self) -> Result<()> {
        if self.major_version != Self::MAJOR_VERSION || self.minor_version != Self::MINOR_VERSION {
            return Err(Error::invalid_structure(
                0,
                format!(
                    "unsupported format version {}.{}",
                    self.major_version, self.minor_version
                ),
            ));
        }
        Ok(())
    }
}

impl Decode for SerializationHeader {
    const RECORD_TYPE: RecordType = RecordType::SerializedStreamHeader;

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            root_id: reader.read_i32()?,
            header_id: reader.read_i32()?,
            major_version: reader.read_i32()?,
            minor_version: reader.read_i32()?,
        })
    }
}

/// Associates a library id with a library name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryLibrary {
    /// Id referenced by class records
    pub library_id: i32,
    /// Assembly display name
    pub library_name: String,
}

impl Decode for BinaryLibrary {
    const RECORD_TYPE: RecordType = RecordType::BinaryLibrary;

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            library_id: reader.read_i32()?,
            library_name: reader.read_text()?,
        })
    }
}

/// Class metadata with member names, member types and a library id
///
/// This is the record the scanner hunts for: it is the only one that carries
/// everything needed to rebuild a class schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassWithMembersAndTypes {
    /// Class identity and member names
    pub class_info: ClassInfo,
    /// Member types, parallel to the member names
    pub member_type_info: MemberTypeInfo,
    /// Id of the library declaring the class
    pub library_id: i32,
}

impl Decode for ClassWithMembersAndTypes {
    const RECORD_TYPE: RecordType = RecordType::ClassWithMembersAndTypes;

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        let class_info = ClassInfo::decode(reader)?;
        let member_type_info = MemberTypeInfo::decode(reader, &class_info)?;
        let library_id = reader.read_i32()?;
        member_type_info.check_count(&class_info, reader.position())?;

        Ok(Self {
            class_info,
            member_type_info,
            library_id,
        })
    }
}

/// Like [`ClassWithMembersAndTypes`], implicitly in the system library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemClassWithMembersAndTypes {
    /// Class identity and member names
    pub class_info: ClassInfo,
    /// Member types, parallel to the member names
    pub member_type_info: MemberTypeInfo,
}

impl Decode for SystemClassWithMembersAndTypes {
    const RECORD_TYPE: RecordType = RecordType::SystemClassWithMembersAndTypes;

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        let class_info = ClassInfo::decode(reader)?;
        let member_type_info = MemberTypeInfo::decode(reader, &class_info)?;
        member_type_info.check_count(&class_info, reader.position())?;

        Ok(Self {
            class_info,
            member_type_info,
        })
    }
}

/// Class metadata without member types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassWithMembers {
    /// Class identity and member names
    pub class_info: ClassInfo,
    /// Id of the library declaring the class
    pub library_id: i32,
}

impl Decode for ClassWithMembers {
    const RECORD_TYPE: RecordType = RecordType::ClassWithMembers;

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            class_info: ClassInfo::decode(reader)?,
            library_id: reader.read_i32()?,
        })
    }
}

/// System class metadata without member types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemClassWithMembers {
    /// Class identity and member names
    pub class_info: ClassInfo,
}

impl Decode for SystemClassWithMembers {
    const RECORD_TYPE: RecordType = RecordType::SystemClassWithMembers;

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            class_info: ClassInfo::decode(reader)?,
        })
    }
}

/// Instance of a class whose metadata was sent earlier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassWithId {
    /// Id of this instance
    pub object_id: i32,
    /// Object id of the record holding the class metadata
    pub metadata_id: i32,
}

impl Decode for ClassWithId {
    const RECORD_TYPE: RecordType = RecordType::ClassWithId;

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            object_id: reader.read_i32()?,
            metadata_id: reader.read_i32()?,
        })
    }
}

/// String instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryObjectString {
    /// Id of this instance
    pub object_id: i32,
    /// String contents
    pub value: String,
}

impl Decode for BinaryObjectString {
    const RECORD_TYPE: RecordType = RecordType::BinaryObjectString;

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            object_id: reader.read_i32()?,
            value: reader.read_text()?,
        })
    }
}

/// General array with its dimensions and element type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryArray {
    /// Id of this instance
    pub object_id: i32,
    /// Shape of the array
    pub array_type: BinaryArrayType,
    /// Number of dimensions
    pub rank: i32,
    /// Length of each dimension
    pub lengths: Vec<i32>,
    /// Lower bound of each dimension, only for the offset kinds
    pub lower_bounds: Vec<i32>,
    /// Type of the array items
    pub item_type: BinaryType,
    /// Metadata refining the item type
    pub item_type_info: AdditionalTypeInfo,
    /// Metadata of the element class
    pub element_class: SystemClassWithMembersAndTypes,
}

impl Decode for BinaryArray {
    const RECORD_TYPE: RecordType = RecordType::BinaryArray;

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        let object_id = reader.read_i32()?;
        let array_type = reader.read_known_enum::<BinaryArrayType>()?;

        let rank_offset = reader.position();
        let rank = reader.read_i32()?;
        if rank < 0 {
            return Err(Error::invalid_structure(
                rank_offset,
                format!("negative array rank {}", rank),
            ));
        }

        let lengths = read_i32s(reader, rank)?;
        let lower_bounds = if array_type.has_lower_bounds() {
            read_i32s(reader, rank)?
        } else {
            Vec::new()
        };

        let item_type = reader.read_known_enum::<BinaryType>()?;
        let item_type_info = AdditionalTypeInfo::decode(reader, item_type)?;
        let element_class = SystemClassWithMembersAndTypes::decode(reader)?;

        Ok(Self {
            object_id,
            array_type,
            rank,
            lengths,
            lower_bounds,
            item_type,
            item_type_info,
            element_class,
        })
    }
}

fn read_i32s(reader: &mut Reader<'_>, count: i32) -> Result<Vec<i32>> {
    // The count comes off the wire; do not trust it for preallocation.
    let mut values = Vec::with_capacity((count as usize).min(reader.remaining() / 4));
    for _ in 0..count {
        values.push(reader.read_i32()?);
    }
    Ok(values)
}

/// Reference to another object by id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberReference {
    /// Object id being referenced
    pub id_ref: i32,
}

impl Decode for MemberReference {
    const RECORD_TYPE: RecordType = RecordType::MemberReference;

    fn decode_body(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            id_ref: reader.read_i32()?,
        })
    }
}

/// Any supported record
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Record {
    SerializationHeader(SerializationHeader),
    BinaryLibrary(BinaryLibrary),
    ClassWithMembersAndTypes(ClassWithMembersAndTypes),
    SystemClassWithMembersAndTypes(SystemClassWithMembersAndTypes),
    ClassWithMembers(ClassWithMembers),
    SystemClassWithMembers(SystemClassWithMembers),
    ClassWithId(ClassWithId),
    BinaryObjectString(BinaryObjectString),
    BinaryArray(BinaryArray),
    MemberReference(MemberReference),
}

impl Record {
    /// Peeks the discriminator and decodes whichever record starts here
    ///
    /// Discriminators of record kinds this crate does not decode are
    /// structural errors, as are unrecognized bytes.
    pub fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let offset = reader.position();
        let record_type = match reader.peek_enum::<RecordType>()? {
            Tag::Known(record_type) => record_type,
            Tag::Unrecognized(byte) => {
                return Err(Error::invalid_structure(
                    offset,
                    format!("invalid record type 0x{:02x}", byte),
                ))
            }
        };

        let record = match record_type {
            RecordType::SerializedStreamHeader => {
                Self::SerializationHeader(SerializationHeader::decode(reader)?)
            }
            RecordType::BinaryLibrary => Self::BinaryLibrary(BinaryLibrary::decode(reader)?),
            RecordType::ClassWithMembersAndTypes => {
                Self::ClassWithMembersAndTypes(ClassWithMembersAndTypes::decode(reader)?)
            }
            RecordType::SystemClassWithMembersAndTypes => Self::SystemClassWithMembersAndTypes(
                SystemClassWithMembersAndTypes::decode(reader)?,
            ),
            RecordType::ClassWithMembers => {
                Self::ClassWithMembers(ClassWithMembers::decode(reader)?)
            }
            RecordType::SystemClassWithMembers => {
                Self::SystemClassWithMembers(SystemClassWithMembers::decode(reader)?)
            }
            RecordType::ClassWithId => Self::ClassWithId(ClassWithId::decode(reader)?),
            RecordType::BinaryObjectString => {
                Self::BinaryObjectString(BinaryObjectString::decode(reader)?)
            }
            RecordType::BinaryArray => Self::BinaryArray(BinaryArray::decode(reader)?),
            RecordType::MemberReference => Self::MemberReference(MemberReference::decode(reader)?),
            other => {
                return Err(Error::invalid_structure(
                    offset,
                    format!("unsupported record type {}", other),
                ))
            }
        };

        Ok(record)
    }

    /// Discriminator of this record
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::SerializationHeader(_) => RecordType::SerializedStreamHeader,
            Self::BinaryLibrary(_) => RecordType::BinaryLibrary,
            Self::ClassWithMembersAndTypes(_) => RecordType::ClassWithMembersAndTypes,
            Self::SystemClassWithMembersAndTypes(_) => RecordType::SystemClassWithMembersAndTypes,
            Self::ClassWithMembers(_) => RecordType::ClassWithMembers,
            Self::SystemClassWithMembers(_) => RecordType::SystemClassWithMembers,
            Self::ClassWithId(_) => RecordType::ClassWithId,
            Self::BinaryObjectString(_) => RecordType::BinaryObjectString,
            Self::BinaryArray(_) => RecordType::BinaryArray,
            Self::MemberReference(_) => RecordType::MemberReference,
        }
    }

    /// Class metadata carried by this record, if it is a class record
    pub fn class_info(&self) -> Option<&ClassInfo> {
        match self {
            Self::ClassWithMembersAndTypes(r) => Some(&r.class_info),
            Self::SystemClassWithMembersAndTypes(r) => Some(&r.class_info),
            Self::ClassWithMembers(r) => Some(&r.class_info),
            Self::SystemClassWithMembers(r) => Some(&r.class_info),
            _ => None,
        }
    }
}
