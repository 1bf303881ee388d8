//! Structures shared by the class records.
//!
//! Every class record embeds a [`ClassInfo`] (object id, class name, member
//! names). The "...AndTypes" records follow it with a [`MemberTypeInfo`]: one
//! [`BinaryType`] per member, then one [`AdditionalTypeInfo`] per member in a
//! second pass.
//!
//! The class name checks are stricter than the format requires. Real
//! producers only emit printable ASCII names, so anything else marks a
//! false-positive scan candidate.

use super::enums::{BinaryType, PrimitiveType};
use super::reader::Reader;
use crate::error::{Error, Result};
use std::collections::HashSet;

/// Largest member count accepted in a [`ClassInfo`]
pub const MAX_MEMBER_COUNT: i32 = 10_240;

/// Largest encoded class name length, in bytes
pub const MAX_CLASS_NAME_LEN: usize = 256;

/// Class identity and member names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    /// Object id of the instance this metadata arrived with
    pub object_id: i32,
    /// Fully qualified class name
    pub class_name: String,
    /// Member names in wire order
    pub member_names: Vec<String>,
}

impl ClassInfo {
    /// Decodes a ClassInfo at the reader's position
    pub fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let object_id = reader.read_i32()?;

        let name_offset = reader.position();
        let class_name = reader.read_text()?;
        validate_class_name(&class_name, name_offset)?;

        let count_offset = reader.position();
        let member_count = reader.read_i32()?;
        if !(0..=MAX_MEMBER_COUNT).contains(&member_count) {
            return Err(Error::invalid_structure(
                count_offset,
                format!("member count {} outside 0..={}", member_count, MAX_MEMBER_COUNT),
            ));
        }

        let mut member_names = Vec::with_capacity(member_count as usize);
        let mut seen = HashSet::with_capacity(member_count as usize);
        for _ in 0..member_count {
            let offset = reader.position();
            let name = reader.read_text()?;
            if !seen.insert(name.clone()) {
                return Err(Error::invalid_structure(
                    offset,
                    format!("duplicate member name '{}'", name),
                ));
            }
            member_names.push(name);
        }

        Ok(Self {
            object_id,
            class_name,
            member_names,
        })
    }

    /// Number of members declared by this class
    pub fn member_count(&self) -> usize {
        self.member_names.len()
    }
}

/// Rejects class names no real producer would emit
fn validate_class_name(name: &str, offset: usize) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::invalid_structure(offset, "empty class name"));
    }
    if name.len() > MAX_CLASS_NAME_LEN {
        return Err(Error::invalid_structure(
            offset,
            format!(
                "class name is {} bytes, limit is {}",
                name.len(),
                MAX_CLASS_NAME_LEN
            ),
        ));
    }
    if let Some(byte) = name.bytes().find(|b| !(0x20..=0x7E).contains(b)) {
        return Err(Error::invalid_structure(
            offset,
            format!("class name contains non-printable byte 0x{:02x}", byte),
        ));
    }
    Ok(())
}

/// Extra metadata refining a member's [`BinaryType`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdditionalTypeInfo {
    /// String, Object, ObjectArray and StringArray carry nothing extra
    None,
    /// Primitive and PrimitiveArray members
    Primitive(PrimitiveType),
    /// Member of a class from the system library
    SystemClass {
        /// Qualified type name, possibly with assembly qualifiers
        class_name: String,
    },
    /// Member of a class from a named library
    Class {
        /// Fully qualified class name
        class_name: String,
        /// Id of the BinaryLibrary record naming the library
        library_id: i32,
    },
}

impl AdditionalTypeInfo {
    /// Decodes the metadata that follows a member of type `binary_type`
    pub fn decode(reader: &mut Reader<'_>, binary_type: BinaryType) -> Result<Self> {
        match binary_type {
            BinaryType::Primitive | BinaryType::PrimitiveArray => {
                reader.read_known_enum().map(Self::Primitive)
            }
            BinaryType::SystemClass => Ok(Self::SystemClass {
                class_name: reader.read_text()?,
            }),
            BinaryType::Class => {
                let class_name = reader.read_text()?;
                let library_id = reader.read_i32()?;
                Ok(Self::Class {
                    class_name,
                    library_id,
                })
            }
            BinaryType::String
            | BinaryType::Object
            | BinaryType::ObjectArray
            | BinaryType::StringArray => Ok(Self::None),
        }
    }
}

/// Member types of a class, parallel to [`ClassInfo::member_names`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberTypeInfo {
    /// One type tag per member
    pub binary_types: Vec<BinaryType>,
    /// One additional info per member
    pub additional_infos: Vec<AdditionalTypeInfo>,
}

impl MemberTypeInfo {
    /// Decodes the type block for the members named in `class_info`
    pub fn decode(reader: &mut Reader<'_>, class_info: &ClassInfo) -> Result<Self> {
        let binary_types = (0..class_info.member_count())
            .map(|_| reader.read_known_enum::<BinaryType>())
            .collect::<Result<Vec<_>>>()?;

        let additional_infos = binary_types
            .iter()
            .map(|&binary_type| AdditionalTypeInfo::decode(reader, binary_type))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            binary_types,
            additional_infos,
        })
    }

    /// Number of member types recorded
    pub fn len(&self) -> usize {
        self.binary_types.len()
    }

    /// Returns true if no member types were recorded
    pub fn is_empty(&self) -> bool {
        self.binary_types.is_empty()
    }

    /// Fails unless exactly one type was recorded per member
    pub(crate) fn check_count(&self, class_info: &ClassInfo, offset: usize) -> Result<()> {
        if self.len() != class_info.member_count() {
            return Err(Error::invalid_structure(
                offset,
                format!(
                    "member type count mismatch: {} types for {} members",
                    self.len(),
                    class_info.member_count()
                ),
            ));
        }
        Ok(())
    }
}
