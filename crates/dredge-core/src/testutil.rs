//! Test-only encoder for building serialization streams byte by byte.

use crate::nrbf::{BinaryArrayType, BinaryType, PrimitiveType, RecordType};

/// Member type as written into a MemberTypeInfo block
#[derive(Debug, Clone)]
pub(crate) enum MemberSpec {
    Primitive(PrimitiveType),
    String,
    Object,
    SystemClass(String),
    Class(String, i32),
    ObjectArray,
    StringArray,
    PrimitiveArray(PrimitiveType),
}

impl MemberSpec {
    pub(crate) fn system_class(name: &str) -> Self {
        Self::SystemClass(name.to_string())
    }

    pub(crate) fn class(name: &str, library_id: i32) -> Self {
        Self::Class(name.to_string(), library_id)
    }

    fn binary_type(&self) -> BinaryType {
        match self {
            Self::Primitive(_) => BinaryType::Primitive,
            Self::String => BinaryType::String,
            Self::Object => BinaryType::Object,
            Self::SystemClass(_) => BinaryType::SystemClass,
            Self::Class(..) => BinaryType::Class,
            Self::ObjectArray => BinaryType::ObjectArray,
            Self::StringArray => BinaryType::StringArray,
            Self::PrimitiveArray(_) => BinaryType::PrimitiveArray,
        }
    }
}

/// Little-endian stream encoder
#[derive(Debug, Default)]
pub(crate) struct StreamBuilder {
    buf: Vec<u8>,
}

impl StreamBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn position(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn byte(mut self, value: u8) -> Self {
        self.buf.push(value);
        self
    }

    pub(crate) fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub(crate) fn i32(mut self, value: i32) -> Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub(crate) fn record_type(self, record_type: RecordType) -> Self {
        self.byte(record_type as u8)
    }

    pub(crate) fn text(self, value: &str) -> Self {
        self.text_bytes(value.as_bytes())
    }

    pub(crate) fn text_bytes(mut self, bytes: &[u8]) -> Self {
        let mut length = bytes.len();
        loop {
            let mut byte = (length & 0x7F) as u8;
            length >>= 7;
            if length != 0 {
                byte |= 0x80;
            }
            self.buf.push(byte);
            if length == 0 {
                break;
            }
        }
        self.buf.extend_from_slice(bytes);
        self
    }

    pub(crate) fn header(self, root_id: i32, header_id: i32, major: i32, minor: i32) -> Self {
        self.record_type(RecordType::SerializedStreamHeader)
            .i32(root_id)
            .i32(header_id)
            .i32(major)
            .i32(minor)
    }

    pub(crate) fn library(self, library_id: i32, name: &str) -> Self {
        self.record_type(RecordType::BinaryLibrary)
            .i32(library_id)
            .text(name)
    }

    pub(crate) fn class_info(self, object_id: i32, class_name: &str, member_names: &[&str]) -> Self {
        let mut builder = self
            .i32(object_id)
            .text(class_name)
            .i32(member_names.len() as i32);
        for name in member_names {
            builder = builder.text(name);
        }
        builder
    }

    pub(crate) fn member_types(mut self, members: &[MemberSpec]) -> Self {
        for member in members {
            self = self.byte(member.binary_type() as u8);
        }
        for member in members {
            self = self.additional_info(member);
        }
        self
    }

    pub(crate) fn additional_info(self, member: &MemberSpec) -> Self {
        match member {
            MemberSpec::Primitive(p) | MemberSpec::PrimitiveArray(p) => self.byte(*p as u8),
            MemberSpec::SystemClass(name) => self.text(name),
            MemberSpec::Class(name, library_id) => self.text(name).i32(*library_id),
            MemberSpec::String
            | MemberSpec::Object
            | MemberSpec::ObjectArray
            | MemberSpec::StringArray => self,
        }
    }

    pub(crate) fn class_with_members_and_types(
        self,
        object_id: i32,
        class_name: &str,
        members: &[(&str, MemberSpec)],
        library_id: i32,
    ) -> Self {
        let names: Vec<&str> = members.iter().map(|(name, _)| *name).collect();
        let members: Vec<MemberSpec> = members.iter().map(|(_, member)| member.clone()).collect();
        self.record_type(RecordType::ClassWithMembersAndTypes)
            .class_info(object_id, class_name, &names)
            .member_types(&members)
            .i32(library_id)
    }

    pub(crate) fn system_class_with_members_and_types(
        self,
        object_id: i32,
        class_name: &str,
        members: &[(&str, MemberSpec)],
    ) -> Self {
        let names: Vec<&str> = members.iter().map(|(name, _)| *name).collect();
        let members: Vec<MemberSpec> = members.iter().map(|(_, member)| member.clone()).collect();
        self.record_type(RecordType::SystemClassWithMembersAndTypes)
            .class_info(object_id, class_name, &names)
            .member_types(&members)
    }

    pub(crate) fn binary_array_prefix(
        self,
        object_id: i32,
        array_type: BinaryArrayType,
        lengths: &[i32],
        lower_bounds: &[i32],
    ) -> Self {
        let mut builder = self
            .record_type(RecordType::BinaryArray)
            .i32(object_id)
            .byte(array_type as u8)
            .i32(lengths.len() as i32);
        for length in lengths {
            builder = builder.i32(*length);
        }
        for bound in lower_bounds {
            builder = builder.i32(*bound);
        }
        builder
    }

    pub(crate) fn build(self) -> Vec<u8> {
        self.buf
    }
}

/// Stream with a header, a library and one `NS.Foo` class holding an
/// auto-property `Bar` of type Int32. Returns the bytes and the offset of the
/// class record.
pub(crate) fn sample_stream() -> (Vec<u8>, usize) {
    let builder = StreamBuilder::new()
        .header(1, -1, 1, 0)
        .library(2, "Assembly-CSharp");
    let offset = builder.position();
    let data = builder
        .class_with_members_and_types(
            1,
            "NS.Foo",
            &[(
                "<Bar>k__BackingField",
                MemberSpec::Primitive(PrimitiveType::Int32),
            )],
            2,
        )
        .build();
    (data, offset)
}
