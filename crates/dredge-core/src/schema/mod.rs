//! Class schema reconstruction module.
//!
//! This module turns a decoded [`ClassWithMembersAndTypes`] record into a
//! [`ClassSchema`]: namespace, simple name, an optional parent class and a list
//! of typed members.
//!
//! ## Naming conventions
//!
//! Serialized member names follow the conventions of the producing compiler:
//!
//! - `<Name>k__BackingField` is the hidden field behind an auto-property
//!   `Name`, rendered as a property
//! - `Base+Name` is a member `Name` inherited from class `Base`; the parent
//!   class is synthesized from the first such member and receives all of them
//!
//! ## Output
//!
//! Schemas are written through the [`SchemaWriter`] trait. The
//! [`DeclarationRenderer`] produces C# class declarations; [`StatsWriter`]
//! only counts.

mod typename;
mod writer;

use crate::error::{Error, Result};
use crate::nrbf::{AdditionalTypeInfo, BinaryType, ClassWithMembersAndTypes};
use std::fmt;
use std::path::PathBuf;
use tracing::trace;

pub use typename::{clean_type_name, MAX_GENERIC_DEPTH};
pub use writer::{DeclarationRenderer, NullWriter, RenderConfig, SchemaWriter, StatsWriter};

const BACKING_FIELD_SUFFIX: &str = ">k__BackingField";
const PARENT_MARKER: char = '+';

/// Resolved type of a member
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// A type that could be named
    Named(String),
    /// A member whose binary type has no name mapping
    Unrecognized(BinaryType),
}

impl TypeExpr {
    /// Returns true if the type could be named
    pub fn is_recognized(&self) -> bool {
        matches!(self, Self::Named(_))
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Unrecognized(binary_type) => {
                write!(f, "/* unrecognized {} */ object", binary_type)
            }
        }
    }
}

/// A member of a recovered class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Member name, backing-field decoration removed
    pub name: String,
    /// Member type
    pub type_expr: TypeExpr,
    /// Whether the member was an auto-property backing field
    pub is_property: bool,
}

impl Member {
    /// Creates a plain field
    pub fn field(name: impl Into<String>, type_expr: TypeExpr) -> Self {
        Self {
            name: name.into(),
            type_expr,
            is_property: false,
        }
    }

    /// Creates an auto-property
    pub fn property(name: impl Into<String>, type_expr: TypeExpr) -> Self {
        Self {
            name: name.into(),
            type_expr,
            is_property: true,
        }
    }
}

/// A recovered class declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSchema {
    namespace: Option<String>,
    name: String,
    extends: Option<Box<ClassSchema>>,
    members: Vec<Member>,
}

impl ClassSchema {
    /// Creates an empty schema
    pub fn new(namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            name: name.into(),
            extends: None,
            members: Vec::new(),
        }
    }

    /// Builds the schema described by a decoded class record
    pub fn from_record(record: &ClassWithMembersAndTypes) -> Result<Self> {
        let full_name = record.class_info.class_name.as_str();
        let (namespace, name) = split_class_name(full_name);
        if name.is_empty() {
            return Err(Error::invalid_schema(full_name, "empty simple class name"));
        }

        let member_names = &record.class_info.member_names;
        let types = &record.member_type_info;
        if member_names.len() != types.binary_types.len()
            || types.binary_types.len() != types.additional_infos.len()
        {
            return Err(Error::invalid_schema(
                full_name,
                format!(
                    "{} member names, {} binary types, {} additional infos",
                    member_names.len(),
                    types.binary_types.len(),
                    types.additional_infos.len()
                ),
            ));
        }

        let mut schema = Self::new(namespace, name);

        let members = member_names
            .iter()
            .zip(&types.binary_types)
            .zip(&types.additional_infos);
        for ((raw_name, &binary_type), info) in members {
            let type_expr = resolve_type(full_name, binary_type, info)?;

            let (owner, local_name) = match raw_name.split_once(PARENT_MARKER) {
                Some((parent, local_name)) => {
                    if parent.is_empty() {
                        return Err(Error::invalid_schema(
                            full_name,
                            format!("member '{}' names an empty parent class", raw_name),
                        ));
                    }
                    let parent_schema = schema
                        .extends
                        .get_or_insert_with(|| Box::new(Self::new(None, parent)));
                    (&mut **parent_schema, local_name)
                }
                None => (&mut schema, raw_name.as_str()),
            };

            let member = match backing_field_name(local_name) {
                Some(property) => Member::property(property, type_expr),
                None => Member::field(local_name, type_expr),
            };
            if member.name.is_empty() {
                return Err(Error::invalid_schema(
                    full_name,
                    format!("member '{}' has an empty name", raw_name),
                ));
            }
            owner.members.push(member);
        }

        trace!(
            class = full_name,
            members = schema.members.len(),
            has_parent = schema.extends.is_some(),
            "Built class schema"
        );

        Ok(schema)
    }

    /// Namespace, if the qualified name had one
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Simple class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Qualified name, `namespace.name` or just `name`
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}.{}", namespace, self.name),
            None => self.name.clone(),
        }
    }

    /// Parent class, if any member was inherited
    pub fn extends(&self) -> Option<&ClassSchema> {
        self.extends.as_deref()
    }

    /// Members declared directly on this class
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Adds a member to this class
    pub fn push_member(&mut self, member: Member) {
        self.members.push(member);
    }

    /// Sets the parent class
    pub fn set_extends(&mut self, parent: ClassSchema) {
        self.extends = Some(Box::new(parent));
    }

    /// This class and its ancestors, outermost ancestor first
    pub fn declaration_order(&self) -> Vec<&ClassSchema> {
        let mut chain: Vec<&ClassSchema> =
            std::iter::successors(Some(self), |schema| schema.extends()).collect();
        chain.reverse();
        chain
    }

    /// Output path of this class relative to an output directory
    ///
    /// The layout is `<namespace>/<Name>.cs`. Names that would leave the
    /// output directory are rejected with [`Error::PathTraversal`].
    pub fn relative_path(&self) -> Result<PathBuf> {
        let file_name = format!("{}.cs", self.name);
        let components = self
            .namespace
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.name.as_str()));

        for component in components {
            if !is_safe_component(component) {
                let display = match &self.namespace {
                    Some(namespace) => format!("{}/{}", namespace, file_name),
                    None => file_name,
                };
                return Err(Error::path_traversal(display));
            }
        }

        let mut path = PathBuf::new();
        if let Some(namespace) = &self.namespace {
            path.push(namespace);
        }
        path.push(file_name);
        Ok(path)
    }

    /// Feeds this class, without its ancestors, to a writer
    pub fn visit(&self, writer: &mut impl SchemaWriter) -> fmt::Result {
        writer.begin_class(self)?;
        for member in &self.members {
            writer.write_member(member)?;
        }
        writer.end_class(self)
    }

    /// Renders this class as a C# declaration
    pub fn render(&self, config: &RenderConfig) -> String {
        let mut output = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_to(&mut output, config);
        output
    }

    /// Writes this class as a C# declaration
    pub fn write_to(&self, w: &mut impl fmt::Write, config: &RenderConfig) -> fmt::Result {
        let mut renderer = DeclarationRenderer::new(w, config);
        self.visit(&mut renderer)
    }
}

/// Splits a qualified class name at its first `.`
///
/// `"A.B.C"` yields namespace `A` and name `B.C`. An empty namespace part is
/// treated as absent.
pub fn split_class_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((namespace, simple)) if !namespace.is_empty() => (Some(namespace), simple),
        Some((_, simple)) => (None, simple),
        None => (None, name),
    }
}

/// Extracts `X` from a name containing `<X>k__BackingField`
///
/// `X` never contains `>`.
pub fn backing_field_name(name: &str) -> Option<&str> {
    name.match_indices('<').find_map(|(open, _)| {
        let inner_start = open + 1;
        let close = inner_start + name[inner_start..].find('>')?;
        let inner = &name[inner_start..close];
        (!inner.is_empty() && name[close..].starts_with(BACKING_FIELD_SUFFIX)).then_some(inner)
    })
}

fn resolve_type(
    class_name: &str,
    binary_type: BinaryType,
    info: &AdditionalTypeInfo,
) -> Result<TypeExpr> {
    let type_expr = match (binary_type, info) {
        (BinaryType::Primitive, AdditionalTypeInfo::Primitive(primitive)) => {
            TypeExpr::Named(primitive.type_name().to_string())
        }
        (BinaryType::String, _) => TypeExpr::Named("string".to_string()),
        (BinaryType::Class, AdditionalTypeInfo::Class { class_name, .. }) => {
            TypeExpr::Named(split_class_name(class_name).1.to_string())
        }
        (BinaryType::SystemClass, AdditionalTypeInfo::SystemClass { class_name }) => {
            TypeExpr::Named(clean_type_name(class_name)?)
        }
        (BinaryType::Primitive | BinaryType::Class | BinaryType::SystemClass, other) => {
            return Err(Error::invalid_schema(
                class_name,
                format!("{} member carries mismatched type info {:?}", binary_type, other),
            ))
        }
        (other, _) => TypeExpr::Unrecognized(other),
    };
    Ok(type_expr)
}

fn is_safe_component(component: &str) -> bool {
    !component.is_empty()
        && component != "."
        && component != ".."
        && !component.contains(['/', '\\', ':', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nrbf::{Decode, PrimitiveType, Reader};
    use crate::testutil::{MemberSpec, StreamBuilder};
    use pretty_assertions::assert_eq;

    fn record(class_name: &str, members: &[(&str, MemberSpec)]) -> ClassWithMembersAndTypes {
        let data = StreamBuilder::new()
            .class_with_members_and_types(1, class_name, members, 2)
            .build();
        ClassWithMembersAndTypes::decode(&mut Reader::new(&data)).unwrap()
    }

    fn named(name: &str) -> TypeExpr {
        TypeExpr::Named(name.to_string())
    }

    #[test]
    fn test_auto_property() {
        let schema = ClassSchema::from_record(&record(
            "NS.Foo",
            &[(
                "<Bar>k__BackingField",
                MemberSpec::Primitive(PrimitiveType::Int32),
            )],
        ))
        .unwrap();

        assert_eq!(schema.namespace(), Some("NS"));
        assert_eq!(schema.name(), "Foo");
        assert_eq!(schema.full_name(), "NS.Foo");
        assert!(schema.extends().is_none());
        assert_eq!(
            schema.members(),
            &[Member::property("Bar", named("Int32"))]
        );
    }

    #[test]
    fn test_parent_marker() {
        let schema = ClassSchema::from_record(&record(
            "NS.Derived",
            &[
                ("Base+x", MemberSpec::Primitive(PrimitiveType::Int32)),
                ("Base+<Y>k__BackingField", MemberSpec::String),
                ("own", MemberSpec::Primitive(PrimitiveType::Boolean)),
            ],
        ))
        .unwrap();

        let parent = schema.extends().unwrap();
        assert_eq!(parent.name(), "Base");
        assert_eq!(parent.namespace(), None);
        assert_eq!(
            parent.members(),
            &[
                Member::field("x", named("Int32")),
                Member::property("Y", named("string")),
            ]
        );
        assert_eq!(schema.members(), &[Member::field("own", named("bool"))]);

        let order: Vec<&str> = schema
            .declaration_order()
            .into_iter()
            .map(ClassSchema::name)
            .collect();
        assert_eq!(order, vec!["Base", "Derived"]);
    }

    #[test]
    fn test_first_parent_wins() {
        let schema = ClassSchema::from_record(&record(
            "Derived",
            &[
                ("A+a", MemberSpec::String),
                ("B+b", MemberSpec::String),
            ],
        ))
        .unwrap();

        let parent = schema.extends().unwrap();
        assert_eq!(parent.name(), "A");
        assert_eq!(parent.members().len(), 2);
        assert!(schema.members().is_empty());
    }

    #[test]
    fn test_member_types() {
        let schema = ClassSchema::from_record(&record(
            "NS.Holder",
            &[
                ("item", MemberSpec::class("Game.Items.Sword", 2)),
                (
                    "list",
                    MemberSpec::system_class(
                        "System.Collections.Generic.List`1[[System.String, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089]]",
                    ),
                ),
                ("when", MemberSpec::Primitive(PrimitiveType::DateTime)),
                ("stuff", MemberSpec::ObjectArray),
                ("anything", MemberSpec::Object),
            ],
        ))
        .unwrap();

        let types: Vec<&TypeExpr> = schema.members().iter().map(|m| &m.type_expr).collect();
        assert_eq!(
            types,
            vec![
                &named("Items.Sword"),
                &named("System.Collections.Generic.List<String>"),
                &named("DateTime"),
                &TypeExpr::Unrecognized(BinaryType::ObjectArray),
                &TypeExpr::Unrecognized(BinaryType::Object),
            ]
        );
        assert!(!types[3].is_recognized());
        assert_eq!(types[3].to_string(), "/* unrecognized ObjectArray */ object");
    }

    #[test]
    fn test_bad_system_class_name_fails_build() {
        let err = ClassSchema::from_record(&record(
            "NS.Holder",
            &[("list", MemberSpec::system_class("List`2[[System.String]]"))],
        ))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidTypeName { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_empty_names_fail_build() {
        let err = ClassSchema::from_record(&record("NS.", &[])).unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { .. }));

        let err = ClassSchema::from_record(&record("NS.Foo", &[("+x", MemberSpec::String)]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { .. }));

        let err = ClassSchema::from_record(&record("NS.Foo", &[("Base+", MemberSpec::String)]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { .. }));
    }

    #[test]
    fn test_split_class_name() {
        assert_eq!(split_class_name("NS.Foo"), (Some("NS"), "Foo"));
        assert_eq!(split_class_name("A.B.C"), (Some("A"), "B.C"));
        assert_eq!(split_class_name("Foo"), (None, "Foo"));
        assert_eq!(split_class_name(".Foo"), (None, "Foo"));
    }

    #[test]
    fn test_backing_field_name() {
        assert_eq!(backing_field_name("<Bar>k__BackingField"), Some("Bar"));
        assert_eq!(backing_field_name("x<Bar>k__BackingFieldy"), Some("Bar"));
        assert_eq!(backing_field_name("<>k__BackingField"), None);
        assert_eq!(backing_field_name("<Bar>k__Backing"), None);
        assert_eq!(backing_field_name("plain"), None);
        assert_eq!(backing_field_name("<a>b<c>k__BackingField"), Some("c"));
        assert_eq!(backing_field_name("<a>>k__BackingField"), None);
    }

    #[test]
    fn test_relative_path() {
        let schema = ClassSchema::new(Some("NS"), "Foo");
        assert_eq!(schema.relative_path().unwrap(), PathBuf::from("NS").join("Foo.cs"));

        let schema = ClassSchema::new(None, "Foo");
        assert_eq!(schema.relative_path().unwrap(), PathBuf::from("Foo.cs"));

        for (namespace, name) in [
            (Some(".."), "Foo"),
            (Some("NS"), "../../etc/passwd"),
            (Some("NS"), "a\\b"),
            (None, ""),
            (Some("C:"), "Foo"),
        ] {
            let err = ClassSchema::new(namespace, name).relative_path().unwrap_err();
            assert!(matches!(err, Error::PathTraversal { .. }), "{:?}", (namespace, name));
        }
    }

    #[test]
    fn test_render() {
        let schema = ClassSchema::from_record(&record(
            "NS.Foo",
            &[
                (
                    "<Bar>k__BackingField",
                    MemberSpec::Primitive(PrimitiveType::Int32),
                ),
                ("name", MemberSpec::String),
            ],
        ))
        .unwrap();

        let rendered = schema.render(&RenderConfig::default().line_ending("\n"));
        assert_eq!(
            rendered,
            "using System;\n\
             \n\
             namespace Recovered.NS\n\
             {\n\
             \x20   [Serializable]\n\
             \x20   public class Foo\n\
             \x20   {\n\
             \x20       public Int32 Bar { get; set; }\n\
             \x20       public string name;\n\
             \x20   }\n\
             }\n"
        );
    }

    #[test]
    fn test_render_with_parent() {
        let schema = ClassSchema::from_record(&record(
            "Derived",
            &[("Base+x", MemberSpec::Primitive(PrimitiveType::Int32))],
        ))
        .unwrap();

        let config = RenderConfig::default().root_namespace("").line_ending("\n");
        assert_eq!(
            schema.render(&config),
            "using System;\n\
             \n\
             [Serializable]\n\
             public class Derived : Base\n\
             {\n\
             }\n"
        );
    }
}
