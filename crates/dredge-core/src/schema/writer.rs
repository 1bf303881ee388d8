//! Extensible schema writing traits.
//!
//! This module provides the [`SchemaWriter`] trait for customizing how
//! recovered classes are written to output.

use super::{ClassSchema, Member};
use std::fmt::{Result, Write as FmtWrite};

/// Trait for writing recovered classes to output.
///
/// [`ClassSchema::visit`] calls `begin_class`, then `write_member` once per
/// member in wire order, then `end_class`. Every method defaults to a no-op.
pub trait SchemaWriter {
    /// Start a class declaration
    fn begin_class(&mut self, schema: &ClassSchema) -> Result {
        let _ = schema;
        Ok(())
    }

    /// Write a member of the class opened last
    fn write_member(&mut self, member: &Member) -> Result {
        let _ = member;
        Ok(())
    }

    /// Finish the class opened last
    fn end_class(&mut self, schema: &ClassSchema) -> Result {
        let _ = schema;
        Ok(())
    }
}

/// A no-op writer that discards all output
pub struct NullWriter;

impl SchemaWriter for NullWriter {}

/// A writer that collects statistics about visited classes
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatsWriter {
    /// Number of classes
    pub class_count: usize,
    /// Number of members, properties included
    pub member_count: usize,
    /// Number of auto-properties
    pub property_count: usize,
    /// Number of members whose type could not be named
    pub unrecognized_count: usize,
}

impl SchemaWriter for StatsWriter {
    fn begin_class(&mut self, _schema: &ClassSchema) -> Result {
        self.class_count += 1;
        Ok(())
    }

    fn write_member(&mut self, member: &Member) -> Result {
        self.member_count += 1;
        if member.is_property {
            self.property_count += 1;
        }
        if !member.type_expr.is_recognized() {
            self.unrecognized_count += 1;
        }
        Ok(())
    }
}

/// Configuration for declaration rendering
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Namespace wrapping every class; empty for none
    pub root_namespace: String,
    /// Indentation string (default: 4 spaces)
    pub indent_str: String,
    /// Line terminator (default: CRLF)
    pub line_ending: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            root_namespace: "Recovered".to_string(),
            indent_str: "    ".to_string(),
            line_ending: "\r\n".to_string(),
        }
    }
}

impl RenderConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the root namespace
    pub fn root_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.root_namespace = namespace.into();
        self
    }

    /// Sets the indentation string
    pub fn indent_str(mut self, s: impl Into<String>) -> Self {
        self.indent_str = s.into();
        self
    }

    /// Sets the line terminator
    pub fn line_ending(mut self, s: impl Into<String>) -> Self {
        self.line_ending = s.into();
        self
    }

    /// Namespace a class is declared in, root namespace included
    pub fn namespace_for(&self, schema: &ClassSchema) -> Option<String> {
        let parts: Vec<&str> = [Some(self.root_namespace.as_str()), schema.namespace()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join("."))
    }
}

/// Writes C# class declarations
///
/// One declaration per class: `using System;`, an optional namespace block,
/// then a `[Serializable]` public class whose fields and auto-properties are
/// all public.
pub struct DeclarationRenderer<'a, W: FmtWrite> {
    writer: &'a mut W,
    config: &'a RenderConfig,
    indent_level: usize,
    in_namespace: bool,
}

impl<'a, W: FmtWrite> DeclarationRenderer<'a, W> {
    /// Creates a renderer writing into `writer`
    pub fn new(writer: &'a mut W, config: &'a RenderConfig) -> Self {
        Self {
            writer,
            config,
            indent_level: 0,
            in_namespace: false,
        }
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    fn writeln(&mut self, s: &str) -> Result {
        if !s.is_empty() {
            for _ in 0..self.indent_level {
                self.writer.write_str(&self.config.indent_str)?;
            }
        }
        self.writer.write_str(s)?;
        self.writer.write_str(&self.config.line_ending)
    }
}

impl<W: FmtWrite> SchemaWriter for DeclarationRenderer<'_, W> {
    fn begin_class(&mut self, schema: &ClassSchema) -> Result {
        self.indent_level = 0;
        self.writeln("using System;")?;
        self.writeln("")?;

        self.in_namespace = false;
        if let Some(namespace) = self.config.namespace_for(schema) {
            self.writeln(&format!("namespace {}", namespace))?;
            self.writeln("{")?;
            self.indent();
            self.in_namespace = true;
        }

        self.writeln("[Serializable]")?;
        match schema.extends() {
            Some(parent) => {
                self.writeln(&format!("public class {} : {}", schema.name(), parent.name()))?
            }
            None => self.writeln(&format!("public class {}", schema.name()))?,
        }
        self.writeln("{")?;
        self.indent();
        Ok(())
    }

    fn write_member(&mut self, member: &Member) -> Result {
        let line = if member.is_property {
            format!("public {} {} {{ get; set; }}", member.type_expr, member.name)
        } else {
            format!("public {} {};", member.type_expr, member.name)
        };
        self.writeln(&line)
    }

    fn end_class(&mut self, _schema: &ClassSchema) -> Result {
        self.dedent();
        self.writeln("}")?;
        if self.in_namespace {
            self.dedent();
            self.writeln("}")?;
            self.in_namespace = false;
        }
        Ok(())
    }
}
