//! # dredge-core
//!
//! A library for recovering class schemas from legacy binary object-serialization
//! streams embedded in arbitrary buffers.
//!
//! This crate provides the core functionality for:
//! - Searching buffers for candidate class-metadata records
//! - Decoding the record layouts of the serialization format
//! - Rebuilding class schemas (namespace, name, parent, typed members)
//! - Rendering schemas as C# class declarations
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`scanner`]: Candidate search and per-candidate decoding
//! - [`nrbf`]: Cursor reader and record decoders
//! - [`schema`]: Schema reconstruction and rendering
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use dredge_core::{RenderConfig, Scanner};
//! use std::fs;
//!
//! // Read a save file or memory dump
//! let data = fs::read("./savegame.dat")?;
//!
//! // Scan for embedded class records
//! let scanner = Scanner::new();
//! let results = scanner.scan(&data)?;
//!
//! // Render declarations, parents first
//! for result in results {
//!     for class in result.schema.declaration_order() {
//!         println!("{}", class.render(&RenderConfig::default()));
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! The library provides several traits for customization:
//!
//! - [`SchemaWriter`]: Customize how recovered classes are written
//! - [`CandidateStrategy`]: Customize where the scanner looks for records
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod error;
pub mod nrbf;
pub mod scanner;
pub mod schema;

#[cfg(test)]
mod testutil;

// Re-export primary types for convenience
pub use error::{Error, Result};
pub use scanner::{
    CandidateOutcome, CandidateStrategy, ScanMode, ScanResult, ScanSession, ScanStats, Scanner,
    ScannerConfig,
};
pub use schema::{
    ClassSchema, DeclarationRenderer, Member, NullWriter, RenderConfig, SchemaWriter, StatsWriter,
    TypeExpr,
};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
