//! Error types for the dredge-core library.
//!
//! Errors fall into three groups. Bounds errors ([`Error::UnexpectedEof`]) and
//! structural errors ([`Error::InvalidStructure`], [`Error::InvalidTypeName`],
//! [`Error::InvalidSchema`]) are raised while decoding or building at one
//! particular offset and are swallowed by the scanner for that candidate
//! only. Caller precondition errors (empty search inputs, an invalid scan
//! mode, a missing header) abort the whole invocation.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for dredge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all dredge operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A read ran past the end of the buffer
    #[error("unexpected end of buffer at offset {offset}: needed {needed} bytes, {available} available")]
    UnexpectedEof {
        /// Byte offset where the read started
        offset: usize,
        /// Number of bytes the read required
        needed: usize,
        /// Number of bytes left in the buffer
        available: usize,
    },

    /// Decoded data violates an invariant of the serialization format
    #[error("invalid structure at offset {offset}: {details}")]
    InvalidStructure {
        /// Byte offset where the violation was detected
        offset: usize,
        /// Detailed description of the issue
        details: String,
    },

    /// A qualified type name could not be parsed
    #[error("invalid type name '{name}': {details}")]
    InvalidTypeName {
        /// The offending name
        name: String,
        /// Detailed description of the issue
        details: String,
    },

    /// A decoded class record cannot be turned into a schema
    #[error("cannot build schema for '{class_name}': {details}")]
    InvalidSchema {
        /// Qualified name of the class being built
        class_name: String,
        /// Detailed description of the issue
        details: String,
    },

    /// A search was requested with an empty haystack or needle
    #[error("search {what} is empty")]
    EmptySearchInput {
        /// Which input was empty ("haystack" or "needle")
        what: &'static str,
    },

    /// The scan mode selected by the caller is unusable
    #[error("invalid scan mode: {0}")]
    InvalidScanMode(String),

    /// The caller required a serialization header but none was found
    #[error("missing or invalid serialization header: {details}")]
    MissingHeader {
        /// Why the header was rejected
        details: String,
    },

    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A recovered name would place output outside the output directory
    #[error("path traversal detected: '{path}' would escape output directory")]
    PathTraversal {
        /// The suspicious path
        path: PathBuf,
    },
}

impl Error {
    /// Creates a new end-of-buffer error
    pub fn unexpected_eof(offset: usize, needed: usize, available: usize) -> Self {
        Self::UnexpectedEof {
            offset,
            needed,
            available,
        }
    }

    /// Creates a new structural error
    pub fn invalid_structure(offset: usize, details: impl Into<String>) -> Self {
        Self::InvalidStructure {
            offset,
            details: details.into(),
        }
    }

    /// Creates a new type name error
    pub fn invalid_type_name(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidTypeName {
            name: name.into(),
            details: details.into(),
        }
    }

    /// Creates a new schema build error
    pub fn invalid_schema(class_name: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidSchema {
            class_name: class_name.into(),
            details: details.into(),
        }
    }

    /// Creates a new missing header error
    pub fn missing_header(details: impl Into<String>) -> Self {
        Self::MissingHeader {
            details: details.into(),
        }
    }

    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new path traversal error
    pub fn path_traversal(path: impl Into<PathBuf>) -> Self {
        Self::PathTraversal { path: path.into() }
    }

    /// Returns true if this error only invalidates the current decode attempt
    ///
    /// The scanner discards the candidate (or record) that produced a
    /// recoverable error and moves on to the next one.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedEof { .. }
                | Self::InvalidStructure { .. }
                | Self::InvalidTypeName { .. }
                | Self::InvalidSchema { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::path_traversal("../etc/passwd");
        assert!(err.to_string().contains("path traversal"));
        assert!(err.to_string().contains("../etc/passwd"));

        let err = Error::unexpected_eof(12, 4, 1);
        assert_eq!(
            err.to_string(),
            "unexpected end of buffer at offset 12: needed 4 bytes, 1 available"
        );
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::unexpected_eof(0, 1, 0).is_recoverable());
        assert!(Error::invalid_structure(3, "bad discriminator").is_recoverable());
        assert!(Error::invalid_type_name("List`2[[A]]", "arity mismatch").is_recoverable());
        assert!(Error::invalid_schema("NS.", "empty class name").is_recoverable());
        assert!(!Error::EmptySearchInput { what: "needle" }.is_recoverable());
        assert!(!Error::missing_header("no header").is_recoverable());
        assert!(!Error::path_traversal("/test").is_recoverable());
    }
}
