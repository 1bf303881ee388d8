//! Buffer scanning module for finding embedded class records.
//!
//! This module finds `ClassWithMembersAndTypes` records inside arbitrary
//! buffers (memory dumps, save files, executables) and turns each of them into
//! a [`ClassSchema`].
//!
//! ## Algorithm Overview
//!
//! 1. Produce candidate offsets with a [`CandidateStrategy`]:
//!    - [`DiscriminatorSearch`] reports every `0x05` byte
//!    - [`NameGuidedSearch`] reports every match of a class-name prefix,
//!      moved back over the discriminator, object id and length prefix
//! 2. At each candidate, peek the discriminator and skip anything that is not
//!    a class record
//! 3. Decode the record and build its schema; a failure discards that
//!    candidate only
//!
//! Candidates are visited in ascending offset order through a [`ScanSession`]
//! iterator, so callers can report progress or stop early.
//!
//! ## Extensibility
//!
//! The [`CandidateStrategy`] trait allows custom candidate sources:
//!
//! ```no_run
//! use dredge_core::scanner::{CandidateStrategy, Scanner};
//! use dredge_core::Result;
//!
//! struct KnownOffsets(Vec<usize>);
//!
//! impl CandidateStrategy for KnownOffsets {
//!     fn candidates(&self, _data: &[u8]) -> Result<Vec<usize>> {
//!         Ok(self.0.clone())
//!     }
//! }
//!
//! let data = std::fs::read("dump.bin")?;
//! let session = Scanner::new().session_with_strategy(&KnownOffsets(vec![0x40]), &data)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod search;

use crate::error::{Error, Result};
use crate::nrbf::{ClassWithMembersAndTypes, Decode, Reader, RecordType, SerializationHeader, Tag};
use crate::schema::ClassSchema;
use std::ops::Range;
use std::path::Path;
use tracing::{debug, trace, warn};

pub use search::{find_all, BoyerMoore};

/// Discriminator byte of a `ClassWithMembersAndTypes` record
const CLASS_RECORD_DISCRIMINATOR: u8 = RecordType::ClassWithMembersAndTypes as u8;

/// Bytes between a class record's start and its name text: discriminator,
/// object id and a single-byte length prefix
///
/// Names of 128 bytes or more have a longer prefix, so name-guided candidates
/// for them land on the wrong offset and are rejected.
pub const NAME_PREFIX_COST: usize = 6;

/// How candidate offsets are produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanMode {
    /// Every discriminator byte in the buffer
    Full,
    /// Matches of one or more class-name prefixes
    Prefixes(Vec<String>),
}

impl ScanMode {
    /// Creates a name-guided mode from any list of prefixes
    pub fn prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Prefixes(prefixes.into_iter().map(Into::into).collect())
    }
}

/// Configuration for the scanner
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Candidate source
    pub mode: ScanMode,
    /// Require a valid serialization header at offset 0
    pub require_header: bool,
    /// Maximum number of classes to recover (0 = unlimited)
    pub max_results: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::Full,
            require_header: false,
            max_results: 0,
        }
    }
}

impl ScannerConfig {
    /// Creates a new scanner config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the candidate source
    pub fn mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets whether a serialization header is required
    pub fn require_header(mut self, require: bool) -> Self {
        self.require_header = require;
        self
    }

    /// Sets the maximum number of classes to recover
    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }
}

/// A class recovered from the buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Byte range of the class record in the scanned buffer
    pub range: Range<usize>,
    /// The decoded record
    pub record: ClassWithMembersAndTypes,
    /// Schema built from the record
    pub schema: ClassSchema,
}

impl ScanResult {
    /// Offset of the record's discriminator byte
    pub fn offset(&self) -> usize {
        self.range.start
    }
}

/// What happened at one candidate offset
#[derive(Debug)]
pub enum CandidateOutcome {
    /// A class was recovered
    Recovered(ScanResult),
    /// The byte at the offset is not a class record discriminator
    Skipped {
        /// Candidate offset
        offset: usize,
    },
    /// The record failed to decode
    DecodeFailed {
        /// Candidate offset
        offset: usize,
        /// Why decoding failed
        error: Error,
    },
    /// The record decoded but no schema could be built from it
    BuildFailed {
        /// Candidate offset
        offset: usize,
        /// Why the build failed
        error: Error,
    },
}

impl CandidateOutcome {
    /// Returns the recovered class, if any
    pub fn into_result(self) -> Option<ScanResult> {
        match self {
            Self::Recovered(result) => Some(result),
            _ => None,
        }
    }
}

/// Counters kept by a [`ScanSession`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    /// Candidate offsets examined
    pub candidates: usize,
    /// Candidates skipped by the discriminator peek
    pub peek_rejections: usize,
    /// Candidates whose record failed to decode
    pub decode_failures: usize,
    /// Records whose schema failed to build
    pub build_failures: usize,
    /// Classes recovered
    pub recovered: usize,
}

/// Trait for implementing custom candidate sources
///
/// Offsets are visited in the order returned; they need not be valid record
/// starts, since every one is validated independently.
pub trait CandidateStrategy: Send + Sync {
    /// Produce candidate record offsets for `data`
    fn candidates(&self, data: &[u8]) -> Result<Vec<usize>>;
}

/// Reports every class record discriminator byte in the buffer
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscriminatorSearch;

impl CandidateStrategy for DiscriminatorSearch {
    fn candidates(&self, data: &[u8]) -> Result<Vec<usize>> {
        find_all(data, &[CLASS_RECORD_DISCRIMINATOR], None)
    }
}

/// Reports record offsets implied by class-name prefix matches
#[derive(Debug, Clone)]
pub struct NameGuidedSearch {
    matchers: Vec<BoyerMoore>,
}

impl NameGuidedSearch {
    /// Builds one matcher per prefix
    ///
    /// Fails on an empty prefix list or an empty prefix.
    pub fn new<S: AsRef<str>>(prefixes: &[S]) -> Result<Self> {
        if prefixes.is_empty() {
            return Err(Error::InvalidScanMode(
                "at least one class-name prefix is required".to_string(),
            ));
        }

        let matchers = prefixes
            .iter()
            .map(|prefix| {
                let prefix = prefix.as_ref();
                if prefix.is_empty() {
                    return Err(Error::InvalidScanMode(
                        "class-name prefixes must not be empty".to_string(),
                    ));
                }
                BoyerMoore::new(prefix.as_bytes())
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { matchers })
    }
}

impl CandidateStrategy for NameGuidedSearch {
    fn candidates(&self, data: &[u8]) -> Result<Vec<usize>> {
        let mut offsets = Vec::new();
        for matcher in &self.matchers {
            let matches = matcher.find_all(data, None)?;
            trace!(
                prefix = %String::from_utf8_lossy(matcher.needle()),
                matches = matches.len(),
                "Prefix search complete"
            );
            offsets.extend(
                matches
                    .into_iter()
                    .filter_map(|position| position.checked_sub(NAME_PREFIX_COST)),
            );
        }
        offsets.sort_unstable();
        offsets.dedup();
        Ok(offsets)
    }
}

/// Primary scanner for finding embedded class records
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    config: ScannerConfig,
}

impl Scanner {
    /// Creates a new scanner with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new scanner with custom configuration
    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Returns the scanner configuration
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Prepares a scan of `data` using the configured mode
    ///
    /// Caller precondition failures (empty buffer, unusable mode, missing
    /// header when one is required) are returned here. Per-candidate failures
    /// never are.
    pub fn session<'a>(&self, data: &'a [u8]) -> Result<ScanSession<'a>> {
        match &self.config.mode {
            ScanMode::Full => self.session_with_strategy(&DiscriminatorSearch, data),
            ScanMode::Prefixes(prefixes) => {
                self.session_with_strategy(&NameGuidedSearch::new(prefixes)?, data)
            }
        }
    }

    /// Prepares a scan of `data` with a custom candidate source
    pub fn session_with_strategy<'a>(
        &self,
        strategy: &dyn CandidateStrategy,
        data: &'a [u8],
    ) -> Result<ScanSession<'a>> {
        debug!("Starting scan of {} bytes", data.len());

        if self.config.require_header {
            check_header(data)?;
        }

        let candidates = strategy.candidates(data)?;
        debug!("Found {} candidate offsets", candidates.len());

        Ok(ScanSession {
            reader: Reader::new(data),
            candidates,
            next: 0,
            max_results: self.config.max_results,
            stats: ScanStats::default(),
        })
    }

    /// Scans `data` and returns every recovered class in offset order
    pub fn scan(&self, data: &[u8]) -> Result<Vec<ScanResult>> {
        self.scan_with_progress(data, |_, _| {})
    }

    /// Like [`Scanner::scan`], calling `progress(index, total)` before each
    /// candidate
    pub fn scan_with_progress(
        &self,
        data: &[u8],
        mut progress: impl FnMut(usize, usize),
    ) -> Result<Vec<ScanResult>> {
        let mut session = self.session(data)?;
        let total = session.len();
        let mut results = Vec::new();

        loop {
            progress(session.position(), total);
            let Some(outcome) = session.next() else {
                break;
            };
            if let Some(result) = outcome.into_result() {
                results.push(result);
            }
        }

        let stats = session.stats();
        debug!(
            candidates = stats.candidates,
            peek_rejections = stats.peek_rejections,
            decode_failures = stats.decode_failures,
            build_failures = stats.build_failures,
            "Scan complete: recovered {} classes",
            stats.recovered
        );
        Ok(results)
    }
}

/// An in-progress scan over one buffer
///
/// Yields one [`CandidateOutcome`] per candidate. Each attempt seeks the
/// reader to its own offset, so no state carries over between candidates and
/// the caller may stop iterating at any point.
#[derive(Debug)]
pub struct ScanSession<'a> {
    reader: Reader<'a>,
    candidates: Vec<usize>,
    next: usize,
    max_results: usize,
    stats: ScanStats,
}

impl ScanSession<'_> {
    /// Total number of candidates
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Returns true if there are no candidates at all
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Number of candidates examined so far
    pub fn position(&self) -> usize {
        self.next
    }

    /// Candidate offsets in visiting order
    pub fn candidates(&self) -> &[usize] {
        &self.candidates
    }

    /// Counters accumulated so far
    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    fn attempt(&mut self, offset: usize) -> CandidateOutcome {
        self.reader.set_position(offset);

        match self.reader.peek_enum::<RecordType>() {
            Ok(Tag::Known(RecordType::ClassWithMembersAndTypes)) => {}
            _ => {
                self.stats.peek_rejections += 1;
                return CandidateOutcome::Skipped { offset };
            }
        }

        let record = match ClassWithMembersAndTypes::decode(&mut self.reader) {
            Ok(record) => record,
            Err(error) => {
                trace!(offset, %error, "Candidate rejected");
                self.stats.decode_failures += 1;
                return CandidateOutcome::DecodeFailed { offset, error };
            }
        };
        let end = self.reader.position();

        match ClassSchema::from_record(&record) {
            Ok(schema) => {
                debug!(
                    "Recovered class {} at {}..{}",
                    record.class_info.class_name, offset, end
                );
                self.stats.recovered += 1;
                CandidateOutcome::Recovered(ScanResult {
                    range: offset..end,
                    record,
                    schema,
                })
            }
            Err(error) => {
                warn!(offset, %error, "Schema build failed");
                self.stats.build_failures += 1;
                CandidateOutcome::BuildFailed { offset, error }
            }
        }
    }
}

impl Iterator for ScanSession<'_> {
    type Item = CandidateOutcome;

    fn next(&mut self) -> Option<Self::Item> {
        if self.max_results > 0 && self.stats.recovered >= self.max_results {
            return None;
        }
        let offset = *self.candidates.get(self.next)?;
        self.next += 1;
        self.stats.candidates += 1;
        Some(self.attempt(offset))
    }
}

/// Decodes and version-checks the header at offset 0
fn check_header(data: &[u8]) -> Result<SerializationHeader> {
    let mut reader = Reader::new(data);
    let header = SerializationHeader::decode(&mut reader)
        .map_err(|e| Error::missing_header(e.to_string()))?;
    header
        .check_version()
        .map_err(|e| Error::missing_header(e.to_string()))?;
    trace!(root_id = header.root_id, "Serialization header accepted");
    Ok(header)
}

/// Scan a file for embedded class records
///
/// This is a convenience function that reads the file and scans it.
pub fn scan_file(path: impl AsRef<Path>) -> Result<Vec<ScanResult>> {
    scan_file_with_config(path, ScannerConfig::default())
}

/// Scan a file with custom configuration
pub fn scan_file_with_config(
    path: impl AsRef<Path>,
    config: ScannerConfig,
) -> Result<Vec<ScanResult>> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
    Scanner::with_config(config).scan(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nrbf::PrimitiveType;
    use crate::schema::{Member, TypeExpr};
    use crate::testutil::{sample_stream, MemberSpec, StreamBuilder};
    use pretty_assertions::assert_eq;

    fn prefix_scanner(prefixes: &[&str]) -> Scanner {
        Scanner::with_config(ScannerConfig::new().mode(ScanMode::prefixes(prefixes.iter().copied())))
    }

    #[test]
    fn test_scanner_config_builder() {
        let config = ScannerConfig::new()
            .mode(ScanMode::prefixes(["NS."]))
            .require_header(true)
            .max_results(3);

        assert_eq!(config.mode, ScanMode::Prefixes(vec!["NS.".to_string()]));
        assert!(config.require_header);
        assert_eq!(config.max_results, 3);
    }

    #[test]
    fn test_full_scan_recovers_class() {
        let (data, offset) = sample_stream();

        let mut session = Scanner::new().session(&data).unwrap();
        assert_eq!(session.candidates(), &[offset]);

        let result = session.next().and_then(CandidateOutcome::into_result).unwrap();
        assert!(session.next().is_none());

        assert_eq!(result.offset(), offset);
        assert_eq!(result.range.end, data.len());
        assert_eq!(result.schema.namespace(), Some("NS"));
        assert_eq!(result.schema.name(), "Foo");
        assert_eq!(
            result.schema.members(),
            &[Member::property("Bar", TypeExpr::Named("Int32".to_string()))]
        );
        assert_eq!(
            session.stats(),
            ScanStats {
                candidates: 1,
                recovered: 1,
                ..ScanStats::default()
            }
        );
    }

    #[test]
    fn test_name_guided_scan_matches_full_scan() {
        let (data, offset) = sample_stream();

        let session = prefix_scanner(&["NS.F"]).session(&data).unwrap();
        assert_eq!(session.candidates(), &[offset]);

        let guided = prefix_scanner(&["NS.F"]).scan(&data).unwrap();
        let full = Scanner::new().scan(&data).unwrap();
        assert_eq!(guided, full);
        assert_eq!(guided.len(), 1);
    }

    #[test]
    fn test_name_guided_merges_prefixes() {
        let (data, offset) = sample_stream();

        // "Foo" sits three bytes into the name, so its candidate lands inside
        // the object id and is skipped by the peek.
        let mut session = prefix_scanner(&["Foo", "NS.", "NS.F"]).session(&data).unwrap();
        assert_eq!(session.candidates(), &[offset, offset + 3]);

        let recovered: Vec<ScanResult> = session
            .by_ref()
            .filter_map(CandidateOutcome::into_result)
            .collect();
        assert_eq!(recovered.len(), 1);
        assert_eq!(session.stats().peek_rejections, 1);
    }

    #[test]
    fn test_name_guided_discards_negative_offsets() {
        let data = b"NS.Foo and more".to_vec();
        let session = prefix_scanner(&["NS."]).session(&data).unwrap();
        assert!(session.is_empty());
    }

    #[test]
    fn test_scan_is_idempotent() {
        let (data, _) = sample_stream();
        let scanner = Scanner::new();
        assert_eq!(scanner.scan(&data).unwrap(), scanner.scan(&data).unwrap());
    }

    #[test]
    fn test_parent_marker_end_to_end() {
        let data = StreamBuilder::new()
            .class_with_members_and_types(
                1,
                "NS.Child",
                &[
                    ("Base+Derived", MemberSpec::Primitive(PrimitiveType::Int64)),
                    ("own", MemberSpec::String),
                ],
                2,
            )
            .build();

        let results = Scanner::new().scan(&data).unwrap();
        assert_eq!(results.len(), 1);

        let schema = &results[0].schema;
        let parent = schema.extends().unwrap();
        assert_eq!(parent.name(), "Base");
        assert_eq!(
            parent.members(),
            &[Member::field("Derived", TypeExpr::Named("Int64".to_string()))]
        );
        assert_eq!(
            schema.members(),
            &[Member::field("own", TypeExpr::Named("string".to_string()))]
        );
    }

    #[test]
    fn test_stray_discriminator_is_discarded() {
        let results = Scanner::new().scan(&[0x05]).unwrap();
        assert!(results.is_empty());

        let mut session = Scanner::new().session(&[0x05]).unwrap();
        assert!(matches!(
            session.next(),
            Some(CandidateOutcome::DecodeFailed { offset: 0, .. })
        ));
        assert_eq!(session.stats().decode_failures, 1);
    }

    #[test]
    fn test_bad_candidate_does_not_affect_later_ones() {
        let (sample, offset) = sample_stream();
        let mut data = vec![0x05, 0x01, 0x00];
        data.extend_from_slice(&sample);

        let mut session = Scanner::new().session(&data).unwrap();
        let outcomes: Vec<CandidateOutcome> = session.by_ref().collect();
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0], CandidateOutcome::DecodeFailed { .. }));
        match &outcomes[1] {
            CandidateOutcome::Recovered(result) => assert_eq!(result.offset(), offset + 3),
            other => panic!("expected a recovered class, got {:?}", other),
        }
    }

    #[test]
    fn test_build_failure_is_isolated() {
        let data = StreamBuilder::new()
            .class_with_members_and_types(
                1,
                "NS.Bad",
                &[("list", MemberSpec::system_class("List`2[[System.Int32]]"))],
                2,
            )
            .build();

        let mut session = Scanner::new().session(&data).unwrap();
        assert!(matches!(
            session.next(),
            Some(CandidateOutcome::BuildFailed { offset: 0, .. })
        ));
        assert_eq!(session.stats().build_failures, 1);
        assert!(Scanner::new().scan(&data).unwrap().is_empty());
    }

    #[test]
    fn test_deeply_nested_type_name_fails_one_candidate() {
        let levels = 1_000;
        let nested = format!("{}B{}", "A`1[[".repeat(levels), "]]".repeat(levels));
        let (sample, offset) = sample_stream();
        let data = StreamBuilder::new()
            .class_with_members_and_types(
                1,
                "NS.Evil",
                &[("nested", MemberSpec::system_class(&nested))],
                2,
            )
            .build();
        let prefix_len = data.len();
        let data = StreamBuilder::new().raw(&data).raw(&sample).build();

        let mut session = Scanner::new().session(&data).unwrap();
        let outcomes: Vec<CandidateOutcome> = session.by_ref().collect();
        assert!(matches!(
            outcomes.first(),
            Some(CandidateOutcome::BuildFailed {
                offset: 0,
                error: Error::InvalidTypeName { .. }
            })
        ));
        assert_eq!(session.stats().build_failures, 1);

        let recovered: Vec<usize> = outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                CandidateOutcome::Recovered(result) => Some(result.offset()),
                _ => None,
            })
            .collect();
        assert_eq!(recovered, vec![prefix_len + offset]);
    }

    #[test]
    fn test_max_results() {
        let data = StreamBuilder::new()
            .class_with_members_and_types(1, "NS.A", &[("a", MemberSpec::String)], 2)
            .class_with_members_and_types(2, "NS.B", &[("b", MemberSpec::String)], 2)
            .class_with_members_and_types(3, "NS.C", &[("c", MemberSpec::String)], 2)
            .build();

        assert_eq!(Scanner::new().scan(&data).unwrap().len(), 3);

        let limited = Scanner::with_config(ScannerConfig::new().max_results(2))
            .scan(&data)
            .unwrap();
        let names: Vec<&str> = limited.iter().map(|r| r.schema.name()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_require_header() {
        let (data, _) = sample_stream();
        let scanner = Scanner::with_config(ScannerConfig::new().require_header(true));
        assert_eq!(scanner.scan(&data).unwrap().len(), 1);

        let headerless = StreamBuilder::new()
            .class_with_members_and_types(1, "NS.Foo", &[("a", MemberSpec::String)], 2)
            .build();
        assert!(matches!(
            scanner.scan(&headerless),
            Err(Error::MissingHeader { .. })
        ));
        assert_eq!(Scanner::new().scan(&headerless).unwrap().len(), 1);

        let wrong_version = StreamBuilder::new().header(1, -1, 2, 0).build();
        assert!(matches!(
            scanner.scan(&wrong_version),
            Err(Error::MissingHeader { .. })
        ));
    }

    #[test]
    fn test_invalid_modes() {
        let scanner = Scanner::with_config(ScannerConfig::new().mode(ScanMode::Prefixes(vec![])));
        assert!(matches!(
            scanner.scan(b"data"),
            Err(Error::InvalidScanMode(_))
        ));

        assert!(matches!(
            prefix_scanner(&["NS.", ""]).scan(b"data"),
            Err(Error::InvalidScanMode(_))
        ));
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(
            Scanner::new().scan(&[]),
            Err(Error::EmptySearchInput { what: "haystack" })
        ));
    }

    #[test]
    fn test_progress_reports_every_candidate() {
        let (sample, _) = sample_stream();
        let mut data = vec![0x05];
        data.extend_from_slice(&sample);

        let mut calls = Vec::new();
        let results = Scanner::new()
            .scan_with_progress(&data, |index, total| calls.push((index, total)))
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(calls, vec![(0, 2), (1, 2), (2, 2)]);
    }

    #[test]
    fn test_custom_strategy() {
        struct Fixed(Vec<usize>);

        impl CandidateStrategy for Fixed {
            fn candidates(&self, _data: &[u8]) -> Result<Vec<usize>> {
                Ok(self.0.clone())
            }
        }

        let (data, offset) = sample_stream();
        let results: Vec<ScanResult> = Scanner::new()
            .session_with_strategy(&Fixed(vec![0, offset, data.len() + 10]), &data)
            .unwrap()
            .filter_map(CandidateOutcome::into_result)
            .collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].offset(), offset);
    }

    #[test]
    fn test_scan_file_missing() {
        let err = scan_file("/nonexistent/dredge/input.bin").unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
