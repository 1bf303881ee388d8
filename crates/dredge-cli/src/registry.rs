//! Duplicate and conflict tracking for emitted declarations.

use clap::ValueEnum;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Strategy for resolving naming conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ConflictStrategy {
    /// Append a short content hash: Name~a1b2c3d4.cs
    HashSuffix,
    /// Append the input file name: Name~from-input.cs
    SourceSuffix,
    /// Skip conflicting classes (keep first occurrence only)
    SkipConflicts,
}

/// Tracks emitted declarations for deduplication
///
/// The same class is usually recovered many times: once per serialized
/// instance, once per input file, and once per child for a shared parent.
#[derive(Debug, Default)]
pub(crate) struct ClassRegistry {
    /// Maps relative path -> (content_hash, resolved relative path)
    seen: HashMap<PathBuf, Vec<(String, PathBuf)>>,
    pub(crate) stats: RegistryStats,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RegistryStats {
    pub(crate) total_found: usize,
    pub(crate) duplicates_skipped: usize,
    pub(crate) conflicts_renamed: usize,
    pub(crate) written: usize,
    pub(crate) kept_existing: usize,
}

impl ClassRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Compute a short hash of the content (first 8 chars of blake3)
    pub(crate) fn content_hash(content: &str) -> String {
        let hash = blake3::hash(content.as_bytes());
        hash.to_hex()[..8].to_string()
    }

    fn is_duplicate(&self, path: &Path, content_hash: &str) -> bool {
        self.seen
            .get(path)
            .map(|entries| entries.iter().any(|(h, _)| h == content_hash))
            .unwrap_or(false)
    }

    fn variant_count(&self, path: &Path) -> usize {
        self.seen.get(path).map(|e| e.len()).unwrap_or(0)
    }

    /// Register a declaration and return the relative path to write it to
    ///
    /// Returns `None` when the declaration must not be written: identical
    /// content was already registered, or the path conflicts and the
    /// strategy says to skip.
    pub(crate) fn register(
        &mut self,
        path: &Path,
        content_hash: &str,
        source: Option<&Path>,
        strategy: ConflictStrategy,
    ) -> Option<PathBuf> {
        self.stats.total_found += 1;

        if self.is_duplicate(path, content_hash) {
            debug!("Skipping duplicate: {} (hash: {})", path.display(), content_hash);
            self.stats.duplicates_skipped += 1;
            return None;
        }

        let resolved = if self.variant_count(path) == 0 {
            path.to_path_buf()
        } else {
            match strategy {
                ConflictStrategy::SkipConflicts => {
                    debug!(
                        "Skipping conflict: {} (different content, hash: {})",
                        path.display(),
                        content_hash
                    );
                    self.stats.duplicates_skipped += 1;
                    return None;
                }
                ConflictStrategy::HashSuffix => {
                    let renamed = Self::add_suffix(path, &format!("~{}", content_hash));
                    info!(
                        "Conflict resolved: {} -> {} (content differs)",
                        path.display(),
                        renamed.display()
                    );
                    self.stats.conflicts_renamed += 1;
                    renamed
                }
                ConflictStrategy::SourceSuffix => {
                    let source_name = source
                        .and_then(|p| p.file_stem())
                        .and_then(|s| s.to_str())
                        .unwrap_or("unknown");
                    let renamed = Self::add_suffix(path, &format!("~from-{}", source_name));
                    info!(
                        "Conflict resolved: {} -> {} (from {})",
                        path.display(),
                        renamed.display(),
                        source_name
                    );
                    self.stats.conflicts_renamed += 1;
                    renamed
                }
            }
        };

        self.seen
            .entry(path.to_path_buf())
            .or_default()
            .push((content_hash.to_string(), resolved.clone()));

        Some(resolved)
    }

    /// Add a suffix before the file extension
    pub(crate) fn add_suffix(path: &Path, suffix: &str) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = match path.extension() {
            Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
            None => format!("{}{}", stem, suffix),
        };
        path.with_file_name(file_name)
    }

    pub(crate) fn print_summary(&self) {
        info!(
            "Summary: {} found, {} duplicates skipped, {} conflicts renamed, {} written, {} kept",
            self.stats.total_found,
            self.stats.duplicates_skipped,
            self.stats.conflicts_renamed,
            self.stats.written,
            self.stats.kept_existing
        );
    }
}
