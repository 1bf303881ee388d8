//! Multi-occurrence byte pattern search.
//!
//! A Boyer-Moore matcher that reports every starting offset of a needle in a
//! haystack, left to right, overlapping matches included. Two skip tables are
//! built once per needle:
//!
//! - a bad-character table covering the full byte alphabet, holding the last
//!   position of each byte inside the needle
//! - a strong good-suffix table derived from the needle's borders
//!
//! On a mismatch the window advances by the larger of the two shifts; after a
//! full match it advances by the needle's period, which keeps overlapping
//! occurrences visible.

use crate::error::{Error, Result};

/// Precomputed Boyer-Moore matcher for a single needle
#[derive(Debug, Clone)]
pub struct BoyerMoore {
    needle: Vec<u8>,
    /// Last index of each byte value in the needle, -1 when absent
    last_occurrence: [isize; 256],
    /// Good-suffix shift for a mismatch at needle index `j - 1`, stored at `j`.
    /// Index 0 holds the shift applied after a full match.
    good_suffix: Vec<usize>,
}

impl BoyerMoore {
    /// Builds the skip tables for `needle`
    pub fn new(needle: &[u8]) -> Result<Self> {
        if needle.is_empty() {
            return Err(Error::EmptySearchInput { what: "needle" });
        }

        let mut last_occurrence = [-1isize; 256];
        for (i, &byte) in needle.iter().enumerate() {
            last_occurrence[byte as usize] = i as isize;
        }

        Ok(Self {
            needle: needle.to_vec(),
            last_occurrence,
            good_suffix: good_suffix_table(needle),
        })
    }

    /// Returns the needle this matcher searches for
    pub fn needle(&self) -> &[u8] {
        &self.needle
    }

    /// Finds every occurrence of the needle in `haystack`
    ///
    /// With `limit = Some(n)` the search stops as soon as more than `n`
    /// matches have been collected, so the result holds at most `n + 1`
    /// offsets. The bound only exists to keep single-byte searches over large
    /// inputs from exhausting memory.
    pub fn find_all(&self, haystack: &[u8], limit: Option<usize>) -> Result<Vec<usize>> {
        if haystack.is_empty() {
            return Err(Error::EmptySearchInput { what: "haystack" });
        }

        let m = self.needle.len();
        let n = haystack.len();
        let mut offsets = Vec::new();
        if m > n {
            return Ok(offsets);
        }

        let mut s = 0;
        while s <= n - m {
            let mut j = m;
            while j > 0 && self.needle[j - 1] == haystack[s + j - 1] {
                j -= 1;
            }

            if j == 0 {
                offsets.push(s);
                if limit.is_some_and(|limit| offsets.len() > limit) {
                    break;
                }
                s += self.good_suffix[0];
            } else {
                let mismatch = j - 1;
                let last = self.last_occurrence[haystack[s + mismatch] as usize];
                let bad_char = (mismatch as isize - last).max(1) as usize;
                s += self.good_suffix[j].max(bad_char);
            }
        }

        Ok(offsets)
    }
}

/// Strong good-suffix table built from the border positions of the needle
fn good_suffix_table(needle: &[u8]) -> Vec<usize> {
    let m = needle.len();
    let mut shift = vec![0usize; m + 1];
    let mut border = vec![0usize; m + 1];

    // Case 1: the matched suffix occurs elsewhere in the needle
    let mut i = m;
    let mut j = m + 1;
    border[i] = j;
    while i > 0 {
        while j <= m && needle[i - 1] != needle[j - 1] {
            if shift[j] == 0 {
                shift[j] = j - i;
            }
            j = border[j];
        }
        i -= 1;
        j -= 1;
        border[i] = j;
    }

    // Case 2: only a prefix of the needle matches part of the suffix
    let mut j = border[0];
    for i in 0..=m {
        if shift[i] == 0 {
            shift[i] = j;
        }
        if i == j {
            j = border[j];
        }
    }

    shift
}

/// Finds every occurrence of `needle` in `haystack`
///
/// Convenience wrapper around [`BoyerMoore`] for one-off searches.
pub fn find_all(haystack: &[u8], needle: &[u8], limit: Option<usize>) -> Result<Vec<usize>> {
    BoyerMoore::new(needle)?.find_all(haystack, limit)
}
