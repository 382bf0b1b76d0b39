//! Trigram index: fast candidate-file generation for the Search Coordinator.
//!
//! Every file is broken into overlapping 3-byte windows over its lowercased
//! contents. A pattern of length >= 3 is broken the same way, and the
//! candidate file set is the intersection of the posting lists for each of
//! the pattern's trigrams — a standard trigram-index narrowing step, applied
//! here over files rather than over line-level postings since exact match
//! positions are re-derived by the Search Coordinator's verification pass.
//!
//! Structurally this plays the role the inverted index played for BM25
//! scoring: a `DashMap`-backed posting list keyed by token, except the token
//! is a 3-byte shingle instead of a whole word.

use crate::ids::FileId;
use dashmap::{DashMap, DashSet};

pub type Trigram = [u8; 3];

/// Posting-list index from trigram to the set of files containing it.
pub struct TrigramIndex {
    postings: DashMap<Trigram, DashSet<FileId>>,
    /// Reverse map so `remove_file` doesn't have to scan every posting list.
    file_trigrams: DashMap<FileId, Vec<Trigram>>,
}

impl TrigramIndex {
    pub fn new() -> Self {
        Self {
            postings: DashMap::new(),
            file_trigrams: DashMap::new(),
        }
    }

    /// (Re)index a file's contents, replacing any previous entry for it.
    pub fn index_file(&self, file: FileId, contents: &str) {
        self.remove_file(file);
        let trigrams = trigrams_of(contents);
        for &t in &trigrams {
            self.postings.entry(t).or_default().insert(file);
        }
        if !trigrams.is_empty() {
            self.file_trigrams.insert(file, trigrams);
        }
    }

    pub fn remove_file(&self, file: FileId) {
        if let Some((_, trigrams)) = self.file_trigrams.remove(&file) {
            for t in trigrams {
                if let Some(set) = self.postings.get(&t) {
                    set.remove(&file);
                }
            }
        }
    }

    /// Candidate files for a pattern. Returns `None` when the pattern is
    /// too short to shingle (< 3 bytes) — the caller should fall back to
    /// scanning every indexed file in that case.
    pub fn candidates(&self, pattern: &str) -> Option<Vec<FileId>> {
        let query_trigrams = trigrams_of(pattern);
        if query_trigrams.is_empty() {
            return None;
        }

        let mut sets: Vec<Vec<FileId>> = Vec::with_capacity(query_trigrams.len());
        for t in &query_trigrams {
            match self.postings.get(t) {
                Some(set) => {
                    let mut v: Vec<FileId> = set.iter().map(|r| *r).collect();
                    v.sort();
                    sets.push(v);
                }
                None => return Some(Vec::new()), // a required trigram is absent anywhere
            }
        }

        sets.sort_by_key(|v| v.len());
        let mut acc = sets.remove(0);
        for s in sets {
            acc.retain(|f| s.binary_search(f).is_ok());
            if acc.is_empty() {
                break;
            }
        }
        Some(acc)
    }

    pub fn is_empty(&self) -> bool {
        self.file_trigrams.is_empty()
    }
}

impl Default for TrigramIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn trigrams_of(text: &str) -> Vec<Trigram> {
    let lower = text.to_lowercase();
    let bytes = lower.as_bytes();
    if bytes.len() < 3 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(bytes.len() - 2);
    let mut seen = std::collections::HashSet::new();
    for w in bytes.windows(3) {
        let t: Trigram = [w[0], w[1], w[2]];
        if seen.insert(t) {
            out.push(t);
        }
    }
    out
}
