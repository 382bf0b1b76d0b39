//! Search Coordinator: pattern search over the indexed workspace.
//!
//! Candidate generation narrows to a small file set via the trigram index
//! (falling back to a full scan when the pattern is too short to shingle or
//! is a regex with no extractable literal), then every candidate line is
//! checked against the concrete predicate (regex, word boundary, case,
//! invert). Hits inside a known symbol scope are attached to that symbol and
//! scored with [`crate::scoring`]; the rest are returned unscored.

use crate::errors::ToolError;
use crate::ids::{FileId, SymbolId};
use crate::scoring::{ScorerConfig, score_candidate};
use crate::state::CodeIndex;
use regex::{Regex, RegexBuilder};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub case_insensitive: bool,
    pub regex: bool,
    pub word_boundary: bool,
    pub invert: bool,
    pub files_only: bool,
    pub count_only: bool,
    pub max_per_file: usize,
    pub max_results: usize,
    pub symbol_kind: Option<crate::types::SymbolKind>,
    pub exclude_tests: bool,
    pub exclude_comments: bool,
    pub glob: Option<String>,
    pub language: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            regex: false,
            word_boundary: false,
            invert: false,
            files_only: false,
            count_only: false,
            max_per_file: 50,
            max_results: 200,
            symbol_kind: None,
            exclude_tests: false,
            exclude_comments: false,
            glob: None,
            language: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub text: String,
    pub symbol: Option<SymbolId>,
    pub semantic_score: f32,
}

#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Hits(Vec<SearchHit>),
    Files(Vec<PathBuf>),
    Count(usize),
}

/// Run a pattern search per the documented 6-step algorithm. Returns
/// `ValidationError` for an empty pattern or a malformed regex.
pub fn search(
    state: &CodeIndex,
    pattern: &str,
    options: &SearchOptions,
) -> Result<SearchOutcome, ToolError> {
    if pattern.is_empty() {
        return Err(ToolError::validation_coded(
            "search pattern must not be empty",
            "pattern",
            "VALIDATION/REQUIRED",
        ));
    }

    let matcher = Matcher::new(pattern, options).map_err(|e| {
        ToolError::validation_coded(format!("invalid regex: {e}"), "pattern", "VALIDATION/REGEX")
    })?;

    let candidate_files = candidate_files(state, pattern, options);

    let mut hits = Vec::new();
    let mut per_file_counts: std::collections::HashMap<FileId, usize> =
        std::collections::HashMap::new();
    let mut total = 0usize;

    'files: for (file_id, path) in candidate_files {
        if let Some(glob) = &options.glob {
            if !glob_matches(glob, &path) {
                continue;
            }
        }
        if let Some(lang) = &options.language {
            if path.extension().and_then(|e| e.to_str()) != Some(lang.as_str()) {
                continue;
            }
        }
        if options.exclude_tests && looks_like_test_path(&path) {
            continue;
        }

        let Some(contents) = state.file_contents.get(&path) else {
            continue;
        };

        for (line_idx, line) in contents.lines().enumerate() {
            if !matcher.is_match(line) {
                continue;
            }
            let per_file = per_file_counts.entry(file_id).or_insert(0);
            if *per_file >= options.max_per_file {
                continue 'files;
            }
            *per_file += 1;
            total += 1;

            if options.files_only || options.count_only {
                continue;
            }

            let column = matcher.match_column(line).unwrap_or(0);
            let symbol = enclosing_symbol(state, file_id, line_idx);
            let semantic_score = symbol
                .and_then(|s| state.get_symbol(s))
                .and_then(|def| {
                    let name = state.resolve(def.name).to_string();
                    score_candidate(pattern, &name, Some(path.to_string_lossy().as_ref()), &[], &ScorerConfig::default())
                })
                .map(|m| m.score)
                .unwrap_or(0.0);

            hits.push(SearchHit {
                file: path.clone(),
                line: line_idx + 1,
                column,
                text: line.to_string(),
                symbol,
                semantic_score,
            });

            if hits.len() >= options.max_results {
                break 'files;
            }
        }
    }

    if options.count_only {
        return Ok(SearchOutcome::Count(total));
    }
    if options.files_only {
        let mut files: Vec<PathBuf> = per_file_counts
            .keys()
            .filter_map(|f| state.path_for_file(*f))
            .collect();
        files.sort();
        return Ok(SearchOutcome::Files(files));
    }

    hits.sort_by(|a, b| {
        b.semantic_score
            .partial_cmp(&a.semantic_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.line.cmp(&b.line))
            .then(a.column.cmp(&b.column))
    });
    hits.truncate(options.max_results);

    Ok(SearchOutcome::Hits(hits))
}

fn candidate_files(
    state: &CodeIndex,
    pattern: &str,
    options: &SearchOptions,
) -> Vec<(FileId, PathBuf)> {
    let literal = if options.regex {
        extract_literal(pattern)
    } else {
        Some(pattern.to_string())
    };

    let narrowed = literal.and_then(|lit| state.trigram.read().candidates(&lit));

    match narrowed {
        Some(files) => files
            .into_iter()
            .filter_map(|f| state.path_for_file(f).map(|p| (f, p)))
            .collect(),
        None => state
            .file_ids
            .iter()
            .map(|e| (*e.value(), e.key().clone()))
            .collect(),
    }
}

/// Pull the longest literal run of >=3 chars out of a regex pattern, as a
/// trigram-index probe. Best-effort: not a full regex-literal extractor.
fn extract_literal(pattern: &str) -> Option<String> {
    let mut best = String::new();
    let mut current = String::new();
    for c in pattern.chars() {
        if c.is_alphanumeric() || c == '_' {
            current.push(c);
        } else {
            if current.len() > best.len() {
                best = std::mem::take(&mut current);
            } else {
                current.clear();
            }
        }
    }
    if current.len() > best.len() {
        best = current;
    }
    if best.len() >= 3 { Some(best) } else { None }
}

fn looks_like_test_path(path: &std::path::Path) -> bool {
    let s = path.to_string_lossy();
    s.contains("/tests/") || s.contains("test_") || s.ends_with("_test.rs") || s.contains("/__tests__/")
}

pub(crate) fn glob_matches(pattern: &str, path: &std::path::Path) -> bool {
    let s = path.to_string_lossy();
    if let Some(suffix) = pattern.strip_prefix('*') {
        return s.ends_with(suffix);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return s.starts_with(prefix);
    }
    s.contains(pattern)
}

/// Find the innermost symbol in `file` whose location spans `line` (0-based).
fn enclosing_symbol(state: &CodeIndex, file: FileId, line: usize) -> Option<SymbolId> {
    let ids = state.file_symbols.get(&file)?;
    let mut best: Option<(SymbolId, usize)> = None;
    for id in ids.iter() {
        let Some(def) = state.symbols.get(id) else {
            continue;
        };
        let start = def.location.start_line.saturating_sub(1);
        let end = def.location.end_line.saturating_sub(1);
        if start <= line && line <= end {
            let span = end - start;
            if best.map(|(_, best_span)| span < best_span).unwrap_or(true) {
                best = Some((*id, span));
            }
        }
    }
    best.map(|(id, _)| id)
}

struct Matcher {
    regex: Regex,
    invert: bool,
    word_boundary: bool,
}

impl Matcher {
    fn new(pattern: &str, options: &SearchOptions) -> Result<Self, regex::Error> {
        let body = if options.regex {
            pattern.to_string()
        } else {
            regex::escape(pattern)
        };
        let body = if options.word_boundary {
            format!(r"\b(?:{body})\b")
        } else {
            body
        };
        let regex = RegexBuilder::new(&body)
            .case_insensitive(options.case_insensitive)
            .build()?;
        Ok(Self {
            regex,
            invert: options.invert,
            word_boundary: options.word_boundary,
        })
    }

    fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line) != self.invert
    }

    fn match_column(&self, line: &str) -> Option<usize> {
        let _ = self.word_boundary;
        self.regex.find(line).map(|m| m.start() + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::LocalSymbolId;
    use crate::types::*;
    use std::path::PathBuf;

    fn setup() -> CodeIndex {
        let state = CodeIndex::new(PathBuf::from("/repo"));
        let file = state.get_or_create_file_id(&PathBuf::from("/repo/a.rs"));
        let contents = "fn parse_request() {\n    do_work();\n}\n";
        state
            .file_contents
            .insert(PathBuf::from("/repo/a.rs"), contents.into());
        state.trigram.write().index_file(file, contents);

        let name = state.intern("parse_request");
        let scoped = state.intern("crate::parse_request");
        let id = SymbolId::new(file, LocalSymbolId(1));
        state.publish_file(
            file,
            vec![SymbolDef {
                id,
                name,
                scoped_name: scoped,
                kind: SymbolKind::Function,
                location: Location::new(PathBuf::from("/repo/a.rs"), 0, 10)
                    .with_positions(1, 1, 3, 2),
                signature: None,
                visibility: Visibility::Public,
                attributes: Vec::new(),
                doc_comment: None,
                parent: None,
            }],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        state
    }

    #[test]
    fn finds_literal_and_attaches_symbol() {
        let state = setup();
        let outcome = search(&state, "parse_request", &SearchOptions::default()).unwrap();
        match outcome {
            SearchOutcome::Hits(hits) => {
                assert_eq!(hits.len(), 1);
                assert!(hits[0].symbol.is_some());
            }
            _ => panic!("expected hits"),
        }
    }

    #[test]
    fn empty_pattern_is_validation_error() {
        let state = setup();
        let err = search(&state, "", &SearchOptions::default()).unwrap_err();
        assert_eq!(err.code(), "VALIDATION/REQUIRED");
    }

    #[test]
    fn invalid_regex_is_validation_error() {
        let state = setup();
        let options = SearchOptions {
            regex: true,
            ..Default::default()
        };
        let err = search(&state, "(unclosed", &options).unwrap_err();
        assert_eq!(err.code(), "VALIDATION/REGEX");
    }

    #[test]
    fn count_only_skips_symbol_lookup() {
        let state = setup();
        let options = SearchOptions {
            count_only: true,
            ..Default::default()
        };
        match search(&state, "fn", &options).unwrap() {
            SearchOutcome::Count(n) => assert!(n >= 1),
            _ => panic!("expected count"),
        }
    }
}
