//! The Semantic Scorer: a layered, pure-function ranking model for search
//! candidates.
//!
//! Each layer is tried in order of precedence (exact match outranks a fuzzy
//! one); the first layer to fire determines the match and its score is
//! scaled by that layer's weight, so an exact hit always outranks a fuzzy
//! one regardless of the fuzzy layer's raw similarity. A candidate that no
//! layer accepts returns `None` from [`score_candidate`] and is dropped by
//! the caller.
//!
//! The tokenizer helpers (`tokenize`, `split_identifier`, `path_tokens`,
//! `extract_identifiers`) are carried over from the field-weighted inverted
//! index this replaced: case-transition/underscore/digit splitting is
//! exactly what the name-split layer needs, unchanged.

use std::collections::HashMap;
use strsim::jaro_winkler;

/// One scored layer in the precedence chain, in the order they're tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreLayer {
    Exact,
    Substring,
    Annotation,
    NameSplit,
    Stemming,
    Abbreviation,
    Fuzzy,
}

/// Weights applied to each layer's raw [0,1] score so that layers earlier in
/// the precedence chain always outrank later ones even at their own maximum
/// score. Configuration rather than a hardcoded match, so a caller can retune
/// the chain's ordering without touching this module.
fn default_layer_weights() -> HashMap<ScoreLayer, f32> {
    HashMap::from([
        (ScoreLayer::Exact, 1.0),
        (ScoreLayer::Substring, 0.85),
        (ScoreLayer::Annotation, 0.75),
        (ScoreLayer::NameSplit, 0.65),
        (ScoreLayer::Stemming, 0.5),
        (ScoreLayer::Abbreviation, 0.45),
        (ScoreLayer::Fuzzy, 0.35),
    ])
}

/// Result of scoring one candidate against a query.
#[derive(Debug, Clone)]
pub struct ScoredMatch {
    pub layer: ScoreLayer,
    pub raw_score: f32,
    pub score: f32,
}

/// Configuration for the scorer: the minimum fuzzy similarity below which
/// the fuzzy layer doesn't fire at all, the abbreviation expansion table, and
/// the per-layer weight table applied in [`finalize`].
#[derive(Debug, Clone)]
pub struct ScorerConfig {
    pub fuzzy_threshold: f32,
    pub abbreviations: Vec<(&'static str, &'static str)>,
    pub layer_weights: HashMap<ScoreLayer, f32>,
}

impl ScorerConfig {
    /// Weight for a layer, falling back to 1.0 (no scaling) for a layer
    /// missing from `layer_weights`.
    fn weight(&self, layer: ScoreLayer) -> f32 {
        self.layer_weights.get(&layer).copied().unwrap_or(1.0)
    }
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.8,
            abbreviations: default_abbreviations(),
            layer_weights: default_layer_weights(),
        }
    }
}

fn default_abbreviations() -> Vec<(&'static str, &'static str)> {
    vec![
        ("auth", "authentication"),
        ("authz", "authorization"),
        ("db", "database"),
        ("cfg", "config"),
        ("config", "configuration"),
        ("ctx", "context"),
        ("req", "request"),
        ("res", "response"),
        ("resp", "response"),
        ("err", "error"),
        ("msg", "message"),
        ("env", "environment"),
        ("repo", "repository"),
        ("impl", "implementation"),
        ("addr", "address"),
        ("conn", "connection"),
        ("init", "initialize"),
        ("len", "length"),
        ("idx", "index"),
        ("id", "identifier"),
        ("arg", "argument"),
        ("param", "parameter"),
        ("fn", "function"),
        ("util", "utility"),
        ("cmd", "command"),
    ]
}

/// Score a candidate name/path against a query, optionally considering a set
/// of annotation label strings attached to the candidate's symbol. Returns
/// `None` if no layer accepts the candidate at all.
pub fn score_candidate(
    query: &str,
    candidate_name: &str,
    candidate_path: Option<&str>,
    annotation_labels: &[String],
    config: &ScorerConfig,
) -> Option<ScoredMatch> {
    let query_lower = query.to_lowercase();
    let name_lower = candidate_name.to_lowercase();

    if query_lower == name_lower {
        return Some(finalize(ScoreLayer::Exact, 1.0, config));
    }

    if name_lower.contains(&query_lower) {
        let ratio = query_lower.len() as f32 / name_lower.len().max(1) as f32;
        return Some(finalize(ScoreLayer::Substring, ratio.clamp(0.3, 1.0), config));
    }

    if annotation_labels
        .iter()
        .any(|l| l.to_lowercase() == query_lower)
    {
        return Some(finalize(ScoreLayer::Annotation, 1.0, config));
    }

    let query_tokens: Vec<String> = split_identifier(&query_lower)
        .into_iter()
        .map(|s| s.to_lowercase())
        .collect();
    let name_tokens: Vec<String> = split_identifier(candidate_name)
        .into_iter()
        .map(|s| s.to_lowercase())
        .collect();

    if let Some(score) = token_overlap(&query_tokens, &name_tokens) {
        return Some(finalize(ScoreLayer::NameSplit, score, config));
    }

    let stemmed_query: Vec<String> = query_tokens.iter().map(|t| stem(t)).collect();
    let stemmed_name: Vec<String> = name_tokens.iter().map(|t| stem(t)).collect();
    if let Some(score) = token_overlap(&stemmed_query, &stemmed_name) {
        return Some(finalize(ScoreLayer::Stemming, score, config));
    }

    if let Some(score) = abbreviation_overlap(&query_tokens, &name_tokens, &config.abbreviations) {
        return Some(finalize(ScoreLayer::Abbreviation, score, config));
    }

    if let Some(path) = candidate_path {
        let path_score = path_tokens(std::path::Path::new(path))
            .iter()
            .map(|t| jaro_winkler(&query_lower, t) as f32)
            .fold(0.0f32, f32::max);
        if path_score >= config.fuzzy_threshold {
            return Some(finalize(ScoreLayer::Fuzzy, path_score, config));
        }
    }

    let fuzzy = jaro_winkler(&query_lower, &name_lower) as f32;
    if fuzzy >= config.fuzzy_threshold {
        return Some(finalize(ScoreLayer::Fuzzy, fuzzy, config));
    }

    None
}

fn finalize(layer: ScoreLayer, raw_score: f32, config: &ScorerConfig) -> ScoredMatch {
    ScoredMatch {
        layer,
        raw_score,
        score: raw_score * config.weight(layer),
    }
}

fn token_overlap(query: &[String], candidate: &[String]) -> Option<f32> {
    if query.is_empty() || candidate.is_empty() {
        return None;
    }
    let matched = query.iter().filter(|q| candidate.contains(q)).count();
    if matched == 0 {
        return None;
    }
    Some(matched as f32 / query.len() as f32)
}

fn abbreviation_overlap(
    query: &[String],
    candidate: &[String],
    table: &[(&'static str, &'static str)],
) -> Option<f32> {
    let expand = |tok: &str| -> Vec<String> {
        let mut out = vec![tok.to_string()];
        for (short, long) in table {
            if tok == *short {
                out.push(long.to_string());
            } else if tok == *long {
                out.push(short.to_string());
            }
        }
        out
    };

    if query.is_empty() || candidate.is_empty() {
        return None;
    }
    let matched = query
        .iter()
        .filter(|q| {
            let expansions = expand(q);
            candidate.iter().any(|c| expansions.contains(c))
        })
        .count();
    if matched == 0 {
        return None;
    }
    Some(matched as f32 / query.len() as f32 * 0.9)
}

/// A deliberately small suffix stripper, not a full Porter/Snowball
/// implementation: it covers the handful of English inflections common in
/// code identifiers (plurals, -ing/-ed verb forms) without a stemmer
/// dependency none of the example repos carry.
fn stem(token: &str) -> String {
    for suffix in ["ing", "ies", "ied", "es", "ed", "ly", "s"] {
        if let Some(stripped) = token.strip_suffix(suffix) {
            if stripped.len() >= 3 {
                return stripped.to_string();
            }
        }
    }
    token.to_string()
}

// ============================================================================
// Tokenizer helpers, carried over from the field-weighted index
// ============================================================================

/// Tokenize text into identifier-ish pieces, then split each on case
/// transitions / underscores / digits.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|s| !s.is_empty())
        .flat_map(split_identifier)
}

/// Split one identifier on `_` boundaries and lower-to-upper case
/// transitions (`fooBar` -> `foo`, `Bar`, `fooBar`; `foo_bar` -> `foo`,
/// `bar`). The whole identifier is appended last when it was actually split,
/// so an exact match against the untouched name still works.
pub fn split_identifier(s: &str) -> Vec<&str> {
    if s.is_empty() {
        return Vec::new();
    }
    let mut tokens = Vec::new();
    let bytes = s.as_bytes();
    let mut start = 0;
    for i in 1..bytes.len() {
        let prev = bytes[i - 1] as char;
        let curr = bytes[i] as char;
        let boundary = curr == '_' || (prev.is_ascii_lowercase() && curr.is_ascii_uppercase());
        if boundary {
            if start < i && bytes[start] != b'_' {
                tokens.push(&s[start..i]);
            }
            start = if curr == '_' { i + 1 } else { i };
        }
    }
    if start < s.len() && bytes[start] != b'_' {
        tokens.push(&s[start..]);
    }
    if tokens.len() > 1 {
        tokens.push(s);
    }
    tokens
}

/// Tokenize a path's components (minus extensions) the same way identifiers
/// are tokenized.
pub fn path_tokens(path: &std::path::Path) -> Vec<String> {
    path.iter()
        .filter_map(|c| c.to_str())
        .flat_map(|s| {
            let base = s.rsplit_once('.').map(|(a, _)| a).unwrap_or(s);
            tokenize(base).map(|t| t.to_lowercase()).collect::<Vec<_>>()
        })
        .collect()
}

/// Extract identifier-like tokens from a blob of code, dropping pure-digit
/// tokens and single characters.
pub fn extract_identifiers(code: &str) -> Vec<&str> {
    tokenize(code)
        .filter(|s| s.len() >= 2 && !s.chars().all(|c| c.is_ascii_digit()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_beats_fuzzy() {
        let cfg = ScorerConfig::default();
        let m = score_candidate("parseRequest", "parseRequest", None, &[], &cfg).unwrap();
        assert_eq!(m.layer, ScoreLayer::Exact);
        assert_eq!(m.score, 1.0);
    }

    #[test]
    fn name_split_matches_token() {
        let cfg = ScorerConfig::default();
        let m = score_candidate("parse", "parse_request", None, &[], &cfg).unwrap();
        assert_eq!(m.layer, ScoreLayer::NameSplit);
    }

    #[test]
    fn abbreviation_expands() {
        let cfg = ScorerConfig::default();
        let m = score_candidate("auth_check", "authentication_check", None, &[], &cfg).unwrap();
        assert!(matches!(
            m.layer,
            ScoreLayer::NameSplit | ScoreLayer::Abbreviation
        ));
    }

    #[test]
    fn split_identifier_handles_snake_and_camel() {
        assert_eq!(split_identifier("foo_bar"), vec!["foo", "bar", "foo_bar"]);
        assert_eq!(split_identifier("fooBar"), vec!["foo", "Bar", "fooBar"]);
        assert_eq!(split_identifier("plain"), vec!["plain"]);
    }

    #[test]
    fn no_layer_fires_for_unrelated_terms() {
        let cfg = ScorerConfig::default();
        assert!(score_candidate("zzzzzz", "completely_different", None, &[], &cfg).is_none());
    }
}
