//! Performance anti-pattern detection.
//!
//! Patterns are matched textually over each function's source span rather
//! than by walking the tree-sitter AST directly: the parser already hands
//! us precise spans, and the patterns below (loop bodies containing an
//! await, a string `+`, an expensive call, ...) are line-local enough that a
//! windowed text scan finds them reliably without a second AST pass per
//! language.

use crate::ids::{ObjectId, SymbolId};
use crate::state::CodeIndex;
use crate::types::SymbolKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AntiPattern {
    SequentialAwaits,
    AwaitInLoop,
    ExpensiveCallInLoop,
    NestedLoops,
    StringConcatInLoop,
    DeferInLoop,
    UnbufferedChannel,
    MapWithoutCapacity,
}

impl AntiPattern {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SequentialAwaits => "sequential-awaits",
            Self::AwaitInLoop => "await-in-loop",
            Self::ExpensiveCallInLoop => "expensive-call-in-loop",
            Self::NestedLoops => "nested-loops",
            Self::StringConcatInLoop => "string-concat-in-loop",
            Self::DeferInLoop => "defer-in-loop",
            Self::UnbufferedChannel => "unbuffered-channel",
            Self::MapWithoutCapacity => "map-without-capacity",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PerfFinding {
    pub pattern: AntiPattern,
    pub symbol: SymbolId,
    pub object_id: ObjectId,
    pub name: String,
    pub language: &'static str,
    pub detail: String,
}

const LOOP_KEYWORDS: &[&str] = &["for ", "for(", "while ", "while("];
const EXPENSIVE_CALLS: &[&str] = &["clone()", "collect()", ".to_vec()", "query(", "fetch("];

pub fn analyze(state: &CodeIndex) -> Vec<PerfFinding> {
    let mut findings = Vec::new();
    for entry in state.symbols.iter() {
        let def = entry.value();
        if !matches!(def.kind, SymbolKind::Function | SymbolKind::Method) {
            continue;
        }
        let Some(path) = state.path_for_file(def.id.file) else {
            continue;
        };
        let Some(contents) = state.file_contents.get(&path) else {
            continue;
        };
        let start = def.location.start_byte.min(contents.len());
        let end = def.location.end_byte.min(contents.len());
        if start >= end {
            continue;
        }
        let language = language_for(&path);
        let source = &contents[start..end];
        let name = state.resolve(def.name).to_string();

        for pattern in detect_patterns(source) {
            findings.push(PerfFinding {
                pattern,
                symbol: def.id,
                object_id: def.id.to_object_id(),
                name: name.clone(),
                language,
                detail: pattern.label().to_string(),
            });
        }
    }
    findings
}

fn language_for(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("rs") => "rust",
        Some("ts") | Some("mts") | Some("cts") => "typescript",
        Some("tsx") => "tsx",
        _ => "unknown",
    }
}

fn detect_patterns(source: &str) -> Vec<AntiPattern> {
    let mut found = Vec::new();

    if source.matches(".await").count() >= 3 && !has_loop(source) {
        found.push(AntiPattern::SequentialAwaits);
    }

    for body in loop_bodies(source) {
        if body.contains(".await") {
            found.push(AntiPattern::AwaitInLoop);
        }
        if EXPENSIVE_CALLS.iter().any(|c| body.contains(c)) {
            found.push(AntiPattern::ExpensiveCallInLoop);
        }
        if body.contains("+=") && (body.contains("String") || body.contains("format!")) {
            found.push(AntiPattern::StringConcatInLoop);
        }
        if body.contains("defer ") || body.contains("defer(") {
            found.push(AntiPattern::DeferInLoop);
        }
        if has_loop(body) {
            found.push(AntiPattern::NestedLoops);
        }
    }

    if source.contains("make(chan ") && !source.contains(", ") {
        found.push(AntiPattern::UnbufferedChannel);
    }
    if (source.contains("HashMap::new()") || source.contains("new Map()"))
        && !source.contains("with_capacity")
    {
        found.push(AntiPattern::MapWithoutCapacity);
    }

    found.dedup_by_key(|p| p.label());
    found
}

fn has_loop(source: &str) -> bool {
    LOOP_KEYWORDS.iter().any(|k| source.contains(k))
}

/// Best-effort extraction of loop bodies via brace matching after a loop
/// keyword. Not a real parser: nested loops inside the body are still
/// visible to the caller via a second `has_loop` check on the slice.
fn loop_bodies(source: &str) -> Vec<&str> {
    let mut bodies = Vec::new();
    let bytes = source.as_bytes();
    for keyword in LOOP_KEYWORDS {
        let mut search_from = 0;
        while let Some(rel) = source[search_from..].find(keyword) {
            let kw_start = search_from + rel;
            if let Some(open) = source[kw_start..].find('{') {
                let body_start = kw_start + open + 1;
                if let Some(end) = matching_brace(bytes, body_start) {
                    bodies.push(&source[body_start..end]);
                    search_from = end;
                    continue;
                }
            }
            search_from = kw_start + keyword.len();
        }
    }
    bodies
}

fn matching_brace(bytes: &[u8], open_pos: usize) -> Option<usize> {
    let mut depth = 1i32;
    let mut i = open_pos;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_await_in_loop() {
        let src = "fn f() { for x in xs { y(x).await; } }";
        assert!(detect_patterns(src).contains(&AntiPattern::AwaitInLoop));
    }

    #[test]
    fn detects_map_without_capacity() {
        let src = "fn f() { let m = HashMap::new(); m }";
        assert!(detect_patterns(src).contains(&AntiPattern::MapWithoutCapacity));
    }

    #[test]
    fn sequential_awaits_outside_loop() {
        let src = "async fn f() { a().await; b().await; c().await; }";
        assert!(detect_patterns(src).contains(&AntiPattern::SequentialAwaits));
    }
}
