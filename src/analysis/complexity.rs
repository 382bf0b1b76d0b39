//! Cyclomatic complexity estimation and distribution reporting.
//!
//! Complexity is approximated textually over a symbol's source span rather
//! than from a language-specific control-flow graph: one point for the
//! symbol itself, plus one for every branching keyword/operator found in its
//! body. This undercounts some constructs (e.g. Rust's `?` is not counted)
//! but tracks closely enough with true CC to rank and bucket functions.

use crate::ids::{ObjectId, SymbolId};
use crate::state::CodeIndex;
use crate::types::SymbolKind;

const BRANCH_MARKERS: &[&str] = &[
    "if ", "if(", "else if", "for ", "for(", "while ", "while(", "match ", "=>", "&&", "||",
    "catch", "case ", "elif ",
];

/// Estimate cyclomatic complexity of one symbol's source text.
pub fn estimate_complexity(source: &str) -> u32 {
    let mut cc = 1u32;
    for marker in BRANCH_MARKERS {
        cc += source.matches(marker).count() as u32;
    }
    cc
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplexityBand {
    Low,
    Medium,
    High,
}

impl ComplexityBand {
    pub fn of(cc: u32) -> Self {
        if cc <= 10 {
            Self::Low
        } else if cc <= 20 {
            Self::Medium
        } else {
            Self::High
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComplexityEntry {
    pub symbol: SymbolId,
    pub object_id: ObjectId,
    pub name: String,
    pub cc: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ComplexityDistribution {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

#[derive(Debug, Clone)]
pub struct ComplexityReport {
    pub average: f64,
    pub median: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub distribution: ComplexityDistribution,
    pub top: Vec<ComplexityEntry>,
}

/// Compute per-symbol CC for every function/method in the index, then
/// summarize into averages, percentiles, a distribution, and a top-N list.
pub fn analyze(state: &CodeIndex, top_n: usize) -> ComplexityReport {
    let mut entries = per_symbol_complexity(state);
    entries.sort_by(|a, b| b.cc.cmp(&a.cc));

    let mut ccs: Vec<u32> = entries.iter().map(|e| e.cc).collect();
    ccs.sort_unstable();

    let average = if ccs.is_empty() {
        0.0
    } else {
        ccs.iter().sum::<u32>() as f64 / ccs.len() as f64
    };

    let percentile = |p: f64| -> f64 {
        if ccs.is_empty() {
            return 0.0;
        }
        let idx = ((p / 100.0) * (ccs.len() - 1) as f64).round() as usize;
        ccs[idx.min(ccs.len() - 1)] as f64
    };

    let mut distribution = ComplexityDistribution::default();
    for cc in &ccs {
        match ComplexityBand::of(*cc) {
            ComplexityBand::Low => distribution.low += 1,
            ComplexityBand::Medium => distribution.medium += 1,
            ComplexityBand::High => distribution.high += 1,
        }
    }

    ComplexityReport {
        average,
        median: percentile(50.0),
        p50: percentile(50.0),
        p75: percentile(75.0),
        p90: percentile(90.0),
        distribution,
        top: entries.into_iter().take(top_n).collect(),
    }
}

pub fn per_symbol_complexity(state: &CodeIndex) -> Vec<ComplexityEntry> {
    let mut entries = Vec::new();
    for entry in state.symbols.iter() {
        let def = entry.value();
        if !matches!(
            def.kind,
            SymbolKind::Function | SymbolKind::Method | SymbolKind::Constructor
        ) {
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
        let cc = estimate_complexity(&contents[start..end]);
        entries.push(ComplexityEntry {
            symbol: def.id,
            object_id: def.id.to_object_id(),
            name: state.resolve(def.name).to_string(),
            cc,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_branches() {
        let source = "fn f(x: i32) -> i32 { if x > 0 { x } else if x < 0 { -x } else { 0 } }";
        assert_eq!(estimate_complexity(source), 3);
    }

    #[test]
    fn band_thresholds() {
        assert_eq!(ComplexityBand::of(5), ComplexityBand::Low);
        assert_eq!(ComplexityBand::of(15), ComplexityBand::Medium);
        assert_eq!(ComplexityBand::of(25), ComplexityBand::High);
    }
}
