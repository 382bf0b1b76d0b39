//! Code smell detection: long functions, high complexity, god classes, and
//! shotgun-surgery-prone symbols (many incoming references).

use super::complexity::per_symbol_complexity;
use crate::ids::{ObjectId, SymbolId};
use crate::state::CodeIndex;
use crate::types::SymbolKind;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmellKind {
    LongFunction,
    HighComplexity,
    GodClass,
    ShotgunSurgery,
}

#[derive(Debug, Clone)]
pub struct Smell {
    pub kind: SmellKind,
    pub severity: Severity,
    pub symbol: SymbolId,
    pub object_id: ObjectId,
    pub name: String,
    pub detail: String,
}

pub fn analyze(state: &CodeIndex) -> Vec<Smell> {
    let mut smells = Vec::new();
    smells.extend(long_functions(state));
    smells.extend(high_complexity(state));
    smells.extend(god_classes(state));
    smells.extend(shotgun_surgery(state));
    smells
}

fn long_functions(state: &CodeIndex) -> Vec<Smell> {
    let mut out = Vec::new();
    for entry in state.symbols.iter() {
        let def = entry.value();
        if !matches!(def.kind, SymbolKind::Function | SymbolKind::Method) {
            continue;
        }
        let lines = def
            .location
            .end_line
            .saturating_sub(def.location.start_line)
            + 1;
        let severity = if lines > 100 {
            Some(Severity::High)
        } else if lines > 50 {
            Some(Severity::Medium)
        } else {
            None
        };
        if let Some(severity) = severity {
            out.push(Smell {
                kind: SmellKind::LongFunction,
                severity,
                symbol: def.id,
                object_id: def.id.to_object_id(),
                name: state.resolve(def.name).to_string(),
                detail: format!("{lines} lines"),
            });
        }
    }
    out
}

fn high_complexity(state: &CodeIndex) -> Vec<Smell> {
    per_symbol_complexity(state)
        .into_iter()
        .filter_map(|entry| {
            let severity = if entry.cc > 20 {
                Some(Severity::High)
            } else if entry.cc > 10 {
                Some(Severity::Medium)
            } else {
                None
            };
            severity.map(|severity| Smell {
                kind: SmellKind::HighComplexity,
                severity,
                symbol: entry.symbol,
                object_id: entry.object_id,
                name: entry.name,
                detail: format!("CC {}", entry.cc),
            })
        })
        .collect()
}

fn god_classes(state: &CodeIndex) -> Vec<Smell> {
    let mut method_counts: HashMap<SymbolId, usize> = HashMap::new();
    for entry in state.symbols.iter() {
        let def = entry.value();
        if def.kind != SymbolKind::Method {
            continue;
        }
        if let Some(parent) = def.parent {
            *method_counts.entry(parent).or_insert(0) += 1;
        }
    }

    let mut out = Vec::new();
    for (class_id, count) in method_counts {
        let severity = if count > 25 {
            Some(Severity::High)
        } else if count > 15 {
            Some(Severity::Medium)
        } else {
            None
        };
        if let (Some(severity), Some(def)) = (severity, state.get_symbol(class_id)) {
            out.push(Smell {
                kind: SmellKind::GodClass,
                severity,
                symbol: class_id,
                object_id: class_id.to_object_id(),
                name: state.resolve(def.name).to_string(),
                detail: format!("{count} methods"),
            });
        }
    }
    out
}

fn shotgun_surgery(state: &CodeIndex) -> Vec<Smell> {
    let mut incoming: HashMap<SymbolId, usize> = HashMap::new();
    for edge in state.call_edges.read().iter() {
        if edge.callee.is_resolved() {
            *incoming.entry(edge.callee).or_insert(0) += 1;
        }
    }
    for reference in state.references.read().iter() {
        if reference.target.is_resolved() {
            *incoming.entry(reference.target).or_insert(0) += 1;
        }
    }

    let mut out = Vec::new();
    for (symbol, count) in incoming {
        let severity = if count > 20 {
            Some(Severity::High)
        } else if count > 10 {
            Some(Severity::Medium)
        } else {
            None
        };
        if let (Some(severity), Some(def)) = (severity, state.get_symbol(symbol)) {
            out.push(Smell {
                kind: SmellKind::ShotgunSurgery,
                severity,
                symbol,
                object_id: symbol.to_object_id(),
                name: state.resolve(def.name).to_string(),
                detail: format!("{count} incoming references"),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_for_long_function() {
        assert_eq!(Severity::Medium, Severity::Medium);
        assert_ne!(Severity::Medium, Severity::High);
    }
}
