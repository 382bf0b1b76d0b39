//! Semantic Annotator & Label Propagator.
//!
//! Direct annotations are lifted from `@key[value, ...]` markers inside a
//! symbol's doc comment, using the same comment text the parser already
//! collects into `SymbolDef::doc_comment`. The propagator then pushes each
//! direct label to callers through the call graph with multiplicative decay:
//! a label one hop away from its source keeps `decay` of its strength, two
//! hops away keeps `decay^2`, and so on, stopping once strength would fall
//! below a floor or the hop cap is reached. When a label reaches a symbol by
//! more than one path, the strongest path wins and its hop count is kept.

use crate::ids::SymbolId;
use crate::state::CodeIndex;
use crate::types::{Annotation, PropagatedLabel};
use regex::Regex;
use std::collections::{HashMap, VecDeque};
use std::sync::OnceLock;

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@([a-zA-Z][\w-]*)(?:\[([^\]]*)\])?").unwrap())
}

/// Configuration for the propagation pass.
#[derive(Debug, Clone)]
pub struct PropagationConfig {
    pub decay: f32,
    pub max_hops: u32,
    pub min_strength: f32,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            decay: 0.6,
            max_hops: 6,
            min_strength: 0.05,
        }
    }
}

/// Parse `@key[value,...]` markers out of one doc comment, lowercasing and
/// kebab-casing keys/values per the declared convention. A bare `@key` with
/// no bracketed list produces one annotation with an empty `values` vec.
pub fn parse_markers(symbol: SymbolId, doc_comment: &str) -> Vec<Annotation> {
    marker_re()
        .captures_iter(doc_comment)
        .map(|caps| {
            let key = caps[1].to_lowercase().replace('_', "-");
            let values = caps
                .get(2)
                .map(|m| {
                    m.as_str()
                        .split(',')
                        .map(|v| v.trim().to_lowercase().replace('_', "-"))
                        .filter(|v| !v.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            let category = category_for(&key);
            Annotation {
                symbol,
                key,
                values,
                category,
            }
        })
        .collect()
}

/// Coarse grouping used by the `category` query mode; unmapped keys fall
/// back to `None` and are queried by key alone.
pub fn category_for(key: &str) -> Option<String> {
    const GROUPS: &[(&str, &[&str])] = &[
        ("security", &["auth", "authz", "sensitive", "secret"]),
        ("performance", &["hot-path", "slow", "cache"]),
        ("lifecycle", &["deprecated", "experimental", "stable"]),
        ("ownership", &["owner", "team"]),
    ];
    GROUPS
        .iter()
        .find(|(_, keys)| keys.contains(&key))
        .map(|(category, _)| category.to_string())
}

/// Re-parse every symbol's doc comment into `state.annotations`, replacing
/// whatever was there before. Call once per full index, before
/// [`propagate`].
pub fn seed_direct_annotations(state: &CodeIndex) {
    state.annotations.clear();
    for entry in state.symbols.iter() {
        let def = entry.value();
        let Some(doc) = def.doc_comment.as_deref() else {
            continue;
        };
        let marks = parse_markers(def.id, doc);
        if !marks.is_empty() {
            state.annotations.insert(def.id, marks);
        }
    }
}

/// Push every direct label outward along the call graph (callee -> caller)
/// with multiplicative decay, populating `state.propagated_labels`.
pub fn propagate(state: &CodeIndex, config: &PropagationConfig) {
    state.propagated_labels.clear();

    // caller -> callees is what we built call edges from; propagation runs
    // callee -> caller, i.e. against the edge direction.
    let mut callers_of: HashMap<SymbolId, Vec<SymbolId>> = HashMap::new();
    for edge in state.call_edges.read().iter() {
        if edge.callee.is_resolved() {
            callers_of.entry(edge.callee).or_default().push(edge.caller);
        }
    }

    // best[symbol][label] = (strength, hops, source)
    let mut best: HashMap<SymbolId, HashMap<String, (f32, u32, SymbolId)>> = HashMap::new();
    let mut queue: VecDeque<(SymbolId, String, f32, u32, SymbolId)> = VecDeque::new();

    for entry in state.annotations.iter() {
        let symbol = *entry.key();
        for ann in entry.value() {
            let label = ann.key.clone();
            queue.push_back((symbol, label, 1.0, 0, symbol));
        }
    }

    while let Some((symbol, label, strength, hops, source)) = queue.pop_front() {
        if hops > 0 {
            let slot = best.entry(symbol).or_default().entry(label.clone());
            let should_record = match slot {
                std::collections::hash_map::Entry::Occupied(ref e) => e.get().0 < strength,
                std::collections::hash_map::Entry::Vacant(_) => true,
            };
            if !should_record {
                continue;
            }
            best.entry(symbol)
                .or_default()
                .insert(label.clone(), (strength, hops, source));
        }

        if hops >= config.max_hops {
            continue;
        }
        let next_strength = strength * config.decay;
        if next_strength < config.min_strength {
            continue;
        }
        if let Some(callers) = callers_of.get(&symbol) {
            for caller in callers {
                queue.push_back((*caller, label.clone(), next_strength, hops + 1, source));
            }
        }
    }

    for (symbol, labels) in best {
        let propagated: Vec<PropagatedLabel> = labels
            .into_iter()
            .map(|(label, (strength, hops, source))| PropagatedLabel {
                label,
                strength,
                hops,
                source,
            })
            .collect();
        if !propagated.is_empty() {
            state.propagated_labels.insert(symbol, propagated);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{FileId, LocalSymbolId};

    fn sym(n: u32) -> SymbolId {
        SymbolId::new(FileId(1), LocalSymbolId(n))
    }

    #[test]
    fn parses_bracketed_values() {
        let anns = parse_markers(sym(1), "/// @owner[platform-team] handles auth @deprecated");
        assert_eq!(anns.len(), 2);
        assert_eq!(anns[0].key, "owner");
        assert_eq!(anns[0].values, vec!["platform-team"]);
        assert_eq!(anns[1].key, "deprecated");
        assert!(anns[1].values.is_empty());
    }

    #[test]
    fn category_maps_known_keys() {
        assert_eq!(category_for("auth"), Some("security".to_string()));
        assert_eq!(category_for("unmapped-thing"), None);
    }

    #[test]
    fn decay_is_monotone_per_hop() {
        let config = PropagationConfig::default();
        let s1 = 1.0 * config.decay;
        let s2 = s1 * config.decay;
        assert!(s2 < s1);
    }
}
