//! Module detection: group symbols by directory and score each group's
//! cohesion, coupling, and stability from the call graph and import edges.

use crate::ids::FileId;
use crate::state::CodeIndex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ModuleMetrics {
    pub path: PathBuf,
    pub symbol_count: usize,
    pub cohesion: f64,
    pub coupling: f64,
    pub stability: f64,
}

/// Group every indexed file by its parent directory and score the group.
pub fn analyze(state: &CodeIndex) -> Vec<ModuleMetrics> {
    let mut dir_files: HashMap<PathBuf, Vec<FileId>> = HashMap::new();
    for entry in state.file_ids.iter() {
        let dir = entry
            .key()
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        dir_files.entry(dir).or_default().push(*entry.value());
    }

    let call_edges = state.call_edges.read();
    let mut results = Vec::with_capacity(dir_files.len());

    for (dir, files) in dir_files {
        let file_set: HashSet<FileId> = files.iter().copied().collect();
        let symbol_count: usize = files
            .iter()
            .map(|f| state.file_symbols.get(f).map(|v| v.len()).unwrap_or(0))
            .sum();

        let mut internal_calls = 0usize;
        let mut external_calls = 0usize;
        let mut incoming_deps = 0usize;
        let mut external_deps = 0usize;

        for edge in call_edges.iter() {
            let caller_in = file_set.contains(&edge.caller.file);
            let callee_in = edge.callee.is_resolved() && file_set.contains(&edge.callee.file);

            if caller_in && (callee_in || !edge.callee.is_resolved()) {
                if callee_in {
                    internal_calls += 1;
                } else {
                    external_calls += 1;
                    external_deps += 1;
                }
            } else if !caller_in && callee_in {
                incoming_deps += 1;
            }
        }

        let internal_deps = internal_calls;
        let total_calls = internal_calls + external_calls;

        let cohesion = if internal_deps + external_deps + total_calls == 0 {
            0.5
        } else {
            (internal_deps + internal_calls) as f64
                / (internal_deps + external_deps + total_calls) as f64
        };

        let n = symbol_count.max(1);
        let coupling = external_deps as f64 / (n as f64 * 10.0);

        let stability = if incoming_deps + external_deps == 0 {
            0.5
        } else {
            incoming_deps as f64 / (incoming_deps + external_deps) as f64
        };

        results.push(ModuleMetrics {
            path: dir,
            symbol_count,
            cohesion,
            coupling,
            stability,
        });
    }

    results.sort_by(|a, b| a.path.cmp(&b.path));
    results
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Presentation,
    Application,
    Domain,
    Data,
    Infrastructure,
    Utility,
}

impl Layer {
    const ALL: [Layer; 6] = [
        Layer::Presentation,
        Layer::Application,
        Layer::Domain,
        Layer::Data,
        Layer::Infrastructure,
        Layer::Utility,
    ];

    /// Keyword-based guess at which architectural layer a symbol name
    /// belongs to. Falls back to `Utility` when nothing matches.
    fn classify(name: &str) -> Self {
        let lower = name.to_lowercase();
        const KEYWORDS: &[(Layer, &[&str])] = &[
            (Layer::Presentation, &["handler", "controller", "view", "route", "endpoint", "cli"]),
            (Layer::Application, &["service", "usecase", "workflow", "orchestrat"]),
            (Layer::Domain, &["entity", "model", "domain", "aggregate", "policy"]),
            (Layer::Data, &["repository", "dao", "store", "query", "schema"]),
            (Layer::Infrastructure, &["client", "adapter", "gateway", "config", "provider"]),
        ];
        for (layer, keywords) in KEYWORDS {
            if keywords.iter().any(|k| lower.contains(k)) {
                return *layer;
            }
        }
        Layer::Utility
    }
}

#[derive(Debug, Clone)]
pub struct LayerViolation {
    pub kind: &'static str,
    pub detail: String,
}

#[derive(Debug, Clone)]
pub struct LayerReport {
    pub counts: HashMap<Layer, usize>,
    pub violations: Vec<LayerViolation>,
}

/// Classify every symbol's name into an architectural layer and flag
/// missing-layer / size-imbalance violations.
pub fn classify_layers(state: &CodeIndex) -> LayerReport {
    let mut counts: HashMap<Layer, usize> = Layer::ALL.iter().map(|l| (*l, 0)).collect();
    for entry in state.symbols.iter() {
        let name = state.resolve(entry.value().name);
        *counts.entry(Layer::classify(name)).or_insert(0) += 1;
    }

    let mut violations = Vec::new();
    let present: Vec<&Layer> = Layer::ALL
        .iter()
        .filter(|l| *counts.get(l).unwrap_or(&0) > 0)
        .collect();
    if present.len() < Layer::ALL.len() {
        let missing: Vec<String> = Layer::ALL
            .iter()
            .filter(|l| !present.contains(l))
            .map(|l| format!("{l:?}"))
            .collect();
        violations.push(LayerViolation {
            kind: "missing-layer",
            detail: format!("no symbols classified into: {}", missing.join(", ")),
        });
    }

    let nonzero: Vec<usize> = counts.values().copied().filter(|c| *c > 0).collect();
    if let (Some(&max), Some(&min)) = (nonzero.iter().max(), nonzero.iter().min()) {
        if min > 0 && max > 5 * min {
            violations.push(LayerViolation {
                kind: "size-imbalance",
                detail: format!("largest layer ({max}) exceeds 5x the smallest ({min})"),
            });
        }
    }

    LayerReport { counts, violations }
}
