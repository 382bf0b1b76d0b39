//! Token-budget enforcement for aggregate analysis responses.
//!
//! Every section of an aggregate response (critical functions, module
//! boundaries, dependency-graph nodes/edges, domains, centrality entries)
//! carries a fixed per-item token weight. If the weighted estimate exceeds
//! the budget, arrays are shrunk proportionally down to a floor of 5 items
//! each; if that still isn't enough, whole sections are dropped in priority
//! order, least essential first.

#[derive(Debug, Clone, Copy)]
pub struct SectionWeights {
    pub critical_function: u32,
    pub module_boundary: u32,
    pub dep_graph_node: u32,
    pub dep_graph_edge: u32,
    pub domain: u32,
    pub centrality_entry: u32,
    pub fixed_overhead: u32,
}

impl Default for SectionWeights {
    fn default() -> Self {
        Self {
            critical_function: 100,
            module_boundary: 80,
            dep_graph_node: 60,
            dep_graph_edge: 40,
            domain: 50,
            centrality_entry: 30,
            fixed_overhead: 200,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BudgetConfig {
    pub budget: u32,
    pub weights: SectionWeights,
    pub min_items_floor: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            budget: 8_000,
            weights: SectionWeights::default(),
            min_items_floor: 5,
        }
    }
}

impl BudgetConfig {
    pub fn clamp_budget(mut self) -> Self {
        self.budget = self.budget.clamp(4_000, 12_000);
        self
    }
}

/// One reducible section of an aggregate response, in priority order
/// (lowest-priority / first-to-drop last in this list by convention; callers
/// pass sections already ordered most-valuable first).
#[derive(Debug, Clone)]
pub struct Section {
    pub name: &'static str,
    pub weight_per_item: u32,
    pub item_count: usize,
    pub essential: bool,
}

#[derive(Debug, Clone)]
pub struct ReducedSection {
    pub name: &'static str,
    pub kept_items: usize,
    pub dropped: bool,
}

/// Estimate total tokens for a set of sections.
pub fn estimate(sections: &[Section], weights: &SectionWeights) -> u32 {
    weights.fixed_overhead
        + sections
            .iter()
            .map(|s| s.weight_per_item * s.item_count as u32)
            .sum::<u32>()
}

/// Reduce `sections` to fit `config.budget`: first shrink non-essential
/// arrays proportionally down to `min_items_floor`, then drop non-essential
/// sections entirely (least essential, i.e. last in the input, first) if
/// still over budget.
pub fn reduce(sections: &[Section], config: &BudgetConfig) -> Vec<ReducedSection> {
    let budget = config.budget.clamp(4_000, 12_000);
    let mut working: Vec<Section> = sections.to_vec();

    if estimate(&working, &config.weights) <= budget {
        return working
            .into_iter()
            .map(|s| ReducedSection {
                name: s.name,
                kept_items: s.item_count,
                dropped: false,
            })
            .collect();
    }

    let shrinkable_total: u32 = working
        .iter()
        .filter(|s| !s.essential)
        .map(|s| s.weight_per_item * s.item_count as u32)
        .sum();
    let essential_total: u32 = working
        .iter()
        .filter(|s| s.essential)
        .map(|s| s.weight_per_item * s.item_count as u32)
        .sum();
    let available_for_shrinkable = budget.saturating_sub(config.weights.fixed_overhead + essential_total);

    if shrinkable_total > 0 {
        let ratio = (available_for_shrinkable as f64 / shrinkable_total as f64).clamp(0.0, 1.0);
        for s in working.iter_mut().filter(|s| !s.essential) {
            let reduced = ((s.item_count as f64) * ratio).floor() as usize;
            s.item_count = reduced.max(config.min_items_floor.min(s.item_count));
        }
    }

    if estimate(&working, &config.weights) <= budget {
        return working
            .into_iter()
            .map(|s| ReducedSection {
                name: s.name,
                kept_items: s.item_count,
                dropped: false,
            })
            .collect();
    }

    let mut dropped_names = std::collections::HashSet::new();
    for s in working.iter().filter(|s| !s.essential).rev() {
        dropped_names.insert(s.name);
        let trial: Vec<Section> = working
            .iter()
            .cloned()
            .filter(|s| !dropped_names.contains(s.name))
            .collect();
        if estimate(&trial, &config.weights) <= budget {
            break;
        }
    }

    working
        .into_iter()
        .map(|s| {
            if dropped_names.contains(s.name) {
                ReducedSection {
                    name: s.name,
                    kept_items: 0,
                    dropped: true,
                }
            } else {
                ReducedSection {
                    name: s.name,
                    kept_items: s.item_count,
                    dropped: false,
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn under_budget_passes_through_unchanged() {
        let sections = vec![Section {
            name: "critical_functions",
            weight_per_item: 100,
            item_count: 5,
            essential: true,
        }];
        let config = BudgetConfig::default();
        let reduced = reduce(&sections, &config);
        assert_eq!(reduced[0].kept_items, 5);
        assert!(!reduced[0].dropped);
    }

    #[test]
    fn over_budget_shrinks_non_essential_arrays() {
        let sections = vec![
            Section {
                name: "critical_functions",
                weight_per_item: 100,
                item_count: 10,
                essential: true,
            },
            Section {
                name: "dep_graph_nodes",
                weight_per_item: 60,
                item_count: 500,
                essential: false,
            },
        ];
        let config = BudgetConfig::default();
        let reduced = reduce(&sections, &config);
        let nodes = reduced.iter().find(|s| s.name == "dep_graph_nodes").unwrap();
        assert!(nodes.kept_items < 500);
        assert!(nodes.kept_items >= config.min_items_floor);
    }

    #[test]
    fn clamp_budget_respects_bounds() {
        let config = BudgetConfig {
            budget: 1_000,
            ..Default::default()
        }
        .clamp_budget();
        assert_eq!(config.budget, 4_000);
    }
}
