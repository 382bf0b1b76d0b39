//! Hotspot detection: symbols that are both complex and large, ranked by a
//! blended risk score.

use super::complexity::per_symbol_complexity;
use crate::ids::{ObjectId, SymbolId};
use crate::state::CodeIndex;

#[derive(Debug, Clone)]
pub struct HotspotConfig {
    pub hotspot_cc: u32,
    pub hotspot_lines: usize,
    pub risk_max: f64,
}

impl Default for HotspotConfig {
    fn default() -> Self {
        Self {
            hotspot_cc: 15,
            hotspot_lines: 80,
            risk_max: 100.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Hotspot {
    pub symbol: SymbolId,
    pub object_id: ObjectId,
    pub name: String,
    pub cc: u32,
    pub lines: usize,
    pub risk: f64,
}

pub fn analyze(state: &CodeIndex, config: &HotspotConfig, top_n: usize) -> Vec<Hotspot> {
    let mut hotspots = Vec::new();
    for entry in per_symbol_complexity(state) {
        let Some(def) = state.get_symbol(entry.symbol) else {
            continue;
        };
        let lines = def
            .location
            .end_line
            .saturating_sub(def.location.start_line)
            + 1;
        if entry.cc <= config.hotspot_cc && lines <= config.hotspot_lines {
            continue;
        }
        let risk = (0.7 * entry.cc as f64 + 0.03 * lines as f64).min(config.risk_max);
        hotspots.push(Hotspot {
            symbol: entry.symbol,
            object_id: entry.object_id,
            name: entry.name,
            cc: entry.cc,
            lines,
            risk,
        });
    }
    hotspots.sort_by(|a, b| b.risk.partial_cmp(&a.risk).unwrap_or(std::cmp::Ordering::Equal));
    hotspots.truncate(top_n);
    hotspots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_is_clamped() {
        let config = HotspotConfig {
            risk_max: 10.0,
            ..Default::default()
        };
        let risk = (0.7 * 100.0 + 0.03 * 1000.0_f64).min(config.risk_max);
        assert_eq!(risk, 10.0);
    }
}
