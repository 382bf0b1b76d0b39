//! Analysis Aggregator: on-demand code metrics computed over the Master
//! Index and the indexed file contents.
//!
//! Each submodule is independent and pure with respect to [`CodeIndex`] reads;
//! [`token_budget`] is applied by the caller (the `code_insight` tool) after
//! assembling whichever sections the request asked for.

pub mod churn;
pub mod complexity;
pub mod hotspots;
pub mod modules;
pub mod perf;
pub mod smells;
pub mod token_budget;

pub use churn::{ChurnAnalyzer, ChurnReport, FileChurn};
pub use complexity::ComplexityReport;
pub use hotspots::Hotspot;
pub use modules::{LayerReport, ModuleMetrics};
pub use perf::PerfFinding;
pub use smells::Smell;
