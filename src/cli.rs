//! codesight - CLI for the codesight code-intelligence index
//!
//! A simple CLI designed for AI coding assistants to understand codebases.
//!
//! # Usage
//!
//! ```bash
//! # Index a workspace
//! codesight index --root /path/to/repo
//!
//! # Search the index
//! codesight search --root /path/to/repo "parse configuration"
//!
//! # Find a symbol
//! codesight symbol --root /path/to/repo HybridSearch
//!
//! # Run code analysis
//! codesight insight --root /path/to/repo complexity
//! ```
//!
//! # Design for AI Agents
//!
//! This CLI is designed to be used by AI coding assistants:
//! - `--json` flag outputs machine-readable JSON
//! - Simple, predictable command structure
//! - Errors go to stderr, results to stdout
//! - Exit codes: 0 = success, 1 = error

use anyhow::Result;
use clap::{Parser, Subcommand};
use codesight_core::analysis;
use codesight_core::ids::SymbolId;
use codesight_core::search::{self, SearchOptions, SearchOutcome};
use codesight_core::{IncrementalIndexer, IndexOptions, SymbolDef, create_state};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "codesight")]
#[command(author = "Amar Singh")]
#[command(version)]
#[command(about = "codesight - local code intelligence for AI agents")]
#[command(long_about = r#"
codesight helps AI coding assistants understand codebases.

It provides:
  - Trigram-backed substring and regex search
  - Symbol lookup with call graph traversal
  - Complexity, hotspot, smell, and perf-pattern analysis
  - Churn analysis over git history

Designed for automation: use --json for machine-readable output.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Root directory to analyze (alias: --workspace)
    #[arg(short, long, global = true, default_value = ".", alias = "workspace")]
    root: PathBuf,

    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or rebuild the code index
    Index {
        /// Force full rebuild (ignore in-memory fingerprints)
        #[arg(long)]
        force: bool,

        /// Include paths that match this glob (can be used multiple times)
        #[arg(long, value_name = "GLOB")]
        include: Vec<String>,

        /// Exclude paths that match this glob (can be used multiple times)
        #[arg(long, value_name = "GLOB")]
        exclude: Vec<String>,

        /// Disable default excludes
        #[arg(long)]
        no_default_excludes: bool,

        /// Include hidden files
        #[arg(long)]
        include_hidden: bool,

        /// Include large files
        #[arg(long)]
        include_large: bool,

        /// Max file size in bytes (ignored if --include-large)
        #[arg(long, default_value = "2097152")]
        max_file_size: u64,
    },

    /// Index multiple workspaces in one command
    IndexAll {
        /// Workspaces to analyze
        #[arg(required = true)]
        workspaces: Vec<PathBuf>,
    },

    /// Find symbol definitions by name
    Symbol {
        /// Symbol name to find
        name: String,

        /// Maximum results
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Find callers or callees of a symbol
    Calls {
        /// Symbol name to analyze
        symbol: String,

        /// Direction: callers or callees
        #[arg(short, long, default_value = "callers")]
        direction: String,
    },

    /// Search the index for a pattern
    Search {
        /// Search pattern
        pattern: String,

        /// Treat the pattern as a regex
        #[arg(long)]
        regex: bool,

        /// Maximum results
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Run code analysis
    Insight {
        /// Analysis type: complexity, hotspots, smells, perf, modules, churn
        analysis_type: String,

        /// Max entries to return
        #[arg(long, default_value = "20")]
        top_n: usize,

        /// Lookback window in days, for `churn`
        #[arg(long, default_value = "90")]
        days: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only to stderr to keep stdout clean)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let root = cli.root.clone();
    let root = root.canonicalize().unwrap_or(root);

    match run_command(&cli, &root).await {
        Ok(output) => {
            if cli.json {
                let response = SuccessResponse {
                    ok: true,
                    data: output,
                };
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_human_readable(&output);
            }
            Ok(())
        }
        Err(e) => {
            if cli.json {
                let response = error_response(&e);
                eprintln!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                eprintln!("Error: {}", e);
            }
            std::process::exit(1);
        }
    }
}

async fn run_command(cli: &Cli, root: &std::path::Path) -> Result<Output> {
    let state = create_state(root.to_path_buf());
    let indexer = IncrementalIndexer::new();

    match &cli.command {
        Commands::Index {
            force,
            include,
            exclude,
            no_default_excludes,
            include_hidden,
            include_large,
            max_file_size,
        } => {
            let options = IndexOptions {
                force: *force,
                include: include.clone(),
                exclude: exclude.clone(),
                no_default_excludes: *no_default_excludes,
                include_hidden: *include_hidden,
                include_large: *include_large,
                max_file_size: *max_file_size,
            };
            let report = indexer.index(&state, root, &options).await?;
            Ok(Output::Index {
                files: report.total_files,
                symbols: state.stats().symbol_count as usize,
                parsed: report.parsed_files,
                skipped: report.skipped_files,
                removed: report.removed_files,
                root: root.display().to_string(),
            })
        }

        Commands::IndexAll { workspaces } => {
            let mut results = Vec::with_capacity(workspaces.len());
            for ws in workspaces {
                let ws_path = ws.canonicalize().unwrap_or_else(|_| ws.clone());
                let ws_state = create_state(ws_path.clone());
                let report = indexer
                    .index(&ws_state, &ws_path, &IndexOptions::default())
                    .await?;
                results.push(IndexAllResult {
                    workspace: ws_path.display().to_string(),
                    files: report.total_files,
                    symbols: ws_state.stats().symbol_count as usize,
                    call_edges: ws_state.stats().call_edge_count as usize,
                });
            }
            Ok(Output::IndexAll { results })
        }

        Commands::Symbol { name, limit } => {
            indexer.full_index(&state, root).await?;

            let symbols: Vec<SymbolDef> = state.find_by_name(name);

            Ok(Output::Symbols {
                query: name.clone(),
                results: symbols
                    .into_iter()
                    .take(*limit)
                    .map(|s| SymbolResult {
                        name: state.resolve(s.scoped_name).to_string(),
                        kind: s.kind.as_str().to_string(),
                        file: s.location.file.display().to_string(),
                        line: s.location.start_line,
                    })
                    .collect(),
            })
        }

        Commands::Calls { symbol, direction } => {
            indexer.full_index(&state, root).await?;

            let results: Vec<CallResult> = match direction.as_str() {
                "callers" => state
                    .find_callers(SymbolId::UNRESOLVED, symbol)
                    .into_iter()
                    .map(|edge| CallResult {
                        caller: state
                            .get_symbol(edge.caller)
                            .map(|s| state.resolve(s.scoped_name).to_string())
                            .unwrap_or_else(|| edge.caller.to_string()),
                        callee: edge.callee_name.clone(),
                        file: edge.location.file.display().to_string(),
                        line: edge.location.start_line,
                    })
                    .collect(),
                "callees" => {
                    let symbols = state.find_by_name(symbol);
                    let mut all_callees = Vec::new();
                    for sym in symbols {
                        let edges = state.find_callees(sym.id);
                        for edge in edges {
                            all_callees.push(CallResult {
                                caller: state.resolve(sym.scoped_name).to_string(),
                                callee: edge.callee_name.clone(),
                                file: edge.location.file.display().to_string(),
                                line: edge.location.start_line,
                            });
                        }
                    }
                    all_callees
                }
                _ => return Err(anyhow::anyhow!("Direction must be 'callers' or 'callees'")),
            };

            Ok(Output::Calls {
                symbol: symbol.clone(),
                direction: direction.clone(),
                results,
            })
        }

        Commands::Search {
            pattern,
            regex,
            limit,
        } => {
            indexer.full_index(&state, root).await?;

            let options = SearchOptions {
                regex: *regex,
                max_results: *limit,
                ..Default::default()
            };
            let outcome = search::search(&state, pattern, &options)
                .map_err(|e| CliError::invalid_query(&e.to_string()))?;

            let results = match outcome {
                SearchOutcome::Hits(hits) => hits
                    .into_iter()
                    .map(|h| SearchResult {
                        file: h.file.display().to_string(),
                        line: h.line,
                        column: h.column,
                        text: h.text,
                        score: h.semantic_score,
                    })
                    .collect(),
                SearchOutcome::Files(files) => files
                    .into_iter()
                    .map(|f| SearchResult {
                        file: f.display().to_string(),
                        line: 0,
                        column: 0,
                        text: String::new(),
                        score: 0.0,
                    })
                    .collect(),
                SearchOutcome::Count(n) => {
                    return Ok(Output::SearchCount { pattern: pattern.clone(), count: n });
                }
            };

            Ok(Output::Search {
                pattern: pattern.clone(),
                results,
            })
        }

        Commands::Insight {
            analysis_type,
            top_n,
            days,
        } => {
            indexer.full_index(&state, root).await?;
            codesight_core::effects::seed_local_pass(&state);
            codesight_core::effects::propagate(&state);

            match analysis_type.as_str() {
                "complexity" => {
                    let report = analysis::complexity::analyze(&state, *top_n);
                    Ok(Output::Insight {
                        analysis_type: analysis_type.clone(),
                        summary: format!(
                            "average {:.1}, p90 {:.1}, {} high-complexity",
                            report.average, report.p90, report.distribution.high
                        ),
                        entries: report
                            .top
                            .into_iter()
                            .map(|e| InsightEntry {
                                name: e.name,
                                file: String::new(),
                                line: 0,
                                detail: format!("cc={}", e.cc),
                            })
                            .collect(),
                    })
                }
                "hotspots" => {
                    let hotspots =
                        analysis::hotspots::analyze(&state, &Default::default(), *top_n);
                    Ok(Output::Insight {
                        analysis_type: analysis_type.clone(),
                        summary: format!("{} hotspots", hotspots.len()),
                        entries: hotspots
                            .into_iter()
                            .map(|h| InsightEntry {
                                name: h.name,
                                file: String::new(),
                                line: 0,
                                detail: format!("cc={} lines={} risk={:.1}", h.cc, h.lines, h.risk),
                            })
                            .collect(),
                    })
                }
                "smells" => {
                    let smells = analysis::smells::analyze(&state);
                    Ok(Output::Insight {
                        analysis_type: analysis_type.clone(),
                        summary: format!("{} smells", smells.len()),
                        entries: smells
                            .into_iter()
                            .take(*top_n)
                            .map(|s| InsightEntry {
                                name: s.name,
                                file: String::new(),
                                line: 0,
                                detail: format!("{:?}/{:?}: {}", s.kind, s.severity, s.detail),
                            })
                            .collect(),
                    })
                }
                "perf" => {
                    let findings = analysis::perf::analyze(&state);
                    Ok(Output::Insight {
                        analysis_type: analysis_type.clone(),
                        summary: format!("{} findings", findings.len()),
                        entries: findings
                            .into_iter()
                            .take(*top_n)
                            .map(|f| InsightEntry {
                                name: f.name,
                                file: String::new(),
                                line: 0,
                                detail: format!("{} ({}): {}", f.pattern.label(), f.language, f.detail),
                            })
                            .collect(),
                    })
                }
                "modules" => {
                    let metrics = analysis::modules::analyze(&state);
                    Ok(Output::Insight {
                        analysis_type: analysis_type.clone(),
                        summary: format!("{} modules", metrics.len()),
                        entries: metrics
                            .into_iter()
                            .take(*top_n)
                            .map(|m| InsightEntry {
                                name: m.path.display().to_string(),
                                file: String::new(),
                                line: 0,
                                detail: format!(
                                    "symbols={} cohesion={:.2} coupling={:.2} stability={:.2}",
                                    m.symbol_count, m.cohesion, m.coupling, m.stability
                                ),
                            })
                            .collect(),
                    })
                }
                "churn" => {
                    let report = analysis::ChurnAnalyzer::analyze(root, *days)?;
                    Ok(Output::Insight {
                        analysis_type: analysis_type.clone(),
                        summary: format!("{} hotspot files", report.hotspots.len()),
                        entries: report
                            .file_churn
                            .into_iter()
                            .take(*top_n)
                            .map(|c| InsightEntry {
                                name: c.path.display().to_string(),
                                file: String::new(),
                                line: 0,
                                detail: format!(
                                    "commits={} +{} -{} authors={}",
                                    c.commits,
                                    c.lines_added,
                                    c.lines_removed,
                                    c.authors.len()
                                ),
                            })
                            .collect(),
                    })
                }
                other => Err(anyhow::anyhow!(
                    "Unknown analysis type: {}. Use: complexity, hotspots, smells, perf, modules, churn",
                    other
                )),
            }
        }
    }
}

#[derive(serde::Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Output {
    Index {
        files: usize,
        symbols: usize,
        parsed: usize,
        skipped: usize,
        removed: usize,
        root: String,
    },
    IndexAll {
        results: Vec<IndexAllResult>,
    },
    Symbols {
        query: String,
        results: Vec<SymbolResult>,
    },
    Calls {
        symbol: String,
        direction: String,
        results: Vec<CallResult>,
    },
    Search {
        pattern: String,
        results: Vec<SearchResult>,
    },
    SearchCount {
        pattern: String,
        count: usize,
    },
    Insight {
        analysis_type: String,
        summary: String,
        entries: Vec<InsightEntry>,
    },
}

#[derive(serde::Serialize)]
struct SuccessResponse<T> {
    ok: bool,
    #[serde(flatten)]
    data: T,
}

#[derive(serde::Serialize)]
struct ErrorResponse {
    ok: bool,
    error: ErrorInfo,
}

#[derive(serde::Serialize)]
struct ErrorInfo {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    InvalidQuery(String),
}

impl CliError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidQuery(_) => "invalid_query",
        }
    }

    fn invalid_query(message: &str) -> Self {
        Self::InvalidQuery(message.to_string())
    }
}

fn error_response(err: &anyhow::Error) -> ErrorResponse {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return ErrorResponse {
            ok: false,
            error: ErrorInfo {
                code: cli_err.code().to_string(),
                message: cli_err.to_string(),
                details: None,
            },
        };
    }

    ErrorResponse {
        ok: false,
        error: ErrorInfo {
            code: "internal".to_string(),
            message: err.to_string(),
            details: None,
        },
    }
}

#[derive(serde::Serialize)]
struct IndexAllResult {
    workspace: String,
    files: usize,
    symbols: usize,
    call_edges: usize,
}

#[derive(serde::Serialize)]
struct SymbolResult {
    name: String,
    kind: String,
    file: String,
    line: usize,
}

#[derive(serde::Serialize)]
struct CallResult {
    caller: String,
    callee: String,
    file: String,
    line: usize,
}

#[derive(serde::Serialize)]
struct SearchResult {
    file: String,
    line: usize,
    column: usize,
    text: String,
    score: f32,
}

#[derive(serde::Serialize)]
struct InsightEntry {
    name: String,
    file: String,
    line: usize,
    detail: String,
}

fn print_human_readable(output: &Output) {
    match output {
        Output::Index {
            files,
            symbols,
            parsed,
            skipped,
            removed,
            root,
        } => {
            println!("Indexed {} files, {} symbols", files, symbols);
            println!(
                "Parsed: {}, skipped: {}, removed: {}",
                parsed, skipped, removed
            );
            println!("Root: {}", root);
        }
        Output::IndexAll { results } => {
            println!("Indexed {} workspaces:", results.len());
            for result in results {
                println!(
                    "  {}: {} files, {} symbols, {} call edges",
                    result.workspace, result.files, result.symbols, result.call_edges
                );
            }
        }
        Output::Symbols { query, results } => {
            println!("Symbol: \"{}\"", query);
            println!("Found {} matches:", results.len());
            for s in results {
                println!("  {} ({}) at {}:{}", s.name, s.kind, s.file, s.line);
            }
        }
        Output::Calls {
            symbol,
            direction,
            results,
        } => {
            println!("{} of \"{}\":", direction, symbol);
            println!("Found {} results:", results.len());
            for c in results {
                println!("  {} -> {} at {}:{}", c.caller, c.callee, c.file, c.line);
            }
        }
        Output::Search { pattern, results } => {
            println!("Search: \"{}\"", pattern);
            println!("Found {} results:", results.len());
            for r in results {
                if r.text.is_empty() {
                    println!("  {}", r.file);
                } else {
                    println!("  {}:{}:{}: {}", r.file, r.line, r.column, r.text);
                }
            }
        }
        Output::SearchCount { pattern, count } => {
            println!("Search: \"{}\" -> {} matches", pattern, count);
        }
        Output::Insight {
            analysis_type,
            summary,
            entries,
        } => {
            println!("Insight: {} ({})", analysis_type, summary);
            for e in entries {
                println!("  {} - {}", e.name, e.detail);
            }
        }
    }
}
