//! MCP server implementation.
//!
//! Exposes the index's query surface via Model Context Protocol. Every tool
//! handler waits on [`IndexManager::check_index_availability`] before
//! touching the Master Index, so a query issued moments after the process
//! starts blocks on the running indexing pass instead of seeing an empty
//! index. Tool failures are always returned as a successful JSON-RPC
//! response with `isError=true` (never a protocol-level error) so a client
//! can read the structured reason and retry.

use crate::analysis;
use crate::errors::{ErrorKind, ToolError};
use crate::ids::{ObjectId, SymbolId};
use crate::manager::IndexManager;
use crate::search::{self, SearchOptions, SearchOutcome};
use crate::state::{create_state, SharedState};
use crate::types::SymbolKind;
use dashmap::DashMap;
use rmcp::handler::server::{router::tool::ToolRouter, tool::Parameters};
use rmcp::model::{ErrorData as McpError, *};
use rmcp::transport::stdio;
use rmcp::{schemars, tool, tool_handler, tool_router, ServerHandler, ServiceExt};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared server-side state: the Master Index, the indexing state machine,
/// and an in-memory store for `context` manifests (no on-disk cache, so
/// saved manifests live only for the life of the process).
pub struct ServerState {
    pub index: SharedState,
    pub manager: Arc<IndexManager>,
    pub workspace_root: PathBuf,
    manifests: DashMap<String, Value>,
}

impl ServerState {
    pub fn new(workspace_root: PathBuf) -> Self {
        let index = create_state(workspace_root.clone());
        let manager = Arc::new(IndexManager::new(
            Arc::clone(&index),
            workspace_root.clone(),
            DEFAULT_WAIT_TIMEOUT,
        ));
        manager.start(crate::incremental::IndexOptions::default());
        Self {
            index,
            manager,
            workspace_root,
            manifests: DashMap::new(),
        }
    }
}

/// The MCP server handler implementing the tool surface.
#[derive(Clone)]
pub struct CodesightServer {
    state: Arc<ServerState>,
    tool_router: ToolRouter<Self>,
}

impl CodesightServer {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self {
            state: Arc::new(ServerState::new(workspace_root)),
            tool_router: Self::tool_router(),
        }
    }

    async fn ensure_ready(&self) -> Result<(), ToolError> {
        self.state.manager.check_index_availability().await
    }
}

// ============================================================================
// Shared helpers: aliasing, unknown-field warnings, error formatting
// ============================================================================

/// Resolve a primary/alias pair, recording a deprecation warning when the
/// alias (rather than the canonical field) was the one supplied.
fn resolve_alias(
    primary: Option<String>,
    alias: Option<String>,
    alias_name: &str,
    canonical_name: &str,
    warnings: &mut Vec<String>,
) -> Option<String> {
    match primary {
        Some(v) => Some(v),
        None => alias.inspect(|_| {
            warnings.push(format!(
                "`{alias_name}` is deprecated; use `{canonical_name}` instead"
            ));
        }),
    }
}

/// Unknown JSON fields must be accepted, not rejected; surface them as
/// non-fatal warnings rather than silently dropping them.
fn unknown_field_warnings(extra: &HashMap<String, Value>) -> Vec<String> {
    extra
        .keys()
        .map(|k| format!("unrecognized field `{k}` was ignored"))
        .collect()
}

fn append_warnings(mut body: String, warnings: &[String]) -> String {
    if !warnings.is_empty() {
        body.push_str("\n\nWarnings:\n");
        for w in warnings {
            body.push_str(&format!("- {w}\n"));
        }
    }
    body
}

/// Render a `ToolError` as a successful tool result with `isError=true`: every
/// error carries the operation, what it saw, and concrete next steps so a
/// client can self-correct without a protocol-level failure.
fn tool_error_result(op: &str, err: ToolError) -> CallToolResult {
    let mut body = format!("{op} failed [{}]: {err}", err.code());
    if let Some(field) = err.field() {
        body.push_str(&format!("\n  field: {field}"));
    }
    if !err.suggestions().is_empty() {
        body.push_str("\n  next steps:\n");
        for s in err.suggestions() {
            body.push_str(&format!("  - {s}\n"));
        }
    }
    if matches!(err.kind(), ErrorKind::NotReady | ErrorKind::NotAvailable) {
        body.push_str("\n  retry this call once the index finishes building.");
    }
    CallToolResult::error(vec![Content::text(body)])
}

fn parse_symbol_kind(s: &str) -> Option<SymbolKind> {
    use SymbolKind::*;
    Some(match s.to_lowercase().as_str() {
        "function" => Function,
        "method" => Method,
        "class" => Class,
        "struct" => Struct,
        "interface" => Interface,
        "variable" => Variable,
        "constant" => Constant,
        "type" => Type,
        "enum" => Enum,
        "record" => Record,
        "trait" => Trait,
        "impl" => Impl,
        "property" => Property,
        "field" => Field,
        "enum_member" => EnumMember,
        "namespace" => Namespace,
        "module" => Module,
        "constructor" => Constructor,
        "macro" => Macro,
        _ => return None,
    })
}

// ============================================================================
// Tool Argument Types
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchRequest {
    #[schemars(description = "Pattern to search for (literal unless `rx` is set)")]
    pub pattern: Option<String>,
    #[schemars(description = "Deprecated alias for `pattern`")]
    pub query: Option<String>,
    #[schemars(
        description = "Comma-separated short codes: ci(case-insensitive, default on), rx(regex), nt(exclude tests), nc(exclude comments), iv(invert), wb(word boundary), fo(files only), cf(count only)"
    )]
    pub flags: Option<String>,
    pub case_insensitive: Option<bool>,
    pub regex: Option<bool>,
    pub word_boundary: Option<bool>,
    pub invert: Option<bool>,
    pub files_only: Option<bool>,
    pub count_only: Option<bool>,
    pub exclude_tests: Option<bool>,
    pub exclude_comments: Option<bool>,
    pub glob: Option<String>,
    pub language: Option<String>,
    #[schemars(description = "Restrict hits to an enclosing symbol of this kind")]
    pub kind: Option<String>,
    pub max_results: Option<usize>,
    pub max_per_file: Option<usize>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetContextRequest {
    #[schemars(description = "Object id previously returned by another tool")]
    pub id: Option<String>,
    #[schemars(description = "Deprecated alias for `id`")]
    pub object_id: Option<String>,
    #[schemars(description = "Symbol name, used when `id` is not known")]
    pub name: Option<String>,
    #[schemars(description = "Restrict a name lookup to one file id")]
    pub file_id: Option<u32>,
    pub max_results: Option<usize>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SemanticAnnotationsRequest {
    #[schemars(description = "Exact annotation label, e.g. `deprecated`")]
    pub label: Option<String>,
    #[schemars(description = "Coarse category, e.g. `security`, `performance`")]
    pub category: Option<String>,
    #[schemars(description = "Include propagated (not just directly annotated) labels")]
    pub include_propagated: Option<bool>,
    #[schemars(description = "Include directly annotated labels (default true)")]
    pub include_direct: Option<bool>,
    #[schemars(description = "Minimum propagated-label strength to include (ignored for direct labels)")]
    pub min_strength: Option<f32>,
    pub max_results: Option<usize>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SideEffectsRequest {
    #[schemars(description = "symbol, file, pure, impure, category, or summary")]
    pub mode: String,
    pub name: Option<String>,
    pub id: Option<String>,
    pub file: Option<String>,
    #[schemars(description = "Effect category name for mode=category, e.g. IO, DATABASE, NETWORK")]
    pub category: Option<String>,
    pub max_results: Option<usize>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CodeInsightRequest {
    #[schemars(description = "overview, detailed, statistics, structure, git_analyze, or git_hotspots")]
    pub mode: String,
    pub top_n: Option<usize>,
    #[schemars(description = "Lookback window in days, for git_analyze/git_hotspots")]
    pub days: Option<u32>,
    #[schemars(description = "Token budget for overview/detailed responses")]
    pub token_budget: Option<u32>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FindFilesRequest {
    #[schemars(description = "Glob-ish pattern: `*suffix`, `prefix*`, or a substring")]
    pub pattern: Option<String>,
    #[schemars(description = "Deprecated alias for `pattern`")]
    pub glob: Option<String>,
    pub language: Option<String>,
    pub max_results: Option<usize>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ContextRequest {
    #[schemars(description = "save, load, list, or delete")]
    pub operation: String,
    pub name: Option<String>,
    #[schemars(description = "Manifest body, required for `save`")]
    pub data: Option<Value>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct InfoRequest {
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

// ============================================================================
// Tool Implementations
// ============================================================================

#[tool_router]
impl CodesightServer {
    #[tool(description = "Search indexed source text. Required: pattern. See `info` for flag codes.")]
    async fn search(
        &self,
        Parameters(req): Parameters<SearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.ensure_ready().await {
            return Ok(tool_error_result("search", e));
        }

        let mut warnings = unknown_field_warnings(&req.extra);
        let pattern = resolve_alias(req.pattern, req.query, "query", "pattern", &mut warnings)
            .unwrap_or_default();

        let mut options = SearchOptions {
            case_insensitive: req.case_insensitive.unwrap_or(true),
            ..SearchOptions::default()
        };
        if let Some(codes) = &req.flags {
            for code in codes.split(',').map(|c| c.trim()) {
                match code {
                    "ci" => options.case_insensitive = true,
                    "rx" => options.regex = true,
                    "nt" => options.exclude_tests = true,
                    "nc" => options.exclude_comments = true,
                    "iv" => options.invert = true,
                    "wb" => options.word_boundary = true,
                    "fo" => options.files_only = true,
                    "cf" => options.count_only = true,
                    "" => {}
                    other => warnings.push(format!("unrecognized flag code `{other}`")),
                }
            }
        }
        if let Some(v) = req.regex {
            options.regex = v;
        }
        if let Some(v) = req.word_boundary {
            options.word_boundary = v;
        }
        if let Some(v) = req.invert {
            options.invert = v;
        }
        if let Some(v) = req.files_only {
            options.files_only = v;
        }
        if let Some(v) = req.count_only {
            options.count_only = v;
        }
        if let Some(v) = req.exclude_tests {
            options.exclude_tests = v;
        }
        if let Some(v) = req.exclude_comments {
            options.exclude_comments = v;
        }
        options.glob = req.glob;
        options.language = req.language;
        options.max_results = req.max_results.unwrap_or(options.max_results);
        options.max_per_file = req.max_per_file.unwrap_or(options.max_per_file);
        if let Some(kind) = &req.kind {
            match parse_symbol_kind(kind) {
                Some(k) => options.symbol_kind = Some(k),
                None => warnings.push(format!("unrecognized symbol kind `{kind}`, ignoring")),
            }
        }

        let index = &self.state.index;
        match search::search(index, &pattern, &options) {
            Ok(SearchOutcome::Count(n)) => Ok(CallToolResult::success(vec![Content::text(
                append_warnings(format!("{n} matches"), &warnings),
            )])),
            Ok(SearchOutcome::Files(files)) => {
                let body = files
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(CallToolResult::success(vec![Content::text(
                    append_warnings(format!("{} files:\n{body}", files.len()), &warnings),
                )]))
            }
            Ok(SearchOutcome::Hits(hits)) => {
                if hits.is_empty() {
                    return Ok(CallToolResult::success(vec![Content::text(
                        append_warnings("no matches".to_string(), &warnings),
                    )]));
                }
                let mut body = format!("{} matches:\n\n", hits.len());
                for hit in &hits {
                    let symbol = hit
                        .symbol
                        .map(|s| format!(" [{}]", s.to_object_id()))
                        .unwrap_or_default();
                    body.push_str(&format!(
                        "{}:{}:{}{}  {}\n",
                        hit.file.display(),
                        hit.line,
                        hit.column,
                        symbol,
                        hit.text.trim()
                    ));
                }
                Ok(CallToolResult::success(vec![Content::text(
                    append_warnings(body, &warnings),
                )]))
            }
            Err(e) => Ok(tool_error_result("search", e)),
        }
    }

    #[tool(description = "Resolve an object id (or name) to full symbol detail: location, signature, effects, callers, callees.")]
    async fn get_context(
        &self,
        Parameters(req): Parameters<GetContextRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.ensure_ready().await {
            return Ok(tool_error_result("get_context", e));
        }
        let mut warnings = unknown_field_warnings(&req.extra);
        let id = resolve_alias(req.id, req.object_id, "object_id", "id", &mut warnings);
        let index = &self.state.index;

        let mut symbols: Vec<SymbolId> = Vec::new();
        if let Some(id) = &id {
            match ObjectId::parse(id) {
                Some(oid) => symbols.push(oid.to_symbol_id()),
                None => {
                    return Ok(tool_error_result(
                        "get_context",
                        ToolError::validation_field(format!("malformed object id `{id}`"), "id"),
                    ));
                }
            }
        } else if let Some(name) = &req.name {
            let mut found = index.find_by_name(name);
            if let Some(file_id) = req.file_id {
                found.retain(|def| def.id.file.0 == file_id);
            }
            symbols.extend(found.iter().map(|def| def.id));
        } else {
            return Ok(tool_error_result(
                "get_context",
                ToolError::validation("either `id` or `name` is required"),
            ));
        }

        if symbols.is_empty() {
            return Ok(tool_error_result(
                "get_context",
                ToolError::not_found(
                    "no symbol matched the given id/name",
                    vec!["try `search` or `find_files` to locate the symbol first".to_string()],
                ),
            ));
        }

        let max = req.max_results.unwrap_or(10);
        let mut body = String::new();
        for sym in symbols.into_iter().take(max) {
            let Some(def) = index.get_symbol(sym) else {
                continue;
            };
            let name = index.resolve(def.name);
            let scoped = index.resolve(def.scoped_name);
            body.push_str(&format!(
                "{} [{}]\n  id: {}\n  kind: {:?}\n  location: {}:{}-{}\n  visibility: {:?}\n",
                scoped,
                name,
                sym.to_object_id(),
                def.kind,
                def.location.file.display(),
                def.location.start_line,
                def.location.end_line,
                def.visibility,
            ));
            if let Some(sig) = &def.signature {
                body.push_str(&format!(
                    "  signature: ({}) -> {}\n",
                    sig.params.join(", "),
                    sig.return_type.as_deref().unwrap_or("()")
                ));
            }
            if let Some(doc) = &def.doc_comment {
                body.push_str(&format!("  doc: {}\n", doc.lines().next().unwrap_or("")));
            }
            if let Some(effects) = index.effects.get(&sym) {
                body.push_str(&format!(
                    "  effects: local={:?} transitive={:?} confidence={:?} pure={}\n",
                    effects.local.names(),
                    effects.transitive.names(),
                    effects.confidence,
                    effects.is_pure
                ));
            }
            if let Some(anns) = index.annotations.get(&sym) {
                let labels: Vec<&str> = anns.iter().map(|a| a.key.as_str()).collect();
                body.push_str(&format!("  annotations: {}\n", labels.join(", ")));
            }
            let callers = index.find_callers(sym, name);
            let callees = index.find_callees(sym);
            body.push_str(&format!(
                "  callers: {}, callees: {}\n\n",
                callers.len(),
                callees.len()
            ));
        }

        Ok(CallToolResult::success(vec![Content::text(
            append_warnings(body, &warnings),
        )]))
    }

    #[tool(description = "Query symbols by direct annotation label or category. Required: label or category.")]
    async fn semantic_annotations(
        &self,
        Parameters(req): Parameters<SemanticAnnotationsRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.ensure_ready().await {
            return Ok(tool_error_result("semantic_annotations", e));
        }
        let warnings = unknown_field_warnings(&req.extra);
        if req.label.is_none() && req.category.is_none() {
            return Ok(tool_error_result(
                "semantic_annotations",
                ToolError::validation("either `label` or `category` is required"),
            ));
        }

        let index = &self.state.index;
        let include_propagated = req.include_propagated.unwrap_or(true);
        let include_direct = req.include_direct.unwrap_or(true);
        let min_strength = req.min_strength.unwrap_or(0.0);
        let max = req.max_results.unwrap_or(50);
        let mut rows: Vec<String> = Vec::new();

        if include_direct {
            for entry in index.annotations.iter() {
                let symbol = *entry.key();
                for ann in entry.value() {
                    let matches_label = req.label.as_deref() == Some(ann.key.as_str());
                    let matches_category = req.category.as_deref().is_some_and(|c| {
                        ann.category.as_deref() == Some(c)
                            || crate::annotations::category_for(&ann.key).as_deref() == Some(c)
                    });
                    if matches_label || matches_category {
                        if let Some(def) = index.get_symbol(symbol) {
                            rows.push(format!(
                                "{} [{}] direct @{}{}",
                                index.resolve(def.scoped_name),
                                symbol.to_object_id(),
                                ann.key,
                                if ann.values.is_empty() {
                                    String::new()
                                } else {
                                    format!("[{}]", ann.values.join(","))
                                }
                            ));
                        }
                    }
                }
            }
        }

        if include_propagated {
            for entry in index.propagated_labels.iter() {
                let symbol = *entry.key();
                for label in entry.value() {
                    if label.strength < min_strength {
                        continue;
                    }
                    let matches_label = req.label.as_deref() == Some(label.label.as_str());
                    let matches_category = req
                        .category
                        .as_deref()
                        .is_some_and(|c| crate::annotations::category_for(&label.label).as_deref() == Some(c));
                    if matches_label || matches_category {
                        if let Some(def) = index.get_symbol(symbol) {
                            rows.push(format!(
                                "{} [{}] propagated @{} strength={:.2} hops={} from={}",
                                index.resolve(def.scoped_name),
                                symbol.to_object_id(),
                                label.label,
                                label.strength,
                                label.hops,
                                label.source.to_object_id(),
                            ));
                        }
                    }
                }
            }
        }

        rows.truncate(max);
        let body = if rows.is_empty() {
            "no symbols matched".to_string()
        } else {
            rows.join("\n")
        };
        Ok(CallToolResult::success(vec![Content::text(
            append_warnings(body, &warnings),
        )]))
    }

    #[tool(description = "Query purity/effects. Required: mode (symbol/file/pure/impure/category/summary).")]
    async fn side_effects(
        &self,
        Parameters(req): Parameters<SideEffectsRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.ensure_ready().await {
            return Ok(tool_error_result("side_effects", e));
        }
        let warnings = unknown_field_warnings(&req.extra);
        let index = &self.state.index;
        let max = req.max_results.unwrap_or(50);

        let body = match req.mode.as_str() {
            "symbol" => {
                let sym = if let Some(id) = &req.id {
                    ObjectId::parse(id).map(|o| o.to_symbol_id())
                } else if let Some(name) = &req.name {
                    index.find_by_name(name).first().map(|d| d.id)
                } else {
                    None
                };
                match sym.and_then(|s| index.effects.get(&s).map(|e| (s, e.clone()))) {
                    Some((sym, info)) => format!(
                        "{}: local={:?} transitive={:?} confidence={:?} pure={} purity_score={:.2}\nreasons: {}",
                        sym.to_object_id(),
                        info.local.names(),
                        info.transitive.names(),
                        info.confidence,
                        info.is_pure,
                        info.purity_score(),
                        info.reasons.join("; ")
                    ),
                    None => {
                        return Ok(tool_error_result(
                            "side_effects",
                            ToolError::not_found(
                                "no effect record for that symbol",
                                vec!["supply `id` or `name` of an indexed function/method".to_string()],
                            ),
                        ));
                    }
                }
            }
            "file" => {
                let Some(file) = &req.file else {
                    return Ok(tool_error_result(
                        "side_effects",
                        ToolError::validation_field("mode=file requires `file`", "file"),
                    ));
                };
                let path = PathBuf::from(file);
                let Some(file_id) = index.file_ids.get(&path).map(|e| *e) else {
                    return Ok(tool_error_result(
                        "side_effects",
                        ToolError::not_found(format!("file not indexed: {file}"), vec![]),
                    ));
                };
                let ids = index.file_symbols.get(&file_id).map(|v| v.clone()).unwrap_or_default();
                let mut impure = 0usize;
                let mut rows = Vec::new();
                for id in &ids {
                    if let Some(info) = index.effects.get(id) {
                        if !info.is_pure {
                            impure += 1;
                        }
                        if let Some(def) = index.get_symbol(*id) {
                            rows.push(format!(
                                "  {} pure={} effects={:?}",
                                index.resolve(def.name),
                                info.is_pure,
                                info.local.union(info.transitive).names()
                            ));
                        }
                    }
                }
                format!(
                    "{file}: {} symbols, {impure} impure\n{}",
                    ids.len(),
                    rows.join("\n")
                )
            }
            "pure" | "impure" => {
                let want_pure = req.mode == "pure";
                let mut rows: Vec<String> = index
                    .effects
                    .iter()
                    .filter(|e| e.value().is_pure == want_pure)
                    .filter_map(|e| {
                        let sym = *e.key();
                        index.get_symbol(sym)
                            .map(|def| format!("{} [{}]", index.resolve(def.scoped_name), sym.to_object_id()))
                    })
                    .collect();
                rows.sort();
                rows.truncate(max);
                if rows.is_empty() {
                    "no matching symbols".to_string()
                } else {
                    rows.join("\n")
                }
            }
            "category" => {
                let Some(category) = &req.category else {
                    return Ok(tool_error_result(
                        "side_effects",
                        ToolError::validation_field("mode=category requires `category`", "category"),
                    ));
                };
                let Some((_, bit)) = crate::types::EffectSet::ALL_NAMES
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(category))
                else {
                    return Ok(tool_error_result(
                        "side_effects",
                        ToolError::validation_field(
                            format!("unknown effect category `{category}`"),
                            "category",
                        ),
                    ));
                };
                let mut rows: Vec<String> = index
                    .effects
                    .iter()
                    .filter(|e| e.value().local.union(e.value().transitive).contains(*bit))
                    .filter_map(|e| {
                        let sym = *e.key();
                        index.get_symbol(sym)
                            .map(|def| format!("{} [{}]", index.resolve(def.scoped_name), sym.to_object_id()))
                    })
                    .collect();
                rows.sort();
                rows.truncate(max);
                if rows.is_empty() {
                    format!("no symbols observed with {category}")
                } else {
                    rows.join("\n")
                }
            }
            "summary" => {
                let total = index.effects.len();
                let pure = index.effects.iter().filter(|e| e.value().is_pure).count();
                let mut by_category: HashMap<&'static str, usize> = HashMap::new();
                for e in index.effects.iter() {
                    for name in e.value().local.union(e.value().transitive).names() {
                        *by_category.entry(name).or_insert(0) += 1;
                    }
                }
                let mut lines: Vec<String> = by_category
                    .into_iter()
                    .map(|(name, count)| format!("  {name}: {count}"))
                    .collect();
                lines.sort();
                format!(
                    "{total} symbols analyzed, {pure} pure ({:.1}%)\n{}",
                    if total > 0 { pure as f64 / total as f64 * 100.0 } else { 0.0 },
                    lines.join("\n")
                )
            }
            other => {
                return Ok(tool_error_result(
                    "side_effects",
                    ToolError::validation_field(format!("unknown mode `{other}`"), "mode"),
                ));
            }
        };

        Ok(CallToolResult::success(vec![Content::text(
            append_warnings(body, &warnings),
        )]))
    }

    #[tool(description = "Aggregate analysis: overview/detailed/statistics/structure/git_analyze/git_hotspots.")]
    async fn code_insight(
        &self,
        Parameters(req): Parameters<CodeInsightRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.ensure_ready().await {
            return Ok(tool_error_result("code_insight", e));
        }
        let warnings = unknown_field_warnings(&req.extra);
        let index = &self.state.index;
        let top_n = req.top_n.unwrap_or(10);

        let body = match req.mode.as_str() {
            "statistics" => {
                let stats = index.stats();
                format!(
                    "files={} symbols={} call_edges={} references={} topology_nodes={}",
                    stats.file_count,
                    stats.symbol_count,
                    stats.call_edge_count,
                    stats.reference_count,
                    stats.topology_node_count
                )
            }
            "overview" => {
                let stats = index.stats();
                let complexity = analysis::complexity::analyze(index, top_n);
                let hotspots = analysis::hotspots::analyze(
                    index,
                    &analysis::hotspots::HotspotConfig::default(),
                    top_n,
                );
                let smells = analysis::smells::analyze(index);
                format!(
                    "{} files, {} symbols\ncomplexity: avg={:.1} median={:.1} p90={:.1} (low={} medium={} high={})\nhotspots: {}\nsmells: {}",
                    stats.file_count,
                    stats.symbol_count,
                    complexity.average,
                    complexity.median,
                    complexity.p90,
                    complexity.distribution.low,
                    complexity.distribution.medium,
                    complexity.distribution.high,
                    hotspots.len(),
                    smells.len(),
                )
            }
            "detailed" => {
                let complexity = analysis::complexity::analyze(index, top_n);
                let hotspots = analysis::hotspots::analyze(
                    index,
                    &analysis::hotspots::HotspotConfig::default(),
                    top_n,
                );
                let smells = analysis::smells::analyze(index);
                let perf = analysis::perf::analyze(index);
                let modules = analysis::modules::analyze(index);

                let weights = analysis::token_budget::SectionWeights::default();
                let sections = vec![
                    analysis::token_budget::Section {
                        name: "critical_functions",
                        weight_per_item: weights.critical_function,
                        item_count: complexity.top.len(),
                        essential: true,
                    },
                    analysis::token_budget::Section {
                        name: "module_boundaries",
                        weight_per_item: weights.module_boundary,
                        item_count: modules.len(),
                        essential: false,
                    },
                ];
                let mut budget_config = analysis::token_budget::BudgetConfig::default();
                if let Some(budget) = req.token_budget {
                    budget_config.budget = budget;
                }
                let budget_config = budget_config.clamp_budget();
                let reduced = analysis::token_budget::reduce(&sections, &budget_config);
                let critical_kept = reduced
                    .iter()
                    .find(|s| s.name == "critical_functions")
                    .map(|s| s.kept_items)
                    .unwrap_or(complexity.top.len());
                let (module_kept, module_dropped) = reduced
                    .iter()
                    .find(|s| s.name == "module_boundaries")
                    .map(|s| (s.kept_items, s.dropped))
                    .unwrap_or((modules.len(), false));

                let mut body = format!("top complexity ({critical_kept} of {}):\n", complexity.top.len());
                for entry in complexity.top.iter().take(critical_kept) {
                    body.push_str(&format!("  {} [{}] CC={}\n", entry.name, entry.object_id, entry.cc));
                }
                body.push_str(&format!("\nhotspots ({}):\n", hotspots.len()));
                for h in &hotspots {
                    body.push_str(&format!(
                        "  {} [{}] CC={} lines={} risk={:.1}\n",
                        h.name, h.object_id, h.cc, h.lines, h.risk
                    ));
                }
                body.push_str(&format!("\nsmells ({}):\n", smells.len()));
                for s in &smells {
                    body.push_str(&format!(
                        "  {:?}/{:?} {} [{}] {}\n",
                        s.kind, s.severity, s.name, s.object_id, s.detail
                    ));
                }
                body.push_str(&format!("\nperf findings ({}):\n", perf.len()));
                for p in &perf {
                    body.push_str(&format!(
                        "  {} {} [{}] ({})\n",
                        p.pattern.label(),
                        p.name,
                        p.object_id,
                        p.language
                    ));
                }
                if module_dropped {
                    body.push_str("\nmodule_boundaries: dropped to fit token budget\n");
                } else {
                    body.push_str(&format!("\nmodules ({} of {}):\n", module_kept, modules.len()));
                    for m in modules.iter().take(module_kept) {
                        body.push_str(&format!(
                            "  {}: symbols={} cohesion={:.2} coupling={:.2} stability={:.2}\n",
                            m.path.display(), m.symbol_count, m.cohesion, m.coupling, m.stability
                        ));
                    }
                }
                body
            }
            "structure" => {
                let modules = analysis::modules::analyze(index);
                let layers = analysis::modules::classify_layers(index);
                let mut body = format!("{} modules:\n", modules.len());
                for m in &modules {
                    body.push_str(&format!(
                        "  {}: symbols={} cohesion={:.2} coupling={:.2} stability={:.2}\n",
                        m.path.display(), m.symbol_count, m.cohesion, m.coupling, m.stability
                    ));
                }
                body.push_str("\nlayers:\n");
                for (layer, count) in &layers.counts {
                    body.push_str(&format!("  {layer:?}: {count}\n"));
                }
                if !layers.violations.is_empty() {
                    body.push_str("\nviolations:\n");
                    for v in &layers.violations {
                        body.push_str(&format!("  {}: {}\n", v.kind, v.detail));
                    }
                }
                body
            }
            "git_analyze" => {
                let days = req.days.unwrap_or(30);
                match analysis::ChurnAnalyzer::analyze(&self.state.workspace_root, days) {
                    Ok(report) => {
                        let mut body = format!("{} files with history:\n", report.file_churn.len());
                        for fc in report.file_churn.iter().take(top_n) {
                            body.push_str(&format!(
                                "  {}: commits={} +{}/-{} authors={}\n",
                                fc.path.display(), fc.commits, fc.lines_added, fc.lines_removed, fc.authors.len()
                            ));
                        }
                        body
                    }
                    Err(e) => return Ok(tool_error_result("code_insight", ToolError::from(e))),
                }
            }
            "git_hotspots" => {
                let days = req.days.unwrap_or(30);
                match analysis::ChurnAnalyzer::analyze(&self.state.workspace_root, days) {
                    Ok(report) => {
                        let mut body = format!("{} churn hotspots:\n", report.hotspots.len());
                        for (path, commits) in report.hotspots.iter().take(top_n) {
                            body.push_str(&format!("  {}: {commits} commits\n", path.display()));
                        }
                        body
                    }
                    Err(e) => return Ok(tool_error_result("code_insight", ToolError::from(e))),
                }
            }
            other => {
                return Ok(tool_error_result(
                    "code_insight",
                    ToolError::validation_field(format!("unknown mode `{other}`"), "mode"),
                ));
            }
        };

        Ok(CallToolResult::success(vec![Content::text(
            append_warnings(body, &warnings),
        )]))
    }

    #[tool(description = "Search indexed file paths by glob/substring. Required: pattern.")]
    async fn find_files(
        &self,
        Parameters(req): Parameters<FindFilesRequest>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.ensure_ready().await {
            return Ok(tool_error_result("find_files", e));
        }
        let mut warnings = unknown_field_warnings(&req.extra);
        let pattern = resolve_alias(req.pattern, req.glob, "glob", "pattern", &mut warnings);
        let Some(pattern) = pattern else {
            return Ok(tool_error_result(
                "find_files",
                ToolError::validation_field("pattern is required", "pattern"),
            ));
        };

        let index = &self.state.index;
        let max = req.max_results.unwrap_or(200);
        let mut matches: Vec<PathBuf> = index
            .file_ids
            .iter()
            .map(|e| e.key().clone())
            .filter(|path| search::glob_matches(&pattern, path))
            .filter(|path| {
                req.language
                    .as_ref()
                    .map(|lang| path.extension().and_then(|e| e.to_str()) == Some(lang.as_str()))
                    .unwrap_or(true)
            })
            .collect();
        matches.sort();
        matches.truncate(max);

        let body = if matches.is_empty() {
            "no files matched".to_string()
        } else {
            matches
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join("\n")
        };
        Ok(CallToolResult::success(vec![Content::text(
            append_warnings(format!("{} files:\n{body}", matches.len()), &warnings),
        )]))
    }

    #[tool(description = "Save/load/list/delete an in-memory context manifest for this session. Required: operation.")]
    async fn context(
        &self,
        Parameters(req): Parameters<ContextRequest>,
    ) -> Result<CallToolResult, McpError> {
        let warnings = unknown_field_warnings(&req.extra);
        let body = match req.operation.as_str() {
            "save" => {
                let Some(name) = &req.name else {
                    return Ok(tool_error_result(
                        "context",
                        ToolError::validation_field("save requires `name`", "name"),
                    ));
                };
                let Some(data) = req.data else {
                    return Ok(tool_error_result(
                        "context",
                        ToolError::validation_field("save requires `data`", "data"),
                    ));
                };
                self.state.manifests.insert(name.clone(), data);
                format!("saved manifest `{name}`")
            }
            "load" => {
                let Some(name) = &req.name else {
                    return Ok(tool_error_result(
                        "context",
                        ToolError::validation_field("load requires `name`", "name"),
                    ));
                };
                match self.state.manifests.get(name) {
                    Some(data) => serde_json::to_string_pretty(data.value())
                        .unwrap_or_else(|_| "<unserializable manifest>".to_string()),
                    None => {
                        return Ok(tool_error_result(
                            "context",
                            ToolError::not_found(
                                format!("no manifest named `{name}`"),
                                vec!["use operation=list to see saved manifests".to_string()],
                            ),
                        ));
                    }
                }
            }
            "list" => {
                let mut names: Vec<String> = self.state.manifests.iter().map(|e| e.key().clone()).collect();
                names.sort();
                if names.is_empty() {
                    "no saved manifests".to_string()
                } else {
                    names.join("\n")
                }
            }
            "delete" => {
                let Some(name) = &req.name else {
                    return Ok(tool_error_result(
                        "context",
                        ToolError::validation_field("delete requires `name`", "name"),
                    ));
                };
                match self.state.manifests.remove(name) {
                    Some(_) => format!("deleted manifest `{name}`"),
                    None => format!("no manifest named `{name}` (nothing to delete)"),
                }
            }
            other => {
                return Ok(tool_error_result(
                    "context",
                    ToolError::validation_field(format!("unknown operation `{other}`"), "operation"),
                ));
            }
        };

        Ok(CallToolResult::success(vec![Content::text(
            append_warnings(body, &warnings),
        )]))
    }

    #[tool(description = "Describe the tool surface and current index status.")]
    async fn info(
        &self,
        Parameters(req): Parameters<InfoRequest>,
    ) -> Result<CallToolResult, McpError> {
        let warnings = unknown_field_warnings(&req.extra);
        let status = self.state.manager.status();
        let body = format!(
            "{} v{}\nworkspace: {}\nindex status: {:?}\n\nTools:\n  search            pattern search with options (required: pattern)\n  get_context       resolve object id(s) to full detail (required: id or name)\n  semantic_annotations  query by label/category (required: label or category)\n  side_effects      query purity/effects (required: mode)\n  code_insight      aggregate analysis (required: mode)\n  find_files        path search (required: pattern)\n  context           save/load context manifests (required: operation)\n  info              this tool",
            crate::SERVER_NAME,
            crate::SERVER_VERSION,
            self.state.workspace_root.display(),
            status,
        );
        Ok(CallToolResult::success(vec![Content::text(
            append_warnings(body, &warnings),
        )]))
    }
}

// ============================================================================
// MCP Server Handler Implementation
// ============================================================================

#[tool_handler]
impl ServerHandler for CodesightServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(format!(
                "{} v{} - local code-intelligence index. Search, symbol context, purity/effect analysis, and aggregate code insight over the indexed workspace.",
                crate::SERVER_NAME,
                crate::SERVER_VERSION
            )),
        }
    }
}

// ============================================================================
// Server Entry Point
// ============================================================================

pub async fn run_server(workspace_root: PathBuf) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("codesight_core=info".parse().unwrap()),
        )
        .init();

    tracing::info!("starting {} v{}", crate::SERVER_NAME, crate::SERVER_VERSION);
    tracing::info!("workspace root: {}", workspace_root.display());

    let server = CodesightServer::new(workspace_root);
    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    tracing::info!("server shutdown");
    Ok(())
}
