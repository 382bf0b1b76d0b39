//! Parsing module for extracting symbols from source code.
//!
//! Uses tree-sitter for incremental, error-tolerant parsing. A parser runs in
//! two passes over the same tree: [`LanguageParser::extract_symbols`] assigns
//! every definition a [`SymbolId`] local to the file, then
//! [`LanguageParser::extract_calls`]/[`extract_references`] resolve their
//! *caller*/*origin* against the symbol table the first pass produced.
//! Callees are intentionally left as `SymbolId::UNRESOLVED` at this stage —
//! cross-file resolution happens once every file in the index has been
//! parsed, since a callee's definition may live in a file not yet visited.

pub mod rust;
pub mod typescript;

use crate::ids::{FileId, SymbolId};
use crate::types::*;
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use tree_sitter::{Language, Tree};

/// Scoped name -> id table built from one file's `extract_symbols` output,
/// used to resolve `caller`/`origin` in the later passes.
pub type SymbolTable = HashMap<String, SymbolId>;

/// Trait for language-specific parsers.
pub trait LanguageParser: Send + Sync {
    /// Get the tree-sitter language.
    fn language(&self) -> Language;

    /// File extensions this parser handles.
    fn extensions(&self) -> &[&str];

    /// Extract symbol definitions from a parsed tree, assigning each a
    /// `SymbolId` scoped to `file`.
    fn extract_symbols(
        &self,
        tree: &Tree,
        source: &str,
        file: FileId,
        path: &Path,
        interner: &lasso::ThreadedRodeo,
    ) -> Result<Vec<SymbolDef>>;

    /// Extract call edges. `callee` is left unresolved; `table` resolves
    /// `caller` against the symbols `extract_symbols` just produced.
    fn extract_calls(
        &self,
        tree: &Tree,
        source: &str,
        path: &Path,
        table: &SymbolTable,
    ) -> Result<Vec<CallEdge>>;

    /// Extract general (non-call) references: reads, writes, type mentions.
    fn extract_references(
        &self,
        tree: &Tree,
        source: &str,
        path: &Path,
        table: &SymbolTable,
    ) -> Result<Vec<Reference>>;

    /// Extract the scope containment tree for a file.
    fn extract_scopes(&self, tree: &Tree, source: &str) -> Result<Vec<Scope>>;

    /// Extract import information from a parsed tree.
    fn extract_imports(&self, tree: &Tree, source: &str, file: &Path) -> Result<Vec<ImportInfo>>;
}

/// Build a scoped-name -> id lookup table from one file's parsed symbols.
pub fn build_symbol_table(symbols: &[SymbolDef], interner: &lasso::ThreadedRodeo) -> SymbolTable {
    symbols
        .iter()
        .map(|s| (interner.resolve(&s.scoped_name).to_string(), s.id))
        .collect()
}

/// Get a parser for a file based on its extension.
pub fn parser_for_file(path: &Path) -> Option<Box<dyn LanguageParser>> {
    let ext = path.extension()?.to_str()?;
    match ext.to_lowercase().as_str() {
        "rs" => Some(Box::new(rust::RustParser::new())),
        "ts" | "mts" | "cts" => Some(Box::new(typescript::TypeScriptParser::new_typescript())),
        "tsx" => Some(Box::new(typescript::TypeScriptParser::new_tsx())),
        _ => None,
    }
}

/// Short language tag for a file, independent of whether a parser is
/// registered for it (`FileInfo::language` uses this).
pub fn language_tag(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    match ext.as_str() {
        "rs" => "rust",
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "tsx",
        _ => "unknown",
    }
    .to_string()
}
