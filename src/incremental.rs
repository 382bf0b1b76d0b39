//! Incremental indexing engine.
//!
//! Tracks per-file fingerprints (mtime + size) in memory so a re-index only
//! re-parses files that actually changed. Unlike the earlier on-disk-cache
//! design, nothing here survives process restart — a fresh process always
//! starts from [`IncrementalIndexer::default`] and treats every file as new.

use crate::ids::FileId;
use crate::parsing;
use crate::state::CodeIndex;
use crate::topology::TopologyBuilder;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tree_sitter::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileFingerprint {
    mtime_ms: u64,
    size_bytes: u64,
}

/// Incremental indexer that updates the state when files change.
pub struct IncrementalIndexer {
    topology_builder: TopologyBuilder,
    fingerprints: Mutex<HashMap<PathBuf, FileFingerprint>>,
}

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub force: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub no_default_excludes: bool,
    pub include_hidden: bool,
    pub include_large: bool,
    pub max_file_size: u64,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            force: false,
            include: Vec::new(),
            exclude: Vec::new(),
            no_default_excludes: false,
            include_hidden: false,
            include_large: false,
            max_file_size: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    pub total_files: usize,
    pub parsed_files: usize,
    pub skipped_files: usize,
    pub removed_files: usize,
}

struct ParsedFile {
    symbols: Vec<crate::types::SymbolDef>,
    calls: Vec<crate::types::CallEdge>,
    refs: Vec<crate::types::Reference>,
    imports: Vec<crate::types::ImportInfo>,
    scopes: Vec<crate::types::Scope>,
}

impl IncrementalIndexer {
    pub fn new() -> Self {
        Self {
            topology_builder: TopologyBuilder::new(),
            fingerprints: Mutex::new(HashMap::new()),
        }
    }

    /// Full re-index from scratch: forces every file through [`Self::index`]
    /// regardless of fingerprint.
    pub async fn full_index(&self, state: &CodeIndex, root: &Path) -> Result<IndexReport> {
        self.index(
            state,
            root,
            &IndexOptions {
                force: true,
                ..Default::default()
            },
        )
        .await
    }

    pub async fn index(
        &self,
        state: &CodeIndex,
        root: &Path,
        options: &IndexOptions,
    ) -> Result<IndexReport> {
        tracing::info!("Starting incremental index of {}", root.display());

        if options.force {
            state.reset();
            self.fingerprints.lock().clear();
        }

        let discovery = build_discovery(options);
        let files = discovery.discover(root)?;
        let files: Vec<PathBuf> = files
            .into_iter()
            .filter(|path| parsing::parser_for_file(path).is_some())
            .collect();

        let mut report = IndexReport {
            total_files: files.len(),
            ..Default::default()
        };

        let mut seen = HashSet::new();
        let mut changed_files = Vec::new();

        {
            let mut fingerprints = self.fingerprints.lock();
            for file in &files {
                seen.insert(file.clone());
                let current = fingerprint(file)?;
                match fingerprints.get(file) {
                    Some(prev) if *prev == current => {
                        report.skipped_files += 1;
                    }
                    _ => {
                        fingerprints.insert(file.clone(), current);
                        changed_files.push(file.clone());
                    }
                }
            }

            let removed: Vec<PathBuf> = fingerprints
                .keys()
                .filter(|p| !seen.contains(*p))
                .cloned()
                .collect();
            for path in &removed {
                fingerprints.remove(path);
            }
            report.removed_files = removed.len();
            drop(fingerprints);

            for path in removed {
                self.remove_file(state, &path);
            }
        }

        for path in &changed_files {
            match self.update_file(state, path, root).await {
                Ok(()) => report.parsed_files += 1,
                Err(e) => {
                    tracing::warn!("Failed to index {}: {}", path.display(), e);
                }
            }
        }

        self.topology_builder.build(state, root)?;
        *state.last_indexed.write() = Some(std::time::Instant::now());

        let stats = state.stats();
        tracing::info!(
            "Index complete: {} files, {} symbols, {} call edges",
            stats.file_count,
            stats.symbol_count,
            stats.call_edge_count
        );

        Ok(report)
    }

    async fn parse_file(&self, state: &CodeIndex, path: &Path) -> Result<(FileId, ParsedFile)> {
        let lang_parser = parsing::parser_for_file(path)
            .with_context(|| format!("No parser for {}", path.display()))?;

        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let mut parser = Parser::new();
        parser
            .set_language(&lang_parser.language())
            .context("Failed to set parser language")?;

        let tree = parser
            .parse(&contents, None)
            .context("Failed to parse file")?;

        let file_id = state.get_or_create_file_id(&path.to_path_buf());

        let symbols =
            lang_parser.extract_symbols(&tree, &contents, file_id, path, &state.interner)?;
        let table = parsing::build_symbol_table(&symbols, &state.interner);
        let calls = lang_parser.extract_calls(&tree, &contents, path, &table)?;
        let refs = lang_parser.extract_references(&tree, &contents, path, &table)?;
        let imports = lang_parser.extract_imports(&tree, &contents, path)?;
        let scopes = lang_parser.extract_scopes(&tree, &contents)?;

        state
            .file_contents
            .insert(path.to_path_buf(), contents.as_str().into());
        state.trigram.write().index_file(file_id, &contents);

        Ok((
            file_id,
            ParsedFile {
                symbols,
                calls,
                refs,
                imports,
                scopes,
            },
        ))
    }

    /// Re-parse and publish a single file, replacing whatever was indexed
    /// for it before.
    pub async fn update_file(&self, state: &CodeIndex, path: &Path, _root: &Path) -> Result<()> {
        let (file_id, parsed) = self.parse_file(state, path).await?;
        state.publish_file(
            file_id,
            parsed.symbols,
            parsed.calls,
            parsed.refs,
            parsed.imports,
            parsed.scopes,
        );
        Ok(())
    }

    /// Remove a file from the index.
    pub fn remove_file(&self, state: &CodeIndex, path: &Path) {
        state.clear_file(&path.to_path_buf());
        self.topology_builder.remove_file(state, path).ok();
    }
}

impl Default for IncrementalIndexer {
    fn default() -> Self {
        Self::new()
    }
}

fn build_discovery(options: &IndexOptions) -> crate::discovery::FileDiscovery {
    let mut discovery =
        crate::discovery::FileDiscovery::new().with_max_file_size(options.max_file_size);
    if options.no_default_excludes {
        discovery = discovery.without_default_excludes();
    }
    if options.include_hidden {
        discovery = discovery.include_hidden();
    }
    if options.include_large {
        discovery = discovery.include_large();
    }
    for pattern in &options.include {
        discovery = discovery.with_include(pattern);
    }
    for pattern in &options.exclude {
        discovery = discovery.with_exclude(pattern);
    }
    discovery
}

fn fingerprint(path: &Path) -> Result<FileFingerprint> {
    let metadata =
        std::fs::metadata(path).with_context(|| format!("Failed to stat {}", path.display()))?;
    let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
    let duration = modified.duration_since(UNIX_EPOCH).unwrap_or_default();
    Ok(FileFingerprint {
        mtime_ms: duration.as_millis() as u64,
        size_bytes: metadata.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_options_default_caps_file_size() {
        let opts = IndexOptions::default();
        assert_eq!(opts.max_file_size, 2 * 1024 * 1024);
        assert!(!opts.force);
    }
}
