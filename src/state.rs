//! The Master Index: authoritative, thread-safe storage for the symbol
//! graph, call/reference graph, side effects, and annotations.
//!
//! Readers never block each other (`DashMap`, `parking_lot::RwLock` read
//! guards); a writer publishes a file's parsed results atomically by holding
//! the relevant per-file entries only for the duration of the insert, never
//! across an `.await`.

use crate::errors::ToolError;
use crate::ids::{FileId, LocalSymbolId, SymbolId};
use crate::types::*;
use dashmap::DashMap;
use lasso::ThreadedRodeo;
use parking_lot::RwLock;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Thread-safe string interner for symbol and scope names.
pub type Interner = ThreadedRodeo;

/// The complete state of the index for one workspace root.
pub struct CodeIndex {
    // ------------------------------------------------------------------
    // Module topology
    // ------------------------------------------------------------------
    pub topology: RwLock<StableGraph<TopologyNode, TopologyEdge>>,
    pub path_to_node: DashMap<PathBuf, NodeIndex>,
    pub topology_metrics: DashMap<NodeIndex, TopologyMetrics>,

    // ------------------------------------------------------------------
    // Symbol resolution (Master Index)
    // ------------------------------------------------------------------
    /// All symbol definitions, keyed by composite id.
    pub symbols: DashMap<SymbolId, SymbolDef>,
    /// Simple name -> symbol ids sharing that name (unscoped lookups).
    pub name_to_ids: DashMap<InternedString, Vec<SymbolId>>,
    /// File -> symbol ids defined in that file, in parse order.
    pub file_symbols: DashMap<FileId, Vec<SymbolId>>,
    /// Call graph edges.
    pub call_edges: RwLock<Vec<CallEdge>>,
    /// General typed references (read/write/call/import/type-ref).
    pub references: RwLock<Vec<Reference>>,
    /// Import graph, by file.
    pub imports: DashMap<FileId, Vec<ImportInfo>>,
    /// Scope containment tree, by file.
    pub scopes: DashMap<FileId, Vec<Scope>>,

    // ------------------------------------------------------------------
    // Side effects & annotations
    // ------------------------------------------------------------------
    pub effects: DashMap<SymbolId, SideEffectInfo>,
    pub annotations: DashMap<SymbolId, Vec<Annotation>>,
    pub propagated_labels: DashMap<SymbolId, Vec<PropagatedLabel>>,

    // ------------------------------------------------------------------
    // Trigram search index
    // ------------------------------------------------------------------
    pub trigram: RwLock<crate::trigram::TrigramIndex>,

    // ------------------------------------------------------------------
    // File management
    // ------------------------------------------------------------------
    pub file_contents: DashMap<PathBuf, Arc<str>>,
    pub file_ids: DashMap<PathBuf, FileId>,
    file_id_counter: AtomicU32,

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------
    pub interner: Interner,
    pub root_path: PathBuf,
    pub git_hash: RwLock<Option<String>>,
    pub last_indexed: RwLock<Option<Instant>>,
    pub file_count: AtomicU32,
    pub symbol_count: AtomicU32,

    /// Set by [`CodeIndex::close`]; once set, every read/write operation
    /// returns `NotAvailable` instead of touching the underlying tables.
    closed: AtomicBool,
}

impl CodeIndex {
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            topology: RwLock::new(StableGraph::new()),
            path_to_node: DashMap::new(),
            topology_metrics: DashMap::new(),

            symbols: DashMap::new(),
            name_to_ids: DashMap::new(),
            file_symbols: DashMap::new(),
            call_edges: RwLock::new(Vec::new()),
            references: RwLock::new(Vec::new()),
            imports: DashMap::new(),
            scopes: DashMap::new(),

            effects: DashMap::new(),
            annotations: DashMap::new(),
            propagated_labels: DashMap::new(),

            trigram: RwLock::new(crate::trigram::TrigramIndex::new()),

            file_contents: DashMap::new(),
            file_ids: DashMap::new(),
            // File id 0 is the unresolved-symbol sentinel; real files start at 1.
            file_id_counter: AtomicU32::new(1),

            interner: ThreadedRodeo::default(),
            root_path,
            git_hash: RwLock::new(None),
            last_indexed: RwLock::new(None),
            file_count: AtomicU32::new(0),
            symbol_count: AtomicU32::new(0),

            closed: AtomicBool::new(false),
        }
    }

    /// `Err(NotAvailable)` once [`close`](Self::close) has been called.
    fn check_open(&self) -> Result<(), ToolError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(ToolError::not_available("index is closed"))
        } else {
            Ok(())
        }
    }

    /// Get or create a `FileId` for a path.
    pub fn get_or_create_file_id(&self, path: &PathBuf) -> FileId {
        if let Some(id) = self.file_ids.get(path) {
            return *id;
        }
        let id = FileId(self.file_id_counter.fetch_add(1, Ordering::SeqCst));
        self.file_ids.insert(path.clone(), id);
        self.file_count.fetch_add(1, Ordering::SeqCst);
        id
    }

    pub fn path_for_file(&self, file: FileId) -> Option<PathBuf> {
        self.file_ids
            .iter()
            .find(|e| *e.value() == file)
            .map(|e| e.key().clone())
    }

    pub fn intern(&self, s: &str) -> InternedString {
        self.interner.get_or_intern(s)
    }

    pub fn resolve(&self, s: InternedString) -> &str {
        self.interner.resolve(&s)
    }

    /// Publish one file's parsed symbols, call edges, references, imports and
    /// scopes atomically: the file's old entries (if any) are cleared first,
    /// then every new entry is inserted before this call returns, so no
    /// reader ever observes a half-updated file.
    pub fn publish_file(
        &self,
        file: FileId,
        symbols: Vec<SymbolDef>,
        calls: Vec<CallEdge>,
        refs: Vec<Reference>,
        imports: Vec<ImportInfo>,
        scopes: Vec<Scope>,
    ) {
        self.clear_file_data(file);

        let mut ids = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let id = symbol.id;
            let name = symbol.name;
            self.symbols.insert(id, symbol);
            self.name_to_ids.entry(name).or_default().push(id);
            ids.push(id);
            self.symbol_count.fetch_add(1, Ordering::SeqCst);
        }
        if !ids.is_empty() {
            self.file_symbols.insert(file, ids);
        }

        if !calls.is_empty() {
            self.call_edges.write().extend(calls);
        }
        if !refs.is_empty() {
            self.references.write().extend(refs);
        }
        if !imports.is_empty() {
            self.imports.insert(file, imports);
        }
        if !scopes.is_empty() {
            self.scopes.insert(file, scopes);
        }
    }

    /// Remove all data associated with a file, without removing the file id
    /// mapping itself (so a subsequent re-index of the same path reuses it).
    fn clear_file_data(&self, file: FileId) {
        if let Some((_, ids)) = self.file_symbols.remove(&file) {
            for id in ids {
                if let Some((_, sym)) = self.symbols.remove(&id) {
                    if let Some(mut entry) = self.name_to_ids.get_mut(&sym.name) {
                        entry.retain(|s| *s != id);
                    }
                    self.symbol_count.fetch_sub(1, Ordering::SeqCst);
                }
                self.effects.remove(&id);
                self.annotations.remove(&id);
                self.propagated_labels.remove(&id);
            }
        }
        self.imports.remove(&file);
        self.scopes.remove(&file);
        self.call_edges.write().retain(|e| e.caller.file != file);
        self.references
            .write()
            .retain(|r| r.origin.map(|o| o.file) != Some(file));
    }

    /// Clear all data for a file, including its path/id mapping and cached
    /// contents — used when a file is deleted rather than re-indexed.
    pub fn clear_file(&self, path: &PathBuf) {
        let file_id = match self.file_ids.get(path) {
            Some(id) => *id,
            None => return,
        };
        self.clear_file_data(file_id);
        self.file_contents.remove(path);
        self.trigram.write().remove_file(file_id);
    }

    pub fn get_symbol(&self, id: SymbolId) -> Option<SymbolDef> {
        self.symbols.get(&id).map(|r| r.clone())
    }

    pub fn find_by_name(&self, name: &str) -> Vec<SymbolDef> {
        let name_key = match self.interner.get(name) {
            Some(k) => k,
            None => return Vec::new(),
        };
        self.name_to_ids
            .get(&name_key)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.symbols.get(id).map(|r| r.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Find call edges whose callee matches `callee_name` (by unscoped
    /// name, for calls that didn't resolve to a symbol) or whose resolved
    /// target is `callee`.
    pub fn find_callers(&self, callee: SymbolId, callee_name: &str) -> Vec<CallEdge> {
        let edges = self.call_edges.read();
        edges
            .iter()
            .filter(|e| {
                (callee.is_resolved() && e.callee == callee) || e.callee_name == callee_name
            })
            .cloned()
            .collect()
    }

    pub fn find_callees(&self, caller: SymbolId) -> Vec<CallEdge> {
        let edges = self.call_edges.read();
        edges.iter().filter(|e| e.caller == caller).cloned().collect()
    }

    pub fn references_to(&self, target: SymbolId) -> Vec<Reference> {
        self.references
            .read()
            .iter()
            .filter(|r| r.target == target)
            .cloned()
            .collect()
    }

    pub fn references_from(&self, origin: SymbolId) -> Vec<Reference> {
        self.references
            .read()
            .iter()
            .filter(|r| r.origin == Some(origin))
            .cloned()
            .collect()
    }

    pub async fn get_file_contents(&self, path: &PathBuf) -> Option<Arc<str>> {
        if let Some(contents) = self.file_contents.get(path) {
            return Some(contents.clone());
        }
        match tokio::fs::read_to_string(path).await {
            Ok(s) => {
                let arc: Arc<str> = Arc::from(s);
                self.file_contents.insert(path.clone(), arc.clone());
                Some(arc)
            }
            Err(_) => None,
        }
    }

    /// Build a [`FileInfo`] snapshot for `file` from its interned path, the
    /// scopes/symbols already published for it, and the side-effect/
    /// annotation tables. `None` if `file` has no known path.
    fn build_file_info(&self, file: FileId) -> Option<FileInfo> {
        let path = self.path_for_file(file)?;
        let language = crate::parsing::language_tag(&path);
        let scopes = self.scopes.get(&file).map(|s| s.clone()).unwrap_or_default();

        let symbols = self
            .file_symbols
            .get(&file)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| {
                        let def = self.symbols.get(id)?.clone();
                        Some(EnhancedSymbol {
                            effects: self.effects.get(id).map(|e| e.clone()),
                            annotations: self.annotations.get(id).map(|a| a.clone()).unwrap_or_default(),
                            propagated_labels: self
                                .propagated_labels
                                .get(id)
                                .map(|p| p.clone())
                                .unwrap_or_default(),
                            def,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let content_hash = self
            .file_contents
            .get(&path)
            .map(|c| hash_contents(&c))
            .unwrap_or_default();

        Some(FileInfo {
            id: file,
            path,
            language,
            scopes,
            symbols,
            content_hash,
        })
    }

    /// Look up one file's full snapshot by id. `Err(NotAvailable)` once the
    /// index has been [`close`](Self::close)d.
    pub fn get_file(&self, file: FileId) -> Result<Option<FileInfo>, ToolError> {
        self.check_open()?;
        Ok(self.build_file_info(file))
    }

    /// Snapshot every known file. `Err(NotAvailable)` once closed.
    pub fn all_files(&self) -> Result<Vec<FileInfo>, ToolError> {
        self.check_open()?;
        Ok(self
            .file_ids
            .iter()
            .filter_map(|e| self.build_file_info(*e.value()))
            .collect())
    }

    /// Snapshot every known symbol definition. `Err(NotAvailable)` once closed.
    pub fn all_symbols(&self) -> Result<Vec<SymbolDef>, ToolError> {
        self.check_open()?;
        Ok(self.symbols.iter().map(|e| e.value().clone()).collect())
    }

    /// Find symbols by name, either exact or by prefix. `Err(NotAvailable)`
    /// once closed.
    pub fn find_symbols_by_name(&self, name: &str, exact: bool) -> Result<Vec<SymbolDef>, ToolError> {
        self.check_open()?;
        if exact {
            return Ok(self.find_by_name(name));
        }
        let mut hits = Vec::new();
        for entry in self.name_to_ids.iter() {
            if self.resolve(*entry.key()).starts_with(name) {
                hits.extend(
                    entry
                        .value()
                        .iter()
                        .filter_map(|id| self.symbols.get(id).map(|r| r.clone())),
                );
            }
        }
        Ok(hits)
    }

    /// Quiesce the derived indexes (effects, annotations, propagated labels,
    /// trigram) and mark the index closed: every subsequent call to
    /// `get_file`/`all_files`/`all_symbols`/`find_symbols_by_name` (and any
    /// future operation that checks [`check_open`](Self::check_open))
    /// returns `NotAvailable` rather than touching torn-down state.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.effects.clear();
        self.annotations.clear();
        self.propagated_labels.clear();
        *self.trigram.write() = crate::trigram::TrigramIndex::new();
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            file_count: self.file_count.load(Ordering::SeqCst),
            symbol_count: self.symbol_count.load(Ordering::SeqCst),
            call_edge_count: self.call_edges.read().len() as u32,
            reference_count: self.references.read().len() as u32,
            topology_node_count: self.topology.read().node_count() as u32,
        }
    }

    pub fn reset(&self) {
        {
            let mut graph = self.topology.write();
            graph.clear();
        }
        self.path_to_node.clear();
        self.topology_metrics.clear();

        self.symbols.clear();
        self.name_to_ids.clear();
        self.file_symbols.clear();
        self.call_edges.write().clear();
        self.references.write().clear();
        self.imports.clear();
        self.scopes.clear();

        self.effects.clear();
        self.annotations.clear();
        self.propagated_labels.clear();

        *self.trigram.write() = crate::trigram::TrigramIndex::new();

        self.file_contents.clear();
        self.file_ids.clear();
        self.file_id_counter.store(1, Ordering::SeqCst);

        *self.git_hash.write() = None;
        *self.last_indexed.write() = None;
        self.file_count.store(0, Ordering::SeqCst);
        self.symbol_count.store(0, Ordering::SeqCst);
        self.closed.store(false, Ordering::SeqCst);
    }
}

/// Statistics about the index.
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub file_count: u32,
    pub symbol_count: u32,
    pub call_edge_count: u32,
    pub reference_count: u32,
    pub topology_node_count: u32,
}

/// Hash a file's contents into a hex string for `FileInfo::content_hash`.
/// `DefaultHasher` rather than a cryptographic hash: this is for change
/// detection, not integrity, and no hashing crate is otherwise a dependency.
fn hash_contents(contents: &str) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    contents.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Thread-safe shared state handle.
pub type SharedState = Arc<CodeIndex>;

pub fn create_state(root_path: PathBuf) -> SharedState {
    Arc::new(CodeIndex::new(root_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_ids_start_at_one() {
        let state = CodeIndex::new(PathBuf::from("/tmp"));
        let id = state.get_or_create_file_id(&PathBuf::from("a.rs"));
        assert_eq!(id, FileId(1));
        let same = state.get_or_create_file_id(&PathBuf::from("a.rs"));
        assert_eq!(id, same);
        let second = state.get_or_create_file_id(&PathBuf::from("b.rs"));
        assert_eq!(second, FileId(2));
    }

    #[test]
    fn publish_then_clear_removes_everything() {
        let state = CodeIndex::new(PathBuf::from("/tmp"));
        let file = state.get_or_create_file_id(&PathBuf::from("a.rs"));
        let name = state.intern("foo");
        let scoped = state.intern("crate::foo");
        let id = SymbolId::new(file, LocalSymbolId(1));
        let def = SymbolDef {
            id,
            name,
            scoped_name: scoped,
            kind: SymbolKind::Function,
            location: Location::new(PathBuf::from("a.rs"), 0, 1),
            signature: None,
            visibility: Visibility::Public,
            attributes: Vec::new(),
            doc_comment: None,
            parent: None,
        };
        state.publish_file(file, vec![def], Vec::new(), Vec::new(), Vec::new(), Vec::new());
        assert_eq!(state.find_by_name("foo").len(), 1);

        state.clear_file(&PathBuf::from("a.rs"));
        assert_eq!(state.find_by_name("foo").len(), 0);
    }

    fn publish_one(state: &CodeIndex, path: &str, name: &str) -> FileId {
        let file = state.get_or_create_file_id(&PathBuf::from(path));
        state.file_contents.insert(PathBuf::from(path), "fn body() {}".into());
        let interned = state.intern(name);
        let scoped = state.intern(&format!("crate::{name}"));
        let id = SymbolId::new(file, LocalSymbolId(1));
        state.publish_file(
            file,
            vec![SymbolDef {
                id,
                name: interned,
                scoped_name: scoped,
                kind: SymbolKind::Function,
                location: Location::new(PathBuf::from(path), 0, 1),
                signature: None,
                visibility: Visibility::Public,
                attributes: Vec::new(),
                doc_comment: None,
                parent: None,
            }],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        file
    }

    #[test]
    fn get_file_and_all_files_round_trip() {
        let state = CodeIndex::new(PathBuf::from("/tmp"));
        let file = publish_one(&state, "a.rs", "parse_widget");

        let info = state.get_file(file).unwrap().expect("file present");
        assert_eq!(info.language, "rust");
        assert_eq!(info.symbols.len(), 1);
        assert!(!info.content_hash.is_empty());

        assert_eq!(state.all_files().unwrap().len(), 1);
        assert_eq!(state.all_symbols().unwrap().len(), 1);
    }

    #[test]
    fn find_symbols_by_name_prefix_mode() {
        let state = CodeIndex::new(PathBuf::from("/tmp"));
        publish_one(&state, "a.rs", "parse_widget");
        publish_one(&state, "b.rs", "parse_gadget");

        assert_eq!(state.find_symbols_by_name("parse_widget", true).unwrap().len(), 1);
        assert_eq!(state.find_symbols_by_name("parse", false).unwrap().len(), 2);
        assert_eq!(state.find_symbols_by_name("parse_widget", false).unwrap().len(), 1);
    }

    #[test]
    fn close_quiesces_and_fails_subsequent_operations() {
        let state = CodeIndex::new(PathBuf::from("/tmp"));
        publish_one(&state, "a.rs", "parse_widget");

        state.close();

        assert!(state.get_file(FileId(1)).is_err());
        assert!(state.all_files().is_err());
        assert!(state.all_symbols().is_err());
        assert!(state.find_symbols_by_name("parse_widget", true).is_err());
    }
}
