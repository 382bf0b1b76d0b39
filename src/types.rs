//! Core data model for the code index.
//!
//! Three families of types live here:
//! - Module Topology: crates, modules, files and their import edges.
//! - Symbol Resolution: definitions, references, call edges, scopes.
//! - Side effects and annotations: per-symbol behavioral metadata layered on
//!   top of the symbol graph by the effect propagator and label propagator.

use crate::ids::SymbolId;
use lasso::Spur;
use std::path::PathBuf;

pub use crate::ids::{FileId, LocalSymbolId};

/// Interned string handle for memory-efficient symbol/name storage.
pub type InternedString = Spur;

// ============================================================================
// Module Topology
// ============================================================================

/// Node types for the module topology graph.
#[derive(Debug, Clone)]
pub enum TopologyNode {
    Crate {
        name: String,
        path: PathBuf,
        is_workspace: bool,
    },
    Module {
        name: String,
        path: PathBuf,
        is_inline: bool,
    },
    File {
        path: PathBuf,
        file_id: FileId,
    },
}

/// Edge types for the module topology graph.
#[derive(Debug, Clone)]
pub enum TopologyEdge {
    Contains,
    Imports { use_path: String, is_glob: bool },
    ReExports { original_path: String },
}

/// Metrics attached to a topology node, used as a relevance signal by search
/// and context resolution.
#[derive(Debug, Clone, Default)]
pub struct TopologyMetrics {
    pub relevance_score: f64,
    pub churn_count: u32,
    pub coverage: Option<f32>,
}

// ============================================================================
// Symbol Resolution
// ============================================================================

/// Location of a syntax element in a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: PathBuf,
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Location {
    pub fn new(file: PathBuf, start_byte: usize, end_byte: usize) -> Self {
        Self {
            file,
            start_byte,
            end_byte,
            start_line: 0,
            start_col: 0,
            end_line: 0,
            end_col: 0,
        }
    }

    pub fn with_positions(
        mut self,
        start_line: usize,
        start_col: usize,
        end_line: usize,
        end_col: usize,
    ) -> Self {
        self.start_line = start_line;
        self.start_col = start_col;
        self.end_line = end_line;
        self.end_col = end_col;
        self
    }
}

/// Kind of symbol in the codebase. A superset that covers both the Rust and
/// TypeScript parsers' vocabularies so a single enum can represent either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Struct,
    Interface,
    Variable,
    Constant,
    Type,
    Enum,
    Record,
    Trait,
    Impl,
    Property,
    Field,
    EnumMember,
    Namespace,
    Module,
    Event,
    Delegate,
    Indexer,
    Operator,
    Extension,
    Annotation,
    Object,
    Companion,
    Constructor,
    Macro,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Interface => "interface",
            Self::Variable => "variable",
            Self::Constant => "constant",
            Self::Type => "type",
            Self::Enum => "enum",
            Self::Record => "record",
            Self::Trait => "trait",
            Self::Impl => "impl",
            Self::Property => "property",
            Self::Field => "field",
            Self::EnumMember => "enum_member",
            Self::Namespace => "namespace",
            Self::Module => "module",
            Self::Event => "event",
            Self::Delegate => "delegate",
            Self::Indexer => "indexer",
            Self::Operator => "operator",
            Self::Extension => "extension",
            Self::Annotation => "annotation",
            Self::Object => "object",
            Self::Companion => "companion",
            Self::Constructor => "constructor",
            Self::Macro => "macro",
        }
    }

    /// True for kinds that participate in the call graph and side-effect
    /// propagation as callable units.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Self::Function | Self::Method | Self::Constructor | Self::Operator
        )
    }
}

/// Visibility of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Private,
    /// pub(crate)
    Crate,
    /// pub(super)
    Super,
    /// pub(in path)
    Restricted,
    /// pub
    Public,
}

/// Function/method signature information.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    pub params: Vec<String>,
    pub return_type: Option<String>,
    pub is_async: bool,
    pub is_unsafe: bool,
    pub is_const: bool,
    pub generics: Option<String>,
    pub where_clause: Option<String>,
}

/// A symbol definition in the codebase.
#[derive(Debug, Clone)]
pub struct SymbolDef {
    /// Composite identity: (file, local index within file).
    pub id: SymbolId,
    /// Simple name (e.g. "foo").
    pub name: InternedString,
    /// Fully qualified scoped name (e.g. "crate::module::Struct::foo").
    pub scoped_name: InternedString,
    pub kind: SymbolKind,
    pub location: Location,
    pub signature: Option<Signature>,
    pub visibility: Visibility,
    pub attributes: Vec<String>,
    pub doc_comment: Option<String>,
    /// Parent symbol id (method -> impl/class, field -> struct/class).
    pub parent: Option<SymbolId>,
}

/// A symbol together with the derived metadata the Side-Effect Propagator and
/// Semantic Annotator attach to it. Built lazily by the aggregator from a
/// [`SymbolDef`] plus the state's side-effect and annotation tables; not
/// stored directly, since effects and annotations change independently of
/// the definition itself.
#[derive(Debug, Clone)]
pub struct EnhancedSymbol {
    pub def: SymbolDef,
    pub effects: Option<SideEffectInfo>,
    pub annotations: Vec<Annotation>,
    pub propagated_labels: Vec<PropagatedLabel>,
}

/// A file's identity and derived contents, as seen by the Master Index.
/// Built on demand from the file's interned path, parsed scopes, and
/// enhanced symbols rather than stored as its own table — a file's
/// symbol/scope lists already live in `CodeIndex::file_symbols`/`scopes`,
/// so `FileInfo` just packages a consistent snapshot of them.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub id: FileId,
    pub path: PathBuf,
    /// Short language tag ("rust", "typescript", "tsx"), or "unknown" for
    /// files with no registered parser.
    pub language: String,
    pub scopes: Vec<Scope>,
    pub symbols: Vec<EnhancedSymbol>,
    /// Hex-encoded hash of the file's current contents, for change
    /// detection independent of the incremental indexer's mtime/size
    /// fingerprint.
    pub content_hash: String,
}

/// Kind of reference from one location to a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Read,
    Write,
    Call,
    Import,
    TypeRef,
}

/// A typed reference from a location to a (possibly unresolved) symbol.
#[derive(Debug, Clone)]
pub struct Reference {
    pub location: Location,
    /// Target symbol. `SymbolId::UNRESOLVED` when the callee/name couldn't
    /// be matched against a known definition.
    pub target: SymbolId,
    /// Unscoped name as written at the reference site; kept even when
    /// `target` resolves, so dynamic-dispatch call sites remain inspectable.
    pub target_name: String,
    pub kind: ReferenceKind,
    /// Symbol that contains this reference, if inside one.
    pub origin: Option<SymbolId>,
}

/// A call edge in the call graph. A specialization of [`Reference`] kept as
/// its own type because the call graph is queried far more often than the
/// general reference index and benefits from its own indexes in the state.
#[derive(Debug, Clone)]
pub struct CallEdge {
    pub caller: SymbolId,
    pub callee: SymbolId,
    pub callee_name: String,
    pub location: Location,
    pub is_method_call: bool,
}

/// Import information from `use`/`import` statements.
#[derive(Debug, Clone)]
pub struct ImportInfo {
    pub path: String,
    pub name: String,
    pub is_glob: bool,
    pub location: Location,
}

/// Kind of lexical scope in a containment tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Folder,
    File,
    Namespace,
    Class,
    Interface,
    Function,
    Method,
    Variable,
    Block,
}

/// A node in the scope containment tree for a file. Scopes nest by line
/// range; `parent` is the enclosing scope's index within the same file's
/// scope list, or `None` for the file-level scope.
#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub name: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
    pub parent: Option<usize>,
    pub symbol: Option<SymbolId>,
}

// ============================================================================
// Side Effects
// ============================================================================

/// Bitset of observed side-effect categories for a symbol. Hand-rolled over
/// a `u32` rather than pulling in a flags crate: sixteen categories fit one
/// word and the set operations needed (union, meet, membership) are a few
/// lines each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct EffectSet(pub u32);

macro_rules! effect_bits {
    ($($name:ident = $bit:expr),* $(,)?) => {
        impl EffectSet {
            $(pub const $name: EffectSet = EffectSet(1 << $bit);)*

            pub const ALL_NAMES: &'static [(&'static str, EffectSet)] = &[
                $((stringify!($name), EffectSet::$name)),*
            ];
        }
    };
}

effect_bits! {
    PARAM_WRITE = 0,
    RECEIVER_WRITE = 1,
    GLOBAL_WRITE = 2,
    CLOSURE_WRITE = 3,
    FIELD_WRITE = 4,
    IO = 5,
    DATABASE = 6,
    NETWORK = 7,
    THROW = 8,
    CHANNEL = 9,
    ASYNC = 10,
    EXTERNAL_CALL = 11,
    DYNAMIC_CALL = 12,
    REFLECTION = 13,
    UNCERTAIN = 14,
}

impl EffectSet {
    pub const EMPTY: EffectSet = EffectSet(0);

    pub fn contains(&self, other: EffectSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn union(&self, other: EffectSet) -> EffectSet {
        EffectSet(self.0 | other.0)
    }

    pub fn insert(&mut self, other: EffectSet) {
        self.0 |= other.0;
    }

    pub fn names(&self) -> Vec<&'static str> {
        Self::ALL_NAMES
            .iter()
            .filter(|(_, bit)| self.contains(*bit))
            .map(|(name, _)| *name)
            .collect()
    }
}

/// Confidence that a symbol's recorded effects are complete, forming a
/// lattice `None < Low < Medium < High < Proven` under the meet (minimum)
/// operation used when combining a caller's confidence with its callees'.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Confidence {
    None,
    Low,
    Medium,
    High,
    Proven,
}

impl Confidence {
    pub fn meet(self, other: Confidence) -> Confidence {
        self.min(other)
    }
}

/// Coarse read/write shape of a symbol's own body, independent of the
/// specific effect categories touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPattern {
    None,
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// How a symbol's own body handles errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorBehavior {
    None,
    Propagates,
    Panics,
    PropagatesAndPanics,
}

/// Accumulated side-effect information for a symbol, after the local pass
/// (effects syntactically observable within the symbol's own body) and the
/// transitive fixed-point pass (effects reachable through its call graph).
#[derive(Debug, Clone)]
pub struct SideEffectInfo {
    pub symbol: SymbolId,
    pub local: EffectSet,
    pub transitive: EffectSet,
    pub confidence: Confidence,
    pub reasons: Vec<String>,
    /// True iff `local.union(transitive)` is empty.
    pub is_pure: bool,
    /// Read/write shape observed in the symbol's own body (not propagated).
    pub access_pattern: AccessPattern,
    /// Error handling shape observed in the symbol's own body (not propagated).
    pub error_behavior: ErrorBehavior,
    /// Count of deferred-cleanup patterns (`defer ...`) observed in the body.
    pub defer_count: u32,
}

/// Per-category weight used by [`SideEffectInfo::purity_score`]; heavier
/// categories cost more purity even combined with lighter ones.
const CATEGORY_WEIGHT: &[(EffectSet, f32)] = &[
    (EffectSet::PARAM_WRITE, 0.1),
    (EffectSet::RECEIVER_WRITE, 0.15),
    (EffectSet::GLOBAL_WRITE, 0.3),
    (EffectSet::CLOSURE_WRITE, 0.1),
    (EffectSet::FIELD_WRITE, 0.15),
    (EffectSet::IO, 0.25),
    (EffectSet::DATABASE, 0.3),
    (EffectSet::NETWORK, 0.3),
    (EffectSet::THROW, 0.1),
    (EffectSet::CHANNEL, 0.2),
    (EffectSet::ASYNC, 0.05),
    (EffectSet::EXTERNAL_CALL, 0.15),
    (EffectSet::DYNAMIC_CALL, 0.15),
    (EffectSet::REFLECTION, 0.25),
    (EffectSet::UNCERTAIN, 0.2),
];

impl SideEffectInfo {
    /// 1.0 for a fully pure symbol, decreasing as heavier effect categories
    /// accumulate across `local` and `transitive`; never below 0.0.
    pub fn purity_score(&self) -> f32 {
        let combined = self.local.union(self.transitive);
        let penalty: f32 = CATEGORY_WEIGHT
            .iter()
            .filter(|(bit, _)| combined.contains(*bit))
            .map(|(_, w)| w)
            .sum();
        (1.0 - penalty).max(0.0)
    }
}

// ============================================================================
// Annotations & Label Propagation
// ============================================================================

/// A declarative `@key[value, ...]` marker parsed out of a doc/line comment
/// attached to a symbol.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub symbol: SymbolId,
    pub key: String,
    pub values: Vec<String>,
    pub category: Option<String>,
}

/// A label that reached a symbol via propagation from an annotated callee,
/// decayed by hop count. `strength` is `decay^hops` of the originating
/// annotation's strength; when multiple paths deliver the same label, the
/// max-strength path wins and its hop count is recorded.
#[derive(Debug, Clone)]
pub struct PropagatedLabel {
    pub label: String,
    pub strength: f32,
    pub hops: u32,
    pub source: SymbolId,
}
