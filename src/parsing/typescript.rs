//! TypeScript/TSX language parser using tree-sitter.

use super::{LanguageParser, SymbolTable};
use crate::ids::{FileId, LocalSymbolId, SymbolId};
use crate::types::*;
use anyhow::Result;
use lasso::ThreadedRodeo;
use std::path::{Path, PathBuf};
use tree_sitter::{Language, Node, Tree};

/// TypeScript/TSX source code parser.
pub struct TypeScriptParser {
    language: Language,
    extensions: &'static [&'static str],
}

impl TypeScriptParser {
    pub fn new_typescript() -> Self {
        Self {
            language: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            extensions: &["ts", "mts", "cts"],
        }
    }

    pub fn new_tsx() -> Self {
        Self {
            language: tree_sitter_typescript::LANGUAGE_TSX.into(),
            extensions: &["tsx"],
        }
    }
}

impl LanguageParser for TypeScriptParser {
    fn language(&self) -> Language {
        self.language.clone()
    }

    fn extensions(&self) -> &[&str] {
        self.extensions
    }

    fn extract_symbols(
        &self,
        tree: &Tree,
        source: &str,
        file: FileId,
        path: &Path,
        interner: &ThreadedRodeo,
    ) -> Result<Vec<SymbolDef>> {
        let bytes = source.as_bytes();
        let root = tree.root_node();
        let mut symbols = Vec::new();
        let mut scope_stack = vec![file_scope_for(path)];
        let mut next_local = 1u32;

        walk_ts_symbols(
            root,
            bytes,
            file,
            path,
            &mut scope_stack,
            &mut next_local,
            interner,
            &mut symbols,
        );

        Ok(symbols)
    }

    fn extract_calls(
        &self,
        tree: &Tree,
        source: &str,
        path: &Path,
        table: &SymbolTable,
    ) -> Result<Vec<CallEdge>> {
        let bytes = source.as_bytes();
        let root = tree.root_node();
        let mut calls = Vec::new();
        let mut scope_stack = vec![file_scope_for(path)];
        let mut fn_stack = Vec::<String>::new();

        walk_ts_calls(
            root,
            bytes,
            path,
            &mut scope_stack,
            &mut fn_stack,
            table,
            &mut calls,
        );

        Ok(calls)
    }

    fn extract_references(
        &self,
        tree: &Tree,
        source: &str,
        path: &Path,
        table: &SymbolTable,
    ) -> Result<Vec<Reference>> {
        let bytes = source.as_bytes();
        let root = tree.root_node();
        let mut refs = Vec::new();
        let mut scope_stack = vec![file_scope_for(path)];
        let mut fn_stack = Vec::<String>::new();

        walk_ts_references(
            root,
            bytes,
            path,
            &mut scope_stack,
            &mut fn_stack,
            table,
            &mut refs,
        );

        Ok(refs)
    }

    fn extract_scopes(&self, tree: &Tree, source: &str) -> Result<Vec<Scope>> {
        let bytes = source.as_bytes();
        let root = tree.root_node();
        let mut scopes = vec![Scope {
            kind: ScopeKind::File,
            name: None,
            start_line: root.start_position().row,
            end_line: root.end_position().row,
            parent: None,
            symbol: None,
        }];
        walk_ts_scopes(root, bytes, 0, &mut scopes);
        Ok(scopes)
    }

    fn extract_imports(&self, tree: &Tree, source: &str, file: &Path) -> Result<Vec<ImportInfo>> {
        let bytes = source.as_bytes();
        let root = tree.root_node();
        let mut imports = Vec::new();

        walk_ts_imports(root, bytes, file, &mut imports);

        Ok(imports)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn location_for(node: Node, file: &Path) -> Location {
    let start = node.start_position();
    let end = node.end_position();
    Location::new(file.to_path_buf(), node.start_byte(), node.end_byte()).with_positions(
        start.row + 1,
        start.column + 1,
        end.row + 1,
        end.column + 1,
    )
}

fn text_of(bytes: &[u8], node: Node) -> Option<String> {
    std::str::from_utf8(&bytes[node.start_byte()..node.end_byte()])
        .ok()
        .map(|s| s.to_string())
}

fn strip_quotes(s: &str) -> String {
    s.trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}

fn file_scope_for(file: &Path) -> String {
    let root = find_workspace_root(file).unwrap_or_else(|| {
        file.parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("/"))
    });
    let rel = file.strip_prefix(&root).unwrap_or(file);
    let mut rel_str = rel.to_string_lossy().to_string();
    if rel_str.contains('\\') {
        rel_str = rel_str.replace('\\', "/");
    }
    format!("file:{rel_str}")
}

fn find_workspace_root(file: &Path) -> Option<PathBuf> {
    const MARKERS: [&str; 6] = [
        "package.json",
        "tsconfig.json",
        "pnpm-workspace.yaml",
        "yarn.lock",
        "Cargo.toml",
        ".git",
    ];
    let mut current = file.parent();
    while let Some(dir) = current {
        for marker in MARKERS {
            let candidate = dir.join(marker);
            if marker == ".git" {
                if candidate.is_dir() {
                    return Some(dir.to_path_buf());
                }
            } else if candidate.is_file() {
                return Some(dir.to_path_buf());
            }
        }
        current = dir.parent();
    }
    None
}

fn first_identifier(bytes: &[u8], node: Node) -> Option<String> {
    if node.kind() == "identifier" || node.kind() == "property_identifier" {
        return text_of(bytes, node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(name) = first_identifier(bytes, child) {
            return Some(name);
        }
    }
    None
}

fn last_identifier(bytes: &[u8], node: Node) -> Option<String> {
    let text = text_of(bytes, node)?;
    let mut best = None;
    for part in text.split(|c: char| !c.is_ascii_alphanumeric() && c != '_') {
        if !part.is_empty() {
            best = Some(part);
        }
    }
    best.map(|s| s.to_string())
}

fn string_literal_value(bytes: &[u8], node: Node) -> Option<String> {
    let text = text_of(bytes, node)?;
    if text.starts_with('"')
        || text.starts_with('\'')
        || text.starts_with('`') && text.ends_with(text.chars().next().unwrap())
    {
        return Some(strip_quotes(&text));
    }
    None
}

fn extract_callee_name(bytes: &[u8], node: Node) -> Option<String> {
    match node.kind() {
        "identifier" | "property_identifier" => text_of(bytes, node),
        "member_expression" => {
            if let Some(property) = node.child_by_field_name("property") {
                if let Some(name) = string_literal_value(bytes, property) {
                    return Some(name);
                }
                if let Some(name) = text_of(bytes, property) {
                    return Some(name);
                }
            }
            last_identifier(bytes, node)
        }
        "subscript_expression" => {
            if let Some(index) = node.child_by_field_name("index") {
                if let Some(name) = string_literal_value(bytes, index) {
                    return Some(name);
                }
                if let Some(name) = text_of(bytes, index) {
                    return Some(name);
                }
            }
            last_identifier(bytes, node)
        }
        "optional_chain" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if let Some(name) = extract_callee_name(bytes, child) {
                    return Some(name);
                }
            }
            last_identifier(bytes, node)
        }
        _ => last_identifier(bytes, node),
    }
}

fn make_scoped_name(scope_stack: &[String], name: &str) -> String {
    let mut full = scope_stack.join("::");
    if !full.is_empty() {
        full.push_str("::");
    }
    full.push_str(name);
    full
}

#[allow(clippy::too_many_arguments)]
fn add_symbol(
    symbols: &mut Vec<SymbolDef>,
    interner: &ThreadedRodeo,
    scope_stack: &[String],
    name: &str,
    kind: SymbolKind,
    file: FileId,
    path: &Path,
    next_local: &mut u32,
    node: Node,
) -> SymbolId {
    let scoped_name = make_scoped_name(scope_stack, name);
    let id = SymbolId::new(file, LocalSymbolId(*next_local));
    *next_local += 1;
    symbols.push(SymbolDef {
        id,
        name: interner.get_or_intern(name),
        scoped_name: interner.get_or_intern(&scoped_name),
        kind,
        location: location_for(node, path),
        signature: None,
        visibility: Visibility::Private,
        attributes: Vec::new(),
        doc_comment: None,
        parent: None,
    });
    id
}

#[allow(clippy::too_many_arguments)]
fn walk_ts_symbols(
    node: Node,
    bytes: &[u8],
    file: FileId,
    path: &Path,
    scope_stack: &mut Vec<String>,
    next_local: &mut u32,
    interner: &ThreadedRodeo,
    symbols: &mut Vec<SymbolDef>,
) {
    match node.kind() {
        "function_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                if let Some(name) = text_of(bytes, name_node) {
                    add_symbol(
                        symbols,
                        interner,
                        scope_stack,
                        &name,
                        SymbolKind::Function,
                        file,
                        path,
                        next_local,
                        node,
                    );
                    scope_stack.push(name);
                    walk_children(node, bytes, file, path, scope_stack, next_local, interner, symbols);
                    scope_stack.pop();
                    return;
                }
            }
        }
        "method_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                if let Some(name) = text_of(bytes, name_node) {
                    add_symbol(
                        symbols,
                        interner,
                        scope_stack,
                        &name,
                        SymbolKind::Method,
                        file,
                        path,
                        next_local,
                        node,
                    );
                    scope_stack.push(name);
                    walk_children(node, bytes, file, path, scope_stack, next_local, interner, symbols);
                    scope_stack.pop();
                    return;
                }
            }
        }
        "class_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                if let Some(name) = text_of(bytes, name_node) {
                    add_symbol(
                        symbols,
                        interner,
                        scope_stack,
                        &name,
                        SymbolKind::Class,
                        file,
                        path,
                        next_local,
                        node,
                    );
                    scope_stack.push(name);
                    walk_children(node, bytes, file, path, scope_stack, next_local, interner, symbols);
                    scope_stack.pop();
                    return;
                }
            }
        }
        "interface_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                if let Some(name) = text_of(bytes, name_node) {
                    add_symbol(
                        symbols,
                        interner,
                        scope_stack,
                        &name,
                        SymbolKind::Interface,
                        file,
                        path,
                        next_local,
                        node,
                    );
                    scope_stack.push(name);
                    walk_children(node, bytes, file, path, scope_stack, next_local, interner, symbols);
                    scope_stack.pop();
                    return;
                }
            }
        }
        "type_alias_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                if let Some(name) = text_of(bytes, name_node) {
                    add_symbol(
                        symbols,
                        interner,
                        scope_stack,
                        &name,
                        SymbolKind::Type,
                        file,
                        path,
                        next_local,
                        node,
                    );
                }
            }
        }
        "enum_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                if let Some(name) = text_of(bytes, name_node) {
                    add_symbol(
                        symbols,
                        interner,
                        scope_stack,
                        &name,
                        SymbolKind::Enum,
                        file,
                        path,
                        next_local,
                        node,
                    );
                }
            }
        }
        "variable_declarator" => {
            let name = node
                .child_by_field_name("name")
                .and_then(|n| text_of(bytes, n));
            let init = node.child_by_field_name("value");
            if let (Some(name), Some(init)) = (name, init) {
                if matches!(init.kind(), "arrow_function" | "function") {
                    add_symbol(
                        symbols,
                        interner,
                        scope_stack,
                        &name,
                        SymbolKind::Function,
                        file,
                        path,
                        next_local,
                        node,
                    );
                }
            }
        }
        _ => {}
    }

    walk_children(node, bytes, file, path, scope_stack, next_local, interner, symbols);
}

#[allow(clippy::too_many_arguments)]
fn walk_children(
    node: Node,
    bytes: &[u8],
    file: FileId,
    path: &Path,
    scope_stack: &mut Vec<String>,
    next_local: &mut u32,
    interner: &ThreadedRodeo,
    symbols: &mut Vec<SymbolDef>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_ts_symbols(child, bytes, file, path, scope_stack, next_local, interner, symbols);
    }
}

fn walk_ts_calls(
    node: Node,
    bytes: &[u8],
    path: &Path,
    scope_stack: &mut Vec<String>,
    fn_stack: &mut Vec<String>,
    table: &SymbolTable,
    calls: &mut Vec<CallEdge>,
) {
    match node.kind() {
        "function_declaration" | "method_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                if let Some(name) = text_of(bytes, name_node) {
                    let scoped = make_scoped_name(scope_stack, &name);
                    scope_stack.push(name);
                    fn_stack.push(scoped);
                    walk_children_calls(node, bytes, path, scope_stack, fn_stack, table, calls);
                    fn_stack.pop();
                    scope_stack.pop();
                    return;
                }
            }
        }
        "class_declaration" | "interface_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                if let Some(name) = text_of(bytes, name_node) {
                    scope_stack.push(name);
                    walk_children_calls(node, bytes, path, scope_stack, fn_stack, table, calls);
                    scope_stack.pop();
                    return;
                }
            }
        }
        "variable_declarator" => {
            let name = node
                .child_by_field_name("name")
                .and_then(|n| text_of(bytes, n));
            let init = node.child_by_field_name("value");
            if let (Some(name), Some(init)) = (name, init) {
                if matches!(init.kind(), "arrow_function" | "function") {
                    let scoped = make_scoped_name(scope_stack, &name);
                    fn_stack.push(scoped);
                    walk_children_calls(node, bytes, path, scope_stack, fn_stack, table, calls);
                    fn_stack.pop();
                    return;
                }
            }
        }
        "call_expression" => {
            if let Some(callee_node) = node
                .child_by_field_name("function")
                .or_else(|| node.child_by_field_name("callee"))
            {
                if let Some(callee_name) = extract_callee_name(bytes, callee_node) {
                    let caller_scoped = fn_stack
                        .last()
                        .cloned()
                        .unwrap_or_else(|| scope_stack.join("::"));
                    let caller = table.get(&caller_scoped).copied().unwrap_or(SymbolId::UNRESOLVED);
                    let is_method_call = matches!(
                        callee_node.kind(),
                        "member_expression" | "optional_chain" | "subscript_expression"
                    );
                    calls.push(CallEdge {
                        caller,
                        callee: SymbolId::UNRESOLVED,
                        callee_name,
                        location: location_for(node, path),
                        is_method_call,
                    });
                }
            }
        }
        _ => {}
    }

    walk_children_calls(node, bytes, path, scope_stack, fn_stack, table, calls);
}

fn walk_children_calls(
    node: Node,
    bytes: &[u8],
    path: &Path,
    scope_stack: &mut Vec<String>,
    fn_stack: &mut Vec<String>,
    table: &SymbolTable,
    calls: &mut Vec<CallEdge>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_ts_calls(child, bytes, path, scope_stack, fn_stack, table, calls);
    }
}

/// Best-effort reference pass: identifiers used outside a declaration or
/// call-target position are read references; the left side of an
/// `assignment_expression` is a write.
fn walk_ts_references(
    node: Node,
    bytes: &[u8],
    path: &Path,
    scope_stack: &mut Vec<String>,
    fn_stack: &mut Vec<String>,
    table: &SymbolTable,
    refs: &mut Vec<Reference>,
) {
    match node.kind() {
        "function_declaration" | "method_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                if let Some(name) = text_of(bytes, name_node) {
                    let scoped = make_scoped_name(scope_stack, &name);
                    scope_stack.push(name);
                    fn_stack.push(scoped);
                    walk_children_refs(node, bytes, path, scope_stack, fn_stack, table, refs);
                    fn_stack.pop();
                    scope_stack.pop();
                    return;
                }
            }
        }
        "assignment_expression" => {
            if let Some(left) = node.child_by_field_name("left") {
                if let Some(name) = last_identifier(bytes, left) {
                    let origin = fn_stack.last().and_then(|s| table.get(s)).copied();
                    refs.push(Reference {
                        location: location_for(left, path),
                        target: SymbolId::UNRESOLVED,
                        target_name: name,
                        kind: ReferenceKind::Write,
                        origin,
                    });
                }
            }
        }
        "identifier" => {
            let parent_kind = node.parent().map(|p| p.kind()).unwrap_or("");
            let is_declaration_or_call = matches!(
                parent_kind,
                "variable_declarator" | "function_declaration" | "formal_parameters" | "call_expression"
            );
            if !is_declaration_or_call {
                if let Some(name) = text_of(bytes, node) {
                    let origin = fn_stack.last().and_then(|s| table.get(s)).copied();
                    refs.push(Reference {
                        location: location_for(node, path),
                        target: SymbolId::UNRESOLVED,
                        target_name: name,
                        kind: ReferenceKind::Read,
                        origin,
                    });
                }
            }
        }
        _ => {}
    }

    walk_children_refs(node, bytes, path, scope_stack, fn_stack, table, refs);
}

fn walk_children_refs(
    node: Node,
    bytes: &[u8],
    path: &Path,
    scope_stack: &mut Vec<String>,
    fn_stack: &mut Vec<String>,
    table: &SymbolTable,
    refs: &mut Vec<Reference>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_ts_references(child, bytes, path, scope_stack, fn_stack, table, refs);
    }
}

fn walk_ts_scopes(node: Node, bytes: &[u8], parent_idx: usize, scopes: &mut Vec<Scope>) {
    let scope_kind = match node.kind() {
        "class_declaration" => Some(ScopeKind::Class),
        "interface_declaration" => Some(ScopeKind::Interface),
        "function_declaration" | "method_definition" => Some(ScopeKind::Function),
        "statement_block" => Some(ScopeKind::Block),
        _ => None,
    };

    let current_idx = if let Some(sk) = scope_kind {
        let name = node
            .child_by_field_name("name")
            .and_then(|n| text_of(bytes, n));
        scopes.push(Scope {
            kind: sk,
            name,
            start_line: node.start_position().row,
            end_line: node.end_position().row,
            parent: Some(parent_idx),
            symbol: None,
        });
        scopes.len() - 1
    } else {
        parent_idx
    };

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_ts_scopes(child, bytes, current_idx, scopes);
    }
}

fn walk_ts_imports(node: Node, bytes: &[u8], file: &Path, imports: &mut Vec<ImportInfo>) {
    if node.kind() == "import_statement" {
        let source_node = node.child_by_field_name("source");
        let path = source_node
            .and_then(|n| text_of(bytes, n))
            .map(|s| strip_quotes(&s))
            .unwrap_or_default();
        let name = first_identifier(bytes, node).unwrap_or_else(|| path.clone());
        let text = text_of(bytes, node).unwrap_or_default();
        let is_glob = text.contains('*');

        imports.push(ImportInfo {
            path,
            name,
            is_glob,
            location: location_for(node, file),
        });
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_ts_imports(child, bytes, file, imports);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::build_symbol_table;
    use tree_sitter::Parser;

    fn parse(source: &str) -> (Tree, TypeScriptParser) {
        let ts_parser = TypeScriptParser::new_typescript();
        let mut parser = Parser::new();
        parser.set_language(&ts_parser.language()).unwrap();
        let tree = parser.parse(source, None).unwrap();
        (tree, ts_parser)
    }

    #[test]
    fn extracts_function_and_class() {
        let source = "function greet() {}\nclass Widget { render() {} }";
        let (tree, ts_parser) = parse(source);
        let interner = ThreadedRodeo::default();
        let symbols = ts_parser
            .extract_symbols(&tree, source, FileId(1), Path::new("a.ts"), &interner)
            .unwrap();

        assert!(symbols
            .iter()
            .any(|s| interner.resolve(&s.name) == "greet" && s.kind == SymbolKind::Function));
        assert!(symbols
            .iter()
            .any(|s| interner.resolve(&s.name) == "Widget" && s.kind == SymbolKind::Class));
        assert!(symbols
            .iter()
            .any(|s| interner.resolve(&s.name) == "render" && s.kind == SymbolKind::Method));
    }

    #[test]
    fn calls_resolve_caller_not_callee() {
        let source = "function a() { b(); }\nfunction b() {}";
        let (tree, ts_parser) = parse(source);
        let interner = ThreadedRodeo::default();
        let symbols = ts_parser
            .extract_symbols(&tree, source, FileId(1), Path::new("a.ts"), &interner)
            .unwrap();
        let table = build_symbol_table(&symbols, &interner);

        let calls = ts_parser
            .extract_calls(&tree, source, Path::new("a.ts"), &table)
            .unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].caller.is_resolved());
        assert!(!calls[0].callee.is_resolved());
    }
}
