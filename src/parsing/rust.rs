//! Rust language parser using tree-sitter.

use super::{LanguageParser, SymbolTable};
use crate::ids::{FileId, LocalSymbolId, SymbolId};
use crate::types::*;
use anyhow::Result;
use lasso::ThreadedRodeo;
use std::path::Path;
use tree_sitter::{Language, Node, Tree};

/// Rust source code parser.
pub struct RustParser {
    // Parser instance is created per-use since it's not Send
}

impl RustParser {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for RustParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageParser for RustParser {
    fn language(&self) -> Language {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn extensions(&self) -> &[&str] {
        &["rs"]
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
        let mut module_stack = vec!["crate".to_string()];
        let mut impl_type_stack = Vec::<String>::new();
        let mut next_local = 1u32;

        walk_rust_symbols(
            root,
            bytes,
            file,
            path,
            &mut module_stack,
            &mut impl_type_stack,
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
        let mut module_stack = vec!["crate".to_string()];
        let mut impl_type_stack = Vec::<String>::new();
        let mut fn_scope_stack = Vec::<String>::new();

        walk_rust_calls(
            root,
            bytes,
            path,
            &mut module_stack,
            &mut impl_type_stack,
            &mut fn_scope_stack,
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
        let mut module_stack = vec!["crate".to_string()];
        let mut impl_type_stack = Vec::<String>::new();
        let mut fn_scope_stack = Vec::<String>::new();

        walk_rust_references(
            root,
            bytes,
            path,
            &mut module_stack,
            &mut impl_type_stack,
            &mut fn_scope_stack,
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
        walk_rust_scopes(root, bytes, 0, &mut scopes);
        Ok(scopes)
    }

    fn extract_imports(
        &self,
        tree: &Tree,
        source: &str,
        file: &Path,
    ) -> Result<Vec<ImportInfo>> {
        let bytes = source.as_bytes();
        let root = tree.root_node();

        let mut imports = Vec::new();
        walk_rust_imports(root, bytes, file, &mut imports);

        Ok(imports)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn last_ident_of(bytes: &[u8], node: Node) -> Option<String> {
    let text = std::str::from_utf8(&bytes[node.start_byte()..node.end_byte()]).ok()?;
    let mut best = None;
    for part in text.split(|c: char| !c.is_ascii_alphanumeric() && c != '_') {
        if !part.is_empty() {
            best = Some(part);
        }
    }
    best.map(|s| s.to_string())
}

fn location_for(node: Node, file: &Path) -> Location {
    let s = node.start_position();
    let e = node.end_position();
    Location {
        file: file.to_path_buf(),
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
        start_line: s.row,
        start_col: s.column,
        end_line: e.row,
        end_col: e.column,
    }
}

fn join_scope(seg: &[String]) -> String {
    seg.join("::")
}

fn current_impl_type(impl_stack: &[String]) -> Option<&str> {
    impl_stack.last().map(|s| s.as_str())
}

fn impl_type_ident(bytes: &[u8], impl_node: Node) -> Option<String> {
    if impl_node.kind() != "impl_item" {
        return None;
    }
    if let Some(ty) = impl_node.child_by_field_name("type") {
        let text = std::str::from_utf8(&bytes[ty.start_byte()..ty.end_byte()]).ok()?;
        let name = text
            .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .find(|s| !s.is_empty())?
            .to_string();
        return Some(name);
    }
    None
}

fn has_test_attr(bytes: &[u8], fn_node: Node) -> bool {
    let kind = fn_node.kind();
    if kind != "function_item" {
        return false;
    }
    let mut cur = fn_node.prev_sibling();
    while let Some(sib) = cur {
        let k = sib.kind();
        if k == "attribute_item" {
            if let Ok(text) = std::str::from_utf8(&bytes[sib.start_byte()..sib.end_byte()]) {
                if text.contains("#[test") || text.contains("#[tokio::test") {
                    return true;
                }
            }
            cur = sib.prev_sibling();
            continue;
        }
        break;
    }
    false
}

fn extract_attributes(bytes: &[u8], node: Node) -> Vec<String> {
    let mut attrs = Vec::new();
    let mut cur = node.prev_sibling();
    while let Some(sib) = cur {
        if sib.kind() == "attribute_item" {
            if let Ok(text) = std::str::from_utf8(&bytes[sib.start_byte()..sib.end_byte()]) {
                attrs.push(text.trim().to_string());
            }
            cur = sib.prev_sibling();
        } else {
            break;
        }
    }
    attrs.reverse();
    attrs
}

fn extract_doc_comments(bytes: &[u8], node: Node) -> Option<String> {
    let mut doc_lines = Vec::new();
    let mut cur = node.prev_sibling();

    while let Some(sib) = cur {
        let k = sib.kind();
        if k == "line_comment" {
            if let Ok(text) = std::str::from_utf8(&bytes[sib.start_byte()..sib.end_byte()]) {
                if text.starts_with("///") || text.starts_with("//!") {
                    doc_lines.push(text.trim().to_string());
                } else {
                    break;
                }
            }
            cur = sib.prev_sibling();
        } else if k == "attribute_item" {
            cur = sib.prev_sibling();
        } else {
            break;
        }
    }

    doc_lines.reverse();
    if doc_lines.is_empty() {
        None
    } else {
        Some(doc_lines.join("\n"))
    }
}

fn extract_visibility(bytes: &[u8], node: Node) -> Visibility {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "visibility_modifier" {
            if let Ok(vis_text) = std::str::from_utf8(&bytes[child.start_byte()..child.end_byte()]) {
                let vis = vis_text.trim();
                if vis == "pub" {
                    return Visibility::Public;
                } else if vis.starts_with("pub(crate)") {
                    return Visibility::Crate;
                } else if vis.starts_with("pub(super)") {
                    return Visibility::Super;
                } else if vis.starts_with("pub(in") || vis.starts_with("pub(self)") {
                    return Visibility::Restricted;
                }
            }
        }
    }
    Visibility::Private
}

fn extract_signature(bytes: &[u8], fn_node: Node) -> Signature {
    let mut sig = Signature::default();

    if let Some(params_node) = fn_node.child_by_field_name("parameters") {
        let mut cursor = params_node.walk();
        for child in params_node.children(&mut cursor) {
            if child.kind() == "parameter" || child.kind() == "self_parameter" {
                if let Ok(text) = std::str::from_utf8(&bytes[child.start_byte()..child.end_byte()]) {
                    sig.params.push(text.trim().to_string());
                }
            }
        }
    }

    if let Some(ret_node) = fn_node.child_by_field_name("return_type") {
        if let Ok(text) = std::str::from_utf8(&bytes[ret_node.start_byte()..ret_node.end_byte()]) {
            sig.return_type = Some(text.trim().to_string());
        }
    }

    let mut cursor = fn_node.walk();
    for child in fn_node.children(&mut cursor) {
        let kind = child.kind();
        if kind == "async" {
            sig.is_async = true;
        } else if kind == "unsafe" {
            sig.is_unsafe = true;
        } else if kind == "const" {
            sig.is_const = true;
        } else if kind == "type_parameters" {
            if let Ok(text) = std::str::from_utf8(&bytes[child.start_byte()..child.end_byte()]) {
                sig.generics = Some(text.trim().to_string());
            }
        } else if kind == "where_clause" {
            if let Ok(text) = std::str::from_utf8(&bytes[child.start_byte()..child.end_byte()]) {
                sig.where_clause = Some(text.trim().to_string());
            }
        }
    }

    sig
}

fn make_symbol(
    interner: &ThreadedRodeo,
    file: FileId,
    next_local: &mut u32,
    name: &str,
    scoped: &str,
    kind: SymbolKind,
    location: Location,
    signature: Option<Signature>,
    visibility: Visibility,
    attributes: Vec<String>,
    doc_comment: Option<String>,
    parent: Option<SymbolId>,
) -> SymbolDef {
    let id = SymbolId::new(file, LocalSymbolId(*next_local));
    *next_local += 1;
    SymbolDef {
        id,
        name: interner.get_or_intern(name),
        scoped_name: interner.get_or_intern(scoped),
        kind,
        location,
        signature,
        visibility,
        attributes,
        doc_comment,
        parent,
    }
}

// ============================================================================
// Symbol Extraction Walker
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn walk_rust_symbols(
    node: Node,
    bytes: &[u8],
    file: FileId,
    path: &Path,
    module_stack: &mut Vec<String>,
    impl_type_stack: &mut Vec<String>,
    next_local: &mut u32,
    interner: &ThreadedRodeo,
    symbols: &mut Vec<SymbolDef>,
) {
    let kind = node.kind();

    let mut entered_mod = false;
    if kind == "mod_item" {
        let has_body = node.child_by_field_name("body").is_some();
        if has_body {
            if let Some(name_node) = node.child_by_field_name("name") {
                if let Some(name) = last_ident_of(bytes, name_node) {
                    module_stack.push(name.clone());
                    entered_mod = true;
                    let scoped = join_scope(module_stack);
                    symbols.push(make_symbol(
                        interner,
                        file,
                        next_local,
                        &name,
                        &scoped,
                        SymbolKind::Module,
                        location_for(node, path),
                        None,
                        extract_visibility(bytes, node),
                        extract_attributes(bytes, node),
                        extract_doc_comments(bytes, node),
                        None,
                    ));
                }
            }
        }
    }

    let mut entered_impl = false;
    let mut impl_symbol_id: Option<SymbolId> = None;
    if kind == "impl_item" {
        if let Some(ty) = impl_type_ident(bytes, node) {
            impl_type_stack.push(ty.clone());
            entered_impl = true;
            let mut scoped = join_scope(module_stack);
            scoped.push_str("::");
            scoped.push_str(&ty);
            let def = make_symbol(
                interner,
                file,
                next_local,
                &ty,
                &scoped,
                SymbolKind::Impl,
                location_for(node, path),
                None,
                Visibility::Private,
                extract_attributes(bytes, node),
                extract_doc_comments(bytes, node),
                None,
            );
            impl_symbol_id = Some(def.id);
            symbols.push(def);
        } else {
            impl_type_stack.push("_".to_string());
            entered_impl = true;
        }
    }

    match kind {
        "function_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                if let Some(fn_name) = last_ident_of(bytes, name_node) {
                    let mut scoped = join_scope(module_stack);

                    let parent = if let Some(ty) = current_impl_type(impl_type_stack) {
                        if !ty.is_empty() && ty != "_" {
                            scoped.push_str("::");
                            scoped.push_str(ty);
                            impl_symbol_id
                        } else {
                            None
                        }
                    } else {
                        None
                    };

                    scoped.push_str("::");
                    scoped.push_str(&fn_name);

                    let symbol_kind = if parent.is_some() {
                        SymbolKind::Method
                    } else if fn_name == "new" {
                        SymbolKind::Constructor
                    } else {
                        SymbolKind::Function
                    };

                    let mut attrs = extract_attributes(bytes, node);
                    if has_test_attr(bytes, node) && !attrs.iter().any(|a| a.contains("test")) {
                        attrs.push("#[test]".to_string());
                    }

                    symbols.push(make_symbol(
                        interner,
                        file,
                        next_local,
                        &fn_name,
                        &scoped,
                        symbol_kind,
                        location_for(node, path),
                        Some(extract_signature(bytes, node)),
                        extract_visibility(bytes, node),
                        attrs,
                        extract_doc_comments(bytes, node),
                        parent,
                    ));
                }
            }
        }

        "struct_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                if let Some(name) = last_ident_of(bytes, name_node) {
                    let mut scoped = join_scope(module_stack);
                    scoped.push_str("::");
                    scoped.push_str(&name);
                    symbols.push(make_symbol(
                        interner,
                        file,
                        next_local,
                        &name,
                        &scoped,
                        SymbolKind::Struct,
                        location_for(node, path),
                        None,
                        extract_visibility(bytes, node),
                        extract_attributes(bytes, node),
                        extract_doc_comments(bytes, node),
                        None,
                    ));
                }
            }
        }

        "enum_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                if let Some(name) = last_ident_of(bytes, name_node) {
                    let mut scoped = join_scope(module_stack);
                    scoped.push_str("::");
                    scoped.push_str(&name);
                    symbols.push(make_symbol(
                        interner,
                        file,
                        next_local,
                        &name,
                        &scoped,
                        SymbolKind::Enum,
                        location_for(node, path),
                        None,
                        extract_visibility(bytes, node),
                        extract_attributes(bytes, node),
                        extract_doc_comments(bytes, node),
                        None,
                    ));
                }
            }
        }

        "trait_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                if let Some(name) = last_ident_of(bytes, name_node) {
                    let mut scoped = join_scope(module_stack);
                    scoped.push_str("::");
                    scoped.push_str(&name);
                    symbols.push(make_symbol(
                        interner,
                        file,
                        next_local,
                        &name,
                        &scoped,
                        SymbolKind::Trait,
                        location_for(node, path),
                        None,
                        extract_visibility(bytes, node),
                        extract_attributes(bytes, node),
                        extract_doc_comments(bytes, node),
                        None,
                    ));
                }
            }
        }

        "const_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                if let Some(name) = last_ident_of(bytes, name_node) {
                    let mut scoped = join_scope(module_stack);
                    let parent = if let Some(ty) = current_impl_type(impl_type_stack) {
                        if !ty.is_empty() && ty != "_" {
                            scoped.push_str("::");
                            scoped.push_str(ty);
                            impl_symbol_id
                        } else {
                            None
                        }
                    } else {
                        None
                    };
                    scoped.push_str("::");
                    scoped.push_str(&name);
                    symbols.push(make_symbol(
                        interner,
                        file,
                        next_local,
                        &name,
                        &scoped,
                        SymbolKind::Constant,
                        location_for(node, path),
                        None,
                        extract_visibility(bytes, node),
                        extract_attributes(bytes, node),
                        extract_doc_comments(bytes, node),
                        parent,
                    ));
                }
            }
        }

        "static_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                if let Some(name) = last_ident_of(bytes, name_node) {
                    let mut scoped = join_scope(module_stack);
                    scoped.push_str("::");
                    scoped.push_str(&name);
                    symbols.push(make_symbol(
                        interner,
                        file,
                        next_local,
                        &name,
                        &scoped,
                        SymbolKind::Variable,
                        location_for(node, path),
                        None,
                        extract_visibility(bytes, node),
                        extract_attributes(bytes, node),
                        extract_doc_comments(bytes, node),
                        None,
                    ));
                }
            }
        }

        "type_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                if let Some(name) = last_ident_of(bytes, name_node) {
                    let mut scoped = join_scope(module_stack);
                    scoped.push_str("::");
                    scoped.push_str(&name);
                    symbols.push(make_symbol(
                        interner,
                        file,
                        next_local,
                        &name,
                        &scoped,
                        SymbolKind::Type,
                        location_for(node, path),
                        None,
                        extract_visibility(bytes, node),
                        extract_attributes(bytes, node),
                        extract_doc_comments(bytes, node),
                        None,
                    ));
                }
            }
        }

        "field_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                if let Some(name) = last_ident_of(bytes, name_node) {
                    if let Some(ty) = current_impl_type(impl_type_stack) {
                        let mut scoped = join_scope(module_stack);
                        scoped.push_str("::");
                        scoped.push_str(ty);
                        scoped.push_str("::");
                        scoped.push_str(&name);
                        symbols.push(make_symbol(
                            interner,
                            file,
                            next_local,
                            &name,
                            &scoped,
                            SymbolKind::Field,
                            location_for(node, path),
                            None,
                            extract_visibility(bytes, node),
                            Vec::new(),
                            extract_doc_comments(bytes, node),
                            impl_symbol_id,
                        ));
                    }
                }
            }
        }

        _ => {}
    }

    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            walk_rust_symbols(
                child,
                bytes,
                file,
                path,
                module_stack,
                impl_type_stack,
                next_local,
                interner,
                symbols,
            );
        }
    }

    if entered_impl {
        impl_type_stack.pop();
    }
    if entered_mod {
        module_stack.pop();
    }
}

// ============================================================================
// Call Extraction Walker
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn walk_rust_calls(
    node: Node,
    bytes: &[u8],
    path: &Path,
    module_stack: &mut Vec<String>,
    impl_type_stack: &mut Vec<String>,
    fn_scope_stack: &mut Vec<String>,
    table: &SymbolTable,
    calls: &mut Vec<CallEdge>,
) {
    let kind = node.kind();

    let mut entered_mod = false;
    if kind == "mod_item" {
        if node.child_by_field_name("body").is_some() {
            if let Some(name_node) = node.child_by_field_name("name") {
                if let Some(name) = last_ident_of(bytes, name_node) {
                    module_stack.push(name);
                    entered_mod = true;
                }
            }
        }
    }

    let mut entered_impl = false;
    if kind == "impl_item" {
        if let Some(ty) = impl_type_ident(bytes, node) {
            impl_type_stack.push(ty);
        } else {
            impl_type_stack.push("_".to_string());
        }
        entered_impl = true;
    }

    let mut entered_fn = false;
    if kind == "function_item" {
        if let Some(name_node) = node.child_by_field_name("name") {
            if let Some(fn_name) = last_ident_of(bytes, name_node) {
                let mut scoped = join_scope(module_stack);
                if let Some(ty) = current_impl_type(impl_type_stack) {
                    if !ty.is_empty() && ty != "_" {
                        scoped.push_str("::");
                        scoped.push_str(ty);
                    }
                }
                scoped.push_str("::");
                scoped.push_str(&fn_name);
                fn_scope_stack.push(scoped);
                entered_fn = true;
            }
        }
    }

    if kind == "call_expression" {
        if let Some(fun) = node.child_by_field_name("function") {
            if let Some(callee_name) = last_ident_of(bytes, fun) {
                let caller = fn_scope_stack
                    .last()
                    .and_then(|s| table.get(s))
                    .copied()
                    .unwrap_or(SymbolId::UNRESOLVED);

                let is_method_call = fun.kind() == "field_expression";

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

    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            walk_rust_calls(
                child,
                bytes,
                path,
                module_stack,
                impl_type_stack,
                fn_scope_stack,
                table,
                calls,
            );
        }
    }

    if entered_fn {
        fn_scope_stack.pop();
    }
    if entered_impl {
        impl_type_stack.pop();
    }
    if entered_mod {
        module_stack.pop();
    }
}

// ============================================================================
// Reference Extraction Walker (best-effort: reads/writes, not a full
// def-use analysis)
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn walk_rust_references(
    node: Node,
    bytes: &[u8],
    path: &Path,
    module_stack: &mut Vec<String>,
    impl_type_stack: &mut Vec<String>,
    fn_scope_stack: &mut Vec<String>,
    table: &SymbolTable,
    refs: &mut Vec<Reference>,
) {
    let kind = node.kind();

    let mut entered_mod = false;
    if kind == "mod_item" {
        if node.child_by_field_name("body").is_some() {
            if let Some(name_node) = node.child_by_field_name("name") {
                if let Some(name) = last_ident_of(bytes, name_node) {
                    module_stack.push(name);
                    entered_mod = true;
                }
            }
        }
    }

    let mut entered_impl = false;
    if kind == "impl_item" {
        if let Some(ty) = impl_type_ident(bytes, node) {
            impl_type_stack.push(ty);
        } else {
            impl_type_stack.push("_".to_string());
        }
        entered_impl = true;
    }

    let mut entered_fn = false;
    if kind == "function_item" {
        if let Some(name_node) = node.child_by_field_name("name") {
            if let Some(fn_name) = last_ident_of(bytes, name_node) {
                let mut scoped = join_scope(module_stack);
                if let Some(ty) = current_impl_type(impl_type_stack) {
                    if !ty.is_empty() && ty != "_" {
                        scoped.push_str("::");
                        scoped.push_str(ty);
                    }
                }
                scoped.push_str("::");
                scoped.push_str(&fn_name);
                fn_scope_stack.push(scoped);
                entered_fn = true;
            }
        }
    }

    let origin = fn_scope_stack.last().and_then(|s| table.get(s)).copied();

    if kind == "assignment_expression" {
        if let Some(left) = node.child_by_field_name("left") {
            if let Some(name) = last_ident_of(bytes, left) {
                refs.push(Reference {
                    location: location_for(left, path),
                    target: SymbolId::UNRESOLVED,
                    target_name: name,
                    kind: ReferenceKind::Write,
                    origin,
                });
            }
        }
    } else if kind == "identifier" {
        let parent_kind = node.parent().map(|p| p.kind()).unwrap_or("");
        let is_declaration = matches!(
            parent_kind,
            "let_declaration" | "parameter" | "function_item" | "struct_item" | "enum_item"
        );
        let is_call_target = node
            .parent()
            .map(|p| p.kind() == "call_expression" && p.child_by_field_name("function") == Some(node))
            .unwrap_or(false);
        if !is_declaration && !is_call_target {
            if let Some(name) = last_ident_of(bytes, node) {
                refs.push(Reference {
                    location: location_for(node, path),
                    target: SymbolId::UNRESOLVED,
                    target_name: name,
                    kind: ReferenceKind::Read,
                    origin,
                });
            }
        }
    } else if kind == "type_identifier" {
        if let Some(name) = last_ident_of(bytes, node) {
            refs.push(Reference {
                location: location_for(node, path),
                target: SymbolId::UNRESOLVED,
                target_name: name,
                kind: ReferenceKind::TypeRef,
                origin,
            });
        }
    }

    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            walk_rust_references(
                child,
                bytes,
                path,
                module_stack,
                impl_type_stack,
                fn_scope_stack,
                table,
                refs,
            );
        }
    }

    if entered_fn {
        fn_scope_stack.pop();
    }
    if entered_impl {
        impl_type_stack.pop();
    }
    if entered_mod {
        module_stack.pop();
    }
}

// ============================================================================
// Scope Tree Walker
// ============================================================================

fn walk_rust_scopes(node: Node, bytes: &[u8], parent_idx: usize, scopes: &mut Vec<Scope>) {
    let kind = node.kind();

    let scope_kind = match kind {
        "mod_item" if node.child_by_field_name("body").is_some() => Some(ScopeKind::Namespace),
        "impl_item" | "trait_item" => Some(ScopeKind::Class),
        "function_item" => Some(ScopeKind::Function),
        "block" => Some(ScopeKind::Block),
        _ => None,
    };

    let current_idx = if let Some(sk) = scope_kind {
        let name = node
            .child_by_field_name("name")
            .and_then(|n| last_ident_of(bytes, n));
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

    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            walk_rust_scopes(child, bytes, current_idx, scopes);
        }
    }
}

// ============================================================================
// Import Extraction Walker
// ============================================================================

fn walk_rust_imports(node: Node, bytes: &[u8], file: &Path, imports: &mut Vec<ImportInfo>) {
    let kind = node.kind();

    if kind == "use_declaration" {
        if let Some(arg_node) = node.child_by_field_name("argument") {
            extract_use_tree(arg_node, bytes, file, "", imports);
        }
    }

    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            walk_rust_imports(child, bytes, file, imports);
        }
    }
}

fn extract_use_tree(node: Node, bytes: &[u8], file: &Path, prefix: &str, imports: &mut Vec<ImportInfo>) {
    let kind = node.kind();

    match kind {
        "scoped_identifier" | "identifier" => {
            if let Ok(text) = std::str::from_utf8(&bytes[node.start_byte()..node.end_byte()]) {
                let full_path = if prefix.is_empty() {
                    text.to_string()
                } else {
                    format!("{}::{}", prefix, text)
                };
                let name = text.split("::").last().unwrap_or(text).to_string();
                imports.push(ImportInfo {
                    path: full_path,
                    name,
                    is_glob: false,
                    location: location_for(node, file),
                });
            }
        }

        "use_as_clause" => {
            if let Some(path_node) = node.child_by_field_name("path") {
                if let Some(alias_node) = node.child_by_field_name("alias") {
                    if let Ok(path_text) =
                        std::str::from_utf8(&bytes[path_node.start_byte()..path_node.end_byte()])
                    {
                        if let Ok(alias_text) =
                            std::str::from_utf8(&bytes[alias_node.start_byte()..alias_node.end_byte()])
                        {
                            let full_path = if prefix.is_empty() {
                                path_text.to_string()
                            } else {
                                format!("{}::{}", prefix, path_text)
                            };
                            imports.push(ImportInfo {
                                path: full_path,
                                name: alias_text.to_string(),
                                is_glob: false,
                                location: location_for(node, file),
                            });
                        }
                    }
                }
            }
        }

        "use_wildcard" => {
            let mut path_found = false;
            let full_text =
                std::str::from_utf8(&bytes[node.start_byte()..node.end_byte()]).unwrap_or("");
            if full_text.ends_with("::*") {
                let path_part = &full_text[..full_text.len() - 3];
                let full_path = if prefix.is_empty() {
                    path_part.to_string()
                } else {
                    format!("{}::{}", prefix, path_part)
                };
                imports.push(ImportInfo {
                    path: full_path,
                    name: "*".to_string(),
                    is_glob: true,
                    location: location_for(node, file),
                });
                path_found = true;
            }

            if !path_found {
                if let Some(parent) = node.parent() {
                    if parent.kind() == "use_list" {
                        if let Some(grandparent) = parent.parent() {
                            if grandparent.kind() == "scoped_use_list" {
                                if let Some(path_node) = grandparent.child_by_field_name("path") {
                                    if let Ok(path_text) = std::str::from_utf8(
                                        &bytes[path_node.start_byte()..path_node.end_byte()],
                                    ) {
                                        let full_path = if prefix.is_empty() {
                                            path_text.to_string()
                                        } else {
                                            format!("{}::{}", prefix, path_text)
                                        };
                                        imports.push(ImportInfo {
                                            path: full_path,
                                            name: "*".to_string(),
                                            is_glob: true,
                                            location: location_for(node, file),
                                        });
                                        path_found = true;
                                    }
                                }
                            }
                        }
                    } else if parent.kind() == "scoped_use_list" {
                        if let Some(path_node) = parent.child_by_field_name("path") {
                            if let Ok(path_text) =
                                std::str::from_utf8(&bytes[path_node.start_byte()..path_node.end_byte()])
                            {
                                let full_path = if prefix.is_empty() {
                                    path_text.to_string()
                                } else {
                                    format!("{}::{}", prefix, path_text)
                                };
                                imports.push(ImportInfo {
                                    path: full_path,
                                    name: "*".to_string(),
                                    is_glob: true,
                                    location: location_for(node, file),
                                });
                                path_found = true;
                            }
                        }
                    }
                }
            }

            if !path_found && !prefix.is_empty() {
                imports.push(ImportInfo {
                    path: prefix.to_string(),
                    name: "*".to_string(),
                    is_glob: true,
                    location: location_for(node, file),
                });
            }
        }

        "scoped_use_list" => {
            if let Some(path_node) = node.child_by_field_name("path") {
                if let Ok(path_text) =
                    std::str::from_utf8(&bytes[path_node.start_byte()..path_node.end_byte()])
                {
                    let new_prefix = if prefix.is_empty() {
                        path_text.to_string()
                    } else {
                        format!("{}::{}", prefix, path_text)
                    };
                    if let Some(list_node) = node.child_by_field_name("list") {
                        for i in 0..list_node.child_count() {
                            if let Some(child) = list_node.child(i) {
                                extract_use_tree(child, bytes, file, &new_prefix, imports);
                            }
                        }
                    }
                }
            }
        }

        "use_list" => {
            for i in 0..node.child_count() {
                if let Some(child) = node.child(i) {
                    extract_use_tree(child, bytes, file, prefix, imports);
                }
            }
        }

        _ => {
            for i in 0..node.child_count() {
                if let Some(child) = node.child(i) {
                    extract_use_tree(child, bytes, file, prefix, imports);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::FileId;
    use crate::parsing::build_symbol_table;
    use lasso::ThreadedRodeo;
    use std::path::Path;
    use tree_sitter::Parser;

    fn parse(source: &str) -> (Tree, RustParser) {
        let rust_parser = RustParser::new();
        let mut parser = Parser::new();
        parser.set_language(&rust_parser.language()).unwrap();
        let tree = parser.parse(source, None).unwrap();
        (tree, rust_parser)
    }

    #[test]
    fn test_extract_symbols() {
        let source = r#"
use std::collections::HashMap;

/// A test struct
pub struct MyStruct {
    value: i32,
}

impl MyStruct {
    pub fn new(value: i32) -> Self {
        Self { value }
    }

    fn internal(&self) -> i32 {
        self.value
    }
}

#[test]
fn test_something() {
    assert_eq!(1, 1);
}

pub fn public_function(x: i32) -> i32 {
    x + 1
}
"#;

        let (tree, rust_parser) = parse(source);
        let interner = ThreadedRodeo::default();

        let symbols = rust_parser
            .extract_symbols(&tree, source, FileId(1), Path::new("test.rs"), &interner)
            .unwrap();

        assert!(symbols
            .iter()
            .any(|s| interner.resolve(&s.name) == "MyStruct" && s.kind == SymbolKind::Struct));
        assert!(symbols
            .iter()
            .any(|s| interner.resolve(&s.name) == "new" && s.kind == SymbolKind::Constructor));
        assert!(symbols
            .iter()
            .any(|s| interner.resolve(&s.name) == "public_function" && s.kind == SymbolKind::Function));

        let test_fn = symbols
            .iter()
            .find(|s| interner.resolve(&s.name) == "test_something")
            .unwrap();
        assert!(test_fn.attributes.iter().any(|a| a.contains("test")));

        let ids: std::collections::HashSet<_> = symbols.iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), symbols.len(), "local ids must be unique");
    }

    #[test]
    fn test_extract_calls() {
        let source = r#"
fn caller() {
    callee();
    another_fn(1, 2);
}

fn callee() {}

fn another_fn(a: i32, b: i32) {}
"#;

        let (tree, rust_parser) = parse(source);
        let interner = ThreadedRodeo::default();
        let symbols = rust_parser
            .extract_symbols(&tree, source, FileId(1), Path::new("test.rs"), &interner)
            .unwrap();
        let table = build_symbol_table(&symbols, &interner);

        let calls = rust_parser
            .extract_calls(&tree, source, Path::new("test.rs"), &table)
            .unwrap();

        assert!(calls.iter().any(|c| c.callee_name == "callee"));
        assert!(calls.iter().any(|c| c.callee_name == "another_fn"));
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.caller.is_resolved()));
        assert!(calls.iter().all(|c| !c.callee.is_resolved()));
    }

    #[test]
    fn test_extract_imports() {
        let source = r#"
use std::collections::HashMap;
use std::io::{Read, Write};
use super::*;
use crate::types::SymbolDef as Symbol;
"#;

        let (tree, rust_parser) = parse(source);

        let imports = rust_parser
            .extract_imports(&tree, source, Path::new("test.rs"))
            .unwrap();

        assert!(imports.iter().any(|i| i.path.contains("HashMap")));
        assert!(imports.iter().any(|i| i.name == "Read"));
        assert!(imports.iter().any(|i| i.name == "Write"));
        assert!(imports.iter().any(|i| i.is_glob));
        assert!(imports.iter().any(|i| i.name == "Symbol"));
    }

    #[test]
    fn test_scoped_names() {
        let source = r#"
pub mod my_module {
    pub struct Foo;

    impl Foo {
        pub fn bar(&self) {}
    }
}
"#;

        let (tree, rust_parser) = parse(source);
        let interner = ThreadedRodeo::default();

        let symbols = rust_parser
            .extract_symbols(&tree, source, FileId(1), Path::new("test.rs"), &interner)
            .unwrap();

        let bar_method = symbols
            .iter()
            .find(|s| interner.resolve(&s.name) == "bar")
            .unwrap();
        let scoped = interner.resolve(&bar_method.scoped_name);
        assert_eq!(scoped, "crate::my_module::Foo::bar");
    }

    #[test]
    fn test_extract_scopes() {
        let source = "fn outer() { fn inner() {} }";
        let (tree, rust_parser) = parse(source);
        let scopes = rust_parser.extract_scopes(&tree, source).unwrap();
        assert!(scopes.iter().any(|s| s.kind == ScopeKind::Function));
        assert!(scopes.iter().any(|s| s.kind == ScopeKind::File && s.parent.is_none()));
    }
}
