//! Rust extractor using tree-sitter-rust.
//!
//! Covers structs, traits, impls, functions, and inline modules. An impl
//! block is a class-like container: its functions become methods qualified
//! by the self type. `use` declarations become imports; visibility follows
//! the `pub` keyword.

use tree_sitter::Node as TsNode;

use crate::common::{collapse_signature, node_text};
use crate::diagnostics::IndexDiagnostic;
use crate::graph::{NodeKind, Relation, Visibility};
use crate::resolver::default_module_name;

use super::{line_count, make_node, qualify, BatchBuilder, Extractor, FileBatch};

pub struct RustExtractor {
    parser: tree_sitter::Parser,
}

impl RustExtractor {
    pub fn new() -> anyhow::Result<Self> {
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&tree_sitter_rust::LANGUAGE.into())?;
        Ok(Self { parser })
    }
}

impl Extractor for RustExtractor {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn extract(&mut self, file_path: &str, source: &[u8]) -> FileBatch {
        let module_name = default_module_name(file_path);
        let mut builder = BatchBuilder::new(file_path, &module_name, line_count(source));

        let tree = match self.parser.parse(source, None) {
            Some(tree) => tree,
            None => {
                builder.diagnostic(IndexDiagnostic::parse_failed(
                    file_path,
                    "tree-sitter produced no tree",
                ));
                return builder.finish();
            }
        };

        let module_id = builder.module_id().to_string();
        let mut scope = Vec::new();
        walk(
            tree.root_node(),
            source,
            file_path,
            &mut builder,
            &mut scope,
            &module_id,
            None,
        );
        builder.finish()
    }
}

/// Extraction context while inside an impl block: the self-type name used
/// to qualify methods.
type ImplContext<'a> = Option<&'a str>;

fn walk(
    node: TsNode,
    source: &[u8],
    file_path: &str,
    builder: &mut BatchBuilder,
    scope: &mut Vec<String>,
    parent_id: &str,
    impl_type: ImplContext<'_>,
) {
    match node.kind() {
        "function_item" | "function_signature_item" => {
            handle_function(node, source, file_path, builder, scope, parent_id, impl_type);
            return;
        }
        "struct_item" => {
            handle_simple_item(node, source, file_path, builder, scope, parent_id, NodeKind::Struct, "struct");
            return;
        }
        "enum_item" | "union_item" => {
            // Modeled as struct-like containers
            handle_simple_item(node, source, file_path, builder, scope, parent_id, NodeKind::Struct, "enum");
            return;
        }
        "trait_item" => {
            if let Some((id, name)) = handle_container(
                node, source, file_path, builder, scope, parent_id, NodeKind::Trait, "trait",
            ) {
                scope.push(name.clone());
                walk_children(node, source, file_path, builder, scope, &id, Some(name.as_str()));
                scope.pop();
            }
            return;
        }
        "impl_item" => {
            handle_impl(node, source, file_path, builder, scope, parent_id);
            return;
        }
        "mod_item" => {
            if let Some((id, name)) = handle_container(
                node, source, file_path, builder, scope, parent_id, NodeKind::Module, "mod",
            ) {
                scope.push(name);
                walk_children(node, source, file_path, builder, scope, &id, None);
                scope.pop();
            }
            return;
        }
        "use_declaration" => {
            if let Some(argument) = node.child_by_field_name("argument") {
                let module = normalize_use_path(&node_text(argument, source));
                builder.add_import(&module, node.start_position().row + 1);
            }
            return;
        }
        "call_expression" => {
            if let Some(callee) = callee_name(node, source) {
                builder.relate_to_name(
                    parent_id,
                    &callee,
                    Relation::Calls,
                    node.start_position().row + 1,
                );
            }
        }
        _ => {}
    }

    walk_children(node, source, file_path, builder, scope, parent_id, impl_type);
}

fn walk_children(
    node: TsNode,
    source: &[u8],
    file_path: &str,
    builder: &mut BatchBuilder,
    scope: &mut Vec<String>,
    parent_id: &str,
    impl_type: ImplContext<'_>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, file_path, builder, scope, parent_id, impl_type);
    }
}

fn handle_function(
    node: TsNode,
    source: &[u8],
    file_path: &str,
    builder: &mut BatchBuilder,
    scope: &mut Vec<String>,
    parent_id: &str,
    impl_type: ImplContext<'_>,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);

    let mut signature = name.clone();
    if let Some(params) = node.child_by_field_name("parameters") {
        signature.push_str(&node_text(params, source));
    }
    if let Some(return_type) = node.child_by_field_name("return_type") {
        signature.push_str(" -> ");
        signature.push_str(&node_text(return_type, source));
    }

    let (qualified_name, kind) = match impl_type {
        Some(self_type) => (format!("{self_type}.{name}"), NodeKind::Method),
        None => (qualify(scope, &name), NodeKind::Function),
    };

    let graph_node = make_node(
        file_path,
        &qualified_name,
        &name,
        kind,
        node,
        collapse_signature(&signature),
        doc_comments(node, source),
        attributes(node, source),
        rust_visibility(node),
    );
    let id = builder.define(graph_node, parent_id);

    scope.push(name);
    walk_children(node, source, file_path, builder, scope, &id, None);
    scope.pop();
}

#[allow(clippy::too_many_arguments)]
fn handle_simple_item(
    node: TsNode,
    source: &[u8],
    file_path: &str,
    builder: &mut BatchBuilder,
    scope: &mut Vec<String>,
    parent_id: &str,
    kind: NodeKind,
    keyword: &str,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);

    let graph_node = make_node(
        file_path,
        &qualify(scope, &name),
        &name,
        kind,
        node,
        collapse_signature(&format!("{keyword} {name}")),
        doc_comments(node, source),
        attributes(node, source),
        rust_visibility(node),
    );
    builder.define(graph_node, parent_id);
}

/// Named containers (traits, inline modules) whose children are walked in
/// their scope.
#[allow(clippy::too_many_arguments)]
fn handle_container(
    node: TsNode,
    source: &[u8],
    file_path: &str,
    builder: &mut BatchBuilder,
    scope: &mut Vec<String>,
    parent_id: &str,
    kind: NodeKind,
    keyword: &str,
) -> Option<(String, String)> {
    let name_node = node.child_by_field_name("name")?;
    let name = node_text(name_node, source);

    let graph_node = make_node(
        file_path,
        &qualify(scope, &name),
        &name,
        kind,
        node,
        collapse_signature(&format!("{keyword} {name}")),
        doc_comments(node, source),
        attributes(node, source),
        rust_visibility(node),
    );
    let id = builder.define(graph_node, parent_id);
    Some((id, name))
}

fn handle_impl(
    node: TsNode,
    source: &[u8],
    file_path: &str,
    builder: &mut BatchBuilder,
    scope: &mut Vec<String>,
    parent_id: &str,
) {
    let Some(type_node) = node.child_by_field_name("type") else {
        return;
    };
    let self_type = node_text(type_node, source);
    // Strip generics: GraphStore<T> -> GraphStore
    let self_type = self_type.split('<').next().unwrap_or(&self_type).to_string();

    let trait_name = node
        .child_by_field_name("trait")
        .map(|t| node_text(t, source))
        .map(|t| t.split('<').next().unwrap_or(&t).to_string());

    let (qualified_name, signature) = match &trait_name {
        Some(trait_name) => (
            format!("impl {trait_name} for {self_type}"),
            format!("impl {trait_name} for {self_type}"),
        ),
        None => (format!("impl {self_type}"), format!("impl {self_type}")),
    };

    let graph_node = make_node(
        file_path,
        &qualified_name,
        &self_type,
        NodeKind::Impl,
        node,
        collapse_signature(&signature),
        doc_comments(node, source),
        attributes(node, source),
        Visibility::Public,
    );
    let impl_id = builder.define(graph_node, parent_id);

    if let Some(trait_name) = &trait_name {
        let short = trait_name.rsplit("::").next().unwrap_or(trait_name);
        builder.relate_to_name(
            &impl_id,
            short,
            Relation::Implements,
            node.start_position().row + 1,
        );
    }

    walk_children(node, source, file_path, builder, scope, &impl_id, Some(self_type.as_str()));
}

/// `use a::b::{c, d} as e` -> `a::b`
fn normalize_use_path(raw: &str) -> String {
    let raw = raw.trim();
    let before_list = raw.split("::{").next().unwrap_or(raw);
    let before_as = before_list.split(" as ").next().unwrap_or(before_list);
    before_as.trim().trim_end_matches("::").to_string()
}

fn callee_name(node: TsNode, source: &[u8]) -> Option<String> {
    let function = node.child_by_field_name("function")?;
    match function.kind() {
        "identifier" => Some(node_text(function, source)),
        "scoped_identifier" => function
            .child_by_field_name("name")
            .map(|n| node_text(n, source)),
        "field_expression" => function
            .child_by_field_name("field")
            .map(|f| node_text(f, source)),
        _ => None,
    }
}

/// Contiguous `///` doc comments immediately above an item.
fn doc_comments(node: TsNode, source: &[u8]) -> String {
    let mut lines = Vec::new();
    let mut prev = node.prev_sibling();
    let mut expected_row = node.start_position().row;

    while let Some(sibling) = prev {
        match sibling.kind() {
            "line_comment" | "block_comment" => {
                if sibling.end_position().row + 1 < expected_row {
                    break;
                }
                let text = node_text(sibling, source);
                if let Some(doc) = text.strip_prefix("///") {
                    lines.push(doc.trim().to_string());
                } else if !text.starts_with("//!") {
                    break;
                }
                expected_row = sibling.start_position().row;
                prev = sibling.prev_sibling();
            }
            "attribute_item" => {
                expected_row = sibling.start_position().row;
                prev = sibling.prev_sibling();
            }
            _ => break,
        }
    }

    lines.reverse();
    lines.join("\n")
}

/// Outer attributes (`#[derive(..)]`, `#[test]`) immediately above an item.
fn attributes(node: TsNode, source: &[u8]) -> Vec<String> {
    let mut attrs = Vec::new();
    let mut prev = node.prev_sibling();
    let mut expected_row = node.start_position().row;

    while let Some(sibling) = prev {
        match sibling.kind() {
            "attribute_item" => {
                if sibling.end_position().row + 1 < expected_row {
                    break;
                }
                attrs.push(collapse_signature(&node_text(sibling, source)));
                expected_row = sibling.start_position().row;
                prev = sibling.prev_sibling();
            }
            "line_comment" => {
                expected_row = sibling.start_position().row;
                prev = sibling.prev_sibling();
            }
            _ => break,
        }
    }

    attrs.reverse();
    attrs
}

fn rust_visibility(node: TsNode) -> Visibility {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "visibility_modifier" {
            return Visibility::Public;
        }
    }
    Visibility::Private
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> FileBatch {
        let mut extractor = RustExtractor::new().unwrap();
        extractor.extract("src/store.rs", source.as_bytes())
    }

    #[test]
    fn functions_and_visibility() {
        let batch = extract(
            r#"
pub fn open(path: &str) -> Result<(), Error> { Ok(()) }

fn internal() {}
"#,
        );
        let open = batch.nodes.iter().find(|n| n.name == "open").unwrap();
        assert_eq!(open.kind, NodeKind::Function);
        assert_eq!(open.visibility, Visibility::Public);
        assert_eq!(open.signature, "open(path: &str) -> Result<(), Error>");

        let internal = batch.nodes.iter().find(|n| n.name == "internal").unwrap();
        assert_eq!(internal.visibility, Visibility::Private);
    }

    #[test]
    fn impl_methods_qualified_by_self_type() {
        let batch = extract(
            r#"
pub struct Store;

impl Store {
    pub fn get(&self) -> u32 { 7 }
}
"#,
        );
        let store = batch
            .nodes
            .iter()
            .find(|n| n.name == "Store" && n.kind == NodeKind::Struct)
            .unwrap();
        let imp = batch
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::Impl)
            .unwrap();
        assert_eq!(imp.qualified_name, "impl Store");

        let get = batch.nodes.iter().find(|n| n.name == "get").unwrap();
        assert_eq!(get.kind, NodeKind::Method);
        assert_eq!(get.qualified_name, "Store.get");

        // struct and impl have distinct IDs
        assert_ne!(store.id, imp.id);
        assert!(batch
            .edges
            .iter()
            .any(|e| e.relation == Relation::Defines && e.from_id == imp.id && e.to_id == get.id));
    }

    #[test]
    fn trait_impl_emits_implements_edge() {
        let batch = extract(
            r#"
pub trait Backend {
    fn name(&self) -> String;
}

pub struct Memory;

impl Backend for Memory {
    fn name(&self) -> String { "memory".into() }
}
"#,
        );
        let trait_node = batch
            .nodes
            .iter()
            .find(|n| n.name == "Backend" && n.kind == NodeKind::Trait)
            .unwrap();
        let imp = batch
            .nodes
            .iter()
            .find(|n| n.qualified_name == "impl Backend for Memory")
            .unwrap();
        assert!(batch
            .edges
            .iter()
            .any(|e| e.relation == Relation::Implements
                && e.from_id == imp.id
                && e.to_id == trait_node.id));
    }

    #[test]
    fn use_declarations_become_imports() {
        let batch = extract(
            r#"
use std::collections::HashMap;
use crate::store::{GraphStore, Node};
use serde::Serialize as Ser;
"#,
        );
        let modules: Vec<&str> = batch.imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(
            modules,
            vec!["std::collections::HashMap", "crate::store", "serde::Serialize"]
        );
    }

    #[test]
    fn doc_comments_and_attributes() {
        let batch = extract(
            r#"
/// Opens the store.
/// Creates the file if missing.
#[allow(dead_code)]
pub fn open() {}
"#,
        );
        let open = batch.nodes.iter().find(|n| n.name == "open").unwrap();
        assert_eq!(open.docstring, "Opens the store.\nCreates the file if missing.");
        assert_eq!(open.decorators, vec!["#[allow(dead_code)]"]);
    }

    #[test]
    fn calls_within_functions() {
        let batch = extract(
            r#"
fn helper() {}

fn main() {
    helper();
    other::run();
    value.finish();
}
"#,
        );
        let helper = batch.nodes.iter().find(|n| n.name == "helper").unwrap();
        let main = batch.nodes.iter().find(|n| n.name == "main").unwrap();
        let calls: Vec<_> = batch
            .edges
            .iter()
            .filter(|e| e.relation == Relation::Calls && e.from_id == main.id)
            .collect();
        assert!(calls.iter().any(|e| e.to_id == helper.id));
        assert_eq!(calls.len(), 3);
    }

    #[test]
    fn inline_modules_nest_scope() {
        let batch = extract(
            r#"
mod inner {
    pub fn f() {}
}
"#,
        );
        let inner = batch
            .nodes
            .iter()
            .find(|n| n.name == "inner" && n.kind == NodeKind::Module && !n.is_placeholder())
            .unwrap();
        let f = batch.nodes.iter().find(|n| n.name == "f").unwrap();
        assert_eq!(f.qualified_name, "inner.f");
        assert!(batch
            .edges
            .iter()
            .any(|e| e.relation == Relation::Defines && e.from_id == inner.id && e.to_id == f.id));
    }

    #[test]
    fn enums_modeled_as_structs() {
        let batch = extract("pub enum Kind { A, B }\n");
        let kind = batch.nodes.iter().find(|n| n.name == "Kind").unwrap();
        assert_eq!(kind.kind, NodeKind::Struct);
    }
}
