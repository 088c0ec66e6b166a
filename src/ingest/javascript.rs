//! JavaScript/JSX extractor using tree-sitter-javascript.
//!
//! Covers classes, functions, methods, arrow functions bound to top-level
//! consts, `extends` clauses, imports, and call sites. Visibility is
//! `exported` for exported items, else `private`.

use tree_sitter::Node as TsNode;

use crate::common::{collapse_signature, node_text};
use crate::diagnostics::IndexDiagnostic;
use crate::graph::{NodeKind, Relation, Visibility};
use crate::resolver::default_module_name;

use super::{line_count, make_node, qualify, BatchBuilder, Extractor, FileBatch};

pub struct JavaScriptExtractor {
    parser: tree_sitter::Parser,
}

impl JavaScriptExtractor {
    pub fn new() -> anyhow::Result<Self> {
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&tree_sitter_javascript::LANGUAGE.into())?;
        Ok(Self { parser })
    }
}

impl Extractor for JavaScriptExtractor {
    fn language(&self) -> &'static str {
        "javascript"
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
            false,
        );
        builder.finish()
    }
}

pub(super) fn visibility(is_exported: bool) -> Visibility {
    if is_exported {
        Visibility::Exported
    } else {
        Visibility::Private
    }
}

/// Decorator children of a node (`@Component` style), in source order.
pub(super) fn decorators_of(node: TsNode, source: &[u8]) -> Vec<String> {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .filter(|c| c.kind() == "decorator")
        .map(|c| collapse_signature(&node_text(c, source)))
        .collect()
}

/// Leading `/** ... */` or `//` comment block immediately above a node.
pub(super) fn leading_comment(node: TsNode, source: &[u8]) -> String {
    let mut prev = node.prev_sibling();
    // Skip decorators between the comment and the definition
    while let Some(sibling) = prev {
        if sibling.kind() == "decorator" {
            prev = sibling.prev_sibling();
        } else {
            break;
        }
    }
    let Some(sibling) = prev else {
        return String::new();
    };
    if sibling.kind() != "comment" || sibling.end_position().row + 1 < node.start_position().row {
        return String::new();
    }

    let raw = node_text(sibling, source);
    raw.trim_start_matches("/**")
        .trim_start_matches("/*")
        .trim_end_matches("*/")
        .lines()
        .map(|line| line.trim().trim_start_matches("//").trim_start_matches('*').trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Callee name of a `call_expression` / `new_expression`; member calls use
/// the property name.
pub(super) fn callee_name(node: TsNode, source: &[u8]) -> Option<String> {
    let function = node
        .child_by_field_name("function")
        .or_else(|| node.child_by_field_name("constructor"))?;
    match function.kind() {
        "identifier" => Some(node_text(function, source)),
        "member_expression" => function
            .child_by_field_name("property")
            .map(|p| node_text(p, source)),
        _ => None,
    }
}

fn walk(
    node: TsNode,
    source: &[u8],
    file_path: &str,
    builder: &mut BatchBuilder,
    scope: &mut Vec<String>,
    parent_id: &str,
    is_exported: bool,
) {
    match node.kind() {
        "export_statement" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                walk(child, source, file_path, builder, scope, parent_id, true);
            }
            return;
        }
        "function_declaration" | "generator_function_declaration" => {
            if let Some(id) = handle_function(
                node,
                source,
                file_path,
                builder,
                scope,
                parent_id,
                is_exported,
                NodeKind::Function,
            ) {
                let name = field_text(node, "name", source);
                scope.push(name);
                walk_children(node, source, file_path, builder, scope, &id, is_exported);
                scope.pop();
            }
            return;
        }
        "method_definition" => {
            if let Some(id) = handle_function(
                node,
                source,
                file_path,
                builder,
                scope,
                parent_id,
                is_exported,
                NodeKind::Method,
            ) {
                let name = field_text(node, "name", source);
                scope.push(name);
                walk_children(node, source, file_path, builder, scope, &id, is_exported);
                scope.pop();
            }
            return;
        }
        "class_declaration" => {
            if let Some(id) =
                handle_class(node, source, file_path, builder, scope, parent_id, is_exported)
            {
                let name = field_text(node, "name", source);
                scope.push(name);
                walk_children(node, source, file_path, builder, scope, &id, false);
                scope.pop();
            }
            return;
        }
        "lexical_declaration" | "variable_declaration" => {
            // const f = () => {} at module scope becomes a function node
            if scope.is_empty() {
                let mut cursor = node.walk();
                for declarator in node.children(&mut cursor) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    if let Some(id) = handle_arrow_const(
                        declarator, source, file_path, builder, scope, parent_id, is_exported,
                    ) {
                        walk_children(
                            declarator, source, file_path, builder, scope, &id, is_exported,
                        );
                        return;
                    }
                }
            }
        }
        "import_statement" => {
            if let Some(source_node) = node.child_by_field_name("source") {
                let module = node_text(source_node, source);
                let module = module.trim_matches(|c| c == '\'' || c == '"' || c == '`');
                builder.add_import(module, node.start_position().row + 1);
            }
            return;
        }
        "call_expression" | "new_expression" => {
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

    walk_children(node, source, file_path, builder, scope, parent_id, is_exported);
}

fn walk_children(
    node: TsNode,
    source: &[u8],
    file_path: &str,
    builder: &mut BatchBuilder,
    scope: &mut Vec<String>,
    parent_id: &str,
    is_exported: bool,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, file_path, builder, scope, parent_id, is_exported);
    }
}

fn field_text(node: TsNode, field: &str, source: &[u8]) -> String {
    node.child_by_field_name(field)
        .map(|n| node_text(n, source))
        .unwrap_or_default()
}

#[allow(clippy::too_many_arguments)]
fn handle_function(
    node: TsNode,
    source: &[u8],
    file_path: &str,
    builder: &mut BatchBuilder,
    scope: &[String],
    parent_id: &str,
    is_exported: bool,
    kind: NodeKind,
) -> Option<String> {
    let name_node = node.child_by_field_name("name")?;
    let name = node_text(name_node, source);

    let mut signature = name.clone();
    if let Some(params) = node.child_by_field_name("parameters") {
        signature.push_str(&node_text(params, source));
    }

    let graph_node = make_node(
        file_path,
        &qualify(scope, &name),
        &name,
        kind,
        node,
        collapse_signature(&signature),
        leading_comment(node, source),
        decorators_of(node, source),
        visibility(is_exported),
    );
    Some(builder.define(graph_node, parent_id))
}

fn handle_class(
    node: TsNode,
    source: &[u8],
    file_path: &str,
    builder: &mut BatchBuilder,
    scope: &[String],
    parent_id: &str,
    is_exported: bool,
) -> Option<String> {
    let name_node = node.child_by_field_name("name")?;
    let name = node_text(name_node, source);

    let graph_node = make_node(
        file_path,
        &qualify(scope, &name),
        &name,
        NodeKind::Class,
        node,
        collapse_signature(&format!("class {name}")),
        leading_comment(node, source),
        decorators_of(node, source),
        visibility(is_exported),
    );
    let class_id = builder.define(graph_node, parent_id);

    // class X extends Y
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "class_heritage" {
            if let Some(base) = child.named_child(child.named_child_count().saturating_sub(1)) {
                let base_name = node_text(base, source);
                let base_name = base_name.rsplit('.').next().unwrap_or(&base_name);
                builder.relate_to_name(
                    &class_id,
                    base_name,
                    Relation::Inherits,
                    child.start_position().row + 1,
                );
            }
        }
    }

    Some(class_id)
}

fn handle_arrow_const(
    declarator: TsNode,
    source: &[u8],
    file_path: &str,
    builder: &mut BatchBuilder,
    scope: &[String],
    parent_id: &str,
    is_exported: bool,
) -> Option<String> {
    let value = declarator.child_by_field_name("value")?;
    if !matches!(value.kind(), "arrow_function" | "function_expression" | "function") {
        return None;
    }
    let name_node = declarator.child_by_field_name("name")?;
    let name = node_text(name_node, source);

    let mut signature = name.clone();
    if let Some(params) = value.child_by_field_name("parameters") {
        signature.push_str(&node_text(params, source));
    }

    let parent = declarator.parent().unwrap_or(declarator);
    let graph_node = make_node(
        file_path,
        &qualify(scope, &name),
        &name,
        NodeKind::Function,
        declarator,
        collapse_signature(&signature),
        leading_comment(parent, source),
        vec![],
        visibility(is_exported),
    );
    Some(builder.define(graph_node, parent_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> FileBatch {
        let mut extractor = JavaScriptExtractor::new().unwrap();
        extractor.extract("app.js", source.as_bytes())
    }

    #[test]
    fn extracts_function_declaration() {
        let batch = extract("function greet(name) { return name; }\n");
        let func = batch.nodes.iter().find(|n| n.name == "greet").unwrap();
        assert_eq!(func.kind, NodeKind::Function);
        assert_eq!(func.signature, "greet(name)");
        assert_eq!(func.visibility, Visibility::Private);
    }

    #[test]
    fn exported_items_are_marked_exported() {
        let batch = extract("export function api() {}\nfunction internal() {}\n");
        let api = batch.nodes.iter().find(|n| n.name == "api").unwrap();
        assert_eq!(api.visibility, Visibility::Exported);
        let internal = batch.nodes.iter().find(|n| n.name == "internal").unwrap();
        assert_eq!(internal.visibility, Visibility::Private);
    }

    #[test]
    fn arrow_const_becomes_function() {
        let batch = extract("export const handler = (req, res) => res.end();\n");
        let func = batch.nodes.iter().find(|n| n.name == "handler").unwrap();
        assert_eq!(func.kind, NodeKind::Function);
        assert_eq!(func.signature, "handler(req, res)");
        assert_eq!(func.visibility, Visibility::Exported);
    }

    #[test]
    fn class_with_methods_and_extends() {
        let batch = extract(
            r#"
class Animal {}
class Dog extends Animal {
  bark() { return "woof"; }
}
"#,
        );
        let dog = batch.nodes.iter().find(|n| n.name == "Dog").unwrap();
        let animal = batch.nodes.iter().find(|n| n.name == "Animal").unwrap();
        let bark = batch.nodes.iter().find(|n| n.name == "bark").unwrap();
        assert_eq!(bark.kind, NodeKind::Method);
        assert_eq!(bark.qualified_name, "Dog.bark");

        let inherits = batch
            .edges
            .iter()
            .find(|e| e.relation == Relation::Inherits)
            .unwrap();
        assert_eq!(inherits.from_id, dog.id);
        assert_eq!(inherits.to_id, animal.id);
    }

    #[test]
    fn imports_strip_quotes() {
        let batch = extract("import { api } from './api';\nimport fs from 'fs';\n");
        let modules: Vec<&str> = batch.imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["./api", "fs"]);
    }

    #[test]
    fn calls_are_linked() {
        let batch = extract(
            r#"
function helper() {}
function main() { helper(); other.run(); }
"#,
        );
        let helper = batch.nodes.iter().find(|n| n.name == "helper").unwrap();
        let main = batch.nodes.iter().find(|n| n.name == "main").unwrap();
        let calls: Vec<_> = batch
            .edges
            .iter()
            .filter(|e| e.relation == Relation::Calls)
            .collect();
        assert!(calls
            .iter()
            .any(|e| e.from_id == main.id && e.to_id == helper.id));
        // member call lands on a placeholder named "run"
        assert!(calls.iter().any(|e| {
            batch
                .nodes
                .iter()
                .any(|n| n.id == e.to_id && n.qualified_name == "run" && n.is_placeholder())
        }));
    }

    #[test]
    fn jsdoc_becomes_docstring() {
        let batch = extract(
            r#"
/** Greets a user. */
function greet() {}
"#,
        );
        let func = batch.nodes.iter().find(|n| n.name == "greet").unwrap();
        assert_eq!(func.docstring, "Greets a user.");
    }

    #[test]
    fn broken_source_degrades() {
        let batch = extract("class {{{{");
        assert!(batch.nodes.len() < 5);
    }
}
