//! Python extractor using tree-sitter-python.
//!
//! Covers classes, functions, methods, module-scope variables, decorators,
//! docstrings, imports (`import X`, `from X import Y`), base classes, and
//! call sites. Visibility is `private` for leading-underscore names.

use tree_sitter::Node as TsNode;

use crate::common::{collapse_signature, node_text};
use crate::diagnostics::IndexDiagnostic;
use crate::graph::{NodeKind, Relation, Visibility};
use crate::resolver::default_module_name;

use super::{line_count, make_node, qualify, BatchBuilder, Extractor, FileBatch};

pub struct PythonExtractor {
    parser: tree_sitter::Parser,
}

impl PythonExtractor {
    pub fn new() -> anyhow::Result<Self> {
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&tree_sitter_python::LANGUAGE.into())?;
        Ok(Self { parser })
    }
}

impl Extractor for PythonExtractor {
    fn language(&self) -> &'static str {
        "python"
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
            Vec::new(),
        );
        builder.finish()
    }
}

#[allow(clippy::too_many_arguments)]
fn walk(
    node: TsNode,
    source: &[u8],
    file_path: &str,
    builder: &mut BatchBuilder,
    scope: &mut Vec<String>,
    parent_id: &str,
    in_class: bool,
    decorators: Vec<String>,
) {
    match node.kind() {
        "decorated_definition" => {
            let mut collected = Vec::new();
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "decorator" {
                    collected.push(collapse_signature(&node_text(child, source)));
                }
            }
            if let Some(definition) = node.child_by_field_name("definition") {
                walk(
                    definition, source, file_path, builder, scope, parent_id, in_class, collected,
                );
            }
            return;
        }
        "function_definition" => {
            if let Some(id) = handle_function(
                node, source, file_path, builder, scope, parent_id, in_class, decorators,
            ) {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source))
                    .unwrap_or_default();
                scope.push(name);
                walk_children(node, source, file_path, builder, scope, &id, false);
                scope.pop();
            }
            return;
        }
        "class_definition" => {
            if let Some(id) =
                handle_class(node, source, file_path, builder, scope, parent_id, decorators)
            {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source))
                    .unwrap_or_default();
                scope.push(name);
                walk_children(node, source, file_path, builder, scope, &id, true);
                scope.pop();
            }
            return;
        }
        "import_statement" => {
            handle_import(node, source, builder);
        }
        "import_from_statement" => {
            if let Some(module) = node.child_by_field_name("module_name") {
                builder.add_import(&node_text(module, source), node.start_position().row + 1);
            }
        }
        "expression_statement" => {
            // Module-scope simple assignments become variable nodes.
            if scope.is_empty() && !in_class {
                if let Some(assignment) = node.child(0).filter(|c| c.kind() == "assignment") {
                    handle_module_variable(assignment, source, file_path, builder, parent_id);
                }
            }
        }
        "call" => {
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

    walk_children(node, source, file_path, builder, scope, parent_id, in_class);
}

fn walk_children(
    node: TsNode,
    source: &[u8],
    file_path: &str,
    builder: &mut BatchBuilder,
    scope: &mut Vec<String>,
    parent_id: &str,
    in_class: bool,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(
            child,
            source,
            file_path,
            builder,
            scope,
            parent_id,
            in_class,
            Vec::new(),
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_function(
    node: TsNode,
    source: &[u8],
    file_path: &str,
    builder: &mut BatchBuilder,
    scope: &[String],
    parent_id: &str,
    in_class: bool,
    decorators: Vec<String>,
) -> Option<String> {
    let name_node = node.child_by_field_name("name")?;
    let name = node_text(name_node, source);

    let mut signature = name.clone();
    if let Some(params) = node.child_by_field_name("parameters") {
        signature.push_str(&node_text(params, source));
    }
    if let Some(return_type) = node.child_by_field_name("return_type") {
        signature.push_str(" -> ");
        signature.push_str(&node_text(return_type, source));
    }

    let kind = if in_class {
        NodeKind::Method
    } else {
        NodeKind::Function
    };

    let graph_node = make_node(
        file_path,
        &qualify(scope, &name),
        &name,
        kind,
        node,
        collapse_signature(&signature),
        extract_docstring(node, source),
        decorators,
        python_visibility(&name),
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
    decorators: Vec<String>,
) -> Option<String> {
    let name_node = node.child_by_field_name("name")?;
    let name = node_text(name_node, source);

    let mut signature = format!("class {name}");
    if let Some(superclasses) = node.child_by_field_name("superclasses") {
        signature.push_str(&node_text(superclasses, source));
    }

    let graph_node = make_node(
        file_path,
        &qualify(scope, &name),
        &name,
        NodeKind::Class,
        node,
        collapse_signature(&signature),
        extract_docstring(node, source),
        decorators,
        python_visibility(&name),
    );
    let class_id = builder.define(graph_node, parent_id);

    if let Some(superclasses) = node.child_by_field_name("superclasses") {
        let mut cursor = superclasses.walk();
        for child in superclasses.children(&mut cursor) {
            match child.kind() {
                "identifier" | "attribute" => {
                    let base = node_text(child, source);
                    let base = base.rsplit('.').next().unwrap_or(&base);
                    builder.relate_to_name(
                        &class_id,
                        base,
                        Relation::Inherits,
                        child.start_position().row + 1,
                    );
                }
                _ => {}
            }
        }
    }

    Some(class_id)
}

fn handle_module_variable(
    assignment: TsNode,
    source: &[u8],
    file_path: &str,
    builder: &mut BatchBuilder,
    parent_id: &str,
) {
    let Some(left) = assignment.child_by_field_name("left") else {
        return;
    };
    if left.kind() != "identifier" {
        return;
    }
    let name = node_text(left, source);
    let signature = collapse_signature(
        node_text(assignment, source)
            .lines()
            .next()
            .unwrap_or_default(),
    );

    let graph_node = make_node(
        file_path,
        &name,
        &name,
        NodeKind::Variable,
        assignment,
        signature,
        String::new(),
        vec![],
        python_visibility(&name),
    );
    builder.define(graph_node, parent_id);
}

fn handle_import(node: TsNode, source: &[u8], builder: &mut BatchBuilder) {
    let line = node.start_position().row + 1;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "dotted_name" => builder.add_import(&node_text(child, source), line),
            "aliased_import" => {
                if let Some(name) = child.child_by_field_name("name") {
                    builder.add_import(&node_text(name, source), line);
                }
            }
            _ => {}
        }
    }
}

/// Name of the function a `call` node invokes; for `obj.method(...)` the
/// attribute name.
fn callee_name(node: TsNode, source: &[u8]) -> Option<String> {
    let function = node.child_by_field_name("function")?;
    match function.kind() {
        "identifier" => Some(node_text(function, source)),
        "attribute" => function
            .child_by_field_name("attribute")
            .map(|attr| node_text(attr, source)),
        _ => None,
    }
}

/// Leading string literal of a function/class body.
fn extract_docstring(node: TsNode, source: &[u8]) -> String {
    let Some(body) = node.child_by_field_name("body") else {
        return String::new();
    };
    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        match child.kind() {
            "comment" => continue,
            "expression_statement" => {
                if let Some(first) = child.child(0) {
                    if first.kind() == "string" {
                        let raw = node_text(first, source);
                        return raw
                            .trim_start_matches("\"\"\"")
                            .trim_start_matches("'''")
                            .trim_end_matches("\"\"\"")
                            .trim_end_matches("'''")
                            .trim_matches(|c| c == '"' || c == '\'')
                            .trim()
                            .to_string();
                    }
                }
                return String::new();
            }
            _ => return String::new(),
        }
    }
    String::new()
}

fn python_visibility(name: &str) -> Visibility {
    if name.starts_with('_') {
        Visibility::Private
    } else {
        Visibility::Public
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> FileBatch {
        let mut extractor = PythonExtractor::new().unwrap();
        extractor.extract("test.py", source.as_bytes())
    }

    #[test]
    fn extracts_function_with_signature_and_docstring() {
        let batch = extract(
            r#"
def add(a: int, b: int) -> int:
    """Adds two numbers."""
    return a + b
"#,
        );
        let func = batch.nodes.iter().find(|n| n.name == "add").unwrap();
        assert_eq!(func.kind, NodeKind::Function);
        assert_eq!(func.signature, "add(a: int, b: int) -> int");
        assert_eq!(func.docstring, "Adds two numbers.");
        assert_eq!(func.visibility, Visibility::Public);
        assert_eq!(func.start_line, 2);
    }

    #[test]
    fn methods_get_dotted_qualified_names() {
        let batch = extract(
            r#"
class Dog:
    def bark(self) -> str:
        return "Woof!"
"#,
        );
        let class = batch.nodes.iter().find(|n| n.name == "Dog").unwrap();
        assert_eq!(class.kind, NodeKind::Class);

        let method = batch.nodes.iter().find(|n| n.name == "bark").unwrap();
        assert_eq!(method.kind, NodeKind::Method);
        assert_eq!(method.qualified_name, "Dog.bark");

        // defines chain: module -> Dog -> bark
        let defines: Vec<_> = batch
            .edges
            .iter()
            .filter(|e| e.relation == Relation::Defines)
            .collect();
        assert!(defines
            .iter()
            .any(|e| e.from_id == class.id && e.to_id == method.id));
    }

    #[test]
    fn leading_underscore_is_private() {
        let batch = extract("def _helper():\n    pass\n");
        let func = batch.nodes.iter().find(|n| n.name == "_helper").unwrap();
        assert_eq!(func.visibility, Visibility::Private);
    }

    #[test]
    fn decorators_are_captured_in_order() {
        let batch = extract(
            r#"
@mcp.tool
@property
def handler():
    pass
"#,
        );
        let func = batch.nodes.iter().find(|n| n.name == "handler").unwrap();
        assert_eq!(func.decorators, vec!["@mcp.tool", "@property"]);
    }

    #[test]
    fn imports_produce_placeholder_edges() {
        let batch = extract("import os\nfrom a import f\n");
        let modules: Vec<&str> = batch.imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["os", "a"]);

        let import_edges: Vec<_> = batch
            .edges
            .iter()
            .filter(|e| e.relation == Relation::Imports)
            .collect();
        assert_eq!(import_edges.len(), 2);
        assert!(batch.nodes.iter().any(|n| n.is_placeholder()));
    }

    #[test]
    fn relative_import_keeps_leading_dots() {
        let batch = extract("from .sibling import thing\n");
        assert_eq!(batch.imports[0].module, ".sibling");
    }

    #[test]
    fn calls_link_to_local_definitions() {
        let batch = extract(
            r#"
def f():
    g()

def g():
    pass
"#,
        );
        let f = batch.nodes.iter().find(|n| n.name == "f").unwrap();
        let g = batch.nodes.iter().find(|n| n.name == "g").unwrap();
        let call = batch
            .edges
            .iter()
            .find(|e| e.relation == Relation::Calls)
            .unwrap();
        assert_eq!(call.from_id, f.id);
        assert_eq!(call.to_id, g.id);
        assert_eq!(call.site_line, Some(3));
    }

    #[test]
    fn calls_to_unknown_names_become_placeholders() {
        let batch = extract("def f():\n    h()\n");
        let call = batch
            .edges
            .iter()
            .find(|e| e.relation == Relation::Calls)
            .unwrap();
        let target = batch.nodes.iter().find(|n| n.id == call.to_id).unwrap();
        assert!(target.is_placeholder());
        assert_eq!(target.qualified_name, "h");
    }

    #[test]
    fn method_calls_use_attribute_name() {
        let batch = extract(
            r#"
def f(db):
    db.upsert_node(1)
"#,
        );
        let call = batch
            .edges
            .iter()
            .find(|e| e.relation == Relation::Calls)
            .unwrap();
        let target = batch.nodes.iter().find(|n| n.id == call.to_id).unwrap();
        assert_eq!(target.qualified_name, "upsert_node");
    }

    #[test]
    fn base_classes_become_inherits_edges() {
        let batch = extract(
            r#"
class Animal:
    pass

class Dog(Animal):
    pass
"#,
        );
        let animal = batch.nodes.iter().find(|n| n.name == "Animal").unwrap();
        let dog = batch.nodes.iter().find(|n| n.name == "Dog").unwrap();
        let inherits = batch
            .edges
            .iter()
            .find(|e| e.relation == Relation::Inherits)
            .unwrap();
        assert_eq!(inherits.from_id, dog.id);
        assert_eq!(inherits.to_id, animal.id);
    }

    #[test]
    fn module_scope_variables_are_extracted() {
        let batch = extract("MAX_SIZE = 1024\n_private_flag = True\n");
        let var = batch.nodes.iter().find(|n| n.name == "MAX_SIZE").unwrap();
        assert_eq!(var.kind, NodeKind::Variable);
        assert_eq!(var.signature, "MAX_SIZE = 1024");

        let private = batch
            .nodes
            .iter()
            .find(|n| n.name == "_private_flag")
            .unwrap();
        assert_eq!(private.visibility, Visibility::Private);
    }

    #[test]
    fn local_variables_are_not_extracted() {
        let batch = extract("def f():\n    local = 1\n");
        assert!(!batch.nodes.iter().any(|n| n.name == "local"));
    }

    #[test]
    fn empty_file_yields_module_node_only() {
        let batch = extract("");
        assert_eq!(batch.nodes.len(), 1);
        assert_eq!(batch.nodes[0].kind, NodeKind::Module);
        assert!(batch.edges.is_empty());
    }

    #[test]
    fn broken_syntax_does_not_panic() {
        let batch = extract("def broken(\n    # nope");
        // partial trees are fine; the invariant is "no panic, no garbage"
        assert!(batch.nodes.len() < 10);
    }

    #[test]
    fn nested_classes_qualify_fully() {
        let batch = extract(
            r#"
class Outer:
    class Inner:
        def method(self):
            pass
"#,
        );
        assert!(batch.nodes.iter().any(|n| n.qualified_name == "Outer.Inner"));
        assert!(batch
            .nodes
            .iter()
            .any(|n| n.qualified_name == "Outer.Inner.method"));
    }
}
