//! Go extractor using tree-sitter-go.
//!
//! Covers structs, interfaces, funcs, and methods. A method's receiver type
//! becomes its parent: the method is qualified `Recv.name` and hangs off
//! the struct's `defines` tree when the struct lives in the same file.
//! Visibility follows the exported-identifier rule (leading uppercase).

use tree_sitter::Node as TsNode;

use crate::common::{collapse_signature, node_text};
use crate::diagnostics::IndexDiagnostic;
use crate::graph::{NodeKind, Relation, Visibility};
use crate::resolver::default_module_name;

use super::{line_count, make_node, BatchBuilder, Extractor, FileBatch};

pub struct GoExtractor {
    parser: tree_sitter::Parser,
}

impl GoExtractor {
    pub fn new() -> anyhow::Result<Self> {
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&tree_sitter_go::LANGUAGE.into())?;
        Ok(Self { parser })
    }
}

impl Extractor for GoExtractor {
    fn language(&self) -> &'static str {
        "go"
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

        // Two passes: types first so methods can attach to their receiver
        // structs regardless of declaration order.
        collect_types(tree.root_node(), source, file_path, &mut builder, &module_id);
        collect_funcs(tree.root_node(), source, file_path, &mut builder, &module_id);

        builder.finish()
    }
}

fn collect_types(
    root: TsNode,
    source: &[u8],
    file_path: &str,
    builder: &mut BatchBuilder,
    module_id: &str,
) {
    let mut cursor = root.walk();
    for node in root.children(&mut cursor) {
        match node.kind() {
            "type_declaration" => {
                let mut spec_cursor = node.walk();
                for spec in node.children(&mut spec_cursor) {
                    if spec.kind() == "type_spec" {
                        handle_type_spec(spec, node, source, file_path, builder, module_id);
                    }
                }
            }
            "import_declaration" => handle_imports(node, source, builder),
            _ => {}
        }
    }
}

fn collect_funcs(
    root: TsNode,
    source: &[u8],
    file_path: &str,
    builder: &mut BatchBuilder,
    module_id: &str,
) {
    let mut cursor = root.walk();
    for node in root.children(&mut cursor) {
        match node.kind() {
            "function_declaration" => {
                if let Some(id) =
                    handle_function(node, source, file_path, builder, module_id, None)
                {
                    collect_calls(node, source, builder, &id);
                }
            }
            "method_declaration" => {
                let receiver = receiver_type(node, source);
                if let Some(id) = handle_function(
                    node,
                    source,
                    file_path,
                    builder,
                    module_id,
                    receiver.as_deref(),
                ) {
                    collect_calls(node, source, builder, &id);
                }
            }
            _ => {}
        }
    }
}

fn handle_type_spec(
    spec: TsNode,
    declaration: TsNode,
    source: &[u8],
    file_path: &str,
    builder: &mut BatchBuilder,
    module_id: &str,
) {
    let Some(name_node) = spec.child_by_field_name("name") else {
        return;
    };
    let Some(type_node) = spec.child_by_field_name("type") else {
        return;
    };
    let kind = match type_node.kind() {
        "struct_type" => NodeKind::Struct,
        "interface_type" => NodeKind::Interface,
        _ => return,
    };

    let name = node_text(name_node, source);
    let graph_node = make_node(
        file_path,
        &name,
        &name,
        kind,
        spec,
        collapse_signature(&format!("type {} {}", name, type_node.kind().replace("_type", ""))),
        leading_comments(declaration, source),
        vec![],
        go_visibility(&name),
    );
    let type_id = builder.define(graph_node, module_id);

    if kind == NodeKind::Interface {
        collect_interface_methods(type_node, source, file_path, builder, &type_id, &name);
    }
}

fn collect_interface_methods(
    interface_type: TsNode,
    source: &[u8],
    file_path: &str,
    builder: &mut BatchBuilder,
    interface_id: &str,
    interface_name: &str,
) {
    let mut cursor = interface_type.walk();
    for member in interface_type.children(&mut cursor) {
        if !matches!(member.kind(), "method_spec" | "method_elem") {
            continue;
        }
        let Some(name_node) = member.child_by_field_name("name") else {
            continue;
        };
        let name = node_text(name_node, source);
        let mut signature = name.clone();
        if let Some(params) = member.child_by_field_name("parameters") {
            signature.push_str(&node_text(params, source));
        }
        if let Some(result) = member.child_by_field_name("result") {
            signature.push(' ');
            signature.push_str(&node_text(result, source));
        }
        let graph_node = make_node(
            file_path,
            &format!("{interface_name}.{name}"),
            &name,
            NodeKind::Method,
            member,
            collapse_signature(&signature),
            String::new(),
            vec![],
            go_visibility(&name),
        );
        builder.define(graph_node, interface_id);
    }
}

fn handle_function(
    node: TsNode,
    source: &[u8],
    file_path: &str,
    builder: &mut BatchBuilder,
    module_id: &str,
    receiver: Option<&str>,
) -> Option<String> {
    let name_node = node.child_by_field_name("name")?;
    let name = node_text(name_node, source);

    let mut signature = name.clone();
    if let Some(params) = node.child_by_field_name("parameters") {
        signature.push_str(&node_text(params, source));
    }
    if let Some(result) = node.child_by_field_name("result") {
        signature.push(' ');
        signature.push_str(&node_text(result, source));
    }

    let (qualified_name, kind, parent_id) = match receiver {
        Some(recv) => {
            let parent = builder
                .local_id(recv)
                .map(|s| s.to_string())
                .unwrap_or_else(|| module_id.to_string());
            (format!("{recv}.{name}"), NodeKind::Method, parent)
        }
        None => (name.clone(), NodeKind::Function, module_id.to_string()),
    };

    let graph_node = make_node(
        file_path,
        &qualified_name,
        &name,
        kind,
        node,
        collapse_signature(&signature),
        leading_comments(node, source),
        vec![],
        go_visibility(&name),
    );
    Some(builder.define(graph_node, &parent_id))
}

/// Receiver type name of a method declaration, pointer stripped.
fn receiver_type(node: TsNode, source: &[u8]) -> Option<String> {
    let receiver = node.child_by_field_name("receiver")?;
    let mut cursor = receiver.walk();
    for param in receiver.children(&mut cursor) {
        if param.kind() != "parameter_declaration" {
            continue;
        }
        if let Some(type_node) = param.child_by_field_name("type") {
            let text = node_text(type_node, source);
            let text = text.trim_start_matches('*').trim();
            // Drop generic type arguments: List[T] -> List
            let text = text.split('[').next().unwrap_or(text);
            return Some(text.to_string());
        }
    }
    None
}

fn handle_imports(node: TsNode, source: &[u8], builder: &mut BatchBuilder) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == "import_spec" {
            if let Some(path) = current.child_by_field_name("path") {
                let module = node_text(path, source);
                let module = module.trim_matches('"');
                builder.add_import(module, current.start_position().row + 1);
            }
            continue;
        }
        let mut cursor = current.walk();
        for child in current.children(&mut cursor) {
            stack.push(child);
        }
    }
}

fn collect_calls(node: TsNode, source: &[u8], builder: &mut BatchBuilder, caller_id: &str) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == "call_expression" {
            if let Some(function) = current.child_by_field_name("function") {
                let callee = match function.kind() {
                    "identifier" => Some(node_text(function, source)),
                    "selector_expression" => function
                        .child_by_field_name("field")
                        .map(|f| node_text(f, source)),
                    _ => None,
                };
                if let Some(callee) = callee {
                    builder.relate_to_name(
                        caller_id,
                        &callee,
                        Relation::Calls,
                        current.start_position().row + 1,
                    );
                }
            }
        }
        let mut cursor = current.walk();
        for child in current.children(&mut cursor) {
            stack.push(child);
        }
    }
}

/// Contiguous `//` comment block immediately above a declaration.
fn leading_comments(node: TsNode, source: &[u8]) -> String {
    let mut lines = Vec::new();
    let mut prev = node.prev_sibling();
    let mut expected_row = node.start_position().row;

    while let Some(sibling) = prev {
        if sibling.kind() != "comment" || sibling.end_position().row + 1 < expected_row {
            break;
        }
        let text = node_text(sibling, source);
        lines.push(text.trim_start_matches("//").trim().to_string());
        expected_row = sibling.start_position().row;
        prev = sibling.prev_sibling();
    }

    lines.reverse();
    lines.join("\n")
}

fn go_visibility(name: &str) -> Visibility {
    if name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false) {
        Visibility::Public
    } else {
        Visibility::Private
    }
}
