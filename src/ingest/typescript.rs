//! TypeScript/TSX extractor using tree-sitter-typescript.
//!
//! Extends the JavaScript coverage with interfaces, `implements` clauses,
//! return-type signatures, and decorators. TSX files use the TSX grammar;
//! both feed the same extraction walk.

use tree_sitter::Node as TsNode;

use crate::common::{collapse_signature, node_text};
use crate::diagnostics::IndexDiagnostic;
use crate::graph::{NodeKind, Relation};
use crate::resolver::default_module_name;

use super::javascript::{callee_name, decorators_of, leading_comment, visibility};
use super::{line_count, make_node, qualify, BatchBuilder, Extractor, FileBatch};

pub struct TypeScriptExtractor {
    parser: tree_sitter::Parser,
    tsx_parser: tree_sitter::Parser,
}

impl TypeScriptExtractor {
    pub fn new() -> anyhow::Result<Self> {
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())?;
        let mut tsx_parser = tree_sitter::Parser::new();
        tsx_parser.set_language(&tree_sitter_typescript::LANGUAGE_TSX.into())?;
        Ok(Self { parser, tsx_parser })
    }
}

impl Extractor for TypeScriptExtractor {
    fn language(&self) -> &'static str {
        "typescript"
    }

    fn extract(&mut self, file_path: &str, source: &[u8]) -> FileBatch {
        let module_name = default_module_name(file_path);
        let mut builder = BatchBuilder::new(file_path, &module_name, line_count(source));

        let parser = if file_path.ends_with(".tsx") {
            &mut self.tsx_parser
        } else {
            &mut self.parser
        };
        let tree = match parser.parse(source, None) {
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
            if let Some(id) = handle_callable(
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
        "method_definition" | "method_signature" => {
            if let Some(id) = handle_callable(
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
        "class_declaration" | "abstract_class_declaration" => {
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
        "interface_declaration" => {
            if let Some(id) =
                handle_interface(node, source, file_path, builder, scope, parent_id, is_exported)
            {
                let name = field_text(node, "name", source);
                scope.push(name);
                walk_children(node, source, file_path, builder, scope, &id, is_exported);
                scope.pop();
            }
            return;
        }
        "lexical_declaration" | "variable_declaration" => {
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

fn callable_signature(node: TsNode, name: &str, source: &[u8]) -> String {
    let mut signature = name.to_string();
    if let Some(params) = node.child_by_field_name("parameters") {
        signature.push_str(&node_text(params, source));
    }
    if let Some(return_type) = node.child_by_field_name("return_type") {
        // type_annotation text includes the leading colon
        signature.push_str(&node_text(return_type, source));
    }
    collapse_signature(&signature)
}

#[allow(clippy::too_many_arguments)]
fn handle_callable(
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

    let graph_node = make_node(
        file_path,
        &qualify(scope, &name),
        &name,
        kind,
        node,
        callable_signature(node, &name, source),
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

    // class X extends Y implements Z
    let mut cursor = node.walk();
    for heritage in node.children(&mut cursor) {
        if heritage.kind() != "class_heritage" {
            continue;
        }
        let mut heritage_cursor = heritage.walk();
        for clause in heritage.children(&mut heritage_cursor) {
            let relation = match clause.kind() {
                "extends_clause" => Relation::Inherits,
                "implements_clause" => Relation::Implements,
                _ => continue,
            };
            let mut clause_cursor = clause.walk();
            for target in clause.children(&mut clause_cursor) {
                if matches!(target.kind(), "type_identifier" | "identifier") {
                    builder.relate_to_name(
                        &class_id,
                        &node_text(target, source),
                        relation,
                        target.start_position().row + 1,
                    );
                }
            }
        }
    }

    Some(class_id)
}

fn handle_interface(
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
        NodeKind::Interface,
        node,
        collapse_signature(&format!("interface {name}")),
        leading_comment(node, source),
        vec![],
        visibility(is_exported),
    );
    let interface_id = builder.define(graph_node, parent_id);

    // interface X extends Y
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "extends_type_clause" || child.kind() == "extends_clause" {
            let mut clause_cursor = child.walk();
            for target in child.children(&mut clause_cursor) {
                if target.kind() == "type_identifier" {
                    builder.relate_to_name(
                        &interface_id,
                        &node_text(target, source),
                        Relation::Inherits,
                        target.start_position().row + 1,
                    );
                }
            }
        }
    }

    Some(interface_id)
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

    let parent = declarator.parent().unwrap_or(declarator);
    let graph_node = make_node(
        file_path,
        &qualify(scope, &name),
        &name,
        NodeKind::Function,
        declarator,
        callable_signature(value, &name, source),
        leading_comment(parent, source),
        vec![],
        visibility(is_exported),
    );
    Some(builder.define(graph_node, parent_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Visibility;

    fn extract(source: &str) -> FileBatch {
        let mut extractor = TypeScriptExtractor::new().unwrap();
        extractor.extract("app.ts", source.as_bytes())
    }

    fn extract_tsx(source: &str) -> FileBatch {
        let mut extractor = TypeScriptExtractor::new().unwrap();
        extractor.extract("app.tsx", source.as_bytes())
    }

    #[test]
    fn function_signature_includes_return_type() {
        let batch = extract("export function load(id: string): Promise<User> { return fetch(id); }\n");
        let func = batch.nodes.iter().find(|n| n.name == "load").unwrap();
        assert_eq!(func.signature, "load(id: string): Promise<User>");
        assert_eq!(func.visibility, Visibility::Exported);
    }

    #[test]
    fn interface_and_implements() {
        let batch = extract(
            r#"
interface Store {
  get(key: string): string;
}
class MemoryStore implements Store {
  get(key: string): string { return ""; }
}
"#,
        );
        let interface = batch.nodes.iter().find(|n| n.name == "Store").unwrap();
        assert_eq!(interface.kind, NodeKind::Interface);

        let class = batch.nodes.iter().find(|n| n.name == "MemoryStore").unwrap();
        let implements = batch
            .edges
            .iter()
            .find(|e| e.relation == Relation::Implements)
            .unwrap();
        assert_eq!(implements.from_id, class.id);
        assert_eq!(implements.to_id, interface.id);

        // interface method signature extracted as method
        let get = batch
            .nodes
            .iter()
            .find(|n| n.qualified_name == "Store.get")
            .unwrap();
        assert_eq!(get.kind, NodeKind::Method);
    }

    #[test]
    fn extends_clause_becomes_inherits() {
        let batch = extract(
            r#"
class Base {}
class Derived extends Base {}
"#,
        );
        let base = batch.nodes.iter().find(|n| n.name == "Base").unwrap();
        let derived = batch.nodes.iter().find(|n| n.name == "Derived").unwrap();
        let inherits = batch
            .edges
            .iter()
            .find(|e| e.relation == Relation::Inherits)
            .unwrap();
        assert_eq!(inherits.from_id, derived.id);
        assert_eq!(inherits.to_id, base.id);
    }

    #[test]
    fn decorators_on_classes() {
        let batch = extract(
            r#"
@Component({selector: "app"})
export class AppComponent {}
"#,
        );
        let class = batch.nodes.iter().find(|n| n.name == "AppComponent").unwrap();
        assert_eq!(class.decorators.len(), 1);
        assert!(class.decorators[0].starts_with("@Component"));
    }

    #[test]
    fn tsx_components_are_extracted() {
        let batch = extract_tsx(
            r#"
export const App = () => <div>hello</div>;
"#,
        );
        let func = batch.nodes.iter().find(|n| n.name == "App").unwrap();
        assert_eq!(func.kind, NodeKind::Function);
        assert_eq!(func.visibility, Visibility::Exported);
    }

    #[test]
    fn imports_recorded() {
        let batch = extract("import { Store } from './store';\nimport * as path from 'path';\n");
        let modules: Vec<&str> = batch.imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["./store", "path"]);
    }

    #[test]
    fn calls_within_methods() {
        let batch = extract(
            r#"
function validate(x: number): boolean { return x > 0; }
class Service {
  run(x: number) { return validate(x); }
}
"#,
        );
        let validate = batch.nodes.iter().find(|n| n.name == "validate").unwrap();
        let run = batch.nodes.iter().find(|n| n.name == "run").unwrap();
        assert!(batch
            .edges
            .iter()
            .any(|e| e.relation == Relation::Calls
                && e.from_id == run.id
                && e.to_id == validate.id));
    }
}
