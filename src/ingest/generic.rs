//! Generic fallback extractor for languages with basic coverage.
//!
//! Extracts function and class-like declarations by the node-type names
//! their grammars share; no inheritance, import, or call edges. One
//! instance per language, configured with that grammar's node-type sets.

use tree_sitter::Node as TsNode;

use crate::common::{collapse_signature, node_text};
use crate::diagnostics::IndexDiagnostic;
use crate::graph::{NodeKind, Visibility};
use crate::resolver::default_module_name;

use super::{line_count, make_node, qualify, BatchBuilder, Extractor, FileBatch};

pub struct GenericExtractor {
    language_name: &'static str,
    parser: tree_sitter::Parser,
    function_kinds: &'static [&'static str],
    class_kinds: &'static [&'static str],
}

impl GenericExtractor {
    fn with_language(
        language_name: &'static str,
        language: tree_sitter::Language,
        function_kinds: &'static [&'static str],
        class_kinds: &'static [&'static str],
    ) -> anyhow::Result<Self> {
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&language)?;
        Ok(Self {
            language_name,
            parser,
            function_kinds,
            class_kinds,
        })
    }

    pub fn java() -> anyhow::Result<Self> {
        Self::with_language(
            "java",
            tree_sitter_java::LANGUAGE.into(),
            &["method_declaration", "constructor_declaration"],
            &["class_declaration", "interface_declaration", "enum_declaration"],
        )
    }

    pub fn c() -> anyhow::Result<Self> {
        Self::with_language(
            "c",
            tree_sitter_c::LANGUAGE.into(),
            &["function_definition"],
            &["struct_specifier", "union_specifier", "enum_specifier"],
        )
    }

    pub fn cpp() -> anyhow::Result<Self> {
        Self::with_language(
            "cpp",
            tree_sitter_cpp::LANGUAGE.into(),
            &["function_definition"],
            &["class_specifier", "struct_specifier"],
        )
    }

    pub fn csharp() -> anyhow::Result<Self> {
        Self::with_language(
            "csharp",
            tree_sitter_c_sharp::language().into(),
            &["method_declaration", "constructor_declaration"],
            &["class_declaration", "interface_declaration", "struct_declaration"],
        )
    }

    pub fn ruby() -> anyhow::Result<Self> {
        Self::with_language(
            "ruby",
            tree_sitter_ruby::LANGUAGE.into(),
            &["method", "singleton_method"],
            &["class", "module"],
        )
    }

    pub fn php() -> anyhow::Result<Self> {
        Self::with_language(
            "php",
            tree_sitter_php::LANGUAGE_PHP.into(),
            &["function_definition", "method_declaration"],
            &["class_declaration", "interface_declaration", "trait_declaration"],
        )
    }
}

impl Extractor for GenericExtractor {
    fn language(&self) -> &'static str {
        self.language_name
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
        self.walk(
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

impl GenericExtractor {
    #[allow(clippy::too_many_arguments)]
    fn walk(
        &self,
        node: TsNode,
        source: &[u8],
        file_path: &str,
        builder: &mut BatchBuilder,
        scope: &mut Vec<String>,
        parent_id: &str,
        in_class: bool,
    ) {
        let kind = node.kind();

        if self.function_kinds.contains(&kind) {
            if let Some(name) = declaration_name(node, source) {
                let mut signature = name.clone();
                if let Some(params) = node.child_by_field_name("parameters") {
                    signature.push_str(&node_text(params, source));
                }
                let graph_node = make_node(
                    file_path,
                    &qualify(scope, &name),
                    &name,
                    if in_class {
                        NodeKind::Method
                    } else {
                        NodeKind::Function
                    },
                    node,
                    collapse_signature(&signature),
                    String::new(),
                    vec![],
                    Visibility::Public,
                );
                let id = builder.define(graph_node, parent_id);
                scope.push(name);
                self.walk_children(node, source, file_path, builder, scope, &id, false);
                scope.pop();
                return;
            }
        } else if self.class_kinds.contains(&kind) {
            // Bare C/C++ references like `struct Foo x;` have no body;
            // only definitions become nodes.
            let needs_body = kind.ends_with("_specifier");
            let has_body = !needs_body || node.child_by_field_name("body").is_some();
            if has_body {
                if let Some(name) = declaration_name(node, source) {
                    let node_kind = if kind.contains("interface") {
                        NodeKind::Interface
                    } else {
                        NodeKind::Class
                    };
                    let graph_node = make_node(
                        file_path,
                        &qualify(scope, &name),
                        &name,
                        node_kind,
                        node,
                        collapse_signature(&format!("{} {}", kind.replace("_declaration", "").replace("_specifier", ""), name)),
                        String::new(),
                        vec![],
                        Visibility::Public,
                    );
                    let id = builder.define(graph_node, parent_id);
                    scope.push(name);
                    self.walk_children(node, source, file_path, builder, scope, &id, true);
                    scope.pop();
                    return;
                }
            }
        }

        self.walk_children(node, source, file_path, builder, scope, parent_id, in_class);
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_children(
        &self,
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
            self.walk(child, source, file_path, builder, scope, parent_id, in_class);
        }
    }
}

/// Declared name of a definition node.
///
/// Uses the `name` field when the grammar has one, else descends the C/C++
/// `declarator` chain until an identifier appears.
fn declaration_name(node: TsNode, source: &[u8]) -> Option<String> {
    if let Some(name_node) = node.child_by_field_name("name") {
        let text = node_text(name_node, source);
        if !text.is_empty() {
            return Some(text);
        }
    }

    let mut current = node.child_by_field_name("declarator")?;
    loop {
        match current.kind() {
            "identifier" | "field_identifier" | "type_identifier" | "qualified_identifier" => {
                let text = node_text(current, source);
                let short = text.rsplit("::").next().unwrap_or(&text);
                return Some(short.to_string());
            }
            _ => {
                current = current
                    .child_by_field_name("declarator")
                    .or_else(|| current.named_child(0))?;
            }
        }
    }
}
