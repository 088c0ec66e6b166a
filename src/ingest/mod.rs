//! Language extractors: syntax trees in, unresolved graph batches out.
//!
//! Each extractor owns one tree-sitter grammar and maps its node types to
//! graph nodes and edges. Extractors are pure with respect to the
//! filesystem: input is (path, bytes), output is a [`FileBatch`]. A parse
//! failure never propagates; the batch carries whatever was extractable
//! plus a diagnostic.

pub mod generic;
pub mod go;
pub mod javascript;
pub mod python;
pub mod rust;
pub mod typescript;

use std::collections::HashMap;

use crate::diagnostics::IndexDiagnostic;
use crate::graph::{Edge, Node, NodeKind, Relation, Visibility};
use crate::ident::{node_id, placeholder_id, EXTERNAL_PATH};

/// A raw import recorded by an extractor, kept alongside its placeholder
/// edge so the driver can retarget it once the resolver has classified the
/// module.
#[derive(Debug, Clone)]
pub struct ImportFact {
    /// Import string as written (`a.b.c`, `./x`, `crate::y`)
    pub module: String,
    /// ID of the placeholder node the import edge currently targets
    pub placeholder_id: String,
    /// 1-based line of the import statement
    pub site_line: usize,
}

/// Unresolved extraction result for one file.
#[derive(Debug, Default)]
pub struct FileBatch {
    pub file_path: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub imports: Vec<ImportFact>,
    pub diagnostics: Vec<IndexDiagnostic>,
}

/// Per-language extraction contract.
pub trait Extractor {
    /// Language name, matching [`crate::common::language_for_path`].
    fn language(&self) -> &'static str;

    /// Extract nodes and edges from one file. Never fails: parse errors
    /// degrade to a (possibly empty) batch with diagnostics.
    fn extract(&mut self, file_path: &str, source: &[u8]) -> FileBatch;
}

/// Dispatch table from language name to extractor instance.
///
/// Parsers are created once and reused across files; tree-sitter parsers
/// are cheap to re-run but expensive to construct.
pub struct ExtractorSet {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorSet {
    /// Construct extractors for every supported language.
    pub fn new() -> anyhow::Result<Self> {
        let extractors: Vec<Box<dyn Extractor>> = vec![
            Box::new(python::PythonExtractor::new()?),
            Box::new(javascript::JavaScriptExtractor::new()?),
            Box::new(typescript::TypeScriptExtractor::new()?),
            Box::new(go::GoExtractor::new()?),
            Box::new(rust::RustExtractor::new()?),
            Box::new(generic::GenericExtractor::java()?),
            Box::new(generic::GenericExtractor::c()?),
            Box::new(generic::GenericExtractor::cpp()?),
            Box::new(generic::GenericExtractor::csharp()?),
            Box::new(generic::GenericExtractor::ruby()?),
            Box::new(generic::GenericExtractor::php()?),
        ];
        Ok(Self { extractors })
    }

    /// The extractor responsible for a path, by extension.
    pub fn for_path(&mut self, file_path: &str) -> Option<&mut Box<dyn Extractor>> {
        let language = crate::common::language_for_path(file_path)?;
        self.extractors
            .iter_mut()
            .find(|e| e.language() == language)
    }
}

/// Accumulates one file's batch during a tree walk.
///
/// Handles the bookkeeping every extractor shares: the file's module node,
/// `defines` tree construction, local symbol registration, and deferral of
/// call/inherit targets until the whole file has been walked (so forward
/// references resolve locally instead of leaking placeholders).
pub struct BatchBuilder {
    file_path: String,
    module_id: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    imports: Vec<ImportFact>,
    diagnostics: Vec<IndexDiagnostic>,
    /// Short name -> node ID of the first local definition
    local_by_name: HashMap<String, String>,
    /// Deferred relations: (from_id, target name, relation, site line)
    pending: Vec<(String, String, Relation, usize)>,
}

impl BatchBuilder {
    /// Start a batch for a file, creating its module node.
    ///
    /// # Arguments
    /// * `file_path` - Project-relative path
    /// * `module_name` - Canonical dotted module name
    /// * `end_line` - Last line of the file (module node extent)
    pub fn new(file_path: &str, module_name: &str, end_line: usize) -> Self {
        let module_id = node_id(file_path, module_name);
        let module_node = Node {
            id: module_id.clone(),
            name: module_name.to_string(),
            qualified_name: module_name.to_string(),
            kind: NodeKind::Module,
            file_path: file_path.to_string(),
            start_line: 1,
            end_line: end_line.max(1),
            signature: String::new(),
            docstring: String::new(),
            decorators: vec![],
            visibility: Visibility::Public,
        };
        Self {
            file_path: file_path.to_string(),
            module_id,
            nodes: vec![module_node],
            edges: Vec::new(),
            imports: Vec::new(),
            diagnostics: Vec::new(),
            local_by_name: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// ID of the file's module node.
    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    /// File path this batch belongs to.
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Add a definition node, wiring a `defines` edge from its parent.
    ///
    /// Returns the new node's ID for use as the scope of nested walks.
    pub fn define(&mut self, node: Node, parent_id: &str) -> String {
        let id = node.id.clone();
        self.local_by_name
            .entry(node.name.clone())
            .or_insert_with(|| id.clone());
        self.edges.push(
            Edge::new(parent_id, &id, Relation::Defines).at_line(node.start_line),
        );
        self.nodes.push(node);
        id
    }

    /// Record an import: placeholder module node plus an `imports` edge
    /// from the file's module node.
    pub fn add_import(&mut self, module: &str, site_line: usize) {
        if module.is_empty() {
            return;
        }
        let pid = placeholder_id(module);
        self.ensure_placeholder(module, &pid);
        self.edges.push(
            Edge::new(&self.module_id, &pid, Relation::Imports).at_line(site_line),
        );
        self.imports.push(ImportFact {
            module: module.to_string(),
            placeholder_id: pid,
            site_line,
        });
    }

    /// Defer a call/inherits/implements/references relation to a named
    /// target. Resolved locally at [`finish`](Self::finish) time, falling
    /// back to a placeholder for names not defined in this file.
    pub fn relate_to_name(
        &mut self,
        from_id: &str,
        target_name: &str,
        relation: Relation,
        site_line: usize,
    ) {
        if target_name.is_empty() {
            return;
        }
        self.pending.push((
            from_id.to_string(),
            target_name.to_string(),
            relation,
            site_line,
        ));
    }

    /// Record a non-fatal extraction problem.
    pub fn diagnostic(&mut self, diagnostic: IndexDiagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// ID of the first local definition with this short name, if any.
    pub fn local_id(&self, name: &str) -> Option<&str> {
        self.local_by_name.get(name).map(|s| s.as_str())
    }

    fn ensure_placeholder(&mut self, qualified_name: &str, id: &str) {
        if self.nodes.iter().any(|n| n.id == id) {
            return;
        }
        self.nodes.push(Node {
            id: id.to_string(),
            name: qualified_name
                .rsplit(|c| c == '.' || c == ':')
                .next()
                .unwrap_or(qualified_name)
                .to_string(),
            qualified_name: qualified_name.to_string(),
            kind: NodeKind::Module,
            file_path: EXTERNAL_PATH.to_string(),
            start_line: 0,
            end_line: 0,
            signature: String::new(),
            docstring: String::new(),
            decorators: vec![],
            visibility: Visibility::Public,
        });
    }

    /// Close the batch: resolve deferred relations against local
    /// definitions, emitting placeholders for the rest.
    pub fn finish(mut self) -> FileBatch {
        let pending = std::mem::take(&mut self.pending);
        for (from_id, target_name, relation, site_line) in pending {
            let to_id = match self.local_by_name.get(&target_name) {
                Some(local) => local.clone(),
                None => {
                    let pid = placeholder_id(&target_name);
                    self.ensure_placeholder(&target_name, &pid);
                    pid
                }
            };
            // Self-recursion is a real edge; accidental self-loops from
            // name shadowing are indistinguishable here and kept too.
            self.edges
                .push(Edge::new(&from_id, &to_id, relation).at_line(site_line));
        }

        FileBatch {
            file_path: self.file_path,
            nodes: self.nodes,
            edges: self.edges,
            imports: self.imports,
            diagnostics: self.diagnostics,
        }
    }
}

/// Build a node with its stable ID from tree-sitter extents.
#[allow(clippy::too_many_arguments)]
pub(crate) fn make_node(
    file_path: &str,
    qualified_name: &str,
    name: &str,
    kind: NodeKind,
    ts_node: tree_sitter::Node,
    signature: String,
    docstring: String,
    decorators: Vec<String>,
    visibility: Visibility,
) -> Node {
    Node {
        id: node_id(file_path, qualified_name),
        name: name.to_string(),
        qualified_name: qualified_name.to_string(),
        kind,
        file_path: file_path.to_string(),
        start_line: ts_node.start_position().row + 1,
        end_line: ts_node.end_position().row + 1,
        signature,
        docstring,
        decorators,
        visibility,
    }
}

/// Join a scope chain and a symbol name into a dotted qualified name.
pub(crate) fn qualify(scope: &[String], name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope.join("."), name)
    }
}

/// Count lines in a source buffer (module node extent).
pub(crate) fn line_count(source: &[u8]) -> usize {
    source.iter().filter(|&&b| b == b'\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_creates_module_node() {
        let builder = BatchBuilder::new("src/a.py", "a", 10);
        let batch = builder.finish();
        assert_eq!(batch.nodes.len(), 1);
        assert_eq!(batch.nodes[0].kind, NodeKind::Module);
        assert_eq!(batch.nodes[0].qualified_name, "a");
        assert_eq!(batch.nodes[0].end_line, 10);
    }

    #[test]
    fn define_wires_defines_edge() {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .unwrap();
        let tree = parser.parse(b"def f(): pass", None).unwrap();

        let mut builder = BatchBuilder::new("a.py", "a", 5);
        let module_id = builder.module_id().to_string();
        let node = make_node(
            "a.py",
            "f",
            "f",
            NodeKind::Function,
            tree.root_node(),
            "f()".into(),
            String::new(),
            vec![],
            Visibility::Public,
        );
        builder.define(node, &module_id);
        let batch = builder.finish();

        assert_eq!(batch.nodes.len(), 2);
        assert_eq!(batch.edges.len(), 1);
        assert_eq!(batch.edges[0].relation, Relation::Defines);
        assert_eq!(batch.edges[0].from_id, module_id);
    }

    #[test]
    fn pending_call_links_locally_even_forward() {
        let mut builder = BatchBuilder::new("a.py", "a", 5);
        let module_id = builder.module_id().to_string();

        // f calls g before g is defined
        builder.relate_to_name("caller-id", "g", Relation::Calls, 2);
        let g = Node {
            id: node_id("a.py", "g"),
            name: "g".into(),
            qualified_name: "g".into(),
            kind: NodeKind::Function,
            file_path: "a.py".into(),
            start_line: 4,
            end_line: 5,
            signature: "g()".into(),
            docstring: String::new(),
            decorators: vec![],
            visibility: Visibility::Public,
        };
        let g_id = builder.define(g, &module_id);
        let batch = builder.finish();

        let call = batch
            .edges
            .iter()
            .find(|e| e.relation == Relation::Calls)
            .unwrap();
        assert_eq!(call.to_id, g_id);
        assert!(!batch.nodes.iter().any(|n| n.is_placeholder()));
    }

    #[test]
    fn pending_call_to_unknown_creates_placeholder() {
        let mut builder = BatchBuilder::new("a.py", "a", 5);
        builder.relate_to_name("caller-id", "sorted", Relation::Calls, 2);
        let batch = builder.finish();

        let placeholder = batch
            .nodes
            .iter()
            .find(|n| n.is_placeholder())
            .expect("placeholder for unknown callee");
        assert_eq!(placeholder.qualified_name, "sorted");
        assert_eq!(placeholder.kind, NodeKind::Module);
    }

    #[test]
    fn imports_are_tracked_with_placeholders() {
        let mut builder = BatchBuilder::new("b.py", "b", 3);
        builder.add_import("a", 1);
        builder.add_import("a", 2); // duplicate import, one placeholder
        let batch = builder.finish();

        let placeholders: Vec<_> = batch.nodes.iter().filter(|n| n.is_placeholder()).collect();
        assert_eq!(placeholders.len(), 1);
        assert_eq!(batch.imports.len(), 2);
        assert_eq!(
            batch
                .edges
                .iter()
                .filter(|e| e.relation == Relation::Imports)
                .count(),
            2
        );
    }

    #[test]
    fn line_count_counts_final_unterminated_line() {
        assert_eq!(line_count(b"a\nb\nc"), 3);
        assert_eq!(line_count(b"a\nb\n"), 3);
        assert_eq!(line_count(b""), 1);
    }

    #[test]
    fn qualify_joins_scope() {
        assert_eq!(qualify(&[], "f"), "f");
        assert_eq!(qualify(&["A".into(), "B".into()], "f"), "A.B.f");
    }
}
