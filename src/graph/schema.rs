//! Graph data model and SQL schema.
//!
//! Two logical tables: `nodes` (definable entities) and `edges` (typed
//! directed relations). Node identity is content-addressable (see
//! [`crate::ident`]); edges are plain rows deduplicated at query time by
//! the `(from_id, to_id, relation)` triple.

use serde::{Deserialize, Serialize};

/// SQL schema, applied idempotently on open.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS nodes (
    id             TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    qualified_name TEXT NOT NULL,
    kind           TEXT NOT NULL,
    file_path      TEXT NOT NULL,
    start_line     INTEGER NOT NULL DEFAULT 0,
    end_line       INTEGER NOT NULL DEFAULT 0,
    signature      TEXT NOT NULL DEFAULT '',
    docstring      TEXT NOT NULL DEFAULT '',
    decorators     TEXT NOT NULL DEFAULT '[]',
    visibility     TEXT NOT NULL DEFAULT 'public'
);

CREATE INDEX IF NOT EXISTS idx_nodes_file_path ON nodes(file_path);
CREATE INDEX IF NOT EXISTS idx_nodes_name ON nodes(name);

CREATE TABLE IF NOT EXISTS edges (
    from_id   TEXT NOT NULL,
    to_id     TEXT NOT NULL,
    relation  TEXT NOT NULL,
    site_line INTEGER
);

CREATE INDEX IF NOT EXISTS idx_edges_from ON edges(from_id);
CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_id);
";

/// Kind of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Function,
    Method,
    Class,
    Struct,
    Interface,
    Trait,
    Impl,
    Module,
    Variable,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Function => "function",
            NodeKind::Method => "method",
            NodeKind::Class => "class",
            NodeKind::Struct => "struct",
            NodeKind::Interface => "interface",
            NodeKind::Trait => "trait",
            NodeKind::Impl => "impl",
            NodeKind::Module => "module",
            NodeKind::Variable => "variable",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(NodeKind::Function),
            "method" => Some(NodeKind::Method),
            "class" => Some(NodeKind::Class),
            "struct" => Some(NodeKind::Struct),
            "interface" => Some(NodeKind::Interface),
            "trait" => Some(NodeKind::Trait),
            "impl" => Some(NodeKind::Impl),
            "module" => Some(NodeKind::Module),
            "variable" => Some(NodeKind::Variable),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Visibility of a symbol, inferred per language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Protected,
    Exported,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Protected => "protected",
            Visibility::Exported => "exported",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            "protected" => Some(Visibility::Protected),
            "exported" => Some(Visibility::Exported),
            _ => None,
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed relation between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Defines,
    Calls,
    Inherits,
    Implements,
    Imports,
    References,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Defines => "defines",
            Relation::Calls => "calls",
            Relation::Inherits => "inherits",
            Relation::Implements => "implements",
            Relation::Imports => "imports",
            Relation::References => "references",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "defines" => Some(Relation::Defines),
            "calls" => Some(Relation::Calls),
            "inherits" => Some(Relation::Inherits),
            "implements" => Some(Relation::Implements),
            "imports" => Some(Relation::Imports),
            "references" => Some(Relation::References),
            _ => None,
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A definable source entity with a stable ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Stable ID, derived from (file_path, qualified_name)
    pub id: String,
    /// Short symbol name as written
    pub name: String,
    /// Dotted path of the symbol within its file
    pub qualified_name: String,
    pub kind: NodeKind,
    /// Project-relative, forward-slash separated; `<external>` for placeholders
    pub file_path: String,
    /// 1-based inclusive
    pub start_line: usize,
    /// 1-based inclusive
    pub end_line: usize,
    /// Single-line textual signature, capped at 200 chars
    pub signature: String,
    /// Leading documentation comment, empty if absent
    pub docstring: String,
    /// Ordered decorator/annotation strings
    pub decorators: Vec<String>,
    pub visibility: Visibility,
}

impl Node {
    /// Whether this node is a synthetic placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.file_path == crate::ident::EXTERNAL_PATH
    }
}

/// A directed relation between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from_id: String,
    pub to_id: String,
    pub relation: Relation,
    /// Source line of the reference site, when known
    pub site_line: Option<usize>,
}

impl Edge {
    pub fn new(from_id: impl Into<String>, to_id: impl Into<String>, relation: Relation) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            relation,
            site_line: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.site_line = Some(line);
        self
    }
}
