//! VibeGraph: a deterministic code-intelligence engine.
//!
//! VibeGraph treats a source repository as a structural graph rather than
//! a bag of text. Tree-sitter extractors turn files into definition nodes
//! (functions, classes, modules, ...) and typed relation edges (defines,
//! calls, inherits, implements, imports, references); a relational store
//! persists them with content-addressable IDs; a query engine answers
//! structural questions: file summaries, call-stack traversal, transitive
//! impact, reference lookup, signature search, and dependency
//! categorisation.
//!
//! # Position Conventions
//!
//! Line positions are 1-indexed and inclusive, following tree-sitter rows
//! plus one. Stored file paths are project-relative with forward slashes
//! on every host OS.
//!
//! # Pipeline
//!
//! files -> extractors -> unresolved batch -> resolver -> resolved batch
//! -> store (transactional per file) -> change notification -> queries

pub mod analysis;
pub mod common;
pub mod diagnostics;
pub mod errors;
pub mod events;
pub mod export;
pub mod filter;
pub mod graph;
pub mod ident;
pub mod indexer;
pub mod ingest;
pub mod mcp;
pub mod resolver;
pub mod validation;
pub mod watcher;

pub use analysis::{
    call_stack, dependencies, find_references, impact_analysis, search_by_signature,
    structural_summary, Direction,
};
pub use diagnostics::{DiagnosticStage, IndexDiagnostic, SkipReason};
pub use errors::{ErrorCode, ErrorEnvelope, QueryError};
pub use events::{ChangeNotifier, GraphEvent};
pub use export::{graph_snapshot, GraphSnapshot};
pub use filter::FileFilter;
pub use graph::{Edge, GraphStore, Node, NodeKind, Relation, Visibility};
pub use ident::{node_id, placeholder_id, EXTERNAL_PATH};
pub use indexer::{default_db_path, run_indexer, run_indexer_n, IndexReport, Indexer};
pub use ingest::{Extractor, ExtractorSet, FileBatch};
pub use mcp::McpServer;
pub use resolver::{default_module_name, ImportCategory, ModuleResolver};
pub use validation::{canonicalize_path, normalize_path, validate_path_within_root};
pub use watcher::{FileSystemWatcher, WatcherBatch, WatcherConfig};
