//! Indexing driver: walks the project, dispatches files to extractors,
//! resolves imports, and commits batches to the store.
//!
//! Commit ordering for a full re-index: every file's nodes land before any
//! file's edges, so edge endpoints exist when their edges are written.
//! A single file refresh is one transaction. One `refresh` notification is
//! published per driver entry point, strictly after the last commit.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::diagnostics::{DiagnosticStage, IndexDiagnostic};
use crate::events::ChangeNotifier;
use crate::filter::FileFilter;
use crate::graph::{GraphStore, Relation};
use crate::ident::node_id;
use crate::ingest::{ExtractorSet, FileBatch};
use crate::resolver::{default_module_name, ImportCategory, ModuleResolver};
use crate::watcher::{FileSystemWatcher, WatcherConfig};

/// Project-local directory holding the graph database.
pub const CONTEXT_DIR: &str = "vibegraph_context";

/// Database path for a project root, creating the context directory.
pub fn default_db_path(root: &Path) -> Result<PathBuf> {
    let context_dir = root.join(CONTEXT_DIR);
    std::fs::create_dir_all(&context_dir)
        .with_context(|| format!("cannot create {}", context_dir.display()))?;
    Ok(context_dir.join("vibegraph.db"))
}

/// Summary of one driver invocation.
#[derive(Debug, Default)]
pub struct IndexReport {
    pub files_indexed: usize,
    pub nodes: usize,
    pub edges: usize,
    pub diagnostics: Vec<IndexDiagnostic>,
}

/// The indexing driver. Single writer: all commits flow through here.
pub struct Indexer {
    root: PathBuf,
    store: Arc<GraphStore>,
    notifier: Arc<ChangeNotifier>,
    extractors: ExtractorSet,
    exclude_patterns: Vec<String>,
}

impl Indexer {
    pub fn new(
        root: &Path,
        store: Arc<GraphStore>,
        notifier: Arc<ChangeNotifier>,
    ) -> Result<Self> {
        Ok(Self {
            root: std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf()),
            store,
            notifier,
            extractors: ExtractorSet::new()?,
            exclude_patterns: Vec::new(),
        })
    }

    /// Additional exclude globs, applied on top of the ignore rules.
    pub fn with_excludes(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    fn filter(&self) -> Result<FileFilter> {
        FileFilter::new(&self.root, &[], &self.exclude_patterns)
    }

    /// Re-index the whole project.
    ///
    /// Walks the root with ignore rules, extracts every supported file,
    /// builds the module registry, resolves imports, then commits:
    /// first each file's `(clear, nodes)`, then each file's edges, then
    /// the placeholder rewrite pass. Per-file failures become diagnostics;
    /// the batch continues.
    pub fn reindex_all(&mut self) -> Result<IndexReport> {
        let filter = self.filter()?;
        let files = collect_files(&self.root, &filter);
        let resolver =
            ModuleResolver::from_paths(files.iter().map(|(_, rel)| rel.clone()));

        let mut report = IndexReport::default();
        let mut batches = Vec::new();
        for (abs, rel) in &files {
            match self.extract_file(abs, rel) {
                Some(batch) => batches.push(batch),
                None => report.diagnostics.push(IndexDiagnostic::new(
                    rel.clone(),
                    DiagnosticStage::Walk,
                    "unreadable or unsupported",
                )),
            }
        }

        // Import edges can be retargeted to any node that will exist once
        // every batch has committed.
        let committed_ids: HashSet<String> = batches
            .iter()
            .flat_map(|b| b.nodes.iter().map(|n| n.id.clone()))
            .collect();
        for batch in &mut batches {
            resolve_imports(batch, &resolver, |id| committed_ids.contains(id));
        }

        for batch in &batches {
            self.store.refresh_file_nodes(&batch.file_path, &batch.nodes)?;
        }
        for batch in &batches {
            self.store.insert_edges(&batch.edges)?;
        }
        resolver.rewrite_placeholder_edges(&self.store)?;

        for mut batch in batches {
            report.files_indexed += 1;
            report.nodes += batch.nodes.len();
            report.edges += batch.edges.len();
            report.diagnostics.append(&mut batch.diagnostics);
        }

        tracing::info!(
            files = report.files_indexed,
            nodes = report.nodes,
            edges = report.edges,
            "reindex complete"
        );
        self.notifier.publish();
        Ok(report)
    }

    /// Re-index one file or subtree.
    ///
    /// The module registry is rebuilt from a full project walk so imports
    /// resolve outside the subtree; only the given paths are re-committed,
    /// each in its own transaction.
    pub fn reindex_path(&mut self, path: &Path) -> Result<IndexReport> {
        let filter = self.filter()?;
        let abs = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        // Symlinked roots (temp dirs, editors) hand over non-canonical
        // paths; the relative key must match the canonical walk.
        let abs = std::fs::canonicalize(&abs).unwrap_or(abs);

        let targets: Vec<(PathBuf, String)> = if abs.is_dir() {
            collect_files(&abs, &filter)
        } else {
            vec![(abs.clone(), filter.relative_path(&abs))]
        };

        let resolver = ModuleResolver::build(&self.root, &filter);

        let mut report = IndexReport::default();
        for (file_abs, rel) in targets {
            if filter.should_skip(&file_abs).is_some() {
                continue;
            }
            let Some(mut batch) = self.extract_file(&file_abs, &rel) else {
                report.diagnostics.push(IndexDiagnostic::new(
                    rel,
                    DiagnosticStage::Walk,
                    "unreadable or unsupported",
                ));
                continue;
            };

            let store = Arc::clone(&self.store);
            let batch_ids: HashSet<String> =
                batch.nodes.iter().map(|n| n.id.clone()).collect();
            resolve_imports(&mut batch, &resolver, |id| {
                batch_ids.contains(id)
                    || store.get_node(id).ok().flatten().is_some()
            });

            self.store
                .refresh_file(&batch.file_path, &batch.nodes, &batch.edges)?;

            report.files_indexed += 1;
            report.nodes += batch.nodes.len();
            report.edges += batch.edges.len();
            report.diagnostics.append(&mut batch.diagnostics);
        }

        resolver.rewrite_placeholder_edges(&self.store)?;
        self.notifier.publish();
        Ok(report)
    }

    /// Remove a deleted file's rows and notify.
    pub fn remove_path(&mut self, path: &Path) -> Result<()> {
        let filter = self.filter()?;
        // The file is gone and cannot be canonicalized; canonicalize its
        // parent so the relative key matches what indexing stored.
        let abs = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let abs = match (abs.parent(), abs.file_name()) {
            (Some(parent), Some(name)) => std::fs::canonicalize(parent)
                .map(|p| p.join(name))
                .unwrap_or(abs),
            _ => abs,
        };
        let rel = filter.relative_path(&abs);
        self.store.clear_file(&rel)?;
        tracing::info!(path = %rel, "cleared deleted file");
        self.notifier.publish();
        Ok(())
    }

    /// Reconcile one watched path against filesystem state.
    pub fn reconcile(&mut self, path: &Path) -> Result<()> {
        if path.exists() {
            self.reindex_path(path)?;
        } else {
            self.remove_path(path)?;
        }
        Ok(())
    }

    /// Project root this driver indexes.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn extract_file(&mut self, abs: &Path, rel: &str) -> Option<FileBatch> {
        let source = match std::fs::read(abs) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(path = %rel, "read failed: {e}");
                return None;
            }
        };
        let extractor = self.extractors.for_path(rel)?;
        Some(extractor.extract(rel, &source))
    }
}

/// Walk a root with ignore-rule pruning, returning (absolute, relative)
/// pairs for every indexable file.
fn collect_files(root: &Path, filter: &FileFilter) -> Vec<(PathBuf, String)> {
    let mut files = Vec::new();
    let mut it = walkdir::WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = it.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("walk error: {e}");
                continue;
            }
        };
        if entry.file_type().is_dir() {
            if entry.depth() > 0 && filter.should_skip_dir(entry.path()) {
                it.skip_current_dir();
            }
            continue;
        }
        if filter.should_skip(entry.path()).is_some() {
            continue;
        }
        files.push((
            entry.path().to_path_buf(),
            filter.relative_path(entry.path()),
        ));
    }

    files
}

/// Rewrite a batch's import edges from placeholders to concrete module
/// nodes wherever the resolver finds an internal target that will exist.
/// Placeholders that lose their last referencing edge are dropped.
fn resolve_imports<F>(batch: &mut FileBatch, resolver: &ModuleResolver, target_exists: F)
where
    F: Fn(&str) -> bool,
{
    for fact in &batch.imports {
        let ImportCategory::Internal(path) = resolver.resolve(&fact.module, &batch.file_path)
        else {
            continue;
        };
        let canonical = resolver
            .module_for_path(&path)
            .map(str::to_string)
            .unwrap_or_else(|| default_module_name(&path));
        let target_id = node_id(&path, &canonical);
        if !target_exists(&target_id) {
            continue;
        }
        for edge in batch.edges.iter_mut() {
            if edge.relation == Relation::Imports && edge.to_id == fact.placeholder_id {
                edge.to_id = target_id.clone();
            }
        }
    }

    let referenced: HashSet<String> = batch.edges.iter().map(|e| e.to_id.clone()).collect();
    batch
        .nodes
        .retain(|n| !n.is_placeholder() || referenced.contains(&n.id));
}

/// Run the watch pipeline: reconcile filesystem events into the store.
///
/// Blocking; runs until the watcher thread terminates. See
/// [`run_indexer_n`] for the bounded variant used by tests.
pub fn run_indexer(root: PathBuf, db_path: PathBuf, config: WatcherConfig) -> Result<()> {
    run_indexer_n(root, db_path, usize::MAX, config)?;
    Ok(())
}

/// Run the watch pipeline for up to `max_events` reconciled paths.
///
/// # Behavior
/// - Events are processed in batch order; paths within a batch in
///   lexicographic order. The same path is never re-indexed concurrently
///   (processing is serial).
/// - An idle timeout prevents hangs when the platform coalesces or drops
///   events.
///
/// # Returns
/// Number of paths reconciled.
pub fn run_indexer_n(
    root: PathBuf,
    db_path: PathBuf,
    max_events: usize,
    config: WatcherConfig,
) -> Result<usize> {
    let watcher = FileSystemWatcher::new(root.clone(), config)?;
    let store = Arc::new(GraphStore::open(&db_path)?);
    let notifier = Arc::new(ChangeNotifier::new());
    let mut indexer = Indexer::new(&root, store, notifier)?;

    let mut processed = 0;
    let mut idle = std::time::Duration::ZERO;
    let idle_step = std::time::Duration::from_millis(10);
    let idle_timeout = std::time::Duration::from_secs(2);

    while processed < max_events {
        if let Some(batch) = watcher.try_recv_batch() {
            for path in batch.paths {
                if processed >= max_events {
                    break;
                }
                if let Err(e) = indexer.reconcile(&path) {
                    tracing::warn!(path = %path.display(), "reconcile failed: {e}");
                }
                processed += 1;
            }
            idle = std::time::Duration::ZERO;
            continue;
        }

        if idle >= idle_timeout {
            break;
        }
        std::thread::sleep(idle_step);
        idle += idle_step;
    }

    watcher.shutdown();
    Ok(processed)
}
