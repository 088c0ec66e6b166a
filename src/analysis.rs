//! Query engine: structural summaries, call-graph traversal, transitive
//! impact, reference lookup, signature search, and dependency
//! categorisation.
//!
//! Stateless reads over the graph store. Invalid arguments map to
//! `INVALID_INPUT`, missing files or symbols to `NOT_FOUND` — never an
//! empty success.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::common::language_for_path;
use crate::errors::QueryError;
use crate::graph::{GraphStore, Node, Relation};
use crate::resolver::is_stdlib_module;

/// Pagination bounds for structural summaries.
pub const SUMMARY_MAX_LIMIT: usize = 500;

/// Depth bounds for call-stack traversal.
pub const TRACE_MAX_DEPTH: usize = 10;

/// Impact analysis hop cap.
pub const IMPACT_MAX_LEVELS: usize = 3;

// ── Structural summary ──────────────────────────────────────────────────

/// One node of a file summary, with its qualified parent chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryNode {
    pub name: String,
    pub qualified_name: String,
    /// Dotted parent chain within the file, empty for top-level symbols
    pub parent: String,
    pub kind: crate::graph::NodeKind,
    pub visibility: crate::graph::Visibility,
    pub decorators: Vec<String>,
    pub signature: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl From<Node> for SummaryNode {
    fn from(node: Node) -> Self {
        let parent = match node.qualified_name.rfind('.') {
            Some(pos) => node.qualified_name[..pos].to_string(),
            None => String::new(),
        };
        Self {
            name: node.name,
            qualified_name: node.qualified_name,
            parent,
            kind: node.kind,
            visibility: node.visibility,
            decorators: node.decorators,
            signature: node.signature,
            start_line: node.start_line,
            end_line: node.end_line,
        }
    }
}

/// Response envelope for one summary page.
#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryPage {
    pub file_path: String,
    pub total: usize,
    pub count: usize,
    pub offset: usize,
    pub has_more: bool,
    pub next_offset: Option<usize>,
    pub nodes: Vec<SummaryNode>,
}

/// Ordered list of a file's nodes with pagination.
pub fn structural_summary(
    store: &GraphStore,
    file_path: &str,
    limit: usize,
    offset: usize,
) -> Result<SummaryPage, QueryError> {
    if limit == 0 || limit > SUMMARY_MAX_LIMIT {
        return Err(QueryError::InvalidInput(format!(
            "limit must be in 1..={SUMMARY_MAX_LIMIT}, got {limit}"
        )));
    }

    let total = store.count_nodes_in_file(file_path)?;
    if total == 0 {
        return Err(QueryError::NotFound(format!(
            "no structure for {file_path}; file may not be indexed"
        )));
    }

    let nodes = store.nodes_by_file_page(file_path, limit, offset)?;
    let count = nodes.len();
    let has_more = offset + count < total;
    Ok(SummaryPage {
        file_path: file_path.to_string(),
        total,
        count,
        offset,
        has_more,
        next_offset: if has_more { Some(offset + count) } else { None },
        nodes: nodes.into_iter().map(SummaryNode::from).collect(),
    })
}

// ── Call-stack traversal ────────────────────────────────────────────────

/// Direction of a call-stack trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Both,
}

impl Direction {
    pub fn parse(s: &str) -> Result<Self, QueryError> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "both" => Ok(Direction::Both),
            other => Err(QueryError::InvalidInput(format!(
                "direction must be up, down, or both, got '{other}'"
            ))),
        }
    }
}

/// One reached node in a trace, with the breadcrumb path from the origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// `origin > ... > this`, disambiguating same-named nodes at
    /// different depths
    pub breadcrumb: String,
    pub name: String,
    pub file_path: String,
    pub kind: crate::graph::NodeKind,
    pub depth: usize,
    pub site_line: Option<usize>,
    /// True when this node was already visited along this traversal:
    /// the marker is emitted and the branch is not expanded
    pub cycle: bool,
}

/// Trace output for one origin node.
#[derive(Debug, Serialize, Deserialize)]
pub struct TraceGroup {
    pub origin: Node,
    pub callers: Vec<TraceEntry>,
    pub callees: Vec<TraceEntry>,
}

/// Bounded, cycle-aware call-graph traversal.
///
/// Resolves `name` to one or more origin nodes (all of them when no file
/// scope is given) and traverses each independently.
pub fn call_stack(
    store: &GraphStore,
    name: &str,
    file_path: Option<&str>,
    direction: Direction,
    depth: usize,
) -> Result<Vec<TraceGroup>, QueryError> {
    if depth == 0 || depth > TRACE_MAX_DEPTH {
        return Err(QueryError::InvalidInput(format!(
            "depth must be in 1..={TRACE_MAX_DEPTH}, got {depth}"
        )));
    }

    let origins = store.nodes_by_name(name, file_path)?;
    if origins.is_empty() {
        return Err(QueryError::NotFound(format!(
            "node '{name}' not found; is the file indexed?"
        )));
    }

    let mut groups = Vec::new();
    for origin in origins {
        let mut callers = Vec::new();
        let mut callees = Vec::new();

        if matches!(direction, Direction::Up | Direction::Both) {
            let mut visited = HashSet::from([origin.id.clone()]);
            traverse(
                store,
                &origin.id,
                &origin.name,
                1,
                depth,
                true,
                &mut visited,
                &mut callers,
            )?;
        }
        if matches!(direction, Direction::Down | Direction::Both) {
            let mut visited = HashSet::from([origin.id.clone()]);
            traverse(
                store,
                &origin.id,
                &origin.name,
                1,
                depth,
                false,
                &mut visited,
                &mut callees,
            )?;
        }

        groups.push(TraceGroup {
            origin,
            callers,
            callees,
        });
    }
    Ok(groups)
}

#[allow(clippy::too_many_arguments)]
fn traverse(
    store: &GraphStore,
    node_id: &str,
    breadcrumb: &str,
    depth: usize,
    max_depth: usize,
    up: bool,
    visited: &mut HashSet<String>,
    out: &mut Vec<TraceEntry>,
) -> Result<(), QueryError> {
    if depth > max_depth {
        return Ok(());
    }

    let neighbors = if up {
        store.neighbors_to(node_id, Relation::Calls)?
    } else {
        store.neighbors_from(node_id, Relation::Calls)?
    };

    for neighbor in neighbors {
        let crumb = format!("{breadcrumb} > {}", neighbor.node.name);
        let already_seen = !visited.insert(neighbor.node.id.clone());
        out.push(TraceEntry {
            breadcrumb: crumb.clone(),
            name: neighbor.node.name.clone(),
            file_path: neighbor.node.file_path.clone(),
            kind: neighbor.node.kind,
            depth,
            site_line: neighbor.site_line,
            cycle: already_seen,
        });
        if !already_seen {
            traverse(
                store,
                &neighbor.node.id,
                &crumb,
                depth + 1,
                max_depth,
                up,
                visited,
                out,
            )?;
        }
    }
    Ok(())
}

// ── Transitive impact ───────────────────────────────────────────────────

/// One dependent found by the impact BFS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactEntry {
    pub name: String,
    pub file_path: String,
    pub kind: crate::graph::NodeKind,
    /// Name of the symbol this dependent reaches into the origin file
    /// through
    pub via: String,
}

/// Dependents of one level, grouped by containing file.
#[derive(Debug, Serialize, Deserialize)]
pub struct ImpactLevel {
    pub level: usize,
    pub groups: BTreeMap<String, Vec<ImpactEntry>>,
}

/// Full impact report for a file.
#[derive(Debug, Serialize, Deserialize)]
pub struct ImpactReport {
    pub file_path: String,
    pub total: usize,
    pub levels: Vec<ImpactLevel>,
}

/// Reverse-call BFS from every node in a file, capped at three levels.
pub fn impact_analysis(store: &GraphStore, file_path: &str) -> Result<ImpactReport, QueryError> {
    let file_nodes = store.nodes_by_file(file_path)?;
    if file_nodes.is_empty() {
        return Err(QueryError::NotFound(format!(
            "no nodes found in {file_path}; is it indexed?"
        )));
    }

    let mut visited: HashSet<String> = file_nodes.iter().map(|n| n.id.clone()).collect();
    let mut queue: VecDeque<(String, usize, String)> = file_nodes
        .iter()
        .map(|n| (n.id.clone(), 0, n.name.clone()))
        .collect();

    let mut levels: Vec<BTreeMap<String, Vec<ImpactEntry>>> =
        vec![BTreeMap::new(); IMPACT_MAX_LEVELS];
    let mut total = 0;

    while let Some((current_id, level, via)) = queue.pop_front() {
        if level >= IMPACT_MAX_LEVELS {
            continue;
        }
        for caller in store.neighbors_to(&current_id, Relation::Calls)? {
            if !visited.insert(caller.node.id.clone()) {
                continue;
            }
            let next_level = level + 1;
            if caller.node.file_path != file_path {
                levels[next_level - 1]
                    .entry(caller.node.file_path.clone())
                    .or_default()
                    .push(ImpactEntry {
                        name: caller.node.name.clone(),
                        file_path: caller.node.file_path.clone(),
                        kind: caller.node.kind,
                        via: via.clone(),
                    });
                total += 1;
            }
            queue.push_back((caller.node.id.clone(), next_level, caller.node.name.clone()));
        }
    }

    for level in &mut levels {
        for entries in level.values_mut() {
            entries.sort_by(|a, b| a.name.cmp(&b.name));
        }
    }

    Ok(ImpactReport {
        file_path: file_path.to_string(),
        total,
        levels: levels
            .into_iter()
            .enumerate()
            .map(|(i, groups)| ImpactLevel {
                level: i + 1,
                groups,
            })
            .collect(),
    })
}

// ── Find references ─────────────────────────────────────────────────────

/// One incoming reference to a target symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// Referencing symbol
    pub from_name: String,
    pub from_file: String,
    /// Which same-named target this reference points at
    pub target_file: String,
    pub relation: Relation,
    pub site_line: Option<usize>,
}

/// References grouped by the referencing file.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReferenceReport {
    pub symbol: String,
    pub total: usize,
    pub groups: BTreeMap<String, Vec<ReferenceEntry>>,
}

/// All edges pointing at nodes with the given name, grouped by the
/// referencing file. `defines` edges are structural, not references, and
/// are excluded.
pub fn find_references(
    store: &GraphStore,
    symbol: &str,
    scope_path: Option<&str>,
) -> Result<ReferenceReport, QueryError> {
    let targets = store.nodes_by_name(symbol, None)?;
    if targets.is_empty() {
        return Err(QueryError::NotFound(format!(
            "symbol '{symbol}' not found in index"
        )));
    }

    let mut groups: BTreeMap<String, Vec<ReferenceEntry>> = BTreeMap::new();
    let mut total = 0;

    for target in &targets {
        for edge in store.edges_to(&target.id, None)? {
            if edge.relation == Relation::Defines {
                continue;
            }
            let Some(from) = store.get_node(&edge.from_id)? else {
                continue;
            };
            if let Some(scope) = scope_path {
                let scope = scope.trim_end_matches('/');
                if !from.file_path.starts_with(scope) {
                    continue;
                }
            }
            groups
                .entry(from.file_path.clone())
                .or_default()
                .push(ReferenceEntry {
                    from_name: from.name,
                    from_file: from.file_path,
                    target_file: target.file_path.clone(),
                    relation: edge.relation,
                    site_line: edge.site_line,
                });
            total += 1;
        }
    }

    for entries in groups.values_mut() {
        entries.sort_by_key(|e| e.site_line.unwrap_or(0));
    }

    Ok(ReferenceReport {
        symbol: symbol.to_string(),
        total,
        groups,
    })
}

// ── Signature search ────────────────────────────────────────────────────

/// Nodes whose signature matches a `%`-wildcard pattern, ranked
/// exact-match > prefix > contains.
pub fn search_by_signature(
    store: &GraphStore,
    pattern: &str,
    scope_path: Option<&str>,
) -> Result<Vec<Node>, QueryError> {
    if pattern.is_empty() {
        return Err(QueryError::InvalidInput("pattern must not be empty".into()));
    }

    let mut matches = store.signature_search(pattern, scope_path)?;
    let needle = pattern.trim_matches('%');
    matches.sort_by_key(|node| {
        let rank = if node.signature == pattern || node.signature == needle {
            0
        } else if node.signature.starts_with(needle) {
            1
        } else {
            2
        };
        (rank, node.file_path.clone(), node.start_line)
    });
    Ok(matches)
}

// ── Dependency categorisation ───────────────────────────────────────────

/// One imported module.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEntry {
    pub name: String,
    /// Backing file for internal dependencies
    pub file_path: Option<String>,
}

/// A file's imports, bucketed by category.
#[derive(Debug, Serialize, Deserialize)]
pub struct DependencyReport {
    pub file_path: String,
    pub internal: Vec<DependencyEntry>,
    pub std_lib: Vec<DependencyEntry>,
    pub third_party: Vec<DependencyEntry>,
}

/// Outgoing `imports` edges of a file, categorised Internal / StdLib /
/// ThirdParty. Retained placeholders are categorised from the importing
/// file's language-specific stdlib set.
pub fn dependencies(store: &GraphStore, file_path: &str) -> Result<DependencyReport, QueryError> {
    if store.count_nodes_in_file(file_path)? == 0 {
        return Err(QueryError::NotFound(format!(
            "no nodes found in {file_path}; is it indexed?"
        )));
    }

    let language = language_for_path(file_path).unwrap_or("python");
    let mut internal = Vec::new();
    let mut std_lib = Vec::new();
    let mut third_party = Vec::new();

    for target in store.import_targets_for_file(file_path)? {
        if target.is_placeholder() {
            let entry = DependencyEntry {
                name: target.qualified_name.clone(),
                file_path: None,
            };
            if is_stdlib_module(language, &target.qualified_name) {
                std_lib.push(entry);
            } else {
                third_party.push(entry);
            }
        } else {
            internal.push(DependencyEntry {
                name: target.qualified_name.clone(),
                file_path: Some(target.file_path.clone()),
            });
        }
    }

    for bucket in [&mut internal, &mut std_lib, &mut third_party] {
        bucket.sort();
        bucket.dedup();
    }

    Ok(DependencyReport {
        file_path: file_path.to_string(),
        internal,
        std_lib,
        third_party,
    })
}
