//! Point and pattern queries over the graph store.
//!
//! All reads deduplicate edges by the `(from_id, to_id, relation)` triple
//! and never mutate the store.

use rusqlite::{params, Connection, Row};

use super::{Edge, GraphStore, Node, NodeKind, Relation, Visibility};
use crate::errors::QueryError;

/// A neighbouring node reached over one edge, as returned by traversal
/// queries.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub node: Node,
    pub relation: Relation,
    pub site_line: Option<usize>,
}

fn node_from_row(row: &Row<'_>) -> rusqlite::Result<Node> {
    let kind_str: String = row.get(3)?;
    let decorators_json: String = row.get(9)?;
    let visibility_str: String = row.get(10)?;
    Ok(Node {
        id: row.get(0)?,
        name: row.get(1)?,
        qualified_name: row.get(2)?,
        kind: NodeKind::parse(&kind_str).unwrap_or(NodeKind::Module),
        file_path: row.get(4)?,
        start_line: row.get::<_, i64>(5)? as usize,
        end_line: row.get::<_, i64>(6)? as usize,
        signature: row.get(7)?,
        docstring: row.get(8)?,
        decorators: serde_json::from_str(&decorators_json).unwrap_or_default(),
        visibility: Visibility::parse(&visibility_str).unwrap_or(Visibility::Public),
    })
}

const NODE_COLUMNS: &str = "id, name, qualified_name, kind, file_path, start_line, end_line, \
                            signature, docstring, decorators, visibility";

fn collect_nodes(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Node>, QueryError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, node_from_row)?;
    let mut nodes = Vec::new();
    for row in rows {
        nodes.push(row?);
    }
    Ok(nodes)
}

impl GraphStore {
    /// Fetch one node by its stable ID.
    pub fn get_node(&self, id: &str) -> Result<Option<Node>, QueryError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {NODE_COLUMNS} FROM nodes WHERE id = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], node_from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// All nodes in a file, ordered by start line.
    pub fn nodes_by_file(&self, file_path: &str) -> Result<Vec<Node>, QueryError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE file_path = ?1 ORDER BY start_line, id"
        );
        collect_nodes(&conn, &sql, &[&file_path])
    }

    /// Count of nodes in a file.
    pub fn count_nodes_in_file(&self, file_path: &str) -> Result<usize, QueryError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE file_path = ?1",
            params![file_path],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// One page of a file's nodes, ordered by start line.
    pub fn nodes_by_file_page(
        &self,
        file_path: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Node>, QueryError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE file_path = ?1
             ORDER BY start_line, id LIMIT ?2 OFFSET ?3"
        );
        collect_nodes(
            &conn,
            &sql,
            &[&file_path, &(limit as i64), &(offset as i64)],
        )
    }

    /// Nodes by short name, optionally scoped to one file.
    pub fn nodes_by_name(
        &self,
        name: &str,
        file_path: Option<&str>,
    ) -> Result<Vec<Node>, QueryError> {
        let conn = self.lock()?;
        match file_path {
            Some(path) => {
                let sql = format!(
                    "SELECT {NODE_COLUMNS} FROM nodes
                     WHERE name = ?1 AND file_path = ?2 ORDER BY file_path, start_line"
                );
                collect_nodes(&conn, &sql, &[&name, &path])
            }
            None => {
                let sql = format!(
                    "SELECT {NODE_COLUMNS} FROM nodes
                     WHERE name = ?1 ORDER BY file_path, start_line"
                );
                collect_nodes(&conn, &sql, &[&name])
            }
        }
    }

    /// Concrete (non-placeholder) nodes whose qualified name matches, used
    /// by the resolver to retarget placeholder edges.
    pub fn nodes_by_qualified_name(&self, qualified_name: &str) -> Result<Vec<Node>, QueryError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM nodes
             WHERE qualified_name = ?1 AND file_path != ?2
             ORDER BY file_path, start_line"
        );
        collect_nodes(&conn, &sql, &[&qualified_name, &crate::ident::EXTERNAL_PATH])
    }

    /// Outgoing edges of a node, deduplicated by triple.
    pub fn edges_from(
        &self,
        id: &str,
        relation: Option<Relation>,
    ) -> Result<Vec<Edge>, QueryError> {
        self.edges_for("from_id", id, relation)
    }

    /// Incoming edges of a node, deduplicated by triple.
    pub fn edges_to(&self, id: &str, relation: Option<Relation>) -> Result<Vec<Edge>, QueryError> {
        self.edges_for("to_id", id, relation)
    }

    fn edges_for(
        &self,
        column: &str,
        id: &str,
        relation: Option<Relation>,
    ) -> Result<Vec<Edge>, QueryError> {
        let conn = self.lock()?;
        let filter = match relation {
            Some(_) => format!("WHERE {column} = ?1 AND relation = ?2"),
            None => format!("WHERE {column} = ?1"),
        };
        let sql = format!(
            "SELECT from_id, to_id, relation, MIN(site_line) FROM edges {filter}
             GROUP BY from_id, to_id, relation
             ORDER BY MIN(site_line), to_id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let map_row = |row: &Row<'_>| -> rusqlite::Result<Edge> {
            let relation_str: String = row.get(2)?;
            Ok(Edge {
                from_id: row.get(0)?,
                to_id: row.get(1)?,
                relation: Relation::parse(&relation_str).unwrap_or(Relation::References),
                site_line: row.get::<_, Option<i64>>(3)?.map(|l| l as usize),
            })
        };
        let rows = match relation {
            Some(rel) => stmt.query_map(params![id, rel.as_str()], map_row)?,
            None => stmt.query_map(params![id], map_row)?,
        };
        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }

    /// Nodes on the far end of incoming edges of the given relations.
    ///
    /// `up` traversal: who points at this node.
    pub fn neighbors_to(
        &self,
        id: &str,
        relation: Relation,
    ) -> Result<Vec<Neighbor>, QueryError> {
        self.neighbors(id, relation, "to_id", "from_id")
    }

    /// Nodes on the far end of outgoing edges of the given relation.
    ///
    /// `down` traversal: what this node points at.
    pub fn neighbors_from(
        &self,
        id: &str,
        relation: Relation,
    ) -> Result<Vec<Neighbor>, QueryError> {
        self.neighbors(id, relation, "from_id", "to_id")
    }

    fn neighbors(
        &self,
        id: &str,
        relation: Relation,
        match_column: &str,
        join_column: &str,
    ) -> Result<Vec<Neighbor>, QueryError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT n.id, n.name, n.qualified_name, n.kind, n.file_path, n.start_line,
                    n.end_line, n.signature, n.docstring, n.decorators, n.visibility,
                    e.relation, MIN(e.site_line)
             FROM edges e JOIN nodes n ON e.{join_column} = n.id
             WHERE e.{match_column} = ?1 AND e.relation = ?2
             GROUP BY n.id, e.relation
             ORDER BY n.file_path, n.start_line"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![id, relation.as_str()], |row| {
            let node = node_from_row(row)?;
            let relation_str: String = row.get(11)?;
            let site_line = row.get::<_, Option<i64>>(12)?.map(|l| l as usize);
            Ok(Neighbor {
                node,
                relation: Relation::parse(&relation_str).unwrap_or(Relation::References),
                site_line,
            })
        })?;
        let mut neighbors = Vec::new();
        for row in rows {
            neighbors.push(row?);
        }
        Ok(neighbors)
    }

    /// Nodes whose signature matches a SQL `LIKE` pattern with `%`
    /// wildcards, optionally restricted to a file-path prefix.
    pub fn signature_search(
        &self,
        pattern: &str,
        scope_path: Option<&str>,
    ) -> Result<Vec<Node>, QueryError> {
        let conn = self.lock()?;
        match scope_path {
            Some(scope) => {
                let prefix = format!("{}%", scope.trim_end_matches('/'));
                let sql = format!(
                    "SELECT {NODE_COLUMNS} FROM nodes
                     WHERE signature LIKE ?1 AND signature != '' AND file_path LIKE ?2
                     ORDER BY file_path, start_line LIMIT 50"
                );
                collect_nodes(&conn, &sql, &[&pattern, &prefix])
            }
            None => {
                let sql = format!(
                    "SELECT {NODE_COLUMNS} FROM nodes
                     WHERE signature LIKE ?1 AND signature != ''
                     ORDER BY file_path, start_line LIMIT 50"
                );
                collect_nodes(&conn, &sql, &[&pattern])
            }
        }
    }

    /// Distinct targets of `imports` edges leaving a file's nodes.
    pub fn import_targets_for_file(&self, file_path: &str) -> Result<Vec<Node>, QueryError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT DISTINCT n_to.id, n_to.name, n_to.qualified_name, n_to.kind,
                    n_to.file_path, n_to.start_line, n_to.end_line, n_to.signature,
                    n_to.docstring, n_to.decorators, n_to.visibility
             FROM nodes n_from
             JOIN edges e ON n_from.id = e.from_id
             JOIN nodes n_to ON e.to_id = n_to.id
             WHERE n_from.file_path = ?1 AND e.relation = 'imports'
             ORDER BY n_to.name"
        );
        collect_nodes(&conn, &sql, &[&file_path])
    }

    /// Every stored node, file-grouped and line-ordered (graph surface).
    pub fn all_nodes(&self) -> Result<Vec<Node>, QueryError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {NODE_COLUMNS} FROM nodes ORDER BY file_path, start_line, id");
        collect_nodes(&conn, &sql, &[])
    }

    /// Every stored edge, deduplicated by triple (graph surface).
    pub fn all_edges(&self) -> Result<Vec<Edge>, QueryError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT from_id, to_id, relation, MIN(site_line) FROM edges
             GROUP BY from_id, to_id, relation
             ORDER BY from_id, to_id, relation",
        )?;
        let rows = stmt.query_map([], |row| {
            let relation_str: String = row.get(2)?;
            Ok(Edge {
                from_id: row.get(0)?,
                to_id: row.get(1)?,
                relation: Relation::parse(&relation_str).unwrap_or(Relation::References),
                site_line: row.get::<_, Option<i64>>(3)?.map(|l| l as usize),
            })
        })?;
        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }

    /// Edges with at least one endpoint among the given node IDs,
    /// deduplicated by triple (graph surface, single-file view).
    pub fn edges_touching(&self, node_ids: &[String]) -> Result<Vec<Edge>, QueryError> {
        if node_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let placeholders = node_ids
            .iter()
            .map(|_| "?")
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            "SELECT from_id, to_id, relation, MIN(site_line) FROM edges
             WHERE from_id IN ({placeholders}) OR to_id IN ({placeholders})
             GROUP BY from_id, to_id, relation
             ORDER BY from_id, to_id, relation"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut bound: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(node_ids.len() * 2);
        for id in node_ids {
            bound.push(id);
        }
        for id in node_ids {
            bound.push(id);
        }
        let rows = stmt.query_map(bound.as_slice(), |row| {
            let relation_str: String = row.get(2)?;
            Ok(Edge {
                from_id: row.get(0)?,
                to_id: row.get(1)?,
                relation: Relation::parse(&relation_str).unwrap_or(Relation::References),
                site_line: row.get::<_, Option<i64>>(3)?.map(|l| l as usize),
            })
        })?;
        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }

    /// Rewrite every edge pointing at `old_id` to point at `new_id`.
    ///
    /// Used by the resolver when a placeholder gains a concrete backing node.
    pub fn retarget_edges(&self, old_id: &str, new_id: &str) -> Result<usize, QueryError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE edges SET to_id = ?2 WHERE to_id = ?1",
            params![old_id, new_id],
        )?;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::node_id;

    fn node(path: &str, name: &str, line: usize, signature: &str) -> Node {
        Node {
            id: node_id(path, name),
            name: name.to_string(),
            qualified_name: name.to_string(),
            kind: NodeKind::Function,
            file_path: path.to_string(),
            start_line: line,
            end_line: line + 2,
            signature: signature.to_string(),
            docstring: String::new(),
            decorators: vec![],
            visibility: Visibility::Public,
        }
    }

    #[test]
    fn nodes_by_file_ordered_by_start_line() {
        let store = GraphStore::open_in_memory().unwrap();
        store
            .refresh_file(
                "a.py",
                &[
                    node("a.py", "late", 30, ""),
                    node("a.py", "early", 2, ""),
                    node("a.py", "middle", 10, ""),
                ],
                &[],
            )
            .unwrap();
        let names: Vec<String> = store
            .nodes_by_file("a.py")
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["early", "middle", "late"]);
    }

    #[test]
    fn pagination_returns_window_in_order() {
        let store = GraphStore::open_in_memory().unwrap();
        let nodes: Vec<Node> = (1..=5)
            .map(|i| node("a.py", &format!("f{i}"), i * 10, ""))
            .collect();
        store.refresh_file("a.py", &nodes, &[]).unwrap();

        let page = store.nodes_by_file_page("a.py", 2, 2).unwrap();
        let names: Vec<String> = page.into_iter().map(|n| n.name).collect();
        assert_eq!(names, vec!["f3", "f4"]);
        assert_eq!(store.count_nodes_in_file("a.py").unwrap(), 5);
    }

    #[test]
    fn nodes_by_name_scopes_to_file() {
        let store = GraphStore::open_in_memory().unwrap();
        store
            .refresh_file("a.py", &[node("a.py", "f", 1, "")], &[])
            .unwrap();
        store
            .refresh_file("b.py", &[node("b.py", "f", 1, "")], &[])
            .unwrap();

        assert_eq!(store.nodes_by_name("f", None).unwrap().len(), 2);
        assert_eq!(store.nodes_by_name("f", Some("b.py")).unwrap().len(), 1);
        assert!(store.nodes_by_name("g", None).unwrap().is_empty());
    }

    #[test]
    fn signature_search_matches_like_pattern() {
        let store = GraphStore::open_in_memory().unwrap();
        store
            .refresh_file(
                "db.py",
                &[node(
                    "db.py",
                    "upsert_node",
                    4,
                    "def upsert_node(self, node: Node) -> None",
                )],
                &[],
            )
            .unwrap();

        let hits = store.signature_search("%Node%", None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "upsert_node");

        let scoped = store.signature_search("%Node%", Some("web/")).unwrap();
        assert!(scoped.is_empty());
    }

    #[test]
    fn neighbors_follow_direction() {
        let store = GraphStore::open_in_memory().unwrap();
        let f = node("a.py", "f", 1, "");
        let g = node("a.py", "g", 5, "");
        store
            .refresh_file(
                "a.py",
                &[f.clone(), g.clone()],
                &[Edge::new(&f.id, &g.id, Relation::Calls).at_line(2)],
            )
            .unwrap();

        let callees = store.neighbors_from(&f.id, Relation::Calls).unwrap();
        assert_eq!(callees.len(), 1);
        assert_eq!(callees[0].node.name, "g");
        assert_eq!(callees[0].site_line, Some(2));

        let callers = store.neighbors_to(&g.id, Relation::Calls).unwrap();
        assert_eq!(callers.len(), 1);
        assert_eq!(callers[0].node.name, "f");

        assert!(store.neighbors_to(&f.id, Relation::Calls).unwrap().is_empty());
    }

    #[test]
    fn retarget_edges_moves_incoming() {
        let store = GraphStore::open_in_memory().unwrap();
        let f = node("a.py", "f", 1, "");
        let old = node("x.py", "old", 1, "");
        let new = node("y.py", "new", 1, "");
        store
            .refresh_file("a.py", &[f.clone()], &[Edge::new(&f.id, &old.id, Relation::Calls)])
            .unwrap();
        store.upsert_node(&old).unwrap();
        store.upsert_node(&new).unwrap();

        store.retarget_edges(&old.id, &new.id).unwrap();
        assert!(store.edges_to(&old.id, None).unwrap().is_empty());
        assert_eq!(store.edges_to(&new.id, None).unwrap().len(), 1);
    }
}
