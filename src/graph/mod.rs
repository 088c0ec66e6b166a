//! Graph persistence layer.
//!
//! Deterministic, idempotent operations for persisting code facts. One
//! writer (the indexing driver) and many readers (the query engine) share a
//! single SQLite connection behind a mutex; every file refresh runs in one
//! transaction, so readers observe either the pre-image or the post-image
//! of a file, never a partial mix.

mod query;
mod schema;

pub use schema::{Edge, Node, NodeKind, Relation, Visibility, SCHEMA};

use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::errors::QueryError;
use crate::ident::EXTERNAL_PATH;

/// Graph database wrapper.
pub struct GraphStore {
    conn: Mutex<Connection>,
}

impl GraphStore {
    /// Open (or create) a graph database at the given path.
    ///
    /// The parent directory must already exist; the driver creates the
    /// project-local context directory before opening.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, QueryError> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (tests and dry runs).
    pub fn open_in_memory() -> Result<Self, QueryError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, QueryError> {
        self.conn
            .lock()
            .map_err(|e| QueryError::Internal(format!("store lock poisoned: {e}")))
    }

    /// Insert-or-replace a node by its stable ID.
    pub fn upsert_node(&self, node: &Node) -> Result<(), QueryError> {
        let conn = self.lock()?;
        insert_node(&conn, node)
    }

    /// Insert an edge. Duplicate `(from_id, to_id, relation)` rows may
    /// coexist; queries deduplicate by triple.
    pub fn upsert_edge(&self, edge: &Edge) -> Result<(), QueryError> {
        let conn = self.lock()?;
        insert_edge(&conn, edge)
    }

    /// Delete all nodes with the given file path and all edges with either
    /// endpoint in that file, in one transaction.
    pub fn clear_file(&self, file_path: &str) -> Result<(), QueryError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        clear_file_tx(&tx, file_path)?;
        prune_placeholders_tx(&tx)?;
        tx.commit()?;
        Ok(())
    }

    /// Complete refresh of one file: clear old rows, insert the new batch.
    ///
    /// Runs in a single transaction. Deleting all rows for the file and
    /// re-inserting from the extractor output is the idempotence contract:
    /// indexing unchanged content twice yields identical node and edge sets.
    pub fn refresh_file(
        &self,
        file_path: &str,
        nodes: &[Node],
        edges: &[Edge],
    ) -> Result<(), QueryError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        clear_file_tx(&tx, file_path)?;
        for node in nodes {
            insert_node(&tx, node)?;
        }
        for edge in edges {
            insert_edge(&tx, edge)?;
        }
        prune_placeholders_tx(&tx)?;
        tx.commit()?;
        Ok(())
    }

    /// Phase one of a full re-index: clear the file and commit its nodes.
    ///
    /// Used by `reindex_all`, which commits every file's nodes before any
    /// cross-file edges so edge endpoints always exist when their edges land.
    pub fn refresh_file_nodes(&self, file_path: &str, nodes: &[Node]) -> Result<(), QueryError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        clear_file_tx(&tx, file_path)?;
        for node in nodes {
            insert_node(&tx, node)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Phase two of a full re-index: commit one file's edges.
    pub fn insert_edges(&self, edges: &[Edge]) -> Result<(), QueryError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for edge in edges {
            insert_edge(&tx, edge)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Drop placeholder nodes that no longer have incoming edges.
    pub fn prune_placeholders(&self) -> Result<usize, QueryError> {
        let conn = self.lock()?;
        prune_placeholders_tx(&conn)
    }

    /// Number of stored nodes.
    pub fn node_count(&self) -> Result<usize, QueryError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Number of stored edges (raw rows, before triple deduplication).
    pub fn edge_count(&self) -> Result<usize, QueryError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn insert_node(conn: &Connection, node: &Node) -> Result<(), QueryError> {
    let decorators = serde_json::to_string(&node.decorators)
        .map_err(|e| QueryError::Internal(format!("decorator encode: {e}")))?;
    conn.execute(
        "INSERT OR REPLACE INTO nodes
         (id, name, qualified_name, kind, file_path, start_line, end_line,
          signature, docstring, decorators, visibility)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            node.id,
            node.name,
            node.qualified_name,
            node.kind.as_str(),
            node.file_path,
            node.start_line as i64,
            node.end_line as i64,
            node.signature,
            node.docstring,
            decorators,
            node.visibility.as_str(),
        ],
    )?;
    Ok(())
}

fn insert_edge(conn: &Connection, edge: &Edge) -> Result<(), QueryError> {
    conn.execute(
        "INSERT INTO edges (from_id, to_id, relation, site_line) VALUES (?1, ?2, ?3, ?4)",
        params![
            edge.from_id,
            edge.to_id,
            edge.relation.as_str(),
            edge.site_line.map(|l| l as i64),
        ],
    )?;
    Ok(())
}

fn clear_file_tx(conn: &Connection, file_path: &str) -> Result<(), QueryError> {
    conn.execute(
        "DELETE FROM edges
         WHERE from_id IN (SELECT id FROM nodes WHERE file_path = ?1)
            OR to_id IN (SELECT id FROM nodes WHERE file_path = ?1)",
        params![file_path],
    )?;
    conn.execute("DELETE FROM nodes WHERE file_path = ?1", params![file_path])?;
    Ok(())
}

fn prune_placeholders_tx(conn: &Connection) -> Result<usize, QueryError> {
    let pruned = conn.execute(
        "DELETE FROM nodes
         WHERE file_path = ?1
           AND id NOT IN (SELECT to_id FROM edges)",
        params![EXTERNAL_PATH],
    )?;
    Ok(pruned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::{node_id, placeholder_id};

    fn sample_node(path: &str, name: &str, kind: NodeKind) -> Node {
        Node {
            id: node_id(path, name),
            name: name.to_string(),
            qualified_name: name.to_string(),
            kind,
            file_path: path.to_string(),
            start_line: 1,
            end_line: 3,
            signature: format!("def {name}()"),
            docstring: String::new(),
            decorators: vec![],
            visibility: Visibility::Public,
        }
    }

    #[test]
    fn upsert_node_is_idempotent() {
        let store = GraphStore::open_in_memory().unwrap();
        let node = sample_node("a.py", "f", NodeKind::Function);
        store.upsert_node(&node).unwrap();
        store.upsert_node(&node).unwrap();
        assert_eq!(store.node_count().unwrap(), 1);
    }

    #[test]
    fn refresh_file_replaces_previous_rows() {
        let store = GraphStore::open_in_memory().unwrap();
        let old = sample_node("a.py", "f", NodeKind::Function);
        store.refresh_file("a.py", &[old], &[]).unwrap();

        let new = sample_node("a.py", "ff", NodeKind::Function);
        store.refresh_file("a.py", &[new.clone()], &[]).unwrap();

        let nodes = store.nodes_by_file("a.py").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "ff");
    }

    #[test]
    fn clear_file_removes_edges_on_either_endpoint() {
        let store = GraphStore::open_in_memory().unwrap();
        let a = sample_node("a.py", "f", NodeKind::Function);
        let b = sample_node("b.py", "h", NodeKind::Function);
        store.refresh_file("a.py", &[a.clone()], &[]).unwrap();
        store
            .refresh_file(
                "b.py",
                &[b.clone()],
                &[Edge::new(&b.id, &a.id, Relation::Calls)],
            )
            .unwrap();
        assert_eq!(store.edge_count().unwrap(), 1);

        store.clear_file("a.py").unwrap();
        assert_eq!(store.edge_count().unwrap(), 0);
        assert_eq!(store.nodes_by_file("b.py").unwrap().len(), 1);
    }

    #[test]
    fn placeholders_pruned_when_unreferenced() {
        let store = GraphStore::open_in_memory().unwrap();
        let caller = sample_node("a.py", "f", NodeKind::Function);
        let external = Node {
            id: placeholder_id("os"),
            name: "os".into(),
            qualified_name: "os".into(),
            kind: NodeKind::Module,
            file_path: crate::ident::EXTERNAL_PATH.into(),
            start_line: 0,
            end_line: 0,
            signature: String::new(),
            docstring: String::new(),
            decorators: vec![],
            visibility: Visibility::Public,
        };
        store
            .refresh_file(
                "a.py",
                &[caller.clone(), external.clone()],
                &[Edge::new(&caller.id, &external.id, Relation::Imports)],
            )
            .unwrap();
        assert_eq!(store.node_count().unwrap(), 2);

        // Re-index the file without the import: the placeholder loses its
        // last incoming edge and is pruned.
        store.refresh_file("a.py", &[caller], &[]).unwrap();
        let remaining = store.nodes_by_file(crate::ident::EXTERNAL_PATH).unwrap();
        assert!(remaining.is_empty());
    }

    #[test]
    fn duplicate_edges_deduplicated_by_queries() {
        let store = GraphStore::open_in_memory().unwrap();
        let a = sample_node("a.py", "f", NodeKind::Function);
        let b = sample_node("a.py", "g", NodeKind::Function);
        let edge = Edge::new(&a.id, &b.id, Relation::Calls).at_line(2);
        store
            .refresh_file("a.py", &[a.clone(), b], &[edge.clone(), edge.clone()])
            .unwrap();

        assert_eq!(store.edge_count().unwrap(), 2);
        let deduped = store.edges_from(&a.id, Some(Relation::Calls)).unwrap();
        assert_eq!(deduped.len(), 1);
    }
}
