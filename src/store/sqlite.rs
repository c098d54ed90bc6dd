use std::path::Path as FsPath;

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use crate::{cache::AdjacencyCache, errors::GraphProcError, schema::ensure_schema};

use super::{Direction, GraphStore, NodeId, Relationship, RelationshipIter};

/// SQLite-backed property graph implementing [`GraphStore`].
pub struct SqliteGraph {
    conn: Connection,
    adjacency: AdjacencyCache,
}

impl SqliteGraph {
    pub fn open<P: AsRef<FsPath>>(path: P) -> Result<Self, GraphProcError> {
        let conn =
            Connection::open(path).map_err(|e| GraphProcError::connection(e.to_string()))?;
        ensure_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, GraphProcError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| GraphProcError::connection(e.to_string()))?;
        ensure_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Inserts a node and returns its rowid (monotonically increasing per connection).
    pub fn insert_node(&self, labels: &[&str], properties: Value) -> Result<NodeId, GraphProcError> {
        let data = serde_json::to_string(&properties)
            .map_err(|e| GraphProcError::invalid_input(e.to_string()))?;
        self.conn
            .execute("INSERT INTO graph_nodes(properties) VALUES(?1)", params![data])
            .map_err(|e| GraphProcError::query(e.to_string()))?;
        let id = self.conn.last_insert_rowid();
        for label in labels {
            self.add_label(id, label)?;
        }
        Ok(id)
    }

    pub fn add_label(&self, node: NodeId, label: &str) -> Result<(), GraphProcError> {
        if label.trim().is_empty() {
            return Err(GraphProcError::invalid_input("label must be set"));
        }
        if !self.node_exists(node)? {
            return Err(GraphProcError::not_found(format!("node {node}")));
        }
        self.conn
            .execute(
                "INSERT OR IGNORE INTO graph_labels(node_id, label) VALUES(?1, ?2)",
                params![node, label],
            )
            .map_err(|e| GraphProcError::query(e.to_string()))?;
        Ok(())
    }

    pub fn node_properties(&self, node: NodeId) -> Result<Value, GraphProcError> {
        let data: String = self
            .conn
            .query_row(
                "SELECT properties FROM graph_nodes WHERE id=?1",
                params![node],
                |row| row.get(0),
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => {
                    GraphProcError::not_found(format!("node {node}"))
                }
                other => GraphProcError::query(other.to_string()),
            })?;
        serde_json::from_str(&data).map_err(|e| GraphProcError::query(e.to_string()))
    }

    pub fn insert_relationship(
        &self,
        start: NodeId,
        end: NodeId,
        rel_type: &str,
        properties: Value,
    ) -> Result<i64, GraphProcError> {
        if rel_type.trim().is_empty() {
            return Err(GraphProcError::invalid_input("relationship type must be set"));
        }
        if !self.node_exists(start)? || !self.node_exists(end)? {
            return Err(GraphProcError::invalid_input(
                "relationship endpoints must reference existing nodes",
            ));
        }
        let data = serde_json::to_string(&properties)
            .map_err(|e| GraphProcError::invalid_input(e.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO graph_relationships(start_id, end_id, rel_type, properties) \
                 VALUES(?1, ?2, ?3, ?4)",
                params![start, end, rel_type, data],
            )
            .map_err(|e| GraphProcError::query(e.to_string()))?;
        self.adjacency.invalidate(&[start, end]);
        Ok(self.conn.last_insert_rowid())
    }

    pub fn relationship(&self, id: i64) -> Result<Relationship, GraphProcError> {
        self.conn
            .query_row(
                "SELECT id, start_id, end_id, rel_type FROM graph_relationships WHERE id=?1",
                params![id],
                row_to_relationship,
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => {
                    GraphProcError::not_found(format!("relationship {id}"))
                }
                other => GraphProcError::query(other.to_string()),
            })
    }

    pub fn delete_relationship(&self, id: i64) -> Result<(), GraphProcError> {
        let rel = self.relationship(id)?;
        self.conn
            .execute("DELETE FROM graph_relationships WHERE id=?1", params![id])
            .map_err(|e| GraphProcError::query(e.to_string()))?;
        self.adjacency.invalidate(&[rel.start, rel.end]);
        Ok(())
    }

    pub fn node_ids(&self) -> Result<Vec<NodeId>, GraphProcError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id FROM graph_nodes ORDER BY id")
            .map_err(|e| GraphProcError::query(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| GraphProcError::query(e.to_string()))?;
        let mut ids = Vec::new();
        for id in rows {
            ids.push(id.map_err(|e| GraphProcError::query(e.to_string()))?);
        }
        Ok(ids)
    }

    pub fn adjacency_cache(&self) -> &AdjacencyCache {
        &self.adjacency
    }

    fn incident(&self, node: NodeId) -> Result<Vec<Relationship>, GraphProcError> {
        if let Some(cached) = self.adjacency.get(node) {
            return Ok(cached);
        }
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT id, start_id, end_id, rel_type FROM graph_relationships \
                 WHERE start_id=?1 OR end_id=?1 ORDER BY id",
            )
            .map_err(|e| GraphProcError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![node], row_to_relationship)
            .map_err(|e| GraphProcError::query(e.to_string()))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| GraphProcError::query(e.to_string()))?);
        }
        self.adjacency.insert(node, result.clone());
        Ok(result)
    }

    fn from_connection(conn: Connection) -> Self {
        conn.set_prepared_statement_cache_capacity(128);
        Self {
            conn,
            adjacency: AdjacencyCache::new(),
        }
    }
}

impl GraphStore for SqliteGraph {
    fn node_exists(&self, node: NodeId) -> Result<bool, GraphProcError> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM graph_nodes WHERE id=?1",
                params![node],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| GraphProcError::query(e.to_string()))?;
        Ok(exists.is_some())
    }

    fn labels(&self, node: NodeId) -> Result<Vec<String>, GraphProcError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT label FROM graph_labels WHERE node_id=?1 ORDER BY label")
            .map_err(|e| GraphProcError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![node], |row| row.get(0))
            .map_err(|e| GraphProcError::query(e.to_string()))?;
        let mut labels = Vec::new();
        for label in rows {
            labels.push(label.map_err(|e| GraphProcError::query(e.to_string()))?);
        }
        Ok(labels)
    }

    fn relationships(
        &self,
        node: NodeId,
        rel_type: Option<&str>,
        direction: Direction,
    ) -> Result<RelationshipIter<'_>, GraphProcError> {
        let rel_type = rel_type.map(str::to_owned);
        let matching = self.incident(node)?.into_iter().filter(move |rel| {
            direction.matches(rel, node)
                && rel_type.as_deref().is_none_or(|ty| rel.rel_type == ty)
        });
        Ok(Box::new(matching.map(Ok)))
    }
}

fn row_to_relationship(row: &rusqlite::Row<'_>) -> Result<Relationship, rusqlite::Error> {
    Ok(Relationship {
        id: row.get(0)?,
        start: row.get(1)?,
        end: row.get(2)?,
        rel_type: row.get(3)?,
    })
}
