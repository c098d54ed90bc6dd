use rusqlite::Connection;

use crate::errors::GraphProcError;

pub fn ensure_schema(conn: &Connection) -> Result<(), GraphProcError> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS graph_nodes (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            properties TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS graph_relationships (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            start_id   INTEGER NOT NULL REFERENCES graph_nodes(id) ON DELETE CASCADE,
            end_id     INTEGER NOT NULL REFERENCES graph_nodes(id) ON DELETE CASCADE,
            rel_type   TEXT NOT NULL,
            properties TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS graph_labels (
            node_id INTEGER NOT NULL REFERENCES graph_nodes(id) ON DELETE CASCADE,
            label   TEXT NOT NULL,
            UNIQUE(node_id, label)
        );
        CREATE INDEX IF NOT EXISTS idx_rels_start ON graph_relationships(start_id);
        CREATE INDEX IF NOT EXISTS idx_rels_end ON graph_relationships(end_id);
        CREATE INDEX IF NOT EXISTS idx_rels_type ON graph_relationships(rel_type);
        CREATE INDEX IF NOT EXISTS idx_labels_label ON graph_labels(label);
        "#,
    )
    .map_err(|e| GraphProcError::schema(e.to_string()))?;
    Ok(())
}
