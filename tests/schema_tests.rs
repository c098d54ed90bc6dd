use graphproc::schema::ensure_schema;
use rusqlite::Connection;

#[test]
fn schema_creates_node_relationship_and_label_tables() {
    let conn = Connection::open_in_memory().unwrap();
    ensure_schema(&conn).unwrap();
    for table in ["graph_nodes", "graph_relationships", "graph_labels"] {
        assert!(table_exists(&conn, table), "{table}");
    }
    assert!(table_exists(&conn, "idx_rels_start"));
}

#[test]
fn schema_is_idempotent() {
    let conn = Connection::open_in_memory().unwrap();
    ensure_schema(&conn).unwrap();
    ensure_schema(&conn).unwrap();
}

fn table_exists(conn: &Connection, name: &str) -> bool {
    conn.prepare("SELECT name FROM sqlite_master WHERE name=?1")
        .unwrap()
        .exists([name])
        .unwrap()
}
