//! Entity schema bootstrap.
//!
//! # Responsibility
//! - Create the `entities` table and lookup indexes when absent.
//! - Create the FTS5 mirror and its sync triggers when full-text is allowed.
//!
//! # Invariants
//! - Every statement uses `IF NOT EXISTS`; bootstrap is idempotent.
//! - A freshly created FTS index is rebuilt from existing rows.

use super::capabilities::{probe_capabilities, Capabilities};
use super::DbResult;
use log::{info, warn};
use rusqlite::Connection;

/// Name of the FTS5 mirror table.
pub const FTS_TABLE: &str = "entities_fts";

const ENTITIES_SQL: &str = "
CREATE TABLE IF NOT EXISTS entities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    category TEXT NOT NULL,
    name TEXT NOT NULL,
    slug TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    tags TEXT NOT NULL DEFAULT '',
    attributes TEXT NOT NULL DEFAULT '{}',
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_entities_category ON entities(category);
CREATE INDEX IF NOT EXISTS idx_entities_name ON entities(name);
CREATE INDEX IF NOT EXISTS idx_entities_slug ON entities(slug);
";

const FTS_SQL: &str = "
CREATE VIRTUAL TABLE IF NOT EXISTS entities_fts USING fts5(
    name,
    notes,
    tags,
    attributes,
    content='entities',
    content_rowid='id'
);
CREATE TRIGGER IF NOT EXISTS entities_fts_ai AFTER INSERT ON entities BEGIN
    INSERT INTO entities_fts(rowid, name, notes, tags, attributes)
    VALUES (new.id, new.name, new.notes, new.tags, new.attributes);
END;
CREATE TRIGGER IF NOT EXISTS entities_fts_ad AFTER DELETE ON entities BEGIN
    INSERT INTO entities_fts(entities_fts, rowid, name, notes, tags, attributes)
    VALUES ('delete', old.id, old.name, old.notes, old.tags, old.attributes);
END;
CREATE TRIGGER IF NOT EXISTS entities_fts_au AFTER UPDATE ON entities BEGIN
    INSERT INTO entities_fts(entities_fts, rowid, name, notes, tags, attributes)
    VALUES ('delete', old.id, old.name, old.notes, old.tags, old.attributes);
    INSERT INTO entities_fts(rowid, name, notes, tags, attributes)
    VALUES (new.id, new.name, new.notes, new.tags, new.attributes);
END;
";

/// Creates the schema and returns the capabilities usable on `conn`.
///
/// `allowed` masks probed features; it can disable but never enable.
/// A failure while creating the FTS mirror degrades to `has_fulltext=false`
/// instead of failing startup.
pub fn initialize_schema(conn: &mut Connection, allowed: Capabilities) -> DbResult<Capabilities> {
    let mut capabilities = probe_capabilities(conn).intersect(allowed);

    let tx = conn.transaction()?;
    tx.execute_batch(ENTITIES_SQL)?;
    tx.commit()?;

    if capabilities.has_fulltext {
        if let Err(err) = create_fulltext_index(conn) {
            warn!("event=schema_init module=db status=degraded feature=fts5 error={err}");
            capabilities.has_fulltext = false;
        }
    }

    info!(
        "event=schema_init module=db status=ok fulltext={} structured_query={}",
        capabilities.has_fulltext, capabilities.has_structured_query
    );
    Ok(capabilities)
}

/// Returns whether a table (or virtual table) named `name` exists.
pub fn table_exists(conn: &Connection, name: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [name],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn create_fulltext_index(conn: &mut Connection) -> DbResult<()> {
    let existed = table_exists(conn, FTS_TABLE)?;

    let tx = conn.transaction()?;
    tx.execute_batch(FTS_SQL)?;
    if !existed {
        // Rows written while no index existed must become searchable.
        tx.execute_batch("INSERT INTO entities_fts(entities_fts) VALUES ('rebuild');")?;
        info!("event=fts_rebuild module=db status=ok");
    }
    tx.commit()?;
    Ok(())
}
