//! Runtime detection of optional SQLite features.

use log::{info, warn};
use rusqlite::Connection;

const FTS_PROBE_SQL: &str = "CREATE VIRTUAL TABLE IF NOT EXISTS temp.hoard_fts_probe USING fts5(content);
DROP TABLE IF EXISTS temp.hoard_fts_probe;";

/// Optional engine features available to the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// FTS5 index exists and is kept in sync by triggers.
    pub has_fulltext: bool,
    /// JSON1 functions are usable for attribute queries.
    pub has_structured_query: bool,
}

impl Capabilities {
    pub const ALL: Self = Self {
        has_fulltext: true,
        has_structured_query: true,
    };

    pub const NONE: Self = Self {
        has_fulltext: false,
        has_structured_query: false,
    };

    /// Keeps only features enabled in both sets.
    pub fn intersect(self, other: Self) -> Self {
        Self {
            has_fulltext: self.has_fulltext && other.has_fulltext,
            has_structured_query: self.has_structured_query && other.has_structured_query,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::ALL
    }
}

/// Probes the engine for FTS5 and JSON1 support.
///
/// Probe failures are reported as missing features, never as errors.
pub fn probe_capabilities(conn: &Connection) -> Capabilities {
    let capabilities = Capabilities {
        has_fulltext: probe_fulltext(conn),
        has_structured_query: probe_structured_query(conn),
    };
    info!(
        "event=capability_probe module=db status=ok fulltext={} structured_query={}",
        capabilities.has_fulltext, capabilities.has_structured_query
    );
    capabilities
}

fn probe_fulltext(conn: &Connection) -> bool {
    if compile_options(conn)
        .iter()
        .any(|option| option.to_ascii_uppercase().contains("ENABLE_FTS5"))
    {
        return true;
    }

    // Some builds register fts5 without advertising it in compile options.
    match conn.execute_batch(FTS_PROBE_SQL) {
        Ok(()) => true,
        Err(err) => {
            warn!("event=capability_probe module=db status=degraded feature=fts5 error={err}");
            false
        }
    }
}

fn probe_structured_query(conn: &Connection) -> bool {
    match conn.query_row("SELECT json('{}');", [], |row| row.get::<_, String>(0)) {
        Ok(_) => true,
        Err(err) => {
            warn!("event=capability_probe module=db status=degraded feature=json1 error={err}");
            false
        }
    }
}

fn compile_options(conn: &Connection) -> Vec<String> {
    let Ok(mut stmt) = conn.prepare("PRAGMA compile_options;") else {
        return Vec::new();
    };
    let Ok(rows) = stmt.query_map([], |row| row.get::<_, String>(0)) else {
        return Vec::new();
    };
    rows.filter_map(Result::ok).collect()
}
