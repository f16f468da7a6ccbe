//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure durability pragmas for immediate-commit writes.
//! - Bootstrap the schema before returning a usable `Database`.
//!
//! # Invariants
//! - File databases run with `journal_mode=WAL` and `synchronous=NORMAL`.
//! - Returned handles carry a capability snapshot computed exactly once.

use super::capabilities::Capabilities;
use super::schema::initialize_schema;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where to open the database.
#[derive(Debug, Clone, Copy)]
pub enum DbTarget<'a> {
    File(&'a Path),
    Memory,
}

impl DbTarget<'_> {
    fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }
}

/// Open store handle: the single connection plus its capability snapshot.
///
/// Held for the whole process; call [`Database::close`] on exit.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
    capabilities: Capabilities,
}

impl Database {
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Closes the connection, reporting any error from the final flush.
    pub fn close(self) -> DbResult<()> {
        match self.conn.close() {
            Ok(()) => {
                info!("event=db_close module=db status=ok");
                Ok(())
            }
            Err((_, err)) => {
                error!("event=db_close module=db status=error error={err}");
                Err(err.into())
            }
        }
    }
}

/// Opens (or creates) a database file with every supported feature enabled.
///
/// # Side effects
/// - Creates the parent directory if it does not exist.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Database> {
    open_db_with_capabilities(DbTarget::File(path.as_ref()), Capabilities::ALL)
}

/// Opens an in-memory database with every supported feature enabled.
pub fn open_db_in_memory() -> DbResult<Database> {
    open_db_with_capabilities(DbTarget::Memory, Capabilities::ALL)
}

/// Opens a database, restricting optional features to `allowed`.
///
/// Used to force degraded search paths regardless of engine support.
pub fn open_db_with_capabilities(target: DbTarget<'_>, allowed: Capabilities) -> DbResult<Database> {
    let started_at = Instant::now();
    let mode = target.mode();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = match connect(target) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err);
        }
    };

    match bootstrap_connection(&mut conn, target, allowed) {
        Ok(capabilities) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={} fulltext={} structured_query={}",
                started_at.elapsed().as_millis(),
                capabilities.has_fulltext,
                capabilities.has_structured_query
            );
            Ok(Database { conn, capabilities })
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn connect(target: DbTarget<'_>) -> DbResult<Connection> {
    match target {
        DbTarget::File(path) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|source| DbError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            Ok(Connection::open(path)?)
        }
        DbTarget::Memory => Ok(Connection::open_in_memory()?),
    }
}

fn bootstrap_connection(
    conn: &mut Connection,
    target: DbTarget<'_>,
    allowed: Capabilities,
) -> DbResult<Capabilities> {
    if let DbTarget::File(_) = target {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    }
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    initialize_schema(conn, allowed)
}
