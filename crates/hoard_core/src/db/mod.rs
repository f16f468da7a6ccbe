//! SQLite storage bootstrap, schema creation and engine capability probing.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the entity store.
//! - Create tables and optional full-text index if they are absent.
//! - Detect FTS5/JSON1 support once per connection.
//!
//! # Invariants
//! - Core code must not read/write entities before schema bootstrap succeeds.
//! - The capability snapshot never changes for the lifetime of a `Database`.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod capabilities;
mod open;
pub mod schema;

pub use capabilities::{probe_capabilities, Capabilities};
pub use open::{open_db, open_db_in_memory, open_db_with_capabilities, Database, DbTarget};

pub type DbResult<T> = Result<T, DbError>;

/// Storage-level failure: engine errors and file-system setup errors.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Io { path, source } => {
                write!(f, "failed to prepare `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
