//! Durable backing for SQLite resource collections.
//!
//! # Responsibility
//! - Hand out connections whose schema holds the `collections` counter table
//!   and the `resources` object table.
//! - Report which database or collection an infrastructure failure concerns.
//!
//! # Invariants
//! - A connection returned by `open_db*` is fully migrated.
//! - Each registered collection owns exactly one `collections` row; its
//!   absence is corruption, not an empty collection.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

/// Location reported for private in-memory databases.
pub const IN_MEMORY_LOCATION: &str = ":memory:";

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    /// The database at `location` could not be opened.
    Open {
        location: String,
        source: rusqlite::Error,
    },
    Sqlite(rusqlite::Error),
    /// The file was written by a newer schema than this build knows.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// The resource-version counter row of a collection is gone.
    MissingCollection { collection: String },
}

impl DbError {
    /// Stable code used in `error_code=` log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Open { .. } => "db_open_failed",
            Self::Sqlite(_) => "db_sqlite_error",
            Self::UnsupportedSchemaVersion { .. } => "db_schema_too_new",
            Self::MissingCollection { .. } => "db_collection_missing",
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { location, source } => {
                write!(f, "cannot open resource database `{location}`: {source}")
            }
            Self::Sqlite(err) => write!(f, "resource database error: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "resource database schema {db_version} is newer than supported {latest_supported}"
            ),
            Self::MissingCollection { collection } => {
                write!(f, "collection `{collection}` has no resource-version row")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::MissingCollection { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
