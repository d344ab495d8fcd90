//! Tinker database storage
//!
//! This module provides the persistent database for tinker users and their
//! lesson progress:
//! - Users, keyed by the external identity id
//! - Lesson progress, one row per (user, lesson), removed with its user

mod progress;
mod users;

pub use progress::{CompletionOutcome, LessonProgress, LessonProgressRepository};
pub use users::{UpsertOutcome, User, UserProfile, UserRepository, DEFAULT_USERNAME};

use crate::config::TinkerConfig;
use crate::database::core::{
    ConnectionProvider, ConnectionSettings, ExecutionResult, Record, SchemaDefinitions,
    SchemaManager, SchemaStatus,
};
use crate::database::error::{Result, StoreError};
use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{Params, Row};
use std::path::Path;
use tracing::{error, info};

/// Default database file name inside the data directory
pub const DEFAULT_DATABASE_FILE: &str = "tinker_foss.db";

/// SQL expression for the current UTC time with millisecond precision
pub(crate) const SQL_NOW: &str = "strftime('%Y-%m-%d %H:%M:%f', 'now')";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Read a `DATETIME` column written by SQLite's `CURRENT_TIMESTAMP` or [`SQL_NOW`]
pub(crate) fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let text: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&text, TIMESTAMP_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_optional_timestamp(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<NaiveDateTime>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => parse_timestamp(row, idx).map(Some),
        None => Ok(None),
    }
}

/// Main tinker database (SQLite backend)
///
/// `TinkerDatabase` provides a unified interface to the users and lesson
/// progress tables. It handles:
/// - Connection pooling for the database file
/// - Schema initialization
/// - Access to data repositories and the generic runners
pub struct TinkerDatabase {
    provider: ConnectionProvider,
}

impl TinkerDatabase {
    /// Open the database and make sure its schema exists
    ///
    /// If the file doesn't exist, it will be created and initialized.
    pub fn open(settings: &ConnectionSettings) -> Result<Self> {
        let db = Self::connect(settings)?;

        match db.schema_status()? {
            SchemaStatus::Current => {
                info!("Tinker database schema is current");
            }
            SchemaStatus::NotInitialized => {
                info!("Initializing tinker database schema");
                db.initialize()?;
                db.verify_schema()?;
            }
            SchemaStatus::Incomplete { missing } => {
                info!(
                    "Tinker database schema incomplete (missing: {}), initializing",
                    missing.join(", ")
                );
                db.initialize()?;
                db.verify_schema()?;
            }
        }

        Ok(db)
    }

    /// Fail unless every required table exists
    ///
    /// `CREATE TABLE IF NOT EXISTS` skips a name taken by a view, so a
    /// successful initialization alone doesn't prove the tables are there.
    fn verify_schema(&self) -> Result<()> {
        let missing = match self.schema_status()? {
            SchemaStatus::Current => return Ok(()),
            SchemaStatus::Incomplete { missing } => missing,
            SchemaStatus::NotInitialized => SchemaDefinitions::REQUIRED_TABLES
                .iter()
                .map(|t| t.to_string())
                .collect(),
        };
        error!(
            "Tinker database schema still incomplete (missing: {})",
            missing.join(", ")
        );
        Err(StoreError::SchemaIncomplete { missing })
    }

    /// Open the database without touching its schema
    pub fn connect(settings: &ConnectionSettings) -> Result<Self> {
        let provider = ConnectionProvider::open(settings)?;
        Ok(Self { provider })
    }

    /// Open the database from a data directory
    ///
    /// Uses the standard database file path: `{data_dir}/tinker_foss.db`
    pub fn open_in_dir(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(&ConnectionSettings::new(
            data_dir.as_ref().join(DEFAULT_DATABASE_FILE),
        ))
    }

    /// Like [`open_in_dir`](Self::open_in_dir) but without schema initialization
    pub fn connect_in_dir(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::connect(&ConnectionSettings::new(
            data_dir.as_ref().join(DEFAULT_DATABASE_FILE),
        ))
    }

    /// Open the database described by a loaded configuration
    pub fn from_config(config: &TinkerConfig) -> Result<Self> {
        Self::open(&config.connection_settings())
    }

    /// Create the tables if they don't exist (idempotent)
    pub fn initialize(&self) -> Result<()> {
        self.provider
            .with_connection(|conn| SchemaManager::new(conn).initialize())
    }

    /// Check the current schema status
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        self.provider
            .with_connection(|conn| SchemaManager::new(conn).check_status())
    }

    /// Get the row count for a table
    pub fn table_count(&self, table_name: &str) -> Result<u64> {
        self.provider
            .with_connection(|conn| SchemaManager::new(conn).table_count(table_name))
    }

    /// Run one row-returning statement on a fresh connection
    pub fn query<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Record>> {
        self.provider.query(sql, params)
    }

    /// Run one mutating statement on a fresh connection
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<ExecutionResult> {
        self.provider.execute(sql, params)
    }

    /// Get the user repository
    pub fn users(&self) -> UserRepository<'_> {
        UserRepository::new(&self.provider)
    }

    /// Get the lesson progress repository
    pub fn progress(&self) -> LessonProgressRepository<'_> {
        LessonProgressRepository::new(&self.provider)
    }

    /// Get the underlying connection provider (for advanced use)
    pub fn provider(&self) -> &ConnectionProvider {
        &self.provider
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        self.provider.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;
    use tempfile::TempDir;

    fn create_test_db() -> (TinkerDatabase, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = TinkerDatabase::open_in_dir(dir.path()).unwrap();
        (db, dir)
    }

    #[test]
    fn test_open_initializes_schema() {
        let (db, dir) = create_test_db();

        assert_eq!(db.schema_status().unwrap(), SchemaStatus::Current);
        assert_eq!(db.path(), dir.path().join(DEFAULT_DATABASE_FILE));
        assert_eq!(db.table_count("users").unwrap(), 0);
    }

    #[test]
    fn test_connect_leaves_schema_alone() {
        let dir = TempDir::new().unwrap();
        let db = TinkerDatabase::connect_in_dir(dir.path()).unwrap();

        assert_eq!(db.schema_status().unwrap(), SchemaStatus::NotInitialized);
        db.initialize().unwrap();
        assert_eq!(db.schema_status().unwrap(), SchemaStatus::Current);
    }

    #[test]
    fn test_open_fails_when_view_shadows_table() {
        let dir = TempDir::new().unwrap();
        {
            let db = TinkerDatabase::connect_in_dir(dir.path()).unwrap();
            db.execute("CREATE VIEW users AS SELECT 'x' AS clerk_id", [])
                .unwrap();
        }

        match TinkerDatabase::open_in_dir(dir.path()) {
            Err(StoreError::SchemaIncomplete { missing }) => {
                assert_eq!(missing, vec!["users".to_string()]);
            }
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("expected open to report the missing users table"),
        }
    }

    #[test]
    fn test_initialize_twice_keeps_data() {
        let (db, _dir) = create_test_db();
        db.users()
            .ensure_user("user_1", &UserProfile::new())
            .unwrap();

        db.initialize().unwrap();
        db.initialize().unwrap();

        assert_eq!(db.table_count("users").unwrap(), 1);
    }

    #[test]
    fn test_reopen_existing_file() {
        let dir = TempDir::new().unwrap();
        {
            let db = TinkerDatabase::open_in_dir(dir.path()).unwrap();
            db.users()
            .ensure_user("user_1", &UserProfile::new())
            .unwrap();
        }

        let db = TinkerDatabase::open_in_dir(dir.path()).unwrap();
        assert!(db.users().find("user_1").unwrap().is_some());
    }

    #[test]
    fn test_duplicate_progress_pair_is_rejected() {
        let (db, _dir) = create_test_db();
        db.users()
            .ensure_user("user_1", &UserProfile::new())
            .unwrap();

        let insert = "INSERT INTO lesson_progress (user_id, lesson_id) VALUES (?1, ?2)";
        db.execute(insert, params!["user_1", 7]).unwrap();

        let err = db.execute(insert, params!["user_1", 7]).unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_deleting_user_cascades_to_progress() {
        let (db, _dir) = create_test_db();
        db.users()
            .ensure_user("user_1", &UserProfile::new())
            .unwrap();
        db.users()
            .ensure_user("user_2", &UserProfile::new())
            .unwrap();

        let insert = "INSERT INTO lesson_progress (user_id, lesson_id) VALUES (?1, ?2)";
        db.execute(insert, params!["user_1", 1]).unwrap();
        db.execute(insert, params!["user_1", 2]).unwrap();
        db.execute(insert, params!["user_2", 1]).unwrap();

        let deleted = db
            .execute("DELETE FROM users WHERE clerk_id = ?1", ["user_1"])
            .unwrap();
        assert_eq!(deleted.changes, 1);

        let remaining = db.query("SELECT user_id FROM lesson_progress", []).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].get_str("user_id"), Some("user_2"));
    }

    #[test]
    fn test_progress_for_unknown_user_is_rejected() {
        let (db, _dir) = create_test_db();

        let err = db
            .execute(
                "INSERT INTO lesson_progress (user_id, lesson_id) VALUES (?1, ?2)",
                params!["ghost", 1],
            )
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }
}
