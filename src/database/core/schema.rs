//! Database schema management
//!
//! This module provides the table definitions for the users and lesson
//! progress tables and a manager that creates them idempotently.

use super::runner::query_failed;
use crate::database::error::{Result, StoreError};
use rusqlite::Connection;
use tracing::{error, info};

/// Schema definitions for all tables in the database
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// SQL for creating the users table
    ///
    /// `clerk_id` holds the external identity id; `id` mirrors it.
    pub const USERS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            clerk_id TEXT UNIQUE NOT NULL,
            username TEXT NOT NULL,
            email TEXT,
            avatar_url TEXT,
            total_points INTEGER DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#;

    /// SQL for creating the lesson progress table
    pub const LESSON_PROGRESS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS lesson_progress (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            lesson_id INTEGER NOT NULL,
            completed BOOLEAN DEFAULT FALSE,
            points_earned INTEGER DEFAULT 0,
            completed_at DATETIME NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (user_id) REFERENCES users(clerk_id) ON DELETE CASCADE,
            UNIQUE(user_id, lesson_id)
        );
    "#;

    /// SQL for creating indexes
    pub const INDEXES: &'static [&'static str] = &[
        "CREATE INDEX IF NOT EXISTS idx_lesson_progress_user ON lesson_progress(user_id)",
    ];

    /// Tables that must exist for the schema to be usable, in creation order
    pub const REQUIRED_TABLES: &'static [&'static str] = &["users", "lesson_progress"];
}

/// Schema manager for the database
///
/// Handles schema initialization and status checks.
pub struct SchemaManager<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaManager<'a> {
    /// Create a new schema manager for the given connection
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Initialize the database schema
    ///
    /// Enables foreign keys, then creates the users table, the lesson progress
    /// table, and their indexes if they don't exist. Existing tables and rows
    /// are left untouched, so this is safe to call repeatedly.
    pub fn initialize(&self) -> Result<()> {
        self.run_ddl("foreign key enforcement", "PRAGMA foreign_keys = ON")?;

        self.run_ddl("users table", SchemaDefinitions::USERS_TABLE)?;
        self.run_ddl(
            "lesson_progress table",
            SchemaDefinitions::LESSON_PROGRESS_TABLE,
        )?;

        for index_sql in SchemaDefinitions::INDEXES {
            self.run_ddl("lesson_progress index", index_sql)?;
        }

        info!("Database tables created successfully");
        Ok(())
    }

    fn run_ddl(&self, object: &'static str, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql).map_err(|source| {
            error!("Error creating {}: {}", object, source);
            StoreError::Schema { object, source }
        })
    }

    /// Check the current schema status
    pub fn check_status(&self) -> Result<SchemaStatus> {
        let mut missing = Vec::new();
        for table in SchemaDefinitions::REQUIRED_TABLES {
            if !self.table_exists(table)? {
                missing.push(table.to_string());
            }
        }

        if missing.is_empty() {
            Ok(SchemaStatus::Current)
        } else if missing.len() == SchemaDefinitions::REQUIRED_TABLES.len() {
            Ok(SchemaStatus::NotInitialized)
        } else {
            Ok(SchemaStatus::Incomplete { missing })
        }
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        const SQL: &str = "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1";
        let count: i64 = self
            .conn
            .query_row(SQL, [table_name], |row| row.get(0))
            .map_err(|source| query_failed(SQL, source))?;
        Ok(count > 0)
    }

    /// Get the row count for a table
    pub fn table_count(&self, table_name: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", table_name.replace('"', "\"\""));
        let count: i64 = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|source| query_failed(&sql, source))?;
        Ok(count.max(0) as u64)
    }

    /// Get the stored `CREATE TABLE` text for a table
    pub fn table_sql(&self, table_name: &str) -> Result<Option<String>> {
        const SQL: &str = "SELECT sql FROM sqlite_master WHERE type='table' AND name=?1";
        match self.conn.query_row(SQL, [table_name], |row| row.get(0)) {
            Ok(sql) => Ok(Some(sql)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(source) => Err(query_failed(SQL, source)),
        }
    }
}

/// Status of the database schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    /// Database is not initialized (fresh database)
    NotInitialized,

    /// Some but not all required tables exist
    Incomplete { missing: Vec<String> },

    /// All required tables exist
    Current,
}

impl std::fmt::Display for SchemaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaStatus::NotInitialized => write!(f, "not initialized"),
            SchemaStatus::Incomplete { missing } => {
                write!(f, "incomplete (missing: {})", missing.join(", "))
            }
            SchemaStatus::Current => write!(f, "current"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::testing::capture_errors;
    use rusqlite::Connection;

    fn create_test_db() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    fn all_table_sql(conn: &Connection) -> Vec<(String, Option<String>)> {
        let mut stmt = conn
            .prepare("SELECT name, sql FROM sqlite_master ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn test_schema_not_initialized() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        assert_eq!(
            manager.check_status().unwrap(),
            SchemaStatus::NotInitialized
        );
    }

    #[test]
    fn test_schema_initialize() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        manager.initialize().unwrap();

        assert_eq!(manager.check_status().unwrap(), SchemaStatus::Current);
        assert!(manager.table_exists("users").unwrap());
        assert!(manager.table_exists("lesson_progress").unwrap());
    }

    #[test]
    fn test_schema_initialize_is_idempotent() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        manager.initialize().unwrap();
        let first = all_table_sql(&conn);

        conn.execute(
            "INSERT INTO users (id, clerk_id, username) VALUES ('u1', 'u1', 'Ada')",
            [],
        )
        .unwrap();

        manager.initialize().unwrap();
        let second = all_table_sql(&conn);

        assert_eq!(first, second);
        assert_eq!(manager.table_count("users").unwrap(), 1);
    }

    #[test]
    fn test_schema_initialize_enables_foreign_keys() {
        let conn = create_test_db();
        SchemaManager::new(&conn).initialize().unwrap();

        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_schema_incomplete() {
        let conn = create_test_db();
        conn.execute_batch(SchemaDefinitions::USERS_TABLE).unwrap();

        let manager = SchemaManager::new(&conn);
        assert_eq!(
            manager.check_status().unwrap(),
            SchemaStatus::Incomplete {
                missing: vec!["lesson_progress".to_string()]
            }
        );
    }

    #[test]
    fn test_table_sql() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);
        manager.initialize().unwrap();

        let sql = manager.table_sql("lesson_progress").unwrap().unwrap();
        assert!(sql.contains("ON DELETE CASCADE"));
        assert!(manager.table_sql("nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_initialize_stops_at_failing_table() {
        let conn = create_test_db();
        conn.execute_batch("CREATE TABLE t(x); CREATE INDEX users ON t(x);")
            .unwrap();
        let manager = SchemaManager::new(&conn);

        let (result, logs) = capture_errors(|| manager.initialize());

        match result {
            Err(StoreError::Schema { object, .. }) => assert_eq!(object, "users table"),
            other => panic!("expected schema error, got {other:?}"),
        }
        assert!(logs.contains("Error creating users table"));
        assert!(!manager.table_exists("lesson_progress").unwrap());
    }

    #[test]
    fn test_table_count_of_missing_table_logs_failure() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        let (count, logs) = capture_errors(|| manager.table_count("users"));

        assert!(matches!(count, Err(StoreError::Query { .. })));
        assert!(logs.contains("no such table: users"));
    }
}
