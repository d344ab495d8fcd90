//! Database module
//!
//! This module provides all database functionality for tinker-store, organized into:
//!
//! - **core**: Core database infrastructure (pooled connections, schema, runners)
//! - **tinker**: The tinker database of users and lesson progress
//! - **error**: The error taxonomy shared by both
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── connection  # r2d2 pool over one SQLite file, scoped acquisition
//! │   ├── schema      # Table definitions and SchemaManager
//! │   └── runner      # Generic query / execute runners
//! │
//! ├── tinker/         # Persistent storage
//! │   ├── users       # Users keyed by external identity id, upsert
//! │   └── progress    # Lesson progress and point awards
//! │
//! └── error           # StoreError / ConnectionError
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use tinker_store::database::{TinkerDatabase, UserProfile};
//!
//! // Open the database, creating the file and tables if needed
//! let db = TinkerDatabase::open_in_dir("./data")?;
//!
//! // Upsert a user coming from the identity provider
//! let profile = UserProfile::new().with_username("ada").with_email("ada@example.com");
//! db.users().ensure_user("user_2abc", &profile)?;
//!
//! // Record progress
//! db.progress().complete("user_2abc", 1, 10)?;
//!
//! // Generic runners with bound parameters
//! let sql = "SELECT username, total_points FROM users WHERE clerk_id = ?1";
//! let rows = db.query(sql, ["user_2abc"])?;
//! ```

pub mod core;
pub mod error;
pub mod tinker;

#[cfg(test)]
pub(crate) mod testing;

// Connection, schema, and runner types
pub use core::{
    execute_with, query_with, ConnectionProvider, ConnectionSettings, ExecutionResult, PoolState,
    PooledConnection, Record, SchemaDefinitions, SchemaManager, SchemaStatus,
};

// Errors
pub use error::{ConnectionError, Result, StoreError};

// Tinker database and repositories
pub use tinker::{
    CompletionOutcome, LessonProgress, LessonProgressRepository, TinkerDatabase, UpsertOutcome,
    User, UserProfile, UserRepository, DEFAULT_DATABASE_FILE, DEFAULT_USERNAME,
};
