#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! tinker-store - SQLite storage for Tinker users and lesson progress
//!
//! tinker-store keeps the users known to the Tinker learning platform and the
//! progress they make through its lessons in a single SQLite file. It can be
//! used as a library or through the `tinker-store` command-line tool.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (none) | Database operations, configuration | `rusqlite`, `r2d2`, `config` |
//! | `display` | Table formatting of records | `tabled` |
//! | `cli` | Command-line binary | All above + `clap`, `tracing-subscriber` |
//!
//! # Architecture
//!
//! - **[`database`]**: All database functionality
//!   - `core`: pooled connections, schema definitions, generic runners
//!   - `tinker`: user and lesson progress repositories
//!   - `error`: the storage error taxonomy
//!
//! - **[`config`]**: Configuration management
//! - **[`utils`]**: Output formatting shared by the CLI
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tinker_store::{TinkerConfig, TinkerDatabase, UserProfile};
//!
//! let config = TinkerConfig::new(&None)?;
//! let db = TinkerDatabase::from_config(&config)?;
//!
//! // First sight of an identity creates the user, later sights refresh it
//! let profile = UserProfile::new().with_first_name("Ada").with_email("ada@example.com");
//! db.users().ensure_user("user_2abc", &profile)?;
//!
//! // Completing a lesson awards its points once
//! db.progress().complete("user_2abc", 1, 10)?;
//!
//! for user in db.users().list()? {
//!     println!("{} has {} points", user.username, user.total_points);
//! }
//! ```

pub mod config;
pub mod database;
pub mod utils;

// =============================================================================
// Configuration
// =============================================================================

pub use config::TinkerConfig;

// =============================================================================
// Database Module - Re-export commonly used types
// =============================================================================

// Primary database type
pub use database::TinkerDatabase;

// Core database types
pub use database::{
    ConnectionProvider, ConnectionSettings, ExecutionResult, Record, SchemaDefinitions,
    SchemaManager, SchemaStatus,
};

// Errors
pub use database::{ConnectionError, StoreError};

// Repositories
pub use database::{
    CompletionOutcome, LessonProgress, LessonProgressRepository, UpsertOutcome, User,
    UserProfile, UserRepository,
};

// Output format
pub use utils::OutputFormat;
