//! User repository
//!
//! Users are keyed by the id issued by the upstream identity provider. The
//! repository creates a user the first time that id is seen and refreshes the
//! profile fields every time after.

use crate::database::core::{execute_with, query_failed, query_with, ConnectionProvider};
use crate::database::error::{Result, StoreError};
use crate::database::tinker::{parse_timestamp, SQL_NOW};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Username stored when the profile carries neither a username nor a first name
pub const DEFAULT_USERNAME: &str = "User";

/// Profile fields supplied by the identity provider
///
/// Every field is optional; empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl UserProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_first_name(mut self, first_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Username, else first name, else [`DEFAULT_USERNAME`]
    pub fn display_name(&self) -> &str {
        non_empty(&self.username)
            .or_else(|| non_empty(&self.first_name))
            .unwrap_or(DEFAULT_USERNAME)
    }

    pub fn email_or_default(&self) -> &str {
        non_empty(&self.email).unwrap_or("")
    }

    pub fn avatar_or_default(&self) -> &str {
        non_empty(&self.image_url).unwrap_or("")
    }
}

/// A stored user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    /// External identity id (`clerk_id` column)
    pub external_id: String,
    pub username: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub total_points: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    const COLUMNS: &'static str =
        "id, clerk_id, username, email, avatar_url, total_points, created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            external_id: row.get(1)?,
            username: row.get(2)?,
            email: row.get(3)?,
            avatar_url: row.get(4)?,
            total_points: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
            created_at: parse_timestamp(row, 6)?,
            updated_at: parse_timestamp(row, 7)?,
        })
    }
}

/// What `ensure_user` did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    /// No user had this external id; a row was inserted
    Created,
    /// The existing row's profile fields were refreshed
    Updated,
}

/// Repository for user operations
pub struct UserRepository<'a> {
    provider: &'a ConnectionProvider,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository
    pub fn new(provider: &'a ConnectionProvider) -> Self {
        Self { provider }
    }

    /// Insert the user if absent, otherwise refresh its profile fields
    ///
    /// The lookup and the write run in one immediate transaction, so concurrent
    /// calls for the same id serialize: one of them inserts, the others update.
    /// Points and the creation timestamp of an existing user are never touched.
    pub fn ensure_user(&self, external_id: &str, profile: &UserProfile) -> Result<UpsertOutcome> {
        self.provider
            .with_connection(|conn| upsert_user(conn, external_id, profile))
            .map_err(|source| {
                error!("Error ensuring user exists: {}", source);
                StoreError::Upsert {
                    external_id: external_id.to_string(),
                    source: Box::new(source),
                }
            })
    }

    /// Find a user by external identity id
    pub fn find(&self, external_id: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE clerk_id = ?1", User::COLUMNS);
        self.provider.with_connection(|conn| {
            conn.query_row(&sql, [external_id], User::from_row)
                .optional()
                .map_err(|source| query_failed(&sql, source))
        })
    }

    /// List all users, oldest first
    pub fn list(&self) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY created_at, clerk_id",
            User::COLUMNS
        );
        self.provider.with_connection(|conn| {
            let to_err = |source| query_failed(&sql, source);
            let mut stmt = conn.prepare(&sql).map_err(to_err)?;
            let rows = stmt.query_map([], User::from_row).map_err(to_err)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(to_err)
        })
    }

    /// Number of stored users
    pub fn count(&self) -> Result<u64> {
        let rows = self.provider.query("SELECT COUNT(*) AS n FROM users", [])?;
        Ok(rows
            .first()
            .and_then(|r| r.get_i64("n"))
            .unwrap_or(0)
            .max(0) as u64)
    }
}

fn upsert_user(
    conn: &mut Connection,
    external_id: &str,
    profile: &UserProfile,
) -> Result<UpsertOutcome> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|source| StoreError::Transaction { source })?;

    let existing = query_with(&tx, "SELECT * FROM users WHERE clerk_id = ?1", [external_id])?;

    let outcome = if existing.is_empty() {
        execute_with(
            &tx,
            "INSERT INTO users (id, clerk_id, username, email, avatar_url) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                external_id,
                external_id,
                profile.display_name(),
                profile.email_or_default(),
                profile.avatar_or_default(),
            ],
        )?;
        UpsertOutcome::Created
    } else {
        let sql = format!(
            "UPDATE users SET username = ?1, email = ?2, avatar_url = ?3, updated_at = {} WHERE clerk_id = ?4",
            SQL_NOW
        );
        execute_with(
            &tx,
            &sql,
            params![
                profile.display_name(),
                profile.email_or_default(),
                profile.avatar_or_default(),
                external_id,
            ],
        )?;
        UpsertOutcome::Updated
    };

    tx.commit()
        .map_err(|source| StoreError::Transaction { source })?;

    if outcome == UpsertOutcome::Created {
        info!("Created new user in database: {}", external_id);
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::testing::capture_errors;
    use crate::database::tinker::TinkerDatabase;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    fn create_test_db() -> (TinkerDatabase, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = TinkerDatabase::open_in_dir(dir.path()).unwrap();
        (db, dir)
    }

    fn ada() -> UserProfile {
        UserProfile::new()
            .with_username("Ada")
            .with_email("a@x.com")
            .with_image_url("u")
    }

    #[test]
    fn test_profile_fallbacks() {
        let empty = UserProfile::new();
        assert_eq!(empty.display_name(), "User");
        assert_eq!(empty.email_or_default(), "");
        assert_eq!(empty.avatar_or_default(), "");

        let first_only = UserProfile::new().with_first_name("Grace");
        assert_eq!(first_only.display_name(), "Grace");

        let blank_username = UserProfile::new().with_username("").with_first_name("Grace");
        assert_eq!(blank_username.display_name(), "Grace");

        assert_eq!(ada().display_name(), "Ada");
    }

    #[test]
    fn test_profile_deserializes_identity_object() {
        let profile: UserProfile = serde_json::from_str(
            r#"{"id": "user_1", "firstName": "Grace", "imageUrl": "https://img/x.png"}"#,
        )
        .unwrap();
        assert_eq!(profile.first_name.as_deref(), Some("Grace"));
        assert_eq!(profile.image_url.as_deref(), Some("https://img/x.png"));
        assert_eq!(profile.username, None);
    }

    #[test]
    fn test_ensure_user_creates_row() {
        let (db, _dir) = create_test_db();
        let users = db.users();

        let outcome = users.ensure_user("user_ada", &ada()).unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);

        let user = users.find("user_ada").unwrap().unwrap();
        assert_eq!(user.id, "user_ada");
        assert_eq!(user.external_id, "user_ada");
        assert_eq!(user.username, "Ada");
        assert_eq!(user.email.as_deref(), Some("a@x.com"));
        assert_eq!(user.avatar_url.as_deref(), Some("u"));
        assert_eq!(user.total_points, 0);
        assert_eq!(users.count().unwrap(), 1);
    }

    #[test]
    fn test_ensure_user_defaults_missing_fields() {
        let (db, _dir) = create_test_db();
        let users = db.users();

        users.ensure_user("user_anon", &UserProfile::new()).unwrap();

        let user = users.find("user_anon").unwrap().unwrap();
        assert_eq!(user.username, "User");
        assert_eq!(user.email.as_deref(), Some(""));
        assert_eq!(user.avatar_url.as_deref(), Some(""));
    }

    #[test]
    fn test_ensure_user_updates_in_place() {
        let (db, _dir) = create_test_db();
        let users = db.users();

        users.ensure_user("user_ada", &ada()).unwrap();
        db.execute(
            "UPDATE users SET total_points = 42 WHERE clerk_id = ?1",
            ["user_ada"],
        )
        .unwrap();
        let before = users.find("user_ada").unwrap().unwrap();

        thread::sleep(std::time::Duration::from_millis(20));
        let outcome = users
            .ensure_user("user_ada", &ada().with_username("Countess"))
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);

        let after = users.find("user_ada").unwrap().unwrap();
        assert_eq!(after.username, "Countess");
        assert_eq!(after.total_points, 42);
        assert_eq!(after.created_at, before.created_at);
        assert_ne!(after.updated_at, before.updated_at);
        assert!(after.updated_at > before.updated_at);
        assert_eq!(users.count().unwrap(), 1);
    }

    #[test]
    fn test_find_missing_user() {
        let (db, _dir) = create_test_db();
        assert!(db.users().find("nobody").unwrap().is_none());
    }

    #[test]
    fn test_list_users() {
        let (db, _dir) = create_test_db();
        let users = db.users();
        users.ensure_user("b", &UserProfile::new()).unwrap();
        users.ensure_user("a", &UserProfile::new()).unwrap();

        let listed = users.list().unwrap();
        assert_eq!(listed.len(), 2);
        let mut ids: Vec<_> = listed.into_iter().map(|u| u.external_id).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_ensure_user_without_schema_fails_as_upsert_error() {
        let dir = TempDir::new().unwrap();
        let db = TinkerDatabase::connect_in_dir(dir.path()).unwrap();

        let err = db.users().ensure_user("user_1", &ada()).unwrap_err();
        match err {
            StoreError::Upsert {
                external_id,
                source,
            } => {
                assert_eq!(external_id, "user_1");
                assert!(matches!(*source, StoreError::Query { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_lookups_without_schema_log_failure() {
        let dir = TempDir::new().unwrap();
        let db = TinkerDatabase::connect_in_dir(dir.path()).unwrap();
        let users = db.users();

        let (found, logs) = capture_errors(|| users.find("user_1"));
        assert!(matches!(found, Err(StoreError::Query { .. })));
        assert!(logs.contains("ERROR"));
        assert!(logs.contains("no such table: users"));

        let (listed, logs) = capture_errors(|| users.list());
        assert!(matches!(listed, Err(StoreError::Query { .. })));
        assert!(logs.contains("no such table: users"));
    }

    #[test]
    fn test_concurrent_ensure_user_keeps_single_row() {
        let (db, _dir) = create_test_db();
        let db = Arc::new(db);
        let workers = 8;
        let barrier = Arc::new(Barrier::new(workers));

        let handles: Vec<_> = (0..workers)
            .map(|i| {
                let db = Arc::clone(&db);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let profile = UserProfile::new().with_username(format!("racer-{i}"));
                    barrier.wait();
                    db.users().ensure_user("user_race", &profile)
                })
            })
            .collect();

        let outcomes: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();

        let created = outcomes
            .iter()
            .filter(|o| **o == UpsertOutcome::Created)
            .count();
        assert_eq!(created, 1);
        assert_eq!(db.users().count().unwrap(), 1);

        let user = db.users().find("user_race").unwrap().unwrap();
        assert!(user.username.starts_with("racer-"));
    }
}
