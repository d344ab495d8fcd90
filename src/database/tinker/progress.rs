//! Lesson progress repository
//!
//! Tracks which lessons each user has started and completed. Completing a
//! lesson for the first time adds its points to the user's total.

use crate::database::core::{execute_with, query_failed, query_with, ConnectionProvider};
use crate::database::error::{Result, StoreError};
use crate::database::tinker::{parse_optional_timestamp, parse_timestamp, SQL_NOW};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use tracing::{error, info};

/// Progress of one user on one lesson
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonProgress {
    pub id: i64,
    pub user_id: String,
    pub lesson_id: i64,
    pub completed: bool,
    pub points_earned: i64,
    pub completed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl LessonProgress {
    const COLUMNS: &'static str =
        "id, user_id, lesson_id, completed, points_earned, completed_at, created_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(LessonProgress {
            id: row.get(0)?,
            user_id: row.get(1)?,
            lesson_id: row.get(2)?,
            completed: row.get::<_, Option<bool>>(3)?.unwrap_or(false),
            points_earned: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
            completed_at: parse_optional_timestamp(row, 5)?,
            created_at: parse_timestamp(row, 6)?,
        })
    }
}

/// What `complete` did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum CompletionOutcome {
    /// The lesson was marked completed and its points were awarded
    Completed { points_awarded: i64 },
    /// The lesson had been completed before; nothing changed
    AlreadyCompleted,
}

/// Repository for lesson progress operations
pub struct LessonProgressRepository<'a> {
    provider: &'a ConnectionProvider,
}

impl<'a> LessonProgressRepository<'a> {
    /// Create a new lesson progress repository
    pub fn new(provider: &'a ConnectionProvider) -> Self {
        Self { provider }
    }

    /// Record that a user started a lesson
    ///
    /// Returns the id of the new progress row. Starting the same lesson twice
    /// fails with a constraint violation, as does an unknown user.
    pub fn start(&self, user_id: &str, lesson_id: i64) -> Result<i64> {
        self.provider
            .execute(
                "INSERT INTO lesson_progress (user_id, lesson_id) VALUES (?1, ?2)",
                params![user_id, lesson_id],
            )
            .map(|result| result.last_insert_rowid)
            .map_err(|source| progress_error(user_id, lesson_id, source))
    }

    /// Mark a lesson completed and award its points
    ///
    /// Creates the progress row if the lesson was never started. Points are
    /// added to the user's total only the first time the lesson is completed.
    pub fn complete(
        &self,
        user_id: &str,
        lesson_id: i64,
        points: u32,
    ) -> Result<CompletionOutcome> {
        self.provider
            .with_connection(|conn| complete_lesson(conn, user_id, lesson_id, points))
            .map_err(|source| progress_error(user_id, lesson_id, source))
    }

    /// Progress of a user on one lesson
    pub fn get(&self, user_id: &str, lesson_id: i64) -> Result<Option<LessonProgress>> {
        let sql = format!(
            "SELECT {} FROM lesson_progress WHERE user_id = ?1 AND lesson_id = ?2",
            LessonProgress::COLUMNS
        );
        self.provider.with_connection(|conn| {
            conn.query_row(&sql, params![user_id, lesson_id], LessonProgress::from_row)
                .optional()
                .map_err(|source| query_failed(&sql, source))
        })
    }

    /// All progress rows of a user, ordered by lesson
    pub fn for_user(&self, user_id: &str) -> Result<Vec<LessonProgress>> {
        let sql = format!(
            "SELECT {} FROM lesson_progress WHERE user_id = ?1 ORDER BY lesson_id",
            LessonProgress::COLUMNS
        );
        self.provider.with_connection(|conn| {
            let to_err = |source| query_failed(&sql, source);
            let mut stmt = conn.prepare(&sql).map_err(to_err)?;
            let rows = stmt
                .query_map([user_id], LessonProgress::from_row)
                .map_err(to_err)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(to_err)
        })
    }

    /// Number of lessons a user has completed
    pub fn completed_count(&self, user_id: &str) -> Result<u64> {
        let rows = self.provider.query(
            "SELECT COUNT(*) AS n FROM lesson_progress WHERE user_id = ?1 AND completed",
            [user_id],
        )?;
        Ok(rows
            .first()
            .and_then(|r| r.get_i64("n"))
            .unwrap_or(0)
            .max(0) as u64)
    }
}

fn progress_error(user_id: &str, lesson_id: i64, source: StoreError) -> StoreError {
    error!(
        "Error recording progress of lesson {} for {}: {}",
        lesson_id, user_id, source
    );
    StoreError::Progress {
        user_id: user_id.to_string(),
        lesson_id,
        source: Box::new(source),
    }
}

fn complete_lesson(
    conn: &mut Connection,
    user_id: &str,
    lesson_id: i64,
    points: u32,
) -> Result<CompletionOutcome> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|source| StoreError::Transaction { source })?;

    let existing = query_with(
        &tx,
        "SELECT completed FROM lesson_progress WHERE user_id = ?1 AND lesson_id = ?2",
        params![user_id, lesson_id],
    )?;
    let already_completed = existing
        .first()
        .and_then(|r| r.get_i64("completed"))
        .is_some_and(|c| c != 0);

    if already_completed {
        return Ok(CompletionOutcome::AlreadyCompleted);
    }

    let upsert = format!(
        "INSERT INTO lesson_progress (user_id, lesson_id, completed, points_earned, completed_at)
         VALUES (?1, ?2, TRUE, ?3, {now})
         ON CONFLICT(user_id, lesson_id) DO UPDATE SET
             completed = TRUE,
             points_earned = excluded.points_earned,
             completed_at = excluded.completed_at",
        now = SQL_NOW
    );
    execute_with(&tx, &upsert, params![user_id, lesson_id, points])?;

    execute_with(
        &tx,
        "UPDATE users SET total_points = COALESCE(total_points, 0) + ?1 WHERE clerk_id = ?2",
        params![points, user_id],
    )?;

    tx.commit()
        .map_err(|source| StoreError::Transaction { source })?;

    info!(
        "User {} completed lesson {} (+{} points)",
        user_id, lesson_id, points
    );
    Ok(CompletionOutcome::Completed {
        points_awarded: i64::from(points),
    })
}
