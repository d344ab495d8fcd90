//! Lesson Tracking Example
//!
//! This example walks through the storage layer end to end: opening a
//! database, upserting users from identity-provider profiles, recording lesson
//! progress, and running ad-hoc queries with the generic runners.
//!
//! # Running
//!
//! ```bash
//! cargo run --example lesson_tracking
//! ```

use tempfile::TempDir;
use tinker_store::{CompletionOutcome, TinkerDatabase, UserProfile};

fn main() -> anyhow::Result<()> {
    println!("=== tinker-store Lesson Tracking Example ===\n");

    // Removed with its contents when `dir` goes out of scope
    let dir = TempDir::new()?;

    // Example 1: Open (and initialize) a database in a data directory
    println!("1. Opening database:");
    let db = TinkerDatabase::open_in_dir(dir.path())?;
    println!("   Database at {}", db.path().display());
    println!("   Schema: {}", db.schema_status()?);

    // Example 2: Upsert users from identity-provider objects
    println!("\n2. Ensuring users exist:");
    let ada: UserProfile = serde_json::from_str(
        r#"{"id": "user_ada", "username": "ada", "email": "ada@example.com"}"#,
    )?;
    let grace = UserProfile::new().with_first_name("Grace");
    println!("   user_ada: {:?}", db.users().ensure_user("user_ada", &ada)?);
    println!("   user_grace: {:?}", db.users().ensure_user("user_grace", &grace)?);
    println!("   user_ada again: {:?}", db.users().ensure_user("user_ada", &ada)?);

    // Example 3: Lesson progress
    println!("\n3. Recording lesson progress:");
    db.progress().start("user_ada", 1)?;
    for (lesson, points) in [(1, 10), (2, 15), (1, 10)] {
        match db.progress().complete("user_ada", lesson, points)? {
            CompletionOutcome::Completed { points_awarded } => {
                println!("   lesson {}: +{} points", lesson, points_awarded)
            }
            CompletionOutcome::AlreadyCompleted => {
                println!("   lesson {}: already completed", lesson)
            }
        }
    }

    // Example 4: Generic runners
    println!("\n4. Querying with bound parameters:");
    let rows = db.query(
        "SELECT username, total_points FROM users WHERE total_points >= ?1 ORDER BY username",
        [0],
    )?;
    for row in &rows {
        println!("   {}", row.to_json());
    }

    // Example 5: Cascade delete
    println!("\n5. Deleting a user removes their progress:");
    db.execute("DELETE FROM users WHERE clerk_id = ?1", ["user_ada"])?;
    println!(
        "   remaining progress rows: {}",
        db.table_count("lesson_progress")?
    );

    println!("\n=== Example Complete ===");
    Ok(())
}
