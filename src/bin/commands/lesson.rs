use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use tabled::{Table, Tabled};
use tinker_store::{CompletionOutcome, LessonProgress, OutputFormat, TinkerConfig, TinkerDatabase};

use super::print_rows;

/// Lesson progress subcommands
#[derive(Subcommand)]
pub enum LessonCommands {
    /// Record that a user started a lesson
    Start {
        #[clap(value_name = "USER")]
        user: String,

        #[clap(value_name = "LESSON")]
        lesson: i64,
    },

    /// Mark a lesson completed and award its points
    Complete {
        #[clap(value_name = "USER")]
        user: String,

        #[clap(value_name = "LESSON")]
        lesson: i64,

        /// Points earned for the lesson
        #[clap(long, short, default_value_t = 0)]
        points: u32,
    },

    /// List a user's lesson progress
    List {
        #[clap(value_name = "USER")]
        user: String,
    },
}

#[derive(Serialize, Tabled)]
struct ProgressRow {
    lesson: i64,
    completed: bool,
    points: i64,
    completed_at: String,
    started_at: String,
}

impl From<&LessonProgress> for ProgressRow {
    fn from(p: &LessonProgress) -> Self {
        ProgressRow {
            lesson: p.lesson_id,
            completed: p.completed,
            points: p.points_earned,
            completed_at: p
                .completed_at
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
            started_at: p.created_at.to_string(),
        }
    }
}

pub fn run(
    config: &TinkerConfig,
    command: LessonCommands,
    output_format: OutputFormat,
) -> Result<()> {
    let db = TinkerDatabase::from_config(config)?;
    let progress = db.progress();

    match command {
        LessonCommands::Start { user, lesson } => {
            let id = progress.start(&user, lesson)?;
            if output_format.is_json() {
                println!("{}", serde_json::json!({"id": id, "user": user, "lesson": lesson}));
            } else {
                println!("{} started lesson {}", user, lesson);
            }
        }
        LessonCommands::Complete {
            user,
            lesson,
            points,
        } => {
            let outcome = progress.complete(&user, lesson, points)?;
            if output_format.is_json() {
                println!("{}", serde_json::to_string(&outcome)?);
            } else {
                match outcome {
                    CompletionOutcome::Completed { points_awarded } => {
                        println!(
                            "{} completed lesson {} (+{} points)",
                            user, lesson, points_awarded
                        )
                    }
                    CompletionOutcome::AlreadyCompleted => {
                        println!("{} had already completed lesson {}", user, lesson)
                    }
                }
            }
        }
        LessonCommands::List { user } => {
            let rows: Vec<ProgressRow> = progress
                .for_user(&user)?
                .iter()
                .map(ProgressRow::from)
                .collect();
            print_rows(&rows, output_format, |rows| Table::new(rows));
        }
    }
    Ok(())
}
