use anyhow::Result;
use serde::Serialize;
use tabled::{Table, Tabled};
use tinker_store::{SchemaStatus, TinkerConfig, TinkerDatabase};

use super::print_rows;
use tinker_store::OutputFormat;

/// Database subcommands
pub enum DatabaseCommands {
    /// Create the database file and tables
    Init,
    /// Show configuration and database status
    Status,
}

#[derive(Debug, Serialize, Tabled)]
struct DatabaseStatus {
    path: String,
    exists: bool,
    size_bytes: u64,
    schema: String,
    users: u64,
    lesson_progress: u64,
}

pub fn run(
    config: &TinkerConfig,
    command: DatabaseCommands,
    output_format: OutputFormat,
) -> Result<()> {
    match command {
        DatabaseCommands::Init => run_init(config, output_format),
        DatabaseCommands::Status => run_status(config, output_format),
    }
}

fn run_init(config: &TinkerConfig, output_format: OutputFormat) -> Result<()> {
    let db = TinkerDatabase::connect(&config.connection_settings())?;
    db.initialize()?;

    if output_format.is_json() {
        println!(
            "{}",
            serde_json::json!({"path": db.path(), "initialized": true})
        );
    } else {
        println!("Initialized database at {}", db.path().display());
    }
    Ok(())
}

fn run_status(config: &TinkerConfig, output_format: OutputFormat) -> Result<()> {
    let path = config.sqlite_path();
    let exists = path.exists();
    let size_bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

    let (schema, users, lesson_progress) = if exists {
        let db = TinkerDatabase::connect(&config.connection_settings())?;
        let status = db.schema_status()?;
        let counts = if status == SchemaStatus::Current {
            (db.table_count("users")?, db.table_count("lesson_progress")?)
        } else {
            (0, 0)
        };
        (status.to_string(), counts.0, counts.1)
    } else {
        (SchemaStatus::NotInitialized.to_string(), 0, 0)
    };

    if !output_format.is_json() {
        println!("{}\n", config.summary());
    }

    let status = DatabaseStatus {
        path: path.display().to_string(),
        exists,
        size_bytes,
        schema,
        users,
        lesson_progress,
    };
    print_rows(&[status], output_format, |rows| Table::new(rows));
    Ok(())
}
