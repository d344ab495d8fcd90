use clap::{Parser, Subcommand};
use tinker_store::*;
use tracing::Level;

mod commands;

use commands::database::DatabaseCommands;
use commands::lesson::LessonCommands;
use commands::sql::SqlArgs;
use commands::user::UserCommands;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.tinker/tinker.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    /// Output format: table, markdown, json, json-pretty, json-line
    #[clap(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database file and tables if they don't exist
    Init,

    /// Show configuration and database status
    Status,

    /// Run a row-returning SQL statement with bound parameters
    Query(SqlArgs),

    /// Run a mutating SQL statement with bound parameters
    Exec(SqlArgs),

    /// Manage users
    #[clap(subcommand)]
    User(UserCommands),

    /// Manage lesson progress
    #[clap(subcommand)]
    Lesson(LessonCommands),
}

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            // filter spans/events with level INFO or higher.
            .with_max_level(Level::INFO)
            .init();
    }

    let config = match TinkerConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let format = cli.format;
    let result = match cli.command {
        Commands::Init => commands::database::run(&config, DatabaseCommands::Init, format),
        Commands::Status => commands::database::run(&config, DatabaseCommands::Status, format),
        Commands::Query(args) => commands::sql::run_query(&config, args, format),
        Commands::Exec(args) => commands::sql::run_exec(&config, args, format),
        Commands::User(cmd) => commands::user::run(&config, cmd, format),
        Commands::Lesson(cmd) => commands::lesson::run(&config, cmd, format),
    };

    if let Err(e) = result {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }
}
