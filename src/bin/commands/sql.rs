use anyhow::Result;
use clap::Args;
use tinker_store::utils::records_table;
use tinker_store::{OutputFormat, TinkerConfig, TinkerDatabase};

use super::print_rows;

/// Arguments for the query and exec commands
#[derive(Args)]
pub struct SqlArgs {
    /// SQL statement, using ?1, ?2, ... placeholders
    #[clap()]
    pub sql: String,

    /// Values bound to the placeholders, in order
    #[clap()]
    pub params: Vec<String>,
}

pub fn run_query(config: &TinkerConfig, args: SqlArgs, output_format: OutputFormat) -> Result<()> {
    let db = TinkerDatabase::from_config(config)?;
    let records = db.query(&args.sql, rusqlite::params_from_iter(args.params.iter()))?;

    if records.is_empty() && !output_format.is_json() {
        println!("(no rows)");
        return Ok(());
    }

    print_rows(&records, output_format, records_table);
    Ok(())
}

pub fn run_exec(config: &TinkerConfig, args: SqlArgs, output_format: OutputFormat) -> Result<()> {
    let db = TinkerDatabase::from_config(config)?;
    let result = db.execute(&args.sql, rusqlite::params_from_iter(args.params.iter()))?;

    if output_format.is_json() {
        println!("{}", serde_json::to_string(&result)?);
    } else {
        println!(
            "{} row(s) changed, last insert rowid {}",
            result.changes, result.last_insert_rowid
        );
    }
    Ok(())
}
