pub mod database;
pub mod lesson;
pub mod sql;
pub mod user;

use tabled::settings::Style;
use tabled::Table;
use tinker_store::OutputFormat;

/// Print serializable rows in the requested format
///
/// `to_table` is only called for the table formats.
pub(crate) fn print_rows<T, F>(items: &[T], output_format: OutputFormat, to_table: F)
where
    T: serde::Serialize,
    F: FnOnce(&[T]) -> Table,
{
    match output_format.render_json(items) {
        Some(Ok(json)) => println!("{}", json),
        Some(Err(e)) => eprintln!("ERROR: Failed to serialize to JSON: {}", e),
        None => {
            let mut table = to_table(items);
            match output_format {
                OutputFormat::Markdown => println!("{}", table.with(Style::markdown())),
                _ => println!("{}", table.with(Style::rounded())),
            }
        }
    }
}
