use anyhow::{anyhow, Result};
use clap::Subcommand;
use serde::Serialize;
use tabled::{Table, Tabled};
use tinker_store::{OutputFormat, TinkerConfig, TinkerDatabase, User, UserProfile};

use super::print_rows;

/// User subcommands
#[derive(Subcommand)]
pub enum UserCommands {
    /// Create the user if absent, otherwise refresh its profile
    Ensure {
        /// External identity id
        #[clap(value_name = "ID")]
        id: String,

        #[clap(long)]
        username: Option<String>,

        #[clap(long)]
        first_name: Option<String>,

        #[clap(long)]
        email: Option<String>,

        #[clap(long)]
        image_url: Option<String>,
    },

    /// Show one user
    Show {
        /// External identity id
        #[clap(value_name = "ID")]
        id: String,
    },

    /// List all users
    List,
}

#[derive(Serialize, Tabled)]
struct UserRow {
    id: String,
    username: String,
    email: String,
    points: i64,
    created_at: String,
    updated_at: String,
}

impl From<&User> for UserRow {
    fn from(user: &User) -> Self {
        UserRow {
            id: user.external_id.clone(),
            username: user.username.clone(),
            email: user.email.clone().unwrap_or_default(),
            points: user.total_points,
            created_at: user.created_at.to_string(),
            updated_at: user.updated_at.to_string(),
        }
    }
}

pub fn run(
    config: &TinkerConfig,
    command: UserCommands,
    output_format: OutputFormat,
) -> Result<()> {
    let db = TinkerDatabase::from_config(config)?;
    let users = db.users();

    match command {
        UserCommands::Ensure {
            id,
            username,
            first_name,
            email,
            image_url,
        } => {
            let profile = UserProfile {
                username,
                first_name,
                email,
                image_url,
            };
            let outcome = users.ensure_user(&id, &profile)?;
            if output_format.is_json() {
                println!("{}", serde_json::json!({"id": id, "outcome": outcome}));
            } else {
                println!("{:?} user {}", outcome, id);
            }
        }
        UserCommands::Show { id } => {
            let user = users
                .find(&id)?
                .ok_or_else(|| anyhow!("no user with id '{}'", id))?;
            match output_format.render_json(&[&user]) {
                Some(json) => println!("{}", json?),
                None => print_rows(&[UserRow::from(&user)], output_format, |rows| Table::new(rows)),
            }
        }
        UserCommands::List => {
            let rows: Vec<UserRow> = users.list()?.iter().map(UserRow::from).collect();
            print_rows(&rows, output_format, |rows| Table::new(rows));
        }
    }
    Ok(())
}
