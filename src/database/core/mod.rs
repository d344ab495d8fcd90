//! Core database infrastructure
//!
//! This module provides the foundational database components used throughout tinker-store:
//! - `ConnectionProvider`: pooled SQLite connections with scoped acquisition
//! - `SchemaManager`: Schema initialization and status checks
//! - `query_with` / `execute_with`: the generic statement runners

mod connection;
mod runner;
mod schema;

pub use connection::{ConnectionProvider, ConnectionSettings, PoolState, PooledConnection};
pub(crate) use runner::query_failed;
pub use runner::{execute_with, query_with, ExecutionResult, Record};
pub use schema::{SchemaDefinitions, SchemaManager, SchemaStatus};
