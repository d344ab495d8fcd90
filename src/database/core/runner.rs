//! Generic query and statement runners
//!
//! `query` returns every row of a row-returning statement as a [`Record`];
//! `execute` runs a mutating statement and reports what it changed. Both bind
//! their parameters and run exactly one statement.
//!
//! The `*_with` variants run on a connection (or transaction) the caller
//! already holds; the [`ConnectionProvider`] methods acquire a connection for
//! the single statement and release it afterwards.

use crate::database::core::connection::ConnectionProvider;
use crate::database::error::{Result, StoreError};
use rusqlite::types::Value;
use rusqlite::{Connection, Params};
use serde::Serialize;
use tracing::{debug, error};

/// One row of a query result, columns in statement order
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Record {
    /// Value of the named column, if the record has it
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Integer value of the named column
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Text value of the named column
    pub fn get_str(&self, column: &str) -> Option<&str> {
        match self.get(column)? {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Convert to a JSON object keyed by column name
    ///
    /// Blobs become arrays of bytes; non-finite reals become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .columns
            .iter()
            .zip(&self.values)
            .map(|(column, value)| (column.clone(), value_to_json(value)))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Real(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Blob(b) => serde_json::Value::from(b.clone()),
    }
}

/// Outcome of a mutating statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    /// Number of rows inserted, updated, or deleted
    pub changes: usize,
    /// Rowid of the most recent successful INSERT on this connection
    pub last_insert_rowid: i64,
}

/// Run a row-returning statement on `conn`
pub fn query_with<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Record>> {
    debug!("query: {}", sql);
    collect_records(conn, sql, params).map_err(|source| query_failed(sql, source))
}

/// Log a failed read and wrap it as [`StoreError::Query`]
pub(crate) fn query_failed(sql: &str, source: rusqlite::Error) -> StoreError {
    error!("Query failed ({}): {}", sql, source);
    StoreError::Query {
        sql: sql.to_string(),
        source,
    }
}

fn collect_records<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> rusqlite::Result<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query(params)?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let values = (0..columns.len())
            .map(|idx| row.get::<_, Value>(idx))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        records.push(Record {
            columns: columns.clone(),
            values,
        });
    }
    Ok(records)
}

/// Run a mutating statement on `conn`
pub fn execute_with<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<ExecutionResult> {
    debug!("execute: {}", sql);
    conn.execute(sql, params)
        .map(|changes| ExecutionResult {
            changes,
            last_insert_rowid: conn.last_insert_rowid(),
        })
        .map_err(|source| {
            error!("Statement failed ({}): {}", sql, source);
            StoreError::Statement {
                sql: sql.to_string(),
                source,
            }
        })
}

impl ConnectionProvider {
    /// Acquire a connection, run one row-returning statement, release
    pub fn query<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Record>> {
        self.with_connection(|conn| query_with(conn, sql, params))
    }

    /// Acquire a connection, run one mutating statement, release
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<ExecutionResult> {
        self.with_connection(|conn| execute_with(conn, sql, params))
    }
}
