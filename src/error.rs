//! Typed errors surfaced at the warehouse and pipeline boundaries.
//!
//! Engines return `SchemaError` before any table mutation; the application
//! layer wraps everything else in `anyhow` with context.

use thiserror::Error;

/// A structural problem with a table or a batch of incoming records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A required column is absent from a stored table.
    #[error("{table}: required column `{column}` is missing")]
    MissingColumn { table: String, column: String },

    /// A column exists but cannot be read as its declared type.
    #[error("{table}: column `{column}` has an incompatible type")]
    ColumnType { table: String, column: String },

    /// A key column contains a null.
    #[error("{table}: column `{column}` holds a null in a key position")]
    NullKey { table: String, column: String },

    /// Incoming session records lack a field the target table requires.
    #[error("{entity}: required field `{field}` missing from incoming records")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },

    /// The finish position could not be cast to an integer after all joins.
    /// Fatal to a feature pipeline run.
    #[error("finish position missing or non-integral for raceId {race_id}, driverId {driver_id}")]
    FinishPositionCast { race_id: i64, driver_id: i64 },
}

impl SchemaError {
    pub fn missing_column(table: &str, column: &str) -> Self {
        Self::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    pub fn column_type(table: &str, column: &str) -> Self {
        Self::ColumnType {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    pub fn null_key(table: &str, column: &str) -> Self {
        Self::NullKey {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}
