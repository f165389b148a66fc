use thiserror::Error;

use crate::value::LogicalType;

/// Typed failures surfaced at the engine boundary.
///
/// Validation failures (identifier, type, unknown entity) are raised before
/// any statement is built; store-reported failures are re-classified from the
/// SQLSTATE code so driver-specific error text never leaks to the caller.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("table {0:?} already exists")]
    DuplicateTable(String),

    #[error("table {0:?} not found")]
    UnknownTable(String),

    #[error("column {column:?} already exists on table {table:?}")]
    DuplicateColumn { table: String, column: String },

    #[error("table {table:?} has no column {column:?}")]
    UnknownColumn { table: String, column: String },

    #[error("foreign key target {table}.{column} does not exist")]
    UnknownForeignTarget { table: String, column: String },

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("cannot coerce {value:?} to {expected} for column {column:?}")]
    TypeMismatch {
        column: String,
        expected: LogicalType,
        value: String,
    },

    #[error("row {id} not found in table {table:?}")]
    UnknownRow { table: String, id: i64 },

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("table {table:?} is referenced by foreign keys from {referencing:?}")]
    ReferencedByForeignKey {
        table: String,
        referencing: Vec<String>,
    },

    #[error("store error{}: {message}", sqlstate_suffix(.sqlstate))]
    Store {
        sqlstate: Option<String>,
        message: String,
    },
}

fn sqlstate_suffix(code: &Option<String>) -> String {
    match code {
        Some(c) => format!(" (SQLSTATE {c})"),
        None => String::new(),
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Re-classify a driver error raised during statement execution.
    ///
    /// Validation catches the unknown-table/column cases up front, so the
    /// SQLSTATE mapping here is a backstop for races with external DDL plus
    /// the constraint classes that only the store can detect.
    pub fn from_store(err: tokio_postgres::Error) -> Self {
        let Some(db) = err.as_db_error() else {
            return EngineError::Store {
                sqlstate: None,
                message: err.to_string(),
            };
        };
        classify_sqlstate(
            db.code().code(),
            db.message(),
            db.table(),
            db.column(),
        )
    }
}

/// Map a SQLSTATE code (plus whatever context the error report carries) into
/// the taxonomy.
fn classify_sqlstate(
    code: &str,
    message: &str,
    table: Option<&str>,
    column: Option<&str>,
) -> EngineError {
    match code {
        "42P01" => EngineError::UnknownTable(table.unwrap_or_default().to_string()),
        "42P07" => EngineError::DuplicateTable(table.unwrap_or_default().to_string()),
        "42701" => EngineError::DuplicateColumn {
            table: table.unwrap_or_default().to_string(),
            column: column.unwrap_or_default().to_string(),
        },
        // Class 23: integrity constraint violation (23503 foreign key,
        // 23505 unique, 23502 not-null).
        _ if code.starts_with("23") => EngineError::ConstraintViolation(message.to_string()),
        _ => EngineError::Store {
            sqlstate: Some(code.to_string()),
            message: message.to_string(),
        },
    }
}

impl From<tokio_postgres::Error> for EngineError {
    fn from(err: tokio_postgres::Error) -> Self {
        EngineError::from_store(err)
    }
}

impl From<deadpool_postgres::PoolError> for EngineError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        EngineError::Store {
            sqlstate: None,
            message: format!("connection pool: {err}"),
        }
    }
}
