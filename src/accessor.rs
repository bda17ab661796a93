//! The table accessor: one connection, one statement, per call.

use crate::config::{DbConfig, DEFAULT_CONFIG_PATH};
use crate::db::Database;
use crate::error::Result;
use crate::models::QueryResult;
use crate::request::{validate_table, Request};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Runs insert/update/select requests against the database named in a
/// config file. The file is re-read and a fresh connection opened on every
/// call; nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct TableAccessor {
    config_path: PathBuf,
}

impl Default for TableAccessor {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_PATH)
    }
}

impl TableAccessor {
    pub fn new<P: Into<PathBuf>>(config_path: P) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Run a validated request, returning typed errors.
    ///
    /// The table name is checked before the config file is touched.
    pub fn run(&self, table: &str, request: &Request) -> Result<QueryResult> {
        validate_table(table)?;

        let config = DbConfig::load(&self.config_path)?;
        let db = Database::connect(&config, &self.config_path)?;
        let result = db.run(table, request);
        if let Err(e) = db.close() {
            warn!(table, error = %e, "failed to close connection");
        }

        match &result {
            Ok(QueryResult::Id(id)) => match request {
                Request::Insert(_) => info!(table, id, "row inserted"),
                _ => info!(table, id, "row updated"),
            },
            Ok(QueryResult::Row(_)) => info!(table, rows = 1, "rows read"),
            Ok(QueryResult::Rows(rows)) => info!(table, rows = rows.len(), "rows read"),
            Ok(QueryResult::Failed) | Err(_) => {}
        }
        result
    }

    /// Parse and run a dynamic JSON request.
    ///
    /// Never fails: any error is logged and reported as
    /// [`QueryResult::Failed`], which renders as `-1`.
    pub fn access(&self, table: &str, request: &serde_json::Value) -> QueryResult {
        let outcome = validate_table(table)
            .and_then(|()| Request::from_json(request))
            .and_then(|request| self.run(table, &request));

        match outcome {
            Ok(result) => result,
            Err(e) if e.is_input_error() => {
                error!(table, error = %e, "invalid parameters");
                QueryResult::Failed
            }
            Err(e) => {
                error!(table, error = %e, "table access failed");
                QueryResult::Failed
            }
        }
    }
}

/// Insert, update or select rows of `table` as described by `request`.
///
/// Shorthand for `TableAccessor::new(config_path).access(table, request)`.
pub fn access_table<P: AsRef<Path>>(
    table: &str,
    request: &serde_json::Value,
    config_path: P,
) -> QueryResult {
    TableAccessor::new(config_path.as_ref()).access(table, request)
}
