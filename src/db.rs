use crate::config::DbConfig;
use crate::error::Result;
use crate::models::{QueryResult, Row, Value};
use crate::request::Request;
use crate::sql::{self, Statement};
use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::path::Path;
use tracing::debug;

/// Database handle, owned for the duration of one accessor call
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open an existing database file. A missing file is an error, the same
    /// way connecting to an unknown database is.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Database { conn })
    }

    /// Open an in-memory database for testing
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Database { conn })
    }

    /// Connect with the parameters of a loaded config file
    pub fn connect(config: &DbConfig, config_path: &Path) -> Result<Self> {
        let path = config.database_path(config_path);
        debug!(db = %config.display_target(), path = %path.display(), "opening database");
        if path == Path::new(":memory:") {
            Self::open_in_memory()
        } else {
            Self::open(path)
        }
    }

    /// Run trusted setup SQL (schema definitions in tests and tools)
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Execute a data-changing statement, returning the number of rows affected
    pub fn execute(&self, statement: &Statement) -> Result<usize> {
        let changed = self
            .conn
            .execute(&statement.sql, params_from_iter(statement.params.iter()))?;
        Ok(changed)
    }

    /// Execute an INSERT, returning the generated row id
    pub fn insert(&self, statement: &Statement) -> Result<i64> {
        self.execute(statement)?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Execute a SELECT, returning every row
    pub fn query(&self, statement: &Statement) -> Result<Vec<Row>> {
        let mut stmt = self.conn.prepare(&statement.sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let rows = stmt.query_map(params_from_iter(statement.params.iter()), |row| {
            row_from_sqlite(row, &columns)
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| e.into())
    }

    /// Build and run one request against `table`
    pub fn run(&self, table: &str, request: &Request) -> Result<QueryResult> {
        let statement = sql::build(table, request)?;
        debug!(sql = %statement.sql, params = statement.params.len(), "executing");

        match request {
            Request::Insert(_) => self.insert(&statement).map(QueryResult::Id),
            Request::Update(update) => {
                self.execute(&statement)?;
                Ok(QueryResult::Id(update.reported_id()))
            }
            Request::Select(select) => {
                let mut rows = self.query(&statement)?;
                if select.wants_single_row() && !rows.is_empty() {
                    Ok(QueryResult::Row(rows.swap_remove(0)))
                } else {
                    Ok(QueryResult::Rows(rows))
                }
            }
        }
    }

    /// Close the connection, reporting any error the driver raises on close
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e.into())
    }
}

// ==================== Row Parsers ====================

fn row_from_sqlite(row: &rusqlite::Row, columns: &[String]) -> rusqlite::Result<Row> {
    columns
        .iter()
        .enumerate()
        .map(|(i, name)| Ok((name.clone(), Value::from(row.get_ref(i)?))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{InsertRequest, SelectRequest, UpdateRequest};

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE entradas (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                telegram_id INTEGER,
                plataforma TEXT,
                status TEXT,
                valor REAL
            )",
        )
        .unwrap();
        db
    }

    #[test]
    fn test_insert_returns_generated_id() {
        let db = setup();
        let insert = InsertRequest::new([("status", "PENDENTE")]).unwrap();

        assert_eq!(db.run("entradas", &insert.clone().into()).unwrap(), QueryResult::Id(1));
        assert_eq!(db.run("entradas", &insert.into()).unwrap(), QueryResult::Id(2));
    }

    #[test]
    fn test_update_returns_given_id() {
        let db = setup();
        db.run(
            "entradas",
            &InsertRequest::new([("status", "PENDENTE")]).unwrap().into(),
        )
        .unwrap();

        let update = UpdateRequest::by_id(1, [("status", "FECHADO")]).unwrap();
        assert_eq!(db.run("entradas", &update.into()).unwrap(), QueryResult::Id(1));

        let select = SelectRequest::builder().filter("id", 1).limit(1).build().unwrap();
        let result = db.run("entradas", &select.into()).unwrap();
        let row = result.as_row().unwrap();
        assert_eq!(row.get("status"), Some(&Value::from("FECHADO")));
    }

    #[test]
    fn test_select_preserves_column_order_and_types() {
        let db = setup();
        db.run(
            "entradas",
            &InsertRequest::new([
                ("telegram_id", Value::Integer(42)),
                ("valor", Value::Real(2.5)),
            ])
            .unwrap()
            .into(),
        )
        .unwrap();

        let select = SelectRequest::builder()
            .columns(["valor", "telegram_id", "status"])
            .build()
            .unwrap();
        let result = db.run("entradas", &select.into()).unwrap();
        let rows = result.as_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].columns().collect::<Vec<_>>(),
            vec!["valor", "telegram_id", "status"]
        );
        assert_eq!(rows[0].get("valor"), Some(&Value::Real(2.5)));
        assert_eq!(rows[0].get("status"), Some(&Value::Null));
    }

    #[test]
    fn test_limit_one_without_match_returns_empty_sequence() {
        let db = setup();
        let select = SelectRequest::builder()
            .filter("status", "NADA")
            .limit(1)
            .build()
            .unwrap();
        assert_eq!(
            db.run("entradas", &select.into()).unwrap(),
            QueryResult::Rows(vec![])
        );
    }

    #[test]
    fn test_unknown_column_is_db_error() {
        let db = setup();
        let insert = InsertRequest::new([("nope", 1)]).unwrap();
        let result = db.run("entradas", &insert.into());
        assert!(matches!(result, Err(crate::error::AccessError::Db(_))));
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(Database::open(dir.path().join("missing.db")).is_err());
    }
}
