//! Embedded gateway over rusqlite. Synchronous only.

use rusqlite::Connection;
use rusqlite::types::Value;
use tracing::debug;

use crate::command::Command;
use crate::error::GatewayError;
use crate::gateway::{ProcedureDataGateway, QueryDataGateway};
use crate::statement::{DataDefinitionQuery, Insert, Select, StoredProcedure, Write};
use crate::value::{FromScalar, SqlValue};

/// Connection lifecycle for an [`EmbeddedGateway`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Open a fresh connection for every call and drop it when the call
    /// returns, on every exit path.
    Ephemeral,
    /// Hold at most one connection, opened on first use and reused until
    /// [`EmbeddedGateway::close`] or drop.
    Persistent,
}

/// Gateway over an embedded SQLite database file (or `:memory:`).
pub struct EmbeddedGateway {
    path: Option<String>,
    mode: ConnectionMode,
    connection: Option<Connection>,
}

impl EmbeddedGateway {
    pub fn new(path: impl Into<String>, mode: ConnectionMode) -> Self {
        Self {
            path: Some(path.into()),
            mode,
            connection: None,
        }
    }

    /// Adopt a pre-opened connection. The gateway runs in persistent mode;
    /// with no path on record, a connection closed via [`close`](Self::close)
    /// cannot be reopened.
    pub fn from_connection(connection: Connection) -> Self {
        Self {
            path: None,
            mode: ConnectionMode::Persistent,
            connection: Some(connection),
        }
    }

    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    /// Release the held connection, if any. The next call on a gateway with
    /// a path reopens from that path.
    pub fn close(&mut self) {
        self.connection = None;
    }

    fn open(&self) -> Result<Connection, GatewayError> {
        let path = self.path.as_deref().ok_or_else(|| {
            GatewayError::Connection("gateway holds no path to open a connection from".into())
        })?;
        Ok(Connection::open(path)?)
    }

    /// Connection acquisition policy: persistent mode reuses the held
    /// handle (opening one if absent), ephemeral mode scopes a fresh
    /// connection to this call.
    fn with_conn<R>(
        &mut self,
        f: impl FnOnce(&Connection) -> Result<R, GatewayError>,
    ) -> Result<R, GatewayError> {
        match self.mode {
            ConnectionMode::Persistent => {
                if self.connection.is_none() {
                    self.connection = Some(self.open()?);
                }
                let conn = self.connection.as_ref().ok_or_else(|| {
                    GatewayError::Connection("persistent connection handle missing".into())
                })?;
                f(conn)
            }
            ConnectionMode::Ephemeral => {
                let conn = self.open()?;
                f(&conn)
            }
        }
    }
}

/// Bind gateway parameters to rusqlite values.
fn convert_params(params: &[SqlValue]) -> Vec<Value> {
    params
        .iter()
        .map(|p| match p {
            SqlValue::Int(i) => Value::Integer(*i),
            SqlValue::Float(f) => Value::Real(*f),
            SqlValue::Text(s) => Value::Text(s.clone()),
            SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
            SqlValue::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
            SqlValue::Null => Value::Null,
            SqlValue::Json(jsval) => Value::Text(jsval.to_string()),
            SqlValue::Bytes(bytes) => Value::Blob(bytes.clone()),
        })
        .collect()
}

fn extract_value(row: &rusqlite::Row, idx: usize) -> Result<SqlValue, GatewayError> {
    match row.get_ref(idx)? {
        rusqlite::types::ValueRef::Null => Ok(SqlValue::Null),
        rusqlite::types::ValueRef::Integer(i) => Ok(SqlValue::Int(i)),
        rusqlite::types::ValueRef::Real(f) => Ok(SqlValue::Float(f)),
        rusqlite::types::ValueRef::Text(bytes) => {
            Ok(SqlValue::Text(String::from_utf8_lossy(bytes).into_owned()))
        }
        rusqlite::types::ValueRef::Blob(b) => Ok(SqlValue::Bytes(b.to_vec())),
    }
}

fn run_scalar<T: FromScalar>(
    conn: &Connection,
    command: &Command,
) -> Result<Option<T>, GatewayError> {
    let params = convert_params(command.params());
    let mut stmt = conn.prepare(command.text())?;
    let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
    match rows.next()? {
        None => Ok(None),
        Some(row) => {
            let value = extract_value(row, 0)?;
            if value.is_null() {
                Ok(None)
            } else {
                T::from_scalar(value).map(Some)
            }
        }
    }
}

fn run_non_query(conn: &Connection, command: &Command) -> Result<u64, GatewayError> {
    let params = convert_params(command.params());
    let mut stmt = conn.prepare(command.text())?;
    let changed = stmt.execute(rusqlite::params_from_iter(params))?;
    Ok(changed as u64)
}

impl QueryDataGateway for EmbeddedGateway {
    type Cursor<'conn> = rusqlite::Rows<'conn>;

    fn fetch_scalar_with<T, S>(
        &mut self,
        query: &Select,
        setup: S,
    ) -> Result<Option<T>, GatewayError>
    where
        T: FromScalar,
        S: FnOnce(&mut Command),
    {
        let mut command = Command::text_command(query.text());
        setup(&mut command);
        debug!(query = command.text(), "sqlite scalar");
        self.with_conn(|conn| run_scalar(conn, &command))
    }

    fn fetch_rows_with<R, S, M>(
        &mut self,
        query: &Select,
        setup: S,
        map: M,
    ) -> Result<R, GatewayError>
    where
        S: FnOnce(&mut Command),
        M: for<'c> FnOnce(&mut rusqlite::Rows<'c>) -> Result<R, GatewayError>,
    {
        let mut command = Command::text_command(query.text());
        setup(&mut command);
        debug!(query = command.text(), "sqlite cursor select");
        self.with_conn(|conn| {
            let params = convert_params(command.params());
            let mut stmt = conn.prepare(command.text())?;
            let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
            map(&mut rows)
        })
    }

    fn execute_with<S>(&mut self, statement: &Write, setup: S) -> Result<u64, GatewayError>
    where
        S: FnOnce(&mut Command),
    {
        let mut command = Command::text_command(statement.text());
        setup(&mut command);
        debug!(query = command.text(), "sqlite write");
        self.with_conn(|conn| run_non_query(conn, &command))
    }

    fn execute_ddl_with<S>(
        &mut self,
        query: &DataDefinitionQuery,
        setup: S,
    ) -> Result<u64, GatewayError>
    where
        S: FnOnce(&mut Command),
    {
        let mut command = Command::text_command(query.text());
        setup(&mut command);
        debug!(query = command.text(), "sqlite ddl");
        self.with_conn(|conn| run_non_query(conn, &command))
    }

    fn insert_with<T, S>(&mut self, statement: &Insert, setup: S) -> Result<T, GatewayError>
    where
        T: FromScalar,
        S: FnOnce(&mut Command),
    {
        let mut command = Command::text_command(statement.text());
        setup(&mut command);
        debug!(query = command.text(), "sqlite insert");
        self.with_conn(|conn| {
            let params = convert_params(command.params());
            let mut stmt = conn.prepare(command.text())?;
            stmt.execute(rusqlite::params_from_iter(params))?;
            T::from_scalar(SqlValue::Int(conn.last_insert_rowid()))
        })
    }
}

fn no_procedures(procedure: &StoredProcedure) -> GatewayError {
    GatewayError::Unsupported(format!(
        "SQLite has no stored procedures (requested `{}`)",
        procedure.name()
    ))
}

impl ProcedureDataGateway for EmbeddedGateway {
    fn call_scalar_with<T, S>(
        &mut self,
        procedure: &StoredProcedure,
        _setup: S,
    ) -> Result<Option<T>, GatewayError>
    where
        T: FromScalar,
        S: FnOnce(&mut Command),
    {
        Err(no_procedures(procedure))
    }

    fn call_rows_with<R, S, M>(
        &mut self,
        procedure: &StoredProcedure,
        _setup: S,
        _map: M,
    ) -> Result<R, GatewayError>
    where
        S: FnOnce(&mut Command),
        M: for<'c> FnOnce(&mut rusqlite::Rows<'c>) -> Result<R, GatewayError>,
    {
        Err(no_procedures(procedure))
    }

    fn call_with<S>(&mut self, procedure: &StoredProcedure, _setup: S) -> Result<u64, GatewayError>
    where
        S: FnOnce(&mut Command),
    {
        Err(no_procedures(procedure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_convert_to_sqlite_storage_classes() {
        let converted = convert_params(&[
            SqlValue::Int(5),
            SqlValue::Bool(true),
            SqlValue::Null,
            SqlValue::Text("abc".into()),
        ]);
        assert_eq!(
            converted,
            vec![
                Value::Integer(5),
                Value::Integer(1),
                Value::Null,
                Value::Text("abc".into())
            ]
        );
    }
}
