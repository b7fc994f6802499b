//! Server gateway over tokio-postgres. Asynchronous; see [`crate::blocking`]
//! for the facade that exposes the synchronous traits.
//!
//! Every call opens a fresh session (connect, spawn the connection task,
//! drop the client at the end of the call). There is no pooling beyond what
//! the driver does internally, and no state is shared between calls.

use std::error::Error;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_postgres::{Client, NoTls, Row, RowStream};
use tokio_util::bytes;
use tracing::{debug, warn};

use crate::command::Command;
use crate::error::GatewayError;
use crate::gateway::AsyncDataGateway;
use crate::statement::{DataDefinitionQuery, Insert, Select, StoredProcedure, Write};
use crate::value::{FromScalar, SqlValue};

/// One connection plus its spawned driver task; dropping the session closes
/// the connection.
struct Session {
    client: Client,
    _task: JoinHandle<()>,
}

/// Live cursor over a query's rows. Owns the session so the stream stays
/// drivable for as long as the mapper holds the cursor.
pub struct RowCursor {
    stream: Pin<Box<RowStream>>,
    _session: Session,
}

impl RowCursor {
    /// Advance to the next row.
    pub async fn next(&mut self) -> Result<Option<Row>, GatewayError> {
        match self.stream.next().await {
            None => Ok(None),
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(err)) => Err(err.into()),
        }
    }
}

/// Gateway over a server-based PostgreSQL database.
pub struct ServerGateway {
    config: String,
}

impl ServerGateway {
    /// `config` is a standard libpq-style connection string, e.g.
    /// `host=localhost user=app dbname=app password=secret`.
    pub fn new(config: impl Into<String>) -> Self {
        Self {
            config: config.into(),
        }
    }

    async fn connect(&self) -> Result<Session, GatewayError> {
        let (client, connection) = tokio_postgres::connect(&self.config, NoTls).await?;
        let task = tokio::spawn(async move {
            if let Err(err) = connection.await {
                warn!(error = %err, "postgres connection task ended with error");
            }
        });
        Ok(Session {
            client,
            _task: task,
        })
    }

    pub async fn fetch_scalar_with<T, S>(
        &self,
        query: &Select,
        setup: S,
    ) -> Result<Option<T>, GatewayError>
    where
        T: FromScalar,
        S: FnOnce(&mut Command),
    {
        let mut command = Command::text_command(query.text());
        setup(&mut command);
        debug!(query = command.text(), "postgres scalar");
        let session = self.connect().await?;
        run_scalar(&session.client, command.text(), command.params()).await
    }

    pub async fn fetch_scalar<T>(&self, query: &Select) -> Result<Option<T>, GatewayError>
    where
        T: FromScalar,
    {
        self.fetch_scalar_with(query, |_: &mut Command| {}).await
    }

    pub(crate) async fn open_select_cursor<S>(
        &self,
        query: &Select,
        setup: S,
    ) -> Result<RowCursor, GatewayError>
    where
        S: FnOnce(&mut Command),
    {
        let mut command = Command::text_command(query.text());
        setup(&mut command);
        debug!(query = command.text(), "postgres cursor select");
        self.open_cursor(command.text(), command.params()).await
    }

    pub(crate) async fn open_procedure_cursor<S>(
        &self,
        procedure: &StoredProcedure,
        setup: S,
    ) -> Result<RowCursor, GatewayError>
    where
        S: FnOnce(&mut Command),
    {
        let mut command = Command::procedure(procedure.name());
        setup(&mut command);
        let sql = function_invocation(command.text(), command.params().len());
        debug!(procedure = command.text(), "postgres cursor call");
        self.open_cursor(&sql, command.params()).await
    }

    async fn open_cursor(
        &self,
        text: &str,
        params: &[SqlValue],
    ) -> Result<RowCursor, GatewayError> {
        let session = self.connect().await?;
        let stmt = session.client.prepare(text).await?;
        let stream = session
            .client
            .query_raw(&stmt, params.iter().map(|p| p as &dyn ToSql))
            .await?;
        Ok(RowCursor {
            stream: Box::pin(stream),
            _session: session,
        })
    }

    pub async fn fetch_rows_with<R, S, M, Fut>(
        &self,
        query: &Select,
        setup: S,
        map: M,
    ) -> Result<R, GatewayError>
    where
        S: FnOnce(&mut Command),
        M: FnOnce(RowCursor) -> Fut,
        Fut: Future<Output = Result<R, GatewayError>>,
    {
        let cursor = self.open_select_cursor(query, setup).await?;
        map(cursor).await
    }

    pub async fn execute_with<S>(&self, statement: &Write, setup: S) -> Result<u64, GatewayError>
    where
        S: FnOnce(&mut Command),
    {
        let mut command = Command::text_command(statement.text());
        setup(&mut command);
        debug!(query = command.text(), "postgres write");
        let session = self.connect().await?;
        run_non_query(&session.client, command.text(), command.params()).await
    }

    pub async fn execute(&self, statement: &Write) -> Result<u64, GatewayError> {
        self.execute_with(statement, |_: &mut Command| {}).await
    }

    pub async fn execute_ddl_with<S>(
        &self,
        query: &DataDefinitionQuery,
        setup: S,
    ) -> Result<u64, GatewayError>
    where
        S: FnOnce(&mut Command),
    {
        let mut command = Command::text_command(query.text());
        setup(&mut command);
        debug!(query = command.text(), "postgres ddl");
        let session = self.connect().await?;
        run_non_query(&session.client, command.text(), command.params()).await
    }

    pub async fn execute_ddl(&self, query: &DataDefinitionQuery) -> Result<u64, GatewayError> {
        self.execute_ddl_with(query, |_: &mut Command| {}).await
    }

    /// Runs the caller's INSERT unchanged, then reads `lastval()` from the
    /// same session to return the generated identity.
    pub async fn insert_with<T, S>(&self, statement: &Insert, setup: S) -> Result<T, GatewayError>
    where
        T: FromScalar,
        S: FnOnce(&mut Command),
    {
        let mut command = Command::text_command(statement.text());
        setup(&mut command);
        debug!(query = command.text(), "postgres insert");
        let session = self.connect().await?;
        let refs = param_refs(command.params());
        session.client.execute(command.text(), &refs).await?;
        let row = session.client.query_one("SELECT lastval()", &[]).await?;
        let id: i64 = row.try_get(0)?;
        T::from_scalar(SqlValue::Int(id))
    }

    pub async fn insert<T>(&self, statement: &Insert) -> Result<T, GatewayError>
    where
        T: FromScalar,
    {
        self.insert_with(statement, |_: &mut Command| {}).await
    }

    pub async fn call_scalar_with<T, S>(
        &self,
        procedure: &StoredProcedure,
        setup: S,
    ) -> Result<Option<T>, GatewayError>
    where
        T: FromScalar,
        S: FnOnce(&mut Command),
    {
        let mut command = Command::procedure(procedure.name());
        setup(&mut command);
        let sql = function_invocation(command.text(), command.params().len());
        debug!(procedure = command.text(), "postgres scalar call");
        let session = self.connect().await?;
        run_scalar(&session.client, &sql, command.params()).await
    }

    pub async fn call_scalar<T>(
        &self,
        procedure: &StoredProcedure,
    ) -> Result<Option<T>, GatewayError>
    where
        T: FromScalar,
    {
        self.call_scalar_with(procedure, |_: &mut Command| {}).await
    }

    pub async fn call_rows_with<R, S, M, Fut>(
        &self,
        procedure: &StoredProcedure,
        setup: S,
        map: M,
    ) -> Result<R, GatewayError>
    where
        S: FnOnce(&mut Command),
        M: FnOnce(RowCursor) -> Fut,
        Fut: Future<Output = Result<R, GatewayError>>,
    {
        let cursor = self.open_procedure_cursor(procedure, setup).await?;
        map(cursor).await
    }

    pub async fn call_with<S>(
        &self,
        procedure: &StoredProcedure,
        setup: S,
    ) -> Result<u64, GatewayError>
    where
        S: FnOnce(&mut Command),
    {
        let mut command = Command::procedure(procedure.name());
        setup(&mut command);
        let sql = call_invocation(command.text(), command.params().len());
        debug!(procedure = command.text(), "postgres call");
        let session = self.connect().await?;
        run_non_query(&session.client, &sql, command.params()).await
    }

    pub async fn call(&self, procedure: &StoredProcedure) -> Result<u64, GatewayError> {
        self.call_with(procedure, |_: &mut Command| {}).await
    }

    /// Reachability probe; absorbs every error into `false`.
    pub async fn test_connection(&self) -> bool {
        match self.fetch_scalar::<i64>(&Select::new("SELECT 1")).await {
            Ok(_) => true,
            Err(err) => {
                debug!(error = %err, "connectivity probe failed");
                false
            }
        }
    }
}

fn param_refs(params: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

/// Render `SELECT * FROM name($1..$n)` for scalar/cursor procedure calls.
fn function_invocation(name: &str, params: usize) -> String {
    format!("SELECT * FROM {}({})", name, placeholders(params))
}

/// Render `CALL name($1..$n)` for non-query procedure calls.
fn call_invocation(name: &str, params: usize) -> String {
    format!("CALL {}({})", name, placeholders(params))
}

fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

async fn run_scalar<T: FromScalar>(
    client: &Client,
    text: &str,
    params: &[SqlValue],
) -> Result<Option<T>, GatewayError> {
    let refs = param_refs(params);
    let rows = client.query(text, &refs).await?;
    match rows.first() {
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

async fn run_non_query(
    client: &Client,
    text: &str,
    params: &[SqlValue],
) -> Result<u64, GatewayError> {
    let refs = param_refs(params);
    Ok(client.execute(text, &refs).await?)
}

/// Extract the value at `idx` as a [`SqlValue`], mapping SQL NULL to
/// [`SqlValue::Null`].
pub fn extract_value(row: &Row, idx: usize) -> Result<SqlValue, GatewayError> {
    let column = row.columns().get(idx).ok_or_else(|| {
        GatewayError::ScalarConversion(format!("no column at index {idx}"))
    })?;
    match column.type_().name() {
        "int2" => {
            let val: Option<i16> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, |v| SqlValue::Int(v.into())))
        }
        "int4" => {
            let val: Option<i32> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, |v| SqlValue::Int(v.into())))
        }
        "int8" => {
            let val: Option<i64> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Int))
        }
        "float4" => {
            let val: Option<f32> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, |v| SqlValue::Float(v.into())))
        }
        "float8" => {
            let val: Option<f64> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Float))
        }
        "bool" => {
            let val: Option<bool> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Bool))
        }
        "timestamp" => {
            let val: Option<chrono::NaiveDateTime> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Timestamp))
        }
        "timestamptz" => {
            let val: Option<chrono::DateTime<chrono::Utc>> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, |v| SqlValue::Timestamp(v.naive_utc())))
        }
        "json" | "jsonb" => {
            let val: Option<serde_json::Value> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Json))
        }
        "bytea" => {
            let val: Option<Vec<u8>> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Bytes))
        }
        _ => {
            // text, varchar, and anything else the driver can hand back as
            // a string
            let val: Option<String> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Text))
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            // Narrowing must be checked: writing a truncated value to the
            // wire would corrupt data instead of failing the call.
            SqlValue::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                _ => i.to_sql(ty, out),
            },
            SqlValue::Float(f) => match *ty {
                Type::FLOAT4 => {
                    let narrowed = *f as f32;
                    if f.is_finite() && !narrowed.is_finite() {
                        return Err(format!("float {f} does not fit in float4").into());
                    }
                    narrowed.to_sql(ty, out)
                }
                _ => f.to_sql(ty, out),
            },
            SqlValue::Text(s) => s.to_sql(ty, out),
            SqlValue::Bool(b) => b.to_sql(ty, out),
            SqlValue::Timestamp(dt) => dt.to_sql(ty, out),
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Json(jsval) => jsval.to_sql(ty, out),
            SqlValue::Bytes(bytes) => bytes.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::TEXT
                | Type::VARCHAR
                | Type::CHAR
                | Type::NAME
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
        )
    }

    to_sql_checked!();
}

#[async_trait]
impl AsyncDataGateway for ServerGateway {
    type Cursor = RowCursor;

    async fn fetch_scalar_with<T, S>(
        &self,
        query: &Select,
        setup: S,
    ) -> Result<Option<T>, GatewayError>
    where
        T: FromScalar + Send,
        S: FnOnce(&mut Command) + Send,
    {
        ServerGateway::fetch_scalar_with(self, query, setup).await
    }

    async fn fetch_scalar<T>(&self, query: &Select) -> Result<Option<T>, GatewayError>
    where
        T: FromScalar + Send,
    {
        ServerGateway::fetch_scalar(self, query).await
    }

    async fn fetch_rows_with<R, S, M, Fut>(
        &self,
        query: &Select,
        setup: S,
        map: M,
    ) -> Result<R, GatewayError>
    where
        R: Send,
        S: FnOnce(&mut Command) + Send,
        M: FnOnce(RowCursor) -> Fut + Send,
        Fut: Future<Output = Result<R, GatewayError>> + Send,
    {
        ServerGateway::fetch_rows_with(self, query, setup, map).await
    }

    async fn execute_with<S>(&self, statement: &Write, setup: S) -> Result<u64, GatewayError>
    where
        S: FnOnce(&mut Command) + Send,
    {
        ServerGateway::execute_with(self, statement, setup).await
    }

    async fn execute(&self, statement: &Write) -> Result<u64, GatewayError> {
        ServerGateway::execute(self, statement).await
    }

    async fn execute_ddl_with<S>(
        &self,
        query: &DataDefinitionQuery,
        setup: S,
    ) -> Result<u64, GatewayError>
    where
        S: FnOnce(&mut Command) + Send,
    {
        ServerGateway::execute_ddl_with(self, query, setup).await
    }

    async fn execute_ddl(&self, query: &DataDefinitionQuery) -> Result<u64, GatewayError> {
        ServerGateway::execute_ddl(self, query).await
    }

    async fn insert_with<T, S>(&self, statement: &Insert, setup: S) -> Result<T, GatewayError>
    where
        T: FromScalar + Send,
        S: FnOnce(&mut Command) + Send,
    {
        ServerGateway::insert_with(self, statement, setup).await
    }

    async fn insert<T>(&self, statement: &Insert) -> Result<T, GatewayError>
    where
        T: FromScalar + Send,
    {
        ServerGateway::insert(self, statement).await
    }

    async fn call_scalar_with<T, S>(
        &self,
        procedure: &StoredProcedure,
        setup: S,
    ) -> Result<Option<T>, GatewayError>
    where
        T: FromScalar + Send,
        S: FnOnce(&mut Command) + Send,
    {
        ServerGateway::call_scalar_with(self, procedure, setup).await
    }

    async fn call_scalar<T>(&self, procedure: &StoredProcedure) -> Result<Option<T>, GatewayError>
    where
        T: FromScalar + Send,
    {
        ServerGateway::call_scalar(self, procedure).await
    }

    async fn call_rows_with<R, S, M, Fut>(
        &self,
        procedure: &StoredProcedure,
        setup: S,
        map: M,
    ) -> Result<R, GatewayError>
    where
        R: Send,
        S: FnOnce(&mut Command) + Send,
        M: FnOnce(RowCursor) -> Fut + Send,
        Fut: Future<Output = Result<R, GatewayError>> + Send,
    {
        ServerGateway::call_rows_with(self, procedure, setup, map).await
    }

    async fn call_with<S>(
        &self,
        procedure: &StoredProcedure,
        setup: S,
    ) -> Result<u64, GatewayError>
    where
        S: FnOnce(&mut Command) + Send,
    {
        ServerGateway::call_with(self, procedure, setup).await
    }

    async fn call(&self, procedure: &StoredProcedure) -> Result<u64, GatewayError> {
        ServerGateway::call(self, procedure).await
    }

    async fn test_connection(&self) -> bool {
        ServerGateway::test_connection(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_integer_bindings_reject_out_of_range_values() {
        let mut buf = bytes::BytesMut::new();
        assert!(
            SqlValue::Int(70_000)
                .to_sql_checked(&Type::INT2, &mut buf)
                .is_err()
        );

        let mut buf = bytes::BytesMut::new();
        assert!(
            SqlValue::Int(i64::from(i32::MAX) + 1)
                .to_sql_checked(&Type::INT4, &mut buf)
                .is_err()
        );

        let mut buf = bytes::BytesMut::new();
        assert!(
            SqlValue::Int(123)
                .to_sql_checked(&Type::INT2, &mut buf)
                .is_ok()
        );
        assert_eq!(&buf[..], &123_i16.to_be_bytes()[..]);
    }

    #[test]
    fn float4_bindings_reject_values_outside_f32_range() {
        let mut buf = bytes::BytesMut::new();
        assert!(
            SqlValue::Float(1e300)
                .to_sql_checked(&Type::FLOAT4, &mut buf)
                .is_err()
        );

        let mut buf = bytes::BytesMut::new();
        assert!(
            SqlValue::Float(1.5)
                .to_sql_checked(&Type::FLOAT4, &mut buf)
                .is_ok()
        );
    }

    #[test]
    fn procedure_invocations_render_positional_placeholders() {
        assert_eq!(function_invocation("get_totals", 0), "SELECT * FROM get_totals()");
        assert_eq!(
            function_invocation("audit.find_event", 2),
            "SELECT * FROM audit.find_event($1, $2)"
        );
        assert_eq!(call_invocation("prune_logs", 1), "CALL prune_logs($1)");
    }
}
