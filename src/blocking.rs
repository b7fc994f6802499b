//! Blocking facade over [`ServerGateway`].
//!
//! Owns a small Tokio runtime and forwards each call with `block_on`, the
//! same shape the `postgres` crate uses over `tokio-postgres`. Blocking
//! mappers receive a [`BlockingRowCursor`] that pulls rows from the live
//! stream on demand, so the gateway still pre-consumes nothing.

use tokio::runtime::{Builder, Handle, Runtime};
use tokio_postgres::Row;

use crate::command::Command;
use crate::error::GatewayError;
use crate::gateway::{ProcedureDataGateway, QueryDataGateway};
use crate::postgres::{RowCursor, ServerGateway};
use crate::statement::{DataDefinitionQuery, Insert, Select, StoredProcedure, Write};
use crate::value::FromScalar;

/// Synchronous counterpart of [`RowCursor`].
pub struct BlockingRowCursor {
    inner: RowCursor,
    handle: Handle,
}

impl BlockingRowCursor {
    /// Advance to the next row, blocking on the underlying stream.
    pub fn next(&mut self) -> Result<Option<Row>, GatewayError> {
        self.handle.block_on(self.inner.next())
    }
}

/// Blocking gateway over a server-based PostgreSQL database. Implements the
/// synchronous trait surface by forwarding to an inner [`ServerGateway`].
pub struct BlockingServerGateway {
    inner: ServerGateway,
    runtime: Runtime,
}

impl BlockingServerGateway {
    pub fn new(config: impl Into<String>) -> Result<Self, GatewayError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;
        Ok(Self {
            inner: ServerGateway::new(config),
            runtime,
        })
    }

    /// The async gateway backing this facade.
    pub fn gateway(&self) -> &ServerGateway {
        &self.inner
    }
}

impl QueryDataGateway for BlockingServerGateway {
    type Cursor<'conn> = BlockingRowCursor;

    fn fetch_scalar_with<T, S>(
        &mut self,
        query: &Select,
        setup: S,
    ) -> Result<Option<T>, GatewayError>
    where
        T: FromScalar,
        S: FnOnce(&mut Command),
    {
        self.runtime
            .block_on(self.inner.fetch_scalar_with(query, setup))
    }

    fn fetch_rows_with<R, S, M>(
        &mut self,
        query: &Select,
        setup: S,
        map: M,
    ) -> Result<R, GatewayError>
    where
        S: FnOnce(&mut Command),
        M: for<'c> FnOnce(&mut BlockingRowCursor) -> Result<R, GatewayError>,
    {
        let cursor = self
            .runtime
            .block_on(self.inner.open_select_cursor(query, setup))?;
        let mut cursor = BlockingRowCursor {
            inner: cursor,
            handle: self.runtime.handle().clone(),
        };
        map(&mut cursor)
    }

    fn execute_with<S>(&mut self, statement: &Write, setup: S) -> Result<u64, GatewayError>
    where
        S: FnOnce(&mut Command),
    {
        self.runtime.block_on(self.inner.execute_with(statement, setup))
    }

    fn execute_ddl_with<S>(
        &mut self,
        query: &DataDefinitionQuery,
        setup: S,
    ) -> Result<u64, GatewayError>
    where
        S: FnOnce(&mut Command),
    {
        self.runtime.block_on(self.inner.execute_ddl_with(query, setup))
    }

    fn insert_with<T, S>(&mut self, statement: &Insert, setup: S) -> Result<T, GatewayError>
    where
        T: FromScalar,
        S: FnOnce(&mut Command),
    {
        self.runtime.block_on(self.inner.insert_with(statement, setup))
    }
}

impl ProcedureDataGateway for BlockingServerGateway {
    fn call_scalar_with<T, S>(
        &mut self,
        procedure: &StoredProcedure,
        setup: S,
    ) -> Result<Option<T>, GatewayError>
    where
        T: FromScalar,
        S: FnOnce(&mut Command),
    {
        self.runtime
            .block_on(self.inner.call_scalar_with(procedure, setup))
    }

    fn call_rows_with<R, S, M>(
        &mut self,
        procedure: &StoredProcedure,
        setup: S,
        map: M,
    ) -> Result<R, GatewayError>
    where
        S: FnOnce(&mut Command),
        M: for<'c> FnOnce(&mut BlockingRowCursor) -> Result<R, GatewayError>,
    {
        let cursor = self
            .runtime
            .block_on(self.inner.open_procedure_cursor(procedure, setup))?;
        let mut cursor = BlockingRowCursor {
            inner: cursor,
            handle: self.runtime.handle().clone(),
        };
        map(&mut cursor)
    }

    fn call_with<S>(&mut self, procedure: &StoredProcedure, setup: S) -> Result<u64, GatewayError>
    where
        S: FnOnce(&mut Command),
    {
        self.runtime.block_on(self.inner.call_with(procedure, setup))
    }
}
