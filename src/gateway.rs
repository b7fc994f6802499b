//! Gateway interface contracts.
//!
//! The original surface is a large overload matrix:
//! {scalar, cursor, non-query} x {setup, no setup} x {sync, async}. Here it
//! collapses into a small set of generic `_with` methods taking a setup
//! closure, with the no-setup variants provided as thin defaults. Typed
//! per-call input values collapse into closure capture, so no separate
//! input-carrying variants exist.

use async_trait::async_trait;

use crate::command::Command;
use crate::error::GatewayError;
use crate::statement::{DataDefinitionQuery, Insert, Select, StoredProcedure, Write};
use crate::value::FromScalar;

/// Synchronous query execution surface.
///
/// Methods take `&mut self`: a persistent-mode gateway holds at most one
/// connection handle, and exclusive receivers make the compiler serialize
/// access to it instead of documenting the constraint away.
pub trait QueryDataGateway {
    /// The live cursor type handed to mapper callbacks.
    type Cursor<'conn>;

    /// Scalar execution: first column of the first row, with a database
    /// NULL or an empty result set yielding `None`. The setup callback is
    /// invoked exactly once, before execution.
    fn fetch_scalar_with<T, S>(
        &mut self,
        query: &Select,
        setup: S,
    ) -> Result<Option<T>, GatewayError>
    where
        T: FromScalar,
        S: FnOnce(&mut Command);

    fn fetch_scalar<T>(&mut self, query: &Select) -> Result<Option<T>, GatewayError>
    where
        T: FromScalar,
    {
        self.fetch_scalar_with(query, |_: &mut Command| {})
    }

    /// Cursor execution: the mapper is invoked exactly once with a cursor
    /// positioned before the first row, owns all row iteration, and its
    /// return value passes through unmodified. The cursor stays valid until
    /// the mapper returns; the gateway reads no rows itself.
    fn fetch_rows_with<R, S, M>(
        &mut self,
        query: &Select,
        setup: S,
        map: M,
    ) -> Result<R, GatewayError>
    where
        S: FnOnce(&mut Command),
        M: for<'c> FnOnce(&mut Self::Cursor<'c>) -> Result<R, GatewayError>;

    /// Non-query execution: returns the driver's affected-row count.
    fn execute_with<S>(&mut self, statement: &Write, setup: S) -> Result<u64, GatewayError>
    where
        S: FnOnce(&mut Command);

    fn execute(&mut self, statement: &Write) -> Result<u64, GatewayError> {
        self.execute_with(statement, |_: &mut Command| {})
    }

    fn execute_ddl_with<S>(
        &mut self,
        query: &DataDefinitionQuery,
        setup: S,
    ) -> Result<u64, GatewayError>
    where
        S: FnOnce(&mut Command);

    fn execute_ddl(&mut self, query: &DataDefinitionQuery) -> Result<u64, GatewayError> {
        self.execute_ddl_with(query, |_: &mut Command| {})
    }

    /// Insert execution: runs the caller's INSERT unchanged, then returns
    /// the identity generated for the inserted row, read from the same
    /// session.
    fn insert_with<T, S>(&mut self, statement: &Insert, setup: S) -> Result<T, GatewayError>
    where
        T: FromScalar,
        S: FnOnce(&mut Command);

    fn insert<T>(&mut self, statement: &Insert) -> Result<T, GatewayError>
    where
        T: FromScalar,
    {
        self.insert_with(statement, |_: &mut Command| {})
    }

    /// Reachability probe: runs `SELECT 1` through the scalar path and
    /// reports success as a boolean. This is the one place errors are
    /// absorbed rather than propagated.
    fn test_connection(&mut self) -> bool {
        match self.fetch_scalar::<i64>(&Select::new("SELECT 1")) {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(error = %err, "connectivity probe failed");
                false
            }
        }
    }
}

/// Synchronous stored-procedure surface.
pub trait ProcedureDataGateway: QueryDataGateway {
    fn call_scalar_with<T, S>(
        &mut self,
        procedure: &StoredProcedure,
        setup: S,
    ) -> Result<Option<T>, GatewayError>
    where
        T: FromScalar,
        S: FnOnce(&mut Command);

    fn call_scalar<T>(&mut self, procedure: &StoredProcedure) -> Result<Option<T>, GatewayError>
    where
        T: FromScalar,
    {
        self.call_scalar_with(procedure, |_: &mut Command| {})
    }

    fn call_rows_with<R, S, M>(
        &mut self,
        procedure: &StoredProcedure,
        setup: S,
        map: M,
    ) -> Result<R, GatewayError>
    where
        S: FnOnce(&mut Command),
        M: for<'c> FnOnce(&mut Self::Cursor<'c>) -> Result<R, GatewayError>;

    fn call_with<S>(&mut self, procedure: &StoredProcedure, setup: S) -> Result<u64, GatewayError>
    where
        S: FnOnce(&mut Command);

    fn call(&mut self, procedure: &StoredProcedure) -> Result<u64, GatewayError> {
        self.call_with(procedure, |_: &mut Command| {})
    }
}

/// Asynchronous execution surface; mirrors the synchronous matrix with
/// suspend-on-I/O variants and async mapper callbacks. Cancellation follows
/// standard Tokio semantics: dropping the returned future abandons the call.
#[async_trait]
pub trait AsyncDataGateway {
    /// The live cursor type handed to async mapper callbacks. Owned, so the
    /// mapper can hold it across await points.
    type Cursor: Send;

    async fn fetch_scalar_with<T, S>(
        &self,
        query: &Select,
        setup: S,
    ) -> Result<Option<T>, GatewayError>
    where
        T: FromScalar + Send,
        S: FnOnce(&mut Command) + Send;

    async fn fetch_scalar<T>(&self, query: &Select) -> Result<Option<T>, GatewayError>
    where
        T: FromScalar + Send;

    async fn fetch_rows_with<R, S, M, Fut>(
        &self,
        query: &Select,
        setup: S,
        map: M,
    ) -> Result<R, GatewayError>
    where
        R: Send,
        S: FnOnce(&mut Command) + Send,
        M: FnOnce(Self::Cursor) -> Fut + Send,
        Fut: Future<Output = Result<R, GatewayError>> + Send;

    async fn execute_with<S>(&self, statement: &Write, setup: S) -> Result<u64, GatewayError>
    where
        S: FnOnce(&mut Command) + Send;

    async fn execute(&self, statement: &Write) -> Result<u64, GatewayError>;

    async fn execute_ddl_with<S>(
        &self,
        query: &DataDefinitionQuery,
        setup: S,
    ) -> Result<u64, GatewayError>
    where
        S: FnOnce(&mut Command) + Send;

    async fn execute_ddl(&self, query: &DataDefinitionQuery) -> Result<u64, GatewayError>;

    async fn insert_with<T, S>(&self, statement: &Insert, setup: S) -> Result<T, GatewayError>
    where
        T: FromScalar + Send,
        S: FnOnce(&mut Command) + Send;

    async fn insert<T>(&self, statement: &Insert) -> Result<T, GatewayError>
    where
        T: FromScalar + Send;

    async fn call_scalar_with<T, S>(
        &self,
        procedure: &StoredProcedure,
        setup: S,
    ) -> Result<Option<T>, GatewayError>
    where
        T: FromScalar + Send,
        S: FnOnce(&mut Command) + Send;

    async fn call_scalar<T>(&self, procedure: &StoredProcedure) -> Result<Option<T>, GatewayError>
    where
        T: FromScalar + Send;

    async fn call_rows_with<R, S, M, Fut>(
        &self,
        procedure: &StoredProcedure,
        setup: S,
        map: M,
    ) -> Result<R, GatewayError>
    where
        R: Send,
        S: FnOnce(&mut Command) + Send,
        M: FnOnce(Self::Cursor) -> Fut + Send,
        Fut: Future<Output = Result<R, GatewayError>> + Send;

    async fn call_with<S>(
        &self,
        procedure: &StoredProcedure,
        setup: S,
    ) -> Result<u64, GatewayError>
    where
        S: FnOnce(&mut Command) + Send;

    async fn call(&self, procedure: &StoredProcedure) -> Result<u64, GatewayError>;

    /// Async reachability probe; absorbs errors into `false`.
    async fn test_connection(&self) -> bool;
}
