use thiserror::Error;

/// Error type shared by every gateway in this crate.
///
/// Driver errors are wrapped transparently and propagate to the caller
/// unchanged; the gateways add no retry or translation layer. The only
/// place an error is deliberately absorbed is the `test_connection`
/// reachability probe, which reports `false` instead.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// A query-kind wrapper rejected its text at construction time.
    #[error("invalid statement: {0}")]
    InvalidStatement(String),

    #[error("connection error: {0}")]
    Connection(String),

    /// A scalar result could not be converted to the requested type.
    #[error("scalar conversion error: {0}")]
    ScalarConversion(String),

    /// The operation is not applicable to this backend.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Failure building the runtime that backs the blocking facade.
    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}
