//! Thin sync/async data-access gateways over rusqlite and tokio-postgres.
//!
//! Callers wrap SQL text in a query-kind type ([`Select`], [`Write`],
//! [`Insert`], [`DataDefinitionQuery`], [`StoredProcedure`]) and hand it to
//! a gateway, which routes it to the matching driver call: scalar read,
//! non-query write, insert with identity return, cursor with a
//! caller-supplied mapper, or stored-procedure invocation. Parameters are
//! bound through a per-call setup callback; mappers own all row iteration.
//!
//! Two gateways are provided: [`EmbeddedGateway`] (SQLite, synchronous) and
//! [`ServerGateway`] (PostgreSQL, asynchronous, with a blocking facade in
//! [`blocking`]).

#[cfg(feature = "postgres")]
pub mod blocking;
pub mod command;
pub mod error;
pub mod gateway;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod statement;
pub mod value;

pub use command::{Command, CommandKind};
pub use error::GatewayError;
pub use gateway::{AsyncDataGateway, ProcedureDataGateway, QueryDataGateway};
pub use statement::{DataDefinitionQuery, Insert, Select, StoredProcedure, Write};
pub use value::{FromScalar, SqlValue};

#[cfg(feature = "postgres")]
pub use blocking::{BlockingRowCursor, BlockingServerGateway};
#[cfg(feature = "postgres")]
pub use postgres::{RowCursor, ServerGateway};
#[cfg(feature = "sqlite")]
pub use sqlite::{ConnectionMode, EmbeddedGateway};

#[cfg(feature = "sqlite")]
pub use rusqlite;
#[cfg(feature = "postgres")]
pub use tokio_postgres;
