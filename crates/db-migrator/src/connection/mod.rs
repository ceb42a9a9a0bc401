//! Live database connections.

pub mod postgres;
pub mod tls;

pub use postgres::{ConnectionExporter, PgConnection, PgRowSink, PgRowSource};
pub use tls::{make_tls_connect, SslMode};
