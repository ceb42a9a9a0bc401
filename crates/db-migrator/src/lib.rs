//! # db-migrator
//!
//! Heterogeneous database migration library.
//!
//! This library moves schemas and rows between database products:
//!
//! - **Metadata model** of catalogs, schemas, tables, views and sequences,
//!   persisted as YAML or JSON documents
//! - **Vendor dialects** for PostgreSQL, MySQL, SQL Server and NuoDB with
//!   type registries, aliases and identifier quoting
//! - **DDL generation** ordered by foreign-key dependencies, exported to
//!   files, stdout or a live connection
//! - **Typed row transfer** through CSV and binary formats with batched
//!   commits and parallel per-table units
//!
//! ## Example
//!
//! ```rust,no_run
//! use db_migrator::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> db_migrator::Result<()> {
//! let config = Config::load("config.yaml")?;
//! let report = Orchestrator::new(config)
//!     .schema(CancellationToken::new())
//!     .await?;
//! println!("Exported {} statements", report.statements);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod core;
pub mod dialect;
pub mod error;
pub mod orchestrator;
pub mod script;
pub mod transfer;

// Re-exports for convenient access
pub use config::{Config, ConnectionConfig, SchemaConfig, TargetConfig, TransferConfig};
pub use crate::core::{Database, SchemaDocument, Value};
pub use dialect::{Dialect, DialectResolver};
pub use error::{MigrateError, Result};
pub use orchestrator::{CheckReport, Orchestrator, RunReport, RunStatus};
pub use transfer::{FormatRegistry, TransferReport};
