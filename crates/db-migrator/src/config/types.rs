//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::connection::SslMode;
use crate::core::identifier::{IdentifierNormalizer, IdentifierQuoting};
use crate::core::types::{JdbcTypeDesc, SizeSpec};
use crate::dialect::{InsertKind, TypeRegistry};
use crate::script::{GroupScriptsBy, ObjectKind, ScriptKind};
use crate::transfer::{CommitPolicy, ErrorPolicy, FormatOptions, TransferOptions};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Live source database, required by capture and dump.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ConnectionConfig>,

    pub target: TargetConfig,

    #[serde(default)]
    pub schema: SchemaConfig,

    #[serde(default)]
    pub transfer: TransferConfig,
}

/// A live database connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Driver type (only "postgres" is supported).
    #[serde(default = "default_postgres")]
    pub r#type: String,

    pub host: String,

    /// Port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    pub database: String,

    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Schema to read from or write to (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    #[serde(default)]
    pub ssl_mode: SslMode,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Target dialect, plus where its scripts and rows go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Dialect name or alias (mysql, mssql, postgres, nuodb).
    pub dialect: String,

    /// Target version, e.g. "16" or "2019.1".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionConfig>,

    /// Catalog generated names are qualified with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,

    /// Schema generated names are qualified with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

/// DDL generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Schema document to generate from instead of a live source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,

    /// Script file; stdout when neither this nor a target connection is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Where the capture command writes the schema document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<PathBuf>,

    #[serde(default = "ObjectKind::all")]
    pub object_kinds: Vec<ObjectKind>,

    #[serde(default = "default_script_kinds")]
    pub script_kinds: Vec<ScriptKind>,

    #[serde(default)]
    pub group_scripts_by: GroupScriptsBy,

    /// Defaults to the dialect's own quoting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier_quoting: Option<IdentifierQuoting>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier_normalizer: Option<IdentifierNormalizer>,

    /// Treat an empty script as an error (default: true).
    #[serde(default = "default_true")]
    pub fail_on_empty_scripts: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_overrides: Vec<TypeOverride>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            input: None,
            output: None,
            capture: None,
            object_kinds: ObjectKind::all(),
            script_kinds: default_script_kinds(),
            group_scripts_by: GroupScriptsBy::default(),
            identifier_quoting: None,
            identifier_normalizer: None,
            fail_on_empty_scripts: true,
            type_overrides: Vec::new(),
        }
    }
}

/// A user-supplied type template for the target registry.
///
/// ```yaml
/// type_code: 12
/// type_name: UNIQUEIDENTIFIER
/// size: 36
/// template: "CHAR(36)"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeOverride {
    pub type_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<i32>,
    /// Restrict the override to metadata read from this source product.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    pub template: String,
}

impl TypeOverride {
    pub fn type_desc(&self) -> JdbcTypeDesc {
        match &self.type_name {
            Some(name) => JdbcTypeDesc::new(self.type_code, name),
            None => JdbcTypeDesc::of_code(self.type_code),
        }
    }

    pub fn apply(&self, registry: &mut TypeRegistry) {
        registry.register_type(
            self.vendor.as_deref(),
            self.type_desc(),
            SizeSpec::new(self.size, self.precision, self.scale),
            self.template.clone(),
        );
    }
}

/// Dump and load settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Tables transferred in parallel (default: 4).
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Rows per commit (default: 1000).
    #[serde(default = "default_batch_rows")]
    pub batch_rows: usize,

    /// Approximate bytes per commit (default: 1 MiB).
    #[serde(default = "default_batch_bytes")]
    pub batch_bytes: usize,

    #[serde(default)]
    pub error_policy: ErrorPolicy,

    #[serde(default)]
    pub fail_fast: bool,

    /// Row format name (default: "csv").
    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default, skip_serializing_if = "FormatOptions::is_empty")]
    pub format_options: FormatOptions,

    /// Directory holding one file per table (default: "dump").
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Tables to transfer; empty means every table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_tables: Vec<String>,

    /// Session time zone for source and target connections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,

    #[serde(default)]
    pub insert_kind: InsertKind,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            batch_rows: default_batch_rows(),
            batch_bytes: default_batch_bytes(),
            error_policy: ErrorPolicy::default(),
            fail_fast: false,
            format: default_format(),
            format_options: FormatOptions::default(),
            directory: default_directory(),
            include_tables: Vec::new(),
            time_zone: None,
            insert_kind: InsertKind::default(),
        }
    }
}

impl TransferConfig {
    pub fn options(&self) -> TransferOptions {
        TransferOptions {
            workers: self.workers,
            commit: CommitPolicy {
                rows: self.batch_rows,
                bytes: self.batch_bytes,
            },
            error_policy: self.error_policy,
            fail_fast: self.fail_fast,
        }
    }

    /// Whether `table` passes the include filter (case-insensitive).
    pub fn includes(&self, table: &str) -> bool {
        self.include_tables.is_empty()
            || self
                .include_tables
                .iter()
                .any(|t| t.eq_ignore_ascii_case(table))
    }
}

fn default_postgres() -> String {
    "postgres".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_script_kinds() -> Vec<ScriptKind> {
    vec![ScriptKind::Drop, ScriptKind::Create]
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    4
}

fn default_batch_rows() -> usize {
    1000
}

fn default_batch_bytes() -> usize {
    1024 * 1024
}

fn default_format() -> String {
    "csv".to_string()
}

fn default_directory() -> PathBuf {
    PathBuf::from("dump")
}
