//! Error types for the migration library.

use thiserror::Error;

/// Exit code for configuration problems.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for connection and driver failures.
pub const EXIT_CONNECTIVITY_ERROR: u8 = 2;
/// Exit code for unresolvable column types.
pub const EXIT_TYPE_ERROR: u8 = 3;
/// Exit code for DDL generation failures.
pub const EXIT_SCRIPT_ERROR: u8 = 4;
/// Exit code for row encode/decode failures.
pub const EXIT_TRANSFER_ERROR: u8 = 5;
/// Exit code for a cancelled run.
pub const EXIT_CANCELLED: u8 = 6;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;
/// Exit code for malformed metadata or documents.
pub const EXIT_METADATA_ERROR: u8 = 8;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, bad option values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection or driver failure with context
    #[error("Connectivity error: {message}\n  Context: {context}")]
    Connectivity { message: String, context: String },

    /// Driver error raised by the PostgreSQL client
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A type that neither the registry nor its aliases can resolve
    #[error("Type not supported: {type_desc} (column {column})")]
    TypeNotSupported { type_desc: String, column: String },

    /// DDL rendering or ordering failure for one object
    #[error("Script generation failed for {object}: {message}")]
    ScriptGeneration { object: String, message: String },

    /// Value encode/decode failure
    #[error("Transfer failed for table {table}{}{}: {message}",
        .row.map(|r| format!(" at row {}", r)).unwrap_or_default(),
        .column.as_ref().map(|c| format!(", column {}", c)).unwrap_or_default())]
    ValueTransfer {
        table: String,
        row: Option<u64>,
        column: Option<String>,
        message: String,
    },

    /// Model invariant violated (missing column, duplicate name, dangling reference)
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Connectivity error with context about where it occurred
    pub fn connectivity(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Connectivity {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a TypeNotSupported error
    pub fn type_not_supported(type_desc: impl ToString, column: impl Into<String>) -> Self {
        MigrateError::TypeNotSupported {
            type_desc: type_desc.to_string(),
            column: column.into(),
        }
    }

    /// Create a ScriptGeneration error
    pub fn script(object: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::ScriptGeneration {
            object: object.into(),
            message: message.into(),
        }
    }

    /// Create a ValueTransfer error without row context
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::ValueTransfer {
            table: table.into(),
            row: None,
            column: None,
            message: message.into(),
        }
    }

    /// Attach row and column context to a ValueTransfer error.
    ///
    /// Other variants are wrapped into a ValueTransfer error so the report
    /// always carries the table and row ordinal.
    pub fn at_row(self, table: &str, row: u64, column: Option<&str>) -> Self {
        match self {
            MigrateError::ValueTransfer {
                message,
                column: existing,
                ..
            } => MigrateError::ValueTransfer {
                table: table.to_string(),
                row: Some(row),
                column: existing.or_else(|| column.map(str::to_string)),
                message,
            },
            other => MigrateError::ValueTransfer {
                table: table.to_string(),
                row: Some(row),
                column: column.map(str::to_string),
                message: other.to_string(),
            },
        }
    }

    /// Whether this error belongs to the value transfer category.
    pub fn is_value_transfer(&self) -> bool {
        matches!(self, MigrateError::ValueTransfer { .. })
    }

    /// Short category name used in run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => "configuration",
            MigrateError::Connectivity { .. } | MigrateError::Database(_) => "connectivity",
            MigrateError::TypeNotSupported { .. } => "type_resolution",
            MigrateError::ScriptGeneration { .. } => "script_generation",
            MigrateError::ValueTransfer { .. } => "value_transfer",
            MigrateError::Metadata(_) | MigrateError::Json(_) => "metadata",
            MigrateError::Io(_) => "io",
            MigrateError::Cancelled => "cancelled",
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => EXIT_CONFIG_ERROR,
            MigrateError::Connectivity { .. } | MigrateError::Database(_) => {
                EXIT_CONNECTIVITY_ERROR
            }
            MigrateError::TypeNotSupported { .. } => EXIT_TYPE_ERROR,
            MigrateError::ScriptGeneration { .. } => EXIT_SCRIPT_ERROR,
            MigrateError::ValueTransfer { .. } => EXIT_TRANSFER_ERROR,
            MigrateError::Cancelled => EXIT_CANCELLED,
            MigrateError::Io(_) => EXIT_IO_ERROR,
            MigrateError::Metadata(_) | MigrateError::Json(_) => EXIT_METADATA_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
