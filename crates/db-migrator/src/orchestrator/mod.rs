//! Job coordinator: schema generation, capture, dump and load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Config, ConnectionConfig};
use crate::connection::PgConnection;
use crate::core::identifier::IdentifierQuoting;
use crate::core::metadata::{Database, DatabaseInfo, Table};
use crate::core::SchemaDocument;
use crate::dialect::{Capabilities, Dialect, DialectResolver};
use crate::error::{MigrateError, Result};
use crate::script::{
    export_scripts, generate, CompositeExporter, FileExporter, GenerationScope, ScriptContext,
};
use crate::transfer::{
    bind_input, run_units, table_file, CodecRegistry, FileRowSink, FileRowSource,
    FormatRegistry, ReportedError, TransferReport, TransferUnit, UnitReport, UnitStatus,
    ValueHandle,
};

/// Final state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Result of one command, serialized for `--output-json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run identifier.
    pub run_id: String,

    pub command: String,

    pub status: RunStatus,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,

    pub duration_seconds: f64,

    /// Statements exported by the schema command.
    pub statements: usize,

    /// Per-table transfer results, in table order.
    pub tables: Vec<UnitReport>,

    pub rows_transferred: u64,

    pub errors: Vec<ReportedError>,
}

impl RunReport {
    fn start(command: &str) -> Self {
        let now = Utc::now();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            command: command.to_string(),
            status: RunStatus::Completed,
            started_at: now,
            finished_at: now,
            duration_seconds: 0.0,
            statements: 0,
            tables: Vec::new(),
            rows_transferred: 0,
            errors: Vec::new(),
        }
    }

    fn absorb(&mut self, transfer: TransferReport) {
        self.rows_transferred += transfer.total_rows();
        self.tables.extend(transfer.units);
        self.errors.extend(transfer.errors);
    }

    fn finish(mut self, cancel: &CancellationToken) -> Self {
        self.finished_at = Utc::now();
        self.duration_seconds =
            (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        let interrupted = self
            .tables
            .iter()
            .any(|t| matches!(t.status, UnitStatus::Cancelled | UnitStatus::Partial));
        self.status = if !self.errors.is_empty() {
            RunStatus::Failed
        } else if cancel.is_cancelled() || interrupted {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };
        info!(
            "{} {:?}: {} tables, {} rows, {} errors in {:.1}s",
            self.command,
            self.status,
            self.tables.len(),
            self.rows_transferred,
            self.errors.len(),
            self.duration_seconds
        );
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Resolved settings printed by the check command.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub dialect: String,
    pub product: DatabaseInfo,
    pub quoting: IdentifierQuoting,
    pub capabilities: Capabilities,
    pub format: String,
    pub available_dialects: Vec<String>,
    pub available_formats: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_connection: Option<String>,
}

/// Runs the commands of one configuration.
pub struct Orchestrator {
    config: Config,
    resolver: DialectResolver,
    codecs: CodecRegistry,
    formats: FormatRegistry,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            resolver: DialectResolver::with_builtins(),
            codecs: CodecRegistry::with_defaults(),
            formats: FormatRegistry::with_builtins(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve the target dialect and format without connecting anywhere.
    pub fn check(&self) -> Result<CheckReport> {
        let dialect = self.config.target_dialect(&self.resolver)?;
        let transfer = &self.config.transfer;
        self.formats.create(&transfer.format, &[], &transfer.format_options)?;
        Ok(CheckReport {
            dialect: dialect.name().to_string(),
            product: dialect.info().clone(),
            quoting: dialect.quoting(),
            capabilities: *dialect.capabilities(),
            format: transfer.format.clone(),
            available_dialects: self.resolver.names(),
            available_formats: self.formats.names(),
            source: self.config.source.as_ref().map(ConnectionConfig::describe),
            target_connection: self
                .config
                .target
                .connection
                .as_ref()
                .map(ConnectionConfig::describe),
        })
    }

    /// Generate DDL for the target dialect and export it.
    pub async fn schema(&self, cancel: CancellationToken) -> Result<RunReport> {
        let mut report = RunReport::start("schema");
        let target = self.config.target_dialect(&self.resolver)?;

        info!("Phase 1: Loading source metadata");
        let database = self.load_metadata().await?;
        let source = self.source_dialect(database.info.as_ref());

        info!("Phase 2: Generating {} scripts", target.name());
        let settings = &self.config.schema;
        let ctx = ScriptContext::new(&target)
            .with_source(source.as_ref(), database.info.clone())
            .with_object_kinds(settings.object_kinds.iter().copied())
            .with_script_kinds(settings.script_kinds.iter().copied())
            .with_group_scripts_by(settings.group_scripts_by)
            .with_target(
                self.config.target.catalog.clone(),
                self.config.target.schema.clone(),
            );
        let generated = generate(&ctx, &database, GenerationScope::Database)?;
        for err in &generated.errors {
            warn!("{}", err);
            report.errors.push(ReportedError::new("schema", err));
        }

        if cancel.is_cancelled() {
            return Err(MigrateError::Cancelled);
        }

        info!("Phase 3: Exporting scripts");
        let mut exporter = CompositeExporter::new();
        if let Some(connection) = &self.config.target.connection {
            exporter.push(Box::new(PgConnection::connect(connection, 1).await?.exporter()));
        }
        if let Some(path) = &settings.output {
            exporter.push(Box::new(FileExporter::new(path)));
        }
        let mut exporter = exporter.or_stdout();
        report.statements = export_scripts(
            &mut exporter,
            &generated.statements,
            settings.fail_on_empty_scripts,
        )
        .await?;

        Ok(report.finish(&cancel))
    }

    /// Introspect the source and write the schema document.
    pub async fn capture(&self) -> Result<RunReport> {
        let report = RunReport::start("capture");
        let path = self
            .config
            .schema
            .capture
            .as_ref()
            .ok_or_else(|| MigrateError::Config("schema.capture is required".into()))?;

        info!("Phase 1: Reading source schema");
        let (_, database) = self.introspect_source(1).await?;

        info!("Phase 2: Writing schema document");
        SchemaDocument::new(database).save(path)?;
        Ok(report.finish(&CancellationToken::new()))
    }

    /// Copy every source table into `<directory>/<table>.<format>`.
    pub async fn dump(&self, cancel: CancellationToken) -> Result<RunReport> {
        let mut report = RunReport::start("dump");
        let transfer = &self.config.transfer;

        info!("Phase 1: Reading source schema");
        let (connection, database) = self.introspect_source(transfer.workers + 1).await?;
        let source = self.source_dialect(database.info.as_ref());
        let session_sql = session_sql(source.as_ref(), transfer.time_zone.as_deref());

        info!("Phase 2: Dumping tables to {}", transfer.directory.display());
        let mut units = Vec::new();
        for table in transfer_tables(&database) {
            let handles = match self.bind(table, source.as_ref(), &mut report) {
                Some(handles) => handles,
                None => continue,
            };
            let codec = self
                .formats
                .create(&transfer.format, &handles, &transfer.format_options)?;
            let path = table_file(&transfer.directory, &table.name, &transfer.format);
            let reader = connection.row_source(
                table,
                handles,
                transfer.batch_rows.max(1),
                session_sql.clone(),
            );
            units.push(TransferUnit::new(
                &table.name,
                Box::new(reader),
                Box::new(FileRowSink::new(path, codec)),
            ));
        }

        report.absorb(run_units(units, &transfer.options(), cancel.clone()).await?);
        Ok(report.finish(&cancel))
    }

    /// Insert every `<directory>/<table>.<format>` file into the target.
    pub async fn load(&self, cancel: CancellationToken) -> Result<RunReport> {
        let mut report = RunReport::start("load");
        let transfer = &self.config.transfer;
        let connection_config = self.config.target.connection.as_ref().ok_or_else(|| {
            MigrateError::Config("target.connection is required for load".into())
        })?;
        let target = Arc::new(self.config.target_dialect(&self.resolver)?);

        info!("Phase 1: Reading target schema");
        let connection = PgConnection::connect(connection_config, transfer.workers + 1).await?;
        let database = connection
            .introspect(target.registry(), |t| transfer.includes(t))
            .await?;
        let session_sql = session_sql(Some(&target), transfer.time_zone.as_deref());

        info!("Phase 2: Loading tables from {}", transfer.directory.display());
        let mut units = Vec::new();
        for table in transfer_tables(&database) {
            let path = table_file(&transfer.directory, &table.name, &transfer.format);
            if !path.exists() {
                if transfer.include_tables.is_empty() {
                    info!("{}: no {} file, skipping", table.name, transfer.format);
                } else {
                    warn!("{}: {} does not exist", table.name, path.display());
                }
                continue;
            }
            let handles = match self.bind(table, Some(&target), &mut report) {
                Some(handles) => handles,
                None => continue,
            };
            let codec = self
                .formats
                .create(&transfer.format, &handles, &transfer.format_options)?;
            let sink = connection.row_sink(
                table,
                Arc::clone(&target),
                transfer.insert_kind,
                session_sql.clone(),
            );
            units.push(TransferUnit::new(
                &table.name,
                Box::new(FileRowSource::new(path, codec)),
                Box::new(sink),
            ));
        }

        report.absorb(run_units(units, &transfer.options(), cancel.clone()).await?);
        Ok(report.finish(&cancel))
    }

    /// Metadata from `schema.input`, or from the live source.
    async fn load_metadata(&self) -> Result<Database> {
        match &self.config.schema.input {
            Some(path) => Ok(SchemaDocument::load(path)?.database),
            None if self.config.source.is_some() => Ok(self.introspect_source(1).await?.1),
            None => Err(MigrateError::Config(
                "schema.input or source is required".into(),
            )),
        }
    }

    async fn introspect_source(&self, max_conns: usize) -> Result<(PgConnection, Database)> {
        let config = self
            .config
            .source
            .as_ref()
            .ok_or_else(|| MigrateError::Config("source is required".into()))?;
        let connection = PgConnection::connect(config, max_conns).await?;
        let info = connection.database_info().await?;
        let dialect = self.resolver.resolve(&info)?;
        let transfer = &self.config.transfer;
        let database = connection
            .introspect(dialect.registry(), |t| transfer.includes(t))
            .await?;
        Ok((connection, database))
    }

    /// Dialect the metadata was read with, when its product is known.
    fn source_dialect(&self, info: Option<&DatabaseInfo>) -> Option<Dialect> {
        let info = info?;
        match self.resolver.resolve(info) {
            Ok(dialect) => Some(dialect),
            Err(e) => {
                warn!("No source dialect for {}: {}", info, e);
                None
            }
        }
    }

    /// Bind a table's columns, recording a failure against the table.
    fn bind(
        &self,
        table: &Table,
        dialect: Option<&Dialect>,
        report: &mut RunReport,
    ) -> Option<Vec<ValueHandle>> {
        match bind_input(&table.name, table.columns(), dialect, &self.codecs) {
            Ok(handles) => Some(handles),
            Err(e) => {
                warn!("{}: {}", table.name, e);
                report.errors.push(ReportedError::new(&table.name, &e));
                None
            }
        }
    }
}

/// Base tables of the model, in model order.
fn transfer_tables(database: &Database) -> impl Iterator<Item = &Table> {
    database
        .tables()
        .map(|entry| entry.table)
        .filter(|table| !table.is_view())
}

fn session_sql(dialect: Option<&Dialect>, time_zone: Option<&str>) -> Option<String> {
    let time_zone = time_zone?;
    let sql = dialect.and_then(|d| d.session_time_zone_sql(time_zone));
    if sql.is_none() {
        warn!("Session time zone {} is not supported, ignoring", time_zone);
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::{Column, Schema};
    use crate::core::types::codes;
    use tempfile::tempdir;

    fn document(path: &std::path::Path) {
        let mut database = Database::new(Some(DatabaseInfo::new("PostgreSQL").with_version(16, 0)));
        let schema: &mut Schema = database.schema_mut(None, Some("public"));
        let table = schema.add_table(Table::new("customers")).unwrap();
        table
            .add_column(Column::new("id", codes::INTEGER, "INT4").not_null())
            .unwrap();
        table
            .add_column(Column::new("name", codes::VARCHAR, "VARCHAR").with_size(40))
            .unwrap();
        schema
            .add_table(Table::view("active", "SELECT id FROM customers"))
            .unwrap();
        SchemaDocument::new(database).save(path).unwrap();
    }

    fn config(yaml: &str) -> Config {
        Config::from_yaml(yaml).unwrap()
    }

    #[tokio::test]
    async fn test_schema_from_document_to_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("shop.yaml");
        let output = dir.path().join("shop.sql");
        document(&input);

        let yaml = format!(
            "target:\n  dialect: mysql\nschema:\n  input: {}\n  output: {}\n  script_kinds: [create]\n",
            input.display(),
            output.display()
        );
        let report = Orchestrator::new(config(&yaml))
            .schema(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert!(report.statements >= 2);
        let sql = std::fs::read_to_string(&output).unwrap();
        assert!(sql.contains("CREATE TABLE `customers`"), "{}", sql);
        assert!(sql.contains("VARCHAR(40)"), "{}", sql);
        assert!(sql.contains("CREATE VIEW"), "{}", sql);
    }

    #[tokio::test]
    async fn test_schema_without_metadata_is_config_error() {
        let err = Orchestrator::new(config("target:\n  dialect: nuodb\n"))
            .schema(CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }

    #[tokio::test]
    async fn test_schema_cancelled_before_export() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("shop.json");
        let output = dir.path().join("shop.sql");
        document(&input);
        let yaml = format!(
            "target:\n  dialect: nuodb\nschema:\n  input: {}\n  output: {}\n",
            input.display(),
            output.display()
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = Orchestrator::new(config(&yaml))
            .schema(cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Cancelled));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_capture_requires_path() {
        let err = Orchestrator::new(config("target:\n  dialect: nuodb\n"))
            .capture()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("schema.capture is required"));
    }

    #[tokio::test]
    async fn test_load_requires_target_connection() {
        let err = Orchestrator::new(config("target:\n  dialect: postgres\n"))
            .load(CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("target.connection is required"));
    }

    #[test]
    fn test_check_reports_dialect() {
        let check = Orchestrator::new(config(
            "target:\n  dialect: sqlserver\n  version: \"13\"\nschema:\n  identifier_quoting: none\n",
        ))
        .check()
        .unwrap();
        assert_eq!(check.dialect, "mssql");
        assert_eq!(check.quoting, IdentifierQuoting::None);
        assert!(check.capabilities.if_exists_before_table || check.capabilities.if_exists_after_table);
        assert_eq!(check.available_formats, vec!["bin", "csv"]);
        let json = serde_json::to_value(&check).unwrap();
        assert!(json.get("source").is_none());
    }

    #[test]
    fn test_report_status_and_json() {
        let cancel = CancellationToken::new();
        let mut report = RunReport::start("dump");
        report.absorb(TransferReport {
            units: vec![UnitReport {
                name: "orders".into(),
                status: UnitStatus::Completed,
                rows: 7,
                skipped: 0,
                batches: 1,
                duration_ms: 2,
                error: None,
            }],
            errors: vec![],
        });
        let report = report.finish(&cancel);
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.rows_transferred, 7);

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["tables"][0]["name"], "orders");
        assert!(uuid::Uuid::parse_str(json["run_id"].as_str().unwrap()).is_ok());

        let mut failed = RunReport::start("load");
        failed.errors.push(ReportedError::new(
            "orders",
            &MigrateError::transfer("orders", "bad value"),
        ));
        assert_eq!(failed.finish(&cancel).status, RunStatus::Failed);

        cancel.cancel();
        assert_eq!(
            RunReport::start("dump").finish(&cancel).status,
            RunStatus::Cancelled
        );
    }

    #[test]
    fn test_transfer_tables_skip_views() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("shop.yaml");
        document(&input);
        let database = SchemaDocument::load(&input).unwrap().database;
        let names: Vec<&str> = transfer_tables(&database).map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["customers"]);
    }
}
