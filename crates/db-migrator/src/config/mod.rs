//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::dialect::{Dialect, DialectResolver};
use crate::error::Result;
use std::path::Path;
use tracing::debug;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Target dialect with the configured quoting, normalizer and type
    /// overrides applied.
    pub fn target_dialect(&self, resolver: &DialectResolver) -> Result<Dialect> {
        let mut dialect =
            resolver.resolve_name(&self.target.dialect, self.target.version.as_deref())?;
        if let Some(quoting) = self.schema.identifier_quoting {
            dialect = dialect.with_quoting(quoting);
        }
        if let Some(normalizer) = self.schema.identifier_normalizer {
            dialect = dialect.with_normalizer(normalizer);
        }
        for type_override in &self.schema.type_overrides {
            debug!(
                "Type override {} -> {}",
                type_override.type_desc(),
                type_override.template
            );
            type_override.apply(dialect.registry_mut());
        }
        Ok(dialect)
    }
}

impl ConnectionConfig {
    /// `host:port/database`, safe to log.
    pub fn describe(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::Column;
    use crate::core::types::codes;
    use crate::core::IdentifierQuoting;
    use crate::transfer::ErrorPolicy;

    const MINIMAL: &str = "target:\n  dialect: nuodb\n";

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert!(config.source.is_none());
        assert_eq!(config.transfer.workers, 4);
        assert_eq!(config.transfer.batch_rows, 1000);
        assert_eq!(config.transfer.batch_bytes, 1024 * 1024);
        assert_eq!(config.transfer.format, "csv");
        assert_eq!(config.transfer.error_policy, ErrorPolicy::Abort);
        assert!(config.schema.fail_on_empty_scripts);
        assert_eq!(config.schema.object_kinds.len(), 7);
    }

    #[test]
    fn test_full_document() {
        let yaml = r#"
source:
  host: db.internal
  database: shop
  user: reader
  password: hunter2
  ssl_mode: require
target:
  dialect: mssql
  version: "2019"
  schema: dbo
schema:
  input: shop.yaml
  identifier_quoting: minimal
  group_scripts_by: meta_data_type
  script_kinds: [create]
  type_overrides:
    - type_code: 16
      template: TINYINT
transfer:
  workers: 2
  error_policy: skip
  format: bin
  format_options:
    csv.delimiter: ";"
  include_tables: [orders]
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let source = config.source.as_ref().unwrap();
        assert_eq!(source.port, 5432);
        assert_eq!(source.schema, "public");
        assert_eq!(source.describe(), "db.internal:5432/shop");
        assert_eq!(config.transfer.options().workers, 2);
        assert_eq!(config.transfer.format_options.get("csv.delimiter"), Some(";"));
        assert!(config.transfer.includes("ORDERS"));
        assert!(!config.transfer.includes("customers"));

        let dialect = config.target_dialect(&DialectResolver::with_builtins()).unwrap();
        assert_eq!(dialect.name(), "mssql");
        assert_eq!(dialect.quoting(), IdentifierQuoting::Minimal);
        let column = Column::new("active", codes::BOOLEAN, "BOOLEAN");
        assert_eq!(
            dialect.column_type_name(None, None, "t", &column).unwrap(),
            "TINYINT"
        );
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = Config::from_yaml("target: [").unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_CONFIG_ERROR);
    }

    #[test]
    fn test_missing_target_is_rejected() {
        assert!(Config::from_yaml("transfer:\n  workers: 2\n").is_err());
    }
}
