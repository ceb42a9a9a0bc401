//! Configuration validation.

use super::{Config, ConnectionConfig};
use crate::dialect::DialectResolver;
use crate::error::{MigrateError, Result};
use crate::transfer::FormatRegistry;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if let Some(source) = &config.source {
        validate_connection("source", source)?;
    }

    // Target validation
    if config.target.dialect.trim().is_empty() {
        return Err(MigrateError::Config("target.dialect is required".into()));
    }
    let dialect = DialectResolver::with_builtins()
        .resolve_name(&config.target.dialect, config.target.version.as_deref())?;
    if let Some(connection) = &config.target.connection {
        validate_connection("target.connection", connection)?;
        if dialect.name() != "postgres" {
            return Err(MigrateError::Config(format!(
                "target.connection only supports the postgres dialect, got '{}'",
                config.target.dialect
            )));
        }
    }

    // Cannot migrate to the same database
    if let (Some(source), Some(target)) = (&config.source, &config.target.connection) {
        if source.host == target.host
            && source.port == target.port
            && source.database == target.database
            && source.schema == target.schema
        {
            return Err(MigrateError::Config(
                "source and target cannot be the same schema".into(),
            ));
        }
    }

    for (i, type_override) in config.schema.type_overrides.iter().enumerate() {
        if type_override.template.trim().is_empty() {
            return Err(MigrateError::Config(format!(
                "schema.type_overrides[{}].template is required",
                i
            )));
        }
    }

    let transfer = &config.transfer;
    if transfer.workers == 0 {
        return Err(MigrateError::Config(
            "transfer.workers must be at least 1".into(),
        ));
    }
    if transfer.batch_rows == 0 && transfer.batch_bytes == 0 {
        return Err(MigrateError::Config(
            "transfer.batch_rows or transfer.batch_bytes must be set".into(),
        ));
    }
    // Building a codec with no columns checks the format name and its options.
    FormatRegistry::with_builtins().create(&transfer.format, &[], &transfer.format_options)?;

    Ok(())
}

fn validate_connection(prefix: &str, connection: &ConnectionConfig) -> Result<()> {
    if connection.host.is_empty() {
        return Err(MigrateError::Config(format!("{}.host is required", prefix)));
    }
    if connection.database.is_empty() {
        return Err(MigrateError::Config(format!(
            "{}.database is required",
            prefix
        )));
    }
    if connection.user.is_empty() {
        return Err(MigrateError::Config(format!("{}.user is required", prefix)));
    }
    if connection.r#type != "postgres" {
        return Err(MigrateError::Config(format!(
            "{}.type must be 'postgres', got '{}'",
            prefix, connection.r#type
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SchemaConfig, TargetConfig, TransferConfig, TypeOverride};
    use crate::connection::SslMode;

    fn connection(database: &str) -> ConnectionConfig {
        ConnectionConfig {
            r#type: "postgres".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            database: database.to_string(),
            user: "postgres".to_string(),
            password: "password".to_string(),
            schema: "public".to_string(),
            ssl_mode: SslMode::Disable,
        }
    }

    fn valid_config() -> Config {
        Config {
            source: Some(connection("source_db")),
            target: TargetConfig {
                dialect: "nuodb".to_string(),
                version: None,
                connection: None,
                catalog: None,
                schema: None,
            },
            schema: SchemaConfig::default(),
            transfer: TransferConfig::default(),
        }
    }

    fn message(config: &Config) -> String {
        validate(config).unwrap_err().to_string()
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_source_host() {
        let mut config = valid_config();
        config.source.as_mut().unwrap().host = String::new();
        assert!(message(&config).contains("source.host is required"));
    }

    #[test]
    fn test_unknown_dialect() {
        let mut config = valid_config();
        config.target.dialect = "oracle".to_string();
        assert!(message(&config).contains("Unknown database dialect"));
    }

    #[test]
    fn test_empty_dialect() {
        let mut config = valid_config();
        config.target.dialect = " ".to_string();
        assert!(message(&config).contains("target.dialect is required"));
    }

    #[test]
    fn test_target_connection_needs_postgres_dialect() {
        let mut config = valid_config();
        config.target.connection = Some(connection("target_db"));
        assert!(message(&config).contains("only supports the postgres dialect"));

        config.target.dialect = "PostgreSQL".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_same_source_and_target() {
        let mut config = valid_config();
        config.target.dialect = "postgres".to_string();
        config.target.connection = Some(connection("source_db"));
        assert!(message(&config).contains("cannot be the same"));
    }

    #[test]
    fn test_zero_workers() {
        let mut config = valid_config();
        config.transfer.workers = 0;
        assert!(message(&config).contains("transfer.workers"));
    }

    #[test]
    fn test_unknown_format_and_bad_options() {
        let mut config = valid_config();
        config.transfer.format = "xml".to_string();
        assert!(message(&config).contains("available: bin, csv"));

        let mut config = valid_config();
        config.transfer.format_options.set("csv.delimiter", "ab");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_type_override_needs_template() {
        let mut config = valid_config();
        config.schema.type_overrides.push(TypeOverride {
            type_code: 12,
            type_name: None,
            size: None,
            precision: None,
            scale: None,
            vendor: None,
            template: String::new(),
        });
        assert!(message(&config).contains("schema.type_overrides[0].template is required"));
    }

    #[test]
    fn test_connection_debug_redacts_password() {
        let mut source = connection("db");
        source.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", source);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_password_123"));
    }
}
