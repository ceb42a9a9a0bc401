//! Persisted schema description.
//!
//! A captured [`Database`] is written as YAML or JSON (chosen by file
//! extension) so DDL can be regenerated later without a live connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::metadata::Database;
use crate::error::{MigrateError, Result};

/// Current document layout version.
pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
    pub database: Database,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }
}

impl SchemaDocument {
    pub fn new(database: Database) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            captured_at: Some(Utc::now()),
            database,
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let document: SchemaDocument = serde_yaml::from_str(yaml)?;
        document.check()?;
        Ok(document)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let document: SchemaDocument = serde_json::from_str(json)?;
        document.check()?;
        Ok(document)
    }

    /// Load a document and re-validate the model it describes.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let document = match DocumentFormat::from_path(path) {
            DocumentFormat::Json => Self::from_json(&content)?,
            DocumentFormat::Yaml => Self::from_yaml(&content)?,
        };
        info!(
            "Loaded schema document {:?} ({} tables)",
            path,
            document.database.tables().count()
        );
        Ok(document)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match DocumentFormat::from_path(path) {
            DocumentFormat::Json => self.to_json()?,
            DocumentFormat::Yaml => self.to_yaml()?,
        };
        std::fs::write(path, content)?;
        info!("Wrote schema document {:?}", path);
        Ok(())
    }

    fn check(&self) -> Result<()> {
        if self.version > DOCUMENT_VERSION {
            return Err(MigrateError::Metadata(format!(
                "Schema document version {} is newer than supported version {}",
                self.version, DOCUMENT_VERSION
            )));
        }
        self.database.validate()
    }
}
