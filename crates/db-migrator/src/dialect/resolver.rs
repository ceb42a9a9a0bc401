//! Dialect resolver for explicit dependency injection.
//!
//! The [`DialectResolver`] maps database product names and short vendor keys
//! to dialect factories. It is constructed per run and passed to the jobs
//! that need it, so tests can register their own factories.

use std::collections::HashMap;

use crate::core::metadata::DatabaseInfo;
use crate::error::{MigrateError, Result};

use super::{vendors, Dialect};

/// Builds a dialect for one product version.
pub type DialectFactory = fn(DatabaseInfo) -> Dialect;

/// Registry of dialect factories keyed by lower-cased product name or alias.
#[derive(Default, Clone)]
pub struct DialectResolver {
    factories: HashMap<String, DialectFactory>,
    /// Alias -> product name used for the resolved [`DatabaseInfo`].
    products: HashMap<String, String>,
}

impl DialectResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver with the built-in vendors and their common spellings.
    pub fn with_builtins() -> Self {
        let mut resolver = Self::new();
        resolver.register(
            "PostgreSQL",
            &["postgres", "postgresql", "pg"],
            vendors::postgres,
        );
        resolver.register(
            "Microsoft SQL Server",
            &["mssql", "sqlserver", "sql_server"],
            vendors::mssql,
        );
        resolver.register("MySQL", &["mysql", "mariadb"], vendors::mysql);
        resolver.register("NuoDB", &["nuodb"], vendors::nuodb);
        resolver
    }

    /// Register a factory under a product name and its aliases.
    ///
    /// Re-registering a key replaces the previous factory.
    pub fn register(&mut self, product_name: &str, aliases: &[&str], factory: DialectFactory) {
        for key in std::iter::once(&product_name).chain(aliases.iter()) {
            let key = key.to_lowercase();
            self.factories.insert(key.clone(), factory);
            self.products.insert(key, product_name.to_string());
        }
    }

    /// Dialect for a product reported by a connection or a document.
    pub fn resolve(&self, info: &DatabaseInfo) -> Result<Dialect> {
        let key = info.product_name.to_lowercase();
        let factory = self.factories.get(&key).ok_or_else(|| {
            MigrateError::Config(format!(
                "Unknown database dialect: '{}'. Supported: {}",
                info.product_name,
                self.names().join(", ")
            ))
        })?;
        Ok(factory(info.clone()))
    }

    /// Dialect for a configured vendor key such as `mssql`, with an optional
    /// `major[.minor]` version.
    pub fn resolve_name(&self, name: &str, version: Option<&str>) -> Result<Dialect> {
        let key = name.to_lowercase();
        let product = self.products.get(&key).ok_or_else(|| {
            MigrateError::Config(format!(
                "Unknown database dialect: '{}'. Supported: {}",
                name,
                self.names().join(", ")
            ))
        })?;
        let mut info = DatabaseInfo::new(product.clone());
        if let Some(version) = version {
            let mut parts = version.split('.');
            let major = parts.next().and_then(|p| p.trim().parse::<u32>().ok());
            let minor = parts.next().and_then(|p| p.trim().parse::<u32>().ok());
            match major {
                Some(major) => info = info.with_version(major, minor.unwrap_or(0)),
                None => {
                    return Err(MigrateError::Config(format!(
                        "Invalid version '{}' for dialect {}",
                        version, name
                    )))
                }
            }
            info.product_version = Some(version.to_string());
        }
        self.resolve(&info)
    }

    /// Whether a name or alias is registered.
    pub fn has_dialect(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_lowercase())
    }

    /// Registered keys in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for DialectResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialectResolver")
            .field("dialects", &self.names())
            .finish()
    }
}
