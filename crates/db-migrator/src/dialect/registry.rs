//! Type registry: DDL templates, aliases and native names for one dialect.
//!
//! Templates are keyed by an optional source vendor, a [`JdbcTypeDesc`] and a
//! [`SizeSpec`]. Placeholders `{N}`, `{P}` and `{S}` expand to size, precision
//! and scale when a type name is rendered.

use std::collections::HashMap;

use tracing::debug;

use crate::core::metadata::DatabaseInfo;
use crate::core::types::{JdbcType, JdbcTypeDesc, SizeSpec};
use crate::error::{MigrateError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TemplateKey {
    /// Lower-cased source product name; `None` applies to every source.
    vendor: Option<String>,
    desc: JdbcTypeDesc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TemplateEntry {
    size: SizeSpec,
    template: String,
}

/// Bidirectional map between type descriptors and vendor type names.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    templates: HashMap<TemplateKey, Vec<TemplateEntry>>,
    aliases: HashMap<JdbcTypeDesc, JdbcTypeDesc>,
    native: HashMap<String, JdbcTypeDesc>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace the template for `desc` and `size`.
    ///
    /// An existing entry with the same key is overwritten, so later
    /// registrations (overrides) beat earlier ones (built-ins).
    pub fn register_type(
        &mut self,
        vendor: Option<&str>,
        desc: JdbcTypeDesc,
        size: SizeSpec,
        template: impl Into<String>,
    ) {
        let key = TemplateKey {
            vendor: vendor.map(str::to_lowercase),
            desc,
        };
        let template = template.into();
        let entries = self.templates.entry(key).or_default();
        match entries.iter_mut().find(|e| e.size == size) {
            Some(entry) => entry.template = template,
            None => entries.push(TemplateEntry { size, template }),
        }
    }

    /// Shorthand for a code-wide template applying to every source vendor.
    pub fn register(&mut self, type_code: i32, template: &str) {
        self.register_type(None, JdbcTypeDesc::of_code(type_code), SizeSpec::default(), template);
    }

    /// Register `alias` as standing in for `canonical`.
    ///
    /// Aliases are one hop: neither side may take part in another alias in
    /// the opposite role. A violation is a configuration error.
    pub fn add_alias(&mut self, alias: JdbcTypeDesc, canonical: JdbcTypeDesc) -> Result<()> {
        if alias == canonical || alias == canonical.code_only() {
            return Err(MigrateError::Config(format!(
                "Type alias {} resolves to itself",
                alias
            )));
        }
        if self.lookup_alias(&canonical).is_some() {
            return Err(MigrateError::Config(format!(
                "Type alias {} -> {} would chain through alias {} -> {}",
                alias,
                canonical,
                canonical,
                self.resolve_alias(&canonical)
            )));
        }
        if let Some((target_of, _)) = self
            .aliases
            .iter()
            .find(|(_, target)| **target == alias || target.code_only() == alias)
        {
            return Err(MigrateError::Config(format!(
                "Type alias {} -> {} would chain from alias {} -> {}",
                alias, canonical, target_of, alias
            )));
        }
        debug!("Type alias {} -> {}", alias, canonical);
        self.aliases.insert(alias, canonical);
        Ok(())
    }

    fn lookup_alias(&self, desc: &JdbcTypeDesc) -> Option<&JdbcTypeDesc> {
        self.aliases
            .get(desc)
            .or_else(|| self.aliases.get(&desc.code_only()))
    }

    /// Canonical descriptor for `desc`; a type without an alias maps to itself.
    pub fn resolve_alias(&self, desc: &JdbcTypeDesc) -> JdbcTypeDesc {
        self.lookup_alias(desc).cloned().unwrap_or_else(|| desc.clone())
    }

    /// Record the descriptor a vendor's native type name stands for.
    pub fn register_native(&mut self, native_name: &str, desc: JdbcTypeDesc) {
        self.native.insert(native_name.to_lowercase(), desc);
    }

    /// Descriptor for a native type name reported by a catalog.
    pub fn native_type(&self, native_name: &str) -> Option<&JdbcTypeDesc> {
        self.native.get(&native_name.to_lowercase())
    }

    /// Merge `other` into this registry; entries from `other` win.
    pub fn add_all(&mut self, other: &TypeRegistry) -> Result<()> {
        for (key, entries) in &other.templates {
            for entry in entries {
                self.register_type(
                    key.vendor.as_deref(),
                    key.desc.clone(),
                    entry.size,
                    entry.template.clone(),
                );
            }
        }
        for (alias, canonical) in &other.aliases {
            if self.aliases.get(alias) != Some(canonical) {
                self.aliases.remove(alias);
                self.add_alias(alias.clone(), canonical.clone())?;
            }
        }
        for (name, desc) in &other.native {
            self.native.insert(name.clone(), desc.clone());
        }
        Ok(())
    }

    fn best_template(&self, key: &TemplateKey, jdbc_type: &JdbcType) -> Option<&str> {
        self.templates.get(key).and_then(|entries| {
            entries
                .iter()
                .filter(|e| e.size.matches(jdbc_type))
                .max_by_key(|e| e.size.specificity())
                .map(|e| e.template.as_str())
        })
    }

    /// Template registered for exactly this source vendor and type name.
    pub fn vendor_type_name(&self, source: &DatabaseInfo, jdbc_type: &JdbcType) -> Option<String> {
        let key = TemplateKey {
            vendor: Some(source.product_name.to_lowercase()),
            desc: jdbc_type.desc(),
        };
        self.best_template(&key, jdbc_type)
            .map(|template| expand_template(template, jdbc_type))
    }

    /// Render the DDL type name for `jdbc_type` read from `source`.
    ///
    /// Lookup order: vendor-qualified before vendor-neutral, exact name before
    /// code-only, and within one key the most size-specific template.
    pub fn type_name(
        &self,
        source: Option<&DatabaseInfo>,
        jdbc_type: &JdbcType,
        column: &str,
    ) -> Result<String> {
        let resolved = self.resolve_alias(&jdbc_type.desc());
        let vendors = match source {
            Some(info) => vec![Some(info.product_name.to_lowercase()), None],
            None => vec![None],
        };
        for vendor in &vendors {
            for desc in [resolved.clone(), resolved.code_only()] {
                let key = TemplateKey {
                    vendor: vendor.clone(),
                    desc,
                };
                if let Some(template) = self.best_template(&key, jdbc_type) {
                    return Ok(expand_template(template, jdbc_type));
                }
            }
        }
        Err(MigrateError::type_not_supported(jdbc_type.desc(), column))
    }
}

/// Expand `{N}`, `{P}` and `{S}`.
///
/// A missing size falls back to the precision and vice versa; when neither is
/// known the parenthesized argument list is dropped. A missing scale is 0.
fn expand_template(template: &str, jdbc_type: &JdbcType) -> String {
    let size = jdbc_type
        .size
        .filter(|s| *s > 0)
        .or(jdbc_type.precision.filter(|p| *p > 0).map(u64::from));
    let precision = jdbc_type
        .precision
        .filter(|p| *p > 0)
        .map(u64::from)
        .or(jdbc_type.size.filter(|s| *s > 0));
    let needs_size = template.contains("{N}");
    let needs_precision = template.contains("{P}");
    if (needs_size && size.is_none()) || (needs_precision && precision.is_none()) {
        return match template.find('(') {
            Some(open) => {
                let close = template[open..].find(')').map(|c| open + c + 1);
                let tail = close.map(|c| &template[c..]).unwrap_or("");
                format!("{}{}", &template[..open], tail)
            }
            None => template.to_string(),
        };
    }
    let mut rendered = template.to_string();
    if let Some(size) = size {
        rendered = rendered.replace("{N}", &size.to_string());
    }
    if let Some(precision) = precision {
        rendered = rendered.replace("{P}", &precision.to_string());
    }
    rendered.replace("{S}", &jdbc_type.scale.unwrap_or(0).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::codes;

    fn base() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register(codes::VARCHAR, "VARCHAR({N})");
        registry.register(codes::DECIMAL, "DECIMAL({P},{S})");
        registry.register(codes::CLOB, "CLOB");
        registry.register(codes::TIMESTAMP, "TIMESTAMP");
        registry
    }

    #[test]
    fn test_placeholders_expand() {
        let registry = base();
        let ty = JdbcType::new(codes::DECIMAL, "DECIMAL")
            .with_precision(10)
            .with_scale(2);
        assert_eq!(registry.type_name(None, &ty, "t.c").unwrap(), "DECIMAL(10,2)");
        let ty = JdbcType::new(codes::VARCHAR, "VARCHAR");
        assert_eq!(registry.type_name(None, &ty, "t.c").unwrap(), "VARCHAR");
    }

    #[test]
    fn test_last_writer_wins_for_same_key() {
        let mut registry = base();
        registry.register(codes::CLOB, "TEXT");
        let ty = JdbcType::new(codes::CLOB, "CLOB");
        assert_eq!(registry.type_name(None, &ty, "t.c").unwrap(), "TEXT");
    }

    #[test]
    fn test_size_specific_entry_wins() {
        let mut registry = base();
        registry.register_type(
            None,
            JdbcTypeDesc::of_code(codes::VARCHAR),
            SizeSpec::new(Some(36), None, None),
            "UUID",
        );
        let short = JdbcType::new(codes::VARCHAR, "VARCHAR").with_size(36);
        let long = JdbcType::new(codes::VARCHAR, "VARCHAR").with_size(100);
        assert_eq!(registry.type_name(None, &short, "c").unwrap(), "UUID");
        assert_eq!(registry.type_name(None, &long, "c").unwrap(), "VARCHAR(100)");
    }

    #[test]
    fn test_vendor_entry_only_applies_to_that_source() {
        let mut registry = base();
        registry.register_type(
            Some("Oracle"),
            JdbcTypeDesc::new(codes::OTHER, "ARRAY"),
            SizeSpec::default(),
            "BLOB",
        );
        let ty = JdbcType::new(codes::OTHER, "ARRAY");
        let oracle = DatabaseInfo::new("oracle");
        assert_eq!(registry.type_name(Some(&oracle), &ty, "c").unwrap(), "BLOB");
        let err = registry
            .type_name(Some(&DatabaseInfo::new("MySQL")), &ty, "t.c")
            .unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_TYPE_ERROR);
    }

    #[test]
    fn test_alias_resolution_is_total_and_idempotent() {
        let mut registry = base();
        let datetime2 = JdbcTypeDesc::new(codes::VARCHAR, "DATETIME2");
        registry
            .add_alias(datetime2.clone(), JdbcTypeDesc::standard(codes::TIMESTAMP))
            .unwrap();
        let once = registry.resolve_alias(&datetime2);
        assert_eq!(once, JdbcTypeDesc::new(codes::TIMESTAMP, "TIMESTAMP"));
        assert_eq!(registry.resolve_alias(&once), once);
        let plain = JdbcTypeDesc::new(codes::VARCHAR, "VARCHAR");
        assert_eq!(registry.resolve_alias(&plain), plain);

        let ty = JdbcType::new(codes::VARCHAR, "datetime2");
        assert_eq!(registry.type_name(None, &ty, "c").unwrap(), "TIMESTAMP");
    }

    #[test]
    fn test_alias_chains_and_cycles_rejected() {
        let mut registry = TypeRegistry::new();
        let a = JdbcTypeDesc::new(codes::VARCHAR, "A");
        let b = JdbcTypeDesc::new(codes::VARCHAR, "B");
        let c = JdbcTypeDesc::new(codes::VARCHAR, "C");
        registry.add_alias(a.clone(), b.clone()).unwrap();
        assert!(matches!(
            registry.add_alias(b.clone(), c.clone()),
            Err(MigrateError::Config(_))
        ));
        assert!(registry.add_alias(c.clone(), a.clone()).is_err());
        assert!(registry.add_alias(b.clone(), a).is_err());
        assert!(registry.add_alias(c.clone(), c).is_err());
    }

    #[test]
    fn test_add_all_merges_and_overrides() {
        let mut target = base();
        let mut overrides = TypeRegistry::new();
        overrides.register(codes::TIMESTAMP, "DATETIME");
        overrides.register_native("datetime", JdbcTypeDesc::standard(codes::TIMESTAMP));
        target.add_all(&overrides).unwrap();

        let ty = JdbcType::new(codes::TIMESTAMP, "TIMESTAMP");
        assert_eq!(target.type_name(None, &ty, "c").unwrap(), "DATETIME");
        assert_eq!(
            target.native_type("DATETIME"),
            Some(&JdbcTypeDesc::standard(codes::TIMESTAMP))
        );
        let clob = JdbcType::new(codes::CLOB, "CLOB");
        assert_eq!(target.type_name(None, &clob, "c").unwrap(), "CLOB");
    }
}
