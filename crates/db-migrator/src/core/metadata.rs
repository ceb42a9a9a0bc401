//! Dialect-neutral metadata model.
//!
//! A [`Database`] owns catalogs, a catalog owns schemas and a schema owns its
//! tables and sequences. Child objects refer to siblings by name only (a
//! foreign key names the referenced table, an index names its columns), and
//! those names are resolved by case-insensitive lookup when the reference is
//! added. A reference to a missing column is rejected at that point.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::identifier::{name_key, validate_identifier};
use super::types::JdbcType;
use crate::error::{MigrateError, Result};

/// Vendor name and version of a database product.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub product_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor_version: Option<u32>,
}

impl DatabaseInfo {
    pub fn new(product_name: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, major: u32, minor: u32) -> Self {
        self.major_version = Some(major);
        self.minor_version = Some(minor);
        self.product_version = Some(format!("{}.{}", major, minor));
        self
    }

    /// Case-insensitive product name comparison.
    pub fn is_product(&self, product_name: &str) -> bool {
        self.product_name.eq_ignore_ascii_case(product_name)
    }

    /// True when the version is known and at least `major`.
    pub fn is_at_least(&self, major: u32) -> bool {
        self.major_version.map(|v| v >= major).unwrap_or(false)
    }
}

impl fmt::Display for DatabaseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.product_version {
            Some(version) => write!(f, "{} {}", self.product_name, version),
            None => write!(f, "{}", self.product_name),
        }
    }
}

/// `TABLE` or `VIEW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TableType {
    #[default]
    Table,
    View,
}

/// Referential action of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferenceAction {
    /// Parse catalog spellings such as `NO ACTION`, `SET_NULL` or `cascade`.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_uppercase().replace(['_', ' '], "");
        match normalized.as_str() {
            "NOACTION" => Some(ReferenceAction::NoAction),
            "RESTRICT" => Some(ReferenceAction::Restrict),
            "CASCADE" => Some(ReferenceAction::Cascade),
            "SETNULL" => Some(ReferenceAction::SetNull),
            "SETDEFAULT" => Some(ReferenceAction::SetDefault),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            ReferenceAction::NoAction => "NO ACTION",
            ReferenceAction::Restrict => "RESTRICT",
            ReferenceAction::Cascade => "CASCADE",
            ReferenceAction::SetNull => "SET NULL",
            ReferenceAction::SetDefault => "SET DEFAULT",
        }
    }
}

/// A named value generator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sequence {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Owning table, when the sequence is bound to one column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_with: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment_by: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<i64>,
    #[serde(default)]
    pub cycle: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<i64>,
}

/// Identity of a sequence: owning catalog, owning schema and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequenceKey {
    catalog: Option<String>,
    schema: Option<String>,
    name: String,
}

impl Sequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn in_schema(mut self, catalog: Option<&str>, schema: Option<&str>) -> Self {
        self.catalog = catalog.map(str::to_string);
        self.schema = schema.map(str::to_string);
        self
    }

    pub fn owned_by(mut self, table: &str, column: &str) -> Self {
        self.table = Some(table.to_string());
        self.column = Some(column.to_string());
        self
    }

    pub fn key(&self) -> SequenceKey {
        SequenceKey {
            catalog: self.catalog.as_deref().map(name_key),
            schema: self.schema.as_deref().map(name_key),
            name: name_key(&self.name),
        }
    }
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub type_code: i32,
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<i32>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default)]
    pub position: u32,
    /// Generator backing this column, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<Sequence>,
    /// Identity column without a named sequence.
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl Column {
    pub fn new(name: impl Into<String>, type_code: i32, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_code,
            type_name: type_name.into(),
            size: None,
            precision: None,
            scale: None,
            nullable: true,
            default_value: None,
            position: 0,
            sequence: None,
            auto_increment: false,
            comment: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_precision_scale(mut self, precision: u32, scale: i32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    pub fn with_sequence(mut self, sequence: Sequence) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Column type with size, precision and scale.
    pub fn jdbc_type(&self) -> JdbcType {
        JdbcType {
            type_code: self.type_code,
            type_name: self.type_name.clone(),
            size: self.size,
            precision: self.precision,
            scale: self.scale,
        }
    }

    /// True when the column takes its values from a generator.
    pub fn is_identity(&self) -> bool {
        self.auto_increment || self.sequence.is_some()
    }
}

/// Primary key: ordered column names.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrimaryKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub columns: Vec<String>,
}

/// Secondary index: ordered column names.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

/// Location of a table in the database graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TableRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub table: String,
}

impl TableRef {
    pub fn new(catalog: Option<&str>, schema: Option<&str>, table: &str) -> Self {
        Self {
            catalog: catalog.map(str::to_string),
            schema: schema.map(str::to_string),
            table: table.to_string(),
        }
    }

    /// Case-insensitive comparison; an absent catalog or schema matches any.
    pub fn matches(&self, catalog: Option<&str>, schema: Option<&str>, table: &str) -> bool {
        fn part(expected: Option<&str>, actual: Option<&str>) -> bool {
            match (expected, actual) {
                (Some(e), Some(a)) => name_key(e) == name_key(a),
                (Some(_), None) => false,
                (None, _) => true,
            }
        }
        name_key(&self.table) == name_key(table)
            && part(self.catalog.as_deref(), catalog)
            && part(self.schema.as_deref(), schema)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in [&self.catalog, &self.schema].into_iter().flatten() {
            write!(f, "{}.", part)?;
        }
        write!(f, "{}", self.table)
    }
}

/// Foreign key owned by the referencing (foreign) table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Referenced table.
    pub primary_table: TableRef,
    pub primary_columns: Vec<String>,
    /// Referencing columns of the owning table.
    pub foreign_columns: Vec<String>,
    #[serde(default)]
    pub on_delete: ReferenceAction,
    #[serde(default)]
    pub on_update: ReferenceAction,
}

impl ForeignKey {
    pub fn new(primary_table: TableRef) -> Self {
        Self {
            name: None,
            primary_table,
            primary_columns: Vec::new(),
            foreign_columns: Vec::new(),
            on_delete: ReferenceAction::NoAction,
            on_update: ReferenceAction::NoAction,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a `primary_column <- foreign_column` pair.
    pub fn reference(mut self, primary_column: &str, foreign_column: &str) -> Self {
        self.primary_columns.push(primary_column.to_string());
        self.foreign_columns.push(foreign_column.to_string());
        self
    }
}

/// A table or view.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(default, rename = "type")]
    pub table_type: TableType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Query text of a view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default)]
    columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    primary_key: Option<PrimaryKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    indexes: Vec<Index>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    foreign_keys: Vec<ForeignKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    checks: Vec<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn view(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            table_type: TableType::View,
            definition: Some(definition.into()),
            ..Self::new(name)
        }
    }

    pub fn is_view(&self) -> bool {
        self.table_type == TableType::View
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn primary_key(&self) -> Option<&PrimaryKey> {
        self.primary_key.as_ref()
    }

    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    pub fn checks(&self) -> &[String] {
        &self.checks
    }

    pub fn find_column(&self, name: &str) -> Option<&Column> {
        let key = name_key(name);
        self.columns.iter().find(|c| name_key(&c.name) == key)
    }

    /// Look up a column, failing when the table has no such column.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.find_column(name).ok_or_else(|| {
            MigrateError::Metadata(format!(
                "Table {} doesn't contain {} column",
                self.name, name
            ))
        })
    }

    /// Append a column; positions default to declaration order.
    pub fn add_column(&mut self, mut column: Column) -> Result<&mut Column> {
        validate_identifier(&column.name)?;
        if self.find_column(&column.name).is_some() {
            return Err(MigrateError::Metadata(format!(
                "Table {} already contains {} column",
                self.name, column.name
            )));
        }
        if column.position == 0 {
            column.position = self.columns.len() as u32 + 1;
        }
        self.columns.push(column);
        let last = self.columns.len() - 1;
        Ok(&mut self.columns[last])
    }

    fn require_columns(&self, names: &[String]) -> Result<()> {
        for name in names {
            self.column(name)?;
        }
        Ok(())
    }

    pub fn set_primary_key(&mut self, primary_key: PrimaryKey) -> Result<()> {
        self.require_columns(&primary_key.columns)?;
        self.primary_key = Some(primary_key);
        Ok(())
    }

    pub fn add_index(&mut self, index: Index) -> Result<()> {
        self.require_columns(&index.columns)?;
        self.indexes.push(index);
        Ok(())
    }

    pub fn add_foreign_key(&mut self, foreign_key: ForeignKey) -> Result<()> {
        if foreign_key.primary_columns.len() != foreign_key.foreign_columns.len() {
            return Err(MigrateError::Metadata(format!(
                "Foreign key on {} references {} columns with {} columns",
                self.name,
                foreign_key.primary_columns.len(),
                foreign_key.foreign_columns.len()
            )));
        }
        if foreign_key.foreign_columns.is_empty() {
            return Err(MigrateError::Metadata(format!(
                "Foreign key on {} has no columns",
                self.name
            )));
        }
        self.require_columns(&foreign_key.foreign_columns)?;
        self.foreign_keys.push(foreign_key);
        Ok(())
    }

    pub fn add_check(&mut self, check: impl Into<String>) {
        self.checks.push(check.into());
    }

    /// Sequences referenced by this table's columns.
    pub fn sequences(&self) -> impl Iterator<Item = &Sequence> {
        self.columns.iter().filter_map(|c| c.sequence.as_ref())
    }

    /// Re-check every invariant, as needed after deserialization.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            if !seen.insert(name_key(&column.name)) {
                return Err(MigrateError::Metadata(format!(
                    "Table {} already contains {} column",
                    self.name, column.name
                )));
            }
        }
        if let Some(pk) = &self.primary_key {
            self.require_columns(&pk.columns)?;
        }
        for index in &self.indexes {
            self.require_columns(&index.columns)?;
        }
        for fk in &self.foreign_keys {
            if fk.primary_columns.len() != fk.foreign_columns.len() {
                return Err(MigrateError::Metadata(format!(
                    "Foreign key on {} references {} columns with {} columns",
                    self.name,
                    fk.primary_columns.len(),
                    fk.foreign_columns.len()
                )));
            }
            self.require_columns(&fk.foreign_columns)?;
        }
        Ok(())
    }
}

/// Namespace holding tables and sequences.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    tables: Vec<Table>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sequences: Vec<Sequence>,
}

impl Schema {
    pub fn new(name: Option<&str>) -> Self {
        Self {
            name: name.map(str::to_string),
            ..Default::default()
        }
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        let key = name_key(name);
        self.tables.iter().find(|t| name_key(&t.name) == key)
    }

    pub fn add_table(&mut self, table: Table) -> Result<&mut Table> {
        validate_identifier(&table.name)?;
        if self.table(&table.name).is_some() {
            return Err(MigrateError::Metadata(format!(
                "Schema {} already contains table {}",
                self.name.as_deref().unwrap_or("<default>"),
                table.name
            )));
        }
        self.tables.push(table);
        let last = self.tables.len() - 1;
        Ok(&mut self.tables[last])
    }

    /// Register a sequence; a sequence with the same identity is kept once.
    pub fn add_sequence(&mut self, sequence: Sequence) {
        let key = sequence.key();
        if !self.sequences.iter().any(|s| s.key() == key) {
            self.sequences.push(sequence);
        }
    }
}

/// Top-level namespace; absent name when the vendor has no catalogs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    schemas: Vec<Schema>,
}

impl Catalog {
    pub fn schemas(&self) -> &[Schema] {
        &self.schemas
    }

    pub fn schema(&self, name: Option<&str>) -> Option<&Schema> {
        self.schemas
            .iter()
            .find(|s| same_name(s.name.as_deref(), name))
    }
}

fn same_name(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => name_key(a) == name_key(b),
        (None, None) => true,
        _ => false,
    }
}

/// A table together with the namespace that holds it.
#[derive(Debug, Clone, Copy)]
pub struct TableEntry<'a> {
    pub catalog: Option<&'a str>,
    pub schema: Option<&'a str>,
    pub table: &'a Table,
}

impl TableEntry<'_> {
    pub fn table_ref(&self) -> TableRef {
        TableRef::new(self.catalog, self.schema, &self.table.name)
    }
}

/// Root aggregate of the model.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Database {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<DatabaseInfo>,
    #[serde(default)]
    catalogs: Vec<Catalog>,
}

impl Database {
    pub fn new(info: Option<DatabaseInfo>) -> Self {
        Self {
            info,
            catalogs: Vec::new(),
        }
    }

    pub fn catalogs(&self) -> &[Catalog] {
        &self.catalogs
    }

    /// Get or create the schema `(catalog, schema)`.
    pub fn schema_mut(&mut self, catalog: Option<&str>, schema: Option<&str>) -> &mut Schema {
        let catalog_idx = match self
            .catalogs
            .iter()
            .position(|c| same_name(c.name.as_deref(), catalog))
        {
            Some(idx) => idx,
            None => {
                self.catalogs.push(Catalog {
                    name: catalog.map(str::to_string),
                    schemas: Vec::new(),
                });
                self.catalogs.len() - 1
            }
        };
        let schemas = &mut self.catalogs[catalog_idx].schemas;
        let schema_idx = match schemas
            .iter()
            .position(|s| same_name(s.name.as_deref(), schema))
        {
            Some(idx) => idx,
            None => {
                schemas.push(Schema::new(schema));
                schemas.len() - 1
            }
        };
        &mut schemas[schema_idx]
    }

    pub fn schema(&self, catalog: Option<&str>, schema: Option<&str>) -> Option<&Schema> {
        self.catalogs
            .iter()
            .find(|c| same_name(c.name.as_deref(), catalog))
            .and_then(|c| c.schema(schema))
    }

    /// Every table in catalog, schema and declaration order.
    pub fn tables(&self) -> impl Iterator<Item = TableEntry<'_>> {
        self.catalogs.iter().flat_map(|catalog| {
            catalog.schemas.iter().flat_map(move |schema| {
                schema.tables.iter().map(move |table| TableEntry {
                    catalog: catalog.name.as_deref(),
                    schema: schema.name.as_deref(),
                    table,
                })
            })
        })
    }

    pub fn find_table(&self, table_ref: &TableRef) -> Option<TableEntry<'_>> {
        self.tables()
            .find(|e| table_ref.matches(e.catalog, e.schema, &e.table.name))
    }

    /// Check every table invariant and that foreign keys stay inside this graph.
    pub fn validate(&self) -> Result<()> {
        for entry in self.tables() {
            entry.table.validate()?;
            for fk in entry.table.foreign_keys() {
                let target = self.find_table(&fk.primary_table).ok_or_else(|| {
                    MigrateError::Metadata(format!(
                        "Foreign key {} on {} references {} outside the database",
                        fk.name.as_deref().unwrap_or("<unnamed>"),
                        entry.table_ref(),
                        fk.primary_table
                    ))
                })?;
                for column in &fk.primary_columns {
                    target.table.column(column)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::codes;

    fn make_test_table() -> Table {
        let mut table = Table::new("users");
        table
            .add_column(Column::new("id", codes::INTEGER, "INTEGER").not_null())
            .unwrap();
        table
            .add_column(Column::new("email", codes::VARCHAR, "VARCHAR").with_size(255))
            .unwrap();
        table
    }

    #[test]
    fn test_columns_keep_declaration_order() {
        let table = make_test_table();
        let names: Vec<_> = table.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "email"]);
        assert_eq!(table.columns()[1].position, 2);
    }

    #[test]
    fn test_column_lookup_is_case_insensitive() {
        let table = make_test_table();
        assert_eq!(table.column("EMAIL").unwrap().name, "email");
    }

    #[test]
    fn test_missing_column_error() {
        let table = make_test_table();
        let err = table.column("age").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Metadata error: Table users doesn't contain age column"
        );
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let mut table = make_test_table();
        assert!(table
            .add_column(Column::new("ID", codes::BIGINT, "BIGINT"))
            .is_err());
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut table = make_test_table();
        assert!(table
            .add_column(Column::new("", codes::BIGINT, "BIGINT"))
            .is_err());
        let mut schema = Schema::new(Some("public"));
        assert!(schema.add_table(Table::new("bad\0name")).is_err());
    }

    #[test]
    fn test_primary_key_requires_existing_columns() {
        let mut table = make_test_table();
        let bad = PrimaryKey {
            name: None,
            columns: vec!["missing".into()],
        };
        assert!(table.set_primary_key(bad).is_err());
        let good = PrimaryKey {
            name: Some("pk_users".into()),
            columns: vec!["id".into()],
        };
        assert!(table.set_primary_key(good).is_ok());
    }

    #[test]
    fn test_foreign_key_column_counts_must_match() {
        let mut table = make_test_table();
        let mut fk = ForeignKey::new(TableRef::new(None, None, "accounts"));
        fk.primary_columns = vec!["id".into(), "tenant".into()];
        fk.foreign_columns = vec!["id".into()];
        assert!(table.add_foreign_key(fk).is_err());
    }

    #[test]
    fn test_database_rejects_dangling_foreign_key() {
        let mut db = Database::new(None);
        let mut orders = Table::new("orders");
        orders
            .add_column(Column::new("user_id", codes::INTEGER, "INTEGER"))
            .unwrap();
        orders
            .add_foreign_key(
                ForeignKey::new(TableRef::new(None, Some("public"), "users"))
                    .reference("id", "user_id"),
            )
            .unwrap();
        db.schema_mut(None, Some("public")).add_table(orders).unwrap();
        assert!(db.validate().is_err());

        db.schema_mut(None, Some("PUBLIC"))
            .add_table(make_test_table())
            .unwrap();
        assert!(db.validate().is_ok());
        assert_eq!(db.catalogs()[0].schemas().len(), 1);
    }

    #[test]
    fn test_sequence_identity_includes_schema() {
        let a = Sequence::new("seq").in_schema(None, Some("s1"));
        let b = Sequence::new("SEQ").in_schema(None, Some("S1"));
        let c = Sequence::new("seq").in_schema(None, Some("s2"));
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());

        let mut schema = Schema::new(Some("s1"));
        schema.add_sequence(a);
        schema.add_sequence(b);
        schema.add_sequence(c);
        assert_eq!(schema.sequences().len(), 2);
    }

    #[test]
    fn test_reference_action_parse() {
        assert_eq!(ReferenceAction::parse("NO ACTION"), Some(ReferenceAction::NoAction));
        assert_eq!(ReferenceAction::parse("SET_NULL"), Some(ReferenceAction::SetNull));
        assert_eq!(ReferenceAction::parse("cascade"), Some(ReferenceAction::Cascade));
        assert_eq!(ReferenceAction::parse("bogus"), None);
    }

    #[test]
    fn test_database_info_version() {
        let info = DatabaseInfo::new("Microsoft SQL Server").with_version(13, 0);
        assert!(info.is_product("microsoft sql server"));
        assert!(info.is_at_least(13));
        assert!(!DatabaseInfo::new("x").is_at_least(1));
        assert_eq!(info.to_string(), "Microsoft SQL Server 13.0");
    }
}
