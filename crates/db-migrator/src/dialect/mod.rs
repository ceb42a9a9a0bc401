//! SQL dialects as strategy values.
//!
//! A [`Dialect`] bundles capability flags, identifier rules, literal syntax,
//! a few renderer functions and one [`TypeRegistry`]. Vendors differ only in
//! the values they put into the struct (see [`vendors`]); there is no trait
//! hierarchy. [`DialectResolver`] picks a vendor from a [`DatabaseInfo`].

pub mod registry;
pub mod resolver;
pub mod vendors;

pub use registry::TypeRegistry;
pub use resolver::DialectResolver;

use serde::{Deserialize, Serialize};

use crate::core::identifier::{
    quote_with, requires_quoting, IdentifierCase, IdentifierNormalizer, IdentifierQuoting,
};
use crate::core::metadata::{Column, DatabaseInfo, ReferenceAction, Sequence, TableRef};
use crate::core::types::{JdbcType, JdbcTypeDesc};
use crate::core::value::Value;
use crate::error::{MigrateError, Result};

/// Capability flags consulted by the script generator and transfer layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Capabilities {
    pub catalogs: bool,
    pub schemas: bool,
    pub limit: bool,
    pub limit_offset: bool,
    pub limit_parameters: bool,
    pub session_time_zone: bool,
    pub if_exists_before_table: bool,
    pub if_exists_after_table: bool,
    /// Foreign keys must be dropped before their tables.
    pub drop_constraints: bool,
    pub unique: bool,
    pub not_null_unique: bool,
    pub column_check: bool,
    pub table_check: bool,
    pub index_in_create_table: bool,
    pub sequences: bool,
}

/// Row count precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCountKind {
    Exact,
    /// Catalog statistics estimate.
    Approx,
}

/// How rows are written by the load job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertKind {
    #[default]
    Insert,
    /// Insert or overwrite by primary key.
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStyle {
    /// `... LIMIT n OFFSET m`
    LimitOffset,
    /// `SELECT TOP n ...`
    Top,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `COMMENT 'x'` inside the column or table definition.
    Inline,
    /// Separate `COMMENT ON ...` statements.
    Statement,
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolLiteral {
    Keyword,
    Numeric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BytesLiteral {
    /// `X'0aff'`
    HexString,
    /// `0x0AFF`
    HexPrefix,
    /// `'\x0aff'::bytea`
    Bytea,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStyle {
    /// `INSERT ... ON CONFLICT (pk) DO UPDATE`
    OnConflict,
    /// `REPLACE INTO ...`
    Replace,
    Unsupported,
}

/// Fixed syntax fragments of a vendor.
#[derive(Debug, Clone)]
pub struct Syntax {
    pub quote_open: &'static str,
    pub quote_close: &'static str,
    pub identifier_case: IdentifierCase,
    pub reserved: &'static [&'static str],
    pub null_column: &'static str,
    pub no_columns_insert: &'static str,
    pub cascade_constraints: &'static str,
    pub identity_column: &'static str,
    /// Identity clause names its backing sequence, which must then exist.
    pub identity_names_sequence: bool,
    pub comment_style: CommentStyle,
    pub limit_style: LimitStyle,
    pub bool_literal: BoolLiteral,
    pub bytes_literal: BytesLiteral,
    pub backslash_escapes: bool,
    pub upsert_style: UpsertStyle,
    /// Statement template with `{}` for the zone name.
    pub session_time_zone: Option<&'static str>,
}

pub type ApproxRowCountFn = fn(&Dialect, &TableRef) -> String;
pub type DefaultValueFn = fn(i32, &str) -> Option<String>;
pub type SequenceOptionsFn = fn(&Sequence) -> String;
pub type GuardedDropFn = fn(&Dialect, DropObject, &str) -> String;
pub type ReferenceActionFn = fn(ReferenceAction) -> Option<&'static str>;
pub type DropForeignKeyFn = fn(&Dialect, &str, &str) -> String;

/// Object kinds a drop statement can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropObject {
    Table,
    View,
    Sequence,
}

impl DropObject {
    pub fn keyword(self) -> &'static str {
        match self {
            DropObject::Table => "TABLE",
            DropObject::View => "VIEW",
            DropObject::Sequence => "SEQUENCE",
        }
    }
}

/// Renderer functions that vary by vendor.
#[derive(Debug, Clone, Copy)]
pub struct Renderers {
    /// `None` means approximate counts are unavailable.
    pub approx_row_count: Option<ApproxRowCountFn>,
    pub default_value: DefaultValueFn,
    pub sequence_options: SequenceOptionsFn,
    /// Drop wrapped in an existence test, for vendors without `IF EXISTS`.
    pub guarded_drop: GuardedDropFn,
    pub reference_action: ReferenceActionFn,
    /// `ALTER TABLE` dropping a named foreign key.
    pub drop_foreign_key: DropForeignKeyFn,
}

/// A vendor dialect bound to one database product and version.
#[derive(Debug, Clone)]
pub struct Dialect {
    name: &'static str,
    info: DatabaseInfo,
    capabilities: Capabilities,
    syntax: Syntax,
    renderers: Renderers,
    quoting: IdentifierQuoting,
    normalizer: IdentifierNormalizer,
    registry: TypeRegistry,
}

impl Dialect {
    pub fn new(
        name: &'static str,
        info: DatabaseInfo,
        capabilities: Capabilities,
        syntax: Syntax,
        renderers: Renderers,
        registry: TypeRegistry,
    ) -> Self {
        Self {
            name,
            info,
            capabilities,
            syntax,
            renderers,
            quoting: IdentifierQuoting::default(),
            normalizer: IdentifierNormalizer::default(),
            registry,
        }
    }

    /// Short vendor key (`postgres`, `mssql`, ...).
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn info(&self) -> &DatabaseInfo {
        &self.info
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn syntax(&self) -> &Syntax {
        &self.syntax
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    pub fn quoting(&self) -> IdentifierQuoting {
        self.quoting
    }

    pub fn with_quoting(mut self, quoting: IdentifierQuoting) -> Self {
        self.quoting = quoting;
        self
    }

    pub fn with_normalizer(mut self, normalizer: IdentifierNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    // ===== Capability predicates =====

    pub fn supports_catalogs(&self) -> bool {
        self.capabilities.catalogs
    }

    pub fn supports_schemas(&self) -> bool {
        self.capabilities.schemas
    }

    pub fn supports_limit(&self) -> bool {
        self.capabilities.limit
    }

    pub fn supports_limit_offset(&self) -> bool {
        self.capabilities.limit_offset
    }

    pub fn supports_limit_parameters(&self) -> bool {
        self.capabilities.limit_parameters
    }

    pub fn supports_session_time_zone(&self) -> bool {
        self.capabilities.session_time_zone
    }

    pub fn supports_if_exists_before_table(&self) -> bool {
        self.capabilities.if_exists_before_table
    }

    pub fn supports_if_exists_after_table(&self) -> bool {
        self.capabilities.if_exists_after_table
    }

    pub fn drop_constraints(&self) -> bool {
        self.capabilities.drop_constraints
    }

    pub fn supports_unique(&self) -> bool {
        self.capabilities.unique
    }

    pub fn supports_not_null_unique(&self) -> bool {
        self.capabilities.not_null_unique
    }

    pub fn supports_column_check(&self) -> bool {
        self.capabilities.column_check
    }

    pub fn supports_table_check(&self) -> bool {
        self.capabilities.table_check
    }

    pub fn supports_index_in_create_table(&self) -> bool {
        self.capabilities.index_in_create_table
    }

    pub fn supports_sequences(&self) -> bool {
        self.capabilities.sequences
    }

    /// Exact counts are always available; approximate counts only for a
    /// whole table without a column or filter, and only where the vendor
    /// keeps catalog statistics.
    pub fn supports_row_count(
        &self,
        _table: &TableRef,
        column: Option<&str>,
        filter: Option<&str>,
        kind: RowCountKind,
    ) -> bool {
        match kind {
            RowCountKind::Exact => true,
            RowCountKind::Approx => {
                self.renderers.approx_row_count.is_some() && column.is_none() && filter.is_none()
            }
        }
    }

    // ===== Identifiers =====

    /// Quote `name` according to the configured quoting mode.
    pub fn quote(&self, name: &str) -> String {
        let quote = match self.quoting {
            IdentifierQuoting::Always => true,
            IdentifierQuoting::Minimal => requires_quoting(name, self.syntax.reserved),
            IdentifierQuoting::None => false,
        };
        if quote {
            quote_with(name, self.syntax.quote_open, self.syntax.quote_close)
        } else {
            name.to_string()
        }
    }

    pub fn normalize_identifier(&self, name: &str) -> String {
        self.normalizer.normalize(name, self.syntax.identifier_case)
    }

    /// Normalized and quoted name.
    pub fn identifier(&self, name: &str) -> String {
        self.quote(&self.normalize_identifier(name))
    }

    /// Qualified object name, dropping parts the vendor has no concept of.
    pub fn qualify(&self, catalog: Option<&str>, schema: Option<&str>, name: &str) -> String {
        let mut parts = Vec::with_capacity(3);
        if let Some(catalog) = catalog.filter(|_| self.capabilities.catalogs) {
            parts.push(self.identifier(catalog));
        }
        if let Some(schema) = schema.filter(|_| self.capabilities.schemas) {
            parts.push(self.identifier(schema));
        }
        parts.push(self.identifier(name));
        parts.join(".")
    }

    pub fn qualify_ref(&self, table: &TableRef) -> String {
        self.qualify(
            table.catalog.as_deref(),
            table.schema.as_deref(),
            &table.table,
        )
    }

    // ===== Types =====

    pub fn resolve_alias(&self, desc: &JdbcTypeDesc) -> JdbcTypeDesc {
        self.registry.resolve_alias(desc)
    }

    /// DDL type name for a type read from `source`.
    pub fn type_name(
        &self,
        source: Option<&DatabaseInfo>,
        jdbc_type: &JdbcType,
        column: &str,
    ) -> Result<String> {
        self.registry.type_name(source, jdbc_type, column)
    }

    /// DDL type name for a column read through the `source` dialect.
    ///
    /// Target entries qualified by the source vendor and exact type name are
    /// tried first. Otherwise the source dialect's alias decides which
    /// canonical type the column holds.
    pub fn column_type_name(
        &self,
        source: Option<&Dialect>,
        source_info: Option<&DatabaseInfo>,
        table: &str,
        column: &Column,
    ) -> Result<String> {
        let jdbc_type = column.jdbc_type();
        if let Some(info) = source_info {
            if let Some(name) = self.registry.vendor_type_name(info, &jdbc_type) {
                return Ok(name);
            }
        }
        let mut resolved = jdbc_type;
        if let Some(source) = source {
            let desc = source.resolve_alias(&resolved.desc());
            resolved.type_code = desc.type_code;
            if let Some(name) = desc.type_name {
                resolved.type_name = name;
            }
        }
        self.type_name(source_info, &resolved, &format!("{}.{}", table, column.name))
    }

    // ===== Fragments =====

    pub fn null_column_string(&self) -> &'static str {
        self.syntax.null_column
    }

    pub fn no_columns_insert_string(&self) -> &'static str {
        self.syntax.no_columns_insert
    }

    pub fn cascade_constraints_string(&self) -> &'static str {
        self.syntax.cascade_constraints
    }

    /// Identity clause, naming the backing sequence where the vendor does so.
    pub fn identity_column_string(&self, sequence: Option<&str>) -> String {
        match sequence {
            Some(seq) if self.syntax.identity_names_sequence => {
                format!("{} ({})", self.syntax.identity_column, seq)
            }
            _ => self.syntax.identity_column.to_string(),
        }
    }

    pub fn column_comment(&self, comment: &str) -> Option<String> {
        match self.syntax.comment_style {
            CommentStyle::Inline => Some(format!("COMMENT {}", quote_string(comment, false))),
            _ => None,
        }
    }

    pub fn table_comment(&self, comment: &str) -> Option<String> {
        match self.syntax.comment_style {
            CommentStyle::Inline => Some(format!("COMMENT={}", quote_string(comment, false))),
            _ => None,
        }
    }

    /// Standalone comment statement for vendors that use `COMMENT ON`.
    pub fn comment_statement(
        &self,
        qualified_table: &str,
        column: Option<&str>,
        comment: &str,
    ) -> Option<String> {
        if self.syntax.comment_style != CommentStyle::Statement {
            return None;
        }
        let target = match column {
            Some(column) => format!("COLUMN {}.{}", qualified_table, self.identifier(column)),
            None => format!("TABLE {}", qualified_table),
        };
        Some(format!(
            "COMMENT ON {} IS {}",
            target,
            quote_string(comment, self.syntax.backslash_escapes)
        ))
    }

    pub fn table_check(&self, check: &str) -> String {
        format!("CHECK ({})", check)
    }

    pub fn column_check(&self, check: &str) -> String {
        format!("CHECK ({})", check)
    }

    pub fn default_value(&self, type_code: i32, default_value: &str) -> Option<String> {
        (self.renderers.default_value)(type_code, default_value)
    }

    pub fn delete_action(&self, action: ReferenceAction) -> Option<String> {
        (self.renderers.reference_action)(action).map(|sql| format!("ON DELETE {}", sql))
    }

    pub fn update_action(&self, action: ReferenceAction) -> Option<String> {
        (self.renderers.reference_action)(action).map(|sql| format!("ON UPDATE {}", sql))
    }

    // ===== Statements =====

    /// `DROP TABLE` or `DROP SEQUENCE` that tolerates a missing object.
    pub fn drop_statement(&self, object: DropObject, qualified: &str, cascade: bool) -> String {
        let cascade = if cascade && object == DropObject::Table {
            self.syntax.cascade_constraints
        } else {
            ""
        };
        if self.capabilities.if_exists_before_table {
            format!("DROP {} IF EXISTS {}{}", object.keyword(), qualified, cascade)
        } else if self.capabilities.if_exists_after_table {
            format!("DROP {} {} IF EXISTS{}", object.keyword(), qualified, cascade)
        } else {
            (self.renderers.guarded_drop)(self, object, qualified)
        }
    }

    pub fn drop_foreign_key(&self, qualified_table: &str, name: &str) -> String {
        (self.renderers.drop_foreign_key)(self, qualified_table, &self.identifier(name))
    }

    pub fn create_sequence(&self, qualified: &str, sequence: &Sequence) -> String {
        let options = (self.renderers.sequence_options)(sequence);
        if options.is_empty() {
            format!("CREATE SEQUENCE {}", qualified)
        } else {
            format!("CREATE SEQUENCE {} {}", qualified, options)
        }
    }

    /// Count query for a table, a column and an optional filter.
    pub fn row_count_query(
        &self,
        table: &TableRef,
        column: Option<&str>,
        filter: Option<&str>,
        kind: RowCountKind,
    ) -> Result<String> {
        let qualified = self.qualify_ref(table);
        match kind {
            RowCountKind::Approx => match self.renderers.approx_row_count {
                Some(render) if column.is_none() && filter.is_none() => Ok(render(self, table)),
                _ => Err(MigrateError::script(
                    qualified,
                    format!(
                        "approximate row count is not supported by {} here",
                        self.name
                    ),
                )),
            },
            RowCountKind::Exact => {
                let target = column
                    .map(|c| self.identifier(c))
                    .unwrap_or_else(|| "*".to_string());
                let mut sql = format!("SELECT COUNT({}) FROM {}", target, qualified);
                if let Some(filter) = filter {
                    sql.push_str(&format!(" WHERE {}", filter));
                }
                Ok(sql)
            }
        }
    }

    /// Apply the vendor paging clause to a `SELECT`.
    pub fn limit_query(&self, query: &str, limit: u64, offset: Option<u64>) -> Result<String> {
        if !self.capabilities.limit {
            return Err(MigrateError::script(
                query,
                format!("{} does not support limits", self.name),
            ));
        }
        let offset = offset.filter(|o| *o > 0);
        if offset.is_some() && !self.capabilities.limit_offset {
            return Err(MigrateError::script(
                query,
                format!("{} does not support limit offsets", self.name),
            ));
        }
        match self.syntax.limit_style {
            LimitStyle::LimitOffset => {
                let mut sql = format!("{} LIMIT {}", query, limit);
                if let Some(offset) = offset {
                    sql.push_str(&format!(" OFFSET {}", offset));
                }
                Ok(sql)
            }
            LimitStyle::Top => {
                let trimmed = query.trim_start();
                let rest = match strip_keyword(trimmed, "SELECT") {
                    Some(rest) => rest,
                    None => {
                        return Err(MigrateError::script(query, "TOP requires a SELECT query"))
                    }
                };
                match strip_keyword(rest.trim_start(), "DISTINCT") {
                    Some(tail) => Ok(format!("SELECT DISTINCT TOP {}{}", limit, tail)),
                    None => Ok(format!("SELECT TOP {}{}", limit, rest)),
                }
            }
        }
    }

    pub fn session_time_zone_sql(&self, time_zone: &str) -> Option<String> {
        self.syntax
            .session_time_zone
            .filter(|_| self.capabilities.session_time_zone)
            .map(|template| template.replace("{}", &time_zone.replace('\'', "''")))
    }

    /// SQL literal for a value.
    pub fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => match self.syntax.bool_literal {
                BoolLiteral::Keyword => String::from(if *b { "TRUE" } else { "FALSE" }),
                BoolLiteral::Numeric => String::from(if *b { "1" } else { "0" }),
            },
            Value::Int(i) => i.to_string(),
            Value::Float(f) if f.is_finite() => f.to_string(),
            Value::Float(f) => {
                let text = if f.is_nan() {
                    "NaN"
                } else if *f > 0.0 {
                    "Infinity"
                } else {
                    "-Infinity"
                };
                format!("'{}'", text)
            }
            Value::Decimal(d) => d.to_string(),
            Value::Text(s) => quote_string(s, self.syntax.backslash_escapes),
            Value::Bytes(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
                match self.syntax.bytes_literal {
                    BytesLiteral::HexString => format!("X'{}'", hex),
                    BytesLiteral::HexPrefix if hex.is_empty() => "0x".to_string(),
                    BytesLiteral::HexPrefix => format!("0x{}", hex.to_uppercase()),
                    BytesLiteral::Bytea => format!("'\\x{}'::bytea", hex),
                }
            }
            Value::Uuid(u) => format!("'{}'", u),
            Value::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
            Value::Time(t) => format!("'{}'", t.format("%H:%M:%S%.f")),
            Value::Timestamp(ts) => format!("'{}'", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::TimestampTz(ts) => format!("'{}'", ts.format("%Y-%m-%d %H:%M:%S%.f%:z")),
        }
    }

    /// Multi-row insert of literal values, for script output.
    ///
    /// With no columns the vendor's no-columns form is rendered once.
    pub fn insert_statement(
        &self,
        qualified: &str,
        columns: &[String],
        primary_key: &[String],
        rows: &[Vec<Value>],
        kind: InsertKind,
    ) -> Result<String> {
        let tuples = rows
            .iter()
            .map(|row| {
                let literals: Vec<String> = row.iter().map(|v| self.literal(v)).collect();
                format!("({})", literals.join(", "))
            })
            .collect::<Vec<_>>();
        self.render_insert(qualified, columns, primary_key, &tuples, kind)
    }

    /// Multi-row insert with `$1`-style numbered placeholders, bound row by row
    /// in column order.
    pub fn parameterized_insert(
        &self,
        qualified: &str,
        columns: &[String],
        primary_key: &[String],
        row_count: usize,
        kind: InsertKind,
    ) -> Result<String> {
        let width = columns.len();
        let tuples = (0..row_count)
            .map(|row| {
                let placeholders: Vec<String> = (1..=width)
                    .map(|n| format!("${}", row * width + n))
                    .collect();
                format!("({})", placeholders.join(", "))
            })
            .collect::<Vec<_>>();
        self.render_insert(qualified, columns, primary_key, &tuples, kind)
    }

    fn render_insert(
        &self,
        qualified: &str,
        columns: &[String],
        primary_key: &[String],
        tuples: &[String],
        kind: InsertKind,
    ) -> Result<String> {
        if columns.is_empty() {
            return Ok(format!(
                "INSERT INTO {} {}",
                qualified, self.syntax.no_columns_insert
            ));
        }
        let column_list = columns
            .iter()
            .map(|c| self.identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let values = tuples.join(", ");

        match (kind, self.syntax.upsert_style) {
            (InsertKind::Insert, _) => Ok(format!(
                "INSERT INTO {} ({}) VALUES {}",
                qualified, column_list, values
            )),
            (InsertKind::Replace, UpsertStyle::Replace) => Ok(format!(
                "REPLACE INTO {} ({}) VALUES {}",
                qualified, column_list, values
            )),
            (InsertKind::Replace, UpsertStyle::OnConflict) => {
                if primary_key.is_empty() {
                    return Err(MigrateError::Config(format!(
                        "replace inserts into {} need a primary key",
                        qualified
                    )));
                }
                let conflict = primary_key
                    .iter()
                    .map(|c| self.identifier(c))
                    .collect::<Vec<_>>()
                    .join(", ");
                let updates: Vec<String> = columns
                    .iter()
                    .filter(|c| !primary_key.iter().any(|pk| pk.eq_ignore_ascii_case(c)))
                    .map(|c| {
                        let quoted = self.identifier(c);
                        format!("{} = EXCLUDED.{}", quoted, quoted)
                    })
                    .collect();
                let action = if updates.is_empty() {
                    "DO NOTHING".to_string()
                } else {
                    format!("DO UPDATE SET {}", updates.join(", "))
                };
                Ok(format!(
                    "INSERT INTO {} ({}) VALUES {} ON CONFLICT ({}) {}",
                    qualified, column_list, values, conflict, action
                ))
            }
            (InsertKind::Replace, UpsertStyle::Unsupported) => Err(MigrateError::Config(
                format!("replace inserts are not supported by {}", self.name),
            )),
        }
    }
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    text.get(..keyword.len())
        .filter(|head| head.eq_ignore_ascii_case(keyword))
        .map(|_| &text[keyword.len()..])
}

/// Single-quoted string literal.
pub fn quote_string(value: &str, backslash_escapes: bool) -> String {
    let mut escaped = value.replace('\'', "''");
    if backslash_escapes {
        escaped = escaped.replace('\\', "\\\\");
    }
    format!("'{}'", escaped)
}

#[cfg(test)]
mod tests {
    use super::vendors;
    use super::*;
    use crate::core::types::codes;
    use chrono::NaiveDate;

    fn table() -> TableRef {
        TableRef::new(None, Some("dbo"), "users")
    }

    #[test]
    fn test_row_count_policy_by_vendor() {
        let mssql = vendors::mssql(DatabaseInfo::new("Microsoft SQL Server"));
        let nuodb = vendors::nuodb(DatabaseInfo::new("NuoDB"));
        let t = table();

        assert!(mssql.supports_row_count(&t, None, None, RowCountKind::Exact));
        assert!(mssql.supports_row_count(&t, Some("id"), Some("id > 1"), RowCountKind::Exact));
        assert!(mssql.supports_row_count(&t, None, None, RowCountKind::Approx));
        assert!(!mssql.supports_row_count(&t, Some("id"), None, RowCountKind::Approx));
        assert!(!mssql.supports_row_count(&t, None, Some("id > 1"), RowCountKind::Approx));

        assert!(nuodb.supports_row_count(&t, None, None, RowCountKind::Exact));
        assert!(!nuodb.supports_row_count(&t, None, None, RowCountKind::Approx));
        assert!(nuodb
            .row_count_query(&t, None, None, RowCountKind::Approx)
            .is_err());
    }

    #[test]
    fn test_row_count_queries() {
        let mssql = vendors::mssql(DatabaseInfo::new("Microsoft SQL Server"));
        let t = table();
        assert_eq!(
            mssql
                .row_count_query(&t, Some("id"), Some("id > 1"), RowCountKind::Exact)
                .unwrap(),
            "SELECT COUNT([id]) FROM [dbo].[users] WHERE id > 1"
        );
        let approx = mssql
            .row_count_query(&t, None, None, RowCountKind::Approx)
            .unwrap();
        assert!(approx.contains("sys.partitions"));
    }

    #[test]
    fn test_quoting_modes() {
        let pg = vendors::postgres(DatabaseInfo::new("PostgreSQL"));
        let minimal = pg.clone().with_quoting(IdentifierQuoting::Minimal);
        let always = pg.clone().with_quoting(IdentifierQuoting::Always);
        let none = pg.with_quoting(IdentifierQuoting::None);

        assert_eq!(minimal.quote("order"), "\"order\"");
        assert_eq!(minimal.quote("MixedCase"), "\"MixedCase\"");
        assert_eq!(minimal.quote("users"), "users");
        assert_eq!(always.quote("users"), "\"users\"");
        assert_eq!(always.quote("order"), "\"order\"");
        assert_eq!(none.quote("order"), "order");
        assert_eq!(none.quote("MixedCase"), "MixedCase");
    }

    #[test]
    fn test_mssql_quotes_with_brackets() {
        let mssql = vendors::mssql(DatabaseInfo::new("Microsoft SQL Server"));
        assert_eq!(mssql.quote("a]b"), "[a]]b]");
        assert_eq!(mssql.qualify(Some("db"), Some("dbo"), "t"), "[db].[dbo].[t]");
    }

    #[test]
    fn test_normalizer_uses_vendor_case() {
        let nuodb = vendors::nuodb(DatabaseInfo::new("NuoDB"))
            .with_normalizer(IdentifierNormalizer::Standard)
            .with_quoting(IdentifierQuoting::None);
        assert_eq!(nuodb.identifier("users"), "USERS");
        let pg = vendors::postgres(DatabaseInfo::new("PostgreSQL"))
            .with_normalizer(IdentifierNormalizer::Standard)
            .with_quoting(IdentifierQuoting::None);
        assert_eq!(pg.identifier("Users"), "users");
    }

    #[test]
    fn test_limit_queries() {
        let pg = vendors::postgres(DatabaseInfo::new("PostgreSQL"));
        assert_eq!(
            pg.limit_query("SELECT * FROM t", 10, Some(20)).unwrap(),
            "SELECT * FROM t LIMIT 10 OFFSET 20"
        );
        let mssql = vendors::mssql(DatabaseInfo::new("Microsoft SQL Server"));
        assert_eq!(
            mssql.limit_query("select a from t", 5, None).unwrap(),
            "SELECT TOP 5 a from t"
        );
        assert_eq!(
            mssql.limit_query("SELECT DISTINCT a FROM t", 5, None).unwrap(),
            "SELECT DISTINCT TOP 5 a FROM t"
        );
        let err = mssql.limit_query("SELECT a FROM t", 5, Some(10)).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_SCRIPT_ERROR);
    }

    #[test]
    fn test_mssql_fragments() {
        let mssql = vendors::mssql(DatabaseInfo::new("Microsoft SQL Server"));
        assert_eq!(mssql.no_columns_insert_string(), "DEFAULT VALUES");
        assert!(!mssql.supports_session_time_zone());
        assert!(mssql.supports_limit());
        assert!(!mssql.supports_limit_offset());
        assert!(mssql.supports_limit_parameters());
        assert!(mssql.supports_catalogs() && mssql.supports_schemas());
        assert_eq!(mssql.session_time_zone_sql("UTC"), None);
    }

    #[test]
    fn test_literals() {
        let pg = vendors::postgres(DatabaseInfo::new("PostgreSQL"));
        let mysql = vendors::mysql(DatabaseInfo::new("MySQL"));
        let mssql = vendors::mssql(DatabaseInfo::new("Microsoft SQL Server"));

        assert_eq!(pg.literal(&Value::Text("O'Brien".into())), "'O''Brien'");
        assert_eq!(mysql.literal(&Value::Text("a\\b".into())), "'a\\\\b'");
        assert_eq!(pg.literal(&Value::Bytes(vec![0xde, 0xad])), "'\\xdead'::bytea");
        assert_eq!(mysql.literal(&Value::Bytes(vec![0xde, 0xad])), "X'dead'");
        assert_eq!(mssql.literal(&Value::Bytes(vec![0xde, 0xad])), "0xDEAD");
        assert_eq!(mssql.literal(&Value::Bool(true)), "1");
        assert_eq!(pg.literal(&Value::Bool(false)), "FALSE");
        assert_eq!(pg.literal(&Value::Null), "NULL");
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(pg.literal(&Value::Date(date)), "'2024-02-29'");
    }

    #[test]
    fn test_insert_statements() {
        let pg = vendors::postgres(DatabaseInfo::new("PostgreSQL"))
            .with_quoting(IdentifierQuoting::None);
        let rows = vec![
            vec![Value::Int(1), Value::Text("a".into())],
            vec![Value::Int(2), Value::Null],
        ];
        let cols = vec!["id".to_string(), "name".to_string()];
        assert_eq!(
            pg.insert_statement("t", &cols, &[], &rows, InsertKind::Insert)
                .unwrap(),
            "INSERT INTO t (id, name) VALUES (1, 'a'), (2, NULL)"
        );
        assert_eq!(
            pg.insert_statement("t", &cols, &["id".to_string()], &rows, InsertKind::Replace)
                .unwrap(),
            "INSERT INTO t (id, name) VALUES (1, 'a'), (2, NULL) ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name"
        );
        assert!(pg
            .insert_statement("t", &cols, &[], &rows, InsertKind::Replace)
            .is_err());
        let mysql = vendors::mysql(DatabaseInfo::new("MySQL")).with_quoting(IdentifierQuoting::None);
        assert!(mysql
            .insert_statement("t", &cols, &[], &rows, InsertKind::Replace)
            .unwrap()
            .starts_with("REPLACE INTO t"));
        let mssql = vendors::mssql(DatabaseInfo::new("Microsoft SQL Server"));
        assert_eq!(
            mssql
                .insert_statement("[t]", &[], &[], &[], InsertKind::Insert)
                .unwrap(),
            "INSERT INTO [t] DEFAULT VALUES"
        );
    }

    #[test]
    fn test_parameterized_insert_numbers_placeholders_row_major() {
        let pg = vendors::postgres(DatabaseInfo::new("PostgreSQL"))
            .with_quoting(IdentifierQuoting::Always);
        let cols = vec!["id".to_string(), "it's".to_string()];
        assert_eq!(
            pg.parameterized_insert("t", &cols, &[], 2, InsertKind::Insert)
                .unwrap(),
            r#"INSERT INTO t ("id", "it's") VALUES ($1, $2), ($3, $4)"#
        );
        let upsert = pg
            .parameterized_insert("t", &cols, &["id".to_string()], 1, InsertKind::Replace)
            .unwrap();
        assert_eq!(
            upsert,
            r#"INSERT INTO t ("id", "it's") VALUES ($1, $2) ON CONFLICT ("id") DO UPDATE SET "it's" = EXCLUDED."it's""#
        );
        assert_eq!(
            pg.parameterized_insert("t", &[], &[], 3, InsertKind::Insert)
                .unwrap(),
            "INSERT INTO t DEFAULT VALUES"
        );
    }

    #[test]
    fn test_drop_statements() {
        let pg = vendors::postgres(DatabaseInfo::new("PostgreSQL"));
        assert_eq!(
            pg.drop_statement(DropObject::Table, "\"t\"", true),
            "DROP TABLE IF EXISTS \"t\" CASCADE"
        );
        let old = vendors::mssql(DatabaseInfo::new("Microsoft SQL Server").with_version(11, 0));
        assert_eq!(
            old.drop_statement(DropObject::Table, "[dbo].[t]", false),
            "IF OBJECT_ID(N'[dbo].[t]', N'U') IS NOT NULL DROP TABLE [dbo].[t]"
        );
        let new = vendors::mssql(DatabaseInfo::new("Microsoft SQL Server").with_version(13, 0));
        assert_eq!(
            new.drop_statement(DropObject::Table, "[t]", false),
            "DROP TABLE IF EXISTS [t]"
        );
    }

    #[test]
    fn test_default_values() {
        let pg = vendors::postgres(DatabaseInfo::new("PostgreSQL"));
        assert_eq!(pg.default_value(codes::BIT, "((1))"), Some("TRUE".into()));
        assert_eq!(pg.default_value(codes::TIMESTAMP, "getdate()"), Some("CURRENT_TIMESTAMP".into()));
        assert_eq!(pg.default_value(codes::INTEGER, "nextval('s'::regclass)"), None);
        let mssql = vendors::mssql(DatabaseInfo::new("Microsoft SQL Server"));
        assert_eq!(mssql.default_value(codes::BOOLEAN, "true"), Some("1".into()));
        assert_eq!(
            mssql.default_value(codes::VARCHAR, "'x'::character varying"),
            Some("'x'".into())
        );
    }
}
