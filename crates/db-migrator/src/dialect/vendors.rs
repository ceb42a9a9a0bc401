//! Built-in vendor dialects.
//!
//! Each constructor fills a [`Dialect`] with the vendor's capability flags,
//! syntax, renderer functions and type registry for the given product version.

use tracing::warn;

use crate::core::identifier::IdentifierCase;
use crate::core::metadata::{DatabaseInfo, ReferenceAction, Sequence, TableRef};
use crate::core::types::{codes, JdbcTypeDesc, SizeSpec};

use super::{
    quote_string, BoolLiteral, BytesLiteral, Capabilities, CommentStyle, Dialect, DropObject,
    LimitStyle, Renderers, Syntax, TypeRegistry, UpsertStyle,
};

pub const MSSQL_DATETIMEOFFSET: i32 = -155;

const COMMON_RESERVED: &[&str] = &[
    "ALL", "ALTER", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CHECK", "COLUMN", "CONSTRAINT",
    "CREATE", "CROSS", "CURRENT", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE", "END",
    "EXISTS", "FOREIGN", "FROM", "FULL", "GRANT", "GROUP", "HAVING", "IN", "INDEX", "INNER",
    "INSERT", "INTO", "IS", "JOIN", "KEY", "LEFT", "LIKE", "NOT", "NULL", "ON", "OR", "ORDER",
    "OUTER", "PRIMARY", "REFERENCES", "RIGHT", "SELECT", "SET", "TABLE", "THEN", "TO", "UNION",
    "UNIQUE", "UPDATE", "USER", "VALUES", "VIEW", "WHEN", "WHERE", "WITH",
];

const MSSQL_RESERVED: &[&str] = &[
    "ALL", "ALTER", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CHECK", "COLUMN", "CONSTRAINT",
    "CREATE", "CROSS", "CURRENT", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE", "END",
    "EXISTS", "FOREIGN", "FROM", "FULL", "GRANT", "GROUP", "HAVING", "IDENTITY", "IN", "INDEX",
    "INNER", "INSERT", "INTO", "IS", "JOIN", "KEY", "LEFT", "LIKE", "MERGE", "NOT", "NULL", "ON",
    "OR", "ORDER", "OUTER", "PERCENT", "PRIMARY", "REFERENCES", "RIGHT", "SELECT", "SET",
    "TABLE", "THEN", "TO", "TOP", "TRAN", "UNION", "UNIQUE", "UPDATE", "USER", "VALUES", "VIEW",
    "WHEN", "WHERE", "WITH",
];

/// Vendor-neutral templates shared by every dialect.
pub fn standard_registry() -> TypeRegistry {
    use codes::*;
    let mut registry = TypeRegistry::new();
    for (code, template) in [
        (BIT, "BIT"),
        (TINYINT, "TINYINT"),
        (SMALLINT, "SMALLINT"),
        (INTEGER, "INTEGER"),
        (BIGINT, "BIGINT"),
        (REAL, "REAL"),
        (FLOAT, "FLOAT"),
        (DOUBLE, "DOUBLE"),
        (NUMERIC, "NUMERIC({P},{S})"),
        (DECIMAL, "DECIMAL({P},{S})"),
        (CHAR, "CHAR({N})"),
        (VARCHAR, "VARCHAR({N})"),
        (LONGVARCHAR, "CLOB"),
        (NCHAR, "NCHAR({N})"),
        (NVARCHAR, "NVARCHAR({N})"),
        (LONGNVARCHAR, "NCLOB"),
        (DATE, "DATE"),
        (TIME, "TIME"),
        (TIMESTAMP, "TIMESTAMP"),
        (BINARY, "BINARY({N})"),
        (VARBINARY, "VARBINARY({N})"),
        (LONGVARBINARY, "BLOB"),
        (BLOB, "BLOB"),
        (CLOB, "CLOB"),
        (NCLOB, "NCLOB"),
        (BOOLEAN, "BOOLEAN"),
        (SQLXML, "CLOB"),
        (TIME_WITH_TIMEZONE, "TIME WITH TIME ZONE"),
        (TIMESTAMP_WITH_TIMEZONE, "TIMESTAMP WITH TIME ZONE"),
    ] {
        registry.register(code, template);
    }
    registry
}

fn named(registry: &mut TypeRegistry, vendor: Option<&str>, code: i32, name: &str, template: &str) {
    registry.register_type(
        vendor,
        JdbcTypeDesc::new(code, name),
        SizeSpec::default(),
        template,
    );
}

fn natives(registry: &mut TypeRegistry, entries: &[(&str, i32, &str)]) {
    for (native, code, name) in entries {
        registry.register_native(native, JdbcTypeDesc::new(*code, name));
    }
}

// ===== Default values =====

fn wrapped_in_parens(value: &str) -> bool {
    if !(value.starts_with('(') && value.ends_with(')')) {
        return false;
    }
    let mut depth = 0i32;
    for (idx, ch) in value.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && idx != value.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Strip wrapping parentheses and casts, and map well-known functions.
///
/// Sequence-backed defaults (`nextval(...)`) are dropped since the identity
/// clause replaces them.
fn clean_default(value: &str) -> Option<String> {
    let mut v = value.trim();
    while wrapped_in_parens(v) {
        v = v[1..v.len() - 1].trim();
    }
    if v.is_empty() || v.eq_ignore_ascii_case("NULL") {
        return None;
    }
    let lower = v.to_lowercase();
    if lower.starts_with("nextval(") {
        return None;
    }
    if let Some(rest) = v.strip_prefix('\'') {
        // 'text'::character varying
        let mut chars = rest.char_indices().peekable();
        while let Some((idx, ch)) = chars.next() {
            if ch == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    chars.next();
                    continue;
                }
                let end = idx + 2;
                return Some(v[..end].to_string());
            }
        }
        return Some(v.to_string());
    }
    let function = lower.trim_end_matches("()");
    match function {
        "getdate" | "now" | "current_timestamp" | "sysdatetime" | "localtimestamp" => {
            return Some("CURRENT_TIMESTAMP".to_string())
        }
        "curdate" | "current_date" => return Some("CURRENT_DATE".to_string()),
        _ => {}
    }
    match v.find("::") {
        Some(idx) => Some(v[..idx].to_string()),
        None => Some(v.to_string()),
    }
}

fn boolean_default(type_code: i32, value: String, keyword: bool) -> String {
    if type_code != codes::BIT && type_code != codes::BOOLEAN {
        return value;
    }
    let truth = match value.trim_matches('\'').to_lowercase().as_str() {
        "1" | "true" | "b'1'" | "t" => Some(true),
        "0" | "false" | "b'0'" | "f" => Some(false),
        _ => None,
    };
    match (truth, keyword) {
        (Some(true), true) => "TRUE".to_string(),
        (Some(false), true) => "FALSE".to_string(),
        (Some(true), false) => "1".to_string(),
        (Some(false), false) => "0".to_string(),
        (None, _) => value,
    }
}

fn keyword_default(type_code: i32, value: &str) -> Option<String> {
    clean_default(value).map(|v| boolean_default(type_code, v, true))
}

fn numeric_default(type_code: i32, value: &str) -> Option<String> {
    clean_default(value).map(|v| boolean_default(type_code, v, false))
}

// ===== Sequences =====

fn standard_sequence_options(sequence: &Sequence) -> String {
    let mut parts = Vec::new();
    if let Some(start) = sequence.start_with {
        parts.push(format!("START WITH {}", start));
    }
    if let Some(increment) = sequence.increment_by {
        parts.push(format!("INCREMENT BY {}", increment));
    }
    parts.push(match sequence.min_value {
        Some(min) => format!("MINVALUE {}", min),
        None => "NO MINVALUE".to_string(),
    });
    parts.push(match sequence.max_value {
        Some(max) => format!("MAXVALUE {}", max),
        None => "NO MAXVALUE".to_string(),
    });
    parts.push(String::from(if sequence.cycle { "CYCLE" } else { "NO CYCLE" }));
    if let Some(cache) = sequence.cache {
        parts.push(format!("CACHE {}", cache));
    }
    parts.join(" ")
}

fn nuodb_sequence_options(sequence: &Sequence) -> String {
    let mut parts = Vec::new();
    if let Some(start) = sequence.start_with {
        parts.push(format!("START WITH {}", start));
    }
    if let Some(cache) = sequence.cache {
        parts.push(format!("QUANTUM SIZE {}", cache));
    }
    parts.join(" ")
}

// ===== Drops, counts, actions =====

fn plain_drop(_dialect: &Dialect, object: DropObject, qualified: &str) -> String {
    format!("DROP {} {}", object.keyword(), qualified)
}

fn mssql_guarded_drop(_dialect: &Dialect, object: DropObject, qualified: &str) -> String {
    let kind = match object {
        DropObject::Table => "U",
        DropObject::View => "V",
        DropObject::Sequence => "SO",
    };
    format!(
        "IF OBJECT_ID(N'{}', N'{}') IS NOT NULL DROP {} {}",
        qualified.replace('\'', "''"),
        kind,
        object.keyword(),
        qualified
    )
}

fn standard_drop_foreign_key(_dialect: &Dialect, table: &str, name: &str) -> String {
    format!("ALTER TABLE {} DROP CONSTRAINT {}", table, name)
}

fn postgres_drop_foreign_key(_dialect: &Dialect, table: &str, name: &str) -> String {
    format!("ALTER TABLE IF EXISTS {} DROP CONSTRAINT IF EXISTS {}", table, name)
}

fn mysql_drop_foreign_key(_dialect: &Dialect, table: &str, name: &str) -> String {
    format!("ALTER TABLE {} DROP FOREIGN KEY {}", table, name)
}

fn mssql_drop_foreign_key(_dialect: &Dialect, table: &str, name: &str) -> String {
    let schema_prefix = table
        .rsplit_once('.')
        .map(|(prefix, _)| format!("{}.", prefix))
        .unwrap_or_default();
    format!(
        "IF OBJECT_ID(N'{}{}', N'F') IS NOT NULL ALTER TABLE {} DROP CONSTRAINT {}",
        schema_prefix.replace('\'', "''"),
        name.replace('\'', "''"),
        table,
        name
    )
}

fn postgres_approx_count(dialect: &Dialect, table: &TableRef) -> String {
    format!(
        "SELECT reltuples::bigint FROM pg_class WHERE oid = {}::regclass",
        quote_string(&dialect.qualify_ref(table), false)
    )
}

fn mssql_approx_count(dialect: &Dialect, table: &TableRef) -> String {
    format!(
        "SELECT SUM(p.rows) FROM sys.partitions p WHERE p.object_id = OBJECT_ID(N{}) AND p.index_id IN (0, 1)",
        quote_string(&dialect.qualify_ref(table), false)
    )
}

fn mysql_approx_count(_dialect: &Dialect, table: &TableRef) -> String {
    let schema = table
        .catalog
        .as_deref()
        .map(|c| quote_string(c, true))
        .unwrap_or_else(|| "DATABASE()".to_string());
    format!(
        "SELECT TABLE_ROWS FROM information_schema.TABLES WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {}",
        schema,
        quote_string(&table.table, true)
    )
}

fn standard_action(action: ReferenceAction) -> Option<&'static str> {
    match action {
        ReferenceAction::NoAction => None,
        other => Some(other.as_sql()),
    }
}

fn mssql_action(action: ReferenceAction) -> Option<&'static str> {
    match action {
        ReferenceAction::NoAction | ReferenceAction::Restrict => None,
        other => Some(other.as_sql()),
    }
}

// ===== Vendors =====

/// PostgreSQL.
pub fn postgres(info: DatabaseInfo) -> Dialect {
    use codes::*;
    let mut registry = standard_registry();
    for (code, template) in [
        (BIT, "BOOLEAN"),
        (TINYINT, "SMALLINT"),
        (FLOAT, "DOUBLE PRECISION"),
        (DOUBLE, "DOUBLE PRECISION"),
        (LONGVARCHAR, "TEXT"),
        (CLOB, "TEXT"),
        (NCLOB, "TEXT"),
        (LONGNVARCHAR, "TEXT"),
        (NCHAR, "CHAR({N})"),
        (NVARCHAR, "VARCHAR({N})"),
        (BINARY, "BYTEA"),
        (VARBINARY, "BYTEA"),
        (LONGVARBINARY, "BYTEA"),
        (BLOB, "BYTEA"),
        (SQLXML, "XML"),
    ] {
        registry.register(code, template);
    }
    named(&mut registry, None, OTHER, "UUID", "UUID");
    named(&mut registry, None, OTHER, "JSON", "JSON");
    named(&mut registry, None, OTHER, "JSONB", "JSONB");
    named(&mut registry, Some("Microsoft SQL Server"), CHAR, "UNIQUEIDENTIFIER", "UUID");
    named(&mut registry, Some("Microsoft SQL Server"), MSSQL_DATETIMEOFFSET, "DATETIMEOFFSET", "TIMESTAMP WITH TIME ZONE");
    natives(
        &mut registry,
        &[
            ("int2", SMALLINT, "INT2"),
            ("int4", INTEGER, "INT4"),
            ("int8", BIGINT, "INT8"),
            ("oid", BIGINT, "OID"),
            ("float4", REAL, "FLOAT4"),
            ("float8", DOUBLE, "FLOAT8"),
            ("numeric", NUMERIC, "NUMERIC"),
            ("bool", BOOLEAN, "BOOL"),
            ("bpchar", CHAR, "BPCHAR"),
            ("varchar", VARCHAR, "VARCHAR"),
            ("text", LONGVARCHAR, "TEXT"),
            ("bytea", BINARY, "BYTEA"),
            ("date", DATE, "DATE"),
            ("time", TIME, "TIME"),
            ("timetz", TIME_WITH_TIMEZONE, "TIMETZ"),
            ("timestamp", TIMESTAMP, "TIMESTAMP"),
            ("timestamptz", TIMESTAMP_WITH_TIMEZONE, "TIMESTAMPTZ"),
            ("uuid", OTHER, "UUID"),
            ("json", OTHER, "JSON"),
            ("jsonb", OTHER, "JSONB"),
            ("xml", SQLXML, "XML"),
        ],
    );

    Dialect::new(
        "postgres",
        info,
        Capabilities {
            catalogs: false,
            schemas: true,
            limit: true,
            limit_offset: true,
            limit_parameters: true,
            session_time_zone: true,
            if_exists_before_table: true,
            if_exists_after_table: false,
            drop_constraints: false,
            unique: true,
            not_null_unique: true,
            column_check: true,
            table_check: true,
            index_in_create_table: false,
            sequences: true,
        },
        Syntax {
            quote_open: "\"",
            quote_close: "\"",
            identifier_case: IdentifierCase::Lower,
            reserved: COMMON_RESERVED,
            null_column: "",
            no_columns_insert: "DEFAULT VALUES",
            cascade_constraints: " CASCADE",
            identity_column: "GENERATED BY DEFAULT AS IDENTITY",
            identity_names_sequence: false,
            comment_style: CommentStyle::Statement,
            limit_style: LimitStyle::LimitOffset,
            bool_literal: BoolLiteral::Keyword,
            bytes_literal: BytesLiteral::Bytea,
            backslash_escapes: false,
            upsert_style: UpsertStyle::OnConflict,
            session_time_zone: Some("SET TIME ZONE '{}'"),
        },
        Renderers {
            approx_row_count: Some(postgres_approx_count),
            default_value: keyword_default,
            sequence_options: standard_sequence_options,
            guarded_drop: plain_drop,
            reference_action: standard_action,
            drop_foreign_key: postgres_drop_foreign_key,
        },
        registry,
    )
}

/// MySQL and MariaDB.
pub fn mysql(info: DatabaseInfo) -> Dialect {
    use codes::*;
    let checks = info.is_at_least(8) || info.major_version.is_none();
    let mut registry = standard_registry();
    for (code, template) in [
        (FLOAT, "DOUBLE"),
        (LONGVARCHAR, "LONGTEXT"),
        (CLOB, "LONGTEXT"),
        (NCLOB, "LONGTEXT"),
        (LONGNVARCHAR, "LONGTEXT"),
        (SQLXML, "LONGTEXT"),
        (NCHAR, "CHAR({N})"),
        (NVARCHAR, "VARCHAR({N})"),
        (LONGVARBINARY, "LONGBLOB"),
        (BLOB, "LONGBLOB"),
        (TIMESTAMP, "DATETIME"),
        (TIMESTAMP_WITH_TIMEZONE, "TIMESTAMP"),
        (TIME_WITH_TIMEZONE, "TIME"),
    ] {
        registry.register(code, template);
    }
    named(&mut registry, None, OTHER, "UUID", "CHAR(36)");
    named(&mut registry, None, OTHER, "JSON", "JSON");
    named(&mut registry, None, OTHER, "JSONB", "JSON");
    natives(
        &mut registry,
        &[
            ("tinyint", TINYINT, "TINYINT"),
            ("smallint", SMALLINT, "SMALLINT"),
            ("int", INTEGER, "INT"),
            ("bigint", BIGINT, "BIGINT"),
            ("float", REAL, "FLOAT"),
            ("double", DOUBLE, "DOUBLE"),
            ("decimal", DECIMAL, "DECIMAL"),
            ("bit", BIT, "BIT"),
            ("char", CHAR, "CHAR"),
            ("varchar", VARCHAR, "VARCHAR"),
            ("text", LONGVARCHAR, "TEXT"),
            ("longtext", LONGVARCHAR, "LONGTEXT"),
            ("blob", LONGVARBINARY, "BLOB"),
            ("longblob", LONGVARBINARY, "LONGBLOB"),
            ("date", DATE, "DATE"),
            ("time", TIME, "TIME"),
            ("datetime", TIMESTAMP, "DATETIME"),
            ("timestamp", TIMESTAMP, "TIMESTAMP"),
            ("json", OTHER, "JSON"),
        ],
    );

    Dialect::new(
        "mysql",
        info,
        Capabilities {
            catalogs: true,
            schemas: false,
            limit: true,
            limit_offset: true,
            limit_parameters: true,
            session_time_zone: true,
            if_exists_before_table: true,
            if_exists_after_table: false,
            drop_constraints: true,
            unique: true,
            not_null_unique: true,
            column_check: checks,
            table_check: checks,
            index_in_create_table: true,
            sequences: false,
        },
        Syntax {
            quote_open: "`",
            quote_close: "`",
            identifier_case: IdentifierCase::Preserve,
            reserved: COMMON_RESERVED,
            null_column: "NULL",
            no_columns_insert: "() VALUES ()",
            cascade_constraints: "",
            identity_column: "AUTO_INCREMENT",
            identity_names_sequence: false,
            comment_style: CommentStyle::Inline,
            limit_style: LimitStyle::LimitOffset,
            bool_literal: BoolLiteral::Keyword,
            bytes_literal: BytesLiteral::HexString,
            backslash_escapes: true,
            upsert_style: UpsertStyle::Replace,
            session_time_zone: Some("SET time_zone = '{}'"),
        },
        Renderers {
            approx_row_count: Some(mysql_approx_count),
            default_value: numeric_default,
            sequence_options: standard_sequence_options,
            guarded_drop: plain_drop,
            reference_action: standard_action,
            drop_foreign_key: mysql_drop_foreign_key,
        },
        registry,
    )
}

/// Microsoft SQL Server. `DROP ... IF EXISTS` needs version 13 (2016).
pub fn mssql(info: DatabaseInfo) -> Dialect {
    use codes::*;
    let if_exists = info.is_at_least(13);
    let mut registry = standard_registry();
    registry.register(BOOLEAN, "BIT");
    registry.register(TIMESTAMP_WITH_TIMEZONE, "DATETIMEOFFSET");
    named(&mut registry, None, OTHER, "UUID", "UNIQUEIDENTIFIER");

    let aliases = [
        (JdbcTypeDesc::new(VARCHAR, "TIME"), TIME),
        (JdbcTypeDesc::new(VARCHAR, "DATE"), DATE),
        (JdbcTypeDesc::new(VARCHAR, "DATETIME2"), TIMESTAMP),
        (JdbcTypeDesc::new(LONGVARBINARY, "IMAGE"), BLOB),
        (JdbcTypeDesc::new(LONGVARCHAR, "TEXT"), CLOB),
        (JdbcTypeDesc::new(LONGNVARCHAR, "XML"), CLOB),
        (JdbcTypeDesc::new(MSSQL_DATETIMEOFFSET, "DATETIMEOFFSET"), TIMESTAMP),
    ];
    for (alias, canonical) in aliases {
        if let Err(e) = registry.add_alias(alias, JdbcTypeDesc::standard(canonical)) {
            warn!("Skipping built-in type alias: {}", e);
        }
    }
    natives(
        &mut registry,
        &[
            ("tinyint", TINYINT, "TINYINT"),
            ("smallint", SMALLINT, "SMALLINT"),
            ("int", INTEGER, "INT"),
            ("bigint", BIGINT, "BIGINT"),
            ("bit", BIT, "BIT"),
            ("real", REAL, "REAL"),
            ("float", DOUBLE, "FLOAT"),
            ("decimal", DECIMAL, "DECIMAL"),
            ("numeric", NUMERIC, "NUMERIC"),
            ("money", DECIMAL, "MONEY"),
            ("char", CHAR, "CHAR"),
            ("varchar", VARCHAR, "VARCHAR"),
            ("nchar", NCHAR, "NCHAR"),
            ("nvarchar", NVARCHAR, "NVARCHAR"),
            ("text", LONGVARCHAR, "TEXT"),
            ("ntext", LONGNVARCHAR, "NTEXT"),
            ("xml", LONGNVARCHAR, "XML"),
            ("binary", BINARY, "BINARY"),
            ("varbinary", VARBINARY, "VARBINARY"),
            ("image", LONGVARBINARY, "IMAGE"),
            ("date", VARCHAR, "DATE"),
            ("time", VARCHAR, "TIME"),
            ("datetime", TIMESTAMP, "DATETIME"),
            ("datetime2", VARCHAR, "DATETIME2"),
            ("datetimeoffset", MSSQL_DATETIMEOFFSET, "DATETIMEOFFSET"),
            ("uniqueidentifier", CHAR, "UNIQUEIDENTIFIER"),
        ],
    );

    Dialect::new(
        "mssql",
        info,
        Capabilities {
            catalogs: true,
            schemas: true,
            limit: true,
            limit_offset: false,
            limit_parameters: true,
            session_time_zone: false,
            if_exists_before_table: if_exists,
            if_exists_after_table: false,
            drop_constraints: true,
            unique: true,
            not_null_unique: true,
            column_check: true,
            table_check: true,
            index_in_create_table: false,
            sequences: true,
        },
        Syntax {
            quote_open: "[",
            quote_close: "]",
            identifier_case: IdentifierCase::Preserve,
            reserved: MSSQL_RESERVED,
            null_column: "NULL",
            no_columns_insert: "DEFAULT VALUES",
            cascade_constraints: "",
            identity_column: "IDENTITY",
            identity_names_sequence: false,
            comment_style: CommentStyle::Unsupported,
            limit_style: LimitStyle::Top,
            bool_literal: BoolLiteral::Numeric,
            bytes_literal: BytesLiteral::HexPrefix,
            backslash_escapes: false,
            upsert_style: UpsertStyle::Unsupported,
            session_time_zone: None,
        },
        Renderers {
            approx_row_count: Some(mssql_approx_count),
            default_value: numeric_default,
            sequence_options: standard_sequence_options,
            guarded_drop: mssql_guarded_drop,
            reference_action: mssql_action,
            drop_foreign_key: mssql_drop_foreign_key,
        },
        registry,
    )
}

/// NuoDB.
pub fn nuodb(info: DatabaseInfo) -> Dialect {
    use codes::*;
    let mut registry = standard_registry();
    for (code, template) in [
        (BIT, "BOOLEAN"),
        (TINYINT, "SMALLINT"),
        (LONGNVARCHAR, "CLOB"),
        (NCLOB, "CLOB"),
        (NCHAR, "CHAR({N})"),
        (NVARCHAR, "VARCHAR({N})"),
        (TIMESTAMP_WITH_TIMEZONE, "TIMESTAMP"),
        (TIME_WITH_TIMEZONE, "TIME"),
    ] {
        registry.register(code, template);
    }
    named(&mut registry, None, OTHER, "UUID", "CHAR(36)");
    for name in ["ARRAY", "STRUCT", "REF"] {
        named(&mut registry, Some("Oracle"), OTHER, name, "BLOB");
    }
    named(&mut registry, Some("MySQL"), LONGVARCHAR, "TEXT", "CLOB");
    named(&mut registry, Some("PostgreSQL"), OTHER, "JSON", "CLOB");
    named(&mut registry, Some("PostgreSQL"), OTHER, "JSONB", "CLOB");
    natives(
        &mut registry,
        &[
            ("smallint", SMALLINT, "SMALLINT"),
            ("integer", INTEGER, "INTEGER"),
            ("bigint", BIGINT, "BIGINT"),
            ("double", DOUBLE, "DOUBLE"),
            ("decimal", DECIMAL, "DECIMAL"),
            ("boolean", BOOLEAN, "BOOLEAN"),
            ("string", VARCHAR, "STRING"),
            ("varchar", VARCHAR, "VARCHAR"),
            ("clob", CLOB, "CLOB"),
            ("blob", BLOB, "BLOB"),
            ("date", DATE, "DATE"),
            ("time", TIME, "TIME"),
            ("timestamp", TIMESTAMP, "TIMESTAMP"),
        ],
    );

    Dialect::new(
        "nuodb",
        info,
        Capabilities {
            catalogs: false,
            schemas: true,
            limit: true,
            limit_offset: true,
            limit_parameters: true,
            session_time_zone: true,
            if_exists_before_table: true,
            if_exists_after_table: false,
            drop_constraints: false,
            unique: true,
            not_null_unique: true,
            column_check: true,
            table_check: true,
            index_in_create_table: false,
            sequences: true,
        },
        Syntax {
            quote_open: "\"",
            quote_close: "\"",
            identifier_case: IdentifierCase::Upper,
            reserved: COMMON_RESERVED,
            null_column: "",
            no_columns_insert: "DEFAULT VALUES",
            cascade_constraints: " CASCADE",
            identity_column: "GENERATED BY DEFAULT AS IDENTITY",
            identity_names_sequence: true,
            comment_style: CommentStyle::Unsupported,
            limit_style: LimitStyle::LimitOffset,
            bool_literal: BoolLiteral::Keyword,
            bytes_literal: BytesLiteral::HexString,
            backslash_escapes: false,
            upsert_style: UpsertStyle::Replace,
            session_time_zone: Some("SET TIME ZONE '{}'"),
        },
        Renderers {
            approx_row_count: None,
            default_value: keyword_default,
            sequence_options: nuodb_sequence_options,
            guarded_drop: plain_drop,
            reference_action: standard_action,
            drop_foreign_key: standard_drop_foreign_key,
        },
        registry,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::JdbcType;

    fn mssql_info() -> DatabaseInfo {
        DatabaseInfo::new("Microsoft SQL Server")
    }

    #[test]
    fn test_mssql_uniqueidentifier_renders_varchar() {
        let dialect = mssql(mssql_info());
        let ty = JdbcType::new(12, "UNIQUEIDENTIFIER")
            .with_size(36)
            .with_precision(36);
        assert_eq!(
            dialect.type_name(Some(&mssql_info()), &ty, "t.id").unwrap(),
            "VARCHAR(36)"
        );
    }

    #[test]
    fn test_mssql_ntext_renders_clob() {
        let dialect = mssql(mssql_info());
        let ty = JdbcType::new(2005, "NTEXT").with_size(0).with_precision(0);
        assert_eq!(
            dialect.type_name(Some(&mssql_info()), &ty, "t.body").unwrap(),
            "CLOB"
        );
    }

    #[test]
    fn test_mssql_aliases() {
        let dialect = mssql(mssql_info());
        let cases = [
            (JdbcTypeDesc::new(codes::VARCHAR, "datetime2"), codes::TIMESTAMP),
            (JdbcTypeDesc::new(codes::LONGVARBINARY, "IMAGE"), codes::BLOB),
            (JdbcTypeDesc::new(codes::LONGNVARCHAR, "XML"), codes::CLOB),
            (JdbcTypeDesc::new(MSSQL_DATETIMEOFFSET, "DATETIMEOFFSET"), codes::TIMESTAMP),
        ];
        for (alias, expected) in cases {
            let resolved = dialect.resolve_alias(&alias);
            assert_eq!(resolved, JdbcTypeDesc::standard(expected));
            assert_eq!(dialect.resolve_alias(&resolved), resolved);
        }
        let ty = JdbcType::new(codes::VARCHAR, "TIME");
        assert_eq!(dialect.type_name(None, &ty, "c").unwrap(), "TIME");
    }

    #[test]
    fn test_nuodb_renders_oracle_objects_as_blob() {
        let dialect = nuodb(DatabaseInfo::new("NuoDB"));
        let oracle = DatabaseInfo::new("Oracle");
        for name in ["ARRAY", "STRUCT", "REF"] {
            let ty = JdbcType::new(codes::OTHER, name);
            assert_eq!(dialect.type_name(Some(&oracle), &ty, "c").unwrap(), "BLOB");
        }
        let ty = JdbcType::new(codes::OTHER, "ARRAY");
        assert!(dialect.type_name(Some(&mssql_info()), &ty, "t.c").is_err());
    }

    #[test]
    fn test_postgres_vendor_specific_uuid() {
        let dialect = postgres(DatabaseInfo::new("PostgreSQL"));
        let ty = JdbcType::new(codes::CHAR, "uniqueidentifier").with_size(36);
        assert_eq!(dialect.type_name(Some(&mssql_info()), &ty, "c").unwrap(), "UUID");
        assert_eq!(dialect.type_name(None, &ty, "c").unwrap(), "CHAR(36)");
    }

    #[test]
    fn test_native_type_lookup() {
        let dialect = postgres(DatabaseInfo::new("PostgreSQL"));
        assert_eq!(
            dialect.registry().native_type("int4"),
            Some(&JdbcTypeDesc::new(codes::INTEGER, "INT4"))
        );
        assert_eq!(dialect.registry().native_type("geometry"), None);
    }

    #[test]
    fn test_sequence_options() {
        let dialect = postgres(DatabaseInfo::new("PostgreSQL"));
        let mut seq = Sequence::new("s");
        assert_eq!(
            dialect.create_sequence("\"s\"", &seq),
            "CREATE SEQUENCE \"s\" NO MINVALUE NO MAXVALUE NO CYCLE"
        );
        seq.start_with = Some(10);
        seq.cache = Some(5);
        let nuo = nuodb(DatabaseInfo::new("NuoDB"));
        assert_eq!(
            nuo.create_sequence("\"S\"", &seq),
            "CREATE SEQUENCE \"S\" START WITH 10 QUANTUM SIZE 5"
        );
    }

    #[test]
    fn test_clean_default() {
        assert_eq!(clean_default("((0))"), Some("0".into()));
        assert_eq!(clean_default("(1) + (2)"), Some("(1) + (2)".into()));
        assert_eq!(clean_default("'it''s'::text"), Some("'it''s'".into()));
        assert_eq!(clean_default("NULL"), None);
        assert_eq!(clean_default("now()"), Some("CURRENT_TIMESTAMP".into()));
    }

    #[test]
    fn test_mysql_check_support_follows_version() {
        assert!(!mysql(DatabaseInfo::new("MySQL").with_version(5, 7)).supports_column_check());
        assert!(mysql(DatabaseInfo::new("MySQL").with_version(8, 0)).supports_table_check());
    }
}
