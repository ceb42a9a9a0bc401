//! Column bindings for row transfer.

use serde::Serialize;

use crate::core::metadata::Column;
use crate::core::types::JdbcTypeDesc;
use crate::core::value::Value;
use crate::dialect::Dialect;
use crate::error::{MigrateError, Result};

use super::codec::{CodecRegistry, ValueCodec};

/// One bound column: its position in external records and its codec.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueHandle {
    pub position: usize,
    pub column: String,
    /// Canonical descriptor after alias resolution.
    pub type_desc: JdbcTypeDesc,
    pub codec: ValueCodec,
}

impl ValueHandle {
    pub fn encode_text(&self, value: &Value) -> Result<Option<String>> {
        self.codec
            .encode_text(value)
            .map_err(|e| with_column(e, &self.column))
    }

    pub fn decode_text(&self, text: &str) -> Result<Value> {
        self.codec
            .decode_text(text)
            .map_err(|e| with_column(e, &self.column))
    }

    pub fn encode_binary(&self, value: &Value) -> Result<Vec<u8>> {
        self.codec
            .encode_binary(value)
            .map_err(|e| with_column(e, &self.column))
    }

    pub fn decode_binary(&self, payload: &[u8]) -> Result<Value> {
        self.codec
            .decode_binary(payload)
            .map_err(|e| with_column(e, &self.column))
    }
}

fn with_column(err: MigrateError, column: &str) -> MigrateError {
    match err {
        MigrateError::ValueTransfer {
            table,
            row,
            column: None,
            message,
        } => MigrateError::ValueTransfer {
            table,
            row,
            column: Some(column.to_string()),
            message,
        },
        other => other,
    }
}

/// Bind every column of `table` to a codec, in declaration order.
///
/// Each column type is first resolved through `dialect`'s aliases. A type
/// without a codec fails the whole bind before any row is read.
pub fn bind_input(
    table: &str,
    columns: &[Column],
    dialect: Option<&Dialect>,
    codecs: &CodecRegistry,
) -> Result<Vec<ValueHandle>> {
    columns
        .iter()
        .enumerate()
        .map(|(position, column)| {
            let desc = JdbcTypeDesc::new(column.type_code, &column.type_name);
            let canonical = match dialect {
                Some(dialect) => dialect.resolve_alias(&desc),
                None => desc,
            };
            let codec = codecs.lookup(&canonical).ok_or_else(|| {
                MigrateError::type_not_supported(&canonical, format!("{}.{}", table, column.name))
            })?;
            Ok(ValueHandle {
                position,
                column: column.name.clone(),
                type_desc: canonical,
                codec,
            })
        })
        .collect()
}

/// Column names in bind order, as used for header records.
pub fn header(handles: &[ValueHandle]) -> Vec<&str> {
    handles.iter().map(|h| h.column.as_str()).collect()
}

/// Check that a row matches the bound column count.
pub fn check_arity(handles: &[ValueHandle], row: &[Value]) -> Result<()> {
    if row.len() != handles.len() {
        return Err(MigrateError::transfer(
            String::new(),
            format!("expected {} values, got {}", handles.len(), row.len()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::DatabaseInfo;
    use crate::core::types::codes;
    use crate::dialect::vendors;

    #[test]
    fn test_bind_resolves_aliases_before_lookup() {
        let mssql = vendors::mssql(DatabaseInfo::new("Microsoft SQL Server").with_version(15, 0));
        let columns = vec![
            Column::new("id", codes::INTEGER, "int"),
            Column::new("created", codes::VARCHAR, "datetime2"),
            Column::new("body", codes::LONGVARCHAR, "text"),
        ];
        let handles = bind_input("posts", &columns, Some(&mssql), &CodecRegistry::with_defaults())
            .unwrap();
        let codecs: Vec<ValueCodec> = handles.iter().map(|h| h.codec).collect();
        assert_eq!(
            codecs,
            vec![ValueCodec::Int, ValueCodec::Timestamp, ValueCodec::Text]
        );
        assert_eq!(handles[1].position, 1);
        assert_eq!(header(&handles), vec!["id", "created", "body"]);
    }

    #[test]
    fn test_bind_fails_fast_on_unregistered_type() {
        let columns = vec![
            Column::new("id", codes::INTEGER, "INTEGER"),
            Column::new("shape", codes::OTHER, "GEOMETRY"),
        ];
        let err = bind_input("maps", &columns, None, &CodecRegistry::with_defaults()).unwrap_err();
        match err {
            MigrateError::TypeNotSupported { column, .. } => assert_eq!(column, "maps.shape"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_error_names_column() {
        let handles = bind_input(
            "t",
            &[Column::new("n", codes::INTEGER, "INTEGER")],
            None,
            &CodecRegistry::with_defaults(),
        )
        .unwrap();
        let err = handles[0].decode_text("abc").unwrap_err().at_row("t", 4, None);
        assert!(err
            .to_string()
            .starts_with("Transfer failed for table t at row 4, column n: invalid Int value"));
    }
}
