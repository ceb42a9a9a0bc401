//! JDBC-style type descriptors.
//!
//! Types are identified by a numeric code (the `java.sql.Types` numbering used
//! by every vendor's catalog views) plus the vendor's own type name. The pair
//! is the structural key for alias and type-name lookups.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric type codes.
pub mod codes {
    pub const BIT: i32 = -7;
    pub const TINYINT: i32 = -6;
    pub const SMALLINT: i32 = 5;
    pub const INTEGER: i32 = 4;
    pub const BIGINT: i32 = -5;
    pub const FLOAT: i32 = 6;
    pub const REAL: i32 = 7;
    pub const DOUBLE: i32 = 8;
    pub const NUMERIC: i32 = 2;
    pub const DECIMAL: i32 = 3;
    pub const CHAR: i32 = 1;
    pub const VARCHAR: i32 = 12;
    pub const LONGVARCHAR: i32 = -1;
    pub const DATE: i32 = 91;
    pub const TIME: i32 = 92;
    pub const TIMESTAMP: i32 = 93;
    pub const BINARY: i32 = -2;
    pub const VARBINARY: i32 = -3;
    pub const LONGVARBINARY: i32 = -4;
    pub const NULL: i32 = 0;
    pub const OTHER: i32 = 1111;
    pub const JAVA_OBJECT: i32 = 2000;
    pub const DISTINCT: i32 = 2001;
    pub const STRUCT: i32 = 2002;
    pub const ARRAY: i32 = 2003;
    pub const BLOB: i32 = 2004;
    pub const CLOB: i32 = 2005;
    pub const REF: i32 = 2006;
    pub const BOOLEAN: i32 = 16;
    pub const NCHAR: i32 = -15;
    pub const NVARCHAR: i32 = -9;
    pub const LONGNVARCHAR: i32 = -16;
    pub const NCLOB: i32 = 2011;
    pub const SQLXML: i32 = 2009;
    pub const TIME_WITH_TIMEZONE: i32 = 2013;
    pub const TIMESTAMP_WITH_TIMEZONE: i32 = 2014;
}

/// Standard name for a type code, if the code is a known one.
pub fn standard_type_name(type_code: i32) -> Option<&'static str> {
    use codes::*;
    let name = match type_code {
        BIT => "BIT",
        TINYINT => "TINYINT",
        SMALLINT => "SMALLINT",
        INTEGER => "INTEGER",
        BIGINT => "BIGINT",
        FLOAT => "FLOAT",
        REAL => "REAL",
        DOUBLE => "DOUBLE",
        NUMERIC => "NUMERIC",
        DECIMAL => "DECIMAL",
        CHAR => "CHAR",
        VARCHAR => "VARCHAR",
        LONGVARCHAR => "LONGVARCHAR",
        DATE => "DATE",
        TIME => "TIME",
        TIMESTAMP => "TIMESTAMP",
        BINARY => "BINARY",
        VARBINARY => "VARBINARY",
        LONGVARBINARY => "LONGVARBINARY",
        NULL => "NULL",
        OTHER => "OTHER",
        JAVA_OBJECT => "JAVA_OBJECT",
        DISTINCT => "DISTINCT",
        STRUCT => "STRUCT",
        ARRAY => "ARRAY",
        BLOB => "BLOB",
        CLOB => "CLOB",
        REF => "REF",
        BOOLEAN => "BOOLEAN",
        NCHAR => "NCHAR",
        NVARCHAR => "NVARCHAR",
        LONGNVARCHAR => "LONGNVARCHAR",
        NCLOB => "NCLOB",
        SQLXML => "SQLXML",
        TIME_WITH_TIMEZONE => "TIME_WITH_TIMEZONE",
        TIMESTAMP_WITH_TIMEZONE => "TIMESTAMP_WITH_TIMEZONE",
        _ => return None,
    };
    Some(name)
}

/// Structural `(type_code, type_name)` key.
///
/// Type names compare case-insensitively: they are stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JdbcTypeDesc {
    pub type_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

impl JdbcTypeDesc {
    /// Descriptor with a vendor type name.
    pub fn new(type_code: i32, type_name: impl AsRef<str>) -> Self {
        Self {
            type_code,
            type_name: Some(type_name.as_ref().to_uppercase()),
        }
    }

    /// Descriptor matching any type name for the code.
    pub fn of_code(type_code: i32) -> Self {
        Self {
            type_code,
            type_name: None,
        }
    }

    /// Descriptor named after the standard name of its code.
    pub fn standard(type_code: i32) -> Self {
        match standard_type_name(type_code) {
            Some(name) => Self::new(type_code, name),
            None => Self::of_code(type_code),
        }
    }

    /// Same code, no name.
    pub fn code_only(&self) -> Self {
        Self::of_code(self.type_code)
    }
}

impl fmt::Display for JdbcTypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.type_name {
            Some(name) => write!(f, "({}, {})", self.type_code, name),
            None => write!(f, "({})", self.type_code),
        }
    }
}

/// A concrete column type: descriptor plus size, precision and scale.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JdbcType {
    pub type_code: i32,
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<i32>,
}

impl JdbcType {
    pub fn new(type_code: i32, type_name: impl Into<String>) -> Self {
        Self {
            type_code,
            type_name: type_name.into(),
            ..Default::default()
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_scale(mut self, scale: i32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn desc(&self) -> JdbcTypeDesc {
        JdbcTypeDesc::new(self.type_code, &self.type_name)
    }
}

/// Size/precision/scale restriction attached to a registered type name.
///
/// A `None` component matches any value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SizeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<i32>,
}

impl SizeSpec {
    pub fn new(size: Option<u64>, precision: Option<u32>, scale: Option<i32>) -> Self {
        Self {
            size,
            precision,
            scale,
        }
    }

    /// True when no component is restricted.
    pub fn is_any(&self) -> bool {
        self.size.is_none() && self.precision.is_none() && self.scale.is_none()
    }

    pub fn matches(&self, jdbc_type: &JdbcType) -> bool {
        fn component<T: PartialEq>(spec: Option<T>, value: Option<T>) -> bool {
            match spec {
                None => true,
                Some(expected) => value == Some(expected),
            }
        }
        component(self.size, jdbc_type.size)
            && component(self.precision, jdbc_type.precision)
            && component(self.scale, jdbc_type.scale)
    }

    /// Number of restricted components, used to prefer specific entries.
    pub fn specificity(&self) -> usize {
        [self.size.is_some(), self.precision.is_some(), self.scale.is_some()]
            .iter()
            .filter(|set| **set)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desc_names_compare_case_insensitively() {
        assert_eq!(
            JdbcTypeDesc::new(codes::VARCHAR, "uniqueidentifier"),
            JdbcTypeDesc::new(codes::VARCHAR, "UNIQUEIDENTIFIER")
        );
        assert_ne!(
            JdbcTypeDesc::new(codes::VARCHAR, "TEXT"),
            JdbcTypeDesc::new(codes::LONGVARCHAR, "TEXT")
        );
    }

    #[test]
    fn test_standard_desc() {
        assert_eq!(
            JdbcTypeDesc::standard(codes::CLOB),
            JdbcTypeDesc::new(2005, "CLOB")
        );
        assert_eq!(JdbcTypeDesc::standard(-155), JdbcTypeDesc::of_code(-155));
    }

    #[test]
    fn test_display() {
        assert_eq!(JdbcTypeDesc::new(12, "varchar").to_string(), "(12, VARCHAR)");
        assert_eq!(JdbcTypeDesc::of_code(4).to_string(), "(4)");
    }

    #[test]
    fn test_size_spec_matching() {
        let ty = JdbcType::new(codes::VARCHAR, "VARCHAR").with_size(36);
        assert!(SizeSpec::default().matches(&ty));
        assert!(SizeSpec::new(Some(36), None, None).matches(&ty));
        assert!(!SizeSpec::new(Some(255), None, None).matches(&ty));
        assert!(!SizeSpec::new(None, Some(10), None).matches(&ty));
        assert_eq!(SizeSpec::new(Some(1), None, Some(0)).specificity(), 2);
    }
}
