//! Per-type value codecs and the registry that selects them.
//!
//! A [`ValueCodec`] converts one [`Value`] to and from its text form (used
//! by CSV) and its binary payload (used by the binary format). Codecs are
//! chosen per column by canonical [`JdbcTypeDesc`] through a
//! [`CodecRegistry`].

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::core::types::{codes, JdbcTypeDesc};
use crate::core::value::Value;
use crate::error::{MigrateError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const TIMESTAMP_TZ_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

/// Encode/decode strategy for one value kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueCodec {
    Bool,
    Int,
    Float,
    Decimal,
    Text,
    Bytes,
    Uuid,
    Date,
    Time,
    Timestamp,
    TimestampTz,
}

fn codec_error(message: String) -> MigrateError {
    MigrateError::transfer(String::new(), message)
}

impl ValueCodec {
    fn mismatch(self, value: &Value) -> MigrateError {
        codec_error(format!("{:?} codec cannot encode a {} value", self, value.kind()))
    }

    fn parse_error(self, text: &str, reason: impl std::fmt::Display) -> MigrateError {
        codec_error(format!("invalid {:?} value {:?}: {}", self, text, reason))
    }

    /// Text form of a value; `None` for NULL.
    pub fn encode_text(self, value: &Value) -> Result<Option<String>> {
        if value.is_null() {
            return Ok(None);
        }
        let text = match (self, value) {
            (ValueCodec::Bool, Value::Bool(b)) => b.to_string(),
            (ValueCodec::Int, Value::Int(i)) => i.to_string(),
            (ValueCodec::Float, Value::Float(f)) => f.to_string(),
            (ValueCodec::Float, Value::Int(i)) => i.to_string(),
            (ValueCodec::Decimal, Value::Decimal(d)) => d.to_string(),
            (ValueCodec::Decimal, Value::Int(i)) => i.to_string(),
            (ValueCodec::Text, Value::Text(s)) => s.clone(),
            (ValueCodec::Text, Value::Uuid(u)) => u.to_string(),
            (ValueCodec::Bytes, Value::Bytes(b)) => BASE64.encode(b),
            (ValueCodec::Uuid, Value::Uuid(u)) => u.to_string(),
            (ValueCodec::Date, Value::Date(d)) => d.format(DATE_FORMAT).to_string(),
            (ValueCodec::Time, Value::Time(t)) => t.format(TIME_FORMAT).to_string(),
            (ValueCodec::Timestamp, Value::Timestamp(ts)) => {
                ts.format(TIMESTAMP_FORMAT).to_string()
            }
            (ValueCodec::TimestampTz, Value::TimestampTz(ts)) => {
                ts.format(TIMESTAMP_TZ_FORMAT).to_string()
            }
            _ => return Err(self.mismatch(value)),
        };
        Ok(Some(text))
    }

    /// Parse the text form of a non-null value.
    pub fn decode_text(self, text: &str) -> Result<Value> {
        let value = match self {
            ValueCodec::Bool => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Value::Bool(true),
                "false" | "f" | "0" => Value::Bool(false),
                _ => return Err(self.parse_error(text, "expected true or false")),
            },
            ValueCodec::Int => Value::Int(
                text.trim()
                    .parse::<i64>()
                    .map_err(|e| self.parse_error(text, e))?,
            ),
            ValueCodec::Float => Value::Float(
                text.trim()
                    .parse::<f64>()
                    .map_err(|e| self.parse_error(text, e))?,
            ),
            ValueCodec::Decimal => {
                let trimmed = text.trim();
                let decimal = Decimal::from_str(trimmed)
                    .or_else(|_| Decimal::from_scientific(trimmed))
                    .map_err(|e| self.parse_error(text, e))?;
                Value::Decimal(decimal)
            }
            ValueCodec::Text => Value::Text(text.to_string()),
            ValueCodec::Bytes => Value::Bytes(
                BASE64
                    .decode(text.trim())
                    .map_err(|e| self.parse_error(text, e))?,
            ),
            ValueCodec::Uuid => Value::Uuid(
                Uuid::parse_str(text.trim()).map_err(|e| self.parse_error(text, e))?,
            ),
            ValueCodec::Date => Value::Date(
                NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
                    .map_err(|e| self.parse_error(text, e))?,
            ),
            ValueCodec::Time => Value::Time(
                NaiveTime::parse_from_str(text.trim(), TIME_FORMAT)
                    .map_err(|e| self.parse_error(text, e))?,
            ),
            ValueCodec::Timestamp => {
                let trimmed = text.trim();
                let ts = NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT)
                    .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f"))
                    .map_err(|e| self.parse_error(text, e))?;
                Value::Timestamp(ts)
            }
            ValueCodec::TimestampTz => {
                let trimmed = text.trim();
                let ts = DateTime::parse_from_str(trimmed, TIMESTAMP_TZ_FORMAT)
                    .or_else(|_| DateTime::parse_from_rfc3339(trimmed))
                    .map_err(|e| self.parse_error(text, e))?;
                Value::TimestampTz(ts)
            }
        };
        Ok(value)
    }

    /// Binary payload of a non-null value.
    pub fn encode_binary(self, value: &Value) -> Result<Vec<u8>> {
        let payload = match (self, value) {
            (ValueCodec::Bool, Value::Bool(b)) => vec![u8::from(*b)],
            (ValueCodec::Int, Value::Int(i)) => i.to_be_bytes().to_vec(),
            (ValueCodec::Float, Value::Float(f)) => f.to_be_bytes().to_vec(),
            (ValueCodec::Float, Value::Int(i)) => (*i as f64).to_be_bytes().to_vec(),
            (ValueCodec::Decimal, Value::Decimal(d)) => d.serialize().to_vec(),
            (ValueCodec::Decimal, Value::Int(i)) => Decimal::from(*i).serialize().to_vec(),
            (ValueCodec::Text, Value::Text(s)) => s.as_bytes().to_vec(),
            (ValueCodec::Text, Value::Uuid(u)) => u.to_string().into_bytes(),
            (ValueCodec::Bytes, Value::Bytes(b)) => b.clone(),
            (ValueCodec::Uuid, Value::Uuid(u)) => u.as_bytes().to_vec(),
            (ValueCodec::Date, Value::Date(d)) => d.num_days_from_ce().to_be_bytes().to_vec(),
            (ValueCodec::Time, Value::Time(t)) => {
                let nanos = u64::from(t.num_seconds_from_midnight()) * 1_000_000_000
                    + u64::from(t.nanosecond());
                nanos.to_be_bytes().to_vec()
            }
            (ValueCodec::Timestamp, Value::Timestamp(ts)) => {
                let utc = ts.and_utc();
                let mut out = utc.timestamp().to_be_bytes().to_vec();
                out.extend_from_slice(&utc.timestamp_subsec_nanos().to_be_bytes());
                out
            }
            (ValueCodec::TimestampTz, Value::TimestampTz(ts)) => {
                let mut out = ts.timestamp().to_be_bytes().to_vec();
                out.extend_from_slice(&ts.timestamp_subsec_nanos().to_be_bytes());
                out.extend_from_slice(&ts.offset().local_minus_utc().to_be_bytes());
                out
            }
            _ => return Err(self.mismatch(value)),
        };
        Ok(payload)
    }

    /// Decode a binary payload produced by [`ValueCodec::encode_binary`].
    pub fn decode_binary(self, payload: &[u8]) -> Result<Value> {
        let invalid = || codec_error(format!("invalid {:?} payload of {} bytes", self, payload.len()));
        let value = match self {
            ValueCodec::Bool => match payload {
                [b] => Value::Bool(*b != 0),
                _ => return Err(invalid()),
            },
            ValueCodec::Int => Value::Int(i64::from_be_bytes(fixed(payload).ok_or_else(invalid)?)),
            ValueCodec::Float => {
                Value::Float(f64::from_be_bytes(fixed(payload).ok_or_else(invalid)?))
            }
            ValueCodec::Decimal => {
                Value::Decimal(Decimal::deserialize(fixed(payload).ok_or_else(invalid)?))
            }
            ValueCodec::Text => Value::Text(
                String::from_utf8(payload.to_vec())
                    .map_err(|e| codec_error(format!("invalid UTF-8 text: {}", e)))?,
            ),
            ValueCodec::Bytes => Value::Bytes(payload.to_vec()),
            ValueCodec::Uuid => Value::Uuid(Uuid::from_bytes(fixed(payload).ok_or_else(invalid)?)),
            ValueCodec::Date => {
                let days = i32::from_be_bytes(fixed(payload).ok_or_else(invalid)?);
                Value::Date(NaiveDate::from_num_days_from_ce_opt(days).ok_or_else(invalid)?)
            }
            ValueCodec::Time => {
                let nanos = u64::from_be_bytes(fixed(payload).ok_or_else(invalid)?);
                let secs = u32::try_from(nanos / 1_000_000_000).map_err(|_| invalid())?;
                let sub = (nanos % 1_000_000_000) as u32;
                Value::Time(
                    NaiveTime::from_num_seconds_from_midnight_opt(secs, sub).ok_or_else(invalid)?,
                )
            }
            ValueCodec::Timestamp => {
                if payload.len() != 12 {
                    return Err(invalid());
                }
                let secs = i64::from_be_bytes(fixed(&payload[..8]).ok_or_else(invalid)?);
                let nanos = u32::from_be_bytes(fixed(&payload[8..]).ok_or_else(invalid)?);
                let utc = DateTime::from_timestamp(secs, nanos).ok_or_else(invalid)?;
                Value::Timestamp(utc.naive_utc())
            }
            ValueCodec::TimestampTz => {
                if payload.len() != 16 {
                    return Err(invalid());
                }
                let secs = i64::from_be_bytes(fixed(&payload[..8]).ok_or_else(invalid)?);
                let nanos = u32::from_be_bytes(fixed(&payload[8..12]).ok_or_else(invalid)?);
                let offset = i32::from_be_bytes(fixed(&payload[12..]).ok_or_else(invalid)?);
                let offset = FixedOffset::east_opt(offset).ok_or_else(invalid)?;
                let utc = DateTime::from_timestamp(secs, nanos).ok_or_else(invalid)?;
                Value::TimestampTz(utc.with_timezone(&offset))
            }
        };
        Ok(value)
    }
}

fn fixed<const N: usize>(payload: &[u8]) -> Option<[u8; N]> {
    payload.try_into().ok()
}

/// Codec lookup keyed by canonical type descriptor.
///
/// An exact `(code, name)` entry wins over a code-only entry.
#[derive(Debug, Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<JdbcTypeDesc, ValueCodec>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codecs for every standard type code plus the common named extensions.
    pub fn with_defaults() -> Self {
        use codes::*;
        let mut registry = Self::new();
        for (code, codec) in [
            (BIT, ValueCodec::Bool),
            (BOOLEAN, ValueCodec::Bool),
            (TINYINT, ValueCodec::Int),
            (SMALLINT, ValueCodec::Int),
            (INTEGER, ValueCodec::Int),
            (BIGINT, ValueCodec::Int),
            (REAL, ValueCodec::Float),
            (FLOAT, ValueCodec::Float),
            (DOUBLE, ValueCodec::Float),
            (NUMERIC, ValueCodec::Decimal),
            (DECIMAL, ValueCodec::Decimal),
            (CHAR, ValueCodec::Text),
            (VARCHAR, ValueCodec::Text),
            (LONGVARCHAR, ValueCodec::Text),
            (NCHAR, ValueCodec::Text),
            (NVARCHAR, ValueCodec::Text),
            (LONGNVARCHAR, ValueCodec::Text),
            (CLOB, ValueCodec::Text),
            (NCLOB, ValueCodec::Text),
            (SQLXML, ValueCodec::Text),
            (BINARY, ValueCodec::Bytes),
            (VARBINARY, ValueCodec::Bytes),
            (LONGVARBINARY, ValueCodec::Bytes),
            (BLOB, ValueCodec::Bytes),
            (DATE, ValueCodec::Date),
            (TIME, ValueCodec::Time),
            (TIME_WITH_TIMEZONE, ValueCodec::Text),
            (TIMESTAMP, ValueCodec::Timestamp),
            (TIMESTAMP_WITH_TIMEZONE, ValueCodec::TimestampTz),
        ] {
            registry.register(JdbcTypeDesc::of_code(code), codec);
        }
        registry.register(JdbcTypeDesc::new(OTHER, "UUID"), ValueCodec::Uuid);
        registry.register(JdbcTypeDesc::new(OTHER, "JSON"), ValueCodec::Text);
        registry.register(JdbcTypeDesc::new(OTHER, "JSONB"), ValueCodec::Text);
        registry
    }

    /// Install or replace the codec for a descriptor.
    pub fn register(&mut self, desc: JdbcTypeDesc, codec: ValueCodec) {
        self.codecs.insert(desc, codec);
    }

    pub fn lookup(&self, desc: &JdbcTypeDesc) -> Option<ValueCodec> {
        self.codecs
            .get(desc)
            .or_else(|| self.codecs.get(&desc.code_only()))
            .copied()
    }
}
