//! Row formats: pluggable encode/decode pairs keyed by short name.
//!
//! A format is a `tokio_util` codec over whole rows. Decoders yield a
//! per-row result so that a value that fails to convert does not end the
//! stream; framing problems (bad magic, unterminated quotes, invalid UTF-8)
//! are returned as the decoder error and stop the stream.

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::value::Row;
use crate::error::{MigrateError, Result};

use super::binary::BinaryCodec;
use super::csv::CsvCodec;
use super::handle::ValueHandle;

/// One decoded record: the row, or the reason its values could not be converted.
pub type RowResult = std::result::Result<Row, MigrateError>;

/// A row codec for one bound column list.
pub trait RowCodec:
    Decoder<Item = RowResult, Error = MigrateError> + Encoder<Row, Error = MigrateError> + Send
{
    /// Short format name, also used as the file extension.
    fn name(&self) -> &'static str;

    /// Write the stream preamble (header record, magic) before any row.
    fn encode_header(&mut self, dst: &mut BytesMut) -> Result<()>;
}

/// Boxed codec usable with `FramedRead` and `FramedWrite`.
pub struct FormatCodec {
    inner: Box<dyn RowCodec>,
}

impl FormatCodec {
    pub fn new(inner: Box<dyn RowCodec>) -> Self {
        Self { inner }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    pub fn encode_header(&mut self, dst: &mut BytesMut) -> Result<()> {
        self.inner.encode_header(dst)
    }
}

impl Decoder for FormatCodec {
    type Item = RowResult;
    type Error = MigrateError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<RowResult>> {
        self.inner.decode(src)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<RowResult>> {
        self.inner.decode_eof(src)
    }
}

impl Encoder<Row> for FormatCodec {
    type Error = MigrateError;

    fn encode(&mut self, row: Row, dst: &mut BytesMut) -> Result<()> {
        self.inner.encode(row, dst)
    }
}

/// Flat string options shared by all formats, e.g. `csv.delimiter`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatOptions {
    values: BTreeMap<String, String>,
}

impl FormatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse a boolean option, falling back to `default` when unset.
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(MigrateError::Config(format!(
                    "{} must be true or false, got '{}'",
                    key, raw
                ))),
            },
        }
    }

    /// Parse a single-character option, falling back to `default` when unset.
    pub fn get_char(&self, key: &str, default: char) -> Result<char> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => {
                let mut chars = raw.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(MigrateError::Config(format!(
                        "{} must be a single character, got '{}'",
                        key, raw
                    ))),
                }
            }
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormatOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

pub type CodecFactory = fn(&[ValueHandle], &FormatOptions) -> Result<Box<dyn RowCodec>>;

/// Row formats by short name.
pub struct FormatRegistry {
    factories: HashMap<String, CodecFactory>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with `csv` and `bin`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("csv", csv_codec);
        registry.register("bin", binary_codec);
        registry
    }

    /// Install a format. A later registration under the same name wins.
    pub fn register(&mut self, name: &str, factory: CodecFactory) {
        self.factories.insert(name.to_ascii_lowercase(), factory);
    }

    pub fn has_format(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build a codec for the bound columns.
    pub fn create(
        &self,
        name: &str,
        handles: &[ValueHandle],
        options: &FormatOptions,
    ) -> Result<FormatCodec> {
        let factory = self
            .factories
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| {
                MigrateError::Config(format!(
                    "unknown format '{}' (available: {})",
                    name,
                    self.names().join(", ")
                ))
            })?;
        Ok(FormatCodec::new(factory(handles, options)?))
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn csv_codec(handles: &[ValueHandle], options: &FormatOptions) -> Result<Box<dyn RowCodec>> {
    Ok(Box::new(CsvCodec::new(handles.to_vec(), options)?))
}

fn binary_codec(handles: &[ValueHandle], _options: &FormatOptions) -> Result<Box<dyn RowCodec>> {
    Ok(Box::new(BinaryCodec::new(handles.to_vec())))
}

/// Error for a malformed stream, which ends decoding.
pub(crate) fn framing_error(format: &str, message: impl std::fmt::Display) -> MigrateError {
    MigrateError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("malformed {} stream: {}", format, message),
    ))
}
