//! Delimited text rows.
//!
//! Escaping follows the record layout used for dumps: with quoting off,
//! special characters inside a value are prefixed with the escape character
//! and an empty string is written as two quote characters. A bare empty
//! field is NULL.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::value::{Row, Value};
use crate::error::{MigrateError, Result};

use super::format::{framing_error, FormatOptions, RowCodec, RowResult};
use super::handle::{check_arity, ValueHandle};

pub const OPTION_DELIMITER: &str = "csv.delimiter";
pub const OPTION_QUOTE: &str = "csv.quote";
pub const OPTION_ESCAPE: &str = "csv.escape";
pub const OPTION_LINE_SEPARATOR: &str = "csv.line.separator";
pub const OPTION_ENCODING: &str = "csv.encoding";
pub const OPTION_QUOTING: &str = "csv.quoting";

/// Parsed `csv.*` options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: char,
    pub quote: char,
    pub escape: char,
    pub line_separator: String,
    /// Wrap every non-null value in quotes.
    pub quoting: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote: '"',
            escape: '|',
            line_separator: "\r\n".to_string(),
            quoting: false,
        }
    }
}

impl CsvOptions {
    pub fn from_options(options: &FormatOptions) -> Result<Self> {
        let defaults = Self::default();
        let parsed = Self {
            delimiter: options.get_char(OPTION_DELIMITER, defaults.delimiter)?,
            quote: options.get_char(OPTION_QUOTE, defaults.quote)?,
            escape: options.get_char(OPTION_ESCAPE, defaults.escape)?,
            line_separator: match options.get(OPTION_LINE_SEPARATOR) {
                Some(raw) => parse_line_separator(raw)?,
                None => defaults.line_separator,
            },
            quoting: options.get_bool(OPTION_QUOTING, defaults.quoting)?,
        };
        if let Some(encoding) = options.get(OPTION_ENCODING) {
            if !matches!(encoding.to_ascii_lowercase().as_str(), "utf-8" | "utf8") {
                return Err(MigrateError::Config(format!(
                    "{} '{}' is not supported, only UTF-8",
                    OPTION_ENCODING, encoding
                )));
            }
        }
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<()> {
        for (key, c) in [
            (OPTION_DELIMITER, self.delimiter),
            (OPTION_QUOTE, self.quote),
            (OPTION_ESCAPE, self.escape),
        ] {
            if c == '\r' || c == '\n' {
                return Err(MigrateError::Config(format!(
                    "{} cannot be a line break",
                    key
                )));
            }
        }
        if self.delimiter == self.quote || self.delimiter == self.escape {
            return Err(MigrateError::Config(format!(
                "{} must differ from {} and {}",
                OPTION_DELIMITER, OPTION_QUOTE, OPTION_ESCAPE
            )));
        }
        Ok(())
    }
}

fn parse_line_separator(raw: &str) -> Result<String> {
    let separator = match raw.to_ascii_lowercase().as_str() {
        "crlf" | "\r\n" | "\\r\\n" => "\r\n",
        "lf" | "\n" | "\\n" => "\n",
        "cr" | "\r" | "\\r" => "\r",
        _ => {
            return Err(MigrateError::Config(format!(
                "{} must be crlf, lf or cr, got {:?}",
                OPTION_LINE_SEPARATOR, raw
            )))
        }
    };
    Ok(separator.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldState {
    Start,
    Unquoted,
    Quoted,
    /// After the closing quote of a quoted field.
    Closed,
}

impl FieldState {
    /// Finished field value; `None` is a bare empty field.
    fn finish(self, field: &mut String) -> Option<String> {
        match self {
            FieldState::Start => None,
            _ => Some(std::mem::take(field)),
        }
    }
}

type Record = (Vec<Option<String>>, usize);

/// CSV codec for one bound column list.
pub struct CsvCodec {
    handles: Vec<ValueHandle>,
    options: CsvOptions,
    header_read: bool,
}

impl CsvCodec {
    pub fn new(handles: Vec<ValueHandle>, options: &FormatOptions) -> Result<Self> {
        Ok(Self::with_options(handles, CsvOptions::from_options(options)?))
    }

    pub fn with_options(handles: Vec<ValueHandle>, options: CsvOptions) -> Self {
        Self {
            handles,
            options,
            header_read: false,
        }
    }

    fn is_special(&self, c: char) -> bool {
        let o = &self.options;
        c == o.delimiter || c == o.quote || c == o.escape || c == '\r' || c == '\n'
    }

    fn write_field(&self, out: &mut String, text: &str) {
        let o = &self.options;
        // With escape == quote a prefixed quote reads back as the empty-string
        // marker, so such values are written as quoted fields instead.
        let rfc_quoted = o.escape == o.quote && text.chars().any(|c| self.is_special(c));
        if o.quoting || rfc_quoted {
            out.push(o.quote);
            for c in text.chars() {
                if c == o.quote || c == o.escape {
                    out.push(o.escape);
                }
                out.push(c);
            }
            out.push(o.quote);
        } else if text.is_empty() {
            out.push(o.quote);
            out.push(o.quote);
        } else {
            for c in text.chars() {
                if self.is_special(c) {
                    out.push(o.escape);
                }
                out.push(c);
            }
        }
    }

    fn write_record<'a>(&self, fields: impl IntoIterator<Item = Option<&'a str>>, dst: &mut BytesMut) {
        let mut line = String::new();
        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 {
                line.push(self.options.delimiter);
            }
            if let Some(text) = field {
                self.write_field(&mut line, text);
            }
        }
        line.push_str(&self.options.line_separator);
        dst.put_slice(line.as_bytes());
    }

    /// Scan one record from the front of `text`.
    ///
    /// Returns the fields and the number of bytes consumed, or `None` when
    /// the record is not complete yet.
    fn scan(&self, text: &str, eof: bool) -> Result<Option<Record>> {
        let o = &self.options;
        let mut fields = Vec::with_capacity(self.handles.len());
        let mut field = String::new();
        let mut state = FieldState::Start;
        let mut chars = text.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            if state == FieldState::Quoted {
                if c == o.quote {
                    if o.escape == o.quote {
                        match chars.peek() {
                            Some(&(_, next)) if next == o.quote => {
                                chars.next();
                                field.push(o.quote);
                                continue;
                            }
                            None if !eof => return Ok(None),
                            _ => {}
                        }
                    }
                    state = FieldState::Closed;
                } else if c == o.escape {
                    match chars.next() {
                        Some((_, next)) => field.push(next),
                        None if eof => {
                            return Err(framing_error("csv", "escape character at end of input"))
                        }
                        None => return Ok(None),
                    }
                } else {
                    field.push(c);
                }
                continue;
            }

            if c == o.delimiter {
                fields.push(state.finish(&mut field));
                state = FieldState::Start;
            } else if c == '\n' || c == '\r' {
                let mut end = i + 1;
                if c == '\r' {
                    match chars.peek() {
                        Some(&(j, '\n')) => end = j + 1,
                        None if !eof => return Ok(None),
                        _ => {}
                    }
                }
                fields.push(state.finish(&mut field));
                return Ok(Some((fields, end)));
            } else if state == FieldState::Closed {
                return Err(framing_error(
                    "csv",
                    format!("unexpected {:?} after closing quote", c),
                ));
            } else if state == FieldState::Start && c == o.quote {
                state = FieldState::Quoted;
            } else if c == o.escape {
                match chars.next() {
                    Some((_, next)) => field.push(next),
                    None if eof => {
                        return Err(framing_error("csv", "escape character at end of input"))
                    }
                    None => return Ok(None),
                }
                state = FieldState::Unquoted;
            } else {
                field.push(c);
                state = FieldState::Unquoted;
            }
        }

        if !eof {
            return Ok(None);
        }
        if state == FieldState::Quoted {
            return Err(framing_error("csv", "unterminated quoted field"));
        }
        fields.push(state.finish(&mut field));
        Ok(Some((fields, text.len())))
    }

    /// Next complete record in `src`, consuming its bytes.
    fn next_record(&self, src: &mut BytesMut, eof: bool) -> Result<Option<Vec<Option<String>>>> {
        if src.is_empty() {
            return Ok(None);
        }
        let (text, invalid_at) = match std::str::from_utf8(&src[..]) {
            Ok(text) => (text, None),
            Err(e) => {
                let valid = e.valid_up_to();
                // A truncated trailing sequence can still be completed by more input.
                let invalid = (e.error_len().is_some() || eof).then_some(valid);
                let text = std::str::from_utf8(&src[..valid])
                    .map_err(|e| framing_error("csv", e))?;
                (text, invalid)
            }
        };
        match self.scan(text, eof && invalid_at.is_none())? {
            Some((fields, consumed)) => {
                src.advance(consumed);
                Ok(Some(fields))
            }
            None => match invalid_at {
                Some(offset) => Err(framing_error(
                    "csv",
                    format!("invalid UTF-8 at byte {}", offset),
                )),
                None => Ok(None),
            },
        }
    }

    fn check_header(&self, fields: &[Option<String>]) -> Result<()> {
        let found: Vec<&str> = fields.iter().map(|f| f.as_deref().unwrap_or("")).collect();
        let matches = found.len() == self.handles.len()
            && found
                .iter()
                .zip(&self.handles)
                .all(|(name, handle)| name.eq_ignore_ascii_case(&handle.column));
        if !matches {
            let expected: Vec<&str> = self.handles.iter().map(|h| h.column.as_str()).collect();
            return Err(framing_error(
                "csv",
                format!(
                    "header [{}] does not match columns [{}]",
                    found.join(", "),
                    expected.join(", ")
                ),
            ));
        }
        Ok(())
    }

    fn to_row(&self, fields: Vec<Option<String>>) -> RowResult {
        if fields.len() != self.handles.len() {
            return Err(MigrateError::transfer(
                String::new(),
                format!("expected {} fields, got {}", self.handles.len(), fields.len()),
            ));
        }
        self.handles
            .iter()
            .zip(fields)
            .map(|(handle, field)| match field {
                None => Ok(Value::Null),
                Some(text) => handle.decode_text(&text),
            })
            .collect()
    }

    fn decode_record(&mut self, src: &mut BytesMut, eof: bool) -> Result<Option<RowResult>> {
        if !self.header_read {
            match self.next_record(src, eof)? {
                Some(fields) => {
                    self.check_header(&fields)?;
                    self.header_read = true;
                }
                None => return Ok(None),
            }
        }
        Ok(self
            .next_record(src, eof)?
            .map(|fields| self.to_row(fields)))
    }
}

impl Decoder for CsvCodec {
    type Item = RowResult;
    type Error = MigrateError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<RowResult>> {
        self.decode_record(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<RowResult>> {
        self.decode_record(src, true)
    }
}

impl Encoder<Row> for CsvCodec {
    type Error = MigrateError;

    fn encode(&mut self, row: Row, dst: &mut BytesMut) -> Result<()> {
        check_arity(&self.handles, &row)?;
        let texts = self
            .handles
            .iter()
            .zip(&row)
            .map(|(handle, value)| handle.encode_text(value))
            .collect::<Result<Vec<_>>>()?;
        self.write_record(texts.iter().map(Option::as_deref), dst);
        Ok(())
    }
}

impl RowCodec for CsvCodec {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn encode_header(&mut self, dst: &mut BytesMut) -> Result<()> {
        let names: Vec<&str> = self.handles.iter().map(|h| h.column.as_str()).collect();
        self.write_record(names.into_iter().map(Some), dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::Column;
    use crate::core::types::codes;
    use crate::transfer::codec::CodecRegistry;
    use crate::transfer::handle::bind_input;

    fn handles() -> Vec<ValueHandle> {
        let columns = vec![
            Column::new("id", codes::INTEGER, "INTEGER"),
            Column::new("note", codes::VARCHAR, "VARCHAR"),
            Column::new("payload", codes::VARBINARY, "VARBINARY"),
        ];
        bind_input("t", &columns, None, &CodecRegistry::with_defaults()).unwrap()
    }

    fn codec(options: FormatOptions) -> CsvCodec {
        CsvCodec::new(handles(), &options).unwrap()
    }

    fn encode_all(codec: &mut CsvCodec, rows: Vec<Row>) -> String {
        let mut buf = BytesMut::new();
        codec.encode_header(&mut buf).unwrap();
        for row in rows {
            codec.encode(row, &mut buf).unwrap();
        }
        String::from_utf8(buf.to_vec()).unwrap()
    }

    fn decode_all(codec: &mut CsvCodec, text: &str) -> Vec<RowResult> {
        let mut buf = BytesMut::from(text.as_bytes());
        let mut rows = Vec::new();
        while let Some(row) = codec.decode(&mut buf).unwrap() {
            rows.push(row);
        }
        while let Some(row) = codec.decode_eof(&mut buf).unwrap() {
            rows.push(row);
        }
        rows
    }

    #[test]
    fn test_defaults() {
        let options = CsvOptions::from_options(&FormatOptions::new()).unwrap();
        assert_eq!(options, CsvOptions::default());
        assert_eq!(options.line_separator, "\r\n");
        assert_eq!(options.escape, '|');
    }

    #[test]
    fn test_empty_string_and_null_are_distinct() {
        let mut writer = codec(FormatOptions::new());
        let text = encode_all(
            &mut writer,
            vec![
                vec![Value::Int(1), Value::from(""), Value::Null],
                vec![Value::Int(2), Value::Null, Value::Bytes(vec![0, 1, 2, 250])],
            ],
        );
        assert_eq!(text, "id,note,payload\r\n1,\"\",\r\n2,,AAEC+g==\r\n");

        let rows = decode_all(&mut codec(FormatOptions::new()), &text);
        let rows: Vec<Row> = rows.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(rows[0], vec![Value::Int(1), Value::from(""), Value::Null]);
        assert_eq!(
            rows[1],
            vec![Value::Int(2), Value::Null, Value::Bytes(vec![0, 1, 2, 250])]
        );
    }

    #[test]
    fn test_special_characters_are_escaped() {
        let mut writer = codec(FormatOptions::new());
        let text = encode_all(
            &mut writer,
            vec![vec![Value::Int(1), Value::from("a,b \"c\" |d\r\ne"), Value::Null]],
        );
        assert_eq!(text, "id,note,payload\r\n1,a|,b |\"c|\" ||d|\r|\ne,\r\n");

        let rows = decode_all(&mut codec(FormatOptions::new()), &text);
        assert_eq!(
            rows[0].as_ref().unwrap()[1],
            Value::from("a,b \"c\" |d\r\ne")
        );
    }

    #[test]
    fn test_quoting_enabled() {
        let options = FormatOptions::new()
            .with(OPTION_QUOTING, "true")
            .with(OPTION_LINE_SEPARATOR, "lf");
        let mut writer = codec(options.clone());
        let text = encode_all(
            &mut writer,
            vec![vec![Value::Int(7), Value::from("say \"hi\"\nbye"), Value::Null]],
        );
        assert_eq!(
            text,
            "\"id\",\"note\",\"payload\"\n\"7\",\"say |\"hi|\"\nbye\",\n"
        );

        let rows = decode_all(&mut codec(options), &text);
        assert_eq!(
            rows[0].as_ref().unwrap(),
            &vec![Value::Int(7), Value::from("say \"hi\"\nbye"), Value::Null]
        );
    }

    #[test]
    fn test_rfc_style_doubled_quotes_when_escape_is_quote() {
        let options = FormatOptions::new().with(OPTION_ESCAPE, "\"");
        let text = "id,note,payload\n3,\"he said \"\"no\"\"\",\n";
        let rows = decode_all(&mut codec(options), text);
        assert_eq!(rows[0].as_ref().unwrap()[1], Value::from("he said \"no\""));
    }

    #[test]
    fn test_quote_values_round_trip_when_escape_is_quote() {
        let options = FormatOptions::new().with(OPTION_ESCAPE, "\"");
        let notes = ["\"", "\"b", "a\"b", "x,y", "line\nbreak", "", "plain"];
        let rows: Vec<Row> = notes
            .iter()
            .enumerate()
            .map(|(i, note)| vec![Value::Int(i as i64), Value::from(*note), Value::Null])
            .collect();
        let text = encode_all(&mut codec(options.clone()), rows.clone());
        assert!(text.contains("\r\n1,\"\"\"b\",\r\n"), "{}", text);

        let decoded: Vec<Row> = decode_all(&mut codec(options), &text)
            .into_iter()
            .map(|row| row.unwrap())
            .collect();
        assert_eq!(decoded, rows);
    }

    #[test]
    fn test_partial_record_waits_for_more_input() {
        let mut reader = codec(FormatOptions::new());
        let mut buf = BytesMut::from(&b"id,note,payload\r\n1,\"abc"[..]);
        assert!(reader.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"\",\r");
        assert!(reader.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"\n");
        let row = reader.decode(&mut buf).unwrap().unwrap().unwrap();
        assert_eq!(row, vec![Value::Int(1), Value::from("abc"), Value::Null]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_split_utf8_sequence() {
        let mut reader = codec(FormatOptions::new());
        let bytes = "id,note,payload\n1,caf\u{e9},\n".as_bytes();
        let split = bytes.len() - 3;
        let mut buf = BytesMut::from(&bytes[..split]);
        assert!(reader.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&bytes[split..]);
        let row = reader.decode(&mut buf).unwrap().unwrap().unwrap();
        assert_eq!(row[1], Value::from("caf\u{e9}"));
    }

    #[test]
    fn test_last_record_without_terminator() {
        let rows = decode_all(&mut codec(FormatOptions::new()), "id,note,payload\n1,x,\n2,y,");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].as_ref().unwrap()[1], Value::from("y"));
    }

    #[test]
    fn test_bad_value_is_row_level_error() {
        let rows = decode_all(
            &mut codec(FormatOptions::new()),
            "id,note,payload\nabc,x,\n2,y,\n1\n",
        );
        assert_eq!(rows.len(), 3);
        let err = rows[0].as_ref().unwrap_err();
        assert!(err.is_value_transfer());
        assert!(err.to_string().contains("column id"));
        assert!(rows[1].is_ok());
        assert!(rows[2]
            .as_ref()
            .unwrap_err()
            .to_string()
            .contains("expected 3 fields, got 1"));
    }

    #[test]
    fn test_header_mismatch_is_fatal() {
        let mut reader = codec(FormatOptions::new());
        let mut buf = BytesMut::from(&b"ID,text,payload\n1,x,\n"[..]);
        let err = reader.decode(&mut buf).unwrap_err();
        assert!(matches!(err, MigrateError::Io(_)));
        assert!(err.to_string().contains("header [ID, text, payload]"));
    }

    #[test]
    fn test_unterminated_quote_at_eof() {
        let mut reader = codec(FormatOptions::new());
        let mut buf = BytesMut::from(&b"id,note,payload\n1,\"open"[..]);
        assert!(reader.decode(&mut buf).unwrap().is_none());
        assert!(reader.decode_eof(&mut buf).is_err());
    }

    #[test]
    fn test_invalid_options() {
        let err = CsvOptions::from_options(&FormatOptions::new().with(OPTION_ENCODING, "latin1"))
            .unwrap_err();
        assert!(err.to_string().contains("only UTF-8"));
        assert!(CsvOptions::from_options(&FormatOptions::new().with(OPTION_DELIMITER, "|")).is_err());
        assert!(
            CsvOptions::from_options(&FormatOptions::new().with(OPTION_LINE_SEPARATOR, "tab"))
                .is_err()
        );
    }
}
