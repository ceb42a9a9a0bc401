//! Length-prefixed binary rows.
//!
//! Stream layout: the magic `DBMROWS1`, a big-endian `u16` column count,
//! then rows. Each value is a flag byte (0 null, 1 present) followed, when
//! present, by a big-endian `u32` payload length and the payload.
//! A zero-column row has no bytes, so such streams carry no rows.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::value::{Row, Value};
use crate::error::{MigrateError, Result};

use super::format::{framing_error, RowCodec, RowResult};
use super::handle::{check_arity, ValueHandle};

pub const MAGIC: &[u8; 8] = b"DBMROWS1";
const HEADER_LEN: usize = MAGIC.len() + 2;
const FLAG_NULL: u8 = 0;
const FLAG_VALUE: u8 = 1;

pub struct BinaryCodec {
    handles: Vec<ValueHandle>,
    header_read: bool,
}

impl BinaryCodec {
    pub fn new(handles: Vec<ValueHandle>) -> Self {
        Self {
            handles,
            header_read: false,
        }
    }

    fn read_header(&mut self, src: &mut BytesMut) -> Result<bool> {
        if src.len() < HEADER_LEN {
            return Ok(false);
        }
        if &src[..MAGIC.len()] != MAGIC {
            return Err(framing_error("binary", "missing DBMROWS1 magic"));
        }
        let count = u16::from_be_bytes([src[MAGIC.len()], src[MAGIC.len() + 1]]) as usize;
        if count != self.handles.len() {
            return Err(framing_error(
                "binary",
                format!("stream has {} columns, expected {}", count, self.handles.len()),
            ));
        }
        src.advance(HEADER_LEN);
        self.header_read = true;
        Ok(true)
    }

    /// Length of the next complete row in `src`, without consuming it.
    fn row_len(&self, src: &[u8]) -> Result<Option<usize>> {
        if src.is_empty() {
            return Ok(None);
        }
        if self.handles.is_empty() {
            return Err(framing_error(
                "binary",
                format!("{} bytes after a zero-column header", src.len()),
            ));
        }
        let mut pos = 0;
        for _ in &self.handles {
            let Some(&flag) = src.get(pos) else {
                return Ok(None);
            };
            pos += 1;
            match flag {
                FLAG_NULL => {}
                FLAG_VALUE => {
                    let Some(len) = src.get(pos..pos + 4) else {
                        return Ok(None);
                    };
                    let len = u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize;
                    pos += 4 + len;
                    if src.len() < pos {
                        return Ok(None);
                    }
                }
                other => {
                    return Err(framing_error(
                        "binary",
                        format!("invalid value flag {}", other),
                    ))
                }
            }
        }
        Ok(Some(pos))
    }

    fn read_row(&self, mut buf: &[u8]) -> RowResult {
        self.handles
            .iter()
            .map(|handle| {
                if buf.get_u8() == FLAG_NULL {
                    return Ok(Value::Null);
                }
                let len = buf.get_u32() as usize;
                let value = handle.decode_binary(&buf[..len]);
                buf.advance(len);
                value
            })
            .collect()
    }
}

impl Decoder for BinaryCodec {
    type Item = RowResult;
    type Error = MigrateError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<RowResult>> {
        if !self.header_read && !self.read_header(src)? {
            return Ok(None);
        }
        match self.row_len(src)? {
            Some(len) => {
                let row = src.split_to(len).freeze();
                Ok(Some(self.read_row(&row)))
            }
            None => {
                src.reserve(HEADER_LEN);
                Ok(None)
            }
        }
    }
}

impl Encoder<Row> for BinaryCodec {
    type Error = MigrateError;

    fn encode(&mut self, row: Row, dst: &mut BytesMut) -> Result<()> {
        check_arity(&self.handles, &row)?;
        let mut record = Vec::new();
        for (handle, value) in self.handles.iter().zip(&row) {
            if value.is_null() {
                record.put_u8(FLAG_NULL);
                continue;
            }
            let payload = handle.encode_binary(value)?;
            let len = u32::try_from(payload.len()).map_err(|_| {
                MigrateError::transfer(
                    String::new(),
                    format!("value of column {} exceeds 4 GiB", handle.column),
                )
            })?;
            record.put_u8(FLAG_VALUE);
            record.put_u32(len);
            record.extend_from_slice(&payload);
        }
        dst.put_slice(&record);
        Ok(())
    }
}

impl RowCodec for BinaryCodec {
    fn name(&self) -> &'static str {
        "bin"
    }

    fn encode_header(&mut self, dst: &mut BytesMut) -> Result<()> {
        let count = u16::try_from(self.handles.len())
            .map_err(|_| MigrateError::Config("binary format supports at most 65535 columns".into()))?;
        dst.put_slice(MAGIC);
        dst.put_u16(count);
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
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn codec() -> BinaryCodec {
        let columns = vec![
            Column::new("id", codes::BIGINT, "BIGINT"),
            Column::new("amount", codes::DECIMAL, "DECIMAL"),
            Column::new("note", codes::VARCHAR, "VARCHAR"),
            Column::new("day", codes::DATE, "DATE"),
        ];
        BinaryCodec::new(bind_input("t", &columns, None, &CodecRegistry::with_defaults()).unwrap())
    }

    fn sample() -> Row {
        vec![
            Value::Int(-9),
            Value::Decimal(Decimal::from_str("12345678901234.000001").unwrap()),
            Value::from(""),
            Value::Date(NaiveDate::from_ymd_opt(1999, 12, 31).unwrap()),
        ]
    }

    #[test]
    fn test_stream_layout() {
        let mut codec = codec();
        let mut buf = BytesMut::new();
        codec.encode_header(&mut buf).unwrap();
        assert_eq!(&buf[..], b"DBMROWS1\x00\x04");

        codec
            .encode(vec![Value::Null, Value::Null, Value::from("ab"), Value::Null], &mut buf)
            .unwrap();
        assert_eq!(&buf[10..], &[0, 0, 1, 0, 0, 0, 2, b'a', b'b', 0]);
    }

    #[test]
    fn test_decode_waits_for_whole_row() {
        let mut writer = codec();
        let mut bytes = BytesMut::new();
        writer.encode_header(&mut bytes).unwrap();
        writer.encode(sample(), &mut bytes).unwrap();
        writer
            .encode(vec![Value::Null, Value::Null, Value::Null, Value::Null], &mut bytes)
            .unwrap();

        let mut reader = codec();
        let mut buf = BytesMut::new();
        let mut rows = Vec::new();
        for byte in bytes.iter() {
            buf.put_u8(*byte);
            if let Some(row) = reader.decode(&mut buf).unwrap() {
                rows.push(row.unwrap());
            }
        }
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], sample());
        assert!(rows[1].iter().all(Value::is_null));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_wrong_magic_is_fatal() {
        let mut reader = codec();
        let mut buf = BytesMut::from(&b"NOTROWS1\x00\x04"[..]);
        let err = reader.decode(&mut buf).unwrap_err();
        assert!(matches!(err, MigrateError::Io(_)));
    }

    #[test]
    fn test_column_count_mismatch_is_fatal() {
        let mut reader = codec();
        let mut buf = BytesMut::from(&b"DBMROWS1\x00\x03"[..]);
        assert!(reader
            .decode(&mut buf)
            .unwrap_err()
            .to_string()
            .contains("stream has 3 columns, expected 4"));
    }

    #[test]
    fn test_zero_column_stream_ends() {
        let mut writer = BinaryCodec::new(Vec::new());
        let mut bytes = BytesMut::new();
        writer.encode_header(&mut bytes).unwrap();
        writer.encode(Vec::new(), &mut bytes).unwrap();
        assert_eq!(&bytes[..], b"DBMROWS1\x00\x00");

        let mut reader = BinaryCodec::new(Vec::new());
        assert!(reader.decode(&mut bytes).unwrap().is_none());
        assert!(reader.decode_eof(&mut bytes).unwrap().is_none());

        let mut trailing = BytesMut::from(&b"DBMROWS1\x00\x00\x01"[..]);
        let mut reader = BinaryCodec::new(Vec::new());
        assert!(reader.decode(&mut trailing).is_err());
    }

    #[test]
    fn test_bad_payload_is_row_level_error() {
        let mut reader = codec();
        let mut buf = BytesMut::from(&b"DBMROWS1\x00\x04"[..]);
        // id with a 3 byte payload, then three nulls
        buf.extend_from_slice(&[1, 0, 0, 0, 3, 1, 2, 3, 0, 0, 0]);
        let row = reader.decode(&mut buf).unwrap().unwrap();
        assert!(row.unwrap_err().is_value_transfer());
        assert!(buf.is_empty());
    }
}
