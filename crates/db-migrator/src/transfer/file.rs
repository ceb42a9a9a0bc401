//! Row sources and sinks backed by dump files.

use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::codec::{Encoder, FramedRead};
use tracing::debug;

use crate::core::value::Row;
use crate::error::{MigrateError, Result};

use super::format::FormatCodec;
use super::unit::{RowSink, RowSource};

/// Dump file path for a table: `<dir>/<table>.<format>`.
pub fn table_file(dir: &Path, table: &str, format: &str) -> PathBuf {
    dir.join(format!("{}.{}", table, format))
}

fn not_open(path: &Path) -> MigrateError {
    MigrateError::Io(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        format!("{} is not open", path.display()),
    ))
}

/// Reads rows from a file through a format codec.
pub struct FileRowSource {
    path: PathBuf,
    codec: Option<FormatCodec>,
    reader: Option<FramedRead<File, FormatCodec>>,
    format: &'static str,
}

impl FileRowSource {
    pub fn new(path: impl Into<PathBuf>, codec: FormatCodec) -> Self {
        Self {
            path: path.into(),
            format: codec.name(),
            codec: Some(codec),
            reader: None,
        }
    }
}

#[async_trait]
impl RowSource for FileRowSource {
    async fn open(&mut self) -> Result<()> {
        let codec = self.codec.take().ok_or_else(|| {
            MigrateError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} was already opened", self.path.display()),
            ))
        })?;
        let file = File::open(&self.path).await?;
        self.reader = Some(FramedRead::new(file, codec));
        debug!("Reading {}", self.path.display());
        Ok(())
    }

    async fn next_row(&mut self) -> Result<Option<Row>> {
        let reader = self.reader.as_mut().ok_or_else(|| not_open(&self.path))?;
        match reader.next().await {
            None => Ok(None),
            Some(Ok(Ok(row))) => Ok(Some(row)),
            Some(Ok(Err(e))) | Some(Err(e)) => Err(e),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.reader = None;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} file {}", self.format, self.path.display())
    }
}

/// Writes rows to a file through a format codec.
///
/// Rows are encoded into memory and reach the file on commit.
pub struct FileRowSink {
    path: PathBuf,
    codec: FormatCodec,
    buffer: BytesMut,
    writer: Option<BufWriter<File>>,
}

impl FileRowSink {
    pub fn new(path: impl Into<PathBuf>, codec: FormatCodec) -> Self {
        Self {
            path: path.into(),
            codec,
            buffer: BytesMut::new(),
            writer: None,
        }
    }
}

#[async_trait]
impl RowSink for FileRowSink {
    async fn open(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut writer = BufWriter::new(File::create(&self.path).await?);
        let mut header = BytesMut::new();
        self.codec.encode_header(&mut header)?;
        writer.write_all(&header).await?;
        writer.flush().await?;
        self.writer = Some(writer);
        debug!("Writing {}", self.path.display());
        Ok(())
    }

    async fn write_row(&mut self, row: Row) -> Result<()> {
        self.codec.encode(row, &mut self.buffer)
    }

    async fn commit(&mut self) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| not_open(&self.path))?;
        writer.write_all(&self.buffer).await?;
        writer.flush().await?;
        self.buffer.clear();
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            debug!(
                "Discarding {} uncommitted bytes for {}",
                self.buffer.len(),
                self.path.display()
            );
            self.buffer.clear();
        }
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await?;
            writer.into_inner().sync_all().await?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} file {}", self.codec.name(), self.path.display())
    }
}
