//! Script exporters: where generated statements go.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter, Stdout};
use tracing::{debug, info};

use crate::error::{MigrateError, Result};

/// Sink for generated statements.
#[async_trait]
pub trait ScriptExporter: Send {
    async fn open(&mut self) -> Result<()>;

    /// Write one statement, without its terminator.
    async fn write(&mut self, statement: &str) -> Result<()>;

    async fn close(&mut self) -> Result<()>;

    fn describe(&self) -> String;
}

/// Writes statements to a UTF-8 file, one per line, `;`-terminated.
pub struct FileExporter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ScriptExporter for FileExporter {
    async fn open(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = File::create(&self.path).await?;
        self.writer = Some(BufWriter::new(file));
        debug!("Opened script file {}", self.path.display());
        Ok(())
    }

    async fn write(&mut self, statement: &str) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            MigrateError::script(self.path.display().to_string(), "exporter is not open")
        })?;
        writer.write_all(statement.as_bytes()).await?;
        writer.write_all(b";\n").await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await?;
            writer.into_inner().sync_all().await?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Writes statements to standard output.
pub struct StdoutExporter {
    stdout: Option<Stdout>,
}

impl StdoutExporter {
    pub fn new() -> Self {
        Self { stdout: None }
    }
}

impl Default for StdoutExporter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScriptExporter for StdoutExporter {
    async fn open(&mut self) -> Result<()> {
        self.stdout = Some(tokio::io::stdout());
        Ok(())
    }

    async fn write(&mut self, statement: &str) -> Result<()> {
        let stdout = self.stdout.get_or_insert_with(tokio::io::stdout);
        stdout.write_all(format!("{};\n", statement).as_bytes()).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stdout) = self.stdout.take() {
            stdout.flush().await?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "stdout".to_string()
    }
}

/// Fans every statement out to several exporters in order.
#[derive(Default)]
pub struct CompositeExporter {
    exporters: Vec<Box<dyn ScriptExporter>>,
}

impl CompositeExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, exporter: Box<dyn ScriptExporter>) {
        self.exporters.push(exporter);
    }

    pub fn len(&self) -> usize {
        self.exporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exporters.is_empty()
    }

    /// This composite, or stdout when nothing was configured.
    pub fn or_stdout(mut self) -> Self {
        if self.exporters.is_empty() {
            self.exporters.push(Box::new(StdoutExporter::new()));
        }
        self
    }
}

#[async_trait]
impl ScriptExporter for CompositeExporter {
    async fn open(&mut self) -> Result<()> {
        for exporter in &mut self.exporters {
            exporter.open().await?;
        }
        Ok(())
    }

    async fn write(&mut self, statement: &str) -> Result<()> {
        for exporter in &mut self.exporters {
            exporter.write(statement).await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        // Close every exporter even if one fails, then report the first error.
        let mut first_error = None;
        for exporter in &mut self.exporters {
            if let Err(e) = exporter.close().await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn describe(&self) -> String {
        self.exporters
            .iter()
            .map(|e| e.describe())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Write a statement stream through `exporter`.
///
/// An empty stream is an error when `fail_on_empty` is set and a no-op
/// otherwise. Returns the number of statements written.
pub async fn export_scripts(
    exporter: &mut dyn ScriptExporter,
    statements: &[String],
    fail_on_empty: bool,
) -> Result<usize> {
    if statements.is_empty() {
        if fail_on_empty {
            return Err(MigrateError::script(
                exporter.describe(),
                "no scripts were generated",
            ));
        }
        info!("No scripts to export");
        return Ok(0);
    }

    exporter.open().await?;
    let mut written = 0;
    for statement in statements {
        if let Err(e) = exporter.write(statement).await {
            if let Err(close_err) = exporter.close().await {
                debug!("Close after failed write also failed: {}", close_err);
            }
            return Err(e);
        }
        written += 1;
    }
    exporter.close().await?;
    info!("Exported {} statements to {}", written, exporter.describe());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    /// Records calls for assertions.
    struct Recording {
        log: Arc<Mutex<Vec<String>>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl ScriptExporter for Recording {
        async fn open(&mut self) -> Result<()> {
            self.log.lock().unwrap().push("open".to_string());
            Ok(())
        }

        async fn write(&mut self, statement: &str) -> Result<()> {
            if self.fail_on == Some(statement) {
                return Err(MigrateError::script("recording", "boom"));
            }
            self.log.lock().unwrap().push(statement.to_string());
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            self.log.lock().unwrap().push("close".to_string());
            Ok(())
        }

        fn describe(&self) -> String {
            "recording".to_string()
        }
    }

    #[tokio::test]
    async fn test_file_exporter_writes_terminated_statements() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("schema.sql");
        let mut exporter = FileExporter::new(&path);
        let statements = vec![
            "CREATE TABLE \"t\" (\"c\" VARCHAR(10))".to_string(),
            "COMMENT ON TABLE \"t\" IS 'caf\u{e9}'".to_string(),
        ];
        let written = export_scripts(&mut exporter, &statements, true).await.unwrap();
        assert_eq!(written, 2);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "CREATE TABLE \"t\" (\"c\" VARCHAR(10));\nCOMMENT ON TABLE \"t\" IS 'caf\u{e9}';\n"
        );
    }

    #[tokio::test]
    async fn test_empty_stream_policy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.sql");
        let mut exporter = FileExporter::new(&path);
        let err = export_scripts(&mut exporter, &[], true).await.unwrap_err();
        assert!(matches!(err, MigrateError::ScriptGeneration { .. }));
        assert!(!path.exists());

        assert_eq!(export_scripts(&mut exporter, &[], false).await.unwrap(), 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_composite_fans_out_and_closes_on_failure() {
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        let mut composite = CompositeExporter::new();
        composite.push(Box::new(Recording {
            log: first.clone(),
            fail_on: None,
        }));
        composite.push(Box::new(Recording {
            log: second.clone(),
            fail_on: Some("B"),
        }));

        let statements = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        assert!(export_scripts(&mut composite, &statements, true).await.is_err());
        assert_eq!(*first.lock().unwrap(), vec!["open", "A", "B", "close"]);
        assert_eq!(*second.lock().unwrap(), vec!["open", "A", "close"]);
    }

    #[test]
    fn test_stdout_fallback() {
        let composite = CompositeExporter::new().or_stdout();
        assert_eq!(composite.len(), 1);
        assert_eq!(composite.describe(), "stdout");

        let mut configured = CompositeExporter::new();
        configured.push(Box::new(FileExporter::new("x.sql")));
        assert_eq!(configured.or_stdout().describe(), "file x.sql");
    }
}
