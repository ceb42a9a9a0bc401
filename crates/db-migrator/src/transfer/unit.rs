//! One table's transfer: a row source paired with a row sink.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::value::{row_size, Row};
use crate::error::{MigrateError, Result};

/// Produces rows in bind order.
#[async_trait]
pub trait RowSource: Send {
    async fn open(&mut self) -> Result<()>;

    /// Next row, or `None` at the end of input.
    ///
    /// A value-transfer error consumes the offending row; reading may
    /// continue after it. Any other error ends the source.
    async fn next_row(&mut self) -> Result<Option<Row>>;

    async fn close(&mut self) -> Result<()>;

    fn describe(&self) -> String;
}

/// Consumes rows in bind order.
#[async_trait]
pub trait RowSink: Send {
    async fn open(&mut self) -> Result<()>;

    async fn write_row(&mut self, row: Row) -> Result<()>;

    /// Make every row written since the last commit durable.
    async fn commit(&mut self) -> Result<()>;

    /// Release the target. Rows written after the last commit are discarded.
    async fn close(&mut self) -> Result<()>;

    fn describe(&self) -> String;
}

/// A unit of work. It owns its source and sink for its whole run.
pub struct TransferUnit {
    pub name: String,
    pub source: Box<dyn RowSource>,
    pub sink: Box<dyn RowSink>,
}

impl TransferUnit {
    pub fn new(
        name: impl Into<String>,
        source: Box<dyn RowSource>,
        sink: Box<dyn RowSink>,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            sink,
        }
    }
}

/// Commit after this many rows or bytes, whichever comes first. Zero disables
/// a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPolicy {
    pub rows: usize,
    pub bytes: usize,
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self {
            rows: 1000,
            bytes: 1024 * 1024,
        }
    }
}

impl CommitPolicy {
    pub fn is_due(&self, rows: usize, bytes: usize) -> bool {
        (self.rows > 0 && rows >= self.rows) || (self.bytes > 0 && bytes >= self.bytes)
    }
}

/// What a value-transfer error does to its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    #[default]
    Abort,
    /// Count the row as skipped, record the error and keep going.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Completed,
    /// Cancelled after at least one committed batch.
    Partial,
    Failed,
    /// Cancelled before any row was committed.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitReport {
    pub name: String,
    pub status: UnitStatus,
    /// Committed rows.
    pub rows: u64,
    pub skipped: u64,
    pub batches: u64,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Report plus every error collected while running the unit.
#[derive(Debug)]
pub struct UnitOutcome {
    pub report: UnitReport,
    pub errors: Vec<MigrateError>,
}

#[derive(Debug, Default)]
struct Progress {
    written: u64,
    committed: u64,
    skipped: u64,
    batches: u64,
}

/// Run one unit to completion, failure or cancellation.
///
/// Cancellation is observed only between batches, so an in-flight batch is
/// always finished and committed first.
pub async fn run_unit(
    mut unit: TransferUnit,
    commit: CommitPolicy,
    policy: ErrorPolicy,
    cancel: &CancellationToken,
) -> UnitOutcome {
    let start = Instant::now();
    let mut progress = Progress::default();
    let mut errors = Vec::new();

    let result = transfer_rows(&mut unit, commit, policy, cancel, &mut progress, &mut errors).await;

    if let Err(e) = unit.source.close().await {
        debug!("{}: closing {} failed: {}", unit.name, unit.source.describe(), e);
    }
    if let Err(e) = unit.sink.close().await {
        debug!("{}: closing {} failed: {}", unit.name, unit.sink.describe(), e);
    }

    let (status, error) = match result {
        Ok(true) => {
            info!("{}: completed ({} rows)", unit.name, progress.committed);
            (UnitStatus::Completed, None)
        }
        Ok(false) if progress.committed > 0 => {
            warn!(
                "{}: cancelled, {} rows left in target",
                unit.name, progress.committed
            );
            (UnitStatus::Partial, None)
        }
        Ok(false) => (UnitStatus::Cancelled, None),
        Err(e) => {
            error!("{}: failed - {}", unit.name, e);
            let message = e.to_string();
            errors.push(e);
            (UnitStatus::Failed, Some(message))
        }
    };

    UnitOutcome {
        report: UnitReport {
            name: unit.name,
            status,
            rows: progress.committed,
            skipped: progress.skipped,
            batches: progress.batches,
            duration_ms: start.elapsed().as_millis() as u64,
            error,
        },
        errors,
    }
}

/// Returns `Ok(false)` when stopped by cancellation.
async fn transfer_rows(
    unit: &mut TransferUnit,
    commit: CommitPolicy,
    policy: ErrorPolicy,
    cancel: &CancellationToken,
    progress: &mut Progress,
    errors: &mut Vec<MigrateError>,
) -> Result<bool> {
    if cancel.is_cancelled() {
        info!("{}: cancellation requested, not starting", unit.name);
        return Ok(false);
    }
    unit.source.open().await?;
    unit.sink.open().await?;
    debug!(
        "{}: {} -> {}",
        unit.name,
        unit.source.describe(),
        unit.sink.describe()
    );

    let mut ordinal: u64 = 0;
    let mut batch_rows = 0;
    let mut batch_bytes = 0;
    loop {
        if batch_rows == 0 && cancel.is_cancelled() {
            return Ok(false);
        }

        let row = match unit.source.next_row().await {
            Ok(Some(row)) => {
                ordinal += 1;
                row
            }
            Ok(None) => break,
            Err(e) => {
                ordinal += 1;
                skip_or_fail(&unit.name, ordinal, e, policy, progress, errors)?;
                continue;
            }
        };

        let size = row_size(&row);
        match unit.sink.write_row(row).await {
            Ok(()) => {
                progress.written += 1;
                batch_rows += 1;
                batch_bytes += size;
            }
            Err(e) => skip_or_fail(&unit.name, ordinal, e, policy, progress, errors)?,
        }

        if commit.is_due(batch_rows, batch_bytes) {
            commit_batch(unit, progress).await?;
            batch_rows = 0;
            batch_bytes = 0;
        }
    }

    if batch_rows > 0 {
        commit_batch(unit, progress).await?;
    }
    Ok(true)
}

async fn commit_batch(unit: &mut TransferUnit, progress: &mut Progress) -> Result<()> {
    unit.sink.commit().await?;
    progress.batches += 1;
    progress.committed = progress.written;
    debug!(
        "{}: committed batch {} ({} rows total)",
        unit.name, progress.batches, progress.committed
    );
    Ok(())
}

/// Apply the error policy to a failed row. Returns the error when the unit
/// must stop.
fn skip_or_fail(
    unit: &str,
    ordinal: u64,
    err: MigrateError,
    policy: ErrorPolicy,
    progress: &mut Progress,
    errors: &mut Vec<MigrateError>,
) -> Result<()> {
    if !err.is_value_transfer() {
        return Err(err);
    }
    let err = err.at_row(unit, ordinal, None);
    match policy {
        ErrorPolicy::Abort => Err(err),
        ErrorPolicy::Skip => {
            warn!("{}: skipping row {}: {}", unit, ordinal, err);
            progress.skipped += 1;
            errors.push(err);
            Ok(())
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory sources and sinks shared by transfer tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    pub struct VecSource {
        rows: VecDeque<Result<Row>>,
        /// Cancelled when the row with this ordinal is produced.
        cancel_at: Option<(usize, CancellationToken)>,
        produced: usize,
    }

    impl VecSource {
        pub fn new(rows: Vec<Result<Row>>) -> Self {
            Self {
                rows: rows.into(),
                cancel_at: None,
                produced: 0,
            }
        }

        pub fn ints(count: i64) -> Self {
            Self::new((1..=count).map(|i| Ok(vec![i.into()])).collect())
        }

        pub fn cancel_at(mut self, ordinal: usize, token: CancellationToken) -> Self {
            self.cancel_at = Some((ordinal, token));
            self
        }
    }

    #[async_trait]
    impl RowSource for VecSource {
        async fn open(&mut self) -> Result<()> {
            Ok(())
        }

        async fn next_row(&mut self) -> Result<Option<Row>> {
            let next = self.rows.pop_front();
            if next.is_some() {
                self.produced += 1;
                if let Some((at, token)) = &self.cancel_at {
                    if *at == self.produced {
                        token.cancel();
                    }
                }
            }
            next.transpose()
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }

    #[derive(Debug, Default)]
    pub struct SinkLog {
        pub opened: bool,
        pub closed: bool,
        pub pending: Vec<Row>,
        pub committed: Vec<Row>,
        pub commits: usize,
    }

    pub struct VecSink {
        pub log: Arc<Mutex<SinkLog>>,
    }

    impl VecSink {
        pub fn new() -> (Self, Arc<Mutex<SinkLog>>) {
            let log = Arc::new(Mutex::new(SinkLog::default()));
            (Self { log: log.clone() }, log)
        }
    }

    #[async_trait]
    impl RowSink for VecSink {
        async fn open(&mut self) -> Result<()> {
            self.log.lock().unwrap().opened = true;
            Ok(())
        }

        async fn write_row(&mut self, row: Row) -> Result<()> {
            self.log.lock().unwrap().pending.push(row);
            Ok(())
        }

        async fn commit(&mut self) -> Result<()> {
            let mut log = self.log.lock().unwrap();
            let pending = std::mem::take(&mut log.pending);
            log.committed.extend(pending);
            log.commits += 1;
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            let mut log = self.log.lock().unwrap();
            log.pending.clear();
            log.closed = true;
            Ok(())
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::core::value::Value;

    fn bad_row() -> Result<Row> {
        Err(MigrateError::transfer("", "invalid Int value \"x\"").at_row("", 0, Some("n")))
    }

    fn by_rows(rows: usize) -> CommitPolicy {
        CommitPolicy { rows, bytes: 0 }
    }

    #[tokio::test]
    async fn test_commits_in_batches() {
        let (sink, log) = VecSink::new();
        let unit = TransferUnit::new("t", Box::new(VecSource::ints(5)), Box::new(sink));
        let outcome = run_unit(unit, by_rows(2), ErrorPolicy::Abort, &CancellationToken::new()).await;

        assert_eq!(outcome.report.status, UnitStatus::Completed);
        assert_eq!(outcome.report.rows, 5);
        assert_eq!(outcome.report.batches, 3);
        assert!(outcome.errors.is_empty());
        let log = log.lock().unwrap();
        assert_eq!(log.commits, 3);
        assert_eq!(log.committed.len(), 5);
        assert!(log.closed);
    }

    #[tokio::test]
    async fn test_byte_threshold() {
        let (sink, log) = VecSink::new();
        let rows = (0..4).map(|_| Ok(vec![Value::from("x".repeat(60))])).collect();
        let unit = TransferUnit::new("t", Box::new(VecSource::new(rows)), Box::new(sink));
        let policy = CommitPolicy { rows: 0, bytes: 100 };
        let outcome = run_unit(unit, policy, ErrorPolicy::Abort, &CancellationToken::new()).await;
        assert_eq!(outcome.report.batches, 2);
        assert_eq!(log.lock().unwrap().commits, 2);
    }

    #[tokio::test]
    async fn test_abort_discards_uncommitted_rows() {
        let (sink, log) = VecSink::new();
        let rows = vec![Ok(vec![Value::Int(1)]), Ok(vec![Value::Int(2)]), Ok(vec![Value::Int(3)]), bad_row()];
        let unit = TransferUnit::new("t", Box::new(VecSource::new(rows)), Box::new(sink));
        let outcome = run_unit(unit, by_rows(2), ErrorPolicy::Abort, &CancellationToken::new()).await;

        assert_eq!(outcome.report.status, UnitStatus::Failed);
        assert_eq!(outcome.report.rows, 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(
            outcome.report.error.as_deref(),
            Some("Transfer failed for table t at row 4, column n: invalid Int value \"x\"")
        );
        assert_eq!(log.lock().unwrap().committed.len(), 2);
    }

    #[tokio::test]
    async fn test_skip_counts_and_records() {
        let (sink, log) = VecSink::new();
        let rows = vec![Ok(vec![Value::Int(1)]), bad_row(), Ok(vec![Value::Int(3)])];
        let unit = TransferUnit::new("t", Box::new(VecSource::new(rows)), Box::new(sink));
        let outcome = run_unit(unit, by_rows(10), ErrorPolicy::Skip, &CancellationToken::new()).await;

        assert_eq!(outcome.report.status, UnitStatus::Completed);
        assert_eq!(outcome.report.rows, 2);
        assert_eq!(outcome.report.skipped, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].to_string().contains("at row 2"));
        assert_eq!(log.lock().unwrap().committed.len(), 2);
    }

    #[tokio::test]
    async fn test_non_value_errors_ignore_skip_policy() {
        let (sink, _log) = VecSink::new();
        let rows = vec![Ok(vec![Value::Int(1)]), Err(MigrateError::Metadata("gone".into()))];
        let unit = TransferUnit::new("t", Box::new(VecSource::new(rows)), Box::new(sink));
        let outcome = run_unit(unit, by_rows(10), ErrorPolicy::Skip, &CancellationToken::new()).await;
        assert_eq!(outcome.report.status, UnitStatus::Failed);
        assert!(matches!(outcome.errors[0], MigrateError::Metadata(_)));
    }

    #[tokio::test]
    async fn test_cancel_finishes_current_batch() {
        let token = CancellationToken::new();
        let (sink, log) = VecSink::new();
        let source = VecSource::ints(6).cancel_at(3, token.clone());
        let unit = TransferUnit::new("t", Box::new(source), Box::new(sink));
        let outcome = run_unit(unit, by_rows(2), ErrorPolicy::Abort, &token).await;

        assert_eq!(outcome.report.status, UnitStatus::Partial);
        assert_eq!(outcome.report.rows, 4);
        assert_eq!(log.lock().unwrap().committed.len(), 4);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let (sink, log) = VecSink::new();
        let unit = TransferUnit::new("t", Box::new(VecSource::ints(3)), Box::new(sink));
        let outcome = run_unit(unit, by_rows(2), ErrorPolicy::Abort, &token).await;
        assert_eq!(outcome.report.status, UnitStatus::Cancelled);
        assert!(!log.lock().unwrap().opened);
    }
}
