//! Bounded parallel execution of transfer units.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{MigrateError, Result};

use super::unit::{run_unit, CommitPolicy, ErrorPolicy, TransferUnit, UnitReport, UnitStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferOptions {
    pub workers: usize,
    pub commit: CommitPolicy,
    pub error_policy: ErrorPolicy,
    /// Stop starting new units, and stop running ones at their next batch
    /// boundary, after the first failed unit.
    pub fail_fast: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            commit: CommitPolicy::default(),
            error_policy: ErrorPolicy::default(),
            fail_fast: false,
        }
    }
}

/// One collected error, attributed to its unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportedError {
    pub unit: String,
    pub kind: String,
    pub message: String,
}

impl ReportedError {
    pub fn new(unit: &str, err: &MigrateError) -> Self {
        Self {
            unit: unit.to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferReport {
    /// Unit reports in submission order.
    pub units: Vec<UnitReport>,
    pub errors: Vec<ReportedError>,
}

impl TransferReport {
    pub fn total_rows(&self) -> u64 {
        self.units.iter().map(|u| u.rows).sum()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn count(&self, status: UnitStatus) -> usize {
        self.units.iter().filter(|u| u.status == status).count()
    }
}

/// Run every unit with at most `options.workers` in flight.
///
/// Each unit owns its source and sink; a failing unit does not affect its
/// siblings unless `fail_fast` is set.
pub async fn run_units(
    units: Vec<TransferUnit>,
    options: &TransferOptions,
    cancel: CancellationToken,
) -> Result<TransferReport> {
    let workers = options.workers.max(1);
    let semaphore = Arc::new(Semaphore::new(workers));
    let run_cancel = cancel.child_token();

    info!("Transferring {} tables with {} workers", units.len(), workers);

    let mut handles = Vec::with_capacity(units.len());
    for unit in units {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| MigrateError::transfer(unit.name.clone(), e.to_string()))?;

        let name = unit.name.clone();
        let token = run_cancel.clone();
        let commit = options.commit;
        let policy = options.error_policy;
        let fail_fast = options.fail_fast;

        let handle = tokio::spawn(async move {
            let outcome = run_unit(unit, commit, policy, &token).await;
            if fail_fast && outcome.report.status == UnitStatus::Failed {
                info!("Fail-fast: stopping remaining units");
                token.cancel();
            }
            drop(permit);
            outcome
        });
        handles.push((name, handle));
    }

    let mut report = TransferReport::default();
    for (name, handle) in handles {
        match handle.await {
            Ok(outcome) => {
                report
                    .errors
                    .extend(outcome.errors.iter().map(|e| ReportedError::new(&name, e)));
                report.units.push(outcome.report);
            }
            Err(e) => {
                error!("{}: task panicked - {}", name, e);
                let message = format!("Task panicked: {}", e);
                report.errors.push(ReportedError {
                    unit: name.clone(),
                    kind: "panic".to_string(),
                    message: message.clone(),
                });
                report.units.push(UnitReport {
                    name,
                    status: UnitStatus::Failed,
                    rows: 0,
                    skipped: 0,
                    batches: 0,
                    duration_ms: 0,
                    error: Some(message),
                });
            }
        }
    }

    info!(
        "Transfer finished: {} completed, {} failed, {} rows",
        report.count(UnitStatus::Completed),
        report.count(UnitStatus::Failed),
        report.total_rows()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::{Row, Value};
    use crate::transfer::unit::testing::{VecSink, VecSource};

    fn unit(name: &str, rows: Vec<Result<Row>>) -> TransferUnit {
        let (sink, _) = VecSink::new();
        TransferUnit::new(name, Box::new(VecSource::new(rows)), Box::new(sink))
    }

    fn ok_rows(count: i64) -> Vec<Result<Row>> {
        (1..=count).map(|i| Ok(vec![Value::Int(i)])).collect()
    }

    fn failing_rows() -> Vec<Result<Row>> {
        let mut rows = ok_rows(2);
        rows.push(Err(MigrateError::transfer("", "invalid Int value \"x\"")));
        rows.extend(ok_rows(2));
        rows
    }

    #[tokio::test]
    async fn test_partial_failure_is_isolated() {
        let units = vec![
            unit("unit1", ok_rows(5)),
            unit("unit2", failing_rows()),
            unit("unit3", ok_rows(3)),
        ];
        let options = TransferOptions {
            workers: 2,
            ..Default::default()
        };
        let report = run_units(units, &options, CancellationToken::new())
            .await
            .unwrap();

        let statuses: Vec<UnitStatus> = report.units.iter().map(|u| u.status).collect();
        assert_eq!(
            statuses,
            vec![UnitStatus::Completed, UnitStatus::Failed, UnitStatus::Completed]
        );
        assert_eq!(report.units[0].rows, 5);
        assert_eq!(report.units[2].rows, 3);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].unit, "unit2");
        assert_eq!(report.errors[0].kind, "value_transfer");
        assert!(report.errors[0].message.contains("at row 3"));
    }

    #[tokio::test]
    async fn test_skip_policy_completes_every_unit() {
        let units = vec![unit("a", failing_rows()), unit("b", ok_rows(1))];
        let options = TransferOptions {
            error_policy: ErrorPolicy::Skip,
            ..Default::default()
        };
        let report = run_units(units, &options, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.count(UnitStatus::Completed), 2);
        assert_eq!(report.units[0].rows, 4);
        assert_eq!(report.units[0].skipped, 1);
        assert_eq!(report.total_rows(), 5);
        assert!(report.has_errors());
    }

    #[tokio::test]
    async fn test_fail_fast_stops_later_units() {
        let units = vec![
            unit("first", failing_rows()),
            unit("second", ok_rows(3)),
            unit("third", ok_rows(3)),
        ];
        let options = TransferOptions {
            workers: 1,
            fail_fast: true,
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let report = run_units(units, &options, cancel.clone()).await.unwrap();
        assert_eq!(report.units[0].status, UnitStatus::Failed);
        assert_eq!(report.units[1].status, UnitStatus::Cancelled);
        assert_eq!(report.units[2].status, UnitStatus::Cancelled);
        assert_eq!(report.errors.len(), 1);
        // Fail-fast never cancels the caller's token.
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_run_reports_without_errors() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let units = vec![unit("a", ok_rows(2)), unit("b", ok_rows(2))];
        let report = run_units(units, &TransferOptions::default(), cancel)
            .await
            .unwrap();
        assert_eq!(report.count(UnitStatus::Cancelled), 2);
        assert!(!report.has_errors());
    }

    #[test]
    fn test_report_serializes() {
        let report = TransferReport {
            units: vec![UnitReport {
                name: "orders".into(),
                status: UnitStatus::Partial,
                rows: 10,
                skipped: 0,
                batches: 1,
                duration_ms: 3,
                error: None,
            }],
            errors: vec![],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["units"][0]["status"], "partial");
        assert!(json["units"][0].get("error").is_none());
    }
}
