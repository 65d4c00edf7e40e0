//! Domain models for the bulk ingestion pipeline.
//!
//! - [`EntityRecord`] - One validated CSV row
//! - [`RowOutcome`] - What happened to one row during processing
//! - [`BatchState`] - Mutable per-batch state kept in the store
//! - [`BatchSummary`] - Returned to the submitter
//! - [`StatusSnapshot`] - Returned to status queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Parsed input
// =============================================================================

/// A validated entity parsed from one CSV data row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityRecord {
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    /// 1-based, counted from the first data row.
    pub source_row: usize,
}

// =============================================================================
// Row outcomes
// =============================================================================

/// Terminal status of one row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Created,
    CreatedAndActivated,
    Failed,
}

/// Per-row result, appended in input order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RowOutcome {
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<i64>,
    pub name: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RowOutcome {
    /// Outcome for a row the registry accepted.
    pub fn created(record: &EntityRecord, remote_id: i64) -> Self {
        Self {
            row: record.source_row,
            remote_id: Some(remote_id),
            name: record.name.clone(),
            status: OutcomeStatus::Created,
            error_message: None,
        }
    }

    /// Outcome for a row the registry rejected.
    pub fn failed(record: &EntityRecord, error: impl Into<String>) -> Self {
        Self {
            row: record.source_row,
            remote_id: None,
            name: record.name.clone(),
            status: OutcomeStatus::Failed,
            error_message: Some(error.into()),
        }
    }
}

// =============================================================================
// Batch state
// =============================================================================

/// Lifecycle status of a batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Processing,
    Completed,
    PartialFailure,
}

/// State of one batch, owned by the processor while it runs and
/// read-only in the store afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchState {
    pub batch_id: String,
    pub status: BatchStatus,
    pub total: usize,
    pub processed_count: usize,
    pub failed_count: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub elapsed_seconds: Option<f64>,
    pub activated: bool,
    pub outcomes: Vec<RowOutcome>,
}

impl BatchState {
    /// Fresh state for a batch about to start.
    pub fn new(batch_id: impl Into<String>, total: usize) -> Self {
        Self {
            batch_id: batch_id.into(),
            status: BatchStatus::Processing,
            total,
            processed_count: 0,
            failed_count: 0,
            start_time: Utc::now(),
            end_time: None,
            elapsed_seconds: None,
            activated: false,
            outcomes: Vec::new(),
        }
    }

    /// Fraction of rows done, rounded to 2 decimals. `0.0` for empty batches.
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let done = (self.processed_count + self.failed_count) as f64;
        round2(done / self.total as f64)
    }
}

// =============================================================================
// Responses
// =============================================================================

/// Returned when a batch finishes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchSummary {
    pub batch_id: String,
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub elapsed_seconds: f64,
    pub activated: bool,
    pub outcomes: Vec<RowOutcome>,
}

/// Point-in-time copy of a batch for status queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusSnapshot {
    pub progress: f64,
    #[serde(flatten)]
    pub state: BatchState,
}

impl From<BatchState> for StatusSnapshot {
    fn from(state: BatchState) -> Self {
        Self {
            progress: state.progress(),
            state,
        }
    }
}

/// Result of a validate-only run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exceeds_limit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationReport {
    pub fn valid(total: usize, limit: usize) -> Self {
        Self {
            valid: true,
            total: Some(total),
            message: Some(format!("CSV is valid and contains {} entity records", total)),
            exceeds_limit: Some(total > limit),
            limit: Some(limit),
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            total: None,
            message: None,
            exceeds_limit: None,
            limit: None,
            error: Some(error.into()),
        }
    }
}

/// Service health.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthReport {
    /// "healthy" or "degraded"
    pub status: String,
    pub registry_reachable: bool,
    pub timestamp: DateTime<Utc>,
    pub active_batches: usize,
}

/// Round to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(row: usize) -> EntityRecord {
        EntityRecord {
            name: format!("Entity {}", row),
            address: "1 Main St".into(),
            phone: None,
            source_row: row,
        }
    }

    #[test]
    fn test_progress_empty_batch() {
        let state = BatchState::new("b", 0);
        assert_eq!(state.progress(), 0.0);
    }

    #[test]
    fn test_progress_rounding() {
        let mut state = BatchState::new("b", 3);
        state.processed_count = 1;
        assert_eq!(state.progress(), 0.33);
        state.failed_count = 1;
        assert_eq!(state.progress(), 0.67);
    }

    #[test]
    fn test_outcome_serialization() {
        let ok = serde_json::to_value(RowOutcome::created(&record(1), 7)).unwrap();
        assert_eq!(ok["status"], "created");
        assert_eq!(ok["remote_id"], 7);
        assert!(ok.get("error_message").is_none());

        let failed = serde_json::to_value(RowOutcome::failed(&record(2), "boom")).unwrap();
        assert_eq!(failed["status"], "failed");
        assert_eq!(failed["error_message"], "boom");
        assert!(failed.get("remote_id").is_none());
    }

    #[test]
    fn test_snapshot_flattens_state() {
        let snapshot = StatusSnapshot::from(BatchState::new("abc", 2));
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["batch_id"], "abc");
        assert_eq!(json["status"], "processing");
        assert_eq!(json["progress"], 0.0);
    }

    #[test]
    fn test_validation_report_limit() {
        let report = ValidationReport::valid(21, 20);
        assert_eq!(report.exceeds_limit, Some(true));
        assert_eq!(report.limit, Some(20));
    }
}
