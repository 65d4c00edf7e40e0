//! Batch processor: CSV upload to registry entities.
//!
//! Combines all steps of a bulk upload: parsing, row-limit checks,
//! sequential per-row creation, and group activation on full success.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bulkload::{BatchProcessor, BatchStore, RegistryClient};
//!
//! let store = Arc::new(BatchStore::new());
//! let registry = Arc::new(RegistryClient::new("https://registry.example.com"));
//! let processor = BatchProcessor::new(store.clone(), registry);
//!
//! let summary = processor.submit(b"name,address\nAlpha,1 Main St").await?;
//! println!("{} created, {} failed", summary.processed, summary.failed);
//! ```

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::api::logs::{emit, BatchLog, LogEntry, LogLevel};
use crate::config::DEFAULT_MAX_ROWS;
use crate::error::{BatchError, PipelineError};
use crate::models::{
    round2, BatchState, BatchStatus, BatchSummary, EntityRecord, HealthReport, OutcomeStatus,
    RowOutcome, ValidationReport,
};
use crate::parser::parse_entities;
use crate::registry::RegistryApi;
use crate::store::BatchStore;

/// Orchestrates parsing, registry calls and batch state updates.
#[derive(Clone)]
pub struct BatchProcessor {
    store: Arc<BatchStore>,
    registry: Arc<dyn RegistryApi>,
    max_rows: usize,
}

impl BatchProcessor {
    pub fn new(store: Arc<BatchStore>, registry: Arc<dyn RegistryApi>) -> Self {
        Self {
            store,
            registry,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }

    /// Set the row limit enforced by [`submit`](Self::submit)
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    pub fn store(&self) -> &Arc<BatchStore> {
        &self.store
    }

    /// Parse an upload and process it as a new batch.
    ///
    /// Fails without creating a batch when the file is invalid, holds no
    /// rows, or exceeds the row limit. Once the batch starts, this always
    /// returns a summary.
    pub async fn submit(&self, bytes: &[u8]) -> Result<BatchSummary, PipelineError> {
        emit(LogEntry::new(LogLevel::Info, "📖 Reading CSV file..."));
        let records = parse_entities(bytes).map_err(|e| {
            emit(LogEntry::new(LogLevel::Error, format!("Invalid CSV: {}", e)));
            e
        })?;
        emit(LogEntry::new(
            LogLevel::Success,
            format!("Read {} rows", records.len()),
        ));

        self.submit_records(records).await
    }

    /// Process already-parsed records as a new batch, after limit checks.
    pub async fn submit_records(
        &self,
        records: Vec<EntityRecord>,
    ) -> Result<BatchSummary, PipelineError> {
        if records.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        if records.len() > self.max_rows {
            emit(LogEntry::new(
                LogLevel::Error,
                format!(
                    "Rejected: {} rows exceeds the limit of {}",
                    records.len(),
                    self.max_rows
                ),
            ));
            return Err(PipelineError::TooManyRows {
                found: records.len(),
                limit: self.max_rows,
            });
        }

        let batch_id = Uuid::new_v4().to_string();
        Ok(self.process(records, &batch_id).await?)
    }

    /// Run one batch to completion.
    ///
    /// Rows are created strictly in input order. A failed row is recorded
    /// and processing continues. Activation is attempted only when every
    /// row succeeded. Only an id already in the store is refused; once
    /// registered, the batch always yields a summary.
    pub(crate) async fn process(
        &self,
        records: Vec<EntityRecord>,
        batch_id: &str,
    ) -> Result<BatchSummary, BatchError> {
        let started = Instant::now();
        let total = records.len();

        self.store.insert(BatchState::new(batch_id, total))?;
        let log = BatchLog::new(batch_id);
        log.batch(LogLevel::Info, format!("📦 Submitting {} entities...", total));

        let mut outcomes: Vec<RowOutcome> = Vec::with_capacity(total);
        let mut processed_count = 0;
        let mut failed_count = 0;

        for record in &records {
            let outcome = match self.registry.create(record, batch_id).await {
                Ok(remote_id) => {
                    processed_count += 1;
                    log.row(
                        record.source_row,
                        LogLevel::Success,
                        format!("\"{}\" → id {}", record.name, remote_id),
                    );
                    RowOutcome::created(record, remote_id)
                }
                Err(e) => {
                    failed_count += 1;
                    log.row(
                        record.source_row,
                        LogLevel::Warning,
                        format!("\"{}\": {}", record.name, e),
                    );
                    RowOutcome::failed(record, e.to_string())
                }
            };
            outcomes.push(outcome);

            let snapshot = outcomes.clone();
            self.sync(batch_id, move |state| {
                state.outcomes = snapshot;
                state.processed_count = processed_count;
                state.failed_count = failed_count;
            });
        }

        let activated = if failed_count == 0 {
            log.batch(LogLevel::Info, "🔓 All rows created, activating batch...");
            let activated = self.registry.activate(batch_id).await;
            if activated {
                for outcome in outcomes
                    .iter_mut()
                    .filter(|o| o.status == OutcomeStatus::Created)
                {
                    outcome.status = OutcomeStatus::CreatedAndActivated;
                }
                log.batch(LogLevel::Success, "Batch activated");
            } else {
                log.batch(LogLevel::Warning, "Batch activation failed, entities left inactive");
            }
            activated
        } else {
            log.batch(
                LogLevel::Warning,
                format!("{} rows failed, activation skipped", failed_count),
            );
            false
        };

        let elapsed_seconds = round2(started.elapsed().as_secs_f64());
        let status = if failed_count == 0 {
            BatchStatus::Completed
        } else {
            BatchStatus::PartialFailure
        };

        let final_outcomes = outcomes.clone();
        self.sync(batch_id, move |state| {
            state.outcomes = final_outcomes;
            state.status = status;
            state.end_time = Some(Utc::now());
            state.elapsed_seconds = Some(elapsed_seconds);
            state.activated = activated;
        });

        log.batch(
            LogLevel::Success,
            format!(
                "Done: {} created, {} failed in {:.2}s",
                processed_count, failed_count, elapsed_seconds
            ),
        );

        Ok(BatchSummary {
            batch_id: batch_id.to_string(),
            total,
            processed: processed_count,
            failed: failed_count,
            elapsed_seconds,
            activated,
            outcomes,
        })
    }

    /// Parse an upload without submitting anything.
    pub fn validate_only(&self, bytes: &[u8]) -> ValidationReport {
        match parse_entities(bytes) {
            Ok(records) => ValidationReport::valid(records.len(), self.max_rows),
            Err(e) => ValidationReport::invalid(e.to_string()),
        }
    }

    /// Registry reachability and number of running batches.
    pub async fn health(&self) -> HealthReport {
        let registry_reachable = self.registry.ping().await;
        HealthReport {
            status: if registry_reachable { "healthy" } else { "degraded" }.to_string(),
            registry_reachable,
            timestamp: Utc::now(),
            active_batches: self.store.active_count(),
        }
    }

    fn sync<F>(&self, batch_id: &str, f: F)
    where
        F: FnOnce(&mut BatchState),
    {
        if let Err(e) = self.store.update(batch_id, f) {
            tracing::error!(batch_id, error = %e, "batch state vanished from store");
        }
    }
}
