//! # Bulkload - CSV bulk registration against a remote registry
//!
//! Bulkload takes a CSV of entities (`name`, `address`, optional `phone`),
//! validates it, creates every row on a remote registry service and, when
//! every row succeeded, activates the whole batch in one call.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│  Processor  │────▶│  Registry   │
//! │  (upload)   │     │ (row rules) │     │ (row by row)│     │   (HTTP)    │
//! └─────────────┘     └─────────────┘     └──────┬──────┘     └─────────────┘
//!                                                │
//!                                         ┌──────▼──────┐
//!                                         │ Batch Store │◀── status queries
//!                                         └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bulkload::{BatchProcessor, BatchStore, RegistryClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(BatchStore::new());
//!     let registry = Arc::new(RegistryClient::new("https://registry.example.com"));
//!     let processor = BatchProcessor::new(store, registry);
//!     let summary = processor.submit(b"name,address\nAlpha,1 Main St").await.unwrap();
//!     println!("Batch {} activated: {}", summary.batch_id, summary.activated);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Records, outcomes, batch state
//! - [`config`] - Environment configuration
//! - [`parser`] - CSV parsing and row validation
//! - [`registry`] - Remote registry client
//! - [`store`] - In-memory batch store
//! - [`processor`] - Batch orchestration
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Remote registry
pub mod registry;

// Batch state and orchestration
pub mod processor;
pub mod store;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::Config;

pub use error::{BatchError, CsvError, PipelineError, RegistryError, ServerError};

pub use models::{
    BatchState, BatchStatus, BatchSummary, EntityRecord, HealthReport, OutcomeStatus,
    RowOutcome, StatusSnapshot, ValidationReport,
};

pub use parser::{parse_entities, parse_entities_file, parse_entities_str};

pub use registry::{RegistryApi, RegistryClient};

pub use store::BatchStore;

pub use processor::BatchProcessor;

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
