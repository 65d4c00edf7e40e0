//! HTTP API module.
//!
//! Thin axum adapter over [`crate::processor::BatchProcessor`] and the
//! batch store, plus the SSE log stream.

pub mod server;
pub mod types;
pub mod logs;

pub use server::{router, start_server, AppState};
pub use types::*;
pub use logs::*;
