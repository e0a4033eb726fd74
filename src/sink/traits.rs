//! Sink trait and error types

use crate::listing::BusListing;
use thiserror::Error;

/// Errors that can occur while persisting listings
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("No sink configured")]
    NoSink,
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Durable destination for a run's listings
///
/// `append` receives the whole ordered sequence at once. A failed call may be
/// retried with the same records.
pub trait RecordSink: Send {
    /// Human-readable name used in logs
    fn name(&self) -> String;

    fn append(&mut self, records: &[BusListing]) -> SinkResult<()>;
}
