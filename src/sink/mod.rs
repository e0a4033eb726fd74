//! Sinks for persisting a finished run
//!
//! A run's listings are handed over once, as one ordered sequence:
//! - `CsvSink`: flat delimited file with a fixed header
//! - `SqliteSink`: relational `bus_data` table with derived city columns
//! - `FanoutSink`: every configured sink, in order

mod csv_file;
mod schema;
mod sqlite;
mod traits;

pub use csv_file::{CsvSink, CSV_HEADER, UNKNOWN};
pub use schema::initialize_schema;
pub use sqlite::SqliteSink;
pub use traits::{RecordSink, SinkError, SinkResult};

use crate::config::OutputConfig;
use crate::listing::BusListing;
use std::path::Path;

/// Writes to several sinks in order
///
/// If one sink fails, the sinks before it keep their write and a retried
/// `append` only goes to the sinks that have not succeeded yet.
pub struct FanoutSink {
    sinks: Vec<Box<dyn RecordSink>>,
    delivered: Vec<bool>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Box<dyn RecordSink>>) -> Self {
        let delivered = vec![false; sinks.len()];
        Self { sinks, delivered }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl RecordSink for FanoutSink {
    fn name(&self) -> String {
        self.sinks
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn append(&mut self, records: &[BusListing]) -> SinkResult<()> {
        if self.sinks.is_empty() {
            return Err(SinkError::NoSink);
        }

        for (sink, delivered) in self.sinks.iter_mut().zip(self.delivered.iter_mut()) {
            if *delivered {
                continue;
            }
            sink.append(records)?;
            *delivered = true;
            tracing::info!("Wrote {} listing(s) to {}", records.len(), sink.name());
        }

        self.delivered.iter_mut().for_each(|d| *d = false);
        Ok(())
    }
}

/// Opens every sink named in the output configuration
pub fn open_sinks(output: &OutputConfig) -> SinkResult<FanoutSink> {
    let mut sinks: Vec<Box<dyn RecordSink>> = Vec::new();

    if let Some(csv_path) = &output.csv_path {
        sinks.push(Box::new(CsvSink::new(csv_path)));
    }
    if let Some(database_path) = &output.database_path {
        sinks.push(Box::new(SqliteSink::open(Path::new(database_path))?));
    }

    if sinks.is_empty() {
        return Err(SinkError::NoSink);
    }

    Ok(FanoutSink::new(sinks))
}
