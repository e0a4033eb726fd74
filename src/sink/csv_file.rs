//! Flat-file sink
//!
//! One row per listing under a fixed header. The header is written only when
//! the file is new or empty, so repeated runs keep appending to one table.

use crate::listing::BusListing;
use crate::sink::{RecordSink, SinkResult};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Column header of the flat file
pub const CSV_HEADER: [&str; 11] = [
    "state",
    "route_name",
    "route_link",
    "busname",
    "bustype",
    "departing_time",
    "duration",
    "reaching_time",
    "star_rating",
    "price",
    "seats_available",
];

/// Written in place of an unknown rating or seat count
pub const UNKNOWN: &str = "N/A";

pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every row back
    ///
    /// Rows whose price does not parse are skipped. A missing file reads as
    /// empty.
    pub fn load_all(&self) -> SinkResult<Vec<BusListing>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let headers = reader.headers()?.clone();
        let column = |name: &str| headers.iter().position(|h| h == name);
        let columns: Vec<Option<usize>> = CSV_HEADER.iter().map(|name| column(name)).collect();

        let mut listings = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let field = |i: usize| {
                columns[i]
                    .and_then(|c| record.get(c))
                    .unwrap_or_default()
                    .to_string()
            };

            let Ok(price) = field(9).parse::<f64>() else {
                tracing::debug!("Skipping row {} of {}: bad price", line + 2, self.path.display());
                continue;
            };

            listings.push(BusListing {
                portal: field(0),
                route_name: field(1),
                route_url: field(2),
                operator_name: field(3),
                bus_type: field(4),
                departure_time: field(5),
                duration: field(6),
                arrival_time: field(7),
                star_rating: field(8).parse().ok(),
                price,
                seats_available: field(10).parse().ok(),
            });
        }

        Ok(listings)
    }
}

impl RecordSink for CsvSink {
    fn name(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    fn append(&mut self, records: &[BusListing]) -> SinkResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let start_len = file.metadata()?.len();

        let batch = render_batch(records, start_len == 0)?;
        append_or_rollback(&mut file, start_len, &batch)?;

        Ok(())
    }
}

/// Renders the rows (and the header, for an empty file) as CSV bytes
fn render_batch(records: &[BusListing], with_header: bool) -> SinkResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    if with_header {
        writer.write_record(CSV_HEADER)?;
    }
    for listing in records {
        writer.write_record(csv_row(listing))?;
    }

    writer.into_inner().map_err(|e| e.into_error().into())
}

/// Output that can be cut back to an earlier length
trait Truncate: Write {
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for File {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Writes `bytes` in full, or cuts `out` back to `start_len` and fails
///
/// A failed append leaves the file as it was, so a retried append never
/// duplicates rows or leaves a torn last line.
fn append_or_rollback<W: Truncate>(out: &mut W, start_len: u64, bytes: &[u8]) -> io::Result<()> {
    let written = match out.write_all(bytes) {
        Ok(()) => out.flush(),
        Err(e) => Err(e),
    };

    if let Err(e) = written {
        if let Err(rollback) = out.truncate(start_len) {
            tracing::error!("Failed to roll back partial CSV write: {}", rollback);
        }
        return Err(e);
    }

    Ok(())
}

fn csv_row(listing: &BusListing) -> [String; 11] {
    [
        listing.portal.clone(),
        listing.route_name.clone(),
        listing.route_url.clone(),
        listing.operator_name.clone(),
        listing.bus_type.clone(),
        listing.departure_time.clone(),
        listing.duration.clone(),
        listing.arrival_time.clone(),
        listing
            .star_rating
            .map(|r| r.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string()),
        listing.price.to_string(),
        listing
            .seats_available
            .map(|s| s.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string()),
    ]
}
