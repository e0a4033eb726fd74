//! SQLite sink
//!
//! Stores listings in the `bus_data` table with origin and destination split
//! out of the route name. Rows whose route name has no usable split are left
//! out.

use crate::listing::BusListing;
use crate::sink::schema::initialize_schema;
use crate::sink::{RecordSink, SinkResult};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// SQLite sink backend
pub struct SqliteSink {
    conn: Connection,
    path: PathBuf,
}

impl SqliteSink {
    /// Opens or creates the database and its schema
    pub fn open(path: &Path) -> SinkResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> SinkResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    /// Number of stored rows
    pub fn count(&self) -> SinkResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM bus_data", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Reads every stored listing in insertion order
    pub fn load_all(&self) -> SinkResult<Vec<BusListing>> {
        let mut stmt = self.conn.prepare(
            "SELECT state, route_name, route_link, busname, bustype, departing_time,
             duration, reaching_time, star_rating, price, seats_available
             FROM bus_data ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(BusListing {
                portal: row.get(0)?,
                route_name: row.get(1)?,
                route_url: row.get(2)?,
                operator_name: row.get(3)?,
                bus_type: row.get(4)?,
                departure_time: row.get(5)?,
                duration: row.get(6)?,
                arrival_time: row.get(7)?,
                star_rating: row.get(8)?,
                price: row.get(9)?,
                seats_available: row.get(10)?,
            })
        })?;

        let listings = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(listings)
    }
}

impl RecordSink for SqliteSink {
    fn name(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    fn append(&mut self, records: &[BusListing]) -> SinkResult<()> {
        let tx = self.conn.transaction()?;
        let mut skipped = 0usize;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO bus_data (state, from_city, to_city, route_name, route_link,
                 busname, bustype, departing_time, duration, reaching_time, star_rating,
                 price, seats_available)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;

            for listing in records {
                let Some((from_city, to_city)) = listing.cities() else {
                    skipped += 1;
                    continue;
                };

                stmt.execute(params![
                    listing.portal,
                    from_city,
                    to_city,
                    listing.route_name,
                    listing.route_url,
                    listing.operator_name,
                    listing.bus_type,
                    listing.departure_time,
                    listing.duration,
                    listing.arrival_time,
                    listing.star_rating,
                    listing.price,
                    listing.seats_available,
                ])?;
            }
        }

        tx.commit()?;

        if skipped > 0 {
            tracing::warn!(
                "Skipped {} listing(s) whose route name has no '<from> to <to>' split",
                skipped
            );
        }

        Ok(())
    }
}
