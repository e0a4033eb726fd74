//! Database schema for the relational sink

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per bus listing
CREATE TABLE IF NOT EXISTS bus_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    state TEXT NOT NULL,
    from_city TEXT NOT NULL,
    to_city TEXT NOT NULL,
    route_name TEXT NOT NULL,
    route_link TEXT NOT NULL,
    busname TEXT NOT NULL,
    bustype TEXT NOT NULL,
    departing_time TEXT NOT NULL,
    duration TEXT NOT NULL,
    reaching_time TEXT NOT NULL,
    star_rating REAL,
    price REAL NOT NULL,
    seats_available INTEGER
);

CREATE INDEX IF NOT EXISTS idx_bus_data_cities ON bus_data(from_city, to_city);
CREATE INDEX IF NOT EXISTS idx_bus_data_state ON bus_data(state);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
