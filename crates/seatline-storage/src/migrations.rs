//! Database schema migrations.
//!
//! Version 1 creates the restaurant tables, wait queue, reservation history,
//! system settings and users tables.

use rusqlite::Connection;
use tracing::info;

use seatline_core::error::{Result, SeatlineError};

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| SeatlineError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| SeatlineError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: initial schema.
///
/// Reservation times are restaurant wall-clock text (`YYYY-MM-DD HH:MM:SS`);
/// instants are unix seconds.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS restaurant_tables (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            table_number        INTEGER NOT NULL UNIQUE,
            capacity            INTEGER NOT NULL CHECK (capacity > 0),
            type                TEXT NOT NULL DEFAULT 'regular'
                                CHECK (type IN ('regular', 'vip')),
            status              TEXT NOT NULL DEFAULT 'available'
                                CHECK (status IN ('available', 'occupied', 'reserved')),
            is_enabled          INTEGER NOT NULL DEFAULT 1,
            current_customer_id INTEGER,
            reservation_time    TEXT,
            duration_minutes    INTEGER,
            occupied_at         INTEGER,
            created_at          INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_tables_status
            ON restaurant_tables (status, capacity);

        CREATE INDEX IF NOT EXISTS idx_tables_customer
            ON restaurant_tables (current_customer_id)
            WHERE current_customer_id IS NOT NULL;

        CREATE TABLE IF NOT EXISTS queue (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id     INTEGER NOT NULL,
            party_size      INTEGER NOT NULL CHECK (party_size > 0),
            table_type      TEXT NOT NULL DEFAULT 'regular'
                            CHECK (table_type IN ('regular', 'vip')),
            position        INTEGER NOT NULL,
            status          TEXT NOT NULL DEFAULT 'waiting'
                            CHECK (status IN ('waiting', 'seated', 'cancelled')),
            joined_at       INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_queue_waiting
            ON queue (status, position);

        CREATE INDEX IF NOT EXISTS idx_queue_customer
            ON queue (customer_id, status);

        CREATE TABLE IF NOT EXISTS reservation_history (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id         INTEGER NOT NULL,
            table_id            INTEGER NOT NULL,
            table_number        INTEGER NOT NULL,
            table_type          TEXT NOT NULL,
            party_size          INTEGER NOT NULL,
            reservation_time    TEXT NOT NULL,
            duration_minutes    INTEGER NOT NULL,
            status              TEXT NOT NULL DEFAULT 'reserved'
                                CHECK (status IN ('reserved', 'occupied', 'completed', 'cancelled', 'expired')),
            created_by          INTEGER NOT NULL,
            created_by_role     TEXT NOT NULL,
            seated_by           INTEGER,
            created_at          INTEGER NOT NULL,
            completed_at        INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_history_customer
            ON reservation_history (customer_id, id DESC);

        CREATE INDEX IF NOT EXISTS idx_history_table
            ON reservation_history (table_id, customer_id, status);

        CREATE TABLE IF NOT EXISTS system_settings (
            setting_key     TEXT PRIMARY KEY NOT NULL,
            setting_value   TEXT NOT NULL,
            updated_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            role        TEXT NOT NULL DEFAULT 'customer'
                        CHECK (role IN ('customer', 'manager', 'admin')),
            created_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| SeatlineError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    #[test]
    fn test_migrations_run_once() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_table_status_is_checked() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO restaurant_tables (table_number, capacity) VALUES (1, 4)",
            [],
        )
        .unwrap();
        let bad = conn.execute(
            "UPDATE restaurant_tables SET status = 'broken' WHERE table_number = 1",
            [],
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_duplicate_table_number_rejected() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO restaurant_tables (table_number, capacity) VALUES (7, 4)",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO restaurant_tables (table_number, capacity) VALUES (7, 2)",
            [],
        );
        assert!(dup.is_err());
    }
}
