//! SQLite implementations of the core store traits.
//!
//! Each store wraps the shared [`Database`]; every method runs under the
//! connection mutex, and the two-statement queue updates run inside a
//! transaction.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::{OptionalExtension, Row};
use tracing::debug;

use seatline_core::error::{Result, SeatlineError};
use seatline_core::store::{HistoryStore, QueueStore, TableStore, UserDirectory};
use seatline_core::types::{
    HistoryEntry, HistoryFilter, HistoryStatus, NewHistoryEntry, NewTable, QueueEntry,
    QueueStatus, ReservationSlot, Role, Table, TableId, TableStatus, TableType, UserId,
};

use crate::db::{sql_err, Database};

/// Wall-clock format used for reservation times.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DEFAULT_HISTORY_LIMIT: usize = 50;

const TABLE_COLUMNS: &str = "id, table_number, capacity, type, status, is_enabled,
     current_customer_id, reservation_time, duration_minutes, occupied_at";

const QUEUE_COLUMNS: &str =
    "id, customer_id, party_size, table_type, position, status, joined_at";

const HISTORY_COLUMNS: &str = "id, customer_id, table_id, table_number, table_type, party_size,
     reservation_time, duration_minutes, status, created_by, created_by_role, seated_by,
     created_at, completed_at";

fn type_str(table_type: TableType) -> &'static str {
    match table_type {
        TableType::Regular => "regular",
        TableType::Vip => "vip",
    }
}

fn format_time(time: NaiveDateTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn parse_time(text: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, TIME_FORMAT)
        .map_err(|e| SeatlineError::Storage(format!("Invalid stored time '{}': {}", text, e)))
}

fn from_unix(ts: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0)
        .single()
        .ok_or_else(|| SeatlineError::Storage(format!("Invalid timestamp {}", ts)))
}

fn parse_enum<T: std::str::FromStr<Err = String>>(text: &str) -> Result<T> {
    text.parse().map_err(SeatlineError::Storage)
}

fn missing_table(id: TableId) -> SeatlineError {
    SeatlineError::NotFound(format!("table {}", id))
}

// =============================================================================
// Tables
// =============================================================================

/// Restaurant tables backed by `restaurant_tables`.
pub struct SqliteTableStore {
    db: Arc<Database>,
}

impl SqliteTableStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Enable or disable a table.
    pub fn set_enabled(&self, id: TableId, enabled: bool) -> Result<()> {
        self.update(
            id,
            "UPDATE restaurant_tables SET is_enabled = ?2 WHERE id = ?1",
            rusqlite::params![id.0, enabled],
        )
    }

    fn update(&self, id: TableId, sql: &str, params: impl rusqlite::Params) -> Result<()> {
        let changed = self
            .db
            .with_conn(|conn| conn.execute(sql, params).map_err(sql_err))?;
        if changed == 0 {
            return Err(missing_table(id));
        }
        Ok(())
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Table>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(sql).map_err(sql_err)?;
            let rows = stmt
                .query_map(params, |row| Ok(row_to_table(row)))
                .map_err(sql_err)?;

            let mut tables = Vec::new();
            for row in rows {
                tables.push(row.map_err(sql_err)??);
            }
            Ok(tables)
        })
    }
}

impl TableStore for SqliteTableStore {
    fn find_available(
        &self,
        capacity: u32,
        table_type: Option<TableType>,
        limit: usize,
    ) -> Result<Vec<Table>> {
        let sql = format!(
            "SELECT {} FROM restaurant_tables
             WHERE is_enabled = 1 AND status = 'available' AND capacity >= ?1
               AND (?2 IS NULL OR type = ?2)
             ORDER BY capacity ASC, table_number ASC
             LIMIT ?3",
            TABLE_COLUMNS
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query(
            &sql,
            rusqlite::params![capacity, table_type.map(type_str), limit],
        )
    }

    fn get(&self, id: TableId) -> Result<Option<Table>> {
        let sql = format!("SELECT {} FROM restaurant_tables WHERE id = ?1", TABLE_COLUMNS);
        self.db.with_conn(|conn| {
            let found = conn
                .query_row(&sql, rusqlite::params![id.0], |row| Ok(row_to_table(row)))
                .optional()
                .map_err(sql_err)?;
            found.transpose()
        })
    }

    fn list(&self) -> Result<Vec<Table>> {
        let sql = format!(
            "SELECT {} FROM restaurant_tables ORDER BY table_number ASC",
            TABLE_COLUMNS
        );
        self.query(&sql, [])
    }

    fn insert(&self, def: NewTable) -> Result<Table> {
        let id = self.db.with_conn(|conn| {
            let exists: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM restaurant_tables WHERE table_number = ?1)",
                    rusqlite::params![def.number],
                    |row| row.get(0),
                )
                .map_err(sql_err)?;
            if exists {
                return Err(SeatlineError::Storage(format!(
                    "Table number {} already exists",
                    def.number
                )));
            }

            conn.execute(
                "INSERT INTO restaurant_tables (table_number, capacity, type) VALUES (?1, ?2, ?3)",
                rusqlite::params![def.number, def.capacity, type_str(def.table_type)],
            )
            .map_err(|e| SeatlineError::Storage(format!("Failed to insert table: {}", e)))?;
            Ok(conn.last_insert_rowid())
        })?;

        debug!(table = def.number, capacity = def.capacity, "table inserted");
        Ok(Table::available(
            TableId(id),
            def.number,
            def.capacity,
            def.table_type,
        ))
    }

    fn reservations_for_table(&self, id: TableId) -> Result<Vec<ReservationSlot>> {
        let sql = format!(
            "SELECT {} FROM restaurant_tables
             WHERE id = ?1 AND status = 'reserved'",
            TABLE_COLUMNS
        );
        Ok(self
            .query(&sql, rusqlite::params![id.0])?
            .iter()
            .filter_map(Table::reservation)
            .collect())
    }

    fn reservations_for_customer(&self, customer: UserId) -> Result<Vec<ReservationSlot>> {
        let sql = format!(
            "SELECT {} FROM restaurant_tables
             WHERE current_customer_id = ?1 AND status = 'reserved'
             ORDER BY reservation_time ASC",
            TABLE_COLUMNS
        );
        Ok(self
            .query(&sql, rusqlite::params![customer.0])?
            .iter()
            .filter_map(Table::reservation)
            .collect())
    }

    fn set_reserved(
        &self,
        id: TableId,
        customer: UserId,
        start: NaiveDateTime,
        duration_minutes: u32,
    ) -> Result<bool> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE restaurant_tables
                     SET status = 'reserved', current_customer_id = ?2, reservation_time = ?3,
                         duration_minutes = ?4, occupied_at = NULL
                     WHERE id = ?1 AND status = 'available' AND is_enabled = 1",
                    rusqlite::params![id.0, customer.0, format_time(start), duration_minutes],
                )
                .map_err(sql_err)?;
            if changed > 0 {
                return Ok(true);
            }
            let exists: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM restaurant_tables WHERE id = ?1)",
                    rusqlite::params![id.0],
                    |row| row.get(0),
                )
                .map_err(sql_err)?;
            if exists {
                Ok(false)
            } else {
                Err(missing_table(id))
            }
        })
    }

    fn set_occupied(
        &self,
        id: TableId,
        customer: Option<UserId>,
        occupied_at: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Result<()> {
        self.update(
            id,
            "UPDATE restaurant_tables
             SET status = 'occupied', current_customer_id = ?2, reservation_time = NULL,
                 duration_minutes = ?3, occupied_at = ?4
             WHERE id = ?1",
            rusqlite::params![
                id.0,
                customer.map(|c| c.0),
                duration_minutes,
                occupied_at.timestamp()
            ],
        )
    }

    fn set_available(&self, id: TableId) -> Result<()> {
        self.update(
            id,
            "UPDATE restaurant_tables
             SET status = 'available', current_customer_id = NULL, reservation_time = NULL,
                 duration_minutes = NULL, occupied_at = NULL
             WHERE id = ?1",
            rusqlite::params![id.0],
        )
    }
}

/// Inserts the given tables when the floor is empty. Returns how many were
/// created.
pub fn seed_if_empty(tables: &dyn TableStore, defs: &[NewTable]) -> Result<usize> {
    if !tables.list()?.is_empty() {
        return Ok(0);
    }
    for def in defs {
        tables.insert(def.clone())?;
    }
    Ok(defs.len())
}

// =============================================================================
// Queue
// =============================================================================

/// The walk-in queue backed by `queue`.
pub struct SqliteQueueStore {
    db: Arc<Database>,
}

impl SqliteQueueStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

fn find_waiting_in(conn: &rusqlite::Connection, customer: UserId) -> Result<Option<QueueEntry>> {
    let sql = format!(
        "SELECT {} FROM queue WHERE customer_id = ?1 AND status = 'waiting'
         ORDER BY position ASC LIMIT 1",
        QUEUE_COLUMNS
    );
    let found = conn
        .query_row(&sql, rusqlite::params![customer.0], |row| {
            Ok(row_to_queue_entry(row))
        })
        .optional()
        .map_err(sql_err)?;
    found.transpose()
}

impl QueueStore for SqliteQueueStore {
    fn waiting(&self) -> Result<Vec<QueueEntry>> {
        let sql = format!(
            "SELECT {} FROM queue WHERE status = 'waiting' ORDER BY position ASC",
            QUEUE_COLUMNS
        );
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql).map_err(sql_err)?;
            let rows = stmt
                .query_map([], |row| Ok(row_to_queue_entry(row)))
                .map_err(sql_err)?;

            let mut entries = Vec::new();
            for row in rows {
                entries.push(row.map_err(sql_err)??);
            }
            Ok(entries)
        })
    }

    fn find_waiting(&self, customer: UserId) -> Result<Option<QueueEntry>> {
        self.db.with_conn(|conn| find_waiting_in(conn, customer))
    }

    fn enqueue(
        &self,
        customer: UserId,
        party_size: u32,
        table_type: TableType,
    ) -> Result<QueueEntry> {
        let joined_at = Utc::now();
        self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction().map_err(sql_err)?;
            let position: u32 = tx
                .query_row(
                    "SELECT COALESCE(MAX(position), 0) + 1 FROM queue WHERE status = 'waiting'",
                    [],
                    |row| row.get(0),
                )
                .map_err(sql_err)?;

            tx.execute(
                "INSERT INTO queue (customer_id, party_size, table_type, position, status, joined_at)
                 VALUES (?1, ?2, ?3, ?4, 'waiting', ?5)",
                rusqlite::params![
                    customer.0,
                    party_size,
                    type_str(table_type),
                    position,
                    joined_at.timestamp()
                ],
            )
            .map_err(|e| SeatlineError::Storage(format!("Failed to enqueue: {}", e)))?;
            let id = tx.last_insert_rowid();
            tx.commit().map_err(sql_err)?;

            Ok(QueueEntry {
                id,
                customer,
                party_size,
                table_type,
                position,
                status: QueueStatus::Waiting,
                joined_at: from_unix(joined_at.timestamp())?,
            })
        })
    }

    fn close(&self, customer: UserId, status: QueueStatus) -> Result<Option<QueueEntry>> {
        self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction().map_err(sql_err)?;
            let Some(mut entry) = find_waiting_in(&tx, customer)? else {
                return Ok(None);
            };

            tx.execute(
                "UPDATE queue SET status = ?2 WHERE id = ?1",
                rusqlite::params![entry.id, status.to_string()],
            )
            .map_err(sql_err)?;
            tx.execute(
                "UPDATE queue SET position = position - 1
                 WHERE status = 'waiting' AND position > ?1",
                rusqlite::params![entry.position],
            )
            .map_err(sql_err)?;
            tx.commit().map_err(sql_err)?;

            entry.status = status;
            Ok(Some(entry))
        })
    }
}

// =============================================================================
// History
// =============================================================================

/// Reservation history backed by `reservation_history`.
pub struct SqliteHistoryStore {
    db: Arc<Database>,
}

impl SqliteHistoryStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn record(&self, new: NewHistoryEntry) -> Result<HistoryEntry> {
        let created_at = from_unix(Utc::now().timestamp())?;
        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reservation_history
                    (customer_id, table_id, table_number, table_type, party_size,
                     reservation_time, duration_minutes, status, created_by, created_by_role,
                     created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'reserved', ?8, ?9, ?10)",
                rusqlite::params![
                    new.customer.0,
                    new.table_id.0,
                    new.table_number,
                    type_str(new.table_type),
                    new.party_size,
                    format_time(new.reservation_time),
                    new.duration_minutes,
                    new.created_by.user_id.0,
                    new.created_by.role.to_string(),
                    created_at.timestamp(),
                ],
            )
            .map_err(|e| SeatlineError::Storage(format!("Failed to record history: {}", e)))?;
            Ok(conn.last_insert_rowid())
        })?;

        Ok(HistoryEntry {
            id,
            customer: new.customer,
            table_id: new.table_id,
            table_number: new.table_number,
            table_type: new.table_type,
            party_size: new.party_size,
            reservation_time: new.reservation_time,
            duration_minutes: new.duration_minutes,
            status: HistoryStatus::Reserved,
            created_by: new.created_by.user_id,
            created_by_role: new.created_by.role,
            seated_by: None,
            created_at,
            completed_at: None,
        })
    }

    fn transition_latest(
        &self,
        table_id: TableId,
        customer: UserId,
        from: HistoryStatus,
        to: HistoryStatus,
        actor: Option<UserId>,
    ) -> Result<bool> {
        let (seated_by, completed_at) = match to {
            HistoryStatus::Occupied => (actor.map(|a| a.0), None),
            HistoryStatus::Completed | HistoryStatus::Cancelled | HistoryStatus::Expired => {
                (None, Some(Utc::now().timestamp()))
            }
            HistoryStatus::Reserved => (None, None),
        };

        let changed = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE reservation_history
                 SET status = ?4,
                     seated_by = COALESCE(?5, seated_by),
                     completed_at = COALESCE(?6, completed_at)
                 WHERE id = (
                     SELECT id FROM reservation_history
                     WHERE table_id = ?1 AND customer_id = ?2 AND status = ?3
                     ORDER BY id DESC LIMIT 1
                 )",
                rusqlite::params![
                    table_id.0,
                    customer.0,
                    from.to_string(),
                    to.to_string(),
                    seated_by,
                    completed_at
                ],
            )
            .map_err(sql_err)
        })?;
        Ok(changed > 0)
    }

    fn list(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>> {
        let sql = format!(
            "SELECT {} FROM reservation_history
             WHERE (?1 IS NULL OR customer_id = ?1)
               AND (?2 IS NULL OR status = ?2)
               AND (?3 IS NULL OR table_id = ?3)
             ORDER BY id DESC
             LIMIT ?4 OFFSET ?5",
            HISTORY_COLUMNS
        );
        let limit = i64::try_from(filter.limit.unwrap_or(DEFAULT_HISTORY_LIMIT)).unwrap_or(i64::MAX);
        let offset = i64::try_from(filter.offset.unwrap_or(0)).unwrap_or(i64::MAX);

        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql).map_err(sql_err)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![
                        filter.customer.map(|c| c.0),
                        filter.status.map(|s| s.to_string()),
                        filter.table_id.map(|t| t.0),
                        limit,
                        offset
                    ],
                    |row| Ok(row_to_history_entry(row)),
                )
                .map_err(sql_err)?;

            let mut entries = Vec::new();
            for row in rows {
                entries.push(row.map_err(sql_err)??);
            }
            Ok(entries)
        })
    }
}

// =============================================================================
// Users
// =============================================================================

/// Display names backed by `users`.
pub struct SqliteUserDirectory {
    db: Arc<Database>,
}

impl SqliteUserDirectory {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create or rename a user.
    pub fn upsert(&self, id: UserId, name: &str, role: Role) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, role) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, role = excluded.role",
                rusqlite::params![id.0, name, role.to_string()],
            )
            .map_err(sql_err)?;
            Ok(())
        })
    }
}

impl UserDirectory for SqliteUserDirectory {
    fn display_name(&self, id: UserId) -> Result<Option<String>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT name FROM users WHERE id = ?1",
                rusqlite::params![id.0],
                |row| row.get(0),
            )
            .optional()
            .map_err(sql_err)
        })
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn row_to_table(row: &Row<'_>) -> Result<Table> {
    let table_type: String = row.get(3).map_err(sql_err)?;
    let status: String = row.get(4).map_err(sql_err)?;
    let occupant: Option<i64> = row.get(6).map_err(sql_err)?;
    let reservation_time: Option<String> = row.get(7).map_err(sql_err)?;
    let occupied_at: Option<i64> = row.get(9).map_err(sql_err)?;

    Ok(Table {
        id: TableId(row.get(0).map_err(sql_err)?),
        number: row.get(1).map_err(sql_err)?,
        capacity: row.get(2).map_err(sql_err)?,
        table_type: parse_enum::<TableType>(&table_type)?,
        status: parse_enum::<TableStatus>(&status)?,
        enabled: row.get(5).map_err(sql_err)?,
        occupant: occupant.map(UserId),
        reservation_time: reservation_time.as_deref().map(parse_time).transpose()?,
        duration_minutes: row.get(8).map_err(sql_err)?,
        occupied_at: occupied_at.map(from_unix).transpose()?,
    })
}

fn row_to_queue_entry(row: &Row<'_>) -> Result<QueueEntry> {
    let table_type: String = row.get(3).map_err(sql_err)?;
    let status: String = row.get(5).map_err(sql_err)?;

    Ok(QueueEntry {
        id: row.get(0).map_err(sql_err)?,
        customer: UserId(row.get(1).map_err(sql_err)?),
        party_size: row.get(2).map_err(sql_err)?,
        table_type: parse_enum::<TableType>(&table_type)?,
        position: row.get(4).map_err(sql_err)?,
        status: parse_enum::<QueueStatus>(&status)?,
        joined_at: from_unix(row.get(6).map_err(sql_err)?)?,
    })
}

fn row_to_history_entry(row: &Row<'_>) -> Result<HistoryEntry> {
    let table_type: String = row.get(4).map_err(sql_err)?;
    let reservation_time: String = row.get(6).map_err(sql_err)?;
    let status: String = row.get(8).map_err(sql_err)?;
    let role: String = row.get(10).map_err(sql_err)?;
    let seated_by: Option<i64> = row.get(11).map_err(sql_err)?;
    let completed_at: Option<i64> = row.get(13).map_err(sql_err)?;

    Ok(HistoryEntry {
        id: row.get(0).map_err(sql_err)?,
        customer: UserId(row.get(1).map_err(sql_err)?),
        table_id: TableId(row.get(2).map_err(sql_err)?),
        table_number: row.get(3).map_err(sql_err)?,
        table_type: parse_enum::<TableType>(&table_type)?,
        party_size: row.get(5).map_err(sql_err)?,
        reservation_time: parse_time(&reservation_time)?,
        duration_minutes: row.get(7).map_err(sql_err)?,
        status: parse_enum::<HistoryStatus>(&status)?,
        created_by: UserId(row.get(9).map_err(sql_err)?),
        created_by_role: parse_enum::<Role>(&role)?,
        seated_by: seated_by.map(UserId),
        created_at: from_unix(row.get(12).map_err(sql_err)?)?,
        completed_at: completed_at.map(from_unix).transpose()?,
    })
}
