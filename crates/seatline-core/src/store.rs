//! Interfaces to the external stores the booking engine reads and writes.
//!
//! Every method is a synchronous keyed query, atomic at the row level. No
//! method spans more than one row-level write; callers that need several
//! writes (reservation + history) accept that they are not atomic together.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::Result;
use crate::types::{
    HistoryEntry, HistoryFilter, HistoryStatus, NewHistoryEntry, NewTable, QueueEntry,
    QueueStatus, ReservationSlot, Table, TableCounts, TableId, TableType, UserId,
};

/// Restaurant tables and their occupancy.
pub trait TableStore: Send + Sync {
    /// Enabled, available tables seating at least `capacity`, smallest first.
    fn find_available(
        &self,
        capacity: u32,
        table_type: Option<TableType>,
        limit: usize,
    ) -> Result<Vec<Table>>;

    fn get(&self, id: TableId) -> Result<Option<Table>>;

    /// All tables ordered by table number.
    fn list(&self) -> Result<Vec<Table>>;

    fn insert(&self, table: NewTable) -> Result<Table>;

    /// Active reservations held on one table.
    fn reservations_for_table(&self, id: TableId) -> Result<Vec<ReservationSlot>>;

    /// Active reservations held by one customer on any table, earliest first.
    fn reservations_for_customer(&self, customer: UserId) -> Result<Vec<ReservationSlot>>;

    /// Reserves the table only if it is still enabled and available, checked
    /// and written as one step. Returns `false` without writing otherwise.
    fn set_reserved(
        &self,
        id: TableId,
        customer: UserId,
        start: NaiveDateTime,
        duration_minutes: u32,
    ) -> Result<bool>;

    fn set_occupied(
        &self,
        id: TableId,
        customer: Option<UserId>,
        occupied_at: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Result<()>;

    /// Clears occupant, reservation time, duration and occupied-at.
    fn set_available(&self, id: TableId) -> Result<()>;

    fn counts(&self) -> Result<TableCounts> {
        Ok(TableCounts::tally(&self.list()?))
    }
}

/// The walk-in wait queue.
pub trait QueueStore: Send + Sync {
    /// Waiting entries ordered by position.
    fn waiting(&self) -> Result<Vec<QueueEntry>>;

    fn find_waiting(&self, customer: UserId) -> Result<Option<QueueEntry>>;

    /// Appends a waiting entry at the last position + 1.
    fn enqueue(&self, customer: UserId, party_size: u32, table_type: TableType)
        -> Result<QueueEntry>;

    /// Moves the customer's waiting entry to `status` and shifts the entries
    /// behind it up by one. Returns the closed entry, if there was one.
    fn close(&self, customer: UserId, status: QueueStatus) -> Result<Option<QueueEntry>>;
}

/// Reservation history (audit trail of reservations and seatings).
pub trait HistoryStore: Send + Sync {
    fn record(&self, entry: NewHistoryEntry) -> Result<HistoryEntry>;

    /// Moves the newest record for (table, customer) in status `from` to `to`.
    /// Returns whether a record was updated.
    fn transition_latest(
        &self,
        table_id: TableId,
        customer: UserId,
        from: HistoryStatus,
        to: HistoryStatus,
        actor: Option<UserId>,
    ) -> Result<bool>;

    /// Matching records, newest first.
    fn list(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>>;
}

/// Display names for user ids.
pub trait UserDirectory: Send + Sync {
    fn display_name(&self, id: UserId) -> Result<Option<String>>;

    fn name_or_fallback(&self, id: UserId) -> String {
        match self.display_name(id) {
            Ok(Some(name)) => name,
            _ => format!("Guest #{}", id),
        }
    }
}
