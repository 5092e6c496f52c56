//! In-memory store implementations.
//!
//! Used by tests and by the `memory` storage backend. Each store keeps its
//! rows behind a single `Mutex`, so every method is atomic.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{Result, SeatlineError};
use crate::store::{HistoryStore, QueueStore, TableStore, UserDirectory};
use crate::types::{
    HistoryEntry, HistoryFilter, HistoryStatus, NewHistoryEntry, NewTable, QueueEntry,
    QueueStatus, ReservationSlot, Table, TableId, TableStatus, TableType, UserId,
};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| SeatlineError::Storage(format!("Lock poisoned: {}", e)))
}

fn missing_table(id: TableId) -> SeatlineError {
    SeatlineError::NotFound(format!("table {}", id))
}

// =============================================================================
// Tables
// =============================================================================

#[derive(Default)]
pub struct MemoryTableStore {
    tables: Mutex<Vec<Table>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the given tables.
    pub fn with_tables(defs: impl IntoIterator<Item = NewTable>) -> Result<Self> {
        let store = Self::new();
        for def in defs {
            store.insert(def)?;
        }
        Ok(store)
    }

    /// Enable or disable a table.
    pub fn set_enabled(&self, id: TableId, enabled: bool) -> Result<()> {
        self.update(id, |t| t.enabled = enabled)
    }

    fn update(&self, id: TableId, f: impl FnOnce(&mut Table)) -> Result<()> {
        let mut tables = lock(&self.tables)?;
        let table = tables
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| missing_table(id))?;
        f(table);
        Ok(())
    }
}

impl TableStore for MemoryTableStore {
    fn find_available(
        &self,
        capacity: u32,
        table_type: Option<TableType>,
        limit: usize,
    ) -> Result<Vec<Table>> {
        let tables = lock(&self.tables)?;
        let mut found: Vec<Table> = tables
            .iter()
            .filter(|t| t.enabled && t.status == TableStatus::Available && t.capacity >= capacity)
            .filter(|t| table_type.map_or(true, |ty| t.table_type == ty))
            .cloned()
            .collect();
        found.sort_by_key(|t| (t.capacity, t.number));
        found.truncate(limit);
        Ok(found)
    }

    fn get(&self, id: TableId) -> Result<Option<Table>> {
        Ok(lock(&self.tables)?.iter().find(|t| t.id == id).cloned())
    }

    fn list(&self) -> Result<Vec<Table>> {
        let mut tables = lock(&self.tables)?.clone();
        tables.sort_by_key(|t| t.number);
        Ok(tables)
    }

    fn insert(&self, def: NewTable) -> Result<Table> {
        let mut tables = lock(&self.tables)?;
        if tables.iter().any(|t| t.number == def.number) {
            return Err(SeatlineError::Storage(format!(
                "Table number {} already exists",
                def.number
            )));
        }
        let next_id = tables.iter().map(|t| t.id.0).max().unwrap_or(0) + 1;
        let table = Table::available(TableId(next_id), def.number, def.capacity, def.table_type);
        tables.push(table.clone());
        Ok(table)
    }

    fn reservations_for_table(&self, id: TableId) -> Result<Vec<ReservationSlot>> {
        let tables = lock(&self.tables)?;
        Ok(tables
            .iter()
            .filter(|t| t.id == id)
            .filter_map(Table::reservation)
            .collect())
    }

    fn reservations_for_customer(&self, customer: UserId) -> Result<Vec<ReservationSlot>> {
        let tables = lock(&self.tables)?;
        let mut slots: Vec<ReservationSlot> = tables
            .iter()
            .filter_map(Table::reservation)
            .filter(|s| s.customer == customer)
            .collect();
        slots.sort_by_key(|s| s.start);
        Ok(slots)
    }

    fn set_reserved(
        &self,
        id: TableId,
        customer: UserId,
        start: NaiveDateTime,
        duration_minutes: u32,
    ) -> Result<bool> {
        let mut tables = lock(&self.tables)?;
        let table = tables
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| missing_table(id))?;
        if !table.enabled || table.status != TableStatus::Available {
            return Ok(false);
        }
        table.status = TableStatus::Reserved;
        table.occupant = Some(customer);
        table.reservation_time = Some(start);
        table.duration_minutes = Some(duration_minutes);
        table.occupied_at = None;
        Ok(true)
    }

    fn set_occupied(
        &self,
        id: TableId,
        customer: Option<UserId>,
        occupied_at: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Result<()> {
        self.update(id, |t| {
            t.status = TableStatus::Occupied;
            t.occupant = customer;
            t.reservation_time = None;
            t.duration_minutes = Some(duration_minutes);
            t.occupied_at = Some(occupied_at);
        })
    }

    fn set_available(&self, id: TableId) -> Result<()> {
        self.update(id, |t| {
            t.status = TableStatus::Available;
            t.occupant = None;
            t.reservation_time = None;
            t.duration_minutes = None;
            t.occupied_at = None;
        })
    }
}

// =============================================================================
// Queue
// =============================================================================

#[derive(Default)]
pub struct MemoryQueueStore {
    entries: Mutex<Vec<QueueEntry>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueueStore for MemoryQueueStore {
    fn waiting(&self) -> Result<Vec<QueueEntry>> {
        let entries = lock(&self.entries)?;
        let mut waiting: Vec<QueueEntry> = entries
            .iter()
            .filter(|e| e.status == QueueStatus::Waiting)
            .cloned()
            .collect();
        waiting.sort_by_key(|e| e.position);
        Ok(waiting)
    }

    fn find_waiting(&self, customer: UserId) -> Result<Option<QueueEntry>> {
        let entries = lock(&self.entries)?;
        Ok(entries
            .iter()
            .find(|e| e.customer == customer && e.status == QueueStatus::Waiting)
            .cloned())
    }

    fn enqueue(
        &self,
        customer: UserId,
        party_size: u32,
        table_type: TableType,
    ) -> Result<QueueEntry> {
        let mut entries = lock(&self.entries)?;
        let position = entries
            .iter()
            .filter(|e| e.status == QueueStatus::Waiting)
            .map(|e| e.position)
            .max()
            .unwrap_or(0)
            + 1;
        let entry = QueueEntry {
            id: entries.len() as i64 + 1,
            customer,
            party_size,
            table_type,
            position,
            status: QueueStatus::Waiting,
            joined_at: Utc::now(),
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    fn close(&self, customer: UserId, status: QueueStatus) -> Result<Option<QueueEntry>> {
        let mut entries = lock(&self.entries)?;
        let Some(idx) = entries
            .iter()
            .position(|e| e.customer == customer && e.status == QueueStatus::Waiting)
        else {
            return Ok(None);
        };

        entries[idx].status = status;
        let closed = entries[idx].clone();
        for entry in entries
            .iter_mut()
            .filter(|e| e.status == QueueStatus::Waiting && e.position > closed.position)
        {
            entry.position -= 1;
        }
        Ok(Some(closed))
    }
}

// =============================================================================
// History
// =============================================================================

#[derive(Default)]
pub struct MemoryHistoryStore {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn record(&self, new: NewHistoryEntry) -> Result<HistoryEntry> {
        let mut entries = lock(&self.entries)?;
        let entry = HistoryEntry {
            id: entries.len() as i64 + 1,
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
            created_at: Utc::now(),
            completed_at: None,
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    fn transition_latest(
        &self,
        table_id: TableId,
        customer: UserId,
        from: HistoryStatus,
        to: HistoryStatus,
        actor: Option<UserId>,
    ) -> Result<bool> {
        let mut entries = lock(&self.entries)?;
        let latest = entries
            .iter_mut()
            .rev()
            .find(|e| e.table_id == table_id && e.customer == customer && e.status == from);

        match latest {
            Some(entry) => {
                entry.status = to;
                match to {
                    HistoryStatus::Occupied => entry.seated_by = actor,
                    HistoryStatus::Completed | HistoryStatus::Cancelled | HistoryStatus::Expired => {
                        entry.completed_at = Some(Utc::now())
                    }
                    HistoryStatus::Reserved => {}
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn list(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>> {
        let entries = lock(&self.entries)?;
        Ok(entries
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .skip(filter.offset.unwrap_or(0))
            .take(filter.limit.unwrap_or(50))
            .cloned()
            .collect())
    }
}

// =============================================================================
// Users
// =============================================================================

#[derive(Default)]
pub struct MemoryUserDirectory {
    names: Mutex<HashMap<UserId, String>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, id: UserId, name: impl Into<String>) -> Result<()> {
        lock(&self.names)?.insert(id, name.into());
        Ok(())
    }
}

impl UserDirectory for MemoryUserDirectory {
    fn display_name(&self, id: UserId) -> Result<Option<String>> {
        Ok(lock(&self.names)?.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Identity, Role};
    use chrono::NaiveDate;

    fn floor() -> MemoryTableStore {
        MemoryTableStore::with_tables([
            NewTable { number: 1, capacity: 2, table_type: TableType::Regular },
            NewTable { number: 2, capacity: 6, table_type: TableType::Regular },
            NewTable { number: 3, capacity: 4, table_type: TableType::Regular },
            NewTable { number: 4, capacity: 4, table_type: TableType::Vip },
        ])
        .unwrap()
    }

    fn evening(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    // =========================================================================
    // Tables
    // =========================================================================

    #[test]
    fn test_find_available_sorts_by_capacity() {
        let store = floor();
        let found = store.find_available(3, None, 5).unwrap();
        let numbers: Vec<u32> = found.iter().map(|t| t.number).collect();
        assert_eq!(numbers, vec![3, 4, 2]);
    }

    #[test]
    fn test_find_available_filters_type_and_limit() {
        let store = floor();
        let vip = store.find_available(1, Some(TableType::Vip), 5).unwrap();
        assert_eq!(vip.len(), 1);
        assert_eq!(vip[0].number, 4);

        let limited = store.find_available(1, None, 2).unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_find_available_skips_disabled_and_busy() {
        let store = floor();
        store.set_enabled(TableId(3), false).unwrap();
        store
            .set_reserved(TableId(4), UserId(1), evening(19), 60)
            .unwrap();
        let found = store.find_available(3, None, 5).unwrap();
        let numbers: Vec<u32> = found.iter().map(|t| t.number).collect();
        assert_eq!(numbers, vec![2]);
    }

    #[test]
    fn test_set_reserved_claims_only_available_tables() {
        let store = floor();
        assert!(store.set_reserved(TableId(2), UserId(1), evening(19), 60).unwrap());
        assert!(!store.set_reserved(TableId(2), UserId(2), evening(19), 60).unwrap());
        assert_eq!(store.get(TableId(2)).unwrap().unwrap().occupant, Some(UserId(1)));

        store.set_enabled(TableId(3), false).unwrap();
        assert!(!store.set_reserved(TableId(3), UserId(2), evening(20), 60).unwrap());
        assert_eq!(
            store.get(TableId(3)).unwrap().unwrap().status,
            TableStatus::Available
        );
        assert!(matches!(
            store.set_reserved(TableId(99), UserId(2), evening(20), 60),
            Err(SeatlineError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_table_number_rejected() {
        let store = floor();
        let err = store
            .insert(NewTable { number: 1, capacity: 2, table_type: TableType::Regular })
            .unwrap_err();
        assert!(matches!(err, SeatlineError::Storage(_)));
    }

    #[test]
    fn test_reserve_then_free_clears_fields() {
        let store = floor();
        store
            .set_reserved(TableId(1), UserId(5), evening(18), 90)
            .unwrap();
        let slots = store.reservations_for_customer(UserId(5)).unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].duration_minutes, Some(90));
        assert_eq!(store.reservations_for_table(TableId(1)).unwrap().len(), 1);

        store.set_available(TableId(1)).unwrap();
        let table = store.get(TableId(1)).unwrap().unwrap();
        assert_eq!(table.status, TableStatus::Available);
        assert!(table.occupant.is_none());
        assert!(table.reservation_time.is_none());
        assert!(table.duration_minutes.is_none());
    }

    #[test]
    fn test_set_on_missing_table_is_not_found() {
        let store = floor();
        let err = store.set_available(TableId(99)).unwrap_err();
        assert!(matches!(err, SeatlineError::NotFound(_)));
    }

    #[test]
    fn test_counts() {
        let store = floor();
        store
            .set_occupied(TableId(2), None, Utc::now(), 60)
            .unwrap();
        let counts = store.counts().unwrap();
        assert_eq!(counts.total, 4);
        assert_eq!(counts.occupied, 1);
        assert_eq!(counts.available, 3);
    }

    // =========================================================================
    // Queue
    // =========================================================================

    #[test]
    fn test_queue_positions_shift_on_close() {
        let queue = MemoryQueueStore::new();
        queue.enqueue(UserId(1), 2, TableType::Regular).unwrap();
        queue.enqueue(UserId(2), 4, TableType::Regular).unwrap();
        let third = queue.enqueue(UserId(3), 3, TableType::Vip).unwrap();
        assert_eq!(third.position, 3);

        let closed = queue.close(UserId(1), QueueStatus::Cancelled).unwrap().unwrap();
        assert_eq!(closed.status, QueueStatus::Cancelled);

        let waiting = queue.waiting().unwrap();
        let positions: Vec<(i64, u32)> = waiting.iter().map(|e| (e.customer.0, e.position)).collect();
        assert_eq!(positions, vec![(2, 1), (3, 2)]);
    }

    #[test]
    fn test_queue_close_unknown_customer() {
        let queue = MemoryQueueStore::new();
        assert!(queue.close(UserId(8), QueueStatus::Seated).unwrap().is_none());
    }

    // =========================================================================
    // History
    // =========================================================================

    #[test]
    fn test_history_transition_latest() {
        let history = MemoryHistoryStore::new();
        let new = NewHistoryEntry {
            customer: UserId(4),
            table_id: TableId(2),
            table_number: 2,
            table_type: TableType::Regular,
            party_size: 3,
            reservation_time: evening(20),
            duration_minutes: 60,
            created_by: Identity::new(UserId(4), Role::Customer),
        };
        history.record(new.clone()).unwrap();
        history.record(new).unwrap();

        let moved = history
            .transition_latest(TableId(2), UserId(4), HistoryStatus::Reserved, HistoryStatus::Occupied, Some(UserId(1)))
            .unwrap();
        assert!(moved);

        let all = history.list(&HistoryFilter::default()).unwrap();
        assert_eq!(all[0].status, HistoryStatus::Occupied);
        assert_eq!(all[0].seated_by, Some(UserId(1)));
        assert_eq!(all[1].status, HistoryStatus::Reserved);

        let reserved = history
            .list(&HistoryFilter { status: Some(HistoryStatus::Reserved), ..Default::default() })
            .unwrap();
        assert_eq!(reserved.len(), 1);
    }

    #[test]
    fn test_user_directory_fallback_name() {
        let users = MemoryUserDirectory::new();
        users.upsert(UserId(1), "Ada").unwrap();
        assert_eq!(users.name_or_fallback(UserId(1)), "Ada");
        assert_eq!(users.name_or_fallback(UserId(2)), "Guest #2");
    }
}
