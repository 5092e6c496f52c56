//! Reservation write path: admission, cancellation, seating and completion.

use std::sync::Arc;

use chrono::{Duration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use seatline_core::types::{
    HistoryEntry, HistoryFilter, HistoryStatus, Identity, NewHistoryEntry, ReservationSlot,
    Role, TableId, TableStatus,
};

use crate::conflict::ConflictResolver;
use crate::error::BookingError;
use crate::scheduler::VacateScheduler;
use crate::tables::{occupy, release, require_staff, settle_history, Seating};
use crate::Stores;

pub const MIN_PARTY_SIZE: u32 = 1;
pub const MAX_PARTY_SIZE: u32 = 20;

pub fn check_party_size(party_size: u32) -> Result<(), BookingError> {
    if (MIN_PARTY_SIZE..=MAX_PARTY_SIZE).contains(&party_size) {
        Ok(())
    } else {
        Err(BookingError::PartySize(party_size))
    }
}

/// A reservation request for the calling customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReservation {
    pub table_id: TableId,
    pub reservation_time: NaiveDateTime,
    pub party_size: u32,
    /// Defaults to the configured reservation duration.
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

/// Counts over the reservation history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub total: usize,
    pub reserved: usize,
    pub occupied: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub expired: usize,
    pub avg_duration: Option<f64>,
    pub avg_party_size: Option<f64>,
}

impl HistorySummary {
    pub fn from_entries(entries: &[HistoryEntry]) -> Self {
        let mut summary = Self {
            total: entries.len(),
            ..Self::default()
        };
        for entry in entries {
            match entry.status {
                HistoryStatus::Reserved => summary.reserved += 1,
                HistoryStatus::Occupied => summary.occupied += 1,
                HistoryStatus::Completed => summary.completed += 1,
                HistoryStatus::Cancelled => summary.cancelled += 1,
                HistoryStatus::Expired => summary.expired += 1,
            }
        }
        if !entries.is_empty() {
            let n = entries.len() as f64;
            let duration: u64 = entries.iter().map(|e| u64::from(e.duration_minutes)).sum();
            let party: u64 = entries.iter().map(|e| u64::from(e.party_size)).sum();
            summary.avg_duration = Some(duration as f64 / n);
            summary.avg_party_size = Some(party as f64 / n);
        }
        summary
    }
}

pub struct ReservationDesk {
    stores: Stores,
    conflicts: ConflictResolver,
    scheduler: Arc<VacateScheduler>,
}

impl ReservationDesk {
    pub fn new(stores: Stores, scheduler: Arc<VacateScheduler>) -> Self {
        let conflicts = ConflictResolver::new(stores.tables.clone(), stores.settings.clone());
        Self {
            stores,
            conflicts,
            scheduler,
        }
    }

    // =========================================================================
    // Create
    // =========================================================================

    pub fn create(
        &self,
        caller: Identity,
        request: NewReservation,
    ) -> Result<ReservationSlot, BookingError> {
        self.create_at(caller, request, Local::now().naive_local())
    }

    /// Admits and writes a reservation for the caller.
    ///
    /// Checks run in a fixed order and the first failure is returned; nothing
    /// is written on rejection. The history record is best effort.
    pub fn create_at(
        &self,
        caller: Identity,
        request: NewReservation,
        now: NaiveDateTime,
    ) -> Result<ReservationSlot, BookingError> {
        let settings = self.stores.booking_settings();
        if !settings.reservation_enabled {
            return Err(BookingError::ReservationsDisabled);
        }
        check_party_size(request.party_size)?;

        let duration = request
            .duration_minutes
            .unwrap_or(settings.default_reservation_duration);
        if duration < settings.min_reservation_duration {
            return Err(BookingError::DurationTooShort(settings.min_reservation_duration));
        }
        if duration > settings.max_reservation_duration {
            return Err(BookingError::DurationTooLong(settings.max_reservation_duration));
        }

        let table = self
            .stores
            .tables
            .get(request.table_id)?
            .filter(|t| t.enabled && t.status == TableStatus::Available)
            .ok_or(BookingError::TableUnavailable)?;

        if table.capacity < request.party_size {
            return Err(BookingError::InsufficientCapacity {
                capacity: table.capacity,
                party_size: request.party_size,
            });
        }

        let start = request.reservation_time;
        if start <= now {
            return Err(BookingError::NotInFuture);
        }
        let max_days = settings.max_reservation_days_ahead;
        if start > now + Duration::days(i64::from(max_days)) {
            return Err(BookingError::TooFarAhead(max_days));
        }

        if let Some(conflict) =
            self.conflicts
                .find_conflict(table.id, caller.user_id, start, duration)?
        {
            return Err(conflict.into());
        }

        if !self
            .stores
            .tables
            .set_reserved(table.id, caller.user_id, start, duration)?
        {
            warn!(table_id = %table.id, user_id = %caller.user_id, "Table taken before the reservation was written");
            return Err(BookingError::TableUnavailable);
        }

        let entry = NewHistoryEntry {
            customer: caller.user_id,
            table_id: table.id,
            table_number: table.number,
            table_type: table.table_type,
            party_size: request.party_size,
            reservation_time: start,
            duration_minutes: duration,
            created_by: caller,
        };
        if let Err(e) = self.stores.history.record(entry) {
            warn!(table_id = %table.id, user_id = %caller.user_id, "Reservation written but history not recorded: {}", e);
        }

        info!(
            table_id = %table.id,
            user_id = %caller.user_id,
            start = %start,
            duration_minutes = duration,
            "Reservation created"
        );

        Ok(ReservationSlot {
            table_id: table.id,
            table_number: table.number,
            customer: caller.user_id,
            start,
            duration_minutes: Some(duration),
        })
    }

    // =========================================================================
    // Cancel
    // =========================================================================

    /// Cancels the reservation held on a table. Customers may only cancel
    /// their own.
    pub fn cancel(&self, caller: Identity, table_id: TableId) -> Result<ReservationSlot, BookingError> {
        let slot = self
            .stores
            .tables
            .get(table_id)?
            .and_then(|t| t.reservation())
            .ok_or(BookingError::ReservationNotFound)?;

        if caller.role == Role::Customer && slot.customer != caller.user_id {
            return Err(BookingError::NotAuthorized(
                "cancel this reservation".to_string(),
            ));
        }

        release(&self.stores, &self.scheduler, table_id)?;
        settle_history(
            &self.stores,
            table_id,
            slot.customer,
            HistoryStatus::Reserved,
            HistoryStatus::Cancelled,
            None,
        );

        info!(table_id = %table_id, user_id = %caller.user_id, "Reservation cancelled");
        Ok(slot)
    }

    /// Cancels the caller's earliest reservation, if any.
    pub fn cancel_first_for(&self, caller: Identity) -> Result<Option<ReservationSlot>, BookingError> {
        match self.list_for(caller)?.first() {
            Some(slot) => self.cancel(caller, slot.table_id).map(Some),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Seat / complete
    // =========================================================================

    /// Seats the party holding the reservation and arms the vacate alert for
    /// the reserved duration.
    pub fn seat(&self, caller: Identity, table_id: TableId) -> Result<Seating, BookingError> {
        require_staff(caller, "seat customers")?;
        let table = self
            .stores
            .tables
            .get(table_id)?
            .ok_or(BookingError::ReservationNotFound)?;
        let slot = table.reservation().ok_or(BookingError::ReservationNotFound)?;
        let duration = slot
            .duration_minutes
            .unwrap_or(self.stores.booking_settings().default_reservation_duration);

        let seating = occupy(&self.stores, &self.scheduler, &table, Some(slot.customer), duration)?;
        settle_history(
            &self.stores,
            table_id,
            slot.customer,
            HistoryStatus::Reserved,
            HistoryStatus::Occupied,
            Some(caller.user_id),
        );

        info!(table_id = %table_id, user_id = %caller.user_id, "Reserved party seated");
        Ok(seating)
    }

    /// Frees an occupied table and closes its history record.
    pub fn complete(&self, caller: Identity, table_id: TableId) -> Result<(), BookingError> {
        require_staff(caller, "complete reservations")?;
        let table = self
            .stores
            .tables
            .get(table_id)?
            .filter(|t| t.status == TableStatus::Occupied)
            .ok_or(BookingError::NotOccupied)?;

        release(&self.stores, &self.scheduler, table_id)?;
        if let Some(occupant) = table.occupant {
            settle_history(
                &self.stores,
                table_id,
                occupant,
                HistoryStatus::Occupied,
                HistoryStatus::Completed,
                None,
            );
        }

        info!(table_id = %table_id, user_id = %caller.user_id, "Table vacated");
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Every active reservation, earliest first. Staff only.
    pub fn list_all(&self, caller: Identity) -> Result<Vec<ReservationSlot>, BookingError> {
        require_staff(caller, "view all reservations")?;
        let mut slots: Vec<ReservationSlot> = self
            .stores
            .tables
            .list()?
            .iter()
            .filter_map(|t| t.reservation())
            .collect();
        slots.sort_by_key(|s| s.start);
        Ok(slots)
    }

    /// The caller's active reservations, earliest first.
    pub fn list_for(&self, caller: Identity) -> Result<Vec<ReservationSlot>, BookingError> {
        Ok(self.stores.tables.reservations_for_customer(caller.user_id)?)
    }

    /// History visible to the caller. Customers only ever see their own.
    pub fn history(
        &self,
        caller: Identity,
        mut filter: HistoryFilter,
    ) -> Result<Vec<HistoryEntry>, BookingError> {
        if caller.role == Role::Customer {
            filter.customer = Some(caller.user_id);
        }
        Ok(self.stores.history.list(&filter)?)
    }

    pub fn history_summary(&self, caller: Identity) -> Result<HistorySummary, BookingError> {
        require_staff(caller, "view history statistics")?;
        let filter = HistoryFilter {
            limit: Some(usize::MAX),
            ..HistoryFilter::default()
        };
        let entries = self.stores.history.list(&filter)?;
        Ok(HistorySummary::from_entries(&entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use seatline_core::memory::{
        MemoryHistoryStore, MemoryQueueStore, MemoryTableStore, MemoryUserDirectory,
    };
    use seatline_core::settings::{SettingKey, StaticSettings};
    use seatline_core::store::TableStore;
    use seatline_core::types::{NewTable, Table, TableType, UserId};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn tomorrow_at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn desk_with(settings: StaticSettings) -> (Stores, Arc<VacateScheduler>, ReservationDesk) {
        let settings: Arc<StaticSettings> = Arc::new(settings);
        let stores = Stores::in_memory(
            [
                NewTable { number: 1, capacity: 2, table_type: TableType::Regular },
                NewTable { number: 2, capacity: 4, table_type: TableType::Regular },
                NewTable { number: 3, capacity: 6, table_type: TableType::Vip },
            ],
            settings.clone(),
        )
        .unwrap();
        let scheduler = Arc::new(VacateScheduler::new(settings));
        let desk = ReservationDesk::new(stores.clone(), scheduler.clone());
        (stores, scheduler, desk)
    }

    fn desk() -> (Stores, Arc<VacateScheduler>, ReservationDesk) {
        desk_with(StaticSettings::new())
    }

    fn customer(id: i64) -> Identity {
        Identity::new(UserId(id), Role::Customer)
    }

    fn manager() -> Identity {
        Identity::new(UserId(100), Role::Manager)
    }

    fn request(table: i64, start: NaiveDateTime, party: u32) -> NewReservation {
        NewReservation {
            table_id: TableId(table),
            reservation_time: start,
            party_size: party,
            duration_minutes: None,
        }
    }

    // =========================================================================
    // Admission
    // =========================================================================

    #[test]
    fn test_create_writes_table_and_history() {
        let (stores, _, desk) = desk();
        let slot = desk
            .create_at(customer(1), request(2, tomorrow_at(19, 0), 4), now())
            .unwrap();
        assert_eq!(slot.table_number, 2);
        assert_eq!(slot.duration_minutes, Some(60));

        let table = stores.tables.get(TableId(2)).unwrap().unwrap();
        assert_eq!(table.status, TableStatus::Reserved);
        assert_eq!(table.occupant, Some(UserId(1)));

        let history = desk.history(customer(1), HistoryFilter::default()).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, HistoryStatus::Reserved);
        assert_eq!(history[0].party_size, 4);
        assert_eq!(history[0].created_by_role, Role::Customer);
    }

    #[test]
    fn test_reservations_disabled() {
        let (_, _, desk) = desk_with(StaticSettings::new().with(SettingKey::ReservationEnabled, false));
        let err = desk
            .create_at(customer(1), request(2, tomorrow_at(19, 0), 2), now())
            .unwrap_err();
        assert!(matches!(err, BookingError::ReservationsDisabled));
    }

    #[test]
    fn test_party_size_bounds() {
        let (_, _, desk) = desk();
        for party in [0, 21, 25] {
            let err = desk
                .create_at(customer(1), request(3, tomorrow_at(19, 0), party), now())
                .unwrap_err();
            assert!(matches!(err, BookingError::PartySize(p) if p == party));
        }
    }

    #[test]
    fn test_duration_bounds() {
        let (_, _, desk) = desk();
        let mut short = request(2, tomorrow_at(19, 0), 2);
        short.duration_minutes = Some(15);
        assert!(matches!(
            desk.create_at(customer(1), short, now()).unwrap_err(),
            BookingError::DurationTooShort(30)
        ));

        let mut long = request(2, tomorrow_at(19, 0), 2);
        long.duration_minutes = Some(240);
        assert!(matches!(
            desk.create_at(customer(1), long, now()).unwrap_err(),
            BookingError::DurationTooLong(180)
        ));
    }

    #[test]
    fn test_capacity_and_availability() {
        let (stores, _, desk) = desk();
        let err = desk
            .create_at(customer(1), request(1, tomorrow_at(19, 0), 3), now())
            .unwrap_err();
        assert_eq!(err.to_string(), "Table capacity (2) is insufficient for party size (3)");

        stores
            .tables
            .set_occupied(TableId(2), None, chrono::Utc::now(), 60)
            .unwrap();
        let err = desk
            .create_at(customer(1), request(2, tomorrow_at(19, 0), 3), now())
            .unwrap_err();
        assert!(matches!(err, BookingError::TableUnavailable));

        let err = desk
            .create_at(customer(1), request(99, tomorrow_at(19, 0), 3), now())
            .unwrap_err();
        assert!(matches!(err, BookingError::TableUnavailable));
    }

    #[test]
    fn test_time_window_checks() {
        let (_, _, desk) = desk();
        let err = desk
            .create_at(customer(1), request(2, now(), 2), now())
            .unwrap_err();
        assert!(matches!(err, BookingError::NotInFuture));

        let err = desk
            .create_at(customer(1), request(2, now() + Duration::days(31), 2), now())
            .unwrap_err();
        assert!(matches!(err, BookingError::TooFarAhead(30)));

        assert!(desk
            .create_at(customer(1), request(2, now() + Duration::days(30), 2), now())
            .is_ok());
    }

    #[test]
    fn test_customer_overlap_rejected() {
        let (_, _, desk) = desk();
        desk.create_at(customer(1), request(2, tomorrow_at(19, 0), 2), now())
            .unwrap();

        let err = desk
            .create_at(customer(1), request(3, tomorrow_at(19, 30), 2), now())
            .unwrap_err();
        assert_eq!(err.to_string(), "You already have a reservation at this time");

        // Touching the end of the first window is allowed.
        assert!(desk
            .create_at(customer(1), request(3, tomorrow_at(20, 0), 2), now())
            .is_ok());
    }

    // =========================================================================
    // Cancel
    // =========================================================================

    #[test]
    fn test_customer_cancels_own_only() {
        let (stores, scheduler, desk) = desk();
        desk.create_at(customer(1), request(2, tomorrow_at(19, 0), 2), now())
            .unwrap();

        let err = desk.cancel(customer(2), TableId(2)).unwrap_err();
        assert!(matches!(err, BookingError::NotAuthorized(_)));

        let slot = desk.cancel(customer(1), TableId(2)).unwrap();
        assert_eq!(slot.customer, UserId(1));
        assert_eq!(
            stores.tables.get(TableId(2)).unwrap().unwrap().status,
            TableStatus::Available
        );
        assert!(scheduler.armed(TableId(2)).unwrap().is_none());

        let history = desk.history(customer(1), HistoryFilter::default()).unwrap();
        assert_eq!(history[0].status, HistoryStatus::Cancelled);
        assert!(history[0].completed_at.is_some());
    }

    #[test]
    fn test_staff_may_cancel_any() {
        let (_, _, desk) = desk();
        desk.create_at(customer(1), request(2, tomorrow_at(19, 0), 2), now())
            .unwrap();
        assert!(desk.cancel(manager(), TableId(2)).is_ok());
        assert!(matches!(
            desk.cancel(manager(), TableId(2)).unwrap_err(),
            BookingError::ReservationNotFound
        ));
    }

    #[test]
    fn test_cancel_first_for() {
        let (_, _, desk) = desk();
        assert!(desk.cancel_first_for(customer(1)).unwrap().is_none());

        desk.create_at(customer(1), request(3, tomorrow_at(21, 0), 2), now())
            .unwrap();
        desk.create_at(customer(1), request(2, tomorrow_at(18, 0), 2), now())
            .unwrap();
        let cancelled = desk.cancel_first_for(customer(1)).unwrap().unwrap();
        assert_eq!(cancelled.table_number, 2);
        assert_eq!(desk.list_for(customer(1)).unwrap().len(), 1);
    }

    // =========================================================================
    // Seat / complete
    // =========================================================================

    #[test]
    fn test_seat_then_complete() {
        let (_, scheduler, desk) = desk();
        let mut req = request(3, tomorrow_at(19, 0), 5);
        req.duration_minutes = Some(90);
        desk.create_at(customer(1), req, now()).unwrap();

        assert!(matches!(
            desk.seat(customer(1), TableId(3)).unwrap_err(),
            BookingError::NotAuthorized(_)
        ));

        let seating = desk.seat(manager(), TableId(3)).unwrap();
        assert_eq!(seating.duration_minutes, 90);
        let armed = scheduler.armed(TableId(3)).unwrap().unwrap();
        assert_eq!(armed.customer_name, "Guest #1");

        let entry = &desk.history(manager(), HistoryFilter::default()).unwrap()[0];
        assert_eq!(entry.status, HistoryStatus::Occupied);
        assert_eq!(entry.seated_by, Some(UserId(100)));

        desk.complete(manager(), TableId(3)).unwrap();
        assert!(scheduler.armed(TableId(3)).unwrap().is_none());
        let entry = &desk.history(manager(), HistoryFilter::default()).unwrap()[0];
        assert_eq!(entry.status, HistoryStatus::Completed);

        assert!(matches!(
            desk.complete(manager(), TableId(3)).unwrap_err(),
            BookingError::NotOccupied
        ));
    }

    #[test]
    fn test_seat_without_reservation() {
        let (_, _, desk) = desk();
        assert!(matches!(
            desk.seat(manager(), TableId(1)).unwrap_err(),
            BookingError::ReservationNotFound
        ));
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[test]
    fn test_list_all_is_staff_only_and_sorted() {
        let (_, _, desk) = desk();
        desk.create_at(customer(1), request(3, tomorrow_at(21, 0), 2), now())
            .unwrap();
        desk.create_at(customer(2), request(2, tomorrow_at(18, 0), 2), now())
            .unwrap();

        assert!(desk.list_all(customer(1)).is_err());
        let all = desk.list_all(manager()).unwrap();
        let numbers: Vec<u32> = all.iter().map(|s| s.table_number).collect();
        assert_eq!(numbers, vec![2, 3]);
    }

    #[test]
    fn test_history_is_scoped_for_customers() {
        let (_, _, desk) = desk();
        desk.create_at(customer(1), request(3, tomorrow_at(21, 0), 2), now())
            .unwrap();
        desk.create_at(customer(2), request(2, tomorrow_at(18, 0), 4), now())
            .unwrap();

        let filter = HistoryFilter {
            customer: Some(UserId(2)),
            ..HistoryFilter::default()
        };
        let own = desk.history(customer(1), filter).unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].customer, UserId(1));

        assert_eq!(desk.history(manager(), HistoryFilter::default()).unwrap().len(), 2);

        let summary = desk.history_summary(manager()).unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.reserved, 2);
        assert_eq!(summary.avg_party_size, Some(3.0));
        assert!(desk.history_summary(customer(1)).is_err());
    }

    // =========================================================================
    // Concurrent admission
    // =========================================================================

    /// Holds every caller at a barrier after its conflict reads, so both
    /// admissions pass before either writes.
    struct BarrierTables {
        inner: MemoryTableStore,
        gate: std::sync::Barrier,
    }

    impl TableStore for BarrierTables {
        fn find_available(
            &self,
            capacity: u32,
            table_type: Option<TableType>,
            limit: usize,
        ) -> seatline_core::Result<Vec<Table>> {
            self.inner.find_available(capacity, table_type, limit)
        }

        fn get(&self, id: TableId) -> seatline_core::Result<Option<Table>> {
            self.inner.get(id)
        }

        fn list(&self) -> seatline_core::Result<Vec<Table>> {
            self.inner.list()
        }

        fn insert(&self, table: NewTable) -> seatline_core::Result<Table> {
            self.inner.insert(table)
        }

        fn reservations_for_table(&self, id: TableId) -> seatline_core::Result<Vec<ReservationSlot>> {
            self.inner.reservations_for_table(id)
        }

        fn reservations_for_customer(
            &self,
            customer: UserId,
        ) -> seatline_core::Result<Vec<ReservationSlot>> {
            let slots = self.inner.reservations_for_customer(customer);
            self.gate.wait();
            slots
        }

        fn set_reserved(
            &self,
            id: TableId,
            customer: UserId,
            start: NaiveDateTime,
            duration_minutes: u32,
        ) -> seatline_core::Result<bool> {
            self.inner.set_reserved(id, customer, start, duration_minutes)
        }

        fn set_occupied(
            &self,
            id: TableId,
            customer: Option<UserId>,
            occupied_at: chrono::DateTime<chrono::Utc>,
            duration_minutes: u32,
        ) -> seatline_core::Result<()> {
            self.inner.set_occupied(id, customer, occupied_at, duration_minutes)
        }

        fn set_available(&self, id: TableId) -> seatline_core::Result<()> {
            self.inner.set_available(id)
        }
    }

    #[test]
    fn test_simultaneous_creates_for_one_table_admit_one() {
        let settings: Arc<StaticSettings> = Arc::new(StaticSettings::new());
        let tables = BarrierTables {
            inner: MemoryTableStore::with_tables([NewTable {
                number: 1,
                capacity: 4,
                table_type: TableType::Regular,
            }])
            .unwrap(),
            gate: std::sync::Barrier::new(2),
        };
        let stores = Stores {
            tables: Arc::new(tables),
            queue: Arc::new(MemoryQueueStore::new()),
            history: Arc::new(MemoryHistoryStore::new()),
            users: Arc::new(MemoryUserDirectory::new()),
            settings: settings.clone(),
        };
        let desk = ReservationDesk::new(stores.clone(), Arc::new(VacateScheduler::new(settings)));

        let results: Vec<Result<ReservationSlot, BookingError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = [1, 2]
                .into_iter()
                .map(|id| {
                    let desk = &desk;
                    scope.spawn(move || {
                        desk.create_at(customer(id), request(1, tomorrow_at(19, 0), 2), now())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners: Vec<UserId> = results
            .iter()
            .filter_map(|r| r.as_ref().ok().map(|slot| slot.customer))
            .collect();
        assert_eq!(winners.len(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(BookingError::TableUnavailable))));

        let table = stores.tables.get(TableId(1)).unwrap().unwrap();
        assert_eq!(table.occupant, Some(winners[0]));
        assert_eq!(desk.history(manager(), HistoryFilter::default()).unwrap().len(), 1);
    }
}
