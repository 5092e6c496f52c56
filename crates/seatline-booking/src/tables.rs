//! Table status transitions and the occupy/release paths shared by the
//! reservation desk, the wait queue and manual status updates.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use seatline_core::types::{HistoryStatus, Identity, Table, TableId, TableStatus, UserId};

use crate::error::BookingError;
use crate::scheduler::{VacateRequest, VacateScheduler};
use crate::Stores;

/// Checks a table status change against the allowed transitions.
///
/// ```text
/// Available -> Occupied | Reserved
/// Occupied  -> Available
/// Reserved  -> Available | Occupied
/// ```
pub fn validate_transition(from: TableStatus, to: TableStatus) -> Result<(), BookingError> {
    use TableStatus::*;
    let valid = matches!(
        (from, to),
        (Available, Occupied)
            | (Available, Reserved)
            | (Occupied, Available)
            | (Reserved, Available)
            | (Reserved, Occupied)
    );
    if valid {
        Ok(())
    } else {
        Err(BookingError::InvalidTransition(from, to))
    }
}

pub(crate) fn require_staff(caller: Identity, action: &str) -> Result<(), BookingError> {
    if caller.role.is_staff() {
        Ok(())
    } else {
        Err(BookingError::NotAuthorized(action.to_string()))
    }
}

/// Result of seating a party at a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seating {
    pub table_id: TableId,
    pub table_number: u32,
    pub customer: Option<UserId>,
    pub duration_minutes: u32,
    pub expected_vacate: DateTime<Utc>,
}

/// Marks the table occupied and arms its vacate alert.
///
/// The table write is authoritative; a failure to arm the alert is logged
/// and not rolled back.
pub(crate) fn occupy(
    stores: &Stores,
    scheduler: &VacateScheduler,
    table: &Table,
    customer: Option<UserId>,
    duration_minutes: u32,
) -> Result<Seating, BookingError> {
    let now = Utc::now();
    stores
        .tables
        .set_occupied(table.id, customer, now, duration_minutes)?;

    let customer_name = match customer {
        Some(id) => stores.users.name_or_fallback(id),
        None => "Walk-in".to_string(),
    };
    let request = VacateRequest {
        table_id: table.id,
        table_number: table.number,
        customer,
        customer_name,
        duration_minutes,
    };
    if let Err(e) = scheduler.schedule(request) {
        warn!(table_id = %table.id, "Table occupied but vacate alert not armed: {}", e);
    }

    Ok(Seating {
        table_id: table.id,
        table_number: table.number,
        customer,
        duration_minutes,
        expected_vacate: now + Duration::minutes(i64::from(duration_minutes)),
    })
}

/// Frees the table and disarms any pending vacate alert.
pub(crate) fn release(
    stores: &Stores,
    scheduler: &VacateScheduler,
    table_id: TableId,
) -> Result<(), BookingError> {
    stores.tables.set_available(table_id)?;
    if let Err(e) = scheduler.cancel(table_id) {
        warn!(table_id = %table_id, "Table freed but vacate alert not cancelled: {}", e);
    }
    Ok(())
}

/// Moves the newest matching history record; failures are logged only.
pub(crate) fn settle_history(
    stores: &Stores,
    table_id: TableId,
    customer: UserId,
    from: HistoryStatus,
    to: HistoryStatus,
    actor: Option<UserId>,
) {
    match stores
        .history
        .transition_latest(table_id, customer, from, to, actor)
    {
        Ok(true) => {}
        Ok(false) => debug!(table_id = %table_id, %from, %to, "No history record to update"),
        Err(e) => warn!(table_id = %table_id, %from, %to, "History update failed: {}", e),
    }
}

/// A manual status change requested by staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: TableStatus,
    #[serde(default)]
    pub customer: Option<UserId>,
    #[serde(default)]
    pub reservation_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

impl StatusChange {
    pub fn to(status: TableStatus) -> Self {
        Self {
            status,
            customer: None,
            reservation_time: None,
            duration_minutes: None,
        }
    }
}

/// Staff view of the floor: listing and manual status changes.
pub struct FloorService {
    stores: Stores,
    scheduler: Arc<VacateScheduler>,
}

impl FloorService {
    pub fn new(stores: Stores, scheduler: Arc<VacateScheduler>) -> Self {
        Self { stores, scheduler }
    }

    pub fn list(&self) -> Result<Vec<Table>, BookingError> {
        Ok(self.stores.tables.list()?)
    }

    pub fn get(&self, id: TableId) -> Result<Table, BookingError> {
        self.stores
            .tables
            .get(id)?
            .ok_or(BookingError::TableNotFound(id))
    }

    /// Applies a manual status change. Setting the current status again is a
    /// no-op.
    pub fn update_status(
        &self,
        caller: Identity,
        id: TableId,
        change: StatusChange,
    ) -> Result<Table, BookingError> {
        require_staff(caller, "change table status")?;
        let table = self.get(id)?;
        if table.status == change.status {
            return Ok(table);
        }
        validate_transition(table.status, change.status)?;
        let default_duration = self.stores.booking_settings().default_reservation_duration;

        match change.status {
            TableStatus::Available => {
                release(&self.stores, &self.scheduler, id)?;
                if let Some(occupant) = table.occupant {
                    let from = match table.status {
                        TableStatus::Reserved => HistoryStatus::Reserved,
                        _ => HistoryStatus::Occupied,
                    };
                    settle_history(&self.stores, id, occupant, from, HistoryStatus::Completed, None);
                }
            }
            TableStatus::Occupied => {
                let customer = change.customer.or(table.occupant);
                let duration = change
                    .duration_minutes
                    .or(table.duration_minutes)
                    .unwrap_or(default_duration);
                occupy(&self.stores, &self.scheduler, &table, customer, duration)?;
                if let (TableStatus::Reserved, Some(occupant)) = (table.status, table.occupant) {
                    settle_history(
                        &self.stores,
                        id,
                        occupant,
                        HistoryStatus::Reserved,
                        HistoryStatus::Occupied,
                        Some(caller.user_id),
                    );
                }
            }
            TableStatus::Reserved => {
                let customer = change.customer.ok_or(BookingError::Missing("customer"))?;
                let start = change
                    .reservation_time
                    .ok_or(BookingError::Missing("reservation_time"))?;
                let duration = change.duration_minutes.unwrap_or(default_duration);
                if !self.stores.tables.set_reserved(id, customer, start, duration)? {
                    return Err(BookingError::TableUnavailable);
                }
            }
        }

        info!(
            table_id = %id,
            from = %table.status,
            to = %change.status,
            user_id = %caller.user_id,
            "Table status updated"
        );
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use seatline_core::settings::StaticSettings;
    use seatline_core::types::{HistoryFilter, NewHistoryEntry, NewTable, Role, TableType};

    fn setup() -> (Stores, Arc<VacateScheduler>, FloorService) {
        let settings = Arc::new(StaticSettings::new());
        let stores = Stores::in_memory(
            [
                NewTable { number: 1, capacity: 2, table_type: TableType::Regular },
                NewTable { number: 2, capacity: 4, table_type: TableType::Vip },
            ],
            settings.clone(),
        )
        .unwrap();
        let scheduler = Arc::new(VacateScheduler::new(settings));
        let floor = FloorService::new(stores.clone(), scheduler.clone());
        (stores, scheduler, floor)
    }

    fn manager() -> Identity {
        Identity::new(UserId(100), Role::Manager)
    }

    fn evening() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 1, 5)
            .unwrap()
            .and_hms_opt(19, 0, 0)
            .unwrap()
    }

    // =========================================================================
    // Transition table
    // =========================================================================

    #[test]
    fn test_valid_transitions() {
        use TableStatus::*;
        assert!(validate_transition(Available, Occupied).is_ok());
        assert!(validate_transition(Available, Reserved).is_ok());
        assert!(validate_transition(Occupied, Available).is_ok());
        assert!(validate_transition(Reserved, Available).is_ok());
        assert!(validate_transition(Reserved, Occupied).is_ok());
    }

    #[test]
    fn test_invalid_transitions() {
        use TableStatus::*;
        let err = validate_transition(Occupied, Reserved).unwrap_err();
        assert!(matches!(err, BookingError::InvalidTransition(Occupied, Reserved)));
        assert!(validate_transition(Available, Available).is_err());
    }

    // =========================================================================
    // Manual status updates
    // =========================================================================

    #[test]
    fn test_customer_cannot_change_status() {
        let (_, _, floor) = setup();
        let caller = Identity::new(UserId(1), Role::Customer);
        let err = floor
            .update_status(caller, TableId(1), StatusChange::to(TableStatus::Occupied))
            .unwrap_err();
        assert!(matches!(err, BookingError::NotAuthorized(_)));
    }

    #[test]
    fn test_occupy_arms_vacate_alert() {
        let (_, scheduler, floor) = setup();
        let table = floor
            .update_status(manager(), TableId(1), StatusChange::to(TableStatus::Occupied))
            .unwrap();
        assert_eq!(table.status, TableStatus::Occupied);
        assert_eq!(table.duration_minutes, Some(60));

        let armed = scheduler.armed(TableId(1)).unwrap().unwrap();
        assert_eq!(armed.customer_name, "Walk-in");
        assert_eq!(armed.expected_vacate - armed.notify_at, Duration::minutes(5));
    }

    #[test]
    fn test_free_cancels_alert_and_completes_history() {
        let (stores, scheduler, floor) = setup();
        stores
            .tables
            .set_reserved(TableId(2), UserId(7), evening(), 90)
            .unwrap();
        stores
            .history
            .record(NewHistoryEntry {
                customer: UserId(7),
                table_id: TableId(2),
                table_number: 2,
                table_type: TableType::Vip,
                party_size: 3,
                reservation_time: evening(),
                duration_minutes: 90,
                created_by: Identity::new(UserId(7), Role::Customer),
            })
            .unwrap();

        let seated = floor
            .update_status(manager(), TableId(2), StatusChange::to(TableStatus::Occupied))
            .unwrap();
        assert_eq!(seated.occupant, Some(UserId(7)));
        assert_eq!(seated.duration_minutes, Some(90));
        assert!(scheduler.armed(TableId(2)).unwrap().is_some());

        let freed = floor
            .update_status(manager(), TableId(2), StatusChange::to(TableStatus::Available))
            .unwrap();
        assert_eq!(freed.status, TableStatus::Available);
        assert!(freed.occupant.is_none());
        assert!(scheduler.armed(TableId(2)).unwrap().is_none());

        let history = stores.history.list(&HistoryFilter::default()).unwrap();
        assert_eq!(history[0].status, HistoryStatus::Completed);
        assert_eq!(history[0].seated_by, Some(UserId(100)));
    }

    #[test]
    fn test_same_status_is_noop() {
        let (_, scheduler, floor) = setup();
        let table = floor
            .update_status(manager(), TableId(1), StatusChange::to(TableStatus::Available))
            .unwrap();
        assert_eq!(table.status, TableStatus::Available);
        assert!(scheduler.armed(TableId(1)).unwrap().is_none());
    }

    #[test]
    fn test_invalid_manual_transition() {
        let (_, _, floor) = setup();
        floor
            .update_status(manager(), TableId(1), StatusChange::to(TableStatus::Occupied))
            .unwrap();
        let err = floor
            .update_status(manager(), TableId(1), StatusChange::to(TableStatus::Reserved))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid status transition from occupied to reserved");
    }

    #[test]
    fn test_manual_reserve_needs_customer_and_time() {
        let (_, _, floor) = setup();
        let err = floor
            .update_status(manager(), TableId(1), StatusChange::to(TableStatus::Reserved))
            .unwrap_err();
        assert!(matches!(err, BookingError::Missing("customer")));

        let change = StatusChange {
            customer: Some(UserId(3)),
            reservation_time: Some(evening()),
            ..StatusChange::to(TableStatus::Reserved)
        };
        let table = floor.update_status(manager(), TableId(1), change).unwrap();
        assert_eq!(table.status, TableStatus::Reserved);
        assert_eq!(table.reservation_time, Some(evening()));
    }

    #[test]
    fn test_unknown_table() {
        let (_, _, floor) = setup();
        let err = floor
            .update_status(manager(), TableId(42), StatusChange::to(TableStatus::Occupied))
            .unwrap_err();
        assert!(matches!(err, BookingError::TableNotFound(TableId(42))));
    }
}
