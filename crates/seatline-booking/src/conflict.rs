//! Reservation time-window conflict detection.

use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};

use seatline_core::error::Result;
use seatline_core::settings::{BookingSettings, SettingLookup};
use seatline_core::store::TableStore;
use seatline_core::types::{ReservationSlot, TableId, UserId};

use crate::error::BookingError;

/// Half-open interval overlap: `[a_start, a_end)` and `[b_start, b_end)`.
/// Windows that only touch at an endpoint do not overlap.
pub fn windows_overlap(
    a_start: NaiveDateTime,
    a_end: NaiveDateTime,
    b_start: NaiveDateTime,
    b_end: NaiveDateTime,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// The existing reservation a proposed window collides with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// Another reservation on the same table.
    Table(ReservationSlot),
    /// Another reservation held by the same customer.
    Customer(ReservationSlot),
}

impl From<Conflict> for BookingError {
    fn from(conflict: Conflict) -> Self {
        match conflict {
            Conflict::Table(_) => BookingError::TableConflict,
            Conflict::Customer(_) => BookingError::CustomerConflict,
        }
    }
}

pub struct ConflictResolver {
    tables: Arc<dyn TableStore>,
    settings: Arc<dyn SettingLookup>,
}

impl ConflictResolver {
    pub fn new(tables: Arc<dyn TableStore>, settings: Arc<dyn SettingLookup>) -> Self {
        Self { tables, settings }
    }

    /// First reservation overlapping `[start, start + duration)`, checking the
    /// table's reservations before the customer's.
    pub fn find_conflict(
        &self,
        table_id: TableId,
        customer: UserId,
        start: NaiveDateTime,
        duration_minutes: u32,
    ) -> Result<Option<Conflict>> {
        let default_duration =
            BookingSettings::read(self.settings.as_ref()).default_reservation_duration;
        let end = start + Duration::minutes(i64::from(duration_minutes));
        let overlaps =
            |slot: &ReservationSlot| windows_overlap(start, end, slot.start, slot.end(default_duration));

        if let Some(slot) = self
            .tables
            .reservations_for_table(table_id)?
            .into_iter()
            .find(|s| overlaps(s))
        {
            return Ok(Some(Conflict::Table(slot)));
        }

        Ok(self
            .tables
            .reservations_for_customer(customer)?
            .into_iter()
            .find(|s| overlaps(s))
            .map(Conflict::Customer))
    }

    pub fn has_conflict(
        &self,
        table_id: TableId,
        customer: UserId,
        start: NaiveDateTime,
        duration_minutes: u32,
    ) -> Result<bool> {
        Ok(self
            .find_conflict(table_id, customer, start, duration_minutes)?
            .is_some())
    }
}
