//! Walk-in wait queue.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use seatline_core::types::{Identity, QueueEntry, QueueStatus, TableId, TableStatus, TableType, UserId};

use crate::error::BookingError;
use crate::reservations::check_party_size;
use crate::scheduler::VacateScheduler;
use crate::tables::{occupy, require_staff, Seating};
use crate::Stores;

/// Minutes of estimated wait per position in the queue.
pub const MINUTES_PER_POSITION: u32 = 15;

/// A waiting party's place in line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStanding {
    pub entry: QueueEntry,
    pub position: u32,
    pub total_waiting: u32,
    pub estimated_wait_minutes: u32,
}

pub struct WaitQueue {
    stores: Stores,
    scheduler: Arc<VacateScheduler>,
}

impl WaitQueue {
    pub fn new(stores: Stores, scheduler: Arc<VacateScheduler>) -> Self {
        Self { stores, scheduler }
    }

    /// Adds the caller to the end of the queue.
    pub fn join(
        &self,
        caller: Identity,
        party_size: u32,
        table_type: TableType,
    ) -> Result<QueueStanding, BookingError> {
        let settings = self.stores.booking_settings();
        if !settings.queue_enabled {
            return Err(BookingError::QueueDisabled);
        }
        check_party_size(party_size)?;
        if self.stores.queue.find_waiting(caller.user_id)?.is_some() {
            return Err(BookingError::AlreadyQueued);
        }
        let waiting = self.stores.queue.waiting()?.len();
        if waiting >= settings.max_queue_size as usize {
            return Err(BookingError::QueueFull(settings.max_queue_size));
        }

        let entry = self
            .stores
            .queue
            .enqueue(caller.user_id, party_size, table_type)?;
        info!(
            user_id = %caller.user_id,
            party_size,
            position = entry.position,
            "Joined queue"
        );
        self.standing(entry)
    }

    /// Removes the caller from the queue.
    pub fn leave(&self, caller: Identity) -> Result<QueueEntry, BookingError> {
        let entry = self
            .stores
            .queue
            .close(caller.user_id, QueueStatus::Cancelled)?
            .ok_or(BookingError::NotQueued)?;
        info!(user_id = %caller.user_id, "Left queue");
        Ok(entry)
    }

    pub fn position(&self, customer: UserId) -> Result<Option<QueueStanding>, BookingError> {
        match self.stores.queue.find_waiting(customer)? {
            Some(entry) => self.standing(entry).map(Some),
            None => Ok(None),
        }
    }

    /// Waiting parties in position order.
    pub fn list(&self) -> Result<Vec<QueueEntry>, BookingError> {
        Ok(self.stores.queue.waiting()?)
    }

    /// Seats a waiting party at an available table. Staff only.
    pub fn seat_from_queue(
        &self,
        caller: Identity,
        customer: UserId,
        table_id: TableId,
    ) -> Result<Seating, BookingError> {
        require_staff(caller, "seat customers")?;
        let entry = self
            .stores
            .queue
            .find_waiting(customer)?
            .ok_or(BookingError::NotQueued)?;
        let table = self
            .stores
            .tables
            .get(table_id)?
            .filter(|t| t.enabled && t.status == TableStatus::Available)
            .ok_or(BookingError::TableUnavailable)?;
        if table.capacity < entry.party_size {
            return Err(BookingError::InsufficientCapacity {
                capacity: table.capacity,
                party_size: entry.party_size,
            });
        }

        let duration = self.stores.booking_settings().default_reservation_duration;
        let seating = occupy(&self.stores, &self.scheduler, &table, Some(customer), duration)?;
        self.stores.queue.close(customer, QueueStatus::Seated)?;

        info!(
            user_id = %customer,
            table_id = %table_id,
            seated_by = %caller.user_id,
            "Seated from queue"
        );
        Ok(seating)
    }

    fn standing(&self, entry: QueueEntry) -> Result<QueueStanding, BookingError> {
        let total_waiting = self.stores.queue.waiting()?.len() as u32;
        Ok(QueueStanding {
            position: entry.position,
            total_waiting,
            estimated_wait_minutes: entry.position * MINUTES_PER_POSITION,
            entry,
        })
    }
}
