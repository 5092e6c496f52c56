//! Error types for the booking engine.
//!
//! Display strings double as the rejection messages shown to the caller.

use seatline_core::error::SeatlineError;
use seatline_core::types::{TableId, TableStatus};

/// Errors from reservation, queue and table write paths.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Reservation system is currently disabled")]
    ReservationsDisabled,
    #[error("Queue system is currently disabled")]
    QueueDisabled,
    #[error("Minimum reservation duration is {0} minutes")]
    DurationTooShort(u32),
    #[error("Maximum reservation duration is {0} minutes")]
    DurationTooLong(u32),
    #[error("Table not available for reservation")]
    TableUnavailable,
    #[error("Table capacity ({capacity}) is insufficient for party size ({party_size})")]
    InsufficientCapacity { capacity: u32, party_size: u32 },
    #[error("Reservation time must be in the future")]
    NotInFuture,
    #[error("Reservations can only be made up to {0} days in advance")]
    TooFarAhead(u32),
    #[error("This table has a conflicting reservation at that time")]
    TableConflict,
    #[error("You already have a reservation at this time")]
    CustomerConflict,
    #[error("Party size must be between 1 and 20 people")]
    PartySize(u32),
    #[error("Queue is full (max {0} parties)")]
    QueueFull(u32),
    #[error("You are already in the queue")]
    AlreadyQueued,
    #[error("You are not in the queue")]
    NotQueued,
    #[error("Table not found: {0}")]
    TableNotFound(TableId),
    #[error("Reservation not found")]
    ReservationNotFound,
    #[error("Occupied table not found")]
    NotOccupied,
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("Not authorized to {0}")]
    NotAuthorized(String),
    #[error("Invalid status transition from {0} to {1}")]
    InvalidTransition(TableStatus, TableStatus),
    #[error("Storage error: {0}")]
    Storage(#[from] SeatlineError),
}

impl BookingError {
    /// Whether this is a domain-rule rejection rather than a store failure.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, BookingError::Storage(_))
    }
}
