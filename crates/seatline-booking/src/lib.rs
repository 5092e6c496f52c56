//! Booking workflow engine for Seatline.
//!
//! Classifies chat messages, walks each user through the reservation
//! dialogue, admits reservations against conflicts and limits, and arms
//! manager alerts ahead of tables freeing up.

use std::sync::Arc;

use seatline_core::error::Result;
use seatline_core::memory::{
    MemoryHistoryStore, MemoryQueueStore, MemoryTableStore, MemoryUserDirectory,
};
use seatline_core::settings::{BookingSettings, SettingLookup};
use seatline_core::store::{HistoryStore, QueueStore, TableStore, UserDirectory};
use seatline_core::types::NewTable;

pub mod conflict;
pub mod conversation;
pub mod error;
pub mod hours;
pub mod intent;
pub mod queue;
pub mod reservations;
pub mod scheduler;
pub mod session;
pub mod slots;
pub mod tables;

pub use conflict::{windows_overlap, Conflict, ConflictResolver};
pub use conversation::{ConversationEngine, Reply};
pub use error::BookingError;
pub use intent::{allowed, Classification, Classifier, Intent, KeywordClassifier};
pub use queue::{QueueStanding, WaitQueue};
pub use reservations::{HistorySummary, NewReservation, ReservationDesk};
pub use scheduler::{ManagerNotification, VacateAlert, VacateRequest, VacateScheduler};
pub use session::{InMemorySessionStore, Session, SessionStore, Step};
pub use tables::{validate_transition, FloorService, Seating, StatusChange};

/// The external stores the engine reads and writes.
#[derive(Clone)]
pub struct Stores {
    pub tables: Arc<dyn TableStore>,
    pub queue: Arc<dyn QueueStore>,
    pub history: Arc<dyn HistoryStore>,
    pub users: Arc<dyn UserDirectory>,
    pub settings: Arc<dyn SettingLookup>,
}

impl Stores {
    /// In-memory stores seeded with `tables`.
    pub fn in_memory(
        tables: impl IntoIterator<Item = NewTable>,
        settings: Arc<dyn SettingLookup>,
    ) -> Result<Self> {
        Ok(Self {
            tables: Arc::new(MemoryTableStore::with_tables(tables)?),
            queue: Arc::new(MemoryQueueStore::new()),
            history: Arc::new(MemoryHistoryStore::new()),
            users: Arc::new(MemoryUserDirectory::new()),
            settings,
        })
    }

    /// Current booking settings snapshot.
    pub fn booking_settings(&self) -> BookingSettings {
        BookingSettings::read(self.settings.as_ref())
    }
}
