//! Seatline core crate - shared domain types, configuration, settings and
//! the store interfaces the booking engine is written against.
//!
//! Storage backends (in-memory here, SQLite in `seatline-storage`) implement
//! the traits in [`store`]; the booking engine only ever sees the traits.

pub mod config;
pub mod error;
pub mod memory;
pub mod settings;
pub mod store;
pub mod types;

pub use config::SeatlineConfig;
pub use error::{Result, SeatlineError};
pub use settings::{BookingSettings, SettingKey, SettingLookup, StaticSettings};
pub use store::{HistoryStore, QueueStore, TableStore, UserDirectory};
pub use types::*;
