//! Seatline Storage crate - SQLite persistence for tables, the wait queue,
//! reservation history, users and runtime settings.
//!
//! Provides a WAL-mode SQLite database with migrations and implementations
//! of the `seatline-core` store traits on top of it.

pub mod db;
pub mod migrations;
pub mod repository;
pub mod settings;

pub use db::Database;
pub use repository::{
    seed_if_empty, SqliteHistoryStore, SqliteQueueStore, SqliteTableStore, SqliteUserDirectory,
};
pub use settings::SqliteSettings;
