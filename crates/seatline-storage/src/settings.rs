//! Runtime booking settings stored in `system_settings`.

use std::sync::Arc;

use tracing::warn;

use seatline_core::error::Result;
use seatline_core::settings::{SettingKey, SettingLookup};

use crate::db::{sql_err, Database};

/// Settings table lookup. Read failures are logged and treated as unset so
/// the configured defaults apply.
pub struct SqliteSettings {
    db: Arc<Database>,
}

impl SqliteSettings {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a value, replacing any previous one.
    pub fn set(&self, key: SettingKey, value: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO system_settings (setting_key, setting_value, updated_at)
                 VALUES (?1, ?2, strftime('%s', 'now'))
                 ON CONFLICT(setting_key) DO UPDATE
                 SET setting_value = excluded.setting_value, updated_at = excluded.updated_at",
                rusqlite::params![key.as_str(), value],
            )
            .map_err(sql_err)?;
            Ok(())
        })
    }

    /// Every stored (key, value) pair, ordered by key.
    pub fn all(&self) -> Result<Vec<(String, String)>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT setting_key, setting_value FROM system_settings ORDER BY setting_key")
                .map_err(sql_err)?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
                .map_err(sql_err)?;

            let mut pairs = Vec::new();
            for row in rows {
                pairs.push(row.map_err(sql_err)?);
            }
            Ok(pairs)
        })
    }

    fn lookup(&self, key: &str) -> Result<Option<String>> {
        use rusqlite::OptionalExtension;

        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT setting_value FROM system_settings WHERE setting_key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(sql_err)
        })
    }
}

impl SettingLookup for SqliteSettings {
    fn get(&self, key: &str) -> Option<String> {
        match self.lookup(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "setting lookup failed, using default");
                None
            }
        }
    }
}
