//! Named system settings with defaults.
//!
//! Settings are stored as strings keyed by name (the way a settings table
//! holds them) and parsed at the point of use. Unparsable values fall back
//! to the caller's default rather than failing the request.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::BookingConfig;

/// Read access to named configuration values.
pub trait SettingLookup: Send + Sync {
    /// Raw value for `key`, or `None` when unset or unreadable.
    fn get(&self, key: &str) -> Option<String>;

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn get_u32(&self, key: &str, default: u32) -> u32 {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(v) => v.trim() == "true",
            None => default,
        }
    }
}

impl<T: SettingLookup + ?Sized> SettingLookup for Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
}

/// The settings the booking engine reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKey {
    QueueEnabled,
    ReservationEnabled,
    MaxQueueSize,
    MaxReservationDaysAhead,
    DefaultReservationDuration,
    MinReservationDuration,
    MaxReservationDuration,
    NotificationMinutesBefore,
}

impl SettingKey {
    pub const ALL: [SettingKey; 8] = [
        SettingKey::QueueEnabled,
        SettingKey::ReservationEnabled,
        SettingKey::MaxQueueSize,
        SettingKey::MaxReservationDaysAhead,
        SettingKey::DefaultReservationDuration,
        SettingKey::MinReservationDuration,
        SettingKey::MaxReservationDuration,
        SettingKey::NotificationMinutesBefore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::QueueEnabled => "queue_enabled",
            SettingKey::ReservationEnabled => "reservation_enabled",
            SettingKey::MaxQueueSize => "max_queue_size",
            SettingKey::MaxReservationDaysAhead => "max_reservation_days_ahead",
            SettingKey::DefaultReservationDuration => "default_reservation_duration",
            SettingKey::MinReservationDuration => "min_reservation_duration",
            SettingKey::MaxReservationDuration => "max_reservation_duration",
            SettingKey::NotificationMinutesBefore => "notification_minutes_before",
        }
    }

    /// Built-in default, as a settings-table string.
    pub fn default_value(&self) -> &'static str {
        match self {
            SettingKey::QueueEnabled => "true",
            SettingKey::ReservationEnabled => "true",
            SettingKey::MaxQueueSize => "50",
            SettingKey::MaxReservationDaysAhead => "30",
            SettingKey::DefaultReservationDuration => "60",
            SettingKey::MinReservationDuration => "30",
            SettingKey::MaxReservationDuration => "180",
            SettingKey::NotificationMinutesBefore => "5",
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SettingKey {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("Unknown setting key: {}", s))
    }
}

/// Fixed key/value settings, typically built from the `[booking]` config section.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings {
    values: HashMap<String, String>,
}

impl StaticSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: SettingKey, value: impl ToString) -> Self {
        self.values.insert(key.as_str().to_string(), value.to_string());
        self
    }

    pub fn set(&mut self, key: &str, value: impl ToString) {
        self.values.insert(key.to_string(), value.to_string());
    }
}

impl From<&BookingConfig> for StaticSettings {
    fn from(config: &BookingConfig) -> Self {
        StaticSettings::new()
            .with(SettingKey::QueueEnabled, config.queue_enabled)
            .with(SettingKey::ReservationEnabled, config.reservation_enabled)
            .with(SettingKey::MaxQueueSize, config.max_queue_size)
            .with(SettingKey::MaxReservationDaysAhead, config.max_reservation_days_ahead)
            .with(SettingKey::DefaultReservationDuration, config.default_reservation_duration)
            .with(SettingKey::MinReservationDuration, config.min_reservation_duration)
            .with(SettingKey::MaxReservationDuration, config.max_reservation_duration)
            .with(SettingKey::NotificationMinutesBefore, config.notification_minutes_before)
    }
}

impl SettingLookup for StaticSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Store-backed settings layered over configured defaults.
pub struct LayeredSettings {
    primary: Arc<dyn SettingLookup>,
    fallback: StaticSettings,
}

impl LayeredSettings {
    pub fn new(primary: Arc<dyn SettingLookup>, fallback: StaticSettings) -> Self {
        Self { primary, fallback }
    }
}

impl SettingLookup for LayeredSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.primary.get(key).or_else(|| self.fallback.get(key))
    }
}

/// Typed snapshot of the booking settings, read once per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSettings {
    pub queue_enabled: bool,
    pub reservation_enabled: bool,
    pub max_queue_size: u32,
    pub max_reservation_days_ahead: u32,
    pub default_reservation_duration: u32,
    pub min_reservation_duration: u32,
    pub max_reservation_duration: u32,
    pub notification_minutes_before: u32,
}

impl BookingSettings {
    pub fn read(lookup: &dyn SettingLookup) -> Self {
        let num = |key: SettingKey| {
            let default = key.default_value().parse().unwrap_or_default();
            lookup.get_u32(key.as_str(), default)
        };
        let flag = |key: SettingKey| lookup.get_bool(key.as_str(), key.default_value() == "true");

        Self {
            queue_enabled: flag(SettingKey::QueueEnabled),
            reservation_enabled: flag(SettingKey::ReservationEnabled),
            max_queue_size: num(SettingKey::MaxQueueSize),
            max_reservation_days_ahead: num(SettingKey::MaxReservationDaysAhead),
            default_reservation_duration: num(SettingKey::DefaultReservationDuration),
            min_reservation_duration: num(SettingKey::MinReservationDuration),
            max_reservation_duration: num(SettingKey::MaxReservationDuration),
            notification_minutes_before: num(SettingKey::NotificationMinutesBefore),
        }
    }
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self::read(&StaticSettings::new())
    }
}
