use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SeatlineError};
use crate::types::{NewTable, TableType};

/// Top-level configuration for the Seatline service.
///
/// Loaded from `~/.seatline/config.toml` by default. Each section corresponds
/// to a bounded context or cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeatlineConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl SeatlineConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SeatlineConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SeatlineError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database and API token.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// HTTP port (bound on 127.0.0.1).
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.seatline/data".to_string(),
            log_level: "info".to_string(),
            port: 3040,
        }
    }
}

/// Which store implementation backs tables, queue and history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database file name, relative to `general.data_dir`.
    pub database_file: String,
    /// Tables inserted when the store holds none.
    pub seed_tables: Vec<NewTable>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            database_file: "seatline.db".to_string(),
            seed_tables: vec![
                NewTable { number: 1, capacity: 2, table_type: TableType::Regular },
                NewTable { number: 2, capacity: 2, table_type: TableType::Regular },
                NewTable { number: 3, capacity: 4, table_type: TableType::Regular },
                NewTable { number: 4, capacity: 4, table_type: TableType::Regular },
                NewTable { number: 5, capacity: 6, table_type: TableType::Regular },
                NewTable { number: 6, capacity: 8, table_type: TableType::Vip },
            ],
        }
    }
}

/// Conversation session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Inactivity window after which a session is discarded.
    pub ttl_secs: u64,
    /// Interval of the stale-session reaper. 0 disables it (lazy eviction only).
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            sweep_interval_secs: 0,
        }
    }
}

/// Default system settings, used when the settings store has no row for a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    pub queue_enabled: bool,
    pub reservation_enabled: bool,
    pub max_queue_size: u32,
    pub max_reservation_days_ahead: u32,
    pub default_reservation_duration: u32,
    pub min_reservation_duration: u32,
    pub max_reservation_duration: u32,
    pub notification_minutes_before: u32,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            queue_enabled: true,
            reservation_enabled: true,
            max_queue_size: 50,
            max_reservation_days_ahead: 30,
            default_reservation_duration: 60,
            min_reservation_duration: 30,
            max_reservation_duration: 180,
            notification_minutes_before: 5,
        }
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bearer token file, relative to `general.data_dir`.
    pub token_file: String,
    /// Extra allowed CORS origins besides localhost on the configured port.
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            token_file: "api_token".to_string(),
            cors_origins: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = SeatlineConfig::default();
        assert_eq!(config.general.data_dir, "~/.seatline/data");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.port, 3040);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.session.ttl_secs, 300);
        assert_eq!(config.session.sweep_interval_secs, 0);
        assert_eq!(config.booking.default_reservation_duration, 60);
        assert_eq!(config.booking.notification_minutes_before, 5);
        assert_eq!(config.storage.seed_tables.len(), 6);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/srv/seatline"
log_level = "debug"
port = 8080

[storage]
backend = "memory"
seed_tables = [
    { number = 10, capacity = 12, type = "vip" },
]

[session]
ttl_secs = 120
sweep_interval_secs = 60

[booking]
reservation_enabled = false
notification_minutes_before = 10
"#;
        let file = create_temp_config(content);
        let config = SeatlineConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/srv/seatline");
        assert_eq!(config.general.port, 8080);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.seed_tables.len(), 1);
        assert_eq!(config.storage.seed_tables[0].table_type, TableType::Vip);
        assert_eq!(config.session.sweep_interval_secs, 60);
        assert!(!config.booking.reservation_enabled);
        assert_eq!(config.booking.notification_minutes_before, 10);
        // Unspecified keys keep their defaults.
        assert_eq!(config.booking.max_queue_size, 50);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[general]\nlog_level = \"warn\"\n");
        let config = SeatlineConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.general.port, 3040);
        assert_eq!(config.booking.max_reservation_duration, 180);
    }

    #[test]
    fn test_load_invalid_config_is_error() {
        let file = create_temp_config("[general\nport = ");
        assert!(matches!(
            SeatlineConfig::load(file.path()),
            Err(SeatlineError::Config(_))
        ));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = SeatlineConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.data_dir, "~/.seatline/data");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = SeatlineConfig::default();
        config.booking.max_queue_size = 12;
        config.save(&path).unwrap();

        let reloaded = SeatlineConfig::load(&path).unwrap();
        assert_eq!(reloaded.booking, config.booking);
        assert_eq!(reloaded.storage.seed_tables, config.storage.seed_tables);
    }
}
