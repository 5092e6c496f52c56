//! CLI argument definitions for the Seatline service.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::{Path, PathBuf};

/// Seatline - restaurant booking assistant and reservation service.
#[derive(Parser, Debug, Default)]
#[command(name = "seatline", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Data directory for the SQLite database and API token.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > SEATLINE_CONFIG env var > ~/.seatline/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("SEATLINE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > SEATLINE_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("SEATLINE_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        config_port
    }

    /// Resolve the data directory, expanding a leading `~`.
    ///
    /// Priority: --data-dir flag > config file value.
    pub fn resolve_data_dir(&self, config_dir: &str) -> PathBuf {
        match self.data_dir {
            Some(ref dir) => dir.clone(),
            None => expand_home(config_dir),
        }
    }

    /// Resolve the log filter directive.
    ///
    /// Priority: --log-level flag > config file value. `RUST_LOG` is applied
    /// on top of this when the subscriber is built.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Expand `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match std::env::var("HOME") {
            Ok(home) => Path::new(&home).join(rest),
            Err(_) => PathBuf::from(rest),
        },
        None => PathBuf::from(path),
    }
}

/// Default config file path.
fn default_config_path() -> PathBuf {
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".seatline").join("config.toml"),
        Err(_) => PathBuf::from("config.toml"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse_from([
            "seatline",
            "--config",
            "/tmp/seatline.toml",
            "-p",
            "4000",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/seatline.toml"));
        assert_eq!(args.resolve_port(3040), 4000);
        assert_eq!(args.resolve_log_level("info"), "debug");
    }

    #[test]
    fn test_config_values_used_without_flags() {
        let args = CliArgs::default();
        assert_eq!(args.resolve_log_level("warn"), "warn");
        assert_eq!(
            args.resolve_data_dir("/var/lib/seatline"),
            PathBuf::from("/var/lib/seatline")
        );
    }

    #[test]
    fn test_data_dir_flag_wins() {
        let args = CliArgs::parse_from(["seatline", "-d", "/srv/seatline"]);
        assert_eq!(
            args.resolve_data_dir("~/.seatline/data"),
            PathBuf::from("/srv/seatline")
        );
    }

    #[test]
    fn test_expand_home() {
        std::env::set_var("HOME", "/home/ada");
        assert_eq!(
            expand_home("~/.seatline/data"),
            PathBuf::from("/home/ada/.seatline/data")
        );
        assert_eq!(expand_home("relative/data"), PathBuf::from("relative/data"));
    }
}
