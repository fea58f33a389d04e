use super::types::DistanceRange;
use crate::error_handling::types::ConfigError;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration structure that defines all runtime parameters.
///
/// The configuration is read from a TOML file whose path is given on the
/// command line. Only the bind address and port are mandatory:
///
/// ```toml
/// bind_address = "0.0.0.0"
/// bind_port = "8080"
/// database_path = "/var/lib/gestured/gestured.sqlite3"
/// ack_delay_ms = 2000
/// min_distance = 300
/// max_distance = 350
/// ```
///
/// # Fields Overview
///
/// - `bind_address`: IP address the WebSocket server listens on
/// - `bind_port`: port the server listens on, kept as text and validated as a
///   non-negative integer
/// - `database_path`: SQLite file backing the ledger
/// - `ack_delay_ms`: pause between processing an acknowledgment and sending
///   the next instruction, the time the client needs to perform the gesture
/// - `min_distance` / `max_distance`: inclusive bounds of the swipe distance
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub bind_address: String,

    pub bind_port: String,

    #[serde(default = "Config::default_database_path")]
    pub database_path: PathBuf,

    #[serde(default = "Config::default_ack_delay_ms")]
    pub ack_delay_ms: u64,

    #[serde(default = "Config::default_min_distance")]
    pub min_distance: i64,

    #[serde(default = "Config::default_max_distance")]
    pub max_distance: i64,
}

impl Config {
    const DEFAULT_DB_FILE: &'static str = "gestured.sqlite3";
    const DEFAULT_ACK_DELAY_MS: u64 = 2000;

    fn default_database_path() -> PathBuf {
        PathBuf::from(Self::DEFAULT_DB_FILE)
    }

    fn default_ack_delay_ms() -> u64 {
        Self::DEFAULT_ACK_DELAY_MS
    }

    fn default_min_distance() -> i64 {
        DistanceRange::DEFAULT_MIN
    }

    fn default_max_distance() -> i64 {
        DistanceRange::DEFAULT_MAX
    }

    /// Builds a configuration for the given address and port with every other
    /// field at its default value. The result is validated.
    pub fn new(bind_address: &str, bind_port: &str) -> Result<Self, ConfigError> {
        let config = Self {
            bind_address: bind_address.to_string(),
            bind_port: bind_port.to_string(),
            database_path: Self::default_database_path(),
            ack_delay_ms: Self::DEFAULT_ACK_DELAY_MS,
            min_distance: DistanceRange::DEFAULT_MIN,
            max_distance: DistanceRange::DEFAULT_MAX,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(raw).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field that has constraints beyond its type.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_bind_address(&self.bind_address)?;
        parse_bind_port(&self.bind_port)?;
        if self.min_distance > self.max_distance {
            return Err(ConfigError::NotInRange(format!(
                "min_distance {} is greater than max_distance {}",
                self.min_distance, self.max_distance
            )));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = parse_bind_address(&self.bind_address)?;
        let port = parse_bind_port(&self.bind_port)?;
        Ok(SocketAddr::new(ip, port))
    }

    pub fn distance_range(&self) -> DistanceRange {
        DistanceRange {
            min: self.min_distance,
            max: self.max_distance,
        }
    }

    pub fn ack_delay(&self) -> Duration {
        Duration::from_millis(self.ack_delay_ms)
    }
}

pub fn parse_bind_address(raw: &str) -> Result<IpAddr, ConfigError> {
    raw.trim()
        .parse::<IpAddr>()
        .map_err(|_| ConfigError::BadIPFormatting(format!("'{}' is not an IP address", raw)))
}

pub fn parse_bind_port(raw: &str) -> Result<u16, ConfigError> {
    let value: i64 = raw.trim().parse().map_err(|_| {
        ConfigError::BadPortsRange(format!("'{}' is not a non-negative integer", raw))
    })?;
    u16::try_from(value)
        .map_err(|_| ConfigError::BadPortsRange(format!("{} is outside 0..=65535", value)))
}
