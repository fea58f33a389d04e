use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadIPFormatting(String),
    BadPortsRange(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadIPFormatting(e) => write!(f, "IP formatting error: {}", e),
            ConfigError::BadPortsRange(e) => write!(f, "Port range error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Failures of the durable store.
///
/// Every variant describes an I/O level failure the caller may retry; the
/// ledger itself never retries.
#[derive(Debug)]
pub enum StorageError {
    ConnectionFailed(String),
    WriteFailed(String),
    ReadFailed(String),
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        true
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(e) => write!(f, "Storage connection failed: {}", e),
            StorageError::WriteFailed(e) => write!(f, "Storage write failed: {}", e),
            StorageError::ReadFailed(e) => write!(f, "Storage read failed: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug)]
pub enum NetworkError {
    BindFail(String),
    InvalidAddress(String),
    AlreadyRunning,
    NotRunning,
}

/// Failure of a single `start()` attempt. Reported once, never retried.
pub type StartupError = NetworkError;

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::BindFail(e) => write!(f, "Bind failed: {}", e),
            NetworkError::InvalidAddress(e) => write!(f, "Invalid bind address: {}", e),
            NetworkError::AlreadyRunning => write!(f, "Server is already running"),
            NetworkError::NotRunning => write!(f, "Server is not running"),
        }
    }
}

impl std::error::Error for NetworkError {}

/// An inbound frame that is not a usable acknowledgment.
#[derive(Debug, PartialEq, Eq)]
pub enum ProtocolError {
    NonText,
    Malformed(String),
    UnknownStatus(i64),
    UnexpectedRequest { expected: Option<i64>, received: i64 },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::NonText => write!(f, "Frame is not a text frame"),
            ProtocolError::Malformed(e) => write!(f, "Malformed acknowledgment: {}", e),
            ProtocolError::UnknownStatus(s) => write!(f, "Unknown status code: {}", s),
            ProtocolError::UnexpectedRequest { expected, received } => match expected {
                Some(id) => write!(
                    f,
                    "Acknowledgment for request {} while awaiting request {}",
                    received, id
                ),
                None => write!(
                    f,
                    "Acknowledgment for request {} while no request is outstanding",
                    received
                ),
            },
        }
    }
}

impl std::error::Error for ProtocolError {}

#[derive(Debug)]
pub enum SessionError {
    StorageError(StorageError),
    TransportError(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::StorageError(e) => write!(f, "Storage error: {}", e),
            SessionError::TransportError(e) => write!(f, "Transport error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        SessionError::StorageError(err)
    }
}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    NetworkError(NetworkError),
    StorageError(StorageError),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::NetworkError(e) => write!(f, "Network error: {}", e),
            ControllerError::StorageError(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<NetworkError> for ControllerError {
    fn from(err: NetworkError) -> Self {
        ControllerError::NetworkError(err)
    }
}

impl From<StorageError> for ControllerError {
    fn from(err: StorageError) -> Self {
        ControllerError::StorageError(err)
    }
}
