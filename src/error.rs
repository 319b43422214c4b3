//! Error types for setu-nmea

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// setu-nmea error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Config encode error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    /// Malformed or unresolvable destination address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// TCP listener could not be set up
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Requested listen address
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Send attempted on a sink that was already closed
    #[error("Sink closed: {0}")]
    SinkClosed(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
