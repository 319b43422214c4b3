//! Configuration for the setu-nmea daemon
//!
//! Loads configuration from a TOML file: serial source, output
//! destinations, forwarding policy, and logging.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub serial: SerialConfig,
    #[serde(default)]
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub forwarding: ForwardingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial source configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerialConfig {
    /// Serial port path (e.g. "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate; GPS units usually run 4800, AIS receivers 38400
    #[serde(default = "default_baud")]
    pub baud: u32,
}

fn default_baud() -> u32 {
    4800
}

/// Output destinations
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputsConfig {
    /// UDP destinations as "host:port"; each line becomes one datagram
    /// per entry
    pub udp: Vec<String>,
    /// Force broadcast capability on every UDP destination
    pub udp_broadcast: bool,
    /// Multicast destination as "group:port" (e.g. "239.255.0.1:10110")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multicast: Option<String>,
    /// Outbound IPv4 interface for multicast on multi-homed hosts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multicast_interface: Option<String>,
    /// Multicast TTL; 1 keeps datagrams link-local
    pub multicast_ttl: u32,
    /// TCP server bind address as "host:port" (e.g. "0.0.0.0:10110")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcp_listen: Option<String>,
}

impl Default for OutputsConfig {
    fn default() -> Self {
        Self {
            udp: Vec::new(),
            udp_broadcast: false,
            multicast: None,
            multicast_interface: None,
            multicast_ttl: 1,
            tcp_listen: None,
        }
    }
}

/// Forwarding policy
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Discard sentences whose checksum does not verify
    pub drop_bad_checksum: bool,
    /// Mirror forwarded (and dropped) sentences to stdout
    pub echo: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Default configuration: a GPS on the first USB adapter and no
    /// outputs configured (the daemon then falls back to UDP
    /// 127.0.0.1:10110)
    pub fn gps_defaults() -> Self {
        Self {
            serial: SerialConfig {
                port: "/dev/ttyUSB0".to_string(),
                baud: 4800,
            },
            outputs: OutputsConfig::default(),
            forwarding: ForwardingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// True when no UDP, multicast, or TCP destination is configured
    pub fn no_outputs_configured(&self) -> bool {
        self.outputs.udp.is_empty()
            && self.outputs.multicast.is_none()
            && self.outputs.tcp_listen.is_none()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::gps_defaults()
    }
}

/// Split a "host:port" destination at the rightmost colon
pub fn split_host_port(s: &str) -> Result<(String, u16)> {
    let (host, port) = s
        .rsplit_once(':')
        .ok_or_else(|| Error::InvalidAddress(s.to_string()))?;
    if host.is_empty() {
        return Err(Error::InvalidAddress(s.to_string()));
    }
    let port: u16 = port
        .parse()
        .map_err(|_| Error::InvalidAddress(s.to_string()))?;
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::gps_defaults();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud, 4800);
        assert_eq!(config.outputs.multicast_ttl, 1);
        assert!(config.no_outputs_configured());
    }

    #[test]
    fn test_toml_serialization() {
        let config = AppConfig::gps_defaults();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[serial]"));
        assert!(toml_string.contains("[outputs]"));
        assert!(toml_string.contains("[forwarding]"));
        assert!(toml_string.contains("[logging]"));
        assert!(toml_string.contains("port = \"/dev/ttyUSB0\""));
        assert!(toml_string.contains("baud = 4800"));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[serial]
port = "/dev/ttyAMA0"
baud = 38400

[outputs]
udp = ["127.0.0.1:10110", "192.168.1.255:10110"]
udp_broadcast = true
multicast = "239.255.0.1:10110"
multicast_ttl = 4
tcp_listen = "0.0.0.0:10110"

[forwarding]
drop_bad_checksum = true
echo = true
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyAMA0");
        assert_eq!(config.serial.baud, 38400);
        assert_eq!(config.outputs.udp.len(), 2);
        assert!(config.outputs.udp_broadcast);
        assert_eq!(
            config.outputs.multicast.as_deref(),
            Some("239.255.0.1:10110")
        );
        assert_eq!(config.outputs.multicast_ttl, 4);
        assert!(config.forwarding.drop_bad_checksum);
        // [logging] omitted entirely
        assert_eq!(config.logging.level, "info");
        assert!(!config.no_outputs_configured());
    }

    #[test]
    fn missing_optional_sections_use_defaults() {
        let config: AppConfig = toml::from_str("[serial]\nport = \"COM3\"\n").unwrap();
        assert_eq!(config.serial.baud, 4800);
        assert!(!config.forwarding.echo);
        assert_eq!(config.outputs.multicast_ttl, 1);
        assert!(config.no_outputs_configured());
    }

    #[test]
    fn split_host_port_takes_rightmost_colon() {
        assert_eq!(
            split_host_port("127.0.0.1:10110").unwrap(),
            ("127.0.0.1".to_string(), 10110)
        );
        assert!(split_host_port("no-port").is_err());
        assert!(split_host_port("host:notaport").is_err());
        assert!(split_host_port(":10110").is_err());
    }
}
