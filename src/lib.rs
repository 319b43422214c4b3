//! setu-nmea - NMEA serial-to-IP forwarding
//!
//! Core components for bridging a line-oriented NMEA 0183 serial source
//! (GPS, AIS receiver) to UDP, multicast, and TCP consumers.
//!
//! ## Features
//!
//! - `mock`: Enable the mock transport for hardware-free testing

pub mod config;
pub mod error;
pub mod framing;
pub mod pipeline;
pub mod sentence;
pub mod server;
pub mod sink;
pub mod transport;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Error, Result};
pub use pipeline::{Backoff, ForwardingOptions, ForwardingPipeline};
