//! setu-nmea - NMEA serial-to-IP forwarding daemon
//!
//! Reads NMEA 0183 sentences from a serial device (GPS, AIS receiver) and
//! fans every valid line out to the configured IP consumers:
//!
//! - **UDP / multicast**: one datagram per sentence, fire-and-forget
//! - **TCP**: broadcast server; every connected client receives the stream
//!
//! The serial source is reopened with a fixed backoff after faults so the
//! daemon survives flaky cables and USB adapters unattended.

use setu_nmea::config::{split_host_port, AppConfig};
use setu_nmea::error::{Error, Result};
use setu_nmea::pipeline::{ForwardingOptions, ForwardingPipeline};
use setu_nmea::server::TcpBroadcastServer;
use setu_nmea::sink::{MulticastSink, OutputSink, UdpSink};
use setu_nmea::transport::SerialOpener;
use std::env;
use std::net::Ipv4Addr;
use std::sync::atomic::Ordering;

/// Fallback destination when no outputs are configured at all
const DEFAULT_UDP_DEST: (&str, u16) = ("127.0.0.1", 10110);

/// Parse config path from command line arguments.
///
/// Supports:
/// - `setu-nmea <path>` (positional)
/// - `setu-nmea --config <path>` (flag-based)
/// - `setu-nmea -c <path>` (short flag)
///
/// Defaults to `/etc/setunmea.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    // Look for --config or -c flag
    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    // Fall back to first positional argument (if it doesn't start with -)
    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    // Default path
    "/etc/setunmea.toml".to_string()
}

/// Build the configured UDP and multicast sinks
fn build_sinks(config: &AppConfig) -> Result<Vec<Box<dyn OutputSink>>> {
    let mut sinks: Vec<Box<dyn OutputSink>> = Vec::new();

    for dest in &config.outputs.udp {
        let (host, port) = split_host_port(dest)?;
        sinks.push(Box::new(UdpSink::new(
            &host,
            port,
            config.outputs.udp_broadcast,
        )?));
        log::info!("UDP destination: {}:{}", host, port);
    }

    if let Some(mcast) = &config.outputs.multicast {
        let (group, port) = split_host_port(mcast)?;
        let group: Ipv4Addr = group
            .parse()
            .map_err(|_| Error::InvalidAddress(mcast.clone()))?;
        let interface = match &config.outputs.multicast_interface {
            Some(s) => Some(
                s.parse::<Ipv4Addr>()
                    .map_err(|_| Error::InvalidAddress(s.clone()))?,
            ),
            None => None,
        };
        sinks.push(Box::new(MulticastSink::new(
            group,
            port,
            interface,
            config.outputs.multicast_ttl,
        )?));
        log::info!(
            "Multicast destination: {}:{} (ttl {})",
            group,
            port,
            config.outputs.multicast_ttl
        );
    }

    if sinks.is_empty() && config.outputs.tcp_listen.is_none() {
        log::info!(
            "No destinations configured, defaulting to UDP {}:{}",
            DEFAULT_UDP_DEST.0,
            DEFAULT_UDP_DEST.1
        );
        sinks.push(Box::new(UdpSink::new(
            DEFAULT_UDP_DEST.0,
            DEFAULT_UDP_DEST.1,
            false,
        )?));
    }

    Ok(sinks)
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config = AppConfig::from_file(&config_path)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.clone()),
    )
    .init();

    log::info!("setu-nmea starting (config: {})", config_path);
    log::info!(
        "Source: {} @ {} baud",
        config.serial.port,
        config.serial.baud
    );

    let sinks = build_sinks(&config)?;

    // Bind failures here are fatal; everything after this point recovers
    // on its own.
    let server = match &config.outputs.tcp_listen {
        Some(addr) => Some(TcpBroadcastServer::bind(addr)?),
        None => None,
    };

    let opener = SerialOpener::new(config.serial.port.clone(), config.serial.baud);
    let options = ForwardingOptions {
        drop_bad_checksum: config.forwarding.drop_bad_checksum,
        echo: config.forwarding.echo,
    };

    let mut pipeline = ForwardingPipeline::new(Box::new(opener), sinks, server, options);

    let running = pipeline.stop_handle();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        running.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    pipeline.run()?;

    log::info!("setu-nmea stopped");
    Ok(())
}
