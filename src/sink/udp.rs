//! Unicast/broadcast UDP output

use super::OutputSink;
use crate::error::{Error, Result};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs, UdpSocket};

/// UDP sink sending each line as one datagram to a fixed destination
pub struct UdpSink {
    socket: Option<UdpSocket>,
    dest: SocketAddr,
}

impl UdpSink {
    /// Create a sink for `host:port`.
    ///
    /// Broadcast capability is enabled here, at construction, when it was
    /// requested or the destination is a broadcast-class address; a
    /// per-send toggle would race the first datagram.
    pub fn new(host: &str, port: u16, broadcast: bool) -> Result<Self> {
        let dest = (host, port)
            .to_socket_addrs()
            .map_err(|_| Error::InvalidAddress(format!("{host}:{port}")))?
            .next()
            .ok_or_else(|| Error::InvalidAddress(format!("{host}:{port}")))?;

        let socket = UdpSocket::bind("0.0.0.0:0")?;
        if broadcast || is_broadcast_addr(&dest) {
            socket.set_broadcast(true)?;
            log::info!("UDP broadcast enabled for {}", dest);
        }

        Ok(Self {
            socket: Some(socket),
            dest,
        })
    }
}

/// Broadcast-class destination: all-ones, or a `.255` host suffix
/// (the common /24 directed broadcast)
fn is_broadcast_addr(addr: &SocketAddr) -> bool {
    match addr.ip() {
        IpAddr::V4(ip) => ip.is_broadcast() || ip.octets()[3] == 255,
        IpAddr::V6(_) => false,
    }
}

impl OutputSink for UdpSink {
    fn send(&self, line: &[u8]) -> Result<()> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| Error::SinkClosed(self.describe()))?;
        socket.send_to(line, self.dest)?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("udp://{}", self.dest)
    }

    fn close(&mut self) {
        self.socket = None;
    }
}
