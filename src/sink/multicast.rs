//! UDP multicast output with interface and TTL control

use super::OutputSink;
use crate::error::{Error, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

/// Multicast sink sending each line as one datagram to a group address
pub struct MulticastSink {
    socket: Option<UdpSocket>,
    dest: SocketAddrV4,
}

impl MulticastSink {
    /// Create a sink for a multicast `group:port`.
    ///
    /// # Arguments
    /// * `group` - IPv4 multicast group (e.g., 239.255.0.1)
    /// * `port` - Destination port
    /// * `interface` - Outbound interface address; needed on multi-homed
    ///   hosts where the routing table would pick the wrong one
    /// * `ttl` - Multicast TTL; 1 keeps datagrams link-local
    pub fn new(
        group: Ipv4Addr,
        port: u16,
        interface: Option<Ipv4Addr>,
        ttl: u32,
    ) -> Result<Self> {
        if !group.is_multicast() {
            return Err(Error::InvalidAddress(format!(
                "{group} is not a multicast group"
            )));
        }

        // TTL and outbound interface must be in place before the first
        // send, and std exposes no setter for IP_MULTICAST_IF, so the
        // socket is built through socket2.
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_multicast_ttl_v4(ttl)?;
        if let Some(iface) = interface {
            socket.set_multicast_if_v4(&iface)?;
        }
        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
        socket.bind(&bind_addr.into())?;

        Ok(Self {
            socket: Some(socket.into()),
            dest: SocketAddrV4::new(group, port),
        })
    }
}

impl OutputSink for MulticastSink {
    fn send(&self, line: &[u8]) -> Result<()> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| Error::SinkClosed(self.describe()))?;
        socket.send_to(line, self.dest)?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("mcast://{}", self.dest)
    }

    fn close(&mut self) {
        self.socket = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_multicast_group() {
        assert!(MulticastSink::new(Ipv4Addr::new(192, 168, 1, 1), 10110, None, 1).is_err());
    }

    #[test]
    fn applies_ttl_before_any_send() {
        let sink = MulticastSink::new(Ipv4Addr::new(239, 255, 0, 1), 10110, None, 7).unwrap();
        let socket = sink.socket.as_ref().unwrap();
        assert_eq!(socket.multicast_ttl_v4().unwrap(), 7);
    }

    #[test]
    fn close_is_idempotent() {
        let mut sink = MulticastSink::new(Ipv4Addr::new(239, 255, 0, 1), 10110, None, 1).unwrap();
        sink.close();
        sink.close();
        assert!(sink.send(b"$X\r\n").is_err());
    }
}
