//! Multi-client TCP broadcast server
//!
//! Relays every forwarded sentence to all connected clients as a raw byte
//! stream (no framing beyond the CRLF already present). A dedicated thread
//! owns the listening socket and polls a non-blocking accept; the client
//! set lives behind a single lock shared by the accept thread, the
//! broadcast path, and the close path.
//!
//! Clients that fail a send (closed, reset, or too slow to drain their
//! socket buffer) are pruned after the broadcast pass, so one dead client
//! never affects delivery to the rest.

use crate::error::{Error, Result};
use log::{error, info, warn};
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Listen backlog; consumer counts are small
const LISTEN_BACKLOG: i32 = 5;

/// Sleep between non-blocking accept polls. The stop flag is observed
/// within one interval.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// One connected consumer
struct ClientConnection {
    stream: TcpStream,
    peer: SocketAddr,
}

/// TCP broadcast server with live connect/disconnect tracking
pub struct TcpBroadcastServer {
    clients: Arc<Mutex<Vec<ClientConnection>>>,
    shutdown: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl TcpBroadcastServer {
    /// Bind and start listening on `addr` (e.g. "0.0.0.0:10110").
    ///
    /// Binding is the only fatal step; once this returns, accept errors
    /// are transient and logged. Address reuse is enabled so a restart
    /// right after a crash can rebind the port.
    pub fn bind(addr: &str) -> Result<Self> {
        let sock_addr: SocketAddr = addr
            .to_socket_addrs()
            .map_err(|_| Error::InvalidAddress(addr.to_string()))?
            .next()
            .ok_or_else(|| Error::InvalidAddress(addr.to_string()))?;

        let listener = Self::listener_with_reuse(sock_addr).map_err(|source| Error::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let local_addr = listener.local_addr()?;

        let clients = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let clients_clone = Arc::clone(&clients);
        let shutdown_clone = Arc::clone(&shutdown);
        let accept_thread = thread::Builder::new()
            .name("tcp-accept".to_string())
            .spawn(move || {
                Self::accept_loop(listener, clients_clone, shutdown_clone);
            })?;

        info!("TCP server listening on {}", local_addr);

        Ok(Self {
            clients,
            shutdown,
            accept_thread: Some(accept_thread),
            local_addr,
        })
    }

    /// SO_REUSEADDR listener; std's `TcpListener::bind` exposes no way to
    /// set the option before binding
    fn listener_with_reuse(addr: SocketAddr) -> std::io::Result<TcpListener> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(LISTEN_BACKLOG)?;
        let listener: TcpListener = socket.into();
        listener.set_nonblocking(true)?;
        Ok(listener)
    }

    fn accept_loop(
        listener: TcpListener,
        clients: Arc<Mutex<Vec<ClientConnection>>>,
        shutdown: Arc<AtomicBool>,
    ) {
        while !shutdown.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    // Non-blocking sends: a stalled client must fail fast
                    // in broadcast() instead of holding up the pass
                    if let Err(e) = stream.set_nonblocking(true) {
                        warn!("Dropping client {}: {}", peer, e);
                        continue;
                    }
                    info!("TCP client connected: {}", peer);
                    clients.lock().push(ClientConnection { stream, peer });
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }
    }

    /// Send `line` to every connected client.
    ///
    /// Failed clients are collected during the pass and closed and removed
    /// afterwards; a failing client is invisible to the remaining clients'
    /// delivery.
    pub fn broadcast(&self, line: &[u8]) {
        let mut clients = self.clients.lock();
        let mut dead = Vec::new();
        for (idx, client) in clients.iter_mut().enumerate() {
            if let Err(e) = client.stream.write_all(line) {
                info!("TCP client disconnected: {} ({})", client.peer, e);
                dead.push(idx);
            }
        }
        for idx in dead.into_iter().rev() {
            let client = clients.remove(idx);
            let _ = client.stream.shutdown(Shutdown::Both);
        }
    }

    /// Number of currently connected clients
    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Bound address (useful when binding port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, close the listener, drop every client. Idempotent.
    pub fn close(&mut self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        // Joining drops the listener owned by the accept thread; the
        // thread exits within one poll interval.
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
        let mut clients = self.clients.lock();
        for client in clients.drain(..) {
            let _ = client.stream.shutdown(Shutdown::Both);
        }
        info!("TCP server on {} stopped", self.local_addr);
    }
}

impl Drop for TcpBroadcastServer {
    fn drop(&mut self) {
        self.close();
    }
}
