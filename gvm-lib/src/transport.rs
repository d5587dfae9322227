//! UDP broadcast channels.
//!
//! The session holds two channels while it is ready: the command channel on
//! port 2525 (commands out, direct replies in) and the status channel on port
//! 1112 (periodic status broadcasts in). Both are non-blocking: a receive
//! returns at once whether or not a datagram was pending, and a send goes out
//! right after the socket is opened. Dropping a socket closes it.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use tracing::debug;

/// A bound, non-blocking datagram socket able to broadcast.
pub trait BroadcastSocket {
    /// Read one pending datagram. `Ok(None)` when nothing is pending.
    fn try_recv(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>>;

    /// Broadcast `payload` to `port`.
    fn broadcast(&self, payload: &[u8], port: u16) -> io::Result<usize>;
}

/// Opens broadcast sockets bound to a local port.
pub trait SocketFactory {
    type Socket: BroadcastSocket;

    fn open(&mut self, port: u16) -> io::Result<Self::Socket>;
}

/// [`BroadcastSocket`] over a non-blocking UDP socket.
///
/// Sends and receives are plain syscalls, so they need no reactor and work
/// the moment the socket is bound. The session does its own waiting.
#[derive(Debug)]
pub struct UdpBroadcastSocket {
    socket: UdpSocket,
    broadcast_addr: Ipv4Addr,
}

impl UdpBroadcastSocket {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl BroadcastSocket for UdpBroadcastSocket {
    fn try_recv(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(buf) {
            Ok(received) => Ok(Some(received)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn broadcast(&self, payload: &[u8], port: u16) -> io::Result<usize> {
        let target = SocketAddrV4::new(self.broadcast_addr, port);
        self.socket.send_to(payload, target)
    }
}

/// Opens [`UdpBroadcastSocket`]s on all interfaces with address reuse and
/// broadcast enabled.
#[derive(Debug, Clone)]
pub struct UdpSocketFactory {
    broadcast_addr: Ipv4Addr,
}

impl UdpSocketFactory {
    pub fn new(broadcast_addr: Ipv4Addr) -> Self {
        Self { broadcast_addr }
    }
}

impl Default for UdpSocketFactory {
    fn default() -> Self {
        Self::new(crate::constants::BROADCAST_ADDR)
    }
}

impl SocketFactory for UdpSocketFactory {
    type Socket = UdpBroadcastSocket;

    fn open(&mut self, port: u16) -> io::Result<UdpBroadcastSocket> {
        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_broadcast(true)?;
        socket.bind(&SocketAddr::from(addr).into())?;
        socket.set_nonblocking(true)?;

        let socket: UdpSocket = socket.into();
        debug!(local_addr = ?socket.local_addr().ok(), "UDP socket bound");
        Ok(UdpBroadcastSocket {
            socket,
            broadcast_addr: self.broadcast_addr,
        })
    }
}
