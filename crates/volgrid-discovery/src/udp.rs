//! Production transport, resolver and clock.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::protocol::{Clock, Datagram, HostResolver, Transport};

/// Default multicast group of the discovery channel.
pub const DEFAULT_GROUP: Ipv4Addr = Ipv4Addr::new(224, 2, 2, 1);
/// Default UDP port of the discovery channel.
pub const DEFAULT_PORT: u16 = 50200;

/// Queries leave the local subnet by at most one router hop.
const MULTICAST_TTL: u32 = 2;
const MAX_DATAGRAM: usize = 8192;

/// UDP multicast socket joined to the discovery group.
///
/// One socket both sends the queries and listens for responses, so it is
/// already a group member when the first answer arrives.
#[derive(Debug)]
pub struct MulticastTransport {
    socket: UdpSocket,
    target: SocketAddr,
    buf: Vec<u8>,
}

impl MulticastTransport {
    /// Bind `0.0.0.0:port` and join `group`. Must run inside a tokio runtime.
    pub fn bind(group: Ipv4Addr, port: u16) -> DiscoveryResult<Self> {
        if !group.is_multicast() {
            return Err(DiscoveryError::InvalidGroup(group));
        }
        let socket_err = |source: std::io::Error| DiscoveryError::Socket { group, port, source };

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(socket_err)?;
        socket.set_reuse_address(true).map_err(socket_err)?;
        socket
            .bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port).into())
            .map_err(socket_err)?;
        socket
            .join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
            .map_err(socket_err)?;
        socket.set_multicast_ttl_v4(MULTICAST_TTL).map_err(socket_err)?;
        socket.set_nonblocking(true).map_err(socket_err)?;

        let socket = UdpSocket::from_std(socket.into()).map_err(socket_err)?;
        info!(%group, port, "joined discovery group");

        Ok(Self {
            socket,
            target: SocketAddr::V4(SocketAddrV4::new(group, port)),
            buf: vec![0; MAX_DATAGRAM],
        })
    }
}

impl Transport for MulticastTransport {
    async fn send(&mut self, payload: &[u8]) -> std::io::Result<()> {
        self.socket.send_to(payload, self.target).await?;
        Ok(())
    }

    async fn recv(&mut self, timeout: Duration) -> std::io::Result<Option<Datagram>> {
        match tokio::time::timeout(timeout, self.socket.recv_from(&mut self.buf)).await {
            Err(_elapsed) => Ok(None),
            Ok(Err(e)) => Err(e),
            Ok(Ok((len, addr))) => Ok(Some(Datagram {
                payload: self.buf[..len].to_vec(),
                source: addr.ip(),
            })),
        }
    }
}

/// Reverse DNS through the system resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsResolver;

impl HostResolver for DnsResolver {
    async fn resolve(&self, addr: IpAddr) -> Option<String> {
        // The system resolver blocks.
        let lookup = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&addr)).await;
        match lookup {
            Ok(Ok(name)) => Some(name),
            Ok(Err(e)) => {
                debug!(%addr, error = %e, "reverse lookup failed");
                None
            }
            Err(e) => {
                debug!(%addr, error = %e, "reverse lookup task failed");
                None
            }
        }
    }
}

/// Wall-clock time since construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
