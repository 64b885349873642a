//! Upstream resolver client.
//!
//! One transient socket per exchange: bind, connect, send, read one datagram
//! under a deadline. No pooling and no retry; a client that wants another
//! attempt re-queries on its own.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::error::RelayError;
use crate::server::MAX_DNS_PACKET_SIZE;

/// Client for the single configured upstream resolver.
pub struct Upstream {
    addr: SocketAddr,
    read_timeout: Duration,
}

impl Upstream {
    pub fn new(addr: SocketAddr, read_timeout: Duration) -> Self {
        Self { addr, read_timeout }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Send one query and read one reply under the deadline.
    ///
    /// The reply comes back unparsed; structural validation is the caller's
    /// job. Never returns `Refused` - upstream trouble is not a policy
    /// decision.
    pub async fn resolve(&self, query: &[u8]) -> Result<Vec<u8>, RelayError> {
        let unspecified: IpAddr = if self.addr.is_ipv4() {
            Ipv4Addr::UNSPECIFIED.into()
        } else {
            Ipv6Addr::UNSPECIFIED.into()
        };

        let socket = UdpSocket::bind(SocketAddr::new(unspecified, 0))
            .await
            .map_err(|e| RelayError::infra(format!("upstream socket bind: {e}")))?;
        socket
            .connect(self.addr)
            .await
            .map_err(|e| RelayError::infra(format!("upstream connect: {e}")))?;

        socket
            .send(query)
            .await
            .map_err(|e| RelayError::infra(format!("upstream send: {e}")))?;

        let mut buf = vec![0u8; MAX_DNS_PACKET_SIZE];
        let len = timeout(self.read_timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| {
                RelayError::infra(format!(
                    "upstream read timed out after {:?}",
                    self.read_timeout
                ))
            })?
            .map_err(|e| RelayError::infra(format!("upstream read: {e}")))?;
        buf.truncate(len);

        Ok(buf)
    }
}
