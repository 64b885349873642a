//! Relay server orchestration.
//!
//! Binds the listening socket and runs the receive loop, handing each
//! accepted packet to the pipeline as an independently scheduled task.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::filter::QueryFilter;
use crate::pipeline::Pipeline;
use crate::upstream::Upstream;

/// Maximum size of a DNS packet (with some headroom).
pub const MAX_DNS_PACKET_SIZE: usize = 4096;

/// Configuration for the relay.
pub struct RelayConfig {
    /// Local address to bind; the IP version follows the address family.
    pub bind_addr: SocketAddr,
    /// The single upstream resolver all accepted queries go to.
    pub upstream_addr: SocketAddr,
    /// Read deadline for one upstream exchange.
    pub upstream_timeout: Duration,
    /// Upper bound on concurrently processed queries.
    pub max_in_flight: usize,
}

/// The bound relay, ready to serve.
pub struct Server {
    socket: Arc<UdpSocket>,
    pipeline: Arc<Pipeline>,
    max_in_flight: usize,
}

impl Server {
    /// Bind the listening socket and assemble the pipeline around it.
    pub async fn bind(config: RelayConfig, filter: Box<dyn QueryFilter>) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(config.bind_addr).await?);
        let pipeline = Arc::new(Pipeline::new(
            Upstream::new(config.upstream_addr, config.upstream_timeout),
            filter,
        ));

        Ok(Self {
            socket,
            pipeline,
            max_in_flight: config.max_in_flight,
        })
    }

    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Serve forever.
    ///
    /// A receive error is logged and the loop continues; per-query failures
    /// never terminate the server.
    pub async fn run(self) {
        self.spawn_summary_task();

        let limiter = Arc::new(Semaphore::new(self.max_in_flight));
        let mut buf = [0u8; MAX_DNS_PACKET_SIZE];

        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(r) => r,
                Err(e) => {
                    error!("receive error: {e}");
                    continue;
                }
            };
            debug!(%peer, len, "received packet");

            // Waiting for a permit is the backpressure: the loop stops
            // reading once max_in_flight transactions are active.
            let Ok(permit) = limiter.clone().acquire_owned().await else {
                continue;
            };

            let packet = buf[..len].to_vec();
            let socket = self.socket.clone();
            let pipeline = self.pipeline.clone();
            tokio::spawn(async move {
                pipeline.handle(&socket, peer, &packet).await;
                drop(permit);
            });
        }
    }

    /// Log an outcome summary once a minute; useful when the
    /// per-transaction log is filtered down.
    fn spawn_summary_task(&self) {
        let pipeline = self.pipeline.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            interval.tick().await; // skip the immediate first tick
            loop {
                interval.tick().await;
                let stats = pipeline.snapshot_and_reset();
                info!(
                    transactions = stats.transactions,
                    relayed = stats.relayed,
                    refused = stats.refused,
                    failed = stats.failed,
                    in_flight = pipeline.in_flight(),
                    avg_response_ms = format_args!("{:.2}", stats.avg_response_ms),
                    "summary"
                );
            }
        });
    }
}
