use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use sift::filter::AllowAll;
use sift::server::{RelayConfig, Server};

#[derive(Parser)]
#[command(name = "sift")]
#[command(about = "Policy filtering DNS relay", long_about = None)]
struct Args {
    /// Local port to listen on
    #[arg(short, long, default_value = "5353")]
    port: u16,

    /// Bind address (IPv4 or IPv6)
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Upstream DNS server (host:port)
    #[arg(short, long, default_value = "8.8.8.8:53")]
    upstream: String,

    /// Upstream read deadline in seconds
    #[arg(short = 't', long, default_value_t = 3)]
    timeout: u64,

    /// Maximum number of queries in flight at once
    #[arg(long, default_value_t = 256)]
    max_in_flight: usize,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    let upstream_addr: SocketAddr = args
        .upstream
        .parse()
        .context("parse upstream address")?;
    let config = RelayConfig {
        bind_addr: SocketAddr::new(args.bind, args.port),
        upstream_addr,
        upstream_timeout: Duration::from_secs(args.timeout),
        max_in_flight: args.max_in_flight,
    };

    let server = Server::bind(config, Box::new(AllowAll))
        .await
        .context("bind listening socket")?;
    info!(
        listen = %server.local_addr().context("read bound address")?,
        upstream = %upstream_addr,
        "dns relay started"
    );

    server.run().await;
    Ok(())
}

fn init_tracing(debug: bool) {
    let fmt_layer = fmt::layer().with_target(false);

    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
