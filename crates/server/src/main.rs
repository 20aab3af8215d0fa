//! Noughts server binary.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use noughts_server::validation::MoveStrictness;
use noughts_server::{DEFAULT_PORT, EvictionPolicy, Server, ServerConfig, serve};
use tokio::net::UdpSocket;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Authoritative tic-tac-toe server over UDP
#[derive(Parser, Debug)]
#[command(name = "noughts-server", version, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(long, env = "NOUGHTS_BIND", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    /// UDP port to listen on
    #[arg(short, long, env = "NOUGHTS_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Seed for the opponent (random if omitted)
    #[arg(long, env = "NOUGHTS_SEED")]
    seed: Option<u64>,

    /// Only accept boards that add exactly one X
    #[arg(long, env = "NOUGHTS_STRICT")]
    strict: bool,

    /// Drop sessions idle for this many seconds
    #[arg(long, env = "NOUGHTS_IDLE_TIMEOUT", value_name = "SECS")]
    idle_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = ServerConfig {
        seed: args.seed.unwrap_or_else(rand::random),
        strictness: if args.strict {
            MoveStrictness::Strict
        } else {
            MoveStrictness::Permissive
        },
        eviction: args
            .idle_timeout
            .map(|secs| EvictionPolicy::IdleFor(Duration::from_secs(secs)))
            .unwrap_or_default(),
    };

    let addr = SocketAddr::new(args.bind, args.port);
    let socket = UdpSocket::bind(addr)
        .await
        .with_context(|| format!("failed to bind UDP socket on {addr}"))?;

    info!(
        addr = %socket.local_addr()?,
        seed = config.seed,
        strictness = ?config.strictness,
        eviction = ?config.eviction,
        "server listening"
    );

    serve(socket, Server::new(config)).await;
    Ok(())
}
