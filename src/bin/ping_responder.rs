use std::net::{Ipv4Addr, SocketAddr};

use clap::Parser;
use clap_derive::Parser;
use tracing::Level;
use tuple_relay::net::ping_responder::{PingResponder, DEFAULT_PING_PORT};

/// Answer 'PING' requests over TCP, for checking that a host's network is up
#[derive(Parser)]
struct Args {
    #[clap(long, default_value_t = DEFAULT_PING_PORT)]
    port: u16,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    let responder = PingResponder::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.port))).await?;
    responder.run().await
}
