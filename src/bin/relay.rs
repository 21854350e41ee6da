use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clap_derive::Parser;
use tracing::{error, info, Level};
use tuple_relay::net::boot_notifier::notify_booted;
use tuple_relay::net::connection::TcpConnector;
use tuple_relay::session::relay_config::RelayConfig;
use tuple_relay::session::session::Session;
use tuple_relay::tuple::codec::WireFormat;

/// Relay tuples from a source to a destination, keeping only those with a positive `a` and
///  stamping each with the time it was relayed
#[derive(Parser)]
struct Args {
    source: SocketAddr,
    destination: SocketAddr,

    /// announce 'BOOTED!' to this address via UDP before connecting
    #[clap(long)]
    testbench: Option<SocketAddr>,

    #[clap(long, value_enum, default_value_t = WireFormat::Text)]
    format: WireFormat,

    /// bytes per read from the source; defaults depend on the wire format
    #[clap(long)]
    chunk_size: Option<usize>,

    #[clap(long, default_value_t = 10)]
    ack_timeout_secs: u64,

    #[clap(long, default_value_t = 1000)]
    boot_delay_millis: u64,

    /// terminate on the first malformed frame instead of skipping it
    #[clap(long, default_value_t = false)]
    strict: bool,

    /// trace every received tuple
    #[clap(long, default_value_t = false)]
    show_tuples: bool,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

impl Args {
    fn relay_config(&self) -> anyhow::Result<RelayConfig> {
        let mut config = RelayConfig::for_format(self.source, self.destination, self.format);
        config.testbench_addr = self.testbench;
        if let Some(chunk_size) = self.chunk_size {
            config.recv_chunk_size = chunk_size;
        }
        config.destination_ack_timeout = Duration::from_secs(self.ack_timeout_secs);
        config.boot_delay = Duration::from_millis(self.boot_delay_millis);
        config.strict_framing = self.strict;
        config.debug_show_tuples = self.show_tuples;

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
pub async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let level = match (args.verbose, args.very_verbose || args.show_tuples) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    let config = Arc::new(args.relay_config()?);
    info!("relaying {} tuples from {:?} to {:?}", config.wire_format, config.source_addr, config.destination_addr);

    if let Some(testbench_addr) = config.testbench_addr {
        notify_booted(testbench_addr).await;
    }
    tokio::time::sleep(config.boot_delay).await;

    let connector = TcpConnector::new(&config);
    let report = Session::from_config(config).run(&connector).await;

    match report.result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!("relay terminated abnormally: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
