use clap::Parser;
use std::net::IpAddr;
use std::process::ExitCode;
use tokio::signal;
use tokio::time::Duration;
use tracing::{debug, error, info};

use respkv::codec::FrameCodec;
use respkv::server::{self, Config, PORT};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// The port to listen on
    #[arg(default_value_t = PORT, value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// The address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Sweep expired keys every this many milliseconds, 0 keeps expiration lazy
    #[arg(long, default_value_t = 0)]
    reap_interval_ms: u64,

    /// The largest frame, in bytes, a client may send
    #[arg(long, env = "MAX_FRAME_SIZE", default_value_t = FrameCodec::DEFAULT_MAX_FRAME_SIZE)]
    max_frame_size: usize,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            bind: args.bind,
            port: args.port,
            max_frame_size: args.max_frame_size,
            reap_interval: (args.reap_interval_ms > 0)
                .then(|| Duration::from_millis(args.reap_interval_ms)),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        // --help and --version are not failures.
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    let _ = tracing_subscriber::fmt()
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    match server::run(args.into(), shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
