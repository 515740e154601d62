use std::future::Future;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Duration;
use tracing::{debug, error, field, info, instrument};

use crate::codec::FrameCodec;
use crate::commands;
use crate::connection::Connection;
use crate::frame::Frame;
use crate::store::Store;
use crate::{Error, Result};

pub const PORT: u16 = 6379;

const PROTOCOL_ERROR: &str = "ERR Protocol error";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: IpAddr,
    pub port: u16,
    /// Largest frame a client may send, in bytes.
    pub max_frame_size: usize,
    /// How often expired keys are swept. `None` leaves expiration purely lazy.
    pub reap_interval: Option<Duration>,
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: PORT,
            max_frame_size: FrameCodec::DEFAULT_MAX_FRAME_SIZE,
            reap_interval: None,
        }
    }
}

/// Binds the configured address and serves clients until `shutdown` completes.
pub async fn run(config: Config, shutdown: impl Future) -> Result<()> {
    let listener = TcpListener::bind(config.addr()).await?;
    serve(listener, config, shutdown).await
}

/// Accepts clients on `listener` until `shutdown` completes. Each connection is handled on its
/// own task, all of them sharing one store. Connections still open at shutdown are not waited
/// for.
pub async fn serve(listener: TcpListener, config: Config, shutdown: impl Future) -> Result<()> {
    let store = Store::new();
    if let Some(period) = config.reap_interval {
        store.spawn_reaper(period);
    }

    info!("Server listening on {}", listener.local_addr()?);

    let codec = FrameCodec::new(config.max_frame_size);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            res = listener.accept() => {
                let (socket, client_address) = match res {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                };

                info!("Accepted connection from {:?}", client_address);
                let store = store.clone();

                tokio::spawn(async move {
                    match handle_connection(socket, client_address, store, codec).await {
                        Ok(()) => {}
                        Err(Error::Io(e)) if is_disconnect(&e) => {
                            debug!("Client {} went away: {}", client_address, e);
                        }
                        Err(e) => error!("Connection with {} failed: {}", client_address, e),
                    }
                });
            }
            _ = &mut shutdown => {
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}

#[instrument(
    name = "connection",
    skip_all,
    fields(connection_id, client_address = %client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    store: Store,
    codec: FrameCodec,
) -> Result<()> {
    let mut conn = Connection::with_codec(stream, codec);

    tracing::Span::current().record("connection_id", field::display(conn.id));

    loop {
        let frame = match conn.read_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(Error::Frame(e)) => {
                debug!("Malformed frame from client: {}", e);
                conn.write_frame(Frame::Error(PROTOCOL_ERROR.to_string()))
                    .await?;
                continue;
            }
            Err(e) => return Err(e),
        };

        debug!("Received frame from client: {}", frame);
        let res = commands::execute(frame, &store);
        debug!("Sending response to client: {}", res);

        conn.write_frame(res).await?;
    }

    info!("Connection closed");
    Ok(())
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof
    )
}
