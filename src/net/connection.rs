use std::fmt::Debug;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::session::relay_config::RelayConfig;

/// A byte stream to one peer. The session owns each connection exclusively.
#[async_trait]
pub trait Connection: Send + Debug {
    /// Read at most `buf.len()` bytes; `Ok(0)` means the peer closed the connection.
    async fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    async fn send(&mut self, buf: &[u8]) -> std::io::Result<()>;

    /// Read exactly `buf.len()` bytes, across as many reads as it takes
    async fn recv_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.recv(&mut buf[filled..]).await?;
            if n == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "connection closed by peer"));
            }
            filled += n;
        }
        Ok(())
    }

    async fn close(&mut self) -> std::io::Result<()>;
}

/// Establishes the session's two outbound connections
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect_source(&self) -> std::io::Result<Box<dyn Connection>>;
    async fn connect_destination(&self) -> std::io::Result<Box<dyn Connection>>;
}

#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl TcpConnection {
    pub async fn connect(peer_addr: SocketAddr) -> std::io::Result<TcpConnection> {
        let stream = TcpStream::connect(peer_addr).await?;
        // tuples are latency sensitive, and sends are already batched per chunk
        stream.set_nodelay(true)?;
        Ok(TcpConnection {
            stream,
            peer_addr,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

#[async_trait]
impl Connection for TcpConnection {
    async fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stream.read(buf).await
    }

    async fn send(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(buf).await
    }

    async fn close(&mut self) -> std::io::Result<()> {
        debug!(peer = ?self.peer_addr, "closing connection");
        self.stream.shutdown().await
    }
}

pub struct TcpConnector {
    source_addr: SocketAddr,
    destination_addr: SocketAddr,
}

impl TcpConnector {
    pub fn new(config: &RelayConfig) -> TcpConnector {
        TcpConnector {
            source_addr: config.source_addr,
            destination_addr: config.destination_addr,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect_source(&self) -> std::io::Result<Box<dyn Connection>> {
        info!("connecting to source {:?}", self.source_addr);
        let connection = TcpConnection::connect(self.source_addr).await?;
        info!("connected to source");
        Ok(Box::new(connection))
    }

    async fn connect_destination(&self) -> std::io::Result<Box<dyn Connection>> {
        info!("connecting to destination {:?}", self.destination_addr);
        let connection = TcpConnection::connect(self.destination_addr).await?;
        info!("connected to destination");
        Ok(Box::new(connection))
    }
}
