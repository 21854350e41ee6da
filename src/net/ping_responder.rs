use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

pub const DEFAULT_PING_PORT: u16 = 8123;
const RECV_BUFFER_SIZE: usize = 2048;

/// A trivial request / response server for checking that a host's network stack is up: a request
///  starting with `PING` is answered with `PING<n>` where `n` counts the pings answered so far,
///  anything else with `SAY PING!`. Replies are NUL terminated, and the connection is closed after
///  each reply.
pub struct PingResponder {
    listener: TcpListener,
    counter: u64,
}

impl PingResponder {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<PingResponder> {
        let listener = TcpListener::bind(addr).await?;
        info!("listening on {:?}", listener.local_addr()?);
        Ok(PingResponder {
            listener,
            counter: 0,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve one connection at a time until accepting fails
    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("failed to accept incoming connection: {}", e);
                    return Err(e.into());
                }
            };
            debug!(?peer, "accepted connection");

            if let Err(e) = self.respond(stream).await {
                warn!(?peer, "failed to send a reply: {}", e);
            }
        }
    }

    async fn respond(&mut self, mut stream: TcpStream) -> anyhow::Result<()> {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        // a failed read is answered like any other non-ping request
        let len = stream.read(&mut buf).await.unwrap_or(0);

        let reply = self.reply_for(&buf[..len]);
        stream.write_all(&reply).await?;
        debug!("sent a reply");
        stream.shutdown().await?;
        Ok(())
    }

    fn reply_for(&mut self, request: &[u8]) -> Vec<u8> {
        let mut reply = if request.starts_with(b"PING") {
            let reply = format!("PING{}", self.counter).into_bytes();
            self.counter += 1;
            reply
        }
        else {
            b"SAY PING!".to_vec()
        };
        reply.push(0);
        reply
    }
}

#[cfg(test)]
mod test {
    use super::*;

    async fn request(addr: SocketAddr, msg: &[u8]) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(msg).await.unwrap();
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await.unwrap();
        reply
    }

    #[tokio::test]
    async fn test_ping_responses() {
        let responder = PingResponder::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = responder.local_addr().unwrap();
        let server = tokio::spawn(responder.run());

        assert_eq!(request(addr, b"PING").await, b"PING0\0");
        assert_eq!(request(addr, b"hello").await, b"SAY PING!\0");
        assert_eq!(request(addr, b"PING again").await, b"PING1\0");

        server.abort();
    }
}
