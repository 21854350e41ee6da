use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::net::connection::{Connection, Connector};
use crate::session::relay_error::Peer;

/// What a scripted peer does on the next `recv`
#[derive(Clone, Debug)]
pub enum Incoming {
    /// deliver these bytes, across several reads if the caller's buffer is smaller
    Chunk(Vec<u8>),
    Eof,
    Error(std::io::ErrorKind),
    /// never return
    Hang,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WireEvent {
    Sent(Peer, Vec<u8>),
    Closed(Peer),
}

/// Everything a session did to its connections, in the order it happened. Shared between the
///  connections of a session so that ordering across peers is observable.
#[derive(Clone, Debug, Default)]
pub struct WireLog {
    events: Arc<RwLock<Vec<WireEvent>>>,
}

impl WireLog {
    pub async fn events(&self) -> Vec<WireEvent> {
        self.events.read().await.clone()
    }

    pub async fn sent_to(&self, peer: Peer) -> Vec<Vec<u8>> {
        self.events.read().await
            .iter()
            .filter_map(|e| match e {
                WireEvent::Sent(p, buf) if *p == peer => Some(buf.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn bytes_sent_to(&self, peer: Peer) -> Vec<u8> {
        self.sent_to(peer).await
            .concat()
    }

    pub async fn is_closed(&self, peer: Peer) -> bool {
        self.events.read().await
            .contains(&WireEvent::Closed(peer))
    }

    async fn push(&self, event: WireEvent) {
        self.events.write().await.push(event);
    }
}

/// A [Connection] that replays a script for reads and records writes in a [WireLog]. Once the
///  script is exhausted, reads report end of stream.
#[derive(Debug)]
pub struct ScriptedConnection {
    peer: Peer,
    incoming: VecDeque<Incoming>,
    log: WireLog,
}

impl ScriptedConnection {
    pub fn new(peer: Peer, incoming: Vec<Incoming>, log: WireLog) -> ScriptedConnection {
        ScriptedConnection {
            peer,
            incoming: incoming.into(),
            log,
        }
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.incoming.pop_front() {
            None | Some(Incoming::Eof) => Ok(0),
            Some(Incoming::Error(kind)) => Err(std::io::Error::new(kind, "scripted failure")),
            Some(Incoming::Hang) => {
                self.incoming.push_front(Incoming::Hang);
                std::future::pending().await
            }
            Some(Incoming::Chunk(mut chunk)) => {
                if chunk.len() > buf.len() {
                    let rest = chunk.split_off(buf.len());
                    self.incoming.push_front(Incoming::Chunk(rest));
                }
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
        }
    }

    async fn send(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.log.push(WireEvent::Sent(self.peer, buf.to_vec())).await;
        Ok(())
    }

    async fn close(&mut self) -> std::io::Result<()> {
        self.log.push(WireEvent::Closed(self.peer)).await;
        Ok(())
    }
}

/// Hands out a prepared connection per peer, once. A missing connection fails to connect.
pub struct ScriptedConnector {
    source: Mutex<Option<ScriptedConnection>>,
    destination: Mutex<Option<ScriptedConnection>>,
}

impl ScriptedConnector {
    pub fn new(source: Option<ScriptedConnection>, destination: Option<ScriptedConnection>) -> ScriptedConnector {
        ScriptedConnector {
            source: Mutex::new(source),
            destination: Mutex::new(destination),
        }
    }

    async fn take(slot: &Mutex<Option<ScriptedConnection>>, peer: Peer) -> std::io::Result<Box<dyn Connection>> {
        match slot.lock().await.take() {
            Some(connection) => Ok(Box::new(connection)),
            None => Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, format!("no scripted connection to {}", peer))),
        }
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect_source(&self) -> std::io::Result<Box<dyn Connection>> {
        Self::take(&self.source, Peer::Source).await
    }

    async fn connect_destination(&self) -> std::io::Result<Box<dyn Connection>> {
        Self::take(&self.destination, Peer::Destination).await
    }
}
