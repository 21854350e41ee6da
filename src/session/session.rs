use std::sync::Arc;

use bytes::BytesMut;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::framing::reframer::{Frame, Reframer};
use crate::net::connection::{Connection, Connector};
use crate::operator::clock::{Clock, MonotonicClock};
use crate::operator::pipeline::Pipeline;
use crate::session::metrics::SessionMetrics;
use crate::session::relay_config::RelayConfig;
use crate::session::relay_error::{Peer, RelayError};
use crate::tuple::codec::{TupleCodec, ACK, DONE, REQUEST_TUPLES};

/// The session's lifecycle. States are passed strictly in this order, except that a fatal
///  error leads straight to [SessionState::Closed].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Handshaking,
    Streaming,
    Draining,
    Closed,
}

/// What is left of a session after it ran to completion (or to a fatal error)
#[derive(Debug)]
pub struct SessionReport {
    pub state: SessionState,
    pub metrics: SessionMetrics,
    pub result: Result<(), RelayError>,
}

/// The two connections of a session
struct Peers {
    source: Box<dyn Connection>,
    destination: Box<dyn Connection>,
    closed: bool,
}

impl Peers {
    fn connection(&mut self, peer: Peer) -> &mut dyn Connection {
        match peer {
            Peer::Source => self.source.as_mut(),
            Peer::Destination => self.destination.as_mut(),
        }
    }

    async fn send(&mut self, peer: Peer, buf: &[u8]) -> Result<(), RelayError> {
        self.connection(peer).send(buf).await
            .map_err(|source| RelayError::Send { peer, source })
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        close_quietly(self.source.as_mut(), Peer::Source).await;
        close_quietly(self.destination.as_mut(), Peer::Destination).await;
    }
}

async fn close_quietly(connection: &mut dyn Connection, peer: Peer) {
    if let Err(e) = connection.close().await {
        debug!("error closing connection to {}: {}", peer, e);
    }
}

/// Relays one stream of tuples from the Source to the Destination: request the stream, decode,
///  filter and map tuples, forward them, answer backpressure, and run the termination handshake.
///
/// Everything runs sequentially in the task that calls [Session::run]. Dropping that future
///  aborts the session, which drops (and thereby closes) both connections and all buffers.
pub struct Session<C: TupleCodec, K: Clock> {
    config: Arc<RelayConfig>,
    state: SessionState,
    reframer: Reframer<C>,
    pipeline: Pipeline<K>,
    recv_buf: Vec<u8>,
    outbound: BytesMut,
    metrics: SessionMetrics,
}

impl Session<Box<dyn TupleCodec>, MonotonicClock> {
    pub fn from_config(config: Arc<RelayConfig>) -> Self {
        let codec = config.wire_format.codec();
        Session::new(config, codec, MonotonicClock::new())
    }
}

impl <C: TupleCodec, K: Clock> Session<C, K> {
    pub fn new(config: Arc<RelayConfig>, codec: C, clock: K) -> Session<C, K> {
        Session {
            state: SessionState::Handshaking,
            reframer: Reframer::with_capacity(codec, config.carry_capacity),
            pipeline: Pipeline::new(clock, config.debug_show_tuples),
            recv_buf: vec![0u8; config.recv_chunk_size],
            outbound: BytesMut::with_capacity(config.recv_chunk_size * 2),
            metrics: SessionMetrics::default(),
            config,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// Run the session to completion. This always ends in [SessionState::Closed] with both
    ///  connections closed; fatal errors are part of the report rather than propagated.
    pub async fn run(mut self, connector: &dyn Connector) -> SessionReport {
        let mut peers = None;
        let result = self.drive(connector, &mut peers).await;

        match &result {
            Err(e) if e.is_fatal() => error!(state = ?self.state, "session failed: {}", e),
            Err(e) => warn!(state = ?self.state, "session aborted in strict framing mode: {}", e),
            Ok(()) => {}
        }

        self.state = SessionState::Closed;
        if let Some(peers) = peers.as_mut() {
            peers.close().await;
        }
        self.reframer.reset();
        self.outbound.clear();

        info!("session closed\n{}", self.metrics);

        SessionReport {
            state: self.state,
            metrics: self.metrics,
            result,
        }
    }

    async fn drive(&mut self, connector: &dyn Connector, peers: &mut Option<Peers>) -> Result<(), RelayError> {
        self.state = SessionState::Handshaking;
        let peers = peers.insert(Self::connect(connector).await?);

        peers.send(Peer::Source, REQUEST_TUPLES).await?;
        debug!("requested tuples from source");

        self.state = SessionState::Streaming;
        self.stream(peers).await?;

        self.state = SessionState::Draining;
        self.drain(peers).await
    }

    async fn connect(connector: &dyn Connector) -> Result<Peers, RelayError> {
        let source = connector.connect_source().await
            .map_err(|source| RelayError::Connection { peer: Peer::Source, source })?;

        let destination = match connector.connect_destination().await {
            Ok(destination) => destination,
            Err(e) => {
                let mut source = source;
                close_quietly(source.as_mut(), Peer::Source).await;
                return Err(RelayError::Connection { peer: Peer::Destination, source: e });
            }
        };

        Ok(Peers {
            source,
            destination,
            closed: false,
        })
    }

    /// Returns when the Source signalled the end of the stream
    async fn stream(&mut self, peers: &mut Peers) -> Result<(), RelayError> {
        loop {
            let n = match peers.source.recv(&mut self.recv_buf).await {
                Ok(0) => return self.end_of_input(peers, RelayError::peer_closed(Peer::Source)).await,
                Ok(n) => n,
                Err(source) => return self.end_of_input(peers, RelayError::Receive { peer: Peer::Source, source }).await,
            };

            if self.metrics.start.is_none() {
                self.metrics.start = Some(Instant::now());
            }
            self.metrics.bytes_received += n as u64;

            let mut done = false;
            let mut frames = self.reframer.push(&self.recv_buf[..n]);
            while let Some(frame) = frames.next() {
                match frame? {
                    Frame::Tuple(tuple) => {
                        if let Some(enriched) = self.pipeline.process(&tuple, &mut self.metrics) {
                            frames.codec().encode(&enriched, &mut self.outbound);
                        }
                    }
                    Frame::Backpressure => {
                        debug!("backpressure from source - acknowledging");
                        peers.send(Peer::Source, ACK).await?;
                    }
                    Frame::Done => {
                        done = true;
                    }
                    Frame::Malformed { skipped } => {
                        self.metrics.malformed_frames += 1;
                        let e = RelayError::MalformedFrame { skipped };
                        if self.config.strict_framing {
                            return Err(e);
                        }
                        warn!("{} - continuing", e);
                    }
                }
            }

            self.flush(peers).await?;

            if done {
                self.metrics.stop = Some(Instant::now());
                info!("data stream was closed, terminating connections");
                return Ok(());
            }
        }
    }

    /// The Source went away without `DONE`: forward what is buffered, then give up without the
    ///  termination handshake
    async fn end_of_input(&mut self, peers: &mut Peers, e: RelayError) -> Result<(), RelayError> {
        self.metrics.stop = Some(Instant::now());
        if let Err(flush_error) = self.flush(peers).await {
            warn!("failed to forward buffered tuples: {}", flush_error);
        }
        if self.reframer.pending() > 0 {
            debug!(pending = self.reframer.pending(), "discarding partial frame");
        }
        Err(e)
    }

    async fn flush(&mut self, peers: &mut Peers) -> Result<(), RelayError> {
        if self.outbound.is_empty() {
            return Ok(());
        }
        let len = self.outbound.len();
        let result = peers.send(Peer::Destination, &self.outbound).await;
        self.outbound.clear();
        result?;
        self.metrics.bytes_forwarded += len as u64;
        Ok(())
    }

    async fn drain(&mut self, peers: &mut Peers) -> Result<(), RelayError> {
        info!("sending 'DONE' to destination");
        peers.send(Peer::Destination, DONE).await?;
        info!("sending 'ACK' to source");
        peers.send(Peer::Source, ACK).await?;

        info!("waiting for 'ACK' from destination");
        let timeout = self.config.destination_ack_timeout;
        let mut ack = [0u8; 3];
        match tokio::time::timeout(timeout, peers.destination.recv_exact(&mut ack)).await {
            Err(_) => return Err(RelayError::HandshakeTimeout(timeout)),
            Ok(Err(source)) => return Err(RelayError::Receive { peer: Peer::Destination, source }),
            Ok(Ok(())) => {}
        }

        if &ack != ACK {
            warn!("expected 'ACK' from destination, received {:?}", ack);
        }
        info!("received 'ACK' from destination");
        Ok(())
    }
}
