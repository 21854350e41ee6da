use std::fmt::{Display, Formatter};
use std::time::Duration;

use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Peer {
    Source,
    Destination,
}

impl Display for Peer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Peer::Source => write!(f, "source"),
            Peer::Destination => write!(f, "destination"),
        }
    }
}

/// Everything that can end (or, for [RelayError::MalformedFrame], disturb) a session
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to connect to {peer}: {source}")]
    Connection { peer: Peer, source: std::io::Error },

    /// the peer closed the connection or the socket failed mid-stream
    #[error("receiving from {peer} failed: {source}")]
    Receive { peer: Peer, source: std::io::Error },

    #[error("sending to {peer} failed: {source}")]
    Send { peer: Peer, source: std::io::Error },

    #[error("malformed frame, skipped {skipped} bytes")]
    MalformedFrame { skipped: usize },

    #[error("partial frame of {pending} bytes exceeds carry-over capacity of {capacity} bytes")]
    ProtocolViolation { pending: usize, capacity: usize },

    #[error("destination did not acknowledge end of stream within {0:?}")]
    HandshakeTimeout(Duration),
}

impl RelayError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RelayError::MalformedFrame { .. })
    }

    pub fn peer_closed(peer: Peer) -> RelayError {
        RelayError::Receive {
            peer,
            source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "connection closed by peer"),
        }
    }
}
