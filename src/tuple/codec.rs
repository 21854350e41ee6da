use std::fmt::{Display, Formatter};

use bytes::BytesMut;
use clap_derive::ValueEnum;

use crate::tuple::binary_codec::BinaryCodec;
use crate::tuple::text_codec::TextCodec;
use crate::tuple::tuple::{TupleIn, TupleOut};

/// Sent once to the Source to start the stream
pub const REQUEST_TUPLES: &[u8] = b"SEND TUPLES!";
/// In-band token from the Source: pause until acknowledged
pub const BACK: &[u8; 4] = b"BACK";
/// In-band token from the Source (and to the Destination): end of stream
pub const DONE: &[u8; 4] = b"DONE";
pub const ACK: &[u8; 3] = b"ACK";

pub const CONTROL_TOKEN_LEN: usize = 4;

/// The result of a single decode attempt at the start of a byte span.
///
/// All `consumed` values are relative to the start of the span that was passed to
///  [TupleCodec::decode], i.e. they include any padding the codec skipped before the frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DecodeOutcome {
    Record { tuple: TupleIn, consumed: usize },
    ControlBackpressure { consumed: usize },
    ControlDone { consumed: usize },
    /// The span is a strict prefix of something that may still become a valid frame
    Incomplete,
    /// The span can not be extended into any valid frame
    Malformed,
}

/// A wire encoding for tuples. Implementations are stateless: all reassembly state lives in the
///  [crate::framing::reframer::Reframer].
pub trait TupleCodec: Send + Sync {
    /// Decode exactly one frame at the start of `buf`, never reading past its end.
    fn decode(&self, buf: &[u8]) -> DecodeOutcome;

    /// Append the egress representation of `tuple` to `buf`
    fn encode(&self, tuple: &TupleOut, buf: &mut BytesMut);

    /// Number of bytes to skip after `decode` returned [DecodeOutcome::Malformed] for `buf`.
    ///  This is always at least 1 so that decoding makes progress.
    fn resync_len(&self, buf: &[u8]) -> usize {
        let _ = buf;
        1
    }

    /// upper bound for the encoded length of a single ingress frame
    fn max_frame_len(&self) -> usize;
}

impl <C: TupleCodec + ?Sized> TupleCodec for Box<C> {
    fn decode(&self, buf: &[u8]) -> DecodeOutcome {
        self.as_ref().decode(buf)
    }

    fn encode(&self, tuple: &TupleOut, buf: &mut BytesMut) {
        self.as_ref().encode(tuple, buf)
    }

    fn resync_len(&self, buf: &[u8]) -> usize {
        self.as_ref().resync_len(buf)
    }

    fn max_frame_len(&self) -> usize {
        self.as_ref().max_frame_len()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum WireFormat {
    Text,
    Binary,
}

impl Display for WireFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WireFormat::Text => write!(f, "text"),
            WireFormat::Binary => write!(f, "binary"),
        }
    }
}

impl WireFormat {
    pub fn codec(&self) -> Box<dyn TupleCodec> {
        match self {
            WireFormat::Text => Box::new(TextCodec),
            WireFormat::Binary => Box::new(BinaryCodec),
        }
    }
}
