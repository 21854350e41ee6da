use bytes::{Buf, BufMut, BytesMut};

use crate::tuple::codec::{DecodeOutcome, TupleCodec, BACK, CONTROL_TOKEN_LEN, DONE};
use crate::tuple::tuple::{TupleIn, TupleOut};

/// Five big-endian `i32`s per record, no padding.
///
/// Control tokens are told apart from records by length: an undecoded remainder of exactly
///  [CONTROL_TOKEN_LEN] bytes that equals `BACK` or `DONE` is a token. This takes precedence over
///  interpreting the bytes as the start of a record, so a partial record whose first four bytes
///  happen to spell a token is misread - the wire format offers no way to tell the two apart.
///
/// The enrichment timestamp is not part of the egress format: the five original fields are
///  forwarded unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryCodec;

impl BinaryCodec {
    pub const RECORD_LEN: usize = 5 * size_of::<i32>();
}

impl TupleCodec for BinaryCodec {
    fn decode(&self, buf: &[u8]) -> DecodeOutcome {
        if buf.len() == CONTROL_TOKEN_LEN {
            if buf == BACK {
                return DecodeOutcome::ControlBackpressure { consumed: CONTROL_TOKEN_LEN };
            }
            if buf == DONE {
                return DecodeOutcome::ControlDone { consumed: CONTROL_TOKEN_LEN };
            }
        }

        if buf.len() < Self::RECORD_LEN {
            return DecodeOutcome::Incomplete;
        }

        let mut record = &buf[..Self::RECORD_LEN];
        let tuple = TupleIn {
            a: record.get_i32(),
            b: record.get_i32(),
            c: record.get_i32(),
            d: record.get_i32(),
            e: record.get_i32(),
        };
        DecodeOutcome::Record { tuple, consumed: Self::RECORD_LEN }
    }

    fn encode(&self, tuple: &TupleOut, buf: &mut BytesMut) {
        buf.reserve(Self::RECORD_LEN);
        buf.put_i32(tuple.a);
        buf.put_i32(tuple.b);
        buf.put_i32(tuple.c);
        buf.put_i32(tuple.d);
        buf.put_i32(tuple.e);
    }

    fn max_frame_len(&self) -> usize {
        Self::RECORD_LEN
    }
}
