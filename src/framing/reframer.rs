use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::session::relay_error::RelayError;
use crate::tuple::codec::{DecodeOutcome, TupleCodec};
use crate::tuple::tuple::TupleIn;

/// A complete frame peeled off the byte stream by the [Reframer]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Frame {
    Tuple(TupleIn),
    Backpressure,
    Done,
    /// `skipped` bytes did not match the wire format and were dropped
    Malformed { skipped: usize },
}

/// Turns a sequence of arbitrarily split chunks into frames, carrying over a trailing partial
///  frame from one chunk to the next.
///
/// The carry-over buffer is bounded: a partial frame longer than `capacity` breaks the
///  invariant that the carry always holds a prefix of a single frame, and is reported as
///  [RelayError::ProtocolViolation].
///
/// Byte accounting: `consumed_since_reset() + pending() == pushed_since_reset()` holds whenever
///  no [Frames] iterator is alive. 'Consumed' covers tuple frames and skipped malformed bytes;
///  control tokens reset both sides.
pub struct Reframer<C: TupleCodec> {
    codec: C,
    carry: BytesMut,
    capacity: usize,
    pushed_since_reset: usize,
    consumed_since_reset: usize,
}

impl <C: TupleCodec> Reframer<C> {
    pub fn new(codec: C) -> Reframer<C> {
        let capacity = codec.max_frame_len();
        Self::with_capacity(codec, capacity)
    }

    pub fn with_capacity(codec: C, capacity: usize) -> Reframer<C> {
        Reframer {
            codec,
            carry: BytesMut::with_capacity(capacity),
            capacity,
            pushed_since_reset: 0,
            consumed_since_reset: 0,
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// number of bytes carried over, waiting for the rest of their frame
    pub fn pending(&self) -> usize {
        self.carry.len()
    }

    pub fn pushed_since_reset(&self) -> usize {
        self.pushed_since_reset
    }

    pub fn consumed_since_reset(&self) -> usize {
        self.consumed_since_reset
    }

    /// Feed a freshly received chunk. The returned iterator yields the frames that are complete
    ///  after combining the chunk with previously carried-over bytes. It must be drained before
    ///  the next call: bytes the iterator was not advanced over are lost.
    ///
    /// After [Frame::Done] or an error, the rest of the chunk is discarded and the iterator is
    ///  exhausted.
    pub fn push<'a>(&'a mut self, chunk: &'a [u8]) -> Frames<'a, C> {
        self.pushed_since_reset += chunk.len();
        Frames {
            reframer: self,
            chunk,
            cursor: 0,
            finished: false,
        }
    }

    /// Drop all carried-over state, e.g. when a session is aborted
    pub fn reset(&mut self) {
        self.carry.clear();
        self.pushed_since_reset = 0;
        self.consumed_since_reset = 0;
    }

    fn reset_after_token(&mut self, unread_in_chunk: usize) {
        self.pushed_since_reset = self.carry.len() + unread_in_chunk;
        self.consumed_since_reset = 0;
    }
}

/// Lazily decodes one chunk; see [Reframer::push]
pub struct Frames<'a, C: TupleCodec> {
    reframer: &'a mut Reframer<C>,
    chunk: &'a [u8],
    cursor: usize,
    finished: bool,
}

/// What a single decode step decided, before it is translated into a [Frame]
enum Step {
    Consumed(DecodeOutcome, usize),
    NeedMore,
}

impl <C: TupleCodec> Frames<'_, C> {
    /// the reframer's codec, e.g. for encoding egress while this iterator is alive
    pub fn codec(&self) -> &C {
        &self.reframer.codec
    }

    fn decode_step(&mut self) -> Result<Step, RelayError> {
        let chunk = self.chunk;
        let reframer = &mut *self.reframer;
        let remaining = &chunk[self.cursor..];

        if reframer.carry.is_empty() {
            // fast path: decode straight from the chunk
            let outcome = reframer.codec.decode(remaining);
            return match consumed_len(&reframer.codec, &outcome, remaining) {
                Some(n) => {
                    self.cursor += n;
                    Ok(Step::Consumed(outcome, n))
                }
                None => {
                    if remaining.len() > reframer.capacity {
                        return Err(RelayError::ProtocolViolation { pending: remaining.len(), capacity: reframer.capacity });
                    }
                    reframer.carry.extend_from_slice(remaining);
                    self.cursor = chunk.len();
                    Ok(Step::NeedMore)
                }
            };
        }

        // combine the carry with as much of the chunk as fits
        let carried = reframer.carry.len();
        let appended = remaining.len().min(reframer.capacity.saturating_sub(carried));
        reframer.carry.extend_from_slice(&remaining[..appended]);

        let outcome = reframer.codec.decode(&reframer.carry);
        match consumed_len(&reframer.codec, &outcome, &reframer.carry) {
            Some(n) => {
                if n >= carried {
                    self.cursor += n - carried;
                    reframer.carry.clear();
                }
                else {
                    // the frame ended inside the old carry: give the appended bytes back
                    reframer.carry.truncate(carried);
                    reframer.carry.advance(n);
                }
                Ok(Step::Consumed(outcome, n))
            }
            None => {
                if appended < remaining.len() {
                    return Err(RelayError::ProtocolViolation { pending: carried + remaining.len(), capacity: reframer.capacity });
                }
                self.cursor = chunk.len();
                Ok(Step::NeedMore)
            }
        }
    }

    fn fail(&mut self) {
        self.finished = true;
        self.reframer.reset();
    }
}

/// the number of bytes a decode outcome accounts for, or `None` for 'need more bytes'
fn consumed_len<C: TupleCodec>(codec: &C, outcome: &DecodeOutcome, buf: &[u8]) -> Option<usize> {
    match outcome {
        DecodeOutcome::Record { consumed, .. } => Some(*consumed),
        DecodeOutcome::ControlBackpressure { consumed } => Some(*consumed),
        DecodeOutcome::ControlDone { consumed } => Some(*consumed),
        DecodeOutcome::Malformed => Some(codec.resync_len(buf).clamp(1, buf.len().max(1))),
        DecodeOutcome::Incomplete => None,
    }
}

impl <C: TupleCodec> Iterator for Frames<'_, C> {
    type Item = Result<Frame, RelayError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.cursor == self.chunk.len() {
            self.finished = true;
            return None;
        }

        let step = match self.decode_step() {
            Ok(step) => step,
            Err(e) => {
                self.fail();
                return Some(Err(e));
            }
        };

        match step {
            Step::NeedMore => {
                trace!(pending = self.reframer.pending(), "carrying over partial frame");
                self.finished = true;
                None
            }
            Step::Consumed(DecodeOutcome::Record { tuple, .. }, n) => {
                self.reframer.consumed_since_reset += n;
                Some(Ok(Frame::Tuple(tuple)))
            }
            Step::Consumed(DecodeOutcome::Malformed, n) => {
                self.reframer.consumed_since_reset += n;
                Some(Ok(Frame::Malformed { skipped: n }))
            }
            Step::Consumed(DecodeOutcome::ControlBackpressure { .. }, _) => {
                let unread = self.chunk.len() - self.cursor;
                self.reframer.reset_after_token(unread);
                Some(Ok(Frame::Backpressure))
            }
            Step::Consumed(DecodeOutcome::ControlDone { .. }, _) => {
                let discarded = self.reframer.pending() + (self.chunk.len() - self.cursor);
                if discarded > 0 {
                    debug!(discarded, "discarding bytes after end of stream");
                }
                self.finished = true;
                self.reframer.reset();
                Some(Ok(Frame::Done))
            }
            Step::Consumed(DecodeOutcome::Incomplete, _) => {
                // consumed_len never reports progress for an incomplete outcome
                self.finished = true;
                None
            }
        }
    }
}
