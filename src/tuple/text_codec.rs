use std::fmt::Write;

use bytes::BytesMut;

use crate::tuple::codec::{DecodeOutcome, TupleCodec, BACK, DONE};
use crate::tuple::tuple::{TupleIn, TupleOut};

/// The structured text encoding `{ "a" : 1 , "b" : 2 , "c" : 3 , "d" : 4 , "e" : 5 }`.
///
/// Every position where the canonical form has whitespace (and the position before a frame)
///  accepts any amount of ASCII whitespace, including none, so the compact egress form
///  `{"a":1,"b":2,"c":3,"d":4,"e":5,"ts":6}` is decodable as well. The optional `"ts"` member is
///  accepted and ignored.
///
/// Decoding is incremental: a span that ends while still matching the grammar is
///  [DecodeOutcome::Incomplete], and the span is only [DecodeOutcome::Malformed] once a byte
///  contradicts the grammar.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextCodec;

impl TextCodec {
    pub const MAX_FRAME_LEN: usize = 400;

    const FIELD_NAMES: [&'static [u8]; 5] = [b"\"a\"", b"\"b\"", b"\"c\"", b"\"d\"", b"\"e\""];
    const TS_NAME: &'static [u8] = b"\"ts\"";
}

impl TupleCodec for TextCodec {
    fn decode(&self, buf: &[u8]) -> DecodeOutcome {
        let mut cursor = Cursor { buf, pos: 0 };
        cursor.skip_whitespace();

        let outcome = match cursor.peek() {
            None => Err(Stop::Incomplete),
            Some(b'B') => cursor.literal(BACK)
                .map(|_| DecodeOutcome::ControlBackpressure { consumed: cursor.pos }),
            Some(b'D') => cursor.literal(DONE)
                .map(|_| DecodeOutcome::ControlDone { consumed: cursor.pos }),
            Some(b'{') => cursor.record()
                .map(|tuple| DecodeOutcome::Record { tuple, consumed: cursor.pos }),
            Some(_) => Err(Stop::Malformed),
        };

        match outcome {
            Ok(o) => o,
            Err(Stop::Incomplete) => DecodeOutcome::Incomplete,
            Err(Stop::Malformed) => DecodeOutcome::Malformed,
        }
    }

    fn encode(&self, tuple: &TupleOut, buf: &mut BytesMut) {
        // writing to a BytesMut grows the buffer and can not fail
        let _ = write!(buf, "{{\"a\":{},\"b\":{},\"c\":{},\"d\":{},\"e\":{},\"ts\":{}}}",
                       tuple.a, tuple.b, tuple.c, tuple.d, tuple.e, tuple.ts);
    }

    /// skip to the next byte that can start a frame
    fn resync_len(&self, buf: &[u8]) -> usize {
        buf.iter()
            .skip(1)
            .position(|b| matches!(b, b'{' | b'B' | b'D'))
            .map(|n| n + 1)
            .unwrap_or(buf.len().max(1))
    }

    fn max_frame_len(&self) -> usize {
        Self::MAX_FRAME_LEN
    }
}

enum Stop {
    Incomplete,
    Malformed,
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if !b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }

    /// NB: does not skip leading whitespace
    fn literal(&mut self, literal: &[u8]) -> Result<(), Stop> {
        let rest = &self.buf[self.pos..];
        let n = rest.len().min(literal.len());
        if rest[..n] != literal[..n] {
            return Err(Stop::Malformed);
        }
        if n < literal.len() {
            return Err(Stop::Incomplete);
        }
        self.pos += literal.len();
        Ok(())
    }

    fn token(&mut self, literal: &[u8]) -> Result<(), Stop> {
        self.skip_whitespace();
        self.literal(literal)
    }

    fn integer(&mut self) -> Result<i64, Stop> {
        self.skip_whitespace();

        let negative = match self.peek() {
            Some(b'-') => { self.pos += 1; true }
            Some(b'+') => { self.pos += 1; false }
            _ => false,
        };

        let mut value: i64 = 0;
        let mut num_digits = 0;
        while let Some(b) = self.peek() {
            if !b.is_ascii_digit() {
                break;
            }
            let digit = (b - b'0') as i64;
            value = value.checked_mul(10)
                .and_then(|v| if negative { v.checked_sub(digit) } else { v.checked_add(digit) })
                .ok_or(Stop::Malformed)?;
            num_digits += 1;
            self.pos += 1;
        }

        if self.pos == self.buf.len() {
            // more digits may follow in the next chunk
            return Err(Stop::Incomplete);
        }
        if num_digits == 0 {
            return Err(Stop::Malformed);
        }
        Ok(value)
    }

    fn field(&mut self, name: &[u8]) -> Result<i64, Stop> {
        self.token(name)?;
        self.token(b":")?;
        self.integer()
    }

    fn record(&mut self) -> Result<TupleIn, Stop> {
        self.token(b"{")?;

        let mut values = [0i32; 5];
        for (i, name) in TextCodec::FIELD_NAMES.iter().enumerate() {
            if i > 0 {
                self.token(b",")?;
            }
            values[i] = i32::try_from(self.field(name)?)
                .map_err(|_| Stop::Malformed)?;
        }

        self.skip_whitespace();
        match self.peek() {
            None => return Err(Stop::Incomplete),
            Some(b'}') => self.pos += 1,
            Some(b',') => {
                // egress frames carry the enrichment timestamp
                self.pos += 1;
                let _ts = self.field(TextCodec::TS_NAME)?;
                self.token(b"}")?;
            }
            Some(_) => return Err(Stop::Malformed),
        }

        let [a, b, c, d, e] = values;
        Ok(TupleIn { a, b, c, d, e })
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;

    fn record(a: i32, b: i32, c: i32, d: i32, e: i32, consumed: usize) -> DecodeOutcome {
        DecodeOutcome::Record { tuple: TupleIn::new(a, b, c, d, e), consumed }
    }

    #[rstest]
    #[case::canonical(b"{ \"a\" : 1 , \"b\" : 2 , \"c\" : 3 , \"d\" : 4 , \"e\" : 5 }", record(1, 2, 3, 4, 5, 51))]
    #[case::compact(b"{\"a\":1,\"b\":0,\"c\":3,\"d\":4,\"e\":5}", record(1, 0, 3, 4, 5, 31))]
    #[case::negative(b"{\"a\":-1,\"b\":2,\"c\":-300,\"d\":+4,\"e\":-2147483648}", record(-1, 2, -300, 4, i32::MIN, 46))]
    #[case::trailing_not_consumed(b"{\"a\":1,\"b\":2,\"c\":3,\"d\":4,\"e\":5}   {", record(1, 2, 3, 4, 5, 31))]
    #[case::leading_whitespace(b"\n  {\"a\":1,\"b\":2,\"c\":3,\"d\":4,\"e\":5}", record(1, 2, 3, 4, 5, 34))]
    #[case::with_ts(b"{\"a\":1,\"b\":2,\"c\":3,\"d\":4,\"e\":5,\"ts\":987654321}", record(1, 2, 3, 4, 5, 46))]
    #[case::back(b"BACK{\"a\"", DecodeOutcome::ControlBackpressure { consumed: 4 })]
    #[case::done(b"DONE", DecodeOutcome::ControlDone { consumed: 4 })]
    #[case::done_after_whitespace(b" DONE", DecodeOutcome::ControlDone { consumed: 5 })]
    #[case::empty(b"", DecodeOutcome::Incomplete)]
    #[case::whitespace_only(b"  \n", DecodeOutcome::Incomplete)]
    #[case::partial_token(b"BA", DecodeOutcome::Incomplete)]
    #[case::partial_open(b"{", DecodeOutcome::Incomplete)]
    #[case::partial_name(b"{ \"a", DecodeOutcome::Incomplete)]
    #[case::partial_number(b"{\"a\":12", DecodeOutcome::Incomplete)]
    #[case::partial_sign(b"{\"a\":-", DecodeOutcome::Incomplete)]
    #[case::partial_before_brace(b"{\"a\":1,\"b\":2,\"c\":3,\"d\":4,\"e\":5 ", DecodeOutcome::Incomplete)]
    #[case::partial_ts(b"{\"a\":1,\"b\":2,\"c\":3,\"d\":4,\"e\":5,\"t", DecodeOutcome::Incomplete)]
    #[case::garbage(b"xyz", DecodeOutcome::Malformed)]
    #[case::broken_token(b"BAKE", DecodeOutcome::Malformed)]
    #[case::wrong_field(b"{\"a\":1,\"c\":2", DecodeOutcome::Malformed)]
    #[case::missing_number(b"{\"a\":,", DecodeOutcome::Malformed)]
    #[case::overflow(b"{\"a\":2147483648,\"b\":2,\"c\":3,\"d\":4,\"e\":5}", DecodeOutcome::Malformed)]
    #[case::huge_overflow(b"{\"a\":99999999999999999999999", DecodeOutcome::Malformed)]
    #[case::unknown_member(b"{\"a\":1,\"b\":2,\"c\":3,\"d\":4,\"e\":5,\"x\":1}", DecodeOutcome::Malformed)]
    fn test_decode(#[case] buf: &[u8], #[case] expected: DecodeOutcome) {
        assert_eq!(TextCodec.decode(buf), expected);
    }

    #[test]
    fn test_decode_every_strict_prefix_is_incomplete() {
        let frame = b"{ \"a\" : 1 , \"b\" : 2 , \"c\" : 3 , \"d\" : 4 , \"e\" : 5 }";
        for len in 0..frame.len() {
            assert_eq!(TextCodec.decode(&frame[..len]), DecodeOutcome::Incomplete, "prefix of length {}", len);
        }
    }

    #[test]
    fn test_encode() {
        let mut buf = BytesMut::new();
        TextCodec.encode(&TupleOut { a: 1, b: 2, c: -3, d: 4, e: 5, ts: 77 }, &mut buf);
        TextCodec.encode(&TupleOut { a: 6, b: 7, c: 8, d: 9, e: 10, ts: 0 }, &mut buf);
        assert_eq!(&buf[..], b"{\"a\":1,\"b\":2,\"c\":-3,\"d\":4,\"e\":5,\"ts\":77}{\"a\":6,\"b\":7,\"c\":8,\"d\":9,\"e\":10,\"ts\":0}");
    }

    #[rstest]
    #[case(TupleOut { a: 1, b: 2, c: 3, d: 4, e: 5, ts: 123 })]
    #[case(TupleOut { a: i32::MIN, b: i32::MAX, c: 0, d: -1, e: 1, ts: u32::MAX as u64 * 1000 })]
    fn test_encode_decode(#[case] tuple: TupleOut) {
        let mut buf = BytesMut::new();
        TextCodec.encode(&tuple, &mut buf);
        assert_eq!(TextCodec.decode(&buf), DecodeOutcome::Record { tuple: tuple.tuple_in(), consumed: buf.len() });
    }

    #[rstest]
    #[case::to_open_brace(b"xy{\"a\"", 2)]
    #[case::to_token(b"zzzDONE", 3)]
    #[case::skips_first_byte(b"BAKE{", 4)]
    #[case::nothing_found(b"xyz", 3)]
    fn test_resync_len(#[case] buf: &[u8], #[case] expected: usize) {
        assert_eq!(TextCodec.resync_len(buf), expected);
    }
}
