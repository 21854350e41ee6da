use std::fmt::{Debug, Formatter};

/// A single record as it arrives from the Source. `b` is the Source's sequence id, the other
///  fields are payload.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash)]
pub struct TupleIn {
    pub a: i32,
    pub b: i32,
    pub c: i32,
    pub d: i32,
    pub e: i32,
}

impl Debug for TupleIn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "TupleIn{{a:{}, b:{}, c:{}, d:{}, e:{}}}", self.a, self.b, self.c, self.d, self.e)
    }
}

impl TupleIn {
    pub const fn new(a: i32, b: i32, c: i32, d: i32, e: i32) -> TupleIn {
        TupleIn { a, b, c, d, e }
    }
}

/// A tuple that passed the filter, enriched with the monotonic timestamp (in nanoseconds) at
///  which it was mapped.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct TupleOut {
    pub a: i32,
    pub b: i32,
    pub c: i32,
    pub d: i32,
    pub e: i32,
    pub ts: u64,
}

impl TupleOut {
    pub fn enrich(tuple: &TupleIn, ts: u64) -> TupleOut {
        TupleOut {
            a: tuple.a,
            b: tuple.b,
            c: tuple.c,
            d: tuple.d,
            e: tuple.e,
            ts,
        }
    }

    /// the original five fields, without the enrichment
    pub fn tuple_in(&self) -> TupleIn {
        TupleIn::new(self.a, self.b, self.c, self.d, self.e)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_enrich_keeps_fields() {
        let tuple = TupleIn::new(1, 2, -3, 4, i32::MIN);
        let out = TupleOut::enrich(&tuple, 12345);
        assert_eq!(out.ts, 12345);
        assert_eq!(out.tuple_in(), tuple);
    }

    #[test]
    fn test_debug() {
        assert_eq!(format!("{:?}", TupleIn::new(1, 2, 3, 4, -5)), "TupleIn{a:1, b:2, c:3, d:4, e:-5}");
    }
}
