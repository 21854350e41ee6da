use tracing::{debug, trace};

use crate::operator::clock::Clock;
use crate::session::metrics::SessionMetrics;
use crate::tuple::tuple::{TupleIn, TupleOut};

/// The predicate of the filter operator
pub fn filter(tuple: &TupleIn) -> bool {
    tuple.a > 0
}

/// Filter-then-map over decoded tuples, with sequence tracking on the way.
pub struct Pipeline<K: Clock> {
    clock: K,
    show_tuples: bool,
}

impl <K: Clock> Pipeline<K> {
    pub fn new(clock: K, show_tuples: bool) -> Pipeline<K> {
        Pipeline {
            clock,
            show_tuples,
        }
    }

    /// The map operator: attach the current monotonic timestamp
    pub fn map(&self, tuple: &TupleIn) -> TupleOut {
        TupleOut::enrich(tuple, self.clock.now_nanos())
    }

    /// Account for a decoded tuple and return its enriched form if it passes the filter.
    ///
    /// The sequence check runs for every tuple regardless of the filter: a `b` that differs from
    ///  the expected id counts as one gap, and the expectation continues from the tuple's `b`.
    pub fn process(&self, tuple: &TupleIn, metrics: &mut SessionMetrics) -> Option<TupleOut> {
        if self.show_tuples {
            trace!(?tuple, "received tuple");
        }

        metrics.tuples_received += 1;
        if tuple.b != metrics.next_expected_b {
            debug!(expected = metrics.next_expected_b, actual = tuple.b, "gap in tuple sequence");
            metrics.sequence_gaps += 1;
        }
        metrics.next_expected_b = tuple.b.wrapping_add(1);

        if !filter(tuple) {
            return None;
        }
        metrics.tuples_passed += 1;
        Some(self.map(tuple))
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;
    use crate::operator::clock::MockClock;

    fn pipeline_with_fixed_clock(nanos: u64) -> Pipeline<MockClock> {
        let mut clock = MockClock::new();
        clock.expect_now_nanos()
            .returning(move || nanos);
        Pipeline::new(clock, true)
    }

    #[rstest]
    #[case::positive(1, true)]
    #[case::large(i32::MAX, true)]
    #[case::zero(0, false)]
    #[case::negative(-1, false)]
    fn test_filter(#[case] a: i32, #[case] expected: bool) {
        assert_eq!(filter(&TupleIn::new(a, 0, 0, 0, 0)), expected);
    }

    #[test]
    fn test_map_attaches_timestamp() {
        let pipeline = pipeline_with_fixed_clock(4711);
        let mapped = pipeline.map(&TupleIn::new(1, 2, 3, 4, 5));
        assert_eq!(mapped, TupleOut { a: 1, b: 2, c: 3, d: 4, e: 5, ts: 4711 });
    }

    #[test]
    fn test_map_only_for_passing_tuples() {
        let mut clock = MockClock::new();
        clock.expect_now_nanos()
            .times(1)
            .returning(|| 99);
        let pipeline = Pipeline::new(clock, false);
        let mut metrics = SessionMetrics::default();

        assert_eq!(pipeline.process(&TupleIn::new(-5, 0, 1, 1, 1), &mut metrics), None);
        assert_eq!(pipeline.process(&TupleIn::new(5, 1, 1, 1, 1), &mut metrics), Some(TupleOut { a: 5, b: 1, c: 1, d: 1, e: 1, ts: 99 }));
        assert_eq!(metrics.tuples_received, 2);
        assert_eq!(metrics.tuples_passed, 1);
        assert_eq!(metrics.sequence_gaps, 0);
    }

    #[test]
    fn test_sequence_gaps() {
        let pipeline = pipeline_with_fixed_clock(0);
        let mut metrics = SessionMetrics::default();

        for (b, expected_gaps) in [(0, 0), (1, 0), (2, 0), (4, 1), (5, 1)] {
            pipeline.process(&TupleIn::new(1, b, 0, 0, 0), &mut metrics);
            assert_eq!(metrics.sequence_gaps, expected_gaps, "after b={}", b);
        }
        assert_eq!(metrics.next_expected_b, 6);
        assert_eq!(metrics.last_tuple_id(), 5);
    }

    #[test]
    fn test_sequence_gaps_counted_for_filtered_tuples() {
        let pipeline = pipeline_with_fixed_clock(0);
        let mut metrics = SessionMetrics::default();

        pipeline.process(&TupleIn::new(-1, 3, 0, 0, 0), &mut metrics);
        pipeline.process(&TupleIn::new(-1, 4, 0, 0, 0), &mut metrics);
        pipeline.process(&TupleIn::new(-1, 2, 0, 0, 0), &mut metrics);
        assert_eq!(metrics.sequence_gaps, 2);
        assert_eq!(metrics.next_expected_b, 3);
        assert_eq!(metrics.tuples_passed, 0);
    }

    #[test]
    fn test_sequence_wraps_at_max() {
        let pipeline = pipeline_with_fixed_clock(0);
        let mut metrics = SessionMetrics { next_expected_b: i32::MAX, ..Default::default() };
        pipeline.process(&TupleIn::new(1, i32::MAX, 0, 0, 0), &mut metrics);
        assert_eq!(metrics.next_expected_b, i32::MIN);
        assert_eq!(metrics.sequence_gaps, 0);
    }
}
