use std::fmt::{Display, Formatter};
use std::time::Duration;

use tokio::time::Instant;

/// Counters and timestamps of a single session. `next_expected_b` doubles as the sequence
///  expectation that the pipeline checks incoming tuples against.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SessionMetrics {
    pub bytes_received: u64,
    pub tuples_received: u64,
    pub tuples_passed: u64,
    pub sequence_gaps: u64,
    pub next_expected_b: i32,
    pub malformed_frames: u64,
    pub bytes_forwarded: u64,
    /// when the first chunk arrived from the Source
    pub start: Option<Instant>,
    /// when the end of the stream was detected
    pub stop: Option<Instant>,
}

impl SessionMetrics {
    pub fn last_tuple_id(&self) -> i32 {
        self.next_expected_b.wrapping_sub(1)
    }

    /// time from the first received byte until the end of the stream, if both happened
    pub fn elapsed(&self) -> Option<Duration> {
        match (self.start, self.stop) {
            (Some(start), Some(stop)) => Some(stop.saturating_duration_since(start)),
            _ => None,
        }
    }
}

impl Display for SessionMetrics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Total number of bytes received: {}", self.bytes_received)?;
        writeln!(f, "Number of tuples processed: {} of which {} passed the predicate", self.tuples_received, self.tuples_passed)?;
        writeln!(f, "Skipped tuples: {}", self.sequence_gaps)?;
        writeln!(f, "Last tuple id: {}", self.last_tuple_id())?;
        writeln!(f, "Malformed frames: {}", self.malformed_frames)?;
        writeln!(f, "Bytes forwarded to destination: {}", self.bytes_forwarded)?;
        match self.elapsed() {
            Some(elapsed) => write!(f, "{}.{:09}s ({}ns) passed after the first tuple was received",
                                    elapsed.as_secs(), elapsed.subsec_nanos(), elapsed.as_nanos()),
            None => write!(f, "end of stream was not reached"),
        }
    }
}
