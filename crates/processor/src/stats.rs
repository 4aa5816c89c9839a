//! Run counters
//!
//! Best-effort tallies reported when the loop stops. `filtered` has no
//! producer and always reads zero.

use std::fmt;
use tracing::info;

/// Message count and byte total
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub count: u64,
    pub bytes: u64,
}

impl Tally {
    pub fn record(&mut self, bytes: usize) {
        self.count += 1;
        self.bytes += bytes as u64;
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} blocks and {} bytes", self.count, self.bytes)
    }
}

/// Counters for one run of the consume loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunCounters {
    /// Every consumed message, whatever happened to it
    pub received: Tally,
    /// Messages transcoded and handed to the producer
    pub sent: Tally,
    pub filtered: Tally,
    /// End-of-partition events seen while exit-on-eof is set
    pub eof_count: u32,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&mut self, bytes: usize) {
        self.received.record(bytes);
    }

    pub fn record_sent(&mut self, bytes: usize) {
        self.sent.record(bytes);
    }

    /// Count an end-of-partition event and return the new total
    pub fn record_eof(&mut self) -> u32 {
        self.eof_count += 1;
        self.eof_count
    }

    /// Write the summary to the log
    pub fn log_summary(&self) {
        info!(
            received = self.received.count,
            received_bytes = self.received.bytes,
            sent = self.sent.count,
            sent_bytes = self.sent.bytes,
            filtered = self.filtered.count,
            "Run summary"
        );
    }
}

impl fmt::Display for RunCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "consumed : {}", self.received)?;
        write!(f, "published : {}", self.sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_empty() {
        let counters = RunCounters::new();
        assert_eq!(counters.received, Tally::default());
        assert_eq!(counters.sent, Tally::default());
        assert_eq!(counters.filtered, Tally::default());
        assert_eq!(counters.eof_count, 0);
    }

    #[test]
    fn test_counter_increments() {
        let mut counters = RunCounters::new();

        counters.record_received(120);
        counters.record_received(0);
        counters.record_sent(260);

        assert_eq!(counters.received, Tally { count: 2, bytes: 120 });
        assert_eq!(counters.sent, Tally { count: 1, bytes: 260 });
        assert_eq!(counters.record_eof(), 1);
        assert_eq!(counters.record_eof(), 2);
    }

    #[test]
    fn test_summary_format() {
        let mut counters = RunCounters::new();
        counters.record_received(10);
        counters.record_sent(33);

        assert_eq!(
            counters.to_string(),
            "consumed : 1 blocks and 10 bytes\npublished : 1 blocks and 33 bytes"
        );
    }
}
