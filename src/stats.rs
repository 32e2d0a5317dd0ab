/// Listener statistics
///
/// Per-listener counters: messages processed, notifications delivered,
/// duplicates suppressed, gaps and malformed fields.

use crate::listener::MsgOutcome;
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct ListenerStats {
    start_time: Option<Instant>,
    total_messages: u64,
    not_ready: u64,
    ignored: u64,
    recaps: u64,
    notifications: u64,
    duplicates: u64,

    // Gap tracking
    total_gaps: u64,
    gap_events: u64,

    field_errors: u64,
}

impl ListenerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message that went through field iteration
    pub fn record_message(&mut self) {
        if self.start_time.is_none() {
            self.start_time = Some(Instant::now());
        }
        self.total_messages += 1;
    }

    pub fn record_recap(&mut self) {
        self.recaps += 1;
    }

    /// Record how a message ended
    pub fn record_outcome(&mut self, outcome: MsgOutcome) {
        match outcome {
            MsgOutcome::Delivered => self.notifications += 1,
            MsgOutcome::Suppressed => self.duplicates += 1,
            MsgOutcome::NotReady => self.not_ready += 1,
            MsgOutcome::Ignored => self.ignored += 1,
            MsgOutcome::Unchanged => {}
        }
    }

    /// Record a gap event of `missing` counter values
    pub fn record_gap(&mut self, missing: u64) {
        self.total_gaps = self.total_gaps.saturating_add(missing);
        self.gap_events += 1;
    }

    pub fn record_field_errors(&mut self, count: usize) {
        self.field_errors += count as u64;
    }

    /// Get messages per second
    pub fn messages_per_sec(&self) -> f64 {
        match self.start_time {
            None => 0.0,
            Some(start) => {
                let elapsed = start.elapsed().as_secs_f64();
                if elapsed > 0.0 {
                    self.total_messages as f64 / elapsed
                } else {
                    0.0
                }
            }
        }
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.start_time.map(|st| st.elapsed())
    }

    pub fn total_messages(&self) -> u64 {
        self.total_messages
    }

    pub fn not_ready(&self) -> u64 {
        self.not_ready
    }

    pub fn ignored(&self) -> u64 {
        self.ignored
    }

    pub fn recaps(&self) -> u64 {
        self.recaps
    }

    pub fn notifications(&self) -> u64 {
        self.notifications
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    /// Total missing counter values across all gaps
    pub fn total_gaps(&self) -> u64 {
        self.total_gaps
    }

    pub fn gap_events(&self) -> u64 {
        self.gap_events
    }

    pub fn field_errors(&self) -> u64 {
        self.field_errors
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for ListenerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Listener Statistics ===")?;
        writeln!(f, "Messages: {} ({:.2}/sec)", self.total_messages, self.messages_per_sec())?;
        writeln!(f, "Recaps: {}", self.recaps)?;
        writeln!(f, "Notifications: {}", self.notifications)?;
        writeln!(f, "Duplicates suppressed: {}", self.duplicates)?;
        writeln!(f, "Dropped (not ready): {}, ignored: {}", self.not_ready, self.ignored)?;
        writeln!(f, "Field errors: {}", self.field_errors)?;
        write!(f, "Gaps: {} total, {} events", self.total_gaps, self.gap_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_message() {
        let mut stats = ListenerStats::new();
        stats.record_message();
        assert_eq!(stats.total_messages(), 1);
        assert!(stats.elapsed().is_some());
    }

    #[test]
    fn test_outcomes() {
        let mut stats = ListenerStats::new();
        stats.record_outcome(MsgOutcome::Delivered);
        stats.record_outcome(MsgOutcome::Delivered);
        stats.record_outcome(MsgOutcome::Suppressed);
        stats.record_outcome(MsgOutcome::NotReady);
        stats.record_outcome(MsgOutcome::Unchanged);
        assert_eq!(stats.notifications(), 2);
        assert_eq!(stats.duplicates(), 1);
        assert_eq!(stats.not_ready(), 1);
    }

    #[test]
    fn test_gaps() {
        let mut stats = ListenerStats::new();
        stats.record_gap(5);
        stats.record_gap(3);
        assert_eq!(stats.total_gaps(), 8);
        assert_eq!(stats.gap_events(), 2);
    }

    #[test]
    fn test_summary() {
        let mut stats = ListenerStats::new();
        stats.record_gap(2);
        let summary = stats.to_string();
        assert!(summary.starts_with("=== Listener Statistics ==="));
        assert!(summary.ends_with("Gaps: 2 total, 1 events"));
    }
}
