/// Sequence gap and duplicate detection
///
/// Tracks a per-instrument monotonic counter (quote count, trade count).
/// Publishers may conflate several updates into one message and say so with
/// an explicit conflation count, so the next expected counter is
/// `cached + conflation` rather than `cached + 1`.

use crate::field_state::FieldState;
use serde::Serialize;

/// Most recently detected gap, overwritten by each new one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GapWindow {
    begin: u64,
    end: u64,
    state: FieldState,
}

impl GapWindow {
    pub fn begin(&self) -> u64 {
        self.begin
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn state(&self) -> FieldState {
        self.state
    }

    /// Number of missing counter values
    pub fn missing(&self) -> u64 {
        if self.state.is_initialized() {
            self.end - self.begin + 1
        } else {
            0
        }
    }

    pub(crate) fn record(&mut self, begin: u64, end: u64) {
        self.begin = begin;
        self.end = end;
        self.state = FieldState::Modified;
    }

    pub(crate) fn decay(&mut self) {
        self.state = self.state.decayed();
    }
}

/// Outcome of one counter evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeqCheck {
    /// Inclusive span of missing counter values
    pub gap: Option<(u64, u64)>,
    /// The notification for this message should be suppressed
    pub duplicate: bool,
}

#[derive(Debug, Clone)]
pub struct SequenceTracker {
    cached: u64,
    conflation: u64,
    incoming: Option<u64>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        SequenceTracker {
            cached: 0,
            conflation: 1,
            incoming: None,
        }
    }

    /// Start of a message cycle: conflation back to 1, no counter seen
    pub fn begin_message(&mut self) {
        self.conflation = 1;
        self.incoming = None;
    }

    /// Counter field observed in the current message
    pub fn observe_count(&mut self, count: u64) {
        self.incoming = Some(count);
    }

    /// Explicit conflation count for the current message; zero is read as one
    pub fn set_conflation(&mut self, conflation: u64) {
        self.conflation = conflation.max(1);
    }

    /// Evaluates the counter seen this message, if any, and adopts it.
    ///
    /// Both checks compare against the counter cached before this message, so
    /// a message that opens a gap is never also reported as a duplicate.
    pub fn evaluate(&mut self, check_gaps: bool) -> SeqCheck {
        let Some(incoming) = self.incoming.take() else {
            return SeqCheck::default();
        };

        let previous = self.cached;
        let expected = previous.saturating_add(self.conflation);
        let mut check = SeqCheck::default();

        if check_gaps && previous > 0 {
            if incoming > expected {
                check.gap = Some((expected, incoming - 1));
            } else if incoming == previous {
                check.duplicate = true;
            }
        }

        self.cached = incoming;
        check
    }

    /// Last adopted counter; 0 means unknown
    pub fn cached(&self) -> u64 {
        self.cached
    }

    pub fn conflation(&self) -> u64 {
        self.conflation
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for SequenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn feed(tracker: &mut SequenceTracker, count: u64, conflation: Option<u64>) -> SeqCheck {
        tracker.begin_message();
        if let Some(c) = conflation {
            tracker.set_conflation(c);
        }
        tracker.observe_count(count);
        tracker.evaluate(true)
    }

    #[test]
    fn test_no_gaps() {
        let mut tracker = SequenceTracker::new();
        for i in 1..100 {
            assert_eq!(feed(&mut tracker, i, None), SeqCheck::default());
        }
        assert_eq!(tracker.cached(), 99);
    }

    #[test]
    fn test_single_gap() {
        let mut tracker = SequenceTracker::new();
        feed(&mut tracker, 10, None);
        let check = feed(&mut tracker, 14, None);

        assert_eq!(check.gap, Some((11, 13)));
        assert!(!check.duplicate);
        assert_eq!(tracker.cached(), 14);
    }

    #[test]
    fn test_conflation_is_not_a_gap() {
        let mut tracker = SequenceTracker::new();
        feed(&mut tracker, 10, None);
        let check = feed(&mut tracker, 13, Some(3));

        assert_eq!(check, SeqCheck::default());
        assert_eq!(tracker.cached(), 13);
    }

    #[test]
    fn test_gap_after_conflation() {
        let mut tracker = SequenceTracker::new();
        feed(&mut tracker, 10, None);
        let check = feed(&mut tracker, 20, Some(3));
        assert_eq!(check.gap, Some((13, 19)));
    }

    #[test]
    fn test_duplicate_is_one_shot() {
        let mut tracker = SequenceTracker::new();
        feed(&mut tracker, 5, None);
        assert!(feed(&mut tracker, 5, None).duplicate);
        assert!(!feed(&mut tracker, 6, None).duplicate);
    }

    #[test]
    fn test_first_count_is_adopted() {
        let mut tracker = SequenceTracker::new();
        assert_eq!(feed(&mut tracker, 500, None), SeqCheck::default());
        assert_eq!(tracker.cached(), 500);
    }

    #[test]
    fn test_recap_adopts_without_checks() {
        let mut tracker = SequenceTracker::new();
        feed(&mut tracker, 10, None);

        tracker.begin_message();
        tracker.observe_count(50);
        assert_eq!(tracker.evaluate(false), SeqCheck::default());
        assert_eq!(tracker.cached(), 50);

        tracker.begin_message();
        tracker.observe_count(50);
        assert_eq!(tracker.evaluate(false), SeqCheck::default());
    }

    #[test]
    fn test_absent_counter_is_never_checked() {
        let mut tracker = SequenceTracker::new();
        feed(&mut tracker, 10, None);
        tracker.begin_message();
        assert_eq!(tracker.evaluate(true), SeqCheck::default());
        assert_eq!(tracker.cached(), 10);
    }

    #[test]
    fn test_gap_window() {
        let mut window = GapWindow::default();
        assert_eq!(window.missing(), 0);
        window.record(11, 13);
        assert_eq!(window.missing(), 3);
        assert_eq!(window.state(), FieldState::Modified);
        window.decay();
        assert_eq!(window.state(), FieldState::Unmodified);
        window.record(20, 20);
        assert_eq!((window.begin(), window.end()), (20, 20));
    }

    #[test]
    fn test_reset() {
        let mut tracker = SequenceTracker::new();
        feed(&mut tracker, 10, Some(4));
        tracker.reset();
        assert_eq!(tracker.cached(), 0);
        assert_eq!(tracker.conflation(), 1);
    }

    proptest! {
        #[test]
        fn prop_gap_span_matches_arithmetic(cached in 1u64..1_000_000, conflation in 1u64..10, jump in 0u64..1000) {
            let mut tracker = SequenceTracker::new();
            feed(&mut tracker, cached, None);

            let incoming = cached + jump;
            let check = feed(&mut tracker, incoming, Some(conflation));

            if incoming > cached + conflation {
                prop_assert_eq!(check.gap, Some((cached + conflation, incoming - 1)));
            } else {
                prop_assert_eq!(check.gap, None);
            }
            prop_assert_eq!(check.duplicate, jump == 0);
            prop_assert_eq!(tracker.cached(), incoming);
        }
    }
}
