/// Derived-field policies
///
/// Cross-field rules run after field iteration, which a single field updater
/// cannot express.

use crate::field_state::Tracked;
use chrono::{DateTime, Utc};

/// Exchange suffix of a composite symbol: the text after the last `.`,
/// if there is any.
pub fn participant_suffix(symbol: &str) -> Option<&str> {
    let (_, suffix) = symbol.rsplit_once('.')?;
    if suffix.is_empty() {
        None
    } else {
        Some(suffix)
    }
}

/// Fills the participant id from the symbol suffix when the message did
/// not carry one. Returns whether the participant id was derived.
pub(crate) fn fallback_part_id(
    symbol: &Tracked<Option<String>>,
    part_id: &mut Tracked<Option<String>>,
    got_part_id: bool,
) -> bool {
    if got_part_id {
        return false;
    }
    let Some(suffix) = symbol.as_str().and_then(participant_suffix) else {
        return false;
    };
    part_id.set(Some(suffix.to_string()));
    true
}

/// Issue symbol, when present this message, replaces the symbol
pub(crate) fn promote_issue_symbol(
    issue_symbol: &Tracked<Option<String>>,
    symbol: &mut Tracked<Option<String>>,
    got_issue_symbol: bool,
) {
    if got_issue_symbol {
        symbol.set(issue_symbol.value().clone());
    }
}

/// Overwrites the event time from a dedicated correction or cancel time,
/// when that time is set. Returns whether the event time changed.
pub(crate) fn promote_event_time(
    source: &Tracked<Option<DateTime<Utc>>>,
    event_time: &mut Tracked<Option<DateTime<Utc>>>,
) -> bool {
    match source.get() {
        Some(time) => {
            event_time.set(Some(time));
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_state::FieldState;
    use chrono::TimeZone;

    fn symbol(s: &str) -> Tracked<Option<String>> {
        let mut t = Tracked::default();
        t.set(Some(s.to_string()));
        t
    }

    #[test]
    fn test_participant_suffix() {
        assert_eq!(participant_suffix("IBM.N"), Some("N"));
        assert_eq!(participant_suffix("BRK.A.N"), Some("N"));
        assert_eq!(participant_suffix("IBM."), None);
        assert_eq!(participant_suffix("IBM"), None);
    }

    #[test]
    fn test_fallback_part_id() {
        let mut part_id = Tracked::default();
        assert!(fallback_part_id(&symbol("IBM.N"), &mut part_id, false));
        assert_eq!(part_id.as_str(), Some("N"));
        assert_eq!(part_id.state(), FieldState::Modified);
    }

    #[test]
    fn test_fallback_skipped_for_empty_suffix() {
        let mut part_id = Tracked::default();
        assert!(!fallback_part_id(&symbol("IBM."), &mut part_id, false));
        assert_eq!(part_id.state(), FieldState::Uninitialized);
    }

    #[test]
    fn test_explicit_part_id_wins() {
        let mut part_id = Tracked::default();
        part_id.set(Some("P".to_string()));
        part_id.decay();
        assert!(!fallback_part_id(&symbol("IBM.N"), &mut part_id, true));
        assert_eq!(part_id.as_str(), Some("P"));
        assert_eq!(part_id.state(), FieldState::Unmodified);
    }

    #[test]
    fn test_promote_event_time() {
        let mut event_time = Tracked::default();
        let mut cancel_time: Tracked<Option<DateTime<Utc>>> = Tracked::default();
        assert!(!promote_event_time(&cancel_time, &mut event_time));

        let t = Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap();
        cancel_time.set(Some(t));
        assert!(promote_event_time(&cancel_time, &mut event_time));
        assert_eq!(event_time.get(), Some(t));
        assert!(event_time.is_modified());
    }
}
