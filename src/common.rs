/// Fields every entity kind carries
///
/// Symbol, issue symbol, participant id and the four transport timestamps.
/// After iteration, an issue symbol seen this message replaces the symbol,
/// and a symbol suffix stands in for a missing participant id.

use crate::derived::{fallback_part_id, promote_issue_symbol};
use crate::dispatch::FieldBinding;
use crate::field_state::{decay_all, Tracked};
use crate::message::FieldType;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommonFields {
    pub symbol: Tracked<Option<String>>,
    pub issue_symbol: Tracked<Option<String>>,
    pub part_id: Tracked<Option<String>>,
    pub src_time: Tracked<Option<DateTime<Utc>>>,
    pub activity_time: Tracked<Option<DateTime<Utc>>>,
    pub line_time: Tracked<Option<DateTime<Utc>>>,
    pub send_time: Tracked<Option<DateTime<Utc>>>,
    #[serde(skip)]
    got_part_id: bool,
    #[serde(skip)]
    got_issue_symbol: bool,
}

impl CommonFields {
    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_str()
    }

    pub fn part_id(&self) -> Option<&str> {
        self.part_id.as_str()
    }

    pub(crate) fn begin_message(&mut self) {
        self.got_part_id = false;
        self.got_issue_symbol = false;
    }

    pub(crate) fn decay(&mut self) {
        decay_all!(self; symbol, issue_symbol, part_id, src_time, activity_time, line_time, send_time);
    }

    pub(crate) fn resolve(&mut self) {
        promote_issue_symbol(&self.issue_symbol, &mut self.symbol, self.got_issue_symbol);
        fallback_part_id(&self.symbol, &mut self.part_id, self.got_part_id);
    }
}

/// Caches embedding `CommonFields`
pub(crate) trait HasCommon {
    fn common_mut(&mut self) -> &mut CommonFields;
}

pub(crate) fn common_bindings<C: HasCommon>() -> Vec<FieldBinding<C>> {
    let bind = FieldBinding::<C>::new;
    vec![
        bind("wSymbol", FieldType::String, |c, v| {
            c.common_mut().symbol.set(Some(v.as_text()?));
            Ok(())
        }),
        bind("wIssueSymbol", FieldType::String, |c, v| {
            let common = c.common_mut();
            common.issue_symbol.set(Some(v.as_text()?));
            common.got_issue_symbol = true;
            Ok(())
        }),
        bind("wPartId", FieldType::String, |c, v| {
            let common = c.common_mut();
            common.part_id.set(Some(v.as_text()?));
            common.got_part_id = true;
            Ok(())
        }),
        bind("wSrcTime", FieldType::DateTime, |c, v| {
            c.common_mut().src_time.set(Some(v.as_datetime()?));
            Ok(())
        }),
        bind("wActivityTime", FieldType::DateTime, |c, v| {
            c.common_mut().activity_time.set(Some(v.as_datetime()?));
            Ok(())
        }),
        bind("wLineTime", FieldType::DateTime, |c, v| {
            c.common_mut().line_time.set(Some(v.as_datetime()?));
            Ok(())
        }),
        bind("MamaSendTime", FieldType::DateTime, |c, v| {
            c.common_mut().send_time.set(Some(v.as_datetime()?));
            Ok(())
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_state::FieldState;
    use crate::message::FieldValue;

    #[derive(Default)]
    struct Holder {
        common: CommonFields,
    }

    impl HasCommon for Holder {
        fn common_mut(&mut self) -> &mut CommonFields {
            &mut self.common
        }
    }

    fn apply(holder: &mut Holder, name: &str, value: FieldValue) {
        let binding = common_bindings::<Holder>().into_iter().find(|b| b.name == name).unwrap();
        (binding.apply)(holder, &value).unwrap();
    }

    #[test]
    fn test_issue_symbol_replaces_symbol() {
        let mut holder = Holder::default();
        holder.common.begin_message();
        apply(&mut holder, "wSymbol", FieldValue::String("IBM".into()));
        apply(&mut holder, "wIssueSymbol", FieldValue::String("IBM.N".into()));
        holder.common.resolve();

        assert_eq!(holder.common.symbol(), Some("IBM.N"));
        assert_eq!(holder.common.part_id(), Some("N"));
    }

    #[test]
    fn test_explicit_part_id_blocks_fallback() {
        let mut holder = Holder::default();
        holder.common.begin_message();
        apply(&mut holder, "wSymbol", FieldValue::String("IBM.N".into()));
        apply(&mut holder, "wPartId", FieldValue::String("P".into()));
        holder.common.resolve();
        assert_eq!(holder.common.part_id(), Some("P"));

        holder.common.decay();
        holder.common.begin_message();
        holder.common.resolve();
        // no part id this time, so the suffix is derived again
        assert_eq!(holder.common.part_id(), Some("N"));
        assert_eq!(holder.common.part_id.state(), FieldState::Modified);
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let mut holder = Holder::default();
        let binding = common_bindings::<Holder>().into_iter().find(|b| b.name == "wSrcTime").unwrap();
        assert!((binding.apply)(&mut holder, &FieldValue::F64(1.0)).is_err());
        assert_eq!(holder.common.src_time.state(), FieldState::Uninitialized);
    }
}
