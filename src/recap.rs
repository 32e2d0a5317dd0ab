/// Recap snapshots
///
/// A `Recap<F>` is an owned copy of a kind's field view taken under the
/// listener's lock. Every field type is owned or `Copy`, so nothing in the
/// snapshot aliases the live cache.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ops::Deref;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recap<F> {
    captured_at: DateTime<Utc>,
    #[serde(flatten)]
    fields: F,
}

impl<F: Clone> Recap<F> {
    pub fn capture(view: &F) -> Self {
        Recap {
            captured_at: Utc::now(),
            fields: view.clone(),
        }
    }
}

impl<F> Recap<F> {
    pub fn fields(&self) -> &F {
        &self.fields
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn into_fields(self) -> F {
        self.fields
    }
}

impl<F> Deref for Recap<F> {
    type Target = F;

    fn deref(&self) -> &F {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_state::Tracked;
    use crate::price::Price;

    #[derive(Debug, Clone, Default, PartialEq, Serialize)]
    struct View {
        price: Tracked<Price>,
    }

    #[test]
    fn test_capture_is_independent() {
        let mut live = View::default();
        live.price.set(Price::from_i64(10));

        let recap = Recap::capture(&live);
        live.price.set(Price::from_i64(11));

        assert_eq!(recap.price.get(), Price::from_i64(10));
        assert_eq!(live.price.get(), Price::from_i64(11));
    }

    #[test]
    fn test_serializes_flat() {
        let mut live = View::default();
        live.price.set(Price::from_i64(10));
        let json = serde_json::to_value(Recap::capture(&live)).unwrap();
        assert!(json.get("captured_at").is_some());
        assert_eq!(json["price"]["state"], "Modified");
    }
}
