/// Quote listener
///
/// Caches the best bid and offer for one instrument, checks the quote count
/// for gaps and duplicates, and reports recaps, quote updates, gaps and
/// closing quotes to registered handlers.

use crate::common::{common_bindings, CommonFields, HasCommon};
use crate::dispatch::{DispatchTable, FieldBinding, TableSlot};
use crate::error::ListenerError;
use crate::field_state::{decay_all, Tracked};
use crate::gap_detector::{GapWindow, SequenceTracker};
use crate::listener::{FieldCache, ListenerCore, MsgOutcome, Routed};
use crate::message::{FieldType, Message, MsgType};
use crate::price::Price;
use crate::recap::Recap;
use crate::registry::{EntityKind, FieldRegistry};
use crate::stats::ListenerStats;
use crate::subscription::{MsgListener, Subscription};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Qualifier value that marks a closing quote
pub const CLOSING_QUALIFIER: &str = "Closing";

type Time = Tracked<Option<DateTime<Utc>>>;
type Text = Tracked<Option<String>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuoteFields {
    #[serde(flatten)]
    pub common: CommonFields,

    pub bid_price: Tracked<Price>,
    pub bid_size: Tracked<u64>,
    pub bid_depth: Tracked<u64>,
    pub bid_part_id: Text,
    pub bid_close_price: Tracked<Price>,
    pub bid_close_date: Time,
    pub prev_bid_close_price: Tracked<Price>,
    pub prev_bid_close_date: Time,
    pub bid_high: Tracked<Price>,
    pub bid_low: Tracked<Price>,
    pub bid_time: Time,
    pub bid_indicator: Tracked<Option<char>>,
    pub bid_update_count: Tracked<u64>,
    pub bid_yield: Tracked<f64>,

    pub ask_price: Tracked<Price>,
    pub ask_size: Tracked<u64>,
    pub ask_depth: Tracked<u64>,
    pub ask_part_id: Text,
    pub ask_close_price: Tracked<Price>,
    pub ask_close_date: Time,
    pub prev_ask_close_price: Tracked<Price>,
    pub prev_ask_close_date: Time,
    pub ask_high: Tracked<Price>,
    pub ask_low: Tracked<Price>,
    pub ask_time: Time,
    pub ask_indicator: Tracked<Option<char>>,
    pub ask_update_count: Tracked<u64>,
    pub ask_yield: Tracked<f64>,

    pub event_seq_num: Tracked<u64>,
    pub event_date: Time,
    pub event_time: Time,
    pub qualifier: Text,
    pub qualifier_native: Text,
    pub short_sale_bid_tick: Tracked<Option<char>>,
    pub short_sale_circuit_breaker: Tracked<Option<char>>,
    pub quote_count: Tracked<u64>,
    pub conflate_count: Tracked<u64>,

    pub gap: GapWindow,
}

impl QuoteFields {
    /// (bid + ask) / 2 when both sides are positive, zero otherwise
    pub fn mid_price(&self) -> Price {
        Price::mid(self.bid_price.get(), self.ask_price.get())
    }

    pub fn is_closing(&self) -> bool {
        self.qualifier.is_modified() && self.qualifier.as_str() == Some(CLOSING_QUALIFIER)
    }

    fn decay(&mut self) {
        self.common.decay();
        decay_all!(self;
            bid_price, bid_size, bid_depth, bid_part_id, bid_close_price, bid_close_date,
            prev_bid_close_price, prev_bid_close_date, bid_high, bid_low, bid_time,
            bid_indicator, bid_update_count, bid_yield,
            ask_price, ask_size, ask_depth, ask_part_id, ask_close_price, ask_close_date,
            prev_ask_close_price, prev_ask_close_date, ask_high, ask_low, ask_time,
            ask_indicator, ask_update_count, ask_yield,
            event_seq_num, event_date, event_time, qualifier, qualifier_native,
            short_sale_bid_tick, short_sale_circuit_breaker, quote_count, conflate_count,
            gap,
        );
    }
}

#[derive(Debug, Default)]
pub struct QuoteCache {
    fields: QuoteFields,
    seq: SequenceTracker,
    got_quote_field: bool,
}

impl QuoteCache {
    pub fn fields(&self) -> &QuoteFields {
        &self.fields
    }

    /// Last adopted quote count
    pub fn cached_count(&self) -> u64 {
        self.seq.cached()
    }
}

impl HasCommon for QuoteCache {
    fn common_mut(&mut self) -> &mut CommonFields {
        &mut self.fields.common
    }
}

impl FieldCache for QuoteCache {
    const KIND: EntityKind = EntityKind::Quote;

    fn bindings() -> Vec<FieldBinding<Self>> {
        let bind = FieldBinding::<QuoteCache>::new;
        let mut bindings = common_bindings::<QuoteCache>();
        bindings.extend([
            // top of book; these mark the message as carrying a quote
            bind("wBidPrice", FieldType::Price, |c, v| {
                c.fields.bid_price.set(v.as_price()?);
                c.got_quote_field = true;
                Ok(())
            }),
            bind("wBidSize", FieldType::U64, |c, v| {
                c.fields.bid_size.set(v.as_u64()?);
                c.got_quote_field = true;
                Ok(())
            }),
            bind("wBidDepth", FieldType::U64, |c, v| {
                c.fields.bid_depth.set(v.as_u64()?);
                c.got_quote_field = true;
                Ok(())
            }),
            bind("wBidPartId", FieldType::String, |c, v| {
                c.fields.bid_part_id.set(Some(v.as_text()?));
                c.got_quote_field = true;
                Ok(())
            }),
            bind("wAskPrice", FieldType::Price, |c, v| {
                c.fields.ask_price.set(v.as_price()?);
                c.got_quote_field = true;
                Ok(())
            }),
            bind("wAskSize", FieldType::U64, |c, v| {
                c.fields.ask_size.set(v.as_u64()?);
                c.got_quote_field = true;
                Ok(())
            }),
            bind("wAskDepth", FieldType::U64, |c, v| {
                c.fields.ask_depth.set(v.as_u64()?);
                c.got_quote_field = true;
                Ok(())
            }),
            bind("wAskPartId", FieldType::String, |c, v| {
                c.fields.ask_part_id.set(Some(v.as_text()?));
                c.got_quote_field = true;
                Ok(())
            }),
            // bid side detail
            bind("wBidClose", FieldType::Price, |c, v| {
                c.fields.bid_close_price.set(v.as_price()?);
                Ok(())
            }),
            bind("wBidCloseDate", FieldType::DateTime, |c, v| {
                c.fields.bid_close_date.set(Some(v.as_datetime()?));
                Ok(())
            }),
            bind("wPrevBidClose", FieldType::Price, |c, v| {
                c.fields.prev_bid_close_price.set(v.as_price()?);
                Ok(())
            }),
            bind("wPrevBidCloseDate", FieldType::DateTime, |c, v| {
                c.fields.prev_bid_close_date.set(Some(v.as_datetime()?));
                Ok(())
            }),
            bind("wBidHigh", FieldType::Price, |c, v| {
                c.fields.bid_high.set(v.as_price()?);
                Ok(())
            }),
            bind("wBidLow", FieldType::Price, |c, v| {
                c.fields.bid_low.set(v.as_price()?);
                Ok(())
            }),
            bind("wBidTime", FieldType::DateTime, |c, v| {
                c.fields.bid_time.set(Some(v.as_datetime()?));
                Ok(())
            }),
            bind("wBidIndicator", FieldType::Char, |c, v| {
                c.fields.bid_indicator.set(Some(v.as_char()?));
                Ok(())
            }),
            bind("wBidUpdateCount", FieldType::U64, |c, v| {
                c.fields.bid_update_count.set(v.as_u64()?);
                Ok(())
            }),
            bind("wBidYield", FieldType::F64, |c, v| {
                c.fields.bid_yield.set(v.as_f64()?);
                Ok(())
            }),
            // ask side detail
            bind("wAskClose", FieldType::Price, |c, v| {
                c.fields.ask_close_price.set(v.as_price()?);
                Ok(())
            }),
            bind("wAskCloseDate", FieldType::DateTime, |c, v| {
                c.fields.ask_close_date.set(Some(v.as_datetime()?));
                Ok(())
            }),
            bind("wPrevAskClose", FieldType::Price, |c, v| {
                c.fields.prev_ask_close_price.set(v.as_price()?);
                Ok(())
            }),
            bind("wPrevAskCloseDate", FieldType::DateTime, |c, v| {
                c.fields.prev_ask_close_date.set(Some(v.as_datetime()?));
                Ok(())
            }),
            bind("wAskHigh", FieldType::Price, |c, v| {
                c.fields.ask_high.set(v.as_price()?);
                Ok(())
            }),
            bind("wAskLow", FieldType::Price, |c, v| {
                c.fields.ask_low.set(v.as_price()?);
                Ok(())
            }),
            bind("wAskTime", FieldType::DateTime, |c, v| {
                c.fields.ask_time.set(Some(v.as_datetime()?));
                Ok(())
            }),
            bind("wAskIndicator", FieldType::Char, |c, v| {
                c.fields.ask_indicator.set(Some(v.as_char()?));
                Ok(())
            }),
            bind("wAskUpdateCount", FieldType::U64, |c, v| {
                c.fields.ask_update_count.set(v.as_u64()?);
                Ok(())
            }),
            bind("wAskYield", FieldType::F64, |c, v| {
                c.fields.ask_yield.set(v.as_f64()?);
                Ok(())
            }),
            // event detail
            bind("wQuoteSeqNum", FieldType::U64, |c, v| {
                c.fields.event_seq_num.set(v.as_u64()?);
                Ok(())
            }),
            bind("wQuoteDate", FieldType::DateTime, |c, v| {
                c.fields.event_date.set(Some(v.as_datetime()?));
                Ok(())
            }),
            bind("wQuoteTime", FieldType::DateTime, |c, v| {
                c.fields.event_time.set(Some(v.as_datetime()?));
                Ok(())
            }),
            bind("wQuoteQualifier", FieldType::String, |c, v| {
                c.fields.qualifier.set(Some(v.as_text()?));
                Ok(())
            }),
            bind("wCondition", FieldType::String, |c, v| {
                c.fields.qualifier_native.set(Some(v.as_text()?));
                Ok(())
            }),
            bind("wShortSaleBidTick", FieldType::Char, |c, v| {
                c.fields.short_sale_bid_tick.set(Some(v.as_char()?));
                Ok(())
            }),
            bind("wShortSaleCircuitBreaker", FieldType::Char, |c, v| {
                c.fields.short_sale_circuit_breaker.set(Some(v.as_char()?));
                Ok(())
            }),
            // sequencing
            bind("wQuoteCount", FieldType::U64, |c, v| {
                let count = v.as_u64()?;
                c.fields.quote_count.set(count);
                c.seq.observe_count(count);
                Ok(())
            }),
            bind("wConflateQuoteCount", FieldType::U64, |c, v| {
                let conflation = v.as_u64()?;
                c.fields.conflate_count.set(conflation);
                c.seq.set_conflation(conflation);
                Ok(())
            }),
        ]);
        bindings
    }

    fn slot(registry: &FieldRegistry) -> &TableSlot<Self> {
        &registry.quotes
    }

    fn decay(&mut self) {
        self.fields.decay();
    }

    fn begin_message(&mut self) {
        self.fields.common.begin_message();
        self.seq.begin_message();
        self.got_quote_field = false;
    }

    fn symbol(&self) -> Option<&str> {
        self.fields.common.symbol()
    }
}

/// Quote callbacks. Every method defaults to a no-op.
///
/// `view` is a copy of the cache as of the message being reported.
pub trait QuoteHandler: Send {
    fn on_quote_recap(&mut self, _sub: &Subscription, _view: &QuoteFields, _msg: &dyn Message) {}

    fn on_quote_update(&mut self, _sub: &Subscription, _view: &QuoteFields, _msg: &dyn Message) {}

    fn on_quote_gap(&mut self, _sub: &Subscription, _view: &QuoteFields, _gap: &GapWindow, _msg: &dyn Message) {}

    fn on_quote_closing(&mut self, _sub: &Subscription, _view: &QuoteFields, _msg: &dyn Message) {}
}

pub type QuoteRecap = Recap<QuoteFields>;

#[derive(Debug, Clone, Copy)]
enum QuoteEvent {
    Gap(GapWindow),
    Recap,
    Update,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteRoute {
    Recap,
    Quote,
    Update,
}

impl QuoteRoute {
    fn of(msg_type: MsgType) -> Option<Self> {
        match msg_type {
            MsgType::Initial | MsgType::Recap | MsgType::PreOpening | MsgType::Snapshot => Some(QuoteRoute::Recap),
            MsgType::Quote => Some(QuoteRoute::Quote),
            MsgType::Update | MsgType::Trade => Some(QuoteRoute::Update),
            _ => None,
        }
    }
}

pub struct QuoteListener {
    core: ListenerCore<QuoteCache, dyn QuoteHandler>,
}

impl QuoteListener {
    pub fn new(registry: Arc<FieldRegistry>) -> Self {
        QuoteListener {
            core: ListenerCore::new(registry),
        }
    }

    pub fn add_handler(&self, handler: impl QuoteHandler + 'static) {
        self.core.add_handler(Box::new(handler));
    }

    pub fn handler_count(&self) -> usize {
        self.core.handler_count()
    }

    /// The shared table, once the dictionary is ready
    pub fn dispatch_table(&self) -> Option<Arc<DispatchTable<QuoteCache>>> {
        self.core.table().cloned()
    }

    pub fn populate_recap(&self) -> Result<QuoteRecap, ListenerError> {
        self.core.populate_recap(|cache| &cache.fields)
    }

    /// Reads the live fields under the cache lock
    pub fn with_view<R>(&self, f: impl FnOnce(&QuoteFields) -> R) -> R {
        self.core.with_cache(|cache| f(&cache.fields))
    }

    pub fn cached_count(&self) -> u64 {
        self.core.with_cache(QuoteCache::cached_count)
    }

    pub fn stats(&self) -> ListenerStats {
        self.core.stats()
    }

    pub fn reset(&self) {
        self.core.reset();
    }

    pub fn on_msg(&self, sub: &Subscription, msg: &dyn Message) -> Result<MsgOutcome, ListenerError> {
        let msg_type = msg.msg_type();
        let Some(route) = QuoteRoute::of(msg_type) else {
            return self.core.ignore();
        };

        self.core.process(
            sub,
            msg,
            |cache, stats| {
                cache.fields.common.resolve();
                let check = cache.seq.evaluate(msg_type.class().checks_gaps());
                let mut events = Vec::new();

                if let Some((begin, end)) = check.gap {
                    cache.fields.gap.record(begin, end);
                    stats.record_gap(cache.fields.gap.missing());
                    debug!(symbol = sub.symbol(), begin, end, "quote gap");
                    events.push(QuoteEvent::Gap(cache.fields.gap));
                }

                let outcome = if check.duplicate {
                    debug!(symbol = sub.symbol(), count = cache.seq.cached(), "duplicate quote suppressed");
                    MsgOutcome::Suppressed
                } else {
                    let event = match route {
                        QuoteRoute::Recap => Some(QuoteEvent::Recap),
                        QuoteRoute::Quote if cache.fields.is_closing() => Some(QuoteEvent::Closing),
                        QuoteRoute::Quote => Some(QuoteEvent::Update),
                        QuoteRoute::Update if cache.got_quote_field => Some(QuoteEvent::Update),
                        QuoteRoute::Update => None,
                    };
                    match event {
                        Some(event) => {
                            events.push(event);
                            MsgOutcome::Delivered
                        }
                        None => MsgOutcome::Unchanged,
                    }
                };
                Routed::new(outcome, events, &cache.fields)
            },
            |handler, view: &QuoteFields, event: &QuoteEvent| match event {
                QuoteEvent::Gap(gap) => handler.on_quote_gap(sub, view, gap, msg),
                QuoteEvent::Recap => handler.on_quote_recap(sub, view, msg),
                QuoteEvent::Update => handler.on_quote_update(sub, view, msg),
                QuoteEvent::Closing => handler.on_quote_closing(sub, view, msg),
            },
        )
    }
}

impl MsgListener for QuoteListener {
    fn on_msg(&self, sub: &Subscription, msg: &dyn Message) -> Result<MsgOutcome, ListenerError> {
        QuoteListener::on_msg(self, sub, msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_state::FieldState;
    use crate::message::{FieldMessage, FieldValue};

    fn msg(registry: &FieldRegistry, msg_type: MsgType, fields: &[(&str, FieldValue)]) -> FieldMessage {
        fields.iter().fold(FieldMessage::new(msg_type), |m, (name, value)| {
            m.with(registry.fid(name).unwrap(), value.clone())
        })
    }

    #[derive(Default)]
    struct Calls {
        recaps: u32,
        updates: u32,
        closings: u32,
    }

    struct Counting(Arc<parking_lot::Mutex<Calls>>);

    impl QuoteHandler for Counting {
        fn on_quote_recap(&mut self, _: &Subscription, _: &QuoteFields, _: &dyn Message) {
            self.0.lock().recaps += 1;
        }

        fn on_quote_update(&mut self, _: &Subscription, _: &QuoteFields, _: &dyn Message) {
            self.0.lock().updates += 1;
        }

        fn on_quote_closing(&mut self, _: &Subscription, _: &QuoteFields, _: &dyn Message) {
            self.0.lock().closings += 1;
        }
    }

    #[test]
    fn test_bindings_cover_common_fields() {
        let names: Vec<_> = QuoteCache::bindings().iter().map(|b| b.name).collect();
        assert!(names.contains(&"wSymbol"));
        assert!(names.contains(&"wQuoteCount"));
        assert!(names.contains(&"wAskYield"));
    }

    #[test]
    fn test_routing() {
        let registry = FieldRegistry::standard();
        let listener = QuoteListener::new(registry.clone());
        let calls = Arc::new(parking_lot::Mutex::new(Calls::default()));
        listener.add_handler(Counting(calls.clone()));
        let sub = Subscription::new("NYSE", "IBM");

        let recap = msg(&registry, MsgType::Initial, &[("wBidPrice", FieldValue::F64(10.0))]);
        assert_eq!(listener.on_msg(&sub, &recap).unwrap(), MsgOutcome::Delivered);

        // generic update without quote fields is applied but not reported
        let update = msg(&registry, MsgType::Update, &[("wBidYield", FieldValue::F64(1.5))]);
        assert_eq!(listener.on_msg(&sub, &update).unwrap(), MsgOutcome::Unchanged);

        let closing = msg(
            &registry,
            MsgType::Quote,
            &[("wQuoteQualifier", FieldValue::String("Closing".into()))],
        );
        assert_eq!(listener.on_msg(&sub, &closing).unwrap(), MsgOutcome::Delivered);

        // the qualifier is stale now, so this is a plain update
        let quote = msg(&registry, MsgType::Quote, &[("wAskPrice", FieldValue::F64(10.5))]);
        listener.on_msg(&sub, &quote).unwrap();

        let book = FieldMessage::new(MsgType::BookUpdate);
        assert_eq!(listener.on_msg(&sub, &book).unwrap(), MsgOutcome::Ignored);

        let calls = calls.lock();
        assert_eq!((calls.recaps, calls.updates, calls.closings), (1, 1, 1));
    }

    #[test]
    fn test_mid_price() {
        let registry = FieldRegistry::standard();
        let listener = QuoteListener::new(registry.clone());
        let sub = Subscription::new("NYSE", "IBM");

        let m = msg(
            &registry,
            MsgType::Quote,
            &[("wBidPrice", FieldValue::F64(10.0)), ("wAskPrice", FieldValue::F64(10.5))],
        );
        listener.on_msg(&sub, &m).unwrap();
        listener.with_view(|view| {
            assert_eq!(view.mid_price().to_f64(), 10.25);
            assert_eq!(view.bid_yield.state(), FieldState::Uninitialized);
        });
    }

    #[test]
    fn test_recap_before_any_message() {
        let listener = QuoteListener::new(FieldRegistry::standard());
        assert_eq!(listener.populate_recap().unwrap_err(), ListenerError::NoMessageProcessed);
    }
}
