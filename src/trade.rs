/// Trade listener
///
/// Caches last-trade, irregular-trade, correction and session statistics
/// for one instrument. After each message the "current trade" projection is
/// taken from either the irregular or the regular last-trade fields, and the
/// trade count is checked for gaps and duplicates before handlers are told.

use crate::common::{common_bindings, CommonFields, HasCommon};
use crate::derived::promote_event_time;
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
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

type Time = Tracked<Option<DateTime<Utc>>>;
type Text = Tracked<Option<String>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TradeFields {
    #[serde(flatten)]
    pub common: CommonFields,

    // last regular trade
    pub last_price: Tracked<Price>,
    pub last_volume: Tracked<u64>,
    pub last_part_id: Text,
    pub last_time: Time,
    pub last_date: Time,

    // last irregular trade
    pub irreg_price: Tracked<Price>,
    pub irreg_volume: Tracked<u64>,
    pub irreg_part_id: Text,
    pub irreg_time: Time,
    pub is_irregular: Tracked<bool>,

    // current trade, projected from one of the two sets above
    pub trade_price: Tracked<Price>,
    pub trade_volume: Tracked<u64>,
    pub trade_part_id: Text,
    pub event_time: Time,

    pub qualifier: Text,
    pub qualifier_native: Text,
    pub event_seq_num: Tracked<u64>,
    pub trade_count: Tracked<u64>,
    pub conflate_count: Tracked<u64>,
    pub side: Text,
    pub trade_id: Text,
    pub order_id: Tracked<u64>,

    pub accum_volume: Tracked<u64>,
    pub open_price: Tracked<Price>,
    pub high_price: Tracked<Price>,
    pub low_price: Tracked<Price>,
    pub close_price: Tracked<Price>,
    pub prev_close_price: Tracked<Price>,
    pub net_change: Tracked<Price>,
    pub pct_change: Tracked<f64>,
    pub vwap: Tracked<Price>,

    pub corr_price: Tracked<Price>,
    pub corr_volume: Tracked<u64>,
    pub corr_part_id: Text,
    pub corr_time: Time,
    pub corr_qualifier: Text,
    pub cancel_time: Time,
    pub orig_seq_num: Tracked<u64>,
    /// Set on cancel and error messages: true for a cancel
    pub is_cancel: Tracked<bool>,

    pub update_as_trade: Tracked<bool>,

    pub gap: GapWindow,
}

impl TradeFields {
    fn decay(&mut self) {
        self.common.decay();
        decay_all!(self;
            last_price, last_volume, last_part_id, last_time, last_date,
            irreg_price, irreg_volume, irreg_part_id, irreg_time, is_irregular,
            trade_price, trade_volume, trade_part_id, event_time,
            qualifier, qualifier_native, event_seq_num, trade_count, conflate_count,
            side, trade_id, order_id,
            accum_volume, open_price, high_price, low_price, close_price, prev_close_price,
            net_change, pct_change, vwap,
            corr_price, corr_volume, corr_part_id, corr_time, corr_qualifier, cancel_time,
            orig_seq_num, is_cancel, update_as_trade, gap,
        );
    }

    /// Copies the irregular or the regular last-trade fields into the
    /// current-trade projection, depending on the irregular flag.
    fn project_trade(&mut self) {
        if self.is_irregular.get() {
            self.trade_price.set(self.irreg_price.get());
            self.trade_volume.set(self.irreg_volume.get());
            self.trade_part_id.set(self.irreg_part_id.value().clone());
            // some feeds only send the one time field
            let time = self.irreg_time.get().or(self.last_time.get());
            self.event_time.set(time);
        } else {
            self.trade_price.set(self.last_price.get());
            self.trade_volume.set(self.last_volume.get());
            self.trade_part_id.set(self.last_part_id.value().clone());
            self.event_time.set(self.last_time.get());
        }
    }
}

#[derive(Debug, Default)]
pub struct TradeCache {
    fields: TradeFields,
    seq: SequenceTracker,
    /// A last or irregular price, volume or time arrived this message
    got_trade_field: bool,
    /// Last writer among the irregular and regular trade fields
    irregular_hint: Option<bool>,
    was_irregular: bool,
}

impl TradeCache {
    pub fn fields(&self) -> &TradeFields {
        &self.fields
    }

    /// Last adopted trade count
    pub fn cached_count(&self) -> u64 {
        self.seq.cached()
    }

    fn irregular(&mut self, present: bool) {
        self.got_trade_field = true;
        if present {
            self.irregular_hint = Some(true);
        }
    }

    fn regular(&mut self) {
        self.got_trade_field = true;
        self.irregular_hint = Some(false);
    }

    /// Irregular overlay for delta messages
    fn resolve_irregular(&mut self) {
        match self.irregular_hint {
            Some(true) if !self.fields.is_irregular.get() => self.fields.is_irregular.set(true),
            Some(false) => self.fields.is_irregular.set(false),
            _ => {}
        }
        if self.got_trade_field || self.fields.is_irregular.is_modified() {
            self.fields.project_trade();
        }
    }

    /// A recap carries the full trade state; the flag goes back to its value
    /// before the message and the projection is rebuilt from it.
    fn restore_irregular(&mut self) {
        self.fields.is_irregular.set(self.was_irregular);
        self.fields.project_trade();
    }
}

impl HasCommon for TradeCache {
    fn common_mut(&mut self) -> &mut CommonFields {
        &mut self.fields.common
    }
}

impl FieldCache for TradeCache {
    const KIND: EntityKind = EntityKind::Trade;

    fn bindings() -> Vec<FieldBinding<Self>> {
        let bind = FieldBinding::<TradeCache>::new;
        let mut bindings = common_bindings::<TradeCache>();
        bindings.extend([
            bind("wTradePrice", FieldType::Price, |c, v| {
                c.fields.last_price.set(v.as_price()?);
                c.regular();
                Ok(())
            }),
            bind("wTradeVolume", FieldType::U64, |c, v| {
                c.fields.last_volume.set(v.as_u64()?);
                c.regular();
                Ok(())
            }),
            bind("wTradePartId", FieldType::String, |c, v| {
                c.fields.last_part_id.set(Some(v.as_text()?));
                c.irregular_hint = Some(false);
                Ok(())
            }),
            bind("wTradeTime", FieldType::DateTime, |c, v| {
                c.fields.last_time.set(Some(v.as_datetime()?));
                c.got_trade_field = true;
                Ok(())
            }),
            bind("wTradeDate", FieldType::DateTime, |c, v| {
                c.fields.last_date.set(Some(v.as_datetime()?));
                Ok(())
            }),
            bind("wIrregPrice", FieldType::Price, |c, v| {
                let price = v.as_price()?;
                c.fields.irreg_price.set(price);
                c.irregular(!price.is_zero());
                Ok(())
            }),
            bind("wIrregSize", FieldType::U64, |c, v| {
                let size = v.as_u64()?;
                c.fields.irreg_volume.set(size);
                c.irregular(size != 0);
                Ok(())
            }),
            bind("wIrregPartId", FieldType::String, |c, v| {
                let part_id = v.as_text()?;
                if !part_id.is_empty() {
                    c.irregular_hint = Some(true);
                }
                c.fields.irreg_part_id.set(Some(part_id));
                Ok(())
            }),
            bind("wIrregTime", FieldType::DateTime, |c, v| {
                c.fields.irreg_time.set(Some(v.as_datetime()?));
                c.irregular(true);
                Ok(())
            }),
            bind("wIsIrregular", FieldType::Bool, |c, v| {
                c.fields.is_irregular.set(v.as_bool()?);
                Ok(())
            }),
            bind("wTradeQualifier", FieldType::String, |c, v| {
                c.fields.qualifier.set(Some(v.as_text()?));
                Ok(())
            }),
            bind("wSaleCondition", FieldType::String, |c, v| {
                c.fields.qualifier_native.set(Some(v.as_text()?));
                Ok(())
            }),
            bind("wTradeSeqNum", FieldType::U64, |c, v| {
                c.fields.event_seq_num.set(v.as_u64()?);
                Ok(())
            }),
            bind("wTradeCount", FieldType::U64, |c, v| {
                let count = v.as_u64()?;
                c.fields.trade_count.set(count);
                c.seq.observe_count(count);
                Ok(())
            }),
            bind("wConflateTradeCount", FieldType::U64, |c, v| {
                let conflation = v.as_u64()?;
                c.fields.conflate_count.set(conflation);
                c.seq.set_conflation(conflation);
                Ok(())
            }),
            bind("wTradeSide", FieldType::String, |c, v| {
                c.fields.side.set(Some(v.as_text()?));
                Ok(())
            }),
            bind("wTradeId", FieldType::String, |c, v| {
                c.fields.trade_id.set(Some(v.as_text()?));
                Ok(())
            }),
            bind("wOrderId", FieldType::U64, |c, v| {
                c.fields.order_id.set(v.as_u64()?);
                Ok(())
            }),
            // session statistics
            bind("wTotalVolume", FieldType::U64, |c, v| {
                c.fields.accum_volume.set(v.as_u64()?);
                Ok(())
            }),
            bind("wOpenPrice", FieldType::Price, |c, v| {
                c.fields.open_price.set(v.as_price()?);
                Ok(())
            }),
            bind("wHighPrice", FieldType::Price, |c, v| {
                c.fields.high_price.set(v.as_price()?);
                Ok(())
            }),
            bind("wLowPrice", FieldType::Price, |c, v| {
                c.fields.low_price.set(v.as_price()?);
                Ok(())
            }),
            bind("wClosePrice", FieldType::Price, |c, v| {
                c.fields.close_price.set(v.as_price()?);
                Ok(())
            }),
            bind("wPrevClosePrice", FieldType::Price, |c, v| {
                c.fields.prev_close_price.set(v.as_price()?);
                Ok(())
            }),
            bind("wNetChange", FieldType::Price, |c, v| {
                c.fields.net_change.set(v.as_price()?);
                Ok(())
            }),
            bind("wPctChange", FieldType::F64, |c, v| {
                c.fields.pct_change.set(v.as_f64()?);
                Ok(())
            }),
            bind("wVwap", FieldType::Price, |c, v| {
                c.fields.vwap.set(v.as_price()?);
                Ok(())
            }),
            // corrections and cancels
            bind("wCorrPrice", FieldType::Price, |c, v| {
                c.fields.corr_price.set(v.as_price()?);
                Ok(())
            }),
            bind("wCorrSize", FieldType::U64, |c, v| {
                c.fields.corr_volume.set(v.as_u64()?);
                Ok(())
            }),
            bind("wCorrPartId", FieldType::String, |c, v| {
                c.fields.corr_part_id.set(Some(v.as_text()?));
                Ok(())
            }),
            bind("wCorrTime", FieldType::DateTime, |c, v| {
                c.fields.corr_time.set(Some(v.as_datetime()?));
                Ok(())
            }),
            bind("wCorrQualifier", FieldType::String, |c, v| {
                c.fields.corr_qualifier.set(Some(v.as_text()?));
                Ok(())
            }),
            bind("wCancelTime", FieldType::DateTime, |c, v| {
                c.fields.cancel_time.set(Some(v.as_datetime()?));
                Ok(())
            }),
            bind("wOrigSeqNum", FieldType::U64, |c, v| {
                c.fields.orig_seq_num.set(v.as_u64()?);
                Ok(())
            }),
            bind("wUpdateAsTrade", FieldType::Bool, |c, v| {
                c.fields.update_as_trade.set(v.as_bool()?);
                Ok(())
            }),
        ]);
        bindings
    }

    fn slot(registry: &FieldRegistry) -> &TableSlot<Self> {
        &registry.trades
    }

    fn decay(&mut self) {
        self.fields.decay();
    }

    fn begin_message(&mut self) {
        self.fields.common.begin_message();
        self.seq.begin_message();
        self.got_trade_field = false;
        self.irregular_hint = None;
        self.was_irregular = self.fields.is_irregular.get();
    }

    fn symbol(&self) -> Option<&str> {
        self.fields.common.symbol()
    }
}

/// Trade callbacks. Every method defaults to a no-op.
pub trait TradeHandler: Send {
    fn on_trade_recap(&mut self, _sub: &Subscription, _view: &TradeFields, _msg: &dyn Message) {}

    fn on_trade_report(&mut self, _sub: &Subscription, _view: &TradeFields, _msg: &dyn Message) {}

    fn on_trade_gap(&mut self, _sub: &Subscription, _view: &TradeFields, _gap: &GapWindow, _msg: &dyn Message) {}

    /// `view.is_cancel` tells a cancel from an error
    fn on_trade_cancel_or_error(&mut self, _sub: &Subscription, _view: &TradeFields, _msg: &dyn Message) {}

    fn on_trade_correction(&mut self, _sub: &Subscription, _view: &TradeFields, _msg: &dyn Message) {}

    fn on_trade_closing(&mut self, _sub: &Subscription, _view: &TradeFields, _msg: &dyn Message) {}
}

pub type TradeRecap = Recap<TradeFields>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TradeRoute {
    Recap,
    Report,
    Cancel,
    Error,
    Correction,
    Closing,
    Update,
}

#[derive(Debug, Clone, Copy)]
enum TradeEvent {
    Gap(GapWindow),
    Recap,
    Report,
    CancelOrError,
    Correction,
    Closing,
}

impl TradeRoute {
    fn of(msg_type: MsgType) -> Option<Self> {
        match msg_type {
            MsgType::Initial | MsgType::Recap | MsgType::PreOpening | MsgType::Snapshot => Some(TradeRoute::Recap),
            MsgType::Trade => Some(TradeRoute::Report),
            MsgType::Cancel => Some(TradeRoute::Cancel),
            MsgType::Error => Some(TradeRoute::Error),
            MsgType::Correction => Some(TradeRoute::Correction),
            MsgType::Closing => Some(TradeRoute::Closing),
            MsgType::Update => Some(TradeRoute::Update),
            _ => None,
        }
    }
}

pub struct TradeListener {
    core: ListenerCore<TradeCache, dyn TradeHandler>,
    process_update_as_trade: AtomicBool,
}

impl TradeListener {
    pub fn new(registry: Arc<FieldRegistry>) -> Self {
        TradeListener {
            core: ListenerCore::new(registry),
            process_update_as_trade: AtomicBool::new(true),
        }
    }

    pub fn add_handler(&self, handler: impl TradeHandler + 'static) {
        self.core.add_handler(Box::new(handler));
    }

    pub fn handler_count(&self) -> usize {
        self.core.handler_count()
    }

    /// Whether generic updates carrying trade fields are reported as trades.
    /// A `wUpdateAsTrade` field in the stream changes this too.
    pub fn set_process_update_as_trade(&self, enabled: bool) {
        self.process_update_as_trade.store(enabled, Ordering::Relaxed);
    }

    pub fn process_update_as_trade(&self) -> bool {
        self.process_update_as_trade.load(Ordering::Relaxed)
    }

    pub fn dispatch_table(&self) -> Option<Arc<DispatchTable<TradeCache>>> {
        self.core.table().cloned()
    }

    pub fn populate_recap(&self) -> Result<TradeRecap, ListenerError> {
        self.core.populate_recap(|cache| &cache.fields)
    }

    pub fn with_view<R>(&self, f: impl FnOnce(&TradeFields) -> R) -> R {
        self.core.with_cache(|cache| f(&cache.fields))
    }

    pub fn cached_count(&self) -> u64 {
        self.core.with_cache(TradeCache::cached_count)
    }

    pub fn stats(&self) -> ListenerStats {
        self.core.stats()
    }

    pub fn reset(&self) {
        self.core.reset();
    }

    pub fn on_msg(&self, sub: &Subscription, msg: &dyn Message) -> Result<MsgOutcome, ListenerError> {
        let msg_type = msg.msg_type();
        let Some(route) = TradeRoute::of(msg_type) else {
            return self.core.ignore();
        };

        self.core.process(
            sub,
            msg,
            |cache, stats| {
                cache.fields.common.resolve();
                if route == TradeRoute::Recap {
                    cache.restore_irregular();
                } else {
                    cache.resolve_irregular();
                }

                if cache.fields.update_as_trade.is_modified() {
                    self.set_process_update_as_trade(cache.fields.update_as_trade.get());
                }
                if matches!(route, TradeRoute::Cancel | TradeRoute::Error) {
                    cache.fields.is_cancel.set(route == TradeRoute::Cancel);
                }

                let check = cache.seq.evaluate(msg_type.class().checks_gaps());
                let mut events = Vec::new();
                if let Some((begin, end)) = check.gap {
                    cache.fields.gap.record(begin, end);
                    stats.record_gap(cache.fields.gap.missing());
                    debug!(symbol = sub.symbol(), begin, end, "trade gap");
                    events.push(TradeEvent::Gap(cache.fields.gap));
                }

                if check.duplicate {
                    debug!(symbol = sub.symbol(), count = cache.seq.cached(), "duplicate trade suppressed");
                    return Routed::new(MsgOutcome::Suppressed, events, &cache.fields);
                }

                let event = match route {
                    TradeRoute::Recap => Some(TradeEvent::Recap),
                    TradeRoute::Report => Some(TradeEvent::Report),
                    TradeRoute::Update if cache.got_trade_field && self.process_update_as_trade() => {
                        Some(TradeEvent::Report)
                    }
                    TradeRoute::Update => None,
                    TradeRoute::Cancel | TradeRoute::Error => {
                        promote_event_time(&cache.fields.cancel_time, &mut cache.fields.event_time);
                        Some(TradeEvent::CancelOrError)
                    }
                    TradeRoute::Correction => {
                        promote_event_time(&cache.fields.corr_time, &mut cache.fields.event_time);
                        Some(TradeEvent::Correction)
                    }
                    TradeRoute::Closing => Some(TradeEvent::Closing),
                };

                let outcome = match event {
                    Some(event) => {
                        events.push(event);
                        MsgOutcome::Delivered
                    }
                    None => MsgOutcome::Unchanged,
                };
                Routed::new(outcome, events, &cache.fields)
            },
            |handler, view: &TradeFields, event: &TradeEvent| match event {
                TradeEvent::Gap(gap) => handler.on_trade_gap(sub, view, gap, msg),
                TradeEvent::Recap => handler.on_trade_recap(sub, view, msg),
                TradeEvent::Report => handler.on_trade_report(sub, view, msg),
                TradeEvent::CancelOrError => handler.on_trade_cancel_or_error(sub, view, msg),
                TradeEvent::Correction => handler.on_trade_correction(sub, view, msg),
                TradeEvent::Closing => handler.on_trade_closing(sub, view, msg),
            },
        )
    }
}

impl MsgListener for TradeListener {
    fn on_msg(&self, sub: &Subscription, msg: &dyn Message) -> Result<MsgOutcome, ListenerError> {
        TradeListener::on_msg(self, sub, msg)
    }
}
