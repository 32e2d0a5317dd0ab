/// Order imbalance listener
///
/// Auction imbalance indications: indicative prices, paired and unpaired
/// volumes, clearing prices. The imbalance type rides in the security
/// status qualifier and decides which callback an update goes to.

use crate::common::{common_bindings, CommonFields, HasCommon};
use crate::dispatch::{DispatchTable, FieldBinding, TableSlot};
use crate::error::ListenerError;
use crate::field_state::{decay_all, Tracked};
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
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize)]
#[repr(u8)]
pub enum OrderImbalanceType {
    #[strum(serialize = "MktImbBuy")]
    MarketImbalanceBuy = 16,
    #[strum(serialize = "MktImbSell")]
    MarketImbalanceSell = 17,
    #[strum(serialize = "NoMktImb")]
    NoMarketImbalance = 18,
    #[strum(serialize = "MocImbBuy")]
    MocImbalanceBuy = 19,
    #[strum(serialize = "MocImbSell")]
    MocImbalanceSell = 20,
    #[strum(serialize = "NoMocImb")]
    NoMocImbalance = 21,
    #[strum(serialize = "OrderImb")]
    OrderImbalance = 22,
    #[strum(serialize = "OrderInf")]
    OrderInformation = 23,
    #[strum(serialize = "OrderImbBuy")]
    OrderImbalanceBuy = 24,
    #[strum(serialize = "OrderImbSell")]
    OrderImbalanceSell = 25,
    #[strum(serialize = "OrderImbNone")]
    NoOrderImbalance = 26,
}

impl OrderImbalanceType {
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn from_value(value: i64) -> Option<Self> {
        Self::iter().find(|t| i64::from(t.value()) == value)
    }

    /// Parses the wire name (`MktImbBuy`) or the decimal value (`16`)
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        text.parse()
            .ok()
            .or_else(|| text.parse::<i64>().ok().and_then(Self::from_value))
    }

    /// Whether the qualifier text names an imbalance type at all
    pub fn is_imbalance_type(text: &str) -> bool {
        Self::parse(text).is_some()
    }

    /// False for the three "no imbalance" indications
    pub fn is_imbalance_order(self) -> bool {
        !matches!(
            self,
            OrderImbalanceType::NoMarketImbalance
                | OrderImbalanceType::NoMocImbalance
                | OrderImbalanceType::NoOrderImbalance
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderImbalanceFields {
    #[serde(flatten)]
    pub common: CommonFields,
    pub high_indication_price: Tracked<Price>,
    pub low_indication_price: Tracked<Price>,
    pub indication_price: Tracked<Price>,
    pub buy_volume: Tracked<u64>,
    pub sell_volume: Tracked<u64>,
    pub match_volume: Tracked<u64>,
    pub security_status_qual: Tracked<Option<String>>,
    /// Parsed from the qualifier after iteration; `None` when it names no
    /// known type
    pub imbalance_type: Tracked<Option<OrderImbalanceType>>,
    pub inside_match_price: Tracked<Price>,
    pub far_clearing_price: Tracked<Price>,
    pub near_clearing_price: Tracked<Price>,
    pub no_clearing_price: Tracked<Option<char>>,
    pub price_var_ind: Tracked<Option<char>>,
    pub cross_type: Tracked<Option<char>>,
    pub msg_type: Tracked<i64>,
    pub event_seq_num: Tracked<u64>,
    pub security_status_orig: Tracked<Option<String>>,
    pub security_status_time: Tracked<Option<DateTime<Utc>>>,
    pub auction_time: Tracked<Option<DateTime<Utc>>>,
}

impl OrderImbalanceFields {
    /// Whether an update goes to the imbalance callback rather than the
    /// no-imbalance one. An unknown type counts as an imbalance.
    pub fn has_imbalance(&self) -> bool {
        self.imbalance_type.get().map_or(true, OrderImbalanceType::is_imbalance_order)
    }
}

#[derive(Debug, Default)]
pub struct OrderImbalanceCache {
    fields: OrderImbalanceFields,
    /// This message carried imbalance data
    is_order_imbalance: bool,
}

impl OrderImbalanceCache {
    pub fn fields(&self) -> &OrderImbalanceFields {
        &self.fields
    }

    /// Post-iteration step: common derived fields, then the imbalance type
    /// from a qualifier received this message. A qualifier naming a type
    /// makes this an imbalance message.
    fn resolve(&mut self) {
        self.fields.common.resolve();
        if !self.fields.security_status_qual.is_modified() {
            return;
        }
        let parsed = self.fields.security_status_qual.as_str().and_then(OrderImbalanceType::parse);
        if parsed.is_some() {
            self.is_order_imbalance = true;
        }
        self.fields.imbalance_type.set(parsed);
    }
}

impl HasCommon for OrderImbalanceCache {
    fn common_mut(&mut self) -> &mut CommonFields {
        &mut self.fields.common
    }
}

impl FieldCache for OrderImbalanceCache {
    const KIND: EntityKind = EntityKind::OrderImbalance;

    fn bindings() -> Vec<FieldBinding<Self>> {
        let bind = FieldBinding::<OrderImbalanceCache>::new;
        let mut bindings = common_bindings::<OrderImbalanceCache>();
        bindings.extend([
            bind("wHighIndicationPrice", FieldType::Price, |c, v| {
                c.fields.high_indication_price.set(v.as_price()?);
                c.is_order_imbalance = true;
                Ok(())
            }),
            bind("wLowIndicationPrice", FieldType::Price, |c, v| {
                c.fields.low_indication_price.set(v.as_price()?);
                c.is_order_imbalance = true;
                Ok(())
            }),
            bind("wIndicationPrice", FieldType::Price, |c, v| {
                c.fields.indication_price.set(v.as_price()?);
                c.is_order_imbalance = true;
                Ok(())
            }),
            bind("wBuyVolume", FieldType::U64, |c, v| {
                c.fields.buy_volume.set(v.as_u64()?);
                c.is_order_imbalance = true;
                Ok(())
            }),
            bind("wSellVolume", FieldType::U64, |c, v| {
                c.fields.sell_volume.set(v.as_u64()?);
                c.is_order_imbalance = true;
                Ok(())
            }),
            bind("wMatchVolume", FieldType::U64, |c, v| {
                c.fields.match_volume.set(v.as_u64()?);
                c.is_order_imbalance = true;
                Ok(())
            }),
            bind("wSecStatusQual", FieldType::String, |c, v| {
                c.fields.security_status_qual.set(Some(v.as_text()?));
                Ok(())
            }),
            bind("wInsideMatchPrice", FieldType::Price, |c, v| {
                c.fields.inside_match_price.set(v.as_price()?);
                c.is_order_imbalance = true;
                Ok(())
            }),
            bind("wFarClearingPrice", FieldType::Price, |c, v| {
                c.fields.far_clearing_price.set(v.as_price()?);
                c.is_order_imbalance = true;
                Ok(())
            }),
            bind("wNearClearingPrice", FieldType::Price, |c, v| {
                c.fields.near_clearing_price.set(v.as_price()?);
                c.is_order_imbalance = true;
                Ok(())
            }),
            bind("wNoClearingPrice", FieldType::Char, |c, v| {
                c.fields.no_clearing_price.set(Some(v.as_char()?));
                c.is_order_imbalance = true;
                Ok(())
            }),
            bind("wPriceVarInd", FieldType::Char, |c, v| {
                c.fields.price_var_ind.set(Some(v.as_char()?));
                Ok(())
            }),
            bind("wCrossType", FieldType::Char, |c, v| {
                c.fields.cross_type.set(Some(v.as_char()?));
                Ok(())
            }),
            bind("wMsgType", FieldType::I64, |c, v| {
                c.fields.msg_type.set(v.as_i64()?);
                Ok(())
            }),
            bind("wSeqNum", FieldType::U64, |c, v| {
                c.fields.event_seq_num.set(v.as_u64()?);
                Ok(())
            }),
            bind("wSecStatusOrigStatus", FieldType::String, |c, v| {
                c.fields.security_status_orig.set(Some(v.as_text()?));
                Ok(())
            }),
            bind("wSecStatusTime", FieldType::DateTime, |c, v| {
                c.fields.security_status_time.set(Some(v.as_datetime()?));
                Ok(())
            }),
            bind("wAuctionTime", FieldType::DateTime, |c, v| {
                c.fields.auction_time.set(Some(v.as_datetime()?));
                Ok(())
            }),
        ]);
        bindings
    }

    fn slot(registry: &FieldRegistry) -> &TableSlot<Self> {
        &registry.order_imbalance
    }

    fn decay(&mut self) {
        self.fields.common.decay();
        decay_all!(self.fields;
            high_indication_price, low_indication_price, indication_price,
            buy_volume, sell_volume, match_volume, security_status_qual, imbalance_type,
            inside_match_price, far_clearing_price, near_clearing_price, no_clearing_price,
            price_var_ind, cross_type, msg_type, event_seq_num,
            security_status_orig, security_status_time, auction_time,
        );
    }

    fn begin_message(&mut self) {
        self.fields.common.begin_message();
        self.is_order_imbalance = false;
    }

    fn symbol(&self) -> Option<&str> {
        self.fields.common.symbol()
    }
}

pub trait OrderImbalanceHandler: Send {
    fn on_order_imbalance_recap(&mut self, _sub: &Subscription, _view: &OrderImbalanceFields, _msg: &dyn Message) {}

    fn on_order_imbalance(&mut self, _sub: &Subscription, _view: &OrderImbalanceFields, _msg: &dyn Message) {}

    fn on_no_order_imbalance(&mut self, _sub: &Subscription, _view: &OrderImbalanceFields, _msg: &dyn Message) {}
}

pub type OrderImbalanceRecap = Recap<OrderImbalanceFields>;

#[derive(Debug, Clone, Copy)]
enum ImbalanceEvent {
    Recap,
    Imbalance,
    NoImbalance,
}

pub struct OrderImbalanceListener {
    core: ListenerCore<OrderImbalanceCache, dyn OrderImbalanceHandler>,
}

impl OrderImbalanceListener {
    pub fn new(registry: Arc<FieldRegistry>) -> Self {
        OrderImbalanceListener {
            core: ListenerCore::new(registry),
        }
    }

    pub fn add_handler(&self, handler: impl OrderImbalanceHandler + 'static) {
        self.core.add_handler(Box::new(handler));
    }

    pub fn dispatch_table(&self) -> Option<Arc<DispatchTable<OrderImbalanceCache>>> {
        self.core.table().cloned()
    }

    pub fn populate_recap(&self) -> Result<OrderImbalanceRecap, ListenerError> {
        self.core.populate_recap(|cache| &cache.fields)
    }

    pub fn with_view<R>(&self, f: impl FnOnce(&OrderImbalanceFields) -> R) -> R {
        self.core.with_cache(|cache| f(&cache.fields))
    }

    pub fn stats(&self) -> ListenerStats {
        self.core.stats()
    }

    pub fn reset(&self) {
        self.core.reset();
    }

    pub fn on_msg(&self, sub: &Subscription, msg: &dyn Message) -> Result<MsgOutcome, ListenerError> {
        let recap = match msg.msg_type() {
            MsgType::Initial | MsgType::Recap => true,
            MsgType::Update => false,
            _ => return self.core.ignore(),
        };

        self.core.process(
            sub,
            msg,
            |cache, _| {
                cache.resolve();
                let view = &cache.fields;
                let event = if recap {
                    ImbalanceEvent::Recap
                } else if !cache.is_order_imbalance {
                    return Routed::new(MsgOutcome::Unchanged, Vec::new(), view);
                } else if view.has_imbalance() {
                    ImbalanceEvent::Imbalance
                } else {
                    ImbalanceEvent::NoImbalance
                };
                Routed::new(MsgOutcome::Delivered, vec![event], view)
            },
            |handler, view: &OrderImbalanceFields, event: &ImbalanceEvent| match event {
                ImbalanceEvent::Recap => handler.on_order_imbalance_recap(sub, view, msg),
                ImbalanceEvent::Imbalance => handler.on_order_imbalance(sub, view, msg),
                ImbalanceEvent::NoImbalance => handler.on_no_order_imbalance(sub, view, msg),
            },
        )
    }
}

impl MsgListener for OrderImbalanceListener {
    fn on_msg(&self, sub: &Subscription, msg: &dyn Message) -> Result<MsgOutcome, ListenerError> {
        OrderImbalanceListener::on_msg(self, sub, msg)
    }
}
