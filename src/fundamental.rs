/// Fundamental equity data listener: dividends, share counts, ratios.

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

type Time = Tracked<Option<DateTime<Utc>>>;
type Text = Tracked<Option<String>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FundamentalFields {
    #[serde(flatten)]
    pub common: CommonFields,
    pub corp_act_type: Text,
    pub dividend_price: Tracked<Price>,
    pub dividend_freq: Text,
    pub dividend_ex_date: Time,
    pub dividend_pay_date: Time,
    pub dividend_rec_date: Time,
    pub dividend_currency: Text,
    pub shares_out: Tracked<u64>,
    pub shares_float: Tracked<u64>,
    pub shares_auth: Tracked<u64>,
    pub earn_per_share: Tracked<f64>,
    pub volatility: Tracked<f64>,
    pub pe_ratio: Tracked<f64>,
    pub dividend_yield: Tracked<f64>,
    pub market_segment: Text,
    pub market_sector: Text,
    pub market_segment_native: Text,
    pub market_sector_native: Text,
    pub hist_volatility: Tracked<f64>,
    pub risk_free_rate: Tracked<f64>,
}

#[derive(Debug, Default)]
pub struct FundamentalCache {
    fields: FundamentalFields,
}

impl FundamentalCache {
    pub fn fields(&self) -> &FundamentalFields {
        &self.fields
    }
}

impl HasCommon for FundamentalCache {
    fn common_mut(&mut self) -> &mut CommonFields {
        &mut self.fields.common
    }
}

impl FieldCache for FundamentalCache {
    const KIND: EntityKind = EntityKind::Fundamental;

    fn bindings() -> Vec<FieldBinding<Self>> {
        let bind = FieldBinding::<FundamentalCache>::new;
        let mut bindings = common_bindings::<FundamentalCache>();
        bindings.extend([
            bind("wCorpActType", FieldType::String, |c, v| {
                c.fields.corp_act_type.set(Some(v.as_text()?));
                Ok(())
            }),
            bind("wDividendPrice", FieldType::Price, |c, v| {
                c.fields.dividend_price.set(v.as_price()?);
                Ok(())
            }),
            bind("wDividendFreq", FieldType::String, |c, v| {
                c.fields.dividend_freq.set(Some(v.as_text()?));
                Ok(())
            }),
            bind("wDividendExDate", FieldType::DateTime, |c, v| {
                c.fields.dividend_ex_date.set(Some(v.as_datetime()?));
                Ok(())
            }),
            bind("wDividendPayDate", FieldType::DateTime, |c, v| {
                c.fields.dividend_pay_date.set(Some(v.as_datetime()?));
                Ok(())
            }),
            bind("wDividendRecDate", FieldType::DateTime, |c, v| {
                c.fields.dividend_rec_date.set(Some(v.as_datetime()?));
                Ok(())
            }),
            bind("wDividendCurrency", FieldType::String, |c, v| {
                c.fields.dividend_currency.set(Some(v.as_text()?));
                Ok(())
            }),
            bind("wSharesOut", FieldType::U64, |c, v| {
                c.fields.shares_out.set(v.as_u64()?);
                Ok(())
            }),
            bind("wSharesFloat", FieldType::U64, |c, v| {
                c.fields.shares_float.set(v.as_u64()?);
                Ok(())
            }),
            bind("wSharesAuth", FieldType::U64, |c, v| {
                c.fields.shares_auth.set(v.as_u64()?);
                Ok(())
            }),
            bind("wEarnPerShare", FieldType::F64, |c, v| {
                c.fields.earn_per_share.set(v.as_f64()?);
                Ok(())
            }),
            bind("wVolatility", FieldType::F64, |c, v| {
                c.fields.volatility.set(v.as_f64()?);
                Ok(())
            }),
            bind("wPeRatio", FieldType::F64, |c, v| {
                c.fields.pe_ratio.set(v.as_f64()?);
                Ok(())
            }),
            bind("wYield", FieldType::F64, |c, v| {
                c.fields.dividend_yield.set(v.as_f64()?);
                Ok(())
            }),
            bind("wMarketSegment", FieldType::String, |c, v| {
                c.fields.market_segment.set(Some(v.as_text()?));
                Ok(())
            }),
            bind("wMarketSector", FieldType::String, |c, v| {
                c.fields.market_sector.set(Some(v.as_text()?));
                Ok(())
            }),
            bind("wMarketSegmentNative", FieldType::String, |c, v| {
                c.fields.market_segment_native.set(Some(v.as_text()?));
                Ok(())
            }),
            bind("wMarketSectorNative", FieldType::String, |c, v| {
                c.fields.market_sector_native.set(Some(v.as_text()?));
                Ok(())
            }),
            bind("wHistVolatility", FieldType::F64, |c, v| {
                c.fields.hist_volatility.set(v.as_f64()?);
                Ok(())
            }),
            bind("wRiskFreeRate", FieldType::F64, |c, v| {
                c.fields.risk_free_rate.set(v.as_f64()?);
                Ok(())
            }),
        ]);
        bindings
    }

    fn slot(registry: &FieldRegistry) -> &TableSlot<Self> {
        &registry.fundamentals
    }

    fn decay(&mut self) {
        self.fields.common.decay();
        decay_all!(self.fields;
            corp_act_type, dividend_price, dividend_freq, dividend_ex_date, dividend_pay_date,
            dividend_rec_date, dividend_currency, shares_out, shares_float, shares_auth,
            earn_per_share, volatility, pe_ratio, dividend_yield, market_segment, market_sector,
            market_segment_native, market_sector_native, hist_volatility, risk_free_rate,
        );
    }

    fn begin_message(&mut self) {
        self.fields.common.begin_message();
    }

    fn symbol(&self) -> Option<&str> {
        self.fields.common.symbol()
    }
}

pub trait FundamentalHandler: Send {
    fn on_fundamentals(&mut self, sub: &Subscription, view: &FundamentalFields, msg: &dyn Message);
}

pub type FundamentalRecap = Recap<FundamentalFields>;

pub struct FundamentalListener {
    core: ListenerCore<FundamentalCache, dyn FundamentalHandler>,
}

impl FundamentalListener {
    pub fn new(registry: Arc<FieldRegistry>) -> Self {
        FundamentalListener {
            core: ListenerCore::new(registry),
        }
    }

    pub fn add_handler(&self, handler: impl FundamentalHandler + 'static) {
        self.core.add_handler(Box::new(handler));
    }

    pub fn dispatch_table(&self) -> Option<Arc<DispatchTable<FundamentalCache>>> {
        self.core.table().cloned()
    }

    pub fn populate_recap(&self) -> Result<FundamentalRecap, ListenerError> {
        self.core.populate_recap(|cache| &cache.fields)
    }

    pub fn with_view<R>(&self, f: impl FnOnce(&FundamentalFields) -> R) -> R {
        self.core.with_cache(|cache| f(&cache.fields))
    }

    pub fn stats(&self) -> ListenerStats {
        self.core.stats()
    }

    pub fn reset(&self) {
        self.core.reset();
    }

    pub fn on_msg(&self, sub: &Subscription, msg: &dyn Message) -> Result<MsgOutcome, ListenerError> {
        if !matches!(msg.msg_type(), MsgType::Initial | MsgType::Recap | MsgType::Update) {
            return self.core.ignore();
        }

        self.core.process(
            sub,
            msg,
            |cache, _| {
                cache.fields.common.resolve();
                Routed::new(MsgOutcome::Delivered, vec![()], &cache.fields)
            },
            |handler, view: &FundamentalFields, _: &()| handler.on_fundamentals(sub, view, msg),
        )
    }
}

impl MsgListener for FundamentalListener {
    fn on_msg(&self, sub: &Subscription, msg: &dyn Message) -> Result<MsgOutcome, ListenerError> {
        FundamentalListener::on_msg(self, sub, msg)
    }
}
