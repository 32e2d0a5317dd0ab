/// Security status listener
///
/// Tracks trading status, its qualifier and the short-sale circuit breaker.
/// Status updates are only reported when one of the gated fields actually
/// changed value; there is no counter to check.

use crate::common::{common_bindings, CommonFields, HasCommon};
use crate::dispatch::{DispatchTable, FieldBinding, TableSlot};
use crate::error::ListenerError;
use crate::field_state::{decay_all, Tracked};
use crate::listener::{FieldCache, ListenerCore, MsgOutcome, Routed};
use crate::message::{FieldType, Message, MsgType};
use crate::recap::Recap;
use crate::registry::{EntityKind, FieldRegistry};
use crate::stats::ListenerStats;
use crate::subscription::{MsgListener, Subscription};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SecurityStatusFields {
    #[serde(flatten)]
    pub common: CommonFields,
    pub status: Tracked<Option<String>>,
    pub qualifier: Tracked<Option<String>>,
    pub orig_status: Tracked<Option<String>>,
    pub short_sale_circuit_breaker: Tracked<Option<char>>,
    pub event_time: Tracked<Option<DateTime<Utc>>>,
    pub event_seq_num: Tracked<u64>,
    pub reason: Tracked<Option<String>>,
}

#[derive(Debug, Default)]
pub struct SecurityStatusCache {
    fields: SecurityStatusFields,
    /// A gated field changed value this message
    updated: bool,
}

impl SecurityStatusCache {
    pub fn fields(&self) -> &SecurityStatusFields {
        &self.fields
    }
}

impl HasCommon for SecurityStatusCache {
    fn common_mut(&mut self) -> &mut CommonFields {
        &mut self.fields.common
    }
}

impl FieldCache for SecurityStatusCache {
    const KIND: EntityKind = EntityKind::SecurityStatus;

    fn bindings() -> Vec<FieldBinding<Self>> {
        let bind = FieldBinding::<SecurityStatusCache>::new;
        let mut bindings = common_bindings::<SecurityStatusCache>();
        bindings.extend([
            bind("wSecStatus", FieldType::String, |c, v| {
                c.updated |= c.fields.status.set_if_changed(Some(v.as_text()?));
                Ok(())
            }),
            bind("wSecStatusQual", FieldType::String, |c, v| {
                c.updated |= c.fields.qualifier.set_if_changed(Some(v.as_text()?));
                Ok(())
            }),
            bind("wSecStatusOrigStatus", FieldType::String, |c, v| {
                c.updated |= c.fields.orig_status.set_if_changed(Some(v.as_text()?));
                Ok(())
            }),
            bind("wShortSaleCircuitBreaker", FieldType::Char, |c, v| {
                c.updated |= c.fields.short_sale_circuit_breaker.set_if_changed(Some(v.as_char()?));
                Ok(())
            }),
            bind("wSecStatusTime", FieldType::DateTime, |c, v| {
                c.fields.event_time.set(Some(v.as_datetime()?));
                Ok(())
            }),
            bind("wSeqNum", FieldType::U64, |c, v| {
                c.fields.event_seq_num.set(v.as_u64()?);
                Ok(())
            }),
            bind("wReason", FieldType::String, |c, v| {
                c.fields.reason.set(Some(v.as_text()?));
                Ok(())
            }),
        ]);
        bindings
    }

    fn slot(registry: &FieldRegistry) -> &TableSlot<Self> {
        &registry.security_status
    }

    fn decay(&mut self) {
        self.fields.common.decay();
        decay_all!(self.fields;
            status, qualifier, orig_status, short_sale_circuit_breaker,
            event_time, event_seq_num, reason,
        );
    }

    fn begin_message(&mut self) {
        self.fields.common.begin_message();
        self.updated = false;
    }

    fn symbol(&self) -> Option<&str> {
        self.fields.common.symbol()
    }
}

pub trait SecurityStatusHandler: Send {
    fn on_security_status_recap(&mut self, _sub: &Subscription, _view: &SecurityStatusFields, _msg: &dyn Message) {}

    fn on_security_status_update(&mut self, _sub: &Subscription, _view: &SecurityStatusFields, _msg: &dyn Message) {}
}

pub type SecurityStatusRecap = Recap<SecurityStatusFields>;

pub struct SecurityStatusListener {
    core: ListenerCore<SecurityStatusCache, dyn SecurityStatusHandler>,
}

impl SecurityStatusListener {
    pub fn new(registry: Arc<FieldRegistry>) -> Self {
        SecurityStatusListener {
            core: ListenerCore::new(registry),
        }
    }

    pub fn add_handler(&self, handler: impl SecurityStatusHandler + 'static) {
        self.core.add_handler(Box::new(handler));
    }

    pub fn dispatch_table(&self) -> Option<Arc<DispatchTable<SecurityStatusCache>>> {
        self.core.table().cloned()
    }

    pub fn populate_recap(&self) -> Result<SecurityStatusRecap, ListenerError> {
        self.core.populate_recap(|cache| &cache.fields)
    }

    pub fn with_view<R>(&self, f: impl FnOnce(&SecurityStatusFields) -> R) -> R {
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
            MsgType::PreOpening
            | MsgType::SecStatus
            | MsgType::Update
            | MsgType::Quote
            | MsgType::Trade
            | MsgType::BookUpdate => false,
            _ => return self.core.ignore(),
        };

        // true for the recap callback, false for the update callback
        self.core.process(
            sub,
            msg,
            |cache, _| {
                cache.fields.common.resolve();
                if recap || cache.updated {
                    Routed::new(MsgOutcome::Delivered, vec![recap], &cache.fields)
                } else {
                    Routed::new(MsgOutcome::Unchanged, Vec::new(), &cache.fields)
                }
            },
            |handler, view: &SecurityStatusFields, is_recap: &bool| {
                if *is_recap {
                    handler.on_security_status_recap(sub, view, msg);
                } else {
                    handler.on_security_status_update(sub, view, msg);
                }
            },
        )
    }
}

impl MsgListener for SecurityStatusListener {
    fn on_msg(&self, sub: &Subscription, msg: &dyn Message) -> Result<MsgOutcome, ListenerError> {
        SecurityStatusListener::on_msg(self, sub, msg)
    }
}
