/// Listener core
///
/// Shared machinery behind every entity-kind listener: the dispatch table
/// handle, the per-subscription cache lock, the handler list and the message
/// cycle (decay, reset transient flags, iterate present fields). Each kind
/// supplies the routing, derived fields and callbacks.
///
/// The cache lock covers field iteration, derived fields and the counter
/// checks only. Handlers run after it is released, against an owned copy of
/// the view, so a callback may read or snapshot its own listener.

use crate::dispatch::{DispatchTable, FieldBinding, TableSlot};
use crate::error::{FieldError, ListenerError};
use crate::message::{Message, MsgClass};
use crate::recap::Recap;
use crate::registry::{EntityKind, FieldRegistry};
use crate::stats::ListenerStats;
use crate::subscription::Subscription;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use strum::Display;
use tracing::{trace, warn};

/// How a message ended for one listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MsgOutcome {
    /// Handlers were notified
    Delivered,
    /// Duplicate counter; fields applied, notification suppressed
    Suppressed,
    /// Fields applied, nothing this kind reports on changed
    Unchanged,
    /// Message class not handled by this kind
    Ignored,
    /// Dictionary not ready; message dropped
    NotReady,
}

/// A per-subscription cache for one entity kind
pub trait FieldCache: Default + Send + 'static {
    const KIND: EntityKind;

    /// Canonical field bindings for this kind
    fn bindings() -> Vec<FieldBinding<Self>>;

    /// This kind's table slot in a registry
    fn slot(registry: &FieldRegistry) -> &TableSlot<Self>;

    /// MODIFIED -> UNMODIFIED for every tracked field
    fn decay(&mut self);

    /// Clears the per-message transient flags
    fn begin_message(&mut self);

    fn symbol(&self) -> Option<&str>;
}

/// What a kind decided under the cache lock: how the message ended and the
/// callbacks still to run, in order, against a copy of the view.
pub(crate) struct Routed<V, E> {
    outcome: MsgOutcome,
    events: Vec<E>,
    view: Option<V>,
}

impl<V: Clone, E> Routed<V, E> {
    /// The view is copied only when there is a callback to run
    pub(crate) fn new(outcome: MsgOutcome, events: Vec<E>, view: &V) -> Self {
        let view = (!events.is_empty()).then(|| view.clone());
        Routed { outcome, events, view }
    }
}

struct ListenerState<C> {
    cache: C,
    stats: ListenerStats,
    processed: bool,
}

impl<C: FieldCache> ListenerState<C> {
    /// Decays states, clears transient flags and routes every present field
    /// through the table. Malformed values are collected, not applied.
    fn apply(&mut self, table: &DispatchTable<C>, msg: &dyn Message) -> Vec<FieldError> {
        self.cache.decay();
        self.cache.begin_message();
        self.stats.record_message();
        if msg.msg_type().class() == MsgClass::Recap {
            self.stats.record_recap();
        }
        self.processed = true;

        let cache = &mut self.cache;
        let mut errors = Vec::new();
        msg.visit_fields(&mut |fid, value| match table.lookup(fid) {
            Some(binding) => {
                if let Err(source) = (binding.apply)(cache, value) {
                    errors.push(FieldError {
                        fid,
                        name: binding.name,
                        source,
                    });
                }
            }
            None => trace!(kind = %C::KIND, symbol = ?cache.symbol(), fid, "ignoring unbound field"),
        });
        errors
    }
}

pub struct ListenerCore<C, H: ?Sized> {
    registry: Arc<FieldRegistry>,
    table: OnceLock<Arc<DispatchTable<C>>>,
    state: Mutex<ListenerState<C>>,
    handlers: Mutex<Vec<Box<H>>>,
    // newly added handlers, moved into `handlers` by the next dispatch
    pending: Mutex<Vec<Box<H>>>,
    handler_count: AtomicUsize,
}

impl<C: FieldCache, H: ?Sized> ListenerCore<C, H> {
    /// Creates the core and, if the dictionary is ready, takes the kind's
    /// table right away.
    pub fn new(registry: Arc<FieldRegistry>) -> Self {
        let core = ListenerCore {
            registry,
            table: OnceLock::new(),
            state: Mutex::new(ListenerState {
                cache: C::default(),
                stats: ListenerStats::new(),
                processed: false,
            }),
            handlers: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            handler_count: AtomicUsize::new(0),
        };
        core.table();
        core
    }

    pub fn table(&self) -> Option<&Arc<DispatchTable<C>>> {
        if let Some(table) = self.table.get() {
            return Some(table);
        }
        let shared = self.registry.table::<C>()?;
        Some(self.table.get_or_init(|| shared))
    }

    pub fn registry(&self) -> &Arc<FieldRegistry> {
        &self.registry
    }

    /// Registers a handler; it is called from the next dispatched message on
    pub fn add_handler(&self, handler: Box<H>) {
        self.pending.lock().push(handler);
        self.handler_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_count(&self) -> usize {
        self.handler_count.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> ListenerStats {
        self.state.lock().stats.clone()
    }

    /// Reads the live cache under the lock
    pub fn with_cache<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.state.lock().cache)
    }

    /// Snapshot of the view `select` picks out of the cache
    pub fn populate_recap<F: Clone>(&self, select: impl FnOnce(&C) -> &F) -> Result<Recap<F>, ListenerError> {
        let state = self.state.lock();
        if !state.processed {
            return Err(ListenerError::NoMessageProcessed);
        }
        Ok(Recap::capture(select(&state.cache)))
    }

    /// Back to the freshly constructed cache; handlers stay registered
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.cache = C::default();
        state.processed = false;
    }

    /// Runs one message cycle. `route` sees the updated cache under the lock
    /// and decides the outcome; `notify` then runs each resulting event on
    /// every handler, outside the cache lock.
    pub(crate) fn process<V: Clone, E>(
        &self,
        sub: &Subscription,
        msg: &dyn Message,
        route: impl FnOnce(&mut C, &mut ListenerStats) -> Routed<V, E>,
        mut notify: impl FnMut(&mut H, &V, &E),
    ) -> Result<MsgOutcome, ListenerError> {
        let Some(table) = self.table() else {
            warn!(kind = %C::KIND, symbol = sub.symbol(), "field dictionary not ready, dropping message");
            self.state.lock().stats.record_outcome(MsgOutcome::NotReady);
            return Ok(MsgOutcome::NotReady);
        };

        let (routed, errors) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let errors = state.apply(table, msg);
            let routed = route(&mut state.cache, &mut state.stats);
            state.stats.record_outcome(routed.outcome);
            if !errors.is_empty() {
                state.stats.record_field_errors(errors.len());
            }
            (routed, errors)
        };

        if let Some(view) = &routed.view {
            let mut handlers = self.handlers.lock();
            handlers.append(&mut self.pending.lock());
            for event in &routed.events {
                for handler in handlers.iter_mut() {
                    notify(&mut **handler, view, event);
                }
            }
        }

        if errors.is_empty() {
            return Ok(routed.outcome);
        }

        warn!(
            kind = %C::KIND,
            symbol = sub.symbol(),
            count = errors.len(),
            "message carried malformed fields"
        );
        Err(ListenerError::MalformedFields {
            symbol: sub.symbol().to_string(),
            errors,
        })
    }

    /// Records a message this kind does not handle
    pub(crate) fn ignore(&self) -> Result<MsgOutcome, ListenerError> {
        self.state.lock().stats.record_outcome(MsgOutcome::Ignored);
        Ok(MsgOutcome::Ignored)
    }
}
