/// Subscriptions
///
/// A subscription is one instrument from one source. The transport hands it
/// each message in order and it fans the message out to every listener
/// attached to it, in attachment order.

use crate::error::ListenerError;
use crate::listener::MsgOutcome;
use crate::message::Message;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Anything that consumes messages for a subscription
pub trait MsgListener: Send + Sync {
    fn on_msg(&self, sub: &Subscription, msg: &dyn Message) -> Result<MsgOutcome, ListenerError>;
}

pub struct Subscription {
    source: String,
    symbol: String,
    listeners: Vec<Arc<dyn MsgListener>>,
    active: AtomicBool,
}

impl Subscription {
    pub fn new(source: impl Into<String>, symbol: impl Into<String>) -> Self {
        Subscription {
            source: source.into(),
            symbol: symbol.into(),
            listeners: Vec::new(),
            active: AtomicBool::new(true),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn add_listener(&mut self, listener: Arc<dyn MsgListener>) {
        self.listeners.push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Forwards `msg` to every listener. All listeners run even if one
    /// reports an error; the first error is returned.
    pub fn deliver(&self, msg: &dyn Message) -> Result<(), ListenerError> {
        if !self.is_active() {
            return Ok(());
        }

        let mut first_error = None;
        for listener in &self.listeners {
            if let Err(err) = listener.on_msg(self, msg) {
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Stops delivery; later messages are dropped
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("source", &self.source)
            .field("symbol", &self.symbol)
            .field("listeners", &self.listeners.len())
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{FieldMessage, MsgType};
    use parking_lot::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl MsgListener for Recorder {
        fn on_msg(&self, _sub: &Subscription, _msg: &dyn Message) -> Result<MsgOutcome, ListenerError> {
            self.log.lock().push(self.name);
            if self.fail {
                Err(ListenerError::NoMessageProcessed)
            } else {
                Ok(MsgOutcome::Delivered)
            }
        }
    }

    #[test]
    fn test_fan_out_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut sub = Subscription::new("NYSE", "IBM");
        for (name, fail) in [("a", false), ("b", true), ("c", false)] {
            sub.add_listener(Arc::new(Recorder {
                name,
                log: log.clone(),
                fail,
            }));
        }

        let result = sub.deliver(&FieldMessage::new(MsgType::Update));
        assert_eq!(result, Err(ListenerError::NoMessageProcessed));
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_deactivated_subscription_drops_messages() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut sub = Subscription::new("NYSE", "IBM");
        sub.add_listener(Arc::new(Recorder {
            name: "a",
            log: log.clone(),
            fail: false,
        }));

        sub.deactivate();
        sub.deliver(&FieldMessage::new(MsgType::Update)).unwrap();
        assert!(log.lock().is_empty());
        assert!(!sub.is_active());
    }
}
