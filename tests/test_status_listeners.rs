/// Security status, order imbalance and fundamental listeners, plus
/// subscription fan-out across kinds

use market_listeners::{
    FieldDescriptor, FieldMessage, FieldRegistry, FieldValue, FundamentalFields, FundamentalHandler,
    FundamentalListener, Message, MsgOutcome, MsgType, OrderImbalanceFields, OrderImbalanceHandler,
    OrderImbalanceListener, OrderImbalanceType, QuoteListener, SecurityStatusFields, SecurityStatusHandler,
    SecurityStatusListener, SharedDictionary, Subscription,
};
use market_listeners::registry::standard_fields;
use parking_lot::Mutex;
use std::sync::Arc;

fn build(registry: &FieldRegistry, msg_type: MsgType, fields: &[(&str, FieldValue)]) -> FieldMessage {
    let mut msg = FieldMessage::new(msg_type);
    for (name, value) in fields {
        msg.push(registry.fid(name).unwrap(), value.clone());
    }
    msg
}

#[derive(Clone, Default)]
struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

impl SecurityStatusHandler for Log {
    fn on_security_status_recap(&mut self, _: &Subscription, view: &SecurityStatusFields, _: &dyn Message) {
        self.push(format!("recap {}", view.status.as_str().unwrap_or("-")));
    }

    fn on_security_status_update(&mut self, _: &Subscription, view: &SecurityStatusFields, _: &dyn Message) {
        self.push(format!("update {}", view.status.as_str().unwrap_or("-")));
    }
}

impl OrderImbalanceHandler for Log {
    fn on_order_imbalance_recap(&mut self, _: &Subscription, _: &OrderImbalanceFields, _: &dyn Message) {
        self.push("imbalance recap");
    }

    fn on_order_imbalance(&mut self, _: &Subscription, view: &OrderImbalanceFields, _: &dyn Message) {
        self.push(format!("imbalance {}", view.buy_volume.get()));
    }

    fn on_no_order_imbalance(&mut self, _: &Subscription, _: &OrderImbalanceFields, _: &dyn Message) {
        self.push("no imbalance");
    }
}

impl FundamentalHandler for Log {
    fn on_fundamentals(&mut self, _: &Subscription, view: &FundamentalFields, _: &dyn Message) {
        self.push(format!("fundamentals {}", view.dividend_price.get()));
    }
}

#[test]
fn test_security_status_gating() {
    let registry = FieldRegistry::standard();
    let listener = SecurityStatusListener::new(registry.clone());
    let log = Log::default();
    listener.add_handler(log.clone());
    let sub = Subscription::new("NYSE", "IBM");

    let status = |msg_type, value: &str| {
        build(&registry, msg_type, &[("wSecStatus", FieldValue::String(value.into()))])
    };

    listener.on_msg(&sub, &status(MsgType::Initial, "Normal")).unwrap();
    assert_eq!(listener.on_msg(&sub, &status(MsgType::SecStatus, "Normal")).unwrap(), MsgOutcome::Unchanged);
    listener.on_msg(&sub, &status(MsgType::SecStatus, "Halted")).unwrap();

    let qualifier = build(
        &registry,
        MsgType::Update,
        &[("wSecStatusQual", FieldValue::String("Opening".into()))],
    );
    listener.on_msg(&sub, &qualifier).unwrap();

    assert_eq!(log.entries(), vec!["recap Normal", "update Halted", "update Halted"]);
}

#[test]
fn test_security_status_circuit_breaker_gated() {
    let registry = FieldRegistry::standard();
    let listener = SecurityStatusListener::new(registry.clone());
    let sub = Subscription::new("NYSE", "IBM");

    let breaker = build(&registry, MsgType::Update, &[("wShortSaleCircuitBreaker", FieldValue::Char('A'))]);
    assert_eq!(listener.on_msg(&sub, &breaker).unwrap(), MsgOutcome::Delivered);
    assert_eq!(listener.on_msg(&sub, &breaker).unwrap(), MsgOutcome::Unchanged);
    listener.with_view(|view| assert_eq!(view.short_sale_circuit_breaker.get(), Some('A')));
}

#[test]
fn test_order_imbalance_routing() {
    let registry = FieldRegistry::standard();
    let listener = OrderImbalanceListener::new(registry.clone());
    let log = Log::default();
    listener.add_handler(log.clone());
    let sub = Subscription::new("NYSE", "IBM");

    let send = |msg_type, fields: &[(&str, FieldValue)]| listener.on_msg(&sub, &build(&registry, msg_type, fields)).unwrap();

    send(MsgType::Initial, &[("wBuyVolume", FieldValue::U64(100))]);
    // no imbalance fields at all
    assert_eq!(send(MsgType::Update, &[("wCrossType", FieldValue::Char('O'))]), MsgOutcome::Unchanged);
    send(
        MsgType::Update,
        &[
            ("wBuyVolume", FieldValue::U64(500)),
            ("wSecStatusQual", FieldValue::String("MocImbBuy".into())),
        ],
    );
    send(MsgType::Update, &[("wSecStatusQual", FieldValue::String("21".into()))]);
    // unknown qualifier alone does not make an imbalance message
    assert_eq!(
        send(MsgType::Update, &[("wSecStatusQual", FieldValue::String("Halted".into()))]),
        MsgOutcome::Unchanged
    );
    // but with imbalance data an unknown type counts as an imbalance
    send(MsgType::Update, &[("wSellVolume", FieldValue::U64(5))]);

    assert_eq!(
        log.entries(),
        vec!["imbalance recap", "imbalance 500", "no imbalance", "imbalance 500"]
    );
    listener.with_view(|view| {
        assert_eq!(view.imbalance_type.get(), None);
        assert_eq!(view.security_status_qual.as_str(), Some("Halted"));
    });
}

#[test]
fn test_imbalance_type_from_qualifier() {
    let registry = FieldRegistry::standard();
    let listener = OrderImbalanceListener::new(registry.clone());
    let sub = Subscription::new("NYSE", "IBM");
    let msg = build(&registry, MsgType::Update, &[("wSecStatusQual", FieldValue::I64(24))]);
    listener.on_msg(&sub, &msg).unwrap();
    listener.with_view(|view| {
        assert_eq!(view.imbalance_type.get(), Some(OrderImbalanceType::OrderImbalanceBuy));
        assert!(view.has_imbalance());
    });
}

#[test]
fn test_fundamentals() {
    let registry = FieldRegistry::standard();
    let listener = FundamentalListener::new(registry.clone());
    let log = Log::default();
    listener.add_handler(log.clone());
    let sub = Subscription::new("NYSE", "IBM");

    let msg = build(
        &registry,
        MsgType::Recap,
        &[
            ("wDividendPrice", FieldValue::F64(0.5)),
            ("wSharesOut", FieldValue::U64(900_000_000)),
            ("wPeRatio", FieldValue::F64(21.4)),
        ],
    );
    listener.on_msg(&sub, &msg).unwrap();
    assert_eq!(listener.on_msg(&sub, &FieldMessage::new(MsgType::Trade)).unwrap(), MsgOutcome::Ignored);

    assert_eq!(log.entries(), vec!["fundamentals 0.5"]);
    let recap = listener.populate_recap().unwrap();
    assert_eq!(recap.shares_out.get(), 900_000_000);
    assert_eq!(recap.pe_ratio.get(), 21.4);
}

#[test]
fn test_not_ready_until_dictionary_loads() {
    let dictionary = Arc::new(SharedDictionary::new());
    let registry = Arc::new(FieldRegistry::new(dictionary.clone()));
    let listener = FundamentalListener::new(registry.clone());
    let sub = Subscription::new("NYSE", "IBM");

    let msg = FieldMessage::new(MsgType::Recap).with(1, FieldValue::String("IBM".into()));
    assert_eq!(listener.on_msg(&sub, &msg).unwrap(), MsgOutcome::NotReady);
    assert!(listener.dispatch_table().is_none());
    assert_eq!(listener.stats().not_ready(), 1);

    dictionary.load(standard_fields());
    let fid = registry.fid("wSymbol").unwrap();
    let msg = FieldMessage::new(MsgType::Recap).with(fid, FieldValue::String("IBM".into()));
    assert_eq!(listener.on_msg(&sub, &msg).unwrap(), MsgOutcome::Delivered);
    listener.with_view(|view| assert_eq!(view.common.symbol(), Some("IBM")));
}

#[test]
fn test_renamed_fields() {
    let dictionary = SharedDictionary::with_fields([
        FieldDescriptor::new(1, "SYM", market_listeners::FieldType::String),
        FieldDescriptor::new(2, "BID", market_listeners::FieldType::Price),
    ]);
    let names = market_listeners::FieldNames::from_json(r#"{"wSymbol": "SYM", "wBidPrice": "BID"}"#).unwrap();
    let registry = Arc::new(FieldRegistry::with_names(Arc::new(dictionary), names));
    let listener = QuoteListener::new(registry);
    let sub = Subscription::new("NYSE", "IBM");

    let msg = FieldMessage::new(MsgType::Quote)
        .with(1, FieldValue::String("IBM".into()))
        .with(2, FieldValue::F64(10.0));
    listener.on_msg(&sub, &msg).unwrap();
    listener.with_view(|view| {
        assert_eq!(view.common.symbol(), Some("IBM"));
        assert_eq!(view.bid_price.get().to_f64(), 10.0);
    });
    assert_eq!(listener.dispatch_table().unwrap().bound_fields(), 2);
}

#[test]
fn test_subscription_fans_out_to_every_kind() {
    let registry = FieldRegistry::standard();
    let quotes = Arc::new(QuoteListener::new(registry.clone()));
    let status = Arc::new(SecurityStatusListener::new(registry.clone()));

    let mut sub = Subscription::new("NYSE", "IBM");
    sub.add_listener(quotes.clone());
    sub.add_listener(status.clone());

    let msg = build(
        &registry,
        MsgType::Initial,
        &[
            ("wBidPrice", FieldValue::F64(10.0)),
            ("wSecStatus", FieldValue::String("Normal".into())),
        ],
    );
    sub.deliver(&msg).unwrap();

    quotes.with_view(|view| assert!(view.bid_price.is_modified()));
    status.with_view(|view| assert_eq!(view.status.as_str(), Some("Normal")));
    assert_eq!(quotes.stats().recaps(), 1);
    assert_eq!(status.stats().recaps(), 1);
}
