/// Synthetic quote feed generator
///
/// Builds a randomised quote stream with occasional skipped and repeated
/// counts, encodes it to the binary wire format, then decodes it back
/// through a subscription holding a quote listener. Prints the listener
/// statistics and the final recap as JSON.
///
/// Usage: feed_generator [message_count] [output_path]

use market_listeners::{
    Decoder, Encoder, FieldMessage, FieldRegistry, FieldValue, GapWindow, Message, MsgType, Price, QuoteFields,
    QuoteHandler, QuoteListener, Subscription,
};
use rand::Rng;
use rust_decimal::Decimal;
use std::env;
use std::error::Error;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

struct GapLogger;

impl QuoteHandler for GapLogger {
    fn on_quote_gap(&mut self, sub: &Subscription, _: &QuoteFields, gap: &GapWindow, _: &dyn Message) {
        info!(symbol = sub.symbol(), begin = gap.begin(), end = gap.end(), "gap");
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    let message_count: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(10000);
    let output_path = args.get(2).cloned();

    let registry = FieldRegistry::standard();
    let fid = |name: &str| registry.fid(name).ok_or_else(|| format!("missing field {name}"));
    let (count_fid, bid_fid, bid_size_fid, ask_fid, ask_size_fid, symbol_fid) = (
        fid("wQuoteCount")?,
        fid("wBidPrice")?,
        fid("wBidSize")?,
        fid("wAskPrice")?,
        fid("wAskSize")?,
        fid("wIssueSymbol")?,
    );

    let mut rng = rand::thread_rng();
    let mut buffer = Vec::new();
    let mut count = 0u64;
    let mut mid = Decimal::new(10000, 2);

    info!(message_count, "generating feed");

    let initial = FieldMessage::new(MsgType::Initial)
        .with(symbol_fid, FieldValue::String("IBM.N".into()))
        .with(count_fid, FieldValue::U64(count));
    Encoder::encode(&initial, &mut buffer)?;

    for _ in 0..message_count {
        match rng.gen_range(0..100) {
            0 | 1 => count += rng.gen_range(2..5), // skipped counts
            2 => {}                                 // repeated count
            _ => count += 1,
        }

        mid += Decimal::new(rng.gen_range(-5..=5), 2);
        let half_spread = Decimal::new(rng.gen_range(1..=3), 2);

        let msg = FieldMessage::new(MsgType::Quote)
            .with(count_fid, FieldValue::U64(count))
            .with(bid_fid, FieldValue::Price(Price::new(mid - half_spread)))
            .with(bid_size_fid, FieldValue::U64(rng.gen_range(1..10) * 100))
            .with(ask_fid, FieldValue::Price(Price::new(mid + half_spread)))
            .with(ask_size_fid, FieldValue::U64(rng.gen_range(1..10) * 100));
        Encoder::encode(&msg, &mut buffer)?;
    }

    if let Some(path) = output_path {
        File::create(&path)?.write_all(&buffer)?;
        info!(path = %path, bytes = buffer.len(), "feed written");
    }

    let listener = Arc::new(QuoteListener::new(registry.clone()));
    listener.add_handler(GapLogger);
    let mut sub = Subscription::new("NYSE", "IBM.N");
    sub.add_listener(listener.clone());

    let decoded = Decoder::decode_stream(&buffer, |msg| {
        if let Err(e) = sub.deliver(&msg) {
            warn!(error = %e, "delivery failed");
        }
        true
    })?;

    info!(decoded, bytes = buffer.len(), "feed replayed");
    println!("{}", listener.stats());

    let recap = listener.populate_recap()?;
    println!("{}", serde_json::to_string_pretty(&recap)?);
    Ok(())
}
