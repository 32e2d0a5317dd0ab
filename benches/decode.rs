/// Decode throughput and latency benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use market_listeners::{Decoder, Encoder, FieldMessage, FieldRegistry, FieldValue, MsgType, Price};

fn quote_message(registry: &FieldRegistry, count: u64) -> FieldMessage {
    let fid = |name| registry.fid(name).unwrap_or_default();
    FieldMessage::new(MsgType::Quote)
        .with(fid("wSymbol"), FieldValue::String("IBM.N".into()))
        .with(fid("wQuoteCount"), FieldValue::U64(count))
        .with(fid("wBidPrice"), FieldValue::Price(Price::from_i64(100)))
        .with(fid("wBidSize"), FieldValue::U64(300))
        .with(fid("wAskPrice"), FieldValue::F64(100.05))
        .with(fid("wAskSize"), FieldValue::U64(200))
}

fn create_message_buffer(registry: &FieldRegistry, msg_count: usize) -> Vec<u8> {
    let mut buffer = Vec::new();
    for count in 0..msg_count as u64 {
        Encoder::encode(&quote_message(registry, count + 1), &mut buffer).unwrap();
    }
    buffer
}

fn bench_decode_throughput(c: &mut Criterion) {
    let registry = FieldRegistry::standard();
    let mut group = c.benchmark_group("decode_throughput");

    for msg_count in [1000, 10000, 100000].iter() {
        let buffer = create_message_buffer(&registry, *msg_count);
        group.throughput(Throughput::Bytes(buffer.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(msg_count), &buffer, |b, buffer| {
            b.iter(|| {
                Decoder::decode_stream(black_box(buffer), |msg| {
                    black_box(msg);
                    true
                })
            })
        });
    }
    group.finish();
}

fn bench_decode_latency(c: &mut Criterion) {
    let registry = FieldRegistry::standard();
    let mut group = c.benchmark_group("decode_latency");

    let quote = Encoder::to_bytes(&quote_message(&registry, 42)).unwrap();
    group.bench_function("quote", |b| b.iter(|| Decoder::decode(black_box(&quote))));

    let empty = Encoder::to_bytes(&FieldMessage::new(MsgType::Update)).unwrap();
    group.bench_function("empty", |b| b.iter(|| Decoder::decode(black_box(&empty))));

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let registry = FieldRegistry::standard();
    let msg = quote_message(&registry, 42);
    let mut out = Vec::with_capacity(256);

    c.bench_function("encode_quote", |b| {
        b.iter(|| {
            out.clear();
            Encoder::encode(black_box(&msg), &mut out)
        })
    });
}

criterion_group!(benches, bench_decode_throughput, bench_decode_latency, bench_encode);
criterion_main!(benches);
