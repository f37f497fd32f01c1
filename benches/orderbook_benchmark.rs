//! Benchmarks for order book message application

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use feed_connector::orderbook::{BitfinexBook, Book, CoinbaseBook, SnapshotClient};
use serde_json::{json, Value};

fn client() -> SnapshotClient {
    SnapshotClient::new(Duration::from_secs(1)).unwrap()
}

fn coinbase_snapshot(orders: usize) -> Value {
    let bids: Vec<Value> = (0..orders)
        .map(|i| json!([(50000 - i).to_string(), "1.5", format!("b{}", i)]))
        .collect();
    let asks: Vec<Value> = (0..orders)
        .map(|i| json!([(50001 + i).to_string(), "1.5", format!("a{}", i)]))
        .collect();

    json!({ "sequence": 1000, "bids": bids, "asks": asks })
}

fn loaded_coinbase_book() -> CoinbaseBook {
    let mut book = CoinbaseBook::new("BTC-USD", "http://localhost", client());
    book.load_snapshot(&coinbase_snapshot(500)).unwrap();
    book
}

fn benchmark_load_snapshot(c: &mut Criterion) {
    let snapshot = coinbase_snapshot(500);
    let raw: Vec<Value> = (0..1000u64)
        .map(|i| {
            let amount = if i % 2 == 0 { 1.5 } else { -1.5 };
            json!([i, 50000.0 + (i as f64) * 0.5, amount])
        })
        .collect();
    let raw = Value::Array(raw);

    c.bench_function("coinbase_load_snapshot_1000_orders", |b| {
        b.iter(|| {
            let mut book = CoinbaseBook::new("BTC-USD", "http://localhost", client());
            book.load_snapshot(black_box(&snapshot)).unwrap();
        })
    });

    c.bench_function("bitfinex_load_snapshot_1000_orders", |b| {
        b.iter(|| {
            let mut book = BitfinexBook::new("tBTCUSD", "http://localhost", 100, client());
            book.load_snapshot(black_box(&raw)).unwrap();
        })
    });
}

fn benchmark_apply_message(c: &mut Criterion) {
    let messages: Vec<Value> = (1..=200u64)
        .flat_map(|n| {
            let id = format!("o{}", n);
            [
                json!({
                    "type": "open", "sequence": 1000 + 2 * n - 1, "order_id": id,
                    "side": "buy", "price": "49999.50", "remaining_size": "0.25"
                }),
                json!({
                    "type": "done", "sequence": 1000 + 2 * n, "order_id": id,
                    "reason": "canceled"
                }),
            ]
        })
        .collect();

    c.bench_function("coinbase_apply_400_messages", |b| {
        b.iter_batched(
            loaded_coinbase_book,
            |mut book| {
                for message in &messages {
                    assert!(book.apply_message(black_box(message)));
                }
                book
            },
            BatchSize::SmallInput,
        )
    });
}

fn benchmark_metrics(c: &mut Criterion) {
    let book = loaded_coinbase_book();

    c.bench_function("book_metrics", |b| {
        b.iter(|| {
            black_box(book.metrics());
        })
    });
}

criterion_group!(
    benches,
    benchmark_load_snapshot,
    benchmark_apply_message,
    benchmark_metrics
);
criterion_main!(benches);
