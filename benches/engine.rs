use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

use assetledger::{
    evaluate, merge, AssetEngine, Comparison, Document, EngineConfig, Filter, InMemoryLedger,
    Method, Rule, Selector, Transaction,
};

fn make_engine() -> AssetEngine {
    EngineConfig::from_json_str(
        r#"{
        "classes": [{"name": "asset", "prefix": "AST.", "assetidpath": "asset.assetID"}],
        "rules": [
            {"name": "cold", "class": "asset", "alert": "cold", "polarity": "raise",
             "trigger": {"match": "all", "select": [{"qprop": "asset.temperature", "op": "lt", "value": "0"}]}},
            {"name": "warm", "class": "asset", "alert": "cold", "polarity": "clear",
             "trigger": {"match": "all", "select": [{"qprop": "asset.temperature", "op": "ge", "value": "0"}]}}
        ]
    }"#,
    )
    .unwrap()
    .build()
    .unwrap()
}

fn event(id: usize, temperature: i64) -> Document {
    Document::from_json(json!({
        "asset": {
            "assetID": format!("A{id}"),
            "carrier": if id % 3 == 0 { "FedEx" } else { "UPS" },
            "temperature": temperature,
            "common": {"location": {"latitude": 40.0, "longitude": -73.0}}
        }
    }))
    .unwrap()
}

fn bench_merge(c: &mut Criterion) {
    let existing = event(1, 4);
    let patch = Document::from_json(json!({"asset": {"temperature": -2, "common": {"deviceID": "d1"}}})).unwrap();
    c.bench_function("core/merge_nested_event", |b| {
        b.iter(|| merge(black_box(Some(&existing)), black_box(&patch)));
    });
}

fn bench_rules(c: &mut Criterion) {
    let state = event(1, -5);
    let mut group = c.benchmark_group("core/evaluate_rules");
    for n in [2usize, 16, 128] {
        let rules: Vec<Rule> = (0..n)
            .map(|i| {
                let trigger = Filter::all(vec![
                    Selector::compare("asset.temperature", Comparison::Lt, i.to_string()).unwrap(),
                ]);
                Rule::raise(format!("r{i}"), "asset", format!("alert{i}"), trigger)
            })
            .collect();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &rules, |b, rules| {
            b.iter(|| evaluate(black_box(rules), black_box(&state)));
        });
    }
    group.finish();
}

fn bench_update_path(c: &mut Criterion) {
    let engine = make_engine();
    let ledger = InMemoryLedger::new();
    let txn = Transaction::new(&ledger, "bench", Utc::now());
    engine
        .invoke(&txn, "createAsset", Method::Invoke, &[event(1, 3)])
        .unwrap();

    let mut temperature = 0i64;
    c.bench_function("engine/update_asset", |b| {
        b.iter(|| {
            temperature = if temperature > 0 { -1 } else { 1 };
            let out = engine
                .invoke(&txn, "updateAsset", Method::Invoke, &[event(1, temperature)])
                .unwrap();
            black_box(out)
        });
    });
}

fn bench_filtered_read_all(c: &mut Criterion) {
    let engine = make_engine();
    let ledger = InMemoryLedger::new();
    let txn = Transaction::new(&ledger, "bench", Utc::now());
    for id in 0..512 {
        engine
            .invoke(&txn, "createAsset", Method::Invoke, &[event(id, 2)])
            .unwrap();
    }
    let filter = Document::from_json(json!({
        "filter": {"match": "all", "select": [{"qprop": "asset.carrier", "value": "UPS"}]}
    }))
    .unwrap();

    let mut group = c.benchmark_group("engine/read_all_assets");
    group.throughput(Throughput::Elements(512));
    group.bench_function("carrier_filter", |b| {
        b.iter(|| {
            engine
                .invoke(&txn, "readAllAssets", Method::Query, std::slice::from_ref(&filter))
                .unwrap()
        });
    });
    group.finish();
}

criterion_group!(benches, bench_merge, bench_rules, bench_update_path, bench_filtered_read_all);
criterion_main!(benches);
