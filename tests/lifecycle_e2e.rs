use assetledger::{AssetEngine, Document, EngineConfig, ErrorKind, InMemoryLedger, InvokeOutcome, Method, Transaction};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value as Json};

const CONFIG: &str = r#"{
    "settings": {"recent_states_limit": 10},
    "classes": [
        {"name": "asset", "prefix": "AST.", "assetidpath": "asset.assetID"}
    ],
    "rules": [
        {"name": "tilt-raise", "class": "asset", "alert": "tilt", "polarity": "raise",
         "trigger": {"match": "any", "select": [{"qprop": "asset.tilt", "op": "gt", "value": 45}]}},
        {"name": "tilt-clear", "class": "asset", "alert": "tilt", "polarity": "clear",
         "trigger": {"match": "all", "select": [{"qprop": "asset.tilt", "op": "le", "value": 45}]}}
    ]
}"#;

fn setup() -> (AssetEngine, InMemoryLedger) {
    let engine = EngineConfig::from_json_str(CONFIG).unwrap().build().unwrap();
    (engine, InMemoryLedger::new())
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn invoke_at(
    engine: &AssetEngine,
    ledger: &InMemoryLedger,
    at: DateTime<Utc>,
    function: &str,
    method: Method,
    args: &[Json],
) -> InvokeOutcome {
    let args: Vec<Document> = args.iter().cloned().map(|a| Document::from_json(a).unwrap()).collect();
    let txid = format!("tx-{}", at.timestamp());
    let txn = Transaction::new(ledger, &txid, at);
    engine.invoke(&txn, function, method, &args).unwrap()
}

fn ok(outcome: InvokeOutcome) -> Json {
    assert!(outcome.is_ok(), "unexpected failure: {:?}", outcome.message);
    outcome.payload
}

fn ids(payload: &Json) -> Vec<String> {
    payload
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["assetID"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn carrier_filter_selects_matching_assets() {
    let (engine, ledger) = setup();
    for (id, carrier) in [("P1", "UPS"), ("P2", "FedEx"), ("P3", "UPS")] {
        ok(invoke_at(
            &engine,
            &ledger,
            t0(),
            "createAsset",
            Method::Invoke,
            &[json!({"asset": {"assetID": id, "carrier": carrier}})],
        ));
    }

    let ups = ok(invoke_at(
        &engine,
        &ledger,
        t0(),
        "readAllAssets",
        Method::Query,
        &[json!({"filter": {"match": "all", "select": [{"qprop": "asset.carrier", "value": "UPS"}]}})],
    ));
    assert_eq!(ids(&ups), ["P1", "P3"]);

    let everything = ok(invoke_at(&engine, &ledger, t0(), "readAllAssets", Method::Query, &[]));
    assert_eq!(everything.as_array().unwrap().len(), 3);

    let not_ups = ok(invoke_at(
        &engine,
        &ledger,
        t0(),
        "readAllAssets",
        Method::Query,
        &[json!({"filter": {"match": "none", "select": [{"qprop": "asset.carrier", "value": "UPS"}]}})],
    ));
    assert_eq!(ids(&not_ups), ["P2"]);
}

#[test]
fn history_is_ordered_and_deletable() {
    let (engine, ledger) = setup();
    let asset = json!({"asset": {"assetID": "H1"}});

    ok(invoke_at(&engine, &ledger, t0(), "createAsset", Method::Invoke, &[json!({"asset": {"assetID": "H1", "tilt": 10}})]));
    for (minutes, tilt) in [(1, 20), (2, 60), (3, 30)] {
        ok(invoke_at(
            &engine,
            &ledger,
            t0() + Duration::minutes(minutes),
            "updateAsset",
            Method::Invoke,
            &[json!({"asset": {"assetID": "H1", "tilt": tilt}})],
        ));
    }

    let history = ok(invoke_at(&engine, &ledger, t0(), "readAssetStateHistory", Method::Query, &[asset.clone()]));
    let tilts: Vec<i64> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["state"]["asset"]["tilt"].as_i64().unwrap())
        .collect();
    assert_eq!(tilts, [10, 20, 60, 30]);
    assert_eq!(history[2]["alerts"], json!(["tilt"]));
    assert_eq!(history[3]["compliant"], true);

    let window = ok(invoke_at(
        &engine,
        &ledger,
        t0(),
        "readAssetStateHistory",
        Method::Query,
        &[json!({
            "asset": {"assetID": "H1"},
            "daterange": {"begin": "2024-03-01 12:01:00", "end": "2024-03-01T12:02:00Z"}
        })],
    ));
    assert_eq!(window.as_array().unwrap().len(), 2);

    let removed = ok(invoke_at(&engine, &ledger, t0(), "deleteAssetStateHistory", Method::Invoke, &[asset.clone()]));
    assert_eq!(removed["removed"], 4);

    let history = ok(invoke_at(&engine, &ledger, t0(), "readAssetStateHistory", Method::Query, &[asset.clone()]));
    assert!(history.as_array().unwrap().is_empty());

    let current = ok(invoke_at(&engine, &ledger, t0(), "readAsset", Method::Query, &[asset]));
    assert_eq!(current["state"]["asset"]["tilt"], 30);
}

#[test]
fn update_of_unknown_asset_needs_create_on_first_update() {
    let (engine, ledger) = setup();
    let event = json!({"asset": {"assetID": "N1", "tilt": 5}});

    let out = invoke_at(&engine, &ledger, t0(), "updateAsset", Method::Invoke, &[event.clone()]);
    assert!(!out.is_ok());
    assert_eq!(out.kind, Some(ErrorKind::NotFound));
    assert_eq!(ledger.current_len().unwrap(), 0);

    ok(invoke_at(
        &engine,
        &ledger,
        t0(),
        "setCreateOnFirstUpdate",
        Method::Invoke,
        &[json!({"setCreateOnFirstUpdate": true})],
    ));

    let created = ok(invoke_at(&engine, &ledger, t0(), "updateAsset", Method::Invoke, &[event]));
    assert_eq!(created["assetID"], "N1");
    assert_eq!(created["alerts"], json!([]));
    assert_eq!(created["eventout"]["payload"]["invokeresult"]["status"], "OK");
}

#[test]
fn deleted_assets_keep_history_and_leave_recent_list() {
    let (engine, ledger) = setup();
    for id in ["R1", "R2", "R3"] {
        ok(invoke_at(&engine, &ledger, t0(), "createAsset", Method::Invoke, &[json!({"asset": {"assetID": id}})]));
    }
    ok(invoke_at(&engine, &ledger, t0(), "updateAsset", Method::Invoke, &[json!({"asset": {"assetID": "R1", "tilt": 1}})]));

    let recent = ok(invoke_at(&engine, &ledger, t0(), "readRecentStates", Method::Query, &[]));
    assert_eq!(ids(&recent), ["R1", "R3", "R2"]);

    let deleted = ok(invoke_at(
        &engine,
        &ledger,
        t0(),
        "deleteAllAssets",
        Method::Invoke,
        &[json!({"filter": {"match": "all", "select": [{"qprop": "asset.tilt", "value": "1"}]}})],
    ));
    assert_eq!(deleted, json!(["R1"]));

    let recent = ok(invoke_at(&engine, &ledger, t0(), "readRecentStates", Method::Query, &[]));
    assert_eq!(ids(&recent), ["R3", "R2"]);

    let history = ok(invoke_at(
        &engine,
        &ledger,
        t0(),
        "readAssetStateHistory",
        Method::Query,
        &[json!({"asset": {"assetID": "R1"}})],
    ));
    assert_eq!(history.as_array().unwrap().len(), 2);

    let out = invoke_at(
        &engine,
        &ledger,
        t0(),
        "readAssetStateHistory",
        Method::Query,
        &[json!({"asset": {"assetID": "never"}})],
    );
    assert_eq!(out.kind, Some(ErrorKind::NotFound));
}

#[test]
fn world_state_reset_clears_everything() {
    let (engine, ledger) = setup();
    ok(invoke_at(&engine, &ledger, t0(), "initContract", Method::Deploy, &[json!({"version": "1.0"})]));
    ok(invoke_at(&engine, &ledger, t0(), "createAsset", Method::Invoke, &[json!({"asset": {"assetID": "W1"}})]));

    let world = ok(invoke_at(&engine, &ledger, t0(), "readWorldState", Method::Query, &[]));
    assert!(world["AST.W1"].is_object());
    assert_eq!(world["~sys/contract"]["version"], "1.0");

    ok(invoke_at(&engine, &ledger, t0(), "deleteWorldState", Method::Invoke, &[]));
    let world = ok(invoke_at(&engine, &ledger, t0(), "readWorldState", Method::Query, &[]));
    assert_eq!(world, json!({}));
    assert_eq!(ledger.history_len().unwrap(), 0);
}
