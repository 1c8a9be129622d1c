// Path: crates/cli/tests/marketplace_e2e.rs

use mkt_cli::testing::{assert_log_contains, ValidatorNetwork};
use mkt_cli::LedgerState;
use mkt_types::{ObjectId, ObjectType, ValidatorConfig};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

fn write_store(data_dir: &Path, store: &Value) {
    let path = data_dir.join("store.json");
    let tmp = data_dir.join("store.json.tmp");
    std::fs::write(&tmp, serde_json::to_vec(store).unwrap()).unwrap();
    std::fs::rename(tmp, path).unwrap();
}

/// The object set left behind by registering one participant with a USD
/// currency asset and a token holding.
fn registered() -> Value {
    json!({
        "0f3a": { "object-type": "Participant", "name": "user", "creator": "0f3a" },
        "1acc": {
            "object-type": "Account", "name": "/user/account", "creator": "0f3a"
        },
        "2cur": {
            "object-type": "AssetType", "name": "/asset-type/currency", "creator": "0f3a",
            "restricted": false
        },
        "3usd": {
            "object-type": "Asset", "name": "/asset/currency/USD", "creator": "0f3a",
            "asset-type": "2cur"
        },
        "4tok": {
            "object-type": "AssetType", "name": "/asset-type/token", "creator": "0f3a"
        },
        "5tkn": {
            "object-type": "Asset", "name": "/asset/token", "creator": "0f3a",
            "asset-type": "4tok"
        },
        "6hus": {
            "object-type": "Holding", "name": "/user/holding/currency/USD", "creator": "0f3a",
            "account": "1acc", "asset": "3usd", "count": 1000
        },
        "7htk": {
            "object-type": "Holding", "name": "/user/holding/token", "creator": "0f3a",
            "account": "1acc", "asset": "5tkn", "count": 1
        }
    })
}

fn unregistered(mut store: Value) -> Value {
    if let Some(objects) = store.as_object_mut() {
        for object in objects.values_mut() {
            object["deleted"] = json!(true);
        }
    }
    store
}

#[tokio::test]
async fn resolves_registered_marketplace_objects() {
    mkt_telemetry::init_test_tracing();
    let config = ValidatorConfig::default()
        .with_option("InitialWaitTime", 0.5)
        .with_option("TargetWaitTime", 0.2);
    let mut net = ValidatorNetwork::builder()
        .with_binary(env!("CARGO_BIN_EXE_mock-validator"))
        .with_free_ports(1)
        .with_config(config)
        .with_ready_timeout(Duration::from_secs(20))
        .build()
        .unwrap();
    net.launch(1).await.unwrap();

    let url = net.urls()[0].clone();
    let data_dir = net.node(0).unwrap().data_dir().to_path_buf();
    let state = LedgerState::new();

    // Before anything is registered every lookup is absent.
    state.fetch(&url).await.unwrap();
    assert_eq!(state.n2i("//user", "Participant"), None);

    write_store(&data_dir, &registered());
    let mut logs = net.node(0).unwrap().subscribe_logs();
    let registered_snapshot = state.fetch(&url).await.unwrap();
    assert_log_contains("validator-0", &mut logs, "Serving store listing", Duration::from_secs(5))
        .await
        .unwrap();

    let expected = [
        ("//user", ObjectType::Participant, "0f3a"),
        ("//user/user/account", ObjectType::Account, "1acc"),
        ("//user/asset-type/currency", ObjectType::AssetType, "2cur"),
        ("//user/asset/currency/USD", ObjectType::Asset, "3usd"),
        ("//user/user/holding/currency/USD", ObjectType::Holding, "6hus"),
        ("//user/user/holding/token", ObjectType::Holding, "7htk"),
    ];
    for (path, object_type, id) in &expected {
        assert_eq!(
            state.n2i(path, object_type.clone()),
            Some(ObjectId::from(*id)),
            "{object_type} {path}"
        );
    }
    assert_eq!(state.n2i("//user/asset/currency/USD", "Holding"), None);
    assert_eq!(state.n2i("//nobody", "Participant"), None);

    let holding = state.object(&"6hus".into()).unwrap();
    assert_eq!(holding.reference("asset"), Some(&ObjectId::from("3usd")));

    write_store(&data_dir, &unregistered(registered()));
    state.fetch(&url).await.unwrap();
    for (path, object_type, _) in &expected {
        assert_eq!(state.n2i(path, object_type.clone()), None, "{object_type} {path}");
    }

    // The snapshot taken before unregistration still answers.
    assert_eq!(
        registered_snapshot.n2i("//user/user/holding/token", &ObjectType::Holding),
        Some(&ObjectId::from("7htk"))
    );

    let report = net.shutdown().await;
    assert!(report.is_clean(), "{report:?}");
}
