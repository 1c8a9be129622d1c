// Path: crates/cli/tests/network_e2e.rs

use mkt_cli::testing::{
    get_ledger_statistics, pick_disjoint_blocks, ClusterState, ShutdownReport, ValidatorNetwork,
    ValidatorNetworkBuilder,
};
use mkt_cli::LedgerState;
use mkt_types::{LaunchError, StartError, ValidatorConfig};
use serde_json::json;
use std::collections::HashSet;
use std::io::Read;
use std::net::{TcpListener, UdpSocket};
use std::time::Duration;

fn mock_binary() -> &'static str {
    env!("CARGO_BIN_EXE_mock-validator")
}

fn fast_config() -> ValidatorConfig {
    ValidatorConfig::default()
        .with_option("InitialWaitTime", 0.5)
        .with_option("TargetWaitTime", 0.2)
}

fn builder(count: usize) -> ValidatorNetworkBuilder {
    ValidatorNetwork::builder()
        .with_binary(mock_binary())
        .with_free_ports(count)
        .with_config(fast_config())
        .with_ready_timeout(Duration::from_secs(20))
        .with_stop_timeout(Duration::from_secs(5))
}

fn network(count: usize) -> ValidatorNetwork {
    builder(count).build().unwrap()
}

#[tokio::test]
async fn launches_connected_clusters_of_one_to_three_nodes() {
    mkt_telemetry::init_test_tracing();
    let http = reqwest::Client::new();

    for count in 1..=3usize {
        let mut net = network(count);
        net.launch(count).await.unwrap();
        assert_eq!(net.state(), ClusterState::Ready);

        let urls = net.urls();
        assert_eq!(urls.len(), count);
        assert_eq!(urls.iter().collect::<HashSet<_>>().len(), count);
        assert!(urls.iter().all(|u| u.starts_with("http://127.0.0.1:")));
        assert_eq!(net.urls(), urls, "urls must be stable while running");

        for url in &urls {
            let stats = get_ledger_statistics(&http, url).await.unwrap();
            assert!(stats.peer_count >= (count as u64) - 1, "{url}: {stats:?}");
            assert!(stats.committed_block_count >= 1, "{url}: {stats:?}");
        }

        let again = net.launch(count).await.unwrap_err();
        assert!(matches!(again, LaunchError::AlreadyRunning(_)), "unexpected error: {again}");

        let report = net.shutdown().await;
        assert!(report.is_clean(), "{report:?}");
        assert_eq!(report.graceful + report.forced, count);
        assert_eq!(net.state(), ClusterState::Stopped);
        assert_eq!(net.live_count(), 0);

        assert_eq!(net.shutdown().await, ShutdownReport::default());
    }
}

#[tokio::test]
async fn node_exit_during_settling_rolls_back_the_launch() {
    mkt_telemetry::init_test_tracing();
    let config = fast_config().with_option("InitialWaitTime", 3.0);
    let mut net = ValidatorNetwork::builder()
        .with_binary(mock_binary())
        .with_free_ports(2)
        .with_config(config)
        .with_node_option(1, "MockExitAfterMs", 300)
        .with_ready_timeout(Duration::from_secs(20))
        .with_stop_timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let err = net.launch(2).await.unwrap_err();
    assert!(
        matches!(err, LaunchError::NodeExited { index: 1, .. }),
        "unexpected error: {err}"
    );
    assert_eq!(net.state(), ClusterState::Stopped);
    assert_eq!(net.live_count(), 0);

    for node in net.nodes() {
        let ports = node.ports();
        TcpListener::bind(("127.0.0.1", ports.http)).unwrap();
        UdpSocket::bind(("127.0.0.1", ports.gossip)).unwrap();
    }
}

#[tokio::test]
async fn occupied_port_fails_the_launch() {
    let (http, gossip) = pick_disjoint_blocks(1).unwrap();
    let _held = TcpListener::bind(("127.0.0.1", http)).unwrap();

    let mut net = ValidatorNetwork::builder()
        .with_binary(mock_binary())
        .with_http_port(http)
        .with_gossip_port(gossip)
        .with_config(fast_config())
        .build()
        .unwrap();

    let err = net.launch(1).await.unwrap_err();
    match err {
        LaunchError::Start {
            index: 0,
            source: StartError::PortUnavailable { port, .. },
        } => assert_eq!(port, http),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(net.state(), ClusterState::Stopped);
    assert!(net.urls().is_empty());
}

#[tokio::test]
async fn missing_binary_fails_the_launch() {
    let mut net = ValidatorNetwork::builder()
        .with_binary("/nonexistent/txnvalidator")
        .with_free_ports(1)
        .build()
        .unwrap();

    let err = net.launch(1).await.unwrap_err();
    assert!(
        matches!(
            err,
            LaunchError::Start {
                source: StartError::Spawn { .. },
                ..
            }
        ),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn result_archive_holds_node_logs_after_a_run() {
    mkt_telemetry::init_test_tracing();
    let out = tempfile::tempdir().unwrap();
    let archive = out.path().join("results.tar.zst");

    let mut net = network(2);
    assert!(!net.create_result_archive(&archive).unwrap());
    assert!(!archive.exists());

    net.launch(2).await.unwrap();
    net.shutdown().await;

    let log = std::fs::read_to_string(net.node(0).unwrap().data_dir().join("validator.log")).unwrap();
    assert!(log.contains("VALIDATOR_HTTP_LISTENING_ON_127.0.0.1:"), "{log}");

    assert!(net.create_result_archive(&archive).unwrap());
    let mut tar_data = Vec::new();
    zstd::Decoder::new(std::fs::File::open(&archive).unwrap())
        .unwrap()
        .read_to_end(&mut tar_data)
        .unwrap();
    let mut tar = tar::Archive::new(&tar_data[..]);
    let names: HashSet<String> = tar
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect();
    for node in ["validator-0", "validator-1"] {
        assert!(names.contains(&format!("{node}/validator.log")), "{names:?}");
        assert!(names.contains(&format!("{node}/validator.json")), "{names:?}");
    }
}

#[tokio::test]
async fn relaunch_starts_from_empty_data_directories() {
    mkt_telemetry::init_test_tracing();
    let mut net = network(1);
    net.launch(1).await.unwrap();

    let data_dir = net.node(0).unwrap().data_dir().to_path_buf();
    let store = json!({
        "p1": { "object-type": "Participant", "name": "user", "creator": "p1" }
    });
    std::fs::write(data_dir.join("store.json"), serde_json::to_vec(&store).unwrap()).unwrap();
    let state = LedgerState::new();
    state.fetch(&net.urls()[0]).await.unwrap();
    assert!(state.n2i("//user", "Participant").is_some());
    net.shutdown().await;

    net.launch(1).await.unwrap();
    assert_eq!(net.node(0).unwrap().data_dir(), data_dir.as_path());
    assert!(!data_dir.join("store.json").exists());
    state.fetch(&net.urls()[0]).await.unwrap();
    assert_eq!(state.n2i("//user", "Participant"), None);
    net.shutdown().await;
}

#[tokio::test]
async fn unconnected_cluster_times_out_as_not_ready() {
    mkt_telemetry::init_test_tracing();
    let mut net = builder(2)
        .with_node_option(0, "MockNeverPeer", true)
        .with_ready_timeout(Duration::from_millis(1500))
        .build()
        .unwrap();

    let err = net.launch(2).await.unwrap_err();
    match &err {
        LaunchError::NotReady { detail, .. } => {
            assert!(detail.contains("validator-0: 0/1 peers"), "{detail}")
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(net.state(), ClusterState::Stopped);
    assert_eq!(net.live_count(), 0);
}

#[tokio::test]
async fn exit_before_readiness_is_exited_early() {
    mkt_telemetry::init_test_tracing();
    let mut net = builder(2)
        .with_node_option(1, "MockExitAfterMs", 0)
        .build()
        .unwrap();

    let err = net.launch(2).await.unwrap_err();
    assert!(
        matches!(
            err,
            LaunchError::Start {
                index: 1,
                source: StartError::ExitedEarly { .. }
            }
        ),
        "unexpected error: {err}"
    );
    assert_eq!(net.state(), ClusterState::Stopped);
    assert_eq!(net.live_count(), 0);
}

#[tokio::test]
async fn missing_readiness_marker_times_out_the_start() {
    mkt_telemetry::init_test_tracing();
    let mut net = builder(1)
        .with_node_option(0, "MockSilent", true)
        .with_start_timeout(Duration::from_secs(1))
        .build()
        .unwrap();

    let err = net.launch(1).await.unwrap_err();
    match err {
        LaunchError::Start {
            index: 0,
            source: StartError::Timeout(waited),
        } => assert_eq!(waited, Duration::from_secs(1)),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(net.state(), ClusterState::Stopped);
    assert_eq!(net.live_count(), 0);
}

#[tokio::test]
async fn earlier_node_exit_while_a_later_node_starts_fails_the_launch() {
    mkt_telemetry::init_test_tracing();
    let mut net = builder(2)
        .with_node_option(0, "MockExitAfterMs", 300)
        .with_node_option(1, "MockStartDelayMs", 800)
        .build()
        .unwrap();

    let err = net.launch(2).await.unwrap_err();
    assert!(
        matches!(err, LaunchError::NodeExited { index: 0, .. }),
        "unexpected error: {err}"
    );
    assert_eq!(net.state(), ClusterState::Stopped);
    assert_eq!(net.live_count(), 0);
}

#[tokio::test]
async fn attached_network_uses_running_validators_without_owning_them() {
    mkt_telemetry::init_test_tracing();
    let mut owner = network(1);
    owner.launch(1).await.unwrap();

    let mut attached = ValidatorNetwork::attach(owner.urls()).unwrap();
    assert_eq!(attached.state(), ClusterState::Ready);
    assert_eq!(attached.urls(), owner.urls());

    let state = LedgerState::new();
    state.fetch(&attached.urls()[0]).await.unwrap();
    assert_eq!(state.n2i("//user", "Participant"), None);

    assert_eq!(attached.shutdown().await, ShutdownReport::default());
    let out = tempfile::tempdir().unwrap();
    assert!(!attached.create_result_archive(&out.path().join("r.tar.zst")).unwrap());
    drop(attached);

    assert_eq!(owner.live_count(), 1);
    let stats = get_ledger_statistics(&reqwest::Client::new(), &owner.urls()[0])
        .await
        .unwrap();
    assert!(stats.committed_block_count >= 1, "{stats:?}");
    assert!(owner.shutdown().await.is_clean());
}
