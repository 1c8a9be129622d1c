// Path: crates/cli/src/testing/mod.rs
//! Contains helper functions for launching and driving validator networks in
//! end-to-end tests. These are exposed as a public library so transaction
//! family authors can write their own integration tests with the same tooling.

pub mod archive;
pub mod assert;
pub mod cluster;
pub mod ports;
pub mod rpc;
pub mod validator;

// Re-export public items
pub use archive::write_result_archive;
pub use assert::{assert_log_contains, Backoff};
pub use cluster::{ClusterState, ShutdownReport, ValidatorNetwork, ValidatorNetworkBuilder};
pub use ports::{pick_disjoint_blocks, pick_port_block};
pub use rpc::{get_ledger_statistics, LedgerStatistics};
pub use validator::{StopOutcome, ValidatorLaunchSpec, ValidatorProcess};
