// Path: crates/cli/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # Marketplace Network CLI Library
//!
//! This library provides the tooling used to stand up a local network of
//! marketplace validators, drive it from tests, and tear it down again.
//!
//! The crate is a *consumer* of the validator: it starts validator binaries as
//! independent processes, talks to them only over their HTTP endpoints, and
//! never links validator internals. The same workflows a developer runs by
//! hand (launch a cluster, submit against node 0, inspect the resulting state,
//! archive the logs) are what the `testing` module automates.
//!
//! This crate contains modules for:
//! - `testing`: the validator process supervisor, the network manager, polling
//!   helpers, node status RPC and result archiving.

pub mod testing;

// Re-export core testing primitives for ergonomic top-level access.
// This allows tests to use `mkt_cli::ValidatorNetwork` directly.
pub use testing::cluster::{ClusterState, ShutdownReport, ValidatorNetwork, ValidatorNetworkBuilder};
pub use testing::validator::{StopOutcome, ValidatorLaunchSpec, ValidatorProcess};

// The state resolver lives in its own crate; re-exported for test convenience.
pub use mkt_state::LedgerState;
