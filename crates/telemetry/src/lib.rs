// Path: crates/telemetry/src/lib.rs
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

//! # Harness Telemetry
//!
//! Structured logging setup shared by the `mktnet` CLI, the mock validator
//! fixture and the integration tests.

/// The initialization routines for global structured logging.
pub mod init;

pub use init::{init_test_tracing, init_tracing, LogFormat};
