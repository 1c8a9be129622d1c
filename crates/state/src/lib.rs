// Path: crates/state/src/lib.rs
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

//! # Ledger State
//!
//! Materializes the marketplace object graph held by a validator and answers
//! name-to-identifier queries against it.
//!
//! The crate is layered leaves first:
//!
//! - [`store_client`] issues one request against a validator's state endpoint
//!   and returns the raw object set.
//! - [`index`] walks that set once, resolving each object's creator chain into
//!   a hierarchical name path, and freezes the result into a [`NameIndex`].
//! - [`resolver`] holds the current [`NameIndex`] snapshot and swaps in a new
//!   one on every successful fetch.

pub mod index;
pub mod resolver;
pub mod store_client;

pub use index::NameIndex;
pub use resolver::LedgerState;
pub use store_client::StoreClient;
