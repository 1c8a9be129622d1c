// Path: crates/types/src/lib.rs
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

//! # Marketplace Harness Types
//!
//! Shared data structures for the validator network harness: the validator
//! configuration object, the raw marketplace object model as it is read from
//! a validator's state endpoint, and the error enums every other crate in the
//! workspace returns.

/// The validator configuration object passed to every launch.
pub mod config;
/// Per-domain error enums and the `ErrorCode` trait.
pub mod error;
/// Marketplace object identifiers, type tags and raw store entries.
pub mod object;

pub use config::{NodePorts, ValidatorConfig};
pub use error::{ArchiveError, ConfigError, ErrorCode, FetchError, LaunchError, StartError};
pub use object::{ObjectId, ObjectType, RawObjectEntry};
