// Path: crates/cli/src/commands/mod.rs

pub mod network;
pub mod query;
