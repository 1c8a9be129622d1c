// Path: crates/cli/src/commands/query.rs

use anyhow::{Context, Result};
use clap::Parser;
use mkt_state::LedgerState;
use mkt_types::ObjectType;

#[derive(Parser, Debug)]
pub struct QueryArgs {
    /// The HTTP endpoint of the validator.
    #[clap(long, default_value = "http://127.0.0.1:9500")]
    pub url: String,

    /// Name path to resolve, e.g. `//user/asset/currency/USD`.
    #[clap(long)]
    pub path: String,

    /// Expected object type, e.g. `Asset`.
    #[clap(long = "type")]
    pub object_type: String,
}

#[derive(Parser, Debug)]
pub struct DumpArgs {
    /// The HTTP endpoint of the validator.
    #[clap(long, default_value = "http://127.0.0.1:9500")]
    pub url: String,

    /// Only list objects of this type.
    #[clap(long = "type")]
    pub object_type: Option<String>,
}

pub async fn run(args: QueryArgs) -> Result<()> {
    let state = LedgerState::new();
    state
        .fetch(&args.url)
        .await
        .with_context(|| format!("Failed to fetch ledger state from {}", args.url))?;

    match state.n2i(&args.path, args.object_type.as_str()) {
        Some(id) => println!("{}", id),
        None => println!("{} '{}' not found.", args.object_type, args.path),
    }
    Ok(())
}

pub async fn dump(args: DumpArgs) -> Result<()> {
    let state = LedgerState::new();
    let index = state
        .fetch(&args.url)
        .await
        .with_context(|| format!("Failed to fetch ledger state from {}", args.url))?;

    let filter = args.object_type.as_deref().map(ObjectType::from);
    for (object_type, path, id) in index.iter() {
        if filter.as_ref().is_some_and(|t| t != object_type) {
            continue;
        }
        println!("{:<14} {:<48} {}", object_type, path, id);
    }
    if !index.unresolved().is_empty() {
        println!("({} objects without a resolvable name)", index.unresolved().len());
    }
    Ok(())
}
