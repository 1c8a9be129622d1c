// Path: crates/state/src/resolver.rs

//! The public query surface over a validator's ledger state.

use crate::index::NameIndex;
use crate::store_client::StoreClient;
use arc_swap::ArcSwap;
use mkt_types::{FetchError, ObjectId, ObjectType, RawObjectEntry};
use std::sync::Arc;

/// Holds the most recently fetched [`NameIndex`] and answers queries on it.
///
/// Queries always run against one complete snapshot. A successful
/// [`fetch`](Self::fetch) swaps in a freshly built index; a failed one leaves
/// the previous index in place.
pub struct LedgerState {
    client: StoreClient,
    snapshot: ArcSwap<NameIndex>,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerState {
    pub fn new() -> Self {
        Self::with_client(StoreClient::new())
    }

    pub fn with_client(client: StoreClient) -> Self {
        Self {
            client,
            snapshot: ArcSwap::from_pointee(NameIndex::default()),
        }
    }

    /// Retrieves the validator's store and replaces the current snapshot.
    ///
    /// Returns the new snapshot so callers can keep querying it after later
    /// fetches.
    pub async fn fetch(&self, url: &str) -> Result<Arc<NameIndex>, FetchError> {
        let entries = match self.client.get_all(url).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(target: "state", "Fetch from {} failed: {}", url, e);
                return Err(e);
            }
        };
        let fetched = entries.len();
        let index = Arc::new(NameIndex::build(entries));
        tracing::info!(
            target: "state",
            "Fetched {} objects from {} ({} indexed, {} unresolved)",
            fetched,
            url,
            index.len(),
            index.unresolved().len()
        );
        self.snapshot.store(index.clone());
        Ok(index)
    }

    /// Resolves a name path of the given type to its identifier.
    ///
    /// Absence is a normal result: it means no live object of that type is
    /// addressed by `path` in the current snapshot.
    pub fn n2i(&self, path: &str, object_type: impl Into<ObjectType>) -> Option<ObjectId> {
        self.snapshot.load().n2i(path, &object_type.into()).cloned()
    }

    pub fn i2n(&self, id: &ObjectId) -> Option<String> {
        self.snapshot.load().i2n(id).map(String::from)
    }

    pub fn object(&self, id: &ObjectId) -> Option<RawObjectEntry> {
        self.snapshot.load().object(id).cloned()
    }

    pub fn objects_of_type(&self, object_type: impl Into<ObjectType>) -> Vec<(String, ObjectId)> {
        self.snapshot
            .load()
            .objects_of_type(&object_type.into())
            .into_iter()
            .map(|(path, id)| (path.to_string(), id.clone()))
            .collect()
    }

    /// The snapshot queries currently run against.
    pub fn snapshot(&self) -> Arc<NameIndex> {
        self.snapshot.load_full()
    }
}
