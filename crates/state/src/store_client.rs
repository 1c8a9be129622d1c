// Path: crates/state/src/store_client.rs

//! HTTP client for a validator's marketplace object store.

use mkt_types::object::{CREATOR_FIELD, DELETED_FIELD, NAME_FIELD, OBJECT_TYPE_FIELD, REFERENCE_FIELDS};
use mkt_types::{FetchError, ObjectId, ObjectType, RawObjectEntry};
use serde_json::{Map, Value};
use std::time::Duration;

/// Path of the store listing, relative to the validator URL.
pub const STORE_PATH: &str = "store/MarketPlaceTransaction/*";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Retrieves the complete raw object set from one validator.
#[derive(Debug, Clone)]
pub struct StoreClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl Default for StoreClient {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl StoreClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issues a single request and returns every entry in the store.
    pub async fn get_all(&self, url: &str) -> Result<Vec<RawObjectEntry>, FetchError> {
        let endpoint = store_url(url)?;
        tracing::debug!(target: "state", "Fetching object store from {}", endpoint);

        let response = self
            .http
            .get(&endpoint)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        let document: Value = serde_json::from_slice(&body)
            .map_err(|e| FetchError::Malformed(format!("response is not JSON: {e}")))?;
        parse_store(&document)
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

fn store_url(base: &str) -> Result<String, FetchError> {
    let trimmed = base.trim();
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(FetchError::InvalidUrl(base.to_string()));
    }
    Ok(format!("{}/{}", trimmed.trim_end_matches('/'), STORE_PATH))
}

/// Validates the shape of a store listing and converts it into entries.
///
/// The listing must be a JSON object mapping identifiers to objects, and
/// every object must carry a string `object-type`.
pub fn parse_store(document: &Value) -> Result<Vec<RawObjectEntry>, FetchError> {
    let objects = document
        .as_object()
        .ok_or_else(|| FetchError::Malformed("store listing is not a JSON object".to_string()))?;

    objects
        .iter()
        .map(|(id, value)| parse_entry(id, value))
        .collect()
}

fn parse_entry(id: &str, value: &Value) -> Result<RawObjectEntry, FetchError> {
    let fields = value
        .as_object()
        .ok_or_else(|| malformed(id, "entry is not a JSON object"))?;

    let object_type = match fields.get(OBJECT_TYPE_FIELD) {
        Some(Value::String(tag)) => ObjectType::from(tag.as_str()),
        Some(_) => return Err(malformed(id, "'object-type' is not a string")),
        None => return Err(malformed(id, "missing 'object-type'")),
    };

    let name = match fields.get(NAME_FIELD) {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) => Some(name.clone()),
        Some(_) => return Err(malformed(id, "'name' is not a string")),
    };

    let deleted = match fields.get(DELETED_FIELD) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(_) => return Err(malformed(id, "'deleted' is not a boolean")),
    };

    let creator = reference(id, fields, CREATOR_FIELD)?;
    let mut entry = RawObjectEntry::new(id, object_type);
    entry.name = name;
    entry.creator = creator;
    entry.deleted = deleted;
    for field in REFERENCE_FIELDS {
        if let Some(target) = reference(id, fields, field)? {
            entry.references.insert((*field).to_string(), target);
        }
    }
    entry.fields = fields.clone();
    Ok(entry)
}

// Empty strings are how the ledger writes an unset reference.
fn reference(
    id: &str,
    fields: &Map<String, Value>,
    field: &str,
) -> Result<Option<ObjectId>, FetchError> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(ObjectId::from(s.as_str()))),
        Some(_) => Err(malformed(id, &format!("reference '{field}' is not a string"))),
    }
}

fn malformed(id: &str, reason: &str) -> FetchError {
    FetchError::Malformed(format!("object {id}: {reason}"))
}
