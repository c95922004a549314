//! Response envelope decoding
//!
//! The API wraps every payload as `{"Response": [{"<Key>": {...}}, ...]}`.
//! Decoding is generic over the target shape and locates payloads by exact
//! key first, then by key prefix (anchor objects such as
//! `MonetaryAccountBank` under a `MonetaryAccount` listing).

use crate::{DecodeError, DecodeResult, ListResponse, Pagination};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Success envelope: `{"Response": [...], "Pagination": {...}}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Entries in response order; each is normally a single-key object
    #[serde(rename = "Response", default)]
    pub response: Vec<Value>,
    /// Cursor descriptor, present on list endpoints
    #[serde(rename = "Pagination", default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

/// Error envelope: `{"Error": [{"error_description": "..."}]}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(rename = "Error", default)]
    pub error: Vec<ErrorDescription>,
}

/// A single human-readable error entry
///
/// Entries without a description still parse so their siblings survive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDescription {
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description_translated: Option<String>,
}

impl ErrorEnvelope {
    /// Parse an error body, returning `None` when it is not an error envelope
    /// or carries no usable description.
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice::<Self>(body)
            .ok()
            .filter(|envelope| !envelope.messages().is_empty())
    }

    /// Non-empty descriptions in response order
    pub fn messages(&self) -> Vec<String> {
        self.error
            .iter()
            .filter_map(|e| e.error_description.as_deref())
            .filter(|d| !d.is_empty())
            .map(String::from)
            .collect()
    }
}

#[derive(Deserialize)]
struct IdPayload {
    id: u64,
}

#[derive(Deserialize)]
struct UuidPayload {
    uuid: String,
}

impl ResponseEnvelope {
    /// Parse a raw response body
    pub fn parse(body: &[u8]) -> DecodeResult<Self> {
        serde_json::from_slice(body).map_err(DecodeError::MalformedEnvelope)
    }

    /// Iterate `(key, payload)` pairs across all entries in response order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.response
            .iter()
            .filter_map(Value::as_object)
            .flat_map(|item| item.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Decode the payload under `key` in the first entry
    pub fn decode_object<T: DeserializeOwned>(&self, key: &str) -> DecodeResult<T> {
        let first = self.response.first().ok_or(DecodeError::EmptyResponse)?;
        let item = first
            .as_object()
            .ok_or_else(|| DecodeError::key_not_found(key))?;
        let payload = lookup(item, key).ok_or_else(|| DecodeError::key_not_found(key))?;
        T::deserialize(payload).map_err(|e| DecodeError::shape(key, e))
    }

    /// Decode every entry carrying `key`; entries without it are skipped
    pub fn decode_list<T: DeserializeOwned>(&self, key: &str) -> DecodeResult<Vec<T>> {
        let mut items = Vec::with_capacity(self.response.len());
        for item in self.response.iter().filter_map(Value::as_object) {
            let Some(payload) = lookup(item, key) else {
                continue;
            };
            items.push(T::deserialize(payload).map_err(|e| DecodeError::shape(key, e))?);
        }
        Ok(items)
    }

    /// Decode a list page, keeping the pagination descriptor
    pub fn into_list<T: DeserializeOwned>(self, key: &str) -> DecodeResult<ListResponse<T>> {
        let items = self.decode_list(key)?;
        Ok(ListResponse {
            items,
            pagination: self.pagination,
        })
    }

    /// Find the first entry anywhere in the response whose key is exactly `key`
    ///
    /// Handshake responses put several differently-keyed entries side by side
    /// (`Id`, `Token`, `ServerPublicKey`), so this scans all of them.
    pub fn find<T: DeserializeOwned>(&self, key: &str) -> DecodeResult<Option<T>> {
        match self.entries().find(|(k, _)| *k == key) {
            Some((_, payload)) => T::deserialize(payload)
                .map(Some)
                .map_err(|e| DecodeError::shape(key, e)),
            None => Ok(None),
        }
    }

    /// Extract `{"Id": {"id": N}}` from the first entry
    pub fn decode_id(&self) -> DecodeResult<u64> {
        self.decode_object::<IdPayload>("Id").map(|p| p.id)
    }

    /// Extract `{"Uuid": {"uuid": "..."}}` from the first entry
    pub fn decode_uuid(&self) -> DecodeResult<String> {
        self.decode_object::<UuidPayload>("Uuid").map(|p| p.uuid)
    }
}

fn lookup<'a>(item: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    item.get(key).or_else(|| {
        item.iter()
            .find(|(k, _)| k.starts_with(key))
            .map(|(_, v)| v)
    })
}
