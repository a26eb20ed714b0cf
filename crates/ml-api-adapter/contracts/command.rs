//! Inbound transfer prepare command
//!
//! `CommandHeaders` is the raw header map as received (keys lowercased).
//! `TransferPrepareCommand` is only ever produced by the schema validator,
//! so holding one means every field already passed the interoperability
//! schema.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Case-insensitive header map
///
/// Keys are stored lowercased; ordering is stable so envelopes built from
/// the same request serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandHeaders(BTreeMap<String, String>);

impl CommandHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, lowercasing the name. A repeated name overwrites.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.0.insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl<K, V> FromIterator<(K, V)> for CommandHeaders
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = CommandHeaders::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

impl From<&axum::http::HeaderMap> for CommandHeaders {
    /// Values are decoded as UTF-8; invalid sequences become U+FFFD
    fn from(map: &axum::http::HeaderMap) -> Self {
        map.iter()
            .map(|(name, value)| {
                (
                    name.as_str(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect()
    }
}

/// Declared headers after validation; undeclared ones are stripped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareHeaders {
    pub content_type: String,
    pub date: String,
    pub fspiop_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_forwarded_for: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fspiop_destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fspiop_encryption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fspiop_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fspiop_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fspiop_http_method: Option<String>,
}

/// Currency + decimal amount pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub currency: String,
    pub amount: String,
}

/// Key/value extension entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    pub key: String,
    pub value: String,
}

/// A transfer prepare command that passed the schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferPrepareCommand {
    pub headers: PrepareHeaders,
    /// Transfer id exactly as submitted
    pub transfer_id: String,
    pub payer_fsp: String,
    pub payee_fsp: String,
    pub amount: Money,
    pub ilp_packet: String,
    /// Whitespace-trimmed condition digest
    pub condition: String,
    pub expiration: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<Extension>,
    /// Headers exactly as received, forwarded in the event payload
    pub original_headers: CommandHeaders,
    /// Body exactly as received, forwarded in the event payload
    pub original_body: serde_json::Value,
}
