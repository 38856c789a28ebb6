//! Event records delivered on a topic queue.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// A raw event as published by the indexing service.
///
/// `topics[0]` is the event signature hash; `topics[1..]` are the indexed
/// params. `data` holds the ABI-encoded non-indexed params.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub chain: String,
    pub address: String,
    #[serde(rename = "txHash")]
    pub tx_hash: String,
    pub name: String,
    #[serde(default)]
    pub topics: Vec<String>,
    /// Base64 on the wire. Byte arrays are accepted too, as is `0x` hex when
    /// the text is not valid base64.
    #[serde(default, with = "data_bytes")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub height: i64,
    #[serde(rename = "block_time", default)]
    pub block_time: u64,
}

impl EventRecord {
    /// Parse a JSON delivery body.
    pub fn from_json(body: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// topics[0], the event signature hash, if present.
    pub fn signature(&self) -> Option<&str> {
        self.topics.first().map(String::as_str)
    }

    /// The indexed-param topics, i.e. everything after the signature slot.
    pub fn indexed_topics(&self) -> &[String] {
        self.topics.get(1..).unwrap_or(&[])
    }
}

/// Parse a `0x`-prefixed hex quantity.
pub fn hex_to_u64(s: &str) -> Option<u64> {
    let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
    u64::from_str_radix(hex, 16).ok()
}

mod data_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Text(String),
        Raw(Vec<u8>),
        Null,
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        match Wire::deserialize(d)? {
            Wire::Raw(bytes) => Ok(bytes),
            Wire::Null => Ok(Vec::new()),
            // Base64 may itself start with "0x", so it is tried first.
            Wire::Text(text) => match STANDARD.decode(text.as_bytes()) {
                Ok(bytes) => Ok(bytes),
                Err(b64) => match text.strip_prefix("0x") {
                    Some(hex) => hex::decode(hex).map_err(de::Error::custom),
                    None => Err(de::Error::custom(b64)),
                },
            },
        }
    }
}
