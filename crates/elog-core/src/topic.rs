//! Topic keys: the broker queue name for one (identity, chain, contract).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ElogError;
use crate::types::Identity;

/// Canonical form of a contract address.
///
/// `0x`-prefixed 20-byte hex addresses are lower-cased so two spellings of
/// the same EVM contract derive the same key. Anything else is kept verbatim
/// apart from surrounding whitespace, since non-EVM chains use other encodings.
pub fn normalize_address(address: &str) -> Result<String, ElogError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ElogError::InvalidInput("contract address must not be empty".into()));
    }
    if address.chars().any(char::is_whitespace) {
        return Err(ElogError::InvalidInput(format!(
            "address '{address}' contains whitespace"
        )));
    }

    let Some(hex) = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
    else {
        return Ok(address.to_string());
    };

    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ElogError::InvalidInput(format!(
            "address '{address}' is not a 20-byte hex address"
        )));
    }
    Ok(format!("0x{}", hex.to_ascii_lowercase()))
}

/// Queue name derived as `identity ++ chain ++ address`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicKey(String);

impl TopicKey {
    pub fn new(identity: &Identity, chain: &str, address: &str) -> Result<Self, ElogError> {
        let chain = chain.trim();
        if chain.is_empty() {
            return Err(ElogError::InvalidInput("chain must not be empty".into()));
        }
        let address = normalize_address(address)?;
        Ok(Self(format!("{}{}{}", identity.as_str(), chain, address)))
    }

    /// Wrap an already-derived queue name.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
