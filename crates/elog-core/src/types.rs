//! Contract and identity primitives exchanged with the control plane.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ElogError;

/// Wallet address or DID assigned by the control plane at registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wrap a non-empty identity string.
    pub fn new(value: impl Into<String>) -> Result<Self, ElogError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ElogError::InvalidInput("identity must not be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Contract standards understood by the control plane.
///
/// `Other` contracts carry no built-in event layout, so their ABI must be
/// uploaded alongside the registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractType {
    #[serde(rename = "ERC20")]
    Erc20,
    #[serde(rename = "ERC721")]
    Erc721,
    #[serde(rename = "ERC1155")]
    Erc1155,
    #[serde(rename = "OTHER")]
    Other,
}

impl ContractType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Erc20 => "ERC20",
            Self::Erc721 => "ERC721",
            Self::Erc1155 => "ERC1155",
            Self::Other => "OTHER",
        }
    }

    /// Whether registrations of this type must ship an interface definition.
    pub fn requires_abi(&self) -> bool {
        matches!(self, Self::Other)
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractType {
    type Err = ElogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERC20" => Ok(Self::Erc20),
            "ERC721" => Ok(Self::Erc721),
            "ERC1155" => Ok(Self::Erc1155),
            "OTHER" => Ok(Self::Other),
            other => Err(ElogError::InvalidInput(format!(
                "unsupported contract type '{other}'"
            ))),
        }
    }
}

/// One contract registered under an identity, as listed by `/querycontracts`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContractInfo {
    pub chain: String,
    pub address: String,
}
