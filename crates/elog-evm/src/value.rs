//! Decoded parameter values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A decoded, normalized ABI value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum NormalizedValue {
    Uint(u128),
    /// uints wider than u128, as a decimal string
    BigUint(String),
    Int(i128),
    /// ints wider than i128, as a decimal string
    BigInt(String),
    Bool(bool),
    Bytes(Vec<u8>),
    Str(String),
    /// EIP-55 checksummed, 0x-prefixed
    Address(String),
    Array(Vec<NormalizedValue>),
    Tuple(Vec<(String, NormalizedValue)>),
}

impl NormalizedValue {
    pub fn as_address(&self) -> Option<&str> {
        match self {
            NormalizedValue::Address(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_u128(&self) -> Option<u128> {
        match self {
            NormalizedValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            NormalizedValue::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }
}

impl fmt::Display for NormalizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizedValue::Uint(v) => write!(f, "{v}"),
            NormalizedValue::BigUint(v) => write!(f, "{v}"),
            NormalizedValue::Int(v) => write!(f, "{v}"),
            NormalizedValue::BigInt(v) => write!(f, "{v}"),
            NormalizedValue::Bool(v) => write!(f, "{v}"),
            NormalizedValue::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            NormalizedValue::Str(s) => write!(f, "{s}"),
            NormalizedValue::Address(a) => write!(f, "{a}"),
            NormalizedValue::Array(v) => {
                let parts: Vec<_> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            NormalizedValue::Tuple(fields) => {
                let parts: Vec<_> = fields.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}
