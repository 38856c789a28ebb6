//! Converts alloy `DynSolValue` → [`NormalizedValue`].

use alloy_core::dyn_abi::DynSolValue;

use crate::value::NormalizedValue;

/// Convert a decoded `DynSolValue` into a `NormalizedValue`.
pub fn normalize(val: DynSolValue) -> NormalizedValue {
    match val {
        DynSolValue::Bool(b) => NormalizedValue::Bool(b),

        DynSolValue::Int(i, _bits) => match i128::try_from(i) {
            Ok(v) => NormalizedValue::Int(v),
            Err(_) => NormalizedValue::BigInt(i.to_string()),
        },

        DynSolValue::Uint(u, _bits) => match u128::try_from(u) {
            Ok(v) => NormalizedValue::Uint(v),
            Err(_) => NormalizedValue::BigUint(u.to_string()),
        },

        DynSolValue::FixedBytes(word, size) => NormalizedValue::Bytes(word[..size].to_vec()),

        DynSolValue::Bytes(b) => NormalizedValue::Bytes(b),

        DynSolValue::String(s) => NormalizedValue::Str(s),

        DynSolValue::Address(a) => NormalizedValue::Address(a.to_checksum(None)),

        DynSolValue::Array(vals) | DynSolValue::FixedArray(vals) => {
            NormalizedValue::Array(vals.into_iter().map(normalize).collect())
        }

        // Unnamed tuple fields get positional names "0", "1", ...
        DynSolValue::Tuple(fields) => NormalizedValue::Tuple(
            fields
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), normalize(v)))
                .collect(),
        ),

        DynSolValue::Function(f) => NormalizedValue::Bytes(f.to_vec()),
    }
}
