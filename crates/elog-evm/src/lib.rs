//! # elog-evm
//!
//! Decodes elogkit [`EventRecord`](elog_core::EventRecord)s into named
//! parameters using the emitting contract's ABI JSON.
//!
//! ## Implementation notes
//! - Uses `alloy-core` dyn-abi for decoding
//! - topics[0] → event signature hash (skipped)
//! - topics[1..] → indexed params, in declaration order
//! - `data` → non-indexed params (ABI-encoded tuple)

pub mod abi;
pub mod decoder;
pub mod normalizer;
pub mod value;

pub use abi::ContractAbi;
pub use decoder::{DecodedParams, EventDecoder};
pub use value::NormalizedValue;
