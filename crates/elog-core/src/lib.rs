//! # elog-core
//!
//! Types shared by every elogkit crate: the contract/event data model, the
//! topic key derivation used to name broker queues, and the error taxonomy
//! surfaced by the client.

pub mod error;
pub mod event;
pub mod topic;
pub mod types;

pub use error::{DecodeError, ElogError, TopicError};
pub use event::{hex_to_u64, EventRecord};
pub use topic::{normalize_address, TopicKey};
pub use types::{ContractInfo, ContractType, Identity};
