//! Error types for the elogkit client, topic registry and event decoder.

use thiserror::Error;

/// Errors produced while decoding an event record against an ABI.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("event '{name}' is not defined in the contract ABI")]
    UnknownEvent { name: String },

    #[error("invalid ABI JSON: {reason}")]
    InvalidAbi { reason: String },

    #[error("event '{name}' declares {expected} indexed params but the record carries {got} topics")]
    TopicCountMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid topic at index {index}: {reason}")]
    InvalidTopic { index: usize, reason: String },

    #[error("unsupported param type '{ty}': {reason}")]
    UnsupportedType { ty: String, reason: String },

    #[error("ABI decode failed: {reason}")]
    AbiDecodeFailed { reason: String },

    #[error("malformed event record: {0}")]
    MalformedRecord(#[from] serde_json::Error),
}

/// Errors from the topic registry and the broker behind it.
#[derive(Debug, Error)]
pub enum TopicError {
    /// The key is already bound within this registry instance.
    #[error("topic '{topic}' is already registered")]
    AlreadyRegistered { topic: String },

    /// The key was unregistered while its binding was still in flight.
    #[error("topic '{topic}' was unregistered before the binding completed")]
    Interrupted { topic: String },

    #[error("broker connection failed: {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("broker error on '{topic}': {reason}")]
    Broker { topic: String, reason: String },

    #[error("acknowledgement failed: {0}")]
    Ack(String),
}

/// Top-level error returned by every public client operation.
#[derive(Debug, Error)]
pub enum ElogError {
    /// The control plane could not be reached (connect, timeout, IO).
    #[error("request to {endpoint} failed: {reason}")]
    Request { endpoint: String, reason: String },

    /// 5xx from the control plane. Transient; the caller may retry.
    #[error("server error {status} from {endpoint}: {detail}")]
    Server {
        endpoint: String,
        status: u16,
        detail: String,
    },

    /// 4xx from the control plane or a failed local validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// 2xx response whose envelope carried an error message.
    #[error("request to {endpoint} rejected: {detail}")]
    Rejected { endpoint: String, detail: String },

    /// 2xx response whose payload could not be parsed.
    #[error("invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    /// The operation needs an identity but no session is live.
    #[error("client is not registered; call register() first")]
    NotRegistered,

    /// The keepalive transport could not be established.
    #[error("keepalive connection to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },

    #[error(transparent)]
    Topic(#[from] TopicError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl ElogError {
    /// Returns `true` for transient failures worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::Request { .. })
    }

    /// Returns `true` for the local topic guard rejecting a second bind.
    pub fn is_already_registered(&self) -> bool {
        matches!(self, Self::Topic(TopicError::AlreadyRegistered { .. }))
    }
}
