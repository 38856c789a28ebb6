//! Control-plane transport.
//!
//! `ControlPlane` submits one request and hands back the raw status and body;
//! [`interpret`] turns that into the envelope's `result` or a typed error.
//! Keeping the two apart lets tests drive the client with canned responses.

use alloy_primitives::U256;
use async_trait::async_trait;
use elog_core::{error::ElogError, event::hex_to_u64};
use reqwest::multipart::{Form, Part};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Control-plane operations, one per HTTP path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Register,
    Upload,
    Chase,
    Subscribe,
    Unsubscribe,
    Remove,
    QueryContracts,
    QueryEvents,
    GetTime,
    GetNativeToken,
    GetErc20Token,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Register => "/register",
            Self::Upload => "/upload",
            Self::Chase => "/chase",
            Self::Subscribe => "/subscribe",
            Self::Unsubscribe => "/unsubscribe",
            Self::Remove => "/remove",
            Self::QueryContracts => "/querycontracts",
            Self::QueryEvents => "/queryevents",
            Self::GetTime => "/getTime",
            Self::GetNativeToken => "/getNativeToken",
            Self::GetErc20Token => "/getErc20Token",
        }
    }

    /// Upload and chase carry an optional file and go out as multipart.
    pub fn is_multipart(&self) -> bool {
        matches!(self, Self::Upload | Self::Chase)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// File part of a multipart request, sent under the field name `file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// One control-plane call: form fields in order (keys may repeat) plus an
/// optional file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRequest {
    pub endpoint: Endpoint,
    pub fields: Vec<(String, String)>,
    pub attachment: Option<Attachment>,
}

impl ControlRequest {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            fields: Vec::new(),
            attachment: None,
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Status and body of a control-plane reply, before interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Envelope every control-plane reply is wrapped in.
#[derive(Debug, Clone, Deserialize)]
pub struct ElogResponse {
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<String>,
}

/// Abstracts over the control-plane transport.
///
/// Implementations report transport failures as `ElogError::Request` and
/// return every HTTP reply, success or not, as a `RawResponse`.
#[async_trait]
pub trait ControlPlane: Send + Sync + 'static {
    async fn send(&self, req: ControlRequest) -> Result<RawResponse, ElogError>;

    /// Base URL, for logs.
    fn base_url(&self) -> &str;
}

// ─── HTTP ─────────────────────────────────────────────────────────────────────

/// `reqwest`-backed control plane. Requests are never retried.
pub struct HttpControlPlane {
    base: String,
    http: reqwest::Client,
}

impl HttpControlPlane {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ElogError> {
        let parsed = Url::parse(base_url).map_err(|e| {
            ElogError::InvalidInput(format!("control-plane URL '{base_url}': {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ElogError::InvalidInput(format!(
                "control-plane URL '{base_url}' must be http or https"
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ElogError::Request {
                endpoint: base_url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            base: parsed.as_str().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url_for(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base, endpoint.path())
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn send(&self, req: ControlRequest) -> Result<RawResponse, ElogError> {
        let endpoint = req.endpoint;
        let url = self.url_for(endpoint);
        let transport_err = |e: reqwest::Error| ElogError::Request {
            endpoint: endpoint.path().to_string(),
            reason: e.to_string(),
        };

        let builder = self.http.post(&url);
        let builder = if endpoint.is_multipart() {
            let mut form = Form::new();
            for (k, v) in req.fields {
                form = form.text(k, v);
            }
            if let Some(file) = req.attachment {
                form = form.part("file", Part::bytes(file.bytes).file_name(file.file_name));
            }
            builder.multipart(form)
        } else {
            builder.form(&req.fields)
        };

        let resp = builder.send().await.map_err(transport_err)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(transport_err)?;
        debug!(url = %url, status, bytes = body.len(), "control-plane reply");

        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }

    fn base_url(&self) -> &str {
        &self.base
    }
}

// ─── Interpretation ───────────────────────────────────────────────────────────

/// Map a raw reply to the envelope's `result`.
///
/// 4xx → `InvalidInput`, 5xx → `Server`, unparseable envelope →
/// `InvalidResponse`, non-empty `error` → `Rejected`.
pub fn interpret(endpoint: Endpoint, resp: RawResponse) -> Result<Value, ElogError> {
    let path = endpoint.path();
    let body_text = || String::from_utf8_lossy(&resp.body).trim().to_string();

    match resp.status {
        200..=299 => {}
        400..=499 => {
            return Err(ElogError::InvalidInput(format!(
                "{path} returned {}: {}",
                resp.status,
                body_text()
            )))
        }
        500..=599 => {
            return Err(ElogError::Server {
                endpoint: path.to_string(),
                status: resp.status,
                detail: body_text(),
            })
        }
        other => {
            return Err(ElogError::InvalidResponse {
                endpoint: path.to_string(),
                reason: format!("unexpected status {other}"),
            })
        }
    }

    let envelope: ElogResponse =
        serde_json::from_slice(&resp.body).map_err(|e| ElogError::InvalidResponse {
            endpoint: path.to_string(),
            reason: e.to_string(),
        })?;

    match envelope.error {
        Some(detail) if !detail.is_empty() => Err(ElogError::Rejected {
            endpoint: path.to_string(),
            detail,
        }),
        _ => Ok(envelope.result),
    }
}

/// Parse a `result` that the service may wrap as a JSON string.
pub fn decode_result<T: DeserializeOwned>(endpoint: Endpoint, result: Value) -> Result<T, ElogError> {
    if let Value::String(inner) = &result {
        if let Ok(parsed) = serde_json::from_str::<T>(inner) {
            return Ok(parsed);
        }
    }
    serde_json::from_value(result).map_err(|e| ElogError::InvalidResponse {
        endpoint: endpoint.path().to_string(),
        reason: e.to_string(),
    })
}

/// Parse a non-negative integer sent as a decimal string, `0x` string or number.
pub fn result_u64(endpoint: Endpoint, result: &Value) -> Result<u64, ElogError> {
    let parsed = match result {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let s = s.trim();
            if s.starts_with("0x") || s.starts_with("0X") {
                hex_to_u64(s)
            } else {
                s.parse().ok()
            }
        }
        _ => None,
    };
    parsed.ok_or_else(|| invalid_number(endpoint, result))
}

/// Parse a 256-bit quantity sent as a decimal string, `0x` string or number.
pub fn result_u256(endpoint: Endpoint, result: &Value) -> Result<U256, ElogError> {
    let parsed = match result {
        Value::Number(n) => n.as_u64().map(U256::from),
        Value::String(s) => U256::from_str(s.trim()).ok(),
        _ => None,
    };
    parsed.ok_or_else(|| invalid_number(endpoint, result))
}

fn invalid_number(endpoint: Endpoint, result: &Value) -> ElogError {
    ElogError::InvalidResponse {
        endpoint: endpoint.path().to_string(),
        reason: format!("expected a non-negative integer, got {result}"),
    }
}
