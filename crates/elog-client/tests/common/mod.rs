//! Shared fixtures: a scripted control plane, an in-memory broker and a
//! heartbeat sink.

#![allow(dead_code)]

use async_trait::async_trait;
use elog_client::{ClientConfig, ControlPlane, ControlRequest, ElogClient, Endpoint, RawResponse};
use elog_core::error::ElogError;
use elog_mq::MemoryBroker;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::sync::Notify;

pub const WALLET: &str = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045";
pub const USDT: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";
pub const UNI: &str = "0x1f9840a85d5af5bf1d1762f925bdaddc4201f984";
pub const OTHER_WALLET: &str = "0xab5801a7d398351b8be11c439e05c5b3259aec9b";

/// Control plane answering from canned responses and recording every request.
#[derive(Default)]
pub struct MockControlPlane {
    responses: Mutex<HashMap<Endpoint, RawResponse>>,
    requests: Mutex<Vec<ControlRequest>>,
    gates: Mutex<HashMap<Endpoint, Arc<Notify>>>,
}

impl MockControlPlane {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, endpoint: Endpoint, resp: RawResponse) {
        self.responses.lock().unwrap().insert(endpoint, resp);
    }

    /// 200 with `{"result": result, "error": ""}`.
    pub fn ok(&self, endpoint: Endpoint, result: Value) {
        let body = serde_json::json!({ "result": result, "error": "" }).to_string();
        self.respond(endpoint, RawResponse::new(200, body));
    }

    /// Hold every later call to `endpoint` after it is recorded, until the
    /// returned gate is notified once per call.
    pub fn hold(&self, endpoint: Endpoint) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(endpoint, gate.clone());
        gate
    }

    /// Yield until `endpoint` has been called at least `n` times.
    pub async fn wait_for(&self, endpoint: Endpoint, n: usize) {
        while self.count(endpoint) < n {
            tokio::task::yield_now().await;
        }
    }

    pub fn requests(&self) -> Vec<ControlRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, endpoint: Endpoint) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.endpoint == endpoint)
            .count()
    }

    pub fn last(&self, endpoint: Endpoint) -> ControlRequest {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.endpoint == endpoint)
            .cloned()
            .expect("no request recorded for endpoint")
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn send(&self, req: ControlRequest) -> Result<RawResponse, ElogError> {
        let endpoint = req.endpoint;
        self.requests.lock().unwrap().push(req);
        let gate = self.gates.lock().unwrap().get(&endpoint).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.responses
            .lock()
            .unwrap()
            .get(&endpoint)
            .cloned()
            .ok_or_else(|| ElogError::Request {
                endpoint: endpoint.path().to_string(),
                reason: "connection refused".into(),
            })
    }

    fn base_url(&self) -> &str {
        "mock://control"
    }
}

/// Accept keepalive connections forever and discard what they send.
pub async fn heartbeat_sink() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 256];
                while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
            });
        }
    });
    addr
}

pub struct Harness {
    pub client: ElogClient,
    pub control: Arc<MockControlPlane>,
    pub broker: MemoryBroker,
}

pub async fn harness(wallet: Option<&str>) -> Harness {
    let heartbeat = heartbeat_sink().await;
    let mut config = ClientConfig::new("http://control.test", "memory://", heartbeat);
    config.wallet = wallet.map(str::to_string);

    let control = MockControlPlane::new();
    let broker = MemoryBroker::new();
    let client = ElogClient::with_parts(config, control.clone(), Arc::new(broker.clone()));
    Harness {
        client,
        control,
        broker,
    }
}

/// Harness with a live session for `WALLET`.
pub async fn registered() -> Harness {
    let h = harness(Some(WALLET)).await;
    h.control.ok(Endpoint::Register, Value::String(WALLET.into()));
    h.client.register(None).await.unwrap();
    h
}
