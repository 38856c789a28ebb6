//! `ElogClient`: identity-scoped control-plane operations.
//!
//! Operations that start a stream (upload, chase, restart) bind the topic
//! key before returning. Nothing here retries; `ElogError::is_retryable`
//! tells the caller which failures are worth repeating.

use alloy_primitives::U256;
use elog_core::{
    error::ElogError,
    topic::{normalize_address, TopicKey},
    types::{ContractType, Identity},
};
use elog_evm::ContractAbi;
use elog_mq::{AmqpBroker, Broker, DeliveryStream, TopicRegistry};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    config::ClientConfig,
    control::{
        decode_result, interpret, result_u256, result_u64, Attachment, ControlPlane,
        ControlRequest, Endpoint, HttpControlPlane,
    },
    session::SessionManager,
};

/// A contract interface definition (ABI JSON or a build artifact holding one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDefinition {
    file_name: String,
    bytes: Vec<u8>,
}

impl InterfaceDefinition {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a definition from disk. An unreadable file is `InvalidInput`.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ElogError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ElogError::InvalidInput(format!("cannot read {}: {e}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "abi.json".to_string());
        Ok(Self { file_name, bytes })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Parse as ABI JSON.
    pub fn parse(&self) -> Result<ContractAbi, ElogError> {
        ContractAbi::from_slice(&self.bytes).map_err(|e| {
            ElogError::InvalidInput(format!("{} is not a valid ABI: {e}", self.file_name))
        })
    }
}

/// Which contract to watch and how the control plane should treat it.
#[derive(Debug, Clone)]
pub struct ContractSpec {
    pub chain: String,
    pub contract_type: ContractType,
    pub address: String,
    pub definition: Option<InterfaceDefinition>,
}

impl ContractSpec {
    pub fn new(
        chain: impl Into<String>,
        contract_type: ContractType,
        address: impl Into<String>,
    ) -> Self {
        Self {
            chain: chain.into(),
            contract_type,
            address: address.into(),
            definition: None,
        }
    }

    pub fn with_definition(mut self, definition: InterfaceDefinition) -> Self {
        self.definition = Some(definition);
        self
    }
}

/// Client for one identity against one control plane and broker.
pub struct ElogClient {
    config: ClientConfig,
    control: Arc<dyn ControlPlane>,
    registry: TopicRegistry,
    session: SessionManager,
}

impl ElogClient {
    /// Build the HTTP control plane and connect to the AMQP broker.
    pub async fn connect(config: ClientConfig) -> Result<Self, ElogError> {
        config.validate()?;
        let control = HttpControlPlane::new(&config.api_url, config.http_timeout())?;
        let broker = AmqpBroker::connect(&config.mq_url).await?;
        Ok(Self::with_parts(config, Arc::new(control), Arc::new(broker)))
    }

    /// Assemble a client from an existing control plane and broker.
    pub fn with_parts(
        config: ClientConfig,
        control: Arc<dyn ControlPlane>,
        broker: Arc<dyn Broker>,
    ) -> Self {
        let session = SessionManager::new(&config.heartbeat_addr, config.heartbeat_interval());
        Self {
            config,
            control,
            registry: TopicRegistry::new(broker),
            session,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    /// The identity of the live session, if any.
    pub fn identity(&self) -> Option<Identity> {
        self.session.identity()
    }

    async fn call(&self, req: ControlRequest) -> Result<Value, ElogError> {
        let endpoint = req.endpoint;
        debug!(endpoint = %endpoint, base = self.control.base_url(), "control-plane request");
        let raw = self.control.send(req).await?;
        interpret(endpoint, raw)
    }

    // ─── Session ──────────────────────────────────────────────────────────────

    /// Register with the control plane and start the keepalive.
    ///
    /// Proposes `hint`, or the configured wallet when `hint` is `None`, and
    /// adopts the identity the server returns.
    pub async fn register(&self, hint: Option<&str>) -> Result<Identity, ElogError> {
        let proposed = hint
            .map(str::to_string)
            .or_else(|| self.config.wallet.clone())
            .unwrap_or_default();
        let proposed = Identity::new(proposed)?;

        let result = self
            .call(ControlRequest::new(Endpoint::Register).field("wallet", proposed.as_str()))
            .await?;
        let assigned: String = decode_result(Endpoint::Register, result)?;
        let identity = Identity::new(assigned).map_err(|_| ElogError::InvalidResponse {
            endpoint: Endpoint::Register.path().to_string(),
            reason: "empty identity".into(),
        })?;

        self.session.start(identity.clone()).await?;
        info!(identity = %identity, "registered");
        Ok(identity)
    }

    /// Stop the keepalive. `NotRegistered` if no session is live.
    pub async fn close(&self) -> Result<(), ElogError> {
        self.session.close().await
    }

    // ─── Contracts ────────────────────────────────────────────────────────────

    /// Register a contract for indexing and bind its topic.
    pub async fn upload_contract(&self, contract: ContractSpec) -> Result<DeliveryStream, ElogError> {
        let (req, key) = self.contract_request(Endpoint::Upload, &contract)?;
        self.call(req).await?;
        self.bind(&key).await
    }

    /// Like `upload_contract`, but ask the service to replay from
    /// `start_height` for the named events.
    pub async fn chase_block<S: AsRef<str>>(
        &self,
        contract: ContractSpec,
        start_height: u64,
        event_names: &[S],
    ) -> Result<DeliveryStream, ElogError> {
        let names = event_names
            .iter()
            .map(|n| n.as_ref().trim())
            .filter(|n| !n.is_empty())
            .collect::<Vec<_>>()
            .join(",");
        let (req, key) = self.contract_request(Endpoint::Chase, &contract)?;
        let req = req
            .field("startBlock", start_height.to_string())
            .field("names", names);
        self.call(req).await?;
        self.bind(&key).await
    }

    /// Remove a contract on the server. A local topic binding is left alone.
    pub async fn remove_contract(&self, chain: &str, address: &str) -> Result<(), ElogError> {
        let req = self.scoped(Endpoint::Remove, chain, address)?;
        self.call(req).await?;
        Ok(())
    }

    // ─── Events ───────────────────────────────────────────────────────────────

    pub async fn subscribe_events<S: AsRef<str>>(
        &self,
        chain: &str,
        address: &str,
        event_names: &[S],
    ) -> Result<(), ElogError> {
        self.event_names_call(Endpoint::Subscribe, chain, address, event_names)
            .await
    }

    pub async fn unsubscribe_events<S: AsRef<str>>(
        &self,
        chain: &str,
        address: &str,
        event_names: &[S],
    ) -> Result<(), ElogError> {
        self.event_names_call(Endpoint::Unsubscribe, chain, address, event_names)
            .await
    }

    /// Event names currently subscribed for a contract.
    pub async fn get_sub_events(
        &self,
        chain: &str,
        address: &str,
    ) -> Result<BTreeSet<String>, ElogError> {
        let req = self.scoped(Endpoint::QueryEvents, chain, address)?;
        let result = self.call(req).await?;
        if result.is_null() {
            return Ok(BTreeSet::new());
        }
        let names: Vec<String> = decode_result(Endpoint::QueryEvents, result)?;
        Ok(names.into_iter().collect())
    }

    async fn event_names_call<S: AsRef<str>>(
        &self,
        endpoint: Endpoint,
        chain: &str,
        address: &str,
        event_names: &[S],
    ) -> Result<(), ElogError> {
        let names: Vec<&str> = event_names.iter().map(|n| n.as_ref().trim()).collect();
        if names.is_empty() || names.iter().any(|n| n.is_empty()) {
            return Err(ElogError::InvalidInput(
                "at least one non-empty event name is required".into(),
            ));
        }
        let mut req = self.scoped(endpoint, chain, address)?;
        for name in names {
            req = req.field("names", name);
        }
        self.call(req).await?;
        Ok(())
    }

    // ─── Lookups (no session needed) ──────────────────────────────────────────

    /// Block timestamp (seconds) at `height`.
    pub async fn get_timestamp(&self, chain: &str, height: u64) -> Result<u64, ElogError> {
        let req = ControlRequest::new(Endpoint::GetTime)
            .field("chain", non_empty("chain", chain)?)
            .field("height", height.to_string());
        let result = self.call(req).await?;
        result_u64(Endpoint::GetTime, &result)
    }

    /// Native coin balance of `address`, in the chain's smallest unit.
    pub async fn get_native_token(&self, chain: &str, address: &str) -> Result<U256, ElogError> {
        let req = ControlRequest::new(Endpoint::GetNativeToken)
            .field("chain", non_empty("chain", chain)?)
            .field("address", normalize_address(address)?);
        let result = self.call(req).await?;
        result_u256(Endpoint::GetNativeToken, &result)
    }

    /// ERC-20 balance of `wallet` on `contract`, in token base units.
    pub async fn get_erc20_token(
        &self,
        chain: &str,
        wallet: &str,
        contract: &str,
    ) -> Result<U256, ElogError> {
        let req = ControlRequest::new(Endpoint::GetErc20Token)
            .field("chain", non_empty("chain", chain)?)
            .field("wallet", normalize_address(wallet)?)
            .field("contract", normalize_address(contract)?);
        let result = self.call(req).await?;
        result_u256(Endpoint::GetErc20Token, &result)
    }

    // ─── Topics ───────────────────────────────────────────────────────────────

    /// Topic key for a contract under the live identity.
    pub fn topic_key(&self, chain: &str, address: &str) -> Result<TopicKey, ElogError> {
        let identity = self.session.require_identity()?;
        topic_key_for(&identity, chain, address)
    }

    /// Drop the local binding for a contract and stop its consumer.
    /// Returns `false` if nothing was bound.
    pub async fn unregister_topic(&self, chain: &str, address: &str) -> Result<bool, ElogError> {
        let key = self.topic_key(chain, address)?;
        Ok(self.registry.unregister(&key).await?)
    }

    pub(crate) async fn bind(&self, key: &TopicKey) -> Result<DeliveryStream, ElogError> {
        Ok(self.registry.register(key).await?)
    }

    pub(crate) async fn call_endpoint(&self, req: ControlRequest) -> Result<Value, ElogError> {
        self.call(req).await
    }

    pub(crate) fn require_identity(&self) -> Result<Identity, ElogError> {
        self.session.require_identity()
    }

    // ─── Request builders ─────────────────────────────────────────────────────

    /// `did`, `chain`, `address` for the live identity.
    fn scoped(
        &self,
        endpoint: Endpoint,
        chain: &str,
        address: &str,
    ) -> Result<ControlRequest, ElogError> {
        let identity = self.session.require_identity()?;
        scoped_as(&identity, endpoint, chain, address)
    }

    /// Validate a contract, build its upload/chase request and derive its key.
    ///
    /// The request and the key come from one identity snapshot.
    fn contract_request(
        &self,
        endpoint: Endpoint,
        contract: &ContractSpec,
    ) -> Result<(ControlRequest, TopicKey), ElogError> {
        let attachment = definition_attachment(contract)?;
        let identity = self.session.require_identity()?;
        let req = scoped_as(&identity, endpoint, &contract.chain, &contract.address)?
            .field("type", contract.contract_type.as_str());
        let key = topic_key_for(&identity, &contract.chain, &contract.address)?;

        Ok(match attachment {
            Some(a) => (req.attach(a), key),
            None => (req, key),
        })
    }
}

pub(crate) fn topic_key_for(
    identity: &Identity,
    chain: &str,
    address: &str,
) -> Result<TopicKey, ElogError> {
    TopicKey::new(identity, chain.trim(), address)
}

fn scoped_as(
    identity: &Identity,
    endpoint: Endpoint,
    chain: &str,
    address: &str,
) -> Result<ControlRequest, ElogError> {
    let chain = non_empty("chain", chain)?;
    let address = normalize_address(address)?;
    Ok(ControlRequest::new(endpoint)
        .field("did", identity.as_str())
        .field("chain", chain)
        .field("address", address))
}

/// The `file` part for contract types that need one. Definitions passed for
/// standard types are ignored.
fn definition_attachment(contract: &ContractSpec) -> Result<Option<Attachment>, ElogError> {
    if !contract.contract_type.requires_abi() {
        if contract.definition.is_some() {
            debug!(
                contract_type = %contract.contract_type,
                "interface definition ignored for standard contract type"
            );
        }
        return Ok(None);
    }

    let definition = contract.definition.as_ref().ok_or_else(|| {
        ElogError::InvalidInput(format!(
            "contract type {} requires an interface definition",
            contract.contract_type
        ))
    })?;
    definition.parse()?;
    Ok(Some(Attachment {
        file_name: definition.file_name.clone(),
        bytes: definition.bytes.clone(),
    }))
}

fn non_empty<'a>(what: &str, value: &'a str) -> Result<&'a str, ElogError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ElogError::InvalidInput(format!("{what} must not be empty")));
    }
    Ok(value)
}
