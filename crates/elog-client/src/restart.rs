//! Rebinding every contract registered under the live identity.

use elog_core::{
    error::ElogError,
    topic::TopicKey,
    types::{ContractInfo, Identity},
};
use elog_mq::DeliveryStream;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::client::{topic_key_for, ElogClient};
use crate::control::{decode_result, ControlRequest, Endpoint};

/// Streams keyed by the contract they belong to.
pub type RestartStreams = HashMap<ContractInfo, DeliveryStream>;

impl ElogClient {
    /// Contracts registered under the live identity.
    pub async fn query_contracts(&self) -> Result<Vec<ContractInfo>, ElogError> {
        let identity = self.require_identity()?;
        self.query_contracts_as(&identity).await
    }

    async fn query_contracts_as(&self, identity: &Identity) -> Result<Vec<ContractInfo>, ElogError> {
        let result = self
            .call_endpoint(ControlRequest::new(Endpoint::QueryContracts).field("did", identity.as_str()))
            .await?;
        if result.is_null() {
            return Ok(Vec::new());
        }
        decode_result(Endpoint::QueryContracts, result)
    }

    /// Bind one topic per registered contract.
    ///
    /// All or nothing: if any bind fails, the topics bound so far in this
    /// call are unregistered and the error is returned. Topics are keyed by
    /// the identity the contracts were queried under, even if the session
    /// re-registers meanwhile.
    pub async fn restart(&self) -> Result<RestartStreams, ElogError> {
        let identity = self.require_identity()?;
        let contracts = self.query_contracts_as(&identity).await?;
        info!(count = contracts.len(), "rebinding registered contracts");

        let mut bound: Vec<TopicKey> = Vec::with_capacity(contracts.len());
        let mut streams = RestartStreams::with_capacity(contracts.len());

        for contract in contracts {
            let attempt = match topic_key_for(&identity, &contract.chain, &contract.address) {
                Ok(key) => self.bind(&key).await.map(|stream| (key, stream)),
                Err(e) => Err(e),
            };
            match attempt {
                Ok((key, stream)) => {
                    bound.push(key);
                    streams.insert(contract, stream);
                }
                Err(e) => {
                    warn!(
                        chain = %contract.chain,
                        address = %contract.address,
                        error = %e,
                        rolled_back = bound.len(),
                        "restart failed"
                    );
                    drop(streams);
                    self.roll_back(&bound).await;
                    return Err(e);
                }
            }
        }

        Ok(streams)
    }

    async fn roll_back(&self, keys: &[TopicKey]) {
        for key in keys {
            if let Err(e) = self.registry().unregister(key).await {
                warn!(topic = %key, error = %e, "rollback unregister failed");
            }
        }
    }
}
