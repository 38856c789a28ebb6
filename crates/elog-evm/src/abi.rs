//! Contract interface definitions (standard Ethereum ABI JSON).

use alloy_json_abi::{Event, JsonAbi};
use alloy_primitives::B256;
use elog_core::{error::DecodeError, event::EventRecord};

/// A parsed contract ABI.
#[derive(Debug, Clone)]
pub struct ContractAbi {
    abi: JsonAbi,
}

impl ContractAbi {
    /// Parse ABI JSON. Accepts the bare ABI array as well as build artifacts
    /// that nest it under an `"abi"` key.
    pub fn from_json(json: &str) -> Result<Self, DecodeError> {
        Self::from_slice(json.as_bytes())
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        match serde_json::from_slice::<JsonAbi>(bytes) {
            Ok(abi) => Ok(Self { abi }),
            Err(direct) => {
                let artifact: serde_json::Value =
                    serde_json::from_slice(bytes).map_err(|e| DecodeError::InvalidAbi {
                        reason: e.to_string(),
                    })?;
                let nested = artifact.get("abi").ok_or_else(|| DecodeError::InvalidAbi {
                    reason: direct.to_string(),
                })?;
                let abi = serde_json::from_value(nested.clone()).map_err(|e| {
                    DecodeError::InvalidAbi {
                        reason: e.to_string(),
                    }
                })?;
                Ok(Self { abi })
            }
        }
    }

    pub fn inner(&self) -> &JsonAbi {
        &self.abi
    }

    /// Event names declared by the contract, in ABI order.
    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.abi.events.keys().map(String::as_str)
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.abi.events.get(name).is_some_and(|v| !v.is_empty())
    }

    /// Pick the ABI event a record refers to.
    ///
    /// Overloads are disambiguated by selector (topics[0]) first, then by the
    /// number of indexed params the record carries.
    pub fn resolve_event(&self, record: &EventRecord) -> Result<&Event, DecodeError> {
        let candidates = self
            .abi
            .events
            .get(&record.name)
            .filter(|events| !events.is_empty())
            .ok_or_else(|| DecodeError::UnknownEvent {
                name: record.name.clone(),
            })?;

        if candidates.len() == 1 {
            return Ok(&candidates[0]);
        }

        if let Some(selector) = record.signature().and_then(|s| s.parse::<B256>().ok()) {
            if let Some(event) = candidates
                .iter()
                .find(|e| !e.anonymous && e.selector() == selector)
            {
                return Ok(event);
            }
        }

        let indexed_topics = record.topics.len().saturating_sub(1);
        Ok(candidates
            .iter()
            .find(|e| e.inputs.iter().filter(|p| p.indexed).count() == indexed_topics)
            .unwrap_or(&candidates[0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OVERLOADED: &str = r#"[
        {"type":"event","name":"Deposit","anonymous":false,"inputs":[
            {"name":"owner","type":"address","indexed":true},
            {"name":"amount","type":"uint256","indexed":false}]},
        {"type":"event","name":"Deposit","anonymous":false,"inputs":[
            {"name":"owner","type":"address","indexed":true},
            {"name":"pool","type":"address","indexed":true},
            {"name":"amount","type":"uint256","indexed":false}]}
    ]"#;

    fn record(name: &str, topics: Vec<String>) -> EventRecord {
        EventRecord {
            chain: "eth".into(),
            address: "0x1".into(),
            tx_hash: "0x2".into(),
            name: name.into(),
            topics,
            data: vec![],
            height: 1,
            block_time: 0,
        }
    }

    #[test]
    fn accepts_build_artifact() {
        let artifact = format!(r#"{{"contractName":"Vault","abi":{OVERLOADED}}}"#);
        let abi = ContractAbi::from_json(&artifact).unwrap();
        assert!(abi.has_event("Deposit"));
        assert_eq!(abi.event_names().collect::<Vec<_>>(), vec!["Deposit"]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            ContractAbi::from_json("{\"nope\":1}"),
            Err(DecodeError::InvalidAbi { .. })
        ));
        assert!(ContractAbi::from_json("not json").is_err());
    }

    #[test]
    fn overloads_resolved_by_selector_then_arity() {
        let abi = ContractAbi::from_json(OVERLOADED).unwrap();
        let two_indexed = &abi.inner().events["Deposit"][1];
        let sig = two_indexed.selector().to_string();

        let by_selector = abi
            .resolve_event(&record("Deposit", vec![sig, "0x0".into(), "0x0".into()]))
            .unwrap();
        assert_eq!(by_selector.inputs.len(), 3);

        let by_arity = abi
            .resolve_event(&record("Deposit", vec!["0xnot-a-hash".into(), "0x0".into()]))
            .unwrap();
        assert_eq!(by_arity.inputs.len(), 2);
    }

    #[test]
    fn unknown_event() {
        let abi = ContractAbi::from_json(OVERLOADED).unwrap();
        assert!(matches!(
            abi.resolve_event(&record("Withdraw", vec![])),
            Err(DecodeError::UnknownEvent { .. })
        ));
    }
}
