//! `EventDecoder`: rebuilds `name → value` from an event record.

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_dyn_abi::Specifier;
use alloy_json_abi::EventParam;
use elog_core::{error::DecodeError, event::EventRecord};
use indexmap::IndexMap;

use crate::{abi::ContractAbi, normalizer, value::NormalizedValue};

/// Decoded params keyed by name, in ABI declaration order.
pub type DecodedParams = IndexMap<String, NormalizedValue>;

/// Stateless event decoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventDecoder;

impl EventDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode `record` against the event of the same name in `abi`.
    ///
    /// Indexed params are read positionally from the topics after the
    /// signature slot (anonymous events have no signature slot); the rest are
    /// decoded from `record.data` as one ABI tuple. Both sub-sequences are
    /// merged back into declaration order.
    pub fn decode(
        &self,
        abi: &ContractAbi,
        record: &EventRecord,
    ) -> Result<DecodedParams, DecodeError> {
        let event = abi.resolve_event(record)?;
        let skip = if event.anonymous { 0 } else { 1 };
        let topics = record.topics.get(skip..).unwrap_or(&[]);

        let (indexed, body): (Vec<_>, Vec<_>) =
            event.inputs.iter().enumerate().partition(|(_, p)| p.indexed);

        if topics.len() != indexed.len() {
            return Err(DecodeError::TopicCountMismatch {
                name: event.name.clone(),
                expected: indexed.len(),
                got: topics.len(),
            });
        }

        let mut slots: Vec<Option<NormalizedValue>> = vec![None; event.inputs.len()];

        for (i, ((pos, param), topic)) in indexed.iter().zip(topics).enumerate() {
            slots[*pos] = Some(decode_topic(topic, param, i + skip)?);
        }

        if !body.is_empty() {
            let types = body
                .iter()
                .map(|(_, p)| resolve(p))
                .collect::<Result<Vec<_>, _>>()?;
            let values = decode_data(&record.data, types)?;
            if values.len() != body.len() {
                return Err(DecodeError::AbiDecodeFailed {
                    reason: format!(
                        "expected {} non-indexed values, decoded {}",
                        body.len(),
                        values.len()
                    ),
                });
            }
            for ((pos, _), val) in body.iter().zip(values) {
                slots[*pos] = Some(normalizer::normalize(val));
            }
        }

        let mut out = DecodedParams::with_capacity(event.inputs.len());
        for (pos, (param, slot)) in event.inputs.iter().zip(slots).enumerate() {
            let value = slot.ok_or_else(|| DecodeError::AbiDecodeFailed {
                reason: format!("param {pos} was not filled"),
            })?;
            out.insert(param_name(pos, param), value);
        }
        Ok(out)
    }

    /// Parse a JSON delivery body and decode it in one step.
    pub fn decode_json(
        &self,
        abi: &ContractAbi,
        body: &[u8],
    ) -> Result<(EventRecord, DecodedParams), DecodeError> {
        let record = EventRecord::from_json(body)?;
        let params = self.decode(abi, &record)?;
        Ok((record, params))
    }
}

fn param_name(pos: usize, param: &EventParam) -> String {
    if param.name.is_empty() {
        format!("arg{pos}")
    } else {
        param.name.clone()
    }
}

fn resolve(param: &EventParam) -> Result<DynSolType, DecodeError> {
    param.resolve().map_err(|e| DecodeError::UnsupportedType {
        ty: param.ty.clone(),
        reason: e.to_string(),
    })
}

/// Decode the non-indexed params as an ABI-encoded tuple.
fn decode_data(raw: &[u8], types: Vec<DynSolType>) -> Result<Vec<DynSolValue>, DecodeError> {
    let decoded = DynSolType::Tuple(types)
        .abi_decode_params(raw)
        .map_err(|e| DecodeError::AbiDecodeFailed {
            reason: e.to_string(),
        })?;
    Ok(match decoded {
        DynSolValue::Tuple(vals) => vals,
        other => vec![other],
    })
}

/// Decode a single indexed topic (always one 32-byte word).
///
/// Value types are stored padded and decode directly. Reference types
/// (string, bytes, arrays, tuples) are stored as the keccak256 of their
/// encoding, so the raw 32-byte hash is returned as `Bytes`.
fn decode_topic(
    topic_hex: &str,
    param: &EventParam,
    index: usize,
) -> Result<NormalizedValue, DecodeError> {
    let hex = topic_hex.strip_prefix("0x").unwrap_or(topic_hex);
    let bytes = hex::decode(hex).map_err(|e| DecodeError::InvalidTopic {
        index,
        reason: e.to_string(),
    })?;
    if bytes.len() != 32 {
        return Err(DecodeError::InvalidTopic {
            index,
            reason: format!("expected 32 bytes, got {}", bytes.len()),
        });
    }

    let ty = resolve(param)?;
    match ty {
        DynSolType::String
        | DynSolType::Bytes
        | DynSolType::Array(_)
        | DynSolType::FixedArray(..)
        | DynSolType::Tuple(_) => Ok(NormalizedValue::Bytes(bytes)),
        ty => ty
            .abi_decode(&bytes)
            .map(normalizer::normalize)
            .map_err(|e| DecodeError::InvalidTopic {
                index,
                reason: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ERC20: &str = r#"[
        {"type":"event","name":"Transfer","anonymous":false,"inputs":[
            {"name":"from","type":"address","indexed":true},
            {"name":"to","type":"address","indexed":true},
            {"name":"value","type":"uint256","indexed":false}]}
    ]"#;

    fn transfer(topics: Vec<&str>, data: Vec<u8>) -> EventRecord {
        EventRecord {
            chain: "eth".into(),
            address: "0xdac17f958d2ee523a2206206994597c13d831ec7".into(),
            tx_hash: "0xabc123".into(),
            name: "Transfer".into(),
            topics: topics.into_iter().map(String::from).collect(),
            data,
            height: 16_232_308,
            block_time: 1_671_434_111,
        }
    }

    fn one_eth() -> Vec<u8> {
        let mut d = vec![0u8; 32];
        d[24..].copy_from_slice(&1_000_000_000_000_000_000u64.to_be_bytes());
        d
    }

    #[test]
    fn decodes_erc20_transfer() {
        let abi = ContractAbi::from_json(ERC20).unwrap();
        let raw = transfer(
            vec![
                "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef",
                "0x000000000000000000000000d8da6bf26964af9d7eed9e03e53415d37aa96045",
                "0x000000000000000000000000ab5801a7d398351b8be11c439e05c5b3259aec9b",
            ],
            one_eth(),
        );

        let params = EventDecoder::new().decode(&abi, &raw).unwrap();
        assert_eq!(params.keys().collect::<Vec<_>>(), vec!["from", "to", "value"]);
        assert_eq!(
            params["from"].as_address().unwrap().to_lowercase(),
            "0xd8da6bf26964af9d7eed9e03e53415d37aa96045"
        );
        assert_eq!(params["value"].as_u128(), Some(1_000_000_000_000_000_000));
    }

    #[test]
    fn missing_indexed_topic_is_an_error() {
        let abi = ContractAbi::from_json(ERC20).unwrap();
        let raw = transfer(
            vec![
                "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef",
                "0x000000000000000000000000d8da6bf26964af9d7eed9e03e53415d37aa96045",
            ],
            one_eth(),
        );
        assert!(matches!(
            EventDecoder::new().decode(&abi, &raw),
            Err(DecodeError::TopicCountMismatch { expected: 2, got: 1, .. })
        ));
    }

    #[test]
    fn truncated_data_is_an_error() {
        let abi = ContractAbi::from_json(ERC20).unwrap();
        let raw = transfer(
            vec![
                "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef",
                "0x000000000000000000000000d8da6bf26964af9d7eed9e03e53415d37aa96045",
                "0x000000000000000000000000ab5801a7d398351b8be11c439e05c5b3259aec9b",
            ],
            vec![0u8; 8],
        );
        assert!(matches!(
            EventDecoder::new().decode(&abi, &raw),
            Err(DecodeError::AbiDecodeFailed { .. })
        ));
    }

    #[test]
    fn short_topic_is_an_error() {
        let abi = ContractAbi::from_json(ERC20).unwrap();
        let raw = transfer(
            vec![
                "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef",
                "0xd8da6bf26964af9d7eed9e03e53415d37aa96045",
                "0x000000000000000000000000ab5801a7d398351b8be11c439e05c5b3259aec9b",
            ],
            one_eth(),
        );
        assert!(matches!(
            EventDecoder::new().decode(&abi, &raw),
            Err(DecodeError::InvalidTopic { index: 1, .. })
        ));
    }

    #[test]
    fn unknown_event_name() {
        let abi = ContractAbi::from_json(ERC20).unwrap();
        let mut raw = transfer(vec![], vec![]);
        raw.name = "Approval".into();
        assert!(matches!(
            EventDecoder::new().decode(&abi, &raw),
            Err(DecodeError::UnknownEvent { .. })
        ));
    }
}
