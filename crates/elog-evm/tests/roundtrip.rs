//! Encode-then-decode fixtures.
//!
//! Each test builds topics and data from known values with alloy's encoder,
//! wraps them in an `EventRecord`, and checks the decoder hands back the same
//! name → value mapping in declaration order.

use alloy_core::dyn_abi::DynSolValue;
use alloy_primitives::{keccak256, Address, B256, I256, U256};
use elog_core::{error::DecodeError, event::EventRecord};
use elog_evm::{normalizer::normalize, ContractAbi, EventDecoder, NormalizedValue};

// ─── Helpers ──────────────────────────────────────────────────────────────────

const MIXED_ABI: &str = r#"[
    {"type":"event","name":"Trade","anonymous":false,"inputs":[
        {"name":"amountIn","type":"uint256","indexed":false},
        {"name":"trader","type":"address","indexed":true},
        {"name":"memo","type":"string","indexed":false},
        {"name":"pair","type":"bytes32","indexed":true},
        {"name":"tick","type":"int24","indexed":false},
        {"name":"route","type":"address[]","indexed":false},
        {"name":"tag","type":"string","indexed":true}]},
    {"type":"event","name":"Ping","anonymous":false,"inputs":[]},
    {"type":"event","name":"Raw","anonymous":true,"inputs":[
        {"name":"who","type":"address","indexed":true},
        {"name":"","type":"bool","indexed":false}]}
]"#;

fn topic_hex(word: &[u8]) -> String {
    format!("0x{}", hex::encode(word))
}

fn record(name: &str, topics: Vec<String>, data: Vec<u8>) -> EventRecord {
    EventRecord {
        chain: "eth".into(),
        address: "0x1f9840a85d5af5bf1d1762f925bdaddc4201f984".into(),
        tx_hash: "0xfeed".into(),
        name: name.into(),
        topics,
        data,
        height: 19_000_000,
        block_time: 1_700_000_000,
    }
}

fn abi() -> ContractAbi {
    ContractAbi::from_json(MIXED_ABI).expect("fixture ABI parses")
}

// ─── Mixed indexed / non-indexed ─────────────────────────────────────────────

#[test]
fn interleaved_params_keep_declaration_order() {
    let abi = abi();
    let event = &abi.inner().events["Trade"][0];

    let trader: Address = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045".parse().unwrap();
    let pair = B256::repeat_byte(0x11);
    let tag = "limit-order";

    let amount_in = DynSolValue::Uint(U256::from(123_456_789u64), 256);
    let memo = DynSolValue::String("gm".into());
    let tick = DynSolValue::Int(I256::from_dec_str("-887272").unwrap(), 24);
    let route = DynSolValue::Array(vec![
        DynSolValue::Address(trader),
        DynSolValue::Address(Address::repeat_byte(0x22)),
    ]);

    let data = DynSolValue::Tuple(vec![
        amount_in.clone(),
        memo.clone(),
        tick.clone(),
        route.clone(),
    ])
    .abi_encode_params();

    let topics = vec![
        event.selector().to_string(),
        topic_hex(&DynSolValue::Address(trader).abi_encode()),
        topic_hex(pair.as_slice()),
        topic_hex(keccak256(tag.as_bytes()).as_slice()),
    ];

    let params = EventDecoder::new()
        .decode(&abi, &record("Trade", topics, data))
        .expect("decode");

    assert_eq!(
        params.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["amountIn", "trader", "memo", "pair", "tick", "route", "tag"]
    );
    assert_eq!(params["amountIn"], normalize(amount_in));
    assert_eq!(params["trader"], normalize(DynSolValue::Address(trader)));
    assert_eq!(params["memo"], normalize(memo));
    assert_eq!(params["pair"], NormalizedValue::Bytes(pair.to_vec()));
    assert_eq!(params["tick"], NormalizedValue::Int(-887_272));
    assert_eq!(params["route"], normalize(route));
    // Indexed strings only survive as their hash.
    assert_eq!(
        params["tag"],
        NormalizedValue::Bytes(keccak256(tag.as_bytes()).to_vec())
    );
}

#[test]
fn filled_param_count_matches_declaration() {
    let abi = abi();
    let event = &abi.inner().events["Trade"][0];
    let data = DynSolValue::Tuple(vec![
        DynSolValue::Uint(U256::from(1u64), 256),
        DynSolValue::String(String::new()),
        DynSolValue::Int(I256::ZERO, 24),
        DynSolValue::Array(vec![]),
    ])
    .abi_encode_params();
    let topics = vec![
        event.selector().to_string(),
        topic_hex(B256::ZERO.as_slice()),
        topic_hex(B256::ZERO.as_slice()),
        topic_hex(B256::ZERO.as_slice()),
    ];
    let params = EventDecoder::new()
        .decode(&abi, &record("Trade", topics.clone(), data))
        .unwrap();
    assert_eq!(params.len(), event.inputs.len());
    assert_eq!(topics.len() - 1, event.inputs.iter().filter(|p| p.indexed).count());
}

// ─── Edge cases ───────────────────────────────────────────────────────────────

#[test]
fn event_without_params_decodes_to_empty_map() {
    let abi = abi();
    let sig = abi.inner().events["Ping"][0].selector().to_string();
    let params = EventDecoder::new()
        .decode(&abi, &record("Ping", vec![sig], vec![]))
        .unwrap();
    assert!(params.is_empty());
}

#[test]
fn anonymous_event_has_no_signature_slot() {
    let abi = abi();
    let who: Address = "0xab5801a7d398351b8be11c439e05c5b3259aec9b".parse().unwrap();
    let data = DynSolValue::Tuple(vec![DynSolValue::Bool(true)]).abi_encode_params();
    let topics = vec![topic_hex(&DynSolValue::Address(who).abi_encode())];

    let params = EventDecoder::new()
        .decode(&abi, &record("Raw", topics, data))
        .unwrap();
    assert_eq!(params["who"], normalize(DynSolValue::Address(who)));
    // Unnamed params fall back to a positional name.
    assert_eq!(params["arg1"], NormalizedValue::Bool(true));
}

#[test]
fn too_many_topics_rejected() {
    let abi = abi();
    let sig = abi.inner().events["Ping"][0].selector().to_string();
    let extra = topic_hex(B256::ZERO.as_slice());
    let err = EventDecoder::new()
        .decode(&abi, &record("Ping", vec![sig, extra], vec![]))
        .unwrap_err();
    assert!(matches!(err, DecodeError::TopicCountMismatch { expected: 0, got: 1, .. }));
}

#[test]
fn decode_json_delivery_body() {
    let abi = ContractAbi::from_json(
        r#"[{"type":"event","name":"Transfer","anonymous":false,"inputs":[
            {"name":"from","type":"address","indexed":true},
            {"name":"to","type":"address","indexed":true},
            {"name":"value","type":"uint256","indexed":false}]}]"#,
    )
    .unwrap();
    let body = serde_json::json!({
        "chain": "eth",
        "address": "0xdAC17F958D2ee523a2206206994597C13D831ec7",
        "txHash": "0xabc",
        "name": "Transfer",
        "topics": [
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef",
            "0x000000000000000000000000d8da6bf26964af9d7eed9e03e53415d37aa96045",
            "0x000000000000000000000000ab5801a7d398351b8be11c439e05c5b3259aec9b"
        ],
        "data": "0x00000000000000000000000000000000000000000000000000000000000003e8",
        "height": 42,
        "block_time": 7
    });
    let (record, params) = EventDecoder::new()
        .decode_json(&abi, body.to_string().as_bytes())
        .unwrap();
    assert_eq!(record.height, 42);
    assert_eq!(params["value"].as_u128(), Some(1000));
}
