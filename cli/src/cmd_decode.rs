//! Offline decoding of a saved event record.

use anyhow::{Context, Result};
use elog_evm::{ContractAbi, EventDecoder};
use std::io::Read;
use std::path::Path;

pub fn run(abi_path: &Path, record_path: &Path, as_json: bool) -> Result<()> {
    let abi = load_abi(abi_path)?;

    let body = if record_path.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("read event record from stdin")?;
        buf
    } else {
        std::fs::read(record_path)
            .with_context(|| format!("read event record '{}'", record_path.display()))?
    };

    let (record, params) = EventDecoder::new().decode_json(&abi, &body)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&params)?);
    } else {
        println!("Event:   {}", record.name);
        println!("Chain:   {}", record.chain);
        println!("Block:   {}", record.height);
        println!("Tx:      {}", record.tx_hash);
        println!("Params:");
        for (name, value) in &params {
            println!("  {name}: {value}");
        }
    }
    Ok(())
}

pub fn load_abi(path: &Path) -> Result<ContractAbi> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read ABI file '{}'", path.display()))?;
    ContractAbi::from_slice(&bytes).with_context(|| format!("parse ABI file '{}'", path.display()))
}
