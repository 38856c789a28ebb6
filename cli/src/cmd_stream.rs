//! Draining delivery streams to stdout.

use anyhow::Result;
use elog_core::event::EventRecord;
use elog_evm::{ContractAbi, EventDecoder};
use elog_mq::DeliveryStream;
use futures::StreamExt;
use tracing::{info, warn};

pub struct Printer<'a> {
    pub abi: Option<&'a ContractAbi>,
    pub json: bool,
    pub limit: Option<usize>,
}

/// Print and ack each delivery until the stream ends, `limit` is reached or
/// Ctrl-C. Bodies that are not event records are dropped with a nack.
pub async fn drain(mut stream: DeliveryStream, printer: &Printer<'_>) -> Result<usize> {
    let mut seen = 0usize;
    loop {
        let next = tokio::select! {
            item = stream.next() => item,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        };
        let Some(item) = next else { break };
        let delivery = item?;

        match delivery.event() {
            Ok(event) => {
                printer.print(&event)?;
                delivery.ack().await?;
            }
            Err(e) => {
                warn!(
                    topic = delivery.topic(),
                    delivery_tag = delivery.delivery_tag(),
                    error = %e,
                    "dropping malformed delivery"
                );
                delivery.nack(false).await?;
            }
        }

        seen += 1;
        if printer.limit.is_some_and(|limit| seen >= limit) {
            break;
        }
    }
    Ok(seen)
}

impl Printer<'_> {
    fn print(&self, event: &EventRecord) -> Result<()> {
        let params = match self.abi {
            Some(abi) => match EventDecoder::new().decode(abi, event) {
                Ok(params) => Some(params),
                Err(e) => {
                    warn!(event = %event.name, tx = %event.tx_hash, error = %e, "decode failed");
                    None
                }
            },
            None => None,
        };

        if self.json {
            let line = serde_json::json!({
                "chain": event.chain,
                "address": event.address,
                "txHash": event.tx_hash,
                "height": event.height,
                "block_time": event.block_time,
                "name": event.name,
                "params": params,
            });
            println!("{line}");
        } else {
            println!("{} {}", event.height, event.name);
            for (name, value) in params.iter().flatten() {
                println!("  {name}: {value}");
            }
        }
        Ok(())
    }
}
