//! # elog-client
//!
//! Client SDK for the elog event indexing service.
//!
//! ```text
//! ElogClient
//!   ├── SessionManager   register → identity, TCP keepalive task
//!   ├── ControlPlane     HTTP calls (upload, chase, subscribe, …)
//!   └── TopicRegistry    one broker queue per (identity, chain, contract)
//! ```
//!
//! ## Quick Start
//! ```rust,no_run
//! use elog_client::{ClientConfig, ContractSpec, ElogClient};
//! use elog_core::ContractType;
//! use futures::StreamExt;
//!
//! # async fn run() -> Result<(), elog_core::ElogError> {
//! let config = ClientConfig::new("http://127.0.0.1:8081", "amqp://localhost:5672", "127.0.0.1:8082")
//!     .with_wallet("0xd8da6bf26964af9d7eed9e03e53415d37aa96045");
//! let client = ElogClient::connect(config).await?;
//! client.register(None).await?;
//!
//! let usdt = ContractSpec::new("eth", ContractType::Erc20, "0xdAC17F958D2ee523a2206206994597C13D831ec7");
//! let mut stream = client.upload_contract(usdt).await?;
//! while let Some(delivery) = stream.next().await {
//!     let delivery = delivery?;
//!     let event = delivery.event()?;
//!     println!("{} {}", event.height, event.name);
//!     delivery.ack().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod control;
pub mod restart;
pub mod session;

pub use client::{ContractSpec, ElogClient, InterfaceDefinition};
pub use config::ClientConfig;
pub use control::{ControlPlane, ControlRequest, Endpoint, HttpControlPlane, RawResponse};
pub use restart::RestartStreams;
pub use session::SessionManager;
