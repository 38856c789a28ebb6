//! elog CLI: talk to an elog indexing service from the shell.
//!
//! # Commands
//! ```text
//! elog register
//! elog upload         --chain <c> --address <a> [--type ERC20] [--abi <path>] [--follow]
//! elog chase          --chain <c> --address <a> --start-block <n> --names Transfer,Approval
//! elog subscribe      --chain <c> --address <a> --names Transfer,Approval
//! elog unsubscribe    --chain <c> --address <a> --names Approval
//! elog remove         --chain <c> --address <a>
//! elog events         --chain <c> --address <a>
//! elog restart        [--abi <path>]
//! elog timestamp      --chain <c> --height <n>
//! elog native-balance --chain <c> --address <a>
//! elog erc20-balance  --chain <c> --wallet <a> --contract <a>
//! elog decode         --abi <path> --record <file|->
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use elog_client::{ClientConfig, ContractSpec, ElogClient, InterfaceDefinition};
use elog_core::types::ContractType;
use futures::stream::select_all;
use std::path::PathBuf;
use tracing::info;

mod cmd_decode;
mod cmd_stream;
mod logging;

use cmd_stream::Printer;
use logging::{init_tracing, LogConfig};

#[derive(Parser)]
#[command(
    name = "elog",
    about = "Subscribe to on-chain contract events through an elog indexing service",
    long_about = "
elog CLI: register a wallet, hand contracts to the indexing service and
stream the events it publishes.

ENVIRONMENT VARIABLES (used when --config is not given):
  ELOG_API_URL             Control-plane base URL
  ELOG_MQ_URL              AMQP URI of the event broker
  ELOG_HEARTBEAT_ADDR      Keepalive endpoint (host:port)
  ELOG_WALLET              Identity proposed on register
  ELOG_HTTP_TIMEOUT_SECS   Control-plane timeout (default 5)
  ELOG_HEARTBEAT_SECS      Keepalive period (default 30)
  RUST_LOG                 Log filter, overrides --log-level
",
    version
)]
struct Cli {
    #[command(flatten)]
    conn: ConnArgs,

    /// Log level: trace | debug | info | warn | error
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// JSON logs on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Print events and results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct ConnArgs {
    /// JSON client config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Control-plane base URL
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// AMQP URI
    #[arg(long, global = true)]
    mq_url: Option<String>,
    /// Keepalive endpoint (host:port)
    #[arg(long, global = true)]
    heartbeat_addr: Option<String>,
    /// Identity to propose on register
    #[arg(long, global = true)]
    wallet: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct ContractArgs {
    /// Chain slug, e.g. eth
    #[arg(long)]
    chain: String,
    /// Contract address
    #[arg(long)]
    address: String,
}

#[derive(Args, Debug, Clone)]
struct StreamArgs {
    /// ABI JSON used to decode printed events (and uploaded for OTHER)
    #[arg(long)]
    abi: Option<PathBuf>,
    /// Stop after this many events
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register and print the assigned identity
    Register,

    /// Register a contract for indexing and optionally stream its events
    Upload {
        #[command(flatten)]
        contract: ContractArgs,
        /// ERC20 | ERC721 | ERC1155 | OTHER
        #[arg(long = "type", default_value = "ERC20")]
        contract_type: ContractType,
        #[command(flatten)]
        stream: StreamArgs,
        /// Keep running and print events as they arrive
        #[arg(long)]
        follow: bool,
    },

    /// Register a contract and replay events from a past block
    Chase {
        #[command(flatten)]
        contract: ContractArgs,
        #[arg(long = "type", default_value = "ERC20")]
        contract_type: ContractType,
        /// First block to replay
        #[arg(long)]
        start_block: u64,
        /// Event names, comma separated
        #[arg(long, value_delimiter = ',')]
        names: Vec<String>,
        #[command(flatten)]
        stream: StreamArgs,
    },

    /// Subscribe to events of a registered contract
    Subscribe {
        #[command(flatten)]
        contract: ContractArgs,
        #[arg(long, value_delimiter = ',', required = true)]
        names: Vec<String>,
    },

    /// Unsubscribe from events of a registered contract
    Unsubscribe {
        #[command(flatten)]
        contract: ContractArgs,
        #[arg(long, value_delimiter = ',', required = true)]
        names: Vec<String>,
    },

    /// Remove a contract from the service
    Remove {
        #[command(flatten)]
        contract: ContractArgs,
    },

    /// List subscribed event names for a contract
    Events {
        #[command(flatten)]
        contract: ContractArgs,
    },

    /// Rebind every registered contract and stream their events
    Restart {
        #[command(flatten)]
        stream: StreamArgs,
    },

    /// Block timestamp at a height
    Timestamp {
        #[arg(long)]
        chain: String,
        #[arg(long)]
        height: u64,
    },

    /// Native coin balance of an address
    #[command(name = "native-balance")]
    NativeBalance {
        #[arg(long)]
        chain: String,
        #[arg(long)]
        address: String,
    },

    /// ERC-20 balance of a wallet
    #[command(name = "erc20-balance")]
    Erc20Balance {
        #[arg(long)]
        chain: String,
        #[arg(long)]
        wallet: String,
        #[arg(long)]
        contract: String,
    },

    /// Decode a saved event record against an ABI (offline)
    Decode {
        #[arg(long)]
        abi: PathBuf,
        /// Event record JSON file, or - for stdin
        #[arg(long, default_value = "-")]
        record: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&LogConfig {
        level: cli.log_level.clone(),
        json: cli.log_json,
        ..LogConfig::default()
    });

    if let Commands::Decode { abi, record } = &cli.command {
        return cmd_decode::run(abi, record, cli.json);
    }

    let config = load_config(&cli.conn)?;
    let client = ElogClient::connect(config)
        .await
        .context("connect to elog service")?;

    let result = run(&client, cli.command, cli.json).await;
    if client.identity().is_some() {
        client.close().await?;
    }
    result
}

async fn run(client: &ElogClient, command: Commands, as_json: bool) -> Result<()> {
    match command {
        Commands::Register => {
            let identity = client.register(None).await?;
            println!("{identity}");
        }

        Commands::Upload {
            contract,
            contract_type,
            stream,
            follow,
        } => {
            client.register(None).await?;
            let spec = contract_spec(&contract, contract_type, stream.abi.as_ref()).await?;
            let deliveries = client.upload_contract(spec).await?;
            info!(chain = %contract.chain, address = %contract.address, "contract uploaded");
            if follow || stream.limit.is_some() {
                drain(deliveries, &stream, as_json).await?;
            }
        }

        Commands::Chase {
            contract,
            contract_type,
            start_block,
            names,
            stream,
        } => {
            client.register(None).await?;
            let spec = contract_spec(&contract, contract_type, stream.abi.as_ref()).await?;
            let deliveries = client.chase_block(spec, start_block, &names).await?;
            drain(deliveries, &stream, as_json).await?;
        }

        Commands::Subscribe { contract, names } => {
            client.register(None).await?;
            client
                .subscribe_events(&contract.chain, &contract.address, &names)
                .await?;
        }

        Commands::Unsubscribe { contract, names } => {
            client.register(None).await?;
            client
                .unsubscribe_events(&contract.chain, &contract.address, &names)
                .await?;
        }

        Commands::Remove { contract } => {
            client.register(None).await?;
            client
                .remove_contract(&contract.chain, &contract.address)
                .await?;
        }

        Commands::Events { contract } => {
            client.register(None).await?;
            let names = client
                .get_sub_events(&contract.chain, &contract.address)
                .await?;
            if as_json {
                println!("{}", serde_json::to_string(&names)?);
            } else {
                for name in names {
                    println!("{name}");
                }
            }
        }

        Commands::Restart { stream } => {
            client.register(None).await?;
            let streams = client.restart().await?;
            info!(contracts = streams.len(), "topics rebound");
            if !streams.is_empty() {
                drain(Box::pin(select_all(streams.into_values())), &stream, as_json).await?;
            }
        }

        Commands::Timestamp { chain, height } => {
            println!("{}", client.get_timestamp(&chain, height).await?);
        }

        Commands::NativeBalance { chain, address } => {
            println!("{}", client.get_native_token(&chain, &address).await?);
        }

        Commands::Erc20Balance {
            chain,
            wallet,
            contract,
        } => {
            println!("{}", client.get_erc20_token(&chain, &wallet, &contract).await?);
        }

        Commands::Decode { abi, record } => cmd_decode::run(&abi, &record, as_json)?,
    }
    Ok(())
}

/// Config file or environment, then flag overrides.
fn load_config(args: &ConnArgs) -> Result<ClientConfig> {
    let base = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read config '{}'", path.display()))?;
            let config: ClientConfig = serde_json::from_str(&text)
                .with_context(|| format!("parse config '{}'", path.display()))?;
            Some(config)
        }
        None => ClientConfig::from_env().ok(),
    };

    let mut config = match base {
        Some(config) => config,
        None => ClientConfig::new(
            args.api_url.clone().context("--api-url or ELOG_API_URL is required")?,
            args.mq_url.clone().context("--mq-url or ELOG_MQ_URL is required")?,
            args.heartbeat_addr
                .clone()
                .context("--heartbeat-addr or ELOG_HEARTBEAT_ADDR is required")?,
        ),
    };

    if let Some(v) = &args.api_url {
        config.api_url = v.clone();
    }
    if let Some(v) = &args.mq_url {
        config.mq_url = v.clone();
    }
    if let Some(v) = &args.heartbeat_addr {
        config.heartbeat_addr = v.clone();
    }
    if let Some(v) = &args.wallet {
        config.wallet = Some(v.clone());
    }
    config.validate()?;
    Ok(config)
}

async fn contract_spec(
    contract: &ContractArgs,
    contract_type: ContractType,
    abi: Option<&PathBuf>,
) -> Result<ContractSpec> {
    let mut spec = ContractSpec::new(&contract.chain, contract_type, &contract.address);
    if let Some(path) = abi {
        spec = spec.with_definition(InterfaceDefinition::from_path(path).await?);
    }
    Ok(spec)
}

async fn drain(
    deliveries: elog_mq::DeliveryStream,
    args: &StreamArgs,
    as_json: bool,
) -> Result<()> {
    let abi = args.abi.as_deref().map(cmd_decode::load_abi).transpose()?;
    let printer = Printer {
        abi: abi.as_ref(),
        json: as_json,
        limit: args.limit,
    };
    let seen = cmd_stream::drain(deliveries, &printer).await?;
    info!(events = seen, "stream finished");
    Ok(())
}
