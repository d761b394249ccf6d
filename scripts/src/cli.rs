//! Definitions of CLI arguments and commands for the marketplace scripts

use std::{path::PathBuf, time::Duration};

use alloy::primitives::{Address, U256};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use crate::{
    commands::{cleanup, deploy, deploy_contract, diagnose, grant_role, link, list_extensions},
    config::{parse_ether_amount, DeployConfig, Network},
    constants::{
        DEFAULT_ARTIFACT_DIR, DEFAULT_DEPLOYMENTS_PATH, DEFAULT_MAX_RETRIES,
        DEFAULT_MIN_BALANCE_ETHER, DEFAULT_NATIVE_TOKEN_WRAPPER, DEFAULT_PLATFORM_FEE_BPS,
        DEFAULT_PRIVATE_KEY_ENV_VAR, DEFAULT_RETRY_DELAY_SECS, DIRECT_LISTINGS_ADDRESS_ENV_VAR,
        MARKETPLACE_ADDRESS_ENV_VAR, OFFERS_ADDRESS_ENV_VAR, RPC_URL_ENV_VAR,
    },
    errors::ScriptError,
    orchestrator::Orchestrator,
    types::{GasOverrides, MarketplaceContract},
    utils::setup_client,
};

/// Deploy, link and diagnose the marketplace contracts on HyperEVM
#[derive(Parser)]
#[command(version)]
pub struct Cli {
    /// Options shared by every command
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command
#[derive(Args, Clone, Debug)]
pub struct GlobalArgs {
    /// The network preset providing the chain ID and endpoints
    #[arg(long, value_enum, default_value_t = Network::Testnet, global = true)]
    pub network: Network,

    /// RPC endpoints to try in order, overriding the network preset
    #[arg(long, env = RPC_URL_ENV_VAR, value_delimiter = ',', global = true)]
    pub rpc_url: Vec<String>,

    /// The chain ID the endpoint must serve, overriding the network preset
    #[arg(long, global = true)]
    pub chain_id: Option<u64>,

    /// The environment variable holding the deployer's private key
    #[arg(long, default_value = DEFAULT_PRIVATE_KEY_ENV_VAR, global = true)]
    pub private_key_env: String,

    /// The forge output directory
    #[arg(long, default_value = DEFAULT_ARTIFACT_DIR, global = true)]
    pub artifacts: PathBuf,

    /// The file recording deployed addresses
    #[arg(long, default_value = DEFAULT_DEPLOYMENTS_PATH, global = true)]
    pub deployments: PathBuf,

    /// Gas limit for every transaction, estimated when absent
    #[arg(long, global = true)]
    pub gas_limit: Option<u64>,

    /// EIP-1559 max fee per gas in wei, estimated when absent
    #[arg(long, global = true)]
    pub max_fee_per_gas: Option<u128>,

    /// EIP-1559 max priority fee per gas in wei, estimated when absent
    #[arg(long, global = true)]
    pub max_priority_fee_per_gas: Option<u128>,

    /// Maximum broadcast attempts per deployment
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES, global = true)]
    pub max_retries: usize,

    /// Delay between broadcast attempts, in seconds
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY_SECS, global = true)]
    pub retry_delay_secs: u64,

    /// Minimum deployer balance, in ether
    #[arg(
        long,
        default_value = DEFAULT_MIN_BALANCE_ETHER,
        value_parser = parse_ether_amount,
        global = true
    )]
    pub min_balance: U256,
}

impl GlobalArgs {
    /// Collapse the options into a run configuration
    pub fn into_config(self) -> DeployConfig {
        let rpc_urls = if self.rpc_url.is_empty() {
            self.network.rpc_urls()
        } else {
            self.rpc_url
                .into_iter()
                .map(|url| url.trim().to_string())
                .collect()
        };

        DeployConfig {
            rpc_urls,
            chain_id: self.chain_id.unwrap_or_else(|| self.network.chain_id()),
            private_key_env_var: self.private_key_env,
            artifact_dir: self.artifacts,
            gas: GasOverrides {
                gas_limit: self.gas_limit,
                max_fee_per_gas: self.max_fee_per_gas,
                max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            },
            max_retries: self.max_retries,
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            min_balance: self.min_balance,
            deployments_path: self.deployments,
        }
    }
}

/// The available commands
#[derive(Subcommand)]
pub enum Command {
    /// Deploy the marketplace and both extensions, then link and verify them
    Deploy(DeployArgs),
    /// Deploy a single contract, replacing the recorded one
    DeployContract(DeployContractArgs),
    /// Register the extensions on an existing marketplace
    Link(LinkArgs),
    /// Inspect the deployed contracts without sending transactions
    Diagnose(DiagnoseArgs),
    /// Grant a marketplace role to an account
    GrantRole(GrantRoleArgs),
    /// Remove registered extensions that are not the known deployments
    Cleanup(CleanupArgs),
    /// List the extensions registered in the marketplace
    ListExtensions(ListExtensionsArgs),
}

impl Command {
    /// Connect to the chain and run the command
    pub async fn run(self, config: DeployConfig) -> Result<(), ScriptError> {
        let (client, endpoint) = setup_client(&config).await?;
        let mut orchestrator = Orchestrator::new(client, config.retry_policy(), config.gas);

        let res = match self {
            Command::Deploy(args) => deploy(args, &config, &endpoint, &mut orchestrator).await,
            Command::DeployContract(args) => {
                deploy_contract(args, &config, &endpoint, &mut orchestrator).await
            }
            Command::Link(args) => link(args, &config, &mut orchestrator).await,
            Command::Diagnose(args) => diagnose(args, &config, &mut orchestrator).await,
            Command::GrantRole(args) => grant_role(args, &config, &orchestrator).await,
            Command::Cleanup(args) => cleanup(args, &config, &orchestrator).await,
            Command::ListExtensions(args) => list_extensions(args, &config, &orchestrator).await,
        };

        for (name, stage) in orchestrator.stages() {
            info!("{name}: {stage}");
        }

        res
    }
}

/// Addresses of previously deployed contracts; each falls back to the
/// deployments file when absent
#[derive(Args, Clone, Debug, Default)]
pub struct ContractAddressArgs {
    /// The marketplace address
    #[arg(long, env = MARKETPLACE_ADDRESS_ENV_VAR)]
    pub marketplace: Option<Address>,

    /// The offers extension address
    #[arg(long, env = OFFERS_ADDRESS_ENV_VAR)]
    pub offers: Option<Address>,

    /// The direct listings extension address
    #[arg(long, env = DIRECT_LISTINGS_ADDRESS_ENV_VAR)]
    pub direct_listings: Option<Address>,
}

/// Constructor parameters of the marketplace and direct listings contracts
#[derive(Args, Clone, Debug)]
pub struct ConstructorArgs {
    /// The platform fee, in basis points
    #[arg(long, default_value_t = DEFAULT_PLATFORM_FEE_BPS)]
    pub platform_fee_bps: u16,

    /// The platform fee recipient, the deployer when absent
    #[arg(long)]
    pub fee_recipient: Option<Address>,

    /// The royalty engine, none when absent
    #[arg(long, default_value_t = Address::ZERO)]
    pub royalty_engine: Address,

    /// The wrapped native token
    #[arg(long, default_value_t = DEFAULT_NATIVE_TOKEN_WRAPPER)]
    pub native_token_wrapper: Address,
}

impl Default for ConstructorArgs {
    fn default() -> Self {
        Self {
            platform_fee_bps: DEFAULT_PLATFORM_FEE_BPS,
            fee_recipient: None,
            royalty_engine: Address::ZERO,
            native_token_wrapper: DEFAULT_NATIVE_TOKEN_WRAPPER,
        }
    }
}

/// Deploy the marketplace and both extensions
#[derive(Args, Clone, Debug, Default)]
pub struct DeployArgs {
    /// Constructor parameters
    #[command(flatten)]
    pub constructor: ConstructorArgs,
}

/// Deploy a single contract
#[derive(Args, Clone, Debug)]
pub struct DeployContractArgs {
    /// The contract to deploy
    #[arg(short, long)]
    pub contract: MarketplaceContract,

    /// Link the new contract: register a new extension on the recorded
    /// marketplace, or register the recorded extensions on a new marketplace
    #[arg(long)]
    pub link: bool,

    /// Constructor parameters
    #[command(flatten)]
    pub constructor: ConstructorArgs,

    /// Addresses of the contracts to link against
    #[command(flatten)]
    pub addresses: ContractAddressArgs,
}

/// Register the extensions on an existing marketplace
#[derive(Args, Clone, Debug, Default)]
pub struct LinkArgs {
    /// Addresses of the marketplace and the extensions
    #[command(flatten)]
    pub addresses: ContractAddressArgs,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Inspect the deployed contracts
#[derive(Args, Clone, Debug, Default)]
pub struct DiagnoseArgs {
    /// Addresses of the marketplace and the extensions
    #[command(flatten)]
    pub addresses: ContractAddressArgs,

    /// The expected contract admin, the deployer when absent
    #[arg(long)]
    pub admin: Option<Address>,
}

/// The marketplace roles that can be granted
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum MarketplaceRole {
    /// `EXTENSION_ROLE`, required to add and remove extensions
    Extension,
    /// `DEFAULT_ADMIN_ROLE`, required to grant roles
    Admin,
}

/// Grant a marketplace role
#[derive(Args, Clone, Debug)]
pub struct GrantRoleArgs {
    /// The role to grant
    #[arg(short, long, value_enum, default_value_t = MarketplaceRole::Extension)]
    pub role: MarketplaceRole,

    /// The account receiving the role, the deployer when absent
    #[arg(short, long)]
    pub account: Option<Address>,

    /// The marketplace address
    #[arg(long, env = MARKETPLACE_ADDRESS_ENV_VAR)]
    pub marketplace: Option<Address>,
}

/// Remove unknown extensions
#[derive(Args, Clone, Debug, Default)]
pub struct CleanupArgs {
    /// Addresses of the marketplace and the known extensions
    #[command(flatten)]
    pub addresses: ContractAddressArgs,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// List registered extensions
#[derive(Args, Clone, Debug, Default)]
pub struct ListExtensionsArgs {
    /// The marketplace address
    #[arg(long, env = MARKETPLACE_ADDRESS_ENV_VAR)]
    pub marketplace: Option<Address>,
}
