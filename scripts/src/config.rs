//! Run configuration, collapsed from network presets, CLI flags and the
//! environment

use std::{
    fmt::{self, Display},
    path::PathBuf,
    time::Duration,
};

use alloy::primitives::{utils::parse_ether, U256};
use clap::ValueEnum;

use crate::{
    constants::{
        DEFAULT_ARTIFACT_DIR, DEFAULT_DEPLOYMENTS_PATH, DEFAULT_MAX_RETRIES,
        DEFAULT_MIN_BALANCE_ETHER, DEFAULT_PRIVATE_KEY_ENV_VAR, DEFAULT_RETRY_DELAY_SECS,
        MAINNET_CHAIN_ID, MAINNET_RPC_URLS, TESTNET_CHAIN_ID, TESTNET_RPC_URLS,
    },
    orchestrator::RetryPolicy,
    types::GasOverrides,
};

/// The HyperEVM networks with built-in presets
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Network {
    /// HyperEVM mainnet
    Mainnet,
    /// HyperEVM testnet
    Testnet,
}

impl Network {
    /// The chain ID of the network
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Mainnet => MAINNET_CHAIN_ID,
            Network::Testnet => TESTNET_CHAIN_ID,
        }
    }

    /// The public RPC endpoints of the network, in order of preference
    pub fn rpc_urls(&self) -> Vec<String> {
        let urls = match self {
            Network::Mainnet => MAINNET_RPC_URLS,
            Network::Testnet => TESTNET_RPC_URLS,
        };
        urls.iter().map(|url| url.to_string()).collect()
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

/// Everything a run needs besides the per-command arguments
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployConfig {
    /// Candidate RPC endpoints, in order of preference
    pub rpc_urls: Vec<String>,
    /// The chain ID the selected endpoint must serve
    pub chain_id: u64,
    /// The environment variable holding the deployer's private key
    pub private_key_env_var: String,
    /// The forge output directory
    pub artifact_dir: PathBuf,
    /// Gas overrides applied to every transaction
    pub gas: GasOverrides,
    /// The maximum number of broadcast attempts per deployment
    pub max_retries: usize,
    /// The delay between broadcast attempts
    pub retry_delay: Duration,
    /// The minimum deployer balance, in wei
    pub min_balance: U256,
    /// The file recording deployed addresses
    pub deployments_path: PathBuf,
}

impl DeployConfig {
    /// The default configuration for `network`
    pub fn for_network(network: Network) -> Self {
        Self {
            rpc_urls: network.rpc_urls(),
            chain_id: network.chain_id(),
            private_key_env_var: DEFAULT_PRIVATE_KEY_ENV_VAR.to_string(),
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            gas: GasOverrides::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            // The default is a valid decimal literal
            min_balance: parse_ether_amount(DEFAULT_MIN_BALANCE_ETHER).unwrap_or_default(),
            deployments_path: PathBuf::from(DEFAULT_DEPLOYMENTS_PATH),
        }
    }

    /// The retry policy for deployment broadcasts and receipt polling
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            delay: self.retry_delay,
            ..RetryPolicy::default()
        }
    }
}

/// Parse a decimal ether amount, e.g. `0.00001`, into wei
pub fn parse_ether_amount(amount: &str) -> Result<U256, String> {
    parse_ether(amount.trim()).map_err(|e| format!("invalid ether amount `{amount}`: {e}"))
}
