//! Constants used in the deployment scripts

use std::time::Duration;

use alloy::primitives::{address, Address};

/// The chain ID of HyperEVM mainnet
pub const MAINNET_CHAIN_ID: u64 = 999;

/// The chain ID of HyperEVM testnet
pub const TESTNET_CHAIN_ID: u64 = 998;

/// Public RPC endpoints serving HyperEVM mainnet, in order of preference
pub const MAINNET_RPC_URLS: &[&str] = &["https://999.rpc.thirdweb.com"];

/// Public RPC endpoints serving HyperEVM testnet, in order of preference
pub const TESTNET_RPC_URLS: &[&str] = &[
    "https://rpc.hyperliquid-testnet.xyz/evm",
    "https://998.rpc.thirdweb.com",
    "https://rpc.ankr.com/hyperevm_testnet",
    "https://testnet-rpc.hyperevm.com",
    "https://hyperevm-testnet.public.blastapi.io",
];

/// The environment variable from which RPC URLs are read
pub const RPC_URL_ENV_VAR: &str = "HYPEREVM_RPC_URL";

/// The default environment variable holding the deployer's private key
pub const DEFAULT_PRIVATE_KEY_ENV_VAR: &str = "PRIVATE_KEY";

/// The default directory containing forge compilation artifacts
pub const DEFAULT_ARTIFACT_DIR: &str = "./artifacts_forge";

/// The default path of the deployments file
pub const DEFAULT_DEPLOYMENTS_PATH: &str = "deployments.json";

/// The default minimum deployer balance, in ether
pub const DEFAULT_MIN_BALANCE_ETHER: &str = "0.00001";

/// The default number of broadcast attempts for a deployment
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// The default delay between broadcast attempts, in seconds
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 3;

/// The number of chain ID queries made against a single endpoint before moving on
pub const ENDPOINT_ATTEMPTS: usize = 2;

/// The maximum time a single endpoint probe may take
pub const ENDPOINT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// The interval at which a transaction receipt is polled
pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The number of receipt polls before giving up on a transaction
pub const RECEIPT_POLL_ATTEMPTS: usize = 120;

/// The name of the marketplace contract artifact
pub const MARKETPLACE_CONTRACT_NAME: &str = "MarketplaceV3";

/// The name of the offers extension artifact
pub const OFFERS_CONTRACT_NAME: &str = "Offers";

/// The name of the direct listings extension artifact
pub const DIRECT_LISTINGS_CONTRACT_NAME: &str = "DirectListingsExtension";

/// The human-readable name hashed into the offers extension ID
pub const OFFERS_EXTENSION_KEY: &str = "OFFERS";

/// The human-readable name hashed into the direct listings extension ID
pub const DIRECT_LISTINGS_EXTENSION_KEY: &str = "DIRECT_LISTINGS";

/// The display name under which the offers extension is registered
pub const OFFERS_DISPLAY_NAME: &str = "Offers Extension";

/// The display name under which the direct listings extension is registered
pub const DIRECT_LISTINGS_DISPLAY_NAME: &str = "Direct Listings Extension";

/// The default native token wrapper passed to the marketplace constructor
pub const DEFAULT_NATIVE_TOKEN_WRAPPER: Address =
    address!("5555555555555555555555555555555555555555");

/// The default platform fee, in basis points
pub const DEFAULT_PLATFORM_FEE_BPS: u16 = 100;

/// The environment variable holding the marketplace address
pub const MARKETPLACE_ADDRESS_ENV_VAR: &str = "MARKETPLACE_ADDRESS";

/// The environment variable holding the offers extension address
pub const OFFERS_ADDRESS_ENV_VAR: &str = "OFFERS_ADDRESS";

/// The environment variable holding the direct listings extension address
pub const DIRECT_LISTINGS_ADDRESS_ENV_VAR: &str = "DIRECTLISTINGS_ADDRESS";
