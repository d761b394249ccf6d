use std::{fs, path::Path, sync::Once, time::Duration};

use alloy::primitives::{address, hex, Address};
use eyre::Result;
use scripts::{
    artifact::{artifact_path, load_named_artifact},
    config::{DeployConfig, Network},
    constants::{DIRECT_LISTINGS_CONTRACT_NAME, MARKETPLACE_CONTRACT_NAME, OFFERS_CONTRACT_NAME},
    orchestrator::{Orchestrator, RetryPolicy},
    types::{ChainEndpoint, DeployedContract, GasOverrides},
    utils::{
        direct_listings_constructor_args, marketplace_constructor_args, offers_constructor_args,
    },
};
use tracing_subscriber::{fmt, EnvFilter};

use crate::mock_chain::{
    MockChain, DIRECT_LISTINGS_BYTECODE, MARKETPLACE_BYTECODE, MOCK_CHAIN_ID, OFFERS_BYTECODE,
};

// ---------------------
// | META TEST HELPERS |
// ---------------------

/// The first default Anvil account, used as the deployer
pub const DEPLOYER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

/// The second default Anvil account
pub const OTHER_ACCOUNT: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");

/// The wrapped native token passed to the constructors
pub const NATIVE_TOKEN_WRAPPER: Address = address!("5555555555555555555555555555555555555555");

/// The platform fee passed to the marketplace constructor
pub const PLATFORM_FEE_BPS: u16 = 100;

/// The number of broadcast attempts the test orchestrators make
pub const TEST_MAX_ATTEMPTS: usize = 3;

/// A minimal ABI shared by the test artifacts
const TEST_ABI: &str = r#"[
    {"type":"constructor","inputs":[{"name":"_defaultAdmin","type":"address","internalType":"address"}],"stateMutability":"nonpayable"},
    {"type":"function","name":"hasRole","inputs":[{"name":"role","type":"bytes32","internalType":"bytes32"},{"name":"account","type":"address","internalType":"address"}],"outputs":[{"name":"","type":"bool","internalType":"bool"}],"stateMutability":"view"}
]"#;

static TRACING_INIT: Once = Once::new();

/// Set up logging once per test binary, filtered by `RUST_LOG`
pub fn global_setup() {
    TRACING_INIT.call_once(|| {
        fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

/// An orchestrator over a fresh mock chain, retrying without delay
pub fn setup_orchestrator() -> Orchestrator<MockChain> {
    global_setup();
    let retry = RetryPolicy {
        max_attempts: TEST_MAX_ATTEMPTS,
        delay: Duration::ZERO,
        poll_interval: Duration::ZERO,
        ..RetryPolicy::default()
    };
    Orchestrator::new(MockChain::new(DEPLOYER), retry, GasOverrides::default())
}

/// The endpoint the mock chain stands in for
pub fn test_endpoint() -> ChainEndpoint {
    ChainEndpoint {
        url: "http://localhost:8545".to_string(),
        chain_id: MOCK_CHAIN_ID,
        chain_id_matches: true,
    }
}

/// A configuration reading artifacts from and recording deployments in `dir`
pub fn test_config(dir: &Path) -> DeployConfig {
    DeployConfig {
        artifact_dir: dir.join("artifacts_forge"),
        deployments_path: dir.join("deployments.json"),
        rpc_urls: vec![test_endpoint().url],
        chain_id: MOCK_CHAIN_ID,
        max_retries: TEST_MAX_ATTEMPTS,
        retry_delay: Duration::ZERO,
        ..DeployConfig::for_network(Network::Testnet)
    }
}

// --------------------
// | ARTIFACT HELPERS |
// --------------------

/// Write forge-style artifacts for the three contracts under `artifact_dir`
pub fn write_artifacts(artifact_dir: &Path) -> Result<()> {
    let artifacts = [
        (MARKETPLACE_CONTRACT_NAME, MARKETPLACE_BYTECODE),
        (OFFERS_CONTRACT_NAME, OFFERS_BYTECODE),
        (DIRECT_LISTINGS_CONTRACT_NAME, DIRECT_LISTINGS_BYTECODE),
    ];

    for (name, bytecode) in artifacts {
        let path = artifact_path(artifact_dir, name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = format!(
            r#"{{"abi": {TEST_ABI}, "bytecode": {{"object": "{}"}}}}"#,
            hex::encode_prefixed(bytecode)
        );
        fs::write(path, contents)?;
    }

    Ok(())
}

// ----------------------
// | DEPLOYMENT HELPERS |
// ----------------------

/// Deploy the marketplace with the deployer as admin
pub async fn deploy_marketplace(
    orchestrator: &mut Orchestrator<MockChain>,
    artifact_dir: &Path,
) -> Result<DeployedContract> {
    let artifact = load_named_artifact(artifact_dir, MARKETPLACE_CONTRACT_NAME)?;
    let args = marketplace_constructor_args(
        DEPLOYER,
        PLATFORM_FEE_BPS,
        DEPLOYER,
        Address::ZERO,
        NATIVE_TOKEN_WRAPPER,
    );
    let contract = orchestrator
        .deploy_with_retry(&artifact, &args, GasOverrides::default(), TEST_MAX_ATTEMPTS)
        .await?;
    Ok(contract)
}

/// Deploy the offers extension with the deployer as admin
pub async fn deploy_offers(
    orchestrator: &mut Orchestrator<MockChain>,
    artifact_dir: &Path,
) -> Result<DeployedContract> {
    let artifact = load_named_artifact(artifact_dir, OFFERS_CONTRACT_NAME)?;
    let args = offers_constructor_args(DEPLOYER);
    let contract = orchestrator
        .deploy_with_retry(&artifact, &args, GasOverrides::default(), TEST_MAX_ATTEMPTS)
        .await?;
    Ok(contract)
}

/// Deploy the direct listings extension with the deployer as admin
pub async fn deploy_direct_listings(
    orchestrator: &mut Orchestrator<MockChain>,
    artifact_dir: &Path,
) -> Result<DeployedContract> {
    let artifact = load_named_artifact(artifact_dir, DIRECT_LISTINGS_CONTRACT_NAME)?;
    let args = direct_listings_constructor_args(NATIVE_TOKEN_WRAPPER, DEPLOYER);
    let contract = orchestrator
        .deploy_with_retry(&artifact, &args, GasOverrides::default(), TEST_MAX_ATTEMPTS)
        .await?;
    Ok(contract)
}
