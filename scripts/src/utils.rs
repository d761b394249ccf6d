//! Utilities for the deploy scripts.

use std::{collections::BTreeMap, fs, io::ErrorKind, path::Path};

use alloy::{
    primitives::{keccak256, Address, B256},
    sol_types::SolValue,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::{
    client::{load_signer, query_chain_id, ChainClient, RpcClient},
    config::DeployConfig,
    constants::ENDPOINT_ATTEMPTS,
    endpoint::probe_endpoints,
    errors::ScriptError,
    types::{ChainEndpoint, DeployedContract},
};

/// The contents of the deployments file
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentsFile {
    /// The chain the addresses were deployed to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// The endpoint the last deployment went through
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    /// Deployed addresses, by contract name
    #[serde(default)]
    pub deployments: BTreeMap<String, Address>,
    /// Keys written by other tools, preserved on rewrite
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Sets up the chain client, reading the private key from the environment and
/// selecting the first endpoint that serves the configured chain
pub async fn setup_client(
    config: &DeployConfig,
) -> Result<(RpcClient, ChainEndpoint), ScriptError> {
    let signer = load_signer(&config.private_key_env_var)?;

    let endpoint =
        probe_endpoints(&config.rpc_urls, config.chain_id, ENDPOINT_ATTEMPTS, |url| async move {
            query_chain_id(&url).await
        })
        .await?;

    let client = RpcClient::new(&endpoint.url, signer)?;
    info!("signing as {:#x} on chain {}", client.sender(), endpoint.chain_id);

    Ok((client, endpoint))
}

/// Read the deployments file, treating a missing file as empty
pub fn read_deployments(file_path: &Path) -> Result<DeploymentsFile, ScriptError> {
    let contents = match fs::read_to_string(file_path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(DeploymentsFile::default()),
        Err(e) => return Err(ScriptError::ReadDeployments(e.to_string())),
    };

    serde_json::from_str(&contents)
        .map_err(|e| ScriptError::ReadDeployments(format!("{}: {e}", file_path.display())))
}

/// Look up the address recorded for `contract_name`
pub fn parse_addr_from_deployments_file(
    file_path: &Path,
    contract_name: &str,
) -> Result<Option<Address>, ScriptError> {
    Ok(read_deployments(file_path)?.deployments.get(contract_name).copied())
}

/// Record the address of a deployed contract, along with the chain it lives on
pub fn write_deployed_address(
    file_path: &Path,
    endpoint: &ChainEndpoint,
    contract: &DeployedContract,
) -> Result<(), ScriptError> {
    let mut deployments = read_deployments(file_path)?;
    if deployments.chain_id.is_some_and(|id| id != endpoint.chain_id) {
        warn!(
            "{} records chain {:?}, overwriting with chain {}",
            file_path.display(),
            deployments.chain_id,
            endpoint.chain_id
        );
    }

    deployments.chain_id = Some(endpoint.chain_id);
    deployments.rpc_url = Some(endpoint.url.clone());
    deployments.deployments.insert(contract.name.clone(), contract.address);

    let contents = serde_json::to_string_pretty(&deployments)
        .map_err(|e| ScriptError::WriteDeployments(e.to_string()))?;
    fs::write(file_path, contents).map_err(|e| ScriptError::WriteDeployments(e.to_string()))?;

    info!("recorded {} at {:#x} in {}", contract.name, contract.address, file_path.display());
    Ok(())
}

/// Bind to a contract, preferring an explicitly configured address over the
/// deployments file
pub fn resolve_contract(
    contract_name: &str,
    configured: Option<Address>,
    deployments_path: &Path,
) -> Result<DeployedContract, ScriptError> {
    let address = match configured {
        Some(address) => address,
        None => parse_addr_from_deployments_file(deployments_path, contract_name)?
            .ok_or_else(|| ScriptError::MissingAddress(contract_name.to_string()))?,
    };

    Ok(DeployedContract::at(contract_name, address))
}

/// Like [`resolve_contract`], but an unknown address is not an error
pub fn try_resolve_contract(
    contract_name: &str,
    configured: Option<Address>,
    deployments_path: &Path,
) -> Result<Option<DeployedContract>, ScriptError> {
    match resolve_contract(contract_name, configured, deployments_path) {
        Ok(contract) => Ok(Some(contract)),
        Err(ScriptError::MissingAddress(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// The ID under which an extension is registered: the keccak256 hash of its
/// human-readable key
pub fn extension_id(key: &str) -> B256 {
    keccak256(key.as_bytes())
}

/// ABI-encode the marketplace constructor arguments
pub fn marketplace_constructor_args(
    admin: Address,
    platform_fee_bps: u16,
    fee_recipient: Address,
    royalty_engine: Address,
    native_token_wrapper: Address,
) -> Vec<u8> {
    (admin, platform_fee_bps, fee_recipient, royalty_engine, native_token_wrapper)
        .abi_encode_params()
}

/// ABI-encode the offers extension constructor arguments
pub fn offers_constructor_args(admin: Address) -> Vec<u8> {
    (admin,).abi_encode_params()
}

/// ABI-encode the direct listings extension constructor arguments
pub fn direct_listings_constructor_args(
    native_token_wrapper: Address,
    admin: Address,
) -> Vec<u8> {
    (native_token_wrapper, admin).abi_encode_params()
}
