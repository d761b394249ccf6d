//! Definitions of errors that can occur during the execution of the deployment scripts

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

use alloy::primitives::{Address, B256};

/// Errors that can occur during the execution of the deployment scripts
#[derive(Debug)]
pub enum ScriptError {
    /// The environment variable holding the deployer key is not set
    MissingCredential(String),
    /// The environment variable holding the deployer key could not be parsed
    InvalidCredential(String),
    /// The compilation artifact does not exist on disk
    ArtifactNotFound(String),
    /// The compilation artifact is not a valid ABI + bytecode bundle
    ArtifactMalformed(String),
    /// The deployer balance is below the configured minimum
    InsufficientFunds(String),
    /// None of the candidate RPC endpoints served the expected chain
    NoReachableEndpoint(String),
    /// A contract address was neither configured nor recorded in the deployments file
    MissingAddress(String),
    /// Error initializing the RPC client
    ClientInitialization(String),
    /// Error deploying a contract
    ContractDeployment(String),
    /// Error calling a contract method
    ContractInteraction(String),
    /// The account does not hold the role required for a privileged call
    Unauthorized {
        /// The role that was checked
        role: B256,
        /// The account that lacks the role
        account: Address,
    },
    /// A dry run of a privileged call reverted, so it was not sent
    SimulationReverted(String),
    /// Error reading the deployments file
    ReadDeployments(String),
    /// Error writing the deployments file
    WriteDeployments(String),
    /// The operator declined to proceed
    Aborted,
}

impl ScriptError {
    /// Whether the error aborts the whole run. Missing roles and reverting
    /// dry runs only skip the action, as nothing was sent.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ScriptError::Unauthorized { .. } | ScriptError::SimulationReverted(_)
        )
    }

    /// A suggested fix to print alongside the error, if one is known
    pub fn remedy(&self) -> Option<String> {
        match self {
            ScriptError::MissingCredential(var) => {
                Some(format!("set the credential with `export {var}=<hex private key>`"))
            }
            ScriptError::InvalidCredential(var) => {
                Some(format!("check that `{var}` holds a 32 byte hex private key"))
            }
            ScriptError::ArtifactNotFound(_) | ScriptError::ArtifactMalformed(_) => {
                Some("rebuild the contracts with `forge build` and check `--artifacts`".to_string())
            }
            ScriptError::InsufficientFunds(_) => {
                Some("fund the deployer account or lower `--min-balance`".to_string())
            }
            ScriptError::NoReachableEndpoint(_) => Some(
                "retry later, pass another endpoint with `--rpc-url`, or check `--chain-id`"
                    .to_string(),
            ),
            ScriptError::MissingAddress(name) => Some(format!(
                "pass the {name} address on the command line or deploy it first"
            )),
            ScriptError::Unauthorized { .. } => {
                Some("ask the contract administrator to grant the role".to_string())
            }
            ScriptError::SimulationReverted(_) => {
                Some("inspect the marketplace state with `diagnose`".to_string())
            }
            _ => None,
        }
    }
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::MissingCredential(var) => {
                write!(f, "environment variable `{}` is not set", var)
            }
            ScriptError::InvalidCredential(var) => {
                write!(f, "environment variable `{}` does not hold a valid private key", var)
            }
            ScriptError::ArtifactNotFound(s) => write!(f, "artifact not found: {}", s),
            ScriptError::ArtifactMalformed(s) => write!(f, "malformed artifact: {}", s),
            ScriptError::InsufficientFunds(s) => write!(f, "insufficient funds: {}", s),
            ScriptError::NoReachableEndpoint(s) => write!(f, "no reachable endpoint: {}", s),
            ScriptError::MissingAddress(s) => write!(f, "no address configured for {}", s),
            ScriptError::ClientInitialization(s) => write!(f, "error initializing client: {}", s),
            ScriptError::ContractDeployment(s) => write!(f, "error deploying contract: {}", s),
            ScriptError::ContractInteraction(s) => {
                write!(f, "error interacting with contract: {}", s)
            }
            ScriptError::Unauthorized { role, account } => {
                write!(f, "account {:#x} does not hold role {}", account, role)
            }
            ScriptError::SimulationReverted(s) => write!(f, "dry run reverted: {}", s),
            ScriptError::ReadDeployments(s) => write!(f, "error reading deployments: {}", s),
            ScriptError::WriteDeployments(s) => write!(f, "error writing deployments: {}", s),
            ScriptError::Aborted => write!(f, "operation cancelled"),
        }
    }
}

impl Error for ScriptError {}
