//! Type definitions used throughout the scripts

use std::fmt::{self, Display};

use alloy::primitives::{Address, Bytes, TxHash, B256};
use clap::ValueEnum;

use crate::constants::{
    DIRECT_LISTINGS_CONTRACT_NAME, DIRECT_LISTINGS_DISPLAY_NAME, DIRECT_LISTINGS_EXTENSION_KEY,
    MARKETPLACE_CONTRACT_NAME, OFFERS_CONTRACT_NAME, OFFERS_DISPLAY_NAME, OFFERS_EXTENSION_KEY,
};

/// The contracts managed by the scripts
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum MarketplaceContract {
    /// The marketplace contract
    Marketplace,
    /// The offers extension
    Offers,
    /// The direct listings extension
    DirectListings,
}

impl MarketplaceContract {
    /// The name of the contract's compilation artifact
    pub fn artifact_name(&self) -> &'static str {
        match self {
            MarketplaceContract::Marketplace => MARKETPLACE_CONTRACT_NAME,
            MarketplaceContract::Offers => OFFERS_CONTRACT_NAME,
            MarketplaceContract::DirectListings => DIRECT_LISTINGS_CONTRACT_NAME,
        }
    }

    /// The key hashed into the extension ID and the display name under which
    /// the contract is registered, if it is an extension
    pub fn extension_registration(&self) -> Option<(&'static str, &'static str)> {
        match self {
            MarketplaceContract::Marketplace => None,
            MarketplaceContract::Offers => Some((OFFERS_EXTENSION_KEY, OFFERS_DISPLAY_NAME)),
            MarketplaceContract::DirectListings => {
                Some((DIRECT_LISTINGS_EXTENSION_KEY, DIRECT_LISTINGS_DISPLAY_NAME))
            }
        }
    }
}

impl Display for MarketplaceContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketplaceContract::Marketplace => write!(f, "marketplace"),
            MarketplaceContract::Offers => write!(f, "offers"),
            MarketplaceContract::DirectListings => write!(f, "direct-listings"),
        }
    }
}

/// An RPC endpoint selected by probing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainEndpoint {
    /// The URL of the endpoint
    pub url: String,
    /// The chain ID the endpoint reported
    pub chain_id: u64,
    /// Whether the reported chain ID is the expected one
    pub chain_id_matches: bool,
}

/// Gas parameters overriding the client's own estimation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GasOverrides {
    /// The gas limit of the transaction
    pub gas_limit: Option<u64>,
    /// The EIP-1559 max fee per gas, in wei
    pub max_fee_per_gas: Option<u128>,
    /// The EIP-1559 max priority fee per gas, in wei
    pub max_priority_fee_per_gas: Option<u128>,
}

/// A transaction to be signed and broadcast by the chain client
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionPlan {
    /// The recipient, or `None` for a contract creation
    pub to: Option<Address>,
    /// The calldata, or the init code for a contract creation
    pub input: Bytes,
    /// Gas parameter overrides
    pub gas: GasOverrides,
}

impl TransactionPlan {
    /// A contract creation transaction
    pub fn deploy(init_code: Bytes, gas: GasOverrides) -> Self {
        Self {
            to: None,
            input: init_code,
            gas,
        }
    }

    /// A call to an existing contract
    pub fn call(to: Address, calldata: Bytes, gas: GasOverrides) -> Self {
        Self {
            to: Some(to),
            input: calldata,
            gas,
        }
    }

    /// Whether this transaction creates a contract
    pub fn is_deployment(&self) -> bool {
        self.to.is_none()
    }
}

/// The receipt of a mined transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmedTx {
    /// The transaction hash
    pub tx_hash: TxHash,
    /// The block the transaction was included in
    pub block_number: Option<u64>,
    /// The gas consumed by the transaction
    pub gas_used: Option<u128>,
    /// The address of the contract created by the transaction, if any
    pub contract_address: Option<Address>,
    /// Whether the transaction executed successfully
    pub success: bool,
}

/// Inclusion details of a deployment transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeploymentInfo {
    /// The deployment transaction hash
    pub tx_hash: TxHash,
    /// The block the deployment was included in
    pub block_number: Option<u64>,
    /// The gas consumed by the deployment
    pub gas_used: Option<u128>,
}

/// A live binding to a contract on chain
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployedContract {
    /// The name of the contract
    pub name: String,
    /// The address of the contract
    pub address: Address,
    /// Inclusion details, if the contract was deployed during this run
    pub deployment: Option<DeploymentInfo>,
}

impl DeployedContract {
    /// Bind to a contract deployed in an earlier run
    pub fn at(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            address,
            deployment: None,
        }
    }
}

impl Display for DeployedContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#x}", self.name, self.address)?;
        if let Some(info) = &self.deployment {
            let block = info.block_number.map_or("n/a".to_string(), |b| b.to_string());
            let gas = info.gas_used.map_or("n/a".to_string(), |g| g.to_string());
            write!(f, " (block {}, gas used {})", block, gas)?;
        }
        Ok(())
    }
}

/// An extension registered in the marketplace
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionRecord {
    /// The extension ID, the keccak256 hash of a human-readable name
    pub id: B256,
    /// The address the extension routes to
    pub address: Address,
    /// Whether the extension is enabled
    pub enabled: bool,
    /// The display name of the extension
    pub name: String,
}

impl Display for ExtensionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.enabled { "enabled" } else { "disabled" };
        write!(f, "{} -> {:#x} ({}) - {}", self.id, self.address, status, self.name)
    }
}

/// The outcome of an idempotent extension registration
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The extension was already registered at the same address
    Unchanged,
    /// The extension was registered for the first time
    Registered(ConfirmedTx),
    /// A registration pointing elsewhere was replaced
    Overwritten {
        /// The address previously registered under the ID
        previous: Address,
        /// The receipt of the registration transaction
        receipt: ConfirmedTx,
    },
}

/// The lifecycle of a single contract deployment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeploymentStage {
    /// Nothing has been sent yet
    NotDeployed,
    /// The creation transaction is being broadcast
    Broadcasting {
        /// The 1-based broadcast attempt
        attempt: usize,
    },
    /// The creation transaction was broadcast and is awaiting inclusion
    Confirming,
    /// The creation transaction was mined
    Deployed,
    /// The contract is being registered as an extension
    Registering,
    /// The contract is registered as an extension
    Linked,
    /// Post-deployment getters behaved as expected
    Verified,
    /// The artifact or the deployer funds were unusable
    FailedPreflight,
    /// Every broadcast attempt failed
    FailedBroadcast,
    /// The contract is live but its getters misbehave
    FailedVerification,
}

impl DeploymentStage {
    /// Whether the stage is a failure state
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            DeploymentStage::FailedPreflight
                | DeploymentStage::FailedBroadcast
                | DeploymentStage::FailedVerification
        )
    }
}

impl Display for DeploymentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentStage::NotDeployed => write!(f, "not deployed"),
            DeploymentStage::Broadcasting { attempt } => write!(f, "broadcasting (#{attempt})"),
            DeploymentStage::Confirming => write!(f, "confirming"),
            DeploymentStage::Deployed => write!(f, "deployed"),
            DeploymentStage::Registering => write!(f, "registering"),
            DeploymentStage::Linked => write!(f, "linked"),
            DeploymentStage::Verified => write!(f, "verified"),
            DeploymentStage::FailedPreflight => write!(f, "failed preflight"),
            DeploymentStage::FailedBroadcast => write!(f, "failed broadcast"),
            DeploymentStage::FailedVerification => write!(f, "failed verification"),
        }
    }
}

/// The result of a single verification read
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldResult {
    /// The getter that was read
    pub field: String,
    /// Whether the read succeeded and satisfied its expectation
    pub passed: bool,
    /// The value read, or the reason the check failed
    pub detail: String,
}

impl FieldResult {
    /// A check that passed, with the value read
    pub fn pass(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            passed: true,
            detail: detail.into(),
        }
    }

    /// A check that failed, with the reason
    pub fn fail(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            passed: false,
            detail: reason.into(),
        }
    }
}

/// The per-field outcome of verifying a contract
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationReport {
    /// The name of the verified contract
    pub contract: String,
    /// The address of the verified contract
    pub address: Address,
    /// The result of each check, in execution order
    pub fields: Vec<FieldResult>,
}

impl VerificationReport {
    /// Whether every check passed
    pub fn passed(&self) -> bool {
        self.fields.iter().all(|f| f.passed)
    }

    /// The checks that failed
    pub fn failures(&self) -> impl Iterator<Item = &FieldResult> {
        self.fields.iter().filter(|f| !f.passed)
    }
}

impl Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} at {:#x}", self.contract, self.address)?;
        for field in &self.fields {
            let mark = if field.passed { "ok" } else { "FAIL" };
            writeln!(f, "  [{mark}] {}: {}", field.field, field.detail)?;
        }
        Ok(())
    }
}
