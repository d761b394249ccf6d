//! The chain client used by the orchestrator, and its alloy-backed implementation

use std::{
    env,
    fmt::{self, Display},
    str::FromStr,
};

use alloy::{
    network::{Ethereum, TransactionBuilder},
    primitives::{Address, Bytes, TxHash, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::{TransactionReceipt, TransactionRequest},
    signers::local::PrivateKeySigner,
    transports::{http::reqwest::Url, RpcError, TransportError},
};
use tracing::debug;

use crate::{
    constants::ENDPOINT_PROBE_TIMEOUT,
    errors::ScriptError,
    types::{ConfirmedTx, TransactionPlan},
};

/// Node error messages that indicate a condition which may clear on retry
const TRANSIENT_NODE_ERRORS: [&str; 11] = [
    "nonce too low",
    "nonce too high",
    "replacement transaction underpriced",
    "already known",
    "timeout",
    "timed out",
    "rate limit",
    "too many requests",
    "header not found",
    "temporarily unavailable",
    "connection",
];

/// Node error messages that indicate the sender cannot pay for the transaction
const INSUFFICIENT_FUNDS_ERRORS: [&str; 2] = ["insufficient funds", "insufficient balance"];

/// How a chain client failure should be handled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// A transport or node condition that may clear on retry
    Transient,
    /// The sender cannot pay for the transaction
    InsufficientFunds,
    /// The node rejected the request and will reject it again
    Rejected,
}

/// A failure reported by the chain client
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientError {
    /// The failure category
    pub kind: FailureKind,
    /// The underlying error message
    pub message: String,
}

impl ClientError {
    /// A failure that may clear on retry
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    /// A failure that will repeat on retry
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Rejected,
            message: message.into(),
        }
    }

    /// A failure caused by the sender's balance
    pub fn insufficient_funds(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::InsufficientFunds,
            message: message.into(),
        }
    }

    /// Classify an error message returned by a node
    pub fn from_node_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        let kind = if INSUFFICIENT_FUNDS_ERRORS.iter().any(|m| lower.contains(m)) {
            FailureKind::InsufficientFunds
        } else if TRANSIENT_NODE_ERRORS.iter().any(|m| lower.contains(m)) {
            FailureKind::Transient
        } else {
            FailureKind::Rejected
        };

        Self { kind, message }
    }

    /// Whether the failed operation may be retried
    pub fn is_retryable(&self) -> bool {
        self.kind == FailureKind::Transient
    }
}

impl Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ClientError {}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err {
            RpcError::ErrorResp(payload) => Self::from_node_message(payload.message.to_string()),
            RpcError::LocalUsageError(e) => Self::rejected(e.to_string()),
            other => Self::transient(other.to_string()),
        }
    }
}

/// The network operations the orchestrator depends on.
///
/// Every method is a single round trip; the orchestrator never has two of
/// them in flight at once.
#[allow(async_fn_in_trait)]
pub trait ChainClient {
    /// The address that signs every transaction
    fn sender(&self) -> Address;

    /// Query the chain ID served by the endpoint
    async fn chain_id(&self) -> Result<u64, ClientError>;

    /// Query the native balance of an account
    async fn balance(&self, account: Address) -> Result<U256, ClientError>;

    /// Query the code deployed at an address
    async fn code_at(&self, address: Address) -> Result<Bytes, ClientError>;

    /// Execute a read-only call and return the raw return data
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, ClientError>;

    /// Simulate a transaction from the signer and return its gas estimate. A
    /// transaction that would revert fails with a rejection.
    async fn estimate_gas(&self, tx: TransactionPlan) -> Result<u64, ClientError>;

    /// Sign and broadcast a transaction, returning its hash
    async fn send_transaction(&self, tx: TransactionPlan) -> Result<TxHash, ClientError>;

    /// Query the receipt of a transaction, `None` while it is not yet mined
    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<ConfirmedTx>, ClientError>;
}

/// A chain client signing with a local private key over HTTP JSON-RPC
#[derive(Clone)]
pub struct RpcClient {
    /// The provider, with the signer's wallet attached
    provider: DynProvider<Ethereum>,
    /// The signer's address
    sender: Address,
}

impl RpcClient {
    /// Create a client for `rpc_url` signing with `signer`
    pub fn new(rpc_url: &str, signer: PrivateKeySigner) -> Result<Self, ScriptError> {
        let url =
            Url::parse(rpc_url).map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
        let sender = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(signer)
            .with_simple_nonce_management()
            .connect_http(url);

        Ok(Self {
            provider: DynProvider::new(provider),
            sender,
        })
    }

    /// Build the RPC request for a planned transaction
    fn request(&self, tx: TransactionPlan) -> TransactionRequest {
        let mut request = TransactionRequest::default().with_from(self.sender);
        request = match tx.to {
            Some(to) => request.with_to(to).with_input(tx.input),
            None => request.with_deploy_code(tx.input),
        };
        if let Some(gas_limit) = tx.gas.gas_limit {
            request = request.with_gas_limit(gas_limit);
        }
        if let Some(max_fee) = tx.gas.max_fee_per_gas {
            request = request.with_max_fee_per_gas(max_fee);
        }
        if let Some(priority_fee) = tx.gas.max_priority_fee_per_gas {
            request = request.with_max_priority_fee_per_gas(priority_fee);
        }

        request
    }
}

impl ChainClient for RpcClient {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn chain_id(&self) -> Result<u64, ClientError> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn balance(&self, account: Address) -> Result<U256, ClientError> {
        Ok(self.provider.get_balance(account).await?)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, ClientError> {
        Ok(self.provider.get_code_at(address).await?)
    }

    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, ClientError> {
        let request = TransactionRequest::default()
            .with_from(self.sender)
            .with_to(to)
            .with_input(calldata);
        Ok(self.provider.call(request).await?)
    }

    async fn estimate_gas(&self, tx: TransactionPlan) -> Result<u64, ClientError> {
        let request = self.request(tx);
        Ok(self.provider.estimate_gas(request).await?)
    }

    async fn send_transaction(&self, tx: TransactionPlan) -> Result<TxHash, ClientError> {
        let request = self.request(tx);
        let pending = self.provider.send_transaction(request).await?;
        let tx_hash = *pending.tx_hash();
        debug!("broadcast transaction {tx_hash}");

        Ok(tx_hash)
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<ConfirmedTx>, ClientError> {
        let receipt = self.provider.get_transaction_receipt(tx_hash).await?;
        Ok(receipt.as_ref().map(confirmed_tx))
    }
}

/// Convert an RPC receipt into the client's receipt type
fn confirmed_tx(receipt: &TransactionReceipt) -> ConfirmedTx {
    ConfirmedTx {
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        gas_used: Some(u128::from(receipt.gas_used)),
        contract_address: receipt.contract_address,
        success: receipt.status(),
    }
}

/// Query the chain ID served by `rpc_url` without a signer attached,
/// giving up after [`ENDPOINT_PROBE_TIMEOUT`]
pub async fn query_chain_id(rpc_url: &str) -> Result<u64, ClientError> {
    let url = Url::parse(rpc_url).map_err(|e| ClientError::rejected(e.to_string()))?;
    let provider = ProviderBuilder::new().connect_http(url);

    match tokio::time::timeout(ENDPOINT_PROBE_TIMEOUT, provider.get_chain_id()).await {
        Ok(res) => Ok(res?),
        Err(_) => Err(ClientError::transient(format!(
            "no response within {}s",
            ENDPOINT_PROBE_TIMEOUT.as_secs()
        ))),
    }
}

/// Read the deployer's private key from the environment variable `env_var`
pub fn load_signer(env_var: &str) -> Result<PrivateKeySigner, ScriptError> {
    let key = env::var(env_var)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ScriptError::MissingCredential(env_var.to_string()))?;

    parse_signer(&key, env_var)
}

/// Parse a hex private key, with or without the `0x` prefix
fn parse_signer(key: &str, env_var: &str) -> Result<PrivateKeySigner, ScriptError> {
    PrivateKeySigner::from_str(key.trim())
        .map_err(|_| ScriptError::InvalidCredential(env_var.to_string()))
}
