//! An in-memory chain hosting mock marketplace contracts, driven through the
//! same client interface as a live endpoint

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Mutex, MutexGuard},
};

use alloy::{
    primitives::{keccak256, Address, Bytes, TxHash, B256, U256},
    sol_types::{SolCall, SolInterface, SolValue},
};
use scripts::{
    client::{ChainClient, ClientError},
    solidity::{
        IDirectListings::{self, IDirectListingsCalls},
        IMarketplace::{self, IMarketplaceCalls},
        IOffers::{self, IOffersCalls},
    },
    types::{ConfirmedTx, TransactionPlan},
};

/// The creation bytecode standing in for the marketplace
pub const MARKETPLACE_BYTECODE: [u8; 3] = [0x60, 0x80, 0x01];
/// The creation bytecode standing in for the offers extension
pub const OFFERS_BYTECODE: [u8; 3] = [0x60, 0x80, 0x02];
/// The creation bytecode standing in for the direct listings extension
pub const DIRECT_LISTINGS_BYTECODE: [u8; 3] = [0x60, 0x80, 0x03];

/// The chain ID served by the mock
pub const MOCK_CHAIN_ID: u64 = 998;
/// The gas charged for every transaction
pub const MOCK_GAS_USED: u128 = 21_000;
/// The gas estimate returned for every transaction that would succeed
pub const MOCK_GAS_ESTIMATE: u64 = 21_000;

/// The marketplace's `EXTENSION_ROLE`
pub fn extension_role() -> B256 {
    keccak256("EXTENSION_ROLE")
}

/// A registered extension
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockExtension {
    /// The extension ID
    pub id: B256,
    /// The routed address
    pub address: Address,
    /// Whether routing is enabled
    pub enabled: bool,
    /// The display name
    pub name: String,
}

/// The state of a mock marketplace
#[derive(Clone, Debug, Default)]
pub struct MockMarketplace {
    /// Granted `(role, account)` pairs
    pub roles: HashSet<(B256, Address)>,
    /// Registered extensions, in registration order
    pub extensions: Vec<MockExtension>,
    /// The platform fee in basis points
    pub platform_fee_bps: u16,
    /// The platform fee recipient
    pub fee_recipient: Address,
    /// The wrapped native token
    pub native_token_wrapper: Address,
}

impl MockMarketplace {
    /// Whether `account` holds `role`
    fn has_role(&self, role: B256, account: Address) -> bool {
        self.roles.contains(&(role, account))
    }

    /// Revert unless `account` holds `role`
    fn require_role(&self, role: B256, account: Address) -> Result<(), String> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            Err(format!("AccessControl: account {account:#x} is missing role {role}"))
        }
    }

    /// The extension registered under `id`
    fn extension(&self, id: B256) -> Option<&MockExtension> {
        self.extensions.iter().find(|e| e.id == id)
    }

    /// Answer a read-only call
    fn read(&self, calldata: &[u8]) -> Result<Vec<u8>, ClientError> {
        let call = IMarketplaceCalls::abi_decode(calldata).map_err(revert)?;
        let data = match call {
            IMarketplaceCalls::DEFAULT_ADMIN_ROLE(_) => {
                IMarketplace::DEFAULT_ADMIN_ROLECall::abi_encode_returns(&B256::ZERO)
            }
            IMarketplaceCalls::EXTENSION_ROLE(_) => {
                IMarketplace::EXTENSION_ROLECall::abi_encode_returns(&extension_role())
            }
            IMarketplaceCalls::hasRole(c) => {
                IMarketplace::hasRoleCall::abi_encode_returns(&self.has_role(c.role, c.account))
            }
            IMarketplaceCalls::getExtension(c) => {
                let extension = self
                    .extension(c.extensionId)
                    .ok_or_else(|| revert("Router: extension does not exist"))?;
                IMarketplace::getExtensionCall::abi_encode_returns(
                    &IMarketplace::getExtensionReturn {
                        extension: extension.address,
                        enabled: extension.enabled,
                        name: extension.name.clone(),
                    },
                )
            }
            IMarketplaceCalls::getAllExtensionIds(_) => {
                let ids: Vec<B256> = self
                    .extensions
                    .iter()
                    .map(|e| e.id)
                    .collect();
                IMarketplace::getAllExtensionIdsCall::abi_encode_returns(&ids)
            }
            IMarketplaceCalls::platformFee(_) => {
                IMarketplace::platformFeeCall::abi_encode_returns(&IMarketplace::platformFeeReturn {
                    feeBps: self.platform_fee_bps,
                    recipient: self.fee_recipient,
                })
            }
            IMarketplaceCalls::nativeTokenWrapper(_) => {
                IMarketplace::nativeTokenWrapperCall::abi_encode_returns(&self.native_token_wrapper)
            }
            IMarketplaceCalls::addExtension(_)
            | IMarketplaceCalls::removeExtension(_)
            | IMarketplaceCalls::grantRole(_) => Vec::new(),
        };

        Ok(data)
    }

    /// Apply a state-changing call, returning the revert reason on failure
    fn execute(&mut self, sender: Address, calldata: &[u8]) -> Result<(), String> {
        let call = IMarketplaceCalls::abi_decode(calldata).map_err(|e| e.to_string())?;
        match call {
            IMarketplaceCalls::addExtension(c) => {
                self.require_role(extension_role(), sender)?;
                if c.extension.is_zero() {
                    return Err("Router: zero address".to_string());
                }
                if c.name.is_empty() {
                    return Err("Router: empty name".to_string());
                }
                if self.extension(c.extensionId).is_some() {
                    return Err("Router: extension already exists".to_string());
                }
                self.extensions.push(MockExtension {
                    id: c.extensionId,
                    address: c.extension,
                    enabled: true,
                    name: c.name,
                });
            }
            IMarketplaceCalls::removeExtension(c) => {
                self.require_role(extension_role(), sender)?;
                let before = self.extensions.len();
                self.extensions.retain(|e| e.id != c.extensionId);
                if self.extensions.len() == before {
                    return Err("Router: extension does not exist".to_string());
                }
            }
            IMarketplaceCalls::grantRole(c) => {
                self.require_role(B256::ZERO, sender)?;
                self.roles.insert((c.role, c.account));
            }
            _ => {}
        }

        Ok(())
    }
}

/// A contract hosted by the mock chain
#[derive(Clone, Debug)]
pub enum MockContract {
    /// The marketplace
    Marketplace(MockMarketplace),
    /// The offers extension
    Offers {
        /// The holder of the admin role
        admin: Address,
    },
    /// The direct listings extension
    DirectListings {
        /// The holder of the admin role
        admin: Address,
    },
    /// Any other bytecode; every call returns nothing
    Opaque,
}

impl MockContract {
    /// Instantiate the contract for the given init code
    fn instantiate(init_code: &[u8]) -> Self {
        if let Some(args) = init_code.strip_prefix(MARKETPLACE_BYTECODE.as_slice()) {
            let (admin, platform_fee_bps, fee_recipient, _royalty_engine, native_token_wrapper) =
                <(Address, u16, Address, Address, Address)>::abi_decode_params(args)
                    .expect("marketplace constructor arguments");
            let roles = HashSet::from([(B256::ZERO, admin), (extension_role(), admin)]);
            return MockContract::Marketplace(MockMarketplace {
                roles,
                extensions: Vec::new(),
                platform_fee_bps,
                fee_recipient,
                native_token_wrapper,
            });
        }

        if let Some(args) = init_code.strip_prefix(OFFERS_BYTECODE.as_slice()) {
            let (admin,) =
                <(Address,)>::abi_decode_params(args).expect("offers constructor arguments");
            return MockContract::Offers { admin };
        }

        if let Some(args) = init_code.strip_prefix(DIRECT_LISTINGS_BYTECODE.as_slice()) {
            let (_native_token_wrapper, admin) = <(Address, Address)>::abi_decode_params(args)
                .expect("direct listings constructor arguments");
            return MockContract::DirectListings { admin };
        }

        MockContract::Opaque
    }

    /// Answer a read-only call
    fn read(&self, calldata: &[u8]) -> Result<Vec<u8>, ClientError> {
        match self {
            MockContract::Marketplace(marketplace) => marketplace.read(calldata),
            MockContract::Offers { admin } => {
                let data = match IOffersCalls::abi_decode(calldata).map_err(revert)? {
                    IOffersCalls::DEFAULT_ADMIN_ROLE(_) => {
                        IOffers::DEFAULT_ADMIN_ROLECall::abi_encode_returns(&B256::ZERO)
                    }
                    IOffersCalls::OFFEROR_ROLE(_) => {
                        IOffers::OFFEROR_ROLECall::abi_encode_returns(&keccak256("OFFEROR_ROLE"))
                    }
                    IOffersCalls::MANAGER_ROLE(_) => {
                        IOffers::MANAGER_ROLECall::abi_encode_returns(&keccak256("MANAGER_ROLE"))
                    }
                    IOffersCalls::hasRole(c) => IOffers::hasRoleCall::abi_encode_returns(
                        &(c.role == B256::ZERO && c.account == *admin),
                    ),
                    IOffersCalls::totalOffers(_) => {
                        IOffers::totalOffersCall::abi_encode_returns(&U256::ZERO)
                    }
                };
                Ok(data)
            }
            MockContract::DirectListings { admin } => {
                let data = match IDirectListingsCalls::abi_decode(calldata).map_err(revert)? {
                    IDirectListingsCalls::DEFAULT_ADMIN_ROLE(_) => {
                        IDirectListings::DEFAULT_ADMIN_ROLECall::abi_encode_returns(&B256::ZERO)
                    }
                    IDirectListingsCalls::hasRole(c) => {
                        IDirectListings::hasRoleCall::abi_encode_returns(
                            &(c.role == B256::ZERO && c.account == *admin),
                        )
                    }
                    IDirectListingsCalls::totalListings(_) => {
                        IDirectListings::totalListingsCall::abi_encode_returns(&U256::ZERO)
                    }
                };
                Ok(data)
            }
            MockContract::Opaque => Ok(Vec::new()),
        }
    }
}

/// A contract account: its runtime code and state
#[derive(Clone, Debug)]
struct MockAccount {
    /// The runtime code
    code: Bytes,
    /// The contract state
    contract: MockContract,
}

/// The mutable state of the mock chain
#[derive(Debug, Default)]
struct ChainState {
    /// Native balances
    balances: HashMap<Address, U256>,
    /// Deployed contracts
    accounts: HashMap<Address, MockAccount>,
    /// Receipts of mined transactions
    receipts: HashMap<TxHash, ConfirmedTx>,
    /// Failures returned by the next broadcasts, in order
    scripted_failures: VecDeque<ClientError>,
    /// Failures returned by the next receipt polls, in order
    receipt_failures: VecDeque<ClientError>,
    /// Failures returned by the next gas estimates, in order
    estimate_failures: VecDeque<ClientError>,
    /// Every receipt poll, failed or not
    receipt_polls: usize,
    /// The target and calldata of every read-only call
    calls: Vec<(Address, Bytes)>,
    /// Every broadcast attempt, failed or not
    send_attempts: usize,
    /// Every transaction that was mined
    transactions: Vec<TransactionPlan>,
    /// The sender's next nonce
    nonce: u64,
    /// The latest block number
    block: u64,
}

impl ChainState {
    /// Broadcast and immediately mine a transaction
    fn send(&mut self, sender: Address, tx: TransactionPlan) -> Result<TxHash, ClientError> {
        self.send_attempts += 1;
        if let Some(failure) = self.scripted_failures.pop_front() {
            return Err(failure);
        }
        let balance = self.balances.get(&sender).copied().unwrap_or_default();
        if balance.is_zero() {
            return Err(ClientError::insufficient_funds(
                "insufficient funds for gas * price + value",
            ));
        }

        let nonce = self.nonce;
        self.nonce += 1;
        self.block += 1;
        let tx_hash = keccak256(nonce.to_be_bytes());

        let (contract_address, success) = match tx.to {
            None => {
                let address = sender.create(nonce);
                let contract = MockContract::instantiate(&tx.input);
                let code = match &contract {
                    MockContract::Marketplace(_) => Bytes::copy_from_slice(&MARKETPLACE_BYTECODE),
                    MockContract::Offers { .. } => Bytes::copy_from_slice(&OFFERS_BYTECODE),
                    MockContract::DirectListings { .. } => {
                        Bytes::copy_from_slice(&DIRECT_LISTINGS_BYTECODE)
                    }
                    MockContract::Opaque => tx.input.clone(),
                };
                self.accounts.insert(address, MockAccount { code, contract });
                (Some(address), true)
            }
            Some(to) => {
                let success = match self.accounts.get_mut(&to) {
                    Some(MockAccount {
                        contract: MockContract::Marketplace(m),
                        ..
                    }) => m.execute(sender, &tx.input).is_ok(),
                    _ => true,
                };
                (None, success)
            }
        };

        self.receipts.insert(
            tx_hash,
            ConfirmedTx {
                tx_hash,
                block_number: Some(self.block),
                gas_used: Some(MOCK_GAS_USED),
                contract_address,
                success,
            },
        );
        self.transactions.push(tx);

        Ok(tx_hash)
    }

    /// Run a transaction against a copy of the state, reporting the revert
    /// reason it would fail with
    fn estimate(&mut self, sender: Address, tx: &TransactionPlan) -> Result<u64, ClientError> {
        if let Some(failure) = self.estimate_failures.pop_front() {
            return Err(failure);
        }

        if let Some(to) = tx.to {
            if let Some(MockAccount {
                contract: MockContract::Marketplace(m),
                ..
            }) = self.accounts.get(&to)
            {
                m.clone().execute(sender, &tx.input).map_err(revert)?;
            }
        }

        Ok(MOCK_GAS_ESTIMATE)
    }

    /// The marketplace at `address`
    fn marketplace(&mut self, address: Address) -> &mut MockMarketplace {
        match self.accounts.get_mut(&address) {
            Some(MockAccount {
                contract: MockContract::Marketplace(m),
                ..
            }) => m,
            _ => panic!("no marketplace at {address:#x}"),
        }
    }
}

/// A single-signer chain that mines every transaction as soon as it is sent
pub struct MockChain {
    /// The signing account
    sender: Address,
    /// The chain state
    state: Mutex<ChainState>,
}

impl MockChain {
    /// A chain on which `sender` holds 10 ETH
    pub fn new(sender: Address) -> Self {
        let chain = Self {
            sender,
            state: Mutex::new(ChainState::default()),
        };
        chain.set_balance(sender, U256::from(10_000_000_000_000_000_000u128));
        chain
    }

    /// Lock the chain state
    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap()
    }

    /// Set the native balance of `account`
    pub fn set_balance(&self, account: Address, balance: U256) {
        self.state().balances.insert(account, balance);
    }

    /// Make the next broadcasts fail with `failures`, in order
    pub fn fail_next_sends(&self, failures: impl IntoIterator<Item = ClientError>) {
        self.state().scripted_failures.extend(failures);
    }

    /// Make the next receipt polls fail with `failures`, in order
    pub fn fail_next_receipt_polls(&self, failures: impl IntoIterator<Item = ClientError>) {
        self.state().receipt_failures.extend(failures);
    }

    /// Make the next gas estimates fail with `failures`, in order
    pub fn fail_next_estimates(&self, failures: impl IntoIterator<Item = ClientError>) {
        self.state().estimate_failures.extend(failures);
    }

    /// The number of receipt polls so far, failed or not
    pub fn receipt_polls(&self) -> usize {
        self.state().receipt_polls
    }

    /// Place `code` at `address` as a contract answering every call with no
    /// data
    pub fn install_opaque(&self, address: Address, code: Bytes) {
        let account = MockAccount {
            code,
            contract: MockContract::Opaque,
        };
        self.state().accounts.insert(address, account);
    }

    /// The number of read-only calls to `to` with the given function selector
    pub fn calls_to(&self, to: Address, selector: [u8; 4]) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|(target, data)| *target == to && data.starts_with(&selector))
            .count()
    }

    /// The number of broadcast attempts so far, failed or not
    pub fn send_attempts(&self) -> usize {
        self.state().send_attempts
    }

    /// The number of mined transactions
    pub fn transaction_count(&self) -> usize {
        self.state().transactions.len()
    }

    /// Every mined transaction, in order
    pub fn transactions(&self) -> Vec<TransactionPlan> {
        self.state().transactions.clone()
    }

    /// Grant `role` on the marketplace at `marketplace` without a transaction
    pub fn grant(&self, marketplace: Address, role: B256, account: Address) {
        self.state()
            .marketplace(marketplace)
            .roles
            .insert((role, account));
    }

    /// Revoke `role` on the marketplace at `marketplace` without a transaction
    pub fn revoke(&self, marketplace: Address, role: B256, account: Address) {
        self.state()
            .marketplace(marketplace)
            .roles
            .remove(&(role, account));
    }

    /// Register an extension without a transaction or a role check
    pub fn register(&self, marketplace: Address, id: B256, address: Address, name: &str) {
        let extension = MockExtension {
            id,
            address,
            enabled: true,
            name: name.to_string(),
        };
        self.state()
            .marketplace(marketplace)
            .extensions
            .push(extension);
    }

    /// The extensions registered on the marketplace at `marketplace`
    pub fn extensions(&self, marketplace: Address) -> Vec<MockExtension> {
        self.state().marketplace(marketplace).extensions.clone()
    }
}

impl ChainClient for MockChain {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn chain_id(&self) -> Result<u64, ClientError> {
        Ok(MOCK_CHAIN_ID)
    }

    async fn balance(&self, account: Address) -> Result<U256, ClientError> {
        Ok(self
            .state()
            .balances
            .get(&account)
            .copied()
            .unwrap_or_default())
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, ClientError> {
        Ok(self
            .state()
            .accounts
            .get(&address)
            .map(|a| a.code.clone())
            .unwrap_or_default())
    }

    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, ClientError> {
        let mut state = self.state();
        state.calls.push((to, calldata.clone()));
        match state.accounts.get(&to) {
            Some(account) => account.contract.read(&calldata).map(Bytes::from),
            None => Ok(Bytes::new()),
        }
    }

    async fn send_transaction(&self, tx: TransactionPlan) -> Result<TxHash, ClientError> {
        self.state().send(self.sender, tx)
    }

    async fn estimate_gas(&self, tx: TransactionPlan) -> Result<u64, ClientError> {
        self.state().estimate(self.sender, &tx)
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<ConfirmedTx>, ClientError> {
        let mut state = self.state();
        state.receipt_polls += 1;
        if let Some(failure) = state.receipt_failures.pop_front() {
            return Err(failure);
        }

        Ok(state.receipts.get(&tx_hash).cloned())
    }
}

/// A reverted call, as reported by a node
fn revert(reason: impl ToString) -> ClientError {
    ClientError::from_node_message(format!("execution reverted: {}", reason.to_string()))
}
