//! The deployment orchestrator: deploys contracts, links extensions into the
//! marketplace and reads back their on-chain state

use std::{collections::BTreeMap, path::Path, time::Duration};

use alloy::{
    primitives::{utils::format_ether, Address, Bytes, TxHash, B256, U256},
    sol_types::SolCall,
};
use tracing::{debug, info, warn};

use crate::{
    artifact::{load_named_artifact, ContractArtifact},
    client::{ChainClient, ClientError, FailureKind},
    constants::{
        DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS, RECEIPT_POLL_ATTEMPTS,
        RECEIPT_POLL_INTERVAL,
    },
    errors::ScriptError,
    solidity::IMarketplace,
    types::{
        ConfirmedTx, DeployedContract, DeploymentInfo, DeploymentStage, ExtensionRecord,
        FieldResult, GasOverrides, RegistrationOutcome, TransactionPlan, VerificationReport,
    },
    verification::VerificationCheck,
};

/// How failed broadcasts are retried and receipts awaited
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// The maximum number of broadcast attempts for a deployment
    pub max_attempts: usize,
    /// The fixed delay between broadcast attempts
    pub delay: Duration,
    /// The interval between receipt polls
    pub poll_interval: Duration,
    /// The number of receipt polls before a transaction is given up on
    pub max_polls: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            poll_interval: RECEIPT_POLL_INTERVAL,
            max_polls: RECEIPT_POLL_ATTEMPTS,
        }
    }
}

/// Drives deployments and admin calls through a [`ChainClient`], tracking the
/// lifecycle stage of every contract it touches
pub struct Orchestrator<C> {
    /// The chain client, carrying the signer
    client: C,
    /// The retry policy for broadcasts and receipts
    retry: RetryPolicy,
    /// Gas overrides applied to admin transactions
    gas: GasOverrides,
    /// The lifecycle stage of each contract, by name
    stages: BTreeMap<String, DeploymentStage>,
    /// The names of contracts deployed or bound during this run, by address
    names: BTreeMap<Address, String>,
}

impl<C: ChainClient> Orchestrator<C> {
    /// Create an orchestrator over `client`
    pub fn new(client: C, retry: RetryPolicy, gas: GasOverrides) -> Self {
        Self {
            client,
            retry,
            gas,
            stages: BTreeMap::new(),
            names: BTreeMap::new(),
        }
    }

    /// The underlying chain client
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The retry policy for broadcasts and receipts
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// The current stage of the named contract
    pub fn stage(&self, name: &str) -> DeploymentStage {
        self.stages
            .get(name)
            .copied()
            .unwrap_or(DeploymentStage::NotDeployed)
    }

    /// The stages of every contract touched so far
    pub fn stages(&self) -> impl Iterator<Item = (&str, DeploymentStage)> {
        self.stages
            .iter()
            .map(|(name, stage)| (name.as_str(), *stage))
    }

    /// Record the address of a contract deployed in an earlier run, so that
    /// registering it as an extension advances its stage
    pub fn track(&mut self, contract: &DeployedContract) {
        self.names.insert(contract.address, contract.name.clone());
        self.stages
            .entry(contract.name.clone())
            .or_insert(DeploymentStage::Deployed);
    }

    /// Move the named contract to `stage`
    fn set_stage(&mut self, name: &str, stage: DeploymentStage) {
        debug!("{name}: {stage}");
        self.stages.insert(name.to_string(), stage);
    }

    /// Move the contract at `address` to `stage`, if it is tracked
    fn set_stage_of(&mut self, address: Address, stage: DeploymentStage) {
        if let Some(name) = self.names.get(&address).cloned() {
            self.set_stage(&name, stage);
        }
    }

    // -------------
    // | Preflight |
    // -------------

    /// Load the artifact of `contract_name`, marking the contract as failed
    /// preflight if it cannot be used
    pub fn load_artifact(
        &mut self,
        artifact_dir: &Path,
        contract_name: &str,
    ) -> Result<ContractArtifact, ScriptError> {
        load_named_artifact(artifact_dir, contract_name).inspect_err(|_| {
            self.set_stage(contract_name, DeploymentStage::FailedPreflight);
        })
    }

    /// Check that the signer holds at least `minimum_balance`, returning the
    /// balance
    pub async fn check_funds(&self, minimum_balance: U256) -> Result<U256, ScriptError> {
        let sender = self.client.sender();
        let balance = self
            .client
            .balance(sender)
            .await
            .map_err(|e| ScriptError::ClientInitialization(format!("reading balance: {e}")))?;

        info!("deployer {sender:#x} holds {} ETH", format_ether(balance));
        if balance.is_zero() || balance < minimum_balance {
            return Err(ScriptError::InsufficientFunds(format!(
                "{sender:#x} holds {} ETH, at least {} ETH is required",
                format_ether(balance),
                format_ether(minimum_balance)
            )));
        }

        Ok(balance)
    }

    /// Whether any code is deployed at `address`
    pub async fn has_code(&self, address: Address) -> Result<bool, ScriptError> {
        let code = self.client.code_at(address).await.map_err(|e| {
            ScriptError::ContractInteraction(format!("reading code at {address:#x}: {e}"))
        })?;
        Ok(!code.is_empty())
    }

    // --------------
    // | Deployment |
    // --------------

    /// Deploy `artifact` with the ABI-encoded `constructor_args`.
    ///
    /// The broadcast is attempted at most `max_attempts` times, waiting the
    /// policy delay between attempts; only transient failures are retried.
    /// Once broadcast, the transaction is awaited but never re-sent.
    pub async fn deploy_with_retry(
        &mut self,
        artifact: &ContractArtifact,
        constructor_args: &[u8],
        gas: GasOverrides,
        max_attempts: usize,
    ) -> Result<DeployedContract, ScriptError> {
        let name = artifact.name.clone();
        let init_code = artifact.init_code(constructor_args);
        let max_attempts = max_attempts.max(1);

        let mut attempt = 0;
        let tx_hash = loop {
            attempt += 1;
            self.set_stage(&name, DeploymentStage::Broadcasting { attempt });
            info!("deploying {name} (attempt {attempt}/{max_attempts})");

            let plan = TransactionPlan::deploy(init_code.clone(), gas);
            let err = match self.client.send_transaction(plan).await {
                Ok(tx_hash) => break tx_hash,
                Err(e) => e,
            };

            match err.kind {
                FailureKind::InsufficientFunds => {
                    self.set_stage(&name, DeploymentStage::FailedPreflight);
                    return Err(ScriptError::InsufficientFunds(format!(
                        "deploying {name}: {err}"
                    )));
                }
                FailureKind::Rejected => {
                    self.set_stage(&name, DeploymentStage::FailedBroadcast);
                    return Err(ScriptError::ContractDeployment(format!(
                        "{name} rejected: {err}"
                    )));
                }
                FailureKind::Transient if attempt >= max_attempts => {
                    self.set_stage(&name, DeploymentStage::FailedBroadcast);
                    return Err(ScriptError::ContractDeployment(format!(
                        "{name} not deployed after {attempt} attempts: {err}"
                    )));
                }
                FailureKind::Transient => {
                    warn!(
                        "attempt {attempt}/{max_attempts} to deploy {name} failed: {err}, \
                         retrying in {}s",
                        self.retry.delay.as_secs_f32()
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
            }
        };

        self.set_stage(&name, DeploymentStage::Confirming);
        info!("{name} deployment sent in {tx_hash}, waiting for inclusion");

        let receipt = match self.await_receipt(tx_hash).await {
            Ok(receipt) => receipt,
            Err(e) => {
                self.set_stage(&name, DeploymentStage::FailedBroadcast);
                return Err(ScriptError::ContractDeployment(format!(
                    "{name} deployment {tx_hash} not confirmed: {e}"
                )));
            }
        };

        let address = match receipt.contract_address {
            Some(address) if receipt.success => address,
            _ => {
                self.set_stage(&name, DeploymentStage::FailedBroadcast);
                return Err(ScriptError::ContractDeployment(format!(
                    "{name} deployment {tx_hash} reverted"
                )));
            }
        };

        let contract = DeployedContract {
            name: name.clone(),
            address,
            deployment: Some(DeploymentInfo {
                tx_hash,
                block_number: receipt.block_number,
                gas_used: receipt.gas_used,
            }),
        };
        self.names.insert(address, name.clone());
        self.set_stage(&name, DeploymentStage::Deployed);
        info!("deployed {contract}");

        Ok(contract)
    }

    // ---------
    // | Roles |
    // ---------

    /// Read a role identifier from one of the contract's role getters, e.g.
    /// `EXTENSION_ROLE()`
    pub async fn role_id<Call>(
        &self,
        contract: &DeployedContract,
        getter: Call,
    ) -> Result<B256, ScriptError>
    where
        Call: SolCall<Return = B256>,
    {
        self.read(contract.address, getter).await
    }

    /// Whether `account` holds `role` on the contract
    pub async fn has_role(
        &self,
        contract: &DeployedContract,
        role: B256,
        account: Address,
    ) -> Result<bool, ScriptError> {
        self.read(contract.address, IMarketplace::hasRoleCall { role, account })
            .await
    }

    /// Fail with [`ScriptError::Unauthorized`] unless `account` holds `role` on
    /// the contract. Only reads state.
    pub async fn require_role(
        &self,
        contract: &DeployedContract,
        role: B256,
        account: Address,
    ) -> Result<(), ScriptError> {
        if self.has_role(contract, role, account).await? {
            return Ok(());
        }

        warn!("{account:#x} does not hold role {role} on {}", contract.name);
        Err(ScriptError::Unauthorized { role, account })
    }

    /// Grant `role` on the contract to `account`, which requires the signer to
    /// hold the admin role. Returns `None` if the account already holds it.
    pub async fn grant_role(
        &self,
        contract: &DeployedContract,
        role: B256,
        account: Address,
    ) -> Result<Option<ConfirmedTx>, ScriptError> {
        if self.has_role(contract, role, account).await? {
            info!("{account:#x} already holds role {role} on {}", contract.name);
            return Ok(None);
        }

        let admin_role = self
            .role_id(contract, IMarketplace::DEFAULT_ADMIN_ROLECall {})
            .await?;
        self.require_role(contract, admin_role, self.client.sender())
            .await?;

        info!("granting role {role} on {} to {account:#x}", contract.name);
        let grant = IMarketplace::grantRoleCall { role, account };
        let receipt = self.transact(contract.address, grant).await?;
        Ok(Some(receipt))
    }

    // --------------
    // | Extensions |
    // --------------

    /// Read the extension registered under `extension_id`, if any.
    ///
    /// A reverting lookup or a zero address means nothing is registered.
    pub async fn read_extension(
        &self,
        marketplace: &DeployedContract,
        extension_id: B256,
    ) -> Result<Option<ExtensionRecord>, ScriptError> {
        let call = IMarketplace::getExtensionCall {
            extensionId: extension_id,
        };
        let record = match self.view(marketplace.address, call).await {
            Ok(record) => record,
            Err(e) if e.kind == FailureKind::Rejected => {
                debug!("no extension under {extension_id}: {e}");
                return Ok(None);
            }
            Err(e) => {
                return Err(ScriptError::ContractInteraction(format!(
                    "getExtension({extension_id}): {e}"
                )))
            }
        };

        if record.extension.is_zero() {
            return Ok(None);
        }

        Ok(Some(ExtensionRecord {
            id: extension_id,
            address: record.extension,
            enabled: record.enabled,
            name: record.name,
        }))
    }

    /// Every extension registered in the marketplace
    pub async fn list_extensions(
        &self,
        marketplace: &DeployedContract,
    ) -> Result<Vec<ExtensionRecord>, ScriptError> {
        let ids = self
            .read(marketplace.address, IMarketplace::getAllExtensionIdsCall {})
            .await?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.read_extension(marketplace, id).await? {
                Some(record) => records.push(record),
                None => warn!("extension {id} is listed but cannot be read"),
            }
        }

        Ok(records)
    }

    /// Dry-run the first transaction a registration would send, returning its
    /// gas estimate: `removeExtension` when an entry is overwritten,
    /// `addExtension` otherwise. Nothing is broadcast.
    pub async fn simulate_registration(
        &self,
        marketplace: &DeployedContract,
        extension_id: B256,
        extension_address: Address,
        display_name: &str,
        overwrite: bool,
    ) -> Result<u64, ScriptError> {
        if overwrite {
            let remove = IMarketplace::removeExtensionCall {
                extensionId: extension_id,
            };
            return self.simulate(marketplace.address, remove).await;
        }

        let add = IMarketplace::addExtensionCall {
            extensionId: extension_id,
            extension: extension_address,
            name: display_name.to_string(),
        };
        self.simulate(marketplace.address, add).await
    }

    /// Register `extension_address` under `extension_id`.
    ///
    /// Registering the address already held by the ID sends nothing. An ID
    /// held by another address is overwritten by removing the old entry
    /// first. The signer's `EXTENSION_ROLE` is checked and the first
    /// transaction is dry-run before anything is broadcast.
    pub async fn register_extension(
        &mut self,
        marketplace: &DeployedContract,
        extension_id: B256,
        extension_address: Address,
        display_name: &str,
    ) -> Result<RegistrationOutcome, ScriptError> {
        let existing = self.read_extension(marketplace, extension_id).await?;
        if let Some(record) = existing.as_ref().filter(|r| r.address == extension_address) {
            if !record.enabled {
                warn!("{display_name} is registered at {extension_address:#x} but disabled");
            }
            info!("{display_name} already registered at {extension_address:#x}");
            self.set_stage_of(extension_address, DeploymentStage::Linked);
            return Ok(RegistrationOutcome::Unchanged);
        }

        let extension_role = self
            .role_id(marketplace, IMarketplace::EXTENSION_ROLECall {})
            .await?;
        self.require_role(marketplace, extension_role, self.client.sender())
            .await?;

        let gas = self
            .simulate_registration(
                marketplace,
                extension_id,
                extension_address,
                display_name,
                existing.is_some(),
            )
            .await?;
        debug!("registering {display_name} is estimated at {gas} gas");

        self.set_stage_of(extension_address, DeploymentStage::Registering);
        let add = IMarketplace::addExtensionCall {
            extensionId: extension_id,
            extension: extension_address,
            name: display_name.to_string(),
        };

        let outcome = match existing {
            Some(previous) => {
                warn!(
                    "overwriting {} under {extension_id}: {:#x} -> {extension_address:#x}",
                    previous.name, previous.address
                );
                let remove = IMarketplace::removeExtensionCall {
                    extensionId: extension_id,
                };
                self.transact(marketplace.address, remove).await?;
                let receipt = self
                    .transact(marketplace.address, add)
                    .await
                    .map_err(|e| {
                        ScriptError::ContractInteraction(format!(
                            "{} at {:#x} was removed but {display_name} could not be added, \
                             {extension_id} is now unregistered: {e}",
                            previous.name, previous.address
                        ))
                    })?;
                RegistrationOutcome::Overwritten {
                    previous: previous.address,
                    receipt,
                }
            }
            None => {
                info!("registering {display_name} at {extension_address:#x}");
                let receipt = self.transact(marketplace.address, add).await?;
                RegistrationOutcome::Registered(receipt)
            }
        };

        self.set_stage_of(extension_address, DeploymentStage::Linked);
        Ok(outcome)
    }

    /// Remove the extension registered under `extension_id`, which requires the
    /// signer to hold `EXTENSION_ROLE`
    pub async fn remove_extension(
        &self,
        marketplace: &DeployedContract,
        extension_id: B256,
    ) -> Result<ConfirmedTx, ScriptError> {
        let extension_role = self
            .role_id(marketplace, IMarketplace::EXTENSION_ROLECall {})
            .await?;
        self.require_role(marketplace, extension_role, self.client.sender())
            .await?;

        info!("removing extension {extension_id}");
        let remove = IMarketplace::removeExtensionCall {
            extensionId: extension_id,
        };
        self.transact(marketplace.address, remove).await
    }

    // ----------------
    // | Verification |
    // ----------------

    /// Check that code is deployed at the contract's address, then run every
    /// getter check against it. Failed checks are logged and reported, never
    /// returned as errors.
    pub async fn verify(
        &mut self,
        contract: &DeployedContract,
        checks: &[VerificationCheck],
    ) -> VerificationReport {
        let mut fields = Vec::with_capacity(checks.len() + 1);

        let code = match self.client.code_at(contract.address).await {
            Ok(code) if !code.is_empty() => {
                FieldResult::pass("code", format!("{} bytes", code.len()))
            }
            Ok(_) => FieldResult::fail("code", "no code at address"),
            Err(e) => FieldResult::fail("code", e.to_string()),
        };
        let has_code = code.passed;
        fields.push(code);

        // Getters against an empty account return nothing useful
        if has_code {
            for check in checks {
                let result = self
                    .client
                    .call(contract.address, check.calldata().clone())
                    .await;
                let field = match result {
                    Ok(data) => check.evaluate(&data),
                    Err(e) => Err(e.to_string()),
                };
                fields.push(match field {
                    Ok(detail) => FieldResult::pass(check.field(), detail),
                    Err(reason) => FieldResult::fail(check.field(), reason),
                });
            }
        }

        let report = VerificationReport {
            contract: contract.name.clone(),
            address: contract.address,
            fields,
        };

        if report.passed() {
            info!("{} verified at {:#x}", contract.name, contract.address);
            self.set_stage(&contract.name, DeploymentStage::Verified);
        } else {
            for failure in report.failures() {
                warn!(
                    "{} check `{}` failed: {}",
                    contract.name, failure.field, failure.detail
                );
            }
            self.set_stage(&contract.name, DeploymentStage::FailedVerification);
        }

        report
    }

    // -----------
    // | Helpers |
    // -----------

    /// Execute a read-only call, leaving the failure classified
    async fn view<Call: SolCall>(
        &self,
        to: Address,
        call: Call,
    ) -> Result<Call::Return, ClientError> {
        let data = self.client.call(to, Bytes::from(call.abi_encode())).await?;
        Call::abi_decode_returns(&data)
            .map_err(|e| ClientError::rejected(format!("undecodable return data: {e}")))
    }

    /// Execute a read-only call
    async fn read<Call: SolCall>(
        &self,
        to: Address,
        call: Call,
    ) -> Result<Call::Return, ScriptError> {
        self.view(to, call)
            .await
            .map_err(|e| ScriptError::ContractInteraction(format!("{}: {e}", Call::SIGNATURE)))
    }

    /// Estimate the gas of calling `call` on `to` from the signer; a call that
    /// would revert fails with [`ScriptError::SimulationReverted`]
    async fn simulate<Call: SolCall>(&self, to: Address, call: Call) -> Result<u64, ScriptError> {
        let plan = TransactionPlan::call(to, Bytes::from(call.abi_encode()), self.gas);
        self.client
            .estimate_gas(plan)
            .await
            .map_err(|e| match e.kind {
                FailureKind::Rejected => {
                    ScriptError::SimulationReverted(format!("{}: {e}", Call::SIGNATURE))
                }
                FailureKind::InsufficientFunds => {
                    ScriptError::InsufficientFunds(format!("{}: {e}", Call::SIGNATURE))
                }
                FailureKind::Transient => {
                    ScriptError::ContractInteraction(format!("{}: {e}", Call::SIGNATURE))
                }
            })
    }

    /// Poll for the receipt of `tx_hash` until it is mined or the policy's
    /// polls run out. Transient poll failures are logged and polled through;
    /// the transaction may already be mined.
    async fn await_receipt(&self, tx_hash: TxHash) -> Result<ConfirmedTx, ClientError> {
        let max_polls = self.retry.max_polls.max(1);
        let mut last_error = None;

        for poll in 1..=max_polls {
            match self.client.receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(e) if e.is_retryable() => {
                    warn!("receipt poll {poll}/{max_polls} for {tx_hash} failed: {e}");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }

            if poll < max_polls {
                tokio::time::sleep(self.retry.poll_interval).await;
            }
        }

        let reason = last_error.map_or(String::new(), |e| format!(", last error: {e}"));
        Err(ClientError::transient(format!(
            "no receipt for {tx_hash} after {max_polls} polls{reason}"
        )))
    }

    /// Send a transaction calling `call` on `to` and wait for it to succeed.
    ///
    /// Admin transactions are sent once; a failed broadcast may still have
    /// reached the mempool.
    async fn transact<Call: SolCall>(
        &self,
        to: Address,
        call: Call,
    ) -> Result<ConfirmedTx, ScriptError> {
        let plan = TransactionPlan::call(to, Bytes::from(call.abi_encode()), self.gas);
        let tx_hash = self
            .client
            .send_transaction(plan)
            .await
            .map_err(|e| match e.kind {
                FailureKind::InsufficientFunds => {
                    ScriptError::InsufficientFunds(format!("{}: {e}", Call::SIGNATURE))
                }
                _ => ScriptError::ContractInteraction(format!("{}: {e}", Call::SIGNATURE)),
            })?;
        debug!("{} sent in {tx_hash}", Call::SIGNATURE);

        let receipt = self.await_receipt(tx_hash).await.map_err(|e| {
            ScriptError::ContractInteraction(format!("{} in {tx_hash}: {e}", Call::SIGNATURE))
        })?;
        if !receipt.success {
            return Err(ScriptError::ContractInteraction(format!(
                "{} reverted in {tx_hash}",
                Call::SIGNATURE
            )));
        }

        info!("{} confirmed in {tx_hash}", Call::SIGNATURE);
        Ok(receipt)
    }
}
