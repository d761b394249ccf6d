//! Implementations of the marketplace scripts

use alloy::{
    primitives::{Address, B256},
    sol_types::SolCall,
};
use tool_utils::prompt_for_confirmation;
use tracing::{info, warn};

use crate::{
    artifact::ContractArtifact,
    cli::{
        CleanupArgs, ConstructorArgs, ContractAddressArgs, DeployArgs, DeployContractArgs,
        DiagnoseArgs, GrantRoleArgs, LinkArgs, ListExtensionsArgs, MarketplaceRole,
    },
    client::ChainClient,
    config::DeployConfig,
    constants::MARKETPLACE_CONTRACT_NAME,
    errors::ScriptError,
    orchestrator::Orchestrator,
    solidity::IMarketplace,
    types::{
        ChainEndpoint, DeployedContract, ExtensionRecord, MarketplaceContract, RegistrationOutcome,
    },
    utils::{
        direct_listings_constructor_args, extension_id, marketplace_constructor_args,
        offers_constructor_args, parse_addr_from_deployments_file, resolve_contract,
        try_resolve_contract, write_deployed_address,
    },
    verification::{direct_listings_checks, marketplace_checks, offers_checks, VerificationCheck},
};

/// The extension contracts, in registration order
const EXTENSIONS: [MarketplaceContract; 2] = [
    MarketplaceContract::Offers,
    MarketplaceContract::DirectListings,
];

/// Deploy the marketplace and both extensions, link the extensions, verify
/// every contract and record the addresses
pub async fn deploy<C: ChainClient>(
    args: DeployArgs,
    config: &DeployConfig,
    endpoint: &ChainEndpoint,
    orchestrator: &mut Orchestrator<C>,
) -> Result<(), ScriptError> {
    let deployer = orchestrator.client().sender();
    orchestrator.check_funds(config.min_balance).await?;

    // Load every artifact before spending gas
    let marketplace_artifact =
        orchestrator.load_artifact(&config.artifact_dir, MARKETPLACE_CONTRACT_NAME)?;
    let mut extension_artifacts = Vec::with_capacity(EXTENSIONS.len());
    for kind in EXTENSIONS {
        let artifact = orchestrator.load_artifact(&config.artifact_dir, kind.artifact_name())?;
        extension_artifacts.push(artifact);
    }

    let marketplace_args =
        constructor_args(MarketplaceContract::Marketplace, &args.constructor, deployer);
    let marketplace = deploy_and_record(
        orchestrator,
        config,
        endpoint,
        &marketplace_artifact,
        &marketplace_args,
    )
    .await?;

    let mut extensions = Vec::with_capacity(EXTENSIONS.len());
    for (kind, artifact) in EXTENSIONS.into_iter().zip(&extension_artifacts) {
        let encoded = constructor_args(kind, &args.constructor, deployer);
        let contract = deploy_and_record(orchestrator, config, endpoint, artifact, &encoded)
            .await?;
        extensions.push((kind, contract));
    }

    for (kind, extension) in &extensions {
        link_extension(orchestrator, &marketplace, *kind, extension).await?;
    }

    let checks = checks_for(MarketplaceContract::Marketplace, deployer, Some(&args.constructor));
    verify_and_report(orchestrator, &marketplace, &checks).await;
    for (kind, extension) in &extensions {
        let checks = checks_for(*kind, deployer, Some(&args.constructor));
        verify_and_report(orchestrator, extension, &checks).await;
    }

    print_extensions(&orchestrator.list_extensions(&marketplace).await?);

    let mut deployed = vec![&marketplace];
    deployed.extend(extensions.iter().map(|(_, contract)| contract));
    print_summary(&deployed);

    Ok(())
}

/// Deploy a single contract, reporting on the one it replaces, and optionally
/// link it to the recorded contracts
pub async fn deploy_contract<C: ChainClient>(
    args: DeployContractArgs,
    config: &DeployConfig,
    endpoint: &ChainEndpoint,
    orchestrator: &mut Orchestrator<C>,
) -> Result<(), ScriptError> {
    let deployer = orchestrator.client().sender();
    let name = args.contract.artifact_name();

    if let Some(previous) = parse_addr_from_deployments_file(&config.deployments_path, name)? {
        if orchestrator.has_code(previous).await? {
            info!("replacing {name} at {previous:#x}, which still has code");
        } else {
            warn!("no code at the recorded {name} address {previous:#x}");
        }
    }

    orchestrator.check_funds(config.min_balance).await?;
    let artifact = orchestrator.load_artifact(&config.artifact_dir, name)?;
    let encoded = constructor_args(args.contract, &args.constructor, deployer);
    let contract = deploy_and_record(orchestrator, config, endpoint, &artifact, &encoded)
        .await?;

    if args.link {
        match args.contract {
            MarketplaceContract::Marketplace => {
                for kind in EXTENSIONS {
                    let configured = configured_address(&args.addresses, kind);
                    let resolved = try_resolve_contract(
                        kind.artifact_name(),
                        configured,
                        &config.deployments_path,
                    )?;
                    match resolved {
                        Some(extension) => {
                            orchestrator.track(&extension);
                            link_extension(orchestrator, &contract, kind, &extension).await?;
                        }
                        None => warn!("no {kind} address known, not linking it"),
                    }
                }
            }
            kind => {
                let marketplace = resolve_contract(
                    MARKETPLACE_CONTRACT_NAME,
                    args.addresses.marketplace,
                    &config.deployments_path,
                )?;
                link_extension(orchestrator, &marketplace, kind, &contract).await?;
            }
        }
    }

    let checks = checks_for(args.contract, deployer, Some(&args.constructor));
    verify_and_report(orchestrator, &contract, &checks).await;
    print_summary(&[&contract]);

    Ok(())
}

/// Register the extensions on an existing marketplace
pub async fn link<C: ChainClient>(
    args: LinkArgs,
    config: &DeployConfig,
    orchestrator: &mut Orchestrator<C>,
) -> Result<(), ScriptError> {
    let marketplace = resolve_contract(
        MARKETPLACE_CONTRACT_NAME,
        args.addresses.marketplace,
        &config.deployments_path,
    )?;
    if !orchestrator.has_code(marketplace.address).await? {
        return Err(ScriptError::ContractInteraction(format!(
            "no code at the marketplace address {:#x}",
            marketplace.address
        )));
    }

    let mut extensions = Vec::with_capacity(EXTENSIONS.len());
    for kind in EXTENSIONS {
        let extension = resolve_contract(
            kind.artifact_name(),
            configured_address(&args.addresses, kind),
            &config.deployments_path,
        )?;
        if orchestrator.has_code(extension.address).await? {
            extensions.push((kind, extension));
        } else {
            warn!("no code at the {kind} address {:#x}, skipping it", extension.address);
        }
    }

    info!("currently registered extensions:");
    print_extensions(&orchestrator.list_extensions(&marketplace).await?);

    confirm(
        &format!(
            "Link {} extension(s) to the marketplace at {:#x}?",
            extensions.len(),
            marketplace.address
        ),
        args.yes,
    )?;
    orchestrator.check_funds(config.min_balance).await?;

    for (kind, extension) in &extensions {
        orchestrator.track(extension);
        link_extension(orchestrator, &marketplace, *kind, extension).await?;
    }

    print_extensions(&orchestrator.list_extensions(&marketplace).await?);
    Ok(())
}

/// Inspect the marketplace and its extensions: code, roles, registrations and
/// getters. Sends no transactions.
pub async fn diagnose<C: ChainClient>(
    args: DiagnoseArgs,
    config: &DeployConfig,
    orchestrator: &mut Orchestrator<C>,
) -> Result<(), ScriptError> {
    let sender = orchestrator.client().sender();
    let admin = args.admin.unwrap_or(sender);
    let marketplace = resolve_contract(
        MARKETPLACE_CONTRACT_NAME,
        args.addresses.marketplace,
        &config.deployments_path,
    )?;

    let checks = checks_for(MarketplaceContract::Marketplace, admin, None);
    if !verify_and_report(orchestrator, &marketplace, &checks).await
        && !orchestrator.has_code(marketplace.address).await?
    {
        return Err(ScriptError::ContractInteraction(format!(
            "no code at the marketplace address {:#x}",
            marketplace.address
        )));
    }

    println!("roles of {sender:#x}:");
    report_role(
        orchestrator,
        &marketplace,
        "DEFAULT_ADMIN_ROLE",
        IMarketplace::DEFAULT_ADMIN_ROLECall {},
        sender,
    )
    .await;
    let can_register = report_role(
        orchestrator,
        &marketplace,
        "EXTENSION_ROLE",
        IMarketplace::EXTENSION_ROLECall {},
        sender,
    )
    .await;
    if !can_register {
        warn!("{sender:#x} cannot register extensions, see `grant-role --role extension`");
    }

    let mut known = Vec::with_capacity(EXTENSIONS.len());
    for kind in EXTENSIONS {
        let resolved = try_resolve_contract(
            kind.artifact_name(),
            configured_address(&args.addresses, kind),
            &config.deployments_path,
        )?;
        match resolved {
            Some(extension) => known.push((kind, extension)),
            None => warn!("no {kind} address known, skipping its checks"),
        }
    }

    println!("registered extensions:");
    match orchestrator.list_extensions(&marketplace).await {
        Ok(records) if records.is_empty() => println!("  (no extensions registered)"),
        Ok(records) => {
            for record in records {
                let label = if known.iter().any(|(_, c)| c.address == record.address) {
                    "known"
                } else {
                    "unknown"
                };
                println!("  [{label}] {record}");
            }
        }
        Err(e) => println!("  [FAIL] {e}"),
    }

    for (kind, extension) in &known {
        if let Some((key, display_name)) = kind.extension_registration() {
            report_registration(orchestrator, &marketplace, extension, key, display_name).await;
        }

        let checks = checks_for(*kind, admin, None);
        verify_and_report(orchestrator, extension, &checks).await;
    }

    Ok(())
}

/// Grant a marketplace role to an account
pub async fn grant_role<C: ChainClient>(
    args: GrantRoleArgs,
    config: &DeployConfig,
    orchestrator: &Orchestrator<C>,
) -> Result<(), ScriptError> {
    let marketplace = resolve_contract(
        MARKETPLACE_CONTRACT_NAME,
        args.marketplace,
        &config.deployments_path,
    )?;
    let account = args
        .account
        .unwrap_or_else(|| orchestrator.client().sender());

    let role = match args.role {
        MarketplaceRole::Extension => {
            orchestrator
                .role_id(&marketplace, IMarketplace::EXTENSION_ROLECall {})
                .await?
        }
        MarketplaceRole::Admin => {
            orchestrator
                .role_id(&marketplace, IMarketplace::DEFAULT_ADMIN_ROLECall {})
                .await?
        }
    };

    match orchestrator.grant_role(&marketplace, role, account).await? {
        Some(receipt) => info!("granted {role} to {account:#x} in {}", receipt.tx_hash),
        None => info!("{account:#x} already holds {role}"),
    }

    Ok(())
}

/// Remove every registered extension that does not route to the known
/// extension deployments
pub async fn cleanup<C: ChainClient>(
    args: CleanupArgs,
    config: &DeployConfig,
    orchestrator: &Orchestrator<C>,
) -> Result<(), ScriptError> {
    let marketplace = resolve_contract(
        MARKETPLACE_CONTRACT_NAME,
        args.addresses.marketplace,
        &config.deployments_path,
    )?;

    // Without every known address a valid extension would look stale
    let mut known = Vec::with_capacity(EXTENSIONS.len());
    for kind in EXTENSIONS {
        let extension = resolve_contract(
            kind.artifact_name(),
            configured_address(&args.addresses, kind),
            &config.deployments_path,
        )?;
        known.push(extension.address);
    }

    let stale: Vec<ExtensionRecord> = orchestrator
        .list_extensions(&marketplace)
        .await?
        .into_iter()
        .filter(|record| !known.contains(&record.address))
        .collect();
    if stale.is_empty() {
        info!("no unknown extensions registered");
        return Ok(());
    }

    println!("unknown extensions:");
    print_extensions(&stale);
    confirm(&format!("Remove {} unknown extension(s)?", stale.len()), args.yes)?;

    for record in &stale {
        let receipt = orchestrator.remove_extension(&marketplace, record.id).await?;
        info!("removed {} in {}", record.name, receipt.tx_hash);
    }

    print_extensions(&orchestrator.list_extensions(&marketplace).await?);
    Ok(())
}

/// List the extensions registered in the marketplace
pub async fn list_extensions<C: ChainClient>(
    args: ListExtensionsArgs,
    config: &DeployConfig,
    orchestrator: &Orchestrator<C>,
) -> Result<(), ScriptError> {
    let marketplace = resolve_contract(
        MARKETPLACE_CONTRACT_NAME,
        args.marketplace,
        &config.deployments_path,
    )?;
    print_extensions(&orchestrator.list_extensions(&marketplace).await?);
    Ok(())
}

// -----------
// | Helpers |
// -----------

/// Deploy a contract and record its address in the deployments file
async fn deploy_and_record<C: ChainClient>(
    orchestrator: &mut Orchestrator<C>,
    config: &DeployConfig,
    endpoint: &ChainEndpoint,
    artifact: &ContractArtifact,
    constructor_args: &[u8],
) -> Result<DeployedContract, ScriptError> {
    let max_attempts = orchestrator.retry_policy().max_attempts;
    let contract = orchestrator
        .deploy_with_retry(artifact, constructor_args, config.gas, max_attempts)
        .await?;
    write_deployed_address(&config.deployments_path, endpoint, &contract)?;
    Ok(contract)
}

/// Register an extension, logging the outcome. A missing role skips the
/// extension instead of failing the run.
async fn link_extension<C: ChainClient>(
    orchestrator: &mut Orchestrator<C>,
    marketplace: &DeployedContract,
    kind: MarketplaceContract,
    extension: &DeployedContract,
) -> Result<(), ScriptError> {
    let Some((key, display_name)) = kind.extension_registration() else {
        return Ok(());
    };

    let outcome = orchestrator
        .register_extension(marketplace, extension_id(key), extension.address, display_name)
        .await;
    match outcome {
        Ok(RegistrationOutcome::Unchanged) => info!("{display_name} already linked"),
        Ok(RegistrationOutcome::Registered(receipt)) => {
            info!("{display_name} linked in {}", receipt.tx_hash)
        }
        Ok(RegistrationOutcome::Overwritten { previous, receipt }) => {
            warn!("{display_name} replaced {previous:#x} in {}", receipt.tx_hash)
        }
        Err(e) if !e.is_fatal() => {
            warn!("skipping {display_name}: {e}");
            if let Some(remedy) = e.remedy() {
                warn!("{remedy}");
            }
        }
        Err(e) => return Err(e),
    }

    Ok(())
}

/// Print whether `account` holds the role read by `getter`. A failed read is
/// printed and counts as not held.
async fn report_role<C, Call>(
    orchestrator: &Orchestrator<C>,
    marketplace: &DeployedContract,
    label: &str,
    getter: Call,
    account: Address,
) -> bool
where
    C: ChainClient,
    Call: SolCall<Return = B256>,
{
    let role = match orchestrator.role_id(marketplace, getter).await {
        Ok(role) => role,
        Err(e) => {
            println!("  [FAIL] {label}: {e}");
            return false;
        }
    };

    match orchestrator.has_role(marketplace, role, account).await {
        Ok(held) => {
            println!("  [ok] {label} ({role}) held: {held}");
            held
        }
        Err(e) => {
            println!("  [FAIL] {label} ({role}): {e}");
            false
        }
    }
}

/// Print where the extension's ID routes and, unless it already routes to the
/// extension, dry-run the transaction that would register it
async fn report_registration<C: ChainClient>(
    orchestrator: &Orchestrator<C>,
    marketplace: &DeployedContract,
    extension: &DeployedContract,
    key: &str,
    display_name: &str,
) {
    let id = extension_id(key);
    let existing = match orchestrator.read_extension(marketplace, id).await {
        Ok(existing) => existing,
        Err(e) => {
            println!("  [FAIL] {display_name} registration: {e}");
            return;
        }
    };

    match &existing {
        Some(record) if record.address == extension.address => {
            println!("{display_name} is registered under {key}");
            return;
        }
        Some(record) => println!(
            "{display_name} is not registered, {key} routes to {:#x}",
            record.address
        ),
        None => println!("{display_name} is not registered, {key} is unused"),
    }

    let overwrite = existing.is_some();
    let step = if overwrite { "removeExtension" } else { "addExtension" };
    let simulation = orchestrator
        .simulate_registration(marketplace, id, extension.address, display_name, overwrite)
        .await;
    match simulation {
        Ok(gas) => println!("  [ok] simulated {step}: {gas} gas"),
        Err(e) => println!("  [FAIL] simulated {step}: {e}"),
    }
}

/// Verify a contract and print the report, returning whether it passed
async fn verify_and_report<C: ChainClient>(
    orchestrator: &mut Orchestrator<C>,
    contract: &DeployedContract,
    checks: &[VerificationCheck],
) -> bool {
    let report = orchestrator.verify(contract, checks).await;
    print!("{report}");
    report.passed()
}

/// The ABI-encoded constructor arguments of `kind`, with the deployer as admin
fn constructor_args(
    kind: MarketplaceContract,
    constructor: &ConstructorArgs,
    deployer: Address,
) -> Vec<u8> {
    match kind {
        MarketplaceContract::Marketplace => marketplace_constructor_args(
            deployer,
            constructor.platform_fee_bps,
            constructor.fee_recipient.unwrap_or(deployer),
            constructor.royalty_engine,
            constructor.native_token_wrapper,
        ),
        MarketplaceContract::Offers => offers_constructor_args(deployer),
        MarketplaceContract::DirectListings => {
            direct_listings_constructor_args(constructor.native_token_wrapper, deployer)
        }
    }
}

/// The getter checks for `kind`; the platform fee is checked only when the
/// constructor parameters are known
fn checks_for(
    kind: MarketplaceContract,
    admin: Address,
    constructor: Option<&ConstructorArgs>,
) -> Vec<VerificationCheck> {
    match kind {
        MarketplaceContract::Marketplace => {
            marketplace_checks(admin, constructor.map(|c| c.platform_fee_bps))
        }
        MarketplaceContract::Offers => offers_checks(admin),
        MarketplaceContract::DirectListings => direct_listings_checks(admin),
    }
}

/// The address configured for `kind` on the command line or in the
/// environment
fn configured_address(
    addresses: &ContractAddressArgs,
    kind: MarketplaceContract,
) -> Option<Address> {
    match kind {
        MarketplaceContract::Marketplace => addresses.marketplace,
        MarketplaceContract::Offers => addresses.offers,
        MarketplaceContract::DirectListings => addresses.direct_listings,
    }
}

/// Ask the operator to confirm, unless `skip` is set
fn confirm(prompt: &str, skip: bool) -> Result<(), ScriptError> {
    if skip {
        return Ok(());
    }

    match prompt_for_confirmation(prompt) {
        Ok(true) => Ok(()),
        Ok(false) => Err(ScriptError::Aborted),
        Err(e) => {
            warn!("could not read a confirmation: {e}");
            Err(ScriptError::Aborted)
        }
    }
}

/// Print registered extensions, one per line
fn print_extensions(records: &[ExtensionRecord]) {
    if records.is_empty() {
        println!("  (no extensions registered)");
    }
    for record in records {
        println!("  {record}");
    }
}

/// Print the address, inclusion block and gas used of every contract deployed
/// during the run
fn print_summary(contracts: &[&DeployedContract]) {
    println!("Deployment summary:");
    for contract in contracts {
        println!("  {contract}");
    }
}
