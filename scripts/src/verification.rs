//! Post-deployment getter checks for each contract

use std::fmt::Debug;

use alloy::{
    primitives::{Address, Bytes, B256},
    sol_types::SolCall,
};

use crate::solidity::{IDirectListings, IMarketplace, IOffers};

/// Decodes raw return data and judges the value, yielding the value on
/// success or the reason for failure
type Evaluator = Box<dyn Fn(&[u8]) -> Result<String, String> + Send + Sync>;

/// A single getter call whose result is checked against an expectation
pub struct VerificationCheck {
    /// The signature of the getter
    field: String,
    /// The encoded call
    calldata: Bytes,
    /// The judgement applied to the return data
    evaluate: Evaluator,
}

impl VerificationCheck {
    /// Call `call` and require its decoded return value to satisfy `expect`
    pub fn new<Call, F>(call: Call, expect: F) -> Self
    where
        Call: SolCall + 'static,
        Call::Return: Debug,
        F: Fn(&Call::Return) -> bool + Send + Sync + 'static,
    {
        let evaluate = move |data: &[u8]| -> Result<String, String> {
            let value = Call::abi_decode_returns(data)
                .map_err(|e| format!("undecodable return data: {e}"))?;
            if expect(&value) {
                Ok(format!("{value:?}"))
            } else {
                Err(format!("unexpected value {value:?}"))
            }
        };

        Self {
            field: Call::SIGNATURE.to_string(),
            calldata: Bytes::from(call.abi_encode()),
            evaluate: Box::new(evaluate),
        }
    }

    /// Call `call` and require only that it returns a decodable value
    pub fn responds<Call>(call: Call) -> Self
    where
        Call: SolCall + 'static,
        Call::Return: Debug,
    {
        Self::new(call, |_| true)
    }

    /// The signature of the getter
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The encoded call
    pub fn calldata(&self) -> &Bytes {
        &self.calldata
    }

    /// Judge the return data of the call
    pub fn evaluate(&self, data: &[u8]) -> Result<String, String> {
        (self.evaluate)(data)
    }
}

/// Checks for a freshly deployed or linked marketplace.
///
/// `platform_fee_bps` is checked only when the expected fee is known.
pub fn marketplace_checks(
    admin: Address,
    platform_fee_bps: Option<u16>,
) -> Vec<VerificationCheck> {
    let mut checks = vec![
        VerificationCheck::responds(IMarketplace::EXTENSION_ROLECall {}),
        VerificationCheck::new(
            IMarketplace::hasRoleCall {
                role: B256::ZERO,
                account: admin,
            },
            |held| *held,
        ),
        VerificationCheck::responds(IMarketplace::getAllExtensionIdsCall {}),
        VerificationCheck::responds(IMarketplace::nativeTokenWrapperCall {}),
    ];

    match platform_fee_bps {
        Some(expected) => checks.push(VerificationCheck::new(
            IMarketplace::platformFeeCall {},
            move |fee| fee.feeBps == expected,
        )),
        None => checks.push(VerificationCheck::responds(IMarketplace::platformFeeCall {})),
    }

    checks
}

/// Checks for the offers extension
pub fn offers_checks(admin: Address) -> Vec<VerificationCheck> {
    vec![
        VerificationCheck::new(
            IOffers::hasRoleCall {
                role: B256::ZERO,
                account: admin,
            },
            |held| *held,
        ),
        VerificationCheck::responds(IOffers::totalOffersCall {}),
        VerificationCheck::responds(IOffers::OFFEROR_ROLECall {}),
        VerificationCheck::responds(IOffers::MANAGER_ROLECall {}),
    ]
}

/// Checks for the direct listings extension
pub fn direct_listings_checks(admin: Address) -> Vec<VerificationCheck> {
    vec![
        VerificationCheck::new(
            IDirectListings::hasRoleCall {
                role: B256::ZERO,
                account: admin,
            },
            |held| *held,
        ),
        VerificationCheck::responds(IDirectListings::totalListingsCall {}),
    ]
}
