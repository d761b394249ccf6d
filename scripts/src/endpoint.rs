//! Selection of a working RPC endpoint from a list of candidates

use std::future::Future;

use tracing::{info, warn};

use crate::{client::ClientError, errors::ScriptError, types::ChainEndpoint};

/// Why a candidate endpoint was passed over
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EndpointFailure {
    /// The endpoint serves another chain
    ChainIdMismatch {
        /// The chain ID the endpoint reported
        reported: u64,
    },
    /// Every query to the endpoint failed; holds the last error
    Unreachable(String),
}

/// Probe the candidate endpoints in order and return the first one serving
/// `expected_chain_id`.
///
/// `query_chain_id` is invoked at most `attempts_per_endpoint` times per
/// candidate; only errors are retried, a mismatched chain ID moves straight on
/// to the next candidate. No candidate after the first match is queried.
pub async fn probe_endpoints<F, Fut>(
    candidates: &[String],
    expected_chain_id: u64,
    attempts_per_endpoint: usize,
    mut query_chain_id: F,
) -> Result<ChainEndpoint, ScriptError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<u64, ClientError>>,
{
    let mut failures = Vec::with_capacity(candidates.len());

    for url in candidates {
        info!("probing RPC endpoint {url}");
        let failure =
            match probe_one(url, expected_chain_id, attempts_per_endpoint, &mut query_chain_id)
                .await
            {
                Ok(endpoint) => {
                    info!("using RPC endpoint {url} (chain ID {})", endpoint.chain_id);
                    return Ok(endpoint);
                }
                Err(failure) => failure,
            };

        match &failure {
            EndpointFailure::ChainIdMismatch { reported } => {
                warn!("{url} serves chain ID {reported}, expected {expected_chain_id}")
            }
            EndpointFailure::Unreachable(reason) => warn!("{url} is unreachable: {reason}"),
        }
        failures.push((url.clone(), failure));
    }

    Err(ScriptError::NoReachableEndpoint(describe_failures(expected_chain_id, &failures)))
}

/// Query a single endpoint until it answers or the attempts run out
async fn probe_one<F, Fut>(
    url: &str,
    expected_chain_id: u64,
    attempts: usize,
    query_chain_id: &mut F,
) -> Result<ChainEndpoint, EndpointFailure>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<u64, ClientError>>,
{
    let mut last_error = String::from("no attempts made");
    for _ in 0..attempts.max(1) {
        match query_chain_id(url.to_string()).await {
            Ok(chain_id) if chain_id == expected_chain_id => {
                return Ok(ChainEndpoint {
                    url: url.to_string(),
                    chain_id,
                    chain_id_matches: true,
                });
            }
            Ok(reported) => return Err(EndpointFailure::ChainIdMismatch { reported }),
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(EndpointFailure::Unreachable(last_error))
}

/// Summarize every rejected candidate into a single message
fn describe_failures(expected_chain_id: u64, failures: &[(String, EndpointFailure)]) -> String {
    if failures.is_empty() {
        return "no candidate endpoints configured".to_string();
    }

    let details = failures
        .iter()
        .map(|(url, failure)| match failure {
            EndpointFailure::ChainIdMismatch { reported } => format!("{url}: chain ID {reported}"),
            EndpointFailure::Unreachable(reason) => format!("{url}: {reason}"),
        })
        .collect::<Vec<_>>()
        .join("; ");

    format!("none of {} endpoints serves chain ID {expected_chain_id} ({details})", failures.len())
}
