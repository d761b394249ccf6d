//! Scripts for deploying, linking and diagnosing the marketplace contracts.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod artifact;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod constants;
pub mod endpoint;
pub mod errors;
pub mod orchestrator;
pub mod solidity;
pub mod types;
pub mod utils;
pub mod verification;
