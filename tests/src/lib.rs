//! Helpers for testing the marketplace scripts against an in-memory chain

pub mod mock_chain;
pub mod utils;
