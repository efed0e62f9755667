//! Integration Tests for the QoS Engine
//!
//! This crate contains various test modules:
//!
//! - `request_flow_tests`: client requests from HTTP parsing to client response and state merge
//! - `evm_consensus_tests`: probe rounds, archival balance consensus, sanctions and selection
//! - `observation_sharing_tests`: two instances converging over a shared `LocalBus`
//! - `concurrency_tests`: torn-read freedom and lost-update freedom of the service state
//! - `mock_infrastructure`: scripted endpoints and helpers shared by the tests
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package tests
//! ```

#[cfg(test)]
mod request_flow_tests;

#[cfg(test)]
mod evm_consensus_tests;

#[cfg(test)]
mod observation_sharing_tests;

#[cfg(test)]
mod concurrency_tests;

/// Mock infrastructure for testing
pub mod mock_infrastructure;
