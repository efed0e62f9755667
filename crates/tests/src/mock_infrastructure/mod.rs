//! Mock infrastructure for exercising the QoS engine without a network.
//!
//! ## Components
//!
//! - `MockEndpoint`: a scripted EVM node answering head and balance queries
//! - `MockFleet`: a set of mock endpoints plus helpers that drive probe rounds through
//!   `RequestContext` exactly as a gateway would
//! - Test helpers for common payloads and journals
//!
//! ## Usage
//!
//! ```ignore
//! use tests::mock_infrastructure::{MockEndpoint, MockFleet};
//!
//! let fleet = MockFleet::new(vec![MockEndpoint::new("node-1", 100, 500)]);
//! let observations = fleet.run_quality_checks(&qos);
//! ```

pub mod endpoint_mock;
pub mod test_helpers;

pub use endpoint_mock::{Behavior, MockEndpoint, MockFleet};
pub use test_helpers::*;
