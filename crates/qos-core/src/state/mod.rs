//! Service quality state: named parameters plus per-endpoint results.
//!
//! - [`parameter`]: [`StateParameter`] tagged values and staged [`ParameterUpdates`]
//! - [`endpoint`]: [`Endpoint`] result slots, [`Sanction`]s, and the bounded [`EndpointStore`]
//! - [`service_state`]: [`ServiceState`], the lock-protected single write path

pub mod endpoint;
pub mod parameter;
pub mod service_state;

pub use endpoint::{Endpoint, EndpointStore, Sanction};
pub use parameter::{majority_value, ConsensusMap, ParameterUpdates, StateParameter};
pub use service_state::{MergeOutcome, ServiceState, StateData, StateUpdate};
