//! Request-scoped views over [`ServiceState`](crate::state::ServiceState).
//!
//! Each context borrows the state under its read lock for the duration of one strategy call
//! and exposes a narrow capability on top of the read-only view:
//!
//! | Context | Strategy | Capability |
//! |---------|----------|------------|
//! | [`EndpointQueryResultContext`] | `ResultBuilder` | annotate a result being built |
//! | [`EndpointQualityChecksContext`] | `ProbeBuilder` | read one endpoint's stored results |
//! | [`StateUpdateContext`] | `StateUpdater` | stage parameter updates and sanctions |
//! | [`EndpointSelectionContext`] | `EndpointSelector` | inspect candidates and sanctions |

pub mod quality_checks;
pub mod result;
pub mod selection;
pub mod state_update;

pub use quality_checks::EndpointQualityChecksContext;
pub use result::EndpointQueryResultContext;
pub use selection::EndpointSelectionContext;
pub use state_update::StateUpdateContext;
