//! Cross-instance observation sharing.
//!
//! ```text
//!  instance A                                         instance B
//! ┌────────────────┐   QosObservations (JSON)   ┌────────────────────┐
//! │ RequestContext ├──► Messenger::publish ──►  │ Messenger listener │
//! └────────────────┘        ObservationBus      │  handle_message    │
//!                                               └─────────┬──────────┘
//!                                                         ▼
//!                                          ServiceQos::apply_observations
//! ```

pub mod bus;
pub mod messenger;
pub mod wire;

pub use bus::{BusError, LocalBus, ObservationBus};
pub use messenger::{Messenger, MessengerError, DEFAULT_TOPIC_PREFIX};
pub use wire::{
    EndpointObservation, ObservationError, ObservedRequest, ObservedRequestError, QosObservations,
};
