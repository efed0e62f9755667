//! Per-service orchestration consumed by the gateway.
//!
//! - [`ServiceQos`]: binds one service's state to its strategy bundle
//! - [`RequestContext`]: per-request handle from parsing to client response
//! - [`ServiceQosRegistry`]: lookup of registered services by ID

mod registry;
mod request;
mod service;

pub use registry::ServiceQosRegistry;
pub use request::{BodyReadError, InboundRequest, RequestContext};
pub use service::ServiceQos;
