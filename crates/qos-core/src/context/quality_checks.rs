use crate::{
    state::{ConsensusMap, Endpoint, StateData},
    types::EndpointAddr,
};

/// Read-only view handed to a [`ProbeBuilder`](crate::definition::ProbeBuilder).
///
/// Exposes the service parameters and what is already known about the endpoint being probed.
/// Deciding what to ask is all that happens here; dispatch belongs to the relay layer.
pub struct EndpointQualityChecksContext<'a> {
    state: &'a StateData,
    endpoint_addr: &'a EndpointAddr,
}

impl<'a> EndpointQualityChecksContext<'a> {
    pub(crate) fn new(state: &'a StateData, endpoint_addr: &'a EndpointAddr) -> Self {
        Self { state, endpoint_addr }
    }

    #[must_use]
    pub fn endpoint_addr(&self) -> &EndpointAddr {
        self.endpoint_addr
    }

    /// Stored results of the endpoint, if it has been observed before.
    #[must_use]
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.state.endpoint(self.endpoint_addr)
    }

    #[must_use]
    pub fn get_str_result(&self, method: &str, key: &str) -> Option<&str> {
        self.endpoint().and_then(|e| e.get_str_result(method, key))
    }

    #[must_use]
    pub fn get_int_result(&self, method: &str, key: &str) -> Option<i64> {
        self.endpoint().and_then(|e| e.get_int_result(method, key))
    }

    #[must_use]
    pub fn get_str_param(&self, name: &str) -> Option<&str> {
        self.state.get_str_param(name)
    }

    #[must_use]
    pub fn get_int_param(&self, name: &str) -> Option<i64> {
        self.state.get_int_param(name)
    }

    #[must_use]
    pub fn get_consensus_param(&self, name: &str) -> Option<&ConsensusMap> {
        self.state.get_consensus_param(name)
    }
}
