use crate::{
    state::{ConsensusMap, Endpoint, Sanction, StateData},
    types::{EndpointAddr, JsonRpcRequest},
};

/// Read-only view handed to an [`EndpointSelector`](crate::definition::EndpointSelector).
pub struct EndpointSelectionContext<'a> {
    state: &'a StateData,
    request: &'a JsonRpcRequest,
    candidates: &'a [EndpointAddr],
}

impl<'a> EndpointSelectionContext<'a> {
    pub(crate) fn new(
        state: &'a StateData,
        request: &'a JsonRpcRequest,
        candidates: &'a [EndpointAddr],
    ) -> Self {
        Self { state, request, candidates }
    }

    #[must_use]
    pub fn request(&self) -> &JsonRpcRequest {
        self.request
    }

    /// Endpoints the relay layer can currently dispatch to.
    #[must_use]
    pub fn candidates(&self) -> &[EndpointAddr] {
        self.candidates
    }

    #[must_use]
    pub fn endpoint(&self, addr: &EndpointAddr) -> Option<&Endpoint> {
        self.state.endpoint(addr)
    }

    /// Sanction in force for `addr`, if any. Expired sanctions are not reported.
    #[must_use]
    pub fn active_sanction(&self, addr: &EndpointAddr) -> Option<&Sanction> {
        self.state.endpoint(addr).and_then(Endpoint::active_sanction)
    }

    /// Candidates without an active sanction, in candidate order.
    pub fn unsanctioned_candidates(&self) -> impl Iterator<Item = &EndpointAddr> {
        self.candidates.iter().filter(|addr| self.active_sanction(addr).is_none())
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
