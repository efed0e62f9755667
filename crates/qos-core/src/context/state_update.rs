use crate::{
    journal::EndpointQueryResult,
    state::{ConsensusMap, Endpoint, Sanction, StateData, StateParameter, StateUpdate},
    types::EndpointAddr,
};
use std::time::Duration;

/// View handed to a [`StateUpdater`](crate::definition::StateUpdater) after a merge.
///
/// Setters stage values into a pending [`StateUpdate`]; nothing touches shared state until
/// the orchestrator applies the staged set. Getters see staged values first, so an updater
/// can derive one parameter from another it just set.
pub struct StateUpdateContext<'a> {
    state: &'a StateData,
    updated_endpoints: &'a [Endpoint],
    results: &'a [EndpointQueryResult],
    staged: StateUpdate,
}

impl<'a> StateUpdateContext<'a> {
    pub(crate) fn new(
        state: &'a StateData,
        updated_endpoints: &'a [Endpoint],
        results: &'a [EndpointQueryResult],
    ) -> Self {
        Self { state, updated_endpoints, results, staged: StateUpdate::default() }
    }

    /// Endpoints whose stored results changed in this round.
    #[must_use]
    pub fn updated_endpoints(&self) -> &[Endpoint] {
        self.updated_endpoints
    }

    /// Results merged in this round, in journal order.
    #[must_use]
    pub fn results(&self) -> &[EndpointQueryResult] {
        self.results
    }

    /// Current stored view of any endpoint, including ones not updated this round.
    #[must_use]
    pub fn endpoint(&self, addr: &EndpointAddr) -> Option<&Endpoint> {
        self.state.endpoint(addr)
    }

    /// Every stored endpoint, with this round's results already merged.
    pub fn stored_endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.state.endpoints().iter()
    }

    #[must_use]
    pub fn get_str_param(&self, name: &str) -> Option<&str> {
        match self.staged.parameters.get(name) {
            Some(staged) => staged.as_str(),
            None => self.state.get_str_param(name),
        }
    }

    #[must_use]
    pub fn get_int_param(&self, name: &str) -> Option<i64> {
        match self.staged.parameters.get(name) {
            Some(staged) => staged.as_int(),
            None => self.state.get_int_param(name),
        }
    }

    #[must_use]
    pub fn get_consensus_param(&self, name: &str) -> Option<&ConsensusMap> {
        match self.staged.parameters.get(name) {
            Some(staged) => staged.as_consensus(),
            None => self.state.get_consensus_param(name),
        }
    }

    pub fn set_str_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.staged.parameters.set(name, StateParameter::Str(value.into()));
    }

    pub fn set_int_param(&mut self, name: impl Into<String>, value: i64) {
        self.staged.parameters.set(name, StateParameter::Int(value));
    }

    pub fn set_consensus_param(&mut self, name: impl Into<String>, value: ConsensusMap) {
        self.staged.parameters.set(name, StateParameter::Consensus(value));
    }

    /// Stages a time-bounded exclusion of `addr` from endpoint selection.
    pub fn sanction_endpoint(
        &mut self,
        addr: EndpointAddr,
        reason: impl Into<String>,
        duration: Duration,
    ) {
        self.staged.sanctions.push((addr, Sanction::new(reason, duration)));
    }

    pub(crate) fn into_update(self) -> StateUpdate {
        self.staged
    }
}
