//! Pluggable per-service strategies.
//!
//! A blockchain service customizes the engine through four capabilities, each a trait object
//! composed into one [`QosDefinition`] at registration:
//!
//! - [`ProbeBuilder`]: which synthetic requests keep an endpoint's quality view current
//! - [`ResultBuilder`]: which typed attributes to extract from a response to one method
//! - [`StateUpdater`]: how freshly merged results evolve the service parameters
//! - [`EndpointSelector`]: which endpoint should serve a request
//!
//! Every capability has a neutral default, so a definition only names what it changes:
//!
//! ```
//! use qos_core::{
//!     context::EndpointQueryResultContext,
//!     definition::{QosDefinition, ResultBuilder},
//!     journal::EndpointQueryResult,
//! };
//! use std::sync::Arc;
//!
//! struct ChainIdBuilder;
//!
//! impl ResultBuilder for ChainIdBuilder {
//!     fn build_result(
//!         &self,
//!         _ctx: &EndpointQueryResultContext<'_>,
//!         result: EndpointQueryResult,
//!     ) -> EndpointQueryResult {
//!         match result.result_value().and_then(|v| v.as_str()).map(str::to_string) {
//!             Some(chain_id) => result.with_str_value("chain_id", chain_id),
//!             None => result,
//!         }
//!     }
//! }
//!
//! let definition = QosDefinition::builder()
//!     .result_builder("eth_chainId", Arc::new(ChainIdBuilder))
//!     .build();
//! assert!(definition.has_result_builder("eth_chainId"));
//! ```

use crate::{
    context::{
        EndpointQualityChecksContext, EndpointQueryResultContext, EndpointSelectionContext,
        StateUpdateContext,
    },
    journal::EndpointQueryResult,
    types::{EndpointAddr, JsonRpcRequest},
};
use ahash::AHashMap;
use std::{fmt, sync::Arc};

/// Decides which synthetic requests to send to one endpoint.
pub trait ProbeBuilder: Send + Sync {
    fn build_probes(&self, ctx: &EndpointQualityChecksContext<'_>) -> Vec<JsonRpcRequest>;
}

/// Extracts typed attributes from a validated response to one method.
pub trait ResultBuilder: Send + Sync {
    fn build_result(
        &self,
        ctx: &EndpointQueryResultContext<'_>,
        result: EndpointQueryResult,
    ) -> EndpointQueryResult;
}

/// Evolves service parameters after results were merged into the endpoint store.
///
/// Runs under the service's write lock; implementations must stay in-memory and short.
pub trait StateUpdater: Send + Sync {
    fn update_state(&self, ctx: &mut StateUpdateContext<'_>);
}

/// Picks the endpoint that should serve a request.
pub trait EndpointSelector: Send + Sync {
    fn select_endpoint(&self, ctx: &EndpointSelectionContext<'_>) -> Option<EndpointAddr>;
}

/// Sends no probes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProbes;

impl ProbeBuilder for NoProbes {
    fn build_probes(&self, _ctx: &EndpointQualityChecksContext<'_>) -> Vec<JsonRpcRequest> {
        Vec::new()
    }
}

/// Records no typed attributes.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughResultBuilder;

impl ResultBuilder for PassthroughResultBuilder {
    fn build_result(
        &self,
        _ctx: &EndpointQueryResultContext<'_>,
        result: EndpointQueryResult,
    ) -> EndpointQueryResult {
        result
    }
}

/// Leaves parameters untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStateUpdater;

impl StateUpdater for NoopStateUpdater {
    fn update_state(&self, _ctx: &mut StateUpdateContext<'_>) {}
}

/// Picks the first candidate without an active sanction.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstAvailableSelector;

impl EndpointSelector for FirstAvailableSelector {
    fn select_endpoint(&self, ctx: &EndpointSelectionContext<'_>) -> Option<EndpointAddr> {
        ctx.unsanctioned_candidates().next().cloned()
    }
}

/// The strategy bundle of one blockchain service.
#[derive(Clone)]
pub struct QosDefinition {
    probe_builder: Arc<dyn ProbeBuilder>,
    result_builders: AHashMap<String, Arc<dyn ResultBuilder>>,
    default_result_builder: Arc<dyn ResultBuilder>,
    state_updater: Arc<dyn StateUpdater>,
    endpoint_selector: Arc<dyn EndpointSelector>,
}

impl QosDefinition {
    #[must_use]
    pub fn builder() -> QosDefinitionBuilder {
        QosDefinitionBuilder::default()
    }

    #[must_use]
    pub fn probe_builder(&self) -> &dyn ProbeBuilder {
        self.probe_builder.as_ref()
    }

    /// Result builder registered for `method`, or the passthrough default.
    #[must_use]
    pub fn result_builder(&self, method: &str) -> &dyn ResultBuilder {
        self.result_builders.get(method).unwrap_or(&self.default_result_builder).as_ref()
    }

    #[must_use]
    pub fn has_result_builder(&self, method: &str) -> bool {
        self.result_builders.contains_key(method)
    }

    #[must_use]
    pub fn state_updater(&self) -> &dyn StateUpdater {
        self.state_updater.as_ref()
    }

    #[must_use]
    pub fn endpoint_selector(&self) -> &dyn EndpointSelector {
        self.endpoint_selector.as_ref()
    }
}

impl Default for QosDefinition {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for QosDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&str> = self.result_builders.keys().map(String::as_str).collect();
        methods.sort_unstable();
        f.debug_struct("QosDefinition").field("result_builders", &methods).finish_non_exhaustive()
    }
}

/// Builder for [`QosDefinition`]; unset capabilities fall back to the neutral defaults.
#[derive(Default)]
pub struct QosDefinitionBuilder {
    probe_builder: Option<Arc<dyn ProbeBuilder>>,
    result_builders: AHashMap<String, Arc<dyn ResultBuilder>>,
    state_updater: Option<Arc<dyn StateUpdater>>,
    endpoint_selector: Option<Arc<dyn EndpointSelector>>,
}

impl QosDefinitionBuilder {
    #[must_use]
    pub fn probe_builder(mut self, builder: Arc<dyn ProbeBuilder>) -> Self {
        self.probe_builder = Some(builder);
        self
    }

    /// Registers the result builder for one method, replacing any earlier registration.
    #[must_use]
    pub fn result_builder(
        mut self,
        method: impl Into<String>,
        builder: Arc<dyn ResultBuilder>,
    ) -> Self {
        self.result_builders.insert(method.into(), builder);
        self
    }

    #[must_use]
    pub fn state_updater(mut self, updater: Arc<dyn StateUpdater>) -> Self {
        self.state_updater = Some(updater);
        self
    }

    #[must_use]
    pub fn endpoint_selector(mut self, selector: Arc<dyn EndpointSelector>) -> Self {
        self.endpoint_selector = Some(selector);
        self
    }

    #[must_use]
    pub fn build(self) -> QosDefinition {
        QosDefinition {
            probe_builder: self.probe_builder.unwrap_or_else(|| Arc::new(NoProbes)),
            result_builders: self.result_builders,
            default_result_builder: Arc::new(PassthroughResultBuilder),
            state_updater: self.state_updater.unwrap_or_else(|| Arc::new(NoopStateUpdater)),
            endpoint_selector: self
                .endpoint_selector
                .unwrap_or_else(|| Arc::new(FirstAvailableSelector)),
        }
    }
}
