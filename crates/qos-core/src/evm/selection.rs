use super::{
    EvmConfig, ARCHIVAL_BALANCE_CONSENSUS, ARCHIVAL_BLOCK_NUMBER, BALANCE, BALANCE_BLOCK,
    BLOCK_NUMBER, METHOD_BLOCK_NUMBER, METHOD_GET_BALANCE, PERCEIVED_BLOCK_NUMBER,
};
use crate::{
    context::EndpointSelectionContext,
    definition::EndpointSelector,
    state::{majority_value, Endpoint},
    types::EndpointAddr,
};
use std::{cmp::Reverse, sync::Arc};

/// How an endpoint's archival balance relates to the current majority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Agreement {
    Disagrees,
    Unknown,
    Agrees,
}

/// Excludes sanctioned and lagging endpoints, then prefers majority agreement and height.
///
/// Endpoints that have never reported a head are kept: they cannot be judged yet and are
/// probed like any other. If every candidate is excluded, the first unsanctioned candidate is
/// returned so requests keep flowing while the endpoint set recovers.
pub struct EvmEndpointSelector {
    config: Arc<EvmConfig>,
}

impl EvmEndpointSelector {
    pub(super) fn new(config: Arc<EvmConfig>) -> Self {
        Self { config }
    }

    fn is_lagging(&self, endpoint: Option<&Endpoint>, head: Option<i64>) -> bool {
        let reported = endpoint.and_then(|e| e.get_int_result(METHOD_BLOCK_NUMBER, BLOCK_NUMBER));
        match (reported, head, i64::try_from(self.config.max_block_lag)) {
            (Some(reported), Some(head), Ok(max_lag)) => head.saturating_sub(reported) > max_lag,
            _ => false,
        }
    }
}

impl EndpointSelector for EvmEndpointSelector {
    fn select_endpoint(&self, ctx: &EndpointSelectionContext<'_>) -> Option<EndpointAddr> {
        let head = ctx.get_int_param(PERCEIVED_BLOCK_NUMBER);
        let archival = ctx.get_int_param(ARCHIVAL_BLOCK_NUMBER);
        let majority = ctx
            .get_consensus_param(ARCHIVAL_BALANCE_CONSENSUS)
            .and_then(majority_value)
            .map(|(value, _)| value);

        let agreement = |endpoint: Option<&Endpoint>| -> Agreement {
            let Some(majority) = majority else {
                return Agreement::Unknown;
            };
            let reported = endpoint.and_then(|e| {
                (e.get_int_result(METHOD_GET_BALANCE, BALANCE_BLOCK) == archival)
                    .then(|| e.get_str_result(METHOD_GET_BALANCE, BALANCE))
                    .flatten()
            });
            match reported {
                Some(balance) if balance == majority => Agreement::Agrees,
                Some(_) => Agreement::Disagrees,
                None => Agreement::Unknown,
            }
        };

        let best = ctx
            .unsanctioned_candidates()
            .enumerate()
            .filter_map(|(position, addr)| {
                let endpoint = ctx.endpoint(addr);
                if self.is_lagging(endpoint, head) {
                    return None;
                }
                let height = endpoint
                    .and_then(|e| e.get_int_result(METHOD_BLOCK_NUMBER, BLOCK_NUMBER))
                    .filter(|height| *height >= 0)
                    .unwrap_or(-1);
                Some(((agreement(endpoint), height, Reverse(position)), addr))
            })
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, addr)| addr.clone());

        best.or_else(|| ctx.unsanctioned_candidates().next().cloned())
    }
}
