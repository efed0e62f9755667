use super::{
    EvmConfig, ARCHIVAL_BALANCE_CONSENSUS, ARCHIVAL_BLOCK_NUMBER, BALANCE, BALANCE_BLOCK,
    BLOCK_NUMBER, METHOD_BLOCK_NUMBER, METHOD_GET_BALANCE, PERCEIVED_BLOCK_NUMBER,
};
use crate::{
    context::StateUpdateContext,
    definition::StateUpdater,
    state::{majority_value, ConsensusMap, Endpoint},
    types::EndpointAddr,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Tracks the perceived head, fixes the archival block and counts archival balances.
pub struct EvmStateUpdater {
    config: Arc<EvmConfig>,
}

impl EvmStateUpdater {
    pub(super) fn new(config: Arc<EvmConfig>) -> Self {
        Self { config }
    }

    fn update_perceived_head(&self, ctx: &mut StateUpdateContext<'_>) {
        let current = ctx.get_int_param(PERCEIVED_BLOCK_NUMBER);
        let reported = ctx
            .results()
            .iter()
            .filter(|r| r.method() == METHOD_BLOCK_NUMBER && r.is_valid())
            .filter_map(|r| r.get_int_value(BLOCK_NUMBER))
            .filter(|block| *block >= 0)
            .max();

        if let Some(reported) = reported {
            if current.map_or(true, |current| reported > current) {
                ctx.set_int_param(PERCEIVED_BLOCK_NUMBER, reported);
            }
        }
    }

    /// The archival block is computed once, from the first perceived head far enough from
    /// genesis, and never moves afterwards.
    fn fix_archival_block(&self, ctx: &mut StateUpdateContext<'_>) {
        if ctx.get_int_param(ARCHIVAL_BLOCK_NUMBER).is_some() {
            return;
        }
        let Some(head) = ctx.get_int_param(PERCEIVED_BLOCK_NUMBER) else {
            return;
        };
        let Ok(offset) = i64::try_from(self.config.archival_offset_blocks) else {
            return;
        };
        if head < offset {
            return;
        }

        debug!(head, archival = head - offset, "archival block fixed");
        ctx.set_int_param(ARCHIVAL_BLOCK_NUMBER, head - offset);
    }

    fn count_archival_balances(&self, ctx: &mut StateUpdateContext<'_>) {
        let Some(archival) = ctx.get_int_param(ARCHIVAL_BLOCK_NUMBER) else {
            return;
        };

        let mut reports: Vec<(EndpointAddr, String)> = Vec::new();
        for result in ctx.results() {
            if result.method() != METHOD_GET_BALANCE || !result.is_valid() {
                continue;
            }
            if result.get_int_value(BALANCE_BLOCK) != Some(archival) {
                continue;
            }
            let Some(balance) = result.get_str_value(BALANCE) else {
                continue;
            };

            let head = ctx
                .endpoint(result.endpoint_addr())
                .and_then(|e| e.get_int_result(METHOD_BLOCK_NUMBER, BLOCK_NUMBER));
            if head.map_or(true, |head| head < archival) {
                debug!(
                    endpoint = %result.endpoint_addr(),
                    head,
                    archival,
                    "skipping balance from endpoint behind the archival block"
                );
                continue;
            }

            reports.push((result.endpoint_addr().clone(), balance.to_string()));
        }

        if reports.is_empty() {
            return;
        }

        let mut consensus: ConsensusMap =
            ctx.get_consensus_param(ARCHIVAL_BALANCE_CONSENSUS).cloned().unwrap_or_default();
        for (_, balance) in &reports {
            *consensus.entry(balance.clone()).or_insert(0) += 1;
        }

        // Holders judged against the new majority include endpoints that reported before it
        // formed.
        if let Some((majority, majority_count)) = majority_value(&consensus) {
            let minority: Vec<(EndpointAddr, String)> = ctx
                .stored_endpoints()
                .filter(|e| e.active_sanction().is_none())
                .filter_map(|e| {
                    let balance = counted_balance(e, archival)?;
                    let count = consensus.get(balance).copied().unwrap_or(0);
                    (balance != majority && count < majority_count)
                        .then(|| (e.addr().clone(), balance.to_string()))
                })
                .collect();

            for (addr, balance) in minority {
                warn!(
                    endpoint = %addr,
                    balance = %balance,
                    majority = %majority,
                    "archival balance disagrees with majority"
                );
                ctx.sanction_endpoint(
                    addr,
                    format!("archival balance {balance} disagrees with majority {majority}"),
                    self.config.sanction_duration,
                );
            }
        }

        ctx.set_consensus_param(ARCHIVAL_BALANCE_CONSENSUS, consensus);
    }
}

/// Stored archival balance of an endpoint, if it was read at `archival` while the endpoint's
/// head had reached it.
fn counted_balance(endpoint: &Endpoint, archival: i64) -> Option<&str> {
    if endpoint.get_int_result(METHOD_GET_BALANCE, BALANCE_BLOCK) != Some(archival) {
        return None;
    }
    let head = endpoint.get_int_result(METHOD_BLOCK_NUMBER, BLOCK_NUMBER)?;
    if head < archival {
        return None;
    }
    endpoint.get_str_result(METHOD_GET_BALANCE, BALANCE)
}

impl StateUpdater for EvmStateUpdater {
    fn update_state(&self, ctx: &mut StateUpdateContext<'_>) {
        self.update_perceived_head(ctx);
        self.fix_archival_block(ctx);
        self.count_archival_balances(ctx);
    }
}
