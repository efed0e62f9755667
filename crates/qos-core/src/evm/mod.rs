//! Reference strategy for EVM-compatible chains.
//!
//! # Archival Balance Consensus
//!
//! The strategy keeps three service parameters:
//!
//! | Parameter | Kind | Meaning |
//! |-----------|------|---------|
//! | [`PERCEIVED_BLOCK_NUMBER`] | int | highest head reported by any endpoint |
//! | [`ARCHIVAL_BLOCK_NUMBER`] | int | fixed reference block, `head - archival_offset_blocks` |
//! | [`ARCHIVAL_BALANCE_CONSENSUS`] | consensus | balance at the archival block → endpoints reporting it |
//!
//! Endpoints are probed with `eth_blockNumber` and, once the archival block is known,
//! `eth_getBalance(balance_address, archival_block)`. Each balance report from an endpoint whose
//! head has reached the archival block increments its value's count. The majority value is
//! the canonical answer; endpoints reporting a minority value are sanctioned.
//!
//! Selection skips sanctioned endpoints and endpoints lagging the perceived head, and prefers
//! endpoints that agree with the majority balance.

mod consensus;
pub mod quantity;
mod selection;

pub use consensus::EvmStateUpdater;
pub use selection::EvmEndpointSelector;

use crate::{
    context::{EndpointQualityChecksContext, EndpointQueryResultContext},
    definition::{ProbeBuilder, QosDefinition, ResultBuilder},
    journal::EndpointQueryResult,
    types::JsonRpcRequest,
};
use quantity::{normalize_balance, parse_quantity, to_quantity};
use serde_json::json;
use std::{sync::Arc, time::Duration};

pub const PERCEIVED_BLOCK_NUMBER: &str = "perceived_block_number";
pub const ARCHIVAL_BLOCK_NUMBER: &str = "archival_block_number";
pub const ARCHIVAL_BALANCE_CONSENSUS: &str = "archival_balance_consensus";

pub const METHOD_BLOCK_NUMBER: &str = "eth_blockNumber";
pub const METHOD_GET_BALANCE: &str = "eth_getBalance";

/// Integer attribute of an `eth_blockNumber` result: the reported head.
pub const BLOCK_NUMBER: &str = "block_number";
/// Integer attribute of an `eth_blockNumber` result: distance below the perceived head.
pub const BLOCKS_BEHIND: &str = "blocks_behind";
/// String attribute of an `eth_getBalance` result: the normalized balance.
pub const BALANCE: &str = "balance";
/// Integer attribute of an `eth_getBalance` result: the block the balance was read at.
pub const BALANCE_BLOCK: &str = "balance_block";

pub const DEFAULT_ARCHIVAL_OFFSET_BLOCKS: u64 = 128;
pub const DEFAULT_MAX_BLOCK_LAG: u64 = 5;
pub const DEFAULT_SANCTION_DURATION: Duration = Duration::from_secs(300);

/// Tunables of the EVM strategy.
#[derive(Debug, Clone)]
pub struct EvmConfig {
    /// Distance of the archival reference block below the perceived head.
    pub archival_offset_blocks: u64,
    /// Account whose historical balance is compared across endpoints.
    pub balance_address: String,
    /// Endpoints further behind the perceived head are not selected.
    pub max_block_lag: u64,
    /// How long an endpoint reporting a minority balance is excluded.
    pub sanction_duration: Duration,
}

impl Default for EvmConfig {
    fn default() -> Self {
        Self {
            archival_offset_blocks: DEFAULT_ARCHIVAL_OFFSET_BLOCKS,
            balance_address: "0x0000000000000000000000000000000000000000".to_string(),
            max_block_lag: DEFAULT_MAX_BLOCK_LAG,
            sanction_duration: DEFAULT_SANCTION_DURATION,
        }
    }
}

impl From<&crate::config::ArchivalConfig> for EvmConfig {
    fn from(config: &crate::config::ArchivalConfig) -> Self {
        Self { archival_offset_blocks: config.archival_offset_blocks, ..Self::default() }
    }
}

/// Assembles the EVM strategy bundle.
pub struct EvmQosDefinition;

impl EvmQosDefinition {
    #[must_use]
    pub fn build(config: EvmConfig) -> QosDefinition {
        let config = Arc::new(config);
        QosDefinition::builder()
            .probe_builder(Arc::new(EvmProbeBuilder { config: Arc::clone(&config) }))
            .result_builder(METHOD_BLOCK_NUMBER, Arc::new(BlockNumberResultBuilder))
            .result_builder(METHOD_GET_BALANCE, Arc::new(BalanceResultBuilder))
            .state_updater(Arc::new(EvmStateUpdater::new(Arc::clone(&config))))
            .endpoint_selector(Arc::new(EvmEndpointSelector::new(config)))
            .build()
    }
}

/// Probes the head of every endpoint, and its archival balance until it has reported one
/// while at or past the archival block.
pub struct EvmProbeBuilder {
    config: Arc<EvmConfig>,
}

impl ProbeBuilder for EvmProbeBuilder {
    fn build_probes(&self, ctx: &EndpointQualityChecksContext<'_>) -> Vec<JsonRpcRequest> {
        let mut probes =
            vec![JsonRpcRequest::new(METHOD_BLOCK_NUMBER, Some(json!([])), json!(1))];

        let Some(archival) = ctx.get_int_param(ARCHIVAL_BLOCK_NUMBER) else {
            return probes;
        };
        // Balances reported while behind the archival block were not counted.
        let reported = ctx.get_int_result(METHOD_GET_BALANCE, BALANCE_BLOCK) == Some(archival);
        let caught_up = ctx
            .get_int_result(METHOD_BLOCK_NUMBER, BLOCK_NUMBER)
            .is_some_and(|head| head >= archival);
        if reported && caught_up {
            return probes;
        }
        let Ok(archival) = u64::try_from(archival) else {
            return probes;
        };

        probes.push(JsonRpcRequest::new(
            METHOD_GET_BALANCE,
            Some(json!([self.config.balance_address, to_quantity(archival)])),
            json!(2),
        ));
        probes
    }
}

/// Records the reported head and how far it trails the perceived head.
pub struct BlockNumberResultBuilder;

impl ResultBuilder for BlockNumberResultBuilder {
    fn build_result(
        &self,
        ctx: &EndpointQueryResultContext<'_>,
        result: EndpointQueryResult,
    ) -> EndpointQueryResult {
        let Some(block) = result
            .result_value()
            .and_then(serde_json::Value::as_str)
            .and_then(parse_quantity)
            .and_then(|n| i64::try_from(n).ok())
        else {
            return result;
        };

        let behind =
            ctx.get_int_param(PERCEIVED_BLOCK_NUMBER).map(|head| head.saturating_sub(block).max(0));
        let result = result.with_int_value(BLOCK_NUMBER, block);
        match behind {
            Some(behind) => result.with_int_value(BLOCKS_BEHIND, behind),
            None => result,
        }
    }
}

/// Records the normalized balance and the block it was requested at.
pub struct BalanceResultBuilder;

impl ResultBuilder for BalanceResultBuilder {
    fn build_result(
        &self,
        ctx: &EndpointQueryResultContext<'_>,
        result: EndpointQueryResult,
    ) -> EndpointQueryResult {
        let Some(balance) =
            result.result_value().and_then(serde_json::Value::as_str).map(normalize_balance)
        else {
            return result;
        };

        let block = ctx
            .request()
            .params
            .as_ref()
            .and_then(|params| params.get(1))
            .and_then(serde_json::Value::as_str)
            .and_then(parse_quantity)
            .and_then(|n| i64::try_from(n).ok());

        let result = result.with_str_value(BALANCE, balance);
        match block {
            Some(block) => result.with_int_value(BALANCE_BLOCK, block),
            None => result,
        }
    }
}
