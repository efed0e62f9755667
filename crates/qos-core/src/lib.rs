//! # QoS Core
//!
//! Endpoint quality-of-service engine for a blockchain RPC gateway.
//!
//! The gateway routes each client request to one of many third-party backend nodes
//! ("endpoints") of unknown and time-varying health. This crate decides, per blockchain
//! service, which endpoints are currently trustworthy, builds synthetic probes to keep that
//! judgment current, reconciles conflicting endpoint reports with a majority count, and shares
//! every locally observed signal with the rest of the gateway fleet.
//!
//! - **[`state`]**: per-service parameters and per-endpoint results behind one read/write lock
//! - **[`journal`]**: per-request record of the parsed request and endpoint results
//! - **[`context`]**: request-scoped views handed to service strategies
//! - **[`definition`]**: the four pluggable strategies of a service
//! - **[`qos`]**: orchestration consumed by the gateway
//! - **[`observation`]**: wire model, bus contract and messenger for cross-instance sharing
//! - **[`evm`]**: reference strategy for EVM chains (archival balance consensus)
//! - **[`config`]**, **[`logging`]**, **[`metrics`]**: ambient setup
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        ServiceQosRegistry                    │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │ ServiceQos ("eth")                                     │  │
//! │  │  ┌──────────────────┐      ┌────────────────────────┐  │  │
//! │  │  │   ServiceState   │      │     QosDefinition      │  │  │
//! │  │  │  parameters      │◄─────┤  ProbeBuilder          │  │  │
//! │  │  │  EndpointStore   │ ctx  │  ResultBuilder/method  │  │  │
//! │  │  └──────────────────┘      │  StateUpdater          │  │  │
//! │  │                            │  EndpointSelector      │  │  │
//! │  │                            └────────────────────────┘  │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────▲───────────────────────────────┘
//!                                │ apply_observations
//!                      ┌─────────┴─────────┐
//!                      │     Messenger     │◄──── ObservationBus
//!                      └───────────────────┘
//! ```
//!
//! ## Request Flow
//!
//! ```text
//! HTTP request
//!       │
//!       ▼
//! ┌──────────────────────┐
//! │ parse_http_request   │ ─── invalid ──► JSON-RPC error (retryable: "false")
//! └──────────┬───────────┘
//!            │ RequestContext
//!            ▼
//! ┌──────────────────────┐
//! │ select_endpoint      │
//! └──────────┬───────────┘
//!            │ dispatch (gateway)
//!            ▼
//! ┌──────────────────────┐
//! │ record_endpoint_     │ ─── empty / unparseable / invalid ──► retry elsewhere
//! │ response             │
//! └──────────┬───────────┘
//!            │
//!            ├──► client_response
//!            ├──► apply ──────────────► ServiceState merged
//!            └──► Messenger::publish ─► other instances apply the same journal
//! ```
//!
//! ## Example
//!
//! ```
//! use qos_core::{
//!     definition::QosDefinition,
//!     qos::ServiceQos,
//!     types::{EndpointAddr, ServiceId},
//! };
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let qos = Arc::new(ServiceQos::new(ServiceId::new("eth"), QosDefinition::default(), 100));
//!
//! let http_request = http::Request::builder()
//!     .method("POST")
//!     .body(r#"{"jsonrpc":"2.0","method":"eth_chainId","id":1}"#)
//!     .unwrap();
//! let mut ctx = qos.parse_http_request(&http_request);
//! assert!(ctx.should_continue());
//!
//! let endpoint = ctx.select_endpoint(&[EndpointAddr::new("node-1")]).unwrap();
//! ctx.record_endpoint_response(
//!     &endpoint,
//!     Bytes::from_static(br#"{"jsonrpc":"2.0","id":1,"result":"0x1"}"#),
//! )
//! .unwrap();
//!
//! assert_eq!(ctx.client_response().result, Some(serde_json::json!("0x1")));
//! ctx.apply().unwrap();
//! assert_eq!(qos.state().endpoint_count(), 1);
//! ```

pub mod config;
pub mod context;
pub mod definition;
pub mod errors;
pub mod evm;
pub mod journal;
pub mod logging;
pub mod metrics;
pub mod observation;
pub mod qos;
pub mod state;
pub mod types;
pub mod validation;
