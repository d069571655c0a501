//! Protocol definitions for the Trellis endpoint dispatch core.
//!
//! This crate provides the wire-facing types shared between the transport
//! layer and the dispatch machinery in `trellis-rpc`:
//!
//! - [`RequestContext`] - Per-request transport context (auth key, peer info)
//! - [`DispatchOutcome`] - Closed result taxonomy for a dispatched call
//! - [`EndpointDescription`] - Structured `describe()` output for tooling
//!
//! # Architecture
//!
//! The transport layer hands `(uri, body, RequestContext)` to an endpoint's
//! `dispatch` and receives exactly one [`DispatchOutcome`] back. It never sees
//! an error type: every failure mode is a taxonomy variant, and
//! [`DispatchOutcome::http_status`] maps each variant to a wire status code.
//!
//! # Protocol Constants
//!
//! - [`MAX_REQUEST_BODY_BYTES`] - Maximum request body size (1 MB)
//! - [`MAX_PAYLOAD_BYTES`] - Maximum success payload size (4 MB)

pub mod messages;

// Re-export all public types for convenience
pub use messages::*;
