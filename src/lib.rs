#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Snapshot Gateway Crate
//!
//! A protocol-translation gateway that exposes a fixed catalog of
//! governance-data and governance-action operations over a JSON-RPC
//! envelope, fulfilling each one against the Snapshot GraphQL hub and its
//! signing sequencer.
//!
//! ## Overview
//!
//! The gateway is driven by an external conversational agent speaking the
//! MCP flavour of JSON-RPC over HTTP. Each request flows one direction:
//! transport → dispatcher → catalog entry → (data client | action client)
//! → upstream service, with the outcome re-wrapped at each layer on the
//! way back. Three layers matter:
//!
//! 1. The **operation catalog** ([`catalog`]): fourteen named operations,
//!    each with a declared input schema and a handler that folds every
//!    outcome into a uniform `{status, data | error}` wrapper.
//! 2. The **data client** ([`client::SnapshotClient`]): parameterized
//!    GraphQL queries behind an advisory sliding-window rate limit.
//! 3. The **action client** ([`client::SequencerClient`]): owns the
//!    process's single signing identity and submits signed, irreversible
//!    governance actions (proposals, votes, follows) to the sequencer.
//!
//! Nothing is persisted between requests beyond the in-memory rate window
//! and the signing identity, both owned by the [`context::GatewayContext`].

/// The fixed catalog of governance operations.
pub mod catalog;
/// Upstream data and action clients.
pub mod client;
/// A module for configuring the gateway.
pub mod config;
/// A module for managing the context of the gateway.
pub mod context;
/// Transport front-end: warp routes and envelope encoding.
pub mod handler;
/// A module used for debugging the gateway lifecycle and upstream calls.
pub mod probe;
/// JSON-RPC envelope types and the method dispatcher.
pub mod rpc;

mod error;
pub use error::{Error, Result};
