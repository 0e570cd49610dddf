//! # han-protocol
//!
//! Wire types and endpoint construction for the han state-debugging protocol.
//!
//! A han server exposes two surfaces:
//!
//! - **WebSocket** (`ws://{authority}/...`): a write-only `action` channel
//!   the debugger dispatches actions into, and one read-only
//!   `state/{path}` channel per watched path that pushes a text frame
//!   whenever state under that path changes.
//! - **HTTP** (`http://{authority}/debug/...`): `GET states` returning the
//!   full ordered snapshot timeline, and `POST state` requesting a
//!   time-travel switch to a given snapshot id.
//!
//! This crate owns the JSON shapes on those surfaces and nothing else.
//! Payloads the protocol treats as opaque stay [`serde_json::Value`] so
//! arbitrary server data round-trips verbatim.
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by `han-client` and `han-cli`.

pub mod endpoints;
pub mod snapshot;

pub use snapshot::{Action, Diff, SelectStateRequest, Snapshot, SnapshotId, StatesResponse};

/// The root state path. Watching it subscribes to every change in the tree.
pub const ROOT_PATH: &str = "$";
