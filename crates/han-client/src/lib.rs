//! # han-client
//!
//! Client library for the han state-debugging protocol.
//!
//! Two layers:
//!
//! - **[`ChangeStreamClient`]**: owns the socket surface — the write-only
//!   action channel and one read-only change stream per watched state path.
//! - **[`DebugSessionClient`]**: the debugger session — bridges change
//!   notifications to full snapshot-list refreshes over HTTP, and forwards
//!   dispatch and time-travel commands.
//!
//! Data flow: server pushes a change frame → the root watch schedules a
//! refresh → `GET /debug/states` replaces the in-memory timeline → the
//! session's revision counter bumps so a UI can re-render. The notification
//! payload itself is never parsed; a frame only means "something changed",
//! and truth is always re-derived from the one canonical GET endpoint.
//!
//! Refreshes triggered by overlapping notifications may complete out of
//! order; every refresh carries a monotonic sequence number and stale
//! completions are discarded, so the timeline always reflects the newest
//! issued refresh that finished.

pub mod config;
pub mod error;
pub mod session;
pub mod stream;

pub use config::ClientConfig;
pub use error::{DispatchError, SessionError, StreamError};
pub use session::DebugSessionClient;
pub use stream::{ChangeStreamClient, ConnectionStatus, WatchHandle};
