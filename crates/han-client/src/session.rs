//! The debugger session: snapshot timeline, refresh ordering, time travel.
//!
//! A [`DebugSessionClient`] is an explicit session object constructed from a
//! [`ClientConfig`] — it owns its HTTP client, its change-stream client, and
//! the root watch, and releases them all on [`close`](DebugSessionClient::close).
//!
//! The session never interprets change-notification payloads. Every
//! notification schedules a wholesale re-fetch of the snapshot list from
//! `GET /debug/states`; the previous list is discarded, never merged.
//!
//! ## Refresh ordering
//!
//! Concurrent refreshes can complete out of order (each is an independent
//! HTTP round trip). Two guards keep the timeline honest:
//!
//! - every refresh takes a monotonic sequence number when issued, and a
//!   completion is applied only if no newer refresh has been applied yet —
//!   stale responses are discarded;
//! - a new notification aborts the previous notification's in-flight
//!   refresh, since its answer is superseded before it arrives.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use han_protocol::{
    Action, ROOT_PATH, SelectStateRequest, Snapshot, SnapshotId, StatesResponse, endpoints,
};

use crate::config::ClientConfig;
use crate::error::{DispatchError, SessionError};
use crate::stream::{ChangeStreamClient, ConnectionStatus, WatchHandle};

/// Session state shared with the refresh task.
struct SessionState {
    snapshots: RwLock<Vec<Snapshot>>,
    active: RwLock<Option<SnapshotId>>,
    issued_seq: AtomicU64,
    applied_seq: AtomicU64,
    revision_tx: watch::Sender<u64>,
}

impl SessionState {
    fn new() -> (Self, watch::Receiver<u64>) {
        let (revision_tx, revision_rx) = watch::channel(0);
        (
            Self {
                snapshots: RwLock::new(Vec::new()),
                active: RwLock::new(None),
                issued_seq: AtomicU64::new(0),
                applied_seq: AtomicU64::new(0),
                revision_tx,
            },
            revision_rx,
        )
    }

    /// Take the sequence number for a refresh about to be issued.
    fn next_seq(&self) -> u64 {
        self.issued_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Replace the timeline with `states`, unless a newer refresh already
    /// landed. Returns whether the response was applied.
    fn apply(&self, seq: u64, states: Vec<Snapshot>) -> bool {
        // The lock serializes the check and the store, so an older refresh
        // can never overwrite a newer one between them.
        let mut snapshots = self.snapshots.write();
        let applied = self.applied_seq.load(Ordering::Acquire);
        if seq <= applied {
            debug!(seq, applied, "discarding stale snapshot refresh");
            return false;
        }
        self.applied_seq.store(seq, Ordering::Release);
        *snapshots = states;
        drop(snapshots);
        self.revision_tx.send_modify(|rev| *rev += 1);
        true
    }
}

/// A live debugging session against one han server.
pub struct DebugSessionClient {
    http: reqwest::Client,
    http_base: String,
    stream: ChangeStreamClient,
    state: Arc<SessionState>,
    revision_rx: watch::Receiver<u64>,
    root_watch: WatchHandle,
    refresher: JoinHandle<()>,
}

impl DebugSessionClient {
    /// Connect to the server described by `config`.
    ///
    /// Opens the action channel, performs one eager snapshot refresh, then
    /// subscribes to the root change stream (`"$"`) so every subsequent
    /// change re-fetches the timeline. A failed eager refresh is logged and
    /// tolerated — the session starts with an empty timeline and catches up
    /// on the first notification.
    pub async fn connect(config: &ClientConfig) -> Result<Self, SessionError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(SessionError::Client)?;
        let stream = ChangeStreamClient::connect(config).await?;

        let (state, revision_rx) = SessionState::new();
        let state = Arc::new(state);

        let seq = state.next_seq();
        match fetch_states(&http, &config.http_base).await {
            Ok(states) => {
                let _ = state.apply(seq, states);
            }
            Err(e) => {
                warn!(error = %e, "eager snapshot refresh failed; starting with empty timeline");
            }
        }

        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let refresher = tokio::spawn(refresh_loop(
            notify_rx,
            http.clone(),
            config.http_base.clone(),
            Arc::clone(&state),
        ));

        // The payload is an opaque trigger: drop it, schedule a re-fetch.
        let root_watch = match stream
            .watch(ROOT_PATH, move |_payload| {
                let _ = notify_tx.send(());
            })
            .await
        {
            Ok(watch) => watch,
            Err(e) => {
                refresher.abort();
                stream.close().await;
                return Err(e.into());
            }
        };

        Ok(Self {
            http,
            http_base: config.http_base.clone(),
            stream,
            state,
            revision_rx,
            root_watch,
            refresher,
        })
    }

    /// Re-fetch the full snapshot list and replace the in-memory timeline.
    ///
    /// On failure the previous timeline is kept, the error is logged, and no
    /// retry is attempted. A response that lost the race to a newer refresh
    /// is silently discarded; that still counts as success.
    pub async fn refresh_snapshots(&self) -> Result<(), SessionError> {
        let seq = self.state.next_seq();
        match fetch_states(&self.http, &self.http_base).await {
            Ok(states) => {
                let _ = self.state.apply(seq, states);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "snapshot refresh failed; keeping previous timeline");
                Err(e)
            }
        }
    }

    /// Request time travel to the given snapshot.
    ///
    /// Issues exactly one `POST /debug/state` with body `{"id": ...}` and
    /// resolves with the server's JSON acknowledgement. The server confirms
    /// the switch asynchronously by emitting a change notification, which
    /// refreshes the timeline through the normal path.
    pub async fn select_snapshot(&self, id: SnapshotId) -> Result<Value, SessionError> {
        let url = endpoints::select_state_url(&self.http_base);
        let result = async {
            let resp = self
                .http
                .post(&url)
                .json(&SelectStateRequest { id: id.clone() })
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|source| SessionError::Http {
                    url: url.clone(),
                    source,
                })?;
            resp.json::<Value>()
                .await
                .map_err(|source| SessionError::Decode {
                    url: url.clone(),
                    source,
                })
        }
        .await;

        match result {
            Ok(ack) => {
                *self.state.active.write() = Some(id);
                Ok(ack)
            }
            Err(e) => {
                warn!(snapshot = %id, error = %e, "time-travel request failed");
                Err(e)
            }
        }
    }

    /// Dispatch an action over the write channel.
    pub async fn dispatch(&self, action: Action) -> Result<(), DispatchError> {
        self.stream.dispatch(action).await
    }

    /// The current snapshot timeline (result of the newest applied refresh).
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.state.snapshots.read().clone()
    }

    /// The time-travel cursor, as last set by [`select_snapshot`](Self::select_snapshot).
    ///
    /// Not guaranteed to match server state until the next refresh lands.
    pub fn active_snapshot_id(&self) -> Option<SnapshotId> {
        self.state.active.read().clone()
    }

    /// Subscribe to timeline revisions; the value bumps on every applied
    /// refresh. This is the re-render trigger for a UI layer.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision_rx.clone()
    }

    /// Liveness of the write channel.
    pub fn stream_status(&self) -> ConnectionStatus {
        self.stream.status()
    }

    /// Liveness of the root change stream.
    pub fn watch_status(&self) -> ConnectionStatus {
        self.root_watch.status()
    }

    /// Tear the session down: close the root watch, stop the refresher, and
    /// close the action channel.
    pub async fn close(self) {
        self.root_watch.close().await;
        self.refresher.abort();
        self.stream.close().await;
    }
}

/// One notification, one refresh; a newer notification supersedes (aborts)
/// the previous in-flight refresh.
async fn refresh_loop(
    mut notify_rx: mpsc::UnboundedReceiver<()>,
    http: reqwest::Client,
    http_base: String,
    state: Arc<SessionState>,
) {
    let mut in_flight: Option<JoinHandle<()>> = None;
    while notify_rx.recv().await.is_some() {
        if let Some(superseded) = in_flight.take() {
            superseded.abort();
        }
        let http = http.clone();
        let http_base = http_base.clone();
        let state = Arc::clone(&state);
        in_flight = Some(tokio::spawn(async move {
            let seq = state.next_seq();
            match fetch_states(&http, &http_base).await {
                Ok(states) => {
                    let _ = state.apply(seq, states);
                }
                Err(e) => {
                    warn!(error = %e, "change-triggered refresh failed; keeping previous timeline");
                }
            }
        }));
    }
}

/// `GET /debug/states`, parsed.
async fn fetch_states(
    http: &reqwest::Client,
    http_base: &str,
) -> Result<Vec<Snapshot>, SessionError> {
    let url = endpoints::states_url(http_base);
    let resp = http
        .get(&url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|source| SessionError::Http {
            url: url.clone(),
            source,
        })?;
    let body: StatesResponse = resp.json().await.map_err(|source| SessionError::Decode {
        url: url.clone(),
        source,
    })?;
    Ok(body.states)
}

#[cfg(test)]
mod tests {
    use han_protocol::Diff;

    use super::*;

    fn snap(id: u64, kind: &str) -> Snapshot {
        Snapshot {
            id: SnapshotId::from(id),
            action: Action::new(kind),
            diff: Diff {
                path: "count".into(),
                data: id.to_string(),
            },
        }
    }

    #[test]
    fn stale_refresh_is_discarded() {
        let (state, _rx) = SessionState::new();
        let seq1 = state.next_seq();
        let seq2 = state.next_seq();

        // Refresh #2 completes first; #1's late answer must not win.
        assert!(state.apply(seq2, vec![snap(2, "INCREMENT")]));
        assert!(!state.apply(seq1, vec![snap(1, "INCREMENT")]));

        let snapshots = state.snapshots.read();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].id, SnapshotId::from(2u64));
    }

    #[test]
    fn applied_refresh_bumps_revision() {
        let (state, rx) = SessionState::new();
        assert_eq!(*rx.borrow(), 0);

        let seq = state.next_seq();
        assert!(state.apply(seq, vec![snap(1, "RESET")]));
        assert_eq!(*rx.borrow(), 1);

        // A discarded stale response must not look like a change.
        assert!(!state.apply(seq, vec![]));
        assert_eq!(*rx.borrow(), 1);
    }

    #[test]
    fn sequence_numbers_are_monotonic() {
        let (state, _rx) = SessionState::new();
        let a = state.next_seq();
        let b = state.next_seq();
        let c = state.next_seq();
        assert!(a < b && b < c);
    }
}
