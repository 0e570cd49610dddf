//! Change-stream socket client — thin client over `tokio-tungstenite`.
//!
//! Owns the socket surface of the han protocol: one write-only `action`
//! channel for dispatching, plus one dedicated read-only socket per watched
//! state path (no multiplexing — the server routes streams by URL).
//!
//! Dispatch goes through a bounded queue drained by a writer task; each
//! command carries a oneshot ack that resolves once the frame hits the
//! socket, so callers can tell a delivered action from a dropped one.
//! Watches hand every inbound text frame to a callback in arrival order and
//! are scoped resources: closing (or dropping) the [`WatchHandle`] tears the
//! socket down.
//!
//! There is no reconnect or backoff. A broken socket flips the relevant
//! [`ConnectionStatus`] and stays broken — acceptable for a developer tool
//! pointed at a local server.

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use han_protocol::{Action, endpoints};

use crate::config::ClientConfig;
use crate::error::{DispatchError, StreamError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Liveness of one socket channel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionStatus {
    /// The socket is up.
    Connected,
    /// The socket was closed deliberately (by us or by the server).
    Closed,
    /// The socket died with an error; no reconnect is attempted.
    Errored,
}

/// A queued action awaiting delivery confirmation.
struct DispatchCommand {
    action: Action,
    ack_tx: oneshot::Sender<Result<(), DispatchError>>,
}

/// Client for the han socket surface.
///
/// Construct with [`connect`](Self::connect); the action channel is opened
/// eagerly so connection failure is a typed error, not a silent dead socket.
#[derive(Debug)]
pub struct ChangeStreamClient {
    ws_base: String,
    cmd_tx: mpsc::Sender<DispatchCommand>,
    status_rx: watch::Receiver<ConnectionStatus>,
    writer: JoinHandle<()>,
}

impl ChangeStreamClient {
    /// Open the write-channel socket at `ws://{base}/action` and start the
    /// writer task draining the dispatch queue.
    pub async fn connect(config: &ClientConfig) -> Result<Self, StreamError> {
        let url = endpoints::action_url(&config.ws_base);
        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|source| StreamError::Connect {
                url: url.clone(),
                source,
            })?;
        debug!(url = %url, "action channel connected");

        let (cmd_tx, cmd_rx) = mpsc::channel(config.dispatch_queue);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connected);
        let writer = tokio::spawn(write_loop(ws, cmd_rx, status_tx));

        Ok(Self {
            ws_base: config.ws_base.clone(),
            cmd_tx,
            status_rx,
            writer,
        })
    }

    /// Dispatch an action: one JSON text frame, `{type, ...props}`.
    ///
    /// Resolves once the frame has been written to the socket. Fails fast
    /// with [`DispatchError::QueueFull`] instead of applying backpressure —
    /// a debugger should never stall its caller.
    pub async fn dispatch(&self, action: Action) -> Result<(), DispatchError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.cmd_tx
            .try_send(DispatchCommand { action, ack_tx })
            .map_err(|e| match e {
                TrySendError::Full(_) => DispatchError::QueueFull,
                TrySendError::Closed(_) => DispatchError::ChannelClosed,
            })?;
        ack_rx.await.map_err(|_| DispatchError::ChannelClosed)?
    }

    /// Open a dedicated change stream at `ws://{base}/state/{path}`.
    ///
    /// Every inbound text frame is handed to `callback` in arrival order.
    /// The frame content is whatever the server chose to push; the protocol
    /// only promises it means "state under `path` changed".
    pub async fn watch(
        &self,
        path: &str,
        callback: impl FnMut(String) + Send + 'static,
    ) -> Result<WatchHandle, StreamError> {
        let url = endpoints::state_url(&self.ws_base, path);
        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|source| StreamError::Connect {
                url: url.clone(),
                source,
            })?;
        debug!(url = %url, "change stream connected");

        let (close_tx, close_rx) = oneshot::channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connected);
        let reader = tokio::spawn(read_loop(ws, callback, close_rx, status_tx));

        Ok(WatchHandle {
            close_tx: Some(close_tx),
            reader,
            status_rx,
        })
    }

    /// Current liveness of the write channel.
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Subscribe to write-channel liveness changes.
    pub fn status_stream(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Shut the writer down and close the action socket.
    pub async fn close(self) {
        drop(self.cmd_tx);
        let _ = self.writer.await;
    }
}

/// Scoped handle to one change-stream subscription.
///
/// Dropping the handle aborts the reader task; [`close`](Self::close) shuts
/// the socket down cleanly first.
pub struct WatchHandle {
    close_tx: Option<oneshot::Sender<()>>,
    reader: JoinHandle<()>,
    status_rx: watch::Receiver<ConnectionStatus>,
}

impl WatchHandle {
    /// Current liveness of this stream.
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Subscribe to liveness changes of this stream.
    pub fn status_stream(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Close the socket and wait for the reader to finish.
    pub async fn close(mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.reader).await;
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Drain the dispatch queue into the action socket, acking each frame.
async fn write_loop(
    mut ws: WsStream,
    mut cmd_rx: mpsc::Receiver<DispatchCommand>,
    status_tx: watch::Sender<ConnectionStatus>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        let frame = match serde_json::to_string(&cmd.action) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = cmd.ack_tx.send(Err(DispatchError::Encode(e.to_string())));
                continue;
            }
        };
        match ws.send(Message::Text(frame.into())).await {
            Ok(()) => {
                let _ = cmd.ack_tx.send(Ok(()));
            }
            Err(e) => {
                warn!(error = %e, "action channel write failed");
                let _ = status_tx.send(ConnectionStatus::Errored);
                let _ = cmd.ack_tx.send(Err(DispatchError::Delivery(e.to_string())));
                return;
            }
        }
    }
    // Queue sender dropped: deliberate shutdown.
    let _ = ws.close(None).await;
    let _ = status_tx.send(ConnectionStatus::Closed);
}

/// Deliver inbound text frames to the callback until closed.
async fn read_loop(
    mut ws: WsStream,
    mut callback: impl FnMut(String) + Send,
    mut close_rx: oneshot::Receiver<()>,
    status_tx: watch::Sender<ConnectionStatus>,
) {
    loop {
        tokio::select! {
            _ = &mut close_rx => {
                let _ = ws.close(None).await;
                let _ = status_tx.send(ConnectionStatus::Closed);
                return;
            }
            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => callback(text.to_string()),
                    // Pings and pongs are handled by tungstenite; binary
                    // frames are not part of the protocol.
                    Some(Ok(Message::Close(_))) | None => {
                        let _ = status_tx.send(ConnectionStatus::Closed);
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "change stream read failed");
                        let _ = status_tx.send(ConnectionStatus::Errored);
                        return;
                    }
                }
            }
        }
    }
}
