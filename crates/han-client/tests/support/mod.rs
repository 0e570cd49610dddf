//! In-process han socket server for integration tests.
//!
//! Accepts WebSocket connections on an ephemeral port and routes them the
//! way a real han server does: `/action` connections have their inbound
//! text frames captured for assertions, `/state/{path}` connections receive
//! every payload pushed through [`FakeSocketServer::notify`].

#![allow(dead_code)]

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};

pub struct FakeSocketServer {
    pub authority: String,
    notify_tx: broadcast::Sender<String>,
    frames_rx: mpsc::UnboundedReceiver<String>,
    accept_task: JoinHandle<()>,
}

impl FakeSocketServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let authority = listener.local_addr().unwrap().to_string();
        let (notify_tx, _) = broadcast::channel(16);
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();

        let notify = notify_tx.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                drop(tokio::spawn(handle_connection(
                    stream,
                    notify.clone(),
                    frames_tx.clone(),
                )));
            }
        });

        Self {
            authority,
            notify_tx,
            frames_rx,
            accept_task,
        }
    }

    /// Push one change frame to every connected state-stream subscriber.
    pub fn notify(&self, payload: &str) {
        let _ = self.notify_tx.send(payload.to_string());
    }

    /// Next text frame received on the action channel.
    pub async fn next_frame(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(5), self.frames_rx.recv())
            .await
            .expect("timed out waiting for action frame")
            .expect("action channel handler gone")
    }

    /// Whether any further action frame arrives within `window`.
    pub async fn no_frame_within(&mut self, window: Duration) -> bool {
        tokio::time::timeout(window, self.frames_rx.recv())
            .await
            .is_err()
    }
}

impl Drop for FakeSocketServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn handle_connection(
    stream: TcpStream,
    notify: broadcast::Sender<String>,
    frames_tx: mpsc::UnboundedSender<String>,
) {
    let mut path = String::new();
    let record_path = |req: &Request, resp: Response| {
        path = req.uri().path().to_string();
        Ok(resp)
    };
    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, record_path).await else {
        return;
    };

    if path == "/action" {
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                let _ = frames_tx.send(text.to_string());
            }
        }
    } else if path.starts_with("/state/") {
        let mut updates = notify.subscribe();
        loop {
            tokio::select! {
                update = updates.recv() => {
                    let Ok(payload) = update else { return };
                    if ws.send(Message::Text(payload.into())).await.is_err() {
                        return;
                    }
                }
                msg = ws.next() => {
                    match msg {
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }
}
