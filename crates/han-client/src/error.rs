//! Client error types.

use thiserror::Error;

/// Errors establishing or operating a socket channel.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The WebSocket handshake failed.
    #[error("websocket connect to {url} failed: {source}")]
    Connect {
        /// The URL we tried to reach.
        url: String,
        /// The underlying handshake error.
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },
}

/// Errors dispatching an action over the write channel.
///
/// Dispatch is confirmed: `Ok(())` means the frame was written to the
/// socket, not merely queued, so a dropped command is always observable.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The bounded dispatch queue is full; the action was not queued.
    #[error("dispatch queue full, action dropped")]
    QueueFull,

    /// The write channel has shut down (client closed or socket died).
    #[error("action channel closed")]
    ChannelClosed,

    /// The action could not be serialized to a frame.
    #[error("failed to encode action frame: {0}")]
    Encode(String),

    /// The frame could not be written to the socket.
    #[error("failed to deliver action frame: {0}")]
    Delivery(String),
}

/// Errors from the debugging session's HTTP operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The HTTP client could not be built.
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    /// A request failed or the server answered with an error status.
    #[error("request to {url} failed: {source}")]
    Http {
        /// The request URL.
        url: String,
        /// The transport or status error.
        #[source]
        source: reqwest::Error,
    },

    /// The response body was not the expected JSON shape.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        /// The request URL.
        url: String,
        /// The decoding error.
        #[source]
        source: reqwest::Error,
    },

    /// The underlying change stream failed.
    #[error(transparent)]
    Stream(#[from] StreamError),
}
