//! Client configuration.

use std::time::Duration;

/// Configuration for a debugging session.
///
/// Both surfaces usually live on one authority (`host:port`) — use
/// [`ClientConfig::for_authority`] for that. The bases are kept separate so
/// tests (and split deployments) can point HTTP and WebSocket at different
/// servers.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// WebSocket base, e.g. `ws://localhost:8000`.
    pub ws_base: String,
    /// HTTP debug-API base, e.g. `http://localhost:8000/debug`.
    pub http_base: String,
    /// Capacity of the bounded dispatch queue.
    pub dispatch_queue: usize,
    /// Timeout applied to each HTTP request.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Point both surfaces at one `host:port` authority.
    pub fn for_authority(authority: &str) -> Self {
        Self {
            ws_base: format!("ws://{authority}"),
            http_base: format!("http://{authority}/debug"),
            dispatch_queue: 64,
            request_timeout: Duration::from_secs(10),
        }
    }
}
