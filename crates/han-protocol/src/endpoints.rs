//! Endpoint construction for the two han server surfaces.
//!
//! Route names live here so clients only carry base URLs around
//! (`ws://{authority}` for the socket surface, `http://{authority}/debug`
//! for the HTTP debug API).

/// URL of the write-only action channel.
pub fn action_url(ws_base: &str) -> String {
    format!("{ws_base}/action")
}

/// URL of the read-only change stream for one state path.
pub fn state_url(ws_base: &str, path: &str) -> String {
    format!("{ws_base}/state/{path}")
}

/// URL of the full snapshot list.
pub fn states_url(http_base: &str) -> String {
    format!("{http_base}/states")
}

/// URL of the time-travel endpoint.
pub fn select_state_url(http_base: &str) -> String {
    format!("{http_base}/state")
}
