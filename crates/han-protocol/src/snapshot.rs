//! Snapshot timeline types and the dispatch wire frame.
//!
//! The snapshot list is the canonical debugging record: one [`Snapshot`] per
//! recorded state transition, ordered by creation, ids assigned by the
//! server. The client never merges lists incrementally — every refresh
//! replaces the whole timeline.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Server-assigned snapshot identifier.
///
/// Opaque to the client: the reference server uses integers, but nothing in
/// the protocol requires that, so the id is carried as raw JSON and echoed
/// back verbatim in time-travel requests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(pub Value);

impl From<u64> for SnapshotId {
    fn from(n: u64) -> Self {
        Self(Value::from(n))
    }
}

impl From<&str> for SnapshotId {
    fn from(s: &str) -> Self {
        Self(Value::from(s))
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

/// One recorded state transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Server-assigned id, used as the time-travel cursor.
    pub id: SnapshotId,
    /// The action that produced this state.
    pub action: Action,
    /// What the action changed.
    pub diff: Diff,
}

/// A dispatched action: a type tag plus arbitrary properties.
///
/// Serializes to the exact dispatch wire frame, `{"type": ..., ...props}` —
/// the properties are flattened next to the tag, not nested.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Action type tag (e.g. `"INCREMENT"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Additional action properties, flattened into the frame.
    #[serde(flatten)]
    pub props: Map<String, Value>,
}

impl Action {
    /// An action with no properties.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            props: Map::new(),
        }
    }

    /// Attach a property.
    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.props.insert(key.into(), value.into());
        self
    }
}

/// The change a snapshot's action applied to the state tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    /// JSON path the change was written to (`"$"` for the whole tree).
    pub path: String,
    /// Rendered data written at that path.
    pub data: String,
}

/// Body of `GET /debug/states`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatesResponse {
    /// Full ordered snapshot timeline.
    pub states: Vec<Snapshot>,
}

/// Body of `POST /debug/state` — request time travel to `id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectStateRequest {
    /// Target snapshot id.
    pub id: SnapshotId,
}
