//! Built-in event kinds.

mod branch;
mod comment;
mod link;
mod repeat;
mod standard;

pub use branch::{BranchArm, BranchEvent};
pub use comment::CommentEvent;
pub use link::LinkEvent;
pub use repeat::RepeatEvent;
pub use standard::StandardEvent;

use serde::Serialize;
use serde_json::Value;

/// Kind identifiers of every built-in event
pub const BUILTIN_KINDS: [&str; 5] = [
    StandardEvent::KIND,
    CommentEvent::KIND,
    BranchEvent::KIND,
    RepeatEvent::KIND,
    LinkEvent::KIND,
];

/// Persisted payload of a serde-backed kind
pub(crate) fn to_payload(state: &impl Serialize) -> Value {
    serde_json::to_value(state).unwrap_or_default()
}
