//! # Persistence
//!
//! Saving and loading event forests.
//!
//! A forest is stored as the records of all its nodes in pre-order, each with
//! its nesting depth. A node's sub-events are the records following it with a
//! depth one greater, up to the next record at its own depth or above:
//!
//! ```text
//! depth 0  Standard          <- root
//! depth 1    Comment         <- sub-event of the root
//! depth 1    Standard        <- sub-event of the root
//! depth 2      Standard      <- sub-event of the previous one
//! depth 0  Link              <- root
//! ```
//!
//! Only persisted state is written: kind, flags and the kind's payload.
//! Profiling counters and lineage stay in memory.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::event::{EventForest, EventNode};
use crate::registry::EventRegistry;

/// Version written by [`snapshot_forest`]
pub const FORMAT_VERSION: u32 = 1;

/// Persisted state of one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub folded: bool,
    #[serde(default)]
    pub depth: usize,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

/// Persisted form of a whole forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestSnapshot {
    pub version: u32,
    pub events: Vec<EventRecord>,
}

pub fn snapshot_forest(forest: &EventForest) -> ForestSnapshot {
    let mut events = Vec::with_capacity(forest.count_nodes());
    forest.walk(|node, depth| {
        events.push(EventRecord {
            kind: node.kind().to_string(),
            disabled: node.is_disabled(),
            folded: node.is_folded(),
            depth,
            payload: node.behavior().payload(),
        });
    });
    ForestSnapshot {
        version: FORMAT_VERSION,
        events,
    }
}

/// Rebuild a forest from its snapshot.
///
/// Fails on unknown kinds, invalid payloads, a record nested more than one
/// level below the previous one, and sub-events under a kind that cannot
/// have any.
pub fn restore_forest(registry: &EventRegistry, snapshot: &ForestSnapshot) -> Result<EventForest> {
    if snapshot.version > FORMAT_VERSION {
        bail!(
            "Unsupported events format version {} (latest known is {})",
            snapshot.version,
            FORMAT_VERSION
        );
    }

    let mut roots = Vec::new();
    // Nodes whose sub-events are still being read, outermost first
    let mut open: Vec<EventNode> = Vec::new();

    for (position, record) in snapshot.events.iter().enumerate() {
        if record.depth > open.len() {
            bail!(
                "Event {} is nested at depth {} but its parent is at depth {}",
                position,
                record.depth,
                open.len() as isize - 1
            );
        }
        while open.len() > record.depth {
            close_last(&mut open, &mut roots);
        }

        if let Some(parent) = open.last() {
            if !parent.can_have_sub_events() {
                bail!(
                    "Event {} is a sub-event of a `{}` event, which cannot have sub-events",
                    position,
                    parent.kind()
                );
            }
        }

        let behavior = registry
            .create(&record.kind, &record.payload)
            .with_context(|| format!("Failed to load event {}", position))?;
        let mut node = EventNode::from_boxed(behavior);
        node.set_disabled(record.disabled);
        node.set_folded(record.folded);
        open.push(node);
    }

    while !open.is_empty() {
        close_last(&mut open, &mut roots);
    }

    Ok(roots.into())
}

fn close_last(open: &mut Vec<EventNode>, roots: &mut Vec<EventNode>) {
    let Some(node) = open.pop() else { return };
    match open.last_mut() {
        Some(parent) => parent.sub_events.push(node),
        None => roots.push(node),
    }
}

pub fn save_forest_json(forest: &EventForest) -> Result<String> {
    serde_json::to_string_pretty(&snapshot_forest(forest)).context("Failed to serialize events")
}

pub fn load_forest_json(registry: &EventRegistry, json: &str) -> Result<EventForest> {
    let snapshot: ForestSnapshot = serde_json::from_str(json).context("Failed to parse events")?;
    restore_forest(registry, &snapshot)
}

/// Save events to the given path, creating parent directories if needed.
pub fn save_forest_file(forest: &EventForest, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let json = save_forest_json(forest)?;
    fs::write(path, json).with_context(|| format!("Failed to write events {}", path.display()))?;
    debug!(path = %path.display(), events = forest.count_nodes(), "saved events");
    Ok(())
}

pub fn load_forest_file(registry: &EventRegistry, path: &Path) -> Result<EventForest> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read events {}", path.display()))?;
    let forest = load_forest_json(registry, &json)
        .with_context(|| format!("Failed to load events {}", path.display()))?;
    debug!(path = %path.display(), events = forest.count_nodes(), "loaded events");
    Ok(forest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{CommentEvent, StandardEvent};
    use serde_json::json;

    fn record(kind: &str, depth: usize) -> EventRecord {
        EventRecord {
            kind: kind.to_string(),
            disabled: false,
            folded: false,
            depth,
            payload: Value::Null,
        }
    }

    #[test]
    fn test_snapshot_is_pre_order() {
        let forest: EventForest = vec![
            EventNode::new(StandardEvent::new())
                .with_sub_events([EventNode::new(CommentEvent::new("inner"))]),
            EventNode::new(CommentEvent::new("outer")).disabled(),
        ]
        .into();

        let snapshot = snapshot_forest(&forest);

        let shape: Vec<_> = snapshot
            .events
            .iter()
            .map(|r| (r.kind.as_str(), r.depth, r.disabled))
            .collect();
        assert_eq!(
            shape,
            vec![
                (StandardEvent::KIND, 0, false),
                (CommentEvent::KIND, 1, false),
                (CommentEvent::KIND, 0, true),
            ]
        );
        assert_eq!(snapshot.events[1].payload, json!({ "text": "inner" }));
    }

    #[test]
    fn test_restore_rejects_depth_jump() {
        let registry = EventRegistry::with_builtin_kinds();
        let snapshot = ForestSnapshot {
            version: FORMAT_VERSION,
            events: vec![record(StandardEvent::KIND, 0), record(StandardEvent::KIND, 2)],
        };
        assert!(restore_forest(&registry, &snapshot).is_err());

        let orphan = ForestSnapshot {
            version: FORMAT_VERSION,
            events: vec![record(StandardEvent::KIND, 1)],
        };
        assert!(restore_forest(&registry, &orphan).is_err());
    }

    #[test]
    fn test_restore_rejects_sub_events_of_comment() {
        let registry = EventRegistry::with_builtin_kinds();
        let snapshot = ForestSnapshot {
            version: FORMAT_VERSION,
            events: vec![record(CommentEvent::KIND, 0), record(StandardEvent::KIND, 1)],
        };
        let err = restore_forest(&registry, &snapshot).unwrap_err();
        assert!(err.to_string().contains("cannot have sub-events"));
    }

    #[test]
    fn test_restore_rejects_future_version() {
        let registry = EventRegistry::with_builtin_kinds();
        let snapshot = ForestSnapshot {
            version: FORMAT_VERSION + 1,
            events: Vec::new(),
        };
        assert!(restore_forest(&registry, &snapshot).is_err());
    }

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::to_value(record(StandardEvent::KIND, 0)).unwrap();
        assert_eq!(json, json!({ "type": StandardEvent::KIND, "depth": 0 }));
    }
}
