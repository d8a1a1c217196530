//! # Node Identity and Profiling Lineage
//!
//! Every [`EventNode`](crate::EventNode) owns an identity token: a process-unique
//! [`NodeId`] plus its profiling counters. Other parties only ever hold
//! [`NodeHandle`]s to that token, never to the node itself.
//!
//! A clone made with `clone_remembering_original` keeps a weak reference to its
//! source's token. Once the source node is dropped the token is retired and the
//! lookup reports "unavailable" (`None`), even if someone still holds a handle.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use crate::profiling::{ProfileSample, ProfilingCounters};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of an event node. Clones get a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event#{}", self.0)
    }
}

#[derive(Debug)]
pub(crate) struct NodeIdentity {
    id: NodeId,
    counters: ProfilingCounters,
    alive: AtomicBool,
}

impl NodeIdentity {
    pub(crate) fn new(sample: ProfileSample) -> Arc<Self> {
        Arc::new(Self {
            id: NodeId::next(),
            counters: ProfilingCounters::new(sample),
            alive: AtomicBool::new(true),
        })
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn counters(&self) -> &ProfilingCounters {
        &self.counters
    }

    /// Called when the owning node is destroyed
    pub(crate) fn retire(&self) {
        self.alive.store(false, Ordering::Release);
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

/// Weak lineage link stored on a cloned node.
#[derive(Debug, Clone)]
pub(crate) struct OriginalLink(Weak<NodeIdentity>);

impl OriginalLink {
    pub(crate) fn to(identity: &Arc<NodeIdentity>) -> Self {
        Self(Arc::downgrade(identity))
    }

    pub(crate) fn resolve(&self) -> Option<NodeHandle> {
        self.0
            .upgrade()
            .filter(|identity| identity.is_alive())
            .map(|identity| NodeHandle { identity })
    }
}

/// Shareable, non-owning view of a node's identity and profiling counters.
///
/// Handles can be sent to the profiler thread. They never keep the node alive.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    identity: Arc<NodeIdentity>,
}

impl NodeHandle {
    pub(crate) fn new(identity: &Arc<NodeIdentity>) -> Self {
        Self {
            identity: Arc::clone(identity),
        }
    }

    pub fn id(&self) -> NodeId {
        self.identity.id()
    }

    /// Whether the node behind this handle still exists
    pub fn is_alive(&self) -> bool {
        self.identity.is_alive()
    }

    pub fn profile(&self) -> ProfileSample {
        self.identity.counters().snapshot()
    }

    /// Publish a sample to the node. Returns false if the node is gone.
    pub fn publish(&self, sample: ProfileSample) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.identity.counters().publish(sample);
        true
    }
}

impl PartialEq for NodeHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.identity, &other.identity)
    }
}

impl Eq for NodeHandle {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_ids_are_unique() {
        let a = NodeIdentity::new(ProfileSample::default());
        let b = NodeIdentity::new(ProfileSample::default());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_link_resolves_until_retired() {
        let identity = NodeIdentity::new(ProfileSample::default());
        let link = OriginalLink::to(&identity);

        let handle = link.resolve().expect("identity is alive");
        assert_eq!(handle.id(), identity.id());
        assert!(handle.publish(ProfileSample::new(Duration::from_millis(3), 1.5)));
        assert_eq!(identity.counters().snapshot().percent_during_last_session, 1.5);

        identity.retire();

        // The outstanding handle does not make the node available again
        assert!(link.resolve().is_none());
        assert!(!handle.is_alive());
        assert!(!handle.publish(ProfileSample::default()));
    }

    #[test]
    fn test_link_unavailable_after_drop() {
        let identity = NodeIdentity::new(ProfileSample::default());
        let link = OriginalLink::to(&identity);
        drop(identity);
        assert!(link.resolve().is_none());
    }
}
