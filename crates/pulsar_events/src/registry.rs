//! # Event Kind Registry
//!
//! Thread-safe map from kind identifier to the factory rebuilding a behavior
//! from its persisted payload.

use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::event::EventBehavior;
use crate::kinds::{BranchEvent, CommentEvent, LinkEvent, RepeatEvent, StandardEvent};

/// Builds a behavior from its persisted payload
pub type EventFactory = fn(&Value) -> Result<Box<dyn EventBehavior>>;

/// Factory for kinds whose payload is their serde representation
pub fn payload_factory<T>(payload: &Value) -> Result<Box<dyn EventBehavior>>
where
    T: EventBehavior + DeserializeOwned + 'static,
{
    let payload = if payload.is_null() {
        Value::Object(Default::default())
    } else {
        payload.clone()
    };
    let behavior: T = serde_json::from_value(payload)
        .with_context(|| format!("Invalid payload for {}", std::any::type_name::<T>()))?;
    Ok(Box::new(behavior))
}

#[derive(Clone)]
pub struct EventRegistry {
    factories: Arc<DashMap<String, EventFactory>>,
}

impl EventRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            factories: Arc::new(DashMap::new()),
        }
    }

    /// Registry knowing every built-in kind
    pub fn with_builtin_kinds() -> Self {
        let registry = Self::new();
        registry.register(StandardEvent::KIND, payload_factory::<StandardEvent>);
        registry.register(CommentEvent::KIND, payload_factory::<CommentEvent>);
        registry.register(BranchEvent::KIND, payload_factory::<BranchEvent>);
        registry.register(RepeatEvent::KIND, payload_factory::<RepeatEvent>);
        registry.register(LinkEvent::KIND, payload_factory::<LinkEvent>);
        registry
    }

    /// Register a kind, replacing any previous factory for it
    pub fn register(&self, kind: impl Into<String>, factory: EventFactory) {
        self.factories.insert(kind.into(), factory);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn create(&self, kind: &str, payload: &Value) -> Result<Box<dyn EventBehavior>> {
        let factory = *self
            .factories
            .get(kind)
            .with_context(|| format!("Unknown event kind `{}`", kind))?;
        let behavior = factory(payload)?;
        anyhow::ensure!(
            behavior.kind() == kind,
            "Factory for `{}` built an event of kind `{}`",
            kind,
            behavior.kind()
        );
        Ok(behavior)
    }

    /// Registered kind identifiers, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self
            .factories
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        kinds.sort();
        kinds
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::with_builtin_kinds()
    }
}
