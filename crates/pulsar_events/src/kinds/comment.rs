use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::EventBehavior;
use crate::render::{text_height, EVENT_PADDING};

/// Free text shown between events. Never compiled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentEvent {
    pub text: String,
}

impl CommentEvent {
    pub const KIND: &'static str = "BuiltinCommonInstructions::Comment";

    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl EventBehavior for CommentEvent {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn rendered_height(&self, width: u32) -> u32 {
        text_height(&self.text, width) + 2 * EVENT_PADDING
    }

    fn payload(&self) -> Value {
        super::to_payload(self)
    }

    fn clone_box(&self) -> Box<dyn EventBehavior> {
        Box::new(self.clone())
    }
}
