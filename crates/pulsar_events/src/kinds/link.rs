use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::codegen::Diagnostic;
use crate::event::EventBehavior;
use crate::preprocess::{PreprocessContext, Siblings, Splice};
use crate::render::{text_height, EVENT_PADDING};

/// Includes the events of an external event sheet in place of itself.
///
/// The link is resolved during preprocessing: the node is replaced by copies
/// of the target's events, which are then preprocessed like any other
/// sibling. Links that cannot be resolved are removed with a warning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkEvent {
    pub target: String,
}

impl LinkEvent {
    pub const KIND: &'static str = "BuiltinCommonInstructions::Link";

    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl EventBehavior for LinkEvent {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn preprocess(
        &mut self,
        ctx: &mut PreprocessContext,
        _siblings: Siblings<'_>,
        _index: usize,
    ) -> Splice {
        if ctx.external(&self.target).is_none() {
            warn!(scope = %ctx.scope(), target = %self.target, "link to unknown events");
            ctx.report(Diagnostic::warning(format!(
                "link to unknown events `{}` was ignored",
                self.target
            )));
            return Splice::Remove;
        }

        if !ctx.try_expand_link() {
            warn!(scope = %ctx.scope(), target = %self.target, "link expansion limit reached");
            ctx.report(Diagnostic::error(format!(
                "too many links expanded while including `{}`, is it including itself?",
                self.target
            )));
            return Splice::Remove;
        }

        match ctx.external(&self.target) {
            Some(events) => Splice::Replace(events.clone_remembering_original().into_vec()),
            None => Splice::Remove,
        }
    }

    fn rendered_height(&self, width: u32) -> u32 {
        text_height(&format!("Include events of {}", self.target), width) + 2 * EVENT_PADDING
    }

    fn payload(&self) -> Value {
        super::to_payload(self)
    }

    fn clone_box(&self) -> Box<dyn EventBehavior> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::Severity;
    use crate::event::{EventForest, EventNode};
    use crate::instruction::Instruction;
    use crate::kinds::StandardEvent;
    use crate::preprocess::preprocess_forest;

    fn shared_events() -> EventForest {
        vec![
            EventNode::new(StandardEvent::new().with_action(Instruction::new("a"))),
            EventNode::new(StandardEvent::new().with_action(Instruction::new("b"))),
        ]
        .into()
    }

    #[test]
    fn test_link_is_replaced_by_target_events() {
        let mut forest: EventForest = vec![
            EventNode::new(LinkEvent::new("shared")),
            EventNode::new(StandardEvent::new().with_action(Instruction::new("c"))),
        ]
        .into();
        let mut ctx = PreprocessContext::new("level1").with_external("shared", shared_events());

        let visited = preprocess_forest(&mut forest, &mut ctx);

        assert_eq!(visited, 4);
        let names: Vec<_> = forest
            .iter()
            .map(|node| node.action_lists()[0][0].name.clone())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(ctx.diagnostics().is_empty());

        // The included copies remember the external events they came from
        let original = forest[0].original_event().unwrap();
        assert_eq!(original.id(), ctx.external("shared").unwrap()[0].id());
    }

    #[test]
    fn test_missing_target_is_reported() {
        let mut forest: EventForest = vec![EventNode::new(LinkEvent::new("nowhere"))].into();
        let link = forest[0].id();
        let mut ctx = PreprocessContext::new("level1");

        preprocess_forest(&mut forest, &mut ctx);

        assert!(forest.is_empty());
        assert_eq!(ctx.diagnostics().len(), 1);
        assert_eq!(ctx.diagnostics()[0].severity, Severity::Warning);
        assert_eq!(ctx.diagnostics()[0].node, Some(link));
    }

    #[test]
    fn test_link_in_sub_events_expands_in_place() {
        let action = |name: &str| StandardEvent::new().with_action(Instruction::new(name));
        let mut forest: EventForest = vec![
            EventNode::new(action("root")).with_sub_events([
                EventNode::new(action("first")),
                EventNode::new(LinkEvent::new("shared")),
                EventNode::new(action("last")),
            ]),
            EventNode::new(action("tail")),
        ]
        .into();
        let mut ctx = PreprocessContext::new("level1").with_external("shared", shared_events());

        preprocess_forest(&mut forest, &mut ctx);

        let mut layout = Vec::new();
        forest.walk(|node, depth| {
            layout.push(format!("{}@{}", node.action_lists()[0][0].name, depth));
        });
        assert_eq!(
            layout,
            vec!["root@0", "first@1", "a@1", "b@1", "last@1", "tail@0"]
        );
    }

    #[test]
    fn test_self_including_link_stops() {
        let looping: EventForest = vec![EventNode::new(LinkEvent::new("loop"))].into();
        let mut forest: EventForest = vec![EventNode::new(LinkEvent::new("loop"))].into();
        let mut ctx = PreprocessContext::new("level1")
            .with_external("loop", looping)
            .with_max_link_expansions(8);

        preprocess_forest(&mut forest, &mut ctx);

        assert!(forest.is_empty());
        assert_eq!(ctx.diagnostics().len(), 1);
        assert_eq!(ctx.diagnostics()[0].severity, Severity::Error);
    }
}
