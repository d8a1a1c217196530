use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::smallvec;

use crate::codegen::{CodeGenerator, GenerationContext, GuardedBlock};
use crate::event::{EventBehavior, EventForest, ListMuts, ListRefs};
use crate::instruction::{collect_expressions, Expression, Instruction, InstructionList};
use crate::render::{instruction_list_height, EVENT_PADDING};

/// The common event: when all conditions hold, run the actions, then the
/// sub-events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardEvent {
    pub conditions: InstructionList,
    pub actions: InstructionList,
}

impl StandardEvent {
    pub const KIND: &'static str = "BuiltinCommonInstructions::Standard";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_condition(mut self, condition: Instruction) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: Instruction) -> Self {
        self.actions.push(action);
        self
    }
}

impl EventBehavior for StandardEvent {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn is_executable(&self) -> bool {
        true
    }

    fn can_have_sub_events(&self) -> bool {
        true
    }

    fn condition_lists(&self) -> ListRefs<'_> {
        smallvec![&self.conditions]
    }

    fn condition_lists_mut(&mut self) -> ListMuts<'_> {
        smallvec![&mut self.conditions]
    }

    fn action_lists(&self) -> ListRefs<'_> {
        smallvec![&self.actions]
    }

    fn action_lists_mut(&mut self) -> ListMuts<'_> {
        smallvec![&mut self.actions]
    }

    fn expressions_mut(&mut self) -> Vec<&mut Expression> {
        collect_expressions([&mut self.conditions, &mut self.actions])
    }

    fn generate_code(
        &self,
        sub_events: &EventForest,
        generator: &mut dyn CodeGenerator,
        ctx: &mut GenerationContext,
    ) -> String {
        GuardedBlock::new()
            .conditions(&self.conditions)
            .actions(&self.actions)
            .sub_events(sub_events)
            .generate(generator, ctx)
    }

    fn rendered_height(&self, width: u32) -> u32 {
        // Conditions and actions are drawn side by side
        let column = width / 2;
        let content = instruction_list_height(&self.conditions, column)
            .max(instruction_list_height(&self.actions, column));
        content + 2 * EVENT_PADDING
    }

    fn payload(&self) -> Value {
        super::to_payload(self)
    }

    fn clone_box(&self) -> Box<dyn EventBehavior> {
        Box::new(self.clone())
    }
}
