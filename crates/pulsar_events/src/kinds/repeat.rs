use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::smallvec;

use crate::codegen::{indent, CodeGenerator, Diagnostic, GenerationContext, GuardedBlock};
use crate::event::{EventBehavior, EventForest, ListMuts, ListRefs};
use crate::instruction::{collect_expressions, Expression, Instruction, InstructionList};
use crate::render::{instruction_list_height, LINE_HEIGHT, EVENT_PADDING};

/// Runs a standard event `count` times. Conditions are evaluated on every
/// iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepeatEvent {
    pub count: Expression,
    pub conditions: InstructionList,
    pub actions: InstructionList,
}

impl RepeatEvent {
    pub const KIND: &'static str = "BuiltinCommonInstructions::Repeat";

    pub fn new(count: impl Into<Expression>) -> Self {
        Self {
            count: count.into(),
            ..Default::default()
        }
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

impl EventBehavior for RepeatEvent {
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

    /// The repeat count first, then the instructions
    fn expressions_mut(&mut self) -> Vec<&mut Expression> {
        let mut expressions = vec![&mut self.count];
        expressions.extend(collect_expressions([&mut self.conditions, &mut self.actions]));
        expressions
    }

    fn generate_code(
        &self,
        sub_events: &EventForest,
        generator: &mut dyn CodeGenerator,
        ctx: &mut GenerationContext,
    ) -> String {
        if self.count.is_empty() {
            generator.report(Diagnostic::warning(
                "repeat event without a count was not compiled",
            ));
            return String::new();
        }

        let counter = ctx.unique_name("repeat");
        ctx.declare(counter.clone());

        let mut iteration = ctx.derive();
        let body = GuardedBlock::new()
            .conditions(&self.conditions)
            .actions(&self.actions)
            .sub_events(sub_events)
            .generate(generator, &mut iteration);

        let mut code = format!("let {} = ({}) as usize;\n", counter, self.count.as_str().trim());
        code.push_str(&format!("for _ in 0..{} {{\n", counter));
        code.push_str(&indent(&body, generator.indent_unit()));
        code.push_str("}\n");
        code
    }

    fn rendered_height(&self, width: u32) -> u32 {
        let column = width / 2;
        let content = instruction_list_height(&self.conditions, column)
            .max(instruction_list_height(&self.actions, column));
        // Header line showing the count
        LINE_HEIGHT + content + 2 * EVENT_PADDING
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

    #[test]
    fn test_count_is_the_first_expression() {
        let mut event = RepeatEvent::new("3")
            .with_condition(Instruction::new("ready").with_parameter("Player"))
            .with_action(Instruction::new("spawn").with_parameter("Enemy"));

        let texts: Vec<String> = event
            .expressions_mut()
            .into_iter()
            .map(|e| e.to_string())
            .collect();
        assert_eq!(texts, vec!["3", "Player", "Enemy"]);
    }
}
