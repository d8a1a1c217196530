use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codegen::{indent, CodeGenerator, GenerationContext, GuardedBlock};
use crate::event::{EventBehavior, EventForest, ListMuts, ListRefs};
use crate::instruction::{collect_expressions, Expression, Instruction, InstructionList};
use crate::render::{instruction_list_height, EVENT_PADDING};

/// One `if` of a branch event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchArm {
    pub conditions: InstructionList,
    pub actions: InstructionList,
}

impl BranchArm {
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

/// Runs the actions of the first arm whose conditions hold, or the
/// `otherwise` actions when none does.
///
/// The number of arms is set while building the event and cannot change
/// afterwards; only the content of the lists can.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchEvent {
    arms: Vec<BranchArm>,
    otherwise: InstructionList,
}

impl BranchEvent {
    pub const KIND: &'static str = "BuiltinCommonInstructions::Branch";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_arm(mut self, arm: BranchArm) -> Self {
        self.arms.push(arm);
        self
    }

    pub fn with_otherwise(mut self, action: Instruction) -> Self {
        self.otherwise.push(action);
        self
    }

    pub fn arms(&self) -> &[BranchArm] {
        &self.arms
    }

    pub fn arms_mut(&mut self) -> &mut [BranchArm] {
        &mut self.arms
    }

    pub fn otherwise(&self) -> &InstructionList {
        &self.otherwise
    }

    pub fn otherwise_mut(&mut self) -> &mut InstructionList {
        &mut self.otherwise
    }
}

impl EventBehavior for BranchEvent {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn is_executable(&self) -> bool {
        true
    }

    fn condition_lists(&self) -> ListRefs<'_> {
        self.arms.iter().map(|arm| &arm.conditions).collect()
    }

    fn condition_lists_mut(&mut self) -> ListMuts<'_> {
        self.arms.iter_mut().map(|arm| &mut arm.conditions).collect()
    }

    /// The actions of every arm, then the `otherwise` actions
    fn action_lists(&self) -> ListRefs<'_> {
        self.arms
            .iter()
            .map(|arm| &arm.actions)
            .chain(std::iter::once(&self.otherwise))
            .collect()
    }

    fn action_lists_mut(&mut self) -> ListMuts<'_> {
        self.arms
            .iter_mut()
            .map(|arm| &mut arm.actions)
            .chain(std::iter::once(&mut self.otherwise))
            .collect()
    }

    fn expressions_mut(&mut self) -> Vec<&mut Expression> {
        let mut lists: Vec<&mut InstructionList> = Vec::with_capacity(self.arms.len() * 2 + 1);
        for arm in &mut self.arms {
            lists.push(&mut arm.conditions);
            lists.push(&mut arm.actions);
        }
        lists.push(&mut self.otherwise);
        collect_expressions(lists)
    }

    fn generate_code(
        &self,
        _sub_events: &EventForest,
        generator: &mut dyn CodeGenerator,
        ctx: &mut GenerationContext,
    ) -> String {
        if self.arms.is_empty() {
            if self.otherwise.is_empty() {
                return String::new();
            }
            return GuardedBlock::new()
                .actions(&self.otherwise)
                .generate(generator, ctx);
        }

        // Every condition list is evaluated before any action runs
        let mut code = String::new();
        let mut flags = Vec::with_capacity(self.arms.len());
        for arm in &self.arms {
            let compiled = generator.compile_conditions(&arm.conditions, ctx);
            code.push_str(&compiled.code);
            flags.push(compiled.flag);
        }

        for (position, (arm, flag)) in self.arms.iter().zip(&flags).enumerate() {
            let body = GuardedBlock::new()
                .actions(&arm.actions)
                .generate_body(generator, ctx);
            let keyword = if position == 0 { "if" } else { "} else if" };
            code.push_str(&format!("{} {} {{\n", keyword, flag));
            code.push_str(&indent(&body, generator.indent_unit()));
        }

        if !self.otherwise.is_empty() {
            let body = GuardedBlock::new()
                .actions(&self.otherwise)
                .generate_body(generator, ctx);
            code.push_str("} else {\n");
            code.push_str(&indent(&body, generator.indent_unit()));
        }
        code.push_str("}\n");
        code
    }

    fn rendered_height(&self, width: u32) -> u32 {
        let column = width / 2;
        let arms: u32 = self
            .arms
            .iter()
            .map(|arm| {
                instruction_list_height(&arm.conditions, column)
                    .max(instruction_list_height(&arm.actions, column))
            })
            .sum();
        arms + instruction_list_height(&self.otherwise, column) + 2 * EVENT_PADDING
    }

    fn payload(&self) -> Value {
        super::to_payload(self)
    }

    fn clone_box(&self) -> Box<dyn EventBehavior> {
        Box::new(self.clone())
    }
}
