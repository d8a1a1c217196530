//! # Instructions
//!
//! Conditions and actions carried by events. The event tree never interprets
//! them: they flow through condition/action lists as plain values and are only
//! turned into source text by a [`CodeGenerator`](crate::codegen::CodeGenerator).

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Ordered list of conditions or actions.
pub type InstructionList = Vec<Instruction>;

/// A parameter expression, stored as the text the user typed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expression {
    plain_string: String,
}

impl Expression {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            plain_string: text.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.plain_string
    }

    /// Replace the expression text (used by rewriting passes)
    pub fn set(&mut self, text: impl Into<String>) {
        self.plain_string = text.into();
    }

    pub fn is_empty(&self) -> bool {
        self.plain_string.trim().is_empty()
    }
}

impl From<&str> for Expression {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Expression {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.plain_string)
    }
}

/// A single condition or action.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Instruction {
    /// Name of the instruction, e.g. `"key_pressed"` or `"play_sound"`
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Expression>,

    /// Only meaningful for conditions: the result is negated
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inverted: bool,

    /// Nested instructions (e.g. the operands of an "or" condition)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_instructions: Vec<Instruction>,
}

impl Instruction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_parameter(mut self, parameter: impl Into<Expression>) -> Self {
        self.parameters.push(parameter.into());
        self
    }

    pub fn with_sub_instruction(mut self, instruction: Instruction) -> Self {
        self.sub_instructions.push(instruction);
        self
    }

    /// Negate the condition
    pub fn invert(mut self) -> Self {
        self.inverted = !self.inverted;
        self
    }

    /// Every expression of this instruction, nested instructions included,
    /// in declaration order.
    pub fn expressions_mut(&mut self) -> Vec<&mut Expression> {
        let mut expressions = Vec::new();
        let mut pending = vec![self];

        while let Some(instruction) = pending.pop() {
            let Instruction {
                parameters,
                sub_instructions,
                ..
            } = instruction;
            expressions.extend(parameters.iter_mut());
            pending.extend(sub_instructions.iter_mut().rev());
        }

        expressions
    }

    /// Short human readable form, `name(a, b)`. Used for rendering metrics.
    pub fn label(&self) -> String {
        let label = format!("{}({})", self.name, self.parameters.iter().join(", "));
        if self.inverted {
            format!("not {}", label)
        } else {
            label
        }
    }
}

/// Flatten the expressions of several instruction lists.
pub fn collect_expressions<'a>(
    lists: impl IntoIterator<Item = &'a mut InstructionList>,
) -> Vec<&'a mut Expression> {
    lists
        .into_iter()
        .flat_map(|list| list.iter_mut())
        .flat_map(|instruction| instruction.expressions_mut())
        .collect()
}
