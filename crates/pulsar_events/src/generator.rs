//! # Rust Code Generator
//!
//! Reference [`CodeGenerator`] turning an event forest into Rust source.
//!
//! ## Output
//!
//! - Every instruction becomes a function call, `name(param, ...)`. Nested
//!   instructions are passed as trailing arguments: `or(a(), b())`.
//! - A condition list becomes `let condition_N = a() && !b();`, or `true`
//!   when the list is empty.
//! - An action list becomes one statement per action.
//! - The whole forest is wrapped in `pub fn <entry_point>() { ... }` under the
//!   configured header comment.
//!
//! Problems never abort the compilation: they are collected as
//! [`Diagnostic`]s tagged with the event being compiled, and the offending
//! piece is left out.
//!
//! ## Deep nesting
//!
//! Sub-events re-enter [`CodeGenerator::compile_forest`], so each nesting
//! level costs a few stack frames. Forests nested deeper than
//! [`INLINE_NESTING`] are compiled on a dedicated thread whose stack grows
//! with the nesting depth. Fragments are produced flat and the program is
//! indented once at the end with [`layout_blocks`].

use std::panic;
use std::thread;

use itertools::Itertools;
use tracing::{debug, warn};

use crate::codegen::{
    layout_blocks, CodeGenerator, CompiledConditions, Diagnostic, GenerationContext, Severity,
};
use crate::event::EventForest;
use crate::instruction::{Instruction, InstructionList};
use crate::lineage::NodeId;
use crate::preprocess::{preprocess_forest, PreprocessContext};
use crate::settings::CompilerSettings;

/// Nesting compiled on the caller's stack
pub const INLINE_NESTING: usize = 48;
/// Stack reserved per nesting level on the generation thread
const STACK_PER_LEVEL: usize = 32 * 1024;
const BASE_STACK: usize = 1024 * 1024;

/// Generates Rust source from events
#[derive(Debug)]
pub struct RustCodeGenerator {
    settings: CompilerSettings,
    indent: String,
    diagnostics: Vec<Diagnostic>,
    /// Event whose code is being generated
    current: Option<NodeId>,
}

impl RustCodeGenerator {
    pub fn new(settings: CompilerSettings) -> Self {
        let indent = settings.indent_unit();
        Self {
            settings,
            indent,
            diagnostics: Vec::new(),
            current: None,
        }
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Compile `forest` into a complete source file
    pub fn generate_program(&mut self, forest: &EventForest) -> String {
        let body = self.compile_root(forest);

        let output = &self.settings.output;
        let program = format!(
            "{}\n\npub fn {}() {{\n{}}}\n",
            output.header, output.entry_point, body
        );
        layout_blocks(&program, &self.indent)
    }

    /// Compile the top-level forest, on a sized stack when it is deep
    fn compile_root(&mut self, forest: &EventForest) -> String {
        let nesting = nesting_depth(forest)
            .min(self.settings.limits.max_nesting_depth.saturating_add(1));
        if nesting <= INLINE_NESTING {
            return self.compile_forest(forest, &mut GenerationContext::new());
        }

        let stack_size = BASE_STACK.saturating_add(nesting.saturating_mul(STACK_PER_LEVEL));
        debug!(nesting, stack_size, "compiling deeply nested events on a dedicated thread");

        let generator = &mut *self;
        let outcome = thread::scope(|scope| {
            thread::Builder::new()
                .name("pulsar-events-codegen".to_string())
                .stack_size(stack_size)
                .spawn_scoped(scope, move || {
                    generator.compile_forest(forest, &mut GenerationContext::new())
                })
                .map(|handle| handle.join())
        });

        match outcome {
            Ok(Ok(code)) => code,
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(e) => {
                warn!("Failed to start the code generation thread: {e}");
                self.report(Diagnostic::error(format!(
                    "events nested {} levels deep could not be compiled: {}",
                    nesting, e
                )));
                String::new()
            }
        }
    }

    /// `name(args)`, or `None` if the instruction cannot be called
    fn render_call(&mut self, instruction: &Instruction) -> Option<String> {
        if instruction.name.trim().is_empty() {
            self.report(Diagnostic::error("instruction without a name"));
            return None;
        }

        let mut arguments = Vec::with_capacity(
            instruction.parameters.len() + instruction.sub_instructions.len(),
        );
        for (position, parameter) in instruction.parameters.iter().enumerate() {
            if parameter.is_empty() {
                self.report(Diagnostic::warning(format!(
                    "parameter {} of `{}` is empty, using the default value",
                    position, instruction.name
                )));
                arguments.push("Default::default()".to_string());
            } else {
                arguments.push(parameter.as_str().trim().to_string());
            }
        }
        for nested in &instruction.sub_instructions {
            arguments.push(self.render_condition(nested)?);
        }

        Some(format!("{}({})", instruction.name, arguments.iter().join(", ")))
    }

    fn render_condition(&mut self, instruction: &Instruction) -> Option<String> {
        let call = self.render_call(instruction)?;
        if instruction.inverted {
            Some(format!("!{}", call))
        } else {
            Some(call)
        }
    }
}

impl CodeGenerator for RustCodeGenerator {
    fn compile_conditions(
        &mut self,
        conditions: &InstructionList,
        ctx: &mut GenerationContext,
    ) -> CompiledConditions {
        let flag = ctx.unique_name("condition");
        ctx.declare(flag.clone());

        let expression = if conditions.is_empty() {
            "true".to_string()
        } else {
            conditions
                .iter()
                // An uncallable condition never holds
                .map(|condition| {
                    self.render_condition(condition)
                        .unwrap_or_else(|| "false".to_string())
                })
                .collect::<Vec<_>>()
                .join(" && ")
        };

        CompiledConditions {
            code: format!("let {} = {};\n", flag, expression),
            flag,
        }
    }

    fn compile_actions(
        &mut self,
        actions: &InstructionList,
        _ctx: &mut GenerationContext,
    ) -> String {
        let mut code = String::new();
        for action in actions {
            if let Some(call) = self.render_call(action) {
                code.push_str(&call);
                code.push_str(";\n");
            }
        }
        code
    }

    fn compile_forest(&mut self, forest: &EventForest, ctx: &mut GenerationContext) -> String {
        let max_depth = self.settings.limits.max_nesting_depth;
        if ctx.depth() > max_depth {
            warn!(depth = ctx.depth(), max_depth, "events nested too deeply, skipping them");
            self.report(Diagnostic::error(format!(
                "{} events nested deeper than {} levels were not compiled",
                forest.count_nodes(),
                max_depth
            )));
            return String::new();
        }

        let mut code = String::new();
        for node in forest {
            // Diagnostics and statistics of a copy belong to the live event
            let id = node.source_id();
            let parent = self.current.replace(id);
            let block = node.generate_code(self, ctx);
            self.current = parent;
            if block.is_empty() {
                continue;
            }

            if self.settings.profiling.emit_hooks {
                code.push_str(&format!("profiler_begin({});\n", id.as_u64()));
                code.push_str(&block);
                code.push_str(&format!("profiler_end({});\n", id.as_u64()));
            } else {
                code.push_str(&block);
            }
        }
        code
    }

    fn report(&mut self, mut diagnostic: Diagnostic) {
        if diagnostic.node.is_none() {
            diagnostic.node = self.current;
        }
        self.diagnostics.push(diagnostic);
    }

    fn indent_unit(&self) -> &str {
        // Laid out once the program is complete
        ""
    }
}

/// Number of nesting levels in `forest`, 0 when empty
fn nesting_depth(forest: &EventForest) -> usize {
    let mut deepest = 0;
    forest.walk(|_, depth| deepest = deepest.max(depth + 1));
    deepest
}

/// Result of [`compile_events`]
#[derive(Debug, Clone)]
pub struct GeneratedCode {
    pub source: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl GeneratedCode {
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diagnostic| diagnostic.severity == Severity::Error)
    }
}

/// Main compilation entry point.
///
/// Works on a copy of `forest` whose nodes remember their originals, so the
/// events being edited are never touched by preprocessing.
pub fn compile_events(
    forest: &EventForest,
    settings: &CompilerSettings,
    mut preprocess: PreprocessContext,
) -> GeneratedCode {
    let mut working = forest.clone_remembering_original();
    preprocess_forest(&mut working, &mut preprocess);

    let mut generator = RustCodeGenerator::new(settings.clone());
    let source = generator.generate_program(&working);

    let scope = preprocess.scope().to_string();
    let mut diagnostics = preprocess.into_diagnostics();
    diagnostics.extend(generator.take_diagnostics());

    debug!(
        scope = %scope,
        events = working.count_nodes(),
        diagnostics = diagnostics.len(),
        "compiled events"
    );

    GeneratedCode {
        source,
        diagnostics,
    }
}
