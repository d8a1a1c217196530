//! # Code Generation Protocol
//!
//! Contract between events and a code generator.
//!
//! ## Composition
//!
//! Whatever the kind, an event compiles in this order:
//!
//! 1. **Conditions**: every condition list is compiled to a named boolean flag
//! 2. **Guard**: the flags are combined (see [`Combine`]) into an `if`
//! 3. **Actions**: compiled inside the guard
//! 4. **Sub-events**: compiled last, inside the guard, in a nested block with a
//!    derived [`GenerationContext`] so their declarations stay local
//!
//! [`GuardedBlock`] implements this order; event kinds only choose which
//! lists go where.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::event::EventForest;
use crate::instruction::InstructionList;
use crate::lineage::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

/// A problem found while preprocessing or generating code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub node: Option<NodeId>,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            node: None,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            node: None,
            message: message.into(),
        }
    }

    pub fn for_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match self.node {
            Some(node) => write!(f, "{} ({}): {}", severity, node, self.message),
            None => write!(f, "{}: {}", severity, self.message),
        }
    }
}

/// Output of compiling one condition list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledConditions {
    /// Statements evaluating the conditions
    pub code: String,
    /// Name of the boolean holding the result
    pub flag: String,
}

/// Turns instruction lists and forests into source text.
pub trait CodeGenerator {
    fn compile_conditions(
        &mut self,
        conditions: &InstructionList,
        ctx: &mut GenerationContext,
    ) -> CompiledConditions;

    fn compile_actions(
        &mut self,
        actions: &InstructionList,
        ctx: &mut GenerationContext,
    ) -> String;

    /// Compile a list of events. Entry point for sub-events.
    fn compile_forest(&mut self, forest: &EventForest, ctx: &mut GenerationContext) -> String;

    /// Collect a diagnostic instead of failing the compilation
    fn report(&mut self, diagnostic: Diagnostic);

    /// One level of indentation applied to nested fragments. Generators that
    /// lay out the finished program with [`layout_blocks`] return `""`.
    fn indent_unit(&self) -> &str {
        "    "
    }
}

#[derive(Debug, Default)]
struct SharedScope {
    declarations: BTreeSet<String>,
    counters: HashMap<String, usize>,
}

/// Accumulator owned by the generator while compiling.
///
/// Declarations made in a context are visible to it and to contexts derived
/// from it, never to its siblings. Shared declarations and unique-name
/// counters are common to the whole compilation.
#[derive(Debug)]
pub struct GenerationContext {
    depth: usize,
    local: Vec<String>,
    inherited: Vec<String>,
    shared: Arc<Mutex<SharedScope>>,
}

impl GenerationContext {
    pub fn new() -> Self {
        Self {
            depth: 0,
            local: Vec::new(),
            inherited: Vec::new(),
            shared: Arc::new(Mutex::new(SharedScope::default())),
        }
    }

    /// Context for a nested block
    pub fn derive(&self) -> Self {
        let mut inherited = self.inherited.clone();
        inherited.extend(self.local.iter().cloned());
        Self {
            depth: self.depth + 1,
            local: Vec::new(),
            inherited,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Number of nested blocks above this context
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Declare a name in this scope. Returns false if it was already visible.
    pub fn declare(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.is_declared(&name) {
            return false;
        }
        self.local.push(name);
        true
    }

    /// Declare a name visible from every context of this compilation
    pub fn declare_shared(&self, name: impl Into<String>) -> bool {
        self.shared.lock().declarations.insert(name.into())
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.local.iter().any(|n| n == name)
            || self.inherited.iter().any(|n| n == name)
            || self.shared.lock().declarations.contains(name)
    }

    /// `prefix_N`, unique across the whole compilation
    pub fn unique_name(&self, prefix: &str) -> String {
        let mut shared = self.shared.lock();
        let counter = shared.counters.entry(prefix.to_string()).or_insert(0);
        let name = format!("{}_{}", prefix, counter);
        *counter += 1;
        name
    }

    pub fn local_declarations(&self) -> &[String] {
        &self.local
    }

    pub fn shared_declarations(&self) -> Vec<String> {
        self.shared.lock().declarations.iter().cloned().collect()
    }
}

impl Default for GenerationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// How the flags of several condition lists gate the block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combine {
    /// Every list must hold
    #[default]
    All,
    /// At least one list must hold
    Any,
}

impl Combine {
    fn operator(self) -> &'static str {
        match self {
            Combine::All => " && ",
            Combine::Any => " || ",
        }
    }
}

/// Conditions, guard, actions, then sub-events.
#[derive(Debug, Default)]
pub struct GuardedBlock<'a> {
    conditions: SmallVec<[&'a InstructionList; 2]>,
    combine: Combine,
    actions: SmallVec<[&'a InstructionList; 2]>,
    sub_events: Option<&'a EventForest>,
}

impl<'a> GuardedBlock<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conditions(mut self, list: &'a InstructionList) -> Self {
        self.conditions.push(list);
        self
    }

    pub fn combine(mut self, combine: Combine) -> Self {
        self.combine = combine;
        self
    }

    pub fn actions(mut self, list: &'a InstructionList) -> Self {
        self.actions.push(list);
        self
    }

    pub fn sub_events(mut self, forest: &'a EventForest) -> Self {
        self.sub_events = Some(forest);
        self
    }

    pub fn generate(
        &self,
        generator: &mut dyn CodeGenerator,
        ctx: &mut GenerationContext,
    ) -> String {
        let mut code = String::new();

        let mut flags = Vec::with_capacity(self.conditions.len());
        for list in &self.conditions {
            let compiled = generator.compile_conditions(list, ctx);
            code.push_str(&compiled.code);
            flags.push(compiled.flag);
        }

        let body = self.generate_body(generator, ctx);

        if flags.is_empty() {
            code.push_str("{\n");
        } else {
            code.push_str(&format!("if {} {{\n", flags.iter().join(self.combine.operator())));
        }
        code.push_str(&indent(&body, generator.indent_unit()));
        code.push_str("}\n");
        code
    }

    /// Actions and sub-events, without any guard
    pub fn generate_body(
        &self,
        generator: &mut dyn CodeGenerator,
        ctx: &mut GenerationContext,
    ) -> String {
        let mut body = String::new();
        for list in &self.actions {
            body.push_str(&generator.compile_actions(list, ctx));
        }

        if let Some(forest) = self.sub_events.filter(|forest| !forest.is_empty()) {
            let mut scope = ctx.derive();
            let nested = generator.compile_forest(forest, &mut scope);
            if !nested.is_empty() {
                body.push_str("{\n");
                body.push_str(&indent(&nested, generator.indent_unit()));
                body.push_str("}\n");
            }
        }
        body
    }
}

/// Indent every non-empty line of `code` by one `unit`
pub fn indent(code: &str, unit: &str) -> String {
    if unit.is_empty() {
        return code.to_string();
    }
    let mut out = String::with_capacity(code.len());
    for line in code.lines() {
        if !line.is_empty() {
            out.push_str(unit);
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

/// Indent line-structured code by block depth, in one pass.
///
/// A line ending with `{` opens a block and a line starting with `}` closes
/// one, so `} else {` does both. Leading whitespace is replaced.
pub fn layout_blocks(code: &str, unit: &str) -> String {
    let mut out = String::with_capacity(code.len() * 2);
    let mut depth = 0usize;
    for line in code.lines() {
        let line = line.trim_start();
        if line.starts_with('}') {
            depth = depth.saturating_sub(1);
        }
        if !line.is_empty() {
            for _ in 0..depth {
                out.push_str(unit);
            }
            out.push_str(line);
        }
        out.push('\n');
        if line.ends_with('{') {
            depth += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::RustCodeGenerator;
    use crate::instruction::Instruction;
    use crate::settings::CompilerSettings;

    #[test]
    fn test_derived_context_scoping() {
        let mut root = GenerationContext::new();
        assert!(root.declare("outer"));

        let mut first = root.derive();
        assert_eq!(first.depth(), 1);
        assert!(first.is_declared("outer"));
        assert!(first.declare("inner"));
        assert!(!first.declare("outer"));

        let second = root.derive();
        assert!(!second.is_declared("inner"));
        assert!(!root.is_declared("inner"));

        first.declare_shared("object_list");
        assert!(second.is_declared("object_list"));
        assert!(root.is_declared("object_list"));
        assert_eq!(root.shared_declarations(), vec!["object_list".to_string()]);
    }

    #[test]
    fn test_unique_names_shared_between_scopes() {
        let root = GenerationContext::new();
        let child = root.derive();
        assert_eq!(root.unique_name("condition"), "condition_0");
        assert_eq!(child.unique_name("condition"), "condition_1");
        assert_eq!(child.unique_name("repeat"), "repeat_0");
    }

    #[test]
    fn test_guarded_block_any() {
        let first = vec![Instruction::new("a")];
        let second = vec![Instruction::new("b")];
        let actions = vec![Instruction::new("x")];
        let mut generator = RustCodeGenerator::new(CompilerSettings::default());
        let mut ctx = GenerationContext::new();

        let code = GuardedBlock::new()
            .conditions(&first)
            .conditions(&second)
            .combine(Combine::Any)
            .actions(&actions)
            .generate(&mut generator, &mut ctx);

        assert_eq!(
            layout_blocks(&code, "    "),
            "let condition_0 = a();\n\
             let condition_1 = b();\n\
             if condition_0 || condition_1 {\n\
             \x20   x();\n\
             }\n"
        );
        assert_eq!(ctx.local_declarations(), ["condition_0", "condition_1"]);
    }

    #[test]
    fn test_block_without_conditions() {
        let actions = vec![Instruction::new("x")];
        let mut generator = RustCodeGenerator::new(CompilerSettings::default());

        let code = GuardedBlock::new()
            .actions(&actions)
            .generate(&mut generator, &mut GenerationContext::new());

        assert_eq!(code, "{\nx();\n}\n");
        assert_eq!(layout_blocks(&code, "    "), "{\n    x();\n}\n");
    }

    #[test]
    fn test_indent() {
        assert_eq!(indent("a();\n\nb();\n", "  "), "  a();\n\n  b();\n");
        assert_eq!(indent("a();\n", ""), "a();\n");
    }

    #[test]
    fn test_layout_blocks() {
        let flat = "if a {\nx();\n{\ny();\n}\n} else if b {\n\n} else {\nz();\n}\n";
        assert_eq!(
            layout_blocks(flat, "  "),
            "if a {\n  x();\n  {\n    y();\n  }\n} else if b {\n\n} else {\n  z();\n}\n"
        );
        // Existing indentation is replaced, stray closers never underflow
        assert_eq!(layout_blocks("    a();\n}\nb();\n", "  "), "a();\n}\nb();\n");
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::warning("missing link target").for_node(crate::lineage::NodeId::next());
        assert!(d.to_string().starts_with("warning (event#"));
        assert_eq!(Diagnostic::error("boom").to_string(), "error: boom");
    }
}
