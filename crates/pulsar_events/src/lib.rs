//! # Pulsar Events
//!
//! Event sheets for Pulsar scripting: a forest of events, each guarded by
//! conditions and running actions and sub-events, compiled to Rust source.
//!
//! ## Pipeline
//!
//! 1. **Authoring**: the editor builds an [`EventForest`] of [`EventNode`]s,
//!    saved and loaded through [`persist`]
//! 2. **Copy**: compilation works on [`EventForest::clone_remembering_original`],
//!    so profiling statistics can be traced back to the edited events
//! 3. **Preprocessing**: [`preprocess_forest`] lets every enabled event rewrite
//!    itself or splice events around it (links are expanded here)
//! 4. **Code Generation**: a [`CodeGenerator`] compiles the forest;
//!    [`RustCodeGenerator`] is the built-in one
//!
//! [`compile_events`] runs steps 2 to 4.
//!
//! ## Event Kinds
//!
//! Kinds implement [`EventBehavior`]. The built-in ones live in [`kinds`] and
//! are known to [`EventRegistry::with_builtin_kinds`]; custom kinds are added
//! with [`EventRegistry::register`].

pub mod codegen;
pub mod event;
pub mod generator;
pub mod instruction;
pub mod kinds;
pub mod lineage;
pub mod persist;
pub mod preprocess;
pub mod profiling;
pub mod registry;
pub mod render;
pub mod settings;

// Re-exports
pub use codegen::{
    CodeGenerator, Combine, CompiledConditions, Diagnostic, GenerationContext, GuardedBlock,
    Severity,
};
pub use event::{
    clone_forest, clone_remembering_original, EventBehavior, EventForest, EventNode, ListMuts,
    ListRefs,
};
pub use generator::{compile_events, GeneratedCode, RustCodeGenerator};
pub use instruction::{Expression, Instruction, InstructionList};
pub use lineage::{NodeHandle, NodeId};
pub use persist::{load_forest_json, save_forest_json, EventRecord, ForestSnapshot};
pub use preprocess::{preprocess_forest, PreprocessContext, Siblings, Splice};
pub use profiling::{ProfileSample, ProfilingCounters};
pub use registry::{EventFactory, EventRegistry};
pub use render::RenderCache;
pub use settings::CompilerSettings;
