//! # Preprocessing
//!
//! A single pre-order pass run on the events right before compilation.
//!
//! Each enabled node gets to rewrite its own lists and to splice itself into
//! the forest it lives in (see [`Splice`]). The traversal always continues on
//! the forest as it is *after* the splice, so inserted nodes are visited and
//! removed ones are not. Disabled nodes and their sub-trees are skipped: their
//! content is never compiled.

use std::collections::HashMap;
use std::mem;

use tracing::debug;

use crate::codegen::Diagnostic;
use crate::event::{EventForest, EventNode};
use crate::lineage::NodeId;
use crate::settings::LimitSettings;

/// Default bound on link expansions during a single pass
pub const DEFAULT_MAX_LINK_EXPANSIONS: usize = 1024;

/// What to do with a node once its `preprocess` returned
#[derive(Debug)]
pub enum Splice {
    /// Leave the node in place and visit its sub-events next
    Keep,
    /// Remove the node; its sub-events are not visited
    Remove,
    /// Replace the node by these nodes, which are visited next
    Replace(Vec<EventNode>),
    /// Keep the node and insert these nodes right after it. They are visited
    /// once the node's own sub-events are done.
    InsertAfter(Vec<EventNode>),
}

/// The siblings of the node being preprocessed, excluding the node itself
#[derive(Debug, Clone, Copy)]
pub struct Siblings<'a> {
    before: &'a [EventNode],
    after: &'a [EventNode],
}

impl<'a> Siblings<'a> {
    pub fn before(&self) -> &'a [EventNode] {
        self.before
    }

    pub fn after(&self) -> &'a [EventNode] {
        self.after
    }

    /// Sibling at a forest index, `None` for the node itself or out of range
    pub fn get(&self, index: usize) -> Option<&'a EventNode> {
        let own_index = self.before.len();
        if index < own_index {
            self.before.get(index)
        } else if index == own_index {
            None
        } else {
            self.after.get(index - own_index - 1)
        }
    }
}

/// State shared by all nodes during one preprocessing pass
#[derive(Debug)]
pub struct PreprocessContext {
    scope: String,
    externals: HashMap<String, EventForest>,
    diagnostics: Vec<Diagnostic>,
    link_expansions: usize,
    max_link_expansions: usize,
    /// Event being preprocessed
    current: Option<NodeId>,
}

impl PreprocessContext {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            externals: HashMap::new(),
            diagnostics: Vec::new(),
            link_expansions: 0,
            max_link_expansions: DEFAULT_MAX_LINK_EXPANSIONS,
            current: None,
        }
    }

    /// Register an external event list that link events can include
    pub fn with_external(mut self, name: impl Into<String>, events: EventForest) -> Self {
        self.externals.insert(name.into(), events);
        self
    }

    pub fn with_max_link_expansions(mut self, max: usize) -> Self {
        self.max_link_expansions = max;
        self
    }

    /// Apply the limits of the compiler settings
    pub fn with_limits(self, limits: &LimitSettings) -> Self {
        self.with_max_link_expansions(limits.max_link_expansions)
    }

    /// Name of the scene or function being compiled
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn external(&self, name: &str) -> Option<&EventForest> {
        self.externals.get(name)
    }

    /// Count one link expansion. Returns false once the budget is spent,
    /// which is how self-including links are stopped.
    pub fn try_expand_link(&mut self) -> bool {
        if self.link_expansions >= self.max_link_expansions {
            return false;
        }
        self.link_expansions += 1;
        true
    }

    /// Collect a diagnostic, tagged with the event being preprocessed
    pub fn report(&mut self, mut diagnostic: Diagnostic) {
        if diagnostic.node.is_none() {
            diagnostic.node = self.current;
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

struct Frame {
    forest: EventForest,
    cursor: usize,
}

/// Preprocess every enabled node of `forest`, in pre-order.
///
/// Returns the number of nodes whose `preprocess` was called.
pub fn preprocess_forest(forest: &mut EventForest, ctx: &mut PreprocessContext) -> usize {
    let mut visited = 0;
    // Each frame owns the forest it walks; it is handed back to its owner
    // (or to `forest`) once every node in it was visited.
    let mut stack = vec![Frame {
        forest: mem::take(forest),
        cursor: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        let index = frame.cursor;
        let nodes = &mut frame.forest.nodes;

        if index >= nodes.len() {
            let Some(done) = stack.pop() else { break };
            match stack.last_mut() {
                Some(parent) => {
                    if let Some(owner) = parent.forest.nodes.get_mut(parent.cursor) {
                        owner.sub_events = done.forest;
                    }
                    parent.cursor += 1;
                }
                None => *forest = done.forest,
            }
            continue;
        }

        if nodes[index].is_disabled() {
            frame.cursor += 1;
            continue;
        }

        visited += 1;
        let (before, rest) = nodes.split_at_mut(index);
        let Some((node, after)) = rest.split_first_mut() else {
            frame.cursor += 1;
            continue;
        };
        ctx.current = Some(node.source_id());
        let splice = node.preprocess(ctx, Siblings { before, after }, index);
        ctx.current = None;

        let kept = match splice {
            Splice::Keep => true,
            Splice::Remove => {
                nodes.remove(index);
                false
            }
            Splice::Replace(replacements) => {
                nodes.splice(index..=index, replacements);
                false
            }
            Splice::InsertAfter(inserted) => {
                nodes.splice(index + 1..index + 1, inserted);
                true
            }
        };

        if !kept {
            // Whatever now sits at `index` has not been visited yet
            continue;
        }

        let node = &mut nodes[index];
        if node.sub_events.is_empty() {
            frame.cursor += 1;
            continue;
        }
        let children = mem::take(&mut node.sub_events);
        stack.push(Frame {
            forest: children,
            cursor: 0,
        });
    }

    debug!(scope = %ctx.scope(), visited, "preprocessed events");
    visited
}
