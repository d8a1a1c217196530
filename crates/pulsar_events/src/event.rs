//! # Events
//!
//! The event tree: [`EventBehavior`] is the contract every event kind
//! implements, [`EventNode`] wraps a behavior with the state shared by all
//! kinds, and [`EventForest`] is an ordered, owned list of nodes.
//!
//! ## Ownership
//!
//! A node owns its sub-event forest exclusively. The only non-owning relation
//! in the model is the profiling lineage set by
//! [`EventNode::clone_remembering_original`].
//!
//! ## Deep trees
//!
//! Cloning, dropping, comparing and searching walk the tree with an explicit
//! stack, so nesting depth does not grow the call stack.

use std::fmt;
use std::mem;
use std::ops::Index;
use std::sync::Arc;

use serde_json::Value;
use smallvec::SmallVec;

use crate::codegen::{CodeGenerator, GenerationContext};
use crate::instruction::{Expression, InstructionList};
use crate::lineage::{NodeHandle, NodeId, NodeIdentity, OriginalLink};
use crate::preprocess::{PreprocessContext, Siblings, Splice};
use crate::profiling::ProfileSample;

/// Read-only view of the condition or action lists of an event
pub type ListRefs<'a> = SmallVec<[&'a InstructionList; 2]>;

/// Mutable view of the condition or action lists of an event
pub type ListMuts<'a> = SmallVec<[&'a mut InstructionList; 2]>;

/// Behavior of one event kind.
///
/// Implementors only describe their own lists and how they compile; the
/// sub-event forest, the enabled/folded flags, identity and lineage are handled
/// by [`EventNode`].
pub trait EventBehavior: fmt::Debug + Send + Sync {
    /// Identifier of the kind, used for dispatch and persistence
    fn kind(&self) -> &'static str;

    /// Whether the kind produces code
    fn is_executable(&self) -> bool {
        false
    }

    /// Whether nodes of this kind own a sub-event forest
    fn can_have_sub_events(&self) -> bool {
        false
    }

    fn condition_lists(&self) -> ListRefs<'_> {
        ListRefs::new()
    }

    fn condition_lists_mut(&mut self) -> ListMuts<'_> {
        ListMuts::new()
    }

    fn action_lists(&self) -> ListRefs<'_> {
        ListRefs::new()
    }

    fn action_lists_mut(&mut self) -> ListMuts<'_> {
        ListMuts::new()
    }

    /// Every expression embedded in the event, for global rewriting passes
    fn expressions_mut(&mut self) -> Vec<&mut Expression> {
        Vec::new()
    }

    /// Generate the code of the event. Only called on enabled, executable nodes.
    fn generate_code(
        &self,
        _sub_events: &EventForest,
        _generator: &mut dyn CodeGenerator,
        _ctx: &mut GenerationContext,
    ) -> String {
        String::new()
    }

    /// Called once before compilation.
    ///
    /// The event may rewrite its own lists, inspect its siblings, and tell the
    /// preprocessor how to splice it into the forest at `index`.
    fn preprocess(
        &mut self,
        _ctx: &mut PreprocessContext,
        _siblings: Siblings<'_>,
        _index: usize,
    ) -> Splice {
        Splice::Keep
    }

    /// Height of the rendered event for the given width.
    ///
    /// Must only depend on the persisted state and `width`.
    fn rendered_height(&self, _width: u32) -> u32 {
        0
    }

    /// Kind-specific persisted state
    fn payload(&self) -> Value {
        Value::Null
    }

    fn clone_box(&self) -> Box<dyn EventBehavior>;
}

impl Clone for Box<dyn EventBehavior> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// One event of the tree
#[derive(Debug)]
pub struct EventNode {
    kind: &'static str,
    disabled: bool,
    folded: bool,
    behavior: Box<dyn EventBehavior>,
    pub(crate) sub_events: EventForest,
    identity: Arc<NodeIdentity>,
    original: Option<OriginalLink>,
}

impl EventNode {
    pub fn new(behavior: impl EventBehavior + 'static) -> Self {
        Self::from_boxed(Box::new(behavior))
    }

    pub fn from_boxed(behavior: Box<dyn EventBehavior>) -> Self {
        Self {
            kind: behavior.kind(),
            disabled: false,
            folded: false,
            behavior,
            sub_events: EventForest::new(),
            identity: NodeIdentity::new(ProfileSample::default()),
            original: None,
        }
    }

    /// Builder helper for trees written in code
    pub fn with_sub_events(mut self, nodes: impl IntoIterator<Item = EventNode>) -> Self {
        for node in nodes {
            // Rejected nodes are dropped: the kind cannot own children.
            let _ = self.push_sub_event(node);
        }
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn id(&self) -> NodeId {
        self.identity.id()
    }

    /// The kind captured when the node was created
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn is_folded(&self) -> bool {
        self.folded
    }

    pub fn set_folded(&mut self, folded: bool) {
        self.folded = folded;
    }

    pub fn is_executable(&self) -> bool {
        self.behavior.is_executable()
    }

    pub fn can_have_sub_events(&self) -> bool {
        self.behavior.can_have_sub_events()
    }

    pub fn behavior(&self) -> &dyn EventBehavior {
        self.behavior.as_ref()
    }

    pub fn behavior_mut(&mut self) -> &mut dyn EventBehavior {
        self.behavior.as_mut()
    }

    pub fn condition_lists(&self) -> ListRefs<'_> {
        self.behavior.condition_lists()
    }

    pub fn condition_lists_mut(&mut self) -> ListMuts<'_> {
        self.behavior.condition_lists_mut()
    }

    pub fn action_lists(&self) -> ListRefs<'_> {
        self.behavior.action_lists()
    }

    pub fn action_lists_mut(&mut self) -> ListMuts<'_> {
        self.behavior.action_lists_mut()
    }

    pub fn expressions_mut(&mut self) -> Vec<&mut Expression> {
        self.behavior.expressions_mut()
    }

    /// Sub-events of the node. Always empty for kinds without sub-events.
    pub fn sub_events(&self) -> &EventForest {
        &self.sub_events
    }

    /// Mutable sub-events, or `None` if the kind cannot have any
    pub fn sub_events_mut(&mut self) -> Option<&mut EventForest> {
        if self.behavior.can_have_sub_events() {
            Some(&mut self.sub_events)
        } else {
            None
        }
    }

    /// Append a sub-event. The node is handed back if the kind cannot own it.
    pub fn push_sub_event(&mut self, node: EventNode) -> Result<(), EventNode> {
        match self.sub_events_mut() {
            Some(forest) => {
                forest.push(node);
                Ok(())
            }
            None => Err(node),
        }
    }

    pub fn rendered_height(&self, width: u32) -> u32 {
        self.behavior.rendered_height(width)
    }

    /// Statistics from the last profiled run
    pub fn profile(&self) -> ProfileSample {
        self.identity.counters().snapshot()
    }

    /// Handle the profiler uses to publish statistics for this node
    pub fn handle(&self) -> NodeHandle {
        NodeHandle::new(&self.identity)
    }

    /// The node this one was cloned from, if it was cloned with lineage and
    /// the original still exists.
    pub fn original_event(&self) -> Option<NodeHandle> {
        self.original.as_ref().and_then(OriginalLink::resolve)
    }

    /// Id of the event the user edits: the original when it still exists,
    /// otherwise this node.
    pub fn source_id(&self) -> NodeId {
        self.original_event()
            .map(|original| original.id())
            .unwrap_or_else(|| self.id())
    }

    /// Generate the code of this node and its sub-events.
    ///
    /// Disabled and non-executable nodes produce nothing and never touch the
    /// generator or the context.
    pub fn generate_code(
        &self,
        generator: &mut dyn CodeGenerator,
        ctx: &mut GenerationContext,
    ) -> String {
        if self.disabled || !self.behavior.is_executable() {
            return String::new();
        }
        self.behavior.generate_code(&self.sub_events, generator, ctx)
    }

    /// Clone the node and its whole sub-tree, remembering this node as the
    /// original of the copy.
    pub fn clone_remembering_original(&self) -> Self {
        let mut copy = self.clone();
        copy.original = Some(OriginalLink::to(&self.identity));
        copy
    }

    pub(crate) fn preprocess(
        &mut self,
        ctx: &mut PreprocessContext,
        siblings: Siblings<'_>,
        index: usize,
    ) -> Splice {
        self.behavior.preprocess(ctx, siblings, index)
    }

    /// Copy of everything but the sub-events. The copy gets a new identity.
    fn clone_shallow(&self) -> Self {
        Self {
            kind: self.kind,
            disabled: self.disabled,
            folded: self.folded,
            behavior: self.behavior.clone_box(),
            sub_events: EventForest::new(),
            identity: NodeIdentity::new(self.profile()),
            original: self.original.clone(),
        }
    }

    /// Same persisted state and profiling counters, recursively.
    pub fn structurally_eq(&self, other: &EventNode) -> bool {
        let mut pending: Vec<(&EventNode, &EventNode)> = vec![(self, other)];

        while let Some((a, b)) = pending.pop() {
            let same = a.kind == b.kind
                && a.disabled == b.disabled
                && a.folded == b.folded
                && a.profile() == b.profile()
                && a.condition_lists() == b.condition_lists()
                && a.action_lists() == b.action_lists()
                && a.behavior.payload() == b.behavior.payload()
                && a.sub_events.len() == b.sub_events.len();
            if !same {
                return false;
            }
            pending.extend(a.sub_events.iter().zip(b.sub_events.iter()));
        }

        true
    }
}

impl Clone for EventNode {
    fn clone(&self) -> Self {
        let mut copy = self.clone_shallow();
        copy.sub_events = self.sub_events.clone();
        copy
    }
}

impl Drop for EventNode {
    fn drop(&mut self) {
        self.identity.retire();
    }
}

/// Ordered sequence of sibling events
#[derive(Debug, Default)]
pub struct EventForest {
    pub(crate) nodes: Vec<EventNode>,
}

impl EventForest {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EventNode> {
        self.nodes.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut EventNode> {
        self.nodes.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EventNode> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, EventNode> {
        self.nodes.iter_mut()
    }

    pub fn as_slice(&self) -> &[EventNode] {
        &self.nodes
    }

    pub fn push(&mut self, node: EventNode) {
        self.nodes.push(node);
    }

    /// Insert at `index`, clamped to the end of the forest
    pub fn insert(&mut self, index: usize, node: EventNode) {
        let index = index.min(self.nodes.len());
        self.nodes.insert(index, node);
    }

    pub fn remove(&mut self, index: usize) -> Option<EventNode> {
        if index < self.nodes.len() {
            Some(self.nodes.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        // Goes through Drop so deep trees are released iteratively
        drop(mem::take(self));
    }

    pub fn into_vec(mut self) -> Vec<EventNode> {
        mem::take(&mut self.nodes)
    }

    /// Number of nodes in the forest, sub-events included
    pub fn count_nodes(&self) -> usize {
        let mut count = 0;
        let mut pending: Vec<&EventForest> = vec![self];
        while let Some(forest) = pending.pop() {
            count += forest.len();
            pending.extend(forest.iter().map(|node| &node.sub_events));
        }
        count
    }

    /// Find a node anywhere in the tree
    pub fn find(&self, id: NodeId) -> Option<&EventNode> {
        let mut pending: Vec<&EventNode> = self.nodes.iter().collect();
        while let Some(node) = pending.pop() {
            if node.id() == id {
                return Some(node);
            }
            pending.extend(node.sub_events.iter());
        }
        None
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut EventNode> {
        let mut pending: Vec<&mut EventNode> = self.nodes.iter_mut().collect();
        while let Some(node) = pending.pop() {
            if node.id() == id {
                return Some(node);
            }
            pending.extend(node.sub_events.nodes.iter_mut());
        }
        None
    }

    /// Visit every node in pre-order, with its nesting depth
    pub fn walk(&self, mut visit: impl FnMut(&EventNode, usize)) {
        let mut pending: Vec<(&EventNode, usize)> =
            self.nodes.iter().rev().map(|node| (node, 0)).collect();
        while let Some((node, depth)) = pending.pop() {
            visit(node, depth);
            pending.extend(node.sub_events.iter().rev().map(|child| (child, depth + 1)));
        }
    }

    /// Deep clone where every copied node remembers the node it was copied from.
    pub fn clone_remembering_original(&self) -> Self {
        let mut copy = self.clone();

        let mut pending: Vec<(&[EventNode], &mut [EventNode])> =
            vec![(self.nodes.as_slice(), copy.nodes.as_mut_slice())];
        while let Some((sources, copies)) = pending.pop() {
            for (source, copied) in sources.iter().zip(copies.iter_mut()) {
                copied.original = Some(OriginalLink::to(&source.identity));
                pending.push((
                    source.sub_events.nodes.as_slice(),
                    copied.sub_events.nodes.as_mut_slice(),
                ));
            }
        }

        copy
    }
}

impl Clone for EventForest {
    fn clone(&self) -> Self {
        struct Frame<'a> {
            source: &'a [EventNode],
            cursor: usize,
            copies: Vec<EventNode>,
        }

        let mut stack = vec![Frame {
            source: &self.nodes,
            cursor: 0,
            copies: Vec::with_capacity(self.nodes.len()),
        }];

        while let Some(frame) = stack.last_mut() {
            let source = frame.source;
            if let Some(node) = source.get(frame.cursor) {
                frame.copies.push(node.clone_shallow());
                frame.cursor += 1;
                if !node.sub_events.is_empty() {
                    stack.push(Frame {
                        source: &node.sub_events.nodes,
                        cursor: 0,
                        copies: Vec::with_capacity(node.sub_events.len()),
                    });
                }
                continue;
            }

            let Some(finished) = stack.pop() else { break };
            let forest = EventForest {
                nodes: finished.copies,
            };
            match stack.last_mut().and_then(|parent| parent.copies.last_mut()) {
                Some(owner) => owner.sub_events = forest,
                None => return forest,
            }
        }

        EventForest::new()
    }
}

impl Drop for EventForest {
    fn drop(&mut self) {
        let mut pending = mem::take(&mut self.nodes);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.sub_events.nodes);
        }
    }
}

impl Index<usize> for EventForest {
    type Output = EventNode;

    fn index(&self, index: usize) -> &EventNode {
        &self.nodes[index]
    }
}

impl FromIterator<EventNode> for EventForest {
    fn from_iter<I: IntoIterator<Item = EventNode>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<EventNode>> for EventForest {
    fn from(nodes: Vec<EventNode>) -> Self {
        Self { nodes }
    }
}

impl<'a> IntoIterator for &'a EventForest {
    type Item = &'a EventNode;
    type IntoIter = std::slice::Iter<'a, EventNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

impl IntoIterator for EventForest {
    type Item = EventNode;
    type IntoIter = std::vec::IntoIter<EventNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_vec().into_iter()
    }
}

/// Free-function form of [`EventForest::clone`], kept for call sites that
/// read like the editor's "copy events" command.
pub fn clone_forest(forest: &EventForest) -> EventForest {
    forest.clone()
}

/// Free-function form of [`EventNode::clone_remembering_original`].
pub fn clone_remembering_original(node: &EventNode) -> EventNode {
    node.clone_remembering_original()
}
