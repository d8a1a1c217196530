//! # Rendering Metrics
//!
//! Height computations the events editor uses to lay out events before
//! drawing them, and [`RenderCache`], the editor-owned side table holding the
//! cached heights. The cache is keyed by [`NodeId`] so event nodes never carry
//! rendering state themselves.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use crate::event::{EventForest, EventNode};
use crate::instruction::InstructionList;
use crate::lineage::NodeId;

/// Height of one line of text
pub const LINE_HEIGHT: u32 = 18;
/// Average glyph advance used to wrap text
pub const CHAR_WIDTH: u32 = 7;
/// Vertical padding around an event
pub const EVENT_PADDING: u32 = 6;

/// Height of `text` wrapped to `width`
pub fn text_height(text: &str, width: u32) -> u32 {
    let per_line = (width / CHAR_WIDTH).max(1) as usize;
    let lines: usize = text
        .lines()
        .map(|line| line.chars().count().div_ceil(per_line).max(1))
        .sum();
    lines.max(1) as u32 * LINE_HEIGHT
}

/// Height of an instruction list, one wrapped label per instruction
pub fn instruction_list_height(list: &InstructionList, width: u32) -> u32 {
    list.iter()
        .map(|instruction| text_height(&instruction.label(), width))
        .sum::<u32>()
        .max(LINE_HEIGHT)
}

#[derive(Debug, Clone, Copy)]
struct CachedHeight {
    width: u32,
    height: u32,
    needs_update: bool,
}

/// Cached rendered heights, owned by the editor.
#[derive(Clone, Default)]
pub struct RenderCache {
    entries: Arc<DashMap<NodeId, CachedHeight>>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Height of `node` at `width`, computed only when missing or stale
    pub fn height(&self, node: &EventNode, width: u32) -> u32 {
        if let Some(entry) = self.entries.get(&node.id()) {
            if entry.width == width && !entry.needs_update {
                return entry.height;
            }
        }

        let height = node.rendered_height(width);
        self.entries.insert(
            node.id(),
            CachedHeight {
                width,
                height,
                needs_update: false,
            },
        );
        height
    }

    /// Mark the node's height as stale after an edit
    pub fn invalidate(&self, id: NodeId) {
        if let Some(mut entry) = self.entries.get_mut(&id) {
            entry.needs_update = true;
        }
    }

    pub fn needs_update(&self, id: NodeId) -> bool {
        self.entries
            .get(&id)
            .map(|entry| entry.needs_update)
            .unwrap_or(true)
    }

    pub fn forget(&self, id: NodeId) {
        self.entries.remove(&id);
    }

    /// Drop entries of nodes that are no longer in `forest`
    pub fn retain_live(&self, forest: &EventForest) {
        let mut live = HashSet::new();
        forest.walk(|node, _| {
            live.insert(node.id());
        });
        self.entries.retain(|id, _| live.contains(id));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total height of the forest as displayed: sub-events of folded events
    /// are hidden.
    pub fn forest_height(&self, forest: &EventForest, width: u32) -> u32 {
        let mut total = 0;
        let mut pending: Vec<&EventForest> = vec![forest];
        while let Some(current) = pending.pop() {
            for node in current {
                total += self.height(node, width);
                if !node.is_folded() {
                    pending.push(node.sub_events());
                }
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction;
    use crate::kinds::{CommentEvent, StandardEvent};

    #[test]
    fn test_text_height_wraps() {
        assert_eq!(text_height("", 700), LINE_HEIGHT);
        assert_eq!(text_height("short", 700), LINE_HEIGHT);
        // 10 glyphs per line at width 70
        assert_eq!(text_height(&"x".repeat(25), 70), 3 * LINE_HEIGHT);
        assert_eq!(text_height("a\nb", 70), 2 * LINE_HEIGHT);
        assert_eq!(text_height("abc", 0), 3 * LINE_HEIGHT);
    }

    #[test]
    fn test_height_is_deterministic() {
        let node = EventNode::new(
            StandardEvent::new()
                .with_condition(Instruction::new("key_pressed").with_parameter("Space"))
                .with_action(Instruction::new("jump")),
        );
        assert_eq!(node.rendered_height(300), node.rendered_height(300));

        let comment = EventNode::new(CommentEvent::new("a long comment ".repeat(20)));
        assert_eq!(comment.rendered_height(120), comment.rendered_height(120));
        assert!(comment.rendered_height(120) > comment.rendered_height(1200));
    }

    #[test]
    fn test_cache_recomputes_when_stale() {
        let cache = RenderCache::new();
        let node = EventNode::new(CommentEvent::new("hello"));
        let id = node.id();

        assert!(cache.needs_update(id));
        let first = cache.height(&node, 400);
        assert!(!cache.needs_update(id));
        assert_eq!(cache.height(&node, 400), first);

        cache.invalidate(id);
        assert!(cache.needs_update(id));
        assert_eq!(cache.height(&node, 400), first);
        assert!(!cache.needs_update(id));

        // A different width is recomputed too
        assert!(cache.height(&node, 14) > first);

        cache.forget(id);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_folded_events_hide_sub_events() {
        let cache = RenderCache::new();
        let child = EventNode::new(CommentEvent::new("child"));
        let mut parent = EventNode::new(StandardEvent::new()).with_sub_events([child]);
        let forest_open: EventForest = vec![parent.clone()].into();

        parent.set_folded(true);
        let forest_folded: EventForest = vec![parent].into();

        assert!(cache.forest_height(&forest_open, 400) > cache.forest_height(&forest_folded, 400));
    }

    #[test]
    fn test_retain_live() {
        let cache = RenderCache::new();
        let mut forest: EventForest = vec![
            EventNode::new(CommentEvent::new("a")),
            EventNode::new(CommentEvent::new("b")),
        ]
        .into();
        cache.forest_height(&forest, 400);
        assert_eq!(cache.len(), 2);

        forest.remove(0);
        cache.retain_live(&forest);
        assert_eq!(cache.len(), 1);
    }
}
