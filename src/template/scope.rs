//! Per-render composition state: the pending layout and the block aggregator

use std::collections::HashMap;

use crate::renderer::ViewData;

/// What the composition tags may do to the render they run in
pub trait LayoutScope {
    /// Record `name` as the next layout and re-enable chaining
    fn set_layout(&mut self, name: &str);

    fn pending_layout(&self) -> Option<&str>;

    fn take_pending_layout(&mut self) -> Option<String>;

    /// Stop the chain after the current render step
    fn disable_layout(&mut self);

    fn layout_disabled(&self) -> bool;

    fn append_block(&mut self, name: &str, content: String, score: i64);

    /// Fragments of `name`, highest score first
    fn block_fragments(&self, name: &str) -> Vec<&BlockFragment>;
}

/// Rendered output of one `block` tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockFragment {
    pub content: String,
    pub score: i64,
    /// Execution order within the render, used to break score ties
    pub seq: usize,
}

/// Block name to fragments, in execution order
#[derive(Debug, Default)]
pub struct BlockAggregator {
    blocks: HashMap<String, Vec<BlockFragment>>,
    next_seq: usize,
}

impl BlockAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: &str, content: String, score: i64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.blocks
            .entry(name.to_string())
            .or_default()
            .push(BlockFragment {
                content,
                score,
                seq,
            });
    }

    /// Fragments by descending score, ties in execution order
    ///
    /// Stored order is left untouched, so repeated calls agree.
    pub fn collect_sorted(&self, name: &str) -> Vec<&BlockFragment> {
        let mut fragments: Vec<&BlockFragment> = match self.blocks.get(name) {
            Some(fragments) => fragments.iter().collect(),
            None => return Vec::new(),
        };
        fragments.sort_by(|a, b| b.score.cmp(&a.score).then(a.seq.cmp(&b.seq)));
        fragments
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.values().all(Vec::is_empty)
    }
}

/// Layout and block state shared by every step of one render chain
#[derive(Debug, Default)]
pub struct Composition {
    pending_layout: Option<String>,
    layout_disabled: bool,
    blocks: BlockAggregator,
}

impl Composition {
    pub fn blocks(&self) -> &BlockAggregator {
        &self.blocks
    }
}

impl LayoutScope for Composition {
    fn set_layout(&mut self, name: &str) {
        self.pending_layout = Some(name.to_string());
        self.layout_disabled = false;
    }

    fn pending_layout(&self) -> Option<&str> {
        self.pending_layout.as_deref()
    }

    fn take_pending_layout(&mut self) -> Option<String> {
        self.pending_layout.take()
    }

    fn disable_layout(&mut self) {
        self.layout_disabled = true;
    }

    fn layout_disabled(&self) -> bool {
        self.layout_disabled
    }

    fn append_block(&mut self, name: &str, content: String, score: i64) {
        self.blocks.append(name, content, score);
    }

    fn block_fragments(&self, name: &str) -> Vec<&BlockFragment> {
        self.blocks.collect_sorted(name)
    }
}

/// State living for exactly one top-level render
///
/// View data and composition are separate fields so a step can read the
/// bindings while its tags mutate the composition.
#[derive(Debug, Default)]
pub struct RenderScope {
    pub data: ViewData,
    pub composition: Composition,
}

impl RenderScope {
    pub fn new(data: ViewData) -> Self {
        Self {
            data,
            composition: Composition::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn contents(fragments: &[&BlockFragment]) -> Vec<String> {
        fragments.iter().map(|f| f.content.clone()).collect()
    }

    #[test]
    fn test_collect_sorted_descending() {
        let mut blocks = BlockAggregator::new();
        blocks.append("B", "three".to_string(), 3);
        blocks.append("B", "one".to_string(), 1);
        blocks.append("B", "two".to_string(), 2);

        assert_eq!(
            contents(&blocks.collect_sorted("B")),
            vec!["three", "two", "one"]
        );
    }

    #[test]
    fn test_collect_sorted_stable_ties() {
        let mut blocks = BlockAggregator::new();
        blocks.append("B", "first".to_string(), 0);
        blocks.append("B", "top".to_string(), 9);
        blocks.append("B", "second".to_string(), 0);
        blocks.append("B", "third".to_string(), 0);

        assert_eq!(
            contents(&blocks.collect_sorted("B")),
            vec!["top", "first", "second", "third"]
        );
    }

    #[test]
    fn test_collect_sorted_idempotent() {
        let mut blocks = BlockAggregator::new();
        blocks.append("B", "a".to_string(), 1);
        blocks.append("B", "b".to_string(), 2);
        blocks.append("B", "c".to_string(), 1);

        let first = contents(&blocks.collect_sorted("B"));
        let second = contents(&blocks.collect_sorted("B"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_blocks_are_independent_by_name() {
        let mut blocks = BlockAggregator::new();
        blocks.append("head", "h".to_string(), 0);
        blocks.append("foot", "f".to_string(), 0);

        assert_eq!(contents(&blocks.collect_sorted("head")), vec!["h"]);
        assert!(blocks.collect_sorted("missing").is_empty());
    }

    #[test]
    fn test_scopes_do_not_share_blocks() {
        let mut a = Composition::default();
        let b = Composition::default();
        a.append_block("head", "only in a".to_string(), 0);
        assert!(b.block_fragments("head").is_empty());
        assert!(b.blocks().is_empty());
    }

    #[test]
    fn test_layout_flags() {
        let mut scope = Composition::default();
        assert!(!scope.layout_disabled());

        scope.disable_layout();
        scope.set_layout("layout/base");
        assert!(!scope.layout_disabled());
        assert_eq!(scope.pending_layout(), Some("layout/base"));

        scope.set_layout("layout/other");
        assert_eq!(scope.take_pending_layout(), Some("layout/other".to_string()));
        assert_eq!(scope.pending_layout(), None);
    }
}
