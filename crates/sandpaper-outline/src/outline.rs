use crate::blocks::Block;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Derived view of one block: where it sits in the indentation tree and
/// whether the outline projection shows it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutlineItem {
    pub block_index: usize,
    pub indent: i64,
    pub parent_index: Option<usize>,
    pub has_children: bool,
    pub collapsed: bool,
    pub hidden: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Outline {
    pub items: Vec<OutlineItem>,
    pub visible_to_actual: Vec<usize>,
    pub actual_to_visible: Vec<Option<usize>>,
}

impl Outline {
    pub fn build(blocks: &[Block], collapsed: &HashSet<String>) -> Self {
        let len = blocks.len();
        if len == 0 {
            return Self::default();
        }

        let mut items = Vec::with_capacity(len);
        let mut visible_to_actual = Vec::with_capacity(len);
        let mut actual_to_visible = vec![None; len];

        // (ancestor index, subtree collapsed, subtree embedded)
        let mut stack: Vec<(usize, bool, bool)> = Vec::new();

        for (index, block) in blocks.iter().enumerate() {
            let indent = block.indent;

            while let Some(&(top, _, _)) = stack.last() {
                if blocks[top].indent >= indent {
                    stack.pop();
                } else {
                    break;
                }
            }

            let parent_index = stack.last().map(|&(ix, _, _)| ix);
            let ancestor_collapsed = stack.last().is_some_and(|&(_, flag, _)| flag);
            let ancestor_embedded = stack.last().is_some_and(|&(_, _, flag)| flag);

            let has_children = blocks
                .get(index + 1)
                .is_some_and(|next| next.indent > indent);
            let is_collapsed = (has_children || block.block_type.is_foldable_without_children())
                && collapsed.contains(&block.uid);
            let is_embedded_parent = has_children && block.block_type.embeds_children();
            let hidden = ancestor_collapsed || ancestor_embedded;

            if !hidden {
                actual_to_visible[index] = Some(visible_to_actual.len());
                visible_to_actual.push(index);
            }

            items.push(OutlineItem {
                block_index: index,
                indent,
                parent_index,
                has_children,
                collapsed: is_collapsed,
                hidden,
            });

            if has_children {
                stack.push((
                    index,
                    ancestor_collapsed || is_collapsed,
                    ancestor_embedded || is_embedded_parent,
                ));
            }
        }

        Self {
            items,
            visible_to_actual,
            actual_to_visible,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn visible_len(&self) -> usize {
        self.visible_to_actual.len()
    }

    pub fn visible(&self) -> impl Iterator<Item = &OutlineItem> + '_ {
        self.visible_to_actual
            .iter()
            .filter_map(|ix| self.items.get(*ix))
    }

    pub fn item(&self, actual_ix: usize) -> Option<&OutlineItem> {
        self.items.get(actual_ix)
    }

    pub fn actual_for_visible(&self, visible_ix: usize) -> Option<usize> {
        self.visible_to_actual.get(visible_ix).copied()
    }

    pub fn visible_for_actual(&self, actual_ix: usize) -> Option<usize> {
        self.actual_to_visible.get(actual_ix).copied().flatten()
    }

    pub fn parent_of(&self, actual_ix: usize) -> Option<usize> {
        self.items.get(actual_ix).and_then(|item| item.parent_index)
    }

    pub fn has_children(&self, actual_ix: usize) -> bool {
        self.items.get(actual_ix).is_some_and(|item| item.has_children)
    }

    pub fn is_hidden(&self, actual_ix: usize) -> bool {
        self.items.get(actual_ix).is_some_and(|item| item.hidden)
    }

    /// First visible row whose block index is strictly after `actual_ix`.
    pub fn next_visible_after(&self, actual_ix: usize) -> Option<usize> {
        let pos = self.visible_to_actual.partition_point(|&ix| ix <= actual_ix);
        self.visible_to_actual.get(pos).copied()
    }

    /// Last visible row whose block index is strictly before `actual_ix`.
    pub fn previous_visible_before(&self, actual_ix: usize) -> Option<usize> {
        let pos = self.visible_to_actual.partition_point(|&ix| ix < actual_ix);
        pos.checked_sub(1)
            .and_then(|pos| self.visible_to_actual.get(pos).copied())
    }
}

/// Memoizes [`Outline::build`] by a digest of the tree-shaping fields.
///
/// Text is left out of the digest: typing into a block never changes the
/// outline.
#[derive(Clone, Debug, Default)]
pub struct OutlineCache {
    fingerprint: Option<String>,
    outline: Outline,
}

impl OutlineCache {
    pub fn outline(&self) -> &Outline {
        &self.outline
    }

    /// Returns true when the outline had to be rebuilt.
    pub fn refresh(&mut self, blocks: &[Block], collapsed: &HashSet<String>) -> bool {
        let fingerprint = structure_fingerprint(blocks, collapsed);
        if self.fingerprint.as_deref() == Some(fingerprint.as_str()) {
            return false;
        }
        self.outline = Outline::build(blocks, collapsed);
        self.fingerprint = Some(fingerprint);
        true
    }

    pub fn invalidate(&mut self) {
        self.fingerprint = None;
    }
}

pub fn structure_fingerprint(blocks: &[Block], collapsed: &HashSet<String>) -> String {
    let mut hasher = Sha256::new();
    for block in blocks {
        hasher.update(block.uid.as_bytes());
        hasher.update([0]);
        hasher.update(block.indent.to_le_bytes());
        hasher.update(block.block_type.as_str().as_bytes());
        hasher.update([b'\n']);
    }
    hasher.update(b"--collapsed--");
    let mut ids: Vec<&String> = collapsed.iter().collect();
    ids.sort();
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update([0]);
    }
    hex::encode(hasher.finalize())
}

pub fn has_children(blocks: &[Block], ix: usize) -> bool {
    let Some(block) = blocks.get(ix) else {
        return false;
    };
    blocks
        .get(ix + 1)
        .is_some_and(|next| next.indent > block.indent)
}

/// Last index of the subtree rooted at `start` (inclusive).
pub fn subtree_end(blocks: &[Block], start: usize) -> usize {
    let Some(block) = blocks.get(start) else {
        return start;
    };
    let base_indent = block.indent;
    let mut end = start;
    for (ix, block) in blocks.iter().enumerate().skip(start + 1) {
        if block.indent <= base_indent {
            break;
        }
        end = ix;
    }
    end
}

pub fn fold_to_level(blocks: &[Block], level: i64) -> HashSet<String> {
    let mut collapsed = HashSet::new();
    if level < 0 {
        return collapsed;
    }

    for (ix, block) in blocks.iter().enumerate() {
        if has_children(blocks, ix) && block.indent >= level {
            collapsed.insert(block.uid.clone());
        }
    }

    collapsed
}

/// Ids of every ancestor of `target_ix`, nearest first.
pub fn ancestor_uids(blocks: &[Block], outline: &Outline, target_ix: usize) -> Vec<String> {
    let mut uids = Vec::new();
    let mut current = outline.parent_of(target_ix);
    while let Some(ix) = current {
        if let Some(block) = blocks.get(ix) {
            uids.push(block.uid.clone());
        }
        current = outline.parent_of(ix);
    }
    uids
}

pub fn selected_actual_indexes_for_visible_range(
    visible_to_actual: &[usize],
    start_visible: usize,
    end_visible: usize,
) -> Vec<usize> {
    if visible_to_actual.is_empty() {
        return Vec::new();
    }
    let last = visible_to_actual.len() - 1;
    let start = start_visible.min(last);
    let end = end_visible.min(last);
    let (lo, hi) = if start <= end {
        (start, end)
    } else {
        (end, start)
    };
    (lo..=hi)
        .filter_map(|ix| visible_to_actual.get(ix).copied())
        .collect()
}

pub fn restore_visible_range_by_uids(
    blocks: &[Block],
    actual_to_visible: &[Option<usize>],
    uids: &[String],
) -> Option<(usize, usize)> {
    let mut visible: Vec<usize> = uids
        .iter()
        .filter_map(|uid| {
            let actual_ix = blocks.iter().position(|block| &block.uid == uid)?;
            actual_to_visible.get(actual_ix).copied().flatten()
        })
        .collect();
    visible.sort_unstable();
    let first = *visible.first()?;
    let last = *visible.last()?;
    Some((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockType;

    fn block(uid: &str, indent: i64) -> Block {
        Block::new(uid, uid, indent)
    }

    fn typed(uid: &str, indent: i64, block_type: BlockType) -> Block {
        Block::new(uid, uid, indent).with_type(block_type)
    }

    fn visible_uids(blocks: &[Block], outline: &Outline) -> Vec<String> {
        outline
            .visible()
            .map(|item| blocks[item.block_index].uid.clone())
            .collect()
    }

    #[test]
    fn build_hides_descendants_when_collapsed() {
        let blocks = vec![block("a", 0), block("b", 1), block("c", 1), block("d", 0)];
        let collapsed = HashSet::from(["a".to_string()]);
        let outline = Outline::build(&blocks, &collapsed);
        assert_eq!(outline.visible_to_actual, vec![0, 3]);
        assert_eq!(
            outline.actual_to_visible,
            vec![Some(0), None, None, Some(1)]
        );
        let has_children: Vec<_> = outline.items.iter().map(|i| i.has_children).collect();
        assert_eq!(has_children, vec![true, false, false, false]);
        let parents: Vec<_> = outline.items.iter().map(|i| i.parent_index).collect();
        assert_eq!(parents, vec![None, Some(0), Some(0), None]);
        assert!(outline.items[0].collapsed);
        assert!(outline.items[1].hidden);
    }

    #[test]
    fn collapse_on_leaf_is_inert() {
        let blocks = vec![block("a", 0), block("b", 0)];
        let collapsed = HashSet::from(["a".to_string()]);
        let outline = Outline::build(&blocks, &collapsed);
        assert!(!outline.items[0].collapsed);
        assert_eq!(outline.visible_len(), 2);
    }

    #[test]
    fn toggle_block_reports_collapsed_without_children() {
        let blocks = vec![typed("t", 0, BlockType::Toggle), block("b", 0)];
        let collapsed = HashSet::from(["t".to_string()]);
        let outline = Outline::build(&blocks, &collapsed);
        assert!(outline.items[0].collapsed);
        assert_eq!(outline.visible_len(), 2);
    }

    #[test]
    fn nested_collapse_inside_collapsed_parent_stays_hidden() {
        let blocks = vec![block("a", 0), block("b", 1), block("c", 2), block("d", 0)];
        let collapsed = HashSet::from(["a".to_string(), "b".to_string()]);
        let outline = Outline::build(&blocks, &collapsed);
        assert_eq!(visible_uids(&blocks, &outline), vec!["a", "d"]);
        let only_b = HashSet::from(["b".to_string()]);
        let outline = Outline::build(&blocks, &only_b);
        assert_eq!(visible_uids(&blocks, &outline), vec!["a", "b", "d"]);
    }

    #[test]
    fn build_hides_column_layout_descendants() {
        let blocks = vec![
            typed("layout", 0, BlockType::ColumnLayout),
            typed("col-a", 1, BlockType::Column),
            block("a-child", 2),
            typed("col-b", 1, BlockType::Column),
            block("b-child", 2),
            block("after", 0),
        ];

        let outline = Outline::build(&blocks, &HashSet::new());
        assert_eq!(outline.visible_to_actual, vec![0, 5]);
        assert_eq!(
            outline.actual_to_visible,
            vec![Some(0), None, None, None, None, Some(1)]
        );
    }

    #[test]
    fn outline_maps_are_consistent() {
        let blocks = vec![block("a", 0), block("b", 1), block("c", 0)];
        let outline = Outline::build(&blocks, &HashSet::new());
        for (visible_ix, actual_ix) in outline.visible_to_actual.iter().copied().enumerate() {
            assert_eq!(outline.actual_to_visible[actual_ix], Some(visible_ix));
        }
    }

    #[test]
    fn skipped_indent_levels_still_find_nearest_shallower_parent() {
        let blocks = vec![block("a", 0), block("b", 3), block("c", 1)];
        let outline = Outline::build(&blocks, &HashSet::new());
        assert_eq!(outline.parent_of(1), Some(0));
        assert_eq!(outline.parent_of(2), Some(0));
    }

    #[test]
    fn visible_neighbors_skip_hidden_rows() {
        let blocks = vec![block("a", 0), block("b", 1), block("c", 1), block("d", 0)];
        let collapsed = HashSet::from(["a".to_string()]);
        let outline = Outline::build(&blocks, &collapsed);
        assert_eq!(outline.next_visible_after(0), Some(3));
        assert_eq!(outline.previous_visible_before(3), Some(0));
        assert_eq!(outline.previous_visible_before(0), None);
        assert_eq!(outline.next_visible_after(3), None);
    }

    #[test]
    fn subtree_end_stops_at_sibling() {
        let blocks = vec![block("a", 0), block("b", 1), block("c", 2), block("d", 1)];
        assert_eq!(subtree_end(&blocks, 0), 3);
        assert_eq!(subtree_end(&blocks, 1), 2);
        assert_eq!(subtree_end(&blocks, 3), 3);
        assert_eq!(subtree_end(&blocks, 9), 9);
    }

    #[test]
    fn fold_to_level_collapses_expected_nodes() {
        let blocks = vec![
            block("a", 0),
            block("b", 1),
            block("c", 2),
            block("d", 1),
            block("e", 0),
        ];
        let collapsed = fold_to_level(&blocks, 1);
        assert!(collapsed.contains("b"));
        assert!(!collapsed.contains("a"));
        assert!(!collapsed.contains("e"));
    }

    #[test]
    fn fold_to_level_level_zero_collapses_all_parents() {
        let blocks = vec![block("a", 0), block("b", 1), block("c", 0)];
        let collapsed = fold_to_level(&blocks, 0);
        assert_eq!(collapsed, HashSet::from(["a".to_string()]));
    }

    #[test]
    fn selected_actual_indexes_maps_visible_range() {
        let visible_to_actual = vec![0, 2, 5];
        assert_eq!(
            selected_actual_indexes_for_visible_range(&visible_to_actual, 0, 1),
            vec![0, 2]
        );
        assert_eq!(
            selected_actual_indexes_for_visible_range(&visible_to_actual, 2, 9),
            vec![5]
        );
    }

    #[test]
    fn restore_visible_range_by_uids_ignores_missing_and_hidden() {
        let blocks = vec![block("a", 0), block("b", 0), block("c", 0)];
        let actual_to_visible = vec![Some(0), None, Some(1)];
        let range = restore_visible_range_by_uids(
            &blocks,
            &actual_to_visible,
            &["c".to_string(), "missing".to_string(), "b".to_string()],
        );
        assert_eq!(range, Some((1, 1)));
    }

    #[test]
    fn ancestor_uids_lists_parent_chain() {
        let blocks = vec![block("a", 0), block("b", 1), block("c", 2)];
        let outline = Outline::build(&blocks, &HashSet::new());
        assert_eq!(ancestor_uids(&blocks, &outline, 2), vec!["b", "a"]);
    }

    #[test]
    fn cache_ignores_text_edits() {
        let mut blocks = vec![block("a", 0), block("b", 1)];
        let mut cache = OutlineCache::default();
        assert!(cache.refresh(&blocks, &HashSet::new()));
        blocks[1].text = "edited".to_string();
        assert!(!cache.refresh(&blocks, &HashSet::new()));
        blocks[1].indent = 0;
        assert!(cache.refresh(&blocks, &HashSet::new()));
        assert!(cache.refresh(&blocks, &HashSet::from(["a".to_string()])));
    }
}
