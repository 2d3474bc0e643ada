use crate::blocks::{Block, BlockType};
use crate::outline::subtree_end;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropPosition {
    Before,
    After,
}

/// What the pointer is currently over while a block is being dragged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DragHover {
    #[default]
    None,
    Target {
        uid: String,
        position: DropPosition,
        /// Indent the user is aiming for, from the horizontal pointer offset.
        indent: Option<i64>,
    },
    /// Over a column of a column layout: the drop appends to that column.
    Column { uid: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DragGesture {
    pub source_uid: String,
    pub hover: DragHover,
}

impl DragGesture {
    pub fn new(source_uid: impl Into<String>) -> Self {
        Self {
            source_uid: source_uid.into(),
            hover: DragHover::None,
        }
    }

    /// Returns true when the hover changed.
    pub fn hover(&mut self, hover: DragHover) -> bool {
        if self.hover == hover {
            return false;
        }
        self.hover = hover;
        true
    }

    pub fn drop_hint_for(&self, uid: &str) -> Option<DropPosition> {
        match &self.hover {
            DragHover::Target {
                uid: target,
                position,
                ..
            } if target == uid => Some(*position),
            _ => None,
        }
    }

    pub fn column_hint(&self) -> Option<&str> {
        match &self.hover {
            DragHover::Column { uid } => Some(uid.as_str()),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DropPlan {
    pub insert_before: usize,
    pub indent_delta: i64,
}

/// Resolves a hover against the current blocks for the span `start..=end`.
///
/// `None` means the drop is rejected: no hover, a vanished target, or a target
/// inside the dragged span.
pub fn plan_drop(blocks: &[Block], start: usize, end: usize, hover: &DragHover) -> Option<DropPlan> {
    let root_indent = blocks.get(start)?.indent;
    if end >= blocks.len() {
        return None;
    }
    let inside = |ix: usize| ix >= start && ix <= end;

    match hover {
        DragHover::None => None,
        DragHover::Target {
            uid,
            position,
            indent,
        } => {
            let target = blocks.iter().position(|block| &block.uid == uid)?;
            if inside(target) {
                return None;
            }
            let insert_before = match position {
                DropPosition::Before => target,
                DropPosition::After => subtree_end(blocks, target) + 1,
            };
            if insert_before > start && insert_before <= end {
                return None;
            }
            let indent_delta = indent
                .map(|desired| desired.max(0) - root_indent)
                .unwrap_or(0);
            Some(DropPlan {
                insert_before,
                indent_delta,
            })
        }
        DragHover::Column { uid } => {
            let column = blocks.iter().position(|block| &block.uid == uid)?;
            if inside(column) || !matches!(blocks[column].block_type, BlockType::Column) {
                return None;
            }
            let insert_before = subtree_end(blocks, column) + 1;
            if insert_before > start && insert_before <= end {
                return None;
            }
            Some(DropPlan {
                insert_before,
                indent_delta: blocks[column].indent + 1 - root_indent,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(uid: &str, indent: i64) -> Block {
        Block::new(uid, uid, indent)
    }

    fn target(uid: &str, position: DropPosition, indent: Option<i64>) -> DragHover {
        DragHover::Target {
            uid: uid.to_string(),
            position,
            indent,
        }
    }

    #[test]
    fn hover_reports_changes_and_hints() {
        let mut gesture = DragGesture::new("a");
        assert!(gesture.hover(target("b", DropPosition::After, None)));
        assert!(!gesture.hover(target("b", DropPosition::After, None)));
        assert_eq!(gesture.drop_hint_for("b"), Some(DropPosition::After));
        assert_eq!(gesture.drop_hint_for("a"), None);
        assert!(gesture.hover(DragHover::Column {
            uid: "col".to_string()
        }));
        assert_eq!(gesture.column_hint(), Some("col"));
        assert_eq!(gesture.drop_hint_for("b"), None);
    }

    #[test]
    fn drop_after_target_skips_its_subtree() {
        let blocks = vec![block("a", 0), block("b", 0), block("b1", 1), block("c", 0)];
        let plan = plan_drop(&blocks, 0, 0, &target("b", DropPosition::After, None)).expect("plan");
        assert_eq!(plan.insert_before, 3);
        assert_eq!(plan.indent_delta, 0);
        let plan = plan_drop(&blocks, 3, 3, &target("b", DropPosition::Before, Some(2))).expect("plan");
        assert_eq!(plan.insert_before, 1);
        assert_eq!(plan.indent_delta, 2);
    }

    #[test]
    fn drop_into_own_subtree_is_rejected() {
        let blocks = vec![block("a", 0), block("a1", 1), block("a2", 2), block("b", 0)];
        assert!(plan_drop(&blocks, 0, 2, &target("a2", DropPosition::After, None)).is_none());
        assert!(plan_drop(&blocks, 0, 2, &target("a", DropPosition::Before, None)).is_none());
        assert!(plan_drop(&blocks, 0, 2, &DragHover::None).is_none());
        assert!(plan_drop(&blocks, 0, 2, &target("gone", DropPosition::Before, None)).is_none());
    }

    #[test]
    fn drop_into_column_appends_one_level_deeper() {
        let blocks = vec![
            block("layout", 0).with_type(BlockType::ColumnLayout),
            block("col", 1).with_type(BlockType::Column),
            block("c1", 2),
            block("loose", 0),
        ];
        let hover = DragHover::Column {
            uid: "col".to_string(),
        };
        let plan = plan_drop(&blocks, 3, 3, &hover).expect("plan");
        assert_eq!(plan.insert_before, 3);
        assert_eq!(plan.indent_delta, 2);
        let not_column = DragHover::Column {
            uid: "c1".to_string(),
        };
        assert!(plan_drop(&blocks, 3, 3, &not_column).is_none());
    }
}
