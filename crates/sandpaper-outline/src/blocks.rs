use serde::{Deserialize, Serialize};
use std::ops::Range;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    #[default]
    Text,
    Heading1,
    Heading2,
    Heading3,
    Quote,
    Callout,
    Code,
    Divider,
    Toggle,
    Todo,
    Image,
    ColumnLayout,
    Column,
    DatabaseView,
}

impl BlockType {
    /// Blocks of this type can be collapsed even while they have no children.
    pub fn is_foldable_without_children(&self) -> bool {
        matches!(self, BlockType::Toggle)
    }

    /// Children of this type render inside the block instead of as outline rows.
    pub fn embeds_children(&self) -> bool {
        matches!(self, BlockType::ColumnLayout)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Text => "text",
            BlockType::Heading1 => "heading1",
            BlockType::Heading2 => "heading2",
            BlockType::Heading3 => "heading3",
            BlockType::Quote => "quote",
            BlockType::Callout => "callout",
            BlockType::Code => "code",
            BlockType::Divider => "divider",
            BlockType::Toggle => "toggle",
            BlockType::Todo => "todo",
            BlockType::Image => "image",
            BlockType::ColumnLayout => "column_layout",
            BlockType::Column => "column",
            BlockType::DatabaseView => "database_view",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub uid: String,
    pub text: String,
    pub indent: i64,
    #[serde(default)]
    pub block_type: BlockType,
}

impl Block {
    pub fn new(uid: impl Into<String>, text: impl Into<String>, indent: i64) -> Self {
        Self {
            uid: uid.into(),
            text: text.into(),
            indent: indent.max(0),
            block_type: BlockType::Text,
        }
    }

    pub fn with_type(mut self, block_type: BlockType) -> Self {
        self.block_type = block_type;
        self
    }
}

/// Ordered block sequence owned by the host.
///
/// The engine reads through [`BlockStore::blocks`] and writes only through the
/// mutation methods, so a host backed by something other than a `Vec` (a
/// database cursor, a CRDT document) can observe every structural edit.
pub trait BlockStore {
    fn blocks(&self) -> &[Block];

    fn splice(&mut self, range: Range<usize>, replacement: Vec<Block>);

    fn replace_at(&mut self, ix: usize, block: Block) -> bool {
        if ix >= self.len() {
            return false;
        }
        self.splice(ix..ix + 1, vec![block]);
        true
    }

    fn set_indent(&mut self, ix: usize, indent: i64) -> bool;

    fn set_text(&mut self, ix: usize, text: String) -> bool;

    fn len(&self) -> usize {
        self.blocks().len()
    }

    fn is_empty(&self) -> bool {
        self.blocks().is_empty()
    }

    fn position_of(&self, uid: &str) -> Option<usize> {
        self.blocks().iter().position(|block| block.uid == uid)
    }
}

impl BlockStore for Vec<Block> {
    fn blocks(&self) -> &[Block] {
        self
    }

    fn splice(&mut self, range: Range<usize>, replacement: Vec<Block>) {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        Vec::splice(self, start..end, replacement);
    }

    fn set_indent(&mut self, ix: usize, indent: i64) -> bool {
        let Some(block) = self.get_mut(ix) else {
            return false;
        };
        let next = indent.max(0);
        if block.indent == next {
            return false;
        }
        block.indent = next;
        true
    }

    fn set_text(&mut self, ix: usize, text: String) -> bool {
        let Some(block) = self.get_mut(ix) else {
            return false;
        };
        if block.text == text {
            return false;
        }
        block.text = text;
        true
    }
}

impl<T: BlockStore + ?Sized> BlockStore for &mut T {
    fn blocks(&self) -> &[Block] {
        (**self).blocks()
    }

    fn splice(&mut self, range: Range<usize>, replacement: Vec<Block>) {
        (**self).splice(range, replacement)
    }

    fn replace_at(&mut self, ix: usize, block: Block) -> bool {
        (**self).replace_at(ix, block)
    }

    fn set_indent(&mut self, ix: usize, indent: i64) -> bool {
        (**self).set_indent(ix, indent)
    }

    fn set_text(&mut self, ix: usize, text: String) -> bool {
        (**self).set_text(ix, text)
    }
}
