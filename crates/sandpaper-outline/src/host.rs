use crate::blocks::{Block, BlockType};
use uuid::Uuid;

/// Callbacks the engine needs from whoever owns the document.
pub trait OutlineHost {
    /// Called once after every applied structural mutation. Debouncing is the
    /// host's business.
    fn schedule_save(&mut self);

    /// Ids must be globally unique and never reused.
    fn create_block(&mut self, text: &str, indent: i64, block_type: BlockType) -> Block {
        Block {
            uid: Uuid::new_v4().to_string(),
            text: text.to_string(),
            indent: indent.max(0),
            block_type,
        }
    }
}

/// Host for non-visual contexts: saves are dropped, ids come from UUID v4.
#[derive(Clone, Copy, Debug, Default)]
pub struct DetachedHost;

impl OutlineHost for DetachedHost {
    fn schedule_save(&mut self) {}
}
