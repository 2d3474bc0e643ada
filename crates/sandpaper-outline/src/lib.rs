//! Outline tree, virtual window and structural editing for block documents.
//!
//! Blocks are stored flat with an indent level; the tree is derived. An
//! [`OutlineEngine`] owns one document's derived state and applies edits
//! through the host's [`BlockStore`].

pub mod blocks;
pub mod columns;
pub mod config;
pub mod drag;
pub mod engine;
pub mod error;
pub mod fold;
pub mod host;
pub mod metrics;
pub mod mutations;
pub mod outline;
pub mod selection;
pub mod storage;
pub mod window;

pub use blocks::{Block, BlockStore, BlockType};
pub use config::OutlineConfig;
pub use drag::{DragGesture, DragHover, DropPosition};
pub use engine::{Caret, OutlineEngine, PendingFocus, RowView};
pub use error::StorageError;
pub use fold::FoldState;
pub use host::{DetachedHost, OutlineHost};
pub use metrics::{ContentRowHeight, FixedRowHeight, RowHeightEstimator, RowMetrics};
pub use outline::{Outline, OutlineItem};
pub use selection::{Selection, SelectionSummary};
pub use storage::{FoldStorage, JsonFileFoldStorage, MemoryFoldStorage, SqliteFoldStorage};
pub use window::{Viewport, WindowSlice};
