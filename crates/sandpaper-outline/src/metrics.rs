use crate::blocks::{Block, BlockType};
use std::collections::HashMap;

pub const ROW_CORE_HEIGHT: f32 = 24.0;
pub const ROW_VERTICAL_PADDING: f32 = 8.0;
pub const ROW_RENDER_BUFFER: f32 = 2.0;
pub const ROW_HEIGHT: f32 = ROW_CORE_HEIGHT + ROW_VERTICAL_PADDING + ROW_RENDER_BUFFER;
pub const COMPACT_ROW_HEIGHT: f32 = 30.0;

/// Height used for a row until the host reports a measurement.
pub trait RowHeightEstimator {
    fn estimate(&self, block: &Block) -> f32;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedRowHeight(pub f32);

impl Default for FixedRowHeight {
    fn default() -> Self {
        Self(ROW_HEIGHT)
    }
}

impl RowHeightEstimator for FixedRowHeight {
    fn estimate(&self, _block: &Block) -> f32 {
        self.0
    }
}

/// Estimates from block type and line count, mirroring the padding each
/// renderer adds around its content.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContentRowHeight {
    pub base: f32,
    pub line: f32,
}

impl Default for ContentRowHeight {
    fn default() -> Self {
        Self {
            base: ROW_HEIGHT,
            line: COMPACT_ROW_HEIGHT,
        }
    }
}

impl RowHeightEstimator for ContentRowHeight {
    fn estimate(&self, block: &Block) -> f32 {
        let extra_lines = block.text.split('\n').count().saturating_sub(1) as f32;
        let mut height = self.base + extra_lines * self.line;

        if block.text.trim_start().starts_with("```") {
            height = height.max(self.base + 240.0);
        }

        height = match block.block_type {
            BlockType::Heading1 => height + 18.0,
            BlockType::Heading2 => height + 14.0,
            BlockType::Heading3 => height + 8.0,
            BlockType::Quote => height + 4.0,
            BlockType::Callout | BlockType::Code => height + 10.0,
            BlockType::Image => height.max(self.base + 220.0),
            BlockType::DatabaseView => height.max(self.base + 260.0),
            BlockType::ColumnLayout => height.max(self.base + 56.0),
            _ => height,
        };

        height.ceil()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeightChange {
    pub visible_ix: usize,
    pub delta: f32,
}

/// Per-row heights and prefix offsets for the visible rows.
///
/// `offsets` carries one more entry than `heights`: `offsets[i]` is the top of
/// row `i` and `offsets[len]` is the total height.
pub struct RowMetrics {
    estimator: Box<dyn RowHeightEstimator>,
    measured: HashMap<String, f32>,
    index_by_uid: HashMap<String, usize>,
    heights: Vec<f32>,
    offsets: Vec<f32>,
}

impl Default for RowMetrics {
    fn default() -> Self {
        Self::new(Box::new(FixedRowHeight::default()))
    }
}

impl RowMetrics {
    pub fn new(estimator: Box<dyn RowHeightEstimator>) -> Self {
        Self {
            estimator,
            measured: HashMap::new(),
            index_by_uid: HashMap::new(),
            heights: Vec::new(),
            offsets: vec![0.0],
        }
    }

    pub fn rebuild<'a>(&mut self, rows: impl IntoIterator<Item = &'a Block>) {
        self.index_by_uid.clear();
        self.heights.clear();
        for (ix, block) in rows.into_iter().enumerate() {
            let height = self
                .measured
                .get(&block.uid)
                .copied()
                .unwrap_or_else(|| self.estimator.estimate(block));
            self.index_by_uid.insert(block.uid.clone(), ix);
            self.heights.push(height);
        }
        self.recompute_offsets_from(0);
    }

    /// Stores a measurement. Returns the change when the row is currently laid
    /// out and its height actually moved.
    pub fn record_height(&mut self, uid: &str, height: f32) -> Option<HeightChange> {
        if !height.is_finite() || height < 0.0 {
            return None;
        }
        self.measured.insert(uid.to_string(), height);
        let visible_ix = *self.index_by_uid.get(uid)?;
        let previous = self.heights[visible_ix];
        let delta = height - previous;
        if delta.abs() < f32::EPSILON {
            return None;
        }
        self.heights[visible_ix] = height;
        self.recompute_offsets_from(visible_ix);
        Some(HeightChange { visible_ix, delta })
    }

    /// Drops measurements for blocks that no longer exist.
    pub fn retain_measured(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.measured.retain(|uid, _| keep(uid));
    }

    pub fn measured_height(&self, uid: &str) -> Option<f32> {
        self.measured.get(uid).copied()
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    pub fn offsets(&self) -> &[f32] {
        &self.offsets
    }

    pub fn total_height(&self) -> f32 {
        self.offsets.last().copied().unwrap_or(0.0)
    }

    pub fn row_top(&self, visible_ix: usize) -> Option<f32> {
        if visible_ix >= self.heights.len() {
            return None;
        }
        self.offsets.get(visible_ix).copied()
    }

    pub fn row_bottom(&self, visible_ix: usize) -> Option<f32> {
        if visible_ix >= self.heights.len() {
            return None;
        }
        self.offsets.get(visible_ix + 1).copied()
    }

    /// Row containing pixel `y`, clamped to the first and last rows.
    pub fn index_at_offset(&self, y: f32) -> Option<usize> {
        let len = self.heights.len();
        if len == 0 {
            return None;
        }
        let above = self.offsets[1..].partition_point(|&bottom| bottom <= y);
        Some(above.min(len - 1))
    }

    /// Number of rows whose top lies strictly above `y`.
    pub fn rows_starting_before(&self, y: f32) -> usize {
        self.offsets[..self.heights.len()].partition_point(|&top| top < y)
    }

    fn recompute_offsets_from(&mut self, start: usize) {
        self.offsets.truncate(start + 1);
        if self.offsets.is_empty() {
            self.offsets.push(0.0);
        }
        for ix in start..self.heights.len() {
            let next = self.offsets[ix] + self.heights[ix];
            self.offsets.push(next);
        }
    }
}
