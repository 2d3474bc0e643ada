use crate::metrics::RowMetrics;

/// Rows `[start, end)` to materialize, translated down by `offset`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WindowSlice {
    pub start: usize,
    pub end: usize,
    pub offset: f32,
    pub total_height: f32,
}

impl WindowSlice {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, visible_ix: usize) -> bool {
        visible_ix >= self.start && visible_ix < self.end
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    scroll_top: f32,
    viewport_height: f32,
    overscan: usize,
}

impl Viewport {
    pub fn new(viewport_height: f32, overscan: usize) -> Self {
        Self {
            scroll_top: 0.0,
            viewport_height: viewport_height.max(0.0),
            overscan,
        }
    }

    pub fn scroll_top(&self) -> f32 {
        self.scroll_top
    }

    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    pub fn overscan(&self) -> usize {
        self.overscan
    }

    pub fn set_viewport_height(&mut self, height: f32, metrics: &RowMetrics) {
        self.viewport_height = height.max(0.0);
        self.clamp(metrics);
    }

    pub fn set_scroll_top(&mut self, scroll_top: f32, metrics: &RowMetrics) {
        self.scroll_top = scroll_top;
        self.clamp(metrics);
    }

    pub fn scroll_by(&mut self, delta: f32, metrics: &RowMetrics) {
        self.set_scroll_top(self.scroll_top + delta, metrics);
    }

    pub fn clamp(&mut self, metrics: &RowMetrics) {
        let max = (metrics.total_height() - self.viewport_height).max(0.0);
        if !self.scroll_top.is_finite() {
            self.scroll_top = 0.0;
        }
        self.scroll_top = self.scroll_top.clamp(0.0, max);
    }

    /// First row intersecting the viewport, ignoring overscan.
    pub fn first_visible_row(&self, metrics: &RowMetrics) -> Option<usize> {
        metrics.index_at_offset(self.scroll_top)
    }

    pub fn slice(&self, metrics: &RowMetrics) -> WindowSlice {
        let total_height = metrics.total_height();
        let Some(first) = metrics.index_at_offset(self.scroll_top) else {
            return WindowSlice::default();
        };
        let bottom = self.scroll_top + self.viewport_height;
        let last_exclusive = metrics.rows_starting_before(bottom).max(first + 1);

        let start = first.saturating_sub(self.overscan);
        let end = last_exclusive
            .saturating_add(self.overscan)
            .min(metrics.len());
        let offset = metrics.row_top(start).unwrap_or(0.0);

        WindowSlice {
            start,
            end,
            offset,
            total_height,
        }
    }

    /// Scrolls the least distance that brings the row fully into view. Returns
    /// true when the scroll offset moved.
    pub fn scroll_to_index(&mut self, visible_ix: usize, metrics: &RowMetrics) -> bool {
        let (Some(top), Some(bottom)) = (metrics.row_top(visible_ix), metrics.row_bottom(visible_ix))
        else {
            return false;
        };
        let before = self.scroll_top;
        if top < self.scroll_top {
            self.scroll_top = top;
        } else if bottom > self.scroll_top + self.viewport_height {
            self.scroll_top = bottom - self.viewport_height;
        } else {
            return false;
        }
        self.clamp(metrics);
        self.scroll_top != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::Block;
    use crate::metrics::FixedRowHeight;

    fn metrics(count: usize, height: f32) -> RowMetrics {
        let blocks: Vec<Block> = (0..count)
            .map(|ix| Block::new(format!("b{ix}"), "", 0))
            .collect();
        let mut metrics = RowMetrics::new(Box::new(FixedRowHeight(height)));
        metrics.rebuild(blocks.iter());
        metrics
    }

    #[test]
    fn slice_covers_viewport_with_overscan() {
        let metrics = metrics(100, 10.0);
        let mut viewport = Viewport::new(35.0, 2);
        viewport.set_scroll_top(105.0, &metrics);
        let slice = viewport.slice(&metrics);
        // rows 10..=13 intersect [105, 140)
        assert_eq!(slice.start, 8);
        assert_eq!(slice.end, 16);
        assert_eq!(slice.offset, 80.0);
        assert_eq!(slice.total_height, 1000.0);
    }

    #[test]
    fn slice_bounds_contain_viewport_for_any_scroll() {
        let mut metrics = metrics(50, 20.0);
        metrics.record_height("b3", 75.0);
        metrics.record_height("b17", 5.0);
        let mut viewport = Viewport::new(90.0, 0);
        let mut scroll = 0.0;
        while scroll < metrics.total_height() {
            viewport.set_scroll_top(scroll, &metrics);
            let slice = viewport.slice(&metrics);
            let top = metrics.offsets()[slice.start];
            let bottom = metrics.offsets()[slice.end];
            assert!(top <= viewport.scroll_top());
            assert!(
                bottom >= (viewport.scroll_top() + viewport.viewport_height())
                    .min(metrics.total_height())
            );
            scroll += 7.0;
        }
    }

    #[test]
    fn slice_is_empty_without_rows() {
        let metrics = metrics(0, 10.0);
        let viewport = Viewport::new(100.0, 3);
        assert_eq!(viewport.slice(&metrics), WindowSlice::default());
    }

    #[test]
    fn short_document_renders_everything() {
        let metrics = metrics(3, 10.0);
        let viewport = Viewport::new(500.0, 5);
        let slice = viewport.slice(&metrics);
        assert_eq!((slice.start, slice.end), (0, 3));
    }

    #[test]
    fn scroll_to_index_moves_minimally() {
        let metrics = metrics(100, 10.0);
        let mut viewport = Viewport::new(50.0, 0);
        viewport.set_scroll_top(200.0, &metrics);

        assert!(viewport.scroll_to_index(5, &metrics));
        assert_eq!(viewport.scroll_top(), 50.0);

        assert!(!viewport.scroll_to_index(7, &metrics));
        assert_eq!(viewport.scroll_top(), 50.0);

        assert!(viewport.scroll_to_index(30, &metrics));
        assert_eq!(viewport.scroll_top(), 260.0);

        assert!(!viewport.scroll_to_index(400, &metrics));
    }

    #[test]
    fn scroll_top_is_clamped_to_content() {
        let metrics = metrics(10, 10.0);
        let mut viewport = Viewport::new(40.0, 0);
        viewport.set_scroll_top(1_000.0, &metrics);
        assert_eq!(viewport.scroll_top(), 60.0);
        viewport.scroll_by(-500.0, &metrics);
        assert_eq!(viewport.scroll_top(), 0.0);
    }
}
