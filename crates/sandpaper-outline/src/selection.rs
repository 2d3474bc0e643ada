use crate::outline::selected_actual_indexes_for_visible_range;

pub const DRAG_SELECT_THRESHOLD_PX: f32 = 5.0;

/// Rubber-band rectangle drawn while drag-selecting. Presentation only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragBox {
    pub origin: (f32, f32),
    pub current: (f32, f32),
}

impl DragBox {
    /// `(left, top, width, height)`
    pub fn rect(&self) -> (f32, f32, f32, f32) {
        let left = self.origin.0.min(self.current.0);
        let top = self.origin.1.min(self.current.1);
        let width = (self.origin.0 - self.current.0).abs();
        let height = (self.origin.1 - self.current.1).abs();
        (left, top, width, height)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SelectionSummary {
    pub count: usize,
}

/// Contiguous range of visible rows, inclusive on both ends.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    range: Option<(usize, usize)>,
    anchor: Option<usize>,
    dragging: bool,
    drag_completed: bool,
    pointer_origin: Option<(f32, f32)>,
    drag_box: Option<DragBox>,
    threshold_px: f32,
}

impl Selection {
    pub fn new() -> Self {
        Self::with_threshold(DRAG_SELECT_THRESHOLD_PX)
    }

    pub fn with_threshold(threshold_px: f32) -> Self {
        Self {
            threshold_px: threshold_px.max(0.0),
            ..Self::default()
        }
    }

    pub fn clear(&mut self) {
        self.range = None;
        self.anchor = None;
        self.dragging = false;
        self.drag_completed = false;
        self.pointer_origin = None;
        self.drag_box = None;
    }

    pub fn set_range(&mut self, start: usize, end: usize) {
        let (lo, hi) = if start <= end {
            (start, end)
        } else {
            (end, start)
        };
        self.range = Some((lo, hi));
    }

    pub fn set_anchor(&mut self, anchor: Option<usize>) {
        self.anchor = anchor;
    }

    pub fn begin(&mut self, visible_ix: usize) {
        self.clear();
        self.anchor = Some(visible_ix);
        self.set_range(visible_ix, visible_ix);
    }

    pub fn extend_to(&mut self, visible_ix: usize) {
        let anchor = *self.anchor.get_or_insert(visible_ix);
        self.set_range(anchor, visible_ix);
    }

    /// Extends from the current anchor, or from `active` when nothing is
    /// anchored yet.
    pub fn shift_click(&mut self, visible_ix: usize, active: Option<usize>) {
        let anchor = self.anchor.or(active).unwrap_or(visible_ix);
        self.anchor = Some(anchor);
        self.set_range(anchor, visible_ix);
        self.dragging = false;
        self.drag_completed = false;
        self.pointer_origin = None;
        self.drag_box = None;
    }

    pub fn select_all(&mut self, visible_len: usize) -> bool {
        let Some(last) = visible_len.checked_sub(1) else {
            return false;
        };
        self.clear();
        self.anchor = Some(0);
        self.set_range(0, last);
        true
    }

    /// Shift+Arrow: moves the edge opposite the anchor by one row and returns
    /// the new edge.
    pub fn extend_with_arrow(
        &mut self,
        forward: bool,
        active: usize,
        visible_len: usize,
    ) -> Option<usize> {
        let last = visible_len.checked_sub(1)?;
        let anchor = *self.anchor.get_or_insert(active.min(last));
        let edge = match self.range {
            Some((start, end)) if start == anchor => end,
            Some((start, _)) => start,
            None => active.min(last),
        };
        let next = if forward {
            (edge + 1).min(last)
        } else {
            edge.saturating_sub(1)
        };
        self.set_range(anchor, next);
        Some(next)
    }

    pub fn begin_pointer(&mut self, visible_ix: usize, position: (f32, f32), shift: bool) {
        if !shift {
            self.anchor = Some(visible_ix);
        }
        self.dragging = false;
        self.drag_completed = false;
        self.pointer_origin = Some(position);
        self.drag_box = None;
    }

    /// Returns true when the range or drag state changed.
    pub fn update_pointer(&mut self, visible_ix: usize, position: (f32, f32)) -> bool {
        let Some(origin) = self.pointer_origin else {
            return false;
        };

        let was_dragging = self.dragging;
        if !self.dragging {
            let dx = position.0 - origin.0;
            let dy = position.1 - origin.1;
            if dx * dx + dy * dy < self.threshold_px * self.threshold_px {
                return false;
            }
            self.dragging = true;
        }

        self.drag_box = Some(DragBox {
            origin,
            current: position,
        });
        let previous = self.range;
        let anchor = *self.anchor.get_or_insert(visible_ix);
        self.set_range(anchor, visible_ix);
        self.range != previous || self.dragging != was_dragging
    }

    pub fn end_pointer(&mut self) -> bool {
        let had_origin = self.pointer_origin.take().is_some();
        let was_dragging = self.dragging;
        self.dragging = false;
        self.drag_box = None;
        if was_dragging {
            self.drag_completed = self.range.is_some();
        }
        was_dragging || had_origin
    }

    pub fn range(&self) -> Option<(usize, usize)> {
        self.range
    }

    pub fn anchor(&self) -> Option<usize> {
        self.anchor
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn drag_completed(&self) -> bool {
        self.drag_completed
    }

    pub fn drag_box(&self) -> Option<DragBox> {
        self.drag_box
    }

    pub fn has_range(&self) -> bool {
        self.range.is_some()
    }

    pub fn contains(&self, visible_ix: usize) -> bool {
        self.range
            .is_some_and(|(start, end)| visible_ix >= start && visible_ix <= end)
    }

    pub fn summary(&self) -> SelectionSummary {
        SelectionSummary {
            count: self.range.map(|(start, end)| end - start + 1).unwrap_or(0),
        }
    }

    pub fn selected_actual_indices(&self, visible_to_actual: &[usize]) -> Vec<usize> {
        let Some((start, end)) = self.range else {
            return Vec::new();
        };
        if start >= visible_to_actual.len() {
            return Vec::new();
        }
        selected_actual_indexes_for_visible_range(visible_to_actual, start, end)
    }
}
