use crate::blocks::{Block, BlockStore, BlockType};
use crate::columns::{self, ColumnPreview};
use crate::config::OutlineConfig;
use crate::drag::{self, DragGesture, DragHover, DropPosition};
use crate::fold::{FoldChange, FoldState};
use crate::host::{DetachedHost, OutlineHost};
use crate::metrics::RowMetrics;
use crate::mutations;
use crate::outline::{self, subtree_end, Outline, OutlineCache, OutlineItem};
use crate::selection::{DragBox, Selection, SelectionSummary};
use crate::storage::{FoldStorage, MemoryFoldStorage};
use crate::window::{Viewport, WindowSlice};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Caret {
    Start,
    End,
    /// Byte offset into the block text.
    Offset(usize),
}

/// Focus the host should apply once it has rendered the current state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingFocus {
    pub block_uid: String,
    pub caret: Caret,
}

/// One materialized row of the virtual window.
#[derive(Clone, Debug, PartialEq)]
pub struct RowView {
    pub visible_ix: usize,
    pub item: OutlineItem,
    pub uid: String,
    pub block_type: BlockType,
    pub top: f32,
    pub height: f32,
    pub selected: bool,
    pub active: bool,
    pub drag_source: bool,
    pub drop_hint: Option<DropPosition>,
}

/// Outline state for one open document.
///
/// Every entry point leaves the derived state (outline, metrics, window)
/// consistent with the store before returning. Structural edits call
/// [`OutlineHost::schedule_save`] exactly once when they apply and not at all
/// when they are rejected.
pub struct OutlineEngine<S: BlockStore> {
    doc_id: String,
    store: S,
    host: Box<dyn OutlineHost>,
    fold_storage: Box<dyn FoldStorage>,
    config: OutlineConfig,
    folds: FoldState,
    outline: OutlineCache,
    metrics: RowMetrics,
    viewport: Viewport,
    selection: Selection,
    active_uid: Option<String>,
    pending_focus: Option<PendingFocus>,
    drag: Option<DragGesture>,
}

impl<S: BlockStore> OutlineEngine<S> {
    pub fn new(
        doc_id: impl Into<String>,
        store: S,
        host: Box<dyn OutlineHost>,
        fold_storage: Box<dyn FoldStorage>,
        config: OutlineConfig,
    ) -> Self {
        let doc_id = doc_id.into();
        let folds = FoldState::load(fold_storage.as_ref(), &doc_id);
        let metrics = RowMetrics::new(config.height_estimator());
        let viewport = Viewport::new(config.viewport_height, config.overscan);
        let selection = Selection::with_threshold(config.drag_select_threshold_px);

        let mut engine = Self {
            doc_id,
            store,
            host,
            fold_storage,
            config,
            folds,
            outline: OutlineCache::default(),
            metrics,
            viewport,
            selection,
            active_uid: None,
            pending_focus: None,
            drag: None,
        };
        engine.ensure_non_empty();
        engine.refresh();
        engine.active_uid = engine.store.blocks().first().map(|block| block.uid.clone());
        engine
    }

    /// Engine with no save callback, in-memory fold state and default config.
    pub fn detached(doc_id: impl Into<String>, store: S) -> Self {
        Self::new(
            doc_id,
            store,
            Box::new(DetachedHost),
            Box::new(MemoryFoldStorage::default()),
            OutlineConfig::default(),
        )
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    pub fn blocks(&self) -> &[Block] {
        self.store.blocks()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn config(&self) -> &OutlineConfig {
        &self.config
    }

    pub fn outline(&self) -> &Outline {
        self.outline.outline()
    }

    pub fn metrics(&self) -> &RowMetrics {
        &self.metrics
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn folds(&self) -> &FoldState {
        &self.folds
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn active_uid(&self) -> Option<&str> {
        self.active_uid.as_deref()
    }

    pub fn drag(&self) -> Option<&DragGesture> {
        self.drag.as_ref()
    }

    pub fn pending_focus(&self) -> Option<&PendingFocus> {
        self.pending_focus.as_ref()
    }

    pub fn take_pending_focus(&mut self) -> Option<PendingFocus> {
        self.pending_focus.take()
    }

    /// Applies edits that originate outside the engine (sync, undo). The host
    /// already knows about them, so no save is scheduled.
    pub fn edit_store(&mut self, edit: impl FnOnce(&mut S)) {
        edit(&mut self.store);
        self.ensure_non_empty();
        self.refresh();
        self.ensure_active_visible();
    }

    /// Switches to another document. Gestures in flight are abandoned and the
    /// new document's fold state is loaded. Returns the previous store.
    pub fn load_document(&mut self, doc_id: impl Into<String>, store: S) -> S {
        let previous = std::mem::replace(&mut self.store, store);
        self.doc_id = doc_id.into();
        self.drag = None;
        self.pending_focus = None;
        self.selection.clear();
        self.folds = FoldState::load(self.fold_storage.as_ref(), &self.doc_id);
        self.outline.invalidate();
        self.metrics = RowMetrics::new(self.config.height_estimator());
        self.ensure_non_empty();
        self.refresh();
        self.viewport.set_scroll_top(0.0, &self.metrics);
        self.active_uid = self.store.blocks().first().map(|block| block.uid.clone());
        debug!(doc_id = %self.doc_id, blocks = self.store.len(), "loaded document");
        previous
    }

    // Rendering

    pub fn window(&self) -> WindowSlice {
        self.viewport.slice(&self.metrics)
    }

    /// Rows inside the current window, top to bottom.
    pub fn visible_rows(&self) -> Vec<RowView> {
        let slice = self.window();
        let blocks = self.store.blocks();
        let outline = self.outline.outline();
        let active_ix = self.active_ix();

        (slice.start..slice.end)
            .filter_map(|visible_ix| {
                let actual_ix = outline.actual_for_visible(visible_ix)?;
                let item = *outline.item(actual_ix)?;
                let block = blocks.get(actual_ix)?;
                Some(RowView {
                    visible_ix,
                    item,
                    uid: block.uid.clone(),
                    block_type: block.block_type,
                    top: self.metrics.row_top(visible_ix)?,
                    height: self.metrics.heights().get(visible_ix).copied()?,
                    selected: self.selection.contains(visible_ix),
                    active: active_ix == Some(actual_ix),
                    drag_source: self
                        .drag
                        .as_ref()
                        .is_some_and(|gesture| gesture.source_uid == block.uid),
                    drop_hint: self
                        .drag
                        .as_ref()
                        .and_then(|gesture| gesture.drop_hint_for(&block.uid)),
                })
            })
            .collect()
    }

    pub fn is_selected(&self, visible_ix: usize) -> bool {
        self.selection.contains(visible_ix)
    }

    pub fn selection_summary(&self) -> SelectionSummary {
        self.selection.summary()
    }

    pub fn drag_box(&self) -> Option<DragBox> {
        self.selection.drag_box()
    }

    /// Column currently highlighted as a drop destination.
    pub fn drop_column_uid(&self) -> Option<&str> {
        self.drag.as_ref().and_then(|gesture| gesture.column_hint())
    }

    pub fn column_preview(&self, layout_uid: &str) -> Vec<ColumnPreview> {
        let Some(ix) = self.store.position_of(layout_uid) else {
            return Vec::new();
        };
        columns::build_column_preview(self.store.blocks(), ix, self.folds.collapsed())
    }

    // Viewport

    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport.set_viewport_height(height, &self.metrics);
    }

    pub fn set_scroll_top(&mut self, scroll_top: f32) {
        self.viewport.set_scroll_top(scroll_top, &self.metrics);
    }

    pub fn scroll_by(&mut self, delta: f32) {
        self.viewport.scroll_by(delta, &self.metrics);
    }

    pub fn scroll_to_index(&mut self, visible_ix: usize) -> bool {
        self.viewport.scroll_to_index(visible_ix, &self.metrics)
    }

    pub fn scroll_active_into_view(&mut self) -> bool {
        let Some(visible_ix) = self.active_visible_ix() else {
            return false;
        };
        self.viewport.scroll_to_index(visible_ix, &self.metrics)
    }

    /// Records a measured row height. A change to a row entirely above the
    /// viewport shifts the scroll offset by the same amount so the content
    /// under the viewport stays put.
    pub fn report_row_height(&mut self, uid: &str, height: f32) -> bool {
        let first = self.viewport.first_visible_row(&self.metrics);
        let Some(change) = self.metrics.record_height(uid, height) else {
            return false;
        };
        if first.is_some_and(|first| change.visible_ix < first) {
            self.viewport.scroll_by(change.delta, &self.metrics);
        } else {
            self.viewport.clamp(&self.metrics);
        }
        true
    }

    // Focus and selection

    /// Focuses a block, expanding any collapsed ancestor hiding it.
    pub fn focus_block(&mut self, uid: &str, caret: Caret) -> bool {
        let Some(ix) = self.store.position_of(uid) else {
            return false;
        };
        self.reveal(ix);
        self.selection.clear();
        self.focus(uid.to_string(), caret);
        self.scroll_active_into_view();
        true
    }

    /// Plain click on a row: drops the selection and makes the row active.
    pub fn click_row(&mut self, visible_ix: usize) -> bool {
        let Some(uid) = self.uid_for_visible(visible_ix) else {
            return false;
        };
        self.selection.clear();
        self.focus(uid, Caret::End);
        true
    }

    pub fn begin_selection(&mut self, visible_ix: usize) -> bool {
        if visible_ix >= self.outline().visible_len() {
            return false;
        }
        self.selection.begin(visible_ix);
        true
    }

    pub fn extend_selection_to(&mut self, visible_ix: usize) -> bool {
        if visible_ix >= self.outline().visible_len() {
            return false;
        }
        self.selection.extend_to(visible_ix);
        true
    }

    pub fn shift_click(&mut self, visible_ix: usize) -> bool {
        if visible_ix >= self.outline().visible_len() {
            return false;
        }
        let active = self.active_visible_ix();
        self.selection.shift_click(visible_ix, active);
        true
    }

    pub fn clear_selection(&mut self) -> bool {
        let had_range = self.selection.has_range();
        self.selection.clear();
        had_range
    }

    pub fn select_all(&mut self) -> bool {
        self.selection.select_all(self.outline().visible_len())
    }

    /// Shift+Arrow from the active row.
    pub fn extend_selection_with_arrow(&mut self, forward: bool) -> bool {
        let visible_len = self.outline().visible_len();
        let active = self.active_visible_ix().unwrap_or(0);
        let Some(edge) = self.selection.extend_with_arrow(forward, active, visible_len) else {
            return false;
        };
        self.viewport.scroll_to_index(edge, &self.metrics);
        true
    }

    pub fn pointer_down(&mut self, visible_ix: usize, position: (f32, f32), shift: bool) -> bool {
        if visible_ix >= self.outline().visible_len() {
            return false;
        }
        if shift {
            self.shift_click(visible_ix);
        }
        self.selection.begin_pointer(visible_ix, position, shift);
        true
    }

    pub fn pointer_move(&mut self, visible_ix: usize, position: (f32, f32)) -> bool {
        let last = self.outline().visible_len().checked_sub(1);
        let Some(last) = last else {
            return false;
        };
        self.selection.update_pointer(visible_ix.min(last), position)
    }

    /// Ends a pointer gesture. Returns true when it completed a drag-select.
    pub fn pointer_up(&mut self) -> bool {
        self.selection.end_pointer();
        self.selection.drag_completed()
    }

    /// Cancels a drag when one is in flight, otherwise clears the selection.
    pub fn escape(&mut self) -> bool {
        if self.cancel_drag() {
            return true;
        }
        self.clear_selection()
    }

    // Folding

    pub fn toggle_fold(&mut self, uid: &str) -> bool {
        let Some(ix) = self.store.position_of(uid) else {
            return false;
        };
        let Some(change) = self
            .folds
            .toggle(self.store.blocks(), self.outline.outline(), ix)
        else {
            trace!(doc_id = %self.doc_id, uid, "fold ignored for leaf block");
            return false;
        };

        if change == FoldChange::Collapsed {
            let end = subtree_end(self.store.blocks(), ix);
            if self
                .active_ix()
                .is_some_and(|active| active > ix && active <= end)
            {
                self.focus(uid.to_string(), Caret::End);
            }
        }
        self.after_fold_change();
        debug!(doc_id = %self.doc_id, uid, ?change, "toggled fold");
        true
    }

    pub fn toggle_fold_at(&mut self, visible_ix: usize) -> bool {
        match self.uid_for_visible(visible_ix) {
            Some(uid) => self.toggle_fold(&uid),
            None => false,
        }
    }

    /// Collapses every parent at depth `level` or deeper.
    pub fn fold_to_level(&mut self, level: i64) -> bool {
        let before = self.folds.clone();
        self.folds.fold_to_level(self.store.blocks(), level);
        if self.folds == before {
            return false;
        }
        self.after_fold_change();
        debug!(doc_id = %self.doc_id, level, "folded to level");
        true
    }

    pub fn unfold_all(&mut self) -> bool {
        if !self.folds.unfold_all() {
            return false;
        }
        self.after_fold_change();
        debug!(doc_id = %self.doc_id, "unfolded all");
        true
    }

    // Structural edits

    /// Inserts a sibling right after `after_uid` (after its hidden subtree when
    /// it is collapsed). Returns the new block id.
    pub fn insert_block_after(
        &mut self,
        after_uid: &str,
        text: &str,
        block_type: BlockType,
    ) -> Option<String> {
        let ix = self.store.position_of(after_uid)?;
        let indent = self.store.blocks()[ix].indent;
        let insert_ix = self.sibling_insert_point(ix);
        let block = self.host.create_block(text, indent, block_type);
        let uid = block.uid.clone();
        mutations::insert_at(&mut self.store, insert_ix, block)?;

        self.selection.clear();
        self.commit("insert");
        self.reveal(insert_ix);
        self.focus(uid.clone(), Caret::Start);
        self.scroll_active_into_view();
        Some(uid)
    }

    /// Enter inside a block: text after `cursor` moves into a new sibling.
    pub fn split_block(&mut self, uid: &str, cursor: usize) -> Option<String> {
        let ix = self.store.position_of(uid)?;
        let insert_ix = self.sibling_insert_point(ix);
        let blocks = self.store.blocks();
        let current = &blocks[ix];
        let (head, tail) = mutations::split_text(&current.text, cursor);

        let mut first = current.clone();
        first.text = head;
        let created = self.host.create_block(&tail, current.indent, BlockType::Text);
        let created_uid = created.uid.clone();
        let mut replacement = Vec::with_capacity(insert_ix - ix + 1);
        replacement.push(first);
        replacement.extend_from_slice(&blocks[ix + 1..insert_ix]);
        replacement.push(created);
        self.store.splice(ix..insert_ix, replacement);

        self.selection.clear();
        self.commit("split");
        self.focus(created_uid.clone(), Caret::Start);
        self.scroll_active_into_view();
        Some(created_uid)
    }

    /// Backspace at the start of a block: its text joins the previous visible
    /// block and the block is removed. Rows inside a column merge only with
    /// rows of the same column.
    pub fn merge_into_previous(&mut self, uid: &str) -> bool {
        let Some(ix) = self.store.position_of(uid) else {
            return false;
        };
        let blocks = self.store.blocks();
        let outline = self.outline.outline();
        let target = match columns::enclosing_column(blocks, outline, ix) {
            Some(column_ix) => columns::previous_in_column(outline, column_ix, ix),
            None => outline.previous_visible_before(ix),
        };
        let Some(prev) = target else {
            trace!(doc_id = %self.doc_id, uid, "merge rejected at start of document or column");
            return false;
        };
        if blocks[prev].block_type.embeds_children() {
            trace!(doc_id = %self.doc_id, uid, "merge into column layout rejected");
            return false;
        }
        let mut merged = blocks[prev].clone();
        let caret = merged.text.len();
        merged.text.push_str(&blocks[ix].text);
        let merged_uid = merged.uid.clone();
        let mut replacement = Vec::with_capacity(ix - prev);
        replacement.push(merged);
        replacement.extend_from_slice(&blocks[prev + 1..ix]);
        self.store.splice(prev..ix + 1, replacement);

        self.selection.clear();
        self.commit("merge");
        self.focus(merged_uid, Caret::Offset(caret));
        self.ensure_active_visible();
        true
    }

    /// Text edits go through here so row estimates stay current.
    pub fn set_block_text(&mut self, uid: &str, text: impl Into<String>) -> bool {
        let Some(ix) = self.store.position_of(uid) else {
            return false;
        };
        if !self.store.set_text(ix, text.into()) {
            return false;
        }
        self.refresh();
        self.host.schedule_save();
        true
    }

    /// Deletes actual indices `range`. The document is never left empty.
    pub fn delete_range(&mut self, range: RangeInclusive<usize>) -> bool {
        let (start, end) = range.into_inner();
        self.delete_span(start, end, "delete_range")
    }

    /// Deletes `uid` and whatever is folded under it. Expanded children stay.
    pub fn delete_block(&mut self, uid: &str) -> bool {
        let Some(ix) = self.store.position_of(uid) else {
            return false;
        };
        let end = mutations::hidden_run_end(self.store.blocks(), self.outline.outline(), ix);
        self.delete_span(ix, end, "delete_block")
    }

    /// Deletes the selected rows and whatever is folded under them.
    pub fn delete_selection(&mut self) -> bool {
        let targets = self.selection_targets();
        let (Some(&start), Some(&end)) = (targets.first(), targets.last()) else {
            trace!(doc_id = %self.doc_id, "delete ignored without selection");
            return false;
        };
        self.delete_span(start, end, "delete_selection")
    }

    pub fn indent_selection(&mut self) -> bool {
        self.adjust_selection_indent(1)
    }

    pub fn outdent_selection(&mut self) -> bool {
        self.adjust_selection_indent(-1)
    }

    /// Shifts the selection (or the active block) by `delta` levels. Each
    /// block clamps at zero on its own.
    pub fn adjust_selection_indent(&mut self, delta: i64) -> bool {
        let selected = self.selected_or_active();
        if selected.is_empty() {
            return false;
        }
        let keep = self.uids_at(&selected);
        let targets =
            mutations::with_hidden_descendants(self.store.blocks(), self.outline.outline(), &selected);
        if !mutations::adjust_indents(&mut self.store, &targets, delta) {
            trace!(doc_id = %self.doc_id, delta, "indent change had no effect");
            return false;
        }

        let had_range = self.selection.has_range();
        self.commit(if delta > 0 { "indent" } else { "outdent" });
        self.reveal_first(&keep);
        if had_range {
            self.restore_selection(&keep);
        }
        self.ensure_active_visible();
        true
    }

    /// Clones the selection (or the active block) right after itself with
    /// fresh ids and selects the clones.
    pub fn duplicate_selection(&mut self) -> bool {
        let selected = self.selected_or_active();
        let targets =
            mutations::with_hidden_descendants(self.store.blocks(), self.outline.outline(), &selected);
        let (Some(&start), Some(&end)) = (targets.first(), targets.last()) else {
            return false;
        };

        let host = &mut self.host;
        let Some(range) = mutations::duplicate_span(&mut self.store, start, end, |source| {
            host.create_block(&source.text, source.indent, source.block_type)
        }) else {
            return false;
        };

        let blocks = self.store.blocks();
        let mut folds_changed = false;
        for (offset, clone_ix) in range.clone().enumerate() {
            if self.folds.contains(&blocks[start + offset].uid) {
                folds_changed |= self.folds.collapse(blocks[clone_ix].uid.clone());
            }
        }
        let clone_uids: Vec<String> = blocks[range].iter().map(|block| block.uid.clone()).collect();
        if folds_changed {
            self.folds.persist(self.fold_storage.as_mut(), &self.doc_id);
        }

        self.commit("duplicate");
        self.restore_selection(&clone_uids);
        true
    }

    /// Moves the selection (or the active block) one visible step, carrying
    /// each selected block's subtree along.
    pub fn move_selection_by(&mut self, direction: i32) -> bool {
        let selected = self.selected_or_active();
        let restore = self.selection.has_range();
        self.move_rows(selected, direction, restore)
    }

    pub fn move_block_by(&mut self, uid: &str, direction: i32) -> bool {
        let Some(ix) = self.store.position_of(uid) else {
            return false;
        };
        if self
            .outline
            .outline()
            .visible_for_actual(ix)
            .is_some_and(|visible_ix| self.selection.contains(visible_ix))
        {
            return self.move_selection_by(direction);
        }
        self.selection.clear();
        self.active_uid = Some(uid.to_string());
        self.move_rows(vec![ix], direction, false)
    }

    /// Drag-and-drop relocation without a gesture in flight.
    pub fn relocate_block(
        &mut self,
        dragged_uid: &str,
        target_uid: &str,
        position: DropPosition,
        indent: Option<i64>,
    ) -> bool {
        let hover = DragHover::Target {
            uid: target_uid.to_string(),
            position,
            indent,
        };
        self.relocate(dragged_uid, &hover)
    }

    /// Appends a `Column N` column with one empty child to a layout. Returns
    /// the child's id.
    pub fn add_column_to_layout(&mut self, layout_uid: &str) -> Option<String> {
        let ix = self.store.position_of(layout_uid)?;
        let (insert_ix, count) = columns::column_insert_point(self.store.blocks(), ix)?;
        let indent = self.store.blocks()[ix].indent;
        let column =
            self.host
                .create_block(&format!("Column {}", count + 1), indent + 1, BlockType::Column);
        let child = self.host.create_block("", indent + 2, BlockType::Text);
        let child_uid = child.uid.clone();
        self.store.splice(insert_ix..insert_ix, vec![column, child]);

        self.selection.clear();
        self.commit("add_column");
        self.reveal(insert_ix + 1);
        self.focus(child_uid.clone(), Caret::Start);
        Some(child_uid)
    }

    /// Appends an empty block at the end of a column.
    pub fn add_block_to_column(&mut self, column_uid: &str) -> Option<String> {
        let ix = self.store.position_of(column_uid)?;
        let insert_ix = columns::column_child_insert_point(self.store.blocks(), ix)?;
        let indent = self.store.blocks()[ix].indent + 1;
        let block = self.host.create_block("", indent, BlockType::Text);
        let uid = block.uid.clone();
        mutations::insert_at(&mut self.store, insert_ix, block)?;

        self.selection.clear();
        self.commit("add_to_column");
        self.reveal(insert_ix);
        self.focus(uid.clone(), Caret::Start);
        Some(uid)
    }

    // Drag and drop

    pub fn begin_drag(&mut self, uid: &str) -> bool {
        if self.store.position_of(uid).is_none() {
            return false;
        }
        self.selection.end_pointer();
        self.drag = Some(DragGesture::new(uid));
        debug!(doc_id = %self.doc_id, uid, "drag started");
        true
    }

    pub fn begin_drag_at(&mut self, visible_ix: usize) -> bool {
        match self.uid_for_visible(visible_ix) {
            Some(uid) => self.begin_drag(&uid),
            None => false,
        }
    }

    pub fn hover_drop_target(
        &mut self,
        target_uid: &str,
        position: DropPosition,
        indent: Option<i64>,
    ) -> bool {
        let Some(gesture) = self.drag.as_mut() else {
            return false;
        };
        gesture.hover(DragHover::Target {
            uid: target_uid.to_string(),
            position,
            indent,
        })
    }

    pub fn hover_column(&mut self, column_uid: &str) -> bool {
        let Some(gesture) = self.drag.as_mut() else {
            return false;
        };
        gesture.hover(DragHover::Column {
            uid: column_uid.to_string(),
        })
    }

    pub fn clear_drop_hover(&mut self) -> bool {
        let Some(gesture) = self.drag.as_mut() else {
            return false;
        };
        gesture.hover(DragHover::None)
    }

    pub fn cancel_drag(&mut self) -> bool {
        let cancelled = self.drag.take().is_some();
        if cancelled {
            debug!(doc_id = %self.doc_id, "drag cancelled");
        }
        cancelled
    }

    /// Ends the gesture, applying the hovered drop if it resolves against the
    /// current blocks.
    pub fn drop_drag(&mut self) -> bool {
        let Some(gesture) = self.drag.take() else {
            return false;
        };
        self.relocate(&gesture.source_uid, &gesture.hover)
    }

    // Internals

    fn relocate(&mut self, source_uid: &str, hover: &DragHover) -> bool {
        let Some(source_ix) = self.store.position_of(source_uid) else {
            trace!(doc_id = %self.doc_id, source_uid, "drop rejected, source is gone");
            return false;
        };
        let in_selection = self
            .outline
            .outline()
            .visible_for_actual(source_ix)
            .is_some_and(|visible_ix| self.selection.contains(visible_ix));
        let selected = if in_selection {
            self.selected_rows()
        } else {
            vec![source_ix]
        };
        let keep = self.uids_at(&selected);

        let blocks = self.store.blocks();
        let Some((start, end)) = mutations::subtree_span(blocks, &selected) else {
            return false;
        };
        let Some(plan) = drag::plan_drop(blocks, start, end, hover) else {
            trace!(doc_id = %self.doc_id, source_uid, "drop rejected");
            return false;
        };
        if !mutations::relocate_span(
            &mut self.store,
            start,
            end,
            plan.insert_before,
            plan.indent_delta,
        ) {
            trace!(doc_id = %self.doc_id, source_uid, "drop would not change anything");
            return false;
        }

        self.commit("relocate");
        if let Some(ix) = self.store.position_of(source_uid) {
            self.reveal(ix);
        }
        if in_selection {
            self.restore_selection(&keep);
        } else {
            self.selection.clear();
        }
        self.focus(source_uid.to_string(), Caret::End);
        true
    }

    fn move_rows(&mut self, selected: Vec<usize>, direction: i32, restore: bool) -> bool {
        if selected.is_empty() {
            return false;
        }
        let keep = self.uids_at(&selected);
        let blocks = self.store.blocks();
        let Some((start, end)) = mutations::subtree_span(blocks, &selected) else {
            return false;
        };
        let outline = self.outline.outline();
        let target = match columns::enclosing_column(blocks, outline, start) {
            Some(column_ix) => columns::step_move_target_in_column(
                blocks,
                outline,
                column_ix,
                start,
                end,
                direction.signum(),
            ),
            None => mutations::step_move_target(blocks, outline, start, end, direction.signum()),
        };
        let Some(insert_before) = target else {
            trace!(doc_id = %self.doc_id, direction, "move rejected at document or column edge");
            return false;
        };
        if !mutations::relocate_span(&mut self.store, start, end, insert_before, 0) {
            return false;
        }

        self.commit("move");
        self.reveal_first(&keep);
        if restore {
            self.restore_selection(&keep);
        }
        self.ensure_active_visible();
        if let Some(uid) = self.active_uid.clone() {
            self.pending_focus = Some(PendingFocus {
                block_uid: uid,
                caret: Caret::End,
            });
        }
        self.scroll_active_into_view();
        true
    }

    fn delete_span(&mut self, start: usize, end: usize, op: &'static str) -> bool {
        let host = &mut self.host;
        let Some(outcome) = mutations::delete_span(&mut self.store, start, end, || {
            host.create_block("", 0, BlockType::Text)
        }) else {
            trace!(doc_id = %self.doc_id, start, end, "delete rejected");
            return false;
        };

        self.selection.clear();
        self.commit(op);
        let caret = if outcome.replaced_document {
            Caret::Start
        } else {
            Caret::End
        };
        self.focus(outcome.focus_uid, caret);
        self.ensure_active_visible();
        self.scroll_active_into_view();
        true
    }

    fn commit(&mut self, op: &'static str) {
        self.refresh();
        self.host.schedule_save();
        debug!(doc_id = %self.doc_id, op, blocks = self.store.len(), "applied outline edit");
    }

    fn after_fold_change(&mut self) {
        self.folds.persist(self.fold_storage.as_mut(), &self.doc_id);
        self.selection.clear();
        self.refresh();
        self.ensure_active_visible();
    }

    fn refresh(&mut self) {
        let blocks = self.store.blocks();
        let rebuilt = self.outline.refresh(blocks, self.folds.collapsed());
        let outline = self.outline.outline();
        self.metrics.rebuild(
            outline
                .visible_to_actual
                .iter()
                .filter_map(|ix| blocks.get(*ix)),
        );
        if rebuilt {
            let live: HashSet<&str> = blocks.iter().map(|block| block.uid.as_str()).collect();
            self.metrics.retain_measured(|uid| live.contains(uid));
        }
        self.viewport.clamp(&self.metrics);

        let visible_len = outline.visible_len();
        if let Some((start, end)) = self.selection.range() {
            if start >= visible_len {
                self.selection.clear();
            } else if end >= visible_len {
                self.selection.set_range(start, visible_len - 1);
            }
        }
    }

    fn ensure_non_empty(&mut self) {
        if self.store.is_empty() {
            let block = self.host.create_block("", 0, BlockType::Text);
            self.store.splice(0..0, vec![block]);
        }
    }

    /// Expands every collapsed ancestor of `ix`.
    fn reveal(&mut self, ix: usize) -> bool {
        let ancestors = outline::ancestor_uids(self.store.blocks(), self.outline.outline(), ix);
        if !self.folds.expand(ancestors.iter()) {
            return false;
        }
        self.after_fold_change();
        debug!(doc_id = %self.doc_id, ix, "expanded ancestors to reveal block");
        true
    }

    /// Edits can land blocks under a collapsed parent; keep them on screen.
    fn reveal_first(&mut self, uids: &[String]) -> bool {
        match uids.first().and_then(|uid| self.store.position_of(uid)) {
            Some(ix) => self.reveal(ix),
            None => false,
        }
    }

    /// True when a collapsed ancestor hides `ix`. Column embedding does not
    /// count: embedded rows stay editable inside their layout.
    fn is_folded_away(&self, ix: usize) -> bool {
        let outline = self.outline.outline();
        let mut current = outline.parent_of(ix);
        while let Some(parent) = current {
            if outline.item(parent).is_some_and(|item| item.collapsed) {
                return true;
            }
            current = outline.parent_of(parent);
        }
        false
    }

    fn ensure_active_visible(&mut self) -> bool {
        let Some(ix) = self.active_ix() else {
            self.active_uid = self.store.blocks().first().map(|block| block.uid.clone());
            return self.active_uid.is_some();
        };
        if !self.is_folded_away(ix) {
            return false;
        }
        let mut current = self.outline.outline().parent_of(ix);
        while let Some(parent) = current {
            if !self.is_folded_away(parent) {
                let uid = self.store.blocks()[parent].uid.clone();
                self.focus(uid, Caret::End);
                return true;
            }
            current = self.outline.outline().parent_of(parent);
        }
        false
    }

    fn focus(&mut self, uid: String, caret: Caret) {
        self.active_uid = Some(uid.clone());
        self.pending_focus = Some(PendingFocus {
            block_uid: uid,
            caret,
        });
    }

    fn restore_selection(&mut self, uids: &[String]) {
        let restored = outline::restore_visible_range_by_uids(
            self.store.blocks(),
            &self.outline.outline().actual_to_visible,
            uids,
        );
        self.selection.clear();
        if let Some((start, end)) = restored {
            self.selection.set_anchor(Some(start));
            self.selection.set_range(start, end);
        }
    }

    fn sibling_insert_point(&self, ix: usize) -> usize {
        let collapsed = self
            .outline
            .outline()
            .item(ix)
            .is_some_and(|item| item.collapsed);
        if collapsed {
            subtree_end(self.store.blocks(), ix) + 1
        } else {
            ix + 1
        }
    }

    fn active_ix(&self) -> Option<usize> {
        self.active_uid
            .as_deref()
            .and_then(|uid| self.store.position_of(uid))
    }

    fn active_visible_ix(&self) -> Option<usize> {
        self.active_ix()
            .and_then(|ix| self.outline.outline().visible_for_actual(ix))
    }

    fn uid_for_visible(&self, visible_ix: usize) -> Option<String> {
        let ix = self.outline.outline().actual_for_visible(visible_ix)?;
        self.store.blocks().get(ix).map(|block| block.uid.clone())
    }

    fn selected_rows(&self) -> Vec<usize> {
        self.selection
            .selected_actual_indices(&self.outline.outline().visible_to_actual)
    }

    fn selected_or_active(&self) -> Vec<usize> {
        let selected = self.selected_rows();
        if !selected.is_empty() {
            return selected;
        }
        match self.active_ix() {
            Some(ix) if !self.is_folded_away(ix) => vec![ix],
            _ => Vec::new(),
        }
    }

    fn selection_targets(&self) -> Vec<usize> {
        mutations::with_hidden_descendants(
            self.store.blocks(),
            self.outline.outline(),
            &self.selected_rows(),
        )
    }

    fn uids_at(&self, actual: &[usize]) -> Vec<String> {
        let blocks = self.store.blocks();
        actual
            .iter()
            .filter_map(|ix| blocks.get(*ix))
            .map(|block| block.uid.clone())
            .collect()
    }
}
