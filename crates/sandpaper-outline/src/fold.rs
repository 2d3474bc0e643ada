use crate::blocks::Block;
use crate::outline::{self, Outline};
use crate::storage::FoldStorage;
use std::collections::HashSet;
use tracing::warn;

pub fn collapsed_storage_key(doc_id: &str) -> String {
    format!("outline.collapsed:{doc_id}")
}

pub fn serialize_collapsed(collapsed: &HashSet<String>) -> String {
    let mut ids: Vec<_> = collapsed.iter().cloned().collect();
    ids.sort();
    serde_json::to_string(&ids).unwrap_or_else(|_| "[]".to_string())
}

pub fn deserialize_collapsed(raw: &str) -> HashSet<String> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) else {
        return HashSet::new();
    };
    let Some(array) = value.as_array() else {
        return HashSet::new();
    };
    array
        .iter()
        .filter_map(|value| value.as_str().map(str::to_string))
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FoldChange {
    Collapsed,
    Expanded,
}

/// Collapsed block ids for one document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FoldState {
    collapsed: HashSet<String>,
}

impl FoldState {
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            collapsed: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn collapsed(&self) -> &HashSet<String> {
        &self.collapsed
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.collapsed.contains(uid)
    }

    pub fn is_empty(&self) -> bool {
        self.collapsed.is_empty()
    }

    /// Sorted ids, the persisted form.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.collapsed.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Flips `actual_ix`. Leaves (other than toggle blocks) are ignored.
    pub fn toggle(&mut self, blocks: &[Block], outline: &Outline, actual_ix: usize) -> Option<FoldChange> {
        let block = blocks.get(actual_ix)?;
        let foldable = outline.has_children(actual_ix)
            || block.block_type.is_foldable_without_children();
        if !foldable {
            return None;
        }
        if self.collapsed.remove(&block.uid) {
            Some(FoldChange::Expanded)
        } else {
            self.collapsed.insert(block.uid.clone());
            Some(FoldChange::Collapsed)
        }
    }

    pub fn collapse(&mut self, uid: impl Into<String>) -> bool {
        self.collapsed.insert(uid.into())
    }

    pub fn fold_to_level(&mut self, blocks: &[Block], level: i64) {
        self.collapsed = outline::fold_to_level(blocks, level);
    }

    pub fn unfold_all(&mut self) -> bool {
        let changed = !self.collapsed.is_empty();
        self.collapsed.clear();
        changed
    }

    /// Removes every id in `uids`. Returns true when anything was expanded.
    pub fn expand<'a>(&mut self, uids: impl IntoIterator<Item = &'a String>) -> bool {
        let mut changed = false;
        for uid in uids {
            changed |= self.collapsed.remove(uid);
        }
        changed
    }

    /// Restores persisted state. Failures read as "nothing collapsed".
    pub fn load(storage: &dyn FoldStorage, doc_id: &str) -> Self {
        match storage.load(doc_id) {
            Ok(ids) => Self::from_ids(ids),
            Err(err) => {
                warn!(doc_id, error = %err, "failed to load fold state");
                Self::default()
            }
        }
    }

    /// Best effort: failures are logged and dropped.
    pub fn persist(&self, storage: &mut dyn FoldStorage, doc_id: &str) {
        if let Err(err) = storage.save(doc_id, &self.ids()) {
            warn!(doc_id, error = %err, "failed to persist fold state");
        }
    }
}
