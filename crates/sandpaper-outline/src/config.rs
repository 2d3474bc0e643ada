use crate::error::StorageError;
use crate::metrics::{ContentRowHeight, FixedRowHeight, RowHeightEstimator, ROW_HEIGHT};
use crate::selection::DRAG_SELECT_THRESHOLD_PX;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineConfig {
    /// Height of a row nobody has measured yet.
    pub row_height: f32,
    /// Extra rows rendered above and below the viewport.
    pub overscan: usize,
    pub viewport_height: f32,
    pub drag_select_threshold_px: f32,
    /// Estimate unmeasured rows from their type and line count instead of
    /// using `row_height` for everything.
    pub estimate_heights: bool,
}

impl Default for OutlineConfig {
    fn default() -> Self {
        Self {
            row_height: ROW_HEIGHT,
            overscan: 8,
            viewport_height: 720.0,
            drag_select_threshold_px: DRAG_SELECT_THRESHOLD_PX,
            estimate_heights: false,
        }
    }
}

impl OutlineConfig {
    pub fn from_json(raw: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Reads a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn height_estimator(&self) -> Box<dyn RowHeightEstimator> {
        if self.estimate_heights {
            Box::new(ContentRowHeight {
                base: self.row_height,
                ..ContentRowHeight::default()
            })
        } else {
            Box::new(FixedRowHeight(self.row_height))
        }
    }
}
