//! Policy knobs for validation and visualization.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration and callers only spell out what they change.

use super::constants::{
    ALPHA_MAX, ALPHA_MIN, CONCENTRATION_LABEL_MAX_LENGTH, COORDINATE_CACHE_SIZE, DEFAULT_COLS,
    DEFAULT_ROWS, MATERIAL_NAME_MAX_LENGTH, PALETTE_SIZE, WELL_COLUMN_WIDTH,
};
use crate::domain::{MplaceError, MplaceResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MplaceConfig {
    pub plate: PlatePolicy,
    pub materials: MaterialPolicy,
    pub visualization: VisualizationConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlatePolicy {
    pub default_rows: u32,
    pub default_cols: u32,
    /// Optional sanity caps; `None` leaves plate size unbounded.
    pub max_rows: Option<u32>,
    pub max_cols: Option<u32>,
}

impl Default for PlatePolicy {
    fn default() -> Self {
        Self {
            default_rows: DEFAULT_ROWS,
            default_cols: DEFAULT_COLS,
            max_rows: None,
            max_cols: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MaterialPolicy {
    pub max_name_length: usize,
    pub max_label_length: usize,
}

impl Default for MaterialPolicy {
    fn default() -> Self {
        Self {
            max_name_length: MATERIAL_NAME_MAX_LENGTH,
            max_label_length: CONCENTRATION_LABEL_MAX_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VisualizationConfig {
    pub alpha_min: f64,
    pub alpha_max: f64,
    pub coordinate_cache_capacity: usize,
    pub palette_size: usize,
    pub column_width: usize,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            alpha_min: ALPHA_MIN,
            alpha_max: ALPHA_MAX,
            coordinate_cache_capacity: COORDINATE_CACHE_SIZE,
            palette_size: PALETTE_SIZE,
            column_width: WELL_COLUMN_WIDTH,
        }
    }
}

impl MplaceConfig {
    pub fn from_json_str(source: &str) -> MplaceResult<Self> {
        let config = serde_json::from_str::<Self>(source).map_err(|source| {
            MplaceError::schema(
                "CONFIG.PARSE",
                format!("failed to parse configuration: {}", source),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MplaceResult<()> {
        let visualization = &self.visualization;
        let in_unit_range = |value: f64| value.is_finite() && (0.0..=1.0).contains(&value);
        if !in_unit_range(visualization.alpha_min) || !in_unit_range(visualization.alpha_max) {
            return Err(MplaceError::schema(
                "CONFIG.ALPHA_RANGE",
                "alpha bounds must be finite and within [0, 1]",
            ));
        }
        if visualization.alpha_min > visualization.alpha_max {
            return Err(MplaceError::schema(
                "CONFIG.ALPHA_RANGE",
                format!(
                    "alphaMin ({}) must not exceed alphaMax ({})",
                    visualization.alpha_min, visualization.alpha_max
                ),
            ));
        }
        if visualization.coordinate_cache_capacity == 0 {
            return Err(MplaceError::schema(
                "CONFIG.CACHE_CAPACITY",
                "coordinateCacheCapacity must be >= 1",
            ));
        }
        if visualization.palette_size == 0 {
            return Err(MplaceError::schema(
                "CONFIG.PALETTE_SIZE",
                "paletteSize must be >= 1",
            ));
        }

        let plate = &self.plate;
        if plate.default_rows == 0 || plate.default_cols == 0 {
            return Err(MplaceError::bounds(
                "CONFIG.PLATE_DEFAULTS",
                "default plate dimensions must be >= 1",
            ));
        }
        if plate.max_rows == Some(0) || plate.max_cols == Some(0) {
            return Err(MplaceError::bounds(
                "CONFIG.PLATE_LIMITS",
                "plate size caps must be >= 1 when set",
            ));
        }
        if self.materials.max_name_length == 0 || self.materials.max_label_length == 0 {
            return Err(MplaceError::schema(
                "CONFIG.MATERIAL_LIMITS",
                "material length limits must be >= 1",
            ));
        }
        Ok(())
    }
}
