//! Default values shared by the validator, the DZN writer and the
//! visualization session.

pub const DEFAULT_ROWS: u32 = 16;
pub const DEFAULT_COLS: u32 = 24;

pub const MATERIAL_NAME_MAX_LENGTH: usize = 100;
pub const CONCENTRATION_LABEL_MAX_LENGTH: usize = 100;

pub const ALPHA_MIN: f64 = 0.3;
pub const ALPHA_MAX: f64 = 1.0;

pub const COORDINATE_CACHE_SIZE: usize = 2048;
pub const PALETTE_SIZE: usize = 20;
pub const WELL_COLUMN_WIDTH: usize = 2;

/// Offset from a grid index to the centre of its cell in plot units.
pub const WELL_COORDINATE_OFFSET: f64 = 0.5;

pub const DEFAULT_COMPOUNDS: &str = "{'Drug1': [5, '0.1', '0.3'], 'Drug2': [5, '1']}";
pub const DEFAULT_CONTROLS: &str = "{'pos': [10, '100']}";
