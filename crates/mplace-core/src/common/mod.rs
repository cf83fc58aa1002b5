pub mod config;
pub mod constants;
pub mod coordinates;

pub use config::{MaterialPolicy, MplaceConfig, PlatePolicy, VisualizationConfig};
pub use coordinates::{CoordinateTransform, row_index, row_letters};
