pub mod dzn;
pub mod layout;
pub mod serialization;
pub mod visual;

pub use dzn::{
    DznDocument, DznSummary, DznValue, DznWriter, LayoutOptions, build_dzn_text, parse_dzn,
    read_materials, scan_dzn,
};
pub use layout::{PlateLayout, concentrations_by_material, extract_layout_csv, parse_layout_csv};
pub use visual::{
    AlphaMapper, AlphaOrdering, AlphaRange, AlphaTable, MarkerShape, VisualizationSession,
    WellMarker,
};
