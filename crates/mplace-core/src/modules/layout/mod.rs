//! Solved plate layouts as printed by the solver.

mod parser;

pub use parser::{
    LAYOUT_HEADER, PlateLayout, concentrations_by_material, extract_layout_csv, parse_layout_csv,
};
