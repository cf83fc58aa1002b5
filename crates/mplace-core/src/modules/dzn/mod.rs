//! Solver data files: generation from a validated experiment and read-back.

mod reader;
mod writer;

pub use reader::{DznDocument, DznSummary, DznValue, parse_dzn, read_materials, scan_dzn};
pub use writer::{DznWriter, LayoutOptions, build_dzn_text};
