pub mod literal;
pub mod schema;

pub use literal::{LiteralValue, parse_literal};
pub use schema::{
    ExperimentInput, ValidationReport, validate_dimensions, validate_experiment,
    validate_materials,
};
