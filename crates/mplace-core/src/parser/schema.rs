//! Materials schema validation.
//!
//! Unlike the literal reader this stage is fail-slow: every violation in
//! every field is collected so the user fixes the whole input in one pass.

use super::literal::{LiteralValue, parse_literal};
use crate::common::config::{MaterialPolicy, MplaceConfig, PlatePolicy};
use crate::common::constants::{DEFAULT_COMPOUNDS, DEFAULT_CONTROLS};
use crate::domain::{
    ConcentrationToken, MaterialRole, MaterialSpec, MplaceError, MplaceErrorCategory,
    PlateDimensions, ValidatedExperiment,
};
use std::collections::HashSet;
use tracing::{info, warn};

/// Raw field text exactly as the user entered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExperimentInput<'a> {
    pub compounds: &'a str,
    pub controls: &'a str,
    pub rows: &'a str,
    pub cols: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("input validation failed with {} error(s)", .errors.len())]
pub struct ValidationReport {
    errors: Vec<MplaceError>,
}

impl ValidationReport {
    pub fn new(errors: Vec<MplaceError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[MplaceError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<MplaceError> {
        self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_category(&self, category: MplaceErrorCategory) -> bool {
        self.errors.iter().any(|error| error.category() == category)
    }

    /// Full user-facing report: one numbered line per error followed by a
    /// corrective example of well-formed input.
    pub fn render(&self) -> String {
        let mut lines = vec![format!(
            "Input validation failed with {} error(s):",
            self.errors.len()
        )];
        for (index, error) in self.errors.iter().enumerate() {
            lines.push(format!("  {}. {}", index + 1, error));
        }
        lines.push(String::new());
        lines.push("Expected input, for example:".to_string());
        lines.push(format!("  compounds: {}", DEFAULT_COMPOUNDS));
        lines.push(format!("  controls:  {}", DEFAULT_CONTROLS));
        lines.push("  rows, cols: positive integers such as 16 and 24".to_string());
        lines.push(
            "Each entry is 'name': [replicate count >= 1, concentration, ...]".to_string(),
        );
        lines.join("\n")
    }
}

pub fn validate_experiment(
    input: &ExperimentInput<'_>,
    config: &MplaceConfig,
) -> Result<ValidatedExperiment, ValidationReport> {
    let mut errors = Vec::new();

    let dimensions = match validate_dimensions(input.rows, input.cols, &config.plate) {
        Ok(dimensions) => Some(dimensions),
        Err(dimension_errors) => {
            errors.extend(dimension_errors);
            None
        }
    };

    let compounds_literal = parse_field(input.compounds, MaterialRole::Compound, &mut errors);
    let controls_literal = parse_field(input.controls, MaterialRole::Control, &mut errors);

    let compounds = compounds_literal.as_ref().map(|literal| {
        validate_materials(literal, MaterialRole::Compound, &config.materials)
            .unwrap_or_else(|role_errors| {
                errors.extend(role_errors);
                Vec::new()
            })
    });
    let controls = controls_literal.as_ref().map(|literal| {
        validate_materials(literal, MaterialRole::Control, &config.materials)
            .unwrap_or_else(|role_errors| {
                errors.extend(role_errors);
                Vec::new()
            })
    });

    if let (Some(compounds_literal), Some(controls_literal)) =
        (&compounds_literal, &controls_literal)
    {
        errors.extend(cross_role_duplicates(compounds_literal, controls_literal));
    }

    match (dimensions, compounds, controls) {
        (Some(dimensions), Some(compounds), Some(controls)) if errors.is_empty() => {
            let experiment = ValidatedExperiment {
                compounds,
                controls,
                dimensions,
            };
            info!(
                compounds = experiment.compounds.len(),
                controls = experiment.controls.len(),
                wells = experiment.required_wells(),
                plate = %experiment.dimensions,
                "input validation passed"
            );
            Ok(experiment)
        }
        _ => {
            warn!(errors = errors.len(), "input validation failed");
            Err(ValidationReport::new(errors))
        }
    }
}

fn parse_field(
    text: &str,
    role: MaterialRole,
    errors: &mut Vec<MplaceError>,
) -> Option<LiteralValue> {
    if text.trim().is_empty() {
        errors.push(
            MplaceError::schema("INPUT.EMPTY_FIELD", "field must not be empty")
                .with_context(role.field_name()),
        );
        return None;
    }

    match parse_literal(text) {
        Ok(value) => Some(value),
        Err(error) => {
            errors.push(error.with_context(role.field_name()));
            None
        }
    }
}

/// Checks one role's mapping and converts it into material specs.
pub fn validate_materials(
    value: &LiteralValue,
    role: MaterialRole,
    policy: &MaterialPolicy,
) -> Result<Vec<MaterialSpec>, Vec<MplaceError>> {
    let Some(entries) = value.as_map() else {
        return Err(vec![
            MplaceError::schema(
                "INPUT.SCHEMA_MAPPING",
                format!(
                    "expected a mapping of material name to [replicates, concentration, ...] but found {}",
                    value.kind_name()
                ),
            )
            .with_context(role.field_name()),
        ]);
    };

    let mut errors = Vec::new();
    let mut materials = Vec::with_capacity(entries.len());
    let mut seen = HashSet::new();

    for (name, entry) in entries {
        let context = format!("{}['{}']", role.field_name(), name);
        let before = errors.len();

        if !seen.insert(name.as_str()) {
            errors.push(
                MplaceError::namespace(
                    "INPUT.NAMESPACE_DUPLICATE",
                    format!("material '{}' is declared more than once in {}", name, role),
                )
                .with_context(context.clone()),
            );
        }
        if let Some(reason) = printable_violation(name, policy.max_name_length) {
            errors.push(
                MplaceError::schema("INPUT.SCHEMA_NAME", format!("material name {}", reason))
                    .with_context(context.clone()),
            );
        }

        let spec = material_from_entry(name, entry, role, policy, &context, &mut errors);
        if errors.len() == before
            && let Some(spec) = spec
        {
            materials.push(spec);
        }
    }

    if errors.is_empty() {
        Ok(materials)
    } else {
        Err(errors)
    }
}

fn material_from_entry(
    name: &str,
    entry: &LiteralValue,
    role: MaterialRole,
    policy: &MaterialPolicy,
    context: &str,
    errors: &mut Vec<MplaceError>,
) -> Option<MaterialSpec> {
    let items = match entry.as_list() {
        Some(items) if items.len() >= 2 => items,
        Some(items) => {
            errors.push(
                MplaceError::schema(
                    "INPUT.SCHEMA_ENTRY",
                    format!(
                        "expected [replicates, concentration, ...] with at least one concentration but found {} item(s)",
                        items.len()
                    ),
                )
                .with_context(context),
            );
            return None;
        }
        None => {
            errors.push(
                MplaceError::schema(
                    "INPUT.SCHEMA_ENTRY",
                    format!(
                        "expected a list [replicates, concentration, ...] but found {}",
                        entry.kind_name()
                    ),
                )
                .with_context(context),
            );
            return None;
        }
    };

    let replicate_count = match &items[0] {
        LiteralValue::Int { value, .. } if *value >= 1 => match u32::try_from(*value) {
            Ok(count) => Some(count),
            Err(_) => {
                errors.push(
                    MplaceError::schema(
                        "INPUT.SCHEMA_REPLICATES",
                        format!("replicate count {} is too large", value),
                    )
                    .with_context(context),
                );
                None
            }
        },
        other => {
            errors.push(
                MplaceError::schema(
                    "INPUT.SCHEMA_REPLICATES",
                    format!(
                        "replicate count must be an integer >= 1 (found {})",
                        other.describe()
                    ),
                )
                .with_context(context),
            );
            None
        }
    };

    let mut concentrations = Vec::with_capacity(items.len() - 1);
    for (position, item) in items[1..].iter().enumerate() {
        match concentration_token(item, policy) {
            Ok(token) => concentrations.push(token),
            Err(reason) => errors.push(
                MplaceError::schema(
                    "INPUT.SCHEMA_CONCENTRATION",
                    format!("concentration #{} {}", position + 1, reason),
                )
                .with_context(context),
            ),
        }
    }

    let replicate_count = replicate_count?;
    (concentrations.len() == items.len() - 1)
        .then(|| MaterialSpec::new(name, role, replicate_count, concentrations))
}

fn concentration_token(
    item: &LiteralValue,
    policy: &MaterialPolicy,
) -> Result<ConcentrationToken, String> {
    match item {
        LiteralValue::Int { value, text } => Ok(ConcentrationToken::number(text, *value as f64)),
        LiteralValue::Float { value, text } => Ok(ConcentrationToken::number(text, *value)),
        LiteralValue::Str(label) => match printable_violation(label, policy.max_label_length) {
            Some(reason) => Err(format!("label {}", reason)),
            None => Ok(ConcentrationToken::label(label)),
        },
        other => Err(format!(
            "must be a number or a quoted label (found {})",
            other.describe()
        )),
    }
}

fn printable_violation(text: &str, max_length: usize) -> Option<String> {
    if text.trim().is_empty() {
        return Some("must not be empty".to_string());
    }
    if text.chars().any(char::is_control) {
        return Some(format!("'{}' contains control characters", text.escape_default()));
    }
    let length = text.chars().count();
    if length > max_length {
        return Some(format!(
            "is {} characters long (at most {} allowed)",
            length, max_length
        ));
    }
    None
}

/// Compounds and controls share one namespace so layout rows never refer
/// to an ambiguous material.
fn cross_role_duplicates(compounds: &LiteralValue, controls: &LiteralValue) -> Vec<MplaceError> {
    let (Some(compound_entries), Some(control_entries)) = (compounds.as_map(), controls.as_map())
    else {
        return Vec::new();
    };

    let compound_names: HashSet<&str> = compound_entries
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    let mut reported = HashSet::new();

    control_entries
        .iter()
        .map(|(name, _)| name.as_str())
        .filter(|name| compound_names.contains(name) && reported.insert(*name))
        .map(|name| {
            MplaceError::namespace(
                "INPUT.NAMESPACE_DUPLICATE",
                format!("material '{}' is declared as both a compound and a control", name),
            )
            .with_context(format!("controls['{}']", name))
        })
        .collect()
}

pub fn validate_dimensions(
    rows: &str,
    cols: &str,
    policy: &PlatePolicy,
) -> Result<PlateDimensions, Vec<MplaceError>> {
    let mut errors = Vec::new();
    let rows = dimension_value("rows", rows, policy.max_rows, &mut errors);
    let cols = dimension_value("cols", cols, policy.max_cols, &mut errors);

    match (rows, cols) {
        (Some(rows), Some(cols)) if errors.is_empty() => {
            PlateDimensions::new(rows, cols).map_err(|error| vec![error])
        }
        _ => Err(errors),
    }
}

fn dimension_value(
    field: &'static str,
    text: &str,
    cap: Option<u32>,
    errors: &mut Vec<MplaceError>,
) -> Option<u32> {
    let placeholder = match field {
        "rows" => "INPUT.BOUNDS_ROWS",
        _ => "INPUT.BOUNDS_COLS",
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        errors.push(
            MplaceError::schema("INPUT.EMPTY_FIELD", "field must not be empty").with_context(field),
        );
        return None;
    }

    let Ok(value) = trimmed.parse::<i64>() else {
        errors.push(
            MplaceError::schema(
                "INPUT.SCHEMA_DIMENSION",
                format!("{} must be an integer >= 1 (found '{}')", field, trimmed),
            )
            .with_context(field),
        );
        return None;
    };

    if value < 1 {
        errors.push(
            MplaceError::bounds(
                placeholder,
                format!("{} must be an integer >= 1 (found {})", field, value),
            )
            .with_context(field),
        );
        return None;
    }

    let Ok(value) = u32::try_from(value) else {
        errors.push(
            MplaceError::bounds(placeholder, format!("{} value {} is too large", field, value))
                .with_context(field),
        );
        return None;
    };

    if let Some(cap) = cap
        && value > cap
    {
        errors.push(
            MplaceError::bounds(
                placeholder,
                format!("{} must be at most {} (found {})", field, cap, value),
            )
            .with_context(field),
        );
        return None;
    }

    Some(value)
}
