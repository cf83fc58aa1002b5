use crate::domain::{MaterialRole, MaterialSpec, MplaceError, MplaceResult, ValidatedExperiment};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Plate layout constraints handed to the solver next to the materials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutOptions {
    /// When off, the whole plate gets one outer edge instead of one per
    /// plate line, and the solver is told so explicitly.
    pub inner_empty_edge: bool,
    pub size_empty_edge: u32,
    pub size_corner_empty_wells: u32,
    pub horizontal_cell_lines: u32,
    pub vertical_cell_lines: u32,
    pub allow_empty_wells: bool,
    pub concentrations_on_different_rows: bool,
    pub concentrations_on_different_columns: bool,
    pub replicates_on_different_plates: bool,
    pub replicates_on_same_plate: bool,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            inner_empty_edge: false,
            size_empty_edge: 0,
            size_corner_empty_wells: 0,
            horizontal_cell_lines: 1,
            vertical_cell_lines: 1,
            allow_empty_wells: false,
            concentrations_on_different_rows: false,
            concentrations_on_different_columns: false,
            replicates_on_different_plates: false,
            replicates_on_same_plate: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DznWriter<'a> {
    experiment: &'a ValidatedExperiment,
    options: &'a LayoutOptions,
}

impl<'a> DznWriter<'a> {
    pub fn new(experiment: &'a ValidatedExperiment, options: &'a LayoutOptions) -> Self {
        Self {
            experiment,
            options,
        }
    }

    pub fn render(&self) -> MplaceResult<String> {
        self.check_invariants()?;

        let mut text = String::new();
        self.write_plate(&mut text);
        self.write_role(&mut text, MaterialRole::Compound);
        text.push_str(
            "combinations = \t0;\ncombination_names = [];\ncombination_concentration_names = [];\ncombination_concentrations = 0;\n\n",
        );
        self.write_role(&mut text, MaterialRole::Control);

        debug!(
            bytes = text.len(),
            compounds = self.experiment.compounds.len(),
            controls = self.experiment.controls.len(),
            "generated dzn content"
        );
        Ok(text)
    }

    fn check_invariants(&self) -> MplaceResult<()> {
        for role in [MaterialRole::Compound, MaterialRole::Control] {
            for material in self.experiment.materials(role) {
                if material.role != role
                    || material.name.is_empty()
                    || material.replicate_count == 0
                    || material.concentrations.is_empty()
                {
                    return Err(MplaceError::internal(
                        "SYS.DZN_INVARIANT",
                        format!(
                            "material '{}' reached the dzn generator without passing validation",
                            material.name
                        ),
                    )
                    .with_context(role.field_name()));
                }
            }
        }
        Ok(())
    }

    fn write_plate(&self, text: &mut String) {
        let options = self.options;
        let dimensions = self.experiment.dimensions;

        text.push_str(&format!(
            "num_rows = {};\nnum_cols = {};\n\n",
            dimensions.rows, dimensions.cols
        ));
        if !options.inner_empty_edge {
            text.push_str("inner_empty_edge_input = false;\n");
        }
        text.push_str(&format!(
            "size_empty_edge = {};\nsize_corner_empty_wells = {};\n\n",
            options.size_empty_edge, options.size_corner_empty_wells
        ));
        text.push_str(&format!(
            "horizontal_cell_lines = {};\nvertical_cell_lines = {};\n\n",
            options.horizontal_cell_lines, options.vertical_cell_lines
        ));
        for (name, flag) in [
            ("allow_empty_wells", options.allow_empty_wells),
            (
                "concentrations_on_different_rows",
                options.concentrations_on_different_rows,
            ),
            (
                "concentrations_on_different_columns",
                options.concentrations_on_different_columns,
            ),
            (
                "replicates_on_different_plates",
                options.replicates_on_different_plates,
            ),
            ("replicates_on_same_plate", options.replicates_on_same_plate),
        ] {
            text.push_str(&format!("{} = {};\n", name, flag));
        }
        text.push('\n');
    }

    fn write_role(&self, text: &mut String, role: MaterialRole) {
        let materials = self.experiment.materials(role);
        let prefix = role.dzn_prefix();
        let count_name = match role {
            MaterialRole::Compound => "compounds",
            MaterialRole::Control => "num_controls",
        };

        let counts: Vec<String> = materials
            .iter()
            .map(|material| material.concentrations.len().to_string())
            .collect();
        let names: Vec<String> = materials
            .iter()
            .map(|material| quote(&material.name))
            .collect();
        let replicates: Vec<String> = materials
            .iter()
            .map(|material| material.replicate_count.to_string())
            .collect();

        text.push_str(&format!("{} = {};\n", count_name, materials.len()));
        text.push_str(&format!("{}_concentrations = {};\n", prefix, array(&counts)));
        text.push_str(&format!("{}_names = {};\n", prefix, array(&names)));
        text.push_str(&format!("{}_replicates = {};\n", prefix, array(&replicates)));
        text.push_str(&format!(
            "{}_concentration_names = \n{};\n",
            prefix,
            concentration_matrix(materials)
        ));

        match role {
            MaterialRole::Compound => text.push_str("compound_concentration_indicators = [];\n\n"),
            MaterialRole::Control => text.push('\n'),
        }
    }
}

pub fn build_dzn_text(
    experiment: &ValidatedExperiment,
    options: &LayoutOptions,
) -> MplaceResult<String> {
    DznWriter::new(experiment, options).render()
}

fn array(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}

/// 2-D string array, one row per material, short rows padded with `""`.
fn concentration_matrix(materials: &[MaterialSpec]) -> String {
    let width = materials
        .iter()
        .map(|material| material.concentrations.len())
        .max()
        .unwrap_or(0);

    let mut matrix = String::from("[");
    for (index, material) in materials.iter().enumerate() {
        if index > 0 {
            matrix.push(' ');
        }
        let mut cells: Vec<String> = material
            .concentration_texts()
            .into_iter()
            .map(quote)
            .collect();
        cells.resize(width, quote(""));
        matrix.push_str(&format!("| {}\n", cells.join(", ")));
    }
    matrix.push_str("|]");
    matrix
}

fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for ch in text.chars() {
        if matches!(ch, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}
