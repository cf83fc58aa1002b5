use super::CliError;
use super::helpers::{emit_text, load_config, print_json, read_input_file};
use mplace_core::common::constants::{DEFAULT_COMPOUNDS, DEFAULT_CONTROLS};
use mplace_core::domain::MplaceError;
use mplace_core::modules::layout::LAYOUT_HEADER;
use mplace_core::modules::{
    LayoutOptions, MarkerShape, VisualizationSession, WellMarker, build_dzn_text,
    extract_layout_csv, parse_layout_csv, scan_dzn,
};
use mplace_core::parser::{ExperimentInput, validate_experiment};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(clap::Args)]
pub(super) struct GenerateArgs {
    /// Compounds as {'name': [replicates, concentration, ...], ...}
    #[arg(long, default_value = DEFAULT_COMPOUNDS)]
    compounds: String,

    /// Controls in the same notation as compounds
    #[arg(long, default_value = DEFAULT_CONTROLS)]
    controls: String,

    /// Plate rows (default from config)
    #[arg(long, allow_hyphen_values = true)]
    rows: Option<String>,

    /// Plate columns (default from config)
    #[arg(long, allow_hyphen_values = true)]
    cols: Option<String>,

    #[command(flatten)]
    layout: LayoutFlags,

    /// Output data file; stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(clap::Args)]
struct LayoutFlags {
    /// Give every plate line its own empty edge
    #[arg(long)]
    inner_empty_edge: bool,

    /// Width of the empty plate edge
    #[arg(long, default_value_t = 0)]
    size_empty_edge: u32,

    /// Number of empty wells in each corner
    #[arg(long, default_value_t = 0)]
    size_corner_empty_wells: u32,

    /// Horizontal plate lines
    #[arg(long, default_value_t = 1)]
    horizontal_cell_lines: u32,

    /// Vertical plate lines
    #[arg(long, default_value_t = 1)]
    vertical_cell_lines: u32,

    #[arg(long)]
    allow_empty_wells: bool,

    #[arg(long)]
    concentrations_on_different_rows: bool,

    #[arg(long)]
    concentrations_on_different_columns: bool,

    #[arg(long)]
    replicates_on_different_plates: bool,

    #[arg(long)]
    replicates_on_same_plate: bool,
}

impl LayoutFlags {
    fn into_options(self) -> LayoutOptions {
        LayoutOptions {
            inner_empty_edge: self.inner_empty_edge,
            size_empty_edge: self.size_empty_edge,
            size_corner_empty_wells: self.size_corner_empty_wells,
            horizontal_cell_lines: self.horizontal_cell_lines,
            vertical_cell_lines: self.vertical_cell_lines,
            allow_empty_wells: self.allow_empty_wells,
            concentrations_on_different_rows: self.concentrations_on_different_rows,
            concentrations_on_different_columns: self.concentrations_on_different_columns,
            replicates_on_different_plates: self.replicates_on_different_plates,
            replicates_on_same_plate: self.replicates_on_same_plate,
        }
    }
}

#[derive(clap::Args)]
pub(super) struct ScanArgs {
    /// Solver data file
    dzn: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct ExtractArgs {
    /// Captured solver output
    solver_output: PathBuf,

    /// Output CSV file; stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct MarkersArgs {
    /// Layout CSV or raw solver output
    layout: PathBuf,

    /// Data file the layout was solved from
    #[arg(long)]
    dzn: PathBuf,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkerReport {
    rows: u32,
    cols: u32,
    transposed: bool,
    plates: Vec<PlateMarkers>,
    legend: Vec<LegendEntry>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlateMarkers {
    plate_id: String,
    markers: Vec<WellMarker>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LegendEntry {
    material: String,
    shape: MarkerShape,
    palette_slot: usize,
    levels: Vec<(String, f64)>,
}

pub(super) fn run_generate_command(args: GenerateArgs) -> Result<i32, CliError> {
    let config = load_config(args.config.as_deref())?;
    let default_rows = config.plate.default_rows.to_string();
    let default_cols = config.plate.default_cols.to_string();

    let input = ExperimentInput {
        compounds: &args.compounds,
        controls: &args.controls,
        rows: args.rows.as_deref().unwrap_or(&default_rows),
        cols: args.cols.as_deref().unwrap_or(&default_cols),
    };
    let experiment = validate_experiment(&input, &config).map_err(CliError::Validation)?;

    let options = args.layout.into_options();
    let text = build_dzn_text(&experiment, &options)?;
    emit_text(args.output.as_deref(), &text)?;

    if let Some(path) = &args.output {
        println!("DZN file: {}", path.display());
    }
    info!(controls = ?experiment.control_names(), "generate finished");
    Ok(0)
}

pub(super) fn run_scan_command(args: ScanArgs) -> Result<i32, CliError> {
    let text = read_input_file(&args.dzn, "data file")?;
    let summary = scan_dzn(&text)?;
    print_json(&summary)?;
    Ok(0)
}

pub(super) fn run_extract_command(args: ExtractArgs) -> Result<i32, CliError> {
    let text = read_input_file(&args.solver_output, "solver output")?;
    let block = extract_layout_csv(&text);
    if block.is_empty() {
        warn!(path = %args.solver_output.display(), "no layout block found");
        return Err(MplaceError::schema(
            "INPUT.LAYOUT_MISSING",
            format!("solver output has no '{}' block", LAYOUT_HEADER),
        )
        .with_context(args.solver_output.display().to_string())
        .into());
    }
    emit_text(args.output.as_deref(), &block.join("\n"))?;
    Ok(0)
}

pub(super) fn run_markers_command(args: MarkersArgs) -> Result<i32, CliError> {
    let config = load_config(args.config.as_deref())?;
    let summary = scan_dzn(&read_input_file(&args.dzn, "data file")?)?;

    let raw = read_input_file(&args.layout, "layout")?;
    let csv = if raw.lines().any(|line| line.trim_end() == LAYOUT_HEADER) {
        extract_layout_csv(&raw).join("\n")
    } else {
        raw
    };
    let plates = parse_layout_csv(&csv)?;

    let mut session =
        VisualizationSession::new(summary.dimensions()?, &summary.control_names, &config)?;
    session.prepare(&plates);

    let mut rendered = Vec::with_capacity(plates.len());
    let mut materials: Vec<(String, MarkerShape)> = Vec::new();
    for plate in &plates {
        let markers = session.plate_markers(plate)?;
        for marker in &markers {
            if !materials.iter().any(|(name, _)| *name == marker.material) {
                materials.push((marker.material.clone(), marker.shape));
            }
        }
        rendered.push(PlateMarkers {
            plate_id: plate.plate_id.clone(),
            markers,
        });
    }

    materials.sort_by(|left, right| left.0.cmp(&right.0));
    let legend = materials
        .into_iter()
        .map(|(material, shape)| LegendEntry {
            palette_slot: session.palette_slot(&material).unwrap_or_default(),
            levels: session.legend(&material).unwrap_or_default(),
            material,
            shape,
        })
        .collect();

    let dimensions = session.dimensions();
    print_json(&MarkerReport {
        rows: dimensions.rows,
        cols: dimensions.cols,
        transposed: session.is_transposed(),
        plates: rendered,
        legend,
    })?;
    Ok(0)
}
