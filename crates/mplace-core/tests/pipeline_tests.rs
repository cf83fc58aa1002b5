use mplace_core::common::{CoordinateTransform, MplaceConfig};
use mplace_core::domain::{GridIndex, MaterialRole, MplaceErrorCategory, PlateDimensions};
use mplace_core::modules::{
    AlphaMapper, LayoutOptions, MarkerShape, VisualizationSession, build_dzn_text,
    extract_layout_csv, parse_dzn, parse_layout_csv, read_materials, scan_dzn,
};
use mplace_core::parser::{ExperimentInput, validate_experiment};

fn input<'a>(compounds: &'a str, controls: &'a str, rows: &'a str, cols: &'a str) -> ExperimentInput<'a> {
    ExperimentInput {
        compounds,
        controls,
        rows,
        cols,
    }
}

#[test]
fn valid_materials_validate_in_insertion_order() {
    let experiment = validate_experiment(
        &input(
            "{'Drug1': [5, '0.1', '0.3'], 'Drug2': [10, '1']}",
            "{'pos': [10, '100']}",
            "8",
            "12",
        ),
        &MplaceConfig::default(),
    )
    .expect("input should validate");

    let names: Vec<&str> = experiment
        .compounds
        .iter()
        .map(|material| material.name.as_str())
        .collect();
    assert_eq!(names, vec!["Drug1", "Drug2"]);
    assert_eq!(experiment.compounds[0].concentration_texts(), vec!["0.1", "0.3"]);
    assert_eq!(experiment.compounds[1].concentration_texts(), vec!["1"]);
    assert_eq!(experiment.dimensions, PlateDimensions::new(8, 12).expect("8x12"));
}

#[test]
fn zero_replicates_fail_with_a_schema_error_for_that_material() {
    let report = validate_experiment(
        &input("{'Drug1': [0, '0.1']}", "{'pos': [10, '100']}", "16", "24"),
        &MplaceConfig::default(),
    )
    .expect_err("zero replicates should fail");

    assert_eq!(report.len(), 1);
    let error = &report.errors()[0];
    assert_eq!(error.category(), MplaceErrorCategory::SchemaError);
    assert!(error.to_string().contains("Drug1"));
    assert!(error.message().contains(">= 1"));
}

#[test]
fn zero_rows_is_reported_with_every_other_violation() {
    let report = validate_experiment(
        &input("{'': [5, '0.1'], 'Drug2': [1.5, '1']}", "{'pos': [10, '100']}", "0", "24"),
        &MplaceConfig::default(),
    )
    .expect_err("input has three problems");

    assert_eq!(report.len(), 3);
    let bounds: Vec<_> = report
        .errors()
        .iter()
        .filter(|error| error.category() == MplaceErrorCategory::BoundsError)
        .collect();
    assert_eq!(bounds.len(), 1);
    assert!(bounds[0].to_string().contains("rows"));
    assert!(report.render().contains("Expected input, for example:"));
}

#[test]
fn double_letter_rows_map_past_z() {
    let mut transform = CoordinateTransform::default();
    let plate = PlateDimensions::new(30, 12).expect("30x12");

    let aa01 = "AA01".parse().expect("AA01");
    assert_eq!(transform.to_grid_within(&aa01, plate).expect("AA01"), GridIndex::new(26, 0));
    let z12 = "Z12".parse().expect("Z12");
    assert_eq!(transform.to_grid_within(&z12, plate).expect("Z12"), GridIndex::new(25, 11));
}

#[test]
fn concentrations_rank_numerically_regardless_of_input_order() {
    let table = AlphaMapper::default().table(&["10", "0.1", "1"]);
    let low = table.alpha("0.1").expect("0.1");
    let mid = table.alpha("1").expect("1");
    let high = table.alpha("10").expect("10");
    assert!(low < mid && mid < high);
}

#[test]
fn generated_dzn_reads_back_to_the_same_materials() {
    let experiment = validate_experiment(
        &input(
            "{'Drug1': [5, '0.1', '0.3', 3], 'Drug \"B\"': [10, 'high']}",
            "{'pos': [10, '100'], 'neg': [4, '0']}",
            "16",
            "24",
        ),
        &MplaceConfig::default(),
    )
    .expect("input should validate");

    let text = build_dzn_text(&experiment, &LayoutOptions::default()).expect("dzn");
    let document = parse_dzn(&text).expect("generated dzn parses");

    for role in [MaterialRole::Compound, MaterialRole::Control] {
        let original = experiment.materials(role);
        let read_back = read_materials(&document, role).expect("materials read back");
        assert_eq!(read_back.len(), original.len());
        for (left, right) in original.iter().zip(&read_back) {
            assert_eq!(left.name, right.name);
            assert_eq!(left.replicate_count, right.replicate_count);
            assert_eq!(left.concentration_texts(), right.concentration_texts());
        }
    }

    let summary = scan_dzn(&text).expect("scan");
    assert_eq!((summary.rows, summary.cols), (16, 24));
    assert_eq!(summary.control_names, experiment.control_names());
    assert_eq!(document.int("compounds").expect("compounds"), 2);
}

#[test]
fn solver_output_renders_into_well_markers() {
    let solver_output = "\
plateID,well,cmpdname,CONCuM,cmpdnum,VOLuL
plate1,A01,Drug1,0.1,1,10
plate1,A02,Drug1,0.3,1,10
plate1,P24,pos,100,2,10
----------
finished
";
    let dzn = "num_rows = 16;\nnum_cols = 24;\nnum_controls = 1;\ncontrol_names = [\"pos\"];\n";
    let summary = scan_dzn(dzn).expect("scan");

    let plates = parse_layout_csv(&extract_layout_csv(solver_output).join("\n")).expect("layout");
    let mut session = VisualizationSession::new(
        summary.dimensions().expect("dimensions"),
        &summary.control_names,
        &MplaceConfig::default(),
    )
    .expect("session");
    session.prepare(&plates);

    let markers = session.plate_markers(&plates[0]).expect("markers");
    assert_eq!(markers.len(), 3);
    assert_eq!(markers[0].alpha, 0.3);
    assert_eq!(markers[1].alpha, 1.0);
    assert_eq!(markers[2].shape, MarkerShape::Circle);
    assert_eq!(markers[2].grid, GridIndex::new(15, 23));
    assert_eq!((markers[2].x, markers[2].y), (23.5, 15.5));
}
