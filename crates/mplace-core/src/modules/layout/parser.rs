use crate::domain::{ConcentrationToken, MplaceError, MplaceResult, WellAddress, WellAssignment};
use indexmap::IndexMap;
use tracing::{debug, warn};

pub const LAYOUT_HEADER: &str = "plateID,well,cmpdname,CONCuM,cmpdnum,VOLuL";

const MIN_LAYOUT_FIELDS: usize = 4;

/// All wells the solver assigned on one plate, in output order.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateLayout {
    pub plate_id: String,
    pub assignments: Vec<WellAssignment>,
}

fn is_terminator(line: &str) -> bool {
    line.starts_with("criteria function")
        || line.starts_with('%')
        || line == "----------"
        || line == "finished"
}

/// Cuts the CSV block out of raw solver output: from the last header line
/// up to the first terminator after it, header included. Without a header
/// the result is empty; without a terminator the block runs to the end.
pub fn extract_layout_csv(solver_output: &str) -> Vec<&str> {
    let lines: Vec<&str> = solver_output
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .collect();
    let Some(start) = lines.iter().rposition(|line| *line == LAYOUT_HEADER) else {
        debug!("no layout header in solver output");
        return Vec::new();
    };
    let end = lines[start + 1..]
        .iter()
        .position(|line| is_terminator(line))
        .map_or(lines.len(), |offset| start + 1 + offset);

    let mut block = vec![lines[start]];
    for (offset, line) in lines[start + 1..end].iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if !line.contains(',') {
            warn!(line = start + offset + 2, text = %line, "skipping non-csv line in layout block");
            continue;
        }
        block.push(*line);
    }
    debug!(lines = block.len(), "extracted layout csv block");
    block
}

/// Groups CSV rows into plates in order of first appearance.
pub fn parse_layout_csv(text: &str) -> MplaceResult<Vec<PlateLayout>> {
    let mut plates: IndexMap<String, Vec<WellAssignment>> = IndexMap::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line == LAYOUT_HEADER {
            continue;
        }
        let line_number = index + 1;

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < MIN_LAYOUT_FIELDS {
            return Err(layout_row_error(
                line_number,
                format!(
                    "expected at least {} comma-separated fields but found {}",
                    MIN_LAYOUT_FIELDS,
                    fields.len()
                ),
            ));
        }
        if fields[0].is_empty() || fields[2].is_empty() {
            return Err(layout_row_error(
                line_number,
                "plate id and material name must not be empty",
            ));
        }

        let address = WellAddress::parse(fields[1]).map_err(|error| {
            layout_row_error(line_number, error.message().to_string())
        })?;
        plates
            .entry(fields[0].to_string())
            .or_default()
            .push(WellAssignment {
                address,
                material_name: fields[2].to_string(),
                concentration: ConcentrationToken::classify(fields[3]),
            });
    }

    debug!(plates = plates.len(), "parsed layout csv");
    Ok(plates
        .into_iter()
        .map(|(plate_id, assignments)| PlateLayout {
            plate_id,
            assignments,
        })
        .collect())
}

fn layout_row_error(line_number: usize, reason: impl Into<String>) -> MplaceError {
    MplaceError::schema("INPUT.LAYOUT_ROW", reason).with_context(format!("line {}", line_number))
}

/// Distinct concentration tokens per material across every plate, in the
/// order they are first met.
pub fn concentrations_by_material(
    plates: &[PlateLayout],
) -> IndexMap<String, Vec<ConcentrationToken>> {
    let mut materials: IndexMap<String, Vec<ConcentrationToken>> = IndexMap::new();
    for assignment in plates.iter().flat_map(|plate| plate.assignments.iter()) {
        let tokens = materials
            .entry(assignment.material_name.clone())
            .or_default();
        if !tokens
            .iter()
            .any(|token| token.as_str() == assignment.concentration.as_str())
        {
            tokens.push(assignment.concentration.clone());
        }
    }
    materials
}

#[cfg(test)]
mod tests {
    use super::{concentrations_by_material, extract_layout_csv, parse_layout_csv};
    use crate::domain::ConcentrationToken;

    const SOLVER_OUTPUT: &str = "\
% solver banner
plateID,well,cmpdname,CONCuM,cmpdnum,VOLuL
plate1,A01,Drug1,0.3,1,10
plate1,A02,pos,100,3,10

plate1,B01,Drug1,0.1,1,10
plate2,A1,Drug2,1,2,10
----------
criteria function f(x) = 12
finished
";

    #[test]
    fn csv_block_runs_from_header_to_first_terminator() {
        let block = extract_layout_csv(SOLVER_OUTPUT);
        assert_eq!(block.len(), 5);
        assert_eq!(block[0], "plateID,well,cmpdname,CONCuM,cmpdnum,VOLuL");
        assert_eq!(block[4], "plate2,A1,Drug2,1,2,10");
    }

    #[test]
    fn output_without_header_yields_nothing() {
        assert!(extract_layout_csv("=====UNSATISFIABLE=====\n").is_empty());
    }

    #[test]
    fn crlf_output_and_missing_terminator_are_tolerated() {
        let block = extract_layout_csv(
            "plateID,well,cmpdname,CONCuM,cmpdnum,VOLuL\r\nplate1,A01,Drug1,0.3,1,10\r\nnoise\r\n",
        );
        assert_eq!(block, vec![
            "plateID,well,cmpdname,CONCuM,cmpdnum,VOLuL",
            "plate1,A01,Drug1,0.3,1,10",
        ]);
    }

    #[test]
    fn rows_are_grouped_by_plate_in_encounter_order() {
        let plates = parse_layout_csv(&extract_layout_csv(SOLVER_OUTPUT).join("\n"))
            .expect("layout should parse");

        assert_eq!(plates.len(), 2);
        assert_eq!(plates[0].plate_id, "plate1");
        assert_eq!(plates[0].assignments.len(), 3);
        assert_eq!(plates[0].assignments[1].material_name, "pos");
        assert_eq!(plates[1].assignments[0].address.to_string(), "A01");
        assert_eq!(
            plates[0].assignments[0].concentration,
            ConcentrationToken::number("0.3", 0.3)
        );
    }

    #[test]
    fn concentrations_keep_first_encounter_order() {
        let plates = parse_layout_csv(&extract_layout_csv(SOLVER_OUTPUT).join("\n"))
            .expect("layout should parse");
        let concentrations = concentrations_by_material(&plates);

        let drug1: Vec<&str> = concentrations["Drug1"].iter().map(|token| token.as_str()).collect();
        assert_eq!(drug1, vec!["0.3", "0.1"]);
        assert_eq!(concentrations.keys().collect::<Vec<_>>(), vec!["Drug1", "pos", "Drug2"]);
    }

    #[test]
    fn malformed_rows_report_their_line() {
        let error = parse_layout_csv("plateID,well,cmpdname,CONCuM,cmpdnum,VOLuL\nplate1,A01\n")
            .expect_err("short row should fail");
        assert_eq!(error.placeholder(), "INPUT.LAYOUT_ROW");
        assert_eq!(error.context(), Some("line 2"));

        let error = parse_layout_csv("plate1,7A,Drug1,1,1,10").expect_err("bad well should fail");
        assert_eq!(error.placeholder(), "INPUT.LAYOUT_ROW");
        assert!(error.message().contains("7A"));
    }
}
