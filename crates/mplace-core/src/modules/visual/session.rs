use super::alpha::{AlphaMapper, AlphaRange, AlphaTable};
use crate::common::config::MplaceConfig;
use crate::common::constants::WELL_COORDINATE_OFFSET;
use crate::common::coordinates::CoordinateTransform;
use crate::domain::{GridIndex, MplaceError, MplaceResult, PlateDimensions};
use crate::modules::layout::{PlateLayout, concentrations_by_material};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerShape {
    Circle,
    Square,
}

/// Everything needed to draw one well.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WellMarker {
    pub address: String,
    pub grid: GridIndex,
    pub x: f64,
    pub y: f64,
    pub material: String,
    pub shape: MarkerShape,
    pub alpha: f64,
    pub palette_slot: usize,
}

#[derive(Debug, Clone)]
struct MaterialTable {
    tokens: Vec<String>,
    table: AlphaTable,
}

/// Rendering state for one set of solved plates. Owns the coordinate cache
/// and the per-material alpha tables; dropping the session drops both.
#[derive(Debug, Clone)]
pub struct VisualizationSession {
    dimensions: PlateDimensions,
    control_names: HashSet<String>,
    transform: CoordinateTransform,
    mapper: AlphaMapper,
    tables: IndexMap<String, MaterialTable>,
    palette: IndexMap<String, usize>,
    palette_size: usize,
    column_width: usize,
    table_builds: usize,
}

impl VisualizationSession {
    pub fn new(
        dimensions: PlateDimensions,
        control_names: &[String],
        config: &MplaceConfig,
    ) -> MplaceResult<Self> {
        config.validate()?;
        let visualization = &config.visualization;

        Ok(Self {
            dimensions,
            control_names: control_names.iter().cloned().collect(),
            transform: CoordinateTransform::new(visualization.coordinate_cache_capacity),
            mapper: AlphaMapper::new(AlphaRange::from_config(visualization)?),
            tables: IndexMap::new(),
            palette: IndexMap::new(),
            palette_size: visualization.palette_size,
            column_width: visualization.column_width,
            table_builds: 0,
        })
    }

    pub const fn dimensions(&self) -> PlateDimensions {
        self.dimensions
    }

    /// The longer plate side is drawn horizontally.
    pub const fn is_transposed(&self) -> bool {
        self.dimensions.cols > self.dimensions.rows
    }

    /// Plot width and height in well units.
    pub fn plot_extent(&self) -> (f64, f64) {
        let rows = f64::from(self.dimensions.rows);
        let cols = f64::from(self.dimensions.cols);
        (rows.max(cols), rows.min(cols))
    }

    /// Builds one alpha table per material and assigns palette slots.
    /// A material keeps its existing table while its token list is unchanged.
    pub fn prepare(&mut self, plates: &[PlateLayout]) {
        let concentrations = concentrations_by_material(plates);
        self.tables
            .retain(|material, _| concentrations.contains_key(material));

        for (material, tokens) in &concentrations {
            let texts: Vec<String> = tokens.iter().map(|token| token.as_str().to_string()).collect();
            if self
                .tables
                .get(material)
                .is_some_and(|cached| cached.tokens == texts)
            {
                continue;
            }

            let borrowed: Vec<&str> = texts.iter().map(String::as_str).collect();
            let table = self.mapper.table(&borrowed);
            self.table_builds += 1;
            self.tables.insert(
                material.clone(),
                MaterialTable {
                    tokens: texts,
                    table,
                },
            );
        }

        let mut names: Vec<&String> = concentrations.keys().collect();
        names.sort();
        self.palette = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), index % self.palette_size))
            .collect();

        debug!(
            materials = self.tables.len(),
            table_builds = self.table_builds,
            "prepared visualization session"
        );
    }

    pub fn alpha_table(&self, material: &str) -> Option<&AlphaTable> {
        self.tables.get(material).map(|cached| &cached.table)
    }

    pub fn palette_slot(&self, material: &str) -> Option<usize> {
        self.palette.get(material).copied()
    }

    /// Number of alpha tables computed over the session's lifetime.
    pub const fn table_builds(&self) -> usize {
        self.table_builds
    }

    /// `(token, alpha)` pairs in rank order.
    pub fn legend(&self, material: &str) -> Option<Vec<(String, f64)>> {
        self.alpha_table(material).map(|table| {
            table
                .iter()
                .map(|(token, alpha)| (token.to_string(), alpha))
                .collect()
        })
    }

    pub fn plate_markers(&mut self, plate: &PlateLayout) -> MplaceResult<Vec<WellMarker>> {
        let mut markers = Vec::with_capacity(plate.assignments.len());
        let transposed = self.is_transposed();

        for assignment in &plate.assignments {
            let grid = self
                .transform
                .to_grid_within(&assignment.address, self.dimensions)
                .map_err(|error| error.with_context(format!("plate {}", plate.plate_id)))?;

            let material = assignment.material_name.as_str();
            let token = assignment.concentration.as_str();
            let alpha = self
                .alpha_table(material)
                .and_then(|table| table.alpha(token))
                .ok_or_else(|| unprepared(material, token))?;
            let palette_slot = self
                .palette_slot(material)
                .ok_or_else(|| unprepared(material, token))?;

            let (x, y) = if transposed {
                (grid.col as f64, grid.row as f64)
            } else {
                (grid.row as f64, grid.col as f64)
            };
            let shape = if self.control_names.contains(material) {
                MarkerShape::Circle
            } else {
                MarkerShape::Square
            };
            trace!(well = %assignment.address, material, alpha, "well marker");

            markers.push(WellMarker {
                address: assignment.address.padded(self.column_width),
                grid,
                x: x + WELL_COORDINATE_OFFSET,
                y: y + WELL_COORDINATE_OFFSET,
                material: material.to_string(),
                shape,
                alpha,
                palette_slot,
            });
        }

        Ok(markers)
    }
}

fn unprepared(material: &str, token: &str) -> MplaceError {
    MplaceError::internal(
        "SYS.SESSION_UNPREPARED",
        format!(
            "no alpha table entry for '{}' at '{}'; prepare the session with every plate first",
            material, token
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::{MarkerShape, VisualizationSession};
    use crate::common::config::MplaceConfig;
    use crate::domain::{GridIndex, MplaceErrorCategory, PlateDimensions};
    use crate::modules::layout::parse_layout_csv;

    const LAYOUT: &str = "\
plate1,A01,Drug1,0.3,1,10
plate1,B02,Drug1,0.1,1,10
plate1,C03,pos,100,3,10
plate2,A01,Drug2,1,2,10
";

    fn session(rows: u32, cols: u32) -> VisualizationSession {
        VisualizationSession::new(
            PlateDimensions::new(rows, cols).expect("dimensions"),
            &["pos".to_string()],
            &MplaceConfig::default(),
        )
        .expect("session")
    }

    #[test]
    fn markers_carry_shape_alpha_and_palette_slot() {
        let plates = parse_layout_csv(LAYOUT).expect("layout");
        let mut session = session(16, 24);
        session.prepare(&plates);

        let markers = session.plate_markers(&plates[0]).expect("markers");
        assert_eq!(markers.len(), 3);

        let first = &markers[0];
        assert_eq!(first.address, "A01");
        assert_eq!(first.grid, GridIndex::new(0, 0));
        assert_eq!(first.shape, MarkerShape::Square);
        assert_eq!(first.alpha, 1.0);
        assert_eq!(first.palette_slot, 0);

        assert_eq!(markers[1].alpha, 0.3);
        assert_eq!(markers[2].shape, MarkerShape::Circle);
        assert_eq!(markers[2].palette_slot, 2);
    }

    #[test]
    fn wide_plates_are_transposed_so_columns_run_horizontally() {
        let plates = parse_layout_csv(LAYOUT).expect("layout");

        let mut wide = session(16, 24);
        wide.prepare(&plates);
        assert!(wide.is_transposed());
        assert_eq!(wide.plot_extent(), (24.0, 16.0));
        let marker = &wide.plate_markers(&plates[0]).expect("markers")[1];
        assert_eq!((marker.x, marker.y), (1.5, 1.5));
        let marker = &wide.plate_markers(&plates[0]).expect("markers")[2];
        assert_eq!((marker.x, marker.y), (2.5, 2.5));

        let tall_layout = parse_layout_csv("p,B01,Drug1,1,1,1").expect("layout");
        let mut tall = session(24, 16);
        tall.prepare(&tall_layout);
        assert!(!tall.is_transposed());
        let marker = &tall.plate_markers(&tall_layout[0]).expect("markers")[0];
        assert_eq!((marker.x, marker.y), (1.5, 0.5));

        let mut wide = session(8, 12);
        wide.prepare(&tall_layout);
        let marker = &wide.plate_markers(&tall_layout[0]).expect("markers")[0];
        assert_eq!((marker.x, marker.y), (0.5, 1.5));
    }

    #[test]
    fn tables_are_built_once_per_material() {
        let plates = parse_layout_csv(LAYOUT).expect("layout");
        let mut session = session(16, 24);
        session.prepare(&plates);
        assert_eq!(session.table_builds(), 3);

        for plate in &plates {
            session.plate_markers(plate).expect("markers");
        }
        session.prepare(&plates);
        assert_eq!(session.table_builds(), 3);

        let changed = parse_layout_csv("plate1,A01,Drug1,0.3,1,10\nplate1,A02,Drug1,3,1,10")
            .expect("layout");
        session.prepare(&changed);
        assert_eq!(session.table_builds(), 4);
        assert!(session.alpha_table("pos").is_none());
    }

    #[test]
    fn legend_lists_tokens_in_rank_order() {
        let plates = parse_layout_csv(LAYOUT).expect("layout");
        let mut session = session(16, 24);
        session.prepare(&plates);

        let legend = session.legend("Drug1").expect("legend");
        assert_eq!(legend, vec![("0.1".to_string(), 0.3), ("0.3".to_string(), 1.0)]);
        assert!(session.legend("missing").is_none());
    }

    #[test]
    fn palette_slots_wrap_around() {
        let rows: String = (0..22)
            .map(|index| format!("plate1,A{:02},m{:02},1,1,1\n", index + 1, index))
            .collect();
        let plates = parse_layout_csv(&rows).expect("layout");
        let mut session = session(16, 24);
        session.prepare(&plates);

        assert_eq!(session.palette_slot("m00"), Some(0));
        assert_eq!(session.palette_slot("m19"), Some(19));
        assert_eq!(session.palette_slot("m20"), Some(0));
        assert_eq!(session.palette_slot("m21"), Some(1));
    }

    #[test]
    fn wells_outside_the_plate_and_unprepared_materials_fail() {
        let plates = parse_layout_csv("plate1,I01,Drug1,1,1,1").expect("layout");
        let mut session = session(8, 12);
        session.prepare(&plates);
        let error = session
            .plate_markers(&plates[0])
            .expect_err("row I is outside an 8-row plate");
        assert_eq!(error.category(), MplaceErrorCategory::BoundsError);

        let inside = parse_layout_csv("plate1,A01,Drug9,1,1,1").expect("layout");
        let error = session
            .plate_markers(&inside[0])
            .expect_err("Drug9 was never prepared");
        assert_eq!(error.placeholder(), "SYS.SESSION_UNPREPARED");
    }
}
