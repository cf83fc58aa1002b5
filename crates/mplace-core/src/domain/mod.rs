pub mod errors;

pub use errors::{
    CompatibilityExitPlaceholder, MplaceError, MplaceErrorCategory, MplaceResult, ParserResult,
};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Longest accepted row-letter prefix; 12 letters already address more rows
/// than fit in `usize` arithmetic on 32-bit targets.
pub const MAX_ROW_LETTERS: usize = 12;

/// Highest row index with a letter prefix of at most `MAX_ROW_LETTERS`
/// letters (`ZZZZZZZZZZZZ`).
pub const MAX_GRID_ROW: u64 = max_grid_row();

/// Highest column index whose 1-based column number still fits in `u32`.
pub const MAX_GRID_COL: u64 = u32::MAX as u64 - 1;

const fn max_grid_row() -> u64 {
    let mut total = 0u64;
    let mut power = 1u64;
    let mut letters = 0;
    while letters < MAX_ROW_LETTERS {
        power *= 26;
        total += power;
        letters += 1;
    }
    total - 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialRole {
    Compound,
    Control,
}

impl MaterialRole {
    /// Name of the input field the role is entered through.
    pub const fn field_name(self) -> &'static str {
        match self {
            Self::Compound => "compounds",
            Self::Control => "controls",
        }
    }

    /// Prefix of the solver data-file identifiers for the role.
    pub const fn dzn_prefix(self) -> &'static str {
        match self {
            Self::Compound => "compound",
            Self::Control => "control",
        }
    }
}

impl Display for MaterialRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field_name())
    }
}

/// A dosage level of one material: either a number or an opaque label.
///
/// Numbers keep the lexeme they were written with so the solver file and
/// the rendered legend show `0.10` rather than a re-formatted float.
#[derive(Debug, Clone, PartialEq)]
pub enum ConcentrationToken {
    Number { text: String, value: f64 },
    Label(String),
}

impl ConcentrationToken {
    pub fn number(text: impl Into<String>, value: f64) -> Self {
        Self::Number {
            text: text.into(),
            value,
        }
    }

    pub fn label(text: impl Into<String>) -> Self {
        Self::Label(text.into())
    }

    /// Classifies free text coming back from the solver: numeric when it reads
    /// as a finite float, a label otherwise.
    pub fn classify(text: &str) -> Self {
        match parse_finite(text) {
            Some(value) => Self::number(text, value),
            None => Self::label(text),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Number { text, .. } => text,
            Self::Label(text) => text,
        }
    }

    /// Numeric reading of the token. Quoted labels such as `'0.1'` still
    /// count as numeric for ranking purposes.
    pub fn numeric_value(&self) -> Option<f64> {
        match self {
            Self::Number { value, .. } => Some(*value),
            Self::Label(text) => parse_finite(text),
        }
    }

    pub const fn is_label(&self) -> bool {
        matches!(self, Self::Label(_))
    }
}

impl Display for ConcentrationToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn parse_finite(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialSpec {
    pub name: String,
    pub role: MaterialRole,
    pub replicate_count: u32,
    pub concentrations: Vec<ConcentrationToken>,
}

impl MaterialSpec {
    pub fn new(
        name: impl Into<String>,
        role: MaterialRole,
        replicate_count: u32,
        concentrations: Vec<ConcentrationToken>,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            replicate_count,
            concentrations,
        }
    }

    /// Wells this material occupies: every concentration is repeated
    /// `replicate_count` times.
    pub fn required_wells(&self) -> u64 {
        u64::from(self.replicate_count) * self.concentrations.len() as u64
    }

    pub fn concentration_texts(&self) -> Vec<&str> {
        self.concentrations
            .iter()
            .map(ConcentrationToken::as_str)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlateDimensions {
    pub rows: u32,
    pub cols: u32,
}

impl PlateDimensions {
    pub fn new(rows: u32, cols: u32) -> MplaceResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(MplaceError::bounds(
                "INPUT.BOUNDS_DIMENSIONS",
                format!("plate dimensions must be >= 1 (found {}x{})", rows, cols),
            ));
        }
        Ok(Self { rows, cols })
    }

    pub fn well_count(self) -> u64 {
        u64::from(self.rows) * u64::from(self.cols)
    }

    pub fn contains(self, index: GridIndex) -> bool {
        index.row < self.rows as usize && index.col < self.cols as usize
    }
}

impl Display for PlateDimensions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Zero-based (row, column) position on a plate grid.
///
/// Only indices with `row <= MAX_GRID_ROW` and `col <= MAX_GRID_COL` have a
/// well address; those convert to an address and back exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridIndex {
    pub row: usize,
    pub col: usize,
}

impl GridIndex {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Row letters plus a 1-based column number, e.g. `A01` or `AB12`.
///
/// Letters are stored upper-case and the column as a number, so `A1`,
/// `A01` and `a001` all name the same well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WellAddress {
    letters: String,
    column: u32,
}

impl WellAddress {
    pub fn parse(text: &str) -> MplaceResult<Self> {
        let trimmed = text.trim();
        let split = trimmed
            .find(|ch: char| !ch.is_ascii_alphabetic())
            .unwrap_or(trimmed.len());
        let (letters, digits) = trimmed.split_at(split);

        if letters.is_empty() || letters.len() > MAX_ROW_LETTERS {
            return Err(invalid_address(
                text,
                format!("expected 1 to {} row letters", MAX_ROW_LETTERS),
            ));
        }
        if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(invalid_address(text, "expected a column number after the row letters"));
        }

        let column = digits
            .parse::<u32>()
            .map_err(|_| invalid_address(text, "column number is out of range"))?;
        if column == 0 {
            return Err(invalid_address(text, "column numbers start at 1"));
        }

        Ok(Self {
            letters: letters.to_ascii_uppercase(),
            column,
        })
    }

    pub(crate) fn from_parts(letters: String, column: u32) -> Self {
        Self { letters, column }
    }

    pub fn letters(&self) -> &str {
        &self.letters
    }

    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Renders the address with the column zero-padded to `width` digits.
    pub fn padded(&self, width: usize) -> String {
        format!("{}{:0width$}", self.letters, self.column, width = width)
    }
}

fn invalid_address(text: &str, reason: impl Display) -> MplaceError {
    MplaceError::syntax(
        "INPUT.WELL_ADDRESS",
        format!("invalid well address '{}': {}", text, reason),
    )
}

impl Display for WellAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{:02}", self.letters, self.column)
    }
}

impl FromStr for WellAddress {
    type Err = MplaceError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

/// One well of a solved layout.
#[derive(Debug, Clone, PartialEq)]
pub struct WellAssignment {
    pub address: WellAddress,
    pub material_name: String,
    pub concentration: ConcentrationToken,
}

/// Output of the schema validator: everything downstream stages may trust.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedExperiment {
    pub compounds: Vec<MaterialSpec>,
    pub controls: Vec<MaterialSpec>,
    pub dimensions: PlateDimensions,
}

impl ValidatedExperiment {
    pub fn materials(&self, role: MaterialRole) -> &[MaterialSpec] {
        match role {
            MaterialRole::Compound => &self.compounds,
            MaterialRole::Control => &self.controls,
        }
    }

    pub fn control_names(&self) -> Vec<String> {
        self.controls
            .iter()
            .map(|control| control.name.clone())
            .collect()
    }

    pub fn required_wells(&self) -> u64 {
        self.compounds
            .iter()
            .chain(self.controls.iter())
            .map(MaterialSpec::required_wells)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ConcentrationToken, GridIndex, MaterialRole, MaterialSpec, MplaceErrorCategory,
        PlateDimensions, WellAddress,
    };

    #[test]
    fn concentration_tokens_keep_their_lexeme() {
        let number = ConcentrationToken::number("0.10", 0.1);
        assert_eq!(number.as_str(), "0.10");
        assert_eq!(number.numeric_value(), Some(0.1));

        let label = ConcentrationToken::label("0.3");
        assert!(label.is_label());
        assert_eq!(label.numeric_value(), Some(0.3));
        assert_eq!(ConcentrationToken::label("high").numeric_value(), None);
        assert_eq!(ConcentrationToken::label("nan").numeric_value(), None);
    }

    #[test]
    fn classify_separates_numbers_from_labels() {
        assert_eq!(
            ConcentrationToken::classify("10"),
            ConcentrationToken::number("10", 10.0)
        );
        assert_eq!(
            ConcentrationToken::classify("DMSO"),
            ConcentrationToken::label("DMSO")
        );
    }

    #[test]
    fn required_wells_multiplies_replicates_by_concentrations() {
        let spec = MaterialSpec::new(
            "Drug1",
            MaterialRole::Compound,
            5,
            vec![
                ConcentrationToken::label("0.1"),
                ConcentrationToken::label("0.3"),
            ],
        );
        assert_eq!(spec.required_wells(), 10);
        assert_eq!(spec.concentration_texts(), vec!["0.1", "0.3"]);
    }

    #[test]
    fn plate_dimensions_reject_zero_sides() {
        let error = PlateDimensions::new(0, 12).expect_err("zero rows should fail");
        assert_eq!(error.category(), MplaceErrorCategory::BoundsError);

        let dimensions = PlateDimensions::new(8, 12).expect("8x12 is valid");
        assert_eq!(dimensions.well_count(), 96);
        assert!(dimensions.contains(GridIndex::new(7, 11)));
        assert!(!dimensions.contains(GridIndex::new(8, 0)));
    }

    #[test]
    fn well_address_parsing_normalizes_case_and_padding() {
        let padded = WellAddress::parse("A01").expect("A01 should parse");
        let unpadded = WellAddress::parse("a1").expect("a1 should parse");
        assert_eq!(padded, unpadded);
        assert_eq!(padded.to_string(), "A01");
        assert_eq!(
            WellAddress::parse("AB7").expect("AB7 should parse").to_string(),
            "AB07"
        );
        assert_eq!(
            WellAddress::parse("C100").expect("C100 should parse").padded(2),
            "C100"
        );
        assert_eq!(
            WellAddress::parse("H12").expect("H12 should parse").padded(3),
            "H012"
        );
    }

    #[test]
    fn well_address_rejects_malformed_text() {
        for text in ["", "12", "A", "A0", "A1B", "1A", "ABCDEFGHIJKLM1", "A99999999999"] {
            let error = WellAddress::parse(text).expect_err("malformed address should fail");
            assert_eq!(error.category(), MplaceErrorCategory::SyntaxError);
            assert_eq!(error.placeholder(), "INPUT.WELL_ADDRESS");
        }
    }
}
