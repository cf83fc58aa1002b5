//! Concentration to rendering-intensity mapping.
//!
//! A table is built once per material and then looked up for every well of
//! that material. Ranking is numeric when every token reads as a finite
//! number and falls back to first-encounter order otherwise.

use crate::common::config::VisualizationConfig;
use crate::domain::{MplaceError, MplaceResult, parse_finite};
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlphaRange {
    min: f64,
    max: f64,
}

impl AlphaRange {
    pub fn new(min: f64, max: f64) -> MplaceResult<Self> {
        let in_unit = |value: f64| value.is_finite() && (0.0..=1.0).contains(&value);
        if !in_unit(min) || !in_unit(max) || min > max {
            return Err(MplaceError::schema(
                "CONFIG.ALPHA_RANGE",
                format!("alpha range [{}, {}] must lie within [0, 1] with min <= max", min, max),
            ));
        }
        Ok(Self { min, max })
    }

    pub fn from_config(config: &VisualizationConfig) -> MplaceResult<Self> {
        Self::new(config.alpha_min, config.alpha_max)
    }

    pub const fn min(&self) -> f64 {
        self.min
    }

    pub const fn max(&self) -> f64 {
        self.max
    }

    /// Evenly spaced intensity of `rank` among `ranks` levels.
    pub fn at(&self, rank: usize, ranks: usize) -> f64 {
        if ranks <= 1 || rank >= ranks - 1 {
            return self.max;
        }
        let step = rank as f64 / (ranks - 1) as f64;
        (self.min + (self.max - self.min) * step).min(self.max)
    }
}

impl Default for AlphaRange {
    fn default() -> Self {
        Self {
            min: crate::common::constants::ALPHA_MIN,
            max: crate::common::constants::ALPHA_MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlphaOrdering {
    /// Every token is a number; equal values share one intensity.
    Numeric,
    /// At least one token is not a number; tokens keep input order.
    Encounter,
}

/// Token -> intensity, iterated in rank order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlphaTable {
    ordering: AlphaOrdering,
    entries: IndexMap<String, f64>,
}

impl AlphaTable {
    pub fn alpha(&self, token: &str) -> Option<f64> {
        self.entries.get(token).copied()
    }

    pub const fn ordering(&self) -> AlphaOrdering {
        self.ordering
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries
            .iter()
            .map(|(token, alpha)| (token.as_str(), *alpha))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AlphaMapper {
    range: AlphaRange,
}

impl AlphaMapper {
    pub const fn new(range: AlphaRange) -> Self {
        Self { range }
    }

    pub const fn range(&self) -> AlphaRange {
        self.range
    }

    pub fn table(&self, tokens: &[&str]) -> AlphaTable {
        let mut distinct: Vec<&str> = Vec::with_capacity(tokens.len());
        for token in tokens {
            if !distinct.contains(token) {
                distinct.push(*token);
            }
        }

        let numeric: Option<Vec<f64>> = distinct.iter().map(|token| parse_finite(token)).collect();
        let table = match numeric {
            Some(values) if !values.is_empty() => self.numeric_table(&distinct, &values),
            _ => self.encounter_table(&distinct),
        };

        debug!(
            tokens = table.len(),
            ordering = ?table.ordering,
            "built alpha table"
        );
        table
    }

    fn numeric_table(&self, tokens: &[&str], values: &[f64]) -> AlphaTable {
        let mut order: Vec<usize> = (0..tokens.len()).collect();
        order.sort_by_key(|index| OrderedFloat(values[*index]));

        let mut levels: Vec<OrderedFloat<f64>> =
            values.iter().copied().map(OrderedFloat).collect();
        levels.sort();
        levels.dedup();

        let entries = order
            .into_iter()
            .map(|index| {
                let rank = levels
                    .binary_search(&OrderedFloat(values[index]))
                    .unwrap_or_default();
                (tokens[index].to_string(), self.range.at(rank, levels.len()))
            })
            .collect();

        AlphaTable {
            ordering: AlphaOrdering::Numeric,
            entries,
        }
    }

    fn encounter_table(&self, tokens: &[&str]) -> AlphaTable {
        let entries = tokens
            .iter()
            .enumerate()
            .map(|(rank, token)| (token.to_string(), self.range.at(rank, tokens.len())))
            .collect();

        AlphaTable {
            ordering: AlphaOrdering::Encounter,
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AlphaMapper, AlphaOrdering, AlphaRange};

    fn close(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-12
    }

    #[test]
    fn numeric_tokens_rank_by_value_not_input_order() {
        let table = AlphaMapper::default().table(&["10", "0.1", "1"]);

        assert_eq!(table.ordering(), AlphaOrdering::Numeric);
        let ranked: Vec<&str> = table.iter().map(|(token, _)| token).collect();
        assert_eq!(ranked, vec!["0.1", "1", "10"]);
        assert!(close(table.alpha("0.1").expect("0.1"), 0.3));
        assert!(close(table.alpha("1").expect("1"), 0.65));
        assert!(close(table.alpha("10").expect("10"), 1.0));
    }

    #[test]
    fn single_concentration_gets_full_intensity() {
        let table = AlphaMapper::default().table(&["100"]);
        assert_eq!(table.alpha("100"), Some(1.0));

        let narrow = AlphaMapper::new(AlphaRange::new(0.2, 0.8).expect("range"));
        assert_eq!(narrow.table(&["DMSO"]).alpha("DMSO"), Some(0.8));
    }

    #[test]
    fn labels_fall_back_to_encounter_order() {
        let table = AlphaMapper::default().table(&["high", "low", "mid"]);
        assert_eq!(table.ordering(), AlphaOrdering::Encounter);
        assert!(close(table.alpha("high").expect("high"), 0.3));
        assert!(close(table.alpha("mid").expect("mid"), 1.0));
    }

    #[test]
    fn mixed_tokens_use_encounter_order() {
        let table = AlphaMapper::default().table(&["10", "vehicle", "1"]);
        assert_eq!(table.ordering(), AlphaOrdering::Encounter);
        let ranked: Vec<&str> = table.iter().map(|(token, _)| token).collect();
        assert_eq!(ranked, vec!["10", "vehicle", "1"]);
    }

    #[test]
    fn equal_values_share_an_intensity() {
        let table = AlphaMapper::default().table(&["0.10", "0.1", "1", "1"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.alpha("0.10"), table.alpha("0.1"));
        assert!(close(table.alpha("0.1").expect("0.1"), 0.3));
        assert!(close(table.alpha("1").expect("1"), 1.0));
    }

    #[test]
    fn empty_input_gives_an_empty_table() {
        let table = AlphaMapper::default().table(&[]);
        assert!(table.is_empty());
        assert_eq!(table.alpha("1"), None);
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        assert!(AlphaRange::new(0.9, 0.1).is_err());
        assert!(AlphaRange::new(-0.1, 1.0).is_err());
        assert!(AlphaRange::new(0.0, f64::NAN).is_err());
        assert_eq!(AlphaRange::default().min(), 0.3);
    }
}
