//! Well address algebra.
//!
//! Row letters follow bijective base-26 (`A`..`Z`, `AA`..`AZ`, `BA`, ...), so
//! every row index has exactly one letter prefix and no prefix is shared
//! between plates of different heights. The transform itself never looks at
//! plate bounds; `to_grid_within` composes it with a range check.

use crate::domain::{
    GridIndex, MAX_GRID_COL, MAX_GRID_ROW, MplaceError, MplaceResult, PlateDimensions,
    WellAddress,
};
use std::collections::HashMap;
use std::hash::Hash;
use tracing::trace;

const ALPHABET_LEN: u64 = 26;

/// Letter prefix for a zero-based row index: `0 -> A`, `25 -> Z`, `26 -> AA`.
pub fn row_letters(index: usize) -> String {
    let mut remaining = index as u128 + 1;
    let mut letters = Vec::new();
    while remaining > 0 {
        let digit = ((remaining - 1) % u128::from(ALPHABET_LEN)) as u8;
        letters.push(char::from(b'A' + digit));
        remaining = (remaining - 1) / u128::from(ALPHABET_LEN);
    }
    letters.iter().rev().collect()
}

/// Zero-based row index for a letter prefix; `None` for empty input,
/// non-letters, or a prefix beyond `usize`.
pub fn row_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }

    let mut value: u64 = 0;
    for byte in letters.bytes() {
        if !byte.is_ascii_alphabetic() {
            return None;
        }
        let digit = u64::from(byte.to_ascii_uppercase() - b'A') + 1;
        value = value.checked_mul(ALPHABET_LEN)?.checked_add(digit)?;
    }
    usize::try_from(value - 1).ok()
}

/// Memoizing address <-> grid converter owned by one visualization session.
#[derive(Debug, Clone)]
pub struct CoordinateTransform {
    capacity: usize,
    grid_cache: HashMap<WellAddress, GridIndex>,
    address_cache: HashMap<GridIndex, WellAddress>,
}

impl CoordinateTransform {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            grid_cache: HashMap::new(),
            address_cache: HashMap::new(),
        }
    }

    pub fn to_grid(&mut self, address: &WellAddress) -> MplaceResult<GridIndex> {
        if let Some(index) = self.grid_cache.get(address) {
            return Ok(*index);
        }

        let row = row_index(address.letters()).ok_or_else(|| {
            MplaceError::internal(
                "SYS.COORDINATE_OVERFLOW",
                format!("row letters of '{}' exceed the addressable range", address),
            )
        })?;
        let index = GridIndex::new(row, address.column() as usize - 1);
        trace!(address = %address, row = index.row, col = index.col, "coordinate transform");

        insert_bounded(&mut self.grid_cache, self.capacity, address.clone(), index);
        Ok(index)
    }

    pub fn to_address(&mut self, index: GridIndex) -> MplaceResult<WellAddress> {
        if let Some(address) = self.address_cache.get(&index) {
            return Ok(address.clone());
        }

        let addressable = u64::try_from(index.row).is_ok_and(|row| row <= MAX_GRID_ROW)
            && u64::try_from(index.col).is_ok_and(|col| col <= MAX_GRID_COL);
        let column = index
            .col
            .checked_add(1)
            .and_then(|column| u32::try_from(column).ok())
            .filter(|_| addressable)
            .ok_or_else(|| {
                MplaceError::bounds(
                    "INPUT.BOUNDS_GRID",
                    format!(
                        "grid index ({}, {}) has no well address; rows go up to {} and columns up to {}",
                        index.row, index.col, MAX_GRID_ROW, MAX_GRID_COL
                    ),
                )
            })?;
        let address = WellAddress::from_parts(row_letters(index.row), column);

        insert_bounded(&mut self.address_cache, self.capacity, index, address.clone());
        Ok(address)
    }

    /// Parses `text` and maps it to a grid index in one step.
    pub fn locate(&mut self, text: &str) -> MplaceResult<GridIndex> {
        let address = WellAddress::parse(text)?;
        self.to_grid(&address)
    }

    /// `to_grid` followed by a check against the plate the address must lie on.
    pub fn to_grid_within(
        &mut self,
        address: &WellAddress,
        dimensions: PlateDimensions,
    ) -> MplaceResult<GridIndex> {
        let index = self.to_grid(address)?;
        if !dimensions.contains(index) {
            return Err(MplaceError::bounds(
                "INPUT.BOUNDS_WELL",
                format!(
                    "well {} lies outside the {} plate",
                    address, dimensions
                ),
            )
            .with_context(address.to_string()));
        }
        Ok(index)
    }

    pub fn cached_entries(&self) -> usize {
        self.grid_cache.len() + self.address_cache.len()
    }

    pub fn clear(&mut self) {
        self.grid_cache.clear();
        self.address_cache.clear();
    }
}

impl Default for CoordinateTransform {
    fn default() -> Self {
        Self::new(crate::common::constants::COORDINATE_CACHE_SIZE)
    }
}

fn insert_bounded<K, V>(cache: &mut HashMap<K, V>, capacity: usize, key: K, value: V)
where
    K: Eq + Hash,
{
    if cache.len() >= capacity {
        trace!(entries = cache.len(), "coordinate cache full, evicting");
        cache.clear();
    }
    cache.insert(key, value);
}

#[cfg(test)]
mod tests {
    use super::{CoordinateTransform, row_index, row_letters};
    use crate::domain::{
        GridIndex, MAX_GRID_COL, MAX_GRID_ROW, MplaceErrorCategory, PlateDimensions, WellAddress,
    };

    #[test]
    fn row_letters_extend_past_z() {
        assert_eq!(row_letters(0), "A");
        assert_eq!(row_letters(25), "Z");
        assert_eq!(row_letters(26), "AA");
        assert_eq!(row_letters(27), "AB");
        assert_eq!(row_letters(51), "AZ");
        assert_eq!(row_letters(52), "BA");
        assert_eq!(row_letters(701), "ZZ");
        assert_eq!(row_letters(702), "AAA");
    }

    #[test]
    fn row_index_inverts_row_letters() {
        for index in 0..2_000 {
            assert_eq!(row_index(&row_letters(index)), Some(index));
        }
        assert_eq!(row_index(""), None);
        assert_eq!(row_index("A1"), None);
        assert_eq!(row_index("ab"), Some(27));
    }

    #[test]
    fn known_plate_positions_map_to_expected_indices() {
        let mut transform = CoordinateTransform::default();
        assert_eq!(transform.locate("AA01").expect("AA01"), GridIndex::new(26, 0));
        assert_eq!(transform.locate("Z12").expect("Z12"), GridIndex::new(25, 11));
        assert_eq!(transform.locate("A1").expect("A1"), GridIndex::new(0, 0));
        assert_eq!(transform.locate("B3").expect("B3"), GridIndex::new(1, 2));
    }

    #[test]
    fn legacy_mixed_case_prefix_reads_as_upper_case() {
        let mut transform = CoordinateTransform::default();
        assert_eq!(transform.locate("Ab01").expect("Ab01"), GridIndex::new(27, 0));
        let address = transform
            .to_address(GridIndex::new(27, 0))
            .expect("address for row 27");
        assert_eq!(address.to_string(), "AB01");
    }

    #[test]
    fn to_address_and_to_grid_round_trip() {
        let mut transform = CoordinateTransform::new(16);
        for row in [0usize, 7, 25, 26, 51, 52, 700, 18_277] {
            for col in [0usize, 11, 23, 998] {
                let index = GridIndex::new(row, col);
                let address = transform.to_address(index).expect("address");
                assert_eq!(transform.to_grid(&address).expect("grid"), index);
            }
        }
    }

    #[test]
    fn addressable_range_edges_round_trip_and_beyond_fails() {
        let mut transform = CoordinateTransform::new(16);
        let last_row = usize::try_from(MAX_GRID_ROW).expect("64-bit usize");
        let last_col = usize::try_from(MAX_GRID_COL).expect("64-bit usize");

        let corner = GridIndex::new(last_row, last_col);
        let address = transform.to_address(corner).expect("last addressable well");
        assert_eq!(address.letters(), "ZZZZZZZZZZZZ");
        assert_eq!(address.column(), u32::MAX);
        let reparsed = WellAddress::parse(&address.to_string()).expect("rendered text parses");
        assert_eq!(transform.to_grid(&reparsed).expect("grid"), corner);

        for index in [
            GridIndex::new(last_row + 1, 0),
            GridIndex::new(0, last_col + 1),
            GridIndex::new(usize::MAX, usize::MAX),
        ] {
            let error = transform.to_address(index).expect_err("outside the addressable range");
            assert_eq!(error.category(), MplaceErrorCategory::BoundsError);
            assert_eq!(error.placeholder(), "INPUT.BOUNDS_GRID");
        }
    }

    #[test]
    fn cache_is_bounded_and_transparent() {
        let mut transform = CoordinateTransform::new(4);
        for col in 0..10 {
            let index = GridIndex::new(0, col);
            let first = transform.to_address(index).expect("first lookup");
            let second = transform.to_address(index).expect("cached lookup");
            assert_eq!(first, second);
        }
        assert!(transform.cached_entries() <= 4);
        transform.clear();
        assert_eq!(transform.cached_entries(), 0);
    }

    #[test]
    fn bounds_check_is_opt_in() {
        let mut transform = CoordinateTransform::default();
        let dimensions = PlateDimensions::new(8, 12).expect("dimensions");
        let outside = WellAddress::parse("I01").expect("I01");

        assert_eq!(
            transform.to_grid(&outside).expect("unbounded transform"),
            GridIndex::new(8, 0)
        );
        let error = transform
            .to_grid_within(&outside, dimensions)
            .expect_err("row I is outside an 8-row plate");
        assert_eq!(error.category(), MplaceErrorCategory::BoundsError);
        assert_eq!(error.placeholder(), "INPUT.BOUNDS_WELL");
    }
}
