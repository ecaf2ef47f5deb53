//! Uniform latitude/longitude grid for neighbourhood searches

use std::collections::HashMap;

/// Integer cell address `(floor(lat / size), floor(lon / size))`
pub(crate) type CellKey = (i64, i64);

/// Compute the cell containing a position
#[inline]
pub(crate) fn cell_key(lat: f64, lon: f64, cell_size: f64) -> CellKey {
    (
        (lat / cell_size).floor() as i64,
        (lon / cell_size).floor() as i64,
    )
}

/// Buckets of item indices keyed by grid cell
///
/// Items keep their insertion order inside a cell, so a search visits candidates in a
/// stable order for a given input.
#[derive(Debug, Clone)]
pub(crate) struct GridIndex {
    cell_size: f64,
    cells: HashMap<CellKey, Vec<usize>>,
}

impl GridIndex {
    pub(crate) fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    #[inline]
    pub(crate) fn insert(&mut self, lat: f64, lon: f64, index: usize) {
        self.cells
            .entry(cell_key(lat, lon, self.cell_size))
            .or_default()
            .push(index);
    }

    /// Indices in the cell containing `(lat, lon)` and its 8 neighbours
    ///
    /// Cells are visited row by row: latitude offset -1..=1, then longitude offset -1..=1.
    pub(crate) fn neighbourhood(&self, lat: f64, lon: f64) -> impl Iterator<Item = usize> + '_ {
        let (row, col) = cell_key(lat, lon, self.cell_size);
        (-1..=1)
            .flat_map(move |dr| (-1..=1).map(move |dc| (row + dr, col + dc)))
            .filter_map(|key| self.cells.get(&key))
            .flat_map(|cell| cell.iter().copied())
    }

    pub(crate) fn cell_count(&self) -> usize {
        self.cells.len()
    }
}
