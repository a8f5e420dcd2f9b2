//! Uniform-grid spatial hash.
//!
//! Entities are bucketed by the cell containing their position. Queries scan
//! only the cells overlapping the search area, so their cost tracks local
//! density instead of total population.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

pub type Cell = (i32, i32);

#[derive(Debug, Clone)]
pub struct SpatialGrid<K> {
    cell_size: f64,
    cells: HashMap<Cell, HashSet<K>>,
    positions: HashMap<K, Cell>,
}

impl<K: Copy + Eq + Hash> SpatialGrid<K> {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            positions: HashMap::new(),
        }
    }

    pub fn cell_of(&self, x: f64, y: f64) -> Cell {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Inserts `key` at a position, moving it if already present.
    pub fn insert(&mut self, key: K, x: f64, y: f64) {
        let cell = self.cell_of(x, y);
        if let Some(previous) = self.positions.insert(key, cell) {
            if previous == cell {
                return;
            }
            self.detach(key, previous);
        }
        self.cells.entry(cell).or_default().insert(key);
    }

    pub fn update(&mut self, key: K, x: f64, y: f64) {
        self.insert(key, x, y);
    }

    pub fn remove(&mut self, key: K) -> bool {
        match self.positions.remove(&key) {
            Some(cell) => {
                self.detach(key, cell);
                true
            }
            None => false,
        }
    }

    fn detach(&mut self, key: K, cell: Cell) {
        if let Some(bucket) = self.cells.get_mut(&cell) {
            bucket.remove(&key);
            if bucket.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    /// Keys in the cell containing the point and its eight neighbours.
    pub fn nearby(&self, x: f64, y: f64) -> Vec<K> {
        let (cx, cy) = self.cell_of(x, y);
        self.collect_cells(cx - 1..=cx + 1, cy - 1..=cy + 1)
    }

    /// Candidate keys whose cell overlaps the square of half-width `radius`
    /// around the point. Callers still check exact distance.
    pub fn query(&self, x: f64, y: f64, radius: f64) -> Vec<K> {
        let (min_x, min_y) = self.cell_of(x - radius, y - radius);
        let (max_x, max_y) = self.cell_of(x + radius, y + radius);
        self.collect_cells(min_x..=max_x, min_y..=max_y)
    }

    fn collect_cells(
        &self,
        xs: std::ops::RangeInclusive<i32>,
        ys: std::ops::RangeInclusive<i32>,
    ) -> Vec<K> {
        let mut found = Vec::new();
        for cx in xs {
            for cy in ys.clone() {
                if let Some(bucket) = self.cells.get(&(cx, cy)) {
                    found.extend(bucket.iter().copied());
                }
            }
        }
        found
    }

    pub fn contains(&self, key: K) -> bool {
        self.positions.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.positions.clear();
    }
}
