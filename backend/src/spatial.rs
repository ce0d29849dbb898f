use std::collections::HashMap;

use crate::models::{Bounds, Camera};

/// Default cell edge in degrees (~5.5 km of latitude).
pub const DEFAULT_CELL_SIZE_DEG: f64 = 0.05;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GridError {
    #[error("bounds crossing the antimeridian are not supported (min_lon {min_lon} > max_lon {max_lon})")]
    AntimeridianUnsupported { min_lon: f64, max_lon: f64 },
    #[error("bounds must be finite with min_lat <= max_lat")]
    InvalidBounds,
}

/// Cell identifier in the fixed lat/lon grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId {
    pub row: i32,
    pub col: i32,
}

impl CellId {
    pub fn from_coord(lat: f64, lon: f64, cell_size: f64) -> Self {
        Self {
            row: (lat / cell_size).floor() as i32,
            col: (lon / cell_size).floor() as i32,
        }
    }
}

/// Bucketed index over camera positions.
///
/// Stores indices into the camera slice it was built from. Queries return a
/// superset of the cameras inside the requested bounds; callers filter the
/// cell-granularity false positives.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f64,
    cells: HashMap<CellId, Vec<usize>>,
    len: usize,
}

impl SpatialGrid {
    pub fn build(cameras: &[Camera]) -> Self {
        Self::with_cell_size(cameras, DEFAULT_CELL_SIZE_DEG)
    }

    pub fn with_cell_size(cameras: &[Camera], cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            DEFAULT_CELL_SIZE_DEG
        };

        let mut cells: HashMap<CellId, Vec<usize>> = HashMap::new();
        for (idx, camera) in cameras.iter().enumerate() {
            cells
                .entry(CellId::from_coord(camera.lat, camera.lon, cell_size))
                .or_default()
                .push(idx);
        }

        Self {
            cell_size,
            cells,
            len: cameras.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Indices of cameras in every cell overlapping `bounds`, ascending and
    /// without duplicates.
    pub fn query(&self, bounds: &Bounds) -> Result<Vec<usize>, GridError> {
        if !bounds.is_finite() || bounds.min_lat > bounds.max_lat {
            return Err(GridError::InvalidBounds);
        }
        if bounds.crosses_antimeridian() {
            return Err(GridError::AntimeridianUnsupported {
                min_lon: bounds.min_lon,
                max_lon: bounds.max_lon,
            });
        }
        if self.cells.is_empty() {
            return Ok(Vec::new());
        }

        let lo = CellId::from_coord(bounds.min_lat, bounds.min_lon, self.cell_size);
        let hi = CellId::from_coord(bounds.max_lat, bounds.max_lon, self.cell_size);
        let rows = i64::from(hi.row) - i64::from(lo.row) + 1;
        let cols = i64::from(hi.col) - i64::from(lo.col) + 1;
        let in_range = |id: &CellId| {
            (lo.row..=hi.row).contains(&id.row) && (lo.col..=hi.col).contains(&id.col)
        };

        let mut hits: Vec<usize> = if rows.saturating_mul(cols) > self.cells.len() as i64 {
            // Large boxes: walking occupied cells beats enumerating the range.
            self.cells
                .iter()
                .filter(|(id, _)| in_range(id))
                .flat_map(|(_, members)| members.iter().copied())
                .collect()
        } else {
            let mut found = Vec::new();
            for row in lo.row..=hi.row {
                for col in lo.col..=hi.col {
                    if let Some(members) = self.cells.get(&CellId { row, col }) {
                        found.extend_from_slice(members);
                    }
                }
            }
            found
        };

        // Each camera sits in exactly one cell, so sorting is all that is
        // needed for a stable, duplicate-free answer.
        hits.sort_unstable();
        Ok(hits)
    }
}
