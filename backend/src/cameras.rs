use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
};

use crate::{
    geometry::normalize_deg,
    models::{Bounds, Camera},
    spatial::{GridError, SpatialGrid},
};

#[derive(Debug, thiserror::Error)]
pub enum CameraLoadError {
    #[error("failed to read camera dataset: {0}")]
    Io(#[from] io::Error),
    #[error("invalid camera dataset: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Whether the dataset behind a store was actually loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetStatus {
    Loaded,
    Unavailable(String),
}

/// Immutable, in-memory camera dataset plus its spatial index.
///
/// Built once at startup and shared read-only between request handlers.
#[derive(Debug, Clone)]
pub struct CameraStore {
    cameras: Vec<Camera>,
    grid: SpatialGrid,
    status: DatasetStatus,
}

impl CameraStore {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CameraLoadError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, CameraLoadError> {
        let records: Vec<Camera> = serde_json::from_reader(reader)?;
        Ok(Self::from_cameras(records))
    }

    pub fn from_cameras(records: Vec<Camera>) -> Self {
        let total = records.len();
        let cameras: Vec<Camera> = records
            .into_iter()
            .filter(|camera| {
                let valid = camera.position().is_valid();
                if !valid {
                    tracing::warn!(
                        osm_id = camera.osm_id,
                        lat = camera.lat,
                        lon = camera.lon,
                        "dropping camera with invalid coordinates"
                    );
                }
                valid
            })
            .collect();

        if cameras.len() != total {
            tracing::warn!("kept {} of {} camera records", cameras.len(), total);
        }

        let grid = SpatialGrid::build(&cameras);
        Self {
            cameras,
            grid,
            status: DatasetStatus::Loaded,
        }
    }

    /// Empty store for when the dataset could not be loaded.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            cameras: Vec::new(),
            grid: SpatialGrid::build(&[]),
            status: DatasetStatus::Unavailable(reason.into()),
        }
    }

    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    pub fn get(&self, idx: usize) -> Option<&Camera> {
        self.cameras.get(idx)
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.status == DatasetStatus::Loaded
    }

    pub fn status(&self) -> &DatasetStatus {
        &self.status
    }

    /// Grid candidates for `bounds`, possibly including cameras just outside.
    pub fn candidates(&self, bounds: &Bounds) -> Result<impl Iterator<Item = &Camera>, GridError> {
        let hits = self.grid.query(bounds)?;
        Ok(hits.into_iter().filter_map(move |idx| self.cameras.get(idx)))
    }

    /// Cameras strictly inside `bounds` (grid query plus exact filter).
    pub fn in_bounds(&self, bounds: &Bounds) -> Result<Vec<&Camera>, GridError> {
        Ok(self
            .candidates(bounds)?
            .filter(|camera| bounds.contains(camera.position()))
            .collect())
    }
}

/// Parsed form of a camera's recorded `direction` tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Facing {
    Unknown,
    Bearings(Vec<f64>),
}

impl Facing {
    pub fn of(camera: &Camera) -> Self {
        camera
            .direction
            .as_deref()
            .map(Self::parse)
            .unwrap_or(Facing::Unknown)
    }

    /// Parse OSM direction syntax: degrees (`90`), compass points (`NE`,
    /// `SSW`), `;`-separated lists and `from-to` ranges (clockwise midpoint).
    /// Unparseable parts are ignored; nothing parseable means `Unknown`.
    pub fn parse(raw: &str) -> Self {
        let bearings: Vec<f64> = raw
            .split(';')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .filter_map(parse_bearing_or_range)
            .collect();

        if bearings.is_empty() {
            Facing::Unknown
        } else {
            Facing::Bearings(bearings)
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Facing::Bearings(_))
    }
}

fn parse_bearing_or_range(part: &str) -> Option<f64> {
    if let Some(bearing) = parse_bearing(part) {
        return Some(bearing);
    }
    // A leading '-' is a negative number, not a range.
    let (split, _) = part.char_indices().skip(1).find(|&(_, ch)| ch == '-')?;
    let from = parse_bearing(part[..split].trim())?;
    let to = parse_bearing(part[split + 1..].trim())?;
    let span = (to - from).rem_euclid(360.0);
    Some(normalize_deg(from + span / 2.0))
}

fn parse_bearing(token: &str) -> Option<f64> {
    if let Ok(deg) = token.parse::<f64>() {
        return deg.is_finite().then(|| normalize_deg(deg));
    }
    let deg = match token.to_ascii_uppercase().as_str() {
        "N" | "NORTH" => 0.0,
        "NNE" => 22.5,
        "NE" => 45.0,
        "ENE" => 67.5,
        "E" | "EAST" => 90.0,
        "ESE" => 112.5,
        "SE" => 135.0,
        "SSE" => 157.5,
        "S" | "SOUTH" => 180.0,
        "SSW" => 202.5,
        "SW" => 225.0,
        "WSW" => 247.5,
        "W" | "WEST" => 270.0,
        "WNW" => 292.5,
        "NW" => 315.0,
        "NNW" => 337.5,
        _ => return None,
    };
    Some(deg)
}
