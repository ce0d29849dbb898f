//! GraphHopper polyline codec.
//!
//! GraphHopper encodes paths with the Google polyline algorithm (latitude
//! first, zig-zag varints in 5-bit chunks offset by 63). When the request asks
//! for elevation a third delta per point is appended, scaled by 100.

use crate::models::Coordinate;

pub const DEFAULT_MULTIPLIER: f64 = 1e5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolylineError {
    #[error("invalid polyline character {0:?} at offset {1}")]
    InvalidCharacter(char, usize),
    #[error("polyline ended in the middle of a value")]
    Truncated,
    #[error("polyline multiplier must be positive")]
    InvalidMultiplier,
}

pub fn decode(
    encoded: &str,
    multiplier: f64,
    with_elevation: bool,
) -> Result<Vec<Coordinate>, PolylineError> {
    if !(multiplier.is_finite() && multiplier > 0.0) {
        return Err(PolylineError::InvalidMultiplier);
    }

    let bytes = encoded.as_bytes();
    let mut pos = 0;
    let (mut lat, mut lon) = (0i64, 0i64);
    let mut points = Vec::with_capacity(bytes.len() / 4);

    while pos < bytes.len() {
        lat = lat.wrapping_add(next_value(bytes, &mut pos)?);
        lon = lon.wrapping_add(next_value(bytes, &mut pos)?);
        if with_elevation {
            // Elevation deltas are consumed but not exposed.
            next_value(bytes, &mut pos)?;
        }
        points.push(Coordinate {
            lat: lat as f64 / multiplier,
            lon: lon as f64 / multiplier,
        });
    }

    Ok(points)
}

fn next_value(bytes: &[u8], pos: &mut usize) -> Result<i64, PolylineError> {
    let mut result: i64 = 0;
    let mut shift = 0;

    loop {
        let byte = *bytes.get(*pos).ok_or(PolylineError::Truncated)?;
        if !(63..=126).contains(&byte) || shift > 60 {
            return Err(PolylineError::InvalidCharacter(byte as char, *pos));
        }
        *pos += 1;

        let chunk = i64::from(byte - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }

    Ok(if result & 1 == 1 { !(result >> 1) } else { result >> 1 })
}

pub fn encode(path: &[Coordinate], multiplier: f64) -> String {
    let mut out = String::with_capacity(path.len() * 8);
    let (mut prev_lat, mut prev_lon) = (0i64, 0i64);

    for coord in path {
        let lat = (coord.lat * multiplier).round() as i64;
        let lon = (coord.lon * multiplier).round() as i64;
        push_value(&mut out, lat - prev_lat);
        push_value(&mut out, lon - prev_lon);
        prev_lat = lat;
        prev_lon = lon;
    }

    out
}

fn push_value(out: &mut String, value: i64) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    while v >= 0x20 {
        out.push(char::from((0x20 | (v & 0x1f)) as u8 + 63));
        v >>= 5;
    }
    out.push(char::from(v as u8 + 63));
}
