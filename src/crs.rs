//! Coordinate reference frames and reprojection.
//!
//! Frames are identified by EPSG code. Two conversions are implemented,
//! WGS84 (EPSG:4326) to spherical web mercator (EPSG:3857) and back, which
//! covers the frames the source data ships in. Every other code passes
//! through only as identity when source and target match, otherwise
//! [`CrsError::UnsupportedPair`].
//!
//! [`coord_space`] classifies codes for distance computation: geographic
//! frames (4326, 4258, 4267, 4269) need great-circle distances, web mercator
//! needs a latitude correction, and anything else is taken as a projected
//! metric frame.

use geo_types::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// EPSG code identifying a reference frame
pub type EpsgCode = u32;

/// WGS84 geodetic degrees
pub const WGS84: EpsgCode = 4326;
/// ETRS89 geographic degrees (common in Spanish open data)
pub const ETRS89: EpsgCode = 4258;
/// NAD27 geographic degrees
pub const NAD27: EpsgCode = 4267;
/// NAD83 geographic degrees
pub const NAD83: EpsgCode = 4269;
/// Spherical web mercator meters
pub const WEB_MERCATOR: EpsgCode = 3857;

/// Spherical earth radius used by web mercator, meters
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Errors during reprojection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrsError {
    #[error("no conversion from EPSG:{from} to EPSG:{to}")]
    UnsupportedPair { from: EpsgCode, to: EpsgCode },
}

/// Result type for reprojection
pub type CrsResult<T> = Result<T, CrsError>;

/// How ground distances are obtained in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordSpace {
    /// Latitude/longitude degrees; distances need great-circle computation
    Geodetic,
    /// Web mercator meters; Euclidean distance inflates by 1/cos(lat) and
    /// needs a latitude correction
    Mercator,
    /// Metric frame; Euclidean distance approximates ground distance
    Planar,
}

/// Classify a frame by its EPSG code.
///
/// Geographic frames beyond WGS84 (ETRS89, NAD27, NAD83) are classified
/// geodetic as well; their degree coordinates would otherwise be compared
/// against thresholds in meters.
pub fn coord_space(epsg: EpsgCode) -> CoordSpace {
    match epsg {
        WGS84 | ETRS89 | NAD27 | NAD83 => CoordSpace::Geodetic,
        WEB_MERCATOR => CoordSpace::Mercator,
        _ => CoordSpace::Planar,
    }
}

/// Latitude in degrees of a web mercator northing.
pub fn mercator_y_to_lat(y: f64) -> f64 {
    (std::f64::consts::FRAC_PI_2 - 2.0 * (-y / EARTH_RADIUS_M).exp().atan()).to_degrees()
}

/// Reproject a point between frames.
///
/// Identity when `from == to`. Returns [`CrsError::UnsupportedPair`] for any
/// pair other than 4326 ↔ 3857.
pub fn reproject(point: Point<f64>, from: EpsgCode, to: EpsgCode) -> CrsResult<Point<f64>> {
    if from == to {
        return Ok(point);
    }
    match (from, to) {
        (WGS84, WEB_MERCATOR) => Ok(wgs84_to_mercator(point)),
        (WEB_MERCATOR, WGS84) => Ok(mercator_to_wgs84(point)),
        _ => Err(CrsError::UnsupportedPair { from, to }),
    }
}

fn wgs84_to_mercator(point: Point<f64>) -> Point<f64> {
    let lat_rad = point.y().to_radians();
    let x = point.x().to_radians() * EARTH_RADIUS_M;
    let y = (std::f64::consts::FRAC_PI_4 + lat_rad / 2.0).tan().ln() * EARTH_RADIUS_M;
    Point::new(x, y)
}

fn mercator_to_wgs84(point: Point<f64>) -> Point<f64> {
    let lon = (point.x() / EARTH_RADIUS_M).to_degrees();
    Point::new(lon, mercator_y_to_lat(point.y()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_for_matching_frames() {
        let p = Point::new(440_000.0, 4_470_000.0);
        assert_eq!(reproject(p, 25830, 25830).unwrap(), p);
    }

    #[test]
    fn test_wgs84_to_mercator_known_values() {
        // Antimeridian maps to the mercator world-edge constant
        let p = reproject(Point::new(180.0, 0.0), WGS84, WEB_MERCATOR).unwrap();
        assert!((p.x() - 20_037_508.342789244).abs() < 1e-6);
        assert!(p.y().abs() < 1e-6);
    }

    #[test]
    fn test_round_trip() {
        // Móstoles town hall, roughly
        let original = Point::new(-3.8649, 40.3223);
        let projected = reproject(original, WGS84, WEB_MERCATOR).unwrap();
        let back = reproject(projected, WEB_MERCATOR, WGS84).unwrap();
        assert!((back.x() - original.x()).abs() < 1e-9);
        assert!((back.y() - original.y()).abs() < 1e-9);
    }

    #[test]
    fn test_unsupported_pair() {
        let result = reproject(Point::new(0.0, 0.0), 25830, WEB_MERCATOR);
        assert_eq!(
            result,
            Err(CrsError::UnsupportedPair { from: 25830, to: WEB_MERCATOR })
        );
    }

    #[test]
    fn test_coord_space_classification() {
        assert_eq!(coord_space(WGS84), CoordSpace::Geodetic);
        assert_eq!(coord_space(ETRS89), CoordSpace::Geodetic);
        assert_eq!(coord_space(NAD27), CoordSpace::Geodetic);
        assert_eq!(coord_space(NAD83), CoordSpace::Geodetic);
        assert_eq!(coord_space(WEB_MERCATOR), CoordSpace::Mercator);
        assert_eq!(coord_space(25830), CoordSpace::Planar);
    }

    #[test]
    fn test_mercator_northing_latitude() {
        assert!(mercator_y_to_lat(0.0).abs() < 1e-12);
        let projected = reproject(Point::new(-3.8649, 40.3223), WGS84, WEB_MERCATOR).unwrap();
        assert!((mercator_y_to_lat(projected.y()) - 40.3223).abs() < 1e-9);
    }
}
