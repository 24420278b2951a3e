//! Geometry normalization: one representative coordinate pair per asset.
//!
//! Points pass through unchanged. Polygons reduce to the first vertex of
//! their exterior ring — a deterministic, cheap proxy for the shape's
//! location that reproduces source boundary coordinates exactly, unlike a
//! centroid. Everything else is unsupported and fatal.

use geo_types::{Geometry, Point};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::{AssetNode, AssetTable};
use crate::crs::{self, CrsError, EpsgCode};

/// Errors during geometry normalization
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("unsupported geometry type: {0}")]
    Unsupported(&'static str),
    #[error("geometry has no coordinates")]
    EmptyGeometry,
    #[error("cannot reproject from {from:?} to EPSG:{to}")]
    Reprojection { from: Option<EpsgCode>, to: EpsgCode },
}

/// Result type for normalization
pub type GeometryResult<T> = Result<T, GeometryError>;

/// How to place incoming tables into the target frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Frame every node coordinate must end up in
    pub target_crs: EpsgCode,
    /// When true, an impossible reprojection degrades to a warning and the
    /// original coordinates pass through. Distances may then be wrong.
    pub tolerate_reprojection: bool,
}

/// Per-table counts of records dropped during normalization. The pipeline
/// never silently drops data without a count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    /// Records with no geometry at all
    pub missing_geometry: usize,
    /// Records whose key could not be resolved or synthesized
    pub missing_key: usize,
    /// Records whose representative coordinates are not finite
    pub non_finite: usize,
}

impl SkipCounts {
    /// Total records skipped.
    pub fn total(&self) -> usize {
        self.missing_geometry + self.missing_key + self.non_finite
    }
}

/// Output of normalizing one table.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    /// Nodes in source record order
    pub nodes: Vec<AssetNode>,
    pub skipped: SkipCounts,
}

/// Reduce a geometry to a single representative point.
///
/// - Point → the point itself
/// - Polygon → first vertex of the exterior ring
/// - MultiPolygon → same rule on the first polygon
pub fn representative_point(geometry: &Geometry<f64>) -> GeometryResult<Point<f64>> {
    match geometry {
        Geometry::Point(point) => Ok(*point),
        Geometry::Polygon(polygon) => polygon
            .exterior()
            .coords()
            .next()
            .map(|c| Point::new(c.x, c.y))
            .ok_or(GeometryError::EmptyGeometry),
        Geometry::MultiPolygon(multi) => {
            let first = multi.0.first().ok_or(GeometryError::EmptyGeometry)?;
            first
                .exterior()
                .coords()
                .next()
                .map(|c| Point::new(c.x, c.y))
                .ok_or(GeometryError::EmptyGeometry)
        }
        other => Err(GeometryError::Unsupported(geometry_kind(other))),
    }
}

/// Normalize one asset table into graph nodes.
///
/// Unsupported geometry is fatal. Records with no geometry or no resolvable
/// key are skipped and counted.
pub fn normalize_table(
    table: &AssetTable,
    config: &NormalizeConfig,
) -> GeometryResult<NormalizedTable> {
    let mut nodes = Vec::with_capacity(table.assets.len());
    let mut skipped = SkipCounts::default();

    for (index, asset) in table.assets.iter().enumerate() {
        let Some(geometry) = &asset.geometry else {
            skipped.missing_geometry += 1;
            continue;
        };
        let Some(key) = asset.key(&table.category, index) else {
            skipped.missing_key += 1;
            continue;
        };

        let point = representative_point(geometry)?;
        let point = place_in_target(point, table.source_crs, config)?;
        if !point.x().is_finite() || !point.y().is_finite() {
            skipped.non_finite += 1;
            continue;
        }

        nodes.push(AssetNode {
            key,
            x: point.x(),
            y: point.y(),
            category: table.category.clone(),
            attributes: asset.attributes.clone(),
        });
    }

    if skipped.total() > 0 {
        tracing::warn!(
            category = %table.category,
            missing_geometry = skipped.missing_geometry,
            missing_key = skipped.missing_key,
            non_finite = skipped.non_finite,
            "skipped records during normalization"
        );
    }

    Ok(NormalizedTable { nodes, skipped })
}

fn place_in_target(
    point: Point<f64>,
    source: Option<EpsgCode>,
    config: &NormalizeConfig,
) -> GeometryResult<Point<f64>> {
    let Some(from) = source else {
        if config.tolerate_reprojection {
            tracing::warn!(
                target_crs = config.target_crs,
                "source frame unknown, passing coordinates through unprojected"
            );
            return Ok(point);
        }
        return Err(GeometryError::Reprojection { from: None, to: config.target_crs });
    };

    match crs::reproject(point, from, config.target_crs) {
        Ok(projected) => Ok(projected),
        Err(CrsError::UnsupportedPair { from, to }) => {
            if config.tolerate_reprojection {
                tracing::warn!(
                    from_crs = from,
                    target_crs = to,
                    "reprojection unavailable, passing coordinates through unprojected"
                );
                Ok(point)
            } else {
                Err(GeometryError::Reprojection { from: Some(from), to })
            }
        }
    }
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use geo_types::{line_string, point, polygon, LineString, MultiPolygon, Polygon};

    #[test]
    fn test_point_passes_through() {
        let p = representative_point(&point! { x: -3.9, y: 40.3 }.into()).unwrap();
        assert_eq!(p, point! { x: -3.9, y: 40.3 });
    }

    #[test]
    fn test_polygon_reduces_to_first_exterior_vertex() {
        let poly: Polygon<f64> = polygon![
            (x: 5.0, y: 5.0),
            (x: 9.0, y: 5.0),
            (x: 9.0, y: 9.0),
            (x: 5.0, y: 9.0),
        ];
        let p = representative_point(&poly.into()).unwrap();
        assert_eq!(p, point! { x: 5.0, y: 5.0 });
    }

    #[test]
    fn test_multi_polygon_uses_first_polygon() {
        let first: Polygon<f64> = polygon![(x: 1.0, y: 2.0), (x: 3.0, y: 2.0), (x: 3.0, y: 4.0)];
        let second: Polygon<f64> = polygon![(x: 7.0, y: 7.0), (x: 8.0, y: 7.0), (x: 8.0, y: 8.0)];
        let multi = MultiPolygon(vec![first, second]);
        let p = representative_point(&multi.into()).unwrap();
        assert_eq!(p, point! { x: 1.0, y: 2.0 });
    }

    #[test]
    fn test_line_string_is_unsupported() {
        let line: LineString<f64> = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)];
        let result = representative_point(&line.into());
        assert_eq!(result, Err(GeometryError::Unsupported("LineString")));
    }

    #[test]
    fn test_empty_multi_polygon() {
        let multi: MultiPolygon<f64> = MultiPolygon(vec![]);
        assert_eq!(
            representative_point(&multi.into()),
            Err(GeometryError::EmptyGeometry)
        );
    }

    fn planar_config() -> NormalizeConfig {
        NormalizeConfig { target_crs: 25830, tolerate_reprojection: false }
    }

    #[test]
    fn test_normalize_skips_and_counts() {
        let mut table = AssetTable::new("hydrant").with_crs(25830);
        table.push(Asset::new(point! { x: 1.0, y: 1.0 }).with_id("H-1"));
        table.push(Asset {
            id: Some("H-2".to_string()),
            geometry: None,
            attributes: Vec::new(),
        });
        table.push(Asset::new(point! { x: f64::NAN, y: 2.0 }));

        let normalized = normalize_table(&table, &planar_config()).unwrap();
        assert_eq!(normalized.nodes.len(), 1);
        assert_eq!(normalized.nodes[0].key, "H-1");
        assert_eq!(normalized.skipped.missing_geometry, 1);
        assert_eq!(normalized.skipped.non_finite, 1);
        assert_eq!(normalized.skipped.total(), 2);
    }

    #[test]
    fn test_normalize_synthesizes_keys_by_position() {
        let mut table = AssetTable::new("pool").with_crs(25830);
        table.push(Asset::new(point! { x: 1.0, y: 1.0 }));
        table.push(Asset::new(point! { x: 2.0, y: 2.0 }));

        let normalized = normalize_table(&table, &planar_config()).unwrap();
        assert_eq!(normalized.nodes[0].key, "pool_0");
        assert_eq!(normalized.nodes[1].key, "pool_1");
    }

    #[test]
    fn test_normalize_unsupported_geometry_is_fatal() {
        let mut table = AssetTable::new("hydrant").with_crs(25830);
        let line: LineString<f64> = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)];
        table.push(Asset::new(line));

        assert!(matches!(
            normalize_table(&table, &planar_config()),
            Err(GeometryError::Unsupported("LineString"))
        ));
    }

    #[test]
    fn test_reprojection_failure_is_fatal_by_default() {
        let mut table = AssetTable::new("hydrant"); // no source frame
        table.push(Asset::new(point! { x: 1.0, y: 1.0 }));

        assert_eq!(
            normalize_table(&table, &planar_config()).unwrap_err(),
            GeometryError::Reprojection { from: None, to: 25830 }
        );
    }

    #[test]
    fn test_tolerated_reprojection_passes_through() {
        let mut table = AssetTable::new("hydrant").with_crs(23030);
        table.push(Asset::new(point! { x: 440_000.0, y: 4_470_000.0 }));

        let config = NormalizeConfig { target_crs: 25830, tolerate_reprojection: true };
        let normalized = normalize_table(&table, &config).unwrap();
        assert_eq!(normalized.nodes[0].x, 440_000.0);
        assert_eq!(normalized.nodes[0].y, 4_470_000.0);
        assert_eq!(normalized.skipped.total(), 0);
    }

    #[test]
    fn test_normalize_reprojects_wgs84_to_mercator() {
        let mut table = AssetTable::new("hydrant").with_crs(crate::crs::WGS84);
        table.push(Asset::new(point! { x: 0.0, y: 0.0 }));

        let config = NormalizeConfig {
            target_crs: crate::crs::WEB_MERCATOR,
            tolerate_reprojection: false,
        };
        let normalized = normalize_table(&table, &config).unwrap();
        assert!(normalized.nodes[0].x.abs() < 1e-9);
        assert!(normalized.nodes[0].y.abs() < 1e-9);
    }
}
