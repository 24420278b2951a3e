//! Asset records and their typed attribute bags.
//!
//! An [`Asset`] is one physical object (hydrant, reservoir, pool) as read
//! from a source table. Attribute values are a tagged variant per cell so the
//! feature encoder's numeric/categorical branching is exhaustive instead of
//! guessing at an untyped map.

use geo_types::Geometry;
use serde::{Deserialize, Serialize};

// ============================================================================
// Attribute Values
// ============================================================================

/// A single attribute cell: free text, a number, or nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// Numeric value (already parsed by the loader)
    Number(f64),
    /// Free-form text value
    Text(String),
    /// Absent or blank cell
    Missing,
}

impl AttrValue {
    /// Create a text value, normalizing blank/whitespace-only strings to
    /// [`AttrValue::Missing`].
    pub fn text(value: impl AsRef<str>) -> Self {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            AttrValue::Missing
        } else {
            AttrValue::Text(trimmed.to_string())
        }
    }

    /// Create a numeric value.
    pub fn number(value: f64) -> Self {
        AttrValue::Number(value)
    }

    /// Whether this cell carries no value.
    pub fn is_missing(&self) -> bool {
        matches!(self, AttrValue::Missing)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Number(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::text(value)
    }
}

// ============================================================================
// Assets and Asset Tables
// ============================================================================

/// One physical object from a source table.
///
/// Attributes are stored as an ordered list, not a hash map, so every
/// downstream iteration over them is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// Source identifier, if the table provides one
    pub id: Option<String>,
    /// Point / Polygon / MultiPolygon geometry; `None` when the record has
    /// no geometry at all (the pipeline skips and counts these)
    pub geometry: Option<Geometry<f64>>,
    /// Domain attributes in source column order
    pub attributes: Vec<(String, AttrValue)>,
}

impl Asset {
    /// Create an asset with a geometry and no attributes.
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            id: None,
            geometry: Some(geometry.into()),
            attributes: Vec::new(),
        }
    }

    /// Set the source identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Append an attribute.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Resolve this asset's node key: the source identifier when present and
    /// non-blank, otherwise `{category}_{index}`. Returns `None` only when
    /// neither the identifier nor the category can produce a key.
    pub fn key(&self, category: &str, index: usize) -> Option<String> {
        if let Some(id) = &self.id {
            let id = id.trim();
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
        let category = category.trim();
        if category.is_empty() {
            return None;
        }
        Some(format!("{}_{}", category, index))
    }
}

/// One source table: all assets of a single category, with the reference
/// frame the loader read their coordinates in (if known).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetTable {
    /// Category tag for every asset in this table (e.g. "hydrant")
    pub category: String,
    /// EPSG code of the source coordinates, when the loader knows it
    pub source_crs: Option<u32>,
    /// Records in source order
    pub assets: Vec<Asset>,
}

impl AssetTable {
    /// Create an empty table for a category.
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            source_crs: None,
            assets: Vec::new(),
        }
    }

    /// Set the source reference frame.
    pub fn with_crs(mut self, epsg: u32) -> Self {
        self.source_crs = Some(epsg);
        self
    }

    /// Append an asset.
    pub fn push(&mut self, asset: Asset) {
        self.assets.push(asset);
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether the table has no records.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// One graph vertex: an asset reduced to a representative coordinate pair in
/// the target reference frame. For geodetic frames `x` is longitude and `y`
/// is latitude; for projected frames both are meters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetNode {
    /// Unique node key
    pub key: String,
    pub x: f64,
    pub y: f64,
    /// Category tag inherited from the source table
    pub category: String,
    /// Original attribute bag, untouched by normalization
    pub attributes: Vec<(String, AttrValue)>,
}

impl AssetNode {
    /// Look up an attribute value by column name (first match).
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, value)| value)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::point;

    #[test]
    fn test_blank_text_normalizes_to_missing() {
        assert_eq!(AttrValue::text(""), AttrValue::Missing);
        assert_eq!(AttrValue::text("   "), AttrValue::Missing);
        assert_eq!(AttrValue::text(" ok "), AttrValue::Text("ok".to_string()));
    }

    #[test]
    fn test_key_prefers_source_identifier() {
        let asset = Asset::new(point! { x: 0.0, y: 0.0 }).with_id("H-17");
        assert_eq!(asset.key("hydrant", 3), Some("H-17".to_string()));
    }

    #[test]
    fn test_key_synthesized_from_category_and_index() {
        let asset = Asset::new(point! { x: 0.0, y: 0.0 });
        assert_eq!(asset.key("hydrant", 3), Some("hydrant_3".to_string()));

        let blank_id = Asset::new(point! { x: 0.0, y: 0.0 }).with_id("  ");
        assert_eq!(blank_id.key("pool", 0), Some("pool_0".to_string()));
    }

    #[test]
    fn test_key_unresolvable_without_category() {
        let asset = Asset::new(point! { x: 0.0, y: 0.0 });
        assert_eq!(asset.key("  ", 0), None);
    }

    #[test]
    fn test_attr_lookup() {
        let node = AssetNode {
            key: "hydrant_0".to_string(),
            x: 1.0,
            y: 2.0,
            category: "hydrant".to_string(),
            attributes: vec![
                ("estado".to_string(), AttrValue::text("operativo")),
                ("presion".to_string(), AttrValue::number(4.5)),
            ],
        };
        assert_eq!(node.attr("presion"), Some(&AttrValue::Number(4.5)));
        assert_eq!(node.attr("nope"), None);
    }
}
