//! Feature encoding: heterogeneous attribute bags into a scaled matrix.
//!
//! Column layout is `[x, y, attribute columns]` with attributes in the order
//! they first appear across the node sequence, after date-like columns are
//! dropped. Categorical values become integer codes recorded in a
//! [`CategoryMapping`]; missing cells are filled with a sentinel and flagged
//! in a parallel missing mask so the fill never masquerades as data. Every
//! column is standardized to zero mean and unit variance with population
//! statistics; the fitted [`StandardScaler`] is part of the output so the
//! same transform can be reapplied to fresh data.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::asset::{AssetNode, AttrValue};

/// Errors during feature encoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("cannot encode an empty node set")]
    EmptyNodeSet,
}

/// Result type for feature encoding
pub type EncodeResult<T> = Result<T, EncodeError>;

// ============================================================================
// Configuration
// ============================================================================

/// Encoder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Case-insensitive substrings marking a column as date-like; such
    /// columns are dropped before encoding. Default: `fecha`.
    pub date_tokens: Vec<String>,
    /// Fill value for missing cells, applied before scaling
    pub missing_sentinel: f64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            date_tokens: vec!["fecha".to_string()],
            missing_sentinel: -1.0,
        }
    }
}

// ============================================================================
// Category Mappings
// ============================================================================

/// The reversible code table for one categorical column: `values[code]` is
/// the original string. Built once during encoding, immutable afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMapping {
    /// Column name
    pub column: String,
    /// Distinct observed values in first-seen order, indexed by code
    pub values: Vec<String>,
}

impl CategoryMapping {
    /// Code assigned to a value, if observed during encoding.
    pub fn code_of(&self, value: &str) -> Option<usize> {
        self.values.iter().position(|v| v == value)
    }

    /// Original value for a code.
    pub fn decode(&self, code: usize) -> Option<&str> {
        self.values.get(code).map(String::as_str)
    }
}

// ============================================================================
// Standard Scaler
// ============================================================================

/// Per-column standardization state, fitted over the full node population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub scale: Array1<f64>,
}

impl StandardScaler {
    /// Fit means and scales column by column. A zero-variance column gets
    /// unit scale instead of a division by zero; this is logged, not fatal.
    pub fn fit(matrix: &Array2<f64>) -> Self {
        let n = matrix.nrows() as f64;
        let mut mean = Array1::zeros(matrix.ncols());
        let mut scale = Array1::zeros(matrix.ncols());

        for (c, column) in matrix.axis_iter(Axis(1)).enumerate() {
            let m = column.sum() / n;
            let variance = column.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
            let s = variance.sqrt();
            mean[c] = m;
            scale[c] = if s > 0.0 {
                s
            } else {
                tracing::warn!(column = c, "zero-variance column, substituting unit scale");
                1.0
            };
        }

        Self { mean, scale }
    }

    /// Apply the fitted transform to a matrix with the same column layout.
    pub fn transform(&self, matrix: &Array2<f64>) -> Array2<f64> {
        let mut scaled = matrix.clone();
        for (c, mut column) in scaled.axis_iter_mut(Axis(1)).enumerate() {
            column.mapv_inplace(|v| (v - self.mean[c]) / self.scale[c]);
        }
        scaled
    }

    /// Undo the transform.
    pub fn inverse_transform(&self, matrix: &Array2<f64>) -> Array2<f64> {
        let mut raw = matrix.clone();
        for (c, mut column) in raw.axis_iter_mut(Axis(1)).enumerate() {
            column.mapv_inplace(|v| v * self.scale[c] + self.mean[c]);
        }
        raw
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// The encoded node features: scaled matrix, missing mask, column names,
/// category code tables, and the fitted scaler.
#[derive(Debug, Clone)]
pub struct EncodedFeatures {
    /// Rows aligned 1:1 with the node sequence; columns `[x, y, attrs...]`
    pub matrix: Array2<f64>,
    /// True where the cell was filled with the sentinel
    pub missing_mask: Array2<bool>,
    /// Column names in matrix order
    pub columns: Vec<String>,
    /// One mapping per categorical column, in column order
    pub mappings: Vec<CategoryMapping>,
    pub scaler: StandardScaler,
}

/// Encode a node sequence into a feature matrix.
///
/// Column order, category codes, and therefore the whole output are
/// deterministic given the input order.
pub fn encode(nodes: &[AssetNode], config: &EncoderConfig) -> EncodeResult<EncodedFeatures> {
    if nodes.is_empty() {
        return Err(EncodeError::EmptyNodeSet);
    }

    let attr_columns = select_columns(nodes, config);
    let n = nodes.len();
    let width = 2 + attr_columns.len();

    let mut raw = Array2::zeros((n, width));
    let mut missing_mask = Array2::from_elem((n, width), false);
    for (row, node) in nodes.iter().enumerate() {
        raw[[row, 0]] = node.x;
        raw[[row, 1]] = node.y;
    }

    let mut mappings = Vec::new();
    for (offset, column) in attr_columns.iter().enumerate() {
        let col = 2 + offset;
        if is_categorical(nodes, column) {
            let (mapping, codes) = build_mapping(nodes, column);
            for (row, node) in nodes.iter().enumerate() {
                match node.attr(column).and_then(categorical_token) {
                    Some(token) => {
                        // The code table was built over this same token
                        // sequence; indexing panics rather than coding an
                        // unseen token as 0
                        raw[[row, col]] = codes[&token] as f64;
                    }
                    None => {
                        raw[[row, col]] = config.missing_sentinel;
                        missing_mask[[row, col]] = true;
                    }
                }
            }
            mappings.push(mapping);
        } else {
            for (row, node) in nodes.iter().enumerate() {
                match node.attr(column) {
                    Some(AttrValue::Number(v)) => raw[[row, col]] = *v,
                    _ => {
                        raw[[row, col]] = config.missing_sentinel;
                        missing_mask[[row, col]] = true;
                    }
                }
            }
        }
    }

    let scaler = StandardScaler::fit(&raw);
    let matrix = scaler.transform(&raw);

    let mut columns = vec!["x".to_string(), "y".to_string()];
    columns.extend(attr_columns);

    Ok(EncodedFeatures { matrix, missing_mask, columns, mappings, scaler })
}

/// Attribute columns in first-seen order, with date-like columns dropped.
fn select_columns(nodes: &[AssetNode], config: &EncoderConfig) -> Vec<String> {
    let tokens: Vec<String> = config.date_tokens.iter().map(|t| t.to_lowercase()).collect();
    let mut columns: Vec<String> = Vec::new();
    for node in nodes {
        for (name, _) in &node.attributes {
            if columns.iter().any(|c| c == name) {
                continue;
            }
            let lower = name.to_lowercase();
            if tokens.iter().any(|t| lower.contains(t.as_str())) {
                continue;
            }
            columns.push(name.clone());
        }
    }
    columns
}

/// A column is categorical as soon as any present value is text. Numbers
/// observed in such a column are coded through their display form so the
/// branching stays exhaustive.
fn is_categorical(nodes: &[AssetNode], column: &str) -> bool {
    nodes
        .iter()
        .filter_map(|node| node.attr(column))
        .any(|value| matches!(value, AttrValue::Text(_)))
}

fn categorical_token(value: &AttrValue) -> Option<String> {
    match value {
        AttrValue::Text(s) => Some(s.clone()),
        AttrValue::Number(v) => Some(format!("{}", v)),
        AttrValue::Missing => None,
    }
}

/// Build the code table for one column, returning both the reversible
/// mapping and the token-to-code lookup used while filling the matrix.
fn build_mapping(nodes: &[AssetNode], column: &str) -> (CategoryMapping, HashMap<String, usize>) {
    let mut values: Vec<String> = Vec::new();
    let mut codes: HashMap<String, usize> = HashMap::new();
    for node in nodes {
        if let Some(token) = node.attr(column).and_then(categorical_token) {
            if !codes.contains_key(&token) {
                codes.insert(token.clone(), values.len());
                values.push(token);
            }
        }
    }
    (CategoryMapping { column: column.to_string(), values }, codes)
}

// ============================================================================
// Tests
// ============================================================================
