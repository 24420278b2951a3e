//! Durable snapshot of a built graph and its encoded features.
//!
//! The snapshot is pure I/O boundary: it bundles what the other components
//! produced — nodes, edges, feature matrix, missing mask, category mappings,
//! partition masks, fitted scaler — and round-trips it losslessly. Binary
//! format is magic bytes + version + bincode payload; a JSON sibling exists
//! for inspection.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

use crate::features::{CategoryMapping, EncodedFeatures, StandardScaler};
use crate::graph::{DistanceMetric, ProximityGraph};
use crate::partition::PartitionMasks;

/// Errors for snapshot I/O
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid snapshot data: {0}")]
    InvalidData(String),
    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },
}

/// Result type for snapshot operations
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Current format version
const FORMAT_VERSION: u32 = 1;

/// Magic bytes identifying snapshot files
const MAGIC_BYTES: [u8; 4] = [b'A', b'Q', b'G', b'R'];

// ============================================================================
// Snapshot Types
// ============================================================================

/// One node as stored in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub key: String,
    pub x: f64,
    pub y: f64,
    pub category: String,
}

/// One edge as stored in the snapshot; `source`/`target` are node row
/// indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: u32,
    pub target: u32,
    pub weight_m: f64,
    pub label: String,
}

/// A consistent, self-contained export of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Distance metric the edges were weighted with
    pub metric: DistanceMetric,
    /// Nodes in feature-matrix row order
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
    /// Column names of the feature matrix
    pub columns: Vec<String>,
    /// Scaled feature matrix, one row per node
    pub features: Array2<f64>,
    /// True where a cell was sentinel-filled
    pub missing_mask: Array2<bool>,
    /// Code tables for the categorical columns
    pub mappings: Vec<CategoryMapping>,
    pub masks: PartitionMasks,
    /// Fitted scaler, reapplicable to fresh data
    pub scaler: StandardScaler,
}

impl GraphSnapshot {
    /// Assemble a snapshot from the pipeline's products.
    pub fn from_parts(
        graph: &ProximityGraph,
        features: EncodedFeatures,
        masks: PartitionMasks,
    ) -> Self {
        let nodes = graph
            .nodes()
            .map(|node| NodeRecord {
                key: node.key.clone(),
                x: node.x,
                y: node.y,
                category: node.category.clone(),
            })
            .collect();
        let edges = graph
            .edges()
            .map(|(source, target, edge)| EdgeRecord {
                source: source as u32,
                target: target as u32,
                weight_m: edge.weight_m,
                label: edge.label.clone(),
            })
            .collect();

        Self {
            metric: graph.metric,
            nodes,
            edges,
            columns: features.columns,
            features: features.matrix,
            missing_mask: features.missing_mask,
            mappings: features.mappings,
            masks,
            scaler: features.scaler,
        }
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    // ========================================================================
    // Binary Serialization
    // ========================================================================

    /// Save to binary format.
    pub fn save_binary<P: AsRef<Path>>(&self, path: P) -> SnapshotResult<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(&MAGIC_BYTES)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;

        let data = bincode::serialize(self)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;
        writer.write_all(&(data.len() as u64).to_le_bytes())?;
        writer.write_all(&data)?;

        writer.flush()?;
        Ok(())
    }

    /// Load from binary format.
    pub fn load_binary<P: AsRef<Path>>(path: P) -> SnapshotResult<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC_BYTES {
            return Err(SnapshotError::InvalidData(
                "invalid magic bytes - not a snapshot file".to_string(),
            ));
        }

        let mut version_bytes = [0u8; 4];
        reader.read_exact(&mut version_bytes)?;
        let version = u32::from_le_bytes(version_bytes);
        if version != FORMAT_VERSION {
            return Err(SnapshotError::VersionMismatch {
                expected: FORMAT_VERSION,
                actual: version,
            });
        }

        let mut len_bytes = [0u8; 8];
        reader.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes) as usize;

        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;

        bincode::deserialize(&data).map_err(|e| SnapshotError::Serialization(e.to_string()))
    }

    // ========================================================================
    // JSON Serialization (for inspection)
    // ========================================================================

    /// Save to JSON.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> SnapshotResult<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))
    }

    /// Load from JSON.
    pub fn load_json<P: AsRef<Path>>(path: P) -> SnapshotResult<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| SnapshotError::Serialization(e.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================
