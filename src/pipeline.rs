//! The pipeline front door: normalize → build → encode → partition.
//!
//! Every knob is an explicit [`PipelineConfig`] field — no module-level
//! constants, no ambient randomness — so a run is reproducible from its
//! configuration alone.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::{AssetNode, AssetTable};
use crate::crs::{self, CoordSpace, EpsgCode};
use crate::features::{encode, EncodeError, EncodedFeatures, EncoderConfig};
use crate::geometry::{normalize_table, GeometryError, NormalizeConfig, SkipCounts};
use crate::graph::{
    build_knn, build_threshold, DistanceMetric, GraphBuildError, GraphStrategy, ProximityGraph,
};
use crate::partition::{split, PartitionError, PartitionMasks, SplitRatios};
use crate::snapshot::{GraphSnapshot, SnapshotError};

/// Errors from a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),
    #[error("graph build error: {0}")]
    Build(#[from] GraphBuildError),
    #[error("encoding error: {0}")]
    Encode(#[from] EncodeError),
    #[error("partition error: {0}")]
    Partition(#[from] PartitionError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Result type for pipeline runs
pub type PipelineResult<T> = Result<T, PipelineError>;

// ============================================================================
// Configuration
// ============================================================================

/// Full configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Graph construction strategy
    pub strategy: GraphStrategy,
    /// EPSG code every coordinate is normalized into; also selects the
    /// distance metric (geodesic for geographic frames, latitude-corrected
    /// for web mercator, planar otherwise)
    pub target_crs: EpsgCode,
    /// Degrade impossible reprojections to warnings instead of failing
    pub tolerate_reprojection: bool,
    /// Train/validation shares for the partition masks
    pub ratios: SplitRatios,
    /// Shuffle seed for the partition
    pub seed: u64,
    /// Feature encoder settings
    pub encoder: EncoderConfig,
}

// ============================================================================
// Output
// ============================================================================

/// Counts reported back to the caller after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub node_count: usize,
    pub edge_count: usize,
    /// Per-category skip counts from normalization, in input table order
    pub skipped: Vec<(String, SkipCounts)>,
}

impl PipelineReport {
    /// Total records skipped across all tables.
    pub fn total_skipped(&self) -> usize {
        self.skipped.iter().map(|(_, counts)| counts.total()).sum()
    }
}

/// Everything a run produces: the graph for map/plot collaborators, the
/// snapshot for model-training collaborators, and the report.
#[derive(Debug)]
pub struct PipelineOutput {
    pub graph: ProximityGraph,
    pub snapshot: GraphSnapshot,
    pub report: PipelineReport,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Batch pipeline over asset tables. Runs to completion once per
/// invocation; a failed run is simply re-run after the input is fixed.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline with the given configuration.
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline over the given tables.
    pub fn run(&self, tables: &[AssetTable]) -> PipelineResult<PipelineOutput> {
        let normalize_config = NormalizeConfig {
            target_crs: self.config.target_crs,
            tolerate_reprojection: self.config.tolerate_reprojection,
        };

        let mut nodes: Vec<AssetNode> = Vec::new();
        let mut skipped: Vec<(String, SkipCounts)> = Vec::new();
        for table in tables {
            let normalized = normalize_table(table, &normalize_config)?;
            skipped.push((table.category.clone(), normalized.skipped));
            nodes.extend(normalized.nodes);
        }
        if nodes.is_empty() {
            return Err(EncodeError::EmptyNodeSet.into());
        }

        let encoded: EncodedFeatures = encode(&nodes, &self.config.encoder)?;

        let metric = match crs::coord_space(self.config.target_crs) {
            CoordSpace::Geodetic => DistanceMetric::Geodesic,
            CoordSpace::Mercator => DistanceMetric::Mercator,
            CoordSpace::Planar => DistanceMetric::Planar,
        };
        let graph = match &self.config.strategy {
            GraphStrategy::Threshold(config) => build_threshold(nodes, config, metric)?,
            GraphStrategy::Knn(config) => build_knn(nodes, config, metric)?,
        };

        let masks: PartitionMasks =
            split(graph.node_count(), self.config.ratios, self.config.seed)?;

        let report = PipelineReport {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            skipped,
        };
        tracing::info!(
            nodes = report.node_count,
            edges = report.edge_count,
            skipped = report.total_skipped(),
            "proximity graph built"
        );

        let snapshot = GraphSnapshot::from_parts(&graph, encoded, masks);
        Ok(PipelineOutput { graph, snapshot, report })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{Asset, AttrValue};
    use crate::graph::{KnnConfig, ThresholdConfig};
    use geo_types::point;

    fn hydrant_table() -> AssetTable {
        let mut table = AssetTable::new("hydrant").with_crs(25830);
        for (i, x) in [0.0, 100.0, 1_000.0].iter().enumerate() {
            table.push(
                Asset::new(point! { x: *x, y: 0.0 })
                    .with_id(format!("H-{}", i))
                    .with_attr("estado", AttrValue::text("operativo")),
            );
        }
        table
    }

    fn threshold_config(max_dist_m: f64) -> PipelineConfig {
        PipelineConfig {
            strategy: GraphStrategy::Threshold(ThresholdConfig {
                max_dist_m,
                hub_category: None,
            }),
            target_crs: 25830,
            tolerate_reprojection: false,
            ratios: SplitRatios::default(),
            seed: 42,
            encoder: EncoderConfig::default(),
        }
    }

    #[test]
    fn test_run_produces_aligned_output() {
        let output = Pipeline::new(threshold_config(300.0))
            .run(&[hydrant_table()])
            .unwrap();

        assert_eq!(output.report.node_count, 3);
        assert_eq!(output.report.edge_count, 1);
        assert_eq!(output.snapshot.features.nrows(), 3);
        assert_eq!(output.snapshot.masks.len(), 3);
        assert_eq!(output.snapshot.edges[0].weight_m, 100.0);
    }

    #[test]
    fn test_empty_input_is_fatal() {
        let result = Pipeline::new(threshold_config(300.0)).run(&[]);
        assert!(matches!(
            result,
            Err(PipelineError::Encode(EncodeError::EmptyNodeSet))
        ));
    }

    #[test]
    fn test_knn_requires_planar_target() {
        let config = PipelineConfig {
            strategy: GraphStrategy::Knn(KnnConfig { k: 2 }),
            target_crs: crs::WGS84,
            tolerate_reprojection: false,
            ratios: SplitRatios::default(),
            seed: 0,
            encoder: EncoderConfig::default(),
        };
        let mut table = AssetTable::new("hydrant").with_crs(crs::WGS84);
        table.push(Asset::new(point! { x: -3.86, y: 40.32 }));
        table.push(Asset::new(point! { x: -3.87, y: 40.33 }));

        let result = Pipeline::new(config).run(&[table]);
        assert!(matches!(
            result,
            Err(PipelineError::Build(GraphBuildError::GeodeticKnn))
        ));
    }

    #[test]
    fn test_report_carries_skip_counts() {
        let mut table = hydrant_table();
        table.push(Asset {
            id: Some("H-broken".to_string()),
            geometry: None,
            attributes: Vec::new(),
        });

        let output = Pipeline::new(threshold_config(300.0)).run(&[table]).unwrap();
        assert_eq!(output.report.total_skipped(), 1);
        assert_eq!(output.report.skipped[0].0, "hydrant");
        assert_eq!(output.report.skipped[0].1.missing_geometry, 1);
    }
}
