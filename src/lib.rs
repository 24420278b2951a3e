//! # aquagraph
//!
//! Proximity graphs over geo-referenced water-supply assets (hydrants,
//! reservoirs, pools), encoded for graph-ML consumption.
//!
//! This crate provides:
//! - Geometry normalization to one representative point per asset, with
//!   reprojection between reference frames
//! - Undirected proximity-graph construction (fixed-radius threshold or
//!   k-nearest-neighbor), with geodesic or planar edge weights in meters
//! - Feature encoding of heterogeneous attribute tables into a scaled
//!   matrix with reversible category code tables
//! - Reproducible train/validation/test partition masks
//! - A durable snapshot artifact bundling all of the above
//!
//! Loading GeoJSON and rendering maps are external collaborators: they feed
//! [`asset::AssetTable`]s in and consume the [`snapshot::GraphSnapshot`] and
//! [`graph::ProximityGraph`] coming out.

pub mod asset;
pub mod crs;
pub mod features;
pub mod geometry;
pub mod graph;
pub mod partition;
pub mod pipeline;
pub mod snapshot;

pub use asset::{Asset, AssetNode, AssetTable, AttrValue};
pub use crs::{
    coord_space, mercator_y_to_lat, reproject, CoordSpace, CrsError, EpsgCode, ETRS89, NAD27,
    NAD83, WEB_MERCATOR, WGS84,
};
pub use features::{
    encode, CategoryMapping, EncodeError, EncodedFeatures, EncoderConfig, StandardScaler,
};
pub use geometry::{
    normalize_table, representative_point, GeometryError, NormalizeConfig, NormalizedTable,
    SkipCounts,
};
pub use graph::{
    build_knn, build_threshold, DistanceMetric, GraphBuildError, GraphStrategy, KnnConfig,
    ProximityEdge, ProximityGraph, ThresholdConfig,
};
pub use partition::{split, PartitionError, PartitionMasks, SplitRatios};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineOutput, PipelineReport};
pub use snapshot::{EdgeRecord, GraphSnapshot, NodeRecord, SnapshotError};
