//! Proximity graph construction.
//!
//! Two interchangeable strategies build an undirected graph over normalized
//! asset nodes:
//! - **Threshold**: every pair within a category group, plus every pair from
//!   a designated hub category to the other categories, connected when the
//!   distance is at most `max_dist_m`.
//! - **k-NN**: every node connected to its `k` nearest neighbors in a metric
//!   frame.
//!
//! Edge weights are distances in meters, rounded to two decimals. Both scans
//! are O(n²) in the group sizes being compared, which is fine for node counts
//! in the low thousands; past roughly 10⁴ nodes a spatial index (grid or k-d
//! tree) becomes necessary.

use geo::{EuclideanDistance, HaversineDistance};
use geo_types::Point;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::AssetNode;
use crate::crs;

/// Errors during graph construction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphBuildError {
    #[error("max_dist must be positive and finite, got {0}")]
    InvalidMaxDist(f64),
    #[error("k must be at least 1")]
    InvalidK,
    #[error("k-nearest-neighbor graphs require a metric reference frame")]
    GeodeticKnn,
}

/// Result type for graph construction
pub type GraphBuildResult<T> = Result<T, GraphBuildError>;

// ============================================================================
// Graph Types
// ============================================================================

/// Distance computation used for edge weights. Never mixed within one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Great-circle distance over lat/lon degrees (x = lon, y = lat)
    Geodesic,
    /// Euclidean distance over projected meters
    Planar,
    /// Euclidean distance over web mercator meters, scaled by cos(lat) at
    /// the pair midpoint. Raw mercator lengths inflate by 1/cos(lat) away
    /// from the equator (1.31x already at Madrid's latitude).
    /// Kept last so binary snapshots written before it existed still load.
    Mercator,
}

/// An undirected proximity edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityEdge {
    /// Distance in meters, rounded to two decimals
    pub weight_m: f64,
    /// Category pair in alphabetical order, e.g. "hydrant-reservoir"
    pub label: String,
}

/// Configuration for the fixed-radius strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Maximum connection distance, meters
    pub max_dist_m: f64,
    /// Category whose nodes also connect across category boundaries
    /// (e.g. reservoirs to every other category). `None` keeps the scan
    /// within category groups only.
    pub hub_category: Option<String>,
}

/// Configuration for the k-nearest-neighbor strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnnConfig {
    /// Number of nearest neighbors per node
    pub k: usize,
}

/// Graph construction strategy, selected by pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphStrategy {
    Threshold(ThresholdConfig),
    Knn(KnnConfig),
}

/// The built proximity graph. Nodes keep the insertion order of the input
/// slice, so node index i corresponds to input row i. Immutable after build.
#[derive(Debug)]
pub struct ProximityGraph {
    pub graph: UnGraph<AssetNode, ProximityEdge>,
    pub metric: DistanceMetric,
}

impl ProximityGraph {
    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Nodes in index order.
    pub fn nodes(&self) -> impl Iterator<Item = &AssetNode> {
        self.graph.node_indices().map(|i| &self.graph[i])
    }

    /// Edge rows `(source index, target index, edge)` in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, &ProximityEdge)> {
        self.graph
            .edge_references()
            .map(|e| (e.source().index(), e.target().index(), e.weight()))
    }

    /// Node indices with no incident edges. Isolated nodes are retained in
    /// the graph; whether to drop them before model consumption is the
    /// consumer's decision.
    pub fn isolated_nodes(&self) -> Vec<usize> {
        self.graph
            .node_indices()
            .filter(|&i| self.graph.edges(i).next().is_none())
            .map(|i| i.index())
            .collect()
    }
}

// ============================================================================
// Threshold Strategy
// ============================================================================

/// Build a distance-bounded graph.
///
/// Pairs are visited exactly once, in `(i, j)` index order with `i < j`
/// within a group and groups in first-seen category order, so the edge set
/// and weights are identical across runs given identical input order. The
/// pairwise scan runs on rayon; result order is unaffected.
pub fn build_threshold(
    nodes: Vec<AssetNode>,
    config: &ThresholdConfig,
    metric: DistanceMetric,
) -> GraphBuildResult<ProximityGraph> {
    if !config.max_dist_m.is_finite() || config.max_dist_m <= 0.0 {
        return Err(GraphBuildError::InvalidMaxDist(config.max_dist_m));
    }

    let groups = category_groups(&nodes);
    let mut hits: Vec<(usize, usize, f64)> = Vec::new();

    // Same-category pairs, group by group
    for (_, members) in &groups {
        hits.extend(scan_within(&nodes, members, metric, config.max_dist_m));
    }

    // Hub category to every other category, in group order
    if let Some(hub) = &config.hub_category {
        match groups.iter().find(|(name, _)| name == hub) {
            Some((_, hub_members)) => {
                for (name, members) in &groups {
                    if name == hub {
                        continue;
                    }
                    hits.extend(scan_across(
                        &nodes,
                        hub_members,
                        members,
                        metric,
                        config.max_dist_m,
                    ));
                }
            }
            None => {
                tracing::warn!(hub_category = %hub, "hub category has no nodes, skipping cross-category scan");
            }
        }
    }

    let mut graph = build_node_graph(nodes);
    for (i, j, weight_m) in hits {
        add_unique_edge(&mut graph, i, j, weight_m);
    }

    Ok(ProximityGraph { graph, metric })
}

/// Pairs `(i, j)` with `i < j` inside one category group.
fn scan_within(
    nodes: &[AssetNode],
    members: &[usize],
    metric: DistanceMetric,
    max_dist_m: f64,
) -> Vec<(usize, usize, f64)> {
    let rows: Vec<Vec<(usize, usize, f64)>> = members
        .par_iter()
        .enumerate()
        .map(|(pos, &i)| {
            members[pos + 1..]
                .iter()
                .filter_map(|&j| {
                    let d = distance_m(metric, &nodes[i], &nodes[j]);
                    (d <= max_dist_m).then(|| (i, j, round_cm(d)))
                })
                .collect()
        })
        .collect();
    rows.into_iter().flatten().collect()
}

/// All hub × other pairs between two disjoint groups.
fn scan_across(
    nodes: &[AssetNode],
    hub: &[usize],
    other: &[usize],
    metric: DistanceMetric,
    max_dist_m: f64,
) -> Vec<(usize, usize, f64)> {
    let rows: Vec<Vec<(usize, usize, f64)>> = hub
        .par_iter()
        .map(|&i| {
            other
                .iter()
                .filter_map(|&j| {
                    let d = distance_m(metric, &nodes[i], &nodes[j]);
                    (d <= max_dist_m).then(|| (i, j, round_cm(d)))
                })
                .collect()
        })
        .collect();
    rows.into_iter().flatten().collect()
}

// ============================================================================
// k-NN Strategy
// ============================================================================

/// Build a k-nearest-neighbor graph over a metric frame.
///
/// Neighbor relations are not symmetric, so the result need not be
/// k-regular: a node may appear in more than `k` edges when other nodes
/// select it. Mutual nearest-neighbor hits collapse to one stored edge,
/// keeping the first-computed weight. With fewer than `k + 1` nodes each
/// node simply connects to all others.
pub fn build_knn(
    nodes: Vec<AssetNode>,
    config: &KnnConfig,
    metric: DistanceMetric,
) -> GraphBuildResult<ProximityGraph> {
    if config.k == 0 {
        return Err(GraphBuildError::InvalidK);
    }
    if metric == DistanceMetric::Geodesic {
        return Err(GraphBuildError::GeodeticKnn);
    }

    let n = nodes.len();
    let neighbor_lists: Vec<Vec<(usize, f64)>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let mut dists: Vec<(f64, usize)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (distance_m(metric, &nodes[i], &nodes[j]), j))
                .collect();
            // Ties broken by index so the neighbor set is deterministic
            dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            dists
                .into_iter()
                .take(config.k)
                .map(|(d, j)| (j, round_cm(d)))
                .collect()
        })
        .collect();

    let mut graph = build_node_graph(nodes);
    for (i, neighbors) in neighbor_lists.into_iter().enumerate() {
        for (j, weight_m) in neighbors {
            add_unique_edge(&mut graph, i, j, weight_m);
        }
    }

    Ok(ProximityGraph { graph, metric })
}

// ============================================================================
// Shared Helpers
// ============================================================================

fn build_node_graph(nodes: Vec<AssetNode>) -> UnGraph<AssetNode, ProximityEdge> {
    let mut graph = UnGraph::with_capacity(nodes.len(), 0);
    for node in nodes {
        graph.add_node(node);
    }
    graph
}

/// Store an edge once per unordered pair, keeping the first-computed weight.
fn add_unique_edge(graph: &mut UnGraph<AssetNode, ProximityEdge>, i: usize, j: usize, weight_m: f64) {
    let (a, b) = (NodeIndex::new(i), NodeIndex::new(j));
    if a == b || graph.find_edge(a, b).is_some() {
        return;
    }
    let label = pair_label(&graph[a].category, &graph[b].category);
    graph.add_edge(a, b, ProximityEdge { weight_m, label });
}

/// Category groups in first-seen order, each holding member indices in
/// input order. Materialized as a vector, not a hash map, to keep the
/// pairwise scan order deterministic.
fn category_groups(nodes: &[AssetNode]) -> Vec<(String, Vec<usize>)> {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (index, node) in nodes.iter().enumerate() {
        match groups.iter_mut().find(|(name, _)| *name == node.category) {
            Some((_, members)) => members.push(index),
            None => groups.push((node.category.clone(), vec![index])),
        }
    }
    groups
}

fn distance_m(metric: DistanceMetric, a: &AssetNode, b: &AssetNode) -> f64 {
    let pa = Point::new(a.x, a.y);
    let pb = Point::new(b.x, b.y);
    match metric {
        DistanceMetric::Geodesic => pa.haversine_distance(&pb),
        DistanceMetric::Planar => pa.euclidean_distance(&pb),
        DistanceMetric::Mercator => {
            let mid_lat = crs::mercator_y_to_lat((a.y + b.y) / 2.0);
            pa.euclidean_distance(&pb) * mid_lat.to_radians().cos()
        }
    }
}

/// Canonical edge label: both category tags in alphabetical order.
fn pair_label(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}-{}", a, b)
    } else {
        format!("{}-{}", b, a)
    }
}

fn round_cm(meters: f64) -> f64 {
    (meters * 100.0).round() / 100.0
}

// ============================================================================
// Tests
// ============================================================================
