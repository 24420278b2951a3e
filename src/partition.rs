//! Train/validation/test partitioning over node indices.
//!
//! The shuffle seed is an explicit parameter, never ambient state, so any
//! split can be reproduced on demand.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors during partitioning
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PartitionError {
    #[error("invalid split ratios: train {train} + val {val} must be within [0, 1]")]
    InvalidRatios { train: f64, val: f64 },
}

/// Result type for partitioning
pub type PartitionResult<T> = Result<T, PartitionError>;

/// Train and validation shares; everything left over is test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRatios {
    pub train: f64,
    pub val: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self { train: 0.70, val: 0.15 }
    }
}

/// Three disjoint boolean masks over node indices; exactly one of the three
/// is true for every index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionMasks {
    pub train: Vec<bool>,
    pub val: Vec<bool>,
    pub test: Vec<bool>,
}

impl PartitionMasks {
    /// Number of nodes the masks cover.
    pub fn len(&self) -> usize {
        self.train.len()
    }

    /// Whether the masks cover zero nodes.
    pub fn is_empty(&self) -> bool {
        self.train.is_empty()
    }

    /// `(train, val, test)` member counts.
    pub fn counts(&self) -> (usize, usize, usize) {
        let count = |mask: &[bool]| mask.iter().filter(|&&m| m).count();
        (count(&self.train), count(&self.val), count(&self.test))
    }
}

/// Split `num_nodes` indices into train/val/test masks.
///
/// Sizes are `floor(train · n)` and `floor(val · n)`; the remainder,
/// rounding slack included, goes to test. Any empty split is valid — a node
/// count below 3 is not an error.
pub fn split(
    num_nodes: usize,
    ratios: SplitRatios,
    seed: u64,
) -> PartitionResult<PartitionMasks> {
    if !ratios.train.is_finite()
        || !ratios.val.is_finite()
        || ratios.train < 0.0
        || ratios.val < 0.0
        || ratios.train + ratios.val > 1.0
    {
        return Err(PartitionError::InvalidRatios { train: ratios.train, val: ratios.val });
    }

    let mut indices: Vec<usize> = (0..num_nodes).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train_size = (ratios.train * num_nodes as f64).floor() as usize;
    let val_size = (ratios.val * num_nodes as f64).floor() as usize;

    let mut masks = PartitionMasks {
        train: vec![false; num_nodes],
        val: vec![false; num_nodes],
        test: vec![false; num_nodes],
    };
    for &index in &indices[..train_size] {
        masks.train[index] = true;
    }
    for &index in &indices[train_size..train_size + val_size] {
        masks.val[index] = true;
    }
    for &index in &indices[train_size + val_size..] {
        masks.test[index] = true;
    }

    Ok(masks)
}

// ============================================================================
// Tests
// ============================================================================
