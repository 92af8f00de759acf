//! Embedding fibre: fixed-dimension numeric vectors.
//!
//! Enriches trees with distributed representations. The vector table
//! and dimension are explicit configuration passed at construction;
//! there is no implicit global table.

use arbor_kernel::{Fibre, TreeMap, TreeNode, op};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default weight of the left operand under `"merge"`.
const DEFAULT_MERGE_WEIGHT: f64 = 0.5;

/// Default weight of the *second* operand under `"move"`. Movement
/// favors the landing-site material, so the split is asymmetric.
const DEFAULT_MOVE_WEIGHT: f64 = 0.7;

/// Configuration for the embedding fibre.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Declared vector dimension. Push-forward extends to this length;
    /// pull-back projects to half of it.
    pub dimension: usize,

    /// Per-token vectors for leaf lookup. Unknown tokens get a zero
    /// vector of the declared dimension.
    pub table: BTreeMap<String, Vec<f64>>,

    /// Weight of the left operand under `"merge"` (right gets the
    /// complement).
    pub merge_weight: f64,

    /// Weight of the second operand under `"move"` (first gets the
    /// complement).
    pub move_weight: f64,
}

impl EmbeddingConfig {
    /// Configuration with an empty table and default weights.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            table: BTreeMap::new(),
            merge_weight: DEFAULT_MERGE_WEIGHT,
            move_weight: DEFAULT_MOVE_WEIGHT,
        }
    }

    /// The six-word demo table: two salient leading components per
    /// token, a constant tail out to the declared dimension.
    pub fn demo_table(dimension: usize) -> Self {
        let entry = |a: f64, b: f64, tail: f64| -> Vec<f64> {
            let mut v = vec![a, b];
            v.resize(dimension.max(2), tail);
            v.truncate(dimension);
            v
        };

        let mut table = BTreeMap::new();
        table.insert("the".to_string(), entry(1.0, 0.0, 0.1));
        table.insert("a".to_string(), entry(0.9, 0.1, 0.1));
        table.insert("student".to_string(), entry(0.0, 1.0, 0.2));
        table.insert("teacher".to_string(), entry(0.1, 0.9, 0.2));
        table.insert("left".to_string(), entry(0.5, 0.5, 0.3));
        table.insert("arrived".to_string(), entry(0.4, 0.6, 0.3));

        Self {
            dimension,
            table,
            merge_weight: DEFAULT_MERGE_WEIGHT,
            move_weight: DEFAULT_MOVE_WEIGHT,
        }
    }
}

/// A numeric vector attached to a tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    values: Vec<f64>,
}

impl Embedding {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Zero vector of the given dimension.
    pub fn zeros(dimension: usize) -> Self {
        Self {
            values: vec![0.0; dimension],
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// L2 norm.
    pub fn norm(&self) -> f64 {
        self.values.iter().map(|x| x * x).sum::<f64>().sqrt()
    }

    /// Dot product over the shared prefix of the two vectors.
    pub fn dot(&self, other: &Embedding) -> f64 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    /// Cosine similarity; 0.0 when either vector has zero norm.
    pub fn cosine_similarity(&self, other: &Embedding) -> f64 {
        let denom = self.norm() * other.norm();
        if denom > 0.0 {
            self.dot(other) / denom
        } else {
            0.0
        }
    }

    /// Truncate or zero-pad to exactly `dimension` entries.
    fn resized(&self, dimension: usize) -> Embedding {
        let mut values = self.values.clone();
        values.resize(dimension, 0.0);
        Embedding { values }
    }
}

/// Embedding fibre: table lookup at leaves, weighted averaging under
/// combination, truncate/pad projection under pull/push.
#[derive(Debug, Clone)]
pub struct EmbeddingFibre {
    config: EmbeddingConfig,
}

impl EmbeddingFibre {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    /// Pull-back projection target: half the declared dimension.
    ///
    /// The target length is fixed by configuration, not derived from
    /// the map, so projecting twice equals projecting once, which is
    /// what keeps the functoriality law an exact equality.
    fn pull_dimension(&self) -> usize {
        (self.config.dimension / 2).max(1)
    }

    /// Element-wise weighted average after zero-padding the shorter
    /// operand: `left_weight * l + (1 - left_weight) * r`.
    fn weighted_average(left: &Embedding, right: &Embedding, left_weight: f64) -> Embedding {
        let dimension = left.dimension().max(right.dimension());
        let l = left.resized(dimension);
        let r = right.resized(dimension);

        let values = l
            .values
            .iter()
            .zip(r.values.iter())
            .map(|(a, b)| left_weight * a + (1.0 - left_weight) * b)
            .collect();
        Embedding::new(values)
    }
}

impl Fibre for EmbeddingFibre {
    type Data = Embedding;

    fn key(&self) -> &'static str {
        "embedding"
    }

    fn pull(&self, map: &TreeMap, target: &Self::Data) -> Self::Data {
        if map.is_identity() {
            return target.clone();
        }
        target.resized(self.pull_dimension())
    }

    fn push(&self, map: &TreeMap, source: &Self::Data) -> Self::Data {
        if map.is_identity() {
            return source.clone();
        }
        source.resized(self.config.dimension)
    }

    fn combine(&self, left: &Self::Data, right: &Self::Data, operation: &str) -> Self::Data {
        match operation {
            op::MERGE => Self::weighted_average(left, right, self.config.merge_weight),
            op::MOVE => Self::weighted_average(left, right, 1.0 - self.config.move_weight),
            // Unrecognized operations: unweighted average.
            _ => Self::weighted_average(left, right, 0.5),
        }
    }

    fn identity_data(&self, node: &TreeNode) -> Self::Data {
        if node.is_leaf() {
            if let Some(values) = self.config.table.get(&node.label) {
                return Embedding::new(values.clone());
            }
        }
        Embedding::zeros(self.config.dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fibre(dimension: usize) -> EmbeddingFibre {
        EmbeddingFibre::new(EmbeddingConfig::demo_table(dimension))
    }

    #[test]
    fn leaf_lookup_uses_table() {
        let f = fibre(4);
        let leaf = TreeNode::leaf("l0", "student");
        let e = f.identity_data(&leaf);
        assert_eq!(e.values(), &[0.0, 1.0, 0.2, 0.2]);
    }

    #[test]
    fn unknown_leaf_gets_zero_vector() {
        let f = fibre(4);
        let leaf = TreeNode::leaf("l0", "xylophone");
        let e = f.identity_data(&leaf);
        assert_eq!(e.values(), &[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(e.norm(), 0.0);
    }

    #[test]
    fn merge_keeps_declared_dimension() {
        let f = fibre(4);
        let a = f.identity_data(&TreeNode::leaf("a", "the"));
        let b = f.identity_data(&TreeNode::leaf("b", "student"));
        let merged = f.combine(&a, &b, op::MERGE);
        assert_eq!(merged.dimension(), 4);
    }

    #[test]
    fn merge_norm_respects_triangle_bound() {
        let f = fibre(4);
        let a = f.identity_data(&TreeNode::leaf("a", "the"));
        let b = f.identity_data(&TreeNode::leaf("b", "student"));
        let merged = f.combine(&a, &b, op::MERGE);
        assert!(merged.norm() <= a.norm() + b.norm() + 1e-9);
    }

    #[test]
    fn merge_pads_shorter_operand_with_zeros() {
        let f = fibre(4);
        let short = Embedding::new(vec![1.0, 1.0]);
        let long = Embedding::new(vec![0.0, 0.0, 2.0, 2.0]);
        let merged = f.combine(&short, &long, op::MERGE);
        assert_eq!(merged.values(), &[0.5, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn move_favors_second_operand() {
        let f = fibre(2);
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        let moved = f.combine(&a, &b, op::MOVE);
        // Second operand carries weight 0.7.
        assert!((moved.values()[0] - 0.3).abs() < 1e-9);
        assert!((moved.values()[1] - 0.7).abs() < 1e-9);
    }

    #[test]
    fn pull_projects_to_half_dimension() {
        let f = fibre(4);
        let map = TreeMap::new(
            arbor_kernel::TreeId::new("small"),
            arbor_kernel::TreeId::new("big"),
            BTreeMap::new(),
        );
        let e = Embedding::new(vec![1.0, 2.0, 3.0, 4.0]);
        let pulled = f.pull(&map, &e);
        assert_eq!(pulled.values(), &[1.0, 2.0]);
    }

    #[test]
    fn pull_is_idempotent() {
        let f = fibre(4);
        let map = TreeMap::new(
            arbor_kernel::TreeId::new("small"),
            arbor_kernel::TreeId::new("big"),
            BTreeMap::new(),
        );
        let e = Embedding::new(vec![1.0, 2.0, 3.0, 4.0]);
        let once = f.pull(&map, &e);
        let twice = f.pull(&map, &once);
        assert_eq!(once, twice);
    }

    #[test]
    fn pull_along_identity_is_identity() {
        let f = fibre(4);
        let tree = TreeNode::leaf("t", "x");
        let id = TreeMap::identity(&tree);
        let e = Embedding::new(vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(f.pull(&id, &e), e);
    }

    #[test]
    fn push_extends_to_declared_dimension() {
        let f = fibre(6);
        let map = TreeMap::new(
            arbor_kernel::TreeId::new("small"),
            arbor_kernel::TreeId::new("big"),
            BTreeMap::new(),
        );
        let e = Embedding::new(vec![1.0, 2.0]);
        let pushed = f.push(&map, &e);
        assert_eq!(pushed.values(), &[1.0, 2.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn cosine_similarity_of_vector_with_itself_is_one() {
        let e = Embedding::new(vec![0.5, 0.5, 0.3]);
        assert!((e.cosine_similarity(&e) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_similarity_with_zero_vector_is_zero() {
        let e = Embedding::new(vec![1.0, 2.0]);
        let z = Embedding::zeros(2);
        assert_eq!(e.cosine_similarity(&z), 0.0);
    }
}
