//! Probability fibre: distributions over terminal yields.
//!
//! Enriches trees with statistical weight. The data is a distribution
//! over result strings, re-normalized to sum to 1 whenever mass is
//! added or removed.

use arbor_kernel::{Fibre, TreeMap, TreeNode, op};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mass within this tolerance of 1.0 counts as already normalized.
///
/// Skipping the division in that case makes normalization exactly
/// idempotent, which in turn makes the identity and functoriality laws
/// exact value equalities rather than approximate ones.
const NORMALIZED_TOLERANCE: f64 = 1e-9;

/// Fraction of mass that moves to the transposed variant under `"move"`.
const MOVE_SPLIT: f64 = 0.5;

/// A probability distribution over terminal yields.
///
/// Always normalized: construction re-scales the weights to sum to 1
/// unless the input mass is zero (the empty distribution is valid and
/// stays empty through combination).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldDistribution {
    weights: BTreeMap<String, f64>,
}

impl YieldDistribution {
    /// Build a distribution, re-normalizing the given weights.
    pub fn new(weights: BTreeMap<String, f64>) -> Self {
        let mut dist = Self { weights };
        dist.normalize();
        dist
    }

    /// The empty distribution (no mass, still valid).
    pub fn empty() -> Self {
        Self {
            weights: BTreeMap::new(),
        }
    }

    /// Point mass 1.0 on a single yield.
    pub fn point(yield_str: impl Into<String>) -> Self {
        let mut weights = BTreeMap::new();
        weights.insert(yield_str.into(), 1.0);
        Self { weights }
    }

    /// The weights, keyed by yield string.
    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    /// Total probability mass (1.0 for nonempty distributions, 0.0 for
    /// the empty one).
    pub fn mass(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Shannon entropy in bits.
    pub fn entropy(&self) -> f64 {
        self.weights
            .values()
            .filter(|p| **p > 0.0)
            .map(|p| -p * p.log2())
            .sum()
    }

    /// The `k` most probable yields, highest first. Ties resolve by
    /// yield string for determinism.
    pub fn top_k(&self, k: usize) -> Vec<(&str, f64)> {
        let mut entries: Vec<(&str, f64)> = self
            .weights
            .iter()
            .map(|(y, p)| (y.as_str(), *p))
            .collect();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries.truncate(k);
        entries
    }

    fn normalize(&mut self) {
        let total = self.mass();
        if total > 0.0 && (total - 1.0).abs() > NORMALIZED_TOLERANCE {
            for weight in self.weights.values_mut() {
                *weight /= total;
            }
        }
    }
}

/// Probability fibre: point mass on leaf labels, outer-product merge,
/// first-two-token transposition under move.
#[derive(Debug, Clone, Default)]
pub struct ProbabilityFibre;

impl ProbabilityFibre {
    pub fn new() -> Self {
        Self
    }

    /// Whether a yield could arise on the source side of the map.
    ///
    /// Reference strategy: accept everything. A grammar-aware fibre
    /// would trace the map's node mapping against the source tree.
    fn compatible_yield(&self, _map: &TreeMap, _yield_str: &str) -> bool {
        true
    }

    /// Plausible supersequences of a yield in a wider context.
    ///
    /// Reference strategy: the yield itself, and the yield extended by
    /// a wildcard token on either side.
    fn supersequences(&self, yield_str: &str) -> Vec<String> {
        vec![
            yield_str.to_string(),
            format!("{yield_str} *"),
            format!("* {yield_str}"),
        ]
    }
}

impl Fibre for ProbabilityFibre {
    type Data = YieldDistribution;

    fn key(&self) -> &'static str {
        "probability"
    }

    fn pull(&self, map: &TreeMap, target: &Self::Data) -> Self::Data {
        if map.is_identity() {
            return target.clone();
        }

        let weights = target
            .weights()
            .iter()
            .filter(|(y, _)| self.compatible_yield(map, y))
            .map(|(y, p)| (y.clone(), *p))
            .collect();
        YieldDistribution::new(weights)
    }

    fn push(&self, map: &TreeMap, source: &Self::Data) -> Self::Data {
        if map.is_identity() {
            return source.clone();
        }

        let mut weights: BTreeMap<String, f64> = BTreeMap::new();
        for (yield_str, prob) in source.weights() {
            let supers = self.supersequences(yield_str);
            let share = prob / supers.len() as f64;
            for sup in supers {
                *weights.entry(sup).or_insert(0.0) += share;
            }
        }
        YieldDistribution::new(weights)
    }

    fn combine(&self, left: &Self::Data, right: &Self::Data, operation: &str) -> Self::Data {
        match operation {
            op::MOVE => {
                let mut weights: BTreeMap<String, f64> = BTreeMap::new();
                for (yield_str, prob) in left.weights() {
                    let tokens: Vec<&str> = yield_str.split_whitespace().collect();
                    if tokens.len() >= 2 {
                        let mut moved = vec![tokens[1], tokens[0]];
                        moved.extend_from_slice(&tokens[2..]);
                        *weights.entry(moved.join(" ")).or_insert(0.0) += prob * MOVE_SPLIT;
                        *weights.entry(yield_str.clone()).or_insert(0.0) +=
                            prob * (1.0 - MOVE_SPLIT);
                    } else {
                        *weights.entry(yield_str.clone()).or_insert(0.0) += prob;
                    }
                }
                YieldDistribution::new(weights)
            }
            // "merge" and the fallback for unrecognized operations:
            // outer product with space-joined yields.
            _ => {
                let mut weights: BTreeMap<String, f64> = BTreeMap::new();
                for (y1, p1) in left.weights() {
                    for (y2, p2) in right.weights() {
                        let joined = format!("{y1} {y2}").trim().to_string();
                        *weights.entry(joined).or_insert(0.0) += p1 * p2;
                    }
                }
                YieldDistribution::new(weights)
            }
        }
    }

    fn identity_data(&self, node: &TreeNode) -> Self::Data {
        if node.is_leaf() {
            YieldDistribution::point(node.label.clone())
        } else {
            // Unannotated internal node: unit mass on the empty yield,
            // the neutral element of the merge outer product.
            YieldDistribution::point("")
        }
    }
}
