//! Structure-preserving maps: the morphisms of the base category.
//!
//! A [`TreeMap`] is a directed relation from a source tree to a target
//! tree carrying a node-id-to-node-id mapping. Every map induces a
//! reindexing operation on enrichment data: pulling data attached to
//! the target back to the source, or pushing source data forward.
//!
//! Maps compose when the left map's target is the right map's source;
//! the composed node mapping is functional composition restricted to
//! nodes reachable through both. Composition is associative and has
//! identity maps as two-sided units.

use crate::error::{ArborError, MapViolation, ViolationKind};
use crate::tree::{NodeId, TreeId, TreeNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A morphism f: source → target in the category of derivation trees.
///
/// The node mapping may be partial: nodes of the source with no
/// counterpart in the target are simply absent. Partiality is ordinary:
/// composition already restricts to nodes reachable through both maps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeMap {
    /// Source tree (where pulled-back data lands).
    pub source: TreeId,

    /// Target tree (where pushed-forward data lands).
    pub target: TreeId,

    /// Node-id-to-node-id mapping, source to target.
    pub nodes: BTreeMap<NodeId, NodeId>,
}

impl TreeMap {
    /// Create a map with an explicit node mapping.
    pub fn new(source: TreeId, target: TreeId, nodes: BTreeMap<NodeId, NodeId>) -> Self {
        Self {
            source,
            target,
            nodes,
        }
    }

    /// The identity map on a tree: every node maps to itself.
    pub fn identity(tree: &TreeNode) -> Self {
        let id = TreeId::of_root(tree);
        let nodes = tree
            .node_ids()
            .into_iter()
            .map(|n| (n.clone(), n))
            .collect();
        Self {
            source: id.clone(),
            target: id,
            nodes,
        }
    }

    /// Whether this map is an identity: same endpoints, and every entry
    /// maps a node to itself.
    pub fn is_identity(&self) -> bool {
        self.source == self.target && self.nodes.iter().all(|(k, v)| k == v)
    }

    /// Compose `self: A → B` with `other: B → C`, yielding `A → C`.
    ///
    /// Fails when `self.target != other.source`. The composed mapping
    /// contains exactly the source nodes whose image under `self` is in
    /// turn mapped by `other`.
    pub fn compose(&self, other: &TreeMap) -> Result<TreeMap, ArborError> {
        if self.target != other.source {
            return Err(ArborError::NonComposable {
                left_target: self.target.clone(),
                right_source: other.source.clone(),
            });
        }

        let nodes = self
            .nodes
            .iter()
            .filter_map(|(src, mid)| {
                other
                    .nodes
                    .get(mid)
                    .map(|tgt| (src.clone(), tgt.clone()))
            })
            .collect();

        Ok(TreeMap {
            source: self.source.clone(),
            target: other.target.clone(),
            nodes,
        })
    }

    /// Validate this map against its endpoint trees.
    ///
    /// Every mapping key must be a node id of `source`, every value a
    /// node id of `target`. Violations are diagnostics, never hard
    /// failures; a fibre receiving a malformed map falls back to its
    /// own safe default.
    pub fn validate(&self, source: &TreeNode, target: &TreeNode) -> Vec<MapViolation> {
        let mut violations = Vec::new();

        for (from, to) in &self.nodes {
            if !source.contains(from) {
                violations.push(MapViolation {
                    kind: ViolationKind::DanglingSource,
                    node: from.clone(),
                    description: format!("{from} is not a node of source tree {}", self.source),
                });
            }
            if !target.contains(to) {
                violations.push(MapViolation {
                    kind: ViolationKind::DanglingTarget,
                    node: to.clone(),
                    description: format!("{to} is not a node of target tree {}", self.target),
                });
            }
        }

        violations
    }
}
