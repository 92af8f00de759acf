//! Error types for Arbor kernel operations.

use crate::tree::{NodeId, TreeId};

/// Errors arising from invalid base-category operations.
///
/// Only two conditions are hard failures by design: composing maps whose
/// endpoints disagree, and substituting at a node that does not exist.
/// Everything else (malformed or partial morphisms handed to a fibre)
/// degrades gracefully inside the fibre.
#[derive(Debug, thiserror::Error)]
pub enum ArborError {
    /// Two maps cannot be composed: the left map's target is not the
    /// right map's source.
    #[error("non-composable maps: target {left_target} does not meet source {right_source}")]
    NonComposable {
        left_target: TreeId,
        right_source: TreeId,
    },

    /// A substitution target does not occur anywhere in the source tree.
    #[error("node {node} not found in tree {tree}")]
    NodeNotFound { tree: TreeId, node: NodeId },

    /// A tree identifier is not present in the registry.
    #[error("unknown tree: {0}")]
    UnknownTree(TreeId),

    /// A compositional build was asked to produce a tree from nothing.
    #[error("cannot build a tree from an empty token sequence")]
    EmptyInput,

    /// An annotation payload failed to encode or decode.
    #[error("annotation codec failure: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Which map well-formedness condition was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// A mapping key is not a node id of the source tree.
    DanglingSource,

    /// A mapping value is not a node id of the target tree.
    DanglingTarget,
}

/// A concrete well-formedness violation found while validating a map
/// against its endpoint trees.
///
/// Violations are diagnostics, never hard failures: a fibre receiving a
/// malformed map is expected to fall back to its own safe default.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MapViolation {
    pub kind: ViolationKind,
    pub node: NodeId,
    pub description: String,
}
