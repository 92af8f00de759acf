//! Derivation trees: the objects of the base category.
//!
//! A tree node carries a label (a terminal token, or a structural tag
//! such as `"merge"`) and owns an ordered sequence of children. Nodes
//! are immutable once constructed; building a larger tree creates new
//! parent nodes that own their children outright, so cycles cannot be
//! constructed bottom-up.
//!
//! Identity is explicit: every node carries a caller-supplied [`NodeId`],
//! and a whole tree is addressed by the id of its root. Identifiers are
//! never derived from in-memory object identity: the orchestrator hands
//! out sequence-derived ids, and [`TreeNode::structure_hash`] provides a
//! content-addressed fingerprint when structural sameness matters.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identifier for a single tree node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a whole tree.
///
/// A tree is addressed by the id of its root node; the newtype keeps
/// registry keys and node-mapping entries from being confused.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TreeId(pub String);

impl TreeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The tree id of the tree rooted at `node`.
    pub fn of_root(node: &TreeNode) -> Self {
        Self(node.id.0.clone())
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A content-addressed fingerprint of a tree's labels and shape.
///
/// Node ids are excluded: two trees built at different times with the
/// same labels in the same arrangement hash identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructureHash(pub String);

impl fmt::Display for StructureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One node of a derivation tree.
///
/// A node with no children is a leaf (terminal). Internal nodes carry a
/// structural tag as their label (`"merge"` for the placeholder
/// bottom-up composition).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Unique identifier within the registry that owns this tree.
    pub id: NodeId,

    /// Terminal token or structural tag.
    pub label: String,

    /// Ordered children; empty for leaves.
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Construct a leaf node.
    pub fn leaf(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(id),
            label: label.into(),
            children: Vec::new(),
        }
    }

    /// Construct an internal node owning the given children.
    pub fn branch(
        id: impl Into<String>,
        label: impl Into<String>,
        children: Vec<TreeNode>,
    ) -> Self {
        Self {
            id: NodeId::new(id),
            label: label.into(),
            children,
        }
    }

    /// Whether this node is a terminal.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// All node ids in depth-first, children-in-order traversal,
    /// starting with this node's own id.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids(&self, out: &mut Vec<NodeId>) {
        out.push(self.id.clone());
        for child in &self.children {
            child.collect_ids(out);
        }
    }

    /// Whether a node with the given id occurs anywhere in this tree.
    pub fn contains(&self, node: &NodeId) -> bool {
        if &self.id == node {
            return true;
        }
        self.children.iter().any(|c| c.contains(node))
    }

    /// Find a node by id (depth-first, children in order).
    pub fn find(&self, node: &NodeId) -> Option<&TreeNode> {
        if &self.id == node {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(node))
    }

    /// The terminal labels, left to right.
    pub fn yield_tokens(&self) -> Vec<&str> {
        let mut tokens = Vec::new();
        self.collect_yield(&mut tokens);
        tokens
    }

    fn collect_yield<'a>(&'a self, out: &mut Vec<&'a str>) {
        if self.is_leaf() {
            out.push(self.label.as_str());
        }
        for child in &self.children {
            child.collect_yield(out);
        }
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeNode::size).sum::<usize>()
    }

    /// Height of the tree (a leaf has height 0).
    pub fn height(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.height())
            .max()
            .unwrap_or(0)
    }

    /// Content-addressed fingerprint of labels and shape.
    ///
    /// Feeds labels in traversal order with explicit open/close markers
    /// so that shape differences always change the hash. Ids are
    /// excluded deliberately.
    pub fn structure_hash(&self) -> StructureHash {
        let mut hasher = Sha256::new();
        self.feed_structure(&mut hasher);
        let hash = hasher.finalize();
        StructureHash(format!("{hash:x}"))
    }

    fn feed_structure(&self, hasher: &mut Sha256) {
        hasher.update(b"(");
        hasher.update(self.label.as_bytes());
        for child in &self.children {
            child.feed_structure(hasher);
        }
        hasher.update(b")");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> TreeNode {
        TreeNode::branch(
            "root",
            "merge",
            vec![
                TreeNode::branch(
                    "np",
                    "merge",
                    vec![
                        TreeNode::leaf("det", "the"),
                        TreeNode::leaf("n", "student"),
                    ],
                ),
                TreeNode::leaf("v", "left"),
            ],
        )
    }

    #[test]
    fn leaf_construction() {
        let leaf = TreeNode::leaf("l0", "the");
        assert!(leaf.is_leaf());
        assert_eq!(leaf.size(), 1);
        assert_eq!(leaf.height(), 0);
    }

    #[test]
    fn depth_first_ids_children_in_order() {
        let ids: Vec<String> = sample_tree().node_ids().into_iter().map(|n| n.0).collect();
        assert_eq!(ids, vec!["root", "np", "det", "n", "v"]);
    }

    #[test]
    fn yield_is_left_to_right() {
        assert_eq!(sample_tree().yield_tokens(), vec!["the", "student", "left"]);
    }

    #[test]
    fn contains_and_find() {
        let tree = sample_tree();
        assert!(tree.contains(&NodeId::new("n")));
        assert!(!tree.contains(&NodeId::new("missing")));
        assert_eq!(tree.find(&NodeId::new("n")).unwrap().label, "student");
    }

    #[test]
    fn structure_hash_ignores_ids() {
        let a = TreeNode::branch(
            "a",
            "merge",
            vec![TreeNode::leaf("x", "the"), TreeNode::leaf("y", "cat")],
        );
        let b = TreeNode::branch(
            "b",
            "merge",
            vec![TreeNode::leaf("p", "the"), TreeNode::leaf("q", "cat")],
        );
        assert_eq!(a.structure_hash(), b.structure_hash());
    }

    #[test]
    fn structure_hash_sensitive_to_shape() {
        // Same labels in traversal order, different nesting.
        let flat = TreeNode::branch(
            "a",
            "merge",
            vec![
                TreeNode::leaf("x", "a"),
                TreeNode::leaf("y", "b"),
                TreeNode::leaf("z", "c"),
            ],
        );
        let nested = TreeNode::branch(
            "a",
            "merge",
            vec![
                TreeNode::branch(
                    "m",
                    "merge",
                    vec![TreeNode::leaf("x", "a"), TreeNode::leaf("y", "b")],
                ),
                TreeNode::leaf("z", "c"),
            ],
        );
        assert_ne!(flat.structure_hash(), nested.structure_hash());
    }

    #[test]
    fn structure_hash_sensitive_to_labels() {
        let a = TreeNode::leaf("x", "student");
        let b = TreeNode::leaf("x", "teacher");
        assert_ne!(a.structure_hash(), b.structure_hash());
    }
}
