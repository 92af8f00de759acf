//! The fibration registry and its coherence-preserving operations.
//!
//! [`Fibration`] owns three stores: registered trees, registered maps,
//! and per-tree fibre annotations. On top of them it offers:
//!
//! - **compositional build**: a tree grown bottom-up from a token
//!   sequence while fibre data accumulates at every reduction step;
//! - **substitution**: a rebuilt tree whose existing annotations are
//!   pulled back along the induced map instead of being recomputed;
//! - **functoriality verification**: a diagnostic for fibre authors.
//!
//! Annotation payloads are stored type-erased as JSON values, keyed by
//! each fibre's stable identifier (optionally qualified per instance),
//! so independent fibres, and independent instances of one fibre,
//! annotate the same tree without clashing.

use arbor_kernel::{ArborError, Fibre, NodeId, TreeId, TreeMap, TreeNode, op};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// The orchestrator's registry: trees, maps, annotations, and the
/// sequence that mints fresh node identifiers.
#[derive(Debug, Default)]
pub struct Fibration {
    trees: BTreeMap<TreeId, TreeNode>,
    maps: BTreeMap<(TreeId, TreeId), TreeMap>,
    annotations: BTreeMap<TreeId, BTreeMap<String, Value>>,
    id_seq: u64,
}

impl Fibration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint the next identifier index.
    ///
    /// Node identity is always sequence-derived, never taken from
    /// in-memory object identity, so registry contents are
    /// deterministic given the call history.
    fn next_seq(&mut self) -> u64 {
        let seq = self.id_seq;
        self.id_seq += 1;
        seq
    }

    /// Register a tree under the id of its root.
    ///
    /// Idempotent when re-registering an identical structure under the
    /// same id; a different structure under the same id overwrites
    /// (explicit re-registration wins).
    pub fn register_tree(&mut self, tree: TreeNode) -> TreeId {
        let id = TreeId::of_root(&tree);
        if let Some(existing) = self.trees.get(&id) {
            if existing.structure_hash() == tree.structure_hash() {
                return id;
            }
        }
        debug!(tree = %id, nodes = tree.size(), "registered tree");
        self.trees.insert(id.clone(), tree);
        id
    }

    /// Look up a registered tree.
    pub fn tree(&self, id: &TreeId) -> Option<&TreeNode> {
        self.trees.get(id)
    }

    /// Register a map keyed by its (source, target) endpoints. The most
    /// recent registration for a pair replaces the prior one.
    pub fn register_map(&mut self, map: TreeMap) {
        debug!(source = %map.source, target = %map.target, "registered map");
        self.maps
            .insert((map.source.clone(), map.target.clone()), map);
    }

    /// Look up the registered map for a (source, target) pair.
    pub fn map(&self, source: &TreeId, target: &TreeId) -> Option<&TreeMap> {
        self.maps.get(&(source.clone(), target.clone()))
    }

    /// All registered trees, keyed by id.
    pub fn trees(&self) -> &BTreeMap<TreeId, TreeNode> {
        &self.trees
    }

    /// All registered maps, keyed by endpoints.
    pub fn maps(&self) -> &BTreeMap<(TreeId, TreeId), TreeMap> {
        &self.maps
    }

    /// The raw annotation store.
    pub fn annotations(&self) -> &BTreeMap<TreeId, BTreeMap<String, Value>> {
        &self.annotations
    }

    fn annotation_key<F: Fibre>(fibre: &F, instance: Option<&str>) -> String {
        match instance {
            Some(qualifier) => format!("{}:{qualifier}", fibre.key()),
            None => fibre.key().to_string(),
        }
    }

    /// Attach fibre data to a tree under the fibre's qualified key.
    ///
    /// Overwrites any existing entry for the exact same qualified key;
    /// entries are never overwritten any other way.
    pub fn annotate<F: Fibre>(
        &mut self,
        tree_id: &TreeId,
        fibre: &F,
        data: &F::Data,
        instance: Option<&str>,
    ) -> Result<(), ArborError> {
        let key = Self::annotation_key(fibre, instance);
        let payload = serde_json::to_value(data)?;
        debug!(tree = %tree_id, key = %key, "annotated tree");
        self.annotations
            .entry(tree_id.clone())
            .or_default()
            .insert(key, payload);
        Ok(())
    }

    /// Retrieve fibre data for a tree, if present.
    pub fn get_annotation<F: Fibre>(
        &self,
        tree_id: &TreeId,
        fibre: &F,
        instance: Option<&str>,
    ) -> Result<Option<F::Data>, ArborError> {
        let key = Self::annotation_key(fibre, instance);
        match self.annotations.get(tree_id).and_then(|per| per.get(&key)) {
            Some(payload) => Ok(Some(serde_json::from_value(payload.clone())?)),
            None => Ok(None),
        }
    }

    /// Build a tree bottom-up from a token sequence, computing fibre
    /// data at every reduction step.
    ///
    /// One leaf per token; adjacent nodes pair left-to-right within a
    /// level under a `"merge"` parent (an odd leftover carries into the
    /// next level), with two child→parent maps registered per pair.
    /// Unannotated children receive `identity_data`; each parent
    /// receives `combine(left, right, "merge")`. The resulting tree is
    /// balanced by construction with height ⌈log₂ n⌉: a placeholder
    /// structural strategy, not a grammatical parse.
    pub fn compose_tokens<F: Fibre>(
        &mut self,
        tokens: &[&str],
        fibre: &F,
    ) -> Result<(TreeNode, F::Data), ArborError> {
        if tokens.is_empty() {
            return Err(ArborError::EmptyInput);
        }

        let mut level: Vec<TreeNode> = Vec::with_capacity(tokens.len());
        for token in tokens {
            let leaf = TreeNode::leaf(format!("n{}", self.next_seq()), *token);
            self.register_tree(leaf.clone());
            level.push(leaf);
        }

        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            let mut nodes = level.into_iter();

            while let Some(left) = nodes.next() {
                let Some(right) = nodes.next() else {
                    // Odd leftover: carried forward unpaired.
                    next.push(left);
                    break;
                };

                let parent = TreeNode::branch(
                    format!("n{}", self.next_seq()),
                    "merge",
                    vec![left.clone(), right.clone()],
                );
                self.register_tree(parent.clone());

                let parent_id = TreeId::of_root(&parent);
                for child in [&left, &right] {
                    let child_id = TreeId::of_root(child);
                    self.register_map(TreeMap::new(
                        child_id,
                        parent_id.clone(),
                        [(child.id.clone(), parent.id.clone())].into_iter().collect(),
                    ));
                }

                let left_data = self.child_data(&left, fibre)?;
                let right_data = self.child_data(&right, fibre)?;
                let parent_data = fibre.combine(&left_data, &right_data, op::MERGE);
                self.annotate(&parent_id, fibre, &parent_data, None)?;

                next.push(parent);
            }

            level = next;
        }

        let root = level.remove(0);
        let root_id = TreeId::of_root(&root);
        let root_data = match self.get_annotation(&root_id, fibre, None)? {
            Some(data) => data,
            None => {
                // Single-token input: the leaf is the root and was
                // never paired.
                let data = fibre.identity_data(&root);
                self.annotate(&root_id, fibre, &data, None)?;
                data
            }
        };

        info!(
            tokens = tokens.len(),
            root = %root_id,
            height = root.height(),
            "composed tree bottom-up"
        );
        Ok((root, root_data))
    }

    /// A child's stored data, or freshly stored `identity_data`.
    fn child_data<F: Fibre>(
        &mut self,
        child: &TreeNode,
        fibre: &F,
    ) -> Result<F::Data, ArborError> {
        let child_id = TreeId::of_root(child);
        if let Some(data) = self.get_annotation(&child_id, fibre, None)? {
            return Ok(data);
        }
        let data = fibre.identity_data(child);
        self.annotate(&child_id, fibre, &data, None)?;
        Ok(data)
    }

    /// Rebuild a registered tree with `replacement` in place of the
    /// first depth-first, children-in-order occurrence of
    /// `target_node_id`, pulling existing fibre data back along the
    /// induced map.
    ///
    /// Hard failures: `UnknownTree` when `tree_id` is unregistered,
    /// `NodeNotFound` when the target occurs nowhere in the tree.
    pub fn substitute<F: Fibre>(
        &mut self,
        tree_id: &TreeId,
        target_node_id: &NodeId,
        replacement: &TreeNode,
        fibre: &F,
    ) -> Result<(TreeNode, F::Data), ArborError> {
        let original = self
            .trees
            .get(tree_id)
            .cloned()
            .ok_or_else(|| ArborError::UnknownTree(tree_id.clone()))?;

        if !original.contains(target_node_id) {
            return Err(ArborError::NodeNotFound {
                tree: tree_id.clone(),
                node: target_node_id.clone(),
            });
        }

        let mut replaced = false;
        let mut new_tree = replace_first(&original, target_node_id, replacement, &mut replaced);
        new_tree.id = NodeId::new(format!("{}_s{}", tree_id, self.next_seq()));
        let new_id = self.register_tree(new_tree.clone());

        // New → original: every surviving node maps to itself, and the
        // derived root maps to the original root. Nodes introduced by
        // the replacement have no counterpart and stay unmapped.
        let original_ids: std::collections::BTreeSet<NodeId> =
            original.node_ids().into_iter().collect();
        let mut nodes: BTreeMap<NodeId, NodeId> = new_tree
            .node_ids()
            .into_iter()
            .filter(|n| original_ids.contains(n))
            .map(|n| (n.clone(), n))
            .collect();
        nodes.insert(new_tree.id.clone(), NodeId::new(tree_id.0.clone()));

        let map = TreeMap::new(new_id.clone(), tree_id.clone(), nodes);
        self.register_map(map.clone());

        let new_data = match self.get_annotation(tree_id, fibre, None)? {
            Some(original_data) => fibre.pull(&map, &original_data),
            None => fibre.identity_data(&new_tree),
        };
        self.annotate(&new_id, fibre, &new_data, None)?;

        info!(original = %tree_id, derived = %new_id, target = %target_node_id, "substituted subtree");
        Ok((new_tree, new_data))
    }

    /// Check the pull-back coherence law for composable maps
    /// f: A → B, g: B → C and data over C:
    ///
    /// ```text
    /// pull(g∘f, data) == pull(f, pull(g, data))
    /// ```
    ///
    /// A property-check utility for fibre authors, not a runtime gate.
    /// Fails hard only when the maps do not compose.
    pub fn verify_functoriality<F: Fibre>(
        &self,
        f: &TreeMap,
        g: &TreeMap,
        fibre: &F,
        data: &F::Data,
    ) -> Result<bool, ArborError> {
        let gf = f.compose(g)?;
        let composite = fibre.pull(&gf, data);
        let stepwise = fibre.pull(f, &fibre.pull(g, data));
        Ok(composite == stepwise)
    }
}

/// Replace the first pre-order occurrence of `target`, cloning
/// everything else.
fn replace_first(
    node: &TreeNode,
    target: &NodeId,
    replacement: &TreeNode,
    replaced: &mut bool,
) -> TreeNode {
    if !*replaced && node.id == *target {
        *replaced = true;
        return replacement.clone();
    }
    TreeNode {
        id: node.id.clone(),
        label: node.label.clone(),
        children: node
            .children
            .iter()
            .map(|child| replace_first(child, target, replacement, replaced))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_fibres::{ProbabilityFibre, YieldDistribution};

    #[test]
    fn annotate_then_get_roundtrips() {
        let mut fib = Fibration::new();
        let fibre = ProbabilityFibre::new();
        let tree = TreeNode::leaf("t0", "student");
        let id = fib.register_tree(tree);

        let data = YieldDistribution::point("student");
        fib.annotate(&id, &fibre, &data, None).unwrap();

        let stored = fib.get_annotation(&id, &fibre, None).unwrap().unwrap();
        assert_eq!(stored, data);
    }

    #[test]
    fn get_annotation_is_absent_before_annotate() {
        let fib = Fibration::new();
        let fibre = ProbabilityFibre::new();
        assert!(
            fib.get_annotation(&TreeId::new("missing"), &fibre, None)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn reannotation_overwrites_same_qualified_key() {
        let mut fib = Fibration::new();
        let fibre = ProbabilityFibre::new();
        let id = fib.register_tree(TreeNode::leaf("t0", "x"));

        fib.annotate(&id, &fibre, &YieldDistribution::point("a"), None)
            .unwrap();
        fib.annotate(&id, &fibre, &YieldDistribution::point("b"), None)
            .unwrap();

        let stored = fib.get_annotation(&id, &fibre, None).unwrap().unwrap();
        assert_eq!(stored, YieldDistribution::point("b"));
    }

    #[test]
    fn instance_qualifiers_keep_annotations_apart() {
        let mut fib = Fibration::new();
        let fibre = ProbabilityFibre::new();
        let id = fib.register_tree(TreeNode::leaf("t0", "x"));

        fib.annotate(&id, &fibre, &YieldDistribution::point("first"), Some("left"))
            .unwrap();
        fib.annotate(
            &id,
            &fibre,
            &YieldDistribution::point("second"),
            Some("right"),
        )
        .unwrap();

        assert_eq!(
            fib.get_annotation(&id, &fibre, Some("left"))
                .unwrap()
                .unwrap(),
            YieldDistribution::point("first")
        );
        assert_eq!(
            fib.get_annotation(&id, &fibre, Some("right"))
                .unwrap()
                .unwrap(),
            YieldDistribution::point("second")
        );
        assert!(fib.get_annotation(&id, &fibre, None).unwrap().is_none());
    }

    #[test]
    fn register_tree_is_idempotent_for_identical_structure() {
        let mut fib = Fibration::new();
        let tree = TreeNode::leaf("t0", "x");
        let first = fib.register_tree(tree.clone());
        let second = fib.register_tree(tree);
        assert_eq!(first, second);
        assert_eq!(fib.trees().len(), 1);
    }

    #[test]
    fn register_map_replaces_prior_entry_for_same_pair() {
        let mut fib = Fibration::new();
        let a = TreeId::new("a");
        let b = TreeId::new("b");

        fib.register_map(TreeMap::new(a.clone(), b.clone(), BTreeMap::new()));
        let richer = TreeMap::new(
            a.clone(),
            b.clone(),
            [(NodeId::new("a"), NodeId::new("b"))].into_iter().collect(),
        );
        fib.register_map(richer.clone());

        assert_eq!(fib.map(&a, &b), Some(&richer));
        assert_eq!(fib.maps().len(), 1);
    }

    #[test]
    fn compose_tokens_rejects_empty_input() {
        let mut fib = Fibration::new();
        let fibre = ProbabilityFibre::new();
        match fib.compose_tokens(&[], &fibre) {
            Err(ArborError::EmptyInput) => {}
            other => panic!("expected EmptyInput, got {other:?}"),
        }
    }

    #[test]
    fn compose_tokens_single_token_returns_leaf() {
        let mut fib = Fibration::new();
        let fibre = ProbabilityFibre::new();
        let (root, data) = fib.compose_tokens(&["student"], &fibre).unwrap();

        assert!(root.is_leaf());
        assert_eq!(data, YieldDistribution::point("student"));
    }

    #[test]
    fn compose_tokens_builds_balanced_tree() {
        let mut fib = Fibration::new();
        let fibre = ProbabilityFibre::new();
        let (root, _) = fib
            .compose_tokens(&["a", "b", "c", "d", "e"], &fibre)
            .unwrap();

        assert_eq!(root.yield_tokens(), vec!["a", "b", "c", "d", "e"]);
        // ⌈log2(5)⌉ = 3.
        assert_eq!(root.height(), 3);
    }

    #[test]
    fn compose_tokens_registers_child_parent_maps() {
        let mut fib = Fibration::new();
        let fibre = ProbabilityFibre::new();
        let (root, _) = fib.compose_tokens(&["a", "b"], &fibre).unwrap();

        let root_id = TreeId::of_root(&root);
        for child in &root.children {
            let child_id = TreeId::of_root(child);
            let map = fib.map(&child_id, &root_id).expect("child map registered");
            assert_eq!(map.nodes[&child.id], root.id);
        }
    }

    #[test]
    fn substitute_unknown_tree_fails() {
        let mut fib = Fibration::new();
        let fibre = ProbabilityFibre::new();
        let replacement = TreeNode::leaf("r", "teacher");

        match fib.substitute(
            &TreeId::new("ghost"),
            &NodeId::new("n"),
            &replacement,
            &fibre,
        ) {
            Err(ArborError::UnknownTree(id)) => assert_eq!(id, TreeId::new("ghost")),
            other => panic!("expected UnknownTree, got {other:?}"),
        }
    }

    #[test]
    fn substitute_missing_target_fails() {
        let mut fib = Fibration::new();
        let fibre = ProbabilityFibre::new();
        let (root, _) = fib.compose_tokens(&["the", "student"], &fibre).unwrap();
        let root_id = TreeId::of_root(&root);

        match fib.substitute(
            &root_id,
            &NodeId::new("missing"),
            &TreeNode::leaf("r", "teacher"),
            &fibre,
        ) {
            Err(ArborError::NodeNotFound { tree, node }) => {
                assert_eq!(tree, root_id);
                assert_eq!(node, NodeId::new("missing"));
            }
            other => panic!("expected NodeNotFound, got {other:?}"),
        }
    }

    #[test]
    fn substitute_replaces_leaf_and_pulls_data() {
        let mut fib = Fibration::new();
        let fibre = ProbabilityFibre::new();
        let (root, _) = fib.compose_tokens(&["the", "student"], &fibre).unwrap();
        let root_id = TreeId::of_root(&root);
        let student_id = root.children[1].id.clone();

        let replacement = TreeNode::leaf("r0", "teacher");
        let (new_tree, new_data) = fib
            .substitute(&root_id, &student_id, &replacement, &fibre)
            .unwrap();

        assert_eq!(new_tree.yield_tokens(), vec!["the", "teacher"]);
        // Pulled distribution stays normalized.
        assert!((new_data.mass() - 1.0).abs() < 1e-9);
        // The derived tree and the map back to the original are registered.
        let new_id = TreeId::of_root(&new_tree);
        assert!(fib.tree(&new_id).is_some());
        assert!(fib.map(&new_id, &root_id).is_some());
    }

    #[test]
    fn substitute_with_identical_subtree_preserves_structure() {
        let mut fib = Fibration::new();
        let fibre = ProbabilityFibre::new();
        let (root, _) = fib.compose_tokens(&["the", "student"], &fibre).unwrap();
        let root_id = TreeId::of_root(&root);

        let original_leaf = root.children[1].clone();
        let (new_tree, _) = fib
            .substitute(&root_id, &original_leaf.id, &original_leaf, &fibre)
            .unwrap();

        assert_eq!(new_tree.structure_hash(), root.structure_hash());
    }

    #[test]
    fn substitute_replaces_only_first_match() {
        let mut fib = Fibration::new();
        let fibre = ProbabilityFibre::new();

        // Two distinct nodes sharing an id: the rebuild must stop after
        // the first depth-first occurrence.
        let tree = TreeNode::branch(
            "root",
            "merge",
            vec![TreeNode::leaf("dup", "first"), TreeNode::leaf("dup", "second")],
        );
        let id = fib.register_tree(tree);

        let (new_tree, _) = fib
            .substitute(
                &id,
                &NodeId::new("dup"),
                &TreeNode::leaf("fresh", "replaced"),
                &fibre,
            )
            .unwrap();

        assert_eq!(new_tree.yield_tokens(), vec!["replaced", "second"]);
    }

    #[test]
    fn verify_functoriality_rejects_non_composable_maps() {
        let fib = Fibration::new();
        let fibre = ProbabilityFibre::new();
        let f = TreeMap::new(TreeId::new("a"), TreeId::new("b"), BTreeMap::new());
        let g = TreeMap::new(TreeId::new("x"), TreeId::new("c"), BTreeMap::new());

        assert!(matches!(
            fib.verify_functoriality(&f, &g, &fibre, &YieldDistribution::point("d")),
            Err(ArborError::NonComposable { .. })
        ));
    }
}
