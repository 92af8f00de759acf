//! Proof fibre: named verification obligations with status.
//!
//! Enriches trees with formal-verification bookkeeping: a map from
//! property names to obligations, plus a set of tree-wide invariants.
//! Combination weakens, never strengthens: a parent is at most as
//! verified as its least-verified child.

use arbor_kernel::{Fibre, TreeMap, TreeNode, op};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Invariants that survive pull-back along a non-identity map.
///
/// Everything else is judged local to the target side and dropped.
const STRUCTURAL_INVARIANTS: &[&str] = &["well_formed", "feature_checked"];

/// Status of a single proof obligation.
///
/// Ordered by strength: `Failed < Pending < Assumed < Proven`. The
/// derived `Ord` is what makes "weaker of the two" a plain `min`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ObligationStatus {
    Failed,
    Pending,
    Assumed,
    Proven,
}

impl ObligationStatus {
    /// The weaker of two statuses.
    pub fn weaker(self, other: Self) -> Self {
        self.min(other)
    }
}

/// A single named proof obligation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
    /// The property being claimed.
    pub property: String,

    /// Current verification status.
    pub status: ObligationStatus,

    /// Human-readable provenance of the status.
    pub evidence: Option<String>,

    /// Named prerequisites this obligation depends on.
    pub dependencies: Vec<String>,
}

impl Obligation {
    pub fn new(property: impl Into<String>, status: ObligationStatus) -> Self {
        Self {
            property: property.into(),
            status,
            evidence: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }
}

/// Proof data attached to a tree: obligations keyed by name, plus
/// tree-wide invariants.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProofData {
    pub obligations: BTreeMap<String, Obligation>,
    pub invariants: BTreeSet<String>,
}

impl ProofData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_obligation(&mut self, name: impl Into<String>, obligation: Obligation) {
        self.obligations.insert(name.into(), obligation);
    }

    pub fn add_invariant(&mut self, invariant: impl Into<String>) {
        self.invariants.insert(invariant.into());
    }

    /// Whether every obligation is proven.
    pub fn is_fully_verified(&self) -> bool {
        self.obligations
            .values()
            .all(|ob| ob.status == ObligationStatus::Proven)
    }

    /// Names of obligations still pending.
    pub fn pending(&self) -> Vec<&str> {
        self.obligations
            .iter()
            .filter(|(_, ob)| ob.status == ObligationStatus::Pending)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Proof fibre: weaker-status merge, pending-demotion move, structural
/// invariant filtering under pull, proven-to-assumed weakening under
/// push.
#[derive(Debug, Clone, Default)]
pub struct ProofFibre;

impl ProofFibre {
    pub fn new() -> Self {
        Self
    }

    /// Whether an obligation is structurally relevant to the source
    /// side of a map.
    ///
    /// Reference strategy: accept everything. A grammar-aware fibre
    /// would inspect the map's node mapping.
    fn obligation_relevant(&self, _map: &TreeMap, _obligation: &Obligation) -> bool {
        true
    }
}

impl Fibre for ProofFibre {
    type Data = ProofData;

    fn key(&self) -> &'static str {
        "proof"
    }

    fn pull(&self, map: &TreeMap, target: &Self::Data) -> Self::Data {
        if map.is_identity() {
            return target.clone();
        }

        let mut pulled = ProofData::new();

        for inv in &target.invariants {
            if STRUCTURAL_INVARIANTS.contains(&inv.as_str()) {
                pulled.add_invariant(inv.clone());
            }
        }

        for (name, obligation) in &target.obligations {
            if self.obligation_relevant(map, obligation) {
                pulled.add_obligation(name.clone(), obligation.clone());
            }
        }

        pulled
    }

    fn push(&self, map: &TreeMap, source: &Self::Data) -> Self::Data {
        if map.is_identity() {
            return source.clone();
        }

        let mut pushed = ProofData::new();
        pushed.invariants = source.invariants.clone();

        let traversal = format!("map:{}->{}", map.source, map.target);
        for (name, obligation) in &source.obligations {
            let mut weakened = obligation.clone();
            if weakened.status == ObligationStatus::Proven {
                weakened.status = ObligationStatus::Assumed;
            }
            weakened.dependencies.push(traversal.clone());
            pushed.add_obligation(name.clone(), weakened);
        }

        pushed
    }

    fn combine(&self, left: &Self::Data, right: &Self::Data, operation: &str) -> Self::Data {
        match operation {
            op::MOVE => {
                let mut combined = ProofData::new();
                combined.invariants = left.invariants.clone();

                // Everything inherited must be re-verified after
                // restructuring.
                for (name, obligation) in &left.obligations {
                    let mut demoted = obligation.clone();
                    demoted.status = ObligationStatus::Pending;
                    demoted.dependencies.push("movement_licensed".to_string());
                    combined.add_obligation(name.clone(), demoted);
                }

                combined.add_obligation(
                    "movement_licensed",
                    Obligation::new("movement_licensed", ObligationStatus::Pending)
                        .with_evidence("requires checking movement features"),
                );
                combined
            }
            // "merge" and the fallback for unrecognized operations.
            _ => {
                let mut combined = ProofData::new();
                combined.invariants = left
                    .invariants
                    .intersection(&right.invariants)
                    .cloned()
                    .collect();

                for (name, ob_left) in &left.obligations {
                    match right.obligations.get(name) {
                        Some(ob_right) => {
                            let mut merged = ob_left.clone();
                            merged.status = ob_left.status.weaker(ob_right.status);
                            merged
                                .dependencies
                                .extend(ob_right.dependencies.iter().cloned());
                            combined.add_obligation(name.clone(), merged);
                        }
                        None => combined.add_obligation(name.clone(), ob_left.clone()),
                    }
                }

                for (name, ob_right) in &right.obligations {
                    if !combined.obligations.contains_key(name) {
                        combined.add_obligation(name.clone(), ob_right.clone());
                    }
                }

                combined.add_obligation(
                    "merge_well_formed",
                    Obligation::new("merge_well_formed", ObligationStatus::Pending)
                        .with_evidence("requires checking merge conditions"),
                );
                combined
            }
        }
    }

    fn identity_data(&self, node: &TreeNode) -> Self::Data {
        let mut data = ProofData::new();

        if node.is_leaf() {
            data.add_obligation(
                "well_formed",
                Obligation::new("well_formed", ObligationStatus::Proven)
                    .with_evidence("leaf nodes are trivially well-formed"),
            );
            data.add_invariant("is_leaf");
        } else {
            data.add_obligation(
                "well_formed",
                Obligation::new("well_formed", ObligationStatus::Pending)
                    .with_evidence(format!("well-formedness of {}", node.id)),
            );
        }

        data
    }
}
