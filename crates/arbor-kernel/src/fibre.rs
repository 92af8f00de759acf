//! The fibre capability contract.
//!
//! A fibre assigns to each tree T an object of enrichment data F(T),
//! and to each map f: A → B a pull-back f*: F(B) → F(A) and a
//! push-forward f_*: F(A) → F(B). Combination derives a parent's data
//! from two children's data under a named structural operation.
//!
//! ## Laws
//!
//! Implementations must satisfy, up to data value equality:
//!
//! - **identity**: `pull(id, d) == d` for every identity map;
//! - **functoriality**: `pull(g∘f, d) == pull(f, pull(g, d))` for
//!   composable f, g.
//!
//! `push` is the covariant counterpart and need not invert `pull`:
//! information may be lost or approximated when extending data to a
//! larger context. Laws are checked by tests and by the orchestrator's
//! verification routine, never enforced at runtime.
//!
//! ## Error policy
//!
//! `pull` and `push` degrade gracefully on malformed or partial maps,
//! falling back to a fibre-specific safe default. They never fail hard;
//! the only hard failures in the system are non-composable maps and
//! missing substitution targets.

use crate::morphism::TreeMap;
use crate::tree::TreeNode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

/// Structural operation names recognized by the shipped fibres.
///
/// The set is open: `combine` must be total over arbitrary names, with
/// a defined fallback for names it does not recognize.
pub mod op {
    /// Concatenative composition of two sibling subtrees.
    pub const MERGE: &str = "merge";

    /// Displacement-like restructuring.
    pub const MOVE: &str = "move";
}

/// A pluggable enrichment strategy over derivation trees.
///
/// Each implementation owns its data representation; only the
/// operations are standardized. The serde bounds on `Data` let the
/// orchestrator store payloads type-erased as JSON values, keyed by the
/// stable identifier from [`Fibre::key`], never by a runtime type name.
pub trait Fibre {
    /// The enrichment data attached to a single tree.
    type Data: Clone + PartialEq + Debug + Serialize + DeserializeOwned;

    /// Stable identifier used as the annotation-store key.
    fn key(&self) -> &'static str;

    /// Pull data attached to the map's target back to its source.
    fn pull(&self, map: &TreeMap, target: &Self::Data) -> Self::Data;

    /// Push data attached to the map's source forward to its target.
    fn push(&self, map: &TreeMap, source: &Self::Data) -> Self::Data;

    /// Derive a parent's data from two children's data under the named
    /// structural operation. Total: unrecognized names take a
    /// fibre-specific fallback.
    fn combine(&self, left: &Self::Data, right: &Self::Data, operation: &str) -> Self::Data;

    /// Neutral/base data for a single node with no existing annotation.
    fn identity_data(&self, node: &TreeNode) -> Self::Data;
}
