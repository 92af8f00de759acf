//! # Arbor Kernel
//!
//! The base category of derivation trees, and the capability contract
//! that enrichment strategies ("fibres") must satisfy to ride along tree
//! transformations coherently.
//!
//! This crate is **fibre-agnostic**: it does not prescribe what
//! enrichment data is (probability mass, vectors, proof obligations,
//! relevance scores, …). It only prescribes how data must behave under
//! pull-back, push-forward, and binary combination.
//!
//! ## Architecture
//!
//! ```text
//! TreeNode               ← Objects: immutable derivation trees
//!     │
//! TreeMap                ← Morphisms f: A → B with node-id mappings
//!     │
//! Fibre                  ← Fibres F(T) with pull-back f* and push-forward f_*
//! ```
//!
//! The orchestrator that owns registries and drives composition lives in
//! `arbor-fibration`; the concrete fibres live in `arbor-fibres`.

pub mod error;
pub mod fibre;
pub mod morphism;
pub mod tree;

pub use error::{ArborError, MapViolation, ViolationKind};
pub use fibre::{Fibre, op};
pub use morphism::TreeMap;
pub use tree::{NodeId, StructureHash, TreeId, TreeNode};
