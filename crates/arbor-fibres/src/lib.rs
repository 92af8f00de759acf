//! # Arbor Fibres
//!
//! Four interchangeable reference implementations of the fibre
//! capability contract, each with its own data representation and
//! combination semantics:
//!
//! - [`ProbabilityFibre`]: distributions over terminal yields;
//! - [`EmbeddingFibre`]: fixed-dimension numeric vectors;
//! - [`ProofFibre`]: named verification obligations with status;
//! - [`RelevanceFibre`]: BM25 document scores.
//!
//! Each fibre demonstrates the required pull/push/combine/identity
//! contract, not a production implementation of its domain. Fibres
//! depend only on the contract in `arbor-kernel`, never on each other
//! or on the orchestrator.

pub mod embedding;
pub mod probability;
pub mod proof;
pub mod relevance;

pub use embedding::{Embedding, EmbeddingConfig, EmbeddingFibre};
pub use probability::{ProbabilityFibre, YieldDistribution};
pub use proof::{Obligation, ObligationStatus, ProofData, ProofFibre};
pub use relevance::{CollectionStats, DocScores, RelevanceConfig, RelevanceFibre};
