//! # Arbor Fibration
//!
//! The orchestrator over the base category and its fibres: a registry
//! of trees, maps, and annotations, plus the operations that keep
//! enrichment data coherent while trees are built, substituted, and
//! transformed.
//!
//! The registry is process-scoped shared mutable state with a single
//! logical owner issuing calls sequentially. It accumulates without
//! eviction; callers bound its growth. Concurrent callers must
//! serialize access behind one exclusive lock; registration and
//! annotation are read-modify-write with no built-in atomicity.

pub mod export;
pub mod fibration;

pub use export::export_json;
pub use fibration::Fibration;
