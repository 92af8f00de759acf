//! One query, four enrichments.
//!
//! Builds a derivation tree for a two-term query and carries document
//! ranking, yield variants, a composed vector, and verification state
//! through the same bottom-up composition.
//!
//! Run with: `cargo run -p arbor-fibration --example retrieval`

use arbor_fibration::Fibration;
use arbor_fibres::{
    EmbeddingConfig, EmbeddingFibre, ProbabilityFibre, ProofFibre, RelevanceConfig,
    RelevanceFibre,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut fib = Fibration::new();

    let relevance = RelevanceFibre::new(RelevanceConfig::demo_collection())?;
    let probability = ProbabilityFibre::new();
    let embedding = EmbeddingFibre::new(EmbeddingConfig::demo_table(5));
    let proof = ProofFibre::new();

    let query = ["student", "learning"];
    println!("query: {}", query.join(" "));

    let (_, scores) = fib.compose_tokens(&query, &relevance)?;
    println!("\ndocument ranking:");
    for (doc_id, score) in scores.top_k(3) {
        let text = &relevance.config().documents[doc_id];
        println!("  {doc_id}: {score:.3} - {text}");
    }

    let (_, distribution) = fib.compose_tokens(&query, &probability)?;
    println!("\nyield variants:");
    for (yield_str, prob) in distribution.top_k(3) {
        println!("  '{yield_str}': {prob:.3}");
    }

    let (_, vector) = fib.compose_tokens(&query, &embedding)?;
    println!("\ncomposed vector:");
    println!("  dimension: {}", vector.dimension());
    println!("  norm: {:.3}", vector.norm());

    let (_, proofs) = fib.compose_tokens(&query, &proof)?;
    println!("\nverification state:");
    println!("  fully verified: {}", proofs.is_fully_verified());
    println!("  pending: {:?}", proofs.pending());

    Ok(())
}
