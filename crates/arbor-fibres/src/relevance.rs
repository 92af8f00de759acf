//! Relevance-scoring fibre: BM25 document scores.
//!
//! Enriches trees with information-retrieval relevance: each leaf term
//! is scored against an explicit document collection, and combination
//! mixes score maps. Retrieval relevance is treated as syntax-invariant
//! in this reference strategy, so pull and push pass scores through
//! unchanged and the coherence laws hold trivially.

use arbor_kernel::{Fibre, TreeMap, TreeNode, op};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Default word-extraction pattern (lowercased input).
const DEFAULT_TOKEN_PATTERN: &str = r"\b\w+\b";

/// Default BM25 term-frequency saturation parameter.
const DEFAULT_K1: f64 = 1.2;

/// Default BM25 length-normalization parameter.
const DEFAULT_B: f64 = 0.75;

/// Configuration for the relevance fibre: the collection, the BM25
/// parameters, and the tokenizer. All explicit, nothing implicit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceConfig {
    /// Document id → document text.
    pub documents: BTreeMap<String, String>,

    /// Term-frequency saturation (BM25 k1).
    pub k1: f64,

    /// Length normalization (BM25 b).
    pub b: f64,

    /// Weight of the left operand under `"merge"`.
    pub merge_weight_left: f64,

    /// Weight of the right operand under `"merge"`.
    pub merge_weight_right: f64,

    /// Regex pattern for word extraction.
    pub token_pattern: String,
}

impl RelevanceConfig {
    /// Configuration over the given collection with default parameters.
    pub fn new(documents: BTreeMap<String, String>) -> Self {
        Self {
            documents,
            k1: DEFAULT_K1,
            b: DEFAULT_B,
            merge_weight_left: 0.6,
            merge_weight_right: 0.4,
            token_pattern: DEFAULT_TOKEN_PATTERN.to_string(),
        }
    }

    /// The five-document demo collection.
    pub fn demo_collection() -> Self {
        let documents = [
            ("doc1", "the student studies machine learning"),
            ("doc2", "the teacher explains recursion theory"),
            ("doc3", "students learn about formal grammars"),
            ("doc4", "recursive functions in programming"),
            ("doc5", "the professor teaches linguistics"),
        ]
        .into_iter()
        .map(|(id, text)| (id.to_string(), text.to_string()))
        .collect();
        Self::new(documents)
    }

    /// Use symmetric merge weights.
    pub fn with_symmetric_weights(mut self) -> Self {
        self.merge_weight_left = 0.5;
        self.merge_weight_right = 0.5;
        self
    }
}

/// Lowercasing word tokenizer over a configurable pattern.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    pattern: Regex,
}

impl Tokenizer {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.pattern
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

/// Precomputed collection statistics: the index bookkeeping behind
/// BM25 scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Inverse document frequency per term.
    pub idf: BTreeMap<String, f64>,

    /// Token count per document.
    pub doc_lengths: BTreeMap<String, usize>,

    /// Mean document length over the collection.
    pub avg_doc_length: f64,
}

impl CollectionStats {
    fn compute(documents: &BTreeMap<String, String>, tokenizer: &Tokenizer) -> Self {
        let mut doc_freq: BTreeMap<String, usize> = BTreeMap::new();
        let mut doc_lengths = BTreeMap::new();

        for (doc_id, text) in documents {
            let terms = tokenizer.tokenize(text);
            doc_lengths.insert(doc_id.clone(), terms.len());
            let distinct: BTreeSet<String> = terms.into_iter().collect();
            for term in distinct {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let n_docs = documents.len();
        let idf = doc_freq
            .into_iter()
            .map(|(term, df)| {
                let value =
                    (((n_docs as f64) - df as f64 + 0.5) / (df as f64 + 0.5) + 1.0).ln();
                (term, value)
            })
            .collect();

        let avg_doc_length = if n_docs > 0 {
            doc_lengths.values().sum::<usize>() as f64 / n_docs as f64
        } else {
            0.0
        };

        Self {
            idf,
            doc_lengths,
            avg_doc_length,
        }
    }
}

/// Relevance scores: document id → non-negative score.
///
/// The empty score map is valid and simply ranks nothing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocScores {
    scores: BTreeMap<String, f64>,
}

impl DocScores {
    pub fn new(scores: BTreeMap<String, f64>) -> Self {
        Self { scores }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn scores(&self) -> &BTreeMap<String, f64> {
        &self.scores
    }

    pub fn get(&self, doc_id: &str) -> f64 {
        self.scores.get(doc_id).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// The `k` highest-scoring documents, highest first. Ties resolve
    /// by document id for determinism.
    pub fn top_k(&self, k: usize) -> Vec<(&str, f64)> {
        let mut entries: Vec<(&str, f64)> = self
            .scores
            .iter()
            .map(|(d, s)| (d.as_str(), *s))
            .collect();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries.truncate(k);
        entries
    }

    /// Scores scaled so the maximum becomes 1.0 (empty maps stay empty).
    pub fn normalized(&self) -> DocScores {
        let max = self.scores.values().cloned().fold(0.0_f64, f64::max);
        if max > 0.0 {
            DocScores {
                scores: self
                    .scores
                    .iter()
                    .map(|(d, s)| (d.clone(), s / max))
                    .collect(),
            }
        } else {
            self.clone()
        }
    }

    /// Keep only documents scoring at or above `threshold`.
    pub fn filter_threshold(&self, threshold: f64) -> DocScores {
        DocScores {
            scores: self
                .scores
                .iter()
                .filter(|(_, s)| **s >= threshold)
                .map(|(d, s)| (d.clone(), *s))
                .collect(),
        }
    }
}

/// Relevance fibre: BM25 leaf scoring, weighted-union merge,
/// pass-through pull/push.
#[derive(Debug, Clone)]
pub struct RelevanceFibre {
    config: RelevanceConfig,
    tokenizer: Tokenizer,
    stats: CollectionStats,
}

impl RelevanceFibre {
    /// Build the fibre, compiling the tokenizer and precomputing the
    /// collection statistics.
    pub fn new(config: RelevanceConfig) -> Result<Self, regex::Error> {
        let tokenizer = Tokenizer::new(&config.token_pattern)?;
        let stats = CollectionStats::compute(&config.documents, &tokenizer);
        Ok(Self {
            config,
            tokenizer,
            stats,
        })
    }

    pub fn config(&self) -> &RelevanceConfig {
        &self.config
    }

    pub fn stats(&self) -> &CollectionStats {
        &self.stats
    }

    /// BM25 score of a term sequence against one document.
    pub fn score(&self, query_terms: &[String], doc_id: &str) -> f64 {
        let Some(text) = self.config.documents.get(doc_id) else {
            return 0.0;
        };
        let doc_length = self.stats.doc_lengths.get(doc_id).copied().unwrap_or(0);

        let mut term_freqs: BTreeMap<String, usize> = BTreeMap::new();
        for term in self.tokenizer.tokenize(text) {
            *term_freqs.entry(term).or_insert(0) += 1;
        }

        let k1 = self.config.k1;
        let b = self.config.b;
        let mut score = 0.0;

        for term in query_terms {
            if let Some(&tf) = term_freqs.get(term) {
                let idf = self.stats.idf.get(term).copied().unwrap_or(0.0);
                let tf = tf as f64;
                let numerator = tf * (k1 + 1.0);
                let denominator = tf
                    + k1 * (1.0 - b + b * doc_length as f64 / self.stats.avg_doc_length);
                score += idf * (numerator / denominator);
            }
        }

        score
    }
}

impl Fibre for RelevanceFibre {
    type Data = DocScores;

    fn key(&self) -> &'static str {
        "relevance"
    }

    fn pull(&self, _map: &TreeMap, target: &Self::Data) -> Self::Data {
        target.clone()
    }

    fn push(&self, _map: &TreeMap, source: &Self::Data) -> Self::Data {
        source.clone()
    }

    fn combine(&self, left: &Self::Data, right: &Self::Data, operation: &str) -> Self::Data {
        match operation {
            op::MERGE => {
                let doc_ids: BTreeSet<&String> =
                    left.scores().keys().chain(right.scores().keys()).collect();

                let scores = doc_ids
                    .into_iter()
                    .map(|doc_id| {
                        let combined = self.config.merge_weight_left * left.get(doc_id)
                            + self.config.merge_weight_right * right.get(doc_id);
                        (doc_id.clone(), combined)
                    })
                    .collect();
                DocScores::new(scores)
            }
            // "move" and unrecognized operations: relevance is
            // syntax-invariant, the left operand passes through.
            _ => left.clone(),
        }
    }

    fn identity_data(&self, node: &TreeNode) -> Self::Data {
        if !node.is_leaf() {
            return DocScores::empty();
        }

        let query = self.tokenizer.tokenize(&node.label);
        let scores = self
            .config
            .documents
            .keys()
            .filter_map(|doc_id| {
                let s = self.score(&query, doc_id);
                (s > 0.0).then(|| (doc_id.clone(), s))
            })
            .collect();
        DocScores::new(scores)
    }
}
