// Path: crates/vault/src/retriever.rs
//! Lexical and hybrid ranking over candidate texts.
//!
//! The lexical score is TF·IDF over the candidate set, divided by the best
//! candidate's score so it lands in `[0, 1]`. The vector score is the cosine
//! similarity of [`Embedder`] outputs, clamped at zero. Hybrid ranking mixes
//! them as `alpha * lexical + (1 - alpha) * vector`. Equal scores order by
//! newest first, then by id.

use forge_types::config::RetrievalConfig;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Lowercased alphanumeric runs.
pub fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Maps text to a fixed-length vector.
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Deterministic feature hashing of terms and their character trigrams,
/// L2-normalised.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn add(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let h = fnv1a(feature.as_bytes());
        let slot = usize::try_from(h % self.dimension as u64).unwrap_or(0);
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        if let Some(v) = vector.get_mut(slot) {
            *v += sign * weight;
        }
    }
}

impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for term in terms(text) {
            self.add(&mut vector, &term, 1.0);
            let padded: Vec<char> = format!("#{term}#").chars().collect();
            for window in padded.windows(3) {
                let gram: String = window.iter().collect();
                self.add(&mut vector, &gram, 0.5);
            }
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |h, &b| {
        (h ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// Cosine similarity; zero when either side is all zeros.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let nb = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// Something that can be ranked.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub id: &'a str,
    pub created_at: u64,
    pub text: &'a str,
}

/// A ranked candidate with its component scores.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub record_id: String,
    pub created_at: u64,
    pub score: f32,
    pub lexical: f32,
    pub vector: f32,
}

pub struct Retriever {
    config: RetrievalConfig,
    embedder: Box<dyn Embedder>,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("config", &self.config)
            .field("embedding_dim", &self.embedder.dimension())
            .finish()
    }
}

impl Retriever {
    /// A retriever using [`HashingEmbedder`] at the configured dimension.
    pub fn new(config: RetrievalConfig) -> Self {
        let embedder = Box::new(HashingEmbedder::new(config.embedding_dim));
        Self { config, embedder }
    }

    pub fn with_embedder(config: RetrievalConfig, embedder: Box<dyn Embedder>) -> Self {
        Self { config, embedder }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Lexical-only ranking.
    pub fn search(&self, query: &str, candidates: &[Candidate<'_>], limit: usize) -> Vec<SearchHit> {
        self.rank(query, candidates, limit, 1.0)
    }

    /// Hybrid ranking with the configured `alpha`.
    pub fn search_hybrid(&self, query: &str, candidates: &[Candidate<'_>], limit: usize) -> Vec<SearchHit> {
        self.rank(query, candidates, limit, self.config.alpha)
    }

    /// Ranks with an explicit lexical weight. A `limit` of zero means the
    /// configured default. Candidates scoring zero are dropped.
    pub fn rank(&self, query: &str, candidates: &[Candidate<'_>], limit: usize, alpha: f32) -> Vec<SearchHit> {
        let alpha = alpha.clamp(0.0, 1.0);
        let limit = if limit == 0 { self.config.default_limit } else { limit };
        let lexical = lexical_scores(query, candidates);
        let query_vector = (alpha < 1.0).then(|| self.embedder.embed(query));

        let mut hits: Vec<SearchHit> = candidates
            .iter()
            .zip(lexical)
            .filter_map(|(candidate, lexical)| {
                let vector = query_vector
                    .as_ref()
                    .map_or(0.0, |q| cosine(q, &self.embedder.embed(candidate.text)).max(0.0));
                let score = alpha * lexical + (1.0 - alpha) * vector;
                (score > 0.0).then(|| SearchHit {
                    record_id: candidate.id.to_string(),
                    created_at: candidate.created_at,
                    score,
                    lexical,
                    vector,
                })
            })
            .collect();
        hits.sort_by(compare_hits);
        hits.truncate(limit);
        tracing::debug!(target: "retriever", "ranked {} of {} candidates", hits.len(), candidates.len());
        hits
    }
}

fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.record_id.cmp(&b.record_id))
}

/// TF·IDF of the query terms in each candidate, scaled so the best is 1.
fn lexical_scores(query: &str, candidates: &[Candidate<'_>]) -> Vec<f32> {
    let query_terms: HashSet<String> = terms(query).into_iter().collect();
    if query_terms.is_empty() {
        return vec![0.0; candidates.len()];
    }
    let docs: Vec<Vec<String>> = candidates.iter().map(|c| terms(c.text)).collect();
    let mut df: HashMap<&str, usize> = HashMap::new();
    for doc in &docs {
        let unique: HashSet<&str> = doc.iter().map(String::as_str).collect();
        for term in unique {
            if query_terms.contains(term) {
                *df.entry(term).or_insert(0) += 1;
            }
        }
    }
    let n = docs.len() as f32;
    let raw: Vec<f32> = docs
        .iter()
        .map(|doc| {
            if doc.is_empty() {
                return 0.0;
            }
            let len = doc.len() as f32;
            query_terms
                .iter()
                .map(|term| {
                    let tf = doc.iter().filter(|t| *t == term).count() as f32 / len;
                    let df = df.get(term.as_str()).copied().unwrap_or(0) as f32;
                    let idf = ((n + 1.0) / (df + 1.0)).ln() + 1.0;
                    tf * idf
                })
                .sum()
        })
        .collect();
    let max = raw.iter().copied().fold(0.0_f32, f32::max);
    if max > 0.0 {
        raw.into_iter().map(|s| s / max).collect()
    } else {
        raw
    }
}
