//! Tokenisation and vector similarity helpers.

use serde::{Deserialize, Serialize};

/// English and German function words that carry no topical signal
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "into", "is", "of",
    "on", "or", "the", "to", "with", "your", "you", "how", "what", "der", "die", "das", "und",
    "fur", "für", "mit", "von", "zu", "im", "ein", "eine", "den", "des", "dem", "auf",
];

/// Lower-case, split on anything that is not alphanumeric, drop single
/// characters and stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_lowercase)
        .filter(|token| !STOPWORDS.contains(&token.as_str()))
        .collect()
}

/// Similarity between two non-negative topic mixtures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    /// Cosine similarity, in [0, 1] for non-negative vectors
    #[default]
    Cosine,
    /// Raw inner product, in [0, 1] for probability vectors
    Dot,
    /// Bhattacharyya coefficient `Σ sqrt(a·b)`, in [0, 1]
    Bhattacharyya,
}

impl SimilarityMetric {
    pub fn similarity(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            SimilarityMetric::Cosine => cosine(a, b),
            SimilarityMetric::Dot => dot(a, b),
            SimilarityMetric::Bhattacharyya => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x * y).max(0.0).sqrt())
                .sum(),
        }
    }
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity; 0 when either vector is all zeros
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();
    if norm_a < 1e-12 || norm_b < 1e-12 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

/// Inner product of two sparse vectors whose indices are sorted ascending
pub fn sparse_dot(a: &[(usize, f64)], b: &[(usize, f64)]) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut sum = 0.0;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

pub fn sparse_norm(a: &[(usize, f64)]) -> f64 {
    a.iter().map(|(_, v)| v * v).sum::<f64>().sqrt()
}

/// Cosine similarity of two sorted sparse vectors
pub fn sparse_cosine(a: &[(usize, f64)], b: &[(usize, f64)]) -> f64 {
    let denom = sparse_norm(a) * sparse_norm(b);
    if denom < 1e-12 {
        return 0.0;
    }
    sparse_dot(a, b) / denom
}

/// Scale a sparse vector to unit length in place (no-op for zero vectors)
pub fn l2_normalize(a: &mut [(usize, f64)]) {
    let norm = sparse_norm(a);
    if norm > 1e-12 {
        for (_, value) in a.iter_mut() {
            *value /= norm;
        }
    }
}

/// Normalize a dense row to sum to 1 (left untouched when the sum is ~0)
pub fn normalize(row: &mut [f64]) {
    let sum: f64 = row.iter().sum();
    if sum > 1e-12 {
        for value in row.iter_mut() {
            *value /= sum;
        }
    }
}

/// Deterministic noise in [0, 1) from a linear congruential step
pub fn pseudo_random(seed: u64, idx: usize) -> f64 {
    const A: u64 = 1_664_525;
    const C: u64 = 1_013_904_223;
    const M: u64 = 1 << 32;

    let x = A.wrapping_mul(seed.wrapping_add(idx as u64)).wrapping_add(C) % M;
    x as f64 / M as f64
}
