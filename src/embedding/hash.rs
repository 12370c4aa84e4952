use async_trait::async_trait;

use super::Embedder;
use crate::error::CoreError;

const DIMENSIONS: usize = 64;

/// Deterministic, network-free `Embedder` used as the default and in tests.
/// Hashes overlapping word shingles into a fixed-size bag-of-features vector
/// so that texts sharing vocabulary end up with nonzero cosine similarity,
/// without pulling in a real model.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn new() -> Self {
        Self
    }

    fn hash_token(token: &str) -> usize {
        let mut h: u64 = 1469598103934665603;
        for byte in token.as_bytes() {
            h ^= *byte as u64;
            h = h.wrapping_mul(1099511628211);
        }
        (h as usize) % DIMENSIONS
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError> {
        let mut vector = vec![0.0f32; DIMENSIONS];
        let normalized = text.to_ascii_lowercase();
        let tokens: Vec<&str> = normalized
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return Ok(vector);
        }
        for token in &tokens {
            vector[Self::hash_token(token)] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_yields_identical_vectors() {
        let e = HashEmbedder::new();
        let a = e.embed("aspirin reduces inflammation").await.unwrap();
        let b = e.embed("aspirin reduces inflammation").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn empty_text_yields_zero_vector() {
        let e = HashEmbedder::new();
        let v = e.embed("").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn shared_vocabulary_raises_similarity() {
        let e = HashEmbedder::new();
        let a = e.embed("metformin lowers blood glucose").await.unwrap();
        let b = e.embed("metformin lowers blood sugar").await.unwrap();
        let c = e.embed("quantum chromodynamics and gluons").await.unwrap();
        let sim_ab = super::super::cosine_similarity(&a, &b);
        let sim_ac = super::super::cosine_similarity(&a, &c);
        assert!(sim_ab > sim_ac);
    }
}
