//! Local feature-hashing provider.
//!
//! Each whitespace token is hashed with SHA-256; the first eight bytes pick a
//! bucket and the ninth byte picks the sign. The accumulated vector is L2
//! normalized; if the signs cancel to zero, a single bucket picked by the
//! whole text is set instead. Needs no network and is stable for a given
//! dimensionality.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{ensure_input, EmbeddingProvider};
use crate::error::EmbeddingError;

#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
}

impl HashingEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];

        for (position, token) in text.split_whitespace().enumerate() {
            // Salt with the position so "U1 M1" and "M1 U1" differ.
            let digest = Sha256::new()
                .chain_update(position.to_le_bytes())
                .chain_update(token.as_bytes())
                .finalize();

            let bucket = self.bucket(&digest);
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        } else {
            // Every bucket cancelled out; fall back to one bucket for the whole text.
            let digest = Sha256::digest(text.as_bytes());
            vector[self.bucket(&digest)] = 1.0;
        }
        vector
    }

    fn bucket(&self, digest: &[u8]) -> usize {
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        ensure_input(text)?;
        Ok(self.vectorize(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hashing"
    }
}
