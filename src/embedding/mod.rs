//! Embedding providers.
//!
//! A provider turns the textual summary of a transaction into a vector of a
//! fixed, provider-declared length. Vectors are only comparable between calls
//! to the same provider version.

pub mod hashing;
pub mod http;

use async_trait::async_trait;

use crate::error::EmbeddingError;

pub use hashing::HashingEmbeddingProvider;
pub use http::HttpEmbeddingProvider;

/// Contract every embedding backend satisfies. Implementations are shared
/// across workers and must be safe for concurrent use.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one non-empty text into exactly `dimensions()` components.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Output dimensionality `D`.
    fn dimensions(&self) -> usize;

    /// Provider name for logs.
    fn name(&self) -> &str;
}

pub(crate) fn ensure_input(text: &str) -> Result<(), EmbeddingError> {
    if text.trim().is_empty() {
        return Err(EmbeddingError::InvalidInput(
            "embedding text must not be empty".to_string(),
        ));
    }
    Ok(())
}
