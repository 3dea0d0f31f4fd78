// Embeddings module
// Durable cache of corpus vectors plus the remote client that produces them

pub mod cache;
pub mod client;

pub use cache::{CacheState, EmbeddingCache, EmbeddingRecord};
pub use client::EmbeddingClient;
