//! Provider abstractions for embeddings, completion and vector search
//!
//! Trait-based so deterministic fakes can stand in for the network-bound,
//! non-deterministic real providers in tests.

pub mod completion;
pub mod embedding;
pub mod openai;
pub mod qdrant;
pub mod vector_search;

pub use completion::CompletionProvider;
pub use embedding::EmbeddingProvider;
pub use vector_search::{SearchHit, VectorSearchProvider, MAX_TOP_K};
