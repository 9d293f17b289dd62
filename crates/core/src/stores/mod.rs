pub mod memory;
pub mod qdrant;

pub use memory::{cosine_similarity, InMemoryVectorStore, IndexSnapshot};
pub use qdrant::QdrantStore;
