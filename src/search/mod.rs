pub mod catalog;
pub mod embedding_engine;
pub mod retriever;
pub mod vector_index;

pub use catalog::load_recipe_catalog;
pub use embedding_engine::{Embedder, EmbeddingEngine, EMBEDDING_DIMENSION};
pub use retriever::CatalogRetriever;
pub use vector_index::VectorIndex;
