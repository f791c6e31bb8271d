use anyhow::Result;
use model2vec_rs::model::StaticModel;

const EMBEDDING_MODEL_ID: &str = "minishlab/potion-base-32M";

pub const EMBEDDING_DIMENSION: usize = 512;

/// Anything that can turn text into fixed-size vectors.
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Failed to generate embedding for single text: {}", text))
    }
}

/// Static (model2vec) sentence embeddings used to index recipe names and
/// ingredients.
pub struct EmbeddingEngine {
    model: StaticModel,
}

impl EmbeddingEngine {
    pub fn new() -> Result<Self> {
        let model = StaticModel::from_pretrained(EMBEDDING_MODEL_ID, None, None, None)?;
        Ok(Self { model })
    }
}

impl Embedder for EmbeddingEngine {
    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(self.model.encode(texts))
    }
}
