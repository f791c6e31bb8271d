use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info};

use super::catalog::embedding_text;
use super::embedding_engine::Embedder;
use super::vector_index::VectorIndex;
use crate::collaborators::CandidateRetriever;
use crate::model::{MealType, Recipe, RecipeRef};

/// Candidate retrieval over a local recipe catalog and its vector index.
pub struct CatalogRetriever<E: Embedder> {
    embedder: E,
    index: VectorIndex,
    recipes: HashMap<RecipeRef, Recipe>,
}

impl<E: Embedder> CatalogRetriever<E> {
    /// Embeds every recipe in `recipes` into a fresh index.
    pub fn build(embedder: E, recipes: Vec<Recipe>) -> Result<Self> {
        let texts: Vec<String> = recipes.iter().map(embedding_text).collect();
        let embeddings = embedder.embed(&texts).context("Failed to embed recipe catalog")?;
        if embeddings.len() != recipes.len() {
            anyhow::bail!("Embeddings and recipes count mismatch: {} vs {}", embeddings.len(), recipes.len());
        }

        let mut index = VectorIndex::new(embedder.dimension());
        for (recipe, embedding) in recipes.iter().zip(embeddings.iter()) {
            index.upsert(recipe.id.clone(), recipe.meal_type, embedding)?;
        }
        info!(recipes = index.len(), "built catalog index");
        Ok(Self::from_parts(embedder, index, recipes))
    }

    /// Reuses a previously saved index. Recipes missing from it are embedded
    /// and added.
    pub fn with_index(embedder: E, mut index: VectorIndex, recipes: Vec<Recipe>) -> Result<Self> {
        if index.dimension() != embedder.dimension() {
            anyhow::bail!(
                "Index dimension {} does not match embedder dimension {}",
                index.dimension(),
                embedder.dimension()
            );
        }
        let missing: Vec<&Recipe> = recipes.iter().filter(|recipe| !index.contains(&recipe.id)).collect();
        if !missing.is_empty() {
            let texts: Vec<String> = missing.iter().map(|recipe| embedding_text(recipe)).collect();
            let embeddings = embedder.embed(&texts).context("Failed to embed new catalog recipes")?;
            for (recipe, embedding) in missing.iter().zip(embeddings.iter()) {
                index.upsert(recipe.id.clone(), recipe.meal_type, embedding)?;
            }
            info!(added = missing.len(), "indexed new catalog recipes");
        }
        Ok(Self::from_parts(embedder, index, recipes))
    }

    fn from_parts(embedder: E, index: VectorIndex, recipes: Vec<Recipe>) -> Self {
        let recipes = recipes.into_iter().map(|recipe| (recipe.id.clone(), recipe)).collect();
        Self { embedder, index, recipes }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

#[async_trait]
impl<E: Embedder> CandidateRetriever for CatalogRetriever<E> {
    async fn search(&self, phrase: &str, meal_type: MealType, limit: usize) -> Result<Vec<RecipeRef>> {
        let query = self
            .embedder
            .embed_one(phrase)
            .with_context(|| format!("Failed to embed search phrase '{}'", phrase))?;
        let results = self.index.query(&query, limit, Some(meal_type));
        debug!(phrase, meal_type = %meal_type, hits = results.len(), "catalog search");
        Ok(results.into_iter().map(|scored| scored.id).collect())
    }

    async fn fetch(&self, id: &RecipeRef) -> Result<Option<Recipe>> {
        Ok(self.recipes.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Ingredient;

    /// Bag-of-letters embedding: good enough to make similar words close.
    struct LetterEmbedder;

    impl Embedder for LetterEmbedder {
        fn dimension(&self) -> usize {
            26
        }

        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|text| {
                    let mut v = vec![0.0; 26];
                    for c in text.to_lowercase().chars().filter(|c| c.is_ascii_lowercase()) {
                        v[(c as u8 - b'a') as usize] += 1.0;
                    }
                    v
                })
                .collect())
        }
    }

    fn recipe(id: &str, name: &str, meal_type: MealType) -> Recipe {
        Recipe {
            id: RecipeRef::catalog(id),
            name: name.to_string(),
            ingredients: vec![Ingredient::new(name.to_lowercase(), "1")],
            steps: Vec::new(),
            meal_type,
            servings: 1,
            primary_protein: None,
        }
    }

    fn catalog() -> Vec<Recipe> {
        vec![
            recipe("1", "Salmon", MealType::Dinner),
            recipe("2", "Chicken", MealType::Dinner),
            recipe("3", "Salmon", MealType::Breakfast),
        ]
    }

    #[tokio::test]
    async fn test_search_stays_in_meal_type_bucket() {
        let retriever = CatalogRetriever::build(LetterEmbedder, catalog()).unwrap();
        let hits = retriever.search("salmon", MealType::Dinner, 5).await.unwrap();
        assert_eq!(hits, vec![RecipeRef::catalog("1"), RecipeRef::catalog("2")]);

        let hits = retriever.search("salmon", MealType::Lunch, 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_returns_catalog_recipe() {
        let retriever = CatalogRetriever::build(LetterEmbedder, catalog()).unwrap();
        let fetched = retriever.fetch(&RecipeRef::catalog("2")).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Chicken");
        assert!(retriever.fetch(&RecipeRef::modified("2")).await.unwrap().is_none());
    }

    #[test]
    fn test_with_index_embeds_only_missing_recipes() {
        let mut index = VectorIndex::new(26);
        index.upsert(RecipeRef::catalog("1"), MealType::Dinner, &[1.0; 26]).unwrap();
        let retriever = CatalogRetriever::with_index(LetterEmbedder, index, catalog()).unwrap();
        assert_eq!(retriever.index().len(), 3);

        assert!(CatalogRetriever::with_index(LetterEmbedder, VectorIndex::new(4), catalog()).is_err());
    }
}
