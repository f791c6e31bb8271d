//! Flat cosine-similarity index over recipe embeddings.
//!
//! Vectors are normalized on insert and kept in one row-major matrix, so a
//! query is a dot product per row. The index persists as JSON with the
//! matrix stored as base64 of its little-endian `f32` bytes.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::model::{MealType, RecipeRef};

type Float = f32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: RecipeRef,
    pub meal_type: MealType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecipe {
    pub id: RecipeRef,
    pub score: Float,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VectorIndex {
    embedding_dim: usize,
    entries: Vec<IndexEntry>,
    #[serde(with = "base64_floats")]
    matrix: Vec<Float>,
}

mod base64_floats {
    use super::*;
    use bytemuck::cast_slice;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(vec: &[Float], serializer: S) -> Result<S::Ok, S::Error> {
        let b64 = general_purpose::STANDARD.encode(cast_slice::<Float, u8>(vec));
        serializer.serialize_str(&b64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Float>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = general_purpose::STANDARD.decode(s).map_err(serde::de::Error::custom)?;
        if bytes.len() % 4 != 0 {
            return Err(serde::de::Error::custom(format!(
                "matrix byte length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| Float::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }
}

impl VectorIndex {
    pub fn new(embedding_dim: usize) -> Self {
        Self { embedding_dim, entries: Vec::new(), matrix: Vec::new() }
    }

    pub fn load(path: &Path, embedding_dim: usize) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read vector index at {:?}", path))?;
        let index: VectorIndex = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse vector index at {:?}", path))?;

        if index.embedding_dim != embedding_dim {
            anyhow::bail!(
                "Embedding dimension mismatch: index has {}, expected {}",
                index.embedding_dim,
                embedding_dim
            );
        }
        let expected_len = index.entries.len() * index.embedding_dim;
        if index.matrix.len() != expected_len {
            anyhow::bail!("Matrix size mismatch: expected {}, got {}", expected_len, index.matrix.len());
        }
        Ok(index)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized).with_context(|| format!("Failed to write vector index to {:?}", path))?;
        info!(entries = self.entries.len(), path = %path.display(), "saved vector index");
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.embedding_dim
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &RecipeRef) -> bool {
        self.entries.iter().any(|entry| &entry.id == id)
    }

    /// Inserts or overwrites the vector for `id`.
    pub fn upsert(&mut self, id: RecipeRef, meal_type: MealType, vector: &[Float]) -> Result<()> {
        if vector.len() != self.embedding_dim {
            anyhow::bail!(
                "Embedding dimension mismatch for {}: expected {}, got {}",
                id,
                self.embedding_dim,
                vector.len()
            );
        }
        let normalized = normalize(vector);
        match self.entries.iter().position(|entry| entry.id == id) {
            Some(pos) => {
                let start = pos * self.embedding_dim;
                self.matrix[start..start + self.embedding_dim].copy_from_slice(&normalized);
                self.entries[pos].meal_type = meal_type;
            }
            None => {
                self.matrix.extend_from_slice(&normalized);
                self.entries.push(IndexEntry { id, meal_type });
            }
        }
        Ok(())
    }

    /// Up to `top_k` entries most similar to `query`, best first, restricted
    /// to one meal-type bucket when `meal_type` is given.
    pub fn query(&self, query: &[Float], top_k: usize, meal_type: Option<MealType>) -> Vec<ScoredRecipe> {
        if self.entries.is_empty() || top_k == 0 || query.len() != self.embedding_dim {
            return Vec::new();
        }
        let query = normalize(query);

        let mut scored: Vec<(usize, Float)> = self
            .matrix
            .par_chunks_exact(self.embedding_dim)
            .enumerate()
            .filter(|(idx, _)| meal_type.map_or(true, |wanted| self.entries[*idx].meal_type == wanted))
            .map(|(idx, row)| (idx, dot(row, &query)))
            .filter(|(_, score)| !score.is_nan())
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
        scored.truncate(top_k);
        scored
            .into_iter()
            .map(|(idx, score)| ScoredRecipe { id: self.entries[idx].id.clone(), score })
            .collect()
    }

    pub fn counts_by_meal_type(&self) -> HashMap<MealType, usize> {
        let mut counts = HashMap::new();
        for entry in &self.entries {
            *counts.entry(entry.meal_type).or_insert(0) += 1;
        }
        counts
    }
}

#[inline]
fn dot(a: &[Float], b: &[Float]) -> Float {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Unit-length copy of `vector`; zero vectors stay zero.
pub fn normalize(vector: &[Float]) -> Vec<Float> {
    let norm_sq: Float = vector.iter().map(|&x| x * x).sum();
    if norm_sq == 0.0 {
        return vec![0.0; vector.len()];
    }
    let inv_norm = 1.0 / norm_sq.sqrt();
    vector.iter().map(|&x| x * inv_norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use tempfile::NamedTempFile;

    fn random_vector(dim: usize) -> Vec<Float> {
        let mut rng = rand::thread_rng();
        (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    #[test]
    fn test_query_returns_best_match_first() {
        let mut index = VectorIndex::new(3);
        index.upsert(RecipeRef::catalog("x"), MealType::Dinner, &[1.0, 0.0, 0.0]).unwrap();
        index.upsert(RecipeRef::catalog("y"), MealType::Dinner, &[0.0, 1.0, 0.0]).unwrap();
        index.upsert(RecipeRef::catalog("xy"), MealType::Dinner, &[1.0, 1.0, 0.0]).unwrap();

        let results = index.query(&[2.0, 0.1, 0.0], 2, None);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, RecipeRef::catalog("x"));
        assert_eq!(results[1].id, RecipeRef::catalog("xy"));
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_query_filters_by_meal_type() {
        let mut index = VectorIndex::new(2);
        index.upsert(RecipeRef::catalog("b"), MealType::Breakfast, &[1.0, 0.0]).unwrap();
        index.upsert(RecipeRef::catalog("d"), MealType::Dinner, &[0.0, 1.0]).unwrap();

        let results = index.query(&[1.0, 0.0], 5, Some(MealType::Dinner));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, RecipeRef::catalog("d"));
    }

    #[test]
    fn test_upsert_overwrites_and_validates_dimension() {
        let mut index = VectorIndex::new(2);
        index.upsert(RecipeRef::catalog("a"), MealType::Lunch, &[1.0, 0.0]).unwrap();
        index.upsert(RecipeRef::catalog("a"), MealType::Dinner, &[0.0, 3.0]).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.counts_by_meal_type().get(&MealType::Dinner), Some(&1));

        let results = index.query(&[0.0, 1.0], 1, None);
        assert!((results[0].score - 1.0).abs() < 1e-6);

        assert!(index.upsert(RecipeRef::catalog("b"), MealType::Lunch, &[1.0]).is_err());
        assert!(index.query(&[1.0], 1, None).is_empty());
    }

    #[test]
    fn test_save_and_load_random_vectors() -> Result<()> {
        let dim = 16;
        let mut index = VectorIndex::new(dim);
        for i in 0..20 {
            index.upsert(RecipeRef::catalog(i.to_string()), MealType::ALL[i % 3], &random_vector(dim))?;
        }
        let file = NamedTempFile::new()?;
        index.save(file.path())?;

        let loaded = VectorIndex::load(file.path(), dim)?;
        assert_eq!(loaded.len(), 20);
        assert_eq!(loaded.matrix, index.matrix);
        assert!(loaded.contains(&RecipeRef::catalog("7")));

        let probe = random_vector(dim);
        assert_eq!(loaded.query(&probe, 5, None), index.query(&probe, 5, None));

        assert!(VectorIndex::load(file.path(), dim + 1).is_err());
        Ok(())
    }

    #[test]
    fn test_load_rejects_truncated_matrix() {
        let json = r#"{ "embedding_dim": 2, "entries": [], "matrix": "AAA=" }"#;
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), json).unwrap();
        assert!(VectorIndex::load(file.path(), 2).is_err());
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
        let unit = normalize(&[3.0, 4.0]);
        assert!((unit[0] - 0.6).abs() < 1e-6);
    }
}
