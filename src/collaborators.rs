//! Services the planner depends on but does not implement itself.
//!
//! Bundled implementations live in `recipe_generator`, `search::retriever`
//! and `storage`; tests substitute in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{MealType, Recipe, RecipeRef};
use crate::plan::MealPlan;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub meal_type: MealType,
    pub preference_summary: String,
    /// Catalog recipe the generated one should be adapted from.
    pub base_candidate: Option<Recipe>,
    pub primary_protein: Option<String>,
}

/// Drafts one recipe. The result is taken as-is once it has the right shape.
#[async_trait]
pub trait RecipeGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Recipe>;
}

#[async_trait]
pub trait CandidateRetriever: Send + Sync {
    /// Candidate ids for `phrase` within one meal-type bucket, best first.
    async fn search(&self, phrase: &str, meal_type: MealType, limit: usize) -> Result<Vec<RecipeRef>>;

    async fn fetch(&self, id: &RecipeRef) -> Result<Option<Recipe>>;
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<MealPlan>;

    async fn save(&self, plan: &MealPlan) -> Result<()>;

    async fn list(&self) -> Result<Vec<String>>;
}
