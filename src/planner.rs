//! End-to-end plan generation: diversity prompts, candidate retrieval,
//! recipe generation, scheduling and the initial shopping list.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::collaborators::{CandidateRetriever, GenerationRequest, RecipeGenerator};
use crate::diversity::{plan_prompts, validate_batch};
use crate::error::PlanError;
use crate::ledger::Ledger;
use crate::model::{MealType, Recipe, RecipeRef, Slot};
use crate::plan::MealPlan;
use crate::preferences::Preferences;
use crate::quantity::KeyScheme;
use crate::scheduler::{build_schedule, implicit_slots, MealCounts, RecipePool, ScheduleRequest};

/// What a caller asks for when generating a plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanRequest {
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub meal_selection: MealCounts,
    #[serde(default)]
    pub distinct_recipe_counts: BTreeMap<MealType, u32>,
    #[serde(default)]
    pub slots: Vec<Slot>,
    #[serde(default)]
    pub portion_override: Option<u32>,
    /// Defaults to today.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

impl PlanRequest {
    /// Validated schedule request. Without explicit slots, a distinct count
    /// below its meal count gets implicit slots so recipes can be reused.
    fn schedule_request(&self, start_date: NaiveDate) -> Result<ScheduleRequest, PlanError> {
        let mut schedule = ScheduleRequest {
            meal_selection: self.meal_selection,
            distinct_recipe_counts: self.distinct_recipe_counts.clone(),
            slots: self.slots.clone(),
            household: self.preferences.household_size,
            portion_override: self.portion_override,
            start_date,
        };
        schedule.validate()?;
        if schedule.slots.is_empty() && schedule.needs_reuse() {
            schedule.slots = implicit_slots(&schedule.meal_selection, start_date);
            debug!(slots = schedule.slots.len(), "laid out implicit slots for recipe reuse");
        }
        Ok(schedule)
    }

    /// Recipes to draft for `meal_type`: one per unpinned slot, capped by
    /// the distinct count.
    fn recipes_wanted(&self, schedule: &ScheduleRequest, meal_type: MealType) -> usize {
        let open = if schedule.slots.is_empty() {
            schedule.meal_selection.get(meal_type) as usize
        } else {
            schedule
                .slots
                .iter()
                .filter(|slot| slot.meal_type == meal_type && slot.recipe_ref.is_none())
                .count()
        };
        match self.distinct_recipe_counts.get(&meal_type) {
            Some(&distinct) => open.min(distinct as usize),
            None => open,
        }
    }
}

pub struct PlanBuilder<'a> {
    generator: &'a dyn RecipeGenerator,
    retriever: &'a dyn CandidateRetriever,
    key_scheme: KeyScheme,
    candidates_per_prompt: usize,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(generator: &'a dyn RecipeGenerator, retriever: &'a dyn CandidateRetriever) -> Self {
        Self { generator, retriever, key_scheme: KeyScheme::Canonical, candidates_per_prompt: 5 }
    }

    pub fn key_scheme(mut self, key_scheme: KeyScheme) -> Self {
        self.key_scheme = key_scheme;
        self
    }

    pub fn candidates_per_prompt(mut self, count: usize) -> Self {
        self.candidates_per_prompt = count.max(1);
        self
    }

    pub async fn build(&self, request: PlanRequest) -> Result<MealPlan, PlanError> {
        request.preferences.validate()?;
        let start_date = request.start_date.unwrap_or_else(|| Utc::now().date_naive());
        let schedule_request = request.schedule_request(start_date)?;

        let mut pool = RecipePool::new();
        let mut used: HashSet<RecipeRef> = HashSet::new();
        for meal_type in MealType::ALL {
            let wanted = request.recipes_wanted(&schedule_request, meal_type);
            if wanted == 0 {
                continue;
            }
            let drafted = self.draft_recipes(&request.preferences, meal_type, wanted, &mut used).await?;
            pool.insert(meal_type, drafted);
        }
        self.add_pinned(&request.slots, &mut pool).await?;

        let schedule = build_schedule(&schedule_request, &pool)?;
        let shopping_list = Ledger::from_schedule(&schedule.recipes, self.key_scheme).serialize();

        let plan = MealPlan {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            start_date,
            preferences: request.preferences,
            recipes: schedule.recipes,
            schedule: schedule.entries,
            shopping_list,
            key_scheme: self.key_scheme,
        };
        info!(
            plan = %plan.id,
            recipes = plan.recipes.len(),
            entries = plan.schedule.len(),
            items = plan.shopping_list.items.len(),
            "meal plan generated"
        );
        Ok(plan)
    }

    async fn draft_recipes(
        &self,
        preferences: &Preferences,
        meal_type: MealType,
        count: usize,
        used: &mut HashSet<RecipeRef>,
    ) -> Result<Vec<Recipe>, PlanError> {
        let prompts = plan_prompts(preferences, meal_type, count)?;
        validate_batch(&prompts)?;
        let summary = preferences.summary();

        let mut drafted = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            let candidates = self.retriever.search(&prompt.phrase, meal_type, self.candidates_per_prompt).await?;
            let base = match candidates.into_iter().find(|id| !used.contains(id)) {
                Some(id) => {
                    used.insert(id.clone());
                    self.retriever.fetch(&id).await?
                }
                None => {
                    warn!(phrase = %prompt.phrase, "no unused catalog candidate, generating from scratch");
                    None
                }
            };

            let generation = GenerationRequest {
                meal_type,
                preference_summary: summary.clone(),
                base_candidate: base,
                primary_protein: Some(prompt.primary_protein.clone()),
            };
            let mut recipe = self.generator.generate(&generation).await?;
            recipe.meal_type = meal_type;
            if recipe.primary_protein.is_none() {
                recipe.primary_protein = Some(prompt.primary_protein);
            }
            drafted.push(recipe);
        }
        Ok(drafted)
    }

    /// Fetches recipes that slots are pinned to so the scheduler can
    /// resolve them. Pins that can't be fetched are left for the scheduler
    /// to drop.
    async fn add_pinned(&self, slots: &[Slot], pool: &mut RecipePool) -> Result<(), PlanError> {
        for slot in slots {
            let Some(pinned) = &slot.recipe_ref else { continue };
            let bucket = pool.entry(slot.meal_type).or_default();
            if bucket.iter().any(|recipe| &recipe.id == pinned) {
                continue;
            }
            match self.retriever.fetch(pinned).await? {
                Some(recipe) if recipe.meal_type == slot.meal_type => bucket.push(recipe),
                Some(recipe) => warn!(
                    slot = %slot.label,
                    recipe = %pinned,
                    meal_type = %recipe.meal_type,
                    "pinned recipe is for a different meal type"
                ),
                None => warn!(slot = %slot.label, recipe = %pinned, "pinned recipe not found"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Day, Ingredient};

    fn plain(id: &str) -> Recipe {
        Recipe {
            id: RecipeRef::catalog(id),
            name: format!("Catalog {}", id),
            ingredients: vec![Ingredient::new("rice", "1 cup")],
            steps: Vec::new(),
            meal_type: MealType::Dinner,
            servings: 1,
            primary_protein: None,
        }
    }

    #[test]
    fn test_recipes_wanted_skips_pinned_slots_and_caps_by_distinct() {
        let mut pinned = Slot { day: Day::Mon, meal_type: MealType::Dinner, label: "Mon dinner".into(), recipe_ref: None };
        pinned.recipe_ref = Some(plain("9").id);
        let open = |label: &str| Slot { day: Day::Tue, meal_type: MealType::Dinner, label: label.into(), recipe_ref: None };
        let mut request = PlanRequest {
            slots: vec![pinned, open("a"), open("b"), open("c")],
            ..PlanRequest::default()
        };
        let schedule = request.schedule_request(NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()).unwrap();
        assert_eq!(request.recipes_wanted(&schedule, MealType::Dinner), 3);
        assert_eq!(request.recipes_wanted(&schedule, MealType::Lunch), 0);

        request.distinct_recipe_counts.insert(MealType::Dinner, 2);
        assert_eq!(request.recipes_wanted(&schedule, MealType::Dinner), 2);
    }

    #[test]
    fn test_distinct_cap_without_slots_lays_out_implicit_slots() {
        let start = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let mut request = PlanRequest {
            meal_selection: MealCounts { dinner: 4, ..MealCounts::default() },
            ..PlanRequest::default()
        };
        let schedule = request.schedule_request(start).unwrap();
        assert!(schedule.slots.is_empty());
        assert_eq!(request.recipes_wanted(&schedule, MealType::Dinner), 4);

        request.distinct_recipe_counts.insert(MealType::Dinner, 2);
        let schedule = request.schedule_request(start).unwrap();
        let labels: Vec<&str> = schedule.slots.iter().map(|slot| slot.label.as_str()).collect();
        assert_eq!(labels, vec!["Mon dinner", "Tue dinner", "Wed dinner", "Thu dinner"]);
        assert_eq!(request.recipes_wanted(&schedule, MealType::Dinner), 2);
    }

    #[test]
    fn test_plan_request_from_json() {
        let json = r#"{
            "preferences": { "household_size": "2 people" },
            "meal_selection": { "dinner": 4 },
            "distinct_recipe_counts": { "dinner": 2 },
            "start_date": "2024-06-03"
        }"#;
        let request: PlanRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.meal_selection.dinner, 4);
        assert_eq!(request.distinct_recipe_counts.get(&MealType::Dinner), Some(&2));
        assert!(request.slots.is_empty());
        assert_eq!(request.start_date, NaiveDate::from_ymd_opt(2024, 6, 3));
    }
}
