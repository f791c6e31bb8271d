//! Swapping one scheduled recipe for another.
//!
//! Every schedule entry that points at the old recipe is repointed at the
//! new one and the shopping list is patched by subtracting the old recipe
//! and adding the new one, instead of being rebuilt. The plan is only
//! written once all of that has succeeded on working copies.

use tracing::{debug, info};

use crate::error::PlanError;
use crate::ledger::Sign;
use crate::model::{Recipe, RecipeRef};
use crate::plan::MealPlan;
use crate::scheduler::sum_portions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementStage {
    Idle,
    Validating,
    Computing,
    Reassigning,
    Committing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementOutcome {
    pub old_id: RecipeRef,
    pub new_id: RecipeRef,
    /// Schedule entries moved from the old recipe to the new one.
    pub reassigned: usize,
    /// Servings the new recipe carries after the swap.
    pub servings: u32,
    pub stage: ReplacementStage,
}

struct Replacement<'a> {
    plan: &'a mut MealPlan,
    stage: ReplacementStage,
}

impl<'a> Replacement<'a> {
    fn advance(&mut self, next: ReplacementStage) {
        debug!(plan = %self.plan.id, from = ?self.stage, to = ?next, "replacement stage");
        self.stage = next;
    }
}

/// Replaces `old_id` with `new_recipe` everywhere in `plan`.
///
/// The incoming recipe's `servings` is ignored: it takes over the portions
/// of the entries it inherits (plus its own, if it was already scheduled).
/// On error the plan is left exactly as it was. The caller persists the
/// plan afterwards.
pub fn replace_recipe(plan: &mut MealPlan, old_id: &RecipeRef, new_recipe: Recipe) -> Result<ReplacementOutcome, PlanError> {
    let mut run = Replacement { plan, stage: ReplacementStage::Idle };

    run.advance(ReplacementStage::Validating);
    if &new_recipe.id == old_id {
        return Err(PlanError::SameRecipe(old_id.clone()));
    }
    let old_recipe = run.plan.recipe(old_id).cloned().ok_or_else(|| PlanError::UnknownRecipe(old_id.clone()))?;
    let moved: Vec<usize> = run
        .plan
        .schedule
        .iter()
        .enumerate()
        .filter(|(_, entry)| &entry.recipe_id == old_id)
        .map(|(index, _)| index)
        .collect();
    if moved.is_empty() {
        return Err(PlanError::NoScheduledEntries(old_id.clone()));
    }
    let moved_servings = sum_portions(moved.iter().map(|&index| run.plan.schedule[index].portion_multiplier))
        .ok_or_else(|| PlanError::ServingsOverflow(old_id.clone()))?;

    if new_recipe.servings != moved_servings {
        debug!(
            recipe = %new_recipe.id,
            given = new_recipe.servings,
            scheduled = moved_servings,
            "ignoring servings on replacement recipe"
        );
    }

    run.advance(ReplacementStage::Computing);
    let previous = run.plan.ledger();
    let mut ledger = previous.clone();
    ledger.apply_recipe(&old_recipe, moved_servings, Sign::Subtract);
    ledger.apply_recipe(&new_recipe, moved_servings, Sign::Add);

    run.advance(ReplacementStage::Reassigning);
    let mut schedule = run.plan.schedule.clone();
    for &index in &moved {
        schedule[index].recipe_id = new_recipe.id.clone();
    }

    let mut recipes = Vec::with_capacity(run.plan.recipes.len());
    let mut new_servings = moved_servings;
    let already_scheduled = run.plan.recipes.iter().any(|recipe| recipe.id == new_recipe.id);
    for recipe in &run.plan.recipes {
        if &recipe.id == old_id {
            if !already_scheduled {
                let mut replacement = new_recipe.clone();
                replacement.servings = moved_servings;
                recipes.push(replacement);
            }
        } else if recipe.id == new_recipe.id {
            let mut merged = recipe.clone();
            merged.servings = merged
                .servings
                .checked_add(moved_servings)
                .ok_or_else(|| PlanError::ServingsOverflow(new_recipe.id.clone()))?;
            new_servings = merged.servings;
            recipes.push(merged);
        } else {
            recipes.push(recipe.clone());
        }
    }

    run.advance(ReplacementStage::Committing);
    ledger.preserve_checked(&previous);
    let shopping_list = ledger.serialize();

    run.plan.schedule = schedule;
    run.plan.recipes = recipes;
    run.plan.shopping_list = shopping_list;
    run.advance(ReplacementStage::Done);

    info!(
        plan = %run.plan.id,
        old = %old_id,
        new = %new_recipe.id,
        reassigned = moved.len(),
        servings = new_servings,
        "recipe replaced"
    );

    Ok(ReplacementOutcome {
        old_id: old_id.clone(),
        new_id: new_recipe.id,
        reassigned: moved.len(),
        servings: new_servings,
        stage: run.stage,
    })
}
