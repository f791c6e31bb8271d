//! Slot scheduling: every requested slot gets exactly one recipe and each
//! recipe's `servings` becomes the sum of the portions assigned to it.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

use crate::error::PlanError;
use crate::model::{Day, MealType, Recipe, RecipeRef, ScheduleEntry, Slot};
use crate::preferences::HouseholdSize;

/// Candidate recipes per meal type, in preference order.
pub type RecipePool = BTreeMap<MealType, Vec<Recipe>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MealCounts {
    #[serde(default)]
    pub breakfast: u32,
    #[serde(default)]
    pub lunch: u32,
    #[serde(default)]
    pub dinner: u32,
}

impl MealCounts {
    pub fn get(&self, meal_type: MealType) -> u32 {
        match meal_type {
            MealType::Breakfast => self.breakfast,
            MealType::Lunch => self.lunch,
            MealType::Dinner => self.dinner,
        }
    }

    /// `None` when the counts don't fit in a `u32`.
    pub fn total(&self) -> Option<u32> {
        self.breakfast.checked_add(self.lunch)?.checked_add(self.dinner)
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub meal_selection: MealCounts,
    /// Unique recipes wanted per type. Missing types use their whole pool.
    pub distinct_recipe_counts: BTreeMap<MealType, u32>,
    /// Authoritative when non-empty.
    pub slots: Vec<Slot>,
    pub household: HouseholdSize,
    pub portion_override: Option<u32>,
    pub start_date: NaiveDate,
}

impl ScheduleRequest {
    /// Slots requested per meal type, from the slot list when there is one.
    pub fn slot_counts(&self) -> MealCounts {
        if self.slots.is_empty() {
            return self.meal_selection;
        }
        let mut counts = MealCounts::default();
        for slot in &self.slots {
            match slot.meal_type {
                MealType::Breakfast => counts.breakfast += 1,
                MealType::Lunch => counts.lunch += 1,
                MealType::Dinner => counts.dinner += 1,
            }
        }
        counts
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        if let Some(0) = self.portion_override {
            return Err(PlanError::InvalidPortion(0));
        }
        let expected = self.meal_selection.total().ok_or(PlanError::MealCountOverflow)?;
        if self.slots.is_empty() && expected == 0 {
            return Err(PlanError::EmptyRequest);
        }
        if !self.slots.is_empty() && expected > 0 && self.slots.len() != expected as usize {
            return Err(PlanError::SlotCountMismatch { expected, actual: self.slots.len() });
        }
        let counts = self.slot_counts();
        for meal_type in MealType::ALL {
            if counts.get(meal_type) > 0 && self.distinct_recipe_counts.get(&meal_type) == Some(&0) {
                return Err(PlanError::InvalidDistinctCount(meal_type));
            }
        }
        Ok(())
    }

    fn portion(&self) -> u32 {
        self.portion_override.unwrap_or_else(|| self.household.portion_multiplier())
    }

    /// Whether a distinct count asks for fewer recipes than meals of its
    /// type, which only the slot mode can satisfy.
    pub fn needs_reuse(&self) -> bool {
        MealType::ALL.into_iter().any(|meal_type| {
            matches!(self.distinct_recipe_counts.get(&meal_type), Some(&distinct) if distinct < self.meal_selection.get(meal_type))
        })
    }
}

/// The slot the implicit mode would fill for the `index`-th meal of a type.
pub fn implicit_slot(start_date: NaiveDate, meal_type: MealType, index: usize) -> Slot {
    let day = Day::from_date(start_date + Duration::days((index % 7) as i64));
    Slot { day, meal_type, label: format!("{} {}", day, meal_type), recipe_ref: None }
}

/// Every meal in `meal_selection` as an unpinned slot, laid out the way
/// the implicit mode lays them out.
pub fn implicit_slots(meal_selection: &MealCounts, start_date: NaiveDate) -> Vec<Slot> {
    MealType::ALL
        .into_iter()
        .flat_map(|meal_type| (0..meal_selection.get(meal_type) as usize).map(move |index| implicit_slot(start_date, meal_type, index)))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub entries: Vec<ScheduleEntry>,
    /// Referenced recipes only, in first-use order, with `servings` written.
    pub recipes: Vec<Recipe>,
    /// Labels of slots dropped because their recipe could not be resolved.
    pub dropped: Vec<String>,
}

pub fn build_schedule(request: &ScheduleRequest, pool: &RecipePool) -> Result<Schedule, PlanError> {
    request.validate()?;
    if pool.values().all(|recipes| recipes.is_empty()) {
        return Err(PlanError::EmptyRecipePool);
    }

    let portion = request.portion();
    let (entries, dropped) = if request.slots.is_empty() {
        (round_robin_entries(request, pool, portion), Vec::new())
    } else {
        slot_entries(request, pool, portion)
    };

    let recipes = tally_servings(&entries, pool)?;
    info!(
        entries = entries.len(),
        recipes = recipes.len(),
        dropped = dropped.len(),
        "schedule built"
    );
    Ok(Schedule { entries, recipes, dropped })
}

fn distinct_candidates<'a>(request: &ScheduleRequest, pool: &'a RecipePool, meal_type: MealType) -> &'a [Recipe] {
    let candidates = pool.get(&meal_type).map(Vec::as_slice).unwrap_or(&[]);
    match request.distinct_recipe_counts.get(&meal_type) {
        Some(&count) if (count as usize) < candidates.len() => &candidates[..count as usize],
        _ => candidates,
    }
}

fn slot_entries(request: &ScheduleRequest, pool: &RecipePool, portion: u32) -> (Vec<ScheduleEntry>, Vec<String>) {
    let mut cursors: HashMap<MealType, usize> = HashMap::new();
    let mut entries = Vec::with_capacity(request.slots.len());
    let mut dropped = Vec::new();

    for slot in &request.slots {
        let recipe_id = match &slot.recipe_ref {
            Some(pinned) => {
                let found = pool
                    .get(&slot.meal_type)
                    .and_then(|recipes| recipes.iter().find(|recipe| &recipe.id == pinned));
                match found {
                    Some(recipe) => recipe.id.clone(),
                    None => {
                        warn!(slot = %slot.label, recipe = %pinned, "pinned recipe not in pool, dropping slot");
                        dropped.push(slot.label.clone());
                        continue;
                    }
                }
            }
            None => {
                let candidates = distinct_candidates(request, pool, slot.meal_type);
                if candidates.is_empty() {
                    warn!(slot = %slot.label, meal_type = %slot.meal_type, "no candidates for meal type, dropping slot");
                    dropped.push(slot.label.clone());
                    continue;
                }
                let cursor = cursors.entry(slot.meal_type).or_insert(0);
                let recipe = &candidates[*cursor % candidates.len()];
                *cursor += 1;
                recipe.id.clone()
            }
        };

        entries.push(ScheduleEntry {
            slot_label: slot.label.clone(),
            day: slot.day,
            meal_type: slot.meal_type,
            recipe_id,
            portion_multiplier: portion,
        });
    }

    (entries, dropped)
}

fn round_robin_entries(request: &ScheduleRequest, pool: &RecipePool, portion: u32) -> Vec<ScheduleEntry> {
    let mut entries = Vec::new();
    for meal_type in MealType::ALL {
        let wanted = request.meal_selection.get(meal_type) as usize;
        let candidates = pool.get(&meal_type).map(Vec::as_slice).unwrap_or(&[]);
        if wanted > candidates.len() {
            warn!(
                meal_type = %meal_type,
                wanted,
                available = candidates.len(),
                "not enough recipes for implicit schedule, scheduling what is available"
            );
        }
        for (index, recipe) in candidates.iter().take(wanted).enumerate() {
            let slot = implicit_slot(request.start_date, meal_type, index);
            entries.push(ScheduleEntry {
                slot_label: slot.label,
                day: slot.day,
                meal_type,
                recipe_id: recipe.id.clone(),
                portion_multiplier: portion,
            });
        }
    }
    entries
}

/// Sum of portions, `None` on overflow.
pub fn sum_portions(portions: impl IntoIterator<Item = u32>) -> Option<u32> {
    portions.into_iter().try_fold(0u32, u32::checked_add)
}

fn tally_servings(entries: &[ScheduleEntry], pool: &RecipePool) -> Result<Vec<Recipe>, PlanError> {
    let mut servings: HashMap<&RecipeRef, u32> = HashMap::new();
    let mut order: Vec<&RecipeRef> = Vec::new();
    for entry in entries {
        let total = servings.entry(&entry.recipe_id).or_insert_with(|| {
            order.push(&entry.recipe_id);
            0
        });
        *total = total
            .checked_add(entry.portion_multiplier)
            .ok_or_else(|| PlanError::ServingsOverflow(entry.recipe_id.clone()))?;
    }

    Ok(order
        .into_iter()
        .filter_map(|id| {
            let recipe = pool.values().flatten().find(|recipe| &recipe.id == id)?;
            let mut scheduled = recipe.clone();
            scheduled.servings = servings[id];
            Some(scheduled)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Ingredient;

    fn recipe(id: &str, meal_type: MealType) -> Recipe {
        Recipe {
            id: RecipeRef::catalog(id),
            name: format!("Recipe {}", id),
            ingredients: vec![Ingredient::new("rice", "1 cup")],
            steps: Vec::new(),
            meal_type,
            servings: 1,
            primary_protein: None,
        }
    }

    fn slot(day: Day, meal_type: MealType, label: &str) -> Slot {
        Slot { day, meal_type, label: label.to_string(), recipe_ref: None }
    }

    fn request(slots: Vec<Slot>) -> ScheduleRequest {
        ScheduleRequest {
            meal_selection: MealCounts::default(),
            distinct_recipe_counts: BTreeMap::new(),
            slots,
            household: HouseholdSize::JustMe,
            portion_override: None,
            start_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        }
    }

    fn servings_match_entries(schedule: &Schedule) {
        for recipe in &schedule.recipes {
            let sum: u32 = schedule
                .entries
                .iter()
                .filter(|entry| entry.recipe_id == recipe.id)
                .map(|entry| entry.portion_multiplier)
                .sum();
            assert_eq!(sum, recipe.servings, "servings mismatch for {}", recipe.id);
        }
    }

    #[test]
    fn test_four_dinners_from_two_recipes() {
        let slots = vec![
            slot(Day::Mon, MealType::Dinner, "Mon dinner"),
            slot(Day::Tue, MealType::Dinner, "Tue dinner"),
            slot(Day::Wed, MealType::Dinner, "Wed dinner"),
            slot(Day::Thu, MealType::Dinner, "Thu dinner"),
        ];
        let mut req = request(slots);
        req.meal_selection.dinner = 4;
        req.distinct_recipe_counts.insert(MealType::Dinner, 2);
        let pool: RecipePool = [(MealType::Dinner, vec![recipe("d1", MealType::Dinner), recipe("d2", MealType::Dinner)])].into();

        let schedule = build_schedule(&req, &pool).unwrap();
        assert_eq!(schedule.entries.len(), 4);
        assert!(schedule
            .entries
            .iter()
            .all(|e| e.recipe_id == RecipeRef::catalog("d1") || e.recipe_id == RecipeRef::catalog("d2")));
        let total: u32 = schedule.recipes.iter().map(|r| r.servings).sum();
        assert_eq!(total, 4);
        servings_match_entries(&schedule);

        let labels: Vec<&str> = schedule.entries.iter().map(|e| e.slot_label.as_str()).collect();
        assert_eq!(labels, vec!["Mon dinner", "Tue dinner", "Wed dinner", "Thu dinner"]);
    }

    #[test]
    fn test_distinct_count_limits_recipes_used() {
        let slots = (0..3).map(|i| slot(Day::Unscheduled, MealType::Lunch, &format!("lunch {}", i))).collect();
        let mut req = request(slots);
        req.distinct_recipe_counts.insert(MealType::Lunch, 1);
        req.household = HouseholdSize::Two;
        let pool: RecipePool = [(MealType::Lunch, vec![recipe("l1", MealType::Lunch), recipe("l2", MealType::Lunch)])].into();

        let schedule = build_schedule(&req, &pool).unwrap();
        assert_eq!(schedule.recipes.len(), 1);
        assert_eq!(schedule.recipes[0].id, RecipeRef::catalog("l1"));
        assert_eq!(schedule.recipes[0].servings, 6);
        servings_match_entries(&schedule);
    }

    #[test]
    fn test_unresolvable_slot_is_dropped_not_fatal() {
        let mut pinned = slot(Day::Fri, MealType::Dinner, "Fri dinner");
        pinned.recipe_ref = Some(RecipeRef::modified("missing"));
        let slots = vec![slot(Day::Mon, MealType::Dinner, "Mon dinner"), pinned, slot(Day::Sat, MealType::Breakfast, "Sat breakfast")];
        let req = request(slots);
        let pool: RecipePool = [(MealType::Dinner, vec![recipe("d1", MealType::Dinner)])].into();

        let schedule = build_schedule(&req, &pool).unwrap();
        assert_eq!(schedule.entries.len(), 1);
        assert_eq!(schedule.dropped, vec!["Fri dinner", "Sat breakfast"]);
        servings_match_entries(&schedule);
    }

    #[test]
    fn test_pinned_slot_uses_its_recipe() {
        let mut pinned = slot(Day::Mon, MealType::Dinner, "Mon dinner");
        pinned.recipe_ref = Some(RecipeRef::catalog("d2"));
        let req = request(vec![pinned, slot(Day::Tue, MealType::Dinner, "Tue dinner")]);
        let pool: RecipePool = [(MealType::Dinner, vec![recipe("d1", MealType::Dinner), recipe("d2", MealType::Dinner)])].into();

        let schedule = build_schedule(&req, &pool).unwrap();
        assert_eq!(schedule.entries[0].recipe_id, RecipeRef::catalog("d2"));
        assert_eq!(schedule.entries[1].recipe_id, RecipeRef::catalog("d1"));
    }

    #[test]
    fn test_implicit_round_robin_without_slots() {
        let mut req = request(Vec::new());
        req.meal_selection.dinner = 9;
        req.portion_override = Some(2);
        let dinners: Vec<Recipe> = (0..9).map(|i| recipe(&format!("d{}", i), MealType::Dinner)).collect();
        let pool: RecipePool = [(MealType::Dinner, dinners)].into();

        let schedule = build_schedule(&req, &pool).unwrap();
        assert_eq!(schedule.entries.len(), 9);
        assert_eq!(schedule.recipes.len(), 9);
        assert!(schedule.recipes.iter().all(|r| r.servings == 2));
        assert_eq!(schedule.entries[0].day, Day::Mon);
        assert_eq!(schedule.entries[6].day, Day::Sun);
        assert_eq!(schedule.entries[7].day, Day::Mon);
    }

    #[test]
    fn test_implicit_slots_match_implicit_entries() {
        let mut req = request(Vec::new());
        req.meal_selection = MealCounts { breakfast: 1, lunch: 0, dinner: 8 };
        let slots = implicit_slots(&req.meal_selection, req.start_date);
        assert_eq!(slots.len(), 9);
        assert_eq!(slots[0].label, "Mon breakfast");
        assert_eq!(slots[1].label, "Mon dinner");
        assert_eq!(slots[8].label, "Mon dinner");
        assert!(slots.iter().all(|slot| slot.recipe_ref.is_none()));

        assert!(!req.needs_reuse());
        req.distinct_recipe_counts.insert(MealType::Dinner, 8);
        assert!(!req.needs_reuse());
        req.distinct_recipe_counts.insert(MealType::Dinner, 2);
        assert!(req.needs_reuse());
    }

    #[test]
    fn test_implicit_schedule_stops_when_pool_runs_out() {
        let mut req = request(Vec::new());
        req.meal_selection.breakfast = 3;
        let pool: RecipePool = [(MealType::Breakfast, vec![recipe("b1", MealType::Breakfast)])].into();
        let schedule = build_schedule(&req, &pool).unwrap();
        assert_eq!(schedule.entries.len(), 1);
    }

    #[test]
    fn test_validation_failures() {
        let pool: RecipePool = [(MealType::Dinner, vec![recipe("d1", MealType::Dinner)])].into();

        let req = request(Vec::new());
        assert!(matches!(build_schedule(&req, &pool), Err(PlanError::EmptyRequest)));

        let mut req = request(vec![slot(Day::Mon, MealType::Dinner, "Mon dinner")]);
        req.portion_override = Some(0);
        assert!(matches!(build_schedule(&req, &pool), Err(PlanError::InvalidPortion(0))));

        let mut req = request(vec![slot(Day::Mon, MealType::Dinner, "Mon dinner")]);
        req.meal_selection.dinner = 2;
        assert!(matches!(build_schedule(&req, &pool), Err(PlanError::SlotCountMismatch { expected: 2, actual: 1 })));

        let mut req = request(vec![slot(Day::Mon, MealType::Dinner, "Mon dinner")]);
        req.distinct_recipe_counts.insert(MealType::Dinner, 0);
        assert!(matches!(build_schedule(&req, &pool), Err(PlanError::InvalidDistinctCount(MealType::Dinner))));

        let req = request(vec![slot(Day::Mon, MealType::Dinner, "Mon dinner")]);
        assert!(matches!(build_schedule(&req, &RecipePool::new()), Err(PlanError::EmptyRecipePool)));

        let mut req = request(Vec::new());
        req.meal_selection = MealCounts { breakfast: u32::MAX, lunch: 1, dinner: 0 };
        assert!(matches!(build_schedule(&req, &pool), Err(PlanError::MealCountOverflow)));
    }

    #[test]
    fn test_servings_overflow_is_an_error() {
        let mut req = request(vec![slot(Day::Mon, MealType::Dinner, "Mon dinner"), slot(Day::Tue, MealType::Dinner, "Tue dinner")]);
        req.portion_override = Some(u32::MAX);
        req.distinct_recipe_counts.insert(MealType::Dinner, 1);
        let pool: RecipePool = [(MealType::Dinner, vec![recipe("d1", MealType::Dinner)])].into();

        let err = build_schedule(&req, &pool).unwrap_err();
        assert!(matches!(err, PlanError::ServingsOverflow(id) if id == RecipeRef::catalog("d1")));
    }

    #[test]
    fn test_sum_portions() {
        assert_eq!(sum_portions([2, 2, 3]), Some(7));
        assert_eq!(sum_portions([]), Some(0));
        assert_eq!(sum_portions([u32::MAX, 1]), None);
    }
}
