use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::{Ledger, ShoppingList};
use crate::model::{Recipe, RecipeRef, ScheduleEntry};
use crate::preferences::Preferences;
use crate::quantity::KeyScheme;

/// A persisted meal plan: schedule, the recipes it references and the
/// consolidated shopping list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealPlan {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub start_date: NaiveDate,
    pub preferences: Preferences,
    pub recipes: Vec<Recipe>,
    pub schedule: Vec<ScheduleEntry>,
    pub shopping_list: ShoppingList,
    /// Plans written before unit aliasing existed have no scheme recorded
    /// and keep consolidating on exact unit text.
    #[serde(default)]
    pub key_scheme: KeyScheme,
}

impl MealPlan {
    pub fn recipe(&self, id: &RecipeRef) -> Option<&Recipe> {
        self.recipes.iter().find(|recipe| &recipe.id == id)
    }

    pub fn entries_for<'a>(&'a self, id: &'a RecipeRef) -> impl Iterator<Item = &'a ScheduleEntry> + 'a {
        self.schedule.iter().filter(move |entry| &entry.recipe_id == id)
    }

    /// Working ledger rebuilt from the stored shopping list.
    pub fn ledger(&self) -> Ledger {
        Ledger::from_serialized(&self.shopping_list, self.key_scheme)
    }

    /// Marks an item (matched by normalized name) checked or unchecked.
    pub fn set_checked(&mut self, item: &str, checked: bool) -> bool {
        self.shopping_list.set_checked(item, checked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ShoppingListEntry;
    use crate::model::{Day, MealType};

    fn sample_plan() -> MealPlan {
        MealPlan {
            id: "plan-1".to_string(),
            created_at: Utc::now(),
            start_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            preferences: Preferences::default(),
            recipes: Vec::new(),
            schedule: vec![ScheduleEntry {
                slot_label: "Mon dinner".to_string(),
                day: Day::Mon,
                meal_type: MealType::Dinner,
                recipe_id: RecipeRef::catalog("1"),
                portion_multiplier: 2,
            }],
            shopping_list: ShoppingList {
                items: vec![ShoppingListEntry { item: "tomatoes".into(), quantity: "3".into(), checked: false }],
                seasonings: Vec::new(),
            },
            key_scheme: KeyScheme::Canonical,
        }
    }

    #[test]
    fn test_missing_key_scheme_loads_as_legacy() {
        let mut json = serde_json::to_value(sample_plan()).unwrap();
        json.as_object_mut().unwrap().remove("key_scheme");
        let plan: MealPlan = serde_json::from_value(json).unwrap();
        assert_eq!(plan.key_scheme, KeyScheme::Legacy);
    }

    #[test]
    fn test_set_checked_by_name() {
        let mut plan = sample_plan();
        assert!(plan.set_checked("Tomato", true));
        assert!(plan.shopping_list.items[0].checked);
        assert!(!plan.set_checked("basil", true));
        assert_eq!(plan.entries_for(&RecipeRef::catalog("1")).count(), 1);
    }
}
