use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealType {
    pub const ALL: [MealType; 3] = [MealType::Breakfast, MealType::Lunch, MealType::Dinner];

    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            other => Err(format!("unknown meal type '{}'", other)),
        }
    }
}

/// Day a slot is eaten on. `Unscheduled` slots still need a recipe but have
/// no fixed weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Day {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
    Unscheduled,
}

impl Day {
    pub fn from_weekday(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => Day::Mon,
            Weekday::Tue => Day::Tue,
            Weekday::Wed => Day::Wed,
            Weekday::Thu => Day::Thu,
            Weekday::Fri => Day::Fri,
            Weekday::Sat => Day::Sat,
            Weekday::Sun => Day::Sun,
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self::from_weekday(date.weekday())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Day::Mon => "Mon",
            Day::Tue => "Tue",
            Day::Wed => "Wed",
            Day::Thu => "Thu",
            Day::Fri => "Fri",
            Day::Sat => "Sat",
            Day::Sun => "Sun",
            Day::Unscheduled => "Unscheduled",
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which identity space a recipe id belongs to. Catalog ids come from the
/// candidate catalog, modified ids from generated variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipeKind {
    Catalog,
    Modified,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecipeRef {
    pub kind: RecipeKind,
    pub id: String,
}

impl RecipeRef {
    pub fn catalog(id: impl Into<String>) -> Self {
        Self { kind: RecipeKind::Catalog, id: id.into() }
    }

    pub fn modified(id: impl Into<String>) -> Self {
        Self { kind: RecipeKind::Modified, id: id.into() }
    }
}

impl fmt::Display for RecipeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            RecipeKind::Catalog => "catalog",
            RecipeKind::Modified => "modified",
        };
        write!(f, "{}:{}", kind, self.id)
    }
}

impl FromStr for RecipeRef {
    type Err = String;

    /// Parses the `kind:id` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| format!("recipe reference '{}' must look like 'catalog:<id>' or 'modified:<id>'", s))?;
        let id = id.trim();
        if id.is_empty() {
            return Err(format!("recipe reference '{}' has an empty id", s));
        }
        match kind.trim().to_lowercase().as_str() {
            "catalog" => Ok(RecipeRef::catalog(id)),
            "modified" => Ok(RecipeRef::modified(id)),
            other => Err(format!("unknown recipe kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub item: String,
    pub quantity: String,
}

impl Ingredient {
    pub fn new(item: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self { item: item.into(), quantity: quantity.into() }
    }
}

fn default_servings() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeRef,
    pub name: String,
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub steps: Vec<String>,
    pub meal_type: MealType,
    /// Written by the scheduler: the sum of portion multipliers over every
    /// schedule entry that references this recipe.
    #[serde(default = "default_servings")]
    pub servings: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_protein: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub day: Day,
    pub meal_type: MealType,
    pub label: String,
    /// Pins the slot to a specific pool recipe instead of letting the
    /// scheduler choose.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe_ref: Option<RecipeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub slot_label: String,
    pub day: Day,
    pub meal_type: MealType,
    pub recipe_id: RecipeRef,
    pub portion_multiplier: u32,
}
