use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PlanError;

pub const PREFERENCES_VERSION: u32 = 1;

fn current_version() -> u32 {
    PREFERENCES_VERSION
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HouseholdSize {
    #[default]
    #[serde(rename = "Just me")]
    JustMe,
    #[serde(rename = "2 people")]
    Two,
    #[serde(rename = "3-4 people")]
    ThreeToFour,
    #[serde(rename = "5+ people")]
    FivePlus,
}

impl HouseholdSize {
    /// Portions cooked per slot for this household.
    pub fn portion_multiplier(&self) -> u32 {
        match self {
            HouseholdSize::JustMe => 1,
            HouseholdSize::Two => 2,
            HouseholdSize::ThreeToFour => 3,
            HouseholdSize::FivePlus => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HouseholdSize::JustMe => "Just me",
            HouseholdSize::Two => "2 people",
            HouseholdSize::ThreeToFour => "3-4 people",
            HouseholdSize::FivePlus => "5+ people",
        }
    }
}

impl fmt::Display for HouseholdSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for HouseholdSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [HouseholdSize::JustMe, HouseholdSize::Two, HouseholdSize::ThreeToFour, HouseholdSize::FivePlus]
            .into_iter()
            .find(|size| size.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown household size '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DietaryRestriction {
    Vegetarian,
    Vegan,
    Pescatarian,
    GlutenFree,
    DairyFree,
    NutFree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProteinKind {
    Meat,
    Seafood,
    Egg,
    Plant,
}

const DEFAULT_PROTEINS: &[(&str, ProteinKind)] = &[
    ("chicken", ProteinKind::Meat),
    ("salmon", ProteinKind::Seafood),
    ("tofu", ProteinKind::Plant),
    ("beef", ProteinKind::Meat),
    ("shrimp", ProteinKind::Seafood),
    ("chickpeas", ProteinKind::Plant),
    ("pork", ProteinKind::Meat),
    ("eggs", ProteinKind::Egg),
    ("lentils", ProteinKind::Plant),
    ("turkey", ProteinKind::Meat),
];

impl DietaryRestriction {
    fn allows(&self, kind: ProteinKind) -> bool {
        match self {
            DietaryRestriction::Vegetarian => matches!(kind, ProteinKind::Egg | ProteinKind::Plant),
            DietaryRestriction::Vegan => kind == ProteinKind::Plant,
            DietaryRestriction::Pescatarian => kind != ProteinKind::Meat,
            DietaryRestriction::GlutenFree | DietaryRestriction::DairyFree | DietaryRestriction::NutFree => true,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DietaryRestriction::Vegetarian => "vegetarian",
            DietaryRestriction::Vegan => "vegan",
            DietaryRestriction::Pescatarian => "pescatarian",
            DietaryRestriction::GlutenFree => "gluten-free",
            DietaryRestriction::DairyFree => "dairy-free",
            DietaryRestriction::NutFree => "nut-free",
        }
    }
}

/// Survey answers that drive candidate search and recipe drafting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub household_size: HouseholdSize,
    #[serde(default)]
    pub cuisines: Vec<String>,
    /// Proteins the household wants rotated through. Empty means the default
    /// rotation filtered by `restrictions`.
    #[serde(default)]
    pub proteins: Vec<String>,
    #[serde(default)]
    pub restrictions: Vec<DietaryRestriction>,
    #[serde(default)]
    pub dislikes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            version: PREFERENCES_VERSION,
            household_size: HouseholdSize::default(),
            cuisines: Vec::new(),
            proteins: Vec::new(),
            restrictions: Vec::new(),
            dislikes: Vec::new(),
            notes: None,
        }
    }
}

impl Preferences {
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.version == 0 || self.version > PREFERENCES_VERSION {
            return Err(PlanError::UnsupportedPreferencesVersion {
                found: self.version,
                supported: PREFERENCES_VERSION,
            });
        }
        Ok(())
    }

    fn dislikes(&self, protein: &str) -> bool {
        self.dislikes.iter().any(|dislike| dislike.trim().eq_ignore_ascii_case(protein.trim()))
    }

    pub fn allowed_proteins(&self) -> Vec<String> {
        if !self.proteins.is_empty() {
            return self
                .proteins
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty() && !self.dislikes(p))
                .collect();
        }
        DEFAULT_PROTEINS
            .iter()
            .filter(|(_, kind)| self.restrictions.iter().all(|r| r.allows(*kind)))
            .map(|(name, _)| name.to_string())
            .filter(|name| !self.dislikes(name))
            .collect()
    }

    /// One-paragraph description handed to the recipe generator.
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("Household: {}", self.household_size)];
        if !self.cuisines.is_empty() {
            parts.push(format!("Preferred cuisines: {}", self.cuisines.join(", ")));
        }
        if !self.restrictions.is_empty() {
            let labels: Vec<&str> = self.restrictions.iter().map(|r| r.label()).collect();
            parts.push(format!("Dietary restrictions: {}", labels.join(", ")));
        }
        if !self.dislikes.is_empty() {
            parts.push(format!("Avoid: {}", self.dislikes.join(", ")));
        }
        if let Some(notes) = self.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            parts.push(format!("Notes: {}", notes.trim()));
        }
        parts.join(". ")
    }
}
