use thiserror::Error;

use crate::model::{MealType, RecipeRef};

/// Failures surfaced by plan generation and replacement.
///
/// Everything except `Collaborator` is a validation failure of the request
/// itself; nothing is committed when one is returned.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("recipe pool is empty")]
    EmptyRecipePool,

    #[error("plan request does not ask for any meals")]
    EmptyRequest,

    #[error("portion multiplier must be at least 1, got {0}")]
    InvalidPortion(u32),

    #[error("expected {expected} slots for the selected meals, got {actual}")]
    SlotCountMismatch { expected: u32, actual: usize },

    #[error("distinct recipe count for {0} must be at least 1")]
    InvalidDistinctCount(MealType),

    #[error("requested meal counts are too large")]
    MealCountOverflow,

    #[error("servings for recipe {0} are too large")]
    ServingsOverflow(RecipeRef),

    #[error("unsupported preferences version {found} (latest supported is {supported})")]
    UnsupportedPreferencesVersion { found: u32, supported: u32 },

    #[error("the current preferences rule out every protein")]
    NoAllowedProteins,

    #[error("search prompt '{0}' appears more than once in the batch")]
    DuplicatePrompt(String),

    #[error("protein '{protein}' appears {count} times in a batch, limit is {limit}")]
    UnbalancedPrompts { protein: String, count: usize, limit: usize },

    #[error("recipe {0} is not part of this plan")]
    UnknownRecipe(RecipeRef),

    #[error("recipe {0} has no scheduled entries")]
    NoScheduledEntries(RecipeRef),

    #[error("cannot replace recipe {0} with itself")]
    SameRecipe(RecipeRef),

    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}
