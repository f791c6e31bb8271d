//! Builds the search prompts handed to candidate retrieval so a week of
//! meals does not collapse onto a single protein.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::error::PlanError;
use crate::model::MealType;
use crate::preferences::Preferences;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPrompt {
    pub meal_type: MealType,
    pub primary_protein: String,
    pub phrase: String,
}

fn styles(meal_type: MealType) -> &'static [&'static str] {
    match meal_type {
        MealType::Breakfast => &["scrambled", "baked", "overnight", "griddled", "savory bowl"],
        MealType::Lunch => &["grain bowl", "wrap", "salad", "soup", "sandwich"],
        MealType::Dinner => &["sheet-pan", "stir-fry", "braised", "grilled", "one-pot", "roasted"],
    }
}

// Starts each meal type at a different protein so breakfasts and dinners
// don't open on the same one.
fn rotation_offset(meal_type: MealType) -> usize {
    match meal_type {
        MealType::Breakfast => 0,
        MealType::Lunch => 1,
        MealType::Dinner => 2,
    }
}

/// Upper bound on how often one protein may appear among `k` prompts
/// drawn from `distinct` proteins.
pub fn balance_limit(k: usize, distinct: usize) -> usize {
    if distinct == 0 {
        return k;
    }
    k.div_ceil(distinct)
}

/// `k` distinct search prompts for `meal_type`, rotating proteins
/// round-robin over the household's allowed proteins.
pub fn plan_prompts(preferences: &Preferences, meal_type: MealType, k: usize) -> Result<Vec<SearchPrompt>, PlanError> {
    preferences.validate()?;
    if k == 0 {
        return Ok(Vec::new());
    }
    let proteins = preferences.allowed_proteins();
    if proteins.is_empty() {
        return Err(PlanError::NoAllowedProteins);
    }

    let styles = styles(meal_type);
    let offset = rotation_offset(meal_type);
    let mut seen = HashSet::new();
    let mut prompts = Vec::with_capacity(k);

    for i in 0..k {
        let protein = &proteins[(offset + i) % proteins.len()];
        let style = styles[i % styles.len()];
        let mut phrase = format!("{} {} {}", style, protein, meal_type);
        if !preferences.cuisines.is_empty() {
            let cuisine = preferences.cuisines[i % preferences.cuisines.len()].trim();
            if !cuisine.is_empty() {
                phrase = format!("{} {}", cuisine, phrase);
            }
        }

        let mut unique = phrase.clone();
        let mut variation = 2;
        while !seen.insert(unique.to_lowercase()) {
            unique = format!("{} (variation {})", phrase, variation);
            variation += 1;
        }

        prompts.push(SearchPrompt { meal_type, primary_protein: protein.clone(), phrase: unique });
    }

    debug!(meal_type = %meal_type, count = prompts.len(), "planned search prompts");
    Ok(prompts)
}

/// Rejects batches with repeated phrases or a protein over its fair share.
pub fn validate_batch(prompts: &[SearchPrompt]) -> Result<(), PlanError> {
    let mut phrases = HashSet::new();
    let mut per_protein: HashMap<String, usize> = HashMap::new();

    for prompt in prompts {
        if !phrases.insert(prompt.phrase.trim().to_lowercase()) {
            return Err(PlanError::DuplicatePrompt(prompt.phrase.clone()));
        }
        *per_protein.entry(prompt.primary_protein.trim().to_lowercase()).or_insert(0) += 1;
    }

    let limit = balance_limit(prompts.len(), per_protein.len());
    let mut counts: Vec<(String, usize)> = per_protein.into_iter().collect();
    counts.sort();
    if let Some((protein, count)) = counts.into_iter().find(|(_, count)| *count > limit) {
        return Err(PlanError::UnbalancedPrompts { protein, count, limit });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::DietaryRestriction;

    fn prompt(protein: &str, phrase: &str) -> SearchPrompt {
        SearchPrompt { meal_type: MealType::Dinner, primary_protein: protein.to_string(), phrase: phrase.to_string() }
    }

    #[test]
    fn test_prompts_are_distinct_and_balanced() {
        let prefs = Preferences {
            proteins: vec!["chicken".into(), "tofu".into(), "salmon".into()],
            cuisines: vec!["Thai".into()],
            ..Preferences::default()
        };
        let prompts = plan_prompts(&prefs, MealType::Dinner, 7).unwrap();
        assert_eq!(prompts.len(), 7);
        assert!(validate_batch(&prompts).is_ok());
        assert!(prompts.iter().all(|p| p.phrase.starts_with("Thai ") && p.phrase.ends_with("dinner")));

        let chicken = prompts.iter().filter(|p| p.primary_protein == "chicken").count();
        assert!(chicken <= balance_limit(7, 3));
    }

    #[test]
    fn test_meal_types_start_on_different_proteins() {
        let prefs = Preferences::default();
        let breakfast = plan_prompts(&prefs, MealType::Breakfast, 1).unwrap();
        let dinner = plan_prompts(&prefs, MealType::Dinner, 1).unwrap();
        assert_ne!(breakfast[0].primary_protein, dinner[0].primary_protein);
    }

    #[test]
    fn test_single_protein_repeats_get_variation_suffix() {
        let prefs = Preferences { proteins: vec!["eggs".into()], ..Preferences::default() };
        let prompts = plan_prompts(&prefs, MealType::Breakfast, 6).unwrap();
        assert_eq!(prompts.len(), 6);
        assert_eq!(prompts[5].phrase, "scrambled eggs breakfast (variation 2)");
        assert!(validate_batch(&prompts).is_ok());
    }

    #[test]
    fn test_restrictions_that_exclude_everything() {
        let prefs = Preferences {
            restrictions: vec![DietaryRestriction::Vegan],
            dislikes: vec!["tofu".into(), "chickpeas".into(), "lentils".into()],
            ..Preferences::default()
        };
        assert!(matches!(plan_prompts(&prefs, MealType::Lunch, 3), Err(PlanError::NoAllowedProteins)));
        assert!(plan_prompts(&prefs, MealType::Lunch, 0).unwrap().is_empty());
    }

    #[test]
    fn test_validate_batch_rejects_duplicates() {
        let batch = vec![prompt("beef", "grilled beef dinner"), prompt("pork", "Grilled Beef Dinner ")];
        assert!(matches!(validate_batch(&batch), Err(PlanError::DuplicatePrompt(_))));
    }

    #[test]
    fn test_validate_batch_rejects_lopsided_proteins() {
        let batch = vec![
            prompt("beef", "grilled beef dinner"),
            prompt("beef", "braised beef dinner"),
            prompt("beef", "roasted beef dinner"),
            prompt("tofu", "stir-fry tofu dinner"),
        ];
        match validate_batch(&batch) {
            Err(PlanError::UnbalancedPrompts { protein, count, limit }) => {
                assert_eq!(protein, "beef");
                assert_eq!(count, 3);
                assert_eq!(limit, 2);
            }
            other => panic!("expected unbalanced batch, got {:?}", other),
        }
    }
}
