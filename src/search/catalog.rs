use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::model::{Ingredient, MealType, Recipe, RecipeRef};

/// One row of the recipe catalog CSV.
///
/// `ingredients` is `item=quantity` pairs separated by `;`, `steps` is
/// separated by `|`.
#[derive(Debug, Deserialize)]
struct CatalogRow {
    id: String,
    name: String,
    meal_type: String,
    #[serde(default)]
    primary_protein: String,
    ingredients: String,
    #[serde(default)]
    steps: String,
}

pub fn parse_ingredient_list(raw: &str) -> Vec<Ingredient> {
    raw.split(';')
        .filter_map(|pair| {
            let pair = pair.trim();
            if pair.is_empty() {
                return None;
            }
            let (item, quantity) = pair.split_once('=').unwrap_or((pair, ""));
            let item = item.trim();
            (!item.is_empty()).then(|| Ingredient::new(item, quantity.trim()))
        })
        .collect()
}

fn parse_row(row: CatalogRow) -> Result<Recipe> {
    let meal_type: MealType = row.meal_type.parse().map_err(anyhow::Error::msg)?;
    let protein = row.primary_protein.trim().to_lowercase();
    Ok(Recipe {
        id: RecipeRef::catalog(row.id.trim()),
        name: row.name.trim().to_string(),
        ingredients: parse_ingredient_list(&row.ingredients),
        steps: row
            .steps
            .split('|')
            .map(str::trim)
            .filter(|step| !step.is_empty())
            .map(str::to_string)
            .collect(),
        meal_type,
        servings: 1,
        primary_protein: (!protein.is_empty()).then_some(protein),
    })
}

pub fn read_recipe_catalog<R: Read>(reader: R) -> Result<Vec<Recipe>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).trim(csv::Trim::Headers).from_reader(reader);
    let mut recipes = Vec::new();
    for (row_index, result) in rdr.deserialize::<CatalogRow>().enumerate() {
        let row = result.with_context(|| format!("Failed to read catalog record at row index {}", row_index))?;
        if row.id.trim().is_empty() || row.name.trim().is_empty() {
            warn!(row = row_index, "skipping catalog row without id or name");
            continue;
        }
        let id = row.id.clone();
        match parse_row(row) {
            Ok(recipe) if recipe.ingredients.is_empty() => {
                warn!(row = row_index, id = %id, "skipping catalog recipe without ingredients");
            }
            Ok(recipe) => recipes.push(recipe),
            Err(err) => warn!(row = row_index, id = %id, error = %err, "skipping malformed catalog row"),
        }
    }
    Ok(recipes)
}

pub fn load_recipe_catalog(csv_path: &Path) -> Result<Vec<Recipe>> {
    if !csv_path.exists() {
        return Err(anyhow::anyhow!("Recipe catalog not found at: {:?}", csv_path));
    }
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open recipe catalog at {:?}", csv_path))?;
    let recipes = read_recipe_catalog(file)?;
    if recipes.is_empty() {
        return Err(anyhow::anyhow!("No valid recipes loaded from {:?}", csv_path));
    }
    info!(recipes = recipes.len(), path = %csv_path.display(), "loaded recipe catalog");
    Ok(recipes)
}

/// Text embedded for a recipe: name, meal type, protein and ingredient names.
pub fn embedding_text(recipe: &Recipe) -> String {
    let ingredients: Vec<&str> = recipe.ingredients.iter().map(|ingredient| ingredient.item.as_str()).collect();
    match &recipe.primary_protein {
        Some(protein) => format!("{} {} {} {}", recipe.name, protein, recipe.meal_type, ingredients.join(", ")),
        None => format!("{} {} {}", recipe.name, recipe.meal_type, ingredients.join(", ")),
    }
}
