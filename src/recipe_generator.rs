use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::api_connection::connection::{strip_code_fences, ApiConnectionError, Provider};
use crate::api_connection::endpoints::{
    ChatCompletionRequest, ChatMessage, JsonSchema, JsonSchemaDefinition, JsonSchemaProperty, ResponseFormat,
};
use crate::collaborators::{GenerationRequest, RecipeGenerator};
use crate::model::{Ingredient, MealType, Recipe, RecipeRef};

#[derive(Debug, Deserialize)]
struct GeneratedIngredient {
    #[serde(alias = "ingredient_name", alias = "name")]
    item: String,
    #[serde(default, alias = "amount")]
    quantity: String,
}

#[derive(Debug, Deserialize)]
struct GeneratedRecipe {
    #[serde(alias = "title", alias = "recipe_title")]
    name: String,
    ingredients: Vec<GeneratedIngredient>,
    #[serde(default, alias = "instructions")]
    steps: Vec<String>,
    #[serde(default)]
    primary_protein: Option<String>,
}

fn string_property(description: &str) -> JsonSchemaProperty {
    JsonSchemaProperty {
        property_type: "string".to_string(),
        description: Some(description.to_string()),
        r#enum: None,
        items: None,
    }
}

fn recipe_json_schema() -> JsonSchemaDefinition {
    let ingredient_schema = JsonSchema {
        schema_type: "object".to_string(),
        properties: Some(HashMap::from([
            ("item".to_string(), string_property("Ingredient name, e.g. 'chicken thighs'.")),
            ("quantity".to_string(), string_property("Amount and unit for one serving, e.g. '150 g' or '1/2 cup'.")),
        ])),
        required: Some(vec!["item".to_string(), "quantity".to_string()]),
        additional_properties: Some(false),
    };
    let step_schema = JsonSchema {
        schema_type: "string".to_string(),
        properties: None,
        required: None,
        additional_properties: None,
    };

    let properties = HashMap::from([
        ("name".to_string(), string_property("Title of the recipe.")),
        (
            "ingredients".to_string(),
            JsonSchemaProperty {
                property_type: "array".to_string(),
                description: Some("Ingredients for a single serving.".to_string()),
                r#enum: None,
                items: Some(Box::new(ingredient_schema)),
            },
        ),
        (
            "steps".to_string(),
            JsonSchemaProperty {
                property_type: "array".to_string(),
                description: Some("Cooking steps in order.".to_string()),
                r#enum: None,
                items: Some(Box::new(step_schema)),
            },
        ),
        ("primary_protein".to_string(), string_property("Main protein of the dish.")),
    ]);

    JsonSchemaDefinition {
        name: "generated_recipe".to_string(),
        strict: Some(true),
        schema: JsonSchema {
            schema_type: "object".to_string(),
            properties: Some(properties),
            required: Some(vec![
                "name".to_string(),
                "ingredients".to_string(),
                "steps".to_string(),
                "primary_protein".to_string(),
            ]),
            additional_properties: Some(false),
        },
    }
}

fn system_prompt() -> &'static str {
    "/no_thinking
You are a home-cooking assistant that writes recipes for a weekly meal plan.
Return exactly one JSON object and nothing else: no explanations and no markdown fences.
The object must have:
- \"name\": the recipe title.
- \"ingredients\": an array of objects with string fields \"item\" and \"quantity\". Quantities are for ONE serving and start with a number when the ingredient is measurable (\"150 g\", \"1/2 cup\", \"2\"); use \"to taste\" otherwise.
- \"steps\": an array of strings, one instruction each.
- \"primary_protein\": the main protein, lowercase.
Your response must start with { and end with }."
}

fn user_prompt(request: &GenerationRequest) -> String {
    let mut prompt = format!("Write a {} recipe.\n{}\n", request.meal_type, request.preference_summary);
    if let Some(protein) = &request.primary_protein {
        prompt.push_str(&format!("Build it around {}.\n", protein));
    }
    if let Some(base) = &request.base_candidate {
        prompt.push_str(&format!("Adapt this existing recipe to the preferences above: {}\nIngredients:\n", base.name));
        for ingredient in &base.ingredients {
            prompt.push_str(&format!("- {}: {}\n", ingredient.item, ingredient.quantity));
        }
    }
    prompt
}

/// Turns model output into a `Recipe` with a fresh `modified` id.
pub fn parse_generated_recipe(content: &str, meal_type: MealType) -> Result<Recipe, ApiConnectionError> {
    let json = strip_code_fences(content);
    if json.is_empty() {
        return Err(ApiConnectionError::EmptyResponse);
    }
    let generated: GeneratedRecipe = serde_json::from_str(json)?;
    Ok(Recipe {
        id: RecipeRef::modified(Uuid::new_v4().to_string()),
        name: generated.name.trim().to_string(),
        ingredients: generated
            .ingredients
            .into_iter()
            .map(|ingredient| Ingredient::new(ingredient.item.trim(), ingredient.quantity.trim()))
            .collect(),
        steps: generated.steps,
        meal_type,
        servings: 1,
        primary_protein: generated
            .primary_protein
            .map(|protein| protein.trim().to_lowercase())
            .filter(|protein| !protein.is_empty()),
    })
}

/// Recipe generator backed by an OpenRouter chat model.
pub struct LlmRecipeGenerator {
    provider: Provider,
    temperature: f32,
}

impl LlmRecipeGenerator {
    pub fn new(provider: Provider) -> Self {
        Self { provider, temperature: 0.4 }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn build_request(&self, request: &GenerationRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.provider.model().to_string(),
            messages: vec![ChatMessage::system(system_prompt()), ChatMessage::user(user_prompt(request))],
            response_format: Some(ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: Some(recipe_json_schema()),
            }),
            temperature: Some(self.temperature),
            max_tokens: Some(2048),
        }
    }
}

#[async_trait]
impl RecipeGenerator for LlmRecipeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Recipe> {
        let response = self
            .provider
            .call_chat_completion(self.build_request(request))
            .await
            .with_context(|| format!("recipe generation for {} failed", request.meal_type))?;

        let content = response.first_content().ok_or(ApiConnectionError::EmptyResponse)?;
        debug!(content, "raw recipe generation output");

        let recipe = parse_generated_recipe(content, request.meal_type)
            .with_context(|| format!("model returned an unusable {} recipe", request.meal_type))?;
        info!(recipe = %recipe.id, name = %recipe.name, "generated recipe");
        Ok(recipe)
    }
}
