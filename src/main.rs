use anyhow::{Context, Result};
use meal_plan_engine::api_connection::connection::Provider;
use meal_plan_engine::checkout::build_cart_link;
use meal_plan_engine::cli::{parse_args, Command};
use meal_plan_engine::collaborators::{GenerationRequest, PlanStore, RecipeGenerator};
use meal_plan_engine::config::EngineConfig;
use meal_plan_engine::model::{Recipe, RecipeRef};
use meal_plan_engine::plan::MealPlan;
use meal_plan_engine::planner::{PlanBuilder, PlanRequest};
use meal_plan_engine::recipe_generator::LlmRecipeGenerator;
use meal_plan_engine::replacement::replace_recipe;
use meal_plan_engine::search::{load_recipe_catalog, CatalogRetriever, Embedder, EmbeddingEngine, VectorIndex};
use meal_plan_engine::storage::JsonPlanStore;
use std::path::Path;
use tokio::fs;
use tracing::info;

fn open_retriever(config: &EngineConfig) -> Result<CatalogRetriever<EmbeddingEngine>> {
    let recipes = load_recipe_catalog(&config.catalog_path)?;
    let engine = EmbeddingEngine::new().context("Failed to load embedding model")?;

    let retriever = if config.index_path.exists() {
        let index = VectorIndex::load(&config.index_path, engine.dimension())?;
        let before = index.len();
        let retriever = CatalogRetriever::with_index(engine, index, recipes)?;
        if retriever.index().len() != before {
            retriever.index().save(&config.index_path)?;
        }
        retriever
    } else {
        info!(path = %config.index_path.display(), "no catalog index found, building one");
        let retriever = CatalogRetriever::build(engine, recipes)?;
        retriever.index().save(&config.index_path)?;
        retriever
    };
    Ok(retriever)
}

fn generator(config: &EngineConfig) -> LlmRecipeGenerator {
    LlmRecipeGenerator::new(Provider::openrouter(&config.api_key_env_var).with_model(config.model.clone()))
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse '{}'", path.display()))
}

fn print_plan(plan: &MealPlan) {
    println!("Plan {} (week of {})", plan.id, plan.start_date);
    println!("\nSchedule:");
    for entry in &plan.schedule {
        let name = plan.recipe(&entry.recipe_id).map(|r| r.name.as_str()).unwrap_or("?");
        println!("  {:<16} {} x{}  [{}]", entry.slot_label, name, entry.portion_multiplier, entry.recipe_id);
    }
    println!("\nShopping list:");
    for entry in &plan.shopping_list.items {
        println!("  [{}] {} {}", if entry.checked { "x" } else { " " }, entry.item, entry.quantity);
    }
    if !plan.shopping_list.seasonings.is_empty() {
        println!("\nSeasonings:");
        for entry in &plan.shopping_list.seasonings {
            println!("  [{}] {} {}", if entry.checked { "x" } else { " " }, entry.item, entry.quantity);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = parse_args();
    let config = cli.apply_to(EngineConfig::from_env());
    let store = JsonPlanStore::new(config.data_dir.clone());

    match cli.command {
        Command::Generate { request } => {
            let request: PlanRequest = read_json(&request).await?;
            let retriever = open_retriever(&config)?;
            let generator = generator(&config);
            let plan = PlanBuilder::new(&generator, &retriever).build(request).await?;
            store.save(&plan).await?;
            print_plan(&plan);
        }
        Command::Replace { plan, old, new_recipe } => {
            let mut plan = store.load(&plan).await?;
            let old: RecipeRef = old.parse().map_err(anyhow::Error::msg)?;
            let new_recipe: Recipe = match new_recipe {
                Some(path) => read_json(&path).await?,
                None => {
                    let current = plan
                        .recipe(&old)
                        .cloned()
                        .with_context(|| format!("Recipe {} is not part of plan {}", old, plan.id))?;
                    let request = GenerationRequest {
                        meal_type: current.meal_type,
                        preference_summary: plan.preferences.summary(),
                        primary_protein: current.primary_protein.clone(),
                        base_candidate: Some(current),
                    };
                    generator(&config).generate(&request).await?
                }
            };
            let outcome = replace_recipe(&mut plan, &old, new_recipe)?;
            store.save(&plan).await?;
            println!(
                "Replaced {} with {} in {} slot(s), {} serving(s).",
                outcome.old_id, outcome.new_id, outcome.reassigned, outcome.servings
            );
            print_plan(&plan);
        }
        Command::List { plan: Some(plan) } => {
            print_plan(&store.load(&plan).await?);
        }
        Command::List { plan: None } => {
            for id in store.list().await? {
                println!("{}", id);
            }
        }
        Command::Check { plan, item, uncheck } => {
            let mut plan = store.load(&plan).await?;
            if !plan.set_checked(&item, !uncheck) {
                anyhow::bail!("'{}' is not on the shopping list of plan {}", item, plan.id);
            }
            store.save(&plan).await?;
            println!("{} '{}'", if uncheck { "Unchecked" } else { "Checked" }, item);
        }
        Command::Cart { plan, promote, .. } => {
            let plan = store.load(&plan).await?;
            let base_url = config
                .checkout_url
                .as_deref()
                .context("No checkout URL configured; set MEALPLAN_CHECKOUT_URL or pass --checkout-url")?;
            let url = build_cart_link(base_url, &plan.shopping_list, &promote)?;
            println!("{}", url);
        }
    }

    Ok(())
}
