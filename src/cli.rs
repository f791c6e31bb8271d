use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::EngineConfig;

#[derive(Parser, Debug)]
#[command(name = "mealplan", author, version, about = "Compose weekly meal plans and shopping lists", long_about = None)]
pub struct Cli {
    /// Directory holding saved plans [env: MEALPLAN_DATA_DIR]
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Recipe catalog CSV [env: MEALPLAN_CATALOG]
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Saved catalog vector index [env: MEALPLAN_INDEX]
    #[arg(long, global = true)]
    pub index: Option<PathBuf>,

    /// OpenRouter model id [env: MEALPLAN_MODEL]
    #[arg(long, global = true)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a new plan from a JSON plan request
    Generate {
        #[arg(short, long)]
        request: PathBuf,
    },
    /// Replace a scheduled recipe everywhere in a plan
    Replace {
        #[arg(short, long)]
        plan: String,
        /// Recipe to replace, e.g. catalog:42
        #[arg(short, long)]
        old: String,
        /// JSON file with the new recipe; a new one is generated when omitted
        #[arg(short, long)]
        new_recipe: Option<PathBuf>,
    },
    /// Show a plan's schedule and shopping list, or list saved plans
    List {
        #[arg(short, long)]
        plan: Option<String>,
    },
    /// Check or uncheck a shopping-list item
    Check {
        #[arg(short, long)]
        plan: String,
        #[arg(short, long)]
        item: String,
        #[arg(long)]
        uncheck: bool,
    },
    /// Print a checkout link for the unchecked items
    Cart {
        #[arg(short, long)]
        plan: String,
        /// Seasonings to buy as well
        #[arg(long)]
        promote: Vec<String>,
        /// Checkout base URL [env: MEALPLAN_CHECKOUT_URL]
        #[arg(long)]
        checkout_url: Option<String>,
    },
}

impl Cli {
    /// Flags win over environment values.
    pub fn apply_to(&self, mut config: EngineConfig) -> EngineConfig {
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(catalog) = &self.catalog {
            config.catalog_path = catalog.clone();
        }
        if let Some(index) = &self.index {
            config.index_path = index.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Command::Cart { checkout_url: Some(url), .. } = &self.command {
            config.checkout_url = Some(url.clone());
        }
        config
    }
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
