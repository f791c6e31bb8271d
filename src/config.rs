use dotenv::dotenv;
use std::env;
use std::path::PathBuf;

use crate::api_connection::endpoints::DEFAULT_MODEL;

pub const DEFAULT_API_KEY_VAR: &str = "OPENROUTER_API_KEY";

/// Runtime settings, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Name of the variable that holds the OpenRouter key.
    pub api_key_env_var: String,
    pub model: String,
    pub catalog_path: PathBuf,
    pub index_path: PathBuf,
    pub data_dir: PathBuf,
    pub checkout_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_key_env_var: DEFAULT_API_KEY_VAR.to_string(),
            model: DEFAULT_MODEL.to_string(),
            catalog_path: PathBuf::from("recipes.csv"),
            index_path: PathBuf::from("catalog_index.json"),
            data_dir: PathBuf::from("plans"),
            checkout_url: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|value| value.trim().to_string()).filter(|value| !value.is_empty());
        let defaults = Self::default();
        Self {
            api_key_env_var: get("MEALPLAN_API_KEY_VAR").unwrap_or(defaults.api_key_env_var),
            model: get("MEALPLAN_MODEL").unwrap_or(defaults.model),
            catalog_path: get("MEALPLAN_CATALOG").map(PathBuf::from).unwrap_or(defaults.catalog_path),
            index_path: get("MEALPLAN_INDEX").map(PathBuf::from).unwrap_or(defaults.index_path),
            data_dir: get("MEALPLAN_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            checkout_url: get("MEALPLAN_CHECKOUT_URL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_unset() {
        let config = EngineConfig::from_lookup(|_| None);
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.model, "qwen/qwen3-32b");
    }

    #[test]
    fn test_environment_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("MEALPLAN_MODEL", "meta/llama"),
            ("MEALPLAN_DATA_DIR", "/tmp/plans"),
            ("MEALPLAN_CHECKOUT_URL", " https://shop.example.com/cart "),
            ("MEALPLAN_CATALOG", "  "),
        ]);
        let config = EngineConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.model, "meta/llama");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/plans"));
        assert_eq!(config.checkout_url.as_deref(), Some("https://shop.example.com/cart"));
        assert_eq!(config.catalog_path, PathBuf::from("recipes.csv"));
    }
}
