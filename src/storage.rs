use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::collaborators::PlanStore;
use crate::plan::MealPlan;

/// Stores each plan as `<dir>/<id>.json`.
pub struct JsonPlanStore {
    dir: PathBuf,
}

impl JsonPlanStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        let valid = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            anyhow::bail!("invalid plan id '{}'", id);
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

#[async_trait]
impl PlanStore for JsonPlanStore {
    async fn load(&self, id: &str) -> Result<MealPlan> {
        let path = self.path_for(id)?;
        let contents = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read plan {} from {:?}", id, path))?;
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse plan {} at {:?}", id, path))
    }

    async fn save(&self, plan: &MealPlan) -> Result<()> {
        let path = self.path_for(&plan.id)?;
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create plan directory {:?}", self.dir))?;

        let serialized = serde_json::to_string_pretty(plan)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serialized)
            .await
            .with_context(|| format!("Failed to write {:?}", tmp))?;
        fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to move {:?} into place", tmp))?;
        info!(plan = %plan.id, path = %path.display(), "saved plan");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(err) => return Err(err).with_context(|| format!("Failed to list {:?}", self.dir)),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ShoppingList;
    use crate::preferences::Preferences;
    use crate::quantity::KeyScheme;
    use chrono::{NaiveDate, Utc};
    use tempfile::tempdir;

    fn plan(id: &str) -> MealPlan {
        MealPlan {
            id: id.to_string(),
            created_at: Utc::now(),
            start_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            preferences: Preferences::default(),
            recipes: Vec::new(),
            schedule: Vec::new(),
            shopping_list: ShoppingList::default(),
            key_scheme: KeyScheme::Canonical,
        }
    }

    #[tokio::test]
    async fn test_save_then_load() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonPlanStore::new(dir.path().join("plans"));
        assert!(store.list().await?.is_empty());

        store.save(&plan("b-plan")).await?;
        store.save(&plan("a-plan")).await?;
        assert_eq!(store.list().await?, vec!["a-plan", "b-plan"]);

        let loaded = store.load("a-plan").await?;
        assert_eq!(loaded, plan_with_time(&loaded, "a-plan"));
        Ok(())
    }

    fn plan_with_time(reference: &MealPlan, id: &str) -> MealPlan {
        MealPlan { created_at: reference.created_at, ..plan(id) }
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let dir = tempdir().unwrap();
        let store = JsonPlanStore::new(dir.path());
        assert!(store.load("../etc/passwd").await.is_err());
        assert!(store.save(&plan("")).await.is_err());
        assert!(store.load("missing").await.is_err());
    }
}
