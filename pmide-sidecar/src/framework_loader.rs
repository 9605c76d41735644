//! Framework definitions served to the UI and used for system prompts
//!
//! Layout of a frameworks directory:
//!
//! ```text
//! categories.json            [FrameworkCategory, ...]
//! <category-id>/<id>.json    FrameworkDefinition
//! ```
//!
//! Files are read once and cached for the life of the process. Without a
//! directory the built-in catalog is served.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use pmide_common::frameworks::{self, FrameworkCategory, FrameworkDefinition};
use pmide_common::Result;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const CATEGORIES_FILE: &str = "categories.json";

pub struct FrameworkLoader {
    dir: Option<PathBuf>,
    categories: RwLock<Option<Vec<FrameworkCategory>>>,
    definitions: RwLock<HashMap<String, FrameworkDefinition>>,
}

impl FrameworkLoader {
    pub fn new(dir: Option<PathBuf>) -> Self {
        match &dir {
            Some(d) => info!("Loading frameworks from {}", d.display()),
            None => info!("No frameworks directory configured; serving built-in catalog"),
        }
        Self {
            dir,
            categories: RwLock::new(None),
            definitions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn categories(&self) -> Result<Vec<FrameworkCategory>> {
        let Some(dir) = &self.dir else {
            return Ok(frameworks::builtin_categories());
        };

        if let Some(cached) = self.categories.read().await.as_ref() {
            return Ok(cached.clone());
        }

        let raw = tokio::fs::read_to_string(dir.join(CATEGORIES_FILE)).await?;
        let mut parsed: Vec<FrameworkCategory> = serde_json::from_str(&raw)?;
        parsed.sort_by_key(|c| c.sort_order);
        debug!("Loaded {} framework categories", parsed.len());

        *self.categories.write().await = Some(parsed.clone());
        Ok(parsed)
    }

    /// Definition by id, searching each category directory
    pub async fn get(&self, id: &str) -> Result<Option<FrameworkDefinition>> {
        let Some(dir) = &self.dir else {
            return Ok(frameworks::builtin_framework(id));
        };
        if !is_plain_id(id) {
            return Ok(None);
        }

        if let Some(def) = self.definitions.read().await.get(id) {
            return Ok(Some(def.clone()));
        }

        for category in self.categories().await? {
            let path = dir.join(&category.id).join(format!("{}.json", id));
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                continue;
            }
            let def = read_definition(&path).await?;
            self.definitions.write().await.insert(id.to_string(), def.clone());
            return Ok(Some(def));
        }
        Ok(None)
    }

    /// Every definition, in category order then file name order
    pub async fn all(&self) -> Result<Vec<FrameworkDefinition>> {
        let Some(dir) = &self.dir else {
            return Ok(frameworks::builtin_frameworks());
        };

        let mut all = Vec::new();
        for category in self.categories().await? {
            let category_dir = dir.join(&category.id);
            let mut entries = match tokio::fs::read_dir(&category_dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            let mut paths = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("json") {
                    paths.push(path);
                }
            }
            paths.sort();

            for path in paths {
                match read_definition(&path).await {
                    Ok(def) => all.push(def),
                    Err(e) => warn!("Skipping framework file {}: {}", path.display(), e),
                }
            }
        }

        let mut cache = self.definitions.write().await;
        for def in &all {
            cache.insert(def.id.clone(), def.clone());
        }
        Ok(all)
    }
}

async fn read_definition(path: &Path) -> Result<FrameworkDefinition> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

// Ids name files; nothing that could leave the category directory
fn is_plain_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_catalog(dir: &Path) {
        std::fs::write(
            dir.join(CATEGORIES_FILE),
            json!([
                { "id": "strategy", "name": "Strategy", "sort_order": 2 },
                { "id": "discovery", "name": "Discovery", "sort_order": 1 }
            ])
            .to_string(),
        )
        .unwrap();

        std::fs::create_dir_all(dir.join("strategy")).unwrap();
        std::fs::write(
            dir.join("strategy").join("swot.json"),
            json!({
                "id": "swot",
                "category": "strategy",
                "name": "SWOT",
                "system_prompt": "Analyze strengths and weaknesses.",
                "guiding_questions": ["Who competes with us?"]
            })
            .to_string(),
        )
        .unwrap();
        std::fs::write(dir.join("strategy").join("notes.txt"), "ignored").unwrap();
    }

    #[tokio::test]
    async fn test_builtin_catalog_without_dir() {
        let loader = FrameworkLoader::new(None);

        assert!(!loader.categories().await.unwrap().is_empty());
        assert_eq!(loader.get("rice").await.unwrap().unwrap().name, "RICE Scoring");
        assert!(loader.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_loads_from_directory() {
        let tmp = tempfile::tempdir().unwrap();
        write_catalog(tmp.path());
        let loader = FrameworkLoader::new(Some(tmp.path().to_path_buf()));

        let categories = loader.categories().await.unwrap();
        assert_eq!(categories[0].id, "discovery");

        let swot = loader.get("swot").await.unwrap().unwrap();
        assert!(swot.full_system_prompt().contains("Who competes with us?"));

        let all = loader.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(loader.get("rice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_definitions_are_cached() {
        let tmp = tempfile::tempdir().unwrap();
        write_catalog(tmp.path());
        let loader = FrameworkLoader::new(Some(tmp.path().to_path_buf()));

        loader.get("swot").await.unwrap();
        std::fs::remove_file(tmp.path().join("strategy").join("swot.json")).unwrap();

        assert!(loader.get("swot").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let tmp = tempfile::tempdir().unwrap();
        write_catalog(tmp.path());
        let loader = FrameworkLoader::new(Some(tmp.path().to_path_buf()));

        assert!(loader.get("../categories").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_categories_file_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = FrameworkLoader::new(Some(tmp.path().to_path_buf()));

        assert!(loader.categories().await.is_err());
    }
}
