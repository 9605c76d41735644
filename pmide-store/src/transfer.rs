//! Import and export of frameworks and saved prompts
//!
//! Bundles are self-describing JSON documents:
//!
//! ```json
//! { "format": "pmide-export", "version": 1, "kind": "framework",
//!   "exported_at": "2025-01-01T00:00:00Z", "items": [ ... ] }
//! ```
//!
//! Framework bundles also carry the categories their items reference so a
//! receiving install can recreate missing ones.

use chrono::{DateTime, Utc};
use pmide_common::{uuid_utils, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::info;

use crate::db::{frameworks, prompts};
use crate::models::{CategoryInput, FrameworkCategoryRow, FrameworkDefInput, SavedPromptInput};

pub const BUNDLE_FORMAT: &str = "pmide-export";
pub const BUNDLE_VERSION: u32 = 1;
const IMPORTED_SUFFIX: &str = " (Imported)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleKind {
    Framework,
    Prompt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle<T> {
    pub format: String,
    pub version: u32,
    pub kind: BundleKind,
    pub exported_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<CategoryInput>,
    pub items: Vec<T>,
}

impl<T: Serialize> Bundle<T> {
    fn new(kind: BundleKind, items: Vec<T>) -> Self {
        Self {
            format: BUNDLE_FORMAT.to_string(),
            version: BUNDLE_VERSION,
            kind,
            exported_at: Utc::now(),
            categories: Vec::new(),
            items,
        }
    }

    fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// What to do with an item whose id or name already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    Skip,
    Overwrite,
    Duplicate,
}

impl FromStr for ConflictStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "skip" => Ok(Self::Skip),
            "overwrite" => Ok(Self::Overwrite),
            "duplicate" => Ok(Self::Duplicate),
            other => Err(Error::InvalidInput(format!(
                "Unknown conflict strategy '{}', expected skip, overwrite or duplicate",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewItem {
    pub index: usize,
    pub id: Option<String>,
    pub name: String,
    /// Id or name already present locally
    pub conflict: bool,
    /// Id of the local item the import collides with
    pub existing_id: Option<String>,
    pub existing_is_builtin: bool,
    #[serde(default)]
    pub category_missing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportPreview {
    pub valid: bool,
    pub kind: Option<BundleKind>,
    pub items: Vec<PreviewItem>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub imported: usize,
    pub overwritten: usize,
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

fn category_input(row: &FrameworkCategoryRow) -> CategoryInput {
    CategoryInput {
        id: Some(row.id.clone()),
        name: row.name.clone(),
        description: row.description.clone(),
        icon: row.icon.clone(),
        sort_order: row.sort_order,
    }
}

async fn framework_bundle(pool: &SqlitePool, items: Vec<FrameworkDefInput>) -> Result<String> {
    let used: HashSet<&str> = items.iter().map(|i| i.category.as_str()).collect();
    let categories = frameworks::list_framework_categories(pool)
        .await?
        .iter()
        .filter(|c| used.contains(c.id.as_str()))
        .map(category_input)
        .collect();

    let mut bundle = Bundle::new(BundleKind::Framework, items);
    bundle.categories = categories;
    bundle.to_pretty_json()
}

pub async fn export_framework(pool: &SqlitePool, id: &str) -> Result<String> {
    export_frameworks_batch(pool, &[id.to_string()]).await
}

pub async fn export_frameworks_batch(pool: &SqlitePool, ids: &[String]) -> Result<String> {
    if ids.is_empty() {
        return Err(Error::InvalidInput("No frameworks selected for export".to_string()));
    }
    let mut items = Vec::with_capacity(ids.len());
    for id in ids {
        let row = frameworks::require_framework_def(pool, id).await?;
        items.push(FrameworkDefInput::from(&row));
    }
    framework_bundle(pool, items).await
}

pub async fn export_all_frameworks(pool: &SqlitePool) -> Result<String> {
    let items = frameworks::list_framework_defs(pool, None)
        .await?
        .iter()
        .map(FrameworkDefInput::from)
        .collect();
    framework_bundle(pool, items).await
}

pub async fn export_prompt(pool: &SqlitePool, id: &str) -> Result<String> {
    export_prompts_batch(pool, &[id.to_string()]).await
}

pub async fn export_prompts_batch(pool: &SqlitePool, ids: &[String]) -> Result<String> {
    if ids.is_empty() {
        return Err(Error::InvalidInput("No prompts selected for export".to_string()));
    }
    let mut items = Vec::with_capacity(ids.len());
    for id in ids {
        let prompt = prompts::require_saved_prompt(pool, id).await?;
        items.push(SavedPromptInput::from(&prompt));
    }
    Bundle::new(BundleKind::Prompt, items).to_pretty_json()
}

pub async fn export_all_prompts(pool: &SqlitePool) -> Result<String> {
    let items = prompts::list_saved_prompts(pool, None)
        .await?
        .iter()
        .map(SavedPromptInput::from)
        .collect();
    Bundle::new(BundleKind::Prompt, items).to_pretty_json()
}

// ---------------------------------------------------------------------------
// Parsing and validation
// ---------------------------------------------------------------------------

/// Bundle envelope checked field by field so every problem is reported
struct Parsed<T> {
    kind: Option<BundleKind>,
    categories: Vec<CategoryInput>,
    items: Vec<(usize, T)>,
    errors: Vec<String>,
}

fn parse_bundle<T: for<'de> Deserialize<'de>>(json: &str, expected: BundleKind, required: &[&str]) -> Parsed<T> {
    let mut parsed = Parsed { kind: None, categories: Vec::new(), items: Vec::new(), errors: Vec::new() };

    let root: Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            parsed.errors.push(format!("Invalid JSON: {}", e));
            return parsed;
        }
    };

    match root.get("format").and_then(Value::as_str) {
        Some(BUNDLE_FORMAT) => {}
        Some(other) => parsed.errors.push(format!("Unsupported format '{}'", other)),
        None => parsed.errors.push("Missing 'format' field".to_string()),
    }
    match root.get("version").and_then(Value::as_u64) {
        Some(v) if v == BUNDLE_VERSION as u64 => {}
        Some(v) => parsed.errors.push(format!("Unsupported version {}", v)),
        None => parsed.errors.push("Missing 'version' field".to_string()),
    }
    match root.get("kind").cloned().map(serde_json::from_value::<BundleKind>) {
        Some(Ok(kind)) => {
            parsed.kind = Some(kind);
            if kind != expected {
                parsed.errors.push(format!(
                    "Bundle holds {:?} items, expected {:?}",
                    kind, expected
                ));
            }
        }
        Some(Err(_)) => parsed.errors.push("Unknown 'kind' value".to_string()),
        None => parsed.errors.push("Missing 'kind' field".to_string()),
    }

    if let Some(categories) = root.get("categories") {
        match serde_json::from_value::<Vec<CategoryInput>>(categories.clone()) {
            Ok(c) => parsed.categories = c,
            Err(e) => parsed.errors.push(format!("Invalid 'categories': {}", e)),
        }
    }

    let Some(items) = root.get("items").and_then(Value::as_array) else {
        parsed.errors.push("Missing 'items' array".to_string());
        return parsed;
    };
    if items.is_empty() {
        parsed.errors.push("Bundle contains no items".to_string());
    }

    for (index, item) in items.iter().enumerate() {
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|field| match item.get(*field) {
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(Value::Null) | None => true,
                Some(_) => false,
            })
            .collect();
        if !missing.is_empty() {
            parsed.errors.push(format!(
                "Item {}: missing required field(s): {}",
                index,
                missing.join(", ")
            ));
            continue;
        }
        match serde_json::from_value::<T>(item.clone()) {
            Ok(value) => parsed.items.push((index, value)),
            Err(e) => parsed.errors.push(format!("Item {}: {}", index, e)),
        }
    }

    parsed
}

/// Local row an import item collides with: same id first, else same name
fn find_conflict<'a, R>(
    existing: &'a [R],
    id: Option<&str>,
    name: &str,
    key: impl Fn(&R) -> (&str, &str),
) -> Option<&'a R> {
    if let Some(id) = id {
        if let Some(row) = existing.iter().find(|r| key(r).0 == id) {
            return Some(row);
        }
    }
    existing.iter().find(|r| key(r).1.eq_ignore_ascii_case(name.trim()))
}

fn unique_name(base: &str, taken: &HashSet<String>) -> String {
    let lower = |s: &str| s.to_lowercase();
    if !taken.contains(&lower(base)) {
        return base.to_string();
    }
    let mut candidate = format!("{}{}", base, IMPORTED_SUFFIX);
    let mut n = 2;
    while taken.contains(&lower(&candidate)) {
        candidate = format!("{}{} {}", base, IMPORTED_SUFFIX, n);
        n += 1;
    }
    candidate
}

// ---------------------------------------------------------------------------
// Frameworks
// ---------------------------------------------------------------------------

const FRAMEWORK_REQUIRED: &[&str] = &["name", "category", "system_prompt"];
const PROMPT_REQUIRED: &[&str] = &["name", "prompt_text"];

pub async fn preview_import_frameworks(pool: &SqlitePool, json: &str) -> Result<ImportPreview> {
    let parsed = parse_bundle::<FrameworkDefInput>(json, BundleKind::Framework, FRAMEWORK_REQUIRED);
    let existing = frameworks::list_framework_defs(pool, None).await?;
    let local_categories: HashSet<String> = frameworks::list_framework_categories(pool)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();

    let items = parsed
        .items
        .iter()
        .map(|(index, item)| {
            let hit = find_conflict(&existing, item.id.as_deref(), &item.name, |r| {
                (r.id.as_str(), r.name.as_str())
            });
            let category = item.category.trim();
            PreviewItem {
                index: *index,
                id: item.id.clone(),
                name: item.name.clone(),
                conflict: hit.is_some(),
                existing_id: hit.map(|r| r.id.clone()),
                existing_is_builtin: hit.map(|r| r.is_builtin).unwrap_or(false),
                category_missing: !local_categories.contains(category),
            }
        })
        .collect::<Vec<_>>();

    let errors = parsed.errors;
    Ok(ImportPreview { valid: errors.is_empty(), kind: parsed.kind, items, errors })
}

pub async fn confirm_import_frameworks(
    pool: &SqlitePool,
    json: &str,
    strategy: ConflictStrategy,
) -> Result<ImportResult> {
    let parsed = parse_bundle::<FrameworkDefInput>(json, BundleKind::Framework, FRAMEWORK_REQUIRED);
    if !parsed.errors.is_empty() {
        return Err(Error::InvalidInput(parsed.errors.join("; ")));
    }

    let existing = frameworks::list_framework_defs(pool, None).await?;
    let mut categories: HashSet<String> = frameworks::list_framework_categories(pool)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    let mut taken: HashSet<String> = existing.iter().map(|r| r.name.to_lowercase()).collect();
    let mut result = ImportResult::default();

    let mut tx = pool.begin().await?;

    for (_, item) in &parsed.items {
        let category = item.category.trim().to_string();
        if !categories.contains(&category) {
            // Prefer the bundled description of the category when present
            let input = parsed
                .categories
                .iter()
                .find(|c| c.id.as_deref() == Some(category.as_str()))
                .cloned()
                .unwrap_or_else(|| CategoryInput {
                    id: Some(category.clone()),
                    name: category.clone(),
                    description: String::new(),
                    icon: String::new(),
                    sort_order: 100,
                });
            frameworks::insert_category(&mut tx, &input).await?;
            categories.insert(category.clone());
        }

        let hit = find_conflict(&existing, item.id.as_deref(), &item.name, |r| {
            (r.id.as_str(), r.name.as_str())
        });
        match (hit, strategy) {
            (None, _) => {
                // Avoid reusing an id taken by an earlier item of this bundle
                let id = item.id.clone().filter(|id| !existing.iter().any(|r| &r.id == id));
                let mut input = item.clone();
                input.name = unique_name(item.name.trim(), &taken);
                let row = match frameworks::insert_def(&mut tx, &input, id).await {
                    Err(Error::Conflict(_)) => {
                        frameworks::insert_def(&mut tx, &input, Some(uuid_utils::generate_id())).await?
                    }
                    other => other?,
                };
                taken.insert(row.name.to_lowercase());
                result.imported += 1;
            }
            (Some(_), ConflictStrategy::Skip) => result.skipped += 1,
            (Some(row), ConflictStrategy::Overwrite) => {
                if row.is_builtin {
                    result.skipped += 1;
                } else {
                    frameworks::overwrite_def(&mut tx, &row.id, item).await?;
                    taken.insert(item.name.trim().to_lowercase());
                    result.overwritten += 1;
                }
            }
            (Some(_), ConflictStrategy::Duplicate) => {
                let mut input = item.clone();
                input.name = unique_name(item.name.trim(), &taken);
                let row = frameworks::insert_def(&mut tx, &input, Some(uuid_utils::generate_id())).await?;
                taken.insert(row.name.to_lowercase());
                result.imported += 1;
            }
        }
    }

    tx.commit().await?;
    info!(
        "Framework import: {} imported, {} overwritten, {} skipped",
        result.imported, result.overwritten, result.skipped
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

pub async fn preview_import_prompts(pool: &SqlitePool, json: &str) -> Result<ImportPreview> {
    let parsed = parse_bundle::<SavedPromptInput>(json, BundleKind::Prompt, PROMPT_REQUIRED);
    let existing = prompts::list_saved_prompts(pool, None).await?;

    let items = parsed
        .items
        .iter()
        .map(|(index, item)| {
            let hit = find_conflict(&existing, item.id.as_deref(), &item.name, |r| {
                (r.id.as_str(), r.name.as_str())
            });
            PreviewItem {
                index: *index,
                id: item.id.clone(),
                name: item.name.clone(),
                conflict: hit.is_some(),
                existing_id: hit.map(|r| r.id.clone()),
                existing_is_builtin: hit.map(|r| r.is_builtin).unwrap_or(false),
                category_missing: false,
            }
        })
        .collect();

    Ok(ImportPreview {
        valid: parsed.errors.is_empty(),
        kind: parsed.kind,
        items,
        errors: parsed.errors,
    })
}

pub async fn confirm_import_prompts(
    pool: &SqlitePool,
    json: &str,
    strategy: ConflictStrategy,
) -> Result<ImportResult> {
    let parsed = parse_bundle::<SavedPromptInput>(json, BundleKind::Prompt, PROMPT_REQUIRED);
    if !parsed.errors.is_empty() {
        return Err(Error::InvalidInput(parsed.errors.join("; ")));
    }

    let existing = prompts::list_saved_prompts(pool, None).await?;
    let mut taken: HashSet<String> = existing.iter().map(|p| p.name.to_lowercase()).collect();
    let mut result = ImportResult::default();

    let mut tx = pool.begin().await?;

    for (_, item) in &parsed.items {
        let hit = find_conflict(&existing, item.id.as_deref(), &item.name, |r| {
            (r.id.as_str(), r.name.as_str())
        });
        match (hit, strategy) {
            (None, _) => {
                let id = item.id.clone().filter(|id| !existing.iter().any(|r| &r.id == id));
                let mut input = item.clone();
                input.name = unique_name(item.name.trim(), &taken);
                let prompt = match prompts::insert_prompt(&mut tx, &input, id).await {
                    Err(Error::Conflict(_)) => {
                        prompts::insert_prompt(&mut tx, &input, Some(uuid_utils::generate_id())).await?
                    }
                    other => other?,
                };
                taken.insert(prompt.name.to_lowercase());
                result.imported += 1;
            }
            (Some(_), ConflictStrategy::Skip) => result.skipped += 1,
            (Some(row), ConflictStrategy::Overwrite) => {
                if row.is_builtin {
                    result.skipped += 1;
                } else {
                    prompts::overwrite_prompt(&mut tx, &row.id, item).await?;
                    taken.insert(item.name.trim().to_lowercase());
                    result.overwritten += 1;
                }
            }
            (Some(_), ConflictStrategy::Duplicate) => {
                let mut input = item.clone();
                input.name = unique_name(item.name.trim(), &taken);
                let prompt = prompts::insert_prompt(&mut tx, &input, Some(uuid_utils::generate_id())).await?;
                taken.insert(prompt.name.to_lowercase());
                result.imported += 1;
            }
        }
    }

    tx.commit().await?;
    info!(
        "Prompt import: {} imported, {} overwritten, {} skipped",
        result.imported, result.overwritten, result.skipped
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("skip".parse::<ConflictStrategy>().unwrap(), ConflictStrategy::Skip);
        assert_eq!("duplicate".parse::<ConflictStrategy>().unwrap(), ConflictStrategy::Duplicate);
        assert!("merge".parse::<ConflictStrategy>().is_err());
    }

    #[test]
    fn test_unique_name_appends_suffix() {
        let mut taken = HashSet::new();
        assert_eq!(unique_name("RICE", &taken), "RICE");
        taken.insert("rice".to_string());
        assert_eq!(unique_name("RICE", &taken), "RICE (Imported)");
        taken.insert("rice (imported)".to_string());
        assert_eq!(unique_name("RICE", &taken), "RICE (Imported) 2");
    }

    #[test]
    fn test_parse_reports_envelope_errors() {
        let parsed = parse_bundle::<SavedPromptInput>(
            r#"{"format":"other","version":2,"kind":"framework","items":[]}"#,
            BundleKind::Prompt,
            PROMPT_REQUIRED,
        );
        assert_eq!(parsed.errors.len(), 4);
        assert!(parsed.items.is_empty());
    }

    #[test]
    fn test_parse_reports_missing_fields_per_item() {
        let parsed = parse_bundle::<SavedPromptInput>(
            r#"{"format":"pmide-export","version":1,"kind":"prompt","items":[
                {"name":"Ok","prompt_text":"Hi {{x}}"},
                {"name":"  ","prompt_text":"text"},
                {"name":"No text"}
            ]}"#,
            BundleKind::Prompt,
            PROMPT_REQUIRED,
        );
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.errors.len(), 2);
        assert!(parsed.errors[0].starts_with("Item 1"));
        assert!(parsed.errors[1].contains("prompt_text"));
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        let parsed = parse_bundle::<SavedPromptInput>("{nope", BundleKind::Prompt, PROMPT_REQUIRED);
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].starts_with("Invalid JSON"));
    }
}
