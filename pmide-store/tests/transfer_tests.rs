//! Framework and prompt bundle import/export against a real database

use pmide_common::config::StoreConfig;
use pmide_store::db::{frameworks, init_database, prompts};
use pmide_store::models::{FrameworkDefInput, SavedPromptInput};
use pmide_store::transfer::{self, ConflictStrategy};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn setup_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("pmide.db"), &StoreConfig::default())
        .await
        .unwrap();
    (pool, dir)
}

fn custom_framework(name: &str) -> FrameworkDefInput {
    FrameworkDefInput {
        id: None,
        category: "discovery".to_string(),
        name: name.to_string(),
        description: "Map assumptions by risk".to_string(),
        icon: "map".to_string(),
        system_prompt: "List the riskiest assumptions and a test for each.".to_string(),
        guiding_questions: vec!["What must be true?".to_string()],
        example_output: String::new(),
        supports_visuals: false,
        visual_instructions: None,
        sort_order: 0,
    }
}

#[tokio::test]
async fn test_export_includes_used_categories() {
    let (pool, _dir) = setup_db().await;

    let json = transfer::export_framework(&pool, "rice").await.unwrap();
    let bundle: Value = serde_json::from_str(&json).unwrap();

    assert_eq!(bundle["format"], "pmide-export");
    assert_eq!(bundle["version"], 1);
    assert_eq!(bundle["kind"], "framework");
    assert_eq!(bundle["items"].as_array().unwrap().len(), 1);
    assert_eq!(bundle["categories"][0]["id"], "prioritization");
}

#[tokio::test]
async fn test_export_unknown_framework_fails() {
    let (pool, _dir) = setup_db().await;

    assert!(transfer::export_framework(&pool, "no-such-framework").await.is_err());
}

#[tokio::test]
async fn test_reimporting_builtin_by_strategy() {
    let (pool, _dir) = setup_db().await;
    let json = transfer::export_framework(&pool, "rice").await.unwrap();

    let preview = transfer::preview_import_frameworks(&pool, &json).await.unwrap();
    assert!(preview.valid);
    assert!(preview.items[0].conflict);
    assert!(preview.items[0].existing_is_builtin);
    assert_eq!(preview.items[0].existing_id.as_deref(), Some("rice"));

    let skipped = transfer::confirm_import_frameworks(&pool, &json, ConflictStrategy::Skip).await.unwrap();
    assert_eq!(skipped.skipped, 1);

    // Built-ins are never overwritten by an import
    let overwrite = transfer::confirm_import_frameworks(&pool, &json, ConflictStrategy::Overwrite)
        .await
        .unwrap();
    assert_eq!(overwrite.overwritten, 0);
    assert_eq!(overwrite.skipped, 1);

    let duplicated = transfer::confirm_import_frameworks(&pool, &json, ConflictStrategy::Duplicate)
        .await
        .unwrap();
    assert_eq!(duplicated.imported, 1);

    let again = transfer::confirm_import_frameworks(&pool, &json, ConflictStrategy::Duplicate)
        .await
        .unwrap();
    assert_eq!(again.imported, 1);

    let names: Vec<String> = frameworks::list_framework_defs(&pool, Some("prioritization"))
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert!(names.contains(&"RICE Scoring (Imported)".to_string()));
    assert!(names.contains(&"RICE Scoring (Imported) 2".to_string()));
}

#[tokio::test]
async fn test_overwrite_replaces_custom_framework() {
    let (pool, _dir) = setup_db().await;
    let created = frameworks::create_framework_def(&pool, &custom_framework("Assumption map"))
        .await
        .unwrap();

    let json = transfer::export_framework(&pool, &created.id).await.unwrap();
    let mut bundle: Value = serde_json::from_str(&json).unwrap();
    bundle["items"][0]["system_prompt"] = json!("Rank assumptions by impact and evidence.");
    let edited = bundle.to_string();

    let result = transfer::confirm_import_frameworks(&pool, &edited, ConflictStrategy::Overwrite)
        .await
        .unwrap();
    assert_eq!(result.overwritten, 1);

    let row = frameworks::require_framework_def(&pool, &created.id).await.unwrap();
    assert_eq!(row.system_prompt, "Rank assumptions by impact and evidence.");
    assert!(!row.is_builtin);
}

#[tokio::test]
async fn test_import_creates_missing_category_from_bundle() {
    let (pool, _dir) = setup_db().await;
    let bundle = json!({
        "format": "pmide-export",
        "version": 1,
        "kind": "framework",
        "exported_at": "2026-01-01T00:00:00Z",
        "categories": [
            { "id": "pricing", "name": "Pricing", "description": "Packaging and price points", "icon": "tag", "sort_order": 9 }
        ],
        "items": [
            { "id": "van-westendorp", "category": "pricing", "name": "Van Westendorp", "system_prompt": "Run a price sensitivity analysis." }
        ]
    })
    .to_string();

    let preview = transfer::preview_import_frameworks(&pool, &bundle).await.unwrap();
    assert!(preview.valid);
    assert!(!preview.items[0].conflict);
    assert!(preview.items[0].category_missing);

    let result = transfer::confirm_import_frameworks(&pool, &bundle, ConflictStrategy::Skip).await.unwrap();
    assert_eq!(result.imported, 1);

    let category = frameworks::get_framework_category(&pool, "pricing").await.unwrap().unwrap();
    assert_eq!(category.name, "Pricing");
    assert_eq!(category.description, "Packaging and price points");
    let def = frameworks::require_framework_def(&pool, "van-westendorp").await.unwrap();
    assert_eq!(def.category, "pricing");
}

#[tokio::test]
async fn test_invalid_bundle_rejected_without_writes() {
    let (pool, _dir) = setup_db().await;
    let before = frameworks::list_framework_defs(&pool, None).await.unwrap().len();
    let bundle = json!({
        "format": "pmide-export",
        "version": 1,
        "kind": "framework",
        "items": [
            { "category": "strategy", "name": "Good", "system_prompt": "ok" },
            { "category": "strategy", "name": "" }
        ]
    })
    .to_string();

    let preview = transfer::preview_import_frameworks(&pool, &bundle).await.unwrap();
    assert!(!preview.valid);
    assert_eq!(preview.items.len(), 1);

    assert!(transfer::confirm_import_frameworks(&pool, &bundle, ConflictStrategy::Skip)
        .await
        .is_err());
    assert_eq!(frameworks::list_framework_defs(&pool, None).await.unwrap().len(), before);
}

#[tokio::test]
async fn test_prompt_bundle_kind_mismatch() {
    let (pool, _dir) = setup_db().await;
    let json = transfer::export_framework(&pool, "rice").await.unwrap();

    let preview = transfer::preview_import_prompts(&pool, &json).await.unwrap();

    assert!(!preview.valid);
    assert!(preview.errors.iter().any(|e| e.contains("expected")));
}

#[tokio::test]
async fn test_prompt_name_conflict_is_case_insensitive() {
    let (pool, _dir) = setup_db().await;
    let input = SavedPromptInput {
        id: None,
        name: "Weekly update".to_string(),
        description: String::new(),
        category: "communication".to_string(),
        prompt_text: "Summarize {{wins}} and {{risks}}.".to_string(),
        variables: None,
        framework_id: None,
        is_favorite: false,
        sort_order: 0,
    };
    prompts::create_saved_prompt(&pool, &input).await.unwrap();

    let bundle = json!({
        "format": "pmide-export",
        "version": 1,
        "kind": "prompt",
        "items": [
            { "name": "WEEKLY UPDATE", "prompt_text": "Different text {{x}}" }
        ]
    })
    .to_string();

    let preview = transfer::preview_import_prompts(&pool, &bundle).await.unwrap();
    assert!(preview.items[0].conflict);

    let result = transfer::confirm_import_prompts(&pool, &bundle, ConflictStrategy::Duplicate).await.unwrap();
    assert_eq!(result.imported, 1);

    let found = prompts::search_saved_prompts(&pool, "weekly update").await.unwrap();
    let names: Vec<&str> = found.iter().map(|p| p.name.as_str()).collect();
    assert!(names.contains(&"WEEKLY UPDATE (Imported)"));
}

#[tokio::test]
async fn test_export_all_prompts_round_trips_as_conflicts() {
    let (pool, _dir) = setup_db().await;
    let json = transfer::export_all_prompts(&pool).await.unwrap();

    let preview = transfer::preview_import_prompts(&pool, &json).await.unwrap();

    assert!(preview.valid);
    assert!(!preview.items.is_empty());
    assert!(preview.items.iter().all(|i| i.conflict));
}
