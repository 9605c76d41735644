//! Store schema creation and seeding
//!
//! All statements are idempotent so the service can run them on every start.

use pmide_common::config::StoreConfig;
use pmide_common::db::{current_schema_version, ensure_setting, init_database_pool, record_schema_version};
use pmide_common::frameworks::{builtin_categories, builtin_frameworks};
use pmide_common::{time, Result};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

pub const SCHEMA_VERSION: i64 = 1;

/// Default settings written on first start
///
/// `sidecar_url` is seeded from `[store]` in config.toml instead.
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("default_model", "claude-sonnet-4-20250514"),
    ("max_tokens", "4096"),
    ("theme", "system"),
    ("autosave", "true"),
];

/// Open the database, create every store table and seed built-ins
pub async fn init_database(db_path: &Path, store: &StoreConfig) -> Result<SqlitePool> {
    let pool = init_database_pool(db_path).await?;
    create_tables(&pool).await?;

    let version = current_schema_version(&pool).await?;
    if version < SCHEMA_VERSION {
        record_schema_version(&pool, SCHEMA_VERSION).await?;
        info!("Schema upgraded from version {} to {}", version, SCHEMA_VERSION);
    }

    for (key, value) in DEFAULT_SETTINGS {
        ensure_setting(&pool, key, value).await?;
    }
    ensure_setting(&pool, "sidecar_url", &store.sidecar_url).await?;

    seed_builtin_frameworks(&pool).await?;
    seed_builtin_prompts(&pool).await?;

    Ok(pool)
}

/// Create all store tables
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    for statement in TABLES {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS projects (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        model TEXT NOT NULL,
        total_tokens INTEGER NOT NULL DEFAULT 0,
        total_cost REAL NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_conversations_project ON conversations(project_id)",
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
        role TEXT NOT NULL CHECK (role IN ('user', 'assistant', 'system')),
        content TEXT NOT NULL,
        tokens INTEGER,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id)",
    r#"
    CREATE TABLE IF NOT EXISTS token_usage (
        id TEXT PRIMARY KEY,
        conversation_id TEXT REFERENCES conversations(id) ON DELETE SET NULL,
        model TEXT NOT NULL,
        input_tokens INTEGER NOT NULL,
        output_tokens INTEGER NOT NULL,
        cost REAL NOT NULL,
        date TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_token_usage_date ON token_usage(date)",
    r#"
    CREATE TABLE IF NOT EXISTS folders (
        id TEXT PRIMARY KEY,
        project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        parent_id TEXT REFERENCES folders(id) ON DELETE SET NULL,
        name TEXT NOT NULL,
        color TEXT,
        sort_order INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS context_documents (
        id TEXT PRIMARY KEY,
        project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        doc_type TEXT NOT NULL CHECK (doc_type IN ('pdf', 'url', 'google_doc', 'text')),
        content TEXT NOT NULL,
        url TEXT,
        is_global INTEGER NOT NULL DEFAULT 0,
        size_bytes INTEGER NOT NULL DEFAULT 0,
        folder_id TEXT REFERENCES folders(id) ON DELETE SET NULL,
        is_favorite INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_documents_project ON context_documents(project_id)",
    r#"
    CREATE TABLE IF NOT EXISTS framework_outputs (
        id TEXT PRIMARY KEY,
        project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        framework_id TEXT NOT NULL,
        category TEXT NOT NULL,
        name TEXT NOT NULL,
        user_prompt TEXT NOT NULL,
        context_doc_ids TEXT NOT NULL DEFAULT '[]',
        generated_content TEXT NOT NULL,
        format TEXT NOT NULL DEFAULT 'markdown' CHECK (format IN ('markdown', 'html')),
        folder_id TEXT REFERENCES folders(id) ON DELETE SET NULL,
        is_favorite INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_outputs_project ON framework_outputs(project_id)",
    r#"
    CREATE TABLE IF NOT EXISTS framework_categories (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        icon TEXT NOT NULL DEFAULT '',
        sort_order INTEGER NOT NULL DEFAULT 0,
        is_builtin INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS framework_defs (
        id TEXT PRIMARY KEY,
        category TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        icon TEXT NOT NULL DEFAULT '',
        system_prompt TEXT NOT NULL,
        guiding_questions TEXT NOT NULL DEFAULT '[]',
        example_output TEXT NOT NULL DEFAULT '',
        supports_visuals INTEGER NOT NULL DEFAULT 0,
        visual_instructions TEXT,
        is_builtin INTEGER NOT NULL DEFAULT 0,
        is_modified INTEGER NOT NULL DEFAULT 0,
        sort_order INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS saved_prompts (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        category TEXT NOT NULL DEFAULT 'general',
        prompt_text TEXT NOT NULL,
        variables TEXT NOT NULL DEFAULT '[]',
        framework_id TEXT,
        is_builtin INTEGER NOT NULL DEFAULT 0,
        is_favorite INTEGER NOT NULL DEFAULT 0,
        usage_count INTEGER NOT NULL DEFAULT 0,
        last_used_at INTEGER,
        sort_order INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
];

/// Insert built-in categories and frameworks that are not present yet
///
/// Existing rows (including user edits to built-ins) are left untouched.
pub async fn seed_builtin_frameworks(pool: &SqlitePool) -> Result<()> {
    let now = time::now_secs();
    let mut tx = pool.begin().await?;

    for category in builtin_categories() {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO framework_categories
                (id, name, description, icon, sort_order, is_builtin, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(&category.icon)
        .bind(category.sort_order)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    for (index, def) in builtin_frameworks().into_iter().enumerate() {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO framework_defs
                (id, category, name, description, icon, system_prompt, guiding_questions,
                 example_output, supports_visuals, visual_instructions, is_builtin, is_modified,
                 sort_order, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, 0, ?, ?, ?)
            "#,
        )
        .bind(&def.id)
        .bind(&def.category)
        .bind(&def.name)
        .bind(&def.description)
        .bind(&def.icon)
        .bind(&def.system_prompt)
        .bind(serde_json::to_string(&def.guiding_questions)?)
        .bind(&def.example_output)
        .bind(def.supports_visuals)
        .bind(&def.visual_instructions)
        .bind(index as i64)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Prompts shipped with the application: (id, name, category, text, framework)
pub const BUILTIN_PROMPTS: &[(&str, &str, &str, &str, Option<&str>)] = &[
    (
        "builtin-competitive-analysis",
        "Competitive Analysis",
        "research",
        "Compare {{product}} with {{competitors}}. Cover positioning, pricing, key features and gaps we can exploit.",
        None,
    ),
    (
        "builtin-feature-prd",
        "Feature PRD",
        "requirements",
        "Write a PRD for {{feature}} aimed at {{audience}}. Include success metrics and open questions.",
        Some("prd"),
    ),
    (
        "builtin-prioritize-backlog",
        "Prioritize Backlog",
        "prioritization",
        "Score these backlog items with RICE and recommend the top three for next quarter:\n{{items}}",
        Some("rice"),
    ),
    (
        "builtin-interview-synthesis",
        "Interview Synthesis",
        "research",
        "Summarize the key themes, pains and quotes from these customer interview notes:\n{{notes}}",
        None,
    ),
    (
        "builtin-release-notes",
        "Release Notes",
        "general",
        "Draft customer-facing release notes for version {{version}} from these changes:\n{{changes}}",
        None,
    ),
];

/// Insert built-in saved prompts that are not present yet
pub async fn seed_builtin_prompts(pool: &SqlitePool) -> Result<()> {
    let now = time::now_secs();
    let mut tx = pool.begin().await?;

    for (index, (id, name, category, text, framework_id)) in BUILTIN_PROMPTS.iter().enumerate() {
        let variables = crate::db::prompts::extract_variables(text);
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO saved_prompts
                (id, name, description, category, prompt_text, variables, framework_id,
                 is_builtin, is_favorite, usage_count, sort_order, created_at, updated_at)
            VALUES (?, ?, '', ?, ?, ?, ?, 1, 0, 0, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(category)
        .bind(text)
        .bind(serde_json::to_string(&variables)?)
        .bind(framework_id)
        .bind(index as i64)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
