//! Typed access to the settings table
//!
//! The API key is stored sealed under `api_key` and never leaves this
//! module in plain text except through [`get_decrypted_api_key`].

use pmide_common::config::StoreConfig;
use pmide_common::db::{delete_setting, get_setting, set_setting};
use pmide_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::schema::DEFAULT_SETTINGS;
use crate::models::{Settings, SettingsUpdate};
use crate::secrets::{mask_api_key, SecretBox};

const API_KEY: &str = "api_key";

fn default_for(key: &str) -> String {
    if key == "sidecar_url" {
        return StoreConfig::default().sidecar_url;
    }
    DEFAULT_SETTINGS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.to_string())
        .unwrap_or_default()
}

async fn get_or_default(pool: &SqlitePool, key: &str) -> Result<String> {
    Ok(get_setting(pool, key).await?.unwrap_or_else(|| default_for(key)))
}

pub async fn get_settings(pool: &SqlitePool, secrets: &SecretBox) -> Result<Settings> {
    let api_key = get_decrypted_api_key(pool, secrets).await?;

    let max_tokens = get_or_default(pool, "max_tokens").await?;
    let max_tokens = max_tokens.parse::<i64>().unwrap_or_else(|_| {
        warn!("Setting 'max_tokens' is not a number: {}", max_tokens);
        4096
    });

    Ok(Settings {
        api_key_set: api_key.is_some(),
        api_key_preview: api_key.as_deref().map(mask_api_key),
        default_model: get_or_default(pool, "default_model").await?,
        max_tokens,
        theme: get_or_default(pool, "theme").await?,
        sidecar_url: get_or_default(pool, "sidecar_url").await?,
        autosave: get_or_default(pool, "autosave").await? == "true",
    })
}

/// Apply the fields present in `update`
///
/// Every field is validated before the first write, so a rejected update
/// leaves the stored settings untouched.
pub async fn update_settings(pool: &SqlitePool, secrets: &SecretBox, update: &SettingsUpdate) -> Result<Settings> {
    let default_model = update
        .default_model
        .as_deref()
        .map(|model| super::require_name("Default model", model))
        .transpose()?;
    if let Some(max_tokens) = update.max_tokens {
        if max_tokens <= 0 {
            return Err(Error::InvalidInput("max_tokens must be positive".to_string()));
        }
    }

    if let Some(key) = &update.api_key {
        let key = key.trim();
        if key.is_empty() {
            delete_api_key(pool).await?;
        } else {
            set_setting(pool, API_KEY, &secrets.seal(key)).await?;
            info!("API key updated");
        }
    }
    if let Some(model) = &default_model {
        set_setting(pool, "default_model", model).await?;
    }
    if let Some(max_tokens) = update.max_tokens {
        set_setting(pool, "max_tokens", &max_tokens.to_string()).await?;
    }
    if let Some(theme) = &update.theme {
        set_setting(pool, "theme", theme).await?;
    }
    if let Some(url) = &update.sidecar_url {
        set_setting(pool, "sidecar_url", url.trim_end_matches('/')).await?;
    }
    if let Some(autosave) = update.autosave {
        set_setting(pool, "autosave", if autosave { "true" } else { "false" }).await?;
    }

    get_settings(pool, secrets).await
}

/// Plain-text API key, `None` when unset or unreadable
///
/// A value sealed under another install's secret is treated as unset.
pub async fn get_decrypted_api_key(pool: &SqlitePool, secrets: &SecretBox) -> Result<Option<String>> {
    let Some(sealed) = get_setting(pool, API_KEY).await? else {
        return Ok(None);
    };
    if sealed.is_empty() {
        return Ok(None);
    }
    match secrets.open(&sealed) {
        Ok(key) => Ok(Some(key)),
        Err(e) => {
            warn!("Stored API key could not be unsealed: {}", e);
            Ok(None)
        }
    }
}

pub async fn delete_api_key(pool: &SqlitePool) -> Result<()> {
    delete_setting(pool, API_KEY).await?;
    info!("API key removed");
    Ok(())
}

/// Configured sidecar base URL without a trailing slash
pub async fn sidecar_url(pool: &SqlitePool) -> Result<String> {
    Ok(get_or_default(pool, "sidecar_url").await?.trim_end_matches('/').to_string())
}
