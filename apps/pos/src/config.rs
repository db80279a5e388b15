use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use pos_core::{PosOptions, SaleMode, DEFAULT_LOW_STOCK_THRESHOLD};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "pos.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_url: String,
    pub low_stock_threshold: u32,
    pub sale_mode: SaleMode,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/pos.db".into(),
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            sale_mode: SaleMode::Atomic,
            log_filter: "warn".into(),
        }
    }
}

impl Settings {
    pub fn pos_options(&self) -> PosOptions {
        PosOptions {
            sale_mode: self.sale_mode,
            low_stock_threshold: self.low_stock_threshold,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    database_url: Option<String>,
    low_stock_threshold: Option<u32>,
    sale_mode: Option<SaleMode>,
    log_filter: Option<String>,
}

/// Defaults, then the config file, then the environment.
///
/// An explicitly requested file must exist; the default `pos.toml` is
/// optional.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let (path, required) = match config_path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    if required || path.exists() {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid config file '{}'", path.display()))?;
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    settings.database_url = normalize_database_url(&settings.database_url);
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.low_stock_threshold {
        settings.low_stock_threshold = v;
    }
    if let Some(v) = file_cfg.sale_mode {
        settings.sale_mode = v;
    }
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
    Ok(())
}

fn apply_env(
    settings: &mut Settings,
    var: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = var("POS__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = var("POS__LOW_STOCK_THRESHOLD") {
        settings.low_stock_threshold = v
            .trim()
            .parse()
            .with_context(|| format!("POS__LOW_STOCK_THRESHOLD '{v}' is not a number"))?;
    }

    if let Some(v) = var("POS__SALE_MODE") {
        settings.sale_mode = v.parse().map_err(anyhow::Error::msg)?;
    }

    if let Some(v) = var("RUST_LOG") {
        settings.log_filter = v;
    }
    if let Some(v) = var("POS__LOG_FILTER") {
        settings.log_filter = v;
    }

    Ok(())
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
