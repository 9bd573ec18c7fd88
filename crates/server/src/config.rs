use std::{collections::HashMap, fs, path::Path};

use tracing::warn;

pub const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:3000".into(),
            database_url: "sqlite://./data/annotators.db".into(),
            log_filter: "info".into(),
        }
    }
}

/// Defaults, then `server.toml` in the working directory, then environment.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();
    settings.apply_file(Path::new(SETTINGS_FILE));
    settings.apply_env(|key| std::env::var(key).ok());
    settings
}

impl Settings {
    pub fn apply_file(&mut self, path: &Path) {
        let Ok(raw) = fs::read_to_string(path) else {
            return;
        };
        if let Err(error) = self.apply_toml(&raw) {
            warn!(path = %path.display(), %error, "ignoring unreadable settings file");
        }
    }

    pub fn apply_toml(&mut self, raw: &str) -> anyhow::Result<()> {
        let file_cfg = toml::from_str::<HashMap<String, String>>(raw)?;
        if let Some(v) = file_cfg.get("bind_addr") {
            self.server_bind = v.clone();
        }
        if let Some(v) = file_cfg.get("database_url") {
            self.database_url = v.clone();
        }
        if let Some(v) = file_cfg.get("log_filter") {
            self.log_filter = v.clone();
        }
        Ok(())
    }

    /// Later keys in each list take precedence.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for key in ["SERVER_BIND", "APP__BIND_ADDR"] {
            if let Some(v) = lookup(key) {
                self.server_bind = v;
            }
        }
        for key in ["DATABASE_URL", "APP__DATABASE_URL"] {
            if let Some(v) = lookup(key) {
                self.database_url = v;
            }
        }
        for key in ["RUST_LOG", "APP__LOG_FILTER"] {
            if let Some(v) = lookup(key) {
                self.log_filter = v;
            }
        }
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    storage::ensure_sqlite_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

pub(crate) fn normalize_database_url(raw_database_url: &str) -> String {
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
        return format!("sqlite://{}", path.replace('\\', "/"));
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
