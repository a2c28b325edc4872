// Configuration loading and parsing (app.toml, credentials.toml, environment).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::store::SchemaNaming;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub sqlite: SqliteConfig,
    pub insight: InsightConfig,
    pub credentials: CredentialsConfig,
}

impl Config {
    /// Supabase URL and anon key, when both are set.
    pub fn store_credentials(&self) -> Option<(&str, &str)> {
        let url = self.credentials.supabase_url.as_deref()?;
        let key = self.credentials.supabase_anon_key.as_deref()?;
        Some((url, key))
    }

    pub fn insight_api_key(&self) -> Option<&str> {
        self.credentials.gemini_api_key.as_deref()
    }
}

// ---------------------------------------------------------------------------
// app.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire app.toml file.
#[derive(Debug, Clone, Deserialize)]
struct AppFile {
    store: StoreConfig,
    #[serde(default)]
    sqlite: SqliteConfig,
    insight: InsightConfig,
}

/// Which backend holds the participant table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Hosted PostgREST (Supabase) table.
    Rest,
    /// Local SQLite database.
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Naming convention tried first; the other one is the fallback.
    #[serde(default)]
    pub primary_naming: SchemaNaming,
    pub request_timeout_secs: u64,
    /// Also write the drawn participant's id, for tables that have the
    /// target id column. Off by default since the hosted table may not.
    #[serde(default)]
    pub write_target_id: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SqliteConfig {
    pub path: String,
    /// Names inserted into the local database on start when missing.
    #[serde(default)]
    pub seed: Vec<String>,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        SqliteConfig {
            path: "amigo-secreto.db".into(),
            seed: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsightConfig {
    pub model: String,
    pub base_url: String,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub gemini_api_key: Option<String>,
}

/// Environment variables that override credentials, checked in order.
const SUPABASE_URL_VARS: &[&str] = &["SUPABASE_URL", "VITE_SUPABASE_URL"];
const SUPABASE_KEY_VARS: &[&str] = &["SUPABASE_ANON_KEY", "VITE_SUPABASE_ANON_KEY"];
const GEMINI_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "API_KEY"];

impl CredentialsConfig {
    /// Overlay values from the environment on top of the file values and
    /// drop blank entries. `lookup` is `std::env::var` outside of tests.
    pub fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = |vars: &[&str]| {
            vars.iter()
                .filter_map(|v| lookup(v))
                .find(|v| !v.trim().is_empty())
        };

        if let Some(v) = from_env(SUPABASE_URL_VARS) {
            self.supabase_url = Some(v);
        }
        if let Some(v) = from_env(SUPABASE_KEY_VARS) {
            self.supabase_anon_key = Some(v);
        }
        if let Some(v) = from_env(GEMINI_KEY_VARS) {
            self.gemini_api_key = Some(v);
        }

        self.supabase_url = non_blank(self.supabase_url);
        self.supabase_anon_key = non_blank(self.supabase_anon_key);
        self.gemini_api_key = non_blank(self.gemini_api_key);
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/app.toml` and (optionally)
/// `config/credentials.toml` under `base_dir`, then overlay credentials
/// from `env`.
///
/// Does not copy defaults; `load_config()` does that first.
pub fn load_config_with_env<F>(base_dir: &Path, env: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let config_dir = base_dir.join("config");

    // --- app.toml (required) ---
    let app_path = config_dir.join("app.toml");
    let app_text = read_file(&app_path)?;
    let app_file: AppFile = toml::from_str(&app_text).map_err(|e| ConfigError::ParseError {
        path: app_path.clone(),
        source: e,
    })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials: CredentialsConfig = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        store: app_file.store,
        sqlite: app_file.sqlite,
        insight: app_file.insight,
        credentials: credentials.apply_env(env),
    };

    validate(&config)?;

    Ok(config)
}

/// Same as `load_config_with_env`, reading the process environment.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    load_config_with_env(base_dir, |name| std::env::var(name).ok())
}

/// Copy every file in `defaults/` that is missing from `config/`.
/// Returns the copied paths. `.example` templates are never copied.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        if config_dir.is_dir() {
            return Ok(vec![]);
        }
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "neither defaults/ nor config/ found in {}; run from the project root",
                base_dir.display()
            ),
        });
    }

    let copy_err = |message: String| ConfigError::DefaultsCopyError { message };

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_err(format!("failed to create config directory: {e}")))?;

    let entries = std::fs::read_dir(&defaults_dir)
        .map_err(|e| copy_err(format!("failed to read defaults directory: {e}")))?;

    let mut copied = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| copy_err(format!("failed to read defaults entry: {e}")))?
            .path();
        let Some(file_name) = path.file_name().filter(|_| path.is_file()) else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }

        let target = config_dir.join(file_name);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path)
                    .map_err(|e| copy_err(format!("failed to read {}: {e}", path.display())))?;
                std::io::Write::write_all(&mut dest, &content)
                    .map_err(|e| copy_err(format!("failed to write {}: {e}", target.display())))?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(copy_err(format!(
                    "failed to create {}: {e}",
                    target.display()
                )))
            }
        }
    }

    Ok(copied)
}

/// Loads config relative to the current working directory, copying
/// defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.store.request_timeout_secs == 0 {
        return Err(invalid("store.request_timeout_secs", "must be greater than 0"));
    }

    if config.store.backend == StoreBackend::Sqlite && config.sqlite.path.trim().is_empty() {
        return Err(invalid(
            "sqlite.path",
            "must not be empty when store.backend = \"sqlite\"",
        ));
    }

    if config.insight.model.trim().is_empty() {
        return Err(invalid("insight.model", "must not be empty"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
