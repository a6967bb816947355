use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

const APP_DIR: &str = "studybuddy";
const DEFAULT_DB_NAME: &str = "studybuddy.db";
const DEFAULT_STORAGE_DIR: &str = "files";
const SESSION_FILE: &str = "session";
const DEFAULT_MODELS: &str = "gemini-1.5-flash,gemini-1.5-pro,gemini-pro";
const DEFAULT_LOG_LEVEL: &str = "warn";
const DEV_JWT_SECRET: &str = "studybuddy-dev-secret";

/// Runtime settings, read from the environment with per-user defaults under
/// the platform config directory.
#[derive(Debug, Clone)]
pub struct Config {
    pub config_dir: PathBuf,
    pub db_path: PathBuf,
    pub storage_dir: PathBuf,
    pub jwt_secret: String,
    pub gemini_api_key: Option<String>,
    pub models: Vec<String>,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let config_dir = var("STUDYBUDDY_HOME").map(PathBuf::from).unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
        });

        let db_path = var("STUDYBUDDY_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir.join(DEFAULT_DB_NAME));
        let storage_dir = var("STUDYBUDDY_STORAGE")
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir.join(DEFAULT_STORAGE_DIR));

        let models = parse_models(&var("STUDYBUDDY_MODELS").unwrap_or_else(|| DEFAULT_MODELS.into()));

        Self {
            db_path,
            storage_dir,
            jwt_secret: var("STUDYBUDDY_JWT_SECRET")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEV_JWT_SECRET.into()),
            gemini_api_key: var("GEMINI_API_KEY").filter(|s| !s.is_empty()),
            models,
            log_level: var("STUDYBUDDY_LOG").unwrap_or_else(|| DEFAULT_LOG_LEVEL.into()),
            config_dir,
        }
    }

    /// True when no `STUDYBUDDY_JWT_SECRET` was given and tokens are signed
    /// with the built-in development secret.
    pub fn uses_dev_jwt_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        if let Some(parent) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    pub fn session_path(&self) -> PathBuf {
        self.config_dir.join(SESSION_FILE)
    }

    /// The token saved by the last `login`, if any.
    pub fn load_session(&self) -> Option<String> {
        read_token(&self.session_path())
    }

    pub fn save_session(&self, token: &str) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::write(self.session_path(), token)?;
        debug!(path = %self.session_path().display(), "Saved session token");
        Ok(())
    }

    pub fn clear_session(&self) -> Result<()> {
        match std::fs::remove_file(self.session_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn read_token(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_models(list: &str) -> Vec<String> {
    let models: Vec<String> = list
        .split(',')
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();
    if models.is_empty() {
        parse_models(DEFAULT_MODELS)
    } else {
        models
    }
}
