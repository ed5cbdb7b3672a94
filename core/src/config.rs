use crate::errors::{GenieError, GenieResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_REFERER: &str = "http://localhost:5000";
pub const DEFAULT_APP_NAME: &str = "Genie";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

pub const ENV_API_KEY: &str = "OPENROUTER_API_KEY";
pub const ENV_BASE_URL: &str = "OPENROUTER_BASE_URL";
pub const ENV_REFERER: &str = "YOUR_SITE_URL";
pub const ENV_APP_NAME: &str = "YOUR_APP_NAME";
pub const ENV_MODEL: &str = "GENIE_MODEL";
pub const ENV_TIMEOUT: &str = "GENIE_REQUEST_TIMEOUT_SECS";

/// Tunable dialogue policy. These values are rendered into the turn
/// instructions; nothing server-side enforces them beyond that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnPolicy {
    /// Questions after which the model must commit to a final answer.
    pub max_questions: u32,
    /// Confidence (percent) at which the model may answer early.
    pub confidence_percent: u8,
    /// Literal answers the user can give to each question.
    pub answer_choices: Vec<String>,
}

impl Default for TurnPolicy {
    fn default() -> Self {
        Self {
            max_questions: 25,
            confidence_percent: 95,
            answer_choices: ["yes", "no", "don't know", "probably", "partially wrong"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl TurnPolicy {
    pub fn validate(&self) -> GenieResult<()> {
        if self.max_questions == 0 {
            return Err(GenieError::Configuration(
                "max_questions must be at least 1".to_string(),
            ));
        }
        if !(1..=100).contains(&self.confidence_percent) {
            return Err(GenieError::Configuration(format!(
                "confidence_percent must be within 1..=100, got {}",
                self.confidence_percent
            )));
        }
        if self.answer_choices.iter().all(|c| c.trim().is_empty()) {
            return Err(GenieError::Configuration(
                "answer_choices must contain at least one choice".to_string(),
            ));
        }
        Ok(())
    }
}

/// Process-wide settings for the completion service, built once at startup
/// and shared read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub referer: String,
    pub app_name: String,
    pub model: String,
    pub request_timeout_secs: u64,
    pub policy: TurnPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            app_name: DEFAULT_APP_NAME.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout_secs: 60,
            policy: TurnPolicy::default(),
        }
    }
}

impl ServiceConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> GenieResult<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            GenieError::Configuration(format!("Failed to read config file: {}", e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            GenieError::Configuration(format!("Failed to parse config file: {}", e))
        })?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Merges overrides into this config, preferring values from the overrides if present
    pub fn merge(mut self, other: &ServiceOverrides) -> Self {
        if let Some(key) = &other.api_key {
            self.api_key = Some(key.clone());
        }
        if let Some(url) = &other.base_url {
            self.base_url = url.clone();
        }
        if let Some(referer) = &other.referer {
            self.referer = referer.clone();
        }
        if let Some(name) = &other.app_name {
            self.app_name = name.clone();
        }
        if let Some(model) = &other.model {
            self.model = model.clone();
        }
        if let Some(secs) = other.request_timeout_secs {
            self.request_timeout_secs = secs;
        }
        self
    }

    /// Overrides fields from environment variables. Empty values count as unset.
    pub fn apply_env<F>(self, lookup: F) -> GenieResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(self.merge(&ServiceOverrides::from_env(lookup)?))
    }

    /// Full startup load: `.env`, then the TOML file (explicit or default
    /// location), then process environment.
    pub fn load(path: Option<&Path>) -> GenieResult<Self> {
        if let Ok(env_path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", env_path.display());
        }

        let path = match path {
            Some(p) => p.to_path_buf(),
            None => get_default_config_file("genie")?,
        };

        let config = Self::load_from_file(&path)?.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GenieResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(GenieError::Configuration("base_url must not be empty".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(GenieError::Configuration(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        self.policy.validate()
    }

    /// Whether a usable credential is present.
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

/// Partial settings layered over a [`ServiceConfig`], from the
/// environment or the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceOverrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub referer: Option<String>,
    pub app_name: Option<String>,
    pub model: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl ServiceOverrides {
    pub fn from_env<F>(lookup: F) -> GenieResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let request_timeout_secs = match var(ENV_TIMEOUT) {
            Some(secs) => Some(secs.trim().parse().map_err(|_| {
                GenieError::Configuration(format!("{} must be a number of seconds", ENV_TIMEOUT))
            })?),
            None => None,
        };

        Ok(Self {
            api_key: var(ENV_API_KEY),
            base_url: var(ENV_BASE_URL),
            referer: var(ENV_REFERER),
            app_name: var(ENV_APP_NAME),
            model: var(ENV_MODEL),
            request_timeout_secs,
        })
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> GenieResult<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        GenieError::Configuration("Could not determine home directory".to_string())
    })?;

    Ok(home_dir.join(".config").join(app_name))
}

/// Helper function to get default config file path
pub fn get_default_config_file(app_name: &str) -> GenieResult<PathBuf> {
    let config_dir = get_default_config_dir(app_name)?;
    Ok(config_dir.join("config.toml"))
}
