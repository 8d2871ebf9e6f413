//! Process configuration assembled from the environment.
//!
//! Defaults first, then `GAPFORGE_*` and `LITELLM_*` overrides, then
//! validation. CLI flags override individual values afterwards.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::frontier::OrchestratorConfig;
use crate::llm::litellm::DEFAULT_MODEL;
use crate::scheduler::SchedulerConfig;

/// Default SQLite database file.
pub const DEFAULT_DB_PATH: &str = "gapforge.db";

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Settings of the optional LLM evidence classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    /// OpenAI-compatible endpoint. The LLM classifier is used only when set.
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_base: None,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl LlmSettings {
    pub fn is_configured(&self) -> bool {
        self.api_base.as_deref().is_some_and(|base| !base.trim().is_empty())
    }
}

/// Everything a `gapforge` process needs to wire its components.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub orchestrator: OrchestratorConfig,
    /// SQLite database file holding jobs and results.
    pub db_path: PathBuf,
    pub llm: LlmSettings,
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            ..Default::default()
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `GAPFORGE_MAX_CONCURRENT_JOBS`: jobs running at once (default: 2)
    /// - `GAPFORGE_ADMISSION_POLL_MS`: admission retry interval (default: 5000)
    /// - `GAPFORGE_DB_PATH`: SQLite file (default: gapforge.db)
    /// - `GAPFORGE_MIN_GAP_CHARS`: minimum gap statement length (default: 20)
    /// - `GAPFORGE_VALIDATION_PAPERS`: papers per gap in final validation (default: 3)
    /// - `GAPFORGE_EXPLORATION_RESULTS_PER_QUERY`: expansion search depth (default: 1)
    /// - `GAPFORGE_VALIDATION_RESULTS_PER_QUERY`: validation search depth (default: 3)
    /// - `GAPFORGE_PARTIAL_ELIMINATION_CONFIDENCE`: partial-match elimination bar (default: 0.8)
    /// - `GAPFORGE_LIGHT_BUDGET_SECS`: light mode time budget (default: 120)
    /// - `LITELLM_API_BASE`, `LITELLM_API_KEY`, `LITELLM_DEFAULT_MODEL`: LLM classifier
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable cannot be parsed or the result is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(val) = lookup("GAPFORGE_MAX_CONCURRENT_JOBS") {
            config.scheduler.max_concurrent_jobs =
                parse_env_value(&val, "GAPFORGE_MAX_CONCURRENT_JOBS")?;
        }

        if let Some(val) = lookup("GAPFORGE_ADMISSION_POLL_MS") {
            let millis: u64 = parse_env_value(&val, "GAPFORGE_ADMISSION_POLL_MS")?;
            config.scheduler.admission_poll = Duration::from_millis(millis);
        }

        if let Some(val) = lookup("GAPFORGE_DB_PATH") {
            config.db_path = PathBuf::from(val);
        }

        if let Some(val) = lookup("GAPFORGE_MIN_GAP_CHARS") {
            config.orchestrator.min_gap_chars = parse_env_value(&val, "GAPFORGE_MIN_GAP_CHARS")?;
        }

        if let Some(val) = lookup("GAPFORGE_VALIDATION_PAPERS") {
            config.orchestrator.validation_papers =
                parse_env_value(&val, "GAPFORGE_VALIDATION_PAPERS")?;
        }

        if let Some(val) = lookup("GAPFORGE_EXPLORATION_RESULTS_PER_QUERY") {
            config.orchestrator.exploration_results_per_query =
                parse_env_value(&val, "GAPFORGE_EXPLORATION_RESULTS_PER_QUERY")?;
        }

        if let Some(val) = lookup("GAPFORGE_VALIDATION_RESULTS_PER_QUERY") {
            config.orchestrator.validation_results_per_query =
                parse_env_value(&val, "GAPFORGE_VALIDATION_RESULTS_PER_QUERY")?;
        }

        if let Some(val) = lookup("GAPFORGE_PARTIAL_ELIMINATION_CONFIDENCE") {
            config.orchestrator.partial_elimination_confidence =
                parse_env_value(&val, "GAPFORGE_PARTIAL_ELIMINATION_CONFIDENCE")?;
        }

        if let Some(val) = lookup("GAPFORGE_LIGHT_BUDGET_SECS") {
            let secs: u64 = parse_env_value(&val, "GAPFORGE_LIGHT_BUDGET_SECS")?;
            config.orchestrator.light_time_budget = Duration::from_secs(secs);
        }

        config.llm.api_base = lookup("LITELLM_API_BASE");
        config.llm.api_key = lookup("LITELLM_API_KEY");
        if let Some(val) = lookup("LITELLM_DEFAULT_MODEL") {
            config.llm.model = val;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.max_concurrent_jobs == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_concurrent_jobs must be greater than 0".to_string(),
            ));
        }

        if self.scheduler.admission_poll.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "admission_poll must be greater than 0".to_string(),
            ));
        }

        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "db_path cannot be empty".to_string(),
            ));
        }

        if self.orchestrator.validation_papers == 0 {
            return Err(ConfigError::ValidationFailed(
                "validation_papers must be greater than 0".to_string(),
            ));
        }

        if self.orchestrator.exploration_results_per_query == 0
            || self.orchestrator.validation_results_per_query == 0
        {
            return Err(ConfigError::ValidationFailed(
                "results per query must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.orchestrator.partial_elimination_confidence) {
            return Err(ConfigError::ValidationFailed(
                "partial_elimination_confidence must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "LLM model cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder method to set the database path.
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Builder method to replace the scheduler settings.
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Builder method to replace the orchestrator settings.
    pub fn with_orchestrator(mut self, orchestrator: OrchestratorConfig) -> Self {
        self.orchestrator = orchestrator;
        self
    }
}

/// Parse a string value into the target type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]).unwrap();

        assert_eq!(config.scheduler.max_concurrent_jobs, 2);
        assert_eq!(config.scheduler.admission_poll, Duration::from_secs(5));
        assert_eq!(config.db_path, PathBuf::from("gapforge.db"));
        assert_eq!(config.orchestrator.min_gap_chars, 20);
        assert_eq!(config.orchestrator.light_time_budget, Duration::from_secs(120));
        assert!(!config.llm.is_configured());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("GAPFORGE_MAX_CONCURRENT_JOBS", "4"),
            ("GAPFORGE_ADMISSION_POLL_MS", "250"),
            ("GAPFORGE_DB_PATH", "/tmp/jobs.db"),
            ("GAPFORGE_PARTIAL_ELIMINATION_CONFIDENCE", "0.9"),
            ("LITELLM_API_BASE", "http://localhost:4000"),
            ("LITELLM_DEFAULT_MODEL", "openai/gpt-4o"),
        ])
        .unwrap();

        assert_eq!(config.scheduler.max_concurrent_jobs, 4);
        assert_eq!(config.scheduler.admission_poll, Duration::from_millis(250));
        assert_eq!(config.db_path, PathBuf::from("/tmp/jobs.db"));
        assert_eq!(config.orchestrator.partial_elimination_confidence, 0.9);
        assert!(config.llm.is_configured());
        assert_eq!(config.llm.model, "openai/gpt-4o");
    }

    #[test]
    fn test_invalid_values() {
        let err = from_pairs(&[("GAPFORGE_MAX_CONCURRENT_JOBS", "many")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = from_pairs(&[("GAPFORGE_MAX_CONCURRENT_JOBS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationFailed(_)));

        let err = from_pairs(&[("GAPFORGE_PARTIAL_ELIMINATION_CONFIDENCE", "1.5")]).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationFailed(_)));
    }
}
