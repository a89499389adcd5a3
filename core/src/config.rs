//! Client configuration loaded from the environment.
//!
//! # Environment Variables
//!
//! ## Required
//! - `GL_STAGE` - Service stage (`staging`, `production`, or an alias)
//!
//! ## Optional
//! - `GL_APIKEY` - API key; without it only unauthenticated calls work
//! - `GL_BASE_URL` - Override the stage's base URL (local mock servers)
//! - `GL_VERBOSE` - `1` or `true` logs request and response bodies

use secrecy::{ExposeSecret, SecretString};

use crate::error::ApiError;
use crate::executor::ExecutorConfig;
use crate::stage::Stage;

/// Everything needed to open a session.
#[derive(Clone)]
pub struct Config {
    pub stage: Stage,
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub executor: ExecutorConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("stage", &self.stage)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("executor", &self.executor)
            .finish()
    }
}

impl Config {
    #[must_use]
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            base_url: None,
            api_key: None,
            executor: ExecutorConfig::default(),
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.api_key = Some(api_key);
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_log_bodies(mut self, log_bodies: bool) -> Self {
        self.executor.log_bodies = log_bodies;
        self
    }

    /// Base URL requests go to: the override if set, else the stage's.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or_else(|| self.stage.base_url())
    }

    /// Load from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `GL_STAGE` is missing or unknown, or
    /// `GL_APIKEY` is set but blank.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to read variables.
    ///
    /// # Errors
    ///
    /// As `from_env`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let stage: Stage = lookup("GL_STAGE")
            .ok_or(ApiError::MissingEnvVar("GL_STAGE"))?
            .parse()?;

        let mut config = Self::new(stage);

        if let Some(key) = lookup("GL_APIKEY") {
            let key = SecretString::from(key);
            validate_api_key(&key)?;
            config = config.with_api_key(key);
        }

        if let Some(url) = lookup("GL_BASE_URL").filter(|u| !u.trim().is_empty()) {
            config = config.with_base_url(url);
        }

        let verbose = lookup("GL_VERBOSE").is_some_and(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"));
        Ok(config.with_log_bodies(verbose))
    }
}

pub(crate) fn validate_api_key(key: &SecretString) -> Result<(), ApiError> {
    if key.expose_secret().trim().is_empty() {
        return Err(ApiError::InvalidApiKey);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn stage_is_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ApiError::MissingEnvVar("GL_STAGE")));
    }

    #[test]
    fn unknown_stage_fails_fast() {
        let err = Config::from_lookup(lookup(&[("GL_STAGE", "qa")])).unwrap_err();
        assert!(matches!(err, ApiError::UnknownStage(s) if s == "qa"));
    }

    #[test]
    fn api_key_is_optional() {
        let config = Config::from_lookup(lookup(&[("GL_STAGE", "sandbox")])).unwrap();
        assert_eq!(config.stage, Stage::Staging);
        assert!(config.api_key.is_none());
        assert_eq!(config.base_url(), Stage::Staging.base_url());
    }

    #[test]
    fn blank_api_key_is_rejected() {
        let err = Config::from_lookup(lookup(&[("GL_STAGE", "staging"), ("GL_APIKEY", "  ")])).unwrap_err();
        assert!(matches!(err, ApiError::InvalidApiKey));
    }

    #[test]
    fn overrides_and_verbosity() {
        let config = Config::from_lookup(lookup(&[
            ("GL_STAGE", "production"),
            ("GL_APIKEY", "k"),
            ("GL_BASE_URL", "http://127.0.0.1:3000"),
            ("GL_VERBOSE", "1"),
        ]))
        .unwrap();
        assert_eq!(config.base_url(), "http://127.0.0.1:3000");
        assert!(config.executor.log_bodies);
        assert_eq!(config.api_key.as_ref().unwrap().expose_secret(), "k");
        assert!(!format!("{config:?}").contains("\"k\""));
    }
}
