//! Deployment stages and their base URLs.

use std::fmt;
use std::str::FromStr;

use crate::error::ApiError;

const STAGING_URL: &str = "https://api.greenlight.ai/staging-ext";
const PRODUCTION_URL: &str = "https://api.greenlight.ai/beta-ext";

/// A Service deployment. Each stage resolves to exactly one base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Sandbox for integration work. Aliases: `test`, `sandbox`.
    Staging,
    /// Live deployment. Aliases: `site`, `beta`.
    Production,
}

impl Stage {
    #[must_use]
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Staging => STAGING_URL,
            Self::Production => PRODUCTION_URL,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl FromStr for Stage {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staging" | "test" | "sandbox" => Ok(Self::Staging),
            "production" | "site" | "beta" => Ok(Self::Production),
            other => Err(ApiError::UnknownStage(other.to_string())),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve a stage name (or alias) straight to its base URL.
///
/// # Errors
///
/// Returns `ApiError::UnknownStage` naming the input when it is not recognized.
pub fn base_url(stage: &str) -> Result<&'static str, ApiError> {
    stage.parse::<Stage>().map(Stage::base_url)
}
