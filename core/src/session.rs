//! Authenticated session against the Service.
//!
//! # Design
//! Opening a session with an API key bootstraps it once: `/profile` must
//! return exactly one entry, whose `resource` decides whether the admin or
//! the client record is loaded (a client session also loads its owning
//! admin). The role is classified from the profile once and stored as a
//! `RoleType`; operations match on it instead of re-inspecting strings.
//! After construction the session state is read-only.

use std::fmt;

use secrecy::SecretString;
use tracing::{debug, info};

use crate::config::{validate_api_key, Config};
use crate::error::ApiError;
use crate::executor::{ApiCall, Executor};
use crate::stage::Stage;
use crate::transport::{Transport, UreqTransport};
use crate::types::{Admin, Client, Profile};

/// What an API key is allowed to act as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleType {
    Admin,
    Client,
    Unclassified,
}

impl RoleType {
    /// Classify a profile role string by its two-letter prefix:
    /// `gl…` roles are admins, `cl…` roles are clients.
    #[must_use]
    pub fn classify(role: &str) -> Self {
        if role.starts_with("gl") {
            Self::Admin
        } else if role.starts_with("cl") {
            Self::Client
        } else {
            Self::Unclassified
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Client => "client",
            Self::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for RoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client for one stage of the Service, optionally authenticated.
pub struct GreenLight<T = UreqTransport> {
    pub(crate) executor: Executor<T>,
    stage: Stage,
    role: RoleType,
    profile: Option<Profile>,
    admin: Option<Admin>,
    client: Option<Client>,
}

impl<T> fmt::Debug for GreenLight<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GreenLight")
            .field("executor", &self.executor)
            .field("stage", &self.stage)
            .field("role", &self.role)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl GreenLight<UreqTransport> {
    /// Open a session on `stage` over HTTPS.
    ///
    /// # Errors
    ///
    /// See `with_transport`.
    pub fn new(stage: Stage, api_key: Option<SecretString>) -> Result<Self, ApiError> {
        let mut config = Config::new(stage);
        config.api_key = api_key;
        Self::from_config(config)
    }

    /// Open a session from a loaded `Config` over HTTPS.
    ///
    /// # Errors
    ///
    /// See `with_transport`.
    pub fn from_config(config: Config) -> Result<Self, ApiError> {
        Self::with_transport(config, UreqTransport::new())
    }

    /// Load `Config` from the environment and open a session.
    ///
    /// # Errors
    ///
    /// Configuration errors from `Config::from_env`, then as `with_transport`.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_config(Config::from_env()?)
    }
}

impl<T: Transport> GreenLight<T> {
    /// Open a session that sends requests through `transport`. With an API
    /// key the profile is bootstrapped before this returns.
    ///
    /// # Errors
    ///
    /// `InvalidApiKey` for a blank key, `ProfileCount` unless exactly one
    /// profile exists, `UnsupportedResource` for a profile that is neither
    /// admin nor client, and any request error from the bootstrap calls.
    pub fn with_transport(config: Config, transport: T) -> Result<Self, ApiError> {
        if let Some(key) = &config.api_key {
            validate_api_key(key)?;
        }
        let authenticated = config.api_key.is_some();
        let executor = Executor::new(config.base_url(), config.api_key.clone(), transport, config.executor);

        let mut session = Self {
            executor,
            stage: config.stage,
            role: RoleType::Unclassified,
            profile: None,
            admin: None,
            client: None,
        };
        if authenticated {
            session.bootstrap()?;
        }
        Ok(session)
    }

    fn bootstrap(&mut self) -> Result<(), ApiError> {
        let profiles: Vec<Profile> = self.executor.call_as(&ApiCall::get("/profile"), None)?;
        if profiles.len() != 1 {
            return Err(ApiError::ProfileCount(profiles.len()));
        }
        let Some(profile) = profiles.into_iter().next() else {
            return Err(ApiError::ProfileCount(0));
        };
        debug!(resource = %profile.resource, resource_id = %profile.resource_id, "profile loaded");

        match profile.resource.as_str() {
            "admin" => {
                self.admin = Some(self.get_admin(&profile.resource_id, None)?);
                self.client = None;
            }
            "client" => {
                let client = self.get_client(&profile.resource_id, None)?;
                self.admin = Some(self.get_admin(&client.admin_id, None)?);
                self.client = Some(client);
            }
            other => return Err(ApiError::UnsupportedResource(other.to_string())),
        }

        self.role = RoleType::classify(&profile.role);
        info!(role = %self.role, stage = %self.stage, "session ready");
        self.profile = Some(profile);
        Ok(())
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn role_type(&self) -> RoleType {
        self.role
    }

    #[must_use]
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// The admin record: the session's own, or the owning admin of its client.
    #[must_use]
    pub fn admin(&self) -> Option<&Admin> {
        self.admin.as_ref()
    }

    /// The client record; empty for admin sessions.
    #[must_use]
    pub fn client(&self) -> Option<&Client> {
        self.client.as_ref()
    }

    /// The session's external-id scope, selected by role.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        match self.role {
            RoleType::Admin => self.admin.as_ref().and_then(|a| a.scope.as_deref()),
            RoleType::Client => self.client.as_ref().and_then(|c| c.scope.as_deref()),
            RoleType::Unclassified => None,
        }
    }

    /// Fail with `Permission` unless the session holds `required`.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` for a session without a profile, else `Permission`
    /// on a role mismatch.
    pub fn require_role(&self, operation: &'static str, required: RoleType) -> Result<(), ApiError> {
        if self.profile.is_none() {
            return Err(ApiError::NotAuthenticated);
        }
        if self.role == required {
            return Ok(());
        }
        Err(ApiError::Permission {
            operation,
            required,
            actual: self.role,
        })
    }

    /// Run a call with the session's scope available for injection.
    pub(crate) fn exec(&self, call: &ApiCall) -> Result<serde_json::Value, ApiError> {
        self.executor.call(call, self.scope())
    }

    pub(crate) fn exec_as<R: serde::de::DeserializeOwned>(&self, call: &ApiCall) -> Result<R, ApiError> {
        self.executor.call_as(call, self.scope())
    }
}
