//! Error types for the GreenLight client.
//!
//! # Design
//! Variants are grouped the way callers react to them. Configuration errors
//! mean the session can never work as set up and should not be retried.
//! `Request` carries everything needed to reproduce a rejected call. Role
//! checks done locally surface as `Permission` before any request is sent.

use thiserror::Error;

use crate::session::RoleType;

/// Errors returned by every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The stage name is not one of the recognized stages or aliases.
    #[error("stage '{0}' not recognized")]
    UnknownStage(String),

    /// A required environment variable is not set.
    #[error("missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// The API key is blank.
    #[error("API key is empty")]
    InvalidApiKey,

    /// The HTTP method is not one the Service accepts.
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// The profile resolved to a resource type other than admin or client.
    #[error("unsupported profile resource type: {0}")]
    UnsupportedResource(String),

    /// The API key is associated with zero or several profiles.
    #[error("expected exactly one profile for this API key, found {0}; the account is misconfigured, contact support")]
    ProfileCount(usize),

    /// The operation needs a session constructed with an API key.
    #[error("operation requires an authenticated session")]
    NotAuthenticated,

    /// A stage-guarded operation was attempted against a forbidden stage.
    #[error("{operation} refused on stage {stage}")]
    StageGuard {
        operation: &'static str,
        stage: &'static str,
    },

    /// The Service answered with a status other than the expected one.
    #[error("{method} {url} returned {status}, expected {expected}: {body}")]
    Request {
        method: &'static str,
        url: String,
        status: u16,
        expected: u16,
        body: String,
    },

    /// The session's role does not allow this operation.
    #[error("{operation} requires role {required}, session role is {actual}")]
    Permission {
        operation: &'static str,
        required: RoleType,
        actual: RoleType,
    },

    /// No client is available to select: the admin has none.
    #[error("no client available for {0}")]
    NoClient(&'static str),

    /// A field the client relies on is absent from a response.
    #[error("field '{0}' absent from response")]
    MissingField(&'static str),

    /// A date or timestamp could not be parsed.
    #[error("invalid date '{0}'")]
    InvalidDate(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request never produced an HTTP response.
    #[error("transport failed: {0}")]
    Transport(String),

    /// A multi-step workflow failed after creating `resource_id`. Records
    /// created before the failure are left in place.
    #[error("{workflow} stopped after creating {resource_id}: {source}")]
    Incomplete {
        workflow: &'static str,
        resource_id: String,
        #[source]
        source: Box<ApiError>,
    },
}

impl ApiError {
    /// True for errors caused by how the client or account is set up rather
    /// than by a particular request.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::UnknownStage(_)
                | Self::MissingEnvVar(_)
                | Self::InvalidApiKey
                | Self::UnsupportedMethod(_)
                | Self::UnsupportedResource(_)
                | Self::ProfileCount(_)
                | Self::NotAuthenticated
                | Self::StageGuard { .. }
        )
    }

    /// HTTP status of a rejected request, if this is a request error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => Some(*status),
            Self::Incomplete { source, .. } => source.status(),
            _ => None,
        }
    }

    pub(crate) fn incomplete(workflow: &'static str, resource_id: &str, source: Self) -> Self {
        Self::Incomplete {
            workflow,
            resource_id: resource_id.to_string(),
            source: Box::new(source),
        }
    }
}
