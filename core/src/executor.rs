//! Authenticated request execution against one Service deployment.
//!
//! # Design
//! Every call is described by an `ApiCall` value built fresh for that call.
//! `Executor::build_request` turns it into an `HttpRequest` (attaching the
//! API key and filling in a missing external-id scope), the `Transport` runs
//! it, and `Executor::parse_response` validates the status and decodes JSON.
//! `Executor::call` chains the three steps.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::Transport;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Body field holding a caller-supplied external id.
pub const EXT_ID_FIELD: &str = "ext_id";

/// Body field qualifying `ext_id`.
pub const EXT_ID_SCOPE_FIELD: &str = "ext_id_scope";

/// Executor settings fixed at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutorConfig {
    /// Log request and response bodies at debug level.
    pub log_bodies: bool,
}

/// A single call against the Service: path relative to the stage base URL,
/// method, query, body and the status that counts as success.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    method: HttpMethod,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    expected: Option<u16>,
}

impl ApiCall {
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            expected: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, path).body(body)
    }

    #[must_use]
    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Put, path).body(body)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// A bodiless POST to an action endpoint, which answers 200.
    #[must_use]
    pub fn action(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path).expect(200)
    }

    #[must_use]
    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Add `key=value` only when a value is given.
    #[must_use]
    pub fn query_opt(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Override the per-method success status.
    #[must_use]
    pub fn expect(mut self, status: u16) -> Self {
        self.expected = Some(status);
        self
    }

    #[must_use]
    pub fn expected_status(&self) -> u16 {
        self.expected.unwrap_or_else(|| self.method.default_status())
    }
}

/// Fill `ext_id_scope` with `scope` when the body carries an `ext_id` but
/// no non-empty scope. Returns whether the body was changed.
///
/// Only the top level of a JSON object is inspected. An explicit scope is
/// never replaced, whatever namespace it belongs to.
pub fn inject_scope(body: &mut Value, scope: &str) -> bool {
    let Some(obj) = body.as_object_mut() else {
        return false;
    };
    let has_ext_id = obj.get(EXT_ID_FIELD).is_some_and(|v| !v.is_null());
    if !has_ext_id {
        return false;
    }
    let has_scope = match obj.get(EXT_ID_SCOPE_FIELD) {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    };
    if has_scope {
        return false;
    }
    obj.insert(EXT_ID_SCOPE_FIELD.to_string(), Value::String(scope.to_string()));
    true
}

/// Issues calls against one base URL with one API key.
pub struct Executor<T> {
    base_url: String,
    api_key: Option<SecretString>,
    transport: T,
    config: ExecutorConfig,
}

impl<T> std::fmt::Debug for Executor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Executor<T> {
    pub fn new(
        base_url: &str,
        api_key: Option<SecretString>,
        transport: T,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            transport,
            config,
        }
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Turn `call` into a concrete request. When `scope` is given it fills a
    /// missing `ext_id_scope` in the body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Serialization` if the body cannot be encoded.
    pub fn build_request(&self, call: &ApiCall, scope: Option<&str>) -> Result<HttpRequest, ApiError> {
        let mut headers = Vec::new();
        if let Some(key) = &self.api_key {
            headers.push((API_KEY_HEADER.to_string(), key.expose_secret().to_string()));
        }

        let body = match &call.body {
            Some(body) => {
                let mut body = body.clone();
                if let Some(scope) = scope {
                    if inject_scope(&mut body, scope) {
                        debug!(path = %call.path, "filled in ext_id_scope");
                    }
                }
                headers.push(("content-type".to_string(), "application/json".to_string()));
                Some(serde_json::to_string(&body).map_err(|e| ApiError::Serialization(e.to_string()))?)
            }
            None => None,
        };

        Ok(HttpRequest {
            method: call.method,
            url: format!("{}{}", self.base_url, call.path),
            headers,
            query: call.query.clone(),
            body,
        })
    }

    /// Validate the status against the call's expectation and decode the
    /// body. An empty body (204 and friends) yields `Value::Null`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Request` on a status mismatch and
    /// `ApiError::Deserialization` when the body is not JSON.
    pub fn parse_response(
        &self,
        call: &ApiCall,
        url: &str,
        response: HttpResponse,
    ) -> Result<Value, ApiError> {
        check_status(call, url, &response)?;
        if response.status == 204 || response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    /// Run one call and return its decoded body.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decoding failures.
    pub fn call(&self, call: &ApiCall, scope: Option<&str>) -> Result<Value, ApiError> {
        let request = self.build_request(call, scope)?;
        if self.config.log_bodies {
            debug!(method = %request.method, url = %request.url, body = ?request.body, "request");
        }
        let response = self.transport.execute(&request)?;
        debug!(
            method = %request.method,
            url = %request.url,
            status = response.status,
            "response"
        );
        if self.config.log_bodies {
            debug!(body = %response.body, "response body");
        }
        self.parse_response(call, &request.url, response)
    }

    /// Run one call and deserialize its body into `R`.
    ///
    /// # Errors
    ///
    /// As `call`, plus `ApiError::Deserialization` if the shape does not match.
    pub fn call_as<R: DeserializeOwned>(&self, call: &ApiCall, scope: Option<&str>) -> Result<R, ApiError> {
        let value = self.call(call, scope)?;
        serde_json::from_value(value).map_err(|e| ApiError::Deserialization(e.to_string()))
    }
}

/// Map any status other than the expected one to `ApiError::Request`.
fn check_status(call: &ApiCall, url: &str, response: &HttpResponse) -> Result<(), ApiError> {
    let expected = call.expected_status();
    if response.status == expected {
        return Ok(());
    }
    Err(ApiError::Request {
        method: call.method.as_str(),
        url: url.to_string(),
        status: response.status,
        expected,
        body: response.body.clone(),
    })
}
