//! Per-request enforcement of declared parameters.
//!
//! [`RequestGuard::check`] is transport-agnostic and works on any
//! [`ParameterSource`]; [`guard_middleware`] adapts it to axum.

use crate::{
    operation::{HttpMethod, OperationDefinition, ParameterLocation, ParameterSpec},
    registry::RegisteredOperation,
    validation,
};
use axum::{
    body::Body,
    extract::{rejection::RawPathParamsRejection, FromRequestParts, RawPathParams, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Largest request body buffered for JSON checks
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Read access to the raw parameter values of a request
pub trait ParameterSource {
    /// Raw value of `name` at `location`, `None` when absent
    fn value(&self, location: ParameterLocation, name: &str) -> Option<&str>;
}

/// Parameter values captured from a request
#[derive(Debug, Clone, Default)]
pub struct RequestValues {
    path: HashMap<String, String>,
    query: HashMap<String, String>,
    headers: HeaderMap,
    cookies: HashMap<String, String>,
}

impl RequestValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture path, query, header and cookie values from request parts.
    ///
    /// Parts that never went through a router have no path parameters. A path
    /// parameter that does not decode to UTF-8 rejects the request.
    pub async fn from_parts(parts: &mut Parts) -> Result<Self, GuardRejection> {
        let path = match RawPathParams::from_request_parts(parts, &()).await {
            Ok(params) => params
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            Err(RawPathParamsRejection::InvalidUtf8InPathParam(error)) => {
                return Err(GuardRejection::bad_request(format!(
                    "invalid path parameter: {}",
                    error.body_text()
                )));
            }
            Err(_) => HashMap::new(),
        };

        let mut values = Self {
            path,
            headers: parts.headers.clone(),
            ..Self::default()
        };
        if let Some(query) = parts.uri.query() {
            values.add_query_string(query);
        }
        values.cookies = parse_cookies(&parts.headers);
        Ok(values)
    }

    pub fn with_path(mut self, name: &str, value: &str) -> Self {
        self.path.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query
            .entry(name.to_string())
            .or_insert_with(|| value.to_string());
        self
    }

    /// Invalid header names or values are ignored
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            header::HeaderName::try_from(name),
            header::HeaderValue::try_from(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies
            .entry(name.to_string())
            .or_insert_with(|| value.to_string());
        self
    }

    /// Decode a URL query string; the first occurrence of a key wins
    fn add_query_string(&mut self, query: &str) {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).unwrap_or_default();
        for (name, value) in pairs {
            self.query.entry(name).or_insert(value);
        }
    }
}

impl ParameterSource for RequestValues {
    fn value(&self, location: ParameterLocation, name: &str) -> Option<&str> {
        match location {
            ParameterLocation::Path => self.path.get(name).map(String::as_str),
            ParameterLocation::Query => self.query.get(name).map(String::as_str),
            ParameterLocation::Header => self.headers.get(name).and_then(|v| v.to_str().ok()),
            ParameterLocation::Cookie => self.cookies.get(name).map(String::as_str),
        }
    }
}

fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                let value = value.trim();
                let value = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value);
                cookies
                    .entry(name.trim().to_string())
                    .or_insert_with(|| value.to_string());
            }
        }
    }
    cookies
}

/// A request refused before reaching its handler
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GuardRejection {
    pub status: StatusCode,
    pub message: String,
}

impl GuardRejection {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNSUPPORTED_MEDIA_TYPE,
            message: message.into(),
        }
    }

    fn missing(param: &ParameterSpec) -> Self {
        let message = match param.location {
            ParameterLocation::Header => format!("missing required header: {}", param.name),
            ParameterLocation::Cookie => format!("missing required cookie: {}", param.name),
            location => format!("missing required {} parameter: {}", location, param.name),
        };
        Self::bad_request(message)
    }

    fn invalid(param: &ParameterSpec, reason: &str) -> Self {
        let message = match param.location {
            ParameterLocation::Header => format!("invalid header {}: {}", param.name, reason),
            ParameterLocation::Cookie => format!("invalid cookie {}: {}", param.name, reason),
            location => format!("invalid {} parameter {}: {}", location, param.name, reason),
        };
        Self::bad_request(message)
    }
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Validates requests against one registered operation
#[derive(Debug, Clone)]
pub struct RequestGuard {
    method: HttpMethod,
    definition: Arc<OperationDefinition>,
}

impl RequestGuard {
    pub fn new(operation: &RegisteredOperation) -> Self {
        Self {
            method: operation.method,
            definition: Arc::clone(&operation.definition),
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.definition.path
    }

    /// Check every declared parameter, path then query, header, cookie.
    ///
    /// A cookie that is present with an empty value counts as supplied.
    pub fn check<S: ParameterSource + ?Sized>(&self, source: &S) -> Result<(), GuardRejection> {
        for location in ParameterLocation::ALL {
            for param in self.definition.params_in(location) {
                let raw = source.value(location, &param.name);
                let supplied = match location {
                    ParameterLocation::Cookie => raw,
                    _ => raw.filter(|value| !value.is_empty()),
                };

                match supplied {
                    None if param.required => return Err(GuardRejection::missing(param)),
                    None | Some("") => continue,
                    Some(value) => validation::validate(param, Some(value))
                        .map_err(|error| GuardRejection::invalid(param, &error.message))?,
                }
            }
        }
        Ok(())
    }

    /// Whether the request body must be JSON
    pub fn expects_json_body(&self) -> bool {
        self.definition.request.is_some() && self.method.has_body()
    }

    /// A missing content type is accepted
    pub fn check_content_type(&self, content_type: Option<&str>) -> Result<(), GuardRejection> {
        match content_type {
            Some(value) if !value.is_empty() && !value.starts_with("application/json") => Err(
                GuardRejection::unsupported_media_type("Content-Type must be application/json"),
            ),
            _ => Ok(()),
        }
    }

    pub fn check_body(&self, body: &[u8]) -> Result<(), GuardRejection> {
        serde_json::from_slice::<serde::de::IgnoredAny>(body)
            .map(|_| ())
            .map_err(|error| GuardRejection::bad_request(format!("invalid request body: {}", error)))
    }
}

/// Middleware enforcing a [`RequestGuard`] before the route handler runs.
///
/// Mount with `axum::middleware::from_fn_with_state(Arc<RequestGuard>, guard_middleware)`.
pub async fn guard_middleware(
    State(guard): State<Arc<RequestGuard>>,
    request: Request,
    next: Next,
) -> Response {
    match enforce(&guard, request).await {
        Ok(request) => next.run(request).await,
        Err(rejection) => {
            warn!(
                method = %guard.method(),
                path = %guard.path(),
                status = rejection.status.as_u16(),
                reason = %rejection.message,
                "request rejected"
            );
            rejection.into_response()
        }
    }
}

async fn enforce(guard: &RequestGuard, request: Request) -> Result<Request, GuardRejection> {
    let (mut parts, body) = request.into_parts();
    let values = RequestValues::from_parts(&mut parts).await?;
    guard.check(&values)?;

    if !guard.expects_json_body() {
        return Ok(Request::from_parts(parts, body));
    }

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    guard.check_content_type(content_type)?;

    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|error| GuardRejection::bad_request(format!("invalid request body: {}", error)))?;
    guard.check_body(&bytes)?;

    Ok(Request::from_parts(parts, Body::from(bytes)))
}
