//! Operation definitions and their parameters.
//!
//! An [`OperationDefinition`] is assembled with a consuming builder and handed
//! to the registry, which freezes it behind an `Arc`.

use crate::{
    descriptor::ApiSchema,
    error::{RegistrationError, ValidationError},
    schema::{SchemaNode, TypeHandle},
    specification::{Example, ExternalDocumentation, SecurityRequirement, Server},
    validation::{self, ValidationRule},
};
use axum::{
    extract::Request,
    handler::Handler as AxumHandler,
    response::{IntoResponse, Response},
    routing::{MethodFilter, MethodRouter},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

/// Boxed future returned by generic handlers
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// HTTP methods an operation can be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }

    /// Routing filter matching this method
    pub fn filter(&self) -> MethodFilter {
        match self {
            Self::Get => MethodFilter::GET,
            Self::Post => MethodFilter::POST,
            Self::Put => MethodFilter::PUT,
            Self::Delete => MethodFilter::DELETE,
            Self::Patch => MethodFilter::PATCH,
        }
    }

    /// Whether requests with this method carry a JSON body
    pub fn has_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            _ => Err(RegistrationError::UnsupportedMethod(s.to_string())),
        }
    }
}

/// Where a parameter lives in the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    /// Locations in the order the guard checks them
    pub const ALL: [ParameterLocation; 4] = [
        ParameterLocation::Path,
        ParameterLocation::Query,
        ParameterLocation::Header,
        ParameterLocation::Cookie,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared request parameter.
///
/// Serializes as an OpenAPI parameter object; validation rules and the
/// value type handle stay out of the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,

    #[serde(rename = "in")]
    pub location: ParameterLocation,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub required: bool,

    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub deprecated: bool,

    #[serde(rename = "allowEmptyValue", skip_serializing_if = "std::ops::Not::not", default)]
    pub allow_empty_value: bool,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub style: Option<String>,

    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub explode: bool,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schema: Option<SchemaNode>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub example: Option<serde_json::Value>,

    /// Ordered rules evaluated against the raw request value
    #[serde(skip)]
    pub rules: Vec<ValidationRule>,

    /// Type whose schema fills in `schema` at assembly time
    #[serde(skip)]
    pub value_type: Option<TypeHandle>,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, location: ParameterLocation) -> Self {
        Self {
            name: name.into(),
            location,
            description: String::new(),
            required: false,
            deprecated: false,
            allow_empty_value: false,
            style: None,
            explode: false,
            schema: None,
            example: None,
            rules: Vec::new(),
            value_type: None,
        }
    }

    /// Path parameters are always required
    pub fn path(name: impl Into<String>) -> Self {
        Self::new(name, ParameterLocation::Path).required(true)
    }

    pub fn query(name: impl Into<String>) -> Self {
        Self::new(name, ParameterLocation::Query)
    }

    pub fn header(name: impl Into<String>) -> Self {
        Self::new(name, ParameterLocation::Header)
    }

    pub fn cookie(name: impl Into<String>) -> Self {
        Self::new(name, ParameterLocation::Cookie)
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    pub fn allow_empty_value(mut self) -> Self {
        self.allow_empty_value = true;
        self
    }

    pub fn with_style(mut self, style: impl Into<String>, explode: bool) -> Self {
        self.style = Some(style.into());
        self.explode = explode;
        self
    }

    pub fn with_schema(mut self, schema: SchemaNode) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Derive the parameter schema from a Rust type when the document is assembled
    pub fn with_type<T: ApiSchema + ?Sized>(mut self) -> Self {
        self.value_type = Some(TypeHandle::of::<T>());
        self
    }

    pub fn with_example(mut self, example: impl Into<serde_json::Value>) -> Self {
        self.example = Some(example.into());
        self
    }

    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_rules(mut self, rules: impl IntoIterator<Item = ValidationRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Check a raw request value against this parameter's rules
    pub fn validate(&self, raw: Option<&str>) -> Result<(), ValidationError> {
        validation::validate(self, raw)
    }
}

type GenericFn = dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync;
type NativeFn = dyn Fn(MethodFilter) -> MethodRouter + Send + Sync;

/// Callback bound to an operation
#[derive(Clone)]
pub enum Handler {
    /// Framework-agnostic request to response function
    Generic(Arc<GenericFn>),
    /// Any axum handler, mounted as-is
    Native(Arc<NativeFn>),
}

impl Handler {
    pub fn generic<F, Fut>(handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoResponse,
    {
        Self::Generic(Arc::new(move |request: Request| -> BoxFuture<'static, Response> {
            let future = handler(request);
            Box::pin(async move { future.await.into_response() })
        }))
    }

    pub fn native<H, T>(handler: H) -> Self
    where
        H: AxumHandler<T, ()> + Sync,
        T: 'static,
    {
        Self::Native(Arc::new(move |filter: MethodFilter| {
            axum::routing::on(filter, handler.clone())
        }))
    }

    /// Method router dispatching `filter` requests to this handler
    pub fn method_router(&self, filter: MethodFilter) -> MethodRouter {
        match self {
            Self::Generic(handler) => {
                let handler = Arc::clone(handler);
                axum::routing::on(filter, move |request: Request| {
                    let handler = Arc::clone(&handler);
                    async move { handler(request).await }
                })
            }
            Self::Native(mount) => mount(filter),
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic(_) => f.write_str("Handler::Generic"),
            Self::Native(_) => f.write_str("Handler::Native"),
        }
    }
}

/// Everything known about one route
#[derive(Debug, Clone)]
pub struct OperationDefinition {
    /// HTTP method as given; normalized at registration
    pub method: String,
    /// Path template with `{name}` placeholders
    pub path: String,
    pub operation_id: Option<String>,
    pub summary: String,
    pub description: String,
    pub tags: Vec<String>,
    pub request: Option<TypeHandle>,
    pub response: Option<TypeHandle>,
    pub params: Vec<ParameterSpec>,
    pub handler: Option<Handler>,
    pub deprecated: bool,
    pub security: Vec<SecurityRequirement>,
    pub external_docs: Option<ExternalDocumentation>,
    pub examples: BTreeMap<String, Example>,
    pub servers: Vec<Server>,
}

impl OperationDefinition {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            operation_id: None,
            summary: summary.into(),
            description: String::new(),
            tags: Vec::new(),
            request: None,
            response: None,
            params: Vec::new(),
            handler: None,
            deprecated: false,
            security: Vec::new(),
            external_docs: None,
            examples: BTreeMap::new(),
            servers: Vec::new(),
        }
    }

    pub fn with_operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// JSON request body type
    pub fn with_request<T: ApiSchema + ?Sized>(mut self) -> Self {
        self.request = Some(TypeHandle::of::<T>());
        self
    }

    /// JSON `200` response body type
    pub fn with_response<T: ApiSchema + ?Sized>(mut self) -> Self {
        self.response = Some(TypeHandle::of::<T>());
        self
    }

    pub fn with_param(mut self, param: ParameterSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_params(mut self, params: impl IntoIterator<Item = ParameterSpec>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn with_path_param(self, name: &str, description: &str) -> Self {
        self.with_param(ParameterSpec::path(name).with_description(description))
    }

    pub fn with_query_param(self, name: &str, description: &str, required: bool) -> Self {
        self.with_param(
            ParameterSpec::query(name)
                .with_description(description)
                .required(required),
        )
    }

    pub fn with_header_param(self, name: &str, description: &str, required: bool) -> Self {
        self.with_param(
            ParameterSpec::header(name)
                .with_description(description)
                .required(required),
        )
    }

    pub fn with_cookie_param(self, name: &str, description: &str, required: bool) -> Self {
        self.with_param(
            ParameterSpec::cookie(name)
                .with_description(description)
                .required(required),
        )
    }

    /// Bind a framework-agnostic handler
    pub fn with_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoResponse,
    {
        self.handler = Some(Handler::generic(handler));
        self
    }

    /// Bind an axum handler with its own extractors
    pub fn with_native_handler<H, T>(mut self, handler: H) -> Self
    where
        H: AxumHandler<T, ()> + Sync,
        T: 'static,
    {
        self.handler = Some(Handler::native(handler));
        self
    }

    pub fn with_deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    /// Require a security scheme with the given scopes
    pub fn with_security<I, S>(mut self, scheme: &str, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut requirement = SecurityRequirement::new();
        requirement.insert(
            scheme.to_string(),
            scopes.into_iter().map(Into::into).collect(),
        );
        self.security.push(requirement);
        self
    }

    pub fn with_external_docs(mut self, url: &str, description: Option<&str>) -> Self {
        self.external_docs = Some(ExternalDocumentation {
            url: url.to_string(),
            description: description.map(str::to_string),
        });
        self
    }

    pub fn with_example(mut self, name: impl Into<String>, example: Example) -> Self {
        self.examples.insert(name.into(), example);
        self
    }

    pub fn with_server(mut self, url: &str, description: &str) -> Self {
        self.servers.push(Server::new(url, description));
        self
    }

    /// Declared parameters at one location, in declaration order
    pub fn params_in(&self, location: ParameterLocation) -> impl Iterator<Item = &ParameterSpec> {
        self.params.iter().filter(move |p| p.location == location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_parsing_is_case_insensitive() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("Patch".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);

        let error = "OPTIONS".parse::<HttpMethod>().unwrap_err();
        assert!(matches!(error, RegistrationError::UnsupportedMethod(ref m) if m == "OPTIONS"));
    }

    #[test]
    fn test_parameter_serialization() {
        let param = ParameterSpec::query("limit")
            .required(true)
            .with_description("Page size")
            .with_rule(ValidationRule::max(100.0, "limit too large"));

        assert_eq!(
            serde_json::to_value(&param).unwrap(),
            json!({
                "name": "limit",
                "in": "query",
                "description": "Page size",
                "required": true
            })
        );
    }

    #[test]
    fn test_optional_parameter_serializes_required_false() {
        let value = serde_json::to_value(ParameterSpec::header("X-Trace")).unwrap();
        assert_eq!(value["required"], json!(false));
        assert_eq!(value["in"], json!("header"));
    }

    #[test]
    fn test_path_params_are_required() {
        assert!(ParameterSpec::path("id").required);
        assert!(!ParameterSpec::cookie("session").required);
    }

    #[test]
    fn test_builder_collects_metadata() {
        let definition = OperationDefinition::new("get", "/users/{id}", "Get user")
            .with_description("Fetch a single user")
            .with_tags(["Users"])
            .with_path_param("id", "User ID")
            .with_query_param("expand", "Related resources", false)
            .with_header_param("X-Request-Id", "Correlation id", false)
            .with_security("bearerAuth", Vec::<String>::new())
            .with_external_docs("https://docs.example.com/users", Some("User docs"))
            .with_server("https://eu.example.com", "EU region")
            .with_deprecated(true)
            .with_handler(|_request: Request| async { "ok" });

        assert_eq!(definition.tags, vec!["Users"]);
        assert_eq!(definition.params.len(), 3);
        assert_eq!(definition.params_in(ParameterLocation::Path).count(), 1);
        assert_eq!(definition.security[0].get("bearerAuth"), Some(&Vec::new()));
        assert!(definition.deprecated);
        assert!(matches!(definition.handler, Some(Handler::Generic(_))));
        assert_eq!(definition.servers[0].description, "EU region");
    }

    #[test]
    fn test_native_handler_slot() {
        async fn list() -> &'static str {
            "[]"
        }

        let definition = OperationDefinition::new("GET", "/items", "List").with_native_handler(list);
        assert!(matches!(definition.handler, Some(Handler::Native(_))));
    }

    #[test]
    fn test_parameter_validate_delegates_to_rules() {
        let param = ParameterSpec::query("age")
            .required(true)
            .with_rule(ValidationRule::min(18.0, "too young"));
        assert!(param.validate(Some("20")).is_ok());
        assert!(param.validate(Some("15")).is_err());
        assert!(param.validate(None).unwrap_err().is_missing());
    }
}
