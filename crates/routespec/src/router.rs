use crate::{
    assembler::assemble,
    config::DocsConfig,
    endpoint::{serve_spec, SnapshotSlot, SpecEndpoint, SpecSnapshot},
    error::{RegistrationError, RouteSpecError, RouteSpecResult},
    guard::{guard_middleware, RequestGuard},
    operation::OperationDefinition,
    registry::OperationRegistry,
    specification::{OAuth2Flows, SecurityRequirement, SpecificationDocument},
};
use axum::{
    body::Bytes,
    middleware,
    routing::{get, MethodRouter},
    Router,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Registers documented operations, publishes their specification and
/// mounts them, guarded, on an axum [`Router`].
///
/// ```rust,no_run
/// use routespec::{ApiRouter, DocsConfig, OperationDefinition, ParameterSpec};
///
/// # fn main() -> Result<(), routespec::RouteSpecError> {
/// let mut api = ApiRouter::new(DocsConfig::new("Users API", "1.0.0"));
/// api.register(
///     OperationDefinition::new("GET", "/users", "List users")
///         .with_param(ParameterSpec::query("limit").required(true))
///         .with_handler(|_req: axum::extract::Request| async { "[]" }),
/// )?;
/// api.generate()?;
///
/// let app = api.router().merge(api.docs_router("/swagger.json"));
/// # let _ = app;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ApiRouter {
    config: DocsConfig,
    registry: OperationRegistry,
    snapshot: SnapshotSlot,
}

impl ApiRouter {
    pub fn new(config: DocsConfig) -> Self {
        Self {
            config,
            registry: OperationRegistry::new(),
            snapshot: SnapshotSlot::default(),
        }
    }

    pub fn config(&self) -> &DocsConfig {
        &self.config
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Set title, version and description
    pub fn set_info(&mut self, title: &str, version: &str, description: &str) {
        self.config.info.title = title.to_string();
        self.config.info.version = version.to_string();
        self.config.info.description = description.to_string();
    }

    pub fn set_base_path(&mut self, base_path: &str) {
        self.config.base_path = base_path.to_string();
    }

    pub fn add_basic_auth(&mut self, name: &str, description: &str) {
        self.update_config(|config| config.add_basic_auth(name, description));
    }

    pub fn add_bearer_auth(&mut self, name: &str, description: &str, format: &str) {
        self.update_config(|config| config.add_bearer_auth(name, description, format));
    }

    pub fn add_api_key(&mut self, name: &str, description: &str, location: &str) {
        self.update_config(|config| config.add_api_key(name, description, location));
    }

    pub fn add_oauth2(&mut self, name: &str, description: &str, flows: OAuth2Flows) {
        self.update_config(|config| config.add_oauth2(name, description, flows));
    }

    pub fn add_openid_connect(&mut self, name: &str, description: &str, url: &str) {
        self.update_config(|config| config.add_openid_connect(name, description, url));
    }

    pub fn set_global_security(&mut self, requirements: Vec<SecurityRequirement>) {
        self.config.security = requirements;
    }

    fn update_config(&mut self, update: impl FnOnce(DocsConfig) -> DocsConfig) {
        self.config = update(std::mem::take(&mut self.config));
    }

    pub fn register<D>(&mut self, definition: D) -> Result<(), RegistrationError>
    where
        D: Into<Option<OperationDefinition>>,
    {
        self.registry.register(definition).map(|_| ())
    }

    pub fn register_group<I>(&mut self, tag: &str, definitions: I) -> Result<(), RegistrationError>
    where
        I: IntoIterator<Item = OperationDefinition>,
    {
        self.registry.register_group(tag, definitions)
    }

    /// Registered definitions in registration order
    pub fn definitions(&self) -> impl Iterator<Item = &OperationDefinition> {
        self.registry
            .operations()
            .iter()
            .map(|op| op.definition.as_ref())
    }

    /// Assemble a document without publishing it
    pub fn build_document(&self) -> RouteSpecResult<SpecificationDocument> {
        Ok(assemble(&self.registry, &self.config)?)
    }

    /// Assemble, serialize and publish the document.
    ///
    /// On failure the previously published snapshot, if any, stays in place.
    pub fn generate(&self) -> RouteSpecResult<Arc<SpecSnapshot>> {
        let snapshot = assemble(&self.registry, &self.config)
            .and_then(SpecSnapshot::new)
            .map_err(|error| {
                warn!(error = %error, "failed to generate API specification");
                error
            })?;

        let snapshot = Arc::new(snapshot);
        self.snapshot.store(Some(Arc::clone(&snapshot)));
        info!(
            operations = self.registry.len(),
            bytes = snapshot.bytes().len(),
            etag = %snapshot.etag(),
            "published API specification"
        );
        Ok(snapshot)
    }

    pub fn is_generated(&self) -> bool {
        self.snapshot.load().is_some()
    }

    /// Drop the published snapshot
    pub fn invalidate(&self) {
        self.snapshot.store(None);
    }

    pub fn snapshot(&self) -> Option<Arc<SpecSnapshot>> {
        self.snapshot.load_full()
    }

    /// The published document
    pub fn document(&self) -> RouteSpecResult<SpecificationDocument> {
        self.snapshot()
            .map(|snapshot| snapshot.document().clone())
            .ok_or(RouteSpecError::NotGenerated)
    }

    /// The published document as pretty JSON
    pub fn document_bytes(&self) -> RouteSpecResult<Bytes> {
        self.snapshot()
            .map(|snapshot| snapshot.bytes().clone())
            .ok_or(RouteSpecError::NotGenerated)
    }

    /// Handler state tracking this router's published snapshot
    pub fn spec_endpoint(&self) -> SpecEndpoint {
        SpecEndpoint::new(Arc::clone(&self.snapshot))
    }

    /// Router serving the document at `path`
    pub fn docs_router(&self, path: &str) -> Router {
        Router::new()
            .route(path, get(serve_spec))
            .with_state(self.spec_endpoint())
    }

    /// Every registered operation mounted under the base path, each behind
    /// its request guard
    pub fn router(&self) -> Router {
        let mut routes: BTreeMap<String, MethodRouter> = BTreeMap::new();

        for operation in self.registry.operations() {
            let Some(handler) = operation.definition.handler.as_ref() else {
                continue;
            };
            let guard = Arc::new(RequestGuard::new(operation));
            let method_router = handler
                .method_router(operation.method.filter())
                .route_layer(middleware::from_fn_with_state(guard, guard_middleware));

            let path = route_path(&self.config.base_path, operation.path());
            let merged = match routes.remove(&path) {
                Some(existing) => existing.merge(method_router),
                None => method_router,
            };
            routes.insert(path, merged);
        }

        routes
            .into_iter()
            .fold(Router::new(), |router, (path, method_router)| {
                router.route(&path, method_router)
            })
    }
}

/// Join the base path and a `{name}` template into an axum `:name` route
fn route_path(base_path: &str, template: &str) -> String {
    let mut path = String::with_capacity(base_path.len() + template.len());
    path.push_str(base_path.trim_end_matches('/'));
    if !template.starts_with('/') {
        path.push('/');
    }

    let mut rest = template;
    while let Some(open) = rest.find('{') {
        match rest[open..].find('}') {
            Some(close) => {
                path.push_str(&rest[..open]);
                path.push(':');
                path.push_str(&rest[open + 1..open + close]);
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    path.push_str(rest);
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{definition, test_config};

    #[test]
    fn test_route_path() {
        assert_eq!(route_path("", "/users/{id}"), "/users/:id");
        assert_eq!(route_path("/api", "/users"), "/api/users");
        assert_eq!(route_path("/api/", "/users/{id}/posts/{post_id}"), "/api/users/:id/posts/:post_id");
        assert_eq!(route_path("/api", "health"), "/api/health");
    }

    #[test]
    fn test_generate_publishes_snapshot() {
        let mut api = ApiRouter::new(test_config());
        api.register(definition("GET", "/users")).unwrap();

        assert!(!api.is_generated());
        assert!(matches!(api.document(), Err(RouteSpecError::NotGenerated)));
        assert!(matches!(api.document_bytes(), Err(RouteSpecError::NotGenerated)));

        let snapshot = api.generate().unwrap();
        assert!(api.is_generated());
        assert_eq!(api.document_bytes().unwrap(), snapshot.bytes().clone());
        assert_eq!(api.document().unwrap().paths.len(), 1);

        api.invalidate();
        assert!(!api.is_generated());
    }

    #[test]
    fn test_failed_generation_keeps_previous_snapshot() {
        let mut api = ApiRouter::new(test_config());
        api.register(definition("GET", "/users")).unwrap();
        let first = api.generate().unwrap();

        api.set_info("", "1.0.0", "");
        assert!(matches!(api.generate(), Err(RouteSpecError::Assembly(_))));
        assert_eq!(api.snapshot().unwrap().etag(), first.etag());
    }

    #[test]
    fn test_generate_without_operations_fails() {
        let api = ApiRouter::new(test_config());
        let error = api.generate().unwrap_err();
        assert_eq!(error.to_string(), "no API paths defined");
        assert!(!api.is_generated());
    }

    #[test]
    fn test_security_helpers_update_config() {
        let mut api = ApiRouter::new(DocsConfig::new("API", "1.0"));
        api.add_basic_auth("basicAuth", "Basic credentials");
        api.add_api_key("X-API-Key", "", "header");
        api.add_oauth2("oauth", "", OAuth2Flows::default());
        api.set_global_security(vec![[("basicAuth".to_string(), Vec::new())].into()]);

        assert_eq!(api.config().security_schemes.len(), 3);
        assert_eq!(api.config().security.len(), 1);
        assert_eq!(api.config().info.title, "API");
    }

    #[test]
    fn test_definitions_expose_registered_operations() {
        let mut api = ApiRouter::new(test_config());
        api.register_group("Users", vec![definition("GET", "/users"), definition("POST", "/users")])
            .unwrap();
        let tags: Vec<_> = api.definitions().map(|d| d.tags[0].as_str()).collect();
        assert_eq!(tags, vec!["Users", "Users"]);
    }
}
