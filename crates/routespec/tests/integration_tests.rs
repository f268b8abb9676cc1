//! End-to-end tests for routespec
//!
//! These tests mount registered operations on an axum router and drive
//! requests through the guard, the handlers and the document endpoint.

use axum::body::{to_bytes, Body};
use axum::extract::Path;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use routespec::{
    ApiRouter, ApiSchema, DocsConfig, HttpMethod, OperationDefinition, ParameterSpec,
    RegistrationError, RouteSpecError, ValidationRule,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower::util::ServiceExt;

#[derive(Serialize, Deserialize, ApiSchema)]
struct User {
    id: u64,
    name: String,
    email: Option<String>,
}

#[derive(Serialize, Deserialize, ApiSchema)]
struct CreateUser {
    #[schema(validate = "required", example = "Ada")]
    name: String,
}

async fn echo_query(request: Request<Body>) -> String {
    request.uri().query().unwrap_or_default().to_string()
}

async fn created(_request: Request<Body>) -> (StatusCode, &'static str) {
    (StatusCode::CREATED, "created")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("routespec=debug")
        .with_test_writer()
        .try_init();
}

fn users_api() -> ApiRouter {
    let mut api = ApiRouter::new(DocsConfig::new("Users API", "1.0.0").with_base_path("/api"));
    api.register(
        OperationDefinition::new("GET", "/users", "List users")
            .with_tags(["Users"])
            .with_response::<User>()
            .with_param(
                ParameterSpec::query("limit")
                    .required(true)
                    .with_type::<u32>()
                    .with_rule(ValidationRule::max(100.0, "limit must be at most 100")),
            )
            .with_handler(echo_query),
    )
    .unwrap();
    api.register(
        OperationDefinition::new("POST", "/users", "Create user")
            .with_tags(["Users"])
            .with_request::<CreateUser>()
            .with_response::<User>()
            .with_handler(created),
    )
    .unwrap();
    api.register(
        OperationDefinition::new("GET", "/users/{id}", "Get user")
            .with_tags(["Users"])
            .with_param(
                ParameterSpec::path("id")
                    .with_rule(ValidationRule::pattern("^[0-9]+$", "id must be numeric")),
            )
            .with_native_handler(|Path(id): Path<u64>| async move { format!("user {}", id) }),
    )
    .unwrap();
    api
}

fn app(api: &ApiRouter) -> Router {
    api.router().merge(api.docs_router("/swagger.json"))
}

async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, content_type: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

#[tokio::test]
async fn test_missing_required_query_is_rejected() {
    init_tracing();
    let api = users_api();

    let response = send(app(&api), get("/api/users")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "missing required query parameter: limit" })
    );
}

#[tokio::test]
async fn test_valid_request_reaches_handler() {
    let api = users_api();

    let response = send(app(&api), get("/api/users?limit=10")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "limit=10");
}

#[tokio::test]
async fn test_rule_failure_is_rejected() {
    let api = users_api();

    let response = send(app(&api), get("/api/users?limit=500")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "invalid query parameter limit: limit must be at most 100" })
    );
}

#[tokio::test]
async fn test_native_handler_with_path_parameter() {
    let api = users_api();

    let response = send(app(&api), get("/api/users/42")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "user 42");

    let response = send(app(&api), get("/api/users/abc")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "invalid path parameter id: id must be numeric" })
    );
}

#[tokio::test]
async fn test_undecodable_path_parameter_is_rejected() {
    let api = users_api();

    let response = send(app(&api), get("/api/users/%FF")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "invalid path parameter: Invalid UTF-8 in `id`" })
    );
}

#[test]
fn test_renamed_placeholder_is_refused_before_mounting() {
    let mut api = users_api();
    let error = api
        .register(
            OperationDefinition::new("DELETE", "/users/{user_id}", "Delete user")
                .with_handler(created),
        )
        .unwrap_err();
    assert!(matches!(error, RegistrationError::ConflictingRoute { .. }));

    api.register(
        OperationDefinition::new("DELETE", "/users/{id}", "Delete user").with_handler(created),
    )
    .unwrap();
    let _ = app(&api);
    assert_eq!(api.registry().len(), 4);
}

#[tokio::test]
async fn test_json_body_checks() {
    let api = users_api();

    let response = send(app(&api), post("/api/users", "text/plain", "name=ada")).await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Content-Type must be application/json" })
    );

    let response = send(app(&api), post("/api/users", "application/json", "{not json")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await["error"].as_str().unwrap().to_string();
    assert!(error.starts_with("invalid request body: "), "{}", error);

    let response = send(app(&api), post("/api/users", "application/json", r#"{"name":"Ada"}"#)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_text(response).await, "created");
}

#[test]
fn test_document_describes_operations() {
    let api = users_api();
    api.generate().unwrap();
    let doc = api.document().unwrap();

    assert_eq!(doc.openapi, "3.0.0");
    assert_eq!(doc.servers[0].url, "/api");

    let list = doc.operation(HttpMethod::Get, "/users").unwrap();
    assert_eq!(list.operation_id.as_deref(), Some("users_users"));
    assert_eq!(list.parameters.len(), 1);
    assert!(list.parameters[0].required);
    assert_eq!(list.response(200).unwrap().description, "Success");

    let create = doc.operation(HttpMethod::Post, "/users").unwrap();
    let schema = create.request_schema().unwrap();
    assert_eq!(schema.required, vec!["name"]);

    let fetch = doc.operation(HttpMethod::Get, "/users/{id}").unwrap();
    assert_eq!(fetch.operation_id.as_deref(), Some("users_users"));
    assert!(fetch.parameters[0].required);
}

#[tokio::test]
async fn test_spec_endpoint_serves_snapshot() {
    let api = users_api();

    let response = send(app(&api), get("/swagger.json")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["error"],
        json!("Swagger documentation not available")
    );

    let snapshot = api.generate().unwrap();
    let response = send(app(&api), get("/swagger.json")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json; charset=utf-8"
    );
    assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=3600");
    let etag = response.headers()[header::ETAG].to_str().unwrap().to_string();
    assert_eq!(etag, snapshot.etag());
    let served = body_json(response).await;
    assert_eq!(served["info"]["title"], json!("Users API"));

    let conditional = Request::builder()
        .uri("/swagger.json")
        .header(header::IF_NONE_MATCH, etag.as_str())
        .body(Body::empty())
        .unwrap();
    let response = send(app(&api), conditional).await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(body_text(response).await, "");
}

#[test]
fn test_generation_is_deterministic() {
    let first = users_api();
    let second = users_api();

    let a = first.generate().unwrap();
    let b = second.generate().unwrap();
    assert_eq!(a.bytes(), b.bytes());
    assert_eq!(a.etag(), b.etag());
    assert_eq!(first.document_bytes().unwrap(), second.document_bytes().unwrap());
}

#[test]
fn test_group_registration_keeps_earlier_members() {
    let mut api = ApiRouter::new(DocsConfig::new("Users API", "1.0.0"));
    let error = api
        .register_group(
            "Users",
            vec![
                OperationDefinition::new("GET", "/users", "List users").with_handler(echo_query),
                OperationDefinition::new("GET", "/broken", "No handler"),
                OperationDefinition::new("GET", "/never", "Never reached").with_handler(echo_query),
            ],
        )
        .unwrap_err();

    assert_eq!(
        error.to_string(),
        "failed to register API 1: handler cannot be nil for path: /broken"
    );
    match error {
        RegistrationError::Group { index, source } => {
            assert_eq!(index, 1);
            assert!(matches!(*source, RegistrationError::MissingHandler { .. }));
        }
        other => panic!("expected group failure, got {:?}", other),
    }
    assert_eq!(api.registry().len(), 1);
    assert!(api.registry().find(HttpMethod::Get, "/never").is_none());
}

#[test]
fn test_document_before_generation() {
    let api = users_api();
    assert!(matches!(api.document(), Err(RouteSpecError::NotGenerated)));
}
