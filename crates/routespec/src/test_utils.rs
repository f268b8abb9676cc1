use crate::{config::DocsConfig, operation::OperationDefinition, ApiSchema};
use axum::extract::Request;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account resource returned by the fixtures
#[derive(Debug, Clone, Serialize, Deserialize, ApiSchema)]
pub struct Account {
    pub id: u64,
    /// Display name
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub active: bool,
}

/// Request body for account creation
#[derive(Debug, Clone, Serialize, Deserialize, ApiSchema)]
pub struct CreateAccount {
    #[schema(validate = "required,min=3", example = "ada")]
    pub name: String,
    #[schema(omit_empty, format = "email")]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ApiSchema)]
pub struct Entry {
    pub amount: f64,
    pub memo: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ApiSchema)]
pub struct Ledger {
    pub owner: Account,
    pub opened_at: DateTime<Utc>,
    pub entries: Vec<Entry>,
}

/// Handler answering `200 ok`
pub async fn ok_handler(_request: Request) -> &'static str {
    "ok"
}

/// Definition with a handler bound, ready to register
pub fn definition(method: &str, path: &str) -> OperationDefinition {
    OperationDefinition::new(method, path, format!("{} {}", method, path)).with_handler(ok_handler)
}

/// Minimal valid configuration with a bearer scheme
pub fn test_config() -> DocsConfig {
    DocsConfig::new("Test API", "1.0.0")
        .with_base_path("/api")
        .add_bearer_auth("bearerAuth", "JWT bearer token", "JWT")
}
