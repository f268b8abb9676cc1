/*!
# routespec

OpenAPI 3.0 documents derived from Rust types and route metadata, enforced
against live axum requests.

## Features

- Compile-time type descriptors via `#[derive(ApiSchema)]`
- Structural schema synthesis for request and response bodies
- Declarative parameter rules (required, min/max, pattern, enum, email, url)
- Operation registry with up-front validation of every definition
- Deterministic document assembly with default responses and operation ids
- Request guard middleware rejecting invalid requests before the handler runs
- Document endpoint with cache headers and entity tags

## Usage

```rust,no_run
use routespec::{ApiRouter, ApiSchema, DocsConfig, OperationDefinition, ParameterSpec, ValidationRule};

#[derive(ApiSchema)]
struct User {
    id: u64,
    name: String,
}

# fn main() -> Result<(), routespec::RouteSpecError> {
let mut api = ApiRouter::new(DocsConfig::new("Users API", "1.0.0").with_base_path("/api"));
api.register(
    OperationDefinition::new("GET", "/users", "List users")
        .with_tags(["Users"])
        .with_response::<User>()
        .with_param(
            ParameterSpec::query("limit")
                .required(true)
                .with_rule(ValidationRule::max(100.0, "limit must be at most 100")),
        )
        .with_handler(|_req: axum::extract::Request| async { "[]" }),
)?;
api.generate()?;
# Ok(())
# }
```
*/

extern crate self as routespec;

// Re-export main types
pub use crate::{
    assembler::{assemble, derive_operation_id},
    config::DocsConfig,
    descriptor::{
        sample_timestamp, ApiSchema, FieldAnnotations, FieldDescriptor, StructDescriptor,
        TimeValue, TypeDescriptor,
    },
    endpoint::{serve_spec, SpecEndpoint, SpecSnapshot},
    error::{
        AssemblyError, ConfigError, RegistrationError, RouteSpecError, RouteSpecResult,
        SchemaError, SchemaResult, ValidationError,
    },
    guard::{guard_middleware, GuardRejection, ParameterSource, RequestGuard, RequestValues},
    operation::{
        Handler, HttpMethod, OperationDefinition, ParameterLocation, ParameterSpec,
    },
    registry::{OperationRegistry, RegisteredOperation},
    router::ApiRouter,
    schema::{synthesize, synthesize_handle, value_schema, SchemaNode, SchemaType, TypeHandle},
    specification::SpecificationDocument,
    validation::{validate, RuleKind, RuleValue, ValidationRule},
};

// Re-export the derive macro from the proc-macro crate
pub use routespec_derive::ApiSchema;

// Core modules
pub mod config;
pub mod error;
pub mod specification;

// Type descriptors and schema synthesis
pub mod descriptor;
pub mod schema;

// Parameter rules
pub mod validation;

// Operations and assembly
pub mod assembler;
pub mod operation;
pub mod registry;

// HTTP integration
pub mod endpoint;
pub mod guard;
pub mod router;

// Test utilities
#[cfg(test)]
mod test_utils;
