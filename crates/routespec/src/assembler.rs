//! Builds the specification document from registered operations.

use crate::{
    config::DocsConfig,
    error::{AssemblyError, SchemaError},
    operation::{HttpMethod, OperationDefinition, ParameterSpec},
    registry::{OperationRegistry, RegisteredOperation},
    schema::{synthesize_handle, value_schema_handle, SchemaNode, TypeHandle},
    specification::{
        Components, MediaType, Operation, RequestBody, Response, SpecificationDocument,
        DEFAULT_OPENAPI_VERSION, JSON_MEDIA_TYPE,
    },
};
use std::collections::BTreeMap;
use tracing::debug;

/// Assemble the document for every registered operation.
///
/// Pure with respect to its inputs: the same registry and configuration
/// always produce the same document.
pub fn assemble(
    registry: &OperationRegistry,
    config: &DocsConfig,
) -> Result<SpecificationDocument, AssemblyError> {
    if config.info.title.is_empty() {
        return Err(AssemblyError::MissingTitle);
    }
    if config.info.version.is_empty() {
        return Err(AssemblyError::MissingVersion);
    }
    if registry.is_empty() {
        return Err(AssemblyError::NoPaths);
    }

    let openapi = if config.openapi_version.is_empty() {
        DEFAULT_OPENAPI_VERSION.to_string()
    } else {
        config.openapi_version.clone()
    };

    let mut doc = SpecificationDocument {
        openapi,
        info: config.info.clone(),
        servers: config.effective_servers(),
        paths: BTreeMap::new(),
        components: Components {
            security_schemes: config.security_schemes.clone(),
            ..Default::default()
        },
        security: config.security.clone(),
        tags: config.tags.clone(),
        external_docs: config.external_docs.clone(),
    };

    for registered in registry.operations() {
        let operation = build_operation(registered, &mut doc.components)?;
        debug!(
            method = %registered.method,
            path = %registered.path(),
            operation_id = operation.operation_id.as_deref().unwrap_or_default(),
            "assembled operation"
        );
        *doc.paths
            .entry(registered.path().to_string())
            .or_default()
            .slot_mut(registered.method) = Some(operation);
    }

    Ok(doc)
}

fn build_operation(
    registered: &RegisteredOperation,
    components: &mut Components,
) -> Result<Operation, AssemblyError> {
    let method = registered.method;
    let definition = registered.definition.as_ref();
    let schema_error = |role: &'static str| {
        move |source: SchemaError| AssemblyError::Schema {
            role,
            method: method.to_string(),
            path: definition.path.clone(),
            source,
        }
    };

    let parameters = definition
        .params
        .iter()
        .map(|param| parameter_with_schema(param).map_err(schema_error("parameter")))
        .collect::<Result<Vec<_>, _>>()?;

    let request_body = match &definition.request {
        Some(handle) => Some(RequestBody {
            content: json_content(body_schema(handle).map_err(schema_error("request"))?),
        }),
        None => None,
    };

    let mut responses = BTreeMap::new();
    if let Some(handle) = &definition.response {
        let schema = body_schema(handle).map_err(schema_error("response"))?;
        responses.insert(
            "200".to_string(),
            Response {
                description: "Success".to_string(),
                content: json_content(schema),
            },
        );
    }
    responses.insert("400".to_string(), Response::new("Bad Request"));
    responses.insert("500".to_string(), Response::new("Internal Server Error"));
    if !definition.security.is_empty() {
        responses.insert(
            "401".to_string(),
            Response::new("Unauthorized - Authentication required"),
        );
        responses.insert(
            "403".to_string(),
            Response::new("Forbidden - Insufficient permissions"),
        );
    }

    let mut operation = Operation {
        summary: definition.summary.clone(),
        description: definition.description.clone(),
        operation_id: Some(
            definition
                .operation_id
                .clone()
                .unwrap_or_else(|| derive_operation_id(&definition.path, &definition.tags)),
        ),
        tags: definition.tags.clone(),
        parameters,
        request_body,
        responses,
        deprecated: definition.deprecated,
        security: definition.security.clone(),
        servers: definition.servers.clone(),
        external_docs: definition.external_docs.clone(),
    };

    attach_examples(&mut operation, definition, components);
    Ok(operation)
}

fn body_schema(handle: &TypeHandle) -> Result<SchemaNode, SchemaError> {
    synthesize_handle(Some(handle))
}

fn parameter_with_schema(param: &ParameterSpec) -> Result<ParameterSpec, SchemaError> {
    let mut param = param.clone();
    if param.schema.is_none() {
        param.schema = Some(match &param.value_type {
            Some(handle) => value_schema_handle(handle)?,
            None => SchemaNode::string(),
        });
    }
    Ok(param)
}

fn json_content(schema: SchemaNode) -> BTreeMap<String, MediaType> {
    let mut content = BTreeMap::new();
    content.insert(
        JSON_MEDIA_TYPE.to_string(),
        MediaType {
            schema: Some(schema),
            examples: BTreeMap::new(),
        },
    );
    content
}

/// Named examples go on the request body, else on the `200` response,
/// else into the shared components.
fn attach_examples(
    operation: &mut Operation,
    definition: &OperationDefinition,
    components: &mut Components,
) {
    if definition.examples.is_empty() {
        return;
    }

    let target = match operation.request_body.as_mut() {
        Some(body) => body.content.get_mut(JSON_MEDIA_TYPE),
        None => operation
            .responses
            .get_mut("200")
            .and_then(|response| response.content.get_mut(JSON_MEDIA_TYPE)),
    };

    let examples = definition
        .examples
        .iter()
        .map(|(name, example)| (name.clone(), example.clone()));
    match target {
        Some(media) => media.examples.extend(examples),
        None => components.examples.extend(examples),
    }
}

/// `<first tag lowercased | "operation">_<path>` with placeholders removed
/// and every run of non-alphanumeric characters collapsed to `_`.
pub fn derive_operation_id(path: &str, tags: &[String]) -> String {
    let prefix = tags
        .first()
        .map(|tag| tag.to_lowercase())
        .unwrap_or_else(|| "operation".to_string());

    let mut id = String::with_capacity(path.len());
    for c in strip_placeholders(path).chars() {
        if c.is_ascii_alphanumeric() {
            id.push(c);
        } else if !id.ends_with('_') {
            id.push('_');
        }
    }

    format!("{}_{}", prefix, id.trim_matches('_'))
}

/// Remove `{name}` segments; an empty or unterminated brace is kept as text
fn strip_placeholders(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if close > 0 => rest = &after[close + 1..],
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Operations in the document, with their methods, in path order
pub fn document_operations(
    doc: &SpecificationDocument,
) -> impl Iterator<Item = (&str, HttpMethod, &Operation)> {
    doc.paths.iter().flat_map(|(path, item)| {
        item.operations()
            .map(move |(method, operation)| (path.as_str(), method, operation))
    })
}
