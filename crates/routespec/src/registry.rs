use crate::{
    error::RegistrationError,
    operation::{HttpMethod, OperationDefinition},
};
use std::sync::Arc;
use tracing::debug;

/// A definition accepted by the registry
#[derive(Debug, Clone)]
pub struct RegisteredOperation {
    /// Normalized method
    pub method: HttpMethod,
    pub definition: Arc<OperationDefinition>,
}

impl RegisteredOperation {
    pub fn path(&self) -> &str {
        &self.definition.path
    }
}

/// Ordered collection of validated operation definitions.
///
/// Definitions are only ever appended; registration order is preserved.
#[derive(Debug, Default)]
pub struct OperationRegistry {
    operations: Vec<RegisteredOperation>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a definition.
    ///
    /// Checks run in order: definition present, handler present, non-empty
    /// path, supported method, unique route, no placeholder-name conflict with
    /// another route. Nothing is stored on failure.
    pub fn register<D>(&mut self, definition: D) -> Result<&RegisteredOperation, RegistrationError>
    where
        D: Into<Option<OperationDefinition>>,
    {
        let definition = definition
            .into()
            .ok_or(RegistrationError::MissingDefinition)?;

        if definition.handler.is_none() {
            return Err(RegistrationError::MissingHandler {
                path: definition.path,
            });
        }

        if definition.path.is_empty() {
            return Err(RegistrationError::EmptyPath);
        }

        let method: HttpMethod = definition.method.parse()?;

        if self.find(method, &definition.path).is_some() {
            return Err(RegistrationError::DuplicateRoute {
                method: method.to_string(),
                path: definition.path,
            });
        }

        // Same segments with differently named placeholders cannot share a router
        let shape = route_shape(&definition.path);
        if let Some(existing) = self
            .operations
            .iter()
            .find(|op| op.path() != definition.path && route_shape(op.path()) == shape)
        {
            return Err(RegistrationError::ConflictingRoute {
                existing: existing.path().to_string(),
                path: definition.path,
            });
        }

        debug!(
            method = %method,
            path = %definition.path,
            params = definition.params.len(),
            "registered operation"
        );

        let index = self.operations.len();
        self.operations.push(RegisteredOperation {
            method,
            definition: Arc::new(definition),
        });
        Ok(&self.operations[index])
    }

    /// Register a batch under a shared tag.
    ///
    /// Definitions without tags receive `tag`. Registration stops at the first
    /// failure; definitions registered before it are kept.
    pub fn register_group<I>(&mut self, tag: &str, definitions: I) -> Result<(), RegistrationError>
    where
        I: IntoIterator<Item = OperationDefinition>,
    {
        if tag.is_empty() {
            return Err(RegistrationError::EmptyTag);
        }

        let mut definitions = definitions.into_iter().peekable();
        if definitions.peek().is_none() {
            return Err(RegistrationError::EmptyGroup);
        }

        for (index, mut definition) in definitions.enumerate() {
            if definition.tags.is_empty() {
                definition.tags.push(tag.to_string());
            }
            self.register(definition)
                .map_err(|source| RegistrationError::Group {
                    index,
                    source: Box::new(source),
                })?;
        }

        Ok(())
    }

    /// Registered operations in registration order
    pub fn operations(&self) -> &[RegisteredOperation] {
        &self.operations
    }

    pub fn find(&self, method: HttpMethod, path: &str) -> Option<&RegisteredOperation> {
        self.operations
            .iter()
            .find(|op| op.method == method && op.path() == path)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Path template with every `{name}` placeholder reduced to `{}`
fn route_shape(path: &str) -> String {
    let mut shape = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        match rest[open..].find('}') {
            Some(close) => {
                shape.push_str(&rest[..open]);
                shape.push_str("{}");
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    shape.push_str(rest);
    shape
}
