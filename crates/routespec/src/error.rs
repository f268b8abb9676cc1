use crate::validation::RuleKind;
use thiserror::Error;

/// Result type for routespec operations
pub type RouteSpecResult<T> = Result<T, RouteSpecError>;

/// Result type for schema synthesis
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while building or serving a specification
#[derive(Debug, Error)]
pub enum RouteSpecError {
    /// Operation registration failed
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Document assembly failed
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    /// Schema synthesis failed outside of an assembly
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Configuration could not be parsed
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The document was requested before `generate()` succeeded
    #[error("specification has not been generated yet; call generate() first")]
    NotGenerated,
}

/// A single parameter value failed its declared rules.
///
/// `message` is the failing rule's message, verbatim.
#[derive(Debug, Error)]
#[error("validation failed for field {field}: {message}")]
pub struct ValidationError {
    /// Parameter name
    pub field: String,
    /// Rule that rejected the value
    pub kind: RuleKind,
    /// User-facing message
    pub message: String,
    /// Underlying failure, if any (e.g. a malformed pattern)
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(field: impl Into<String>, kind: RuleKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Attach the underlying cause
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Whether this error reports a missing required value
    pub fn is_missing(&self) -> bool {
        self.kind == RuleKind::Required
    }
}

/// A type could not be turned into a schema
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Root type is not object-shaped
    #[error("invalid type provided: {0}")]
    InvalidType(String),

    /// A field's type failed to synthesize
    #[error("failed to create schema for field {field}: {source}")]
    Field {
        field: String,
        #[source]
        source: Box<SchemaError>,
    },

    /// Nesting exceeded the synthesizer's depth limit
    #[error("schema nesting exceeds {0} levels")]
    DepthExceeded(usize),

    /// A panic was raised while describing or walking the type
    #[error("panic in schema generation: {0}")]
    Panic(String),
}

impl SchemaError {
    /// Short tag identifying the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidType(_) => "invalid_type",
            Self::Field { source, .. } => source.kind(),
            Self::DepthExceeded(_) => "depth_exceeded",
            Self::Panic(_) => "panic",
        }
    }

    pub(crate) fn in_field(field: impl Into<String>, source: SchemaError) -> Self {
        Self::Field {
            field: field.into(),
            source: Box::new(source),
        }
    }
}

/// Reasons an operation definition is refused by the registry
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("api definition cannot be nil")]
    MissingDefinition,

    #[error("handler cannot be nil for path: {path}")]
    MissingHandler { path: String },

    #[error("path cannot be empty")]
    EmptyPath,

    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("route already registered: {method} {path}")]
    DuplicateRoute { method: String, path: String },

    #[error("route {path} conflicts with registered route {existing}")]
    ConflictingRoute { path: String, existing: String },

    #[error("tag cannot be empty")]
    EmptyTag,

    #[error("apis cannot be empty")]
    EmptyGroup,

    #[error("failed to register API {index}: {source}")]
    Group {
        index: usize,
        #[source]
        source: Box<RegistrationError>,
    },
}

/// Reasons a specification document cannot be assembled
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("API title is required")]
    MissingTitle,

    #[error("API version is required")]
    MissingVersion,

    #[error("no API paths defined")]
    NoPaths,

    #[error("failed to generate {role} schema for {method} {path}: {source}")]
    Schema {
        role: &'static str,
        method: String,
        path: String,
        #[source]
        source: SchemaError,
    },

    #[error("failed to marshal OpenAPI document: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Configuration parsing errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
}
