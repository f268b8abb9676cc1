use crate::{
    error::ConfigError,
    specification::{
        ApiInfo, ExternalDocumentation, OAuth2Flows, SecurityRequirement, SecurityScheme, Server,
        Tag, DEFAULT_OPENAPI_VERSION,
    },
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Global settings for the generated document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    /// OpenAPI version string written to the document
    pub openapi_version: String,

    /// API title, version and description
    pub info: ApiInfo,

    /// Prefix for every registered route; also the default server URL
    pub base_path: String,

    /// Servers; a single default server is used when empty
    pub servers: Vec<Server>,

    /// Named security schemes
    pub security_schemes: BTreeMap<String, SecurityScheme>,

    /// Security requirements applied to every operation
    pub security: Vec<SecurityRequirement>,

    /// Tag metadata
    pub tags: Vec<Tag>,

    pub external_docs: Option<ExternalDocumentation>,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            openapi_version: DEFAULT_OPENAPI_VERSION.to_string(),
            info: ApiInfo::default(),
            base_path: String::new(),
            servers: Vec::new(),
            security_schemes: BTreeMap::new(),
            security: Vec::new(),
            tags: Vec::new(),
            external_docs: None,
        }
    }
}

impl DocsConfig {
    /// Create a configuration with API title and version
    pub fn new(title: &str, version: &str) -> Self {
        let mut config = Self::default();
        config.info.title = title.to_string();
        config.info.version = version.to_string();
        config
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.info.description = description.to_string();
        self
    }

    pub fn with_base_path(mut self, base_path: &str) -> Self {
        self.base_path = base_path.to_string();
        self
    }

    /// Add a server configuration
    pub fn add_server(mut self, url: &str, description: &str) -> Self {
        self.servers.push(Server::new(url, description));
        self
    }

    /// Add a security scheme
    pub fn add_security_scheme(mut self, name: &str, scheme: SecurityScheme) -> Self {
        self.security_schemes.insert(name.to_string(), scheme);
        self
    }

    /// HTTP basic authentication
    pub fn add_basic_auth(self, name: &str, description: &str) -> Self {
        self.add_security_scheme(
            name,
            SecurityScheme::Http {
                scheme: "basic".to_string(),
                bearer_format: None,
                description: non_empty(description),
            },
        )
    }

    /// Bearer token authentication, e.g. format `JWT`
    pub fn add_bearer_auth(self, name: &str, description: &str, format: &str) -> Self {
        self.add_security_scheme(
            name,
            SecurityScheme::Http {
                scheme: "bearer".to_string(),
                bearer_format: non_empty(format),
                description: non_empty(description),
            },
        )
    }

    /// API key sent in `location` (`header`, `query` or `cookie`) under `name`
    pub fn add_api_key(self, name: &str, description: &str, location: &str) -> Self {
        self.add_security_scheme(
            name,
            SecurityScheme::ApiKey {
                name: name.to_string(),
                location: location.to_string(),
                description: non_empty(description),
            },
        )
    }

    pub fn add_oauth2(self, name: &str, description: &str, flows: OAuth2Flows) -> Self {
        self.add_security_scheme(
            name,
            SecurityScheme::OAuth2 {
                flows,
                description: non_empty(description),
            },
        )
    }

    pub fn add_openid_connect(self, name: &str, description: &str, url: &str) -> Self {
        self.add_security_scheme(
            name,
            SecurityScheme::OpenIdConnect {
                open_id_connect_url: url.to_string(),
                description: non_empty(description),
            },
        )
    }

    /// Replace the global security requirements
    pub fn with_global_security(mut self, requirements: Vec<SecurityRequirement>) -> Self {
        self.security = requirements;
        self
    }

    /// Add a tag
    pub fn add_tag(mut self, name: &str, description: Option<&str>) -> Self {
        self.tags.push(Tag {
            name: name.to_string(),
            description: description.map(str::to_string),
            external_docs: None,
        });
        self
    }

    pub fn with_external_docs(mut self, url: &str, description: Option<&str>) -> Self {
        self.external_docs = Some(ExternalDocumentation {
            url: url.to_string(),
            description: description.map(str::to_string),
        });
        self
    }

    /// Servers for the document, falling back to the base path
    pub fn effective_servers(&self) -> Vec<Server> {
        if self.servers.is_empty() {
            vec![Server::new(self.base_path.clone(), "Default server")]
        } else {
            self.servers.clone()
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
