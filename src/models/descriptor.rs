//! Operation descriptors: the registration input of the gateway.
//!
//! A descriptor is the declarative description of one remote call, as an
//! interface author would write it: a path, an HTTP verb, the way each
//! parameter is sent, literal default headers and an optional fallback.
//! Descriptors are plain serde records so they can be built in code or loaded
//! from a TOML file.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// HTTP verb of a declared operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// What the caller gets back from an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnShape {
    /// One decoded value.
    #[default]
    Single,
    /// A lazy, finite sequence of decoded elements.
    Stream,
    /// Nothing; the response body is discarded.
    Empty,
}

impl ReturnShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnShape::Single => "single",
            ReturnShape::Stream => "stream",
            ReturnShape::Empty => "empty",
        }
    }
}

/// How one declared parameter travels in the request.
///
/// Each field mirrors one binding annotation. Exactly one of them should be
/// set; setting none leaves the argument visible only to interceptors and
/// fallbacks, setting more than one is rejected when the gateway is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParameterDescriptor {
    /// Path variable name (`${name}` in the path).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Query parameter name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Request header name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,

    /// Whether the argument is the request body.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub body: bool,
}

impl ParameterDescriptor {
    pub fn path(name: impl Into<String>) -> Self {
        Self {
            path: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn query(name: impl Into<String>) -> Self {
        Self {
            query: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn header(name: impl Into<String>) -> Self {
        Self {
            header: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn body() -> Self {
        Self {
            body: true,
            ..Default::default()
        }
    }

    /// A parameter that is not sent.
    pub fn unbound() -> Self {
        Self::default()
    }
}

/// A literal header sent with every call of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultHeader {
    pub name: String,
    pub value: String,
}

impl DefaultHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Declarative description of one remote operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    /// Operation identifier, unique within its interface.
    pub id: String,

    pub method: HttpMethod,

    /// Path relative to the service host, may contain `${name}` placeholders.
    #[serde(default)]
    pub path: String,

    /// Parameters in declaration order.
    #[serde(default)]
    pub params: Vec<ParameterDescriptor>,

    #[serde(default)]
    pub default_headers: Vec<DefaultHeader>,

    /// Name of a registered fallback handler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,

    #[serde(default)]
    pub returns: ReturnShape,
}

impl OperationDescriptor {
    pub fn new(id: impl Into<String>, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            method,
            path: path.into(),
            params: Vec::new(),
            default_headers: Vec::new(),
            fallback: None,
            returns: ReturnShape::Single,
        }
    }

    pub fn param(mut self, param: ParameterDescriptor) -> Self {
        self.params.push(param);
        self
    }

    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push(DefaultHeader::new(name, value));
        self
    }

    pub fn fallback(mut self, name: impl Into<String>) -> Self {
        self.fallback = Some(name.into());
        self
    }

    pub fn returns(mut self, shape: ReturnShape) -> Self {
        self.returns = shape;
        self
    }
}

/// All operations declared against one remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    /// Service alias, resolved to a host through the routing configuration.
    pub alias: String,

    #[serde(default)]
    pub operations: Vec<OperationDescriptor>,
}

impl InterfaceDescriptor {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            operations: Vec::new(),
        }
    }

    pub fn operation(mut self, operation: OperationDescriptor) -> Self {
        self.operations.push(operation);
        self
    }
}

/// A fallback that answers every failure with the same JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticFallbackDescriptor {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

/// Top level of a descriptor file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptorFile {
    #[serde(default)]
    pub interfaces: Vec<InterfaceDescriptor>,

    #[serde(default)]
    pub fallbacks: Vec<StaticFallbackDescriptor>,
}

impl DescriptorFile {
    pub fn from_toml(contents: &str) -> crate::error::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: impl AsRef<std::path::Path>) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }
}
