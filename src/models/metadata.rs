// Compiled route metadata
// Author: kelexine (https://github.com/kelexine)

use super::descriptor::{HttpMethod, ParameterDescriptor, ReturnShape};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::fmt;

/// How a live argument is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Path,
    Query,
    Header,
    Body,
}

impl BindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingKind::Path => "path",
            BindingKind::Query => "query",
            BindingKind::Header => "header",
            BindingKind::Body => "body",
        }
    }
}

/// One live argument, classified and named.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBinding {
    pub name: String,
    pub kind: BindingKind,
    pub value: Value,
}

impl ParameterBinding {
    /// Textual form used for path, query and header substitution.
    ///
    /// Strings are taken as-is (no quotes), `null` becomes `"null"` and
    /// anything else is rendered as compact JSON. URL templates percent-encode
    /// this text when they insert it; header values use it unchanged.
    pub fn value_text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// A piece of a URL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A URL template of the form `${alias}<path>[?<query>]`.
///
/// The template is split into segments once, at compile time, so resolution
/// is a single left-to-right pass that never re-reads inserted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    pub(crate) alias: String,
    pub(crate) segments: Vec<Segment>,
}

impl UrlTemplate {
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of all placeholders after the alias token, in order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Number of occurrences of `${name}` after the alias token.
    pub fn occurrences(&self, name: &str) -> usize {
        self.placeholders().filter(|p| *p == name).count()
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}}}", self.alias)?;
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => f.write_str(text)?,
                Segment::Placeholder(name) => write!(f, "${{{}}}", name)?,
            }
        }
        Ok(())
    }
}

/// Ordered header entries: dynamic `name -> ${name}` slots first, then literal
/// defaults.
#[derive(Debug, Clone, Default)]
pub struct HeaderTemplate {
    entries: Vec<(HeaderName, HeaderValue)>,
}

impl HeaderTemplate {
    pub(crate) fn push(&mut self, name: HeaderName, value: HeaderValue) {
        self.entries.push((name, value));
    }

    pub fn entries(&self) -> &[(HeaderName, HeaderValue)] {
        &self.entries
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|(n, _)| n.as_str().eq_ignore_ascii_case(name))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fresh outgoing header set for one call.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            map.append(name.clone(), value.clone());
        }
        map
    }
}

/// Immutable, compiled description of one remote operation.
#[derive(Debug, Clone)]
pub struct RouteMetadata {
    pub operation_id: String,
    pub method: HttpMethod,
    pub url: UrlTemplate,
    pub headers: HeaderTemplate,
    pub fallback: Option<String>,
    pub returns: ReturnShape,
    pub params: Vec<ParameterDescriptor>,
    pub accepts_body: bool,
}

impl RouteMetadata {
    pub fn alias(&self) -> &str {
        self.url.alias()
    }
}
