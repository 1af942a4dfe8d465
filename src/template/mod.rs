//! URL and header templates.
//!
//! Templates are compiled once per operation (`compiler`) and resolved on
//! every call. Both steps classify parameters through [`classify`], so the
//! names baked into a template always line up with the names the binder
//! produces for live arguments.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod compiler;

pub use compiler::compile;

use crate::error::{GatewayError, Result};
use crate::models::{BindingKind, ParameterBinding, ParameterDescriptor, Segment, UrlTemplate};
use once_cell::sync::Lazy;
use regex::Regex;

/// `${name}` with no nested braces.
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^{}]*)\}").expect("placeholder pattern is valid"));

/// Characters that would break URL or template structure.
static BINDING_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s${}/?&=#]+$").expect("binding name pattern is valid"));

/// Name used for the body binding.
pub const BODY_BINDING_NAME: &str = "body";

/// Determine how a declared parameter is sent.
///
/// Returns `None` for a parameter that carries no binding. Rejects parameters
/// with more than one binding kind and binding names that are empty or contain
/// template/URL delimiters.
pub fn classify<'a>(
    operation: &str,
    index: usize,
    param: &'a ParameterDescriptor,
) -> Result<Option<(BindingKind, &'a str)>> {
    let mut declared: Vec<(BindingKind, &'a str)> = Vec::with_capacity(1);
    if let Some(name) = param.path.as_deref() {
        declared.push((BindingKind::Path, name));
    }
    if let Some(name) = param.query.as_deref() {
        declared.push((BindingKind::Query, name));
    }
    if let Some(name) = param.header.as_deref() {
        declared.push((BindingKind::Header, name));
    }
    if param.body {
        declared.push((BindingKind::Body, BODY_BINDING_NAME));
    }

    match declared.as_slice() {
        [] => Ok(None),
        [(kind, name)] => {
            if *kind != BindingKind::Body {
                validate_name(operation, index, *kind, name)?;
            }
            Ok(Some((*kind, *name)))
        }
        many => Err(GatewayError::ConflictingBinding {
            operation: operation.to_string(),
            index,
            kinds: many
                .iter()
                .map(|(kind, _)| kind.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

fn validate_name(operation: &str, index: usize, kind: BindingKind, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(GatewayError::InvalidBinding {
            operation: operation.to_string(),
            index,
            reason: format!("{} binding has an empty name", kind.as_str()),
        });
    }
    if !BINDING_NAME.is_match(name) {
        return Err(GatewayError::InvalidBinding {
            operation: operation.to_string(),
            index,
            reason: format!("{} binding name '{}' is malformed", kind.as_str(), name),
        });
    }
    Ok(())
}

/// Split template text into literal and placeholder segments.
pub(crate) fn parse_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;
    for captures in PLACEHOLDER.captures_iter(text) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Literal(text[last..whole.start()].to_string()));
        }
        segments.push(Segment::Placeholder(name.as_str().to_string()));
        last = whole.end();
    }
    if last < text.len() {
        segments.push(Segment::Literal(text[last..].to_string()));
    }
    segments
}

impl UrlTemplate {
    /// Resolve the template for one call.
    ///
    /// The alias token becomes `host`; every other placeholder takes the value
    /// of the first path binding with its name, then the first query binding.
    /// Values are percent-encoded as they are appended, so a value can never
    /// add a path segment, a second `?`, an extra `&` parameter or a fragment.
    /// Appended text is never scanned for placeholders either; a value
    /// containing `${...}` ends up in the URL as `%24%7B...%7D`. Placeholders
    /// without a binding are kept as written.
    pub fn resolve(
        &self,
        host: &str,
        path: &[ParameterBinding],
        query: &[ParameterBinding],
    ) -> String {
        let mut url = String::with_capacity(host.len() + 64);
        url.push_str(host);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => url.push_str(text),
                Segment::Placeholder(name) => {
                    let bound = path
                        .iter()
                        .chain(query.iter())
                        .find(|binding| binding.name == *name);
                    match bound {
                        Some(binding) => url.push_str(&urlencoding::encode(&binding.value_text())),
                        None => {
                            url.push_str("${");
                            url.push_str(name);
                            url.push('}');
                        }
                    }
                }
            }
        }
        url
    }
}
