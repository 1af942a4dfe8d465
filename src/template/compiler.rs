// Template compiler: operation descriptor → route metadata
// Author: kelexine (https://github.com/kelexine)

use super::{classify, parse_segments};
use crate::error::{GatewayError, Result};
use crate::models::{
    BindingKind, HeaderTemplate, OperationDescriptor, RouteMetadata, Segment, UrlTemplate,
};
use reqwest::header::{HeaderName, HeaderValue};
use std::collections::HashSet;

/// Compile one operation declared against `alias` into its route metadata.
///
/// The URL template is `${alias}` followed by the declared path, with
/// `/${name}` appended for path variables the path does not already mention
/// and `name=${name}` appended to the query section for each query parameter.
/// Header parameters become `name -> ${name}` header slots, followed by the
/// literal default headers.
///
/// Every configuration problem is reported here: bad or conflicting bindings,
/// a second body parameter, invalid header names or values, and path
/// placeholders that no parameter binds.
pub fn compile(alias: &str, operation: &OperationDescriptor) -> Result<RouteMetadata> {
    let op = operation.id.as_str();
    if op.trim().is_empty() {
        return Err(GatewayError::Config(format!(
            "Operation on service '{}' has an empty id",
            alias
        )));
    }

    // Keep the query section apart so path variables never land after it.
    let (mut path, mut query) = match operation.path.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (operation.path.clone(), String::new()),
    };

    let mut headers = HeaderTemplate::default();
    let mut bound: HashSet<&str> = HashSet::new();
    let mut body_params = 0usize;

    for (index, param) in operation.params.iter().enumerate() {
        let Some((kind, name)) = classify(op, index, param)? else {
            continue;
        };

        match kind {
            BindingKind::Path => {
                let token = format!("${{{}}}", name);
                if !path.contains(&token) {
                    if !path.ends_with('/') {
                        path.push('/');
                    }
                    path.push_str(&token);
                }
                bound.insert(name);
            }
            BindingKind::Query => {
                if !query.is_empty() && !query.ends_with('&') {
                    query.push('&');
                }
                query.push_str(name);
                query.push_str("=${");
                query.push_str(name);
                query.push('}');
                bound.insert(name);
            }
            BindingKind::Header => {
                let header_name =
                    HeaderName::from_bytes(name.as_bytes()).map_err(|e| GatewayError::InvalidBinding {
                        operation: op.to_string(),
                        index,
                        reason: format!("invalid header name '{}': {}", name, e),
                    })?;
                let slot = HeaderValue::from_str(&format!("${{{}}}", name)).map_err(|e| {
                    GatewayError::InvalidBinding {
                        operation: op.to_string(),
                        index,
                        reason: format!("invalid header name '{}': {}", name, e),
                    }
                })?;
                headers.push(header_name, slot);
            }
            BindingKind::Body => {
                body_params += 1;
                if body_params > 1 {
                    return Err(GatewayError::DuplicateBody {
                        operation: op.to_string(),
                    });
                }
            }
        }
    }

    for header in &operation.default_headers {
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|e| {
            GatewayError::Config(format!(
                "Operation '{}': invalid default header name '{}': {}",
                op, header.name, e
            ))
        })?;
        let value = HeaderValue::from_str(&header.value).map_err(|e| {
            GatewayError::Config(format!(
                "Operation '{}': invalid value for default header '{}': {}",
                op, header.name, e
            ))
        })?;
        headers.push(name, value);
    }

    let mut text = path;
    if !query.is_empty() {
        text.push('?');
        text.push_str(&query);
    }
    let segments = parse_segments(&text);

    for segment in &segments {
        if let Segment::Placeholder(name) = segment {
            if !bound.contains(name.as_str()) {
                return Err(GatewayError::UnboundPlaceholder {
                    operation: op.to_string(),
                    placeholder: name.clone(),
                });
            }
        }
    }

    Ok(RouteMetadata {
        operation_id: operation.id.clone(),
        method: operation.method,
        url: UrlTemplate {
            alias: alias.to_string(),
            segments,
        },
        headers,
        fallback: operation.fallback.clone(),
        returns: operation.returns,
        params: operation.params.clone(),
        accepts_body: body_params == 1,
    })
}
