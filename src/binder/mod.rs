// Parameter binder: live arguments → classified bindings
// Author: kelexine (https://github.com/kelexine)

use crate::error::{GatewayError, Result};
use crate::models::{BindingKind, ParameterBinding, RouteMetadata};
use crate::template::classify;
use serde_json::Value;

/// Live arguments of one call, sorted by how they are sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    pub body: Option<Value>,
    pub path: Vec<ParameterBinding>,
    pub query: Vec<ParameterBinding>,
    pub header: Vec<ParameterBinding>,
}

impl Bindings {
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }
}

/// Classify `args` against the route's declared parameters.
///
/// Arguments are matched to parameters by position and classified with the
/// same rules the compiler used, so every binding name matches a placeholder
/// or header slot of the compiled templates. Binding lists keep argument order.
pub fn bind(route: &RouteMetadata, args: &[Value]) -> Result<Bindings> {
    if args.len() != route.params.len() {
        return Err(GatewayError::ArgumentCount {
            operation: route.operation_id.clone(),
            expected: route.params.len(),
            actual: args.len(),
        });
    }

    let mut bindings = Bindings::default();
    let mut seen_body = false;
    for (index, (param, value)) in route.params.iter().zip(args).enumerate() {
        let Some((kind, name)) = classify(&route.operation_id, index, param)? else {
            continue;
        };

        let binding = ParameterBinding {
            name: name.to_string(),
            kind,
            value: value.clone(),
        };
        match kind {
            BindingKind::Path => bindings.path.push(binding),
            BindingKind::Query => bindings.query.push(binding),
            BindingKind::Header => bindings.header.push(binding),
            BindingKind::Body => {
                if seen_body {
                    return Err(GatewayError::DuplicateBody {
                        operation: route.operation_id.clone(),
                    });
                }
                seen_body = true;
                // A null body argument means "send no body".
                if !binding.value.is_null() {
                    bindings.body = Some(binding.value);
                }
            }
        }
    }

    Ok(bindings)
}
