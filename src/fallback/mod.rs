//! Fallback handlers and the resolver that turns transport failures into
//! values of the operation's declared shape.
//!
//! Handlers are registered by name while the gateway is built; every
//! operation's `fallback` reference is resolved at that point, so a missing
//! handler is a build error rather than a surprise at failure time.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::error::{GatewayError, Result};
use crate::metrics;
use crate::models::{Outcome, Reply, ResponseSource, ReturnShape, RouteMetadata, TransportError};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Recovery logic for failed calls.
///
/// Receives the original call arguments in declaration order, and the
/// transport error as the last argument. The returned value is handed to the
/// caller in place of the remote result; an error is terminal for the call.
pub trait FallbackHandler: Send + Sync {
    fn handle<'a>(
        &'a self,
        args: &'a [Value],
        error: &'a TransportError,
    ) -> BoxFuture<'a, anyhow::Result<Value>>;
}

/// Fallback answering every failure with a fixed value.
#[derive(Debug, Clone)]
pub struct StaticFallback {
    value: Value,
}

impl StaticFallback {
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

impl FallbackHandler for StaticFallback {
    fn handle<'a>(
        &'a self,
        _args: &'a [Value],
        _error: &'a TransportError,
    ) -> BoxFuture<'a, anyhow::Result<Value>> {
        Box::pin(futures::future::ready(Ok(self.value.clone())))
    }
}

/// Fallback backed by a synchronous closure.
pub struct FnFallback<F> {
    f: F,
}

impl<F> FallbackHandler for FnFallback<F>
where
    F: Fn(&[Value], &TransportError) -> anyhow::Result<Value> + Send + Sync,
{
    fn handle<'a>(
        &'a self,
        args: &'a [Value],
        error: &'a TransportError,
    ) -> BoxFuture<'a, anyhow::Result<Value>> {
        Box::pin(futures::future::ready((self.f)(args, error)))
    }
}

/// Wrap a closure as a fallback handler.
pub fn fallback_fn<F>(f: F) -> FnFallback<F>
where
    F: Fn(&[Value], &TransportError) -> anyhow::Result<Value> + Send + Sync,
{
    FnFallback { f }
}

/// A route's fallback reference, resolved to its handler.
#[derive(Clone)]
pub struct FallbackBinding {
    pub target_operation_id: String,
    pub handler_name: String,
    pub handler: Arc<dyn FallbackHandler>,
}

impl std::fmt::Debug for FallbackBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackBinding")
            .field("target_operation_id", &self.target_operation_id)
            .field("handler_name", &self.handler_name)
            .finish()
    }
}

/// Named fallback handlers.
#[derive(Default, Clone)]
pub struct FallbackRegistry {
    handlers: HashMap<String, Arc<dyn FallbackHandler>>,
}

impl FallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. A later registration under the same name replaces
    /// the earlier one.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn FallbackHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Resolve the route's fallback reference, failing if it names no handler.
    pub fn bind(&self, route: &RouteMetadata) -> Result<Option<FallbackBinding>> {
        let Some(name) = route.fallback.as_deref() else {
            return Ok(None);
        };
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| GatewayError::UnknownFallback {
                operation: route.operation_id.clone(),
                fallback: name.to_string(),
            })?;
        Ok(Some(FallbackBinding {
            target_operation_id: route.operation_id.clone(),
            handler_name: name.to_string(),
            handler: handler.clone(),
        }))
    }
}

/// Convert a transport failure into a reply of the route's declared shape.
///
/// With a fallback, its value is wrapped in the declared shape. Without one,
/// single and stream operations get a synthetic failure payload carrying the
/// error status and raw body; empty operations get nothing. Only a failing
/// fallback produces an error.
pub async fn resolve(
    route: &RouteMetadata,
    fallback: Option<&FallbackBinding>,
    args: &[Value],
    error: &TransportError,
) -> Result<(Reply, ResponseSource)> {
    let alias = route.alias();
    let Some(binding) = fallback else {
        debug!(
            "No fallback for {}::{}, returning failure payload (HTTP {})",
            alias,
            route.operation_id,
            error.status_code()
        );
        metrics::record_fallback(alias, &route.operation_id, "none");
        let payload = error.payload();
        let reply = match route.returns {
            ReturnShape::Single => Reply::Single(Outcome::Failure(payload)),
            ReturnShape::Stream => {
                Reply::Stream(stream::once(async move { Ok::<_, GatewayError>(Outcome::Failure(payload)) }).boxed())
            }
            ReturnShape::Empty => Reply::Empty,
        };
        return Ok((reply, ResponseSource::Failure));
    };

    debug!(
        "Invoking fallback '{}' for {}::{}",
        binding.handler_name, alias, route.operation_id
    );

    let value = match binding.handler.handle(args, error).await {
        Ok(value) => value,
        Err(e) => {
            warn!(
                "Fallback '{}' for {}::{} failed: {}",
                binding.handler_name, alias, route.operation_id, e
            );
            metrics::record_fallback(alias, &route.operation_id, "error");
            return Err(GatewayError::Fallback {
                operation: route.operation_id.clone(),
                fallback: binding.handler_name.clone(),
                source: e.into(),
            });
        }
    };
    metrics::record_fallback(alias, &route.operation_id, "handled");

    let reply = match route.returns {
        ReturnShape::Single => Reply::Single(Outcome::Value(value)),
        ReturnShape::Stream => {
            Reply::Stream(stream::once(async move { Ok::<_, GatewayError>(Outcome::Value(value)) }).boxed())
        }
        ReturnShape::Empty => Reply::Empty,
    };
    Ok((reply, ResponseSource::Fallback))
}
