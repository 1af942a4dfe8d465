//! The built gateway and its per-service call surface.
//!
//! A [`Gateway`] is produced only by [`GatewayBuilder::build`], after every
//! descriptor has been compiled and validated. It is immutable and cheap to
//! clone; concurrent calls share the compiled routes and the HTTP client.
//!
//! Callers reach an operation through [`Gateway::service`], which returns a
//! [`ServiceClient`] bound to one alias. Typed interfaces are thin wrappers
//! over a `ServiceClient`:
//!
//! ```no_run
//! # use restgate::{Outcome, Result, ServiceClient};
//! # use serde::Deserialize;
//! #[derive(Deserialize)]
//! struct Repo { name: String }
//!
//! struct GithubApi(ServiceClient);
//!
//! impl GithubApi {
//!     async fn get_repos(&self, user: &str) -> Result<Outcome<Vec<Repo>>> {
//!         self.0.single("getRepos", vec![user.into()]).await
//!     }
//! }
//! ```
//!
//! Author: kelexine (<https://github.com/kelexine>)

mod builder;

pub use builder::GatewayBuilder;

use crate::binder::bind;
use crate::dispatch::{Dispatcher, InvocationContext};
use crate::error::{GatewayError, Result};
use crate::fallback::FallbackBinding;
use crate::models::{Outcome, OutcomeStream, Reply, ReturnShape, RouteMetadata, ServiceRoute};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info_span, Instrument};
use uuid::Uuid;

pub(crate) struct CompiledOperation {
    pub(crate) route: Arc<RouteMetadata>,
    pub(crate) fallback: Option<FallbackBinding>,
}

pub(crate) struct ServiceEntry {
    pub(crate) route: ServiceRoute,
    pub(crate) operations: HashMap<String, CompiledOperation>,
}

pub(crate) struct GatewayInner {
    pub(crate) services: HashMap<String, ServiceEntry>,
    pub(crate) dispatcher: Dispatcher,
}

/// Compiled, ready-to-call set of service interfaces.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Call surface for one service alias.
    pub fn service(&self, alias: &str) -> Result<ServiceClient> {
        if !self.inner.services.contains_key(alias) {
            return Err(GatewayError::UnknownAlias(alias.to_string()));
        }
        Ok(ServiceClient {
            gateway: self.clone(),
            alias: alias.to_string(),
        })
    }

    /// Aliases with at least one registered interface, sorted.
    pub fn services(&self) -> Vec<&str> {
        let mut aliases: Vec<&str> = self.inner.services.keys().map(String::as_str).collect();
        aliases.sort_unstable();
        aliases
    }

    /// Every compiled route with the host it resolves against, sorted by
    /// alias then operation id.
    pub fn routes(&self) -> Vec<(&ServiceRoute, &RouteMetadata)> {
        let mut routes: Vec<(&ServiceRoute, &RouteMetadata)> = self
            .inner
            .services
            .values()
            .flat_map(|entry| {
                entry
                    .operations
                    .values()
                    .map(move |op| (&entry.route, op.route.as_ref()))
            })
            .collect();
        routes.sort_by(|a, b| {
            (a.0.alias.as_str(), a.1.operation_id.as_str())
                .cmp(&(b.0.alias.as_str(), b.1.operation_id.as_str()))
        });
        routes
    }

    fn entry(&self, alias: &str) -> Result<&ServiceEntry> {
        self.inner
            .services
            .get(alias)
            .ok_or_else(|| GatewayError::UnknownAlias(alias.to_string()))
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("services", &self.services())
            .finish()
    }
}

/// Calls the operations of one service alias.
///
/// Arguments are passed as JSON values in declaration order. The untyped
/// [`invoke`](Self::invoke) returns the declared shape as a [`Reply`]; the
/// typed helpers check the declared shape and deserialize elements into `T`.
#[derive(Clone, Debug)]
pub struct ServiceClient {
    gateway: Gateway,
    alias: String,
}

impl ServiceClient {
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Operation ids of this service, sorted.
    pub fn operations(&self) -> Vec<&str> {
        let Ok(entry) = self.gateway.entry(&self.alias) else {
            return Vec::new();
        };
        let mut ids: Vec<&str> = entry.operations.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Compiled metadata of one operation.
    pub fn route(&self, operation: &str) -> Result<&RouteMetadata> {
        Ok(self.operation(operation)?.1.route.as_ref())
    }

    fn operation(&self, operation: &str) -> Result<(&ServiceEntry, &CompiledOperation)> {
        let entry = self.gateway.entry(&self.alias)?;
        let compiled = entry
            .operations
            .get(operation)
            .ok_or_else(|| GatewayError::UnknownOperation {
                alias: self.alias.clone(),
                operation: operation.to_string(),
            })?;
        Ok((entry, compiled))
    }

    /// Resolve URL, headers and body for a call without sending it.
    pub fn prepare(&self, operation: &str, args: &[Value]) -> Result<InvocationContext> {
        let (entry, compiled) = self.operation(operation)?;
        let bindings = bind(&compiled.route, args)?;
        self.gateway
            .inner
            .dispatcher
            .prepare(&compiled.route, &entry.route, args, &bindings)
    }

    /// Perform a call and return its result in the declared shape.
    ///
    /// Dropping the returned future cancels the call; no fallback runs for a
    /// cancelled call.
    pub async fn invoke(&self, operation: &str, args: Vec<Value>) -> Result<Reply> {
        let (entry, compiled) = self.operation(operation)?;
        let bindings = bind(&compiled.route, &args)?;

        let span = info_span!(
            "invoke",
            invocation_id = %Uuid::new_v4(),
            alias = %self.alias,
            operation = %operation
        );

        self.gateway
            .inner
            .dispatcher
            .invoke(
                &compiled.route,
                &entry.route,
                compiled.fallback.as_ref(),
                &args,
                &bindings,
            )
            .instrument(span)
            .await
    }

    /// Call a single-shape operation and deserialize its value.
    pub async fn single<T: DeserializeOwned>(
        &self,
        operation: &str,
        args: Vec<Value>,
    ) -> Result<Outcome<T>> {
        self.expect_shape(operation, ReturnShape::Single)?;
        match self.invoke(operation, args).await? {
            Reply::Single(outcome) => typed(operation, outcome),
            other => Err(unexpected_reply(operation, &other)),
        }
    }

    /// Call a stream-shape operation; elements are deserialized as they
    /// arrive.
    pub async fn stream<T>(&self, operation: &str, args: Vec<Value>) -> Result<OutcomeStream<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.expect_shape(operation, ReturnShape::Stream)?;
        match self.invoke(operation, args).await? {
            Reply::Stream(stream) => {
                let operation = operation.to_string();
                Ok(stream
                    .map(move |item| item.and_then(|outcome| typed(&operation, outcome)))
                    .boxed())
            }
            other => Err(unexpected_reply(operation, &other)),
        }
    }

    /// Call an empty-shape operation.
    pub async fn send(&self, operation: &str, args: Vec<Value>) -> Result<()> {
        self.expect_shape(operation, ReturnShape::Empty)?;
        self.invoke(operation, args).await.map(|_| ())
    }

    fn expect_shape(&self, operation: &str, requested: ReturnShape) -> Result<()> {
        let declared = self.route(operation)?.returns;
        if declared != requested {
            return Err(GatewayError::ShapeMismatch {
                operation: operation.to_string(),
                declared: declared.as_str(),
                requested: requested.as_str(),
            });
        }
        Ok(())
    }
}

fn typed<T: DeserializeOwned>(operation: &str, outcome: Outcome<Value>) -> Result<Outcome<T>> {
    match outcome {
        Outcome::Value(value) => serde_json::from_value(value)
            .map(Outcome::Value)
            .map_err(|e| GatewayError::Decode {
                operation: operation.to_string(),
                reason: e.to_string(),
            }),
        Outcome::Failure(payload) => Ok(Outcome::Failure(payload)),
    }
}

fn unexpected_reply(operation: &str, reply: &Reply) -> GatewayError {
    GatewayError::Internal(format!("operation '{}' produced {:?}", operation, reply))
}
