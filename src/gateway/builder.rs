// Gateway construction and eager route validation
// Author: kelexine (https://github.com/kelexine)

use super::{CompiledOperation, Gateway, GatewayInner, ServiceEntry};
use crate::codec::{BodyCodec, JsonCodec};
use crate::config::{AppConfig, HttpConfig};
use crate::dispatch::Dispatcher;
use crate::error::{GatewayError, Result};
use crate::fallback::{fallback_fn, FallbackHandler, FallbackRegistry, StaticFallback};
use crate::interceptor::{Interceptor, InterceptorRegistry};
use crate::models::{
    DescriptorFile, InterfaceDescriptor, ServiceRoute, ServiceRoutes, TransportError,
};
use crate::template::compile;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Collects routes, interfaces, fallbacks and interceptors, then validates
/// everything at once in [`GatewayBuilder::build`].
///
/// Nothing can be invoked before `build` succeeds; a descriptor error is a
/// build error, never a call-time one.
pub struct GatewayBuilder {
    routes: Vec<ServiceRoute>,
    interfaces: Vec<InterfaceDescriptor>,
    fallbacks: FallbackRegistry,
    interceptors: InterceptorRegistry,
    codec: Arc<dyn BodyCodec>,
    http: HttpConfig,
    client: Option<Client>,
    sanitize_headers: bool,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            interfaces: Vec::new(),
            fallbacks: FallbackRegistry::new(),
            interceptors: InterceptorRegistry::new(),
            codec: Arc::new(JsonCodec),
            http: HttpConfig::default(),
            client: None,
            sanitize_headers: true,
        }
    }

    /// Start from loaded configuration: routing table, HTTP client settings
    /// and header sanitization.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut builder = Self::new().routes(config.services.routes.iter().cloned());
        builder.http = config.http.clone();
        builder.sanitize_headers = config.logging.sanitize_headers;
        builder
    }

    pub fn route(mut self, alias: impl Into<String>, host: impl Into<String>) -> Self {
        self.routes.push(ServiceRoute::new(alias, host));
        self
    }

    pub fn routes(mut self, routes: impl IntoIterator<Item = ServiceRoute>) -> Self {
        self.routes.extend(routes);
        self
    }

    pub fn interface(mut self, interface: InterfaceDescriptor) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Add every interface of a descriptor file and register its static
    /// fallbacks under their declared names.
    pub fn descriptors(mut self, file: DescriptorFile) -> Self {
        for fallback in file.fallbacks {
            debug!("Registering static fallback '{}'", fallback.name);
            self.fallbacks
                .register(fallback.name, Arc::new(StaticFallback::new(fallback.value)));
        }
        self.interfaces.extend(file.interfaces);
        self
    }

    pub fn fallback(mut self, name: impl Into<String>, handler: impl FallbackHandler + 'static) -> Self {
        self.fallbacks.register(name, Arc::new(handler));
        self
    }

    /// Register a closure as a named fallback.
    pub fn fallback_fn<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value], &TransportError) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.fallback(name, fallback_fn(f))
    }

    /// Apply `interceptor` to every call to the given service aliases.
    pub fn interceptor<I, S>(mut self, aliases: I, interceptor: impl Interceptor + 'static) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interceptors.register(aliases, Arc::new(interceptor));
        self
    }

    pub fn codec(mut self, codec: impl BodyCodec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Use a preconfigured HTTP client instead of building one from
    /// [`HttpConfig`].
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Compile and validate every declared operation.
    ///
    /// Fails on an unknown alias, an invalid binding, a fallback name with no
    /// registered handler, or an operation id declared twice for one alias.
    pub fn build(self) -> Result<Gateway> {
        let routes = ServiceRoutes::new(self.routes)?;
        let mut services: HashMap<String, ServiceEntry> = HashMap::new();

        for interface in &self.interfaces {
            let service = routes.resolve(&interface.alias)?;
            let entry = services
                .entry(interface.alias.clone())
                .or_insert_with(|| ServiceEntry {
                    route: service.clone(),
                    operations: HashMap::new(),
                });

            for operation in &interface.operations {
                let route = compile(&interface.alias, operation)?;
                let fallback = self.fallbacks.bind(&route)?;

                if entry.operations.contains_key(&route.operation_id) {
                    return Err(GatewayError::DuplicateOperation {
                        alias: interface.alias.clone(),
                        operation: route.operation_id,
                    });
                }

                info!(
                    "Bind api path - alias: {}, operation: {}, method: {}, url: {}",
                    interface.alias, route.operation_id, route.method, route.url
                );
                entry.operations.insert(
                    route.operation_id.clone(),
                    CompiledOperation {
                        route: Arc::new(route),
                        fallback,
                    },
                );
            }
        }

        let client = match self.client {
            Some(client) => client,
            None => Dispatcher::build_client(&self.http)?,
        };
        let dispatcher = Dispatcher::new(client, self.codec, self.interceptors, self.sanitize_headers);

        info!(
            "Gateway ready with {} services, {} operations",
            services.len(),
            services.values().map(|s| s.operations.len()).sum::<usize>()
        );

        Ok(Gateway {
            inner: Arc::new(GatewayInner {
                services,
                dispatcher,
            }),
        })
    }
}
