// HTTP dispatcher with interceptor and fallback handling
// Author: kelexine (https://github.com/kelexine)

use super::streaming::{decode_stream, Framing};
use super::InvocationContext;
use crate::binder::Bindings;
use crate::codec::BodyCodec;
use crate::config::HttpConfig;
use crate::error::{GatewayError, Result};
use crate::fallback::{self, FallbackBinding};
use crate::interceptor::InterceptorRegistry;
use crate::metrics;
use crate::models::{
    NormalizedResponse, Outcome, ParameterBinding, Reply, ResponseSource, ReturnShape,
    RouteMetadata, ServiceRoute, TransportError,
};
use crate::utils::logging::sanitize_headers;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Sends compiled routes over HTTP.
///
/// Holds the shared HTTP client, the body codec and the frozen interceptor
/// registry. It keeps no per-call state, so one dispatcher serves any number
/// of concurrent calls.
pub struct Dispatcher {
    http_client: Client,
    codec: Arc<dyn BodyCodec>,
    interceptors: InterceptorRegistry,
    sanitize_headers: bool,
}

impl Dispatcher {
    pub fn new(
        http_client: Client,
        codec: Arc<dyn BodyCodec>,
        interceptors: InterceptorRegistry,
        sanitize_headers: bool,
    ) -> Self {
        Self {
            http_client,
            codec,
            interceptors,
            sanitize_headers,
        }
    }

    /// Build the shared HTTP client from configuration.
    pub fn build_client(config: &HttpConfig) -> Result<Client> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_seconds))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .tcp_nodelay(true)
            .user_agent(config.user_agent.clone())
            .use_rustls_tls()
            .build()
            .map_err(|e| GatewayError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        debug!("Created HTTP client with connection pooling and keep-alive");
        Ok(client)
    }

    pub fn client(&self) -> &Client {
        &self.http_client
    }

    pub fn interceptors(&self) -> &InterceptorRegistry {
        &self.interceptors
    }

    /// Resolve headers, URL and body for one call without sending it.
    ///
    /// Header bindings are applied first, then the pre-handle interceptors run
    /// on the resulting header set, then the URL is resolved and the body (if
    /// any) is encoded.
    pub fn prepare(
        &self,
        route: &RouteMetadata,
        service: &ServiceRoute,
        args: &[Value],
        bindings: &Bindings,
    ) -> Result<InvocationContext> {
        let mut headers = route.headers.to_header_map();
        let dropped_headers = apply_header_bindings(route, &mut headers, &bindings.header)?;

        self.interceptors
            .pre_handle(route.alias(), args, bindings.body.as_ref(), &mut headers);

        let url = route
            .url
            .resolve(service.base_url(), &bindings.path, &bindings.query);

        let body = match &bindings.body {
            Some(body) => {
                let encoded = self.codec.encode(body)?;
                if !headers.contains_key(CONTENT_TYPE) {
                    let content_type = HeaderValue::from_str(self.codec.content_type()).map_err(|e| {
                        GatewayError::InvalidHeaderValue {
                            name: CONTENT_TYPE.to_string(),
                            reason: e.to_string(),
                        }
                    })?;
                    headers.insert(CONTENT_TYPE, content_type);
                }
                Some(encoded)
            }
            None => None,
        };

        Ok(InvocationContext {
            alias: route.alias().to_string(),
            operation_id: route.operation_id.clone(),
            method: route.method,
            url,
            headers,
            body,
            returns: route.returns,
            dropped_headers,
        })
    }

    /// Prepare and send one call.
    pub async fn invoke(
        &self,
        route: &RouteMetadata,
        service: &ServiceRoute,
        fallback: Option<&FallbackBinding>,
        args: &[Value],
        bindings: &Bindings,
    ) -> Result<Reply> {
        let context = self.prepare(route, service, args, bindings)?;
        self.execute(route, fallback, args, context).await
    }

    /// Send a prepared call and shape its result.
    ///
    /// Non-2xx answers and connection failures never surface as errors; they
    /// go through the fallback resolver. Dropping the returned future cancels
    /// the request and skips the fallback path entirely.
    pub async fn execute(
        &self,
        route: &RouteMetadata,
        fallback: Option<&FallbackBinding>,
        args: &[Value],
        context: InvocationContext,
    ) -> Result<Reply> {
        let mut guard = CallGuard::new(&context.alias, &context.operation_id);

        debug!("Execute request {} {}", context.method, context.url);
        if self.sanitize_headers {
            debug!("Headers: {}", sanitize_headers(&context.headers));
        } else {
            debug!("Headers: {:?}", context.headers);
        }
        if let Some(body) = &context.body {
            debug!("Body: {} bytes", body.len());
        }

        let start = Instant::now();
        let mut request = self
            .http_client
            .request(context.method.into(), &context.url)
            .headers(context.headers.clone());
        if let Some(body) = &context.body {
            request = request.body(body.clone());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    "Error on execute route request - Route: {} {}, Error: {}",
                    context.method, context.url, e
                );
                let error = TransportError::from_connect(context.method.as_str(), &context.url, &e);
                return self.recover(route, fallback, args, &context, &error, guard).await;
            }
        };

        let status = response.status();
        metrics::record_upstream(
            &context.alias,
            &context.operation_id,
            status.as_u16(),
            start.elapsed().as_secs_f64(),
        );

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(
                "Error on execute route request - Code: {}, Route: {} {}",
                status.as_u16(),
                context.method,
                context.url
            );
            debug!("Error body: {}", error_text);
            let error = TransportError::from_status(
                context.method.as_str(),
                &context.url,
                status,
                error_text,
            );
            return self.recover(route, fallback, args, &context, &error, guard).await;
        }

        let response_headers = response.headers().clone();
        let reply = match route.returns {
            ReturnShape::Single => {
                let bytes = match response.bytes().await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("Failed to read response body from {}: {}", context.url, e);
                        let error =
                            TransportError::from_connect(context.method.as_str(), &context.url, &e);
                        return self.recover(route, fallback, args, &context, &error, guard).await;
                    }
                };
                match self.codec.decode(&bytes) {
                    Ok(value) => Reply::Single(Outcome::Value(value)),
                    Err(e) => {
                        guard.finish("error");
                        return Err(GatewayError::Decode {
                            operation: context.operation_id.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
            ReturnShape::Stream => {
                let framing = Framing::from_content_type(
                    response_headers
                        .get(CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok()),
                );
                debug!("Streaming response of {} as {:?}", context.operation_id, framing);
                Reply::Stream(decode_stream(
                    response.bytes_stream(),
                    framing,
                    self.codec.clone(),
                    context.operation_id.clone(),
                ))
            }
            ReturnShape::Empty => Reply::Empty,
        };

        self.post_handle(&context, status, response_headers, ResponseSource::Upstream);
        guard.finish("success");
        Ok(reply)
    }

    async fn recover(
        &self,
        route: &RouteMetadata,
        fallback: Option<&FallbackBinding>,
        args: &[Value],
        context: &InvocationContext,
        error: &TransportError,
        mut guard: CallGuard,
    ) -> Result<Reply> {
        match fallback::resolve(route, fallback, args, error).await {
            Ok((reply, source)) => {
                self.post_handle(context, error.status, HeaderMap::new(), source);
                guard.finish("failure");
                Ok(reply)
            }
            Err(e) => {
                guard.finish("error");
                Err(e)
            }
        }
    }

    fn post_handle(
        &self,
        context: &InvocationContext,
        status: StatusCode,
        headers: HeaderMap,
        source: ResponseSource,
    ) {
        let response = NormalizedResponse {
            alias: context.alias.clone(),
            operation_id: context.operation_id.clone(),
            method: context.method.to_string(),
            url: context.url.clone(),
            status,
            headers,
            source,
        };
        self.interceptors.post_handle(&context.alias, &response);
    }
}

/// Overwrite template headers with live header bindings.
///
/// A binding whose name has no slot in the route's header template is not
/// sent; it is logged, counted in `gateway_dropped_headers_total`, and its
/// name is returned.
pub fn apply_header_bindings(
    route: &RouteMetadata,
    headers: &mut HeaderMap,
    bindings: &[ParameterBinding],
) -> Result<Vec<String>> {
    let mut dropped = Vec::new();
    for binding in bindings {
        let name = match HeaderName::from_bytes(binding.name.as_bytes()) {
            Ok(name) if route.headers.contains(&binding.name) => name,
            _ => {
                warn!(
                    "Undefined request header name '{}' on {}::{}! Check mapping configuration!",
                    binding.name,
                    route.alias(),
                    route.operation_id
                );
                metrics::record_dropped_header(route.alias(), &route.operation_id, &binding.name);
                dropped.push(binding.name.clone());
                continue;
            }
        };

        let value = HeaderValue::from_str(&binding.value_text()).map_err(|e| {
            GatewayError::InvalidHeaderValue {
                name: binding.name.clone(),
                reason: e.to_string(),
            }
        })?;
        headers.insert(name, value);
    }
    Ok(dropped)
}

/// Records the call outcome; a call dropped before finishing counts as
/// cancelled.
struct CallGuard {
    alias: String,
    operation: String,
    finished: bool,
}

impl CallGuard {
    fn new(alias: &str, operation: &str) -> Self {
        Self {
            alias: alias.to_string(),
            operation: operation.to_string(),
            finished: false,
        }
    }

    fn finish(&mut self, outcome: &str) {
        self.finished = true;
        metrics::record_call(&self.alias, &self.operation, outcome);
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        if !self.finished {
            debug!("Call {}::{} cancelled", self.alias, self.operation);
            metrics::record_call(&self.alias, &self.operation, "cancelled");
        }
    }
}
