//! Interceptor hooks around every dispatched call.
//!
//! Interceptors are registered against a set of service aliases and run for
//! every call to those services, in registration order. The registry is
//! filled while the gateway is being built and frozen afterwards.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::models::NormalizedResponse;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Pre/post hooks for calls to selected services.
pub trait Interceptor: Send + Sync {
    /// Runs before the URL is resolved and the request is sent. Header changes
    /// made here are what goes on the wire.
    fn pre_handle(&self, _args: &[Value], _body: Option<&Value>, _headers: &mut HeaderMap) {}

    /// Runs once the call has a result, whether from the remote service or
    /// from the fallback path.
    fn post_handle(&self, _response: &NormalizedResponse) {}
}

struct Registration {
    aliases: HashSet<String>,
    interceptor: Arc<dyn Interceptor>,
}

/// Append-only list of interceptors tagged with the aliases they apply to.
#[derive(Default)]
pub struct InterceptorRegistry {
    entries: Vec<Registration>,
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<I, S>(&mut self, aliases: I, interceptor: Arc<dyn Interceptor>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.push(Registration {
            aliases: aliases.into_iter().map(Into::into).collect(),
            interceptor,
        });
    }

    /// Interceptors registered for `alias`, in registration order.
    pub fn matching<'a>(&'a self, alias: &'a str) -> impl Iterator<Item = &'a dyn Interceptor> + 'a {
        self.entries
            .iter()
            .filter(move |entry| entry.aliases.contains(alias))
            .map(|entry| entry.interceptor.as_ref())
    }

    pub fn pre_handle(&self, alias: &str, args: &[Value], body: Option<&Value>, headers: &mut HeaderMap) {
        for interceptor in self.matching(alias) {
            interceptor.pre_handle(args, body, headers);
        }
    }

    pub fn post_handle(&self, alias: &str, response: &NormalizedResponse) {
        for interceptor in self.matching(alias) {
            interceptor.post_handle(response);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorRegistry")
            .field("entries", &self.entries.len())
            .finish()
    }
}
