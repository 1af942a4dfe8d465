// Service routing table (alias → host)
// Author: kelexine (https://github.com/kelexine)

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a service alias lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRoute {
    pub alias: String,
    #[serde(alias = "host_url")]
    pub host: String,
}

impl ServiceRoute {
    pub fn new(alias: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            host: host.into(),
        }
    }

    /// Host with any trailing slash removed, ready to prefix a path.
    pub fn base_url(&self) -> &str {
        self.host.trim_end_matches('/')
    }
}

/// Read-only lookup of configured service routes.
#[derive(Debug, Clone, Default)]
pub struct ServiceRoutes {
    routes: HashMap<String, ServiceRoute>,
}

impl ServiceRoutes {
    /// Build the table, rejecting blank and duplicate aliases.
    pub fn new(routes: impl IntoIterator<Item = ServiceRoute>) -> Result<Self> {
        let mut table = HashMap::new();
        for route in routes {
            if route.alias.trim().is_empty() {
                return Err(GatewayError::Config(
                    "Service route with empty alias".to_string(),
                ));
            }
            if route.host.trim().is_empty() {
                return Err(GatewayError::Config(format!(
                    "Service route '{}' has an empty host",
                    route.alias
                )));
            }
            if table.contains_key(&route.alias) {
                return Err(GatewayError::Config(format!(
                    "Service route '{}' is configured twice",
                    route.alias
                )));
            }
            table.insert(route.alias.clone(), route);
        }
        Ok(Self { routes: table })
    }

    /// Look up a route by alias.
    pub fn resolve(&self, alias: &str) -> Result<&ServiceRoute> {
        self.routes
            .get(alias)
            .ok_or_else(|| GatewayError::UnknownAlias(alias.to_string()))
    }

    pub fn aliases(&self) -> Vec<&str> {
        let mut aliases: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        aliases.sort_unstable();
        aliases
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_route() {
        let routes = ServiceRoutes::new(vec![
            ServiceRoute::new("github-service", "https://api.github.com/"),
            ServiceRoute::new("billing", "http://billing.internal:8080"),
        ])
        .unwrap();

        let github = routes.resolve("github-service").unwrap();
        assert_eq!(github.base_url(), "https://api.github.com");
        assert_eq!(routes.aliases(), vec!["billing", "github-service"]);
    }

    #[test]
    fn test_unknown_alias() {
        let routes = ServiceRoutes::new(vec![]).unwrap();
        assert!(matches!(
            routes.resolve("missing"),
            Err(GatewayError::UnknownAlias(alias)) if alias == "missing"
        ));
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let result = ServiceRoutes::new(vec![
            ServiceRoute::new("svc", "http://a"),
            ServiceRoute::new("svc", "http://b"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_host_rejected() {
        assert!(ServiceRoutes::new(vec![ServiceRoute::new("svc", " ")]).is_err());
    }
}
