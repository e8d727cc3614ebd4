use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{RouteConfig, ServerConfig};
use crate::http::Method;

#[derive(Debug, PartialEq, Eq)]
pub enum RoutingError {
    NotFound,
    MethodNotAllowed,
    PayloadTooLarge,
}

/// A simplified regex location pattern: only suffix patterns of the shape
/// `\.ext$` (the common "route requests for this extension" case) match.
/// Anything fancier is treated as a literal substring match.
fn regex_matches(pattern: &str, path: &str) -> bool {
    if let Some(ext) = pattern.strip_prefix("\\.").and_then(|p| p.strip_suffix('$')) {
        return path.ends_with(&format!(".{ext}"));
    }
    path.contains(pattern)
}

/// Picks the best-matching location for `path`: a matching regex location
/// wins over any prefix location, and among prefix locations the longest
/// (most specific) path wins. A request that matches nothing falls back to
/// the last configured `location` block, the server's de facto default
/// route, rather than failing outright.
pub fn match_route(
    routes: &[Arc<RouteConfig>],
    method: &Method,
    path: &str,
    body_size: usize,
    server_max_body_size: usize,
) -> Result<Arc<RouteConfig>, RoutingError> {
    let mut best: Option<&Arc<RouteConfig>> = None;

    for route in routes {
        let matches = if route.is_regex {
            regex_matches(&route.path, path)
        } else {
            path.starts_with(&route.path)
        };
        if !matches {
            continue;
        }
        if route.is_regex {
            best = Some(route);
            break;
        }
        match best {
            Some(current) if current.is_regex => {}
            Some(current) if current.path.len() >= route.path.len() => {}
            _ => best = Some(route),
        }
    }

    let route = match best {
        Some(r) => r,
        None => routes.last().ok_or(RoutingError::NotFound)?,
    };

    let max_body = route.client_max_body_size.unwrap_or(server_max_body_size);
    if body_size > max_body {
        return Err(RoutingError::PayloadTooLarge);
    }

    if !method.is_allowed(&route.methods) {
        return Err(RoutingError::MethodNotAllowed);
    }
    Ok(Arc::clone(route))
}

impl ServerConfig {
    pub fn find_route(
        &self,
        path: &str,
        method: &Method,
        body_size: usize,
    ) -> Result<Arc<RouteConfig>, RoutingError> {
        match_route(&self.routes, method, path, body_size, self.client_max_body_size)
    }
}

/// Host+path keyed route table, used where routes are registered outside of
/// a full `ServerConfig` (tests, tooling).
pub struct Router {
    routes: HashMap<String, Vec<Arc<RouteConfig>>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Router {
            routes: HashMap::new(),
        }
    }

    pub fn add_route_config(&mut self, host: &str, _path: &str, route: Arc<RouteConfig>) {
        self.routes.entry(host.to_string()).or_default().push(route);
    }

    pub fn resolve(
        &self,
        method: &Method,
        host: &str,
        path: &str,
        body_size: usize,
    ) -> Result<Arc<RouteConfig>, RoutingError> {
        let routes = self.routes.get(host).ok_or(RoutingError::NotFound)?;
        match_route(routes, method, path, body_size, usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(path: &str, methods: &[&str]) -> Arc<RouteConfig> {
        Arc::new(RouteConfig {
            path: path.to_string(),
            methods: methods.iter().map(|m| m.to_string()).collect(),
            ..Default::default()
        })
    }

    #[test]
    fn test_router_simple_match() {
        let mut router = Router::new();
        router.add_route_config("localhost", "/", route("/", &["GET"]));
        let resolved = router.resolve(&Method::GET, "localhost", "/", 0).unwrap();
        assert_eq!(resolved.path, "/");
    }

    #[test]
    fn test_router_no_match() {
        let router = Router::new();
        assert_eq!(
            router
                .resolve(&Method::GET, "localhost", "/x", 0)
                .unwrap_err(),
            RoutingError::NotFound
        );
    }

    #[test]
    fn test_router_longest_prefix_match() {
        let mut router = Router::new();
        router.add_route_config("localhost", "/", route("/", &["GET"]));
        router.add_route_config("localhost", "/api", route("/api", &["GET"]));
        let resolved = router
            .resolve(&Method::GET, "localhost", "/api/users", 0)
            .unwrap();
        assert_eq!(resolved.path, "/api");
    }

    #[test]
    fn test_router_method_not_allowed() {
        let mut router = Router::new();
        router.add_route_config("localhost", "/", route("/", &["GET"]));
        assert_eq!(
            router
                .resolve(&Method::POST, "localhost", "/", 0)
                .unwrap_err(),
            RoutingError::MethodNotAllowed
        );
    }

    #[test]
    fn test_router_host_not_found() {
        let router = Router::new();
        assert_eq!(
            router.resolve(&Method::GET, "nope", "/", 0).unwrap_err(),
            RoutingError::NotFound
        );
    }

    #[test]
    fn test_router_unmatched_path_falls_back_to_last_route() {
        let mut router = Router::new();
        router.add_route_config("localhost", "/", route("/", &["GET"]));
        router.add_route_config("localhost", "/api", route("/api", &["GET"]));
        let resolved = router
            .resolve(&Method::GET, "localhost", "/other", 0)
            .unwrap();
        assert_eq!(resolved.path, "/api");
    }

    #[test]
    fn test_router_body_too_large_for_route_limit() {
        let mut oversized = route("/upload", &["POST"]);
        Arc::get_mut(&mut oversized).unwrap().client_max_body_size = Some(10);
        let routes = vec![oversized];
        assert_eq!(
            match_route(&routes, &Method::POST, "/upload", 11, 1_000_000).unwrap_err(),
            RoutingError::PayloadTooLarge
        );
    }

    #[test]
    fn regex_location_matches_extension_suffix() {
        let mut routes = vec![route("/", &["GET"])];
        let mut cgi = RouteConfig {
            path: "\\.py$".to_string(),
            is_regex: true,
            methods: vec!["GET".to_string(), "POST".to_string()],
            ..Default::default()
        };
        cgi.path = "\\.py$".to_string();
        routes.push(Arc::new(cgi));
        let resolved = match_route(&routes, &Method::GET, "/scripts/run.py", 0, 1_000_000).unwrap();
        assert!(resolved.is_regex);
    }
}
