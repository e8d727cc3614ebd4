use std::collections::HashSet;
use std::path::Path;

use super::error::ConfigError;
use super::types::Config;

/// Catches configuration mistakes that would otherwise only surface as a
/// confusing runtime failure: duplicate virtual server bindings, dangling
/// error pages, and route roots that don't exist on disk.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for server in &config.servers {
        for listen in &server.listen {
            let key = (listen.ip, listen.port, server.server_name.clone());
            if !seen.insert(key) {
                return Err(ConfigError::new(format!(
                    "duplicate server block for {}:{} server_name '{}'",
                    listen.ip, listen.port, server.server_name
                )));
            }
        }

        for (code, path) in &server.error_pages {
            let full = Path::new(&server.root).join(path.trim_start_matches('/'));
            if !full.exists() {
                return Err(ConfigError::new(format!(
                    "error_page {code} points at missing file '{}'",
                    full.display()
                )));
            }
        }

        for route in &server.routes {
            if !Path::new(&route.root).exists() {
                return Err(ConfigError::new(format!(
                    "location '{}' root '{}' does not exist",
                    route.path, route.root
                )));
            }
        }
    }

    let default_servers_per_port = {
        let mut counts: std::collections::HashMap<u16, usize> = std::collections::HashMap::new();
        for server in &config.servers {
            if server.default_server {
                for listen in &server.listen {
                    *counts.entry(listen.port).or_default() += 1;
                }
            }
        }
        counts
    };
    if let Some((&port, _)) = default_servers_per_port.iter().find(|(_, &c)| c > 1) {
        return Err(ConfigError::new(format!(
            "port {port} has more than one default_server"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{Listen, MainConfig, ServerConfig};
    use std::sync::Arc;

    fn listen(port: u16) -> Listen {
        Listen {
            ip: "0.0.0.0".parse().unwrap(),
            port,
        }
    }

    #[test]
    fn rejects_duplicate_bindings() {
        let server = Arc::new(ServerConfig {
            root: ".".to_string(),
            listen: vec![listen(8080)],
            ..ServerConfig::default()
        });
        let config = Config {
            main: MainConfig::default(),
            servers: vec![server.clone(), server],
            mime_types: Default::default(),
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn accepts_distinct_server_names_on_same_port() {
        let mut a = ServerConfig {
            root: ".".to_string(),
            listen: vec![listen(8080)],
            ..ServerConfig::default()
        };
        a.server_name = "a.example.com".to_string();
        let mut b = ServerConfig {
            root: ".".to_string(),
            listen: vec![listen(8080)],
            ..ServerConfig::default()
        };
        b.server_name = "b.example.com".to_string();
        let config = Config {
            main: MainConfig::default(),
            servers: vec![Arc::new(a), Arc::new(b)],
            mime_types: Default::default(),
        };
        assert!(validate_config(&config).is_ok());
    }
}
