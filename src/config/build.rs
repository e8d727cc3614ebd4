use std::collections::HashMap;
use std::sync::Arc;

use super::directive::Directive;
use super::error::{ConfigError, Result};
use super::types::*;

/// Converts the generic directive tree into typed configuration structs.
/// Unknown directives are rejected rather than silently ignored, so a typo
/// in a config file surfaces as a startup error instead of dead config.
pub fn build_config(top: &[Directive]) -> Result<Config> {
    let mut main = MainConfig::default();
    let mut http_block: Option<&Directive> = None;

    for d in top {
        match d.name.as_str() {
            "error_log" => {
                main.error_log = d
                    .arg(0)
                    .ok_or_else(|| ConfigError::at("error_log requires a path", d.loc))?
                    .to_string();
                if let Some(level) = d.arg(1) {
                    main.error_log_level = level.to_string();
                }
            }
            "events" => {
                if let Some(wc) = d.child("worker_connections") {
                    main.worker_connections = parse_usize(wc)?;
                }
            }
            "http" => {
                if http_block.is_some() {
                    return Err(ConfigError::at("only one http block is allowed", d.loc));
                }
                http_block = Some(d);
            }
            other => {
                return Err(ConfigError::at(
                    format!("unknown top-level directive '{other}'"),
                    d.loc,
                ));
            }
        }
    }

    let http_block =
        http_block.ok_or_else(|| ConfigError::new("config is missing an 'http' block"))?;

    let mut mime_types = HashMap::new();
    if let Some(types) = http_block.child("types") {
        for entry in &types.children {
            if let Some(mime) = entry.arg(0) {
                mime_types.insert(entry.name.clone(), mime.to_string());
            }
        }
    }

    let mut servers = Vec::new();
    for server_dir in http_block.children_named("server") {
        servers.push(Arc::new(build_server(server_dir)?));
    }
    if servers.is_empty() {
        return Err(ConfigError::new(
            "http block must contain at least one server block",
        ));
    }

    Ok(Config {
        main,
        servers,
        mime_types,
    })
}

fn parse_usize(d: &Directive) -> Result<usize> {
    let raw = d
        .arg(0)
        .ok_or_else(|| ConfigError::at(format!("{} requires a value", d.name), d.loc))?;
    raw.parse()
        .map_err(|_| ConfigError::at(format!("invalid number '{raw}'"), d.loc))
}

fn parse_size(d: &Directive) -> Result<usize> {
    let raw = d
        .arg(0)
        .ok_or_else(|| ConfigError::at(format!("{} requires a value", d.name), d.loc))?;
    let (digits, mult) = match raw.chars().last() {
        Some('k') | Some('K') => (&raw[..raw.len() - 1], 1024),
        Some('m') | Some('M') => (&raw[..raw.len() - 1], 1024 * 1024),
        _ => (raw.as_str(), 1),
    };
    let value: usize = digits
        .parse()
        .map_err(|_| ConfigError::at(format!("invalid size '{raw}'"), d.loc))?;
    Ok(value * mult)
}

fn build_server(d: &Directive) -> Result<ServerConfig> {
    let mut cfg = ServerConfig::default();
    cfg.listen.clear();

    for listen in d.children_named("listen") {
        cfg.listen.push(parse_listen(listen)?);
    }
    if cfg.listen.is_empty() {
        cfg.listen.push(Listen {
            ip: DEFAULT_HOST.parse().unwrap(),
            port: DEFAULT_PORT,
        });
    }

    if let Some(name) = d.child("server_name") {
        cfg.server_name = name
            .arg(0)
            .ok_or_else(|| ConfigError::at("server_name requires a value", name.loc))?
            .to_string();
    }

    if let Some(flag) = d.child("default_server") {
        cfg.default_server = flag.args.is_empty() || flag.arg(0) == Some("on");
    }

    for page in d.children_named("error_page") {
        if page.args.len() < 2 {
            return Err(ConfigError::at(
                "error_page requires one or more codes and a path",
                page.loc,
            ));
        }
        let path = page.args.last().unwrap().clone();
        for code_str in &page.args[..page.args.len() - 1] {
            let code: u16 = code_str
                .parse()
                .map_err(|_| ConfigError::at(format!("invalid status code '{code_str}'"), page.loc))?;
            cfg.error_pages.insert(code, path.clone());
        }
    }

    if let Some(d2) = d.child("client_max_body_size") {
        cfg.client_max_body_size = parse_size(d2)?;
    }
    if let Some(d2) = d.child("client_header_buffer_size") {
        cfg.client_header_buffer_size = parse_size(d2)?;
    }
    if let Some(d2) = d.child("client_max_uri_size") {
        cfg.client_max_uri_size = parse_size(d2)?;
    }
    if let Some(d2) = d.child("root") {
        cfg.root = d2
            .arg(0)
            .ok_or_else(|| ConfigError::at("root requires a path", d2.loc))?
            .to_string();
    }
    if let Some(d2) = d.child("access_log") {
        let value = d2.arg(0).unwrap_or("off");
        cfg.access_log = (value != "off").then(|| value.to_string());
    }

    for loc in d.children_named("location") {
        cfg.routes.push(Arc::new(build_route(loc, &cfg.root)?));
    }

    Ok(cfg)
}

fn parse_listen(d: &Directive) -> Result<Listen> {
    let raw = d
        .arg(0)
        .ok_or_else(|| ConfigError::at("listen requires an address", d.loc))?;
    if let Some((host, port)) = raw.rsplit_once(':') {
        let ip = host
            .parse()
            .map_err(|_| ConfigError::at(format!("invalid listen host '{host}'"), d.loc))?;
        let port: u16 = port
            .parse()
            .map_err(|_| ConfigError::at(format!("invalid listen port '{port}'"), d.loc))?;
        Ok(Listen { ip, port })
    } else if let Ok(port) = raw.parse::<u16>() {
        Ok(Listen {
            ip: DEFAULT_HOST.parse().unwrap(),
            port,
        })
    } else {
        Err(ConfigError::at(format!("invalid listen value '{raw}'"), d.loc))
    }
}

fn build_route(d: &Directive, server_root: &str) -> Result<RouteConfig> {
    let mut route = RouteConfig {
        root: server_root.to_string(),
        ..RouteConfig::default()
    };

    if d.arg(0) == Some("~") {
        route.is_regex = true;
        route.path = d
            .arg(1)
            .ok_or_else(|| ConfigError::at("regex location requires a pattern", d.loc))?
            .to_string();
    } else {
        route.path = d
            .arg(0)
            .ok_or_else(|| ConfigError::at("location requires a path", d.loc))?
            .to_string();
    }

    if let Some(m) = d.child("methods") {
        route.methods = m.args.clone();
        if route.methods.is_empty() {
            return Err(ConfigError::at("methods requires at least one verb", m.loc));
        }
    }
    for limit in d.children_named("limit_except") {
        if !limit.args.is_empty() {
            route.methods = limit.args.clone();
        }
    }

    if let Some(r) = d.child("root") {
        route.root = r
            .arg(0)
            .ok_or_else(|| ConfigError::at("root requires a path", r.loc))?
            .to_string();
    }
    if let Some(idx) = d.child("index") {
        route.default_file = idx.arg(0).unwrap_or(DEFAULT_FILE).to_string();
    }
    if let Some(auto) = d.child("autoindex") {
        route.autoindex = auto.arg(0) == Some("on");
    }
    for rw in d.children_named("rewrite") {
        if rw.args.len() != 2 {
            return Err(ConfigError::at("rewrite requires a from and a to", rw.loc));
        }
        route.rewrites.push((rw.args[0].clone(), rw.args[1].clone()));
    }
    if let Some(upload) = d.child("upload_dir") {
        route.upload_dir = upload.arg(0).unwrap_or("").to_string();
    }
    if let Some(size) = d.child("client_max_body_size") {
        route.client_max_body_size = Some(parse_size(size)?);
    }
    if let Some(cgi) = d.child("cgi") {
        let mut ext = String::new();
        let mut bin_path = None;
        for entry in &cgi.children {
            if entry.name == "~" {
                ext = entry.arg(0).unwrap_or("").to_string();
            } else if entry.name == "bin_path" {
                bin_path = entry.arg(0).map(|s| s.to_string());
            }
        }
        if ext.is_empty() {
            return Err(ConfigError::at("cgi block requires a '~ <ext>' rule", cgi.loc));
        }
        route.cgi_ext = Some(ext);
        route.cgi_path = bin_path;
    }

    Ok(route)
}

#[cfg(test)]
mod tests {
    use super::super::parser::parse_source;
    use super::*;
    use std::path::Path;

    #[test]
    fn builds_a_minimal_server() {
        let src = r#"
            error_log logs/error.log info;
            events { worker_connections 512; }
            http {
                server {
                    listen 127.0.0.1:8080;
                    server_name example.com;
                    root ./www;
                    location / {
                        methods GET;
                    }
                }
            }
        "#;
        let tree = parse_source(src, Path::new(".")).unwrap();
        let cfg = build_config(&tree).unwrap();
        assert_eq!(cfg.main.worker_connections, 512);
        assert_eq!(cfg.servers.len(), 1);
        let server = &cfg.servers[0];
        assert_eq!(server.listen[0].port, 8080);
        assert_eq!(server.routes[0].methods, vec!["GET".to_string()]);
    }

    #[test]
    fn rejects_missing_http_block() {
        let tree = parse_source("events { worker_connections 1; }", Path::new(".")).unwrap();
        assert!(build_config(&tree).is_err());
    }

    #[test]
    fn parses_repeated_rewrite_pairs() {
        let src = r#"
            http {
                server {
                    location / {
                        rewrite /old /new;
                        rewrite /legacy /current;
                    }
                }
            }
        "#;
        let tree = parse_source(src, Path::new(".")).unwrap();
        let cfg = build_config(&tree).unwrap();
        assert_eq!(
            cfg.servers[0].routes[0].rewrites,
            vec![
                ("/old".to_string(), "/new".to_string()),
                ("/legacy".to_string(), "/current".to_string()),
            ]
        );
    }

    #[test]
    fn parses_error_pages_with_shared_path() {
        let src = r#"
            http {
                server {
                    error_page 404 403 /errors/generic.html;
                    location / { }
                }
            }
        "#;
        let tree = parse_source(src, Path::new(".")).unwrap();
        let cfg = build_config(&tree).unwrap();
        assert_eq!(
            cfg.servers[0].error_pages.get(&404).unwrap(),
            "/errors/generic.html"
        );
        assert_eq!(
            cfg.servers[0].error_pages.get(&403).unwrap(),
            "/errors/generic.html"
        );
    }
}
