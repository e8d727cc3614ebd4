use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SERVER_NAME: &str = "_";
pub const DEFAULT_MAX_BODY_SIZE: usize = 1_048_576;
pub const DEFAULT_ROUTE_PATH: &str = "/";
pub const DEFAULT_ROOT: &str = "./www";
pub const DEFAULT_FILE: &str = "index.html";
pub const DEFAULT_HEADER_BUFFER_SIZE: usize = 8192;
pub const DEFAULT_MAX_URI_SIZE: usize = 8192;
pub const DEFAULT_WORKER_CONNECTIONS: usize = 1024;
pub const DEFAULT_ERROR_LOG: &str = "logs/error.log";

#[derive(Debug, Clone, Copy)]
pub struct Listen {
    pub ip: IpAddr,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct RouteConfig {
    pub path: String,
    pub is_regex: bool,
    pub methods: Vec<String>,
    /// `rewrite <from> <to>` pairs, in declaration order; the first whose
    /// `from` is a substring of the request URI wins and yields a 301.
    pub rewrites: Vec<(String, String)>,
    pub root: String,
    pub default_file: String,
    pub autoindex: bool,
    pub cgi_ext: Option<String>,
    pub cgi_path: Option<String>,
    pub upload_dir: String,
    pub client_max_body_size: Option<usize>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_ROUTE_PATH.to_string(),
            is_regex: false,
            methods: vec!["GET".to_string(), "HEAD".to_string()],
            rewrites: Vec::new(),
            root: DEFAULT_ROOT.to_string(),
            default_file: DEFAULT_FILE.to_string(),
            autoindex: false,
            cgi_ext: None,
            cgi_path: None,
            upload_dir: String::new(),
            client_max_body_size: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: Vec<Listen>,
    pub server_name: String,
    pub default_server: bool,
    pub error_pages: HashMap<u16, String>,
    pub client_max_body_size: usize,
    pub client_header_buffer_size: usize,
    pub client_max_uri_size: usize,
    pub root: String,
    pub access_log: Option<String>,
    pub routes: Vec<Arc<RouteConfig>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: vec![Listen {
                ip: DEFAULT_HOST.parse().unwrap(),
                port: DEFAULT_PORT,
            }],
            server_name: DEFAULT_SERVER_NAME.to_string(),
            default_server: false,
            error_pages: HashMap::new(),
            client_max_body_size: DEFAULT_MAX_BODY_SIZE,
            client_header_buffer_size: DEFAULT_HEADER_BUFFER_SIZE,
            client_max_uri_size: DEFAULT_MAX_URI_SIZE,
            root: DEFAULT_ROOT.to_string(),
            access_log: None,
            routes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MainConfig {
    pub error_log: String,
    pub error_log_level: String,
    pub worker_connections: usize,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            error_log: DEFAULT_ERROR_LOG.to_string(),
            error_log_level: "info".to_string(),
            worker_connections: DEFAULT_WORKER_CONNECTIONS,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub main: MainConfig,
    pub servers: Vec<Arc<ServerConfig>>,
    pub mime_types: HashMap<String, String>,
}
