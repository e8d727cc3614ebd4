use std::path::PathBuf;
use std::str::FromStr;

use mio::Poll;
use webserv::config::{self, display};
use webserv::error::Result;
use webserv::server::Server;

const DEFAULT_CONFIG_PATH: &str = "config/default.conf";

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = config::load(&config_path)?;

    let level = proxy_log::LogLevel::from_str(&config.main.error_log_level)
        .unwrap_or(proxy_log::LogLevel::Info);
    proxy_log::configure(std::path::Path::new(&config.main.error_log), level)
        .map_err(|e| e.to_string())?;

    for s_cfg in &config.servers {
        if let Some(access_log) = &s_cfg.access_log {
            proxy_log::configure_access_log(std::path::Path::new(access_log))
                .map_err(|e| e.to_string())?;
        }
    }

    display::display_config(&config);

    let mut poll = Poll::new()?;
    let mut server = Server::new(config.servers)?;
    let result = server.run(&mut poll);
    proxy_log::flush();
    result
}
