pub mod build;
pub mod directive;
pub mod display;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod types;
pub mod validate;

pub use error::ConfigError;
pub use types::{Config, Listen, MainConfig, RouteConfig, ServerConfig};

use std::path::Path;

/// Parses, builds, and validates a configuration file in one call — the
/// single entry point the binary uses at startup.
pub fn load(path: &Path) -> error::Result<Config> {
    let tree = parser::parse_file(path)?;
    let config = build::build_config(&tree)?;
    validate::validate_config(&config)?;
    Ok(config)
}
