use std::fmt;

use super::lexer::Loc;

/// A config error carries the location it was raised at plus a trace of
/// the blocks it bubbled through, so a misplaced directive points at both
/// the line and the surrounding block nesting.
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub loc: Option<Loc>,
    pub context: Vec<String>,
}

impl ConfigError {
    pub fn new(message: impl Into<String>) -> Self {
        ConfigError {
            message: message.into(),
            loc: None,
            context: Vec::new(),
        }
    }

    pub fn at(message: impl Into<String>, loc: Loc) -> Self {
        ConfigError {
            message: message.into(),
            loc: Some(loc),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.loc {
            Some(loc) => write!(f, "{}:{}: {}", loc.line, loc.col, self.message)?,
            None => write!(f, "{}", self.message)?,
        }
        for ctx in self.context.iter().rev() {
            write!(f, "\n  while parsing {ctx}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::new(e.to_string())
    }
}

impl From<ConfigError> for crate::error::CleanError {
    fn from(e: ConfigError) -> Self {
        crate::error::CleanError(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
