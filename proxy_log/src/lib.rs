use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn format_time(now: SystemTime) -> String {
    let duration = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs = duration.as_secs();

    let year = 1970 + (secs / 31_557_600);
    let month = ((secs % 31_557_600) / 2_628_000) + 1;
    let day = ((secs % 2_628_000) / 86_400) + 1;
    let hour = (secs % 86_400) / 3600;
    let minute = (secs % 3600) / 60;
    let second = secs % 60;

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
        year, month, day, hour, minute, second
    )
}

/// Seven-level severity taxonomy; higher variants are more severe. A
/// configured threshold suppresses anything below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Exhaustive,
    Verbose,
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl LogLevel {
    fn color(self) -> &'static str {
        match self {
            LogLevel::Exhaustive => "90",
            LogLevel::Verbose => "35",
            LogLevel::Debug => "36",
            LogLevel::Info => "32",
            LogLevel::Warn => "33",
            LogLevel::Error => "31",
            LogLevel::Critical => "41",
        }
    }

    fn label(self) -> &'static str {
        match self {
            LogLevel::Exhaustive => "exhaustive",
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exhaustive" => Ok(LogLevel::Exhaustive),
            "verbose" => Ok(LogLevel::Verbose),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "critical" => Ok(LogLevel::Critical),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

enum Sink {
    Stderr,
    File(File),
}

impl Sink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Sink::Stderr => io::stderr().write_all(bytes),
            Sink::File(f) => f.write_all(bytes),
        }
    }
}

/// Buffers log lines in memory and flushes them in one write(2) call rather
/// than blocking the event loop on a write per message.
struct Logger {
    level: LogLevel,
    error_sink: Sink,
    error_buf: Vec<u8>,
    access_sink: Option<Sink>,
    access_buf: Vec<u8>,
    flush_threshold: usize,
}

impl Logger {
    fn new() -> Self {
        Logger {
            level: LogLevel::Info,
            error_sink: Sink::Stderr,
            error_buf: Vec::new(),
            access_sink: None,
            access_buf: Vec::new(),
            flush_threshold: 4096,
        }
    }

    fn log(&mut self, level: LogLevel, message: fmt::Arguments<'_>) {
        if level < self.level {
            return;
        }
        let ts = format_time(SystemTime::now());
        let line = format!(
            "[{}] \x1b[{}m{:<9}\x1b[0m {}\n",
            ts,
            level.color(),
            level.label(),
            message
        );
        self.error_buf.extend_from_slice(line.as_bytes());
        if level >= LogLevel::Error || self.error_buf.len() >= self.flush_threshold {
            let _ = self.flush_error();
        }
    }

    fn log_access(&mut self, line: &str) {
        self.access_buf.extend_from_slice(line.as_bytes());
        self.access_buf.push(b'\n');
        if self.access_sink.is_some() && self.access_buf.len() >= self.flush_threshold {
            let _ = self.flush_access();
        }
    }

    fn flush_error(&mut self) -> io::Result<()> {
        if self.error_buf.is_empty() {
            return Ok(());
        }
        self.error_sink.write_all(&self.error_buf)?;
        self.error_buf.clear();
        Ok(())
    }

    fn flush_access(&mut self) -> io::Result<()> {
        if self.access_buf.is_empty() {
            return Ok(());
        }
        if let Some(sink) = &mut self.access_sink {
            sink.write_all(&self.access_buf)?;
            self.access_buf.clear();
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_error()?;
        self.flush_access()
    }

    /// Moves the error sink from wherever it currently points (stderr,
    /// during bootstrap) to a configured file, preserving buffered lines.
    fn configure_error(&mut self, path: &Path, level: LogLevel) -> io::Result<()> {
        self.flush_error()?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.error_sink = Sink::File(file);
        self.level = level;
        Ok(())
    }

    fn configure_access(&mut self, path: &Path) -> io::Result<()> {
        self.flush_access()?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.access_sink = Some(Sink::File(file));
        Ok(())
    }
}

fn global() -> &'static Mutex<Logger> {
    static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();
    LOGGER.get_or_init(|| Mutex::new(Logger::new()))
}

#[doc(hidden)]
pub fn __log(level: LogLevel, args: fmt::Arguments<'_>) {
    if let Ok(mut logger) = global().lock() {
        logger.log(level, args);
    }
}

/// Redirects the error log from its bootstrap stderr sink to the file named
/// by the loaded configuration, and sets the severity threshold.
pub fn configure(path: &Path, level: LogLevel) -> io::Result<()> {
    global()
        .lock()
        .map_err(|_| io::Error::other("log mutex poisoned"))?
        .configure_error(path, level)
}

pub fn configure_access_log(path: &Path) -> io::Result<()> {
    global()
        .lock()
        .map_err(|_| io::Error::other("log mutex poisoned"))?
        .configure_access(path)
}

/// Flushes buffered error/access lines. Call once per event loop tick so log
/// output never blocks request handling.
pub fn flush() {
    if let Ok(mut logger) = global().lock() {
        let _ = logger.flush();
    }
}

pub struct AccessRecord<'a> {
    pub client: &'a str,
    pub method: &'a str,
    pub uri: &'a str,
    pub version: &'a str,
    pub status: u16,
    pub bytes: usize,
}

pub fn access(record: &AccessRecord<'_>) {
    let ts = format_time(SystemTime::now());
    let line = format!(
        "timestamp=\"{}\" clientIP=\"{}\" method=\"{}\" requestURI=\"{}\" httpVersion=\"{}\" status=\"{}\" bytes=\"{}\"",
        ts, record.client, record.method, record.uri, record.version, record.status, record.bytes
    );
    if let Ok(mut logger) = global().lock() {
        logger.log_access(&line);
    }
}

#[macro_export]
macro_rules! exhaustive { ($($arg:tt)*) => { $crate::__log($crate::LogLevel::Exhaustive, format_args!($($arg)*)); }; }
#[macro_export]
macro_rules! verbose { ($($arg:tt)*) => { $crate::__log($crate::LogLevel::Verbose, format_args!($($arg)*)); }; }
#[macro_export]
macro_rules! debug { ($($arg:tt)*) => { $crate::__log($crate::LogLevel::Debug, format_args!($($arg)*)); }; }
#[macro_export]
macro_rules! info { ($($arg:tt)*) => { $crate::__log($crate::LogLevel::Info, format_args!($($arg)*)); }; }
#[macro_export]
macro_rules! warn { ($($arg:tt)*) => { $crate::__log($crate::LogLevel::Warn, format_args!($($arg)*)); }; }
#[macro_export]
macro_rules! error { ($($arg:tt)*) => { $crate::__log($crate::LogLevel::Error, format_args!($($arg)*)); }; }
#[macro_export]
macro_rules! critical { ($($arg:tt)*) => { $crate::__log($crate::LogLevel::Critical, format_args!($($arg)*)); }; }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering_matches_severity() {
        assert!(LogLevel::Exhaustive < LogLevel::Critical);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn level_parses_case_insensitively() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("Critical".parse::<LogLevel>().unwrap(), LogLevel::Critical);
        assert!("bogus".parse::<LogLevel>().is_err());
    }
}
