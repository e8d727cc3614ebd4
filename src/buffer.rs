use std::collections::HashMap;
use std::fmt;

use mio::Token;
use proxy_log::debug;

pub const FLUSH_THRESHOLD: usize = 64 * 1024;
pub const HARD_CAP: usize = 150 * 1024 * 1024;

#[derive(Debug, PartialEq, Eq)]
pub enum BufferError {
    Overflow,
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer exceeded the {HARD_CAP} byte hard cap")
    }
}

impl std::error::Error for BufferError {}

#[derive(Debug, Default)]
struct Buffer {
    bytes: Vec<u8>,
}

/// Per-descriptor output buffering so the event loop never blocks on a
/// direct write: data accumulates here and is drained opportunistically.
/// Keyed by `Token` so a buffer can outlive the connection struct it was
/// filled for just long enough to be migrated (`transfer`) elsewhere.
#[derive(Default)]
pub struct BufferManager {
    buffers: HashMap<Token, Buffer>,
}

impl BufferManager {
    pub fn new() -> Self {
        BufferManager::default()
    }

    fn push(&mut self, token: Token, data: &[u8]) -> Result<bool, BufferError> {
        let buf = self.buffers.entry(token).or_default();
        buf.bytes.extend_from_slice(data);
        if buf.bytes.len() > HARD_CAP {
            return Err(BufferError::Overflow);
        }
        Ok(buf.bytes.len() >= FLUSH_THRESHOLD)
    }

    pub fn push_file(&mut self, token: Token, data: &[u8]) -> Result<bool, BufferError> {
        self.push(token, data)
    }

    pub fn push_socket(&mut self, token: Token, data: &[u8]) -> Result<bool, BufferError> {
        self.push(token, data)
    }

    pub fn pending(&self, token: Token) -> usize {
        self.buffers.get(&token).map_or(0, |b| b.bytes.len())
    }

    /// Removes and returns all bytes buffered for `token`. `blocking` marks
    /// the shutdown-drain call (spec's `Buffer.flush(blocking = true)`);
    /// every other call site passes `false` and the behavior is identical,
    /// the flag only affects logging.
    pub fn flush(&mut self, token: Token, blocking: bool) -> Vec<u8> {
        let bytes = self
            .buffers
            .remove(&token)
            .map(|b| b.bytes)
            .unwrap_or_default();
        if blocking && !bytes.is_empty() {
            debug!("draining {} buffered bytes for {:?} before shutdown", bytes.len(), token);
        }
        bytes
    }

    /// Re-keys a buffer from one token to another, preserving its contents.
    /// Used when a descriptor outlives its original token (e.g. migrating
    /// the bootstrap log buffer onto the configured log file's token).
    pub fn transfer(&mut self, from: Token, to: Token) {
        if let Some(buf) = self.buffers.remove(&from) {
            self.buffers.entry(to).or_default().bytes.extend(buf.bytes);
        }
    }

    pub fn remove(&mut self, token: Token) {
        self.buffers.remove(&token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_reports_threshold_crossing() {
        let mut mgr = BufferManager::new();
        let token = Token(0);
        assert_eq!(mgr.push_socket(token, &[0u8; 10]).unwrap(), false);
        let crossed = mgr.push_socket(token, &vec![0u8; FLUSH_THRESHOLD]).unwrap();
        assert!(crossed);
    }

    #[test]
    fn push_past_hard_cap_errors() {
        let mut mgr = BufferManager::new();
        let token = Token(0);
        let chunk = vec![0u8; HARD_CAP];
        mgr.push_file(token, &chunk).unwrap();
        assert_eq!(mgr.push_file(token, &[0u8; 1]), Err(BufferError::Overflow));
    }

    #[test]
    fn flush_drains_and_removes_the_buffer() {
        let mut mgr = BufferManager::new();
        let token = Token(0);
        mgr.push_socket(token, b"hello").unwrap();
        assert_eq!(mgr.flush(token, false), b"hello".to_vec());
        assert_eq!(mgr.pending(token), 0);
    }

    #[test]
    fn transfer_moves_bytes_to_the_new_token() {
        let mut mgr = BufferManager::new();
        let old = Token(1);
        let new = Token(2);
        mgr.push_socket(old, b"stderr bootstrap line").unwrap();
        mgr.transfer(old, new);
        assert_eq!(mgr.pending(old), 0);
        assert_eq!(mgr.flush(new, true), b"stderr bootstrap line".to_vec());
    }
}
