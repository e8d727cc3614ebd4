use crate::buffer::BufferManager;
use crate::prelude::*;
use crate::registry::{DescriptorKind, Registry};
use std::process::Child;

const DEFAULT_SESSION_TTL: u64 = 3600;

/// Owns every live connection, the listening sockets, and the pieces of
/// state that outlive any single connection (sessions, reaped-but-not-yet
/// collected CGI children). Drives the single-threaded `mio` event loop.
pub struct Server {
    pub listeners: HashMap<Token, TcpListener>,
    pub connections: HashMap<Token, HttpConnection>,
    pub cgi_to_client: HashMap<Token, Token>,
    pub zombie_purgatory: Vec<Child>,
    pub session_store: SessionStore,
    pub registry: Registry,
    pub buffer_mgr: BufferManager,
    shutting_down: bool,
    next_token: usize,
    configs: Vec<Arc<ServerConfig>>,
}

impl Server {
    pub fn new(configs: Vec<Arc<ServerConfig>>) -> Result<Self> {
        let mut registry = Registry::new();
        let mut listeners = HashMap::new();
        let mut next_token = 0usize;
        let mut bound = std::collections::HashSet::new();

        for s_cfg in &configs {
            for listen in &s_cfg.listen {
                let addr = SocketAddr::new(listen.ip, listen.port);
                if !bound.insert(addr) {
                    continue;
                }
                let listener = TcpListener::bind(addr)?;
                let token = Token(next_token);
                next_token += 1;
                registry.add(token, DescriptorKind::ServerSocket);
                listeners.insert(token, listener);
                info!("listening on {addr}");
            }
        }

        Ok(Server {
            listeners,
            connections: HashMap::new(),
            cgi_to_client: HashMap::new(),
            zombie_purgatory: Vec::new(),
            session_store: SessionStore::new(DEFAULT_SESSION_TTL),
            registry,
            buffer_mgr: BufferManager::new(),
            shutting_down: false,
            next_token,
            configs,
        })
    }

    /// Requests a cooperative stop: the event loop finishes its current
    /// iteration, drains buffered output, then returns from `run`.
    pub fn request_shutdown(&mut self) {
        self.shutting_down = true;
    }

    pub fn run(&mut self, poll: &mut Poll) -> Result<()> {
        for (token, listener) in self.listeners.iter_mut() {
            poll.registry()
                .register(listener, *token, Interest::READABLE)?;
        }

        let mut events = Events::with_capacity(1024);
        loop {
            poll.poll(&mut events, Some(CLIENT_TIMEOUT))?;

            for event in events.iter() {
                let token = event.token();

                if self.listeners.contains_key(&token) {
                    self.accept_all(poll, token)?;
                    continue;
                }

                if let Some(&client_token) = self.cgi_to_client.get(&token) {
                    self.dispatch_cgi_event(poll, event, token, client_token)?;
                    continue;
                }

                self.dispatch_client_event(poll, event, token)?;
            }

            self.reap_zombies();
            crate::timeouts::process(self, poll);

            if self.shutting_down {
                self.drain_before_shutdown();
                break;
            }
        }

        Ok(())
    }

    /// Flushes every connection's buffered CGI output and attempts a
    /// best-effort synchronous write before the process exits, then drains
    /// the log buffers (`Buffer.flush(blocking = true)`).
    fn drain_before_shutdown(&mut self) {
        let Server {
            connections,
            buffer_mgr,
            ..
        } = self;

        for (token, conn) in connections.iter_mut() {
            let leftover = buffer_mgr.flush(*token, true);
            if !leftover.is_empty() {
                conn.write_buffer.extend_from_slice(&leftover);
            }
            if !conn.write_buffer.is_empty() {
                let _ = conn.write_data();
            }
        }

        proxy_log::flush();
    }

    fn accept_all(&mut self, poll: &Poll, listener_token: Token) -> Result<()> {
        let listener = self.listeners.get_mut(&listener_token).unwrap();
        loop {
            match listener.accept() {
                Ok((mut stream, addr)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    self.registry.add(token, DescriptorKind::ClientSocket);
                    poll.registry()
                        .register(&mut stream, token, Interest::READABLE)?;
                    debug!("accepted connection {addr} as {:?}", token);
                    let conn = HttpConnection::new(stream, self.configs.clone());
                    self.connections.insert(token, conn);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
        }
        Ok(())
    }

    fn dispatch_client_event(&mut self, poll: &Poll, event: &Event, token: Token) -> Result<()> {
        let Some(conn) = self.connections.get_mut(&token) else {
            return Ok(());
        };
        conn.touch();

        if event.is_readable() {
            HttpConnection::handle_read_phase(
                conn,
                poll,
                token,
                &mut self.next_token,
                &mut self.cgi_to_client,
                &mut self.session_store,
            )?;
        }

        if event.is_writable() || !conn.write_buffer.is_empty() {
            HttpConnection::handle_write_phase(
                conn,
                poll,
                token,
                &mut self.next_token,
                &mut self.cgi_to_client,
                &mut self.session_store,
            )?;
        }

        if conn.should_close() {
            HttpConnection::terminate_connection(self, token);
        }

        Ok(())
    }

    fn dispatch_cgi_event(
        &mut self,
        poll: &Poll,
        event: &Event,
        cgi_token: Token,
        client_token: Token,
    ) -> Result<()> {
        let Some(conn) = self.connections.get_mut(&client_token) else {
            return Ok(());
        };
        crate::cgi::handle_cgi_event(
            poll,
            event,
            cgi_token,
            client_token,
            conn,
            &mut self.cgi_to_client,
            &mut self.buffer_mgr,
        )?;

        if conn.should_close() {
            HttpConnection::terminate_connection(self, client_token);
        }
        Ok(())
    }

    fn reap_zombies(&mut self) {
        self.zombie_purgatory
            .retain_mut(|child| matches!(child.try_wait(), Ok(None)));
    }
}
