use crate::prelude::*;

/// Sweeps connection state once per event-loop tick: drops clients that
/// have gone idle, kills CGI children that have run past their budget, and
/// periodically evicts expired sessions.
pub fn process(server: &mut Server, poll: &Poll) {
    let now = Instant::now();

    server.connections.retain(|token, conn| {
        if now.duration_since(conn.last_activity) > conn.idle_timeout {
            warn!("connection {:?} idle past timeout, closing", token);
            cleanup_connection(conn, poll);
            force_cgi_timeout(conn, &mut server.cgi_to_client);
            return false;
        }

        if let ActiveAction::Cgi { start_time, .. } = &conn.action {
            if start_time.elapsed().as_secs() > conn.cgi_timeout_secs {
                force_cgi_timeout(conn, &mut server.cgi_to_client);
                poll.registry()
                    .reregister(&mut conn.stream, *token, Interest::WRITABLE)
                    .ok();
            }
        }

        true
    });

    if server.session_store.last_cleanup.elapsed() > Duration::from_secs(CLEAN_UP) {
        server.session_store.cleanup();
    }
}

fn cleanup_connection(conn: &mut HttpConnection, poll: &Poll) {
    let _ = poll.registry().deregister(&mut conn.stream);
    let _ = conn.stream.shutdown(Shutdown::Both);
}
