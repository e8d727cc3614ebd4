use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;

use mio::net::TcpStream;
use webserv::config::{RouteConfig, ServerConfig};
use webserv::http::http_connection::{ActiveAction, HttpConnection};
use webserv::http::request::{HttpRequest, ParseError};
use webserv::upload::Upload;

/// Builds a connected loopback `mio::net::TcpStream` without spinning up a
/// server or event loop — enough to construct a real `HttpConnection` since
/// its socket field has to be a genuine connected stream.
fn loopback_stream() -> TcpStream {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let client = std::net::TcpStream::connect(addr).unwrap();
    let (server_side, _) = listener.accept().unwrap();
    drop(client);
    server_side.set_nonblocking(true).unwrap();
    TcpStream::from_std(server_side)
}

fn test_server_config(root: &str) -> Arc<ServerConfig> {
    Arc::new(ServerConfig {
        root: root.to_string(),
        routes: vec![Arc::new(RouteConfig::default())],
        ..Default::default()
    })
}

#[test]
fn chunked_body_assembles_across_fragmented_reads() {
    let tmp = std::env::temp_dir().join(format!("webserv_chunk_test_{}", std::process::id()));
    std::fs::create_dir_all(&tmp).unwrap();

    let stream = loopback_stream();
    let s_cfg = test_server_config(tmp.to_str().unwrap());
    let mut conn = HttpConnection::new(stream, vec![Arc::clone(&s_cfg)]);
    conn.s_cfg = Some(s_cfg);
    conn.action = ActiveAction::Upload(tmp.clone());
    conn.upload_manager = Some(Upload::new(tmp.clone(), ""));

    // Feed the chunked body in three separate reads, as a real socket would.
    conn.request.buffer.extend_from_slice(b"5\r\nHello\r\n");
    assert!(!HttpRequest::parse_chunked_body(&mut conn).unwrap());

    conn.request.buffer.extend_from_slice(b"7\r\n World!\r\n");
    assert!(!HttpRequest::parse_chunked_body(&mut conn).unwrap());

    conn.request.buffer.extend_from_slice(b"0\r\n\r\n");
    assert!(HttpRequest::parse_chunked_body(&mut conn).unwrap());

    assert_eq!(conn.total_body_read, 12);

    let saved = conn
        .upload_manager
        .as_ref()
        .and_then(|m| m.current_file_path.clone())
        .expect("upload should have opened a file");
    let contents = std::fs::read_to_string(&saved).unwrap();
    assert_eq!(contents, "Hello World!");

    let _ = std::fs::remove_dir_all(&tmp);
}

#[test]
fn chunked_body_rejects_a_chunk_over_the_body_size_limit() {
    let tmp = std::env::temp_dir().join(format!("webserv_chunk_limit_test_{}", std::process::id()));
    std::fs::create_dir_all(&tmp).unwrap();

    let stream = loopback_stream();
    let s_cfg = Arc::new(ServerConfig {
        root: tmp.to_str().unwrap().to_string(),
        client_max_body_size: 4,
        ..Default::default()
    });
    let mut conn = HttpConnection::new(stream, vec![Arc::clone(&s_cfg)]);
    conn.s_cfg = Some(s_cfg);
    conn.action = ActiveAction::Discard;

    conn.request.buffer.extend_from_slice(b"5\r\nHello\r\n");
    let err = HttpRequest::parse_chunked_body(&mut conn).unwrap_err();
    assert_eq!(err, ParseError::PayloadTooLarge);

    let _ = std::fs::remove_dir_all(&tmp);
}

#[test]
fn malformed_chunk_size_is_rejected() {
    let tmp = std::env::temp_dir().join(format!("webserv_chunk_bad_test_{}", std::process::id()));
    std::fs::create_dir_all(&tmp).unwrap();

    let stream = loopback_stream();
    let s_cfg = test_server_config(tmp.to_str().unwrap());
    let mut conn = HttpConnection::new(stream, vec![Arc::clone(&s_cfg)]);
    conn.s_cfg = Some(s_cfg);
    conn.action = ActiveAction::Discard;

    // "zz..." is not a valid hex chunk size, and the buffer is long enough
    // to rule out "still waiting for the rest of the size line".
    conn.request
        .buffer
        .extend_from_slice(b"zzzzzzzzzzzzzzzzzzzz\r\n");
    let err = HttpRequest::parse_chunked_body(&mut conn).unwrap_err();
    assert_eq!(err, ParseError::ParseHexError);

    let _ = std::fs::remove_dir_all(&tmp);
}
