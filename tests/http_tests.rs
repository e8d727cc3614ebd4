use webserv::http::*;

#[test]
fn response_serializes_status_line_headers_and_body() {
    let mut res = HttpResponse::new(200, "OK");
    res.set_header("content-type", "text/plain");
    res.set_body(b"Hello Rust".to_vec(), "text/plain");

    let bytes = res.to_bytes();
    let s = String::from_utf8_lossy(&bytes);

    assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(s.contains("Content-Type: text/plain\r\n"));
    assert!(s.contains("Content-Length: 10\r\n"));
    assert!(s.ends_with("\r\n\r\nHello Rust"));
}

#[test]
fn response_headers_only_omits_the_body() {
    let mut res = HttpResponse::new(204, "No Content");
    res.set_header("x-request-id", "abc123");
    let bytes = res.to_bytes_headers_only();
    let s = String::from_utf8_lossy(&bytes);
    assert!(s.starts_with("HTTP/1.1 204 No Content\r\n"));
    assert!(s.contains("X-Request-Id: abc123\r\n"));
    assert!(s.ends_with("\r\n\r\n"));
}

#[test]
fn redirect_builds_a_302_with_location() {
    let res = HttpResponse::redirect(302, "/new-path");
    assert_eq!(res.status_code, 302);
    assert_eq!(res.headers.get("location").unwrap(), "/new-path");
    assert_eq!(res.headers.get("connection").unwrap(), "close");
}

#[test]
fn status_text_covers_the_common_codes() {
    assert_eq!(HttpResponse::status_text(404), "Not Found");
    assert_eq!(HttpResponse::status_text(500), "Internal Server Error");
    assert_eq!(HttpResponse::status_text(413), "Payload Too Large");
}

#[test]
fn mime_type_falls_back_to_octet_stream_for_unknown_extensions() {
    assert_eq!(get_mime_type(Some("html")), "text/html");
    assert_eq!(get_mime_type(Some("json")), "application/json");
    assert_eq!(get_mime_type(Some("xyz")), "application/octet-stream");
    assert_eq!(get_mime_type(None), "application/octet-stream");
}

#[test]
fn parses_multipart_content_disposition_headers() {
    let headers = "Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\nContent-Type: text/plain\r\n";
    let info = parse_part_headers(headers);
    assert_eq!(info.name, "file");
    assert_eq!(info.filename.as_deref(), Some("a.txt"));
    assert_eq!(info.content_type, "text/plain");
}

#[test]
fn parses_multipart_headers_without_a_filename() {
    let headers = "Content-Disposition: form-data; name=\"field\"\r\n";
    let info = parse_part_headers(headers);
    assert_eq!(info.name, "field");
    assert!(info.filename.is_none());
}

#[test]
fn find_subsequence_finds_the_header_body_separator() {
    let buf = b"Header: value\r\n\r\nbody-bytes";
    let pos = find_subsequence(buf, b"\r\n\r\n", 0).unwrap();
    assert_eq!(&buf[pos + 4..], b"body-bytes");
    assert!(find_subsequence(buf, b"not-there", 0).is_none());
}
